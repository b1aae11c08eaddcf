//! Cart synchronization.

use chainline_core::CartItemId;
use tracing::{debug, instrument, warn};

use super::{OnFailure, SyncError};
use crate::api::{ApiError, AuthToken, Cart, CartApi, CartItemInput, CatalogApi, Merchandise};
use crate::store::{Epoch, LocalCart, LocalCartLine, LocalStore, NewCartLine, Settlement};

/// Cart operations for one signed-in customer.
///
/// Borrowed per request: the API client, the customer's store, and their token.
pub struct CartSync<'a, A> {
    api: &'a A,
    store: &'a LocalStore,
    token: &'a AuthToken,
}

impl<'a, A> CartSync<'a, A>
where
    A: CartApi + CatalogApi,
{
    /// Bind the sync operations to a customer.
    #[must_use]
    pub const fn new(api: &'a A, store: &'a LocalStore, token: &'a AuthToken) -> Self {
        Self { api, store, token }
    }

    /// The cart to show, refetching when the local copy is missing or stale.
    ///
    /// # Errors
    ///
    /// Returns a `SyncError` if a needed refetch fails.
    pub async fn snapshot(&self) -> Result<LocalCart, SyncError> {
        let snapshot = self.store.cart();
        match snapshot.value() {
            Some(cart) if !snapshot.needs_refresh() => Ok(cart.clone()),
            _ => self.refresh().await,
        }
    }

    /// Refetch the cart from the API and store it.
    ///
    /// # Errors
    ///
    /// Returns a `SyncError` if the fetch fails.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<LocalCart, SyncError> {
        self.refetch(self.store.epoch()).await
    }

    /// Number of items in the cart (sum of quantities), from local state.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.store.cart().value().map_or(0, |cart| cart.item_count)
    }

    /// Add a bicycle or part, incrementing the line if it is already in the cart.
    ///
    /// On failure the optimistic line stays visible but is flagged stale, so
    /// the next read refetches.
    ///
    /// The local stock check only uses the stock the API reported on an
    /// existing line; a new line is bounded by the API itself.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Validation` for a zero quantity, an unknown product,
    /// or a quantity beyond the remaining stock.
    #[instrument(skip(self), fields(merchandise = %merchandise))]
    pub async fn add(&self, merchandise: Merchandise, quantity: u32) -> Result<LocalCart, SyncError> {
        if quantity == 0 {
            return Err(SyncError::validation("Quantity must be at least 1."));
        }

        let line = self.describe(merchandise).await?;
        let current = self.snapshot().await?;
        if let Some(existing) = current.line_for(merchandise).filter(|l| l.id.is_some()) {
            ensure_in_stock(existing, quantity)?;
        }

        let epoch = self.store.begin_cart(|cart| cart.add(line, quantity));
        let result = self
            .api
            .add_cart_item(
                self.token,
                CartItemInput {
                    merchandise,
                    quantity,
                },
            )
            .await;
        self.settle(epoch, result, OnFailure::MarkStale).await
    }

    /// Change a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Validation` for a zero quantity; remote failures
    /// are returned after the cart has been refetched.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<LocalCart, SyncError> {
        if quantity == 0 {
            return Err(SyncError::validation("Quantity must be at least 1."));
        }

        let epoch = self
            .store
            .begin_cart(|cart| cart.set_quantity(item_id, quantity));
        let result = self
            .api
            .update_cart_item(self.token, item_id, quantity)
            .await;
        self.settle(epoch, result, OnFailure::Refetch).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Remote failures are returned after the cart has been refetched.
    #[instrument(skip(self))]
    pub async fn remove(&self, item_id: CartItemId) -> Result<LocalCart, SyncError> {
        let epoch = self.store.begin_cart(|cart| cart.remove(item_id));
        let result = self.api.remove_cart_item(self.token, item_id).await;
        self.settle(epoch, result, OnFailure::Refetch).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Remote failures are returned after the cart has been refetched.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<LocalCart, SyncError> {
        let epoch = self.store.begin_cart(|cart| {
            *cart = LocalCart {
                currency: cart.currency,
                ..LocalCart::default()
            };
        });
        let result = self.api.clear_cart(self.token).await;
        self.settle(epoch, result, OnFailure::Refetch).await
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    async fn settle(
        &self,
        epoch: Epoch,
        result: Result<Cart, ApiError>,
        on_failure: OnFailure,
    ) -> Result<LocalCart, SyncError> {
        match result {
            Ok(cart) => {
                if !self.store.settle_cart(epoch, Settlement::Confirmed(cart.clone())) {
                    debug!("Store cleared while cart mutation was in flight; dropping response");
                }
                Ok(cart.into())
            }
            Err(err) => {
                self.store.settle_cart(epoch, Settlement::Failed);
                let error = SyncError::from(err);
                warn!(error = %error, "Cart mutation failed");

                if on_failure == OnFailure::Refetch {
                    if let Err(refetch_error) = self.refetch(epoch).await {
                        warn!(error = %refetch_error, "Cart refetch after failed mutation also failed");
                    }
                }
                Err(error)
            }
        }
    }

    async fn refetch(&self, epoch: Epoch) -> Result<LocalCart, SyncError> {
        let cart = self.api.fetch_cart(self.token).await?;
        self.store.replace_cart(epoch, cart.clone());
        Ok(cart.into())
    }

    /// Look the product up in the catalog for the optimistic line.
    async fn describe(&self, merchandise: Merchandise) -> Result<NewCartLine, SyncError> {
        let found = match merchandise {
            Merchandise::Bicycle(id) => self.api.bicycle(id).await.map(|b| NewCartLine {
                merchandise,
                name: b.name,
                unit_price: b.price,
                stock: b.stock,
                image_url: b.image_url,
            }),
            Merchandise::Part(id) => self.api.part(id).await.map(|p| NewCartLine {
                merchandise,
                name: p.name,
                unit_price: p.price,
                stock: p.stock,
                image_url: p.image_url,
            }),
        };

        found.map_err(|err| match err {
            ApiError::NotFound(_) => {
                SyncError::validation("That product is no longer available.")
            }
            other => other.into(),
        })
    }
}

/// Reject an increment beyond the stock the API reported for the line.
fn ensure_in_stock(line: &LocalCartLine, quantity: u32) -> Result<(), SyncError> {
    match line.stock {
        Some(stock) if line.quantity.saturating_add(quantity) > stock => Err(
            SyncError::Validation(format!("Only {stock} of {} left in stock.", line.name)),
        ),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::Ordering;

    use chainline_core::{BicycleId, PartId};

    use super::*;
    use crate::sync::fake::{FakeApi, Failure, bicycle, part, token};

    fn api() -> FakeApi {
        FakeApi::with_catalog(
            vec![bicycle(1, 1200, 3), bicycle(2, 2400, 10)],
            vec![part(7, 40, 25)],
        )
    }

    #[tokio::test]
    async fn test_successful_sequence_matches_server() {
        let api = api();
        let store = LocalStore::new();
        let token = token();
        let sync = CartSync::new(&api, &store, &token);

        sync.add(Merchandise::Bicycle(BicycleId::new(1)), 1)
            .await
            .unwrap();
        sync.add(Merchandise::Part(PartId::new(7)), 3).await.unwrap();
        sync.add(Merchandise::Part(PartId::new(7)), 1).await.unwrap();

        let chain_id = api.server_cart().items[1].id;
        sync.update_quantity(chain_id, 2).await.unwrap();
        let bike_id = api.server_cart().items[0].id;
        sync.remove(bike_id).await.unwrap();

        let local = store.cart();
        assert!(local.is_settled());
        assert_eq!(local.value(), Some(&LocalCart::from(api.server_cart())));
        assert_eq!(sync.count(), 2);
    }

    #[tokio::test]
    async fn test_update_quantity_reflects_server_value() {
        let api = api();
        let id = api.seed_cart(Merchandise::Bicycle(BicycleId::new(2)), 2);
        let store = LocalStore::new();
        let token = token();
        let sync = CartSync::new(&api, &store, &token);

        sync.refresh().await.unwrap();
        let cart = sync.update_quantity(id, 5).await.unwrap();

        assert_eq!(cart.line(id).unwrap().quantity, 5);
        assert_eq!(
            store.cart().value().unwrap().line(id).unwrap().quantity,
            5
        );
    }

    #[tokio::test]
    async fn test_zero_quantity_is_rejected_without_remote_call() {
        let api = api();
        let id = api.seed_cart(Merchandise::Part(PartId::new(7)), 1);
        let store = LocalStore::new();
        let token = token();
        let sync = CartSync::new(&api, &store, &token);

        let err = sync.update_quantity(id, 0).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert_eq!(api.server_cart().items[0].quantity, 1);
        assert_eq!(store.cart().pending(), 0);

        let err = sync
            .add(Merchandise::Part(PartId::new(7)), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[tokio::test]
    async fn test_add_unknown_product_is_validation_error() {
        let api = api();
        let store = LocalStore::new();
        let token = token();
        let sync = CartSync::new(&api, &store, &token);

        let err = sync
            .add(Merchandise::Bicycle(BicycleId::new(99)), 1)
            .await
            .unwrap_err();
        assert_eq!(err.message(), "That product is no longer available.");
        assert!(store.cart().value().is_none());
    }

    #[tokio::test]
    async fn test_add_beyond_stock_is_rejected() {
        let api = api();
        let store = LocalStore::new();
        let token = token();
        let sync = CartSync::new(&api, &store, &token);

        sync.add(Merchandise::Bicycle(BicycleId::new(1)), 2)
            .await
            .unwrap();
        let err = sync
            .add(Merchandise::Bicycle(BicycleId::new(1)), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert_eq!(api.server_cart().item_count, 2);
    }

    #[tokio::test]
    async fn test_failed_add_marks_stale_and_next_read_refetches() {
        let api = api();
        let store = LocalStore::new();
        let token = token();
        let sync = CartSync::new(&api, &store, &token);

        api.fail_next(Failure::Validation("Out of stock".to_string()));
        let err = sync
            .add(Merchandise::Part(PartId::new(7)), 1)
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Out of stock");

        let snapshot = store.cart();
        assert!(snapshot.is_stale());
        assert_eq!(snapshot.value().unwrap().item_count, 1);
        assert_eq!(api.cart_fetches.load(Ordering::SeqCst), 1);

        let cart = sync.snapshot().await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(api.cart_fetches.load(Ordering::SeqCst), 2);
        assert!(store.cart().is_settled());
    }

    #[tokio::test]
    async fn test_retry_after_failed_add_ignores_phantom_quantity() {
        let api = api();
        let store = LocalStore::new();
        let token = token();
        let sync = CartSync::new(&api, &store, &token);
        let bike = Merchandise::Bicycle(BicycleId::new(1));

        api.fail_next(Failure::Unavailable);
        let err = sync.add(bike, 2).await.unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));
        assert_eq!(store.cart().value().unwrap().item_count, 2);
        assert_eq!(api.server_cart().item_count, 0);

        let cart = sync.add(bike, 2).await.unwrap();
        assert_eq!(cart.item_count, 2);
        assert_eq!(api.server_cart().item_count, 2);
        assert!(store.cart().is_settled());
    }

    #[tokio::test]
    async fn test_new_line_stock_is_left_to_the_api() {
        // Catalog says sold out; the API has restocked since.
        let api = FakeApi::with_catalog(vec![bicycle(5, 700, 0)], Vec::new());
        let store = LocalStore::new();
        let token = token();
        let sync = CartSync::new(&api, &store, &token);

        let cart = sync
            .add(Merchandise::Bicycle(BicycleId::new(5)), 1)
            .await
            .unwrap();
        assert_eq!(cart.item_count, 1);
        assert_eq!(api.server_cart().item_count, 1);
    }

    #[tokio::test]
    async fn test_failed_update_refetches_ground_truth() {
        let api = api();
        let id = api.seed_cart(Merchandise::Bicycle(BicycleId::new(2)), 2);
        let store = LocalStore::new();
        let token = token();
        let sync = CartSync::new(&api, &store, &token);
        sync.refresh().await.unwrap();

        api.fail_next(Failure::Unavailable);
        let err = sync.update_quantity(id, 4).await.unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));

        let snapshot = store.cart();
        assert!(snapshot.is_settled());
        assert_eq!(snapshot.value().unwrap().line(id).unwrap().quantity, 2);
        assert_eq!(api.cart_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_remove_restores_line() {
        let api = api();
        let id = api.seed_cart(Merchandise::Part(PartId::new(7)), 1);
        let store = LocalStore::new();
        let token = token();
        let sync = CartSync::new(&api, &store, &token);
        sync.refresh().await.unwrap();

        api.fail_next(Failure::Unauthorized);
        let err = sync.remove(id).await.unwrap_err();
        assert!(matches!(err, SyncError::AuthRequired(_)));
        assert!(store.cart().value().unwrap().line(id).is_some());
    }

    #[tokio::test]
    async fn test_clear_empties_local_and_remote() {
        let api = api();
        api.seed_cart(Merchandise::Part(PartId::new(7)), 4);
        let store = LocalStore::new();
        let token = token();
        let sync = CartSync::new(&api, &store, &token);
        sync.refresh().await.unwrap();

        let cart = sync.clear().await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(sync.count(), 0);
        assert!(api.server_cart().items.is_empty());
    }

    #[tokio::test]
    async fn test_sign_out_with_mutation_in_flight_stays_cleared() {
        let api = api();
        let store = LocalStore::new();
        let token = token();
        let sync = CartSync::new(&api, &store, &token);
        let gate = api.gate();

        let add = sync.add(Merchandise::Bicycle(BicycleId::new(2)), 1);
        let sign_out = async {
            gate.entered.notified().await;
            assert_eq!(store.cart().pending(), 1);
            store.clear();
            gate.release.notify_one();
        };
        let (result, ()) = tokio::join!(add, sign_out);

        assert!(result.is_ok());
        assert!(store.cart().value().is_none());
        assert_eq!(store.cart().pending(), 0);
        assert_eq!(api.server_cart().item_count, 1);
    }
}
