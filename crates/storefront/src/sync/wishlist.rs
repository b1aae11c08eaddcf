//! Wishlist synchronization.

use chainline_core::{BicycleId, WishlistItemId};
use chrono::Utc;
use tracing::{debug, instrument, warn};

use super::{OnFailure, SyncError};
use crate::api::{ApiError, AuthToken, CatalogApi, Wishlist, WishlistApi};
use crate::store::{Epoch, LocalStore, LocalWishlist, LocalWishlistItem, Settlement};

/// Wishlist operations for one signed-in customer.
pub struct WishlistSync<'a, A> {
    api: &'a A,
    store: &'a LocalStore,
    token: &'a AuthToken,
}

impl<'a, A> WishlistSync<'a, A>
where
    A: WishlistApi + CatalogApi,
{
    /// Bind the sync operations to a customer.
    #[must_use]
    pub const fn new(api: &'a A, store: &'a LocalStore, token: &'a AuthToken) -> Self {
        Self { api, store, token }
    }

    /// The wishlist to show, refetching when the local copy is missing or stale.
    ///
    /// # Errors
    ///
    /// Returns a `SyncError` if a needed refetch fails.
    pub async fn snapshot(&self) -> Result<LocalWishlist, SyncError> {
        let snapshot = self.store.wishlist();
        match snapshot.value() {
            Some(wishlist) if !snapshot.needs_refresh() => Ok(wishlist.clone()),
            _ => self.refresh().await,
        }
    }

    /// Refetch the wishlist from the API and store it.
    ///
    /// # Errors
    ///
    /// Returns a `SyncError` if the fetch fails.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<LocalWishlist, SyncError> {
        self.refetch(self.store.epoch()).await
    }

    /// Whether the bicycle is saved, from local state.
    #[must_use]
    pub fn is_in_wishlist(&self, bicycle_id: BicycleId) -> bool {
        self.store
            .wishlist()
            .value()
            .is_some_and(|w| w.contains(bicycle_id))
    }

    /// Number of saved bicycles, from local state.
    #[must_use]
    pub fn count(&self) -> usize {
        self.store.wishlist().value().map_or(0, LocalWishlist::len)
    }

    /// Save a bicycle. Saving one the server already holds does nothing.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Validation` for an unknown bicycle. Remote failures
    /// leave the optimistic entry flagged stale until the next read.
    #[instrument(skip(self))]
    pub async fn add(&self, bicycle_id: BicycleId) -> Result<LocalWishlist, SyncError> {
        let current = self.snapshot().await?;
        if current.item_for(bicycle_id).is_some_and(|i| i.id.is_some()) {
            return Ok(current);
        }

        let bicycle = self.api.bicycle(bicycle_id).await.map_err(|err| match err {
            ApiError::NotFound(_) => SyncError::validation("That bicycle is no longer available."),
            other => other.into(),
        })?;

        let epoch = self.store.begin_wishlist(|wishlist| {
            wishlist.insert(LocalWishlistItem {
                id: None,
                bicycle_id,
                name: bicycle.name,
                price: bicycle.price,
                added_at: Utc::now(),
                image_url: bicycle.image_url,
            });
        });
        let result = self.api.add_wishlist_item(self.token, bicycle_id).await;
        self.settle(epoch, result, OnFailure::MarkStale).await
    }

    /// Remove a saved entry.
    ///
    /// # Errors
    ///
    /// Remote failures are returned after the wishlist has been refetched.
    #[instrument(skip(self))]
    pub async fn remove(&self, item_id: WishlistItemId) -> Result<LocalWishlist, SyncError> {
        let epoch = self.store.begin_wishlist(|wishlist| wishlist.remove(item_id));
        let result = self.api.remove_wishlist_item(self.token, item_id).await;
        self.settle(epoch, result, OnFailure::Refetch).await
    }

    /// Save the bicycle if it is not saved, otherwise remove it.
    ///
    /// Membership is read from local state at call time. Two toggles racing
    /// each other can both dispatch the same operation; whichever response
    /// settles last determines the local value.
    ///
    /// # Errors
    ///
    /// Returns a `SyncError` from the dispatched add or remove.
    #[instrument(skip(self))]
    pub async fn toggle(&self, bicycle_id: BicycleId) -> Result<LocalWishlist, SyncError> {
        let mut wishlist = self.snapshot().await?;

        // An entry saved optimistically has no server id to delete by yet.
        if wishlist.item_for(bicycle_id).is_some_and(|i| i.id.is_none()) {
            wishlist = self.refresh().await?;
        }

        match wishlist.item_for(bicycle_id).and_then(|i| i.id) {
            Some(item_id) => self.remove(item_id).await,
            None => self.add(bicycle_id).await,
        }
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    async fn settle(
        &self,
        epoch: Epoch,
        result: Result<Wishlist, ApiError>,
        on_failure: OnFailure,
    ) -> Result<LocalWishlist, SyncError> {
        match result {
            Ok(wishlist) => {
                if !self
                    .store
                    .settle_wishlist(epoch, Settlement::Confirmed(wishlist.clone()))
                {
                    debug!("Store cleared while wishlist mutation was in flight; dropping response");
                }
                Ok(wishlist.into())
            }
            Err(err) => {
                self.store.settle_wishlist(epoch, Settlement::Failed);
                let error = SyncError::from(err);
                warn!(error = %error, "Wishlist mutation failed");

                if on_failure == OnFailure::Refetch {
                    if let Err(refetch_error) = self.refetch(epoch).await {
                        warn!(error = %refetch_error, "Wishlist refetch after failed mutation also failed");
                    }
                }
                Err(error)
            }
        }
    }

    async fn refetch(&self, epoch: Epoch) -> Result<LocalWishlist, SyncError> {
        let wishlist = self.api.fetch_wishlist(self.token).await?;
        self.store.replace_wishlist(epoch, wishlist.clone());
        Ok(wishlist.into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::sync::fake::{FakeApi, Failure, bicycle, token};

    fn api() -> FakeApi {
        FakeApi::with_catalog(vec![bicycle(1, 950, 4), bicycle(2, 3100, 1)], Vec::new())
    }

    #[tokio::test]
    async fn test_add_then_remove_updates_count() {
        let api = api();
        let store = LocalStore::new();
        let token = token();
        let sync = WishlistSync::new(&api, &store, &token);
        let b1 = BicycleId::new(1);

        assert_eq!(sync.snapshot().await.unwrap().len(), 0);

        sync.add(b1).await.unwrap();
        assert_eq!(sync.count(), 1);
        assert!(sync.is_in_wishlist(b1));

        let item_id = store.wishlist().value().unwrap().items[0].id.unwrap();
        sync.remove(item_id).await.unwrap();
        assert_eq!(sync.count(), 0);
        assert!(!sync.is_in_wishlist(b1));
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_membership() {
        let api = api();
        let store = LocalStore::new();
        let token = token();
        let sync = WishlistSync::new(&api, &store, &token);
        let b2 = BicycleId::new(2);

        let before = sync.is_in_wishlist(b2);
        sync.toggle(b2).await.unwrap();
        assert_ne!(sync.is_in_wishlist(b2), before);
        sync.toggle(b2).await.unwrap();

        assert_eq!(sync.is_in_wishlist(b2), before);
        assert!(api.server_wishlist().items.is_empty());
    }

    #[tokio::test]
    async fn test_add_is_idempotent_locally() {
        let api = api();
        let store = LocalStore::new();
        let token = token();
        let sync = WishlistSync::new(&api, &store, &token);

        sync.add(BicycleId::new(1)).await.unwrap();
        sync.add(BicycleId::new(1)).await.unwrap();
        assert_eq!(sync.count(), 1);
        assert_eq!(api.server_wishlist().items.len(), 1);
    }

    #[tokio::test]
    async fn test_add_unknown_bicycle_is_rejected() {
        let api = api();
        let store = LocalStore::new();
        let token = token();
        let sync = WishlistSync::new(&api, &store, &token);

        let err = sync.add(BicycleId::new(404)).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert_eq!(sync.count(), 0);
    }

    #[tokio::test]
    async fn test_failed_remove_refetches() {
        let api = api();
        let store = LocalStore::new();
        let token = token();
        let sync = WishlistSync::new(&api, &store, &token);
        sync.add(BicycleId::new(1)).await.unwrap();
        let fetches_before = api.wishlist_fetches.load(Ordering::SeqCst);

        let item_id = store.wishlist().value().unwrap().items[0].id.unwrap();
        api.fail_next(Failure::Unavailable);
        let err = sync.remove(item_id).await.unwrap_err();

        assert!(matches!(err, SyncError::Network(_)));
        assert!(sync.is_in_wishlist(BicycleId::new(1)));
        assert!(store.wishlist().is_settled());
        assert_eq!(
            api.wishlist_fetches.load(Ordering::SeqCst),
            fetches_before + 1
        );
    }

    #[tokio::test]
    async fn test_retry_after_failed_add_reaches_server() {
        let api = api();
        let store = LocalStore::new();
        let token = token();
        let sync = WishlistSync::new(&api, &store, &token);
        let b1 = BicycleId::new(1);

        api.fail_next(Failure::Unavailable);
        let err = sync.add(b1).await.unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));
        assert!(sync.is_in_wishlist(b1));
        assert!(store.wishlist().is_stale());

        let wishlist = sync.add(b1).await.unwrap();
        assert!(wishlist.contains(b1));
        assert_eq!(api.server_wishlist().items.len(), 1);
        assert!(store.wishlist().is_settled());
    }

    #[tokio::test]
    async fn test_sign_out_with_add_in_flight_stays_cleared() {
        let api = api();
        let store = LocalStore::new();
        let token = token();
        let sync = WishlistSync::new(&api, &store, &token);
        let gate = api.gate();

        let add = sync.add(BicycleId::new(2));
        let sign_out = async {
            gate.entered.notified().await;
            assert_eq!(store.wishlist().pending(), 1);
            store.clear();
            gate.release.notify_one();
        };
        let (result, ()) = tokio::join!(add, sign_out);

        assert!(result.is_ok());
        assert!(store.wishlist().value().is_none());
        assert_eq!(store.wishlist().pending(), 0);
        assert_eq!(sync.count(), 0);
        assert_eq!(api.server_wishlist().items.len(), 1);
    }

    #[tokio::test]
    async fn test_sign_out_clears_wishlist() {
        let api = api();
        let store = LocalStore::new();
        let token = token();
        let sync = WishlistSync::new(&api, &store, &token);
        sync.add(BicycleId::new(1)).await.unwrap();

        store.clear();
        assert_eq!(sync.count(), 0);
        assert!(store.wishlist().value().is_none());
    }
}
