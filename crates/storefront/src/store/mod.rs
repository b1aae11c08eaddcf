//! Per-customer local store for cart and wishlist snapshots.
//!
//! # Architecture
//!
//! - One [`LocalStore`] per signed-in customer, handed out by the
//!   [`StoreRegistry`] held in application state
//! - Snapshots live in memory and survive page reloads for as long as the
//!   customer stays active (7-day idle expiry, matching the session)
//! - All access goes through a `parking_lot::RwLock`; the guard is never held
//!   across an `.await`, so concurrent requests interleave but never block on
//!   the network
//! - Every write is tagged with the store's epoch. Sign-out bumps the epoch,
//!   so a mutation that settles afterwards is dropped instead of repopulating
//!   the cleared store

mod model;
mod snapshot;

pub use model::{LocalCart, LocalCartLine, LocalWishlist, LocalWishlistItem, NewCartLine};
pub use snapshot::{Settlement, Snapshot};

use std::sync::Arc;
use std::time::Duration;

use chainline_core::CustomerId;
use parking_lot::RwLock;

use crate::api::{Cart, Wishlist};

/// Generation counter; changes whenever the store is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch(u64);

#[derive(Debug, Default)]
struct StoreState {
    epoch: u64,
    cart: Snapshot<LocalCart>,
    wishlist: Snapshot<LocalWishlist>,
}

impl StoreState {
    fn at(&mut self, epoch: Epoch) -> Option<&mut Self> {
        (self.epoch == epoch.0).then_some(self)
    }
}

/// Cart and wishlist snapshots for one customer.
///
/// Cheap to clone; all clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct LocalStore {
    inner: Arc<RwLock<StoreState>>,
}

impl LocalStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current epoch.
    #[must_use]
    pub fn epoch(&self) -> Epoch {
        Epoch(self.inner.read().epoch)
    }

    /// Wipe both snapshots and start a new epoch.
    ///
    /// Unconditional: mutations still in flight settle into the old epoch and
    /// are discarded.
    pub fn clear(&self) {
        let mut state = self.inner.write();
        state.epoch += 1;
        state.cart = Snapshot::default();
        state.wishlist = Snapshot::default();
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Copy of the cart snapshot.
    #[must_use]
    pub fn cart(&self) -> Snapshot<LocalCart> {
        self.inner.read().cart.clone()
    }

    /// Apply an optimistic cart change and return the epoch it belongs to.
    pub fn begin_cart(&self, apply: impl FnOnce(&mut LocalCart)) -> Epoch {
        let mut state = self.inner.write();
        state.cart.begin(apply);
        Epoch(state.epoch)
    }

    /// Settle a cart mutation started in `epoch`.
    ///
    /// Returns `false` when the store was cleared in the meantime and the
    /// settlement was dropped.
    pub fn settle_cart(&self, epoch: Epoch, settlement: Settlement<Cart>) -> bool {
        let mut state = self.inner.write();
        state
            .at(epoch)
            .map(|s| s.cart.settle(settlement))
            .is_some()
    }

    /// Store a freshly fetched cart, unless the store was cleared since `epoch`.
    pub fn replace_cart(&self, epoch: Epoch, cart: Cart) -> bool {
        let mut state = self.inner.write();
        state.at(epoch).map(|s| s.cart.replace(cart)).is_some()
    }

    /// Force the next cart read to refetch.
    pub fn invalidate_cart(&self) {
        self.inner.write().cart.invalidate();
    }

    // =========================================================================
    // Wishlist
    // =========================================================================

    /// Copy of the wishlist snapshot.
    #[must_use]
    pub fn wishlist(&self) -> Snapshot<LocalWishlist> {
        self.inner.read().wishlist.clone()
    }

    /// Apply an optimistic wishlist change and return the epoch it belongs to.
    pub fn begin_wishlist(&self, apply: impl FnOnce(&mut LocalWishlist)) -> Epoch {
        let mut state = self.inner.write();
        state.wishlist.begin(apply);
        Epoch(state.epoch)
    }

    /// Settle a wishlist mutation started in `epoch`.
    pub fn settle_wishlist(&self, epoch: Epoch, settlement: Settlement<Wishlist>) -> bool {
        let mut state = self.inner.write();
        state
            .at(epoch)
            .map(|s| s.wishlist.settle(settlement))
            .is_some()
    }

    /// Store a freshly fetched wishlist, unless the store was cleared since `epoch`.
    pub fn replace_wishlist(&self, epoch: Epoch, wishlist: Wishlist) -> bool {
        let mut state = self.inner.write();
        state
            .at(epoch)
            .map(|s| s.wishlist.replace(wishlist))
            .is_some()
    }
}

// =============================================================================
// StoreRegistry
// =============================================================================

/// Idle time after which a customer's store is dropped (7 days).
const STORE_IDLE_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Hands out the [`LocalStore`] for each signed-in customer.
#[derive(Clone)]
pub struct StoreRegistry {
    stores: moka::sync::Cache<CustomerId, LocalStore>,
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stores: moka::sync::Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(Duration::from_secs(STORE_IDLE_SECONDS))
                .build(),
        }
    }

    /// The store for a customer, created empty on first use.
    #[must_use]
    pub fn store_for(&self, customer_id: CustomerId) -> LocalStore {
        self.stores.get_with(customer_id, LocalStore::new)
    }

    /// Sign-out: clear the customer's store and forget it.
    pub fn sign_out(&self, customer_id: CustomerId) {
        if let Some(store) = self.stores.get(&customer_id) {
            store.clear();
        }
        self.stores.invalidate(&customer_id);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chainline_core::{BicycleId, CartItemId};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::api::{CartItem, Merchandise};

    fn server_cart(quantity: u32) -> Cart {
        Cart {
            items: vec![CartItem {
                id: CartItemId::new(1),
                merchandise: Merchandise::Bicycle(BicycleId::new(2)),
                name: "City 3".to_string(),
                unit_price: dec!(650),
                quantity,
                stock: Some(9),
                image_url: None,
            }],
            subtotal: dec!(650) * rust_decimal::Decimal::from(quantity),
            item_count: quantity,
            currency: chainline_core::CurrencyCode::USD,
        }
    }

    #[test]
    fn test_settlement_after_clear_is_dropped() {
        let store = LocalStore::new();
        let epoch = store.begin_cart(|cart| cart.set_quantity(CartItemId::new(1), 2));

        store.clear();
        assert!(!store.settle_cart(epoch, Settlement::Confirmed(server_cart(2))));
        assert!(store.cart().value().is_none());
        assert_eq!(store.cart().pending(), 0);
    }

    #[test]
    fn test_replace_in_current_epoch() {
        let store = LocalStore::new();
        let epoch = store.epoch();
        assert!(store.replace_cart(epoch, server_cart(3)));

        let snapshot = store.cart();
        assert!(snapshot.is_settled());
        assert_eq!(snapshot.value().unwrap().item_count, 3);
    }

    #[test]
    fn test_registry_shares_store_until_sign_out() {
        let registry = StoreRegistry::new();
        let customer = CustomerId::new(42);

        let first = registry.store_for(customer);
        first.replace_cart(first.epoch(), server_cart(1));
        assert!(registry.store_for(customer).cart().value().is_some());

        registry.sign_out(customer);
        assert!(first.cart().value().is_none());
        assert!(registry.store_for(customer).cart().value().is_none());
    }
}
