//! Local mirrors of the server-side cart and wishlist.
//!
//! Lines added optimistically have no server id yet (`id: None`) until the
//! API's response replaces them.

use chainline_core::{BicycleId, CartItemId, CurrencyCode, Price, WishlistItemId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::api::{Cart, CartItem, Merchandise, Wishlist, WishlistItem};

// =============================================================================
// Cart
// =============================================================================

/// One cart line as the storefront currently believes it to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCartLine {
    pub id: Option<CartItemId>,
    pub merchandise: Merchandise,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub stock: Option<u32>,
    pub image_url: Option<String>,
}

impl LocalCartLine {
    /// Line total (unit price × quantity).
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

impl From<CartItem> for LocalCartLine {
    fn from(item: CartItem) -> Self {
        Self {
            id: Some(item.id),
            merchandise: item.merchandise,
            name: item.name,
            unit_price: item.unit_price,
            quantity: item.quantity,
            stock: item.stock,
            image_url: item.image_url,
        }
    }
}

/// Product details needed to show a line before the server confirms it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCartLine {
    pub merchandise: Merchandise,
    pub name: String,
    pub unit_price: Decimal,
    pub stock: u32,
    pub image_url: Option<String>,
}

/// Cart lines in insertion order plus the server-computed totals.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalCart {
    pub lines: Vec<LocalCartLine>,
    pub subtotal: Decimal,
    pub item_count: u32,
    pub currency: CurrencyCode,
}

impl From<Cart> for LocalCart {
    fn from(cart: Cart) -> Self {
        Self {
            lines: cart.items.into_iter().map(LocalCartLine::from).collect(),
            subtotal: cart.subtotal,
            item_count: cart.item_count,
            currency: cart.currency,
        }
    }
}

impl LocalCart {
    /// Find the line for a product, if it is already in the cart.
    #[must_use]
    pub fn line_for(&self, merchandise: Merchandise) -> Option<&LocalCartLine> {
        self.lines.iter().find(|l| l.merchandise == merchandise)
    }

    /// Find a line by its server id.
    #[must_use]
    pub fn line(&self, id: CartItemId) -> Option<&LocalCartLine> {
        self.lines.iter().find(|l| l.id == Some(id))
    }

    /// Subtotal as a displayable price.
    #[must_use]
    pub const fn subtotal_price(&self) -> Price {
        Price::new(self.subtotal, self.currency)
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Insert a new line or increment the existing line for the same product.
    pub fn add(&mut self, line: NewCartLine, quantity: u32) {
        if let Some(existing) = self
            .lines
            .iter_mut()
            .find(|l| l.merchandise == line.merchandise)
        {
            existing.quantity = existing.quantity.saturating_add(quantity);
        } else {
            self.lines.push(LocalCartLine {
                id: None,
                merchandise: line.merchandise,
                name: line.name,
                unit_price: line.unit_price,
                quantity,
                stock: Some(line.stock),
                image_url: line.image_url,
            });
        }
        self.recompute();
    }

    /// Set the quantity of an existing line. Unknown ids are ignored.
    pub fn set_quantity(&mut self, id: CartItemId, quantity: u32) {
        if let Some(line) = self.lines.iter_mut().find(|l| l.id == Some(id)) {
            line.quantity = quantity;
        }
        self.recompute();
    }

    /// Drop a line. Unknown ids are ignored.
    pub fn remove(&mut self, id: CartItemId) {
        self.lines.retain(|l| l.id != Some(id));
        self.recompute();
    }

    // Provisional totals; the next server response overwrites them.
    fn recompute(&mut self) {
        self.subtotal = self.lines.iter().map(LocalCartLine::line_total).sum();
        self.item_count = self.lines.iter().map(|l| l.quantity).sum();
    }
}

// =============================================================================
// Wishlist
// =============================================================================

/// One saved bicycle as the storefront currently believes it to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalWishlistItem {
    pub id: Option<WishlistItemId>,
    pub bicycle_id: BicycleId,
    pub name: String,
    pub price: Decimal,
    pub added_at: DateTime<Utc>,
    pub image_url: Option<String>,
}

impl From<WishlistItem> for LocalWishlistItem {
    fn from(item: WishlistItem) -> Self {
        Self {
            id: Some(item.id),
            bicycle_id: item.bicycle_id,
            name: item.name,
            price: item.price,
            added_at: item.added_at,
            image_url: item.image_url,
        }
    }
}

/// Saved bicycles; no bicycle appears twice.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalWishlist {
    pub items: Vec<LocalWishlistItem>,
}

impl From<Wishlist> for LocalWishlist {
    fn from(wishlist: Wishlist) -> Self {
        let mut local = Self::default();
        for item in wishlist.items {
            if !local.contains(item.bicycle_id) {
                local.items.push(item.into());
            }
        }
        local
    }
}

impl LocalWishlist {
    /// Whether the bicycle is saved.
    #[must_use]
    pub fn contains(&self, bicycle_id: BicycleId) -> bool {
        self.items.iter().any(|i| i.bicycle_id == bicycle_id)
    }

    /// The saved entry for a bicycle.
    #[must_use]
    pub fn item_for(&self, bicycle_id: BicycleId) -> Option<&LocalWishlistItem> {
        self.items.iter().find(|i| i.bicycle_id == bicycle_id)
    }

    /// Number of saved bicycles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Save a bicycle unless it is already saved.
    pub fn insert(&mut self, item: LocalWishlistItem) {
        if !self.contains(item.bicycle_id) {
            self.items.push(item);
        }
    }

    /// Drop an entry by server id. Unknown ids are ignored.
    pub fn remove(&mut self, id: WishlistItemId) {
        self.items.retain(|i| i.id != Some(id));
    }
}
