//! Domain types for the Chainline remote API.
//!
//! These mirror the JSON contract the backend exposes. Cart line items arrive
//! in a flat wire shape (`bicycle_id` / `part_id`) and are validated into
//! [`Merchandise`] on deserialization so the rest of the storefront never sees
//! a line that references both or neither.

use std::fmt;

use chainline_core::{
    BicycleId, BookingId, BookingStatus, CartItemId, CurrencyCode, CustomerId, CustomerRole,
    PartId, Price, ServiceId, WishlistItemId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Identity
// =============================================================================

/// Bearer token issued by the identity provider.
///
/// Stored in the session; `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wrap a raw token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken([REDACTED])")
    }
}

/// The signed-in customer as resolved by `GET /auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: CustomerRole,
}

// =============================================================================
// Catalog
// =============================================================================

/// A bicycle listed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bicycle {
    pub id: BicycleId,
    pub name: String,
    pub brand: String,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: u32,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A spare part or accessory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub id: PartId,
    pub name: String,
    pub category: String,
    /// Bicycle categories this part fits (e.g., "road", "gravel").
    #[serde(default)]
    pub compatibility: Vec<String>,
    pub price: Decimal,
    pub stock: u32,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A bookable workshop service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub duration_minutes: u32,
    pub price: Decimal,
}

/// Results of `GET /search`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub bicycles: Vec<Bicycle>,
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default)]
    pub services: Vec<Service>,
}

impl SearchResults {
    /// Total number of hits across all resource kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bicycles.len() + self.parts.len() + self.services.len()
    }

    /// Whether the search found nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Cart
// =============================================================================

/// What a cart line refers to: a bicycle or a part, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Merchandise {
    Bicycle(BicycleId),
    Part(PartId),
}

impl Merchandise {
    /// Build from the flat wire representation.
    ///
    /// # Errors
    ///
    /// Returns an error message if both or neither reference is set.
    pub fn from_refs(
        bicycle_id: Option<BicycleId>,
        part_id: Option<PartId>,
    ) -> Result<Self, String> {
        match (bicycle_id, part_id) {
            (Some(bicycle), None) => Ok(Self::Bicycle(bicycle)),
            (None, Some(part)) => Ok(Self::Part(part)),
            (Some(_), Some(_)) => Err("cart item references both a bicycle and a part".to_string()),
            (None, None) => Err("cart item references neither a bicycle nor a part".to_string()),
        }
    }

    /// Storefront path of the product page.
    #[must_use]
    pub fn path(self) -> String {
        match self {
            Self::Bicycle(id) => format!("/bicycles/{id}"),
            Self::Part(id) => format!("/parts/{id}"),
        }
    }

    const fn bicycle_id(self) -> Option<BicycleId> {
        match self {
            Self::Bicycle(id) => Some(id),
            Self::Part(_) => None,
        }
    }

    const fn part_id(self) -> Option<PartId> {
        match self {
            Self::Part(id) => Some(id),
            Self::Bicycle(_) => None,
        }
    }
}

impl fmt::Display for Merchandise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bicycle(id) => write!(f, "bicycle:{id}"),
            Self::Part(id) => write!(f, "part:{id}"),
        }
    }
}

/// One line of the server-side cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CartItemWire", into = "CartItemWire")]
pub struct CartItem {
    pub id: CartItemId,
    pub merchandise: Merchandise,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    /// Remaining stock as reported by the API, when known.
    pub stock: Option<u32>,
    pub image_url: Option<String>,
}

#[derive(Clone, Serialize, Deserialize)]
struct CartItemWire {
    id: CartItemId,
    #[serde(default)]
    bicycle_id: Option<BicycleId>,
    #[serde(default)]
    part_id: Option<PartId>,
    name: String,
    unit_price: Decimal,
    quantity: u32,
    #[serde(default)]
    stock: Option<u32>,
    #[serde(default)]
    image_url: Option<String>,
}

impl TryFrom<CartItemWire> for CartItem {
    type Error = String;

    fn try_from(wire: CartItemWire) -> Result<Self, Self::Error> {
        Ok(Self {
            id: wire.id,
            merchandise: Merchandise::from_refs(wire.bicycle_id, wire.part_id)?,
            name: wire.name,
            unit_price: wire.unit_price,
            quantity: wire.quantity,
            stock: wire.stock,
            image_url: wire.image_url,
        })
    }
}

impl From<CartItem> for CartItemWire {
    fn from(item: CartItem) -> Self {
        Self {
            id: item.id,
            bicycle_id: item.merchandise.bicycle_id(),
            part_id: item.merchandise.part_id(),
            name: item.name,
            unit_price: item.unit_price,
            quantity: item.quantity,
            stock: item.stock,
            image_url: item.image_url,
        }
    }
}

impl CartItem {
    /// Line total (unit price × quantity).
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// The authoritative server-side cart, returned by every cart endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub subtotal: Decimal,
    #[serde(default)]
    pub item_count: u32,
    #[serde(default)]
    pub currency: CurrencyCode,
}

impl Cart {
    /// Subtotal as a displayable price.
    #[must_use]
    pub const fn subtotal_price(&self) -> Price {
        Price::new(self.subtotal, self.currency)
    }
}

/// Request body for `POST /cart/items`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "CartItemInputWire")]
pub struct CartItemInput {
    pub merchandise: Merchandise,
    pub quantity: u32,
}

#[derive(Serialize)]
struct CartItemInputWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    bicycle_id: Option<BicycleId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    part_id: Option<PartId>,
    quantity: u32,
}

impl From<CartItemInput> for CartItemInputWire {
    fn from(input: CartItemInput) -> Self {
        Self {
            bicycle_id: input.merchandise.bicycle_id(),
            part_id: input.merchandise.part_id(),
            quantity: input.quantity,
        }
    }
}

// =============================================================================
// Wishlist
// =============================================================================

/// A saved bicycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistItem {
    pub id: WishlistItemId,
    pub bicycle_id: BicycleId,
    pub name: String,
    pub price: Decimal,
    pub added_at: DateTime<Utc>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// The authoritative server-side wishlist.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Wishlist {
    #[serde(default)]
    pub items: Vec<WishlistItem>,
}

// =============================================================================
// Bookings
// =============================================================================

/// A workshop service booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub service_id: ServiceId,
    pub service_name: String,
    pub scheduled_for: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: BookingStatus,
    /// Only populated on the admin listing.
    #[serde(default)]
    pub customer_email: Option<String>,
}

/// Request body for `POST /bookings`.
#[derive(Debug, Clone, Serialize)]
pub struct BookingInput {
    pub service_id: ServiceId,
    pub scheduled_for: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// =============================================================================
// Checkout
// =============================================================================

/// Checkout totals computed by the API.
///
/// Cached in the session between the cart and the payment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSummary {
    pub subtotal: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub coupon_ids: Vec<String>,
    #[serde(default)]
    pub shipping: Decimal,
    pub total: Decimal,
    #[serde(default)]
    pub currency: CurrencyCode,
}

impl CheckoutSummary {
    /// Total as a displayable price.
    #[must_use]
    pub const fn total_price(&self) -> Price {
        Price::new(self.total, self.currency)
    }

    /// Whether a coupon took anything off.
    #[must_use]
    pub fn has_discount(&self) -> bool {
        self.discount > Decimal::ZERO
    }
}

/// A payment intent created by the API for the current checkout.
#[derive(Clone, Serialize, Deserialize)]
pub struct CreatedPaymentIntent {
    pub id: String,
    pub client_secret: String,
}

impl fmt::Debug for CreatedPaymentIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatedPaymentIntent")
            .field("id", &self.id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}
