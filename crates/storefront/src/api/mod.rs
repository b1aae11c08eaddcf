//! Client for the Chainline remote API.
//!
//! # Architecture
//!
//! - Plain REST/JSON over `reqwest`, bearer-token auth per customer
//! - The remote API is the source of truth for cart, wishlist, bookings, and
//!   catalog data; the storefront keeps no database of its own
//! - Catalog reads are cached in memory via `moka` (5 minute TTL), keyed by
//!   resource identity
//! - Every cart and wishlist mutation returns the full authoritative
//!   cart/wishlist, which the sync layer uses to reconcile local state
//!
//! The [`CartApi`], [`WishlistApi`], and [`CatalogApi`] traits are the seam
//! the sync layer depends on, so it can be exercised against in-process fakes.
//!
//! # Example
//!
//! ```rust,ignore
//! use chainline_storefront::api::{ApiClient, CartApi};
//!
//! let client = ApiClient::new(&config.api)?;
//! let cart = client.fetch_cart(&token).await?;
//! ```

mod cache;
mod client;
pub mod types;

pub use client::ApiClient;
pub use types::*;

use async_trait::async_trait;
use chainline_core::{BicycleId, CartItemId, PartId, WishlistItemId};
use thiserror::Error;

/// Errors that can occur when talking to the remote API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failed (connection refused, timeout, TLS, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API rejected the request as invalid (e.g., stock exceeded).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Missing, expired, or insufficient credentials.
    #[error("Authentication required")]
    Unauthorized,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configured base URL or a built request URL is invalid.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Whether the failure happened before the API could answer.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

/// Cart endpoints.
///
/// Every method returns the full cart as the API sees it after the call.
#[async_trait]
pub trait CartApi: Send + Sync {
    /// `GET /cart`
    async fn fetch_cart(&self, token: &AuthToken) -> Result<Cart, ApiError>;

    /// `POST /cart/items`
    async fn add_cart_item(&self, token: &AuthToken, input: CartItemInput)
    -> Result<Cart, ApiError>;

    /// `PATCH /cart/items/{id}`
    async fn update_cart_item(
        &self,
        token: &AuthToken,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<Cart, ApiError>;

    /// `DELETE /cart/items/{id}`
    async fn remove_cart_item(&self, token: &AuthToken, item_id: CartItemId)
    -> Result<Cart, ApiError>;

    /// `DELETE /cart`
    async fn clear_cart(&self, token: &AuthToken) -> Result<Cart, ApiError>;
}

/// Wishlist endpoints.
///
/// Every method returns the full wishlist as the API sees it after the call.
#[async_trait]
pub trait WishlistApi: Send + Sync {
    /// `GET /wishlist`
    async fn fetch_wishlist(&self, token: &AuthToken) -> Result<Wishlist, ApiError>;

    /// `POST /wishlist/items`
    async fn add_wishlist_item(
        &self,
        token: &AuthToken,
        bicycle_id: BicycleId,
    ) -> Result<Wishlist, ApiError>;

    /// `DELETE /wishlist/items/{id}`
    async fn remove_wishlist_item(
        &self,
        token: &AuthToken,
        item_id: WishlistItemId,
    ) -> Result<Wishlist, ApiError>;
}

/// Public catalog reads.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// `GET /bicycles`
    async fn bicycles(&self) -> Result<Vec<Bicycle>, ApiError>;

    /// `GET /bicycles/{id}`
    async fn bicycle(&self, id: BicycleId) -> Result<Bicycle, ApiError>;

    /// `GET /parts`
    async fn parts(&self) -> Result<Vec<Part>, ApiError>;

    /// `GET /parts/{id}`
    async fn part(&self, id: PartId) -> Result<Part, ApiError>;

    /// `GET /services`
    async fn services(&self) -> Result<Vec<Service>, ApiError>;
}
