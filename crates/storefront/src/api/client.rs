//! HTTP implementation of the remote API client.
//!
//! Uses `reqwest` with a shared connection pool. Catalog reads go through a
//! `moka` cache (5-minute TTL); everything owned by a customer is fetched
//! fresh on every call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chainline_core::{BicycleId, BookingId, CartItemId, PartId, WishlistItemId};
use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::cache::{CacheKey, CacheValue};
use super::types::{
    AuthToken, Bicycle, Booking, BookingInput, Cart, CartItemInput, CheckoutSummary,
    CreatedPaymentIntent, Customer, Part, SearchResults, Service, Wishlist,
};
use super::{ApiError, CartApi, CatalogApi, WishlistApi};
use crate::config::ApiConfig;

/// Error body shapes the API uses (`{"detail": ...}` or `{"error": ...}`).
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
    error: Option<String>,
    message: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.detail.or(self.error).or(self.message)
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the Chainline remote API.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: String,
    cache: Cache<CacheKey, CacheValue>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("chainline-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                cache,
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.inner.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str, token: Option<&AuthToken>) -> RequestBuilder {
        let builder = self
            .inner
            .client
            .request(method, self.url(path))
            .header("Accept", "application/json");
        match token {
            Some(token) => builder.bearer_auth(token.expose()),
            None => builder,
        }
    }

    /// Send a request and decode the JSON body, mapping error statuses.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(error_for_status(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse API response"
            );
            ApiError::Parse(e)
        })
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Resolve a bearer token to the signed-in customer.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` if the token is not valid.
    #[instrument(skip(self, token))]
    pub async fn current_customer(&self, token: &AuthToken) -> Result<Customer, ApiError> {
        self.send(self.request(Method::GET, "auth/me", Some(token)))
            .await
    }

    /// Lightweight reachability check used by the readiness probe.
    ///
    /// # Errors
    ///
    /// Returns an error if the API cannot be reached.
    pub async fn ping(&self) -> Result<(), ApiError> {
        let response = self.request(Method::GET, "health", None).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ApiError::Api {
                status: response.status().as_u16(),
                message: "health check failed".to_string(),
            })
        }
    }

    // =========================================================================
    // Bookings
    // =========================================================================

    /// List the customer's service bookings.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn bookings(&self, token: &AuthToken) -> Result<Vec<Booking>, ApiError> {
        self.send(self.request(Method::GET, "bookings", Some(token)))
            .await
    }

    /// Book a workshop service.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` if the slot is unavailable.
    #[instrument(skip(self, token), fields(service_id = %input.service_id))]
    pub async fn create_booking(
        &self,
        token: &AuthToken,
        input: &BookingInput,
    ) -> Result<Booking, ApiError> {
        self.send(
            self.request(Method::POST, "bookings", Some(token))
                .json(input),
        )
        .await
    }

    /// Cancel one of the customer's bookings.
    ///
    /// # Errors
    ///
    /// Returns an error if the booking does not exist or cannot be canceled.
    #[instrument(skip(self, token))]
    pub async fn cancel_booking(
        &self,
        token: &AuthToken,
        booking_id: BookingId,
    ) -> Result<Booking, ApiError> {
        self.send(self.request(
            Method::POST,
            &format!("bookings/{booking_id}/cancel"),
            Some(token),
        ))
        .await
    }

    /// List every booking (admin role only; the API enforces the role too).
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` for non-admin tokens.
    #[instrument(skip(self, token))]
    pub async fn all_bookings(&self, token: &AuthToken) -> Result<Vec<Booking>, ApiError> {
        self.send(self.request(Method::GET, "admin/bookings", Some(token)))
            .await
    }

    // =========================================================================
    // Search & Checkout
    // =========================================================================

    /// Full-text search across bicycles, parts, and services.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<SearchResults, ApiError> {
        let mut url = url::Url::parse(&self.url("search"))?;
        url.query_pairs_mut().append_pair("q", query);

        self.send(
            self.inner
                .client
                .get(url)
                .header("Accept", "application/json"),
        )
        .await
    }

    /// Compute checkout totals for the customer's cart, applying an optional coupon.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` for unknown or expired coupons.
    #[instrument(skip(self, token))]
    pub async fn checkout_summary(
        &self,
        token: &AuthToken,
        coupon_code: Option<&str>,
    ) -> Result<CheckoutSummary, ApiError> {
        let body = serde_json::json!({ "coupon_code": coupon_code });
        self.send(
            self.request(Method::POST, "checkout/summary", Some(token))
                .json(&body),
        )
        .await
    }

    /// Create the payment intent for the current checkout.
    ///
    /// The API derives the amount from the cart and coupons server-side.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token, summary))]
    pub async fn create_payment_intent(
        &self,
        token: &AuthToken,
        summary: &CheckoutSummary,
    ) -> Result<CreatedPaymentIntent, ApiError> {
        let body = serde_json::json!({ "coupon_ids": summary.coupon_ids });
        self.send(
            self.request(Method::POST, "checkout/payment-intent", Some(token))
                .json(&body),
        )
        .await
    }

    // =========================================================================
    // Cache Management
    // =========================================================================

    /// Drop all cached catalog entries.
    pub async fn invalidate_catalog(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}

/// Map a non-success status and body to an `ApiError`.
fn error_for_status(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| body.chars().take(200).collect());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized,
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            ApiError::Validation(message)
        }
        _ => {
            tracing::error!(status = %status, message = %message, "API returned non-success status");
            ApiError::Api {
                status: status.as_u16(),
                message,
            }
        }
    }
}

// =============================================================================
// Cart / Wishlist / Catalog
// =============================================================================

#[async_trait]
impl CartApi for ApiClient {
    #[instrument(skip(self, token))]
    async fn fetch_cart(&self, token: &AuthToken) -> Result<Cart, ApiError> {
        self.send(self.request(Method::GET, "cart", Some(token)))
            .await
    }

    #[instrument(skip(self, token), fields(merchandise = %input.merchandise))]
    async fn add_cart_item(
        &self,
        token: &AuthToken,
        input: CartItemInput,
    ) -> Result<Cart, ApiError> {
        self.send(
            self.request(Method::POST, "cart/items", Some(token))
                .json(&input),
        )
        .await
    }

    #[instrument(skip(self, token))]
    async fn update_cart_item(
        &self,
        token: &AuthToken,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<Cart, ApiError> {
        let body = serde_json::json!({ "quantity": quantity });
        self.send(
            self.request(Method::PATCH, &format!("cart/items/{item_id}"), Some(token))
                .json(&body),
        )
        .await
    }

    #[instrument(skip(self, token))]
    async fn remove_cart_item(
        &self,
        token: &AuthToken,
        item_id: CartItemId,
    ) -> Result<Cart, ApiError> {
        self.send(self.request(
            Method::DELETE,
            &format!("cart/items/{item_id}"),
            Some(token),
        ))
        .await
    }

    #[instrument(skip(self, token))]
    async fn clear_cart(&self, token: &AuthToken) -> Result<Cart, ApiError> {
        self.send(self.request(Method::DELETE, "cart", Some(token)))
            .await
    }
}

#[async_trait]
impl WishlistApi for ApiClient {
    #[instrument(skip(self, token))]
    async fn fetch_wishlist(&self, token: &AuthToken) -> Result<Wishlist, ApiError> {
        self.send(self.request(Method::GET, "wishlist", Some(token)))
            .await
    }

    #[instrument(skip(self, token))]
    async fn add_wishlist_item(
        &self,
        token: &AuthToken,
        bicycle_id: BicycleId,
    ) -> Result<Wishlist, ApiError> {
        let body = serde_json::json!({ "bicycle_id": bicycle_id });
        self.send(
            self.request(Method::POST, "wishlist/items", Some(token))
                .json(&body),
        )
        .await
    }

    #[instrument(skip(self, token))]
    async fn remove_wishlist_item(
        &self,
        token: &AuthToken,
        item_id: WishlistItemId,
    ) -> Result<Wishlist, ApiError> {
        self.send(self.request(
            Method::DELETE,
            &format!("wishlist/items/{item_id}"),
            Some(token),
        ))
        .await
    }
}

#[async_trait]
impl CatalogApi for ApiClient {
    #[instrument(skip(self))]
    async fn bicycles(&self) -> Result<Vec<Bicycle>, ApiError> {
        if let Some(CacheValue::Bicycles(bicycles)) =
            self.inner.cache.get(&CacheKey::Bicycles).await
        {
            debug!("Cache hit for bicycles");
            return Ok(bicycles);
        }

        let bicycles: Vec<Bicycle> = self.send(self.request(Method::GET, "bicycles", None)).await?;
        self.inner
            .cache
            .insert(CacheKey::Bicycles, CacheValue::Bicycles(bicycles.clone()))
            .await;
        Ok(bicycles)
    }

    #[instrument(skip(self))]
    async fn bicycle(&self, id: BicycleId) -> Result<Bicycle, ApiError> {
        let key = CacheKey::Bicycle(id);
        if let Some(CacheValue::Bicycle(bicycle)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for bicycle");
            return Ok(*bicycle);
        }

        let bicycle: Bicycle = self
            .send(self.request(Method::GET, &format!("bicycles/{id}"), None))
            .await?;
        self.inner
            .cache
            .insert(key, CacheValue::Bicycle(Box::new(bicycle.clone())))
            .await;
        Ok(bicycle)
    }

    #[instrument(skip(self))]
    async fn parts(&self) -> Result<Vec<Part>, ApiError> {
        if let Some(CacheValue::Parts(parts)) = self.inner.cache.get(&CacheKey::Parts).await {
            debug!("Cache hit for parts");
            return Ok(parts);
        }

        let parts: Vec<Part> = self.send(self.request(Method::GET, "parts", None)).await?;
        self.inner
            .cache
            .insert(CacheKey::Parts, CacheValue::Parts(parts.clone()))
            .await;
        Ok(parts)
    }

    #[instrument(skip(self))]
    async fn part(&self, id: PartId) -> Result<Part, ApiError> {
        let key = CacheKey::Part(id);
        if let Some(CacheValue::Part(part)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for part");
            return Ok(*part);
        }

        let part: Part = self
            .send(self.request(Method::GET, &format!("parts/{id}"), None))
            .await?;
        self.inner
            .cache
            .insert(key, CacheValue::Part(Box::new(part.clone())))
            .await;
        Ok(part)
    }

    #[instrument(skip(self))]
    async fn services(&self) -> Result<Vec<Service>, ApiError> {
        if let Some(CacheValue::Services(services)) =
            self.inner.cache.get(&CacheKey::Services).await
        {
            debug!("Cache hit for services");
            return Ok(services);
        }

        let services: Vec<Service> = self.send(self.request(Method::GET, "services", None)).await?;
        self.inner
            .cache
            .insert(CacheKey::Services, CacheValue::Services(services.clone()))
            .await;
        Ok(services)
    }
}
