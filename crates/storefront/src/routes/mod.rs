//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page (featured bicycles)
//! GET  /health                 - Health check
//!
//! # Catalog
//! GET  /bicycles               - Bicycle listing (?category=)
//! GET  /bicycles/:id           - Bicycle detail
//! GET  /parts                  - Parts listing
//! GET  /parts/:id              - Part detail
//! GET  /services               - Workshop services
//! GET  /search                 - Search page (?q=), fragment for HTMX
//!
//! # Cart (requires auth, HTMX fragments)
//! GET  /cart                   - Cart page
//! POST /cart/add               - Add to cart (returns confirmation, triggers cart-updated)
//! POST /cart/update            - Update quantity (returns cart_items fragment)
//! POST /cart/remove            - Remove item (returns cart_items fragment)
//! POST /cart/clear             - Empty the cart (returns cart_items fragment)
//! GET  /cart/count             - Cart count badge (fragment)
//!
//! # Wishlist (requires auth, HTMX fragments)
//! GET  /wishlist               - Wishlist page
//! POST /wishlist/toggle        - Save/unsave a bicycle (returns toggle button)
//! POST /wishlist/remove        - Remove item (returns wishlist_items fragment)
//! GET  /wishlist/count         - Wishlist count badge (fragment)
//!
//! # Bookings (requires auth)
//! GET  /bookings               - Booking list and form
//! POST /bookings               - Book a service
//! POST /bookings/:id/cancel    - Cancel a booking
//!
//! # Checkout (requires auth)
//! POST /checkout               - Compute summary and create payment intent
//! GET  /checkout/payment       - Payment page
//! POST /checkout/confirm       - Confirm payment (HTMX)
//! GET  /checkout/status        - In-flight status fragment (HTMX polling)
//! GET  /checkout/success       - Order confirmation
//!
//! # Auth
//! GET  /auth/login             - Redirect to identity provider
//! GET  /auth/callback          - Sign-in transition (?token=)
//! POST /auth/logout            - Sign-out transition
//!
//! # Admin (requires admin role)
//! GET  /admin/bookings         - All bookings
//! POST /admin/catalog/refresh  - Drop cached catalog reads
//! ```

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod home;
pub mod search;
pub mod wishlist;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    http::{HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post},
};

use crate::middleware::{checkout_rate_limiter, mutation_rate_limiter};
use crate::state::AppState;
use crate::sync::SyncError;

// =============================================================================
// Shared Helpers
// =============================================================================

/// Inline message fragment for failed HTMX mutations.
#[derive(Template, WebTemplate)]
#[template(path = "partials/flash.html")]
pub struct FlashTemplate {
    pub message: String,
}

/// Whether the request was issued by HTMX.
pub(crate) fn is_htmx(headers: &HeaderMap) -> bool {
    headers.contains_key("hx-request")
}

/// Render a sync failure as an HTMX fragment.
///
/// An expired sign-in sends the whole page to the login redirect; every
/// other failure is shown inline.
pub(crate) fn sync_failure(err: &SyncError) -> Response {
    match err {
        SyncError::AuthRequired(_) => (
            StatusCode::UNAUTHORIZED,
            AppendHeaders([("HX-Redirect", "/auth/login")]),
        )
            .into_response(),
        SyncError::Validation(message) | SyncError::Network(message) => FlashTemplate {
            message: message.clone(),
        }
        .into_response(),
    }
}

/// Parse a quantity submitted by a form.
///
/// Rejects zero, negative, and non-numeric input before it reaches the
/// sync layer.
pub(crate) fn parse_quantity(raw: &str) -> Result<u32, SyncError> {
    match raw.trim().parse::<i64>() {
        Ok(quantity) if quantity >= 1 => u32::try_from(quantity)
            .map_err(|_| SyncError::Validation("That quantity is too large.".to_string())),
        Ok(_) => Err(SyncError::Validation(
            "Quantity must be at least 1.".to_string(),
        )),
        Err(_) => Err(SyncError::Validation(
            "Please enter a whole number.".to_string(),
        )),
    }
}

// =============================================================================
// Routers
// =============================================================================

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/bicycles", get(catalog::bicycles))
        .route("/bicycles/{id}", get(catalog::bicycle))
        .route("/parts", get(catalog::parts))
        .route("/parts/{id}", get(catalog::part))
        .route("/services", get(catalog::services))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    let mutations = Router::new()
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .layer(mutation_rate_limiter());

    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .merge(mutations)
}

/// Create the wishlist routes router.
pub fn wishlist_routes() -> Router<AppState> {
    let mutations = Router::new()
        .route("/toggle", post(wishlist::toggle))
        .route("/remove", post(wishlist::remove))
        .layer(mutation_rate_limiter());

    Router::new()
        .route("/", get(wishlist::show))
        .route("/count", get(wishlist::count))
        .merge(mutations)
}

/// Create the booking routes router.
pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(bookings::index).post(bookings::create))
        .route("/{id}/cancel", post(bookings::cancel))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    let submissions = Router::new()
        .route("/", post(checkout::start))
        .route("/confirm", post(checkout::confirm))
        .layer(checkout_rate_limiter());

    Router::new()
        .route("/payment", get(checkout::payment))
        .route("/status", get(checkout::status))
        .route("/success", get(checkout::success))
        .merge(submissions)
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login))
        .route("/callback", get(auth::callback))
        .route("/logout", post(auth::logout))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/bookings", get(admin::bookings))
        .route("/catalog/refresh", post(admin::refresh_catalog))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Home page
        .route("/", get(home::home))
        // Catalog
        .merge(catalog_routes())
        .route("/search", get(search::search))
        // Customer state
        .nest("/cart", cart_routes())
        .nest("/wishlist", wishlist_routes())
        .nest("/bookings", booking_routes())
        .nest("/checkout", checkout_routes())
        // Identity
        .nest("/auth", auth_routes())
        .nest("/admin", admin_routes())
}
