//! Cart route handlers.
//!
//! Cart operations use HTMX for dynamic updates without full page reloads.
//! Every mutation goes through [`CartSync`], which updates the customer's
//! local snapshot first and reconciles it with the API's answer.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use chainline_core::{BicycleId, CartItemId, PartId};
use serde::Deserialize;
use tracing::instrument;

use super::{FlashTemplate, parse_quantity, sync_failure};
use crate::api::Merchandise;
use crate::error::add_breadcrumb;
use crate::filters;
use crate::middleware::{OptionalCustomer, RequireCustomer};
use crate::models::CurrentCustomer;
use crate::state::AppState;
use crate::store::{LocalCart, LocalStore};
use crate::sync::{CartSync, SyncError};

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    /// `bicycle` or `part`.
    pub kind: String,
    pub id: i32,
    pub quantity: Option<String>,
}

/// Update cart form data.
///
/// The quantity stays a string so negative or malformed input is rejected
/// with a message instead of a deserialization error.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub line_id: CartItemId,
    pub quantity: String,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub line_id: CartItemId,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub customer: Option<CurrentCustomer>,
    pub cart: LocalCart,
    pub error: Option<String>,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: LocalCart,
    pub error: Option<String>,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

// =============================================================================
// Helpers
// =============================================================================

fn merchandise(kind: &str, id: i32) -> Result<Merchandise, SyncError> {
    match kind {
        "bicycle" => Ok(Merchandise::Bicycle(BicycleId::new(id))),
        "part" => Ok(Merchandise::Part(PartId::new(id))),
        _ => Err(SyncError::Validation(
            "That product is no longer available.".to_string(),
        )),
    }
}

/// Enforce the stock the API last reported for a line.
fn check_stock(cart: &LocalCart, line_id: CartItemId, quantity: u32) -> Result<(), SyncError> {
    match cart.line(line_id) {
        Some(line) => match line.stock {
            Some(stock) if quantity > stock => Err(SyncError::Validation(format!(
                "Only {stock} of {} left in stock.",
                line.name
            ))),
            _ => Ok(()),
        },
        None => Err(SyncError::Validation(
            "That item is no longer in your cart.".to_string(),
        )),
    }
}

/// The cart as the store currently holds it.
fn current_cart(store: &LocalStore) -> LocalCart {
    store.cart().value().cloned().unwrap_or_default()
}

/// Render the cart items fragment for a finished mutation.
fn items_response(store: &LocalStore, result: Result<LocalCart, SyncError>) -> Response {
    match result {
        Ok(cart) => (
            AppendHeaders([("HX-Trigger", "cart-updated")]),
            CartItemsTemplate { cart, error: None },
        )
            .into_response(),
        Err(err @ SyncError::AuthRequired(_)) => sync_failure(&err),
        Err(err) => {
            tracing::warn!("Cart mutation failed: {err}");
            (
                AppendHeaders([("HX-Trigger", "cart-updated")]),
                CartItemsTemplate {
                    cart: current_cart(store),
                    error: Some(err.message().to_string()),
                },
            )
                .into_response()
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart page.
#[instrument(skip(state, customer), fields(customer_id = %customer.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Response {
    let store = state.store_for(customer.id);
    let sync = CartSync::new(state.api(), &store, &customer.token);

    let (cart, error) = match sync.snapshot().await {
        Ok(cart) => (cart, None),
        Err(SyncError::AuthRequired(_)) => return Redirect::to("/auth/login").into_response(),
        Err(e) => {
            tracing::warn!("Failed to load cart: {e}");
            (current_cart(&store), Some(e.message().to_string()))
        }
    };

    CartShowTemplate {
        customer: Some(customer),
        cart,
        error,
    }
    .into_response()
}

/// Add item to cart (HTMX).
///
/// Returns a confirmation with an HTMX trigger so the count badge refreshes.
#[instrument(skip(state, customer), fields(customer_id = %customer.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Form(form): Form<AddToCartForm>,
) -> Response {
    let parsed = merchandise(&form.kind, form.id).and_then(|merchandise| {
        let quantity = form.quantity.as_deref().map_or(Ok(1), parse_quantity)?;
        Ok((merchandise, quantity))
    });
    let (merchandise, quantity) = match parsed {
        Ok(parsed) => parsed,
        Err(err) => return sync_failure(&err),
    };

    let store = state.store_for(customer.id);
    let sync = CartSync::new(state.api(), &store, &customer.token);

    match sync.add(merchandise, quantity).await {
        Ok(cart) => {
            let label = merchandise.to_string();
            add_breadcrumb("cart", "Added to cart", Some(&[("merchandise", label.as_str())]));
            (
                AppendHeaders([("HX-Trigger", "cart-updated")]),
                FlashTemplate {
                    message: format!("Added to your cart ({} in cart).", cart.item_count),
                },
            )
                .into_response()
        }
        Err(err) => {
            tracing::warn!("Failed to add {merchandise} to cart: {err}");
            sync_failure(&err)
        }
    }
}

/// Update cart item quantity (HTMX).
#[instrument(skip(state, customer), fields(customer_id = %customer.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Form(form): Form<UpdateCartForm>,
) -> Response {
    let store = state.store_for(customer.id);
    let sync = CartSync::new(state.api(), &store, &customer.token);

    let checked = parse_quantity(&form.quantity).and_then(|quantity| {
        check_stock(&current_cart(&store), form.line_id, quantity).map(|()| quantity)
    });
    let result = match checked {
        Ok(quantity) => sync.update_quantity(form.line_id, quantity).await,
        Err(err) => Err(err),
    };

    items_response(&store, result)
}

/// Remove item from cart (HTMX).
#[instrument(skip(state, customer), fields(customer_id = %customer.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Form(form): Form<RemoveFromCartForm>,
) -> Response {
    let store = state.store_for(customer.id);
    let sync = CartSync::new(state.api(), &store, &customer.token);
    let result = sync.remove(form.line_id).await;
    items_response(&store, result)
}

/// Empty the cart (HTMX).
#[instrument(skip(state, customer), fields(customer_id = %customer.id))]
pub async fn clear(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Response {
    let store = state.store_for(customer.id);
    let sync = CartSync::new(state.api(), &store, &customer.token);
    let result = sync.clear().await;
    items_response(&store, result)
}

/// Get cart count badge (HTMX).
///
/// Signed-out visitors always see zero.
#[instrument(skip(state, customer))]
pub async fn count(
    State(state): State<AppState>,
    OptionalCustomer(customer): OptionalCustomer,
) -> impl IntoResponse {
    let count = match customer {
        Some(customer) => {
            let store = state.store_for(customer.id);
            let sync = CartSync::new(state.api(), &store, &customer.token);
            match sync.snapshot().await {
                Ok(cart) => cart.item_count,
                Err(_) => sync.count(),
            }
        }
        None => 0,
    };

    CartCountTemplate { count }
}
