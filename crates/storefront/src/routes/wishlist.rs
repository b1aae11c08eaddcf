//! Wishlist route handlers.
//!
//! Like the cart, every change goes through the sync layer and comes back as
//! an HTMX fragment plus a `wishlist-updated` trigger for the count badge.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use chainline_core::{BicycleId, WishlistItemId};
use serde::Deserialize;
use tracing::instrument;

use super::sync_failure;
use crate::filters;
use crate::middleware::{OptionalCustomer, RequireCustomer};
use crate::models::CurrentCustomer;
use crate::state::AppState;
use crate::store::{LocalStore, LocalWishlist};
use crate::sync::{SyncError, WishlistSync};

/// Toggle form data.
#[derive(Debug, Deserialize)]
pub struct ToggleForm {
    pub bicycle_id: BicycleId,
}

/// Remove form data.
#[derive(Debug, Deserialize)]
pub struct RemoveForm {
    pub item_id: WishlistItemId,
}

/// Wishlist page template.
#[derive(Template, WebTemplate)]
#[template(path = "wishlist/show.html")]
pub struct WishlistShowTemplate {
    pub customer: Option<CurrentCustomer>,
    pub wishlist: LocalWishlist,
    pub error: Option<String>,
}

/// Wishlist items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/wishlist_items.html")]
pub struct WishlistItemsTemplate {
    pub wishlist: LocalWishlist,
    pub error: Option<String>,
}

/// Save/unsave button fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/wishlist_button.html")]
pub struct WishlistButtonTemplate {
    pub bicycle_id: BicycleId,
    pub in_wishlist: bool,
    pub error: Option<String>,
}

/// Wishlist count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/wishlist_count.html")]
pub struct WishlistCountTemplate {
    pub count: usize,
}

fn current_wishlist(store: &LocalStore) -> LocalWishlist {
    store.wishlist().value().cloned().unwrap_or_default()
}

/// Display wishlist page.
#[instrument(skip(state, customer), fields(customer_id = %customer.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Response {
    let store = state.store_for(customer.id);
    let sync = WishlistSync::new(state.api(), &store, &customer.token);

    let (wishlist, error) = match sync.snapshot().await {
        Ok(wishlist) => (wishlist, None),
        Err(SyncError::AuthRequired(_)) => return Redirect::to("/auth/login").into_response(),
        Err(e) => {
            tracing::warn!("Failed to load wishlist: {e}");
            (current_wishlist(&store), Some(e.message().to_string()))
        }
    };

    WishlistShowTemplate {
        customer: Some(customer),
        wishlist,
        error,
    }
    .into_response()
}

/// Save or unsave a bicycle (HTMX).
///
/// Returns the button in its new state.
#[instrument(skip(state, customer), fields(customer_id = %customer.id))]
pub async fn toggle(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Form(form): Form<ToggleForm>,
) -> Response {
    let store = state.store_for(customer.id);
    let sync = WishlistSync::new(state.api(), &store, &customer.token);

    match sync.toggle(form.bicycle_id).await {
        Ok(wishlist) => (
            AppendHeaders([("HX-Trigger", "wishlist-updated")]),
            WishlistButtonTemplate {
                bicycle_id: form.bicycle_id,
                in_wishlist: wishlist.contains(form.bicycle_id),
                error: None,
            },
        )
            .into_response(),
        Err(err @ SyncError::AuthRequired(_)) => sync_failure(&err),
        Err(err) => {
            tracing::warn!(bicycle_id = %form.bicycle_id, "Wishlist toggle failed: {err}");
            (
                AppendHeaders([("HX-Trigger", "wishlist-updated")]),
                WishlistButtonTemplate {
                    bicycle_id: form.bicycle_id,
                    in_wishlist: sync.is_in_wishlist(form.bicycle_id),
                    error: Some(err.message().to_string()),
                },
            )
                .into_response()
        }
    }
}

/// Remove a saved bicycle (HTMX).
#[instrument(skip(state, customer), fields(customer_id = %customer.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Form(form): Form<RemoveForm>,
) -> Response {
    let store = state.store_for(customer.id);
    let sync = WishlistSync::new(state.api(), &store, &customer.token);

    let (wishlist, error) = match sync.remove(form.item_id).await {
        Ok(wishlist) => (wishlist, None),
        Err(err @ SyncError::AuthRequired(_)) => return sync_failure(&err),
        Err(err) => {
            tracing::warn!("Wishlist remove failed: {err}");
            (current_wishlist(&store), Some(err.message().to_string()))
        }
    };

    (
        AppendHeaders([("HX-Trigger", "wishlist-updated")]),
        WishlistItemsTemplate { wishlist, error },
    )
        .into_response()
}

/// Get wishlist count badge (HTMX).
#[instrument(skip(state, customer))]
pub async fn count(
    State(state): State<AppState>,
    OptionalCustomer(customer): OptionalCustomer,
) -> impl IntoResponse {
    let count = match customer {
        Some(customer) => {
            let store = state.store_for(customer.id);
            let sync = WishlistSync::new(state.api(), &store, &customer.token);
            match sync.snapshot().await {
                Ok(wishlist) => wishlist.len(),
                Err(_) => sync.count(),
            }
        }
        None => 0,
    };

    WishlistCountTemplate { count }
}
