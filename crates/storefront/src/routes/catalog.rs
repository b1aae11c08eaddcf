//! Catalog route handlers: bicycles, parts, and workshop services.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chainline_core::{BicycleId, PartId};
use serde::Deserialize;
use tracing::instrument;

use crate::api::{Bicycle, CatalogApi, Part, Service};
use crate::error::Result;
use crate::filters;
use crate::middleware::OptionalCustomer;
use crate::models::CurrentCustomer;
use crate::state::AppState;
use crate::sync::WishlistSync;

/// Category filter for listings.
#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    pub category: Option<String>,
}

/// Bicycle listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "catalog/bicycles.html")]
pub struct BicyclesTemplate {
    pub customer: Option<CurrentCustomer>,
    pub bicycles: Vec<Bicycle>,
    pub categories: Vec<String>,
    pub category: Option<String>,
}

/// Bicycle detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "catalog/bicycle.html")]
pub struct BicycleTemplate {
    pub customer: Option<CurrentCustomer>,
    pub bicycle: Bicycle,
    pub in_wishlist: bool,
    pub compatible_parts: Vec<Part>,
}

/// Parts listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "catalog/parts.html")]
pub struct PartsTemplate {
    pub customer: Option<CurrentCustomer>,
    pub parts: Vec<Part>,
    pub categories: Vec<String>,
    pub category: Option<String>,
}

/// Part detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "catalog/part.html")]
pub struct PartTemplate {
    pub customer: Option<CurrentCustomer>,
    pub part: Part,
}

/// Workshop services page template.
#[derive(Template, WebTemplate)]
#[template(path = "catalog/services.html")]
pub struct ServicesTemplate {
    pub customer: Option<CurrentCustomer>,
    pub services: Vec<Service>,
}

// =============================================================================
// Filtering
// =============================================================================

/// Distinct categories in first-seen order.
fn categories<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for name in names {
        if !seen.iter().any(|s| s.eq_ignore_ascii_case(name)) {
            seen.push(name.to_string());
        }
    }
    seen
}

/// Normalize the `?category=` value; blank means no filter.
fn selected(query: CategoryQuery) -> Option<String> {
    query
        .category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

fn matches_category(category: &str, selected: Option<&str>) -> bool {
    selected.is_none_or(|wanted| category.eq_ignore_ascii_case(wanted))
}

// =============================================================================
// Handlers
// =============================================================================

/// Display bicycle listing.
#[instrument(skip(state, customer))]
pub async fn bicycles(
    State(state): State<AppState>,
    OptionalCustomer(customer): OptionalCustomer,
    Query(query): Query<CategoryQuery>,
) -> Result<impl IntoResponse> {
    let all = state.api().bicycles().await?;
    let category = selected(query);
    let categories = categories(all.iter().map(|b| b.category.as_str()));
    let bicycles = all
        .into_iter()
        .filter(|b| matches_category(&b.category, category.as_deref()))
        .collect();

    Ok(BicyclesTemplate {
        customer,
        bicycles,
        categories,
        category,
    })
}

/// Display bicycle detail.
///
/// Signed-in customers see whether the bicycle is already in their wishlist.
#[instrument(skip(state, customer))]
pub async fn bicycle(
    State(state): State<AppState>,
    OptionalCustomer(customer): OptionalCustomer,
    Path(id): Path<BicycleId>,
) -> Result<impl IntoResponse> {
    let bicycle = state.api().bicycle(id).await?;

    let in_wishlist = match &customer {
        Some(customer) => {
            let store = state.store_for(customer.id);
            let sync = WishlistSync::new(state.api(), &store, &customer.token);
            match sync.snapshot().await {
                Ok(wishlist) => wishlist.contains(id),
                Err(e) => {
                    tracing::warn!("Failed to load wishlist for bicycle page: {e}");
                    false
                }
            }
        }
        None => false,
    };

    let compatible_parts = match state.api().parts().await {
        Ok(parts) => parts
            .into_iter()
            .filter(|p| {
                p.compatibility
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(&bicycle.category))
            })
            .take(6)
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to load compatible parts: {e}");
            Vec::new()
        }
    };

    Ok(BicycleTemplate {
        customer,
        bicycle,
        in_wishlist,
        compatible_parts,
    })
}

/// Display parts listing.
#[instrument(skip(state, customer))]
pub async fn parts(
    State(state): State<AppState>,
    OptionalCustomer(customer): OptionalCustomer,
    Query(query): Query<CategoryQuery>,
) -> Result<impl IntoResponse> {
    let all = state.api().parts().await?;
    let category = selected(query);
    let categories = categories(all.iter().map(|p| p.category.as_str()));
    let parts = all
        .into_iter()
        .filter(|p| matches_category(&p.category, category.as_deref()))
        .collect();

    Ok(PartsTemplate {
        customer,
        parts,
        categories,
        category,
    })
}

/// Display part detail.
#[instrument(skip(state, customer))]
pub async fn part(
    State(state): State<AppState>,
    OptionalCustomer(customer): OptionalCustomer,
    Path(id): Path<PartId>,
) -> Result<impl IntoResponse> {
    let part = state.api().part(id).await?;
    Ok(PartTemplate { customer, part })
}

/// Display workshop services.
#[instrument(skip(state, customer))]
pub async fn services(
    State(state): State<AppState>,
    OptionalCustomer(customer): OptionalCustomer,
) -> Result<impl IntoResponse> {
    let services = state.api().services().await?;
    Ok(ServicesTemplate { customer, services })
}
