//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::api::{Bicycle, CatalogApi, Service};
use crate::filters;
use crate::middleware::OptionalCustomer;
use crate::models::CurrentCustomer;
use crate::state::AppState;

/// Number of bicycles featured on the home page.
const FEATURED_COUNT: usize = 4;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub customer: Option<CurrentCustomer>,
    pub featured: Vec<Bicycle>,
    pub services: Vec<Service>,
}

/// Pick the bicycles to feature: in stock first, catalog order otherwise.
fn featured(mut bicycles: Vec<Bicycle>) -> Vec<Bicycle> {
    bicycles.sort_by_key(|bicycle| bicycle.stock == 0);
    bicycles.truncate(FEATURED_COUNT);
    bicycles
}

/// Display home page.
///
/// Catalog failures degrade to an empty section rather than an error page.
#[instrument(skip(state, customer))]
pub async fn home(
    State(state): State<AppState>,
    OptionalCustomer(customer): OptionalCustomer,
) -> impl IntoResponse {
    let (bicycles, services) = tokio::join!(state.api().bicycles(), state.api().services());

    let featured = bicycles.map(featured).unwrap_or_else(|e| {
        tracing::warn!("Failed to load featured bicycles: {e}");
        Vec::new()
    });
    let services = services.unwrap_or_else(|e| {
        tracing::warn!("Failed to load services: {e}");
        Vec::new()
    });

    HomeTemplate {
        customer,
        featured,
        services,
    }
}
