//! Search route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use super::is_htmx;
use crate::api::SearchResults;
use crate::filters;
use crate::middleware::OptionalCustomer;
use crate::models::CurrentCustomer;
use crate::state::AppState;

/// Longest query forwarded to the API.
const MAX_QUERY_CHARS: usize = 100;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Search results fragment (HTMX live search).
#[derive(Template, WebTemplate)]
#[template(path = "partials/search_results.html")]
pub struct SearchResultsTemplate {
    pub query: String,
    pub results: SearchResults,
    pub error: Option<String>,
}

/// Full search page template.
#[derive(Template, WebTemplate)]
#[template(path = "search.html")]
pub struct SearchPageTemplate {
    pub customer: Option<CurrentCustomer>,
    pub query: String,
    pub results: SearchResults,
    pub error: Option<String>,
}

/// Trim and bound the raw query.
fn normalize(raw: &str) -> String {
    raw.trim().chars().take(MAX_QUERY_CHARS).collect()
}

/// Search bicycles, parts, and services.
///
/// Returns the results fragment for HTMX requests and the full page
/// otherwise. An empty query renders no results without calling the API.
#[instrument(skip(state, customer, headers))]
pub async fn search(
    State(state): State<AppState>,
    OptionalCustomer(customer): OptionalCustomer,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Response {
    let query = normalize(&query.q);

    let (results, error) = if query.is_empty() {
        (SearchResults::default(), None)
    } else {
        match state.api().search(&query).await {
            Ok(results) => (results, None),
            Err(e) => {
                tracing::warn!("Search failed: {e}");
                (
                    SearchResults::default(),
                    Some("Search is unavailable right now. Please try again.".to_string()),
                )
            }
        }
    };

    if is_htmx(&headers) {
        SearchResultsTemplate {
            query,
            results,
            error,
        }
        .into_response()
    } else {
        SearchPageTemplate {
            customer,
            query,
            results,
            error,
        }
        .into_response()
    }
}
