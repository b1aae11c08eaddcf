//! Sign-in and sign-out route handlers.
//!
//! The hosted identity provider owns credentials. The storefront only:
//! - Login: redirects to the provider with a CSRF state parameter
//! - Callback: verifies the state, resolves the returned token through the
//!   API, and stores the customer in the session
//! - Logout: clears the session and the customer's local cart/wishlist state

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use rand::Rng;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::api::{ApiError, AuthToken};
use crate::error::{AppError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{OptionalCustomer, clear_current_customer, set_current_customer};
use crate::models::{CurrentCustomer, session_keys};
use crate::state::AppState;

/// Query parameters from the identity provider callback.
#[derive(Deserialize)]
pub struct CallbackQuery {
    /// Bearer token for the signed-in customer.
    pub token: Option<String>,
    /// State parameter for CSRF protection.
    pub state: Option<String>,
    /// Error code if sign-in was abandoned or refused.
    pub error: Option<String>,
}

/// Sign-in failure page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/error.html")]
pub struct SignInErrorTemplate {
    pub customer: Option<CurrentCustomer>,
    pub message: String,
}

/// Generate a cryptographically secure random string.
fn generate_state(length: usize) -> String {
    rand::rng()
        .sample_iter(rand::distr::Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Build the provider URL with the callback and state parameters.
fn sign_in_url(provider: &str, base_url: &str, state: &str) -> Result<String> {
    let mut url = url::Url::parse(provider)
        .map_err(|e| AppError::Internal(format!("invalid sign-in URL: {e}")))?;
    url.query_pairs_mut()
        .append_pair("return_to", &format!("{base_url}/auth/callback"))
        .append_pair("state", state);
    Ok(url.into())
}

fn sign_in_failed(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        SignInErrorTemplate {
            customer: None,
            message: message.to_string(),
        },
    )
        .into_response()
}

/// Redirect to the identity provider.
///
/// # Route
///
/// `GET /auth/login`
#[instrument(skip(state, session))]
pub async fn login(State(state): State<AppState>, session: Session) -> Result<Redirect> {
    let csrf_state = generate_state(32);
    session
        .insert(session_keys::SIGN_IN_STATE, &csrf_state)
        .await?;

    let config = state.config();
    let url = sign_in_url(&config.identity.sign_in_url, &config.base_url, &csrf_state)?;
    Ok(Redirect::to(&url))
}

/// Handle the identity provider callback (sign-in transition).
///
/// # Route
///
/// `GET /auth/callback?token=...&state=...`
#[instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Result<Response> {
    if let Some(error) = query.error {
        tracing::warn!("Identity provider returned error: {error}");
        return Ok(sign_in_failed("Sign-in was cancelled. Please try again."));
    }

    let stored_state = session
        .remove::<String>(session_keys::SIGN_IN_STATE)
        .await?;
    if stored_state.is_none() || stored_state != query.state {
        tracing::warn!("Sign-in state mismatch");
        return Ok(sign_in_failed("Your sign-in link expired. Please try again."));
    }

    let Some(token) = query.token.filter(|t| !t.trim().is_empty()) else {
        tracing::warn!("Sign-in callback missing token");
        return Ok(sign_in_failed("Sign-in did not complete. Please try again."));
    };
    let token = AuthToken::new(token);

    let customer = match state.api().current_customer(&token).await {
        Ok(customer) => customer,
        Err(ApiError::Unauthorized) => {
            return Ok(sign_in_failed("We couldn't verify your sign-in. Please try again."));
        }
        Err(e) => return Err(e.into()),
    };

    // Fresh session id on privilege change
    session.cycle_id().await?;

    let customer = CurrentCustomer::new(customer, token);
    set_current_customer(&session, &customer).await?;
    set_sentry_user(&customer.id, Some(&customer.email));
    add_breadcrumb("auth", "Signed in", None);
    tracing::info!(customer_id = %customer.id, role = %customer.role, "Customer signed in");

    Ok(Redirect::to("/").into_response())
}

/// Sign out (sign-out transition).
///
/// Local cart and wishlist state is dropped unconditionally, even when a
/// mutation is still in flight.
///
/// # Route
///
/// `POST /auth/logout`
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    OptionalCustomer(customer): OptionalCustomer,
    session: Session,
) -> Result<Redirect> {
    if let Some(customer) = customer {
        state.stores().sign_out(customer.id);
        tracing::info!(customer_id = %customer.id, "Customer signed out");
    }

    clear_current_customer(&session).await?;
    clear_sentry_user();

    Ok(Redirect::to("/"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_state() {
        let a = generate_state(32);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, generate_state(32));
    }

    #[test]
    fn test_sign_in_url_carries_callback_and_state() {
        let url = sign_in_url(
            "https://id.chainline.bike/sign-in?brand=chainline",
            "https://shop.chainline.bike",
            "abc123",
        )
        .unwrap();
        let parsed = url::Url::parse(&url).unwrap();
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("brand".to_string(), "chainline".to_string()),
                (
                    "return_to".to_string(),
                    "https://shop.chainline.bike/auth/callback".to_string()
                ),
                ("state".to_string(), "abc123".to_string()),
            ]
        );
    }

    #[test]
    fn test_sign_in_url_rejects_garbage() {
        assert!(sign_in_url("not a url", "https://shop", "s").is_err());
    }
}
