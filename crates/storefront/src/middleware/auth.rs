//! Authentication extractors.
//!
//! The identity provider signs customers in; the storefront only reads the
//! signed-in flag (a `CurrentCustomer` in the session) and the role claim.

use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{CurrentCustomer, session_keys};

/// Extractor that requires a signed-in customer.
///
/// Page requests are redirected to `/auth/login`; HTMX requests get a 401
/// with an `HX-Redirect` header so the whole page navigates.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireCustomer(customer): RequireCustomer,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", customer.display_name())
/// }
/// ```
pub struct RequireCustomer(pub CurrentCustomer);

/// Extractor that requires a signed-in customer with the admin role.
pub struct RequireAdmin(pub CurrentCustomer);

/// Error returned when a route's access requirements are not met.
pub enum AuthRejection {
    /// Redirect to the sign-in page (for page requests).
    RedirectToLogin,
    /// 401 with `HX-Redirect` (for HTMX requests).
    HtmxLogin,
    /// Signed in, but without the required role.
    Forbidden,
    /// Session layer missing.
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/auth/login").into_response(),
            Self::HtmxLogin => {
                let mut response = StatusCode::UNAUTHORIZED.into_response();
                response
                    .headers_mut()
                    .insert("HX-Redirect", HeaderValue::from_static("/auth/login"));
                response
            }
            Self::Forbidden => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

async fn customer_from_parts(parts: &Parts) -> Result<CurrentCustomer, AuthRejection> {
    // Get the session from extensions (set by SessionManagerLayer)
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or(AuthRejection::Unauthorized)?;

    session
        .get::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
        .await
        .ok()
        .flatten()
        .ok_or_else(|| {
            if parts.headers.contains_key("hx-request") {
                AuthRejection::HtmxLogin
            } else {
                AuthRejection::RedirectToLogin
            }
        })
}

impl<S> FromRequestParts<S> for RequireCustomer
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        customer_from_parts(parts).await.map(Self)
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let customer = customer_from_parts(parts).await?;
        if !customer.is_admin() {
            tracing::warn!(customer_id = %customer.id, "Non-admin attempted admin route");
            return Err(AuthRejection::Forbidden);
        }
        Ok(Self(customer))
    }
}

/// Extractor that optionally gets the signed-in customer.
///
/// Unlike `RequireCustomer`, this does not reject the request.
pub struct OptionalCustomer(pub Option<CurrentCustomer>);

impl<S> FromRequestParts<S> for OptionalCustomer
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let customer = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        Ok(Self(customer))
    }
}

/// Helper to set the signed-in customer in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_customer(
    session: &Session,
    customer: &CurrentCustomer,
) -> Result<(), tower_sessions::session::Error> {
    session
        .insert(session_keys::CURRENT_CUSTOMER, customer)
        .await
}

/// Helper to clear the signed-in customer and checkout state (sign-out).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_customer(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
        .await?;
    session
        .remove::<serde_json::Value>(session_keys::CHECKOUT)
        .await?;
    session
        .remove::<serde_json::Value>(session_keys::LAST_PAYMENT)
        .await?;
    Ok(())
}
