//! Checkout route handlers.
//!
//! # Flow
//!
//! 1. `POST /checkout` asks the API for totals and a payment intent, and keeps
//!    both in the session
//! 2. `GET /checkout/payment` renders the card form; the processor's browser
//!    SDK turns the card into a token
//! 3. `POST /checkout/confirm` runs [`PaymentFlow`] inside the customer's
//!    checkout [`CriticalSection`](crate::payment::CriticalSection)
//! 4. While that section is held, `GET /checkout/status` reports the
//!    checkout as in flight and the page keeps navigation blocked

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::cart::CartShowTemplate;
use crate::api::{ApiError, CheckoutSummary};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{CspNonce, RequireCustomer};
use crate::models::{CheckoutSession, CurrentCustomer, session_keys};
use crate::payment::{
    Address, BillingDetails, ClientSecret, PaymentFlow, PaymentMethodToken, PaymentRequest,
    PaymentState,
};
use crate::state::AppState;
use crate::sync::CartSync;

/// Shown when a second submission arrives while one is in flight.
const IN_FLIGHT_MESSAGE: &str = "Your payment is already being processed. Please wait.";

/// Checkout start form data.
#[derive(Debug, Deserialize)]
pub struct StartForm {
    #[serde(default)]
    pub coupon_code: String,
}

/// Payment confirmation form data.
///
/// `payment_method` is the token produced by the processor's browser SDK.
#[derive(Deserialize)]
pub struct ConfirmForm {
    pub payment_method: String,
    pub name: String,
    pub email: String,
    pub line1: String,
    #[serde(default)]
    pub line2: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl ConfirmForm {
    fn billing(&self) -> BillingDetails {
        let line2 = self.line2.trim();
        BillingDetails {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            address: Address {
                line1: self.line1.trim().to_string(),
                line2: (!line2.is_empty()).then(|| line2.to_string()),
                city: self.city.trim().to_string(),
                postal_code: self.postal_code.trim().to_string(),
                country: self.country.trim().to_ascii_uppercase(),
            },
        }
    }
}

/// Payment page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/payment.html")]
pub struct PaymentTemplate {
    pub customer: Option<CurrentCustomer>,
    pub nonce: String,
    pub publishable_key: String,
    pub summary: CheckoutSummary,
    pub email: String,
    pub in_flight: bool,
    pub message: Option<String>,
}

/// Checkout status fragment (for HTMX).
///
/// While `in_flight` is set the fragment polls itself and the page keeps its
/// navigation guard installed.
#[derive(Template, WebTemplate)]
#[template(path = "partials/checkout_status.html")]
pub struct CheckoutStatusTemplate {
    pub in_flight: bool,
    pub message: Option<String>,
}

/// Order confirmation page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/success.html")]
pub struct SuccessTemplate {
    pub customer: Option<CurrentCustomer>,
    pub intent_id: String,
}

// =============================================================================
// Session Helpers
// =============================================================================

async fn get_checkout(session: &Session) -> Result<Option<CheckoutSession>> {
    Ok(session
        .get::<CheckoutSession>(session_keys::CHECKOUT)
        .await?)
}

async fn get_last_payment(session: &Session) -> Result<Option<String>> {
    Ok(session.get::<String>(session_keys::LAST_PAYMENT).await?)
}

fn status_response(in_flight: bool, message: Option<String>) -> Response {
    CheckoutStatusTemplate { in_flight, message }.into_response()
}

fn hx_redirect(to: &'static str) -> Response {
    AppendHeaders([("HX-Redirect", to)]).into_response()
}

// =============================================================================
// Handlers
// =============================================================================

/// Start checkout: compute totals and create the payment intent.
///
/// An unknown coupon re-renders the cart with the API's message.
#[instrument(skip(state, customer, session), fields(customer_id = %customer.id))]
pub async fn start(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    session: Session,
    Form(form): Form<StartForm>,
) -> Result<Response> {
    // A payment already in flight keeps its intent.
    if state.checkout_section(customer.id).is_active() {
        return Ok(Redirect::to("/checkout/payment").into_response());
    }

    let store = state.store_for(customer.id);
    let cart = CartSync::new(state.api(), &store, &customer.token)
        .snapshot()
        .await?;
    if cart.is_empty() {
        return Ok(Redirect::to("/cart").into_response());
    }

    let coupon = form.coupon_code.trim();
    let coupon = (!coupon.is_empty()).then_some(coupon);
    let summary = match state.api().checkout_summary(&customer.token, coupon).await {
        Ok(summary) => summary,
        Err(ApiError::Validation(message)) => {
            let page = CartShowTemplate {
                customer: Some(customer),
                cart,
                error: Some(message),
            };
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let intent = state
        .api()
        .create_payment_intent(&customer.token, &summary)
        .await?;
    let client_secret = ClientSecret::parse(intent.client_secret)?;
    tracing::info!(intent_id = %client_secret.intent_id(), total = %summary.total_price(), "Checkout started");

    session
        .insert(
            session_keys::CHECKOUT,
            CheckoutSession {
                summary,
                client_secret,
            },
        )
        .await?;

    Ok(Redirect::to("/checkout/payment").into_response())
}

/// Display the payment page.
#[instrument(skip(state, customer, session, nonce), fields(customer_id = %customer.id))]
pub async fn payment(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    session: Session,
    nonce: CspNonce,
) -> Result<Response> {
    let Some(checkout) = get_checkout(&session).await? else {
        return Ok(Redirect::to("/cart").into_response());
    };

    Ok(PaymentTemplate {
        in_flight: state.checkout_section(customer.id).is_active(),
        message: None,
        publishable_key: state.config().payment.publishable_key.clone(),
        email: customer.email.clone(),
        summary: checkout.summary,
        nonce: nonce.0,
        customer: Some(customer),
    }
    .into_response())
}

/// Confirm the payment (HTMX).
///
/// Only one confirmation per customer runs at a time; the checkout section
/// stays held until the flow reaches a terminal state. Success redirects to
/// the confirmation page, every other outcome is shown in the status slot.
#[instrument(skip_all, fields(customer_id = %customer.id))]
pub async fn confirm(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    session: Session,
    Form(form): Form<ConfirmForm>,
) -> Result<Response> {
    let Some(checkout) = get_checkout(&session).await? else {
        return Ok(hx_redirect("/cart"));
    };

    let section = state.checkout_section(customer.id);
    let Some(guard) = section.try_enter() else {
        tracing::warn!("Duplicate payment submission refused");
        return Ok(status_response(true, Some(IN_FLIGHT_MESSAGE.to_string())));
    };

    let payment_method = match PaymentMethodToken::parse(form.payment_method.as_str()) {
        Ok(token) => token,
        Err(err) => return Ok(status_response(false, Some(err.message()))),
    };
    let request = PaymentRequest {
        amount: checkout.summary.total_price(),
        client_secret: checkout.client_secret,
        billing: form.billing(),
        payment_method,
    };

    let store = state.store_for(customer.id);
    let mut flow = PaymentFlow::new(state.payments(), state.retry_policy());
    let outcome = flow
        .run(request, |intent_id| {
            // The order now exists server-side; the local cart is out of date.
            store.invalidate_cart();
            tracing::info!(%intent_id, "Payment succeeded");
        })
        .await;
    drop(guard);

    match outcome.map_err(AppError::from)? {
        PaymentState::Succeeded(intent_id) => {
            session
                .remove::<CheckoutSession>(session_keys::CHECKOUT)
                .await?;
            session
                .insert(session_keys::LAST_PAYMENT, intent_id.as_str())
                .await?;
            add_breadcrumb(
                "checkout",
                "Payment succeeded",
                Some(&[("intent_id", intent_id.as_str())]),
            );
            Ok(hx_redirect("/checkout/success"))
        }
        PaymentState::Canceled => {
            // A canceled intent cannot be confirmed again.
            session
                .remove::<CheckoutSession>(session_keys::CHECKOUT)
                .await?;
            Ok(status_response(
                false,
                PaymentState::Canceled.message().map(str::to_string),
            ))
        }
        other => Ok(status_response(false, other.message().map(str::to_string))),
    }
}

/// Report whether a payment is in flight (HTMX polling).
///
/// Once the section is released after a successful payment, the page is
/// sent on to the confirmation page.
#[instrument(skip(state, customer, session), fields(customer_id = %customer.id))]
pub async fn status(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    session: Session,
) -> Result<Response> {
    if state.checkout_section(customer.id).is_active() {
        return Ok(status_response(true, None));
    }

    let paid =
        get_checkout(&session).await?.is_none() && get_last_payment(&session).await?.is_some();
    if paid {
        return Ok(hx_redirect("/checkout/success"));
    }
    Ok(status_response(false, None))
}

/// Display the order confirmation.
#[instrument(skip(customer, session), fields(customer_id = %customer.id))]
pub async fn success(
    RequireCustomer(customer): RequireCustomer,
    session: Session,
) -> Result<Response> {
    let Some(intent_id) = get_last_payment(&session).await? else {
        return Ok(Redirect::to("/").into_response());
    };

    Ok(SuccessTemplate {
        customer: Some(customer),
        intent_id,
    }
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_billing_details_are_trimmed() {
        let form = ConfirmForm {
            payment_method: "tok_visa".to_string(),
            name: " Ada Rider ".to_string(),
            email: "ada@example.com ".to_string(),
            line1: "1 Spoke St".to_string(),
            line2: "   ".to_string(),
            city: "Portland".to_string(),
            postal_code: "97201".to_string(),
            country: "us".to_string(),
        };
        let billing = form.billing();
        assert_eq!(billing.name, "Ada Rider");
        assert_eq!(billing.email, "ada@example.com");
        assert_eq!(billing.address.line2, None);
        assert_eq!(billing.address.country, "US");
        assert!(billing.validate().is_ok());
    }
}
