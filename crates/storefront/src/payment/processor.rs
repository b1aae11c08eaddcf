//! Payment processor seam and its Stripe REST implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chainline_core::PaymentIntentStatus;
use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use super::PaymentError;
use super::intent::{BillingDetails, PaymentIntentId, PaymentMethodToken};
use crate::config::PaymentConfig;

/// A payment intent as the processor reports it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    pub id: PaymentIntentId,
    pub status: PaymentIntentStatus,
    /// Amount in minor units (cents).
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub last_payment_error: Option<LastPaymentError>,
}

/// The processor's explanation of the most recent failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LastPaymentError {
    #[serde(default)]
    pub message: Option<String>,
}

impl PaymentIntent {
    /// The processor's message for the last failed attempt, if any.
    #[must_use]
    pub fn failure_message(&self) -> Option<&str> {
        self.last_payment_error
            .as_ref()
            .and_then(|e| e.message.as_deref())
    }
}

/// What gets submitted when confirming an intent.
#[derive(Debug, Clone)]
pub struct ConfirmRequest {
    pub payment_method: PaymentMethodToken,
    pub billing: BillingDetails,
}

/// Operations the payment flow needs from the processor.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Confirm the intent with a payment method and billing details.
    async fn confirm(
        &self,
        intent_id: &PaymentIntentId,
        request: &ConfirmRequest,
    ) -> Result<PaymentIntent, PaymentError>;

    /// Re-read the intent's current status.
    async fn retrieve(&self, intent_id: &PaymentIntentId) -> Result<PaymentIntent, PaymentError>;
}

// =============================================================================
// StripeClient
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

/// Server-side client for the Stripe payment intents API.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    api_base: String,
    secret_key: SecretString,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(StripeClientInner {
                client,
                api_base: config.api_base.trim_end_matches('/').to_string(),
                secret_key: config.secret_key.clone(),
            }),
        })
    }

    fn intent_url(&self, intent_id: &PaymentIntentId, action: Option<&str>) -> String {
        let base = format!(
            "{}/v1/payment_intents/{}",
            self.inner.api_base,
            urlencoding::encode(intent_id.as_str())
        );
        match action {
            Some(action) => format!("{base}/{action}"),
            None => base,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<PaymentIntent, PaymentError> {
        let response = request
            .bearer_auth(self.inner.secret_key.expose_secret())
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(serde_json::from_str(&body)?);
        }

        let detail = serde_json::from_str::<StripeErrorBody>(&body)
            .ok()
            .map(|b| b.error);
        let message = detail
            .as_ref()
            .and_then(|d| d.message.clone())
            .unwrap_or_else(|| format!("Payment processor returned {status}"));

        tracing::warn!(status = %status, message = %message, "Payment processor rejected request");

        match detail.and_then(|d| d.kind).as_deref() {
            Some("card_error") => Err(PaymentError::Declined(message)),
            _ => Err(PaymentError::Processor(message)),
        }
    }
}

/// Form fields for `POST /v1/payment_intents/{id}/confirm`.
fn confirm_form(request: &ConfirmRequest) -> Vec<(&'static str, String)> {
    let billing = &request.billing;
    let mut form = vec![
        ("payment_method_data[type]", "card".to_string()),
        (
            "payment_method_data[card][token]",
            request.payment_method.as_str().to_string(),
        ),
        (
            "payment_method_data[billing_details][name]",
            billing.name.clone(),
        ),
        (
            "payment_method_data[billing_details][email]",
            billing.email.clone(),
        ),
        (
            "payment_method_data[billing_details][address][line1]",
            billing.address.line1.clone(),
        ),
        (
            "payment_method_data[billing_details][address][city]",
            billing.address.city.clone(),
        ),
        (
            "payment_method_data[billing_details][address][postal_code]",
            billing.address.postal_code.clone(),
        ),
        (
            "payment_method_data[billing_details][address][country]",
            billing.address.country.to_uppercase(),
        ),
        ("receipt_email", billing.email.clone()),
    ];
    if let Some(line2) = billing.address.line2.as_ref().filter(|l| !l.is_empty()) {
        form.push((
            "payment_method_data[billing_details][address][line2]",
            line2.clone(),
        ));
    }
    form
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    #[instrument(skip(self, request), fields(intent_id = %intent_id))]
    async fn confirm(
        &self,
        intent_id: &PaymentIntentId,
        request: &ConfirmRequest,
    ) -> Result<PaymentIntent, PaymentError> {
        let form = confirm_form(request);
        self.send(
            self.inner
                .client
                .post(self.intent_url(intent_id, Some("confirm")))
                .form(&form),
        )
        .await
    }

    #[instrument(skip(self), fields(intent_id = %intent_id))]
    async fn retrieve(&self, intent_id: &PaymentIntentId) -> Result<PaymentIntent, PaymentError> {
        self.send(self.inner.client.get(self.intent_url(intent_id, None)))
            .await
    }
}
