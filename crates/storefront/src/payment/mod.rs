//! Payment confirmation.
//!
//! # Architecture
//!
//! - The remote API creates the payment intent and hands back its client
//!   secret; this module never creates intents
//! - [`PaymentFlow`] confirms the intent with the processor and follows it to
//!   a terminal state: `idle → confirming → succeeded | processing |
//!   requires_action | canceled | failed`
//! - A `processing` intent is polled under an explicit [`RetryPolicy`]
//!   (30 attempts, 2 seconds apart by default)
//! - [`CriticalSection`] marks a checkout as in flight so the storefront can
//!   block navigation and refuse a second submission
//! - [`PaymentProcessor`] is the seam to the processor's REST API;
//!   [`StripeClient`] implements it

mod flow;
mod guard;
mod intent;
mod processor;
mod retry;

pub use flow::{PaymentFlow, PaymentRequest, PaymentState};
pub use guard::{CriticalSection, SectionGuard};
pub use intent::{Address, BillingDetails, ClientSecret, PaymentIntentId, PaymentMethodToken};
pub use processor::{ConfirmRequest, PaymentIntent, PaymentProcessor, StripeClient};
pub use retry::{PollOutcome, RetryPolicy};

use thiserror::Error;

/// Errors from the payment processor or from a malformed payment request.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The card was declined; the message comes from the processor.
    #[error("{0}")]
    Declined(String),

    /// Any other error the processor reported.
    #[error("{0}")]
    Processor(String),

    /// The request never reached the processor.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The processor's response could not be decoded.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The request was rejected before being sent (bad secret, billing, amount).
    #[error("{0}")]
    InvalidRequest(String),

    /// This flow has already been submitted.
    #[error("This payment has already been submitted.")]
    AlreadySubmitted,
}

impl PaymentError {
    /// The message to show the customer.
    ///
    /// Processor messages are passed through unchanged.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Http(_) => {
                "We couldn't reach the payment processor. Your card has not been charged; please try again."
                    .to_string()
            }
            Self::Parse(_) => {
                "The payment processor sent an unexpected response. Please check your order status before trying again."
                    .to_string()
            }
            other => other.to_string(),
        }
    }
}
