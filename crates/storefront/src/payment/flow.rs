//! The payment confirmation state machine.

use chainline_core::{PaymentIntentStatus, Price};
use tracing::{info, instrument, warn};

use super::PaymentError;
use super::intent::{BillingDetails, ClientSecret, PaymentIntentId, PaymentMethodToken};
use super::processor::{ConfirmRequest, PaymentIntent, PaymentProcessor};
use super::retry::{PollOutcome, RetryPolicy};

/// Shown when an intent is still processing after the last allowed poll.
pub const TIMEOUT_MESSAGE: &str = "We're still waiting for your bank to confirm this payment. \
     Please check your order status before trying again.";

/// Shown when the processor asks for a step this flow cannot perform (e.g. 3-D Secure).
pub const REQUIRES_ACTION_MESSAGE: &str = "Additional authentication required.";

/// Where a payment confirmation stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentState {
    Idle,
    Confirming,
    Processing,
    Succeeded(PaymentIntentId),
    RequiresAction,
    Canceled,
    Failed(String),
}

impl PaymentState {
    /// Whether the flow has finished.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded(_) | Self::RequiresAction | Self::Canceled | Self::Failed(_)
        )
    }

    /// Whether the customer must not leave the page.
    #[must_use]
    pub const fn blocks_navigation(&self) -> bool {
        matches!(self, Self::Confirming | Self::Processing)
    }

    /// Customer-facing explanation of a terminal state other than success.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            Self::RequiresAction => Some(REQUIRES_ACTION_MESSAGE),
            Self::Canceled => Some("This payment was canceled."),
            Self::Idle | Self::Confirming | Self::Processing | Self::Succeeded(_) => None,
        }
    }
}

/// Everything needed to confirm a pre-created intent.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub client_secret: ClientSecret,
    pub amount: Price,
    pub billing: BillingDetails,
    pub payment_method: PaymentMethodToken,
}

/// Drives one payment intent from confirmation to a terminal state.
///
/// A flow is submitted at most once.
pub struct PaymentFlow<'a, P> {
    processor: &'a P,
    policy: RetryPolicy,
    state: PaymentState,
}

impl<'a, P: PaymentProcessor> PaymentFlow<'a, P> {
    /// Create an idle flow.
    #[must_use]
    pub const fn new(processor: &'a P, policy: RetryPolicy) -> Self {
        Self {
            processor,
            policy,
            state: PaymentState::Idle,
        }
    }

    /// The current state.
    #[must_use]
    pub const fn state(&self) -> &PaymentState {
        &self.state
    }

    /// Confirm the payment and follow it to a terminal state.
    ///
    /// `on_success` runs exactly once, with the intent id, if and only if the
    /// flow ends in `Succeeded`.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::AlreadySubmitted` if this flow already ran.
    /// Every processor outcome, including failures, is reported through the
    /// returned state instead.
    #[instrument(skip_all, fields(intent_id = %request.client_secret.intent_id(), amount = %request.amount))]
    pub async fn run(
        &mut self,
        request: PaymentRequest,
        on_success: impl FnOnce(&PaymentIntentId),
    ) -> Result<PaymentState, PaymentError> {
        if self.state != PaymentState::Idle {
            return Err(PaymentError::AlreadySubmitted);
        }

        if let Err(err) = validate(&request) {
            return Ok(self.transition(PaymentState::Failed(err.message())));
        }

        self.transition(PaymentState::Confirming);
        let intent_id = request.client_secret.intent_id().clone();
        let confirm = ConfirmRequest {
            payment_method: request.payment_method,
            billing: request.billing,
        };

        let intent = match self.processor.confirm(&intent_id, &confirm).await {
            Ok(intent) => intent,
            Err(err) => {
                warn!(error = %err, "Payment confirmation failed");
                return Ok(self.transition(PaymentState::Failed(err.message())));
            }
        };

        let settled = if intent.status == PaymentIntentStatus::Processing {
            self.transition(PaymentState::Processing);
            match self.poll(&intent_id).await {
                Ok(intent) => intent,
                Err(state) => return Ok(self.transition(state)),
            }
        } else {
            intent
        };

        let state = terminal_state(&settled);
        if let PaymentState::Succeeded(id) = &state {
            on_success(id);
        }
        Ok(self.transition(state))
    }

    async fn poll(&self, intent_id: &PaymentIntentId) -> Result<PaymentIntent, PaymentState> {
        let processor = self.processor;
        let outcome = self
            .policy
            .poll(
                |intent: &PaymentIntent| intent.status != PaymentIntentStatus::Processing,
                |attempt| async move {
                    tracing::debug!(attempt, "Polling payment status");
                    processor.retrieve(intent_id).await
                },
            )
            .await;

        match outcome {
            PollOutcome::Settled { value, attempts } => {
                info!(attempts, status = %value.status, "Payment left processing");
                Ok(value)
            }
            PollOutcome::TimedOut { attempt } => {
                warn!(attempt, "Payment still processing after final poll");
                Err(PaymentState::Failed(TIMEOUT_MESSAGE.to_string()))
            }
            PollOutcome::Failed { error, attempts } => {
                warn!(attempts, error = %error, "Payment status poll failed");
                Err(PaymentState::Failed(error.message()))
            }
        }
    }

    fn transition(&mut self, next: PaymentState) -> PaymentState {
        info!(from = ?self.state, to = ?next, "Payment state change");
        self.state = next.clone();
        next
    }
}

fn validate(request: &PaymentRequest) -> Result<(), PaymentError> {
    match request.amount.minor_units() {
        Some(units) if units > 0 => {}
        _ => {
            return Err(PaymentError::InvalidRequest(
                "The order total is invalid. Please return to your cart.".to_string(),
            ));
        }
    }
    request.billing.validate()
}

/// Map a non-processing intent status to the flow's terminal state.
fn terminal_state(intent: &PaymentIntent) -> PaymentState {
    match intent.status {
        PaymentIntentStatus::Succeeded | PaymentIntentStatus::RequiresCapture => {
            PaymentState::Succeeded(intent.id.clone())
        }
        PaymentIntentStatus::RequiresAction => PaymentState::RequiresAction,
        PaymentIntentStatus::Canceled => PaymentState::Canceled,
        PaymentIntentStatus::RequiresPaymentMethod => PaymentState::Failed(
            intent
                .failure_message()
                .unwrap_or("Your payment method was declined. Please try another card.")
                .to_string(),
        ),
        PaymentIntentStatus::RequiresConfirmation | PaymentIntentStatus::Processing => {
            PaymentState::Failed(
            intent
                .failure_message()
                .unwrap_or("The payment could not be confirmed. Please try again.")
                .to_string(),
            )
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chainline_core::CurrencyCode;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::payment::intent::Address;

    /// Scripted processor: one confirm result, then retrieve statuses in order.
    struct ScriptedProcessor {
        confirm: Mutex<Option<Result<PaymentIntentStatus, PaymentError>>>,
        polls: Mutex<VecDeque<PaymentIntentStatus>>,
        retrieves: AtomicUsize,
    }

    impl ScriptedProcessor {
        fn new(confirm: PaymentIntentStatus, polls: Vec<PaymentIntentStatus>) -> Self {
            Self {
                confirm: Mutex::new(Some(Ok(confirm))),
                polls: Mutex::new(polls.into()),
                retrieves: AtomicUsize::new(0),
            }
        }

        fn failing(error: PaymentError) -> Self {
            Self {
                confirm: Mutex::new(Some(Err(error))),
                polls: Mutex::new(VecDeque::new()),
                retrieves: AtomicUsize::new(0),
            }
        }
    }

    fn intent(id: &PaymentIntentId, status: PaymentIntentStatus) -> PaymentIntent {
        PaymentIntent {
            id: id.clone(),
            status,
            amount: 189_900,
            currency: "usd".to_string(),
            last_payment_error: None,
        }
    }

    #[async_trait]
    impl PaymentProcessor for ScriptedProcessor {
        async fn confirm(
            &self,
            intent_id: &PaymentIntentId,
            _request: &ConfirmRequest,
        ) -> Result<PaymentIntent, PaymentError> {
            let scripted = self.confirm.lock().take().unwrap();
            scripted.map(|status| intent(intent_id, status))
        }

        async fn retrieve(
            &self,
            intent_id: &PaymentIntentId,
        ) -> Result<PaymentIntent, PaymentError> {
            self.retrieves.fetch_add(1, Ordering::SeqCst);
            let status = self.polls.lock().pop_front().unwrap();
            Ok(intent(intent_id, status))
        }
    }

    fn request() -> PaymentRequest {
        PaymentRequest {
            client_secret: ClientSecret::parse("pi_42_secret_s3cr3t").unwrap(),
            amount: Price::new(dec!(1899.00), CurrencyCode::USD),
            billing: BillingDetails {
                name: "Ada Rider".to_string(),
                email: "ada@example.org".to_string(),
                address: Address {
                    line1: "1 Spoke St".to_string(),
                    line2: None,
                    city: "Portland".to_string(),
                    postal_code: "97201".to_string(),
                    country: "US".to_string(),
                },
            },
            payment_method: PaymentMethodToken::parse("tok_visa").unwrap(),
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(30, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_immediate_success_fires_callback_once() {
        let processor = ScriptedProcessor::new(PaymentIntentStatus::Succeeded, Vec::new());
        let mut flow = PaymentFlow::new(&processor, policy());
        let mut succeeded = Vec::new();

        let state = flow
            .run(request(), |id| succeeded.push(id.clone()))
            .await
            .unwrap();

        assert_eq!(state, PaymentState::Succeeded(PaymentIntentId::new("pi_42")));
        assert_eq!(succeeded, vec![PaymentIntentId::new("pi_42")]);
        assert_eq!(processor.retrieves.load(Ordering::SeqCst), 0);
        assert!(!flow.state().blocks_navigation());
    }

    #[tokio::test]
    async fn test_processing_then_success_on_thirtieth_poll() {
        let mut polls = vec![PaymentIntentStatus::Processing; 29];
        polls.push(PaymentIntentStatus::Succeeded);
        let processor = ScriptedProcessor::new(PaymentIntentStatus::Processing, polls);
        let mut flow = PaymentFlow::new(&processor, policy());
        let mut calls = 0;

        let state = flow.run(request(), |_| calls += 1).await.unwrap();

        assert!(matches!(state, PaymentState::Succeeded(_)));
        assert_eq!(calls, 1);
        assert_eq!(processor.retrieves.load(Ordering::SeqCst), 30);
    }

    #[tokio::test]
    async fn test_processing_beyond_ceiling_times_out() {
        let polls = vec![PaymentIntentStatus::Processing; 31];
        let processor = ScriptedProcessor::new(PaymentIntentStatus::Processing, polls);
        let mut flow = PaymentFlow::new(&processor, policy());
        let mut calls = 0;

        let state = flow.run(request(), |_| calls += 1).await.unwrap();

        assert_eq!(state, PaymentState::Failed(TIMEOUT_MESSAGE.to_string()));
        assert_eq!(calls, 0);
        assert_eq!(processor.retrieves.load(Ordering::SeqCst), 30);
    }

    #[tokio::test]
    async fn test_canceled_while_processing() {
        let polls = vec![PaymentIntentStatus::Processing, PaymentIntentStatus::Canceled];
        let processor = ScriptedProcessor::new(PaymentIntentStatus::Processing, polls);
        let mut flow = PaymentFlow::new(&processor, policy());

        let state = flow.run(request(), |_| {}).await.unwrap();
        assert_eq!(state, PaymentState::Canceled);
    }

    #[tokio::test]
    async fn test_requires_capture_counts_as_paid() {
        let processor = ScriptedProcessor::new(PaymentIntentStatus::RequiresCapture, Vec::new());
        let mut flow = PaymentFlow::new(&processor, policy());
        let mut calls = 0;

        let state = flow.run(request(), |_| calls += 1).await.unwrap();
        assert!(matches!(state, PaymentState::Succeeded(_)));
        assert_eq!(calls, 1);
        assert_eq!(processor.retrieves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_requires_action_is_terminal() {
        let processor = ScriptedProcessor::new(PaymentIntentStatus::RequiresAction, Vec::new());
        let mut flow = PaymentFlow::new(&processor, policy());

        let state = flow.run(request(), |_| {}).await.unwrap();
        assert_eq!(state, PaymentState::RequiresAction);
        assert_eq!(state.message(), Some(REQUIRES_ACTION_MESSAGE));
    }

    #[tokio::test]
    async fn test_decline_message_is_verbatim() {
        let processor = ScriptedProcessor::failing(PaymentError::Declined(
            "Your card has insufficient funds.".to_string(),
        ));
        let mut flow = PaymentFlow::new(&processor, policy());

        let state = flow.run(request(), |_| {}).await.unwrap();
        assert_eq!(
            state,
            PaymentState::Failed("Your card has insufficient funds.".to_string())
        );
    }

    #[tokio::test]
    async fn test_invalid_billing_fails_without_confirming() {
        let processor = ScriptedProcessor::new(PaymentIntentStatus::Succeeded, Vec::new());
        let mut flow = PaymentFlow::new(&processor, policy());
        let mut req = request();
        req.billing.name.clear();

        let state = flow.run(req, |_| {}).await.unwrap();
        assert_eq!(
            state,
            PaymentState::Failed("Please enter the cardholder name.".to_string())
        );
        assert!(processor.confirm.lock().is_some());
    }

    #[tokio::test]
    async fn test_flow_runs_once() {
        let processor = ScriptedProcessor::new(PaymentIntentStatus::Succeeded, Vec::new());
        let mut flow = PaymentFlow::new(&processor, policy());
        flow.run(request(), |_| {}).await.unwrap();

        let err = flow.run(request(), |_| {}).await.unwrap_err();
        assert!(matches!(err, PaymentError::AlreadySubmitted));
    }
}
