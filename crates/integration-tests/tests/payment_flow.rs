//! Payment confirmation driven through the storefront's public payment API.
//!
//! The processor is scripted, so these run without network access.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chainline_core::{CurrencyCode, PaymentIntentStatus, Price};
use chainline_storefront::payment::{
    Address, BillingDetails, ClientSecret, ConfirmRequest, PaymentError, PaymentFlow,
    PaymentIntent, PaymentIntentId, PaymentMethodToken, PaymentProcessor, PaymentRequest,
    PaymentState, RetryPolicy,
};
use parking_lot::Mutex;
use rust_decimal_macros::dec;

/// Replies to `confirm` once, then to `retrieve` from a queue. An empty
/// queue keeps answering `processing`.
struct ScriptedProcessor {
    confirm: PaymentIntentStatus,
    retrieve: Mutex<VecDeque<PaymentIntentStatus>>,
    retrieves: AtomicU32,
}

impl ScriptedProcessor {
    fn new(confirm: PaymentIntentStatus, retrieve: &[PaymentIntentStatus]) -> Self {
        Self {
            confirm,
            retrieve: Mutex::new(retrieve.iter().copied().collect()),
            retrieves: AtomicU32::new(0),
        }
    }

    fn retrieves(&self) -> u32 {
        self.retrieves.load(Ordering::SeqCst)
    }
}

fn intent(id: &PaymentIntentId, status: PaymentIntentStatus) -> PaymentIntent {
    PaymentIntent {
        id: id.clone(),
        status,
        amount: 129_900,
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
        Ok(intent(intent_id, self.confirm))
    }

    async fn retrieve(&self, intent_id: &PaymentIntentId) -> Result<PaymentIntent, PaymentError> {
        self.retrieves.fetch_add(1, Ordering::SeqCst);
        let status = self
            .retrieve
            .lock()
            .pop_front()
            .unwrap_or(PaymentIntentStatus::Processing);
        Ok(intent(intent_id, status))
    }
}

fn request() -> PaymentRequest {
    PaymentRequest {
        client_secret: ClientSecret::parse("pi_3Chainline_secret_abc").unwrap(),
        amount: Price::new(dec!(1299.00), CurrencyCode::USD),
        billing: BillingDetails {
            name: "Ada Rider".to_string(),
            email: "ada@example.com".to_string(),
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

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::ZERO)
}

#[tokio::test]
async fn test_processing_payment_settles_after_polling() {
    let processor = ScriptedProcessor::new(
        PaymentIntentStatus::Processing,
        &[PaymentIntentStatus::Processing, PaymentIntentStatus::Succeeded],
    );
    let mut flow = PaymentFlow::new(&processor, fast_policy(30));
    let mut paid = Vec::new();

    let state = flow
        .run(request(), |id| paid.push(id.as_str().to_string()))
        .await
        .unwrap();

    assert_eq!(
        state,
        PaymentState::Succeeded(PaymentIntentId::new("pi_3Chainline"))
    );
    assert_eq!(paid, vec!["pi_3Chainline".to_string()]);
    assert_eq!(processor.retrieves(), 2);
}

#[tokio::test]
async fn test_polling_gives_up_after_the_last_attempt() {
    let processor = ScriptedProcessor::new(PaymentIntentStatus::Processing, &[]);
    let mut flow = PaymentFlow::new(&processor, fast_policy(30));
    let mut succeeded = false;

    let state = flow.run(request(), |_| succeeded = true).await.unwrap();

    assert!(matches!(state, PaymentState::Failed(_)));
    assert!(!state.blocks_navigation());
    assert!(!succeeded);
    assert_eq!(processor.retrieves(), 30);
}

#[tokio::test]
async fn test_a_flow_is_submitted_once() {
    let processor = ScriptedProcessor::new(PaymentIntentStatus::Succeeded, &[]);
    let mut flow = PaymentFlow::new(&processor, fast_policy(30));

    flow.run(request(), |_| {}).await.unwrap();
    let again = flow.run(request(), |_| {}).await;

    assert!(matches!(again, Err(PaymentError::AlreadySubmitted)));
    assert_eq!(processor.retrieves(), 0);
}
