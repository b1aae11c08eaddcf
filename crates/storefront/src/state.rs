//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use chainline_core::CustomerId;

use crate::api::{ApiClient, ApiError};
use crate::config::StorefrontConfig;
use crate::error::add_breadcrumb;
use crate::payment::{CriticalSection, PaymentError, RetryPolicy, StripeClient};
use crate::store::{LocalStore, StoreRegistry};

/// Error creating the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("remote API client: {0}")]
    Api(#[from] ApiError),
    #[error("payment processor client: {0}")]
    Payment(#[from] PaymentError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// remote API client, the payment processor, and per-customer local state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    api: ApiClient,
    payments: StripeClient,
    stores: StoreRegistry,
    checkouts: moka::sync::Cache<CustomerId, Arc<CriticalSection>>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let api = ApiClient::new(&config.api)?;
        let payments = StripeClient::new(&config.payment)?;
        let checkouts = moka::sync::Cache::builder()
            .max_capacity(100_000)
            .time_to_idle(Duration::from_secs(60 * 60))
            .build();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                api,
                payments,
                stores: StoreRegistry::new(),
                checkouts,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the remote API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Get a reference to the payment processor client.
    #[must_use]
    pub fn payments(&self) -> &StripeClient {
        &self.inner.payments
    }

    /// Polling policy for payments left in `processing`.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.inner.config.payment)
    }

    /// Get a reference to the per-customer store registry.
    #[must_use]
    pub fn stores(&self) -> &StoreRegistry {
        &self.inner.stores
    }

    /// The local store of a signed-in customer.
    #[must_use]
    pub fn store_for(&self, customer_id: CustomerId) -> LocalStore {
        self.inner.stores.store_for(customer_id)
    }

    /// The checkout critical section of a customer.
    ///
    /// Held while a payment is being confirmed; pages render the checkout as
    /// in flight (navigation blocked, submit disabled) while it is active.
    #[must_use]
    pub fn checkout_section(&self, customer_id: CustomerId) -> Arc<CriticalSection> {
        self.inner.checkouts.get_with(customer_id, || {
            let id = customer_id.to_string();
            let exit_id = id.clone();
            Arc::new(
                CriticalSection::new()
                    .on_enter(move || {
                        tracing::info!(customer_id = %id, "Checkout in flight; navigation blocked");
                        add_breadcrumb(
                            "checkout",
                            "Payment submitted",
                            Some(&[("customer_id", id.as_str())]),
                        );
                    })
                    .on_exit(move || {
                        tracing::info!(customer_id = %exit_id, "Checkout settled; navigation released");
                        add_breadcrumb(
                            "checkout",
                            "Payment settled",
                            Some(&[("customer_id", exit_id.as_str())]),
                        );
                    }),
            )
        })
    }
}
