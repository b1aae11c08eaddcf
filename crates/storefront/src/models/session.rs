//! Session-related types.
//!
//! Types stored in the session for authentication and checkout state.

use chainline_core::{CustomerId, CustomerRole};
use serde::{Deserialize, Serialize};

use crate::api::{AuthToken, CheckoutSummary, Customer};
use crate::payment::ClientSecret;

/// Session-stored customer identity.
///
/// Resolved once at sign-in through `GET /auth/me`; the token is forwarded
/// to the remote API on every customer-scoped call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentCustomer {
    pub id: CustomerId,
    pub email: String,
    pub name: Option<String>,
    pub role: CustomerRole,
    pub token: AuthToken,
}

impl CurrentCustomer {
    /// Combine the resolved identity with the token it was resolved from.
    #[must_use]
    pub fn new(customer: Customer, token: AuthToken) -> Self {
        Self {
            id: customer.id,
            email: customer.email,
            name: customer.name,
            role: customer.role,
            token,
        }
    }

    /// Whether the customer carries the admin role claim.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == CustomerRole::Admin
    }

    /// Name to greet the customer with.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

/// Checkout state carried from the cart to the payment page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub summary: CheckoutSummary,
    pub client_secret: ClientSecret,
}

/// Session keys.
pub mod session_keys {
    /// Key for storing the signed-in customer.
    pub const CURRENT_CUSTOMER: &str = "current_customer";

    /// Key for the checkout summary and payment intent secret.
    pub const CHECKOUT: &str = "checkout";

    /// Key for the intent id of the last completed payment.
    pub const LAST_PAYMENT: &str = "last_payment";

    /// Key for the CSRF state sent to the identity provider.
    pub const SIGN_IN_STATE: &str = "sign_in_state";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_claim() {
        let customer = CurrentCustomer::new(
            Customer {
                id: CustomerId::new(1),
                email: "mechanic@chainline.bike".to_string(),
                name: None,
                role: CustomerRole::Admin,
            },
            AuthToken::new("tok"),
        );
        assert!(customer.is_admin());
        assert_eq!(customer.display_name(), "mechanic@chainline.bike");
    }
}
