//! Payment intent identifiers and the customer-supplied confirmation inputs.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::PaymentError;

/// Processor-issued payment intent id (`pi_...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentIntentId(String);

impl PaymentIntentId {
    /// Wrap a raw intent id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentIntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The client secret of a payment intent (`pi_..._secret_...`).
///
/// Kept in the session between intent creation and confirmation. `Debug`
/// never prints the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientSecret {
    secret: String,
    intent_id: PaymentIntentId,
}

impl ClientSecret {
    /// Parse a client secret, deriving the intent id from its prefix.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidRequest` if the value is not shaped like
    /// a client secret.
    pub fn parse(secret: impl Into<String>) -> Result<Self, PaymentError> {
        let secret = secret.into();
        let intent_id = match secret.split_once("_secret_") {
            Some((id, rest)) if id.starts_with("pi_") && !rest.is_empty() => id.to_string(),
            _ => {
                return Err(PaymentError::InvalidRequest(
                    "Invalid payment session. Please restart checkout.".to_string(),
                ));
            }
        };
        Ok(Self {
            secret,
            intent_id: PaymentIntentId(intent_id),
        })
    }

    /// The intent this secret belongs to.
    #[must_use]
    pub const fn intent_id(&self) -> &PaymentIntentId {
        &self.intent_id
    }

    /// The raw secret, for the browser SDK.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSecret")
            .field("intent_id", &self.intent_id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl TryFrom<String> for ClientSecret {
    type Error = PaymentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ClientSecret> for String {
    fn from(secret: ClientSecret) -> Self {
        secret.secret
    }
}

/// Payment method token produced by the processor's browser SDK (`tok_...`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentMethodToken(String);

impl PaymentMethodToken {
    /// Wrap a token, rejecting empty input.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidRequest` if the token is blank.
    pub fn parse(token: impl Into<String>) -> Result<Self, PaymentError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(PaymentError::InvalidRequest(
                "Please enter your card details.".to_string(),
            ));
        }
        Ok(Self(token))
    }

    /// The raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Postal address attached to the payment method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
}

/// Billing details submitted with the payment method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingDetails {
    pub name: String,
    pub email: String,
    pub address: Address,
}

impl BillingDetails {
    /// Check that the fields the processor requires are present.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidRequest` naming the first problem found.
    pub fn validate(&self) -> Result<(), PaymentError> {
        let invalid = |message: &str| -> Result<(), PaymentError> {
            Err(PaymentError::InvalidRequest(message.to_string()))
        };

        if self.name.trim().is_empty() {
            return invalid("Please enter the cardholder name.");
        }
        if !self.email.contains('@') {
            return invalid("Please enter a valid email address.");
        }
        if self.address.line1.trim().is_empty() || self.address.city.trim().is_empty() {
            return invalid("Please enter your billing address.");
        }
        if self.address.postal_code.trim().is_empty() {
            return invalid("Please enter your postal code.");
        }
        if self.address.country.len() != 2 {
            return invalid("Please choose a billing country.");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_client_secret_derives_intent_id() {
        let secret = ClientSecret::parse("pi_3Nq8xY2eZvKYlo2C_secret_AbCdEf").unwrap();
        assert_eq!(secret.intent_id().as_str(), "pi_3Nq8xY2eZvKYlo2C");
        assert!(!format!("{secret:?}").contains("AbCdEf"));
    }

    #[test]
    fn test_client_secret_rejects_malformed_values() {
        assert!(ClientSecret::parse("pi_123").is_err());
        assert!(ClientSecret::parse("seti_123_secret_abc").is_err());
        assert!(ClientSecret::parse("pi_123_secret_").is_err());
    }

    #[test]
    fn test_client_secret_session_round_trip() {
        let secret = ClientSecret::parse("pi_1_secret_x").unwrap();
        let json = serde_json::to_string(&secret).unwrap();
        assert_eq!(json, "\"pi_1_secret_x\"");
        let back: ClientSecret = serde_json::from_str(&json).unwrap();
        assert_eq!(back, secret);
    }

    #[test]
    fn test_billing_validation() {
        let mut billing = BillingDetails {
            name: "Ada Rider".to_string(),
            email: "ada@example.org".to_string(),
            address: Address {
                line1: "1 Spoke St".to_string(),
                line2: None,
                city: "Portland".to_string(),
                postal_code: "97201".to_string(),
                country: "US".to_string(),
            },
        };
        assert!(billing.validate().is_ok());

        billing.address.postal_code.clear();
        let err = billing.validate().unwrap_err();
        assert_eq!(err.message(), "Please enter your postal code.");
    }
}
