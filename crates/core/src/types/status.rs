//! Status enums shared between the storefront and the remote API.

use serde::{Deserialize, Serialize};

/// Payment intent status as reported by the payment processor.
///
/// The processor drives every transition; the storefront only observes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Succeeded,
    Canceled,
}

impl std::fmt::Display for PaymentIntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::RequiresAction => "requires_action",
            Self::Processing => "processing",
            Self::RequiresCapture => "requires_capture",
            Self::Succeeded => "succeeded",
            Self::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Role claim supplied by the identity provider.
///
/// Anything other than `admin` is treated as a regular customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CustomerRole {
    Admin,
    #[default]
    #[serde(other)]
    Customer,
}

impl std::fmt::Display for CustomerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Customer => write!(f, "customer"),
        }
    }
}

impl std::str::FromStr for CustomerRole {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.eq_ignore_ascii_case("admin") {
            Self::Admin
        } else {
            Self::Customer
        })
    }
}

/// Service booking status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    Canceled,
}

impl BookingStatus {
    /// Whether the customer may still cancel the booking.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_wire_names() {
        let status: PaymentIntentStatus = serde_json::from_str("\"requires_action\"").unwrap();
        assert_eq!(status, PaymentIntentStatus::RequiresAction);
        assert_eq!(status.to_string(), "requires_action");
    }

    #[test]
    fn test_unknown_role_is_customer() {
        let role: CustomerRole = serde_json::from_str("\"staff\"").unwrap();
        assert_eq!(role, CustomerRole::Customer);
        assert_eq!("ADMIN".parse::<CustomerRole>().unwrap(), CustomerRole::Admin);
    }

    #[test]
    fn test_booking_cancellable() {
        assert!(BookingStatus::Pending.is_cancellable());
        assert!(!BookingStatus::Canceled.is_cancellable());
        assert_eq!(BookingStatus::Confirmed.to_string(), "confirmed");
    }
}
