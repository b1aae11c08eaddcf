//! Type-safe price representation using decimal arithmetic.

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    #[serde(default)]
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// A zero amount in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    /// Amount in the smallest currency unit (cents), as payment processors expect.
    ///
    /// Returns `None` if the amount is negative or does not fit in an `i64`.
    #[must_use]
    pub fn minor_units(&self) -> Option<i64> {
        if self.amount.is_sign_negative() {
            return None;
        }
        let cents = (self.amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        cents.to_i64()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self
            .amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        write!(f, "{}{rounded:.2}", self.currency_code.symbol())
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// Lowercase code as used by the payment processor.
    #[must_use]
    pub const fn processor_code(self) -> &'static str {
        match self {
            Self::USD => "usd",
            Self::EUR => "eur",
            Self::GBP => "gbp",
            Self::CAD => "cad",
            Self::AUD => "aud",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_display_rounds_to_cents() {
        let price = Price::new(dec!(1249.5), CurrencyCode::USD);
        assert_eq!(price.to_string(), "$1249.50");

        let price = Price::new(dec!(19.999), CurrencyCode::GBP);
        assert_eq!(price.to_string(), "£20.00");
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(
            Price::new(dec!(89.99), CurrencyCode::USD).minor_units(),
            Some(8999)
        );
        assert_eq!(Price::zero(CurrencyCode::EUR).minor_units(), Some(0));
        assert_eq!(
            Price::new(dec!(-1), CurrencyCode::USD).minor_units(),
            None
        );
    }

    #[test]
    fn test_price_deserializes_amount_from_string() {
        let price: Price =
            serde_json::from_str(r#"{"amount":"12.50","currency_code":"EUR"}"#).unwrap();
        assert_eq!(price.amount, dec!(12.50));
        assert_eq!(price.currency_code, CurrencyCode::EUR);
    }
}
