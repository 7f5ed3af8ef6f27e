//! Type-safe price representation using decimal arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price with currency information.
///
/// Amounts travel over the wire as decimal strings, so the decimal type
/// round-trips without floating-point drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
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

    /// A zero price in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    /// The line total for `quantity` units at this price.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self::new(self.amount * Decimal::from(quantity), self.currency_code)
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
    /// Parse an ISO 4217 code, case-insensitively.
    ///
    /// Returns `None` for currencies the storefront does not trade in.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "USD" => Some(Self::USD),
            "EUR" => Some(Self::EUR),
            "GBP" => Some(Self::GBP),
            "CAD" => Some(Self::CAD),
            "AUD" => Some(Self::AUD),
            _ => None,
        }
    }

    /// The ISO 4217 code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_times_scales_amount() {
        let price = Price::new(Decimal::new(1999, 2), CurrencyCode::USD);
        let total = price.times(3);
        assert_eq!(total.amount, Decimal::new(5997, 2));
        assert_eq!(total.currency_code, CurrencyCode::USD);
    }

    #[test]
    fn test_currency_code_parse() {
        assert_eq!(CurrencyCode::from_code("usd"), Some(CurrencyCode::USD));
        assert_eq!(CurrencyCode::from_code("GBP"), Some(CurrencyCode::GBP));
        assert_eq!(CurrencyCode::from_code("JPY"), None);
    }

    #[test]
    fn test_price_serializes_amount_as_string() {
        let price = Price::new(Decimal::new(2500, 2), CurrencyCode::EUR);
        let json = serde_json::to_value(&price).unwrap();
        assert_eq!(json["amount"], "25.00");
        assert_eq!(json["currencyCode"], "EUR");
    }
}
