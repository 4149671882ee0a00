//! Amount normalization.
//!
//! Stripe sends integer minor units (cents); PayPal sends decimal strings in
//! major units. Both normalize to a [`Money`] with exactly two fractional
//! digits and an uppercase ISO 4217 code, so `12000 eur` and `"120.00" EUR`
//! compare equal.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Fractional digits kept in the canonical representation.
const CANONICAL_SCALE: u32 = 2;

/// Uppercase ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Result<Self, ValidationError> {
        let code = code.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::invalid_format(
                "currency",
                format!("'{}' is not a 3-letter ISO code", code),
            ));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    pub fn eur() -> Self {
        Self("EUR".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provider-native amount representation.
#[derive(Debug, Clone, Copy)]
pub enum RawAmount<'a> {
    /// Stripe: integer minor units plus lowercase currency.
    MinorUnits { value: i64, currency: &'a str },
    /// PayPal: decimal string in major units plus currency code.
    MajorDecimal { value: &'a str, currency: &'a str },
}

/// A canonical monetary amount.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Builds a canonical amount from an already-major decimal value.
    pub fn new(amount: Decimal, currency: Currency) -> Result<Self, ValidationError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(ValidationError::invalid_format(
                "amount",
                "must not be negative",
            ));
        }
        let mut amount =
            amount.round_dp_with_strategy(CANONICAL_SCALE, RoundingStrategy::MidpointAwayFromZero);
        amount.rescale(CANONICAL_SCALE);
        Ok(Self { amount, currency })
    }

    /// Whole EUR cents, for configured defaults.
    pub fn euros_from_cents(cents: u32) -> Self {
        Self {
            amount: Decimal::new(i64::from(cents), CANONICAL_SCALE),
            currency: Currency::eur(),
        }
    }

    /// Normalizes a provider-native amount.
    pub fn normalize(raw: RawAmount<'_>) -> Result<Self, ValidationError> {
        match raw {
            RawAmount::MinorUnits { value, currency } => Self::from_minor_units(value, currency),
            RawAmount::MajorDecimal { value, currency } => Self::parse_major(value, currency),
        }
    }

    /// `12000` + `eur` becomes `120.00 EUR`.
    pub fn from_minor_units(value: i64, currency: &str) -> Result<Self, ValidationError> {
        Self::new(Decimal::new(value, 2), Currency::new(currency)?)
    }

    /// `"120.00"` + `EUR` becomes `120.00 EUR`.
    pub fn parse_major(value: &str, currency: &str) -> Result<Self, ValidationError> {
        let amount = Decimal::from_str(value.trim()).map_err(|e| {
            ValidationError::invalid_format("amount", format!("'{}': {}", value, e))
        })?;
        Self::new(amount, Currency::new(currency)?)
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}
