//! Amount type
//!
//! Domain primitives for monetary values. Money is held as integer minor
//! units (cents) so that transfers conserve value exactly; `Decimal` is only
//! used to parse input and to format output with two decimal places.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Number of decimal places carried by every monetary value
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Upper bound for any stored balance, in cents (one trillion units)
pub(crate) const MAX_BALANCE_CENTS: i64 = 100_000_000_000_000;

/// Errors that can occur when creating an Amount or a Balance
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Amount must be positive (got {0})")]
    NotPositive(Decimal),

    #[error("Balance cannot be negative (got {0})")]
    Negative(Decimal),

    #[error("Amount has too many decimal places (max {MINOR_UNIT_SCALE}, got {0})")]
    TooManyDecimals(u32),

    #[error("Amount cannot exceed {limit}")]
    ExceedsLimit { limit: Decimal },

    #[error("Amount is out of range")]
    Overflow,

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

/// Convert a decimal into cents, rejecting sub-cent precision.
fn to_cents(value: Decimal) -> Result<i64, AmountError> {
    let scale = value.normalize().scale();
    if scale > MINOR_UNIT_SCALE {
        return Err(AmountError::TooManyDecimals(scale));
    }

    value
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.trunc().to_i64())
        .ok_or(AmountError::Overflow)
}

fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, MINOR_UNIT_SCALE)
}

/// Amount represents a validated, strictly positive monetary value.
///
/// # Invariants
/// - Value is always positive (> 0)
/// - At most 2 decimal places
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use demo_bank::domain::Amount;
///
/// let amount = Amount::new(Decimal::new(250050, 2)).unwrap();
/// assert_eq!(amount.cents(), 250050);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

impl Amount {
    /// Create a new Amount with validation.
    ///
    /// # Errors
    /// - `AmountError::NotPositive` if value <= 0
    /// - `AmountError::TooManyDecimals` if more than 2 decimal places
    /// - `AmountError::Overflow` if the value does not fit in cents
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value <= Decimal::ZERO {
            return Err(AmountError::NotPositive(value));
        }

        let cents = to_cents(value)?;
        if cents > MAX_BALANCE_CENTS {
            return Err(AmountError::Overflow);
        }

        Ok(Self(cents))
    }

    /// Create an Amount and additionally enforce an inclusive upper bound.
    pub fn with_limit(value: Decimal, limit: Decimal) -> Result<Self, AmountError> {
        let amount = Self::new(value)?;
        if amount.value() > limit {
            return Err(AmountError::ExceedsLimit { limit });
        }
        Ok(amount)
    }

    /// Rebuild an Amount from stored cents.
    pub fn from_cents(cents: i64) -> Result<Self, AmountError> {
        if cents <= 0 {
            return Err(AmountError::NotPositive(from_cents(cents)));
        }
        Ok(Self(cents))
    }

    /// Value in minor units
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Value as a two-place decimal
    pub fn value(&self) -> Decimal {
        from_cents(self.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.value())
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s.trim())
            .or_else(|_| Decimal::from_scientific(s.trim()))
            .map_err(|e| AmountError::ParseError(e.to_string()))?;
        Amount::new(decimal)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.value(), serializer)
    }
}

/// Balance represents an account balance (zero or positive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Balance(i64);

impl Balance {
    /// Create a new balance from a decimal (zero or positive)
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value < Decimal::ZERO {
            return Err(AmountError::Negative(value));
        }
        Self::from_cents(to_cents(value)?)
    }

    /// Rebuild a balance from stored cents
    pub fn from_cents(cents: i64) -> Result<Self, AmountError> {
        if cents < 0 {
            return Err(AmountError::Negative(from_cents(cents)));
        }
        if cents > MAX_BALANCE_CENTS {
            return Err(AmountError::Overflow);
        }
        Ok(Self(cents))
    }

    /// Create a zero balance
    pub fn zero() -> Self {
        Self(0)
    }

    /// Value in minor units
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Value as a two-place decimal
    pub fn value(&self) -> Decimal {
        from_cents(self.0)
    }

    /// Check if balance covers the given amount
    pub fn is_sufficient_for(&self, amount: &Amount) -> bool {
        self.0 >= amount.cents()
    }

    /// Add amount to balance
    pub fn credit(&self, amount: &Amount) -> Result<Balance, AmountError> {
        let cents = self
            .0
            .checked_add(amount.cents())
            .ok_or(AmountError::Overflow)?;
        Balance::from_cents(cents)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.value())
    }
}

impl Serialize for Balance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.value(), serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_positive() {
        let amount = Amount::new(dec!(2500.50)).unwrap();
        assert_eq!(amount.cents(), 250050);
        assert_eq!(amount.value(), dec!(2500.50));
        assert_eq!(amount.to_string(), "2500.50");
    }

    #[test]
    fn test_amount_zero_and_negative_rejected() {
        assert!(matches!(Amount::new(Decimal::ZERO), Err(AmountError::NotPositive(_))));
        assert!(matches!(Amount::new(dec!(-1)), Err(AmountError::NotPositive(_))));
    }

    #[test]
    fn test_amount_too_many_decimals() {
        assert!(matches!(
            Amount::new(dec!(0.001)),
            Err(AmountError::TooManyDecimals(3))
        ));
        // Trailing zeros do not count as precision
        assert_eq!(Amount::new(dec!(1.500)).unwrap().cents(), 150);
    }

    #[test]
    fn test_amount_with_limit() {
        let limit = dec!(1000000);
        assert!(Amount::with_limit(dec!(1000000), limit).is_ok());
        assert!(matches!(
            Amount::with_limit(dec!(999999999), limit),
            Err(AmountError::ExceedsLimit { .. })
        ));
    }

    #[test]
    fn test_amount_from_str() {
        let amount: Amount = "123.45".parse().unwrap();
        assert_eq!(amount.cents(), 12345);
        assert!("abc".parse::<Amount>().is_err());
        assert_eq!("1e2".parse::<Amount>().unwrap().cents(), 10000);
    }

    #[test]
    fn test_balance_credit() {
        let balance = Balance::new(dec!(10000.00)).unwrap();
        let amount = Amount::new(dec!(2500.50)).unwrap();

        let credited = balance.credit(&amount).unwrap();
        assert_eq!(credited.value(), dec!(12500.50));

        let full = Balance::from_cents(MAX_BALANCE_CENTS).unwrap();
        assert!(matches!(full.credit(&amount), Err(AmountError::Overflow)));
    }

    #[test]
    fn test_balance_insufficient() {
        let balance = Balance::new(dec!(50)).unwrap();

        assert!(!balance.is_sufficient_for(&Amount::new(dec!(100)).unwrap()));
        assert!(balance.is_sufficient_for(&Amount::new(dec!(50)).unwrap()));
    }

    #[test]
    fn test_balance_serializes_as_number() {
        let balance = Balance::new(dec!(7499.50)).unwrap();
        let json = serde_json::to_value(balance).unwrap();
        assert_eq!(json.as_f64(), Some(7499.5));
    }
}
