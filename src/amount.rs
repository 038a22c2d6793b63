//! Decimal amount parsing and unit conversion.
//!
//! Oracle price feeds and parsed transactions report amounts as strings or
//! floats; everything is normalized into [`rust_decimal::Decimal`] before any
//! comparison happens.

use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

/// Lamports per SOL, the chain's fixed decimal factor.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Converts a lamport amount into its canonical SOL display unit.
pub fn lamports_to_sol(lamports: u64) -> Decimal {
    Decimal::from(lamports) / Decimal::from(LAMPORTS_PER_SOL)
}

/// A non-negative decimal amount in human-readable form.
///
/// Accepts strings like "0.005", "1,000", or "$12.50" and rejects anything
/// negative or outside a sane bound. Used for oracle price strings and
/// decimal-scaled transfer amounts.
#[derive(Debug, Clone, PartialEq)]
pub struct UiAmount(pub Decimal);

#[derive(Debug, thiserror::Error)]
pub enum UiAmountParseError {
    #[error("Invalid number format")]
    InvalidFormat,
    #[error("Amount must be between {} and {}", ui_amount::MIN_STR, ui_amount::MAX_STR)]
    OutOfRange,
    #[error("Negative value is not allowed")]
    Negative,
}

mod ui_amount {
    use super::*;
    use once_cell::sync::Lazy;

    pub const MIN_STR: &str = "0.000000001";
    pub const MAX_STR: &str = "999999999";

    pub static MIN: Lazy<Decimal> = Lazy::new(|| Decimal::from_str(MIN_STR).expect("valid decimal"));
    pub static MAX: Lazy<Decimal> = Lazy::new(|| Decimal::from_str(MAX_STR).expect("valid decimal"));
}

impl UiAmount {
    pub fn parse(input: &str) -> Result<Self, UiAmountParseError> {
        // Remove anything that isn't digit, dot, minus
        let cleaned = Regex::new(r"[^\d\.\-]+")
            .unwrap()
            .replace_all(input, "")
            .to_string();

        let parsed =
            Decimal::from_str(&cleaned).map_err(|_| UiAmountParseError::InvalidFormat)?;

        if parsed.is_sign_negative() {
            return Err(UiAmountParseError::Negative);
        }

        if parsed < *ui_amount::MIN || parsed > *ui_amount::MAX {
            return Err(UiAmountParseError::OutOfRange);
        }

        Ok(UiAmount(parsed))
    }

    pub fn into_inner(self) -> Decimal {
        self.0
    }
}

impl FromStr for UiAmount {
    type Err = UiAmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UiAmount::parse(s)
    }
}

impl TryFrom<f64> for UiAmount {
    type Error = UiAmountParseError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let decimal = Decimal::from_f64(value).ok_or(UiAmountParseError::OutOfRange)?;
        if decimal.is_sign_negative() {
            return Err(UiAmountParseError::Negative);
        }
        if decimal < *ui_amount::MIN || decimal > *ui_amount::MAX {
            return Err(UiAmountParseError::OutOfRange);
        }
        Ok(UiAmount(decimal))
    }
}

impl Display for UiAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_decorated_numbers() {
        assert_eq!(UiAmount::parse("0.005").unwrap().0, Decimal::from_str("0.005").unwrap());
        assert_eq!(UiAmount::parse("1,000").unwrap().0, Decimal::from(1000));
        assert_eq!(UiAmount::parse("$12.50").unwrap().0, Decimal::from_str("12.5").unwrap());
    }

    #[test]
    fn rejects_negative_and_garbage() {
        assert!(matches!(
            UiAmount::parse("-1"),
            Err(UiAmountParseError::Negative)
        ));
        assert!(matches!(
            UiAmount::parse("abc"),
            Err(UiAmountParseError::InvalidFormat)
        ));
    }

    #[test]
    fn lamports_convert_by_fixed_factor() {
        assert_eq!(lamports_to_sol(520_000_000), Decimal::from_str("0.52").unwrap());
        assert_eq!(lamports_to_sol(1_000_000_000), Decimal::ONE);
        assert_eq!(lamports_to_sol(1), Decimal::from_str("0.000000001").unwrap());
    }
}
