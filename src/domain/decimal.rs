//! Lossless decimal amounts backed by rust_decimal.
//!
//! Human-facing amounts (whole SOL, whole points) are decimals; everything the
//! ledger sees is an integer count of the smallest unit.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lossless decimal numeric type for human-facing amounts.
///
/// Serializes to JSON number (not string).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Decimal {
    /// Parse a Decimal from a string losslessly.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Decimal)
    }

    /// Whole-unit value of `units` smallest units, where `units_per_whole`
    /// smallest units make one whole unit.
    pub fn from_units(units: u64, units_per_whole: u64) -> Self {
        if units_per_whole == 0 {
            return Decimal::zero();
        }
        Decimal(RustDecimal::from(units) / RustDecimal::from(units_per_whole)).normalized()
    }

    /// `floor(self * units_per_whole)` as an integer unit count.
    ///
    /// Returns `None` for negative values or when the product does not fit in a u64.
    pub fn to_units_floor(&self, units_per_whole: u64) -> Option<u64> {
        self.0
            .checked_mul(RustDecimal::from(units_per_whole))?
            .floor()
            .to_u64()
    }

    /// Format the Decimal as a canonical string (no exponent notation).
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalize())
    }

    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    fn normalized(self) -> Self {
        Decimal(self.0.normalize())
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAMPORTS: u64 = 1_000_000_000;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_from_units_whole_and_fractional() {
        assert_eq!(Decimal::from_units(2 * LAMPORTS, LAMPORTS), d("2"));
        assert_eq!(Decimal::from_units(1_500_000_000, LAMPORTS), d("1.5"));
        assert_eq!(Decimal::from_units(1, LAMPORTS), d("0.000000001"));
        assert_eq!(Decimal::from_units(0, LAMPORTS), Decimal::zero());
    }

    #[test]
    fn test_to_units_floor_truncates() {
        assert_eq!(d("1.5").to_units_floor(LAMPORTS), Some(1_500_000_000));
        assert_eq!(d("0.0000000019").to_units_floor(LAMPORTS), Some(1));
        assert_eq!(d("0.0000000009").to_units_floor(LAMPORTS), Some(0));
    }

    #[test]
    fn test_to_units_floor_rejects_negative_and_overflow() {
        assert_eq!(d("-1").to_units_floor(LAMPORTS), None);
        assert_eq!(d("100000000000").to_units_floor(LAMPORTS), None);
    }

    #[test]
    fn test_is_positive() {
        assert!(d("0.1").is_positive());
        assert!(!d("0").is_positive());
        assert!(!d("-0.1").is_positive());
    }

    #[test]
    fn test_canonical_string_drops_trailing_zeros() {
        assert_eq!(d("1.2500").to_canonical_string(), "1.25");
        assert_eq!(Decimal::from_units(3 * LAMPORTS, LAMPORTS).to_string(), "3");
    }

    #[test]
    fn test_decimal_json_serialization() {
        let json = serde_json::to_value(d("123.456")).unwrap();
        assert!(json.is_number());
        assert_eq!(json.to_string(), "123.456");
    }
}
