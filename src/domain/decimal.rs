//! Exact decimal numeric type backed by rust_decimal.
//!
//! Every monetary quantity in the engine flows through [`Decimal`]. Values are
//! kept at full precision through all stages and only rounded when a result is
//! prepared for display (`round_usd` / `round_local`).

use rust_decimal::{Decimal as RustDecimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::str::FromStr;
use thiserror::Error;

/// Decimal places kept for USD display values.
pub const USD_DISPLAY_DP: u32 = 2;

/// An arithmetic result fell outside the representable decimal range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("decimal arithmetic out of range")]
pub struct Overflow;

/// Exact decimal numeric type for financial calculations.
///
/// Backed by rust_decimal to avoid floating-point drift.
/// Serializes to JSON number (not string) by default.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Decimal {
    /// Create a Decimal from a RustDecimal.
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Decimal)
    }

    /// Parse a Decimal permissively: plain or scientific notation, surrounding
    /// whitespace ignored. Anything unparsable becomes zero.
    pub fn from_str_lenient(s: &str) -> Self {
        Self::parse_number(s).unwrap_or_default()
    }

    /// Parse plain or scientific notation. `None` when the text is not a
    /// number or does not fit the decimal range.
    pub fn parse_number(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Some(Decimal::zero());
        }
        RustDecimal::from_str(trimmed)
            .or_else(|_| RustDecimal::from_scientific(trimmed))
            .map(Decimal)
            .ok()
    }

    /// Format the Decimal as a canonical string (no exponent notation).
    pub fn to_canonical_string(&self) -> String {
        let normalized = self.0.normalize();
        format!("{}", normalized)
    }

    /// Get the underlying RustDecimal.
    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    /// The additive identity (0).
    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    /// The multiplicative identity (1).
    pub fn one() -> Self {
        Decimal(RustDecimal::ONE)
    }

    pub fn from_i64(value: i64) -> Self {
        Decimal(RustDecimal::from(value))
    }

    /// Returns true if the value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    pub fn checked_add(self, rhs: Decimal) -> Result<Decimal, Overflow> {
        self.0.checked_add(rhs.0).map(Decimal).ok_or(Overflow)
    }

    pub fn checked_sub(self, rhs: Decimal) -> Result<Decimal, Overflow> {
        self.0.checked_sub(rhs.0).map(Decimal).ok_or(Overflow)
    }

    pub fn checked_mul(self, rhs: Decimal) -> Result<Decimal, Overflow> {
        self.0.checked_mul(rhs.0).map(Decimal).ok_or(Overflow)
    }

    /// Division that yields zero instead of failing when `rhs` is zero.
    ///
    /// # Errors
    /// Returns [`Overflow`] when the quotient does not fit.
    pub fn div_or_zero(self, rhs: Decimal) -> Result<Decimal, Overflow> {
        if rhs.is_zero() {
            return Ok(Decimal::zero());
        }
        self.0.checked_div(rhs.0).map(Decimal).ok_or(Overflow)
    }

    /// Sum that reports overflow instead of panicking.
    pub fn checked_sum<I>(values: I) -> Result<Decimal, Overflow>
    where
        I: IntoIterator<Item = Decimal>,
    {
        values
            .into_iter()
            .try_fold(Decimal::zero(), |acc, v| acc.checked_add(v))
    }

    /// Round to cents for USD display (half away from zero).
    pub fn round_usd(&self) -> Self {
        self.round_dp(USD_DISPLAY_DP)
    }

    /// Round to whole units for local-currency (Gs) display.
    pub fn round_local(&self) -> Self {
        self.round_dp(0)
    }

    fn round_dp(&self, dp: u32) -> Self {
        Decimal(
            self.0
                .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
                .normalize(),
        )
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

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

// Operators panic on overflow. Engine code uses the `checked_*` methods.
impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

impl Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Decimal {
        iter.fold(Decimal::zero(), |acc, v| acc + v)
    }
}

impl<'a> Sum<&'a Decimal> for Decimal {
    fn sum<I: Iterator<Item = &'a Decimal>>(iter: I) -> Decimal {
        iter.fold(Decimal::zero(), |acc, v| acc + *v)
    }
}
