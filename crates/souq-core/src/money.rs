//! # Money and Rates
//!
//! Amounts are integer thousandths (three-decimal currencies such as KWD):
//! `17.250` is stored, summed and compared as `17250`. Percentages are
//! basis points and only ever meet money through [`Money::percentage`],
//! which rounds half up once per application.
//!
//! | Value            | Stored   |
//! |------------------|----------|
//! | 20.000 wallet    | `20000`  |
//! | 15% tax          | `1500`   |
//! | 10.500 credited  | `10500`  |
//!
//! ## Usage
//! ```rust
//! use souq_core::money::{Money, Rate};
//!
//! let price = Money::from_minor(2_500);        // 2.500
//! let line = price.multiply_quantity(4);       // 10.000
//! let tax = line.percentage(Rate::from_bps(1500));
//!
//! assert_eq!(line.minor(), 10_000);
//! assert_eq!(tax.minor(), 1_500);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

/// Number of minor units in one major unit (three decimal places).
pub const MINOR_PER_MAJOR: i64 = 1000;

/// Number of decimal places carried by [`Money`].
pub const DECIMAL_PLACES: usize = 3;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in minor units (thousandths).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative deltas for refunds and adjustments
/// - **Transparent for sqlx**: Stored as a plain INTEGER column
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ## Example
    /// ```rust
    /// use souq_core::money::Money;
    ///
    /// let amount = Money::from_minor(17_250); // 17.250
    /// assert_eq!(amount.minor(), 17_250);
    /// ```
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use souq_core::money::Money;
    ///
    /// let unit_price = Money::from_minor(2_500);
    /// assert_eq!(unit_price.multiply_quantity(3).minor(), 7_500);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns `rate` of this amount, rounded half-up to the nearest minor unit.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`, in i128 to avoid
    /// overflow on large amounts.
    ///
    /// ## Example
    /// ```rust
    /// use souq_core::money::{Money, Rate};
    ///
    /// let condition_total = Money::from_minor(10_000); // 10.000
    /// let half = condition_total.percentage(Rate::from_bps(5000));
    /// assert_eq!(half.minor(), 5_000);
    /// ```
    pub fn percentage(&self, rate: Rate) -> Money {
        let scaled = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money(scaled as i64)
    }

    /// Subtracts `other`, never going below zero.
    #[inline]
    pub fn saturating_sub_to_zero(self, other: Money) -> Money {
        if other.0 >= self.0 {
            Money::zero()
        } else {
            Money(self.0 - other.0)
        }
    }

    /// Clamps negative values to zero.
    #[inline]
    pub fn non_negative(self) -> Money {
        if self.0 < 0 {
            Money::zero()
        } else {
            self
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Displays money with three decimals, e.g. `17.250`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let units = self.0.unsigned_abs();
        let per_major = MINOR_PER_MAJOR as u64;
        write!(f, "{}{}.{:03}", sign, units / per_major, units % per_major)
    }
}

/// Error returned when a decimal string cannot be read as [`Money`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid money amount: '{0}'")]
pub struct ParseMoneyError(pub String);

/// Parses decimal strings such as `"17.250"`, `"17.25"`, `"17"` or `"-3.5"`.
///
/// More than three fractional digits are rejected rather than rounded, since
/// gateways that report such amounts are reporting something we cannot settle.
impl FromStr for Money {
    type Err = ParseMoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let err = || ParseMoneyError(s.to_string());

        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (whole, fraction) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(err());
        }
        if fraction.len() > DECIMAL_PLACES {
            return Err(err());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }

        let major: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| err())?
        };
        let mut minor: i64 = 0;
        if !fraction.is_empty() {
            let padded = format!("{:0<width$}", fraction, width = DECIMAL_PLACES);
            minor = padded.parse().map_err(|_| err())?;
        }

        let value = major
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|m| m.checked_add(minor))
            .ok_or_else(err)?;

        Ok(Money(if negative { -value } else { value }))
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Rate
// =============================================================================

/// A rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1500 bps = 15% (tax), 5000 bps = 50% (percentage reward)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Creates a rate from a fraction, e.g. `0.15` for 15%.
    ///
    /// Only for reading human-entered settings; never used on amounts.
    pub fn from_fraction(fraction: f64) -> Self {
        Rate((fraction * 10000.0).round().max(0.0) as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor() {
        let money = Money::from_minor(17_250);
        assert_eq!(money.minor(), 17_250);
        assert!(money.is_positive());
        assert!(Money::from_minor(-1).is_negative());
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_minor(17_250).to_string(), "17.250");
        assert_eq!(Money::from_minor(5).to_string(), "0.005");
        assert_eq!(Money::from_minor(-5_500).to_string(), "-5.500");
        assert_eq!(Money::zero().to_string(), "0.000");
    }

    #[test]
    fn test_parse() {
        assert_eq!("17.250".parse::<Money>().unwrap().minor(), 17_250);
        assert_eq!("17.25".parse::<Money>().unwrap().minor(), 17_250);
        assert_eq!("17".parse::<Money>().unwrap().minor(), 17_000);
        assert_eq!(".5".parse::<Money>().unwrap().minor(), 500);
        assert_eq!("-3.5".parse::<Money>().unwrap().minor(), -3_500);
        assert_eq!(" 1.000 ".parse::<Money>().unwrap().minor(), 1_000);

        assert!("".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
        assert!("1.2345".parse::<Money>().is_err());
        assert!("1,5".parse::<Money>().is_err());
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        let amount = Money::from_minor(15_000);
        assert_eq!(amount.percentage(Rate::from_bps(1500)).minor(), 2_250);

        // 0.333 * 50% = 0.1665 -> 0.167
        assert_eq!(Money::from_minor(333).percentage(Rate::from_bps(5000)).minor(), 167);
    }

    #[test]
    fn test_saturating_sub() {
        let a = Money::from_minor(1_000);
        assert_eq!(a.saturating_sub_to_zero(Money::from_minor(400)).minor(), 600);
        assert_eq!(a.saturating_sub_to_zero(Money::from_minor(4_000)), Money::zero());
    }

    #[test]
    fn test_sum() {
        let total: Money = [1_000, 2_500, 250].iter().map(|m| Money::from_minor(*m)).sum();
        assert_eq!(total.minor(), 3_750);
    }

    #[test]
    fn test_rate_from_fraction() {
        assert_eq!(Rate::from_fraction(0.15).bps(), 1500);
        assert_eq!(Rate::from_fraction(0.0825).bps(), 825);
        assert!(Rate::from_fraction(-1.0).is_zero());
    }
}
