//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Prices, costs and totals are fixed-point with 2 fraction digits.      │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    20.00 × 3 = 6000 cents, 10% off = 5400 cents = 54.00                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use stockflow_core::money::Money;
//! use stockflow_core::types::DiscountRate;
//!
//! let unit_price = Money::from_cents(2000); // 20.00
//! let subtotal = unit_price.checked_mul_quantity(3).unwrap(); // 60.00
//! let total = subtotal.apply_discount(DiscountRate::from_bps(1000)); // 10% off
//! assert_eq!(total.cents(), 5400);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::DiscountRate;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: differences (profit, reversals) may be negative
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON serialization
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.cost_price ──► LineItem.purchase_price (snapshot, frozen)      │
/// │                                                                         │
/// │  LineItem.unit_price × quantity ──► subtotal ──► discount ──► total    │
/// │                                                                         │
/// │  LineItem.unit_price ──► discounted unit price ──► Outflow description │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use stockflow_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // Represents 10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies money by a quantity, `None` on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use stockflow_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.checked_mul_quantity(3), Some(Money::from_cents(897)));
    /// assert_eq!(unit_price.checked_mul_quantity(i64::MAX), None);
    /// ```
    #[inline]
    pub const fn checked_mul_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds two amounts, `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Applies a percentage discount and returns the discounted value.
    ///
    /// The result is `self × (1 − rate)` rounded to the cent, half away from
    /// zero (half-up for the non-negative amounts documents work with). The
    /// net value is rounded directly; rounding the discount first and then
    /// subtracting would round a half cent the wrong way.
    ///
    /// ## Example
    /// ```rust
    /// use stockflow_core::money::Money;
    /// use stockflow_core::types::DiscountRate;
    ///
    /// // 0.05 with 10% off = 0.045 → 0.05
    /// let price = Money::from_cents(5);
    /// assert_eq!(price.apply_discount(DiscountRate::from_bps(1000)).cents(), 5);
    /// ```
    pub fn apply_discount(&self, rate: DiscountRate) -> Money {
        let keep_bps = (10_000 - rate.bps().min(10_000)) as i128;
        Money::from_cents(round_bps_half_up(self.0 as i128 * keep_bps))
    }
}

/// Divides a value scaled by 10_000 back to cents, half away from zero.
fn round_bps_half_up(scaled: i128) -> i64 {
    let rounded = if scaled >= 0 {
        (scaled + 5_000) / 10_000
    } else {
        (scaled - 5_000) / 10_000
    };
    rounded as i64
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering (`-12.34`), used in audit descriptions.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor_part())
    }
}

/// Parses a decimal amount with at most two fraction digits (`"20"`,
/// `"20.5"`, `"20.50"`, `"-3.10"`).
impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: reason.to_string(),
        };

        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (major_str, minor_str) = digits.split_once('.').unwrap_or((digits, ""));
        if major_str.is_empty() || !major_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("expected digits before the decimal point"));
        }
        if minor_str.len() > 2 || !minor_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("at most two fraction digits are allowed"));
        }

        let major: i64 = major_str
            .parse()
            .map_err(|_| invalid("amount is too large"))?;
        let minor: i64 = match minor_str.len() {
            0 => 0,
            1 => minor_str.parse::<i64>().map_err(|_| invalid("bad fraction"))? * 10,
            _ => minor_str.parse().map_err(|_| invalid("bad fraction"))?,
        };

        let cents = major
            .checked_mul(100)
            .and_then(|c| c.checked_add(minor))
            .ok_or_else(|| invalid("amount is too large"))?;

        Ok(Money(if negative { -cents } else { cents }))
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
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

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_parse() {
        assert_eq!("20".parse::<Money>().unwrap().cents(), 2000);
        assert_eq!("20.5".parse::<Money>().unwrap().cents(), 2050);
        assert_eq!("20.05".parse::<Money>().unwrap().cents(), 2005);
        assert_eq!("-3.10".parse::<Money>().unwrap().cents(), -310);
        assert!("".parse::<Money>().is_err());
        assert!("1.234".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
        assert!(".50".parse::<Money>().is_err());
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!(a.checked_mul_quantity(3), Some(Money::from_cents(3000)));
        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_checked_arithmetic_reports_overflow() {
        let price = Money::from_cents(9_999_999_999);
        assert_eq!(price.checked_mul_quantity(i32::MAX as i64 * 2), None);
        assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);
        assert_eq!(
            Money::from_cents(1).checked_add(Money::from_cents(2)),
            Some(Money::from_cents(3))
        );
    }

    #[test]
    fn test_apply_discount() {
        let subtotal = Money::from_cents(6000);
        assert_eq!(subtotal.apply_discount(DiscountRate::from_bps(1000)).cents(), 5400);
        assert_eq!(subtotal.apply_discount(DiscountRate::zero()).cents(), 6000);
        assert_eq!(subtotal.apply_discount(DiscountRate::from_bps(10_000)).cents(), 0);
    }

    #[test]
    fn test_apply_discount_rounds_half_up() {
        // 0.15 × 0.5 = 0.075 → 0.08
        let price = Money::from_cents(15);
        assert_eq!(price.apply_discount(DiscountRate::from_bps(5000)).cents(), 8);

        // 9.99 × 0.875 = 8.74125 → 8.74
        let price = Money::from_cents(999);
        assert_eq!(price.apply_discount(DiscountRate::from_bps(1250)).cents(), 874);

        // 0.01 × 0.5 = 0.005 → 0.01 (half-up, not half-even)
        let price = Money::from_cents(1);
        assert_eq!(price.apply_discount(DiscountRate::from_bps(5000)).cents(), 1);
    }

    #[test]
    fn test_apply_discount_negative_rounds_away_from_zero() {
        let refund = Money::from_cents(-15);
        assert_eq!(refund.apply_discount(DiscountRate::from_bps(5000)).cents(), -8);
    }
}
