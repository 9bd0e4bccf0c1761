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
//! │  On an invoice:                                                         │
//! │    10 000.00 DH / 3 = 3 333.33 (×3 = 9 999.99)  → Lost 0.01 DH!        │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Centimes + Exact Decimals                        │
//! │    Storage and comparison use i64 centimes.                             │
//! │    Intermediate math (fractional quantities, percentages) uses          │
//! │    rust_decimal and rounds to 2 decimals at every defined step.         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use atelier_core::money::Money;
//! use rust_decimal_macros::dec;
//!
//! // Create from centimes (preferred)
//! let price = Money::from_centimes(1099); // 10.99 DH
//!
//! // Or from an exact decimal amount in dirhams
//! let same = Money::from_decimal(dec!(10.99));
//! assert_eq!(price, same);
//!
//! // NEVER from a float:
//! // let bad = Money::from_float(10.99); // NO SUCH METHOD EXISTS!
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

// =============================================================================
// Rounding
// =============================================================================

/// Rounds a decimal amount to 2 decimal places, half away from zero.
///
/// ## Rules
/// This is THE rounding function of the whole engine. Every monetary
/// quantity is passed through it at every calculation step (line total,
/// discount, net, VAT, TTC), never only at the end. Two documents that
/// round at different points would otherwise disagree by a centime.
///
/// ## Example
/// ```rust
/// use atelier_core::money::round_currency;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(round_currency(dec!(10.005)), dec!(10.01));
/// assert_eq!(round_currency(dec!(10.004)), dec!(10.00));
/// assert_eq!(round_currency(dec!(-10.005)), dec!(-10.01));
/// ```
#[inline]
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in centimes (the smallest MAD unit).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for credit notes and
///   deposit deduction lines
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from centimes.
    ///
    /// ## Example
    /// ```rust
    /// use atelier_core::money::Money;
    ///
    /// let price = Money::from_centimes(1099); // 10.99 DH
    /// assert_eq!(price.centimes(), 1099);
    /// ```
    #[inline]
    pub const fn from_centimes(centimes: i64) -> Self {
        Money(centimes)
    }

    /// Creates a Money value from an exact decimal amount in dirhams.
    ///
    /// The amount is rounded to 2 decimals (half away from zero) before
    /// conversion, so `Money::from_decimal(d)` is always exact.
    ///
    /// ## Example
    /// ```rust
    /// use atelier_core::money::Money;
    /// use rust_decimal_macros::dec;
    ///
    /// assert_eq!(Money::from_decimal(dec!(10.99)).centimes(), 1099);
    /// assert_eq!(Money::from_decimal(dec!(10.005)).centimes(), 1001);
    /// ```
    pub fn from_decimal(amount: Decimal) -> Self {
        let rounded = round_currency(amount) * Decimal::ONE_HUNDRED;
        // After rounding to 2 dp, ×100 is integral; mantissa fits i64 for
        // any realistic invoice amount.
        Money(rounded.trunc().try_into().unwrap_or(i64::MAX))
    }

    /// Returns the value in centimes.
    #[inline]
    pub const fn centimes(&self) -> i64 {
        self.0
    }

    /// Returns the value as an exact decimal amount in dirhams.
    ///
    /// ## Example
    /// ```rust
    /// use atelier_core::money::Money;
    /// use rust_decimal_macros::dec;
    ///
    /// assert_eq!(Money::from_centimes(1099).to_decimal(), dec!(10.99));
    /// ```
    #[inline]
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Returns the whole-dirham portion.
    #[inline]
    pub const fn dirhams(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the centime portion (always 0-99).
    #[inline]
    pub const fn centimes_part(&self) -> i64 {
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

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Returns the larger of two values.
    #[inline]
    pub const fn max(self, other: Self) -> Self {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }

    /// Clamps negative values to zero.
    ///
    /// ## When This Occurs
    /// Balance math: paid deposits can cover the full invoice, and the
    /// remaining balance must never go below zero.
    #[inline]
    pub const fn clamp_non_negative(self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            self
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money as `1234.56 DH`.
///
/// ## Note
/// This is the document-facing MAD format. Thousands separators and
/// localization belong to the rendering layer, not here.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}{}.{:02} DH",
            sign,
            self.dirhams().abs(),
            self.centimes_part()
        )
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

/// Addition of two Money values.
impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

/// Addition assignment (+=).
impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

/// Subtraction of two Money values.
impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

/// Subtraction assignment (-=).
impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Negation (for credit note and deduction lines).
impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// Multiplication by an integer quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

/// Summation of Money iterators.
impl Sum for Money {
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
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_centimes() {
        let money = Money::from_centimes(1099);
        assert_eq!(money.centimes(), 1099);
        assert_eq!(money.dirhams(), 10);
        assert_eq!(money.centimes_part(), 99);
    }

    #[test]
    fn test_decimal_round_trip() {
        let money = Money::from_decimal(dec!(1234.56));
        assert_eq!(money.centimes(), 123_456);
        assert_eq!(money.to_decimal(), dec!(1234.56));
    }

    #[test]
    fn test_round_currency_half_away_from_zero() {
        assert_eq!(round_currency(dec!(10.005)), dec!(10.01));
        assert_eq!(round_currency(dec!(10.004)), dec!(10.00));
        assert_eq!(round_currency(dec!(10.015)), dec!(10.02));
        assert_eq!(round_currency(dec!(-10.005)), dec!(-10.01));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_centimes(1099)), "10.99 DH");
        assert_eq!(format!("{}", Money::from_centimes(500)), "5.00 DH");
        assert_eq!(format!("{}", Money::from_centimes(-550)), "-5.50 DH");
        assert_eq!(format!("{}", Money::from_centimes(0)), "0.00 DH");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_centimes(1000);
        let b = Money::from_centimes(500);

        assert_eq!((a + b).centimes(), 1500);
        assert_eq!((a - b).centimes(), 500);
        assert_eq!((a * 3).centimes(), 3000);
        assert_eq!((-a).centimes(), -1000);
    }

    #[test]
    fn test_sum() {
        let total: Money = [100, 250, -50]
            .iter()
            .map(|c| Money::from_centimes(*c))
            .sum();
        assert_eq!(total.centimes(), 300);
    }

    #[test]
    fn test_clamp_non_negative() {
        assert_eq!(Money::from_centimes(-120).clamp_non_negative().centimes(), 0);
        assert_eq!(Money::from_centimes(120).clamp_non_negative().centimes(), 120);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        let negative = Money::from_centimes(-100);
        assert!(negative.is_negative());
        assert_eq!(negative.abs().centimes(), 100);
    }
}
