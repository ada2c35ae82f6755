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
//! │  OUR SOLUTION: Integer minor units (cents)                              │
//! │    Every price, discount, tax and total crosses every boundary as an   │
//! │    i64 number of cents. Formatting happens only for messages.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use petal_core::money::Money;
//!
//! let price = Money::from_cents(2500); // $25.00
//! let line = price * 2;                // $50.00
//! let ten_pct = line.percentage(10);   // $5.00
//! assert_eq!(ten_pct.cents(), 500);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: refunds and discount adjustments can be negative
/// - **transparent serde**: serialises as a bare integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ```rust
    /// use petal_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // Represents $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
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
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// `None` when the sum leaves the i64 range.
    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_sub(self, other: Money) -> Option<Money> {
        match self.0.checked_sub(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_mul(self, qty: i64) -> Option<Money> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Returns `percent`% of this amount, rounded half away from zero.
    ///
    /// ## Implementation
    /// Integer math only: `(|amount| * percent + 50) / 100`, sign restored.
    /// i128 keeps large carts from overflowing.
    ///
    /// ```rust
    /// use petal_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(10000).percentage(10).cents(), 1000);
    /// // 12.5 cents rounds up
    /// assert_eq!(Money::from_cents(125).percentage(10).cents(), 13);
    /// ```
    pub fn percentage(&self, percent: i64) -> Money {
        let magnitude = (self.0 as i128).abs() * percent as i128;
        let rounded = (magnitude + 50) / 100;
        let signed = if self.0 < 0 { -rounded } else { rounded };
        Money(signed as i64)
    }

    /// Returns the smaller of two amounts.
    #[inline]
    pub fn min(self, other: Money) -> Money {
        if self.0 <= other.0 {
            self
        } else {
            other
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
// Formatting
// =============================================================================

/// Renders amounts for human-readable messages.
///
/// ## Note
/// Used only inside error and notification text. No calculation ever
/// goes through a formatted string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoneyFormat {
    symbol: String,
}

impl MoneyFormat {
    pub fn new(symbol: impl Into<String>) -> Self {
        MoneyFormat {
            symbol: symbol.into(),
        }
    }

    /// Formats an amount as `{sign}{symbol}{major}.{minor:02}`.
    ///
    /// ```rust
    /// use petal_core::money::{Money, MoneyFormat};
    ///
    /// let eur = MoneyFormat::new("€");
    /// assert_eq!(eur.format(Money::from_cents(-550)), "-€5.50");
    /// ```
    pub fn format(&self, amount: Money) -> String {
        let cents = amount.cents();
        let sign = if cents < 0 { "-" } else { "" };
        let abs = cents.unsigned_abs();
        format!("{}{}{}.{:02}", sign, self.symbol, abs / 100, abs % 100)
    }
}

impl Default for MoneyFormat {
    fn default() -> Self {
        MoneyFormat::new("$")
    }
}

/// Display uses the default `$` format. Prefer an explicit [`MoneyFormat`]
/// when a storefront currency is configured.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&MoneyFormat::default().format(*self))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

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

/// Multiplication by a quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
