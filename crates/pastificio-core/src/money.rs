//! # Money Module
//!
//! Provides the `Money` type for monetary values.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004                                      │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Prices, totals and drawer amounts are i64 cents.                     │
//! │                                                                         │
//! │  THE ONE PLACE FLOATS ENTER: weighed quantities                        │
//! │    0.75 kg × 1240 cents = 930.0 → rounded once to 930 cents            │
//! │    Rounding is explicit and happens at the line or sale total only.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Currency rounding (to the cent) is unrelated to the quantity integrality
//! tolerance in [`crate::quantity`]; the two are never mixed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: drawer discrepancies can be negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **`#[serde(transparent)]`**: serialized as a plain integer of cents
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[serde(transparent)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use pastificio_core::money::Money;
    ///
    /// let price = Money::from_cents(1240); // 12.40
    /// assert_eq!(price.cents(), 1240);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Rounds a fractional amount of cents to the nearest cent
    /// (half away from zero).
    pub fn round_from_cents_f64(raw_cents: f64) -> Self {
        Money(raw_cents.round() as i64)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
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

    /// Amount of `quantity` units priced at `self`, rounded to the cent.
    ///
    /// ## Example
    /// ```rust
    /// use pastificio_core::money::Money;
    ///
    /// let per_kg = Money::from_cents(999);
    /// // 1.5 kg → 1498.5 cents → 1499
    /// assert_eq!(per_kg.times_quantity(1.5).cents(), 1499);
    /// ```
    pub fn times_quantity(&self, quantity: f64) -> Money {
        Money::round_from_cents_f64(self.0 as f64 * quantity)
    }

    /// Total of a set of `(quantity, unit price)` lines.
    ///
    /// The raw line amounts are summed first and rounded once, so the total
    /// is `round(Σ quantity × price)` and not the sum of rounded lines.
    ///
    /// ## Example
    /// ```rust
    /// use pastificio_core::money::Money;
    ///
    /// let price = Money::from_cents(1);
    /// // 0.4 + 0.4 cents: lines round to 0 each, the total rounds to 1
    /// let total = Money::total_of([(0.4, price), (0.4, price)]);
    /// assert_eq!(total.cents(), 1);
    /// ```
    pub fn total_of<I>(lines: I) -> Money
    where
        I: IntoIterator<Item = (f64, Money)>,
    {
        let raw: f64 = lines
            .into_iter()
            .map(|(quantity, price)| price.0 as f64 * quantity)
            .sum();
        Money::round_from_cents_f64(raw)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows money as `$12.40`; the frontend handles localized formatting.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.major().abs(), self.minor())
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

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
