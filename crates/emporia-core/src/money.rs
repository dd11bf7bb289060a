//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A 5% tier discount on 300,000:                                         │
//! │    300000 * 0.05 can drift; 300000 * 5 / 100 floored cannot.           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Units                                            │
//! │    Every amount is an i64 count of the smallest currency unit.         │
//! │    Discounts use floor division, so the store never over-discounts.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use emporia_core::money::Money;
//!
//! let subtotal = Money::from_units(300_000);
//! let discount = subtotal.percent(5);
//! assert_eq!(discount.units(), 15_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: Intermediate arithmetic may dip negative; public
///   pricing outputs are clamped before they leave the composer
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from currency units.
    ///
    /// ## Example
    /// ```rust
    /// use emporia_core::money::Money;
    ///
    /// let fee = Money::from_units(20_000);
    /// assert_eq!(fee.units(), 20_000);
    /// ```
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Money(units)
    }

    /// Returns the value in currency units.
    #[inline]
    pub const fn units(&self) -> i64 {
        self.0
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

    /// Calculates a floored percentage of this amount.
    ///
    /// ## Why Floor?
    /// Discount math always rounds in the store's favor. `floor(S × p / 100)`
    /// is the contract for both tier discounts and percent vouchers.
    ///
    /// ## Example
    /// ```rust
    /// use emporia_core::money::Money;
    ///
    /// let subtotal = Money::from_units(999);
    /// assert_eq!(subtotal.percent(5).units(), 49); // not 49.95
    /// ```
    pub fn percent(&self, pct: u32) -> Money {
        // i128 intermediate to prevent overflow on large amounts
        let amount = (self.0 as i128 * pct as i128).div_euclid(100) as i64;
        Money(amount)
    }

    /// Subtracts, flooring the result at zero.
    ///
    /// Used wherever a discount must not push an amount negative.
    #[inline]
    pub fn saturating_sub(&self, other: Money) -> Money {
        Money((self.0 - other.0).max(0))
    }

    /// Returns the smaller of two amounts.
    #[inline]
    pub fn min(&self, other: Money) -> Money {
        Money(self.0.min(other.0))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for debugging and logs. The frontend formats amounts for display
/// to handle localization properly.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}₫", self.0)
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

// =============================================================================
// Unit Tests
// =============================================================================
