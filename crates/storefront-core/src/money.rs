//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Integer Cents
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  VAT-inclusive pricing makes it worse:                                  │
//! │    €44.03 / 1.21 = 36.388429752...  → which cent is the VAT?           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents + explicit rounding                        │
//! │    4403 cents × 10000 / 12100 = 3639 cents ex-VAT (half up)            │
//! │    VAT = 4403 − 3639 = 764 cents, so the parts always sum exactly      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use storefront_core::money::Money;
//!
//! let price = Money::from_cents(4999); // €49.99
//! let line = price * 2;                // €99.98
//! assert_eq!(line.to_decimal_string(), "99.98");
//!
//! let parsed = Money::parse_decimal("12.5").unwrap();
//! assert_eq!(parsed.cents(), 1250);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in euro cents.
///
/// ## Design Decisions
/// - **i64 (signed)**: discounts are subtracted as Money too
/// - **Single field tuple struct**: zero-cost wrapper over i64
/// - **No float constructor** except the checked [`Money::try_from_major`]
///
/// ## Where Money Flows
/// ```text
/// Product.price_cents ──► CartLine.unit_price ──► line total
///                                                     │
///             subtotal ◄──────────────────────────────┘
///                 │
///                 ├──► VAT extraction (informational)
///                 ├──► discount amount
///                 └──► grand total = subtotal + shipping − discount
///                                         │
///                                         ▼
///                         payment intent / capture comparison
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // €10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole euros.
    #[inline]
    pub const fn from_euros(euros: i64) -> Self {
        Money(euros * 100)
    }

    /// Converts a major-unit float (e.g. a JSON `12.34`) into cents.
    ///
    /// Rejects negative and non-finite inputs with `InvalidAmount`; the value
    /// is rounded to the nearest cent.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::money::Money;
    ///
    /// assert_eq!(Money::try_from_major(44.03).unwrap().cents(), 4403);
    /// assert!(Money::try_from_major(-1.0).is_err());
    /// assert!(Money::try_from_major(f64::NAN).is_err());
    /// ```
    pub fn try_from_major(amount: f64) -> CoreResult<Self> {
        if !amount.is_finite() {
            return Err(CoreError::invalid_amount("amount must be finite"));
        }
        if amount < 0.0 {
            return Err(CoreError::invalid_amount("amount must not be negative"));
        }
        let cents = (amount * 100.0).round();
        if cents > i64::MAX as f64 {
            return Err(CoreError::invalid_amount("amount is too large"));
        }
        Ok(Money(cents as i64))
    }

    /// Parses a non-negative decimal string with at most two fraction digits.
    ///
    /// Accepts `"12"`, `"12.3"`, `"12.34"`. Anything else is `InvalidAmount`.
    pub fn parse_decimal(input: &str) -> CoreResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(CoreError::invalid_amount("empty amount"));
        }

        let (whole, fraction) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };

        if whole.is_empty()
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
            || fraction.len() > 2
        {
            return Err(CoreError::invalid_amount(format!(
                "'{}' is not a decimal amount",
                trimmed
            )));
        }

        let whole: i64 = whole
            .parse()
            .map_err(|_| CoreError::invalid_amount("amount is too large"))?;
        let fraction_cents = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().unwrap_or(0) * 10,
            _ => fraction.parse::<i64>().unwrap_or(0),
        };

        whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction_cents))
            .map(Money)
            .ok_or_else(|| CoreError::invalid_amount("amount is too large"))
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-euro portion.
    #[inline]
    pub const fn euros(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
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

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
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

    /// Formats as a plain decimal string (`"44.03"`), as sent to providers.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{}.{:02}", sign, self.euros().abs(), self.cents_part())
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(2999);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 8997);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns `bps` basis points of this amount, rounded half up.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::money::Money;
    ///
    /// let subtotal = Money::from_cents(10000); // €100.00
    /// assert_eq!(subtotal.percentage(1000).cents(), 1000); // 10% = €10.00
    /// assert_eq!(Money::from_cents(1005).percentage(1000).cents(), 101); // 100.5 → 101
    /// ```
    pub fn percentage(&self, bps: u32) -> Money {
        let raw = (self.0 as i128 * bps as i128 + 5000) / 10000;
        Money(raw as i64)
    }

    /// Splits a tax-inclusive amount into its ex-tax part, rounded half up.
    ///
    /// ## Formula
    /// ```text
    /// ex_tax = round(amount × 10000 / (10000 + bps))
    /// tax    = amount − ex_tax
    /// ```
    ///
    /// Returns `(ex_tax, tax)`. The two parts always add back to `self`.
    pub fn extract_inclusive_tax(&self, rate: TaxRate) -> (Money, Money) {
        let denominator = 10000_i128 + rate.bps() as i128;
        let numerator = self.0 as i128 * 10000;
        // half-up on integers: (2n + d) / 2d
        let ex_tax = (2 * numerator + denominator) / (2 * denominator);
        let ex_tax = Money(ex_tax as i64);
        (ex_tax, *self - ex_tax)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display for logs and error messages. The cart UI formats its own prices.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}€{}.{:02}", sign, self.euros().abs(), self.cents_part())
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

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
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
