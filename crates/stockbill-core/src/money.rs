//! # Money Module
//!
//! Integer-cent amounts for prices, line subtotals and invoice totals.
//!
//! ```text
//! Product.price_cents ──► LineItem.unit_price (captured) ──► × qty ──► line subtotal
//!                                                                        │
//!                         Sale.subtotal ◄──────────── Σ (checked) ───────┘
//!                              │
//!                              ├──► calculate_tax(16%) ──► Sale.tax
//!                              └──► + tax (checked) ────► Sale.total
//! ```
//!
//! Every operation that can leave the `i64` range is checked and returns
//! `None` instead of wrapping; the totals layer turns that into a
//! validation error.
//!
//! ## Usage
//! ```rust
//! use stockbill_core::money::Money;
//!
//! let line = Money::from_cents(1099).checked_mul_quantity(2).unwrap();
//! assert_eq!(line.to_decimal_string(), "21.98");
//! assert!(Money::from_cents(i64::MAX).checked_mul_quantity(2).is_none());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::types::TaxRate;

/// An amount in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// `self + other`, or `None` on overflow.
    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Unit price times quantity, or `None` on overflow.
    ///
    /// ```rust
    /// use stockbill_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(299).checked_mul_quantity(3).unwrap().cents(), 897);
    /// ```
    #[inline]
    pub const fn checked_mul_quantity(self, quantity: i64) -> Option<Money> {
        match self.0.checked_mul(quantity) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Tax on this amount, rounded half up to the cent.
    ///
    /// Computed as `(cents × bps + 5000) / 10000` in `i128`. Returns `None`
    /// only when the result does not fit back in an `i64`.
    ///
    /// ```rust
    /// use stockbill_core::money::Money;
    /// use stockbill_core::types::TaxRate;
    ///
    /// let tax = Money::from_cents(2500).calculate_tax(TaxRate::from_bps(1600));
    /// assert_eq!(tax, Some(Money::from_cents(400)));
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Option<Money> {
        let scaled = self.0 as i128 * rate.bps() as i128;
        let rounded = if scaled >= 0 {
            (scaled + 5000) / 10000
        } else {
            (scaled - 5000) / 10000
        };
        i64::try_from(rounded).ok().map(Money)
    }

    /// Plain two-decimal form (`"29.00"`, `"-0.05"`), used for report cells.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        format!("{}{}.{:02}", sign, magnitude / 100, magnitude % 100)
    }
}

/// `$10.99`. Configured currency formatting lives in the ledger config.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decimal = self.to_decimal_string();
        match decimal.strip_prefix('-') {
            Some(magnitude) => write!(f, "-${magnitude}"),
            None => write!(f, "${decimal}"),
        }
    }
}
