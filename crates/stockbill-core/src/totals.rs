//! # Invoice Totals and Numbering
//!
//! Pure math behind a sale: line subtotals, the tax line, the grand total,
//! and the `F-####` invoice number format.
//!
//! ## Composition
//! ```text
//! PricedLine { qty: 2, unit: 10.00 } ──► 20.00 ┐
//! PricedLine { qty: 1, unit:  5.00 } ──►  5.00 ┴─► subtotal 25.00
//!                                                     │
//!                                  calculate_tax(16%) ├─► tax    4.00
//!                                                     └─► total 29.00
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::TaxRate;
use crate::INVOICE_PREFIX;

// =============================================================================
// Priced Line
// =============================================================================

/// A line whose unit price has been captured from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl PricedLine {
    pub fn new(product_id: impl Into<String>, quantity: i64, unit_price: Money) -> Self {
        PricedLine {
            product_id: product_id.into(),
            quantity,
            unit_price,
        }
    }

    /// quantity × unit price.
    pub fn subtotal(&self) -> Result<Money, ValidationError> {
        self.unit_price
            .checked_mul_quantity(self.quantity)
            .ok_or_else(|| too_large("line subtotal"))
    }
}

// =============================================================================
// Sale Totals
// =============================================================================

/// Financial totals of a sale.
///
/// Invariant: `total == subtotal + tax` and `tax == subtotal.calculate_tax(rate)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

impl SaleTotals {
    /// Totals for a set of priced lines.
    ///
    /// ## Errors
    /// `AmountTooLarge` when a line subtotal, the sum or the taxed total
    /// does not fit in `i64` cents.
    pub fn compute(lines: &[PricedLine], rate: TaxRate) -> Result<Self, ValidationError> {
        let mut subtotal = Money::zero();
        for line in lines {
            subtotal = subtotal
                .checked_add(line.subtotal()?)
                .ok_or_else(|| too_large("sale subtotal"))?;
        }
        SaleTotals::from_subtotal(subtotal, rate)
    }

    /// Totals for an already summed subtotal.
    pub fn from_subtotal(subtotal: Money, rate: TaxRate) -> Result<Self, ValidationError> {
        let tax = subtotal
            .calculate_tax(rate)
            .ok_or_else(|| too_large("sale tax"))?;
        let total = subtotal
            .checked_add(tax)
            .ok_or_else(|| too_large("sale total"))?;

        Ok(SaleTotals { subtotal, tax, total })
    }
}

fn too_large(field: &str) -> ValidationError {
    ValidationError::AmountTooLarge {
        field: field.to_string(),
    }
}

// =============================================================================
// Invoice Numbers
// =============================================================================

/// Formats a sequence value as an invoice number.
///
/// ## Example
/// ```rust
/// use stockbill_core::totals::format_invoice_number;
///
/// assert_eq!(format_invoice_number(1), "F-0001");
/// assert_eq!(format_invoice_number(12345), "F-12345");
/// ```
pub fn format_invoice_number(sequence: i64) -> String {
    format!("{}{:04}", INVOICE_PREFIX, sequence)
}

/// Parses the sequence value back out of an invoice number.
///
/// Returns `None` for numbers that do not follow the `F-####` format.
pub fn parse_invoice_number(number: &str) -> Option<i64> {
    let digits = number.strip_prefix(INVOICE_PREFIX)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_TAX_RATE;
    use proptest::prelude::*;

    #[test]
    fn test_two_line_invoice() {
        let lines = vec![
            PricedLine::new("p1", 2, Money::from_cents(1000)),
            PricedLine::new("p2", 1, Money::from_cents(500)),
        ];
        let totals = SaleTotals::compute(&lines, DEFAULT_TAX_RATE).unwrap();

        assert_eq!(totals.subtotal, Money::from_cents(2500));
        assert_eq!(totals.tax, Money::from_cents(400));
        assert_eq!(totals.total, Money::from_cents(2900));
    }

    #[test]
    fn test_empty_lines_are_zero() {
        let totals = SaleTotals::compute(&[], DEFAULT_TAX_RATE).unwrap();
        assert!(totals.total.is_zero());
    }

    #[test]
    fn test_overflowing_amounts_are_rejected() {
        let huge = Money::from_cents(i64::MAX / 2);

        let err = SaleTotals::compute(&[PricedLine::new("p1", 3, huge)], DEFAULT_TAX_RATE).unwrap_err();
        assert!(matches!(err, ValidationError::AmountTooLarge { ref field } if field == "line subtotal"));

        let two = [PricedLine::new("p1", 1, huge), PricedLine::new("p2", 2, huge)];
        let err = SaleTotals::compute(&two, DEFAULT_TAX_RATE).unwrap_err();
        assert!(matches!(err, ValidationError::AmountTooLarge { ref field } if field == "sale subtotal"));

        // Fits as a subtotal, but not once 16% is added.
        let err = SaleTotals::compute(&[PricedLine::new("p1", 2, huge)], DEFAULT_TAX_RATE).unwrap_err();
        assert!(matches!(err, ValidationError::AmountTooLarge { ref field } if field == "sale total"));
    }

    #[test]
    fn test_invoice_number_format() {
        assert_eq!(format_invoice_number(1), "F-0001");
        assert_eq!(format_invoice_number(42), "F-0042");
        assert_eq!(format_invoice_number(9999), "F-9999");
        assert_eq!(format_invoice_number(10000), "F-10000");
    }

    #[test]
    fn test_parse_invoice_number() {
        assert_eq!(parse_invoice_number("F-0001"), Some(1));
        assert_eq!(parse_invoice_number("F-10000"), Some(10000));
        assert_eq!(parse_invoice_number("F-"), None);
        assert_eq!(parse_invoice_number("X-0001"), None);
        assert_eq!(parse_invoice_number("F-00a1"), None);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: total equals round(Σ(qty × price) × 1.16) to the cent.
        #[test]
        fn total_is_subtotal_times_one_sixteen(
            lines in prop::collection::vec((1i64..500i64, 0i64..1_000_000i64), 1..20)
        ) {
            let priced: Vec<PricedLine> = lines
                .iter()
                .enumerate()
                .map(|(i, (qty, price))| PricedLine::new(format!("p{i}"), *qty, Money::from_cents(*price)))
                .collect();

            let totals = SaleTotals::compute(&priced, DEFAULT_TAX_RATE).unwrap();

            let raw: i64 = lines.iter().map(|(qty, price)| qty * price).sum();
            // round half up of raw × 1.16, in cents
            let expected = (raw * 116 + 50) / 100;

            prop_assert_eq!(totals.subtotal.cents(), raw);
            prop_assert_eq!(totals.total.cents(), expected);
            prop_assert_eq!(Some(totals.total), totals.subtotal.checked_add(totals.tax));
        }
    }
}
