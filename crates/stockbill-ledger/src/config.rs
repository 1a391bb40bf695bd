//! # Ledger Configuration
//!
//! Settings loaded once at startup and read-only afterwards.
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`STOCKBILL_*`)
//! 2. Defaults (this file)

use serde::{Deserialize, Serialize};
use tracing::warn;

use stockbill_core::{Money, TaxRate};

/// Ledger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Tax applied to every sale subtotal.
    /// Default: 16%
    pub tax_rate: TaxRate,

    /// How many times a sale insert is tried when its invoice number
    /// collides with an existing one. Always at least 1.
    pub numbering_attempts: u32,

    /// Currency symbol (for display)
    pub currency_symbol: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            tax_rate: TaxRate::default(),
            numbering_attempts: 3,
            currency_symbol: "$".to_string(),
        }
    }
}

impl LedgerConfig {
    /// Creates a config from environment variables and defaults.
    ///
    /// ## Environment Variables
    /// - `STOCKBILL_TAX_RATE`: tax percentage (e.g., "16")
    /// - `STOCKBILL_NUMBERING_ATTEMPTS`: insert attempts per sale (e.g., "5")
    /// - `STOCKBILL_CURRENCY_SYMBOL`: display symbol (e.g., "MX$")
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = LedgerConfig::default();

        if let Some(raw) = lookup("STOCKBILL_TAX_RATE") {
            match raw.trim().parse::<f64>() {
                Ok(pct) if (0.0..=100.0).contains(&pct) => {
                    config.tax_rate = TaxRate::from_percentage(pct);
                }
                _ => warn!(value = %raw, "Ignoring invalid STOCKBILL_TAX_RATE"),
            }
        }

        if let Some(raw) = lookup("STOCKBILL_NUMBERING_ATTEMPTS") {
            match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => config.numbering_attempts = n,
                _ => warn!(value = %raw, "Ignoring invalid STOCKBILL_NUMBERING_ATTEMPTS"),
            }
        }

        if let Some(symbol) = lookup("STOCKBILL_CURRENCY_SYMBOL") {
            config.currency_symbol = symbol;
        }

        config
    }

    /// Sets the tax rate.
    pub fn tax_rate(mut self, rate: TaxRate) -> Self {
        self.tax_rate = rate;
        self
    }

    /// Sets the numbering attempts (clamped to at least 1).
    pub fn numbering_attempts(mut self, attempts: u32) -> Self {
        self.numbering_attempts = attempts.max(1);
        self
    }

    /// Formats a cent amount as a currency string.
    ///
    /// ```rust
    /// use stockbill_ledger::LedgerConfig;
    ///
    /// let config = LedgerConfig::default();
    /// assert_eq!(config.format_currency(1234), "$12.34");
    /// assert_eq!(config.format_currency(-5), "-$0.05");
    /// ```
    pub fn format_currency(&self, cents: i64) -> String {
        let decimal = Money::from_cents(cents).to_decimal_string();
        match decimal.strip_prefix('-') {
            Some(amount) => format!("-{}{amount}", self.currency_symbol),
            None => format!("{}{decimal}", self.currency_symbol),
        }
    }
}
