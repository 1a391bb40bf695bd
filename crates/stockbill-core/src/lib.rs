//! # stockbill-core: Pure Business Logic for stockbill
//!
//! Domain types, money arithmetic, invoice totals and validation for the
//! inventory/billing system. Nothing in here touches a database.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        stockbill Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              stockbill-ledger (Sale Ledger services)            │   │
//! │  │    create_sale, process_return, delete_sale, catalog, reports  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ stockbill-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  totals   │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │ SaleTotals│  │   rules   │  │   │
//! │  │   │   Sale    │  │  TaxRate  │  │  numbers  │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 stockbill-db (Database Layer)                   │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Client, Sale, LineItem, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`totals`] - Invoice totals and invoice number formatting
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use stockbill_core::money::Money;
//! use stockbill_core::totals::{PricedLine, SaleTotals};
//! use stockbill_core::DEFAULT_TAX_RATE;
//!
//! let lines = vec![
//!     PricedLine::new("p1", 2, Money::from_cents(1000)),
//!     PricedLine::new("p2", 1, Money::from_cents(500)),
//! ];
//! let totals = SaleTotals::compute(&lines, DEFAULT_TAX_RATE).unwrap();
//!
//! assert_eq!(totals.subtotal.cents(), 2500);
//! assert_eq!(totals.tax.cents(), 400);
//! assert_eq!(totals.total.cents(), 2900);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Sales tax applied to every invoice (IVA, 16%).
pub const DEFAULT_TAX_RATE: TaxRate = TaxRate::from_bps(1600);

/// Prefix of every invoice number (`F-0001`, `F-0002`, ...).
pub const INVOICE_PREFIX: &str = "F-";

/// Maximum line items allowed in a single sale.
pub const MAX_SALE_LINES: usize = 100;

/// Maximum quantity of a single line item.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 10000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 9_999;
