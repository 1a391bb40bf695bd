//! # stockbill-ledger: Sale Ledger for stockbill
//!
//! Everything that touches more than one table at a time: reserving stock,
//! billing a sale under a sequential invoice number, returning and
//! deleting sales. Catalog maintenance and report data sit alongside.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         stockbill Ledger                                │
//! │                                                                         │
//! │  caller (UI command, API handler, seed binary)                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 stockbill-ledger (THIS CRATE)                   │   │
//! │  │                                                                 │   │
//! │  │   Ledger ──► SaleComposer ──► InventoryGuard                   │   │
//! │  │         ──► SaleLifecycle ──► (transactional release)          │   │
//! │  │         ──► Catalog · Reports                                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  stockbill-db (repositories) ──► SQLite                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockbill_core::LineRequest;
//! use stockbill_db::{Database, DbConfig};
//! use stockbill_ledger::{Ledger, LedgerConfig};
//!
//! let db = Database::new(DbConfig::new("stockbill.db")).await?;
//! let ledger = Ledger::new(db, LedgerConfig::from_env());
//!
//! let sale = ledger
//!     .composer()
//!     .create_sale(&client_id, &[LineRequest::new(&product_id, 2)])
//!     .await?;
//! println!("{} {}", sale.sale.number, ledger.config().format_currency(sale.sale.total_cents));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod composer;
pub mod config;
pub mod error;
pub mod inventory;
pub mod lifecycle;
pub mod reports;

mod details;

// =============================================================================
// Re-exports
// =============================================================================

pub use catalog::Catalog;
pub use composer::SaleComposer;
pub use config::LedgerConfig;
pub use error::{ApiError, ErrorCode, LedgerError, LedgerResult};
pub use inventory::InventoryGuard;
pub use lifecycle::SaleLifecycle;
pub use reports::{
    ClientReportRow, DateRange, ProductReportRow, ReportData, ReportKind, Reports, SalesReportRow,
};

use stockbill_db::Database;

// =============================================================================
// Ledger
// =============================================================================

/// Entry point holding the database handle and configuration.
///
/// Owned by whoever starts the application and passed down explicitly.
/// Cloning is cheap (the pool is reference counted), so each accessor
/// hands out an independent service.
#[derive(Debug, Clone)]
pub struct Ledger {
    db: Database,
    config: LedgerConfig,
}

impl Ledger {
    pub fn new(db: Database, config: LedgerConfig) -> Self {
        Ledger { db, config }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn inventory(&self) -> InventoryGuard {
        InventoryGuard::new(self.db.clone())
    }

    pub fn composer(&self) -> SaleComposer {
        SaleComposer::new(self.db.clone(), self.config.clone())
    }

    pub fn lifecycle(&self) -> SaleLifecycle {
        SaleLifecycle::new(self.db.clone())
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.db.clone())
    }

    pub fn reports(&self) -> Reports {
        Reports::new(self.db.clone())
    }
}

// =============================================================================
// Test Fixtures
// =============================================================================
