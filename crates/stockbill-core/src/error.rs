//! # Error Types
//!
//! Domain-specific error types for stockbill-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockbill-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  stockbill-db errors                                                   │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  stockbill-ledger errors                                               │
//! │  ├── LedgerError      - CoreError | DbError | failed compensation      │
//! │  └── ApiError         - What callers see (serialized)                  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError → ApiError            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::SaleStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Each variant is a typed business-rule failure that callers can match on;
/// none of them carry storage details.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Client cannot be found.
    #[error("Client not found: {0}")]
    ClientNotFound(String),

    /// Sale cannot be found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Insufficient stock to reserve a line item.
    ///
    /// ## User Workflow
    /// ```text
    /// New sale: 3 × PAPEL-A4
    ///      │
    ///      ▼
    /// Reserve: stock=2
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "PAPEL-A4", available: 2, requested: 3 }
    ///      │
    ///      ▼
    /// UI shows: "Only 2 PAPEL-A4 available"
    /// ```
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Sale is not in a state that allows the requested transition.
    ///
    /// ## When This Occurs
    /// - Returning a sale that was already returned
    #[error("Sale {sale_id} is {current_status}, cannot perform operation")]
    InvalidSaleStatus {
        sale_id: String,
        current_status: SaleStatus,
    },

    /// A sale needs at least one line item.
    #[error("A sale requires at least one line item")]
    EmptySale,

    /// The invoice number could not be assigned without colliding.
    #[error("Could not assign a unique invoice number after {attempts} attempts")]
    InvoiceNumberConflict { attempts: u32 },

    /// Client still has sales and cannot be deleted.
    #[error("Client {client_id} has {sales} associated sales and cannot be deleted")]
    ClientHasSales { client_id: String, sales: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// An amount left the representable range (e.g. price × quantity).
    #[error("{field} is too large")]
    AmountTooLarge { field: String },

    /// Duplicate value (e.g., duplicate SKU).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
