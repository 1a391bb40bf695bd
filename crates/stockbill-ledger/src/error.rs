//! # Ledger and API Error Types
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in stockbill                              │
//! │                                                                         │
//! │  Ledger operation                                                      │
//! │  LedgerResult<T>                                                       │
//! │         │                                                               │
//! │         ├── CoreError (business rule)   InsufficientStock, EmptySale    │
//! │         ├── DbError   (storage)         QueryFailed, PoolExhausted      │
//! │         └── CompensationFailed          cause + unreleased lines        │
//! │                     │                                                   │
//! │                     ▼                                                   │
//! │              ApiError { code, message }  ← what callers serialize      │
//! │                                                                         │
//! │  Storage and compensation details are logged, never shown.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use stockbill_core::{CoreError, ValidationError};
use stockbill_db::DbError;

// =============================================================================
// Ledger Error
// =============================================================================

/// Errors returned by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A business rule was violated.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The database failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// A sale failed and putting reserved stock back failed as well.
    ///
    /// `unreleased` lists the `(product_id, quantity)` pairs still out of
    /// inventory; they need manual correction.
    #[error("{source}; compensation left {} line(s) unreleased", .unreleased.len())]
    CompensationFailed {
        source: Box<LedgerError>,
        unreleased: Vec<(String, i64)>,
    },
}

impl LedgerError {
    /// The business-rule error behind this failure, if any.
    ///
    /// Looks through `CompensationFailed` to its original cause.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            LedgerError::Core(err) => Some(err),
            LedgerError::Db(_) => None,
            LedgerError::CompensationFailed { source, .. } => source.as_core(),
        }
    }
}

impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        LedgerError::Core(CoreError::Validation(err))
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// API Error
// =============================================================================

/// Error shape handed to callers of the ledger.
///
/// ```json
/// {
///   "code": "INSUFFICIENT_STOCK",
///   "message": "Insufficient stock for PAPEL-A4: 2 available, 3 requested"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Not enough stock for a line (409)
    InsufficientStock,

    /// Operation not allowed in the sale's current status (409)
    InvalidState,

    /// Conflicting state such as a client that still has sales (409)
    Conflict,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal error (500)
    Internal,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{resource} not found: {id}"))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => {
                ApiError::validation(format!("{field} '{value}' already exists"))
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::CheckViolation { message } => {
                tracing::error!("Check constraint violation: {}", message);
                ApiError::validation("Value out of range")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database is busy, try again")
            }
            other => {
                // Log the actual error but return a generic message
                tracing::error!(error = %other, "Database operation failed");
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => ApiError::not_found("Product", &id),
            CoreError::ClientNotFound(id) => ApiError::not_found("Client", &id),
            CoreError::SaleNotFound(id) => ApiError::not_found("Sale", &id),
            CoreError::InsufficientStock {
                sku,
                available,
                requested,
                ..
            } => ApiError::new(
                ErrorCode::InsufficientStock,
                format!("Insufficient stock for {sku}: {available} available, {requested} requested"),
            ),
            CoreError::InvalidSaleStatus {
                sale_id,
                current_status,
            } => ApiError::new(
                ErrorCode::InvalidState,
                format!("Sale {sale_id} is already {current_status}"),
            ),
            CoreError::EmptySale => ApiError::validation("A sale requires at least one line item"),
            CoreError::InvoiceNumberConflict { attempts } => {
                tracing::error!(attempts, "Invoice numbering kept colliding");
                ApiError::new(
                    ErrorCode::Conflict,
                    "Could not assign an invoice number, try again",
                )
            }
            CoreError::ClientHasSales { client_id, sales } => ApiError::new(
                ErrorCode::Conflict,
                format!("Client {client_id} has {sales} sale(s) and cannot be deleted"),
            ),
            CoreError::Validation(e) => ApiError::validation(e.to_string()),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Core(e) => e.into(),
            LedgerError::Db(e) => e.into(),
            LedgerError::CompensationFailed { source, unreleased } => {
                tracing::error!(
                    cause = %source,
                    unreleased = ?unreleased,
                    "Sale failed and stock could not be fully restored"
                );
                ApiError::internal("The sale failed and inventory needs review")
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use stockbill_core::SaleStatus;

    #[test]
    fn test_insufficient_stock_reports_available_units() {
        let api: ApiError = LedgerError::from(CoreError::InsufficientStock {
            product_id: "p-1".to_string(),
            sku: "PAPEL-A4".to_string(),
            available: 2,
            requested: 3,
        })
        .into();

        assert_eq!(api.code, ErrorCode::InsufficientStock);
        assert!(api.message.contains("PAPEL-A4"));
        assert!(api.message.contains("2 available"));
    }

    #[test]
    fn test_invalid_status_reports_current_status() {
        let api: ApiError = CoreError::InvalidSaleStatus {
            sale_id: "s-1".to_string(),
            current_status: SaleStatus::Returned,
        }
        .into();

        assert_eq!(api.code, ErrorCode::InvalidState);
        assert_eq!(api.message, "Sale s-1 is already returned");
    }

    #[test]
    fn test_database_details_are_hidden() {
        let api: ApiError = DbError::QueryFailed("no such table: sales".to_string()).into();
        assert_eq!(api.code, ErrorCode::DatabaseError);
        assert!(!api.message.contains("sales"));
    }

    #[test]
    fn test_compensation_failure_is_internal() {
        let err = LedgerError::CompensationFailed {
            source: Box::new(CoreError::EmptySale.into()),
            unreleased: vec![("p-1".to_string(), 2)],
        };
        assert!(matches!(err.as_core(), Some(CoreError::EmptySale)));

        let api: ApiError = err.into();
        assert_eq!(api.code, ErrorCode::Internal);
    }

    #[test]
    fn test_serialized_shape() {
        let api = ApiError::not_found("Sale", "s-9");
        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["message"], "Sale not found: s-9");
    }
}
