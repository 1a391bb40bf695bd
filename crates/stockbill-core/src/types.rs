//! # Domain Types
//!
//! Core domain types used throughout stockbill.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │     Client      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (unique)   │◄─┐│  number F-0001  │──►│  email (unique) │       │
//! │  │  price_cents    │  ││  status         │   │  tax_id (unique)│       │
//! │  │  stock          │  ││  total_cents    │   └─────────────────┘       │
//! │  └─────────────────┘  │└────────┬────────┘                             │
//! │                       │         │ 1..n                                 │
//! │                       │┌────────▼────────┐   ┌─────────────────┐       │
//! │                       └│    LineItem     │   │   SaleStatus    │       │
//! │                        │  product_id     │   │  Completed      │       │
//! │                        │  quantity       │   │  Returned (end) │       │
//! │                        │  unit_price (*) │   └─────────────────┘       │
//! │                        └─────────────────┘                             │
//! │  (*) captured at sale time, never follows later price changes          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 1600 bps = 16%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (for configuration input).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        crate::DEFAULT_TAX_RATE
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name.
    pub name: String,

    /// Stock Keeping Unit - unique business identifier.
    pub sku: String,

    /// Unit price in cents.
    pub price_cents: i64,

    /// Units on hand. Never negative.
    pub stock: i64,

    pub category: String,

    pub description: Option<String>,

    /// Public URL of the product image (upload handled elsewhere).
    pub image_url: Option<String>,

    /// Public URL of the product video (upload handled elsewhere).
    pub video_url: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks whether `quantity` units are currently on hand.
    ///
    /// Informational only: reservations are decided by the storage layer's
    /// conditional decrement, not by this check.
    pub fn has_stock(&self, quantity: i64) -> bool {
        self.stock >= quantity
    }
}

/// Catalog input for creating or updating a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductInput {
    pub name: String,
    pub sku: String,
    pub price_cents: i64,
    pub stock: i64,
    pub category: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}

// =============================================================================
// Client
// =============================================================================

/// A client (customer) that sales are billed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Client {
    pub id: String,
    pub name: String,
    /// Unique contact email.
    pub email: String,
    pub phone: String,
    pub address: String,
    /// Tax identification number (RFC). Unique.
    pub tax_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Catalog input for creating or updating a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClientInput {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub tax_id: String,
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale.
///
/// ## State Machine
/// ```text
///   create ──► Completed ──process_return──► Returned (terminal)
///                  │                              │
///                  └──── delete (restock) ────────┴── delete (no restock)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale was billed and its stock is out of inventory.
    Completed,
    /// Goods came back; stock was restored.
    Returned,
}

impl SaleStatus {
    /// Stored/serialized representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Completed => "completed",
            SaleStatus::Returned => "returned",
        }
    }

    /// Whether no further transition is possible.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, SaleStatus::Returned)
    }

    /// Whether `self → next` is a legal transition.
    pub const fn can_transition_to(&self, next: SaleStatus) -> bool {
        matches!((self, next), (SaleStatus::Completed, SaleStatus::Returned))
    }

    /// Whether deleting a sale in this status must put its stock back.
    ///
    /// A returned sale already restored its stock at return time.
    pub const fn restocks_on_delete(&self) -> bool {
        matches!(self, SaleStatus::Completed)
    }
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Completed
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A persisted sale (invoice).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// Human-readable invoice number, `F-0001`.
    pub number: String,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub client_id: String,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub status: SaleStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn tax(&self) -> Money {
        Money::from_cents(self.tax_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// A line of a sale.
///
/// Only the product reference and the captured unit price are stored;
/// product name/SKU are resolved at read time for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LineItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// Submission order within the sale (0-based).
    pub position: i64,
    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    /// quantity × unit price.
    pub subtotal_cents: i64,
}

impl LineItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

/// One requested line of a new sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineRequest {
    pub product_id: String,
    pub quantity: i64,
}

impl LineRequest {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        LineRequest {
            product_id: product_id.into(),
            quantity,
        }
    }
}

// =============================================================================
// Read Models
// =============================================================================

/// A line item resolved against the current catalog for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineDetails {
    #[serde(flatten)]
    pub item: LineItem,
    /// `None` when the product has since been deleted.
    pub product: Option<Product>,
}

/// A sale with its client and line items resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleDetails {
    #[serde(flatten)]
    pub sale: Sale,
    pub client: Option<Client>,
    pub items: Vec<LineDetails>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_from_percentage() {
        let rate = TaxRate::from_percentage(16.0);
        assert_eq!(rate.bps(), 1600);
        assert!((rate.percentage() - 16.0).abs() < 0.001);
    }

    #[test]
    fn test_default_tax_rate_is_sixteen_percent() {
        assert_eq!(TaxRate::default().bps(), 1600);
    }

    #[test]
    fn test_sale_status_transitions() {
        assert!(SaleStatus::Completed.can_transition_to(SaleStatus::Returned));
        assert!(!SaleStatus::Returned.can_transition_to(SaleStatus::Completed));
        assert!(!SaleStatus::Returned.can_transition_to(SaleStatus::Returned));
        assert!(!SaleStatus::Completed.can_transition_to(SaleStatus::Completed));
        assert!(SaleStatus::Returned.is_terminal());
    }

    #[test]
    fn test_only_completed_sales_restock_on_delete() {
        assert!(SaleStatus::Completed.restocks_on_delete());
        assert!(!SaleStatus::Returned.restocks_on_delete());
    }

    #[test]
    fn test_sale_status_serialization() {
        let json = serde_json::to_string(&SaleStatus::Returned).unwrap();
        assert_eq!(json, "\"returned\"");
        assert_eq!(SaleStatus::Completed.to_string(), "completed");
    }
}
