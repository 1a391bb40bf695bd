//! # Report Data
//!
//! Builds the rows behind the sales, products and clients reports. Turning
//! rows into a file (PDF, spreadsheet) is the renderer's job; every cell
//! here is already a display string, money with two decimals.
//!
//! ```text
//! ReportKind + DateRange
//!        │
//!        ├── Sales    ──► sales in range, newest first
//!        ├── Products ──► whole catalog by name (range ignored)
//!        └── Clients  ──► clients by name + everything billed to them in range
//! ```

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::LedgerResult;
use stockbill_core::{Money, ValidationError};
use stockbill_db::Database;

// =============================================================================
// Request Types
// =============================================================================

/// Which report to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Sales,
    Products,
    Clients,
}

/// Inclusive calendar-day range, interpreted in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        DateRange { from, to }
    }

    /// A single day.
    pub fn day(date: NaiveDate) -> Self {
        DateRange { from: date, to: date }
    }

    /// First and last instant covered by the range.
    ///
    /// ## Errors
    /// `InvalidFormat` when `from` is after `to`.
    pub fn bounds(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), ValidationError> {
        if self.from > self.to {
            return Err(invalid_range(format!("{} is after {}", self.from, self.to)));
        }

        let start = self.from.and_time(NaiveTime::MIN);
        let end = self
            .to
            .and_hms_nano_opt(23, 59, 59, 999_999_999)
            .ok_or_else(|| invalid_range(format!("{} has no end of day", self.to)))?;

        Ok((
            DateTime::<Utc>::from_naive_utc_and_offset(start, Utc),
            DateTime::<Utc>::from_naive_utc_and_offset(end, Utc),
        ))
    }
}

fn invalid_range(reason: String) -> ValidationError {
    ValidationError::InvalidFormat {
        field: "date range".to_string(),
        reason,
    }
}

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesReportRow {
    pub number: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// Empty when the client no longer exists.
    pub client_name: String,
    pub status: String,
    pub total: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductReportRow {
    pub sku: String,
    pub name: String,
    pub category: String,
    pub price: String,
    pub stock: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientReportRow {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub tax_id: String,
    pub total_purchases: String,
}

/// A built report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "rows", rename_all = "snake_case")]
pub enum ReportData {
    Sales(Vec<SalesReportRow>),
    Products(Vec<ProductReportRow>),
    Clients(Vec<ClientReportRow>),
}

impl ReportData {
    pub fn kind(&self) -> ReportKind {
        match self {
            ReportData::Sales(_) => ReportKind::Sales,
            ReportData::Products(_) => ReportKind::Products,
            ReportData::Clients(_) => ReportKind::Clients,
        }
    }

    /// Column titles, in cell order.
    pub fn headers(&self) -> &'static [&'static str] {
        match self {
            ReportData::Sales(_) => &["Number", "Date", "Client", "Status", "Total"],
            ReportData::Products(_) => &["SKU", "Name", "Category", "Price", "Stock"],
            ReportData::Clients(_) => &["Name", "Email", "Phone", "Tax ID", "Total Purchases"],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ReportData::Sales(rows) => rows.len(),
            ReportData::Products(rows) => rows.len(),
            ReportData::Clients(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows flattened to cells for a table renderer.
    pub fn cells(&self) -> Vec<Vec<String>> {
        match self {
            ReportData::Sales(rows) => rows
                .iter()
                .map(|r| {
                    vec![
                        r.number.clone(),
                        r.date.clone(),
                        r.client_name.clone(),
                        r.status.clone(),
                        r.total.clone(),
                    ]
                })
                .collect(),
            ReportData::Products(rows) => rows
                .iter()
                .map(|r| {
                    vec![
                        r.sku.clone(),
                        r.name.clone(),
                        r.category.clone(),
                        r.price.clone(),
                        r.stock.to_string(),
                    ]
                })
                .collect(),
            ReportData::Clients(rows) => rows
                .iter()
                .map(|r| {
                    vec![
                        r.name.clone(),
                        r.email.clone(),
                        r.phone.clone(),
                        r.tax_id.clone(),
                        r.total_purchases.clone(),
                    ]
                })
                .collect(),
        }
    }
}

// =============================================================================
// Service
// =============================================================================

/// Report builder.
#[derive(Debug, Clone)]
pub struct Reports {
    db: Database,
}

impl Reports {
    pub fn new(db: Database) -> Self {
        Reports { db }
    }

    /// Builds the rows for `kind` over `range`.
    ///
    /// The products report lists the current catalog and ignores the range.
    pub async fn generate(&self, kind: ReportKind, range: DateRange) -> LedgerResult<ReportData> {
        let (from, to) = range.bounds()?;

        let data = match kind {
            ReportKind::Sales => ReportData::Sales(self.sales_rows(from, to).await?),
            ReportKind::Products => ReportData::Products(self.product_rows().await?),
            ReportKind::Clients => ReportData::Clients(self.client_rows(from, to).await?),
        };

        info!(
            kind = ?kind,
            from = %range.from,
            to = %range.to,
            rows = data.len(),
            "Report generated"
        );

        Ok(data)
    }

    async fn sales_rows(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<Vec<SalesReportRow>> {
        let sales = self.db.sales().find_by_date_range(from, to).await?;

        let names: HashMap<String, String> = self
            .db
            .clients()
            .list()
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();

        Ok(sales
            .into_iter()
            .map(|sale| SalesReportRow {
                client_name: names.get(&sale.client_id).cloned().unwrap_or_default(),
                date: sale.date.format("%Y-%m-%d").to_string(),
                status: sale.status.to_string(),
                total: sale.total().to_decimal_string(),
                number: sale.number,
            })
            .collect())
    }

    async fn product_rows(&self) -> LedgerResult<Vec<ProductReportRow>> {
        let products = self.db.products().list_by_name().await?;

        Ok(products
            .into_iter()
            .map(|p| ProductReportRow {
                price: p.price().to_decimal_string(),
                sku: p.sku,
                name: p.name,
                category: p.category,
                stock: p.stock,
            })
            .collect())
    }

    async fn client_rows(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<Vec<ClientReportRow>> {
        let sales = self.db.sales();
        let clients = self.db.clients().list().await?;

        let mut rows = Vec::with_capacity(clients.len());
        for client in clients {
            let total: Money = sales.total_purchases(&client.id, from, to).await?;
            rows.push(ClientReportRow {
                name: client.name,
                email: client.email,
                phone: client.phone,
                tax_id: client.tax_id,
                total_purchases: total.to_decimal_string(),
            });
        }

        Ok(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
