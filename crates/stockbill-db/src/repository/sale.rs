//! # Sale Repository
//!
//! Database operations for sales and sale items.
//!
//! ## Invoice Numbering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    insert_numbered (one transaction)                    │
//! │                                                                         │
//! │  BEGIN                                                                 │
//! │    UPDATE invoice_counters SET value = value + 1 ... RETURNING value   │
//! │         │  7                                                            │
//! │         ▼                                                               │
//! │    INSERT INTO sales (number = 'F-0007', ...)                          │
//! │    INSERT INTO sale_items ... (one per line, in order)                 │
//! │  COMMIT                                                                │
//! │                                                                         │
//! │  Any failure rolls back the counter too, so numbers have no gaps.      │
//! │  sales.number is UNIQUE: if the counter ever lags behind existing      │
//! │  rows the insert fails with UniqueViolation("sales.number"); the       │
//! │  caller resyncs the counter and tries again.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Status Guards
//! Transitions and deletes carry the expected status in their `WHERE`
//! clause and report whether a row matched. Two concurrent returns of the
//! same sale therefore cannot both succeed.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::begin_write;
use stockbill_core::totals::{format_invoice_number, PricedLine, SaleTotals};
use stockbill_core::{LineItem, Money, Sale, SaleStatus, INVOICE_PREFIX};

/// Name of the counter row that numbers sales.
const SALES_COUNTER: &str = "sales";

const SELECT_SALE: &str = r#"
    SELECT
        id, number, date, client_id,
        subtotal_cents, tax_cents, total_cents,
        status, created_at, updated_at
    FROM sales
"#;

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        get_by_id_on(&self.pool, id).await
    }

    /// Gets all items for a sale, in submission order.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<LineItem>> {
        get_items_on(&self.pool, sale_id).await
    }

    /// Lists all sales, newest first.
    pub async fn list(&self) -> DbResult<Vec<Sale>> {
        debug!("Listing sales");

        let sql = format!("{SELECT_SALE} ORDER BY date DESC, number DESC");
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = sales.len(), "Listed sales");
        Ok(sales)
    }

    /// Counts all sales.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Sales dated within `[from, to]` (inclusive), newest first.
    pub async fn find_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<Sale>> {
        debug!(from = %from, to = %to, "Finding sales by date range");

        let sql = format!("{SELECT_SALE} WHERE date >= ?1 AND date <= ?2 ORDER BY date DESC, number DESC");
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        Ok(sales)
    }

    /// Sum of every sale billed to a client within `[from, to]`,
    /// whatever its status.
    pub async fn total_purchases(
        &self,
        client_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Money> {
        debug!(client_id = %client_id, "Summing client purchases");

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(total_cents), 0) FROM sales
            WHERE client_id = ?1 AND date >= ?2 AND date <= ?3
            "#,
        )
        .bind(client_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_cents(total))
    }

    /// Persists a new completed sale under the next invoice number.
    ///
    /// Counter bump, sale row and item rows commit together or not at all.
    ///
    /// ## Returns
    /// * `Ok((Sale, items))` - Persisted sale and its items
    /// * `Err(DbError::UniqueViolation)` on `sales.number` - counter lagged; resync and retry
    /// * `Err(DbError::ForeignKeyViolation)` - client does not exist
    pub async fn insert_numbered(
        &self,
        client_id: &str,
        lines: &[PricedLine],
        totals: &SaleTotals,
    ) -> DbResult<(Sale, Vec<LineItem>)> {
        let mut tx = begin_write(&self.pool).await?;

        let sequence: i64 = sqlx::query_scalar(
            r#"
            UPDATE invoice_counters SET value = value + 1
            WHERE name = ?1
            RETURNING value
            "#,
        )
        .bind(SALES_COUNTER)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Invoice counter", SALES_COUNTER))?;

        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            number: format_invoice_number(sequence),
            date: now,
            client_id: client_id.to_string(),
            subtotal_cents: totals.subtotal.cents(),
            tax_cents: totals.tax.cents(),
            total_cents: totals.total.cents(),
            status: SaleStatus::Completed,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %sale.id, number = %sale.number, lines = lines.len(), "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, number, date, client_id,
                subtotal_cents, tax_cents, total_cents,
                status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.number)
        .bind(sale.date)
        .bind(&sale.client_id)
        .bind(sale.subtotal_cents)
        .bind(sale.tax_cents)
        .bind(sale.total_cents)
        .bind(sale.status)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            let err = DbError::from(e);
            if err.is_unique_violation_on("sales.number") {
                DbError::duplicate("sales.number", &sale.number)
            } else {
                err
            }
        })?;

        let mut items = Vec::with_capacity(lines.len());
        for (position, line) in lines.iter().enumerate() {
            // `totals` was computed from these lines, so this only fails on a
            // caller that passed mismatched totals.
            let subtotal = line
                .subtotal()
                .map_err(|e| DbError::Internal(e.to_string()))?;
            let item = LineItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                product_id: line.product_id.clone(),
                position: position as i64,
                quantity: line.quantity,
                unit_price_cents: line.unit_price.cents(),
                subtotal_cents: subtotal.cents(),
            };

            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, product_id, position,
                    quantity, unit_price_cents, subtotal_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.product_id)
            .bind(item.position)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.subtotal_cents)
            .execute(&mut *tx)
            .await?;

            items.push(item);
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(id = %sale.id, number = %sale.number, "Sale committed");
        Ok((sale, items))
    }

    /// Moves the counter up to the highest invoice number already stored.
    ///
    /// Never moves it backwards. Returns the counter value afterwards.
    pub async fn resync_counter(&self) -> DbResult<i64> {
        let from_char = INVOICE_PREFIX.len() as i64 + 1;

        let value: i64 = sqlx::query_scalar(
            r#"
            UPDATE invoice_counters
            SET value = MAX(value, (
                SELECT COALESCE(MAX(CAST(SUBSTR(number, ?2) AS INTEGER)), 0)
                FROM sales
                WHERE number LIKE ?3
            ))
            WHERE name = ?1
            RETURNING value
            "#,
        )
        .bind(SALES_COUNTER)
        .bind(from_char)
        .bind(format!("{INVOICE_PREFIX}%"))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Invoice counter", SALES_COUNTER))?;

        debug!(value = value, "Invoice counter resynced");
        Ok(value)
    }

    /// Moves a sale from `from` to `to` if it is still in `from`.
    pub async fn transition_status(
        &self,
        id: &str,
        from: SaleStatus,
        to: SaleStatus,
    ) -> DbResult<bool> {
        transition_status_on(&self.pool, id, from, to).await
    }

    /// Deletes a sale (items cascade) if it is still in `status`.
    pub async fn delete_if_status(&self, id: &str, status: SaleStatus) -> DbResult<bool> {
        delete_if_status_on(&self.pool, id, status).await
    }
}

// =============================================================================
// Executor-generic statements
// =============================================================================

/// Gets a sale by ID on any executor.
pub async fn get_by_id_on<'e, E>(executor: E, id: &str) -> DbResult<Option<Sale>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    debug!(id = %id, "Fetching sale by id");

    let sql = format!("{SELECT_SALE} WHERE id = ?1");
    let sale = sqlx::query_as::<_, Sale>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(sale)
}

/// Gets a sale's items on any executor, in submission order.
pub async fn get_items_on<'e, E>(executor: E, sale_id: &str) -> DbResult<Vec<LineItem>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    debug!(sale_id = %sale_id, "Fetching sale items");

    let items = sqlx::query_as::<_, LineItem>(
        r#"
        SELECT
            id, sale_id, product_id, position,
            quantity, unit_price_cents, subtotal_cents
        FROM sale_items
        WHERE sale_id = ?1
        ORDER BY position
        "#,
    )
    .bind(sale_id)
    .fetch_all(executor)
    .await?;

    Ok(items)
}

/// Conditional status change; `true` when the sale was in `from`.
pub async fn transition_status_on<'e, E>(
    executor: E,
    id: &str,
    from: SaleStatus,
    to: SaleStatus,
) -> DbResult<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    debug!(id = %id, from = %from, to = %to, "Transitioning sale status");

    let result = sqlx::query(
        r#"
        UPDATE sales SET status = ?3, updated_at = ?4
        WHERE id = ?1 AND status = ?2
        "#,
    )
    .bind(id)
    .bind(from)
    .bind(to)
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Conditional delete; `true` when the sale was in `status`.
pub async fn delete_if_status_on<'e, E>(executor: E, id: &str, status: SaleStatus) -> DbResult<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    debug!(id = %id, status = %status, "Deleting sale");

    let result = sqlx::query("DELETE FROM sales WHERE id = ?1 AND status = ?2")
        .bind(id)
        .bind(status)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::client::generate_client_id;
    use crate::{Database, DbConfig};
    use stockbill_core::{Client, TaxRate};

    async fn setup() -> (Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        let client = Client {
            id: generate_client_id(),
            name: "Acme".to_string(),
            email: "a@acme.mx".to_string(),
            phone: "555-0100".to_string(),
            address: "Av. Reforma 1".to_string(),
            tax_id: "RFC1".to_string(),
            created_at: now,
            updated_at: now,
        };
        db.clients().insert(&client).await.unwrap();
        (db, client.id)
    }

    fn lines() -> Vec<PricedLine> {
        vec![
            PricedLine::new("p1", 2, Money::from_cents(1000)),
            PricedLine::new("p2", 1, Money::from_cents(500)),
        ]
    }

    #[tokio::test]
    async fn test_insert_numbered_sequence() {
        let (db, client_id) = setup().await;
        let repo = db.sales();
        let lines = lines();
        let totals = SaleTotals::compute(&lines, TaxRate::default()).unwrap();

        let (first, items) = repo.insert_numbered(&client_id, &lines, &totals).await.unwrap();
        let (second, _) = repo.insert_numbered(&client_id, &lines, &totals).await.unwrap();

        assert_eq!(first.number, "F-0001");
        assert_eq!(second.number, "F-0002");
        assert_eq!(first.total_cents, 2900);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].position, 1);

        let stored = repo.get_items(&first.id).await.unwrap();
        assert_eq!(stored, items);
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unknown_client_leaves_counter_untouched() {
        let (db, client_id) = setup().await;
        let repo = db.sales();
        let lines = lines();
        let totals = SaleTotals::compute(&lines, TaxRate::default()).unwrap();

        let err = repo.insert_numbered("nobody", &lines, &totals).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));

        let (sale, _) = repo.insert_numbered(&client_id, &lines, &totals).await.unwrap();
        assert_eq!(sale.number, "F-0001");
    }

    #[tokio::test]
    async fn test_lagging_counter_collides_then_resyncs() {
        let (db, client_id) = setup().await;
        let repo = db.sales();
        let lines = lines();
        let totals = SaleTotals::compute(&lines, TaxRate::default()).unwrap();

        repo.insert_numbered(&client_id, &lines, &totals).await.unwrap();
        repo.insert_numbered(&client_id, &lines, &totals).await.unwrap();

        sqlx::query("UPDATE invoice_counters SET value = 1 WHERE name = 'sales'")
            .execute(db.pool())
            .await
            .unwrap();

        let err = repo.insert_numbered(&client_id, &lines, &totals).await.unwrap_err();
        assert!(err.is_unique_violation_on("sales.number"));

        assert_eq!(repo.resync_counter().await.unwrap(), 2);
        let (sale, _) = repo.insert_numbered(&client_id, &lines, &totals).await.unwrap();
        assert_eq!(sale.number, "F-0003");
    }

    #[tokio::test]
    async fn test_status_guards() {
        let (db, client_id) = setup().await;
        let repo = db.sales();
        let lines = lines();
        let totals = SaleTotals::compute(&lines, TaxRate::default()).unwrap();
        let (sale, _) = repo.insert_numbered(&client_id, &lines, &totals).await.unwrap();

        assert!(repo
            .transition_status(&sale.id, SaleStatus::Completed, SaleStatus::Returned)
            .await
            .unwrap());
        assert!(!repo
            .transition_status(&sale.id, SaleStatus::Completed, SaleStatus::Returned)
            .await
            .unwrap());

        let stored = repo.get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SaleStatus::Returned);

        assert!(!repo.delete_if_status(&sale.id, SaleStatus::Completed).await.unwrap());
        assert!(repo.delete_if_status(&sale.id, SaleStatus::Returned).await.unwrap());
        assert!(repo.get_by_id(&sale.id).await.unwrap().is_none());
        assert!(repo.get_items(&sale.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_date_range_and_purchases() {
        let (db, client_id) = setup().await;
        let repo = db.sales();
        let lines = lines();
        let totals = SaleTotals::compute(&lines, TaxRate::default()).unwrap();
        let before = Utc::now() - chrono::Duration::seconds(1);

        let (a, _) = repo.insert_numbered(&client_id, &lines, &totals).await.unwrap();
        let (b, _) = repo.insert_numbered(&client_id, &lines, &totals).await.unwrap();
        repo.transition_status(&b.id, SaleStatus::Completed, SaleStatus::Returned)
            .await
            .unwrap();

        let after = Utc::now() + chrono::Duration::seconds(1);
        let found = repo.find_by_date_range(before, after).await.unwrap();
        assert_eq!(found.len(), 2);

        let empty = repo
            .find_by_date_range(after, after + chrono::Duration::days(1))
            .await
            .unwrap();
        assert!(empty.is_empty());

        // The returned sale still counts as billed.
        let total = repo.total_purchases(&client_id, before, after).await.unwrap();
        assert_eq!(total, Money::from_cents(a.total_cents + b.total_cents));

        let none = repo
            .total_purchases(&client_id, after, after + chrono::Duration::days(1))
            .await
            .unwrap();
        assert!(none.is_zero());
    }
}
