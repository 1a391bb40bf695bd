//! # Sale Composer
//!
//! Turns a client and a list of requested lines into a persisted,
//! numbered sale.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_sale(client, [(P1, 2), (P2, 1), (P3, 4)])                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate lines, load client                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  reserve P1 ✓ ──► reserved = [P1×2]                                    │
//! │  reserve P2 ✓ ──► reserved = [P1×2, P2×1]                              │
//! │  reserve P3 ✗ ──► release P2×1, release P1×2 ──► Err(InsufficientStock)│
//! │       │                                                                 │
//! │       ▼  (all reserved)                                                 │
//! │  SaleTotals::compute (overflow ──► release all ──► Err)                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  insert_numbered (retry on number collision)                           │
//! │       │                        │                                        │
//! │       │                        └── failed ──► release all ──► Err      │
//! │       ▼                                                                 │
//! │  SaleDetails                                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reservations are separate statements, so a failure is undone by
//! releasing what was taken rather than by a database rollback.

use tracing::{error, info, warn};

use crate::config::LedgerConfig;
use crate::details::load_details;
use crate::error::{LedgerError, LedgerResult};
use crate::inventory::InventoryGuard;
use stockbill_core::totals::{PricedLine, SaleTotals};
use stockbill_core::validation::validate_line_requests;
use stockbill_core::{CoreError, LineItem, LineRequest, Sale, SaleDetails};
use stockbill_db::{Database, DbError};

/// Builds and persists new sales.
#[derive(Debug, Clone)]
pub struct SaleComposer {
    db: Database,
    guard: InventoryGuard,
    config: LedgerConfig,
}

impl SaleComposer {
    pub fn new(db: Database, config: LedgerConfig) -> Self {
        SaleComposer {
            guard: InventoryGuard::new(db.clone()),
            db,
            config,
        }
    }

    /// Creates a completed sale for `client_id`.
    ///
    /// ## Errors
    /// * `EmptySale` - no lines
    /// * `Validation` - a line has a blank product id or a bad quantity, or
    ///   the amounts overflow (`AmountTooLarge`)
    /// * `ClientNotFound` - unknown client
    /// * `ProductNotFound` / `InsufficientStock` - a line could not be reserved
    /// * `InvoiceNumberConflict` - numbering kept colliding
    /// * `CompensationFailed` - any of the above, plus stock left unreleased
    ///
    /// On every error, stock taken by earlier lines has been put back
    /// (unless the error is `CompensationFailed`).
    pub async fn create_sale(
        &self,
        client_id: &str,
        lines: &[LineRequest],
    ) -> LedgerResult<SaleDetails> {
        if lines.is_empty() {
            return Err(CoreError::EmptySale.into());
        }
        validate_line_requests(lines)?;

        let client = self
            .db
            .clients()
            .get_by_id(client_id)
            .await?
            .ok_or_else(|| CoreError::ClientNotFound(client_id.to_string()))?;

        let mut reserved: Vec<PricedLine> = Vec::with_capacity(lines.len());
        for line in lines {
            match self
                .guard
                .check_and_reserve(&line.product_id, line.quantity)
                .await
            {
                Ok(unit_price) => {
                    reserved.push(PricedLine::new(&line.product_id, line.quantity, unit_price))
                }
                Err(err) => return Err(self.compensate(&reserved, err).await),
            }
        }

        let totals = match SaleTotals::compute(&reserved, self.config.tax_rate) {
            Ok(totals) => totals,
            Err(err) => return Err(self.compensate(&reserved, err.into()).await),
        };

        let (sale, items) = match self.persist(&client.id, &reserved, &totals).await {
            Ok(persisted) => persisted,
            Err(err) => return Err(self.compensate(&reserved, err).await),
        };

        info!(
            sale_id = %sale.id,
            number = %sale.number,
            client_id = %client.id,
            lines = items.len(),
            total = %sale.total(),
            "Sale created"
        );

        load_details(&self.db, sale, items).await
    }

    /// Inserts the sale under the next invoice number, resyncing the
    /// counter and retrying when the number is already taken.
    async fn persist(
        &self,
        client_id: &str,
        lines: &[PricedLine],
        totals: &SaleTotals,
    ) -> LedgerResult<(Sale, Vec<LineItem>)> {
        let sales = self.db.sales();
        let attempts = self.config.numbering_attempts.max(1);

        for attempt in 1..=attempts {
            match sales.insert_numbered(client_id, lines, totals).await {
                Ok(persisted) => return Ok(persisted),
                Err(err) if err.is_unique_violation_on("sales.number") => {
                    warn!(attempt, attempts, error = %err, "Invoice number taken, resyncing counter");
                    sales.resync_counter().await?;
                }
                // The client was deleted after it was loaded.
                Err(DbError::ForeignKeyViolation { .. }) => {
                    return Err(CoreError::ClientNotFound(client_id.to_string()).into());
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(CoreError::InvoiceNumberConflict { attempts }.into())
    }

    /// Releases every reserved line, most recent first, and returns the
    /// error the caller should see.
    async fn compensate(&self, reserved: &[PricedLine], cause: LedgerError) -> LedgerError {
        let mut unreleased = Vec::new();

        for line in reserved.iter().rev() {
            if let Err(release_err) = self.guard.release(&line.product_id, line.quantity).await {
                error!(
                    product_id = %line.product_id,
                    quantity = line.quantity,
                    error = %release_err,
                    "Failed to release reserved stock"
                );
                unreleased.push((line.product_id.clone(), line.quantity));
            }
        }

        if unreleased.is_empty() {
            cause
        } else {
            error!(
                cause = %cause,
                unreleased = unreleased.len(),
                "Sale compensation incomplete"
            );
            LedgerError::CompensationFailed {
                source: Box::new(cause),
                unreleased,
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_client, seed_product, setup, setup_shared, stock_of};
    use stockbill_core::totals::parse_invoice_number;
    use stockbill_core::{Money, SaleStatus, ValidationError, MAX_ITEM_QUANTITY};
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_two_line_sale_totals() {
        let ledger = setup().await;
        let client = seed_client(&ledger, "acme").await;
        let p1 = seed_product(&ledger, "P1", 1000, 10).await;
        let p2 = seed_product(&ledger, "P2", 500, 10).await;

        let details = ledger
            .composer()
            .create_sale(
                &client.id,
                &[LineRequest::new(&p1.id, 2), LineRequest::new(&p2.id, 1)],
            )
            .await
            .unwrap();

        assert_eq!(details.sale.subtotal(), Money::from_cents(2500));
        assert_eq!(details.sale.tax(), Money::from_cents(400));
        assert_eq!(details.sale.total(), Money::from_cents(2900));
        assert_eq!(details.sale.status, SaleStatus::Completed);
        assert_eq!(details.sale.number, "F-0001");
        assert_eq!(details.client.as_ref().unwrap().id, client.id);

        assert_eq!(details.items.len(), 2);
        assert_eq!(details.items[0].item.product_id, p1.id);
        assert_eq!(details.items[0].item.subtotal_cents, 2000);
        assert_eq!(details.items[0].product.as_ref().unwrap().sku, "P1");

        assert_eq!(stock_of(&ledger, &p1.id).await, 8);
        assert_eq!(stock_of(&ledger, &p2.id).await, 9);
    }

    #[tokio::test]
    async fn test_second_sale_exceeding_stock_leaves_stock_alone() {
        let ledger = setup().await;
        let client = seed_client(&ledger, "acme").await;
        let p = seed_product(&ledger, "P", 1000, 5).await;
        let composer = ledger.composer();

        composer
            .create_sale(&client.id, &[LineRequest::new(&p.id, 3)])
            .await
            .unwrap();
        assert_eq!(stock_of(&ledger, &p.id).await, 2);

        let err = composer
            .create_sale(&client.id, &[LineRequest::new(&p.id, 3)])
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::InsufficientStock { available: 2, requested: 3, .. })
        ));
        assert_eq!(stock_of(&ledger, &p.id).await, 2);
    }

    #[tokio::test]
    async fn test_failed_line_restores_earlier_lines() {
        let ledger = setup().await;
        let client = seed_client(&ledger, "acme").await;
        let p1 = seed_product(&ledger, "P1", 1000, 5).await;
        let p2 = seed_product(&ledger, "P2", 700, 4).await;
        let p3 = seed_product(&ledger, "P3", 300, 1).await;

        let err = ledger
            .composer()
            .create_sale(
                &client.id,
                &[
                    LineRequest::new(&p1.id, 2),
                    LineRequest::new(&p2.id, 4),
                    LineRequest::new(&p3.id, 2),
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::Core(CoreError::InsufficientStock { .. })));
        assert_eq!(stock_of(&ledger, &p1.id).await, 5);
        assert_eq!(stock_of(&ledger, &p2.id).await, 4);
        assert_eq!(stock_of(&ledger, &p3.id).await, 1);
        assert_eq!(ledger.db().sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_product_restores_earlier_lines() {
        let ledger = setup().await;
        let client = seed_client(&ledger, "acme").await;
        let p1 = seed_product(&ledger, "P1", 1000, 5).await;

        let err = ledger
            .composer()
            .create_sale(
                &client.id,
                &[LineRequest::new(&p1.id, 5), LineRequest::new("ghost", 1)],
            )
            .await
            .unwrap_err();

        assert!(matches!(err.as_core(), Some(CoreError::ProductNotFound(_))));
        assert_eq!(stock_of(&ledger, &p1.id).await, 5);
    }

    #[tokio::test]
    async fn test_preconditions() {
        let ledger = setup().await;
        let client = seed_client(&ledger, "acme").await;
        let p = seed_product(&ledger, "P", 1000, 5).await;
        let composer = ledger.composer();

        let empty = composer.create_sale(&client.id, &[]).await.unwrap_err();
        assert!(matches!(empty.as_core(), Some(CoreError::EmptySale)));

        let zero = composer
            .create_sale(&client.id, &[LineRequest::new(&p.id, 0)])
            .await
            .unwrap_err();
        assert!(matches!(zero.as_core(), Some(CoreError::Validation(_))));

        let huge = composer
            .create_sale(&client.id, &[LineRequest::new(&p.id, MAX_ITEM_QUANTITY + 1)])
            .await
            .unwrap_err();
        assert!(matches!(huge.as_core(), Some(CoreError::Validation(_))));

        let nobody = composer
            .create_sale("nobody", &[LineRequest::new(&p.id, 1)])
            .await
            .unwrap_err();
        assert!(matches!(nobody.as_core(), Some(CoreError::ClientNotFound(_))));

        assert_eq!(stock_of(&ledger, &p.id).await, 5);
    }

    #[tokio::test]
    async fn test_overflowing_total_releases_stock() {
        let ledger = setup().await;
        let client = seed_client(&ledger, "acme").await;
        let cheap = seed_product(&ledger, "CHEAP", 100, 5).await;
        let pricey = seed_product(&ledger, "PRICEY", i64::MAX / 2, 5).await;

        let err = ledger
            .composer()
            .create_sale(
                &client.id,
                &[LineRequest::new(&cheap.id, 1), LineRequest::new(&pricey.id, 3)],
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Core(CoreError::Validation(ValidationError::AmountTooLarge { .. }))
        ));
        assert_eq!(stock_of(&ledger, &cheap.id).await, 5);
        assert_eq!(stock_of(&ledger, &pricey.id).await, 5);
        assert_eq!(ledger.db().sales().count().await.unwrap(), 0);

        let details = ledger
            .composer()
            .create_sale(&client.id, &[LineRequest::new(&cheap.id, 1)])
            .await
            .unwrap();
        assert_eq!(details.sale.number, "F-0001");
    }

    #[tokio::test]
    async fn test_numbers_are_sequential() {
        let ledger = setup().await;
        let client = seed_client(&ledger, "acme").await;
        let p = seed_product(&ledger, "P", 100, 100).await;
        let composer = ledger.composer();

        let mut numbers = Vec::new();
        for _ in 0..3 {
            let details = composer
                .create_sale(&client.id, &[LineRequest::new(&p.id, 1)])
                .await
                .unwrap();
            numbers.push(details.sale.number);
        }

        assert_eq!(numbers, vec!["F-0001", "F-0002", "F-0003"]);
    }

    #[tokio::test]
    async fn test_failed_sale_does_not_consume_a_number() {
        let ledger = setup().await;
        let client = seed_client(&ledger, "acme").await;
        let p = seed_product(&ledger, "P", 100, 1).await;
        let composer = ledger.composer();

        composer
            .create_sale(&client.id, &[LineRequest::new(&p.id, 2)])
            .await
            .unwrap_err();
        let details = composer
            .create_sale(&client.id, &[LineRequest::new(&p.id, 1)])
            .await
            .unwrap();

        assert_eq!(details.sale.number, "F-0001");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_get_distinct_sequential_numbers() {
        let (ledger, _dir) = setup_shared().await;
        let client = seed_client(&ledger, "acme").await;
        let p = seed_product(&ledger, "P", 100, 100).await;

        let mut handles = Vec::new();
        for _ in 0..20 {
            let composer = ledger.composer();
            let client_id = client.id.clone();
            let product_id = p.id.clone();
            handles.push(tokio::spawn(async move {
                composer
                    .create_sale(&client_id, &[LineRequest::new(product_id, 1)])
                    .await
            }));
        }

        let mut sequences = HashSet::new();
        for handle in handles {
            let details = handle.await.unwrap().unwrap();
            sequences.insert(parse_invoice_number(&details.sale.number).unwrap());
        }

        assert_eq!(sequences, (1..=20).collect::<HashSet<i64>>());
        assert_eq!(stock_of(&ledger, &p.id).await, 80);
    }

    #[tokio::test]
    async fn test_lagging_counter_is_recovered_by_retry() {
        let ledger = setup().await;
        let client = seed_client(&ledger, "acme").await;
        let p = seed_product(&ledger, "P", 100, 10).await;
        let composer = ledger.composer();

        for _ in 0..2 {
            composer
                .create_sale(&client.id, &[LineRequest::new(&p.id, 1)])
                .await
                .unwrap();
        }

        sqlx::query("UPDATE invoice_counters SET value = 0 WHERE name = 'sales'")
            .execute(ledger.db().pool())
            .await
            .unwrap();

        let details = composer
            .create_sale(&client.id, &[LineRequest::new(&p.id, 1)])
            .await
            .unwrap();
        assert_eq!(details.sale.number, "F-0003");
        assert_eq!(stock_of(&ledger, &p.id).await, 7);
    }

    #[tokio::test]
    async fn test_numbering_gives_up_after_configured_attempts() {
        let ledger = setup().await;
        let client = seed_client(&ledger, "acme").await;
        let p = seed_product(&ledger, "P", 100, 10).await;

        ledger
            .composer()
            .create_sale(&client.id, &[LineRequest::new(&p.id, 1)])
            .await
            .unwrap();

        // Counter stuck below F-0001 and unable to move forward.
        sqlx::query(
            r#"
            CREATE TRIGGER pin_counter AFTER UPDATE ON invoice_counters
            BEGIN
                UPDATE invoice_counters SET value = 0 WHERE name = NEW.name AND NEW.value <> 0;
            END
            "#,
        )
        .execute(ledger.db().pool())
        .await
        .unwrap();
        sqlx::query("UPDATE invoice_counters SET value = 0 WHERE name = 'sales'")
            .execute(ledger.db().pool())
            .await
            .unwrap();

        let composer = SaleComposer::new(
            ledger.db().clone(),
            LedgerConfig::default().numbering_attempts(2),
        );
        let err = composer
            .create_sale(&client.id, &[LineRequest::new(&p.id, 4)])
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_core(),
            Some(CoreError::InvoiceNumberConflict { attempts: 2 })
        ));
        assert_eq!(stock_of(&ledger, &p.id).await, 9);
    }
}
