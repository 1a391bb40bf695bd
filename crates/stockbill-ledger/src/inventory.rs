//! # Inventory Guard
//!
//! Reserves and releases stock for sale lines.
//!
//! ## Reservation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  check_and_reserve(P, 3)                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UPDATE products SET stock = stock - 3                                 │
//! │  WHERE id = P AND stock >= 3 RETURNING price_cents                     │
//! │       │                                                                 │
//! │       ├── row   ──► Ok(unit price)        stock already decremented    │
//! │       │                                                                 │
//! │       └── no row ──► look P up (diagnosis only, nothing written)       │
//! │                       ├── missing  ──► ProductNotFound                 │
//! │                       └── present  ──► InsufficientStock { available } │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Releasing is an unconditional increment. A product deleted after the
//! sale cannot take its units back, so that release is logged and skipped.

use sqlx::SqliteConnection;
use tracing::{debug, warn};

use crate::error::LedgerResult;
use stockbill_core::validation::validate_quantity;
use stockbill_core::{CoreError, Money};
use stockbill_db::repository::product;
use stockbill_db::Database;

/// Atomic per-line stock reservation and release.
#[derive(Debug, Clone)]
pub struct InventoryGuard {
    db: Database,
}

impl InventoryGuard {
    pub fn new(db: Database) -> Self {
        InventoryGuard { db }
    }

    /// Takes `quantity` units of a product and returns its current unit price.
    ///
    /// ## Errors
    /// * `Validation` - quantity not positive or above the per-line maximum
    /// * `ProductNotFound` - no such product
    /// * `InsufficientStock` - fewer than `quantity` units on hand
    pub async fn check_and_reserve(&self, product_id: &str, quantity: i64) -> LedgerResult<Money> {
        validate_quantity(quantity)?;

        let products = self.db.products();

        if let Some(price) = products.try_decrement_stock(product_id, quantity).await? {
            debug!(product_id = %product_id, quantity, "Stock reserved");
            return Ok(price);
        }

        let err = match products.get_by_id(product_id).await? {
            None => CoreError::ProductNotFound(product_id.to_string()),
            Some(p) => CoreError::InsufficientStock {
                product_id: p.id,
                sku: p.sku,
                available: p.stock,
                requested: quantity,
            },
        };

        debug!(product_id = %product_id, quantity, error = %err, "Reservation refused");
        Err(err.into())
    }

    /// Puts `quantity` units back.
    ///
    /// Returns `false` (after a warning) when the product no longer exists.
    pub async fn release(&self, product_id: &str, quantity: i64) -> LedgerResult<bool> {
        let restored = product::increment_stock_on(self.db.pool(), product_id, quantity).await?;
        Ok(log_release(product_id, quantity, restored))
    }

    /// Same as [`release`](Self::release) but inside the caller's transaction,
    /// so the restock commits or rolls back with it.
    pub async fn release_in(
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
    ) -> LedgerResult<bool> {
        let restored = product::increment_stock_on(conn, product_id, quantity).await?;
        Ok(log_release(product_id, quantity, restored))
    }
}

fn log_release(product_id: &str, quantity: i64, restored: bool) -> bool {
    if restored {
        debug!(product_id = %product_id, quantity, "Stock released");
    } else {
        warn!(
            product_id = %product_id,
            quantity,
            "Product no longer exists, skipping stock release"
        );
    }
    restored
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::testing::{seed_product, setup, setup_shared};
    use stockbill_core::ValidationError;

    #[tokio::test]
    async fn test_reserve_then_refuse() {
        let ledger = setup().await;
        let guard = ledger.inventory();
        let p = seed_product(&ledger, "P", 1000, 5).await;

        let price = guard.check_and_reserve(&p.id, 3).await.unwrap();
        assert_eq!(price, Money::from_cents(1000));

        let err = guard.check_and_reserve(&p.id, 3).await.unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::InsufficientStock { available: 2, requested: 3, .. })
        ));

        let stock = ledger.db().products().get_by_id(&p.id).await.unwrap().unwrap().stock;
        assert_eq!(stock, 2);
    }

    #[tokio::test]
    async fn test_missing_product() {
        let ledger = setup().await;
        let err = ledger.inventory().check_and_reserve("nope", 1).await.unwrap_err();
        assert!(matches!(err.as_core(), Some(CoreError::ProductNotFound(id)) if id == "nope"));
    }

    #[tokio::test]
    async fn test_non_positive_quantity_is_rejected_before_storage() {
        let ledger = setup().await;
        let p = seed_product(&ledger, "P", 1000, 5).await;

        let err = ledger.inventory().check_and_reserve(&p.id, 0).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::Validation(ValidationError::MustBePositive { .. }))
        ));
    }

    #[tokio::test]
    async fn test_release_restores_and_skips_deleted_products() {
        let ledger = setup().await;
        let guard = ledger.inventory();
        let p = seed_product(&ledger, "P", 1000, 5).await;

        guard.check_and_reserve(&p.id, 5).await.unwrap();
        assert!(guard.release(&p.id, 5).await.unwrap());
        assert_eq!(
            ledger.db().products().get_by_id(&p.id).await.unwrap().unwrap().stock,
            5
        );

        ledger.db().products().delete(&p.id).await.unwrap();
        assert!(!guard.release(&p.id, 5).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reservations_never_oversell() {
        let (ledger, _dir) = setup_shared().await;
        let p = seed_product(&ledger, "HOT", 500, 5).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let guard = ledger.inventory();
            let id = p.id.clone();
            handles.push(tokio::spawn(async move {
                guard.check_and_reserve(&id, 1).await
            }));
        }

        let mut ok = 0;
        let mut refused = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(e) => {
                    assert!(matches!(e.as_core(), Some(CoreError::InsufficientStock { .. })));
                    refused += 1;
                }
            }
        }

        assert_eq!(ok, 5);
        assert_eq!(refused, 3);
        assert_eq!(
            ledger.db().products().get_by_id(&p.id).await.unwrap().unwrap().stock,
            0
        );
    }
}
