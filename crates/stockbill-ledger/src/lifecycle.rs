//! # Sale Lifecycle
//!
//! Transitions after a sale exists: returning it and deleting it.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Completed ──process_return──► Returned (terminal)                    │
//! │       │        (restock all)        │                                   │
//! │       │                             │                                   │
//! │   delete_sale                   delete_sale                            │
//! │   (restock all)                 (no restock, already restored)         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each operation runs in one transaction: the status change (or delete)
//! and the restocks commit together. The status change carries the
//! expected status in its `WHERE` clause, so of two concurrent returns of
//! the same sale only one matches a row.

use tracing::info;

use crate::details::load_details;
use crate::error::{LedgerError, LedgerResult};
use crate::inventory::InventoryGuard;
use stockbill_core::{CoreError, Sale, SaleDetails, SaleStatus};
use stockbill_db::repository::sale;
use stockbill_db::{Database, DbError, DbTransaction};

/// Return and delete workflows for existing sales.
#[derive(Debug, Clone)]
pub struct SaleLifecycle {
    db: Database,
}

impl SaleLifecycle {
    pub fn new(db: Database) -> Self {
        SaleLifecycle { db }
    }

    /// Marks a completed sale as returned and puts its stock back.
    ///
    /// ## Errors
    /// * `SaleNotFound` - no such sale
    /// * `InvalidSaleStatus` - the sale is not `completed` (e.g. already returned)
    ///
    /// On error nothing changes: the sale stays as it was and no stock moves.
    pub async fn process_return(&self, sale_id: &str) -> LedgerResult<SaleDetails> {
        let mut tx = self.db.begin().await?;

        let moved = sale::transition_status_on(
            &mut *tx,
            sale_id,
            SaleStatus::Completed,
            SaleStatus::Returned,
        )
        .await?;

        if !moved {
            return Err(Self::explain_mismatch(&mut tx, sale_id).await);
        }

        let items = sale::get_items_on(&mut *tx, sale_id).await?;
        for item in &items {
            InventoryGuard::release_in(&mut *tx, &item.product_id, item.quantity).await?;
        }

        let returned = sale::get_by_id_on(&mut *tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        commit(tx).await?;

        info!(
            sale_id = %returned.id,
            number = %returned.number,
            lines = items.len(),
            "Sale returned"
        );

        load_details(&self.db, returned, items).await
    }

    /// Deletes a sale, putting its stock back if it was still `completed`.
    ///
    /// A `returned` sale already restored its stock and is removed without
    /// touching inventory.
    ///
    /// ## Returns
    /// The sale as it was just before deletion.
    pub async fn delete_sale(&self, sale_id: &str) -> LedgerResult<Sale> {
        let mut tx = self.db.begin().await?;

        let existing = sale::get_by_id_on(&mut *tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        let items = sale::get_items_on(&mut *tx, sale_id).await?;

        let deleted = sale::delete_if_status_on(&mut *tx, sale_id, existing.status).await?;
        if !deleted {
            return Err(Self::explain_mismatch(&mut tx, sale_id).await);
        }

        let restocked = existing.status.restocks_on_delete();
        if restocked {
            for item in &items {
                InventoryGuard::release_in(&mut *tx, &item.product_id, item.quantity).await?;
            }
        }

        commit(tx).await?;

        info!(
            sale_id = %existing.id,
            number = %existing.number,
            status = %existing.status,
            restocked,
            "Sale deleted"
        );

        Ok(existing)
    }

    /// Works out why a status-guarded statement matched no row.
    async fn explain_mismatch(tx: &mut DbTransaction, sale_id: &str) -> LedgerError {
        match sale::get_by_id_on(&mut **tx, sale_id).await {
            Ok(None) => CoreError::SaleNotFound(sale_id.to_string()).into(),
            Ok(Some(current)) => CoreError::InvalidSaleStatus {
                sale_id: sale_id.to_string(),
                current_status: current.status,
            }
            .into(),
            Err(err) => err.into(),
        }
    }
}

async fn commit(tx: DbTransaction) -> LedgerResult<()> {
    tx.commit()
        .await
        .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
