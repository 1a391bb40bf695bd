//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - CRUD operations for the catalog
//! - Atomic stock primitives used by the ledger
//!
//! ## Stock Primitives
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                                │
//! │                                                                         │
//! │  ❌ WRONG: read-then-write (two sales can both see stock = 3)          │
//! │     SELECT stock ...;  UPDATE products SET stock = 0 ...               │
//! │                                                                         │
//! │  ✅ CORRECT: one conditional statement                                 │
//! │     UPDATE products SET stock = stock - 3                              │
//! │     WHERE id = ? AND stock >= 3                                        │
//! │     RETURNING price_cents                                              │
//! │                                                                         │
//! │  Sale A: qty 3 on stock 5 → row returned, stock 2                      │
//! │  Sale B: qty 3 on stock 2 → no row, nothing written                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `*_on` functions take any SQLite executor so the same statement can
//! run on the pool or inside a caller's transaction (`&mut *tx`).

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use stockbill_core::{Money, Product};

const SELECT_PRODUCT: &str = r#"
    SELECT
        id, name, sku, price_cents, stock, category,
        description, image_url, video_url,
        created_at, updated_at
    FROM products
"#;

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        get_by_id_on(&self.pool, id).await
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        debug!(sku = %sku, "Fetching product by SKU");

        let sql = format!("{SELECT_PRODUCT} WHERE sku = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Whether another product already uses `sku`.
    ///
    /// `excluding` skips one product id, so an update can keep its own SKU.
    pub async fn exists_by_sku(&self, sku: &str, excluding: Option<&str>) -> DbResult<bool> {
        debug!(sku = %sku, excluding = ?excluding, "Checking SKU uniqueness");

        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM products
                WHERE sku = ?1 AND (?2 IS NULL OR id <> ?2)
            )
            "#,
        )
        .bind(sku)
        .bind(excluding)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Lists all products, newest first.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        debug!("Listing products");

        let sql = format!("{SELECT_PRODUCT} ORDER BY created_at DESC, rowid DESC");
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Listed products");
        Ok(products)
    }

    /// Lists all products ordered by name (report order).
    pub async fn list_by_name(&self) -> DbResult<Vec<Product>> {
        debug!("Listing products by name");

        let sql = format!("{SELECT_PRODUCT} ORDER BY name COLLATE NOCASE, sku");
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Inserted product
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, sku, price_cents, stock, category,
                description, image_url, video_url,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(&product.category)
        .bind(&product.description)
        .bind(&product.image_url)
        .bind(&product.video_url)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| with_value(e.into(), "products.sku", &product.sku))?;

        Ok(product.clone())
    }

    /// Updates an existing product's catalog fields, stock included.
    ///
    /// `created_at` is left untouched and `updated_at` is set to now.
    ///
    /// ## Returns
    /// * `Ok(Product)` - The product as stored after the update
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    pub async fn update(&self, product: &Product) -> DbResult<Product> {
        debug!(id = %product.id, "Updating product");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                sku = ?3,
                price_cents = ?4,
                stock = ?5,
                category = ?6,
                description = ?7,
                image_url = ?8,
                video_url = ?9,
                updated_at = ?10
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(&product.category)
        .bind(&product.description)
        .bind(&product.image_url)
        .bind(&product.video_url)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| with_value(e.into(), "products.sku", &product.sku))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        self.get_by_id(&product.id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", &product.id))
    }

    /// Deletes a product.
    ///
    /// Sale line items keep their `product_id`; readers resolve it to
    /// `None` afterwards.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Atomically takes `quantity` units if at least that many are on hand.
    ///
    /// ## Returns
    /// * `Ok(Some(price))` - Stock decremented; unit price read in the same statement
    /// * `Ok(None)` - Product missing or not enough stock; nothing written
    pub async fn try_decrement_stock(&self, id: &str, quantity: i64) -> DbResult<Option<Money>> {
        try_decrement_stock_on(&self.pool, id, quantity).await
    }

    /// Atomically puts `quantity` units back.
    ///
    /// ## Returns
    /// * `Ok(true)` - Stock incremented
    /// * `Ok(false)` - Product no longer exists
    pub async fn increment_stock(&self, id: &str, quantity: i64) -> DbResult<bool> {
        increment_stock_on(&self.pool, id, quantity).await
    }

    /// Counts total products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Executor-generic statements
// =============================================================================

/// Gets a product by ID on any executor.
pub async fn get_by_id_on<'e, E>(executor: E, id: &str) -> DbResult<Option<Product>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    debug!(id = %id, "Fetching product by id");

    let sql = format!("{SELECT_PRODUCT} WHERE id = ?1");
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(product)
}

/// Conditional decrement, see [`ProductRepository::try_decrement_stock`].
pub async fn try_decrement_stock_on<'e, E>(
    executor: E,
    id: &str,
    quantity: i64,
) -> DbResult<Option<Money>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    debug!(id = %id, quantity = quantity, "Reserving stock");

    let price: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE products
        SET stock = stock - ?2, updated_at = ?3
        WHERE id = ?1 AND stock >= ?2
        RETURNING price_cents
        "#,
    )
    .bind(id)
    .bind(quantity)
    .bind(Utc::now())
    .fetch_optional(executor)
    .await?;

    Ok(price.map(Money::from_cents))
}

/// Unconditional increment, see [`ProductRepository::increment_stock`].
pub async fn increment_stock_on<'e, E>(executor: E, id: &str, quantity: i64) -> DbResult<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    debug!(id = %id, quantity = quantity, "Restoring stock");

    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock = stock + ?2, updated_at = ?3
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Fills in the offending value on a UNIQUE violation of `column`.
fn with_value(err: DbError, column: &str, value: &str) -> DbError {
    if err.is_unique_violation_on(column) {
        DbError::duplicate(column, value)
    } else {
        err
    }
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
