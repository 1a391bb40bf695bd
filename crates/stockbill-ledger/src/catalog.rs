//! # Catalog Services
//!
//! Product and client maintenance plus read access to sales.
//!
//! Uniqueness (SKU, client email, client tax id) is checked up front so
//! the caller gets a field-level `Duplicate` error; the UNIQUE indexes
//! still catch a concurrent writer, and that failure is mapped to the same
//! error.

use chrono::Utc;
use tracing::info;

use crate::details::load_details;
use crate::error::{LedgerError, LedgerResult};
use stockbill_core::validation::{validate_client_input, validate_product_input};
use stockbill_core::{
    Client, ClientInput, CoreError, Product, ProductInput, Sale, SaleDetails, ValidationError,
};
use stockbill_db::repository::client::generate_client_id;
use stockbill_db::repository::product::generate_product_id;
use stockbill_db::{ClientDuplicate, Database, DbError};

/// Catalog maintenance.
#[derive(Debug, Clone)]
pub struct Catalog {
    db: Database,
}

impl Catalog {
    pub fn new(db: Database) -> Self {
        Catalog { db }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Adds a product to the catalog.
    pub async fn create_product(&self, input: ProductInput) -> LedgerResult<Product> {
        let input = normalize_product(input);
        validate_product_input(&input)?;

        let products = self.db.products();
        if products.exists_by_sku(&input.sku, None).await? {
            return Err(duplicate("sku", &input.sku));
        }

        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            name: input.name,
            sku: input.sku,
            price_cents: input.price_cents,
            stock: input.stock,
            category: input.category,
            description: input.description,
            image_url: input.image_url,
            video_url: input.video_url,
            created_at: now,
            updated_at: now,
        };

        let product = products
            .insert(&product)
            .await
            .map_err(|e| unique_to_duplicate(e, "products.sku", "sku", &product.sku))?;

        info!(product_id = %product.id, sku = %product.sku, "Product created");
        Ok(product)
    }

    /// Replaces a product's catalog fields, stock included.
    pub async fn update_product(&self, id: &str, input: ProductInput) -> LedgerResult<Product> {
        let input = normalize_product(input);
        validate_product_input(&input)?;

        let products = self.db.products();
        let existing = products
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()))?;

        if products.exists_by_sku(&input.sku, Some(id)).await? {
            return Err(duplicate("sku", &input.sku));
        }

        let product = Product {
            name: input.name,
            sku: input.sku,
            price_cents: input.price_cents,
            stock: input.stock,
            category: input.category,
            description: input.description,
            image_url: input.image_url,
            video_url: input.video_url,
            ..existing
        };

        let product = products.update(&product).await.map_err(|e| match e {
            DbError::NotFound { .. } => CoreError::ProductNotFound(id.to_string()).into(),
            other => unique_to_duplicate(other, "products.sku", "sku", &product.sku),
        })?;

        info!(product_id = %product.id, sku = %product.sku, "Product updated");
        Ok(product)
    }

    /// Removes a product. Past sales keep their lines.
    pub async fn delete_product(&self, id: &str) -> LedgerResult<()> {
        self.db.products().delete(id).await.map_err(|e| match e {
            DbError::NotFound { .. } => CoreError::ProductNotFound(id.to_string()).into(),
            other => LedgerError::from(other),
        })?;

        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    pub async fn get_product(&self, id: &str) -> LedgerResult<Product> {
        self.db
            .products()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }

    /// All products, newest first.
    pub async fn list_products(&self) -> LedgerResult<Vec<Product>> {
        Ok(self.db.products().list().await?)
    }

    // =========================================================================
    // Clients
    // =========================================================================

    /// Registers a client.
    pub async fn create_client(&self, input: ClientInput) -> LedgerResult<Client> {
        let input = normalize_client(input);
        validate_client_input(&input)?;

        let clients = self.db.clients();
        self.ensure_client_unique(&input, None).await?;

        let now = Utc::now();
        let client = Client {
            id: generate_client_id(),
            name: input.name,
            email: input.email,
            phone: input.phone,
            address: input.address,
            tax_id: input.tax_id,
            created_at: now,
            updated_at: now,
        };

        let client = clients
            .insert(&client)
            .await
            .map_err(|e| client_unique_to_duplicate(e, &client))?;

        info!(client_id = %client.id, "Client created");
        Ok(client)
    }

    /// Replaces a client's fields.
    pub async fn update_client(&self, id: &str, input: ClientInput) -> LedgerResult<Client> {
        let input = normalize_client(input);
        validate_client_input(&input)?;

        let clients = self.db.clients();
        let existing = clients
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::ClientNotFound(id.to_string()))?;

        self.ensure_client_unique(&input, Some(id)).await?;

        let client = Client {
            name: input.name,
            email: input.email,
            phone: input.phone,
            address: input.address,
            tax_id: input.tax_id,
            ..existing
        };

        let client = clients.update(&client).await.map_err(|e| match e {
            DbError::NotFound { .. } => CoreError::ClientNotFound(id.to_string()).into(),
            other => client_unique_to_duplicate(other, &client),
        })?;

        info!(client_id = %client.id, "Client updated");
        Ok(client)
    }

    /// Removes a client that has no sales.
    ///
    /// ## Errors
    /// * `ClientNotFound` - no such client
    /// * `ClientHasSales` - at least one sale references the client
    pub async fn delete_client(&self, id: &str) -> LedgerResult<()> {
        let clients = self.db.clients();

        let sales = clients.count_sales(id).await?;
        if sales > 0 {
            return Err(CoreError::ClientHasSales {
                client_id: id.to_string(),
                sales,
            }
            .into());
        }

        clients.delete(id).await.map_err(|e| match e {
            DbError::NotFound { .. } => CoreError::ClientNotFound(id.to_string()).into(),
            // A sale was created between the count and the delete.
            DbError::ForeignKeyViolation { .. } => CoreError::ClientHasSales {
                client_id: id.to_string(),
                sales: 1,
            }
            .into(),
            other => LedgerError::from(other),
        })?;

        info!(client_id = %id, "Client deleted");
        Ok(())
    }

    pub async fn get_client(&self, id: &str) -> LedgerResult<Client> {
        self.db
            .clients()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::ClientNotFound(id.to_string()).into())
    }

    /// All clients, by name.
    pub async fn list_clients(&self) -> LedgerResult<Vec<Client>> {
        Ok(self.db.clients().list().await?)
    }

    async fn ensure_client_unique(
        &self,
        input: &ClientInput,
        excluding: Option<&str>,
    ) -> LedgerResult<()> {
        match self
            .db
            .clients()
            .find_duplicate(&input.email, &input.tax_id, excluding)
            .await?
        {
            Some(ClientDuplicate::Email) => Err(duplicate("email", &input.email)),
            Some(ClientDuplicate::TaxId) => Err(duplicate("tax_id", &input.tax_id)),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Sales (read side)
    // =========================================================================

    /// A sale with its client and lines resolved.
    pub async fn get_sale(&self, id: &str) -> LedgerResult<SaleDetails> {
        let sales = self.db.sales();
        let sale = sales
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(id.to_string()))?;
        let items = sales.get_items(id).await?;

        load_details(&self.db, sale, items).await
    }

    /// All sales, newest first.
    pub async fn list_sales(&self) -> LedgerResult<Vec<Sale>> {
        Ok(self.db.sales().list().await?)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn normalize_product(mut input: ProductInput) -> ProductInput {
    input.name = input.name.trim().to_string();
    input.sku = input.sku.trim().to_string();
    input.category = input.category.trim().to_string();
    input
}

fn normalize_client(mut input: ClientInput) -> ClientInput {
    input.name = input.name.trim().to_string();
    input.email = input.email.trim().to_lowercase();
    input.phone = input.phone.trim().to_string();
    input.address = input.address.trim().to_string();
    input.tax_id = input.tax_id.trim().to_uppercase();
    input
}

fn duplicate(field: &str, value: &str) -> LedgerError {
    ValidationError::Duplicate {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

fn unique_to_duplicate(err: DbError, column: &str, field: &str, value: &str) -> LedgerError {
    if err.is_unique_violation_on(column) {
        duplicate(field, value)
    } else {
        err.into()
    }
}

fn client_unique_to_duplicate(err: DbError, client: &Client) -> LedgerError {
    if err.is_unique_violation_on("clients.email") {
        duplicate("email", &client.email)
    } else if err.is_unique_violation_on("clients.tax_id") {
        duplicate("tax_id", &client.tax_id)
    } else {
        err.into()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{client_input, product_input, seed_client, seed_product, setup};
    use stockbill_core::LineRequest;

    fn is_duplicate(err: &LedgerError, expected: &str) -> bool {
        matches!(
            err.as_core(),
            Some(CoreError::Validation(ValidationError::Duplicate { field, .. })) if field == expected
        )
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected_on_create_and_update() {
        let ledger = setup().await;
        let catalog = ledger.catalog();
        seed_product(&ledger, "A-1", 100, 1).await;
        let b = seed_product(&ledger, "B-1", 100, 1).await;

        let err = catalog.create_product(product_input("A-1", 100, 1)).await.unwrap_err();
        assert!(is_duplicate(&err, "sku"));

        let err = catalog
            .update_product(&b.id, product_input("A-1", 100, 1))
            .await
            .unwrap_err();
        assert!(is_duplicate(&err, "sku"));

        // Keeping its own SKU is fine.
        let updated = catalog
            .update_product(&b.id, product_input("B-1", 250, 7))
            .await
            .unwrap();
        assert_eq!(updated.price_cents, 250);
        assert_eq!(updated.stock, 7);
        assert_eq!(updated.created_at, b.created_at);
    }

    #[tokio::test]
    async fn test_invalid_product_rejected() {
        let ledger = setup().await;
        let err = ledger
            .catalog()
            .create_product(product_input("OK", -1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err.as_core(), Some(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_unknown_ids() {
        let ledger = setup().await;
        let catalog = ledger.catalog();

        assert!(matches!(
            catalog.get_product("x").await.unwrap_err().as_core(),
            Some(CoreError::ProductNotFound(_))
        ));
        assert!(matches!(
            catalog.update_product("x", product_input("X", 1, 1)).await.unwrap_err().as_core(),
            Some(CoreError::ProductNotFound(_))
        ));
        assert!(matches!(
            catalog.delete_product("x").await.unwrap_err().as_core(),
            Some(CoreError::ProductNotFound(_))
        ));
        assert!(matches!(
            catalog.get_client("x").await.unwrap_err().as_core(),
            Some(CoreError::ClientNotFound(_))
        ));
        assert!(matches!(
            catalog.get_sale("x").await.unwrap_err().as_core(),
            Some(CoreError::SaleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_client_fields() {
        let ledger = setup().await;
        let catalog = ledger.catalog();
        let acme = seed_client(&ledger, "acme").await;

        let mut same_email = client_input("other");
        same_email.email = acme.email.to_uppercase();
        let err = catalog.create_client(same_email).await.unwrap_err();
        assert!(is_duplicate(&err, "email"));

        let mut same_tax_id = client_input("other");
        same_tax_id.tax_id = acme.tax_id.clone();
        let err = catalog.create_client(same_tax_id).await.unwrap_err();
        assert!(is_duplicate(&err, "tax_id"));

        let mut renamed = client_input("acme");
        renamed.name = "Acme Norte".to_string();
        let updated = catalog.update_client(&acme.id, renamed).await.unwrap();
        assert_eq!(updated.name, "Acme Norte");
    }

    #[tokio::test]
    async fn test_client_with_sales_cannot_be_deleted() {
        let ledger = setup().await;
        let catalog = ledger.catalog();
        let client = seed_client(&ledger, "acme").await;
        let p = seed_product(&ledger, "P", 100, 5).await;

        ledger
            .composer()
            .create_sale(&client.id, &[LineRequest::new(&p.id, 1)])
            .await
            .unwrap();

        let err = catalog.delete_client(&client.id).await.unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::ClientHasSales { sales: 1, .. })
        ));
        assert!(catalog.get_client(&client.id).await.is_ok());

        let idle = seed_client(&ledger, "idle").await;
        catalog.delete_client(&idle.id).await.unwrap();
        assert_eq!(catalog.list_clients().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sale_keeps_captured_price_after_product_changes() {
        let ledger = setup().await;
        let catalog = ledger.catalog();
        let client = seed_client(&ledger, "acme").await;
        let p = seed_product(&ledger, "P", 1000, 5).await;

        let sale = ledger
            .composer()
            .create_sale(&client.id, &[LineRequest::new(&p.id, 1)])
            .await
            .unwrap()
            .sale;

        catalog
            .update_product(&p.id, product_input("P", 9999, 4))
            .await
            .unwrap();

        let details = catalog.get_sale(&sale.id).await.unwrap();
        assert_eq!(details.items[0].item.unit_price_cents, 1000);
        assert_eq!(details.items[0].product.as_ref().unwrap().price_cents, 9999);
        assert_eq!(details.sale.total_cents, 1160);

        catalog.delete_product(&p.id).await.unwrap();
        let details = catalog.get_sale(&sale.id).await.unwrap();
        assert!(details.items[0].product.is_none());
        assert_eq!(catalog.list_sales().await.unwrap().len(), 1);
    }
}
