//! # Client Repository
//!
//! Database operations for clients. Sales reference clients through a
//! `RESTRICT` foreign key, so a client with sales cannot be removed even if
//! a caller skips the `count_sales` check.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use stockbill_core::Client;

const SELECT_CLIENT: &str = r#"
    SELECT id, name, email, phone, address, tax_id, created_at, updated_at
    FROM clients
"#;

/// Which unique client field collided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientDuplicate {
    Email,
    TaxId,
}

/// Repository for client database operations.
#[derive(Debug, Clone)]
pub struct ClientRepository {
    pool: SqlitePool,
}

impl ClientRepository {
    /// Creates a new ClientRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ClientRepository { pool }
    }

    /// Gets a client by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Client>> {
        get_by_id_on(&self.pool, id).await
    }

    /// Lists all clients ordered by name.
    pub async fn list(&self) -> DbResult<Vec<Client>> {
        debug!("Listing clients");

        let sql = format!("{SELECT_CLIENT} ORDER BY name COLLATE NOCASE, email");
        let clients = sqlx::query_as::<_, Client>(&sql)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = clients.len(), "Listed clients");
        Ok(clients)
    }

    /// Inserts a new client.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - email or tax id already used
    pub async fn insert(&self, client: &Client) -> DbResult<Client> {
        debug!(id = %client.id, email = %client.email, "Inserting client");

        sqlx::query(
            r#"
            INSERT INTO clients (
                id, name, email, phone, address, tax_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&client.id)
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.address)
        .bind(&client.tax_id)
        .bind(client.created_at)
        .bind(client.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(client.clone())
    }

    /// Updates an existing client.
    pub async fn update(&self, client: &Client) -> DbResult<Client> {
        debug!(id = %client.id, "Updating client");

        let result = sqlx::query(
            r#"
            UPDATE clients SET
                name = ?2,
                email = ?3,
                phone = ?4,
                address = ?5,
                tax_id = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(&client.id)
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.address)
        .bind(&client.tax_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Client", &client.id));
        }

        self.get_by_id(&client.id)
            .await?
            .ok_or_else(|| DbError::not_found("Client", &client.id))
    }

    /// Deletes a client.
    ///
    /// ## Returns
    /// * `Err(DbError::ForeignKeyViolation)` - sales still reference the client
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting client");

        let result = sqlx::query("DELETE FROM clients WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Client", id));
        }

        Ok(())
    }

    /// Finds which unique field, if any, another client already uses.
    ///
    /// Email is checked before tax id. `excluding` skips one client id so
    /// an update can keep its own values.
    pub async fn find_duplicate(
        &self,
        email: &str,
        tax_id: &str,
        excluding: Option<&str>,
    ) -> DbResult<Option<ClientDuplicate>> {
        debug!(email = %email, tax_id = %tax_id, "Checking client uniqueness");

        let row: Option<(String, String)> = sqlx::query_as(
            r#"
            SELECT email, tax_id FROM clients
            WHERE (email = ?1 OR tax_id = ?2) AND (?3 IS NULL OR id <> ?3)
            ORDER BY CASE WHEN email = ?1 THEN 0 ELSE 1 END
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(tax_id)
        .bind(excluding)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(found_email, _)| {
            if found_email == email {
                ClientDuplicate::Email
            } else {
                ClientDuplicate::TaxId
            }
        }))
    }

    /// Counts the sales billed to a client.
    pub async fn count_sales(&self, client_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE client_id = ?1")
            .bind(client_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Gets a client by ID on any executor.
pub async fn get_by_id_on<'e, E>(executor: E, id: &str) -> DbResult<Option<Client>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    debug!(id = %id, "Fetching client by id");

    let sql = format!("{SELECT_CLIENT} WHERE id = ?1");
    let client = sqlx::query_as::<_, Client>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(client)
}

/// Helper to generate a new client ID.
pub fn generate_client_id() -> String {
    Uuid::new_v4().to_string()
}
