//! Customer repository.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use storesync_core::{Address, Customer, Email, ExternalId};

use super::{StoreError, UpsertOutcome, map_unique_violation};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    external_id: String,
    first_name: String,
    last_name: String,
    email: Option<String>,
    phone: Option<String>,
    address: Option<Json<Address>>,
    orders_count: i64,
    total_spent: Decimal,
    tags: Json<BTreeSet<String>>,
    accepts_marketing: bool,
    platform_created_at: Option<DateTime<Utc>>,
    platform_updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = StoreError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let email = row
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| StoreError::DataCorruption(format!("invalid email in database: {e}")))?;

        Ok(Self {
            external_id: ExternalId::new(row.external_id),
            first_name: row.first_name,
            last_name: row.last_name,
            email,
            phone: row.phone,
            address: row.address.map(|a| a.0),
            orders_count: row.orders_count,
            total_spent: row.total_spent,
            tags: row.tags.0,
            accepts_marketing: row.accepts_marketing,
            platform_created_at: row.platform_created_at,
            platform_updated_at: row.platform_updated_at,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for customer database operations.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    /// Create a new customer repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a customer or overwrite the one with the same external ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if another customer already uses the email.
    /// Returns `StoreError::Database` if the query fails.
    pub async fn upsert(&self, customer: &Customer) -> Result<UpsertOutcome, StoreError> {
        let inserted: bool = sqlx::query_scalar(
            r"
            INSERT INTO storesync.customer (
                external_id, first_name, last_name, email, phone, address,
                orders_count, total_spent, tags, accepts_marketing,
                platform_created_at, platform_updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (external_id) DO UPDATE SET
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                address = EXCLUDED.address,
                orders_count = EXCLUDED.orders_count,
                total_spent = EXCLUDED.total_spent,
                tags = EXCLUDED.tags,
                accepts_marketing = EXCLUDED.accepts_marketing,
                platform_created_at = EXCLUDED.platform_created_at,
                platform_updated_at = EXCLUDED.platform_updated_at,
                updated_at = now()
            RETURNING (xmax = 0) AS inserted
            ",
        )
        .bind(customer.external_id.as_str())
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(customer.email.as_ref().map(Email::as_str))
        .bind(customer.phone.as_deref())
        .bind(customer.address.as_ref().map(Json))
        .bind(customer.orders_count)
        .bind(customer.total_spent)
        .bind(Json(&customer.tags))
        .bind(customer.accepts_marketing)
        .bind(customer.platform_created_at)
        .bind(customer.platform_updated_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &format!("customer {}", customer.external_id)))?;

        Ok(if inserted {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        })
    }

    /// Get a customer by external ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    /// Returns `StoreError::DataCorruption` if the stored email is invalid.
    pub async fn get(&self, external_id: &ExternalId) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r"
            SELECT external_id, first_name, last_name, email, phone, address,
                   orders_count, total_spent, tags, accepts_marketing,
                   platform_created_at, platform_updated_at
            FROM storesync.customer
            WHERE external_id = $1
            ",
        )
        .bind(external_id.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(Customer::try_from).transpose()
    }

    /// Delete a customer by external ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn delete(&self, external_id: &ExternalId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM storesync.customer WHERE external_id = $1")
            .bind(external_id.as_str())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count mirrored customers.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM storesync.customer")
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }
}
