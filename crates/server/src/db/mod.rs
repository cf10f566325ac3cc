//! Local mirror storage.
//!
//! # Schema: `storesync`
//!
//! ## Tables
//!
//! - `product` - Mirrored products (variants, images as JSONB)
//! - `customer` - Mirrored customers (unique on `lower(email)`)
//! - `sales_order` - Mirrored orders (unique on `order_number`)
//! - `platform_token` - OAuth tokens for platforms that need refreshing
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p storesync-cli -- migrate
//! ```

mod customers;
mod memory;
mod orders;
mod postgres;
mod products;
mod tokens;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use storesync_core::{Cancellation, EntityKind, ExternalId, Record};

pub use customers::CustomerRepository;
pub use memory::MemoryStore;
pub use orders::OrderRepository;
pub use postgres::PgStore;
pub use products::ProductRepository;
pub use tokens::PgTokenStore;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Whether an upsert inserted a new record or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Create-or-replace storage for mirrored records, keyed by external ID.
///
/// `upsert` replaces every mutable field of an existing record, so applying
/// the same record twice leaves the store as applying it once. Concurrent
/// writes to one external ID are last-write-wins.
///
/// Idempotence holds per record, not per payload: a product's `is_new` flag
/// is computed from the translation clock, so re-syncing an unchanged payload
/// after it ages past the "new" window stores `is_new = false`.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Insert the record, or overwrite the stored one with the same external ID.
    async fn upsert(&self, record: &Record) -> Result<UpsertOutcome, StoreError>;

    /// Remove a record. Returns `false` when nothing was stored under the ID.
    async fn delete(&self, kind: EntityKind, external_id: &ExternalId) -> Result<bool, StoreError>;

    /// Stamp cancellation metadata on an order and mark it cancelled.
    ///
    /// Leaves every other field untouched. Returns `false` when the order is
    /// not mirrored.
    async fn cancel_order(
        &self,
        external_id: &ExternalId,
        cancellation: &Cancellation,
    ) -> Result<bool, StoreError>;

    async fn get(
        &self,
        kind: EntityKind,
        external_id: &ExternalId,
    ) -> Result<Option<Record>, StoreError>;

    async fn count(&self, kind: EntityKind) -> Result<i64, StoreError>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Connect the mirror's `PostgreSQL` pool.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique-constraint violation onto [`StoreError::Conflict`].
fn map_unique_violation(err: sqlx::Error, what: &str) -> StoreError {
    let constraint = match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => Some(
            db_err
                .constraint()
                .unwrap_or("unique constraint")
                .to_string(),
        ),
        _ => None,
    };
    match constraint {
        Some(constraint) => StoreError::Conflict(format!("{what} violates {constraint}")),
        None => StoreError::Database(err),
    }
}
