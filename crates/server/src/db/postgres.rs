//! `PostgreSQL`-backed [`EntityStore`].

use async_trait::async_trait;
use sqlx::PgPool;

use storesync_core::{Cancellation, EntityKind, ExternalId, Record};

use super::{
    CustomerRepository, EntityStore, OrderRepository, ProductRepository, StoreError,
    UpsertOutcome,
};

/// Dispatches store operations to the per-kind repositories.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn upsert(&self, record: &Record) -> Result<UpsertOutcome, StoreError> {
        match record {
            Record::Product(product) => ProductRepository::new(&self.pool).upsert(product).await,
            Record::Customer(customer) => {
                CustomerRepository::new(&self.pool).upsert(customer).await
            }
            Record::Order(order) => OrderRepository::new(&self.pool).upsert(order).await,
        }
    }

    async fn delete(&self, kind: EntityKind, external_id: &ExternalId) -> Result<bool, StoreError> {
        match kind {
            EntityKind::Product => ProductRepository::new(&self.pool).delete(external_id).await,
            EntityKind::Customer => CustomerRepository::new(&self.pool).delete(external_id).await,
            EntityKind::Order => OrderRepository::new(&self.pool).delete(external_id).await,
        }
    }

    async fn cancel_order(
        &self,
        external_id: &ExternalId,
        cancellation: &Cancellation,
    ) -> Result<bool, StoreError> {
        OrderRepository::new(&self.pool)
            .cancel(external_id, cancellation)
            .await
    }

    async fn get(
        &self,
        kind: EntityKind,
        external_id: &ExternalId,
    ) -> Result<Option<Record>, StoreError> {
        Ok(match kind {
            EntityKind::Product => ProductRepository::new(&self.pool)
                .get(external_id)
                .await?
                .map(Record::from),
            EntityKind::Customer => CustomerRepository::new(&self.pool)
                .get(external_id)
                .await?
                .map(Record::from),
            EntityKind::Order => OrderRepository::new(&self.pool)
                .get(external_id)
                .await?
                .map(Record::from),
        })
    }

    async fn count(&self, kind: EntityKind) -> Result<i64, StoreError> {
        match kind {
            EntityKind::Product => ProductRepository::new(&self.pool).count().await,
            EntityKind::Customer => CustomerRepository::new(&self.pool).count().await,
            EntityKind::Order => OrderRepository::new(&self.pool).count().await,
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
