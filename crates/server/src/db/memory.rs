//! Process-local [`EntityStore`] used for tests and database-less dev runs.
//!
//! Enforces the same uniqueness rules as the `PostgreSQL` schema: external ID
//! per kind, customer email, and order number.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use storesync_core::{
    Cancellation, Customer, EntityKind, ExternalId, Order, OrderStatus, Product, Record,
};

use super::{EntityStore, StoreError, UpsertOutcome};

#[derive(Debug, Default)]
struct Tables {
    products: HashMap<ExternalId, Product>,
    customers: HashMap<ExternalId, Customer>,
    orders: HashMap<ExternalId, Order>,
}

/// In-memory mirror store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn outcome<T>(previous: Option<T>) -> UpsertOutcome {
    if previous.is_some() {
        UpsertOutcome::Updated
    } else {
        UpsertOutcome::Created
    }
}

fn check_customer_email(tables: &Tables, customer: &Customer) -> Result<(), StoreError> {
    let Some(email) = &customer.email else {
        return Ok(());
    };
    let taken = tables
        .customers
        .values()
        .any(|other| other.external_id != customer.external_id && other.email.as_ref() == Some(email));
    if taken {
        return Err(StoreError::Conflict(format!(
            "customer {} violates customer_email_key",
            customer.external_id
        )));
    }
    Ok(())
}

fn check_order_number(tables: &Tables, order: &Order) -> Result<(), StoreError> {
    let taken = tables
        .orders
        .values()
        .any(|other| other.external_id != order.external_id && other.order_number == order.order_number);
    if taken {
        return Err(StoreError::Conflict(format!(
            "order {} violates sales_order_order_number_key",
            order.external_id
        )));
    }
    Ok(())
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn upsert(&self, record: &Record) -> Result<UpsertOutcome, StoreError> {
        let mut tables = self.tables.write().await;
        match record {
            Record::Product(product) => Ok(outcome(
                tables
                    .products
                    .insert(product.external_id.clone(), product.clone()),
            )),
            Record::Customer(customer) => {
                check_customer_email(&tables, customer)?;
                Ok(outcome(
                    tables
                        .customers
                        .insert(customer.external_id.clone(), customer.clone()),
                ))
            }
            Record::Order(order) => {
                check_order_number(&tables, order)?;
                Ok(outcome(
                    tables.orders.insert(order.external_id.clone(), order.clone()),
                ))
            }
        }
    }

    async fn delete(&self, kind: EntityKind, external_id: &ExternalId) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let removed = match kind {
            EntityKind::Product => tables.products.remove(external_id).is_some(),
            EntityKind::Customer => tables.customers.remove(external_id).is_some(),
            EntityKind::Order => tables.orders.remove(external_id).is_some(),
        };
        Ok(removed)
    }

    async fn cancel_order(
        &self,
        external_id: &ExternalId,
        cancellation: &Cancellation,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(order) = tables.orders.get_mut(external_id) else {
            return Ok(false);
        };
        order.status = OrderStatus::Cancelled;
        order.cancellation = Some(cancellation.clone());
        Ok(true)
    }

    async fn get(
        &self,
        kind: EntityKind,
        external_id: &ExternalId,
    ) -> Result<Option<Record>, StoreError> {
        let tables = self.tables.read().await;
        let record = match kind {
            EntityKind::Product => tables.products.get(external_id).cloned().map(Record::from),
            EntityKind::Customer => tables.customers.get(external_id).cloned().map(Record::from),
            EntityKind::Order => tables.orders.get(external_id).cloned().map(Record::from),
        };
        Ok(record)
    }

    async fn count(&self, kind: EntityKind) -> Result<i64, StoreError> {
        let tables = self.tables.read().await;
        let len = match kind {
            EntityKind::Product => tables.products.len(),
            EntityKind::Customer => tables.customers.len(),
            EntityKind::Order => tables.orders.len(),
        };
        i64::try_from(len).map_err(|e| StoreError::DataCorruption(e.to_string()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
