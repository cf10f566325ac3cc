//! Sync orchestration: bulk runs and single webhook events.
//!
//! A bulk run fetches every entity of a kind, then translates and upserts
//! them one at a time. An item that fails translation or storage is counted
//! and skipped; only a failed platform request ends the run early.

pub mod topic;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use storesync_core::{Cancellation, EntityKind, OrderStatus, Record};

use crate::clock::Clock;
use crate::db::{EntityStore, StoreError, UpsertOutcome};
use crate::platform::{PlatformClient, PlatformError};
use crate::translate::{TranslationError, translate};

pub use topic::Topic;

/// Errors that stop one item or one event from being mirrored.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Counts from one bulk run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub synced: usize,
    pub errors: usize,
    pub total: usize,
}

impl std::ops::AddAssign for SyncReport {
    fn add_assign(&mut self, other: Self) {
        self.synced += other.synced;
        self.errors += other.errors;
        self.total += other.total;
    }
}

/// Outcome of one kind within a full sync.
#[derive(Debug, Clone, Serialize)]
pub struct KindReport {
    pub kind: EntityKind,
    #[serde(flatten)]
    pub report: SyncReport,
    /// Set when the platform request for this kind failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a full sync across every kind.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FullSyncReport {
    pub kinds: Vec<KindReport>,
}

impl FullSyncReport {
    /// Counts summed over every kind.
    #[must_use]
    pub fn totals(&self) -> SyncReport {
        let mut totals = SyncReport::default();
        for kind in &self.kinds {
            totals += kind.report;
        }
        totals
    }

    /// True when every kind's platform requests succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.kinds.iter().all(|k| k.error.is_none())
    }

    /// True when no kind could be fetched at all.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        !self.kinds.is_empty() && self.kinds.iter().all(|k| k.error.is_some())
    }
}

/// What a webhook event did to the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Upserted(UpsertOutcome),
    Deleted { existed: bool },
    Cancelled,
    /// Unrecognized topic, or the entity no longer exists on the platform.
    Ignored,
}

/// Mirrors platform entities into the local store.
#[derive(Clone)]
pub struct SyncService {
    store: Arc<dyn EntityStore>,
    platform: Arc<dyn PlatformClient>,
    clock: Arc<dyn Clock>,
    page_size: u32,
}

impl SyncService {
    pub fn new(
        store: Arc<dyn EntityStore>,
        platform: Arc<dyn PlatformClient>,
        clock: Arc<dyn Clock>,
        page_size: u32,
    ) -> Self {
        Self {
            store,
            platform,
            clock,
            page_size,
        }
    }

    #[must_use]
    pub fn store(&self) -> &dyn EntityStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn platform(&self) -> &dyn PlatformClient {
        self.platform.as_ref()
    }

    /// Mirror every entity of one kind.
    ///
    /// Does not detect entities deleted on the platform since the last run.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError` if fetching the entities fails. Item-level
    /// failures are counted in the report instead.
    #[instrument(skip(self), fields(platform = %self.platform.platform()))]
    pub async fn sync_all(&self, kind: EntityKind) -> Result<SyncReport, PlatformError> {
        info!(%kind, "Starting bulk sync");
        let items = self.platform.list_all(kind, self.page_size).await?;
        debug!(%kind, count = items.len(), "Fetched items");

        let mut report = SyncReport {
            total: items.len(),
            ..SyncReport::default()
        };

        for item in &items {
            match self.upsert_payload(kind, item).await {
                Ok(_) => report.synced += 1,
                Err(e) => {
                    report.errors += 1;
                    let id = self.platform.platform().payload_id(kind, item);
                    warn!(%kind, id = ?id.as_ref().map(|id| id.as_str()), error = %e, "Skipping item");
                }
            }
        }

        info!(
            %kind,
            synced = report.synced,
            errors = report.errors,
            total = report.total,
            "Bulk sync finished"
        );
        Ok(report)
    }

    /// Mirror products, then customers, then orders.
    ///
    /// A platform failure for one kind is recorded in its report and the
    /// remaining kinds still run.
    #[instrument(skip(self))]
    pub async fn sync_everything(&self) -> FullSyncReport {
        let mut full = FullSyncReport::default();
        for kind in EntityKind::ALL {
            let kind_report = match self.sync_all(kind).await {
                Ok(report) => KindReport {
                    kind,
                    report,
                    error: None,
                },
                Err(e) => {
                    tracing::error!(%kind, error = %e, "Bulk sync failed");
                    KindReport {
                        kind,
                        report: SyncReport::default(),
                        error: Some(e.to_string()),
                    }
                }
            };
            full.kinds.push(kind_report);
        }
        full
    }

    /// Apply one webhook event.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if the payload cannot be translated, the store
    /// rejects the write, or refetching the entity from the platform fails.
    #[instrument(skip(self, payload), fields(topic = %topic))]
    pub async fn handle_event(
        &self,
        topic: &Topic,
        payload: &Value,
    ) -> Result<EventOutcome, SyncError> {
        match topic {
            Topic::Unrecognized(raw) => {
                info!(topic = %raw, "Ignoring unrecognized webhook topic");
                Ok(EventOutcome::Ignored)
            }
            Topic::Upsert(kind) => {
                let Some(payload) = self.resolve_payload(*kind, payload).await? else {
                    return Ok(EventOutcome::Ignored);
                };
                let outcome = self.upsert_payload(*kind, &payload).await?;
                Ok(EventOutcome::Upserted(outcome))
            }
            Topic::Delete(kind) => {
                let id = self
                    .platform
                    .platform()
                    .payload_id(*kind, payload)
                    .ok_or(TranslationError::MissingId(*kind))?;
                let existed = self.store.delete(*kind, &id).await?;
                if !existed {
                    debug!(%kind, %id, "Delete for a record that was never mirrored");
                }
                Ok(EventOutcome::Deleted { existed })
            }
            Topic::OrderCancelled => {
                let Some(payload) = self.resolve_payload(EntityKind::Order, payload).await? else {
                    return Ok(EventOutcome::Ignored);
                };
                self.cancel(&payload).await
            }
        }
    }

    /// Stamp a cancellation, or mirror the whole order if it is not stored yet.
    async fn cancel(&self, payload: &Value) -> Result<EventOutcome, SyncError> {
        let now = self.clock.now();
        let record = translate(self.platform.platform(), EntityKind::Order, payload, now)?;
        let Record::Order(mut order) = record else {
            return Err(TranslationError::NotAnObject(EntityKind::Order).into());
        };

        let cancellation = order
            .cancellation
            .get_or_insert_with(|| Cancellation {
                cancelled_at: now,
                reason: None,
            })
            .clone();
        order.status = OrderStatus::Cancelled;

        if self
            .store
            .cancel_order(&order.external_id, &cancellation)
            .await?
        {
            return Ok(EventOutcome::Cancelled);
        }

        debug!(id = %order.external_id, "Cancelled order not mirrored yet, storing it whole");
        let outcome = self.store.upsert(&Record::Order(order)).await?;
        Ok(EventOutcome::Upserted(outcome))
    }

    /// The full entity for an event: the payload itself, or a fresh copy
    /// from the platform when its webhooks carry only an identifier.
    async fn resolve_payload(
        &self,
        kind: EntityKind,
        payload: &Value,
    ) -> Result<Option<Value>, SyncError> {
        let platform = self.platform.platform();
        if platform.webhooks_carry_full_payload() {
            return Ok(Some(payload.clone()));
        }

        let id = platform
            .payload_id(kind, payload)
            .ok_or(TranslationError::MissingId(kind))?;
        let fetched = self.platform.get_by_id(kind, &id).await?;
        if fetched.is_none() {
            info!(%kind, %id, "Entity no longer exists on the platform");
        }
        Ok(fetched)
    }

    async fn upsert_payload(
        &self,
        kind: EntityKind,
        payload: &Value,
    ) -> Result<UpsertOutcome, SyncError> {
        let record = translate(self.platform.platform(), kind, payload, self.clock.now())?;
        Ok(self.store.upsert(&record).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use storesync_core::ExternalId;

    use super::*;
    use crate::clock::FixedClock;
    use crate::db::MemoryStore;
    use crate::platform::{Page, PageRequest, Platform, WebhookSubscription};

    struct FakePlatform {
        platform: Platform,
        items: HashMap<EntityKind, Vec<Value>>,
        failing: Vec<EntityKind>,
        fetches: Mutex<Vec<ExternalId>>,
    }

    impl FakePlatform {
        fn new(platform: Platform) -> Self {
            Self {
                platform,
                items: HashMap::new(),
                failing: vec![],
                fetches: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl PlatformClient for FakePlatform {
        fn platform(&self) -> Platform {
            self.platform
        }

        async fn list_page(&self, kind: EntityKind, _: PageRequest) -> Result<Page, PlatformError> {
            if self.failing.contains(&kind) {
                return Err(PlatformError::Api {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            Ok(Page {
                items: self.items.get(&kind).cloned().unwrap_or_default(),
                next: None,
            })
        }

        async fn get_by_id(
            &self,
            kind: EntityKind,
            id: &ExternalId,
        ) -> Result<Option<Value>, PlatformError> {
            self.fetches.lock().unwrap().push(id.clone());
            let items = self.items.get(&kind).cloned().unwrap_or_default();
            Ok(items
                .into_iter()
                .find(|item| self.platform.payload_id(kind, item).as_ref() == Some(id)))
        }

        async fn create(&self, _: EntityKind, fields: &Value) -> Result<Value, PlatformError> {
            Ok(fields.clone())
        }

        async fn update(
            &self,
            _: EntityKind,
            _: &ExternalId,
            fields: &Value,
        ) -> Result<Value, PlatformError> {
            Ok(fields.clone())
        }

        async fn list_webhooks(&self) -> Result<Vec<WebhookSubscription>, PlatformError> {
            Ok(vec![])
        }

        async fn create_webhook(
            &self,
            topic: &str,
            address: &str,
        ) -> Result<WebhookSubscription, PlatformError> {
            Ok(WebhookSubscription {
                id: "1".to_string(),
                topic: topic.to_string(),
                address: address.to_string(),
            })
        }

        async fn delete_webhook(&self, _: &str) -> Result<(), PlatformError> {
            Ok(())
        }

        fn webhook_topics(&self) -> &'static [&'static str] {
            &[]
        }
    }

    fn service(platform: FakePlatform) -> (SyncService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap());
        let service = SyncService::new(store.clone(), Arc::new(platform), Arc::new(clock), 50);
        (service, store)
    }

    #[tokio::test]
    async fn test_sync_all_skips_bad_items() {
        let mut platform = FakePlatform::new(Platform::Shopify);
        platform.items.insert(
            EntityKind::Product,
            vec![
                json!({ "id": 1, "title": "Mop", "variants": [{ "price": "9.99" }] }),
                json!({ "id": 2, "title": "Broom", "variants": [{ "price": "cheap" }] }),
                json!({ "id": 3, "title": "Bucket", "variants": [{ "price": "4.00" }] }),
            ],
        );
        let (service, store) = service(platform);

        let report = service.sync_all(EntityKind::Product).await.unwrap();
        assert_eq!(
            report,
            SyncReport {
                synced: 2,
                errors: 1,
                total: 3
            }
        );

        let missing = store
            .get(EntityKind::Product, &ExternalId::new("2"))
            .await
            .unwrap();
        assert!(missing.is_none());
        assert_eq!(store.count(EntityKind::Product).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_sync_all_isolates_arithmetic_overflow() {
        let mut platform = FakePlatform::new(Platform::Shopify);
        platform.items.insert(
            EntityKind::Order,
            vec![
                json!({ "id": 1, "name": "#1", "line_items": [{ "quantity": 2, "price": "5.00" }] }),
                json!({
                    "id": 2,
                    "name": "#2",
                    "line_items": [{ "quantity": 9e18, "price": "100000000000000" }]
                }),
                json!({ "id": 3, "name": "#3" }),
            ],
        );
        platform.items.insert(
            EntityKind::Product,
            vec![json!({
                "id": 9,
                "variants": [
                    { "price": "1.00", "inventory_quantity": i64::MAX },
                    { "price": "1.00", "inventory_quantity": 1 }
                ]
            })],
        );
        let (service, store) = service(platform);

        let report = service.sync_all(EntityKind::Order).await.unwrap();
        assert_eq!(
            report,
            SyncReport {
                synced: 2,
                errors: 1,
                total: 3
            }
        );
        assert!(
            store
                .get(EntityKind::Order, &ExternalId::new("3"))
                .await
                .unwrap()
                .is_some()
        );

        let report = service.sync_all(EntityKind::Product).await.unwrap();
        assert_eq!(report.synced, 1);
        let Some(Record::Product(product)) = store
            .get(EntityKind::Product, &ExternalId::new("9"))
            .await
            .unwrap()
        else {
            panic!("product missing");
        };
        assert!(product.in_stock());
    }

    #[tokio::test]
    async fn test_sync_everything_continues_after_failed_kind() {
        let mut platform = FakePlatform::new(Platform::Shopify);
        platform.failing.push(EntityKind::Customer);
        platform
            .items
            .insert(EntityKind::Order, vec![json!({ "id": 10, "name": "#10" })]);
        let (service, _store) = service(platform);

        let full = service.sync_everything().await;
        assert_eq!(full.kinds.len(), 3);
        assert!(!full.is_complete());
        assert!(!full.all_failed());
        assert!(full.kinds[1].error.is_some());
        assert_eq!(full.totals().synced, 1);
    }

    #[tokio::test]
    async fn test_delete_event() {
        let (service, store) = service(FakePlatform::new(Platform::Shopify));
        let payload = json!({ "id": 7, "title": "Mop" });
        service
            .handle_event(&Topic::parse("products/create"), &payload)
            .await
            .unwrap();

        let outcome = service
            .handle_event(&Topic::parse("products/delete"), &json!({ "id": 7 }))
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Deleted { existed: true });
        assert_eq!(store.count(EntityKind::Product).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unrecognized_topic_is_ignored() {
        let (service, store) = service(FakePlatform::new(Platform::Shopify));
        let outcome = service
            .handle_event(&Topic::parse("shop/update"), &json!({ "id": 1 }))
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Ignored);
        assert_eq!(store.count(EntityKind::Product).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancel_stamps_existing_order() {
        let (service, store) = service(FakePlatform::new(Platform::Shopify));
        let order = json!({ "id": 5, "name": "#5", "total_price": "10.00", "financial_status": "paid" });
        service
            .handle_event(&Topic::parse("orders/create"), &order)
            .await
            .unwrap();

        let cancelled = json!({
            "id": 5,
            "cancelled_at": "2026-05-30T12:00:00Z",
            "cancel_reason": "fraud"
        });
        let outcome = service
            .handle_event(&Topic::OrderCancelled, &cancelled)
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Cancelled);

        let Some(Record::Order(stored)) = store
            .get(EntityKind::Order, &ExternalId::new("5"))
            .await
            .unwrap()
        else {
            panic!("order missing");
        };
        assert_eq!(stored.status, OrderStatus::Cancelled);
        assert_eq!(stored.order_number, "#5");
        assert_eq!(stored.cancellation.unwrap().reason.as_deref(), Some("fraud"));
    }

    #[tokio::test]
    async fn test_cancel_of_unknown_order_stores_it() {
        let (service, store) = service(FakePlatform::new(Platform::Shopify));
        let outcome = service
            .handle_event(&Topic::OrderCancelled, &json!({ "id": 6, "name": "#6" }))
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Upserted(UpsertOutcome::Created));

        let Some(Record::Order(stored)) = store
            .get(EntityKind::Order, &ExternalId::new("6"))
            .await
            .unwrap()
        else {
            panic!("order missing");
        };
        assert_eq!(stored.status, OrderStatus::Cancelled);
        assert!(stored.cancellation.is_some());
    }

    #[tokio::test]
    async fn test_id_only_webhooks_refetch() {
        let mut platform = FakePlatform::new(Platform::Lightspeed);
        platform.items.insert(
            EntityKind::Product,
            vec![json!({ "itemID": "42", "description": "Sponge" })],
        );
        let (service, store) = service(platform);

        let outcome = service
            .handle_event(&Topic::parse("item.update"), &json!({ "itemID": "42" }))
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Upserted(UpsertOutcome::Created));

        let Some(Record::Product(product)) = store
            .get(EntityKind::Product, &ExternalId::new("42"))
            .await
            .unwrap()
        else {
            panic!("product missing");
        };
        assert_eq!(product.name, "Sponge");

        let outcome = service
            .handle_event(&Topic::parse("item.update"), &json!({ "itemID": "404" }))
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_event_without_id_fails() {
        let (service, _store) = service(FakePlatform::new(Platform::Shopify));
        let err = service
            .handle_event(&Topic::parse("customers/delete"), &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Translation(TranslationError::MissingId(EntityKind::Customer))
        ));
    }
}
