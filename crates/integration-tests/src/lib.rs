//! Integration tests for storesync.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process tests (fake platform, memory store)
//! cargo test -p storesync-integration-tests
//!
//! # Include the PostgreSQL store tests
//! STORESYNC_TEST_DATABASE_URL=postgres://... \
//!   cargo test -p storesync-integration-tests -- --include-ignored
//! ```
//!
//! # Test Categories
//!
//! - `webhook_ingestion` - Signed webhooks through the router into the store
//! - `bulk_sync` - `/sync/*` endpoints and partial-failure accounting
//! - `webhook_registration` - `/webhooks/*` endpoints
//! - `token_refresh` - Lightspeed client against a local fake API
//! - `shopify_pagination` - Shopify client against a local fake API
//! - `postgres_store` - `PgStore` against a real database
//!
//! The router runs in-process via `tower::ServiceExt::oneshot`; outbound
//! platform clients talk to axum fakes bound to `127.0.0.1:0`.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
};
use chrono::{DateTime, TimeZone, Utc};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;
use url::Url;

use storesync_core::{EntityKind, ExternalId, Record};
use storesync_server::clock::FixedClock;
use storesync_server::config::{
    PlatformConfig, ShopifyConfig, StoreBackend, SyncConfig, WebhookConfig,
};
use storesync_server::db::{EntityStore, MemoryStore};
use storesync_server::platform::{
    Page, PageRequest, Platform, PlatformClient, PlatformError, WebhookSubscription, shopify,
};
use storesync_server::routes;
use storesync_server::signature::sign_with;
use storesync_server::state::{AppState, OAuthConnector};
use storesync_server::sync::SyncService;

/// Primary webhook secret used by every test context.
pub const TEST_SECRET: &str = "kQ7vX2pL9mZ4tR8wB3nC6yH1jF5sD0gA";

/// Secondary secret, set only by [`TestContext::with_rotation`].
pub const ROTATED_SECRET: &str = "Hc4Nw8Tq2Lz6Rb1Vy9Pk3Xm7Gf5Js0Ud";

pub const SHOP_DOMAIN: &str = "mops-and-more.myshopify.com";

/// The instant every test context's clock is frozen at.
#[must_use]
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()
}

/// Configuration for an in-process server: memory store, Shopify platform.
#[must_use]
pub fn test_config() -> SyncConfig {
    SyncConfig {
        database_url: None,
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        public_url: "https://sync.example.com".to_string(),
        store: StoreBackend::Memory,
        platform: PlatformConfig::Shopify(ShopifyConfig {
            store: SHOP_DOMAIN.to_string(),
            api_version: "2026-01".to_string(),
            access_token: SecretString::from("shpat_test"),
        }),
        webhook: WebhookConfig {
            secret: SecretString::from(TEST_SECRET),
            secondary_secret: None,
            verify_shop: false,
        },
        http_timeout: Duration::from_secs(5),
        page_size: 2,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

// ============================================================================
// Fake platform
// ============================================================================

#[derive(Debug, Default)]
struct FakeState {
    items: HashMap<EntityKind, Vec<Value>>,
    failing: HashMap<EntityKind, fn() -> PlatformError>,
    webhooks: Vec<WebhookSubscription>,
    next_webhook_id: u64,
}

/// In-memory platform double.
///
/// Listings are paged by index so bulk sync walks real cursors. Kinds marked
/// failing return an error (503 by default) from every list call.
#[derive(Debug)]
pub struct FakePlatform {
    platform: Platform,
    state: Mutex<FakeState>,
}

impl FakePlatform {
    #[must_use]
    pub fn shopify() -> Self {
        Self::new(Platform::Shopify)
    }

    #[must_use]
    pub fn lightspeed() -> Self {
        Self::new(Platform::Lightspeed)
    }

    fn new(platform: Platform) -> Self {
        Self {
            platform,
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn set_items(&self, kind: EntityKind, items: Vec<Value>) {
        self.state.lock().unwrap().items.insert(kind, items);
    }

    pub fn fail(&self, kind: EntityKind) {
        self.fail_with(kind, unavailable);
    }

    pub fn fail_with(&self, kind: EntityKind, error: fn() -> PlatformError) {
        self.state.lock().unwrap().failing.insert(kind, error);
    }

    pub fn fail_all(&self) {
        for kind in EntityKind::ALL {
            self.fail(kind);
        }
    }

    #[must_use]
    pub fn webhooks(&self) -> Vec<WebhookSubscription> {
        self.state.lock().unwrap().webhooks.clone()
    }
}

fn unavailable() -> PlatformError {
    PlatformError::Api {
        status: 503,
        message: "platform unavailable".to_string(),
    }
}

#[async_trait]
impl PlatformClient for FakePlatform {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn list_page(&self, kind: EntityKind, page: PageRequest) -> Result<Page, PlatformError> {
        let state = self.state.lock().unwrap();
        if let Some(error) = state.failing.get(&kind) {
            return Err(error());
        }

        let all = state.items.get(&kind).cloned().unwrap_or_default();
        let start: usize = page.cursor.as_deref().map_or(0, |c| c.parse().unwrap());
        let end = (start + usize::try_from(page.limit).unwrap()).min(all.len());
        let items = all.get(start..end).unwrap_or_default().to_vec();
        let next = (end < all.len()).then(|| end.to_string());
        Ok(Page { items, next })
    }

    async fn get_by_id(
        &self,
        kind: EntityKind,
        id: &ExternalId,
    ) -> Result<Option<Value>, PlatformError> {
        let state = self.state.lock().unwrap();
        Ok(state.items.get(&kind).and_then(|items| {
            items
                .iter()
                .find(|item| self.platform.payload_id(kind, item).as_ref() == Some(id))
                .cloned()
        }))
    }

    async fn create(&self, _kind: EntityKind, fields: &Value) -> Result<Value, PlatformError> {
        Ok(fields.clone())
    }

    async fn update(
        &self,
        _kind: EntityKind,
        _id: &ExternalId,
        fields: &Value,
    ) -> Result<Value, PlatformError> {
        Ok(fields.clone())
    }

    async fn list_webhooks(&self) -> Result<Vec<WebhookSubscription>, PlatformError> {
        Ok(self.webhooks())
    }

    async fn create_webhook(
        &self,
        topic: &str,
        address: &str,
    ) -> Result<WebhookSubscription, PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.next_webhook_id += 1;
        let subscription = WebhookSubscription {
            id: state.next_webhook_id.to_string(),
            topic: topic.to_string(),
            address: address.to_string(),
        };
        state.webhooks.push(subscription.clone());
        Ok(subscription)
    }

    async fn delete_webhook(&self, id: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        let before = state.webhooks.len();
        state.webhooks.retain(|w| w.id != id);
        if state.webhooks.len() == before {
            return Err(PlatformError::NotFound(format!("webhook {id}")));
        }
        Ok(())
    }

    fn webhook_topics(&self) -> &'static [&'static str] {
        match self.platform {
            Platform::Shopify => shopify::WEBHOOK_TOPICS,
            Platform::Lightspeed => &[],
        }
    }
}

// ============================================================================
// Test context
// ============================================================================

/// The full router wired to a memory store and a [`FakePlatform`].
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub platform: Arc<FakePlatform>,
    app: Router,
}

impl TestContext {
    /// Shopify platform, default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(FakePlatform::shopify(), test_config())
    }

    /// Shopify platform with both webhook secrets accepted.
    #[must_use]
    pub fn with_rotation() -> Self {
        let mut config = test_config();
        config.webhook.secondary_secret = Some(SecretString::from(ROTATED_SECRET));
        Self::build(FakePlatform::shopify(), config)
    }

    #[must_use]
    pub fn build(platform: FakePlatform, config: SyncConfig) -> Self {
        Self::build_with_oauth(platform, config, None)
    }

    #[must_use]
    pub fn build_with_oauth(
        platform: FakePlatform,
        config: SyncConfig,
        oauth: Option<OAuthConnector>,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let platform = Arc::new(platform);
        let sync = SyncService::new(
            store.clone(),
            platform.clone(),
            Arc::new(FixedClock(test_now())),
            config.page_size,
        );
        let app = routes::app(AppState::new(config, sync, oauth));
        Self {
            store,
            platform,
            app,
        }
    }

    /// Send a bodiless request and return the raw response.
    pub async fn raw(&self, method: Method, uri: &str) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Send a request through the router and decode the JSON body.
    ///
    /// Non-JSON bodies decode as `Value::Null`.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn call(&self, method: Method, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Deliver a webhook signed with [`TEST_SECRET`].
    pub async fn post_webhook(&self, topic: &str, body: &str) -> (StatusCode, Value) {
        let signature = sign(TEST_SECRET, body.as_bytes());
        self.post_webhook_with(
            &[("x-shopify-topic", topic), ("x-shopify-hmac-sha256", &signature)],
            body,
        )
        .await
    }

    /// Deliver a webhook with exactly the given headers.
    pub async fn post_webhook_with(
        &self,
        headers: &[(&str, &str)],
        body: &str,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri("/webhook")
            .header("content-type", "application/json");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        self.send(request.body(Body::from(body.to_owned())).unwrap())
            .await
    }

    /// Poll the store until `check` accepts the record, or give up after 2s.
    ///
    /// Webhooks are processed after the response, so tests wait for effects.
    pub async fn wait_for<F>(&self, kind: EntityKind, id: &str, check: F) -> Option<Record>
    where
        F: Fn(Option<&Record>) -> bool,
    {
        let id = ExternalId::new(id);
        for _ in 0..200 {
            let record = self.store.get(kind, &id).await.unwrap();
            if check(record.as_ref()) {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {kind} {id}");
    }

    /// Wait until the record exists.
    pub async fn wait_for_record(&self, kind: EntityKind, id: &str) -> Record {
        self.wait_for(kind, id, |r| r.is_some()).await.unwrap()
    }

    pub async fn count(&self, kind: EntityKind) -> i64 {
        self.store.count(kind).await.unwrap()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Base64 HMAC-SHA256 of `body` under `secret`.
#[must_use]
pub fn sign(secret: &str, body: &[u8]) -> String {
    sign_with(&SecretString::from(secret), body)
}

/// Give spawned webhook tasks a chance to run before asserting absence.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

/// Serve `make_router(base_url)` on an ephemeral local port.
///
/// The router gets its own base URL so fakes can emit absolute pagination
/// links.
pub async fn spawn_fake_server<F>(make_router: F) -> Url
where
    F: FnOnce(Url) -> Router,
{
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base = Url::parse(&format!("http://{addr}/")).unwrap();
    let router = make_router(base.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    base
}
