//! `/sync/*` endpoints against the fake platform.
//!
//! The test config pages two items at a time, so three-item listings walk
//! a real cursor.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use storesync_core::{EntityKind, ExternalId};
use storesync_integration_tests::{FakePlatform, TestContext, test_config};
use storesync_server::db::EntityStore;
use storesync_server::platform::PlatformError;

fn products() -> Vec<Value> {
    vec![
        json!({ "id": 1, "title": "Mop", "variants": [{ "price": "9.99" }] }),
        json!({ "id": 2, "title": "Broken", "variants": [{ "price": "free" }] }),
        json!({ "id": 3, "title": "Bucket", "variants": [{ "price": "14.50" }] }),
    ]
}

fn customers() -> Vec<Value> {
    vec![
        json!({ "id": 10, "email": "ada@example.com", "first_name": "Ada" }),
        json!({ "id": 11, "email": "grace@example.com", "first_name": "Grace" }),
    ]
}

fn orders() -> Vec<Value> {
    vec![json!({ "id": 100, "name": "#1001", "total_price": "9.99" })]
}

fn seeded() -> TestContext {
    let ctx = TestContext::new();
    ctx.platform.set_items(EntityKind::Product, products());
    ctx.platform.set_items(EntityKind::Customer, customers());
    ctx.platform.set_items(EntityKind::Order, orders());
    ctx
}

// ============================================================================
// Single Kind
// ============================================================================

#[tokio::test]
async fn test_sync_products_counts_item_failures() {
    let ctx = seeded();

    let (status, body) = ctx.call(Method::POST, "/sync/products").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "success": true, "kind": "product", "synced": 2, "errors": 1, "total": 3 })
    );

    assert_eq!(ctx.count(EntityKind::Product).await, 2);
    let skipped = ctx
        .store
        .get(EntityKind::Product, &ExternalId::new("2"))
        .await
        .unwrap();
    assert!(skipped.is_none());
}

#[tokio::test]
async fn test_sync_is_idempotent() {
    let ctx = seeded();
    let id = ExternalId::new("1");

    let (_, first) = ctx.call(Method::POST, "/sync/products").await;
    let before = ctx.store.get(EntityKind::Product, &id).await.unwrap();

    let (_, second) = ctx.call(Method::POST, "/sync/products").await;
    let after = ctx.store.get(EntityKind::Product, &id).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(before, after);
    assert_eq!(ctx.count(EntityKind::Product).await, 2);
}

#[tokio::test]
async fn test_sync_kind_accepts_singular_and_case() {
    let ctx = seeded();

    let (status, body) = ctx.call(Method::POST, "/sync/Customer").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["synced"], 2);
    assert_eq!(ctx.count(EntityKind::Customer).await, 2);
}

#[tokio::test]
async fn test_sync_empty_listing() {
    let ctx = TestContext::new();

    let (status, body) = ctx.call(Method::POST, "/sync/orders").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert_eq!(body["synced"], 0);
}

#[tokio::test]
async fn test_sync_unknown_kind_is_bad_request() {
    let ctx = seeded();

    let (status, body) = ctx.call(Method::POST, "/sync/widgets").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("widgets"));
}

#[tokio::test]
async fn test_sync_platform_failure_is_server_error() {
    let ctx = seeded();
    ctx.platform.fail(EntityKind::Product);

    let (status, body) = ctx.call(Method::POST, "/sync/products").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "success": false, "error": "Platform request failed" })
    );
    assert_eq!(ctx.count(EntityKind::Product).await, 0);
}

#[tokio::test]
async fn test_sync_listing_not_found_is_server_error() {
    let ctx = seeded();
    ctx.platform.fail_with(EntityKind::Product, || {
        PlatformError::NotFound("admin/api/2019-01/products.json".to_string())
    });

    let (status, body) = ctx.call(Method::POST, "/sync/products").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "success": false, "error": "Platform request failed" })
    );
}

#[tokio::test]
async fn test_sync_unsupported_listing_is_server_error() {
    let ctx = seeded();
    ctx.platform.fail_with(EntityKind::Customer, || {
        PlatformError::Unsupported("customer listing".to_string())
    });

    let (status, body) = ctx.call(Method::POST, "/sync/customers").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
}

// ============================================================================
// All Kinds
// ============================================================================

#[tokio::test]
async fn test_sync_all_reports_every_kind() {
    let ctx = seeded();

    let (status, body) = ctx.call(Method::POST, "/sync/all").await;
    assert_eq!(status, StatusCode::OK);
    // Item failures are counted, not treated as a failed run.
    assert_eq!(body["success"], true);
    assert_eq!(body["synced"], 5);
    assert_eq!(body["errors"], 1);
    assert_eq!(body["total"], 6);
    assert!(body.get("error").is_none());

    let kinds: Vec<&str> = body["kinds"]
        .as_array()
        .unwrap()
        .iter()
        .map(|k| k["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, ["product", "customer", "order"]);

    assert_eq!(ctx.count(EntityKind::Order).await, 1);
}

#[tokio::test]
async fn test_sync_all_clean_run_is_success() {
    let ctx = TestContext::new();
    ctx.platform.set_items(EntityKind::Customer, customers());

    let (status, body) = ctx.call(Method::POST, "/sync/all").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["synced"], 2);
}

#[tokio::test]
async fn test_sync_all_continues_after_kind_failure() {
    let ctx = seeded();
    ctx.platform.fail(EntityKind::Customer);

    let (status, body) = ctx.call(Method::POST, "/sync/all").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);

    let customers = &body["kinds"][1];
    assert_eq!(customers["kind"], "customer");
    assert!(customers["error"].as_str().unwrap().contains("503"));

    assert_eq!(ctx.count(EntityKind::Product).await, 2);
    assert_eq!(ctx.count(EntityKind::Customer).await, 0);
    assert_eq!(ctx.count(EntityKind::Order).await, 1);
}

#[tokio::test]
async fn test_sync_all_total_failure_is_server_error() {
    let ctx = TestContext::build(FakePlatform::shopify(), test_config());
    ctx.platform.fail_all();

    let (status, body) = ctx.call(Method::POST, "/sync/all").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Platform request failed");
    assert_eq!(body["kinds"].as_array().unwrap().len(), 3);
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let ctx = TestContext::new();

    let (status, _) = ctx.call(Method::GET, "/health").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx.call(Method::GET, "/health/ready").await;
    assert_eq!(status, StatusCode::OK);
}
