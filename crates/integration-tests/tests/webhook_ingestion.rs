//! Signed webhooks through the router into the store.
//!
//! Run with: cargo test -p storesync-integration-tests --test webhook_ingestion

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;

use storesync_core::{EntityKind, OrderStatus, Record};
use storesync_integration_tests::{
    FakePlatform, ROTATED_SECRET, SHOP_DOMAIN, TEST_SECRET, TestContext, settle, sign, test_config,
};

const MOP: &str = r#"{"id":123,"title":"Mop","vendor":"Acme","variants":[{"price":"9.99","inventory_quantity":5}]}"#;

fn product(record: Record) -> storesync_core::Product {
    match record {
        Record::Product(product) => product,
        other => panic!("expected a product, got {other:?}"),
    }
}

fn order(record: Record) -> storesync_core::Order {
    match record {
        Record::Order(order) => order,
        other => panic!("expected an order, got {other:?}"),
    }
}

// ============================================================================
// Signature Tests
// ============================================================================

#[tokio::test]
async fn test_signed_product_update_is_mirrored() {
    let ctx = TestContext::new();

    let (status, body) = ctx.post_webhook("products/update", MOP).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let product = product(ctx.wait_for_record(EntityKind::Product, "123").await);
    assert_eq!(product.name, "Mop");
    assert_eq!(product.brand, "Acme");
    assert_eq!(product.price, Decimal::new(999, 2));
    assert_eq!(product.stock_quantity, 5);
    assert!(product.in_stock());
}

#[tokio::test]
async fn test_invalid_signature_is_rejected_and_not_applied() {
    let ctx = TestContext::new();
    let forged = sign("not-the-configured-secret", MOP.as_bytes());

    let (status, body) = ctx
        .post_webhook_with(
            &[("x-shopify-topic", "products/update"), ("x-shopify-hmac-sha256", &forged)],
            MOP,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid signature");

    settle().await;
    assert_eq!(ctx.count(EntityKind::Product).await, 0);
}

#[tokio::test]
async fn test_missing_signature_is_rejected() {
    let ctx = TestContext::new();

    let (status, _) = ctx
        .post_webhook_with(&[("x-shopify-topic", "products/update")], MOP)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signature_over_different_bytes_is_rejected() {
    let ctx = TestContext::new();
    // Same JSON, different whitespace: the signature covers raw bytes.
    let reformatted = MOP.replace(',', ", ");
    let signature = sign(TEST_SECRET, MOP.as_bytes());

    let (status, _) = ctx
        .post_webhook_with(
            &[("x-shopify-topic", "products/update"), ("x-shopify-hmac-sha256", &signature)],
            &reformatted,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_secondary_secret_accepted_during_rotation() {
    let ctx = TestContext::with_rotation();
    let signature = sign(ROTATED_SECRET, MOP.as_bytes());

    let (status, _) = ctx
        .post_webhook_with(
            &[("x-webhook-topic", "products/update"), ("x-webhook-signature", &signature)],
            MOP,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    ctx.wait_for_record(EntityKind::Product, "123").await;
}

#[tokio::test]
async fn test_blank_shopify_signature_falls_back_to_generic_header() {
    let ctx = TestContext::new();
    let signature = sign(TEST_SECRET, MOP.as_bytes());

    let (status, _) = ctx
        .post_webhook_with(
            &[
                ("x-shopify-topic", "products/update"),
                ("x-shopify-hmac-sha256", " "),
                ("x-webhook-signature", &signature),
            ],
            MOP,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    ctx.wait_for_record(EntityKind::Product, "123").await;
}

// ============================================================================
// Event Tests
// ============================================================================

#[tokio::test]
async fn test_same_webhook_twice_is_idempotent() {
    let ctx = TestContext::new();

    ctx.post_webhook("products/update", MOP).await;
    let first = ctx.wait_for_record(EntityKind::Product, "123").await;

    ctx.post_webhook("products/update", MOP).await;
    settle().await;

    assert_eq!(ctx.count(EntityKind::Product).await, 1);
    let second = ctx.wait_for_record(EntityKind::Product, "123").await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_update_replaces_every_field() {
    let ctx = TestContext::new();
    let tagged = r#"{"id":123,"title":"Mop","tags":"eco, featured","variants":[{"price":"9.99","sku":"MOP-1"}]}"#;
    ctx.post_webhook("products/create", tagged).await;
    ctx.wait_for(EntityKind::Product, "123", |r| r.is_some()).await;

    ctx.post_webhook("products/update", r#"{"id":123,"title":"Mop v2"}"#)
        .await;
    let updated = product(
        ctx.wait_for(EntityKind::Product, "123", |r| {
            matches!(r, Some(Record::Product(p)) if p.name == "Mop v2")
        })
        .await
        .unwrap(),
    );

    assert!(updated.tags.is_empty());
    assert!(updated.sku.is_none());
    assert!(!updated.is_featured);
    assert_eq!(updated.price, Decimal::ZERO);
}

#[tokio::test]
async fn test_delete_removes_record() {
    let ctx = TestContext::new();
    ctx.post_webhook("products/create", MOP).await;
    ctx.wait_for_record(EntityKind::Product, "123").await;

    let (status, _) = ctx
        .post_webhook("products/delete", r#"{"id":123}"#)
        .await;
    assert_eq!(status, StatusCode::OK);

    ctx.wait_for(EntityKind::Product, "123", |r| r.is_none())
        .await;
}

#[tokio::test]
async fn test_delete_of_unknown_record_is_acknowledged() {
    let ctx = TestContext::new();

    let (status, body) = ctx
        .post_webhook("customers/delete", r#"{"id":404}"#)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_order_cancellation_keeps_line_items() {
    let ctx = TestContext::new();
    let placed = json!({
        "id": 450_789_469,
        "name": "#1001",
        "financial_status": "paid",
        "total_price": "40.00",
        "line_items": [{ "title": "Mop", "quantity": 2, "price": "20.00" }]
    })
    .to_string();
    ctx.post_webhook("orders/create", &placed).await;
    ctx.wait_for_record(EntityKind::Order, "450789469").await;

    let cancelled = json!({
        "id": 450_789_469,
        "cancelled_at": "2026-05-02T09:00:00Z",
        "cancel_reason": "customer"
    })
    .to_string();
    ctx.post_webhook("orders/cancelled", &cancelled).await;

    let order = order(
        ctx.wait_for(EntityKind::Order, "450789469", |r| {
            matches!(r, Some(Record::Order(o)) if o.status == OrderStatus::Cancelled)
        })
        .await
        .unwrap(),
    );
    assert_eq!(order.order_number, "#1001");
    assert_eq!(order.line_items.len(), 1);
    assert_eq!(order.total, Decimal::new(4000, 2));
    assert_eq!(
        order.cancellation.unwrap().reason.as_deref(),
        Some("customer")
    );
}

#[tokio::test]
async fn test_cancellation_of_unmirrored_order_stores_it() {
    let ctx = TestContext::new();
    let cancelled = json!({
        "id": 77,
        "name": "#1077",
        "cancelled_at": "2026-05-02T09:00:00Z"
    })
    .to_string();

    ctx.post_webhook("orders/cancelled", &cancelled).await;

    let order = order(ctx.wait_for_record(EntityKind::Order, "77").await);
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert!(order.cancellation.is_some());
}

// ============================================================================
// Ignored Deliveries
// ============================================================================

#[tokio::test]
async fn test_missing_topic_is_acknowledged_and_ignored() {
    let ctx = TestContext::new();
    let signature = sign(TEST_SECRET, MOP.as_bytes());

    let (status, _) = ctx
        .post_webhook_with(&[("x-shopify-hmac-sha256", &signature)], MOP)
        .await;
    assert_eq!(status, StatusCode::OK);

    settle().await;
    assert_eq!(ctx.count(EntityKind::Product).await, 0);
}

#[tokio::test]
async fn test_unrecognized_topic_is_ignored() {
    let ctx = TestContext::new();

    let (status, _) = ctx.post_webhook("app/uninstalled", MOP).await;
    assert_eq!(status, StatusCode::OK);

    settle().await;
    assert_eq!(ctx.count(EntityKind::Product).await, 0);
}

#[tokio::test]
async fn test_malformed_body_is_acknowledged_but_not_applied() {
    let ctx = TestContext::new();

    let (status, _) = ctx.post_webhook("products/update", "{not json").await;
    assert_eq!(status, StatusCode::OK);

    settle().await;
    assert_eq!(ctx.count(EntityKind::Product).await, 0);
}

#[tokio::test]
async fn test_untranslatable_payload_is_not_applied() {
    let ctx = TestContext::new();
    let bad_price = r#"{"id":9,"title":"Mop","variants":[{"price":"free"}]}"#;

    let (status, _) = ctx.post_webhook("products/update", bad_price).await;
    assert_eq!(status, StatusCode::OK);

    settle().await;
    assert_eq!(ctx.count(EntityKind::Product).await, 0);
}

#[tokio::test]
async fn test_webhook_from_another_shop_is_ignored() {
    let mut config = test_config();
    config.webhook.verify_shop = true;
    let ctx = TestContext::build(FakePlatform::shopify(), config);
    let signature = sign(TEST_SECRET, MOP.as_bytes());

    let (status, _) = ctx
        .post_webhook_with(
            &[
                ("x-shopify-topic", "products/update"),
                ("x-shopify-hmac-sha256", &signature),
                ("x-shopify-shop-domain", "someone-else.myshopify.com"),
            ],
            MOP,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    settle().await;
    assert_eq!(ctx.count(EntityKind::Product).await, 0);

    ctx.post_webhook_with(
        &[
            ("x-shopify-topic", "products/update"),
            ("x-shopify-hmac-sha256", &signature),
            ("x-shopify-shop-domain", SHOP_DOMAIN),
        ],
        MOP,
    )
    .await;
    ctx.wait_for_record(EntityKind::Product, "123").await;
}

// ============================================================================
// Identifier-only Webhooks
// ============================================================================

#[tokio::test]
async fn test_lightspeed_webhook_refetches_entity() {
    let platform = FakePlatform::lightspeed();
    platform.set_items(
        EntityKind::Product,
        vec![json!({
            "itemID": "42",
            "description": "Bamboo Mop",
            "Prices": { "ItemPrice": { "amount": "19.99", "useType": "Default" } }
        })],
    );
    let ctx = TestContext::build(platform, test_config());
    let body = r#"{"itemID":"42"}"#;
    let signature = sign(TEST_SECRET, body.as_bytes());

    let (status, _) = ctx
        .post_webhook_with(
            &[("x-webhook-topic", "item.update"), ("x-webhook-signature", &signature)],
            body,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let product = product(ctx.wait_for_record(EntityKind::Product, "42").await);
    assert_eq!(product.name, "Bamboo Mop");
    assert_eq!(product.price, Decimal::new(1999, 2));
}

#[tokio::test]
async fn test_lightspeed_webhook_for_vanished_entity_is_ignored() {
    let ctx = TestContext::build(FakePlatform::lightspeed(), test_config());
    let body = r#"{"itemID":"404"}"#;
    let signature = sign(TEST_SECRET, body.as_bytes());

    ctx.post_webhook_with(
        &[("x-webhook-topic", "item.update"), ("x-webhook-signature", &signature)],
        body,
    )
    .await;

    settle().await;
    assert_eq!(ctx.count(EntityKind::Product).await, 0);
}
