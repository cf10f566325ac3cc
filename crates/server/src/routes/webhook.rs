//! Webhook ingestion.
//!
//! The signature is checked against the raw body before anything is parsed.
//! A verified webhook is acknowledged right away and applied on a spawned
//! task.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::HeaderMap,
    routing::post,
};
use serde_json::{Value, json};
use tracing::{Instrument, debug, error, info, instrument, warn};

use crate::config::SyncConfig;
use crate::error::AppError;
use crate::state::AppState;
use crate::sync::Topic;

/// Signature headers, in lookup order.
pub const SIGNATURE_HEADERS: [&str; 2] = ["x-shopify-hmac-sha256", "x-webhook-signature"];

/// Topic headers, in lookup order.
pub const TOPIC_HEADERS: [&str; 2] = ["x-shopify-topic", "x-webhook-topic"];

pub const SHOP_DOMAIN_HEADER: &str = "x-shopify-shop-domain";

/// Largest webhook body accepted (10 MB).
const MAX_WEBHOOK_BODY: usize = 10 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhook", post(receive))
        .layer(DefaultBodyLimit::max(MAX_WEBHOOK_BODY))
}

/// Verify, acknowledge, then process in the background.
#[instrument(skip_all)]
async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = first_header(&headers, &SIGNATURE_HEADERS).unwrap_or_default();
    if !state.verifier().verify(&body, signature) {
        warn!(body_len = body.len(), "Rejected webhook with invalid signature");
        return Err(AppError::InvalidSignature);
    }

    let raw_topic = first_header(&headers, &TOPIC_HEADERS)
        .unwrap_or_default()
        .to_owned();
    let shop = first_header(&headers, &[SHOP_DOMAIN_HEADER]).map(str::to_owned);
    debug!(topic = %raw_topic, "Webhook verified");

    let span = tracing::info_span!("webhook_event", topic = %raw_topic);
    tokio::spawn(process(state, raw_topic, shop, body).instrument(span));

    Ok(Json(json!({ "success": true })))
}

/// Apply a verified webhook. Failures are logged and reported, never
/// returned: the platform has already been acknowledged.
async fn process(state: AppState, raw_topic: String, shop: Option<String>, body: Bytes) {
    if is_foreign_shop(state.config(), shop.as_deref()) {
        warn!(shop = ?shop, "Ignoring webhook from another shop");
        return;
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            let event_id = sentry::capture_error(&e);
            error!(error = %e, sentry_event_id = %event_id, "Webhook body is not JSON");
            return;
        }
    };

    let topic = Topic::parse(&raw_topic);
    match state.sync().handle_event(&topic, &payload).await {
        Ok(outcome) => info!(?outcome, "Webhook processed"),
        Err(e) => {
            let event_id = sentry::capture_error(&e);
            error!(error = %e, sentry_event_id = %event_id, "Webhook processing failed");
        }
    }
}

/// Whether shop checking is on and the header names a different shop.
fn is_foreign_shop(config: &SyncConfig, shop: Option<&str>) -> bool {
    if !config.webhook.verify_shop {
        return false;
    }
    match (config.shop_domain(), shop) {
        (Some(expected), Some(actual)) => !expected.eq_ignore_ascii_case(actual.trim()),
        _ => false,
    }
}

fn first_header<'a>(headers: &'a HeaderMap, names: &[&str]) -> Option<&'a str> {
    names.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    })
}
