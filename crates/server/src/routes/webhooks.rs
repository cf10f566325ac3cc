//! Webhook subscription management.

use std::collections::HashSet;
use std::net::IpAddr;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};
use url::{Host, Url};

use crate::error::AppError;
use crate::platform::{PlatformClient, PlatformError, WebhookSubscription};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhooks", get(list).delete(delete_all))
        .route("/webhooks/register", post(register))
        .route("/webhooks/{id}", delete(delete_one))
}

/// Result of registering the topic set.
#[derive(Debug, Serialize)]
pub struct Registration {
    pub success: bool,
    pub address: String,
    pub registered: Vec<WebhookSubscription>,
    /// Topics already subscribed at this address.
    pub existing: Vec<String>,
    pub failed: Vec<FailedTopic>,
}

#[derive(Debug, Serialize)]
pub struct FailedTopic {
    pub topic: String,
    pub error: String,
}

/// Whether a URL points at this machine and cannot receive platform calls.
#[must_use]
pub fn is_loopback_url(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            domain == "localhost" || domain.ends_with(".localhost")
        }
        Some(Host::Ipv4(ip)) => is_local_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_local_ip(IpAddr::V6(ip)),
        None => true,
    }
}

fn is_local_ip(ip: IpAddr) -> bool {
    ip.is_loopback() || ip.is_unspecified()
}

/// Subscribe every topic the platform offers at `address`.
///
/// Topics already subscribed at the same address are left alone. A failure
/// for one topic does not stop the others.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for a loopback or unparsable address,
/// `AppError::Unsupported` when the platform has no webhook API, and the
/// platform error if listing existing subscriptions fails.
pub async fn register_all(
    platform: &dyn PlatformClient,
    address: &str,
) -> Result<Registration, AppError> {
    let url = Url::parse(address)
        .map_err(|e| AppError::BadRequest(format!("Invalid public URL {address}: {e}")))?;
    if is_loopback_url(&url) {
        return Err(AppError::BadRequest(format!(
            "Webhook callback {address} is not reachable from the platform; set STORESYNC_PUBLIC_URL"
        )));
    }

    let topics = platform.webhook_topics();
    if topics.is_empty() {
        return Err(AppError::Unsupported(format!(
            "{} webhooks are configured in the platform's admin",
            platform.platform()
        )));
    }

    let already: HashSet<String> = platform
        .list_webhooks()
        .await?
        .into_iter()
        .filter(|s| s.address == address)
        .map(|s| s.topic)
        .collect();

    let mut registered = Vec::new();
    let mut existing = Vec::new();
    let mut failed = Vec::new();

    for topic in topics {
        if already.contains(*topic) {
            existing.push((*topic).to_string());
            continue;
        }
        match platform.create_webhook(topic, address).await {
            Ok(subscription) => registered.push(subscription),
            Err(e) => {
                warn!(topic, error = %e, "Webhook registration failed");
                failed.push(FailedTopic {
                    topic: (*topic).to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        registered = registered.len(),
        existing = existing.len(),
        failed = failed.len(),
        "Webhook registration finished"
    );
    Ok(Registration {
        success: failed.is_empty(),
        address: address.to_owned(),
        registered,
        existing,
        failed,
    })
}

/// Delete every subscription, returning how many were removed.
///
/// # Errors
///
/// Returns the first platform error; subscriptions deleted before it stay
/// deleted.
pub async fn delete_all_subscriptions(platform: &dyn PlatformClient) -> Result<usize, PlatformError> {
    let mut deleted = 0_usize;
    for subscription in platform.list_webhooks().await? {
        platform.delete_webhook(&subscription.id).await?;
        deleted += 1;
    }
    info!(deleted, "All webhooks deleted");
    Ok(deleted)
}

/// `POST /webhooks/register`: subscribe every topic at the public callback URL.
#[instrument(skip(state))]
async fn register(State(state): State<AppState>) -> Result<Json<Registration>, AppError> {
    let address = state.config().webhook_callback_url();
    register_all(state.platform(), &address).await.map(Json)
}

/// `GET /webhooks`
#[instrument(skip(state))]
async fn list(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let webhooks = state.platform().list_webhooks().await?;
    Ok(Json(json!({ "success": true, "webhooks": webhooks })))
}

/// `DELETE /webhooks/{id}`
#[instrument(skip(state))]
async fn delete_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.platform().delete_webhook(&id).await?;
    info!(%id, "Webhook deleted");
    Ok(Json(json!({ "success": true })))
}

/// `DELETE /webhooks`: remove every subscription, returning how many went.
#[instrument(skip(state))]
async fn delete_all(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let deleted = delete_all_subscriptions(state.platform()).await?;
    Ok(Json(json!({ "success": true, "deleted": deleted })))
}
