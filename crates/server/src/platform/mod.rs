//! Outbound clients for the external commerce platform.
//!
//! # Architecture
//!
//! - One [`PlatformClient`] implementation per platform, chosen at start-up
//! - Payloads stay as `serde_json::Value`; the translators own field mapping
//! - Pagination is hidden behind [`PlatformClient::list_all`]
//! - Rate limits are handled per request (see [`rate_limit`])
//! - OAuth platforms keep tokens in a [`auth::TokenStore`] and refresh through
//!   [`auth::with_token_refresh`]

pub mod auth;
pub mod lightspeed;
pub mod rate_limit;
pub mod shopify;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use storesync_core::{EntityKind, ExternalId};

pub use lightspeed::LightspeedClient;
pub use shopify::ShopifyClient;

/// Errors that can occur when talking to the platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited and out of retries.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Credentials were rejected even after a token refresh.
    #[error("Unauthorized")]
    Unauthorized,

    /// Access token expired.
    #[error("Access token expired")]
    TokenExpired,

    /// No valid access token available (OAuth connection required).
    #[error("No access token - connect the platform first")]
    NoAccessToken,

    /// Token persistence failed.
    #[error("Token store error: {0}")]
    TokenStore(String),

    /// The platform does not offer this operation.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The platform returned an unexpected status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Which external platform is being mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Shopify,
    Lightspeed,
}

impl Platform {
    /// Whether webhooks carry the full entity.
    ///
    /// Lightspeed webhooks carry only an identifier; the entity has to be
    /// fetched before it can be mirrored.
    #[must_use]
    pub const fn webhooks_carry_full_payload(self) -> bool {
        matches!(self, Self::Shopify)
    }

    /// Read the entity identifier out of a payload of the given kind.
    #[must_use]
    pub fn payload_id(self, kind: EntityKind, payload: &Value) -> Option<ExternalId> {
        let key = match (self, kind) {
            (Self::Shopify, _) => "id",
            (Self::Lightspeed, EntityKind::Product) => "itemID",
            (Self::Lightspeed, EntityKind::Customer) => "customerID",
            (Self::Lightspeed, EntityKind::Order) => "saleID",
        };
        payload
            .get(key)
            .or_else(|| payload.get("id"))
            .and_then(ExternalId::from_json)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shopify => "shopify",
            Self::Lightspeed => "lightspeed",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request for one page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Opaque cursor from the previous page; `None` for the first page.
    pub cursor: Option<String>,
    pub limit: u32,
}

impl PageRequest {
    #[must_use]
    pub const fn first(limit: u32) -> Self {
        Self {
            cursor: None,
            limit,
        }
    }
}

/// One page of raw platform entities.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Value>,
    /// Cursor for the next page; `None` on the last page.
    pub next: Option<String>,
}

/// A webhook subscription registered with the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookSubscription {
    pub id: String,
    pub topic: String,
    pub address: String,
}

/// Outbound access to the external platform.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    fn platform(&self) -> Platform;

    /// Fetch one page of entities.
    async fn list_page(&self, kind: EntityKind, page: PageRequest) -> Result<Page, PlatformError>;

    /// Fetch every entity of a kind, following pagination to the end.
    ///
    /// Stops if the platform hands back a cursor it already returned.
    async fn list_all(&self, kind: EntityKind, page_size: u32) -> Result<Vec<Value>, PlatformError> {
        let mut items = Vec::new();
        let mut seen = HashSet::new();
        let mut request = PageRequest::first(page_size);

        loop {
            let page = self.list_page(kind, request.clone()).await?;
            items.extend(page.items);

            match page.next {
                Some(cursor) if seen.insert(cursor.clone()) => {
                    request = PageRequest {
                        cursor: Some(cursor),
                        limit: page_size,
                    };
                }
                Some(cursor) => {
                    tracing::warn!(%kind, %cursor, "Platform repeated a page cursor, stopping");
                    break;
                }
                None => break,
            }
        }

        Ok(items)
    }

    /// Fetch one entity; `None` when the platform does not know the ID.
    async fn get_by_id(
        &self,
        kind: EntityKind,
        id: &ExternalId,
    ) -> Result<Option<Value>, PlatformError>;

    async fn create(&self, kind: EntityKind, fields: &Value) -> Result<Value, PlatformError>;

    async fn update(
        &self,
        kind: EntityKind,
        id: &ExternalId,
        fields: &Value,
    ) -> Result<Value, PlatformError>;

    async fn list_webhooks(&self) -> Result<Vec<WebhookSubscription>, PlatformError>;

    async fn create_webhook(
        &self,
        topic: &str,
        address: &str,
    ) -> Result<WebhookSubscription, PlatformError>;

    async fn delete_webhook(&self, id: &str) -> Result<(), PlatformError>;

    /// The topics registered by `POST /webhooks/register`.
    fn webhook_topics(&self) -> &'static [&'static str];
}

/// Read an error body for an unexpected status.
pub(crate) async fn api_error(response: reqwest::Response) -> PlatformError {
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    PlatformError::Api { status, message }
}
