//! Shopify Admin REST API client.
//!
//! Lists follow the `Link: <...>; rel="next"` header (cursor pagination with
//! `page_info`). The next-page URL itself is used as the page cursor.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::instrument;
use url::Url;

use storesync_core::{EntityKind, ExternalId};

use super::rate_limit::send_throttled;
use super::{
    Page, PageRequest, Platform, PlatformClient, PlatformError, WebhookSubscription, api_error,
};
use crate::config::ShopifyConfig;

/// Call-limit header reported on every Admin API response.
const CALL_LIMIT_HEADER: &str = "X-Shopify-Shop-Api-Call-Limit";

/// Topics subscribed by webhook registration.
pub const WEBHOOK_TOPICS: &[&str] = &[
    "products/create",
    "products/update",
    "products/delete",
    "customers/create",
    "customers/update",
    "customers/delete",
    "orders/create",
    "orders/updated",
    "orders/cancelled",
    "orders/delete",
];

/// Shopify Admin REST API client.
#[derive(Clone)]
pub struct ShopifyClient {
    inner: Arc<ShopifyClientInner>,
}

struct ShopifyClientInner {
    http: reqwest::Client,
    /// `https://{store}/admin/api/{version}/`
    base_url: Url,
    access_token: SecretString,
}

impl std::fmt::Debug for ShopifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl ShopifyClient {
    /// Create a client for the configured store.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Api` if the store domain does not form a valid
    /// URL, or `PlatformError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ShopifyConfig, timeout: Duration) -> Result<Self, PlatformError> {
        let base_url = Url::parse(&format!(
            "https://{}/admin/api/{}/",
            config.store.trim_end_matches('/'),
            config.api_version
        ))
        .map_err(|e| invalid_url(&e))?;
        Self::with_base_url(base_url, config.access_token.clone(), timeout)
    }

    /// Create a client against an arbitrary API root (used for local fakes).
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Http` if the HTTP client cannot be built.
    pub fn with_base_url(
        base_url: Url,
        access_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            inner: Arc::new(ShopifyClientInner {
                http,
                base_url,
                access_token,
            }),
        })
    }

    /// Build `{base}/{segments...}`, percent-encoding each segment.
    fn resource_url(&self, segments: &[&str]) -> Result<Url, PlatformError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| PlatformError::Api {
                status: 0,
                message: "base URL cannot have path segments".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
    ) -> Result<Response, PlatformError> {
        let build = || {
            let request = self
                .inner
                .http
                .request(method.clone(), url.clone())
                .header("X-Shopify-Access-Token", self.inner.access_token.expose_secret());
            match body {
                Some(body) => request.json(body),
                None => request,
            }
        };
        let response = send_throttled(build, CALL_LIMIT_HEADER).await?;
        check_status(response, url).await
    }

    async fn send_json(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
    ) -> Result<Value, PlatformError> {
        let response = self.send(method, url, body).await?;
        Ok(response.json().await?)
    }
}

fn invalid_url(err: &url::ParseError) -> PlatformError {
    PlatformError::Api {
        status: 0,
        message: format!("invalid URL: {err}"),
    }
}

async fn check_status(response: Response, url: &Url) -> Result<Response, PlatformError> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PlatformError::Unauthorized),
        StatusCode::NOT_FOUND => Err(PlatformError::NotFound(url.path().to_string())),
        _ => Err(api_error(response).await),
    }
}

/// Extract the `rel="next"` URL from a `Link` header.
#[must_use]
pub fn next_page_link(link_header: &str) -> Option<String> {
    link_header.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| p.trim().eq_ignore_ascii_case(r#"rel="next""#));
        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        (is_next && !target.is_empty()).then(|| target.to_string())
    })
}

fn list_url(base: Url, kind: EntityKind, limit: u32) -> Url {
    let mut url = base;
    url.query_pairs_mut()
        .append_pair("limit", &limit.to_string());
    if kind == EntityKind::Order {
        // Closed and cancelled orders are hidden from the default listing.
        url.query_pairs_mut().append_pair("status", "any");
    }
    url
}

fn take_field(mut body: Value, key: &str) -> Result<Value, PlatformError> {
    body.get_mut(key)
        .map(Value::take)
        .ok_or_else(|| PlatformError::Api {
            status: 200,
            message: format!("response is missing '{key}'"),
        })
}

fn parse_subscription(value: &Value) -> Option<WebhookSubscription> {
    Some(WebhookSubscription {
        id: ExternalId::from_json(value.get("id")?)?.into_inner(),
        topic: value.get("topic")?.as_str()?.to_string(),
        address: value.get("address")?.as_str()?.to_string(),
    })
}

#[async_trait]
impl PlatformClient for ShopifyClient {
    fn platform(&self) -> Platform {
        Platform::Shopify
    }

    #[instrument(skip(self), fields(kind = %kind))]
    async fn list_page(&self, kind: EntityKind, page: PageRequest) -> Result<Page, PlatformError> {
        let url = match page.cursor {
            Some(cursor) => Url::parse(&cursor).map_err(|e| invalid_url(&e))?,
            None => list_url(
                self.resource_url(&[&format!("{}.json", kind.plural())])?,
                kind,
                page.limit,
            ),
        };

        let response = self.send(Method::GET, &url, None).await?;
        let next = response
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_page_link);
        let body: Value = response.json().await?;
        let items = match take_field(body, kind.plural())? {
            Value::Array(items) => items,
            other => vec![other],
        };

        tracing::debug!(count = items.len(), has_next = next.is_some(), "Fetched page");
        Ok(Page { items, next })
    }

    #[instrument(skip(self), fields(kind = %kind, id = %id))]
    async fn get_by_id(
        &self,
        kind: EntityKind,
        id: &ExternalId,
    ) -> Result<Option<Value>, PlatformError> {
        let url = self.resource_url(&[kind.plural(), &format!("{id}.json")])?;
        match self.send_json(Method::GET, &url, None).await {
            Ok(body) => take_field(body, kind.singular()).map(Some),
            Err(PlatformError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, fields), fields(kind = %kind))]
    async fn create(&self, kind: EntityKind, fields: &Value) -> Result<Value, PlatformError> {
        let url = self.resource_url(&[&format!("{}.json", kind.plural())])?;
        let body = json!({ kind.singular(): fields });
        let response = self.send_json(Method::POST, &url, Some(&body)).await?;
        take_field(response, kind.singular())
    }

    #[instrument(skip(self, fields), fields(kind = %kind, id = %id))]
    async fn update(
        &self,
        kind: EntityKind,
        id: &ExternalId,
        fields: &Value,
    ) -> Result<Value, PlatformError> {
        let url = self.resource_url(&[kind.plural(), &format!("{id}.json")])?;
        let mut fields = fields.clone();
        if let Some(object) = fields.as_object_mut() {
            object.insert("id".to_string(), Value::String(id.to_string()));
        }
        let body = json!({ kind.singular(): fields });
        let response = self.send_json(Method::PUT, &url, Some(&body)).await?;
        take_field(response, kind.singular())
    }

    #[instrument(skip(self))]
    async fn list_webhooks(&self) -> Result<Vec<WebhookSubscription>, PlatformError> {
        let url = self.resource_url(&["webhooks.json"])?;
        let body = self.send_json(Method::GET, &url, None).await?;
        let webhooks = take_field(body, "webhooks")?;
        Ok(webhooks
            .as_array()
            .map(|items| items.iter().filter_map(parse_subscription).collect())
            .unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn create_webhook(
        &self,
        topic: &str,
        address: &str,
    ) -> Result<WebhookSubscription, PlatformError> {
        let url = self.resource_url(&["webhooks.json"])?;
        let body = json!({
            "webhook": { "topic": topic, "address": address, "format": "json" }
        });
        let response = self.send_json(Method::POST, &url, Some(&body)).await?;
        let webhook = take_field(response, "webhook")?;
        parse_subscription(&webhook).ok_or_else(|| PlatformError::Api {
            status: 200,
            message: "webhook response is missing id, topic, or address".to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn delete_webhook(&self, id: &str) -> Result<(), PlatformError> {
        let url = self.resource_url(&["webhooks", &format!("{id}.json")])?;
        self.send(Method::DELETE, &url, None).await?;
        Ok(())
    }

    fn webhook_topics(&self) -> &'static [&'static str] {
        WEBHOOK_TOPICS
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client() -> ShopifyClient {
        ShopifyClient::new(
            &ShopifyConfig {
                store: "mops.myshopify.com".to_string(),
                api_version: "2026-01".to_string(),
                access_token: SecretString::from("shpat_test"),
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_next_page_link() {
        let header = r#"<https://mops.myshopify.com/admin/api/2026-01/products.json?limit=50&page_info=abc>; rel="next""#;
        assert_eq!(
            next_page_link(header).as_deref(),
            Some("https://mops.myshopify.com/admin/api/2026-01/products.json?limit=50&page_info=abc")
        );

        let both = r#"<https://x/p.json?page_info=prev>; rel="previous", <https://x/p.json?page_info=next>; rel="next""#;
        assert_eq!(
            next_page_link(both).as_deref(),
            Some("https://x/p.json?page_info=next")
        );

        let last = r#"<https://x/p.json?page_info=prev>; rel="previous""#;
        assert_eq!(next_page_link(last), None);
        assert_eq!(next_page_link(""), None);
    }

    #[test]
    fn test_resource_urls() {
        let client = client();
        assert_eq!(
            client.resource_url(&["products", "123.json"]).unwrap().as_str(),
            "https://mops.myshopify.com/admin/api/2026-01/products/123.json"
        );
        // IDs cannot escape the resource path.
        assert_eq!(
            client.resource_url(&["products", "../shop.json"]).unwrap().as_str(),
            "https://mops.myshopify.com/admin/api/2026-01/products/..%2Fshop.json"
        );
    }

    #[test]
    fn test_order_listing_includes_closed_orders() {
        let client = client();
        let base = client.resource_url(&["orders.json"]).unwrap();
        assert_eq!(
            list_url(base, EntityKind::Order, 250).as_str(),
            "https://mops.myshopify.com/admin/api/2026-01/orders.json?limit=250&status=any"
        );

        let base = client.resource_url(&["products.json"]).unwrap();
        assert_eq!(
            list_url(base, EntityKind::Product, 50).query(),
            Some("limit=50")
        );
    }

    #[test]
    fn test_parse_subscription() {
        let value = json!({
            "id": 901,
            "topic": "orders/updated",
            "address": "https://sync.example.com/webhook",
            "format": "json"
        });
        assert_eq!(
            parse_subscription(&value),
            Some(WebhookSubscription {
                id: "901".to_string(),
                topic: "orders/updated".to_string(),
                address: "https://sync.example.com/webhook".to_string(),
            })
        );
        assert_eq!(parse_subscription(&json!({ "id": 1 })), None);
    }

    #[test]
    fn test_debug_redacts_token() {
        let debug = format!("{:?}", client());
        assert!(debug.contains("mops.myshopify.com"));
        assert!(!debug.contains("shpat_test"));
    }
}
