//! Lightspeed Retail (R-Series) POS client.
//!
//! # Resources
//!
//! | Kind     | Resource   | Relations loaded                              |
//! |----------|------------|-----------------------------------------------|
//! | product  | `Item`     | `ItemShops`, `Images`, `Manufacturer`, `Category` |
//! | customer | `Customer` | `Contact`                                     |
//! | order    | `Sale`     | `SaleLines`, `SaleLines.Item`                 |
//!
//! Listings page with the `@attributes.next` URL. Access tokens expire after
//! about 30 minutes and are refreshed through [`with_token_refresh`].
//! Lightspeed offers no webhook subscription API, so webhook management
//! reports [`PlatformError::Unsupported`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;
use url::Url;

use storesync_core::{EntityKind, ExternalId};

use super::auth::{OAuthToken, TokenRefresher, TokenStore, with_token_refresh};
use super::rate_limit::send_throttled;
use super::{
    Page, PageRequest, Platform, PlatformClient, PlatformError, WebhookSubscription, api_error,
};
use crate::clock::Clock;
use crate::config::LightspeedConfig;

const API_ROOT: &str = "https://api.lightspeedapp.com/API/V3/Account";
const AUTHORIZE_ENDPOINT: &str = "https://cloud.lightspeedapp.com/auth/oauth/authorize";
const TOKEN_ENDPOINT: &str = "https://cloud.lightspeedapp.com/auth/oauth/token";
const OAUTH_SCOPE: &str = "employee:all";

/// Bucket-level header reported on every API response.
const BUCKET_HEADER: &str = "X-LS-API-Bucket-Level";

/// Lightspeed caps page size at 100.
const MAX_PAGE_SIZE: u32 = 100;

/// Lightspeed resource name for a kind.
#[must_use]
pub const fn resource(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Product => "Item",
        EntityKind::Customer => "Customer",
        EntityKind::Order => "Sale",
    }
}

const fn relations(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Product => r#"["ItemShops","Images","Manufacturer","Category"]"#,
        EntityKind::Customer => r#"["Contact"]"#,
        EntityKind::Order => r#"["SaleLines","SaleLines.Item"]"#,
    }
}

// =============================================================================
// OAuth
// =============================================================================

/// Token endpoint response.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Token lifetime in seconds.
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_token(self, now: DateTime<Utc>) -> OAuthToken {
        OAuthToken {
            access_token: SecretString::from(self.access_token),
            refresh_token: self.refresh_token.map(SecretString::from),
            expires_at: self
                .expires_in
                .map(|secs| now + chrono::Duration::seconds(secs)),
        }
    }
}

/// Lightspeed OAuth application: authorization URL, code exchange, refresh.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct LightspeedOAuth {
    http: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    redirect_url: String,
    token_endpoint: String,
}

impl std::fmt::Debug for LightspeedOAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightspeedOAuth")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_url", &self.redirect_url)
            .finish_non_exhaustive()
    }
}

impl LightspeedOAuth {
    /// # Errors
    ///
    /// Returns `PlatformError::Http` if the HTTP client cannot be built.
    pub fn new(config: &LightspeedConfig, timeout: Duration) -> Result<Self, PlatformError> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_url: config.redirect_url.clone(),
            token_endpoint: TOKEN_ENDPOINT.to_string(),
        })
    }

    /// URL the operator is sent to in order to grant access.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Api` if the URL cannot be built.
    pub fn authorization_url(&self, state: &str) -> Result<String, PlatformError> {
        let url = Url::parse_with_params(
            AUTHORIZE_ENDPOINT,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("scope", OAUTH_SCOPE),
                ("redirect_uri", self.redirect_url.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| PlatformError::Api {
            status: 0,
            message: format!("invalid authorization URL: {e}"),
        })?;
        Ok(url.into())
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Unauthorized` if the code is rejected.
    #[instrument(skip(self, code))]
    pub async fn exchange_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<OAuthToken, PlatformError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_url.as_str()),
        ], now)
        .await
    }

    async fn token_request(
        &self,
        grant: &[(&str, &str)],
        now: DateTime<Utc>,
    ) -> Result<OAuthToken, PlatformError> {
        let mut form: Vec<(&str, &str)> = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
        ];
        form.extend_from_slice(grant);

        let response = self.http.post(&self.token_endpoint).form(&form).send().await?;
        let status = response.status();

        if status.is_success() {
            let body: TokenResponse = response.json().await?;
            Ok(body.into_token(now))
        } else if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!(%status, error = %error_text, "Lightspeed token request rejected");
            Err(PlatformError::Unauthorized)
        } else {
            Err(api_error(response).await)
        }
    }
}

#[async_trait]
impl TokenRefresher for LightspeedOAuth {
    #[instrument(skip(self, refresh_token))]
    async fn refresh(
        &self,
        refresh_token: &SecretString,
        now: DateTime<Utc>,
    ) -> Result<OAuthToken, PlatformError> {
        self.token_request(
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.expose_secret()),
            ],
            now,
        )
        .await
    }
}

// =============================================================================
// Client
// =============================================================================

/// Lightspeed Retail API client.
#[derive(Clone)]
pub struct LightspeedClient {
    inner: Arc<LightspeedClientInner>,
}

struct LightspeedClientInner {
    http: reqwest::Client,
    /// `https://api.lightspeedapp.com/API/V3/Account/{account_id}/`
    base_url: Url,
    tokens: Arc<dyn TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for LightspeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightspeedClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl LightspeedClient {
    /// Create a client for the configured account.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Api` if the account ID does not form a valid
    /// URL, or `PlatformError::Http` if the HTTP client cannot be built.
    pub fn new(
        config: &LightspeedConfig,
        timeout: Duration,
        tokens: Arc<dyn TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PlatformError> {
        let mut base_url = Url::parse(API_ROOT).map_err(|e| invalid_url(&e))?;
        base_url
            .path_segments_mut()
            .map_err(|()| invalid_base())?
            .push(&config.account_id)
            .push("");
        Self::with_base_url(base_url, timeout, tokens, refresher, clock)
    }

    /// Create a client against an arbitrary account root (used for local fakes).
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Http` if the HTTP client cannot be built.
    pub fn with_base_url(
        base_url: Url,
        timeout: Duration,
        tokens: Arc<dyn TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            inner: Arc::new(LightspeedClientInner {
                http,
                base_url,
                tokens,
                refresher,
                clock,
            }),
        })
    }

    fn resource_url(&self, segments: &[&str]) -> Result<Url, PlatformError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| invalid_base())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send an authenticated request; `Ok(None)` on 404.
    async fn send(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
    ) -> Result<Option<Value>, PlatformError> {
        let inner = &self.inner;
        let method = &method;
        with_token_refresh(
            inner.tokens.as_ref(),
            inner.refresher.as_ref(),
            inner.clock.as_ref(),
            |token| async move {
                let build = || {
                    let request = inner
                        .http
                        .request(method.clone(), url.clone())
                        .bearer_auth(token.expose_secret());
                    match body {
                        Some(body) => request.json(body),
                        None => request,
                    }
                };
                let response = send_throttled(build, BUCKET_HEADER).await?;

                match response.status() {
                    status if status.is_success() => Ok(Some(response.json().await?)),
                    StatusCode::UNAUTHORIZED => Err(PlatformError::TokenExpired),
                    StatusCode::NOT_FOUND => Ok(None),
                    _ => Err(api_error(response).await),
                }
            },
        )
        .await
    }

    async fn send_expecting(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
    ) -> Result<Value, PlatformError> {
        self.send(method, url, body)
            .await?
            .ok_or_else(|| PlatformError::NotFound(url.path().to_string()))
    }
}

fn invalid_url(err: &url::ParseError) -> PlatformError {
    PlatformError::Api {
        status: 0,
        message: format!("invalid URL: {err}"),
    }
}

fn invalid_base() -> PlatformError {
    PlatformError::Api {
        status: 0,
        message: "base URL cannot have path segments".to_string(),
    }
}

/// Lightspeed serializes one-element lists as a bare object.
fn into_items(value: Option<Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => vec![],
        Some(item) => vec![item],
    }
}

/// The `@attributes.next` URL; empty means last page.
fn next_cursor(body: &Value) -> Option<String> {
    body.pointer("/@attributes/next")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|next| !next.is_empty())
        .map(str::to_string)
}

fn take_resource(mut body: Value, kind: EntityKind) -> Option<Value> {
    body.get_mut(resource(kind)).map(Value::take)
}

#[async_trait]
impl PlatformClient for LightspeedClient {
    fn platform(&self) -> Platform {
        Platform::Lightspeed
    }

    #[instrument(skip(self), fields(kind = %kind))]
    async fn list_page(&self, kind: EntityKind, page: PageRequest) -> Result<Page, PlatformError> {
        let url = match page.cursor {
            Some(cursor) => Url::parse(&cursor).map_err(|e| invalid_url(&e))?,
            None => {
                let mut url = self.resource_url(&[&format!("{}.json", resource(kind))])?;
                url.query_pairs_mut()
                    .append_pair("limit", &page.limit.min(MAX_PAGE_SIZE).to_string())
                    .append_pair("load_relations", relations(kind));
                url
            }
        };

        let mut body = self.send_expecting(Method::GET, &url, None).await?;
        let next = next_cursor(&body);
        let items = into_items(body.get_mut(resource(kind)).map(Value::take));

        tracing::debug!(count = items.len(), has_next = next.is_some(), "Fetched page");
        Ok(Page { items, next })
    }

    #[instrument(skip(self), fields(kind = %kind, id = %id))]
    async fn get_by_id(
        &self,
        kind: EntityKind,
        id: &ExternalId,
    ) -> Result<Option<Value>, PlatformError> {
        let mut url = self.resource_url(&[resource(kind), &format!("{id}.json")])?;
        url.query_pairs_mut()
            .append_pair("load_relations", relations(kind));

        Ok(self
            .send(Method::GET, &url, None)
            .await?
            .and_then(|body| take_resource(body, kind)))
    }

    #[instrument(skip(self, fields), fields(kind = %kind))]
    async fn create(&self, kind: EntityKind, fields: &Value) -> Result<Value, PlatformError> {
        let url = self.resource_url(&[&format!("{}.json", resource(kind))])?;
        let body = self.send_expecting(Method::POST, &url, Some(fields)).await?;
        take_resource(body, kind).ok_or_else(|| missing_resource(kind))
    }

    #[instrument(skip(self, fields), fields(kind = %kind, id = %id))]
    async fn update(
        &self,
        kind: EntityKind,
        id: &ExternalId,
        fields: &Value,
    ) -> Result<Value, PlatformError> {
        let url = self.resource_url(&[resource(kind), &format!("{id}.json")])?;
        let body = self.send_expecting(Method::PUT, &url, Some(fields)).await?;
        take_resource(body, kind).ok_or_else(|| missing_resource(kind))
    }

    async fn list_webhooks(&self) -> Result<Vec<WebhookSubscription>, PlatformError> {
        Err(webhooks_unsupported())
    }

    async fn create_webhook(
        &self,
        _topic: &str,
        _address: &str,
    ) -> Result<WebhookSubscription, PlatformError> {
        Err(webhooks_unsupported())
    }

    async fn delete_webhook(&self, _id: &str) -> Result<(), PlatformError> {
        Err(webhooks_unsupported())
    }

    fn webhook_topics(&self) -> &'static [&'static str] {
        &[]
    }
}

fn missing_resource(kind: EntityKind) -> PlatformError {
    PlatformError::Api {
        status: 200,
        message: format!("response is missing '{}'", resource(kind)),
    }
}

fn webhooks_unsupported() -> PlatformError {
    PlatformError::Unsupported(
        "Lightspeed webhooks are configured in the Lightspeed back office".to_string(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::clock::SystemClock;
    use crate::platform::auth::MemoryTokenStore;

    fn config() -> LightspeedConfig {
        LightspeedConfig {
            account_id: "98765".to_string(),
            client_id: "ls-client".to_string(),
            client_secret: SecretString::from("ls-private-client"),
            redirect_url: "https://sync.example.com/oauth/callback".to_string(),
            refresh_token: None,
        }
    }

    fn client() -> LightspeedClient {
        let oauth = Arc::new(LightspeedOAuth::new(&config(), Duration::from_secs(5)).unwrap());
        LightspeedClient::new(
            &config(),
            Duration::from_secs(5),
            Arc::new(MemoryTokenStore::default()),
            oauth,
            Arc::new(SystemClock),
        )
        .unwrap()
    }

    #[test]
    fn test_resource_urls() {
        let client = client();
        assert_eq!(
            client.resource_url(&["Item.json"]).unwrap().as_str(),
            "https://api.lightspeedapp.com/API/V3/Account/98765/Item.json"
        );
        assert_eq!(
            client.resource_url(&["Sale", "12.json"]).unwrap().as_str(),
            "https://api.lightspeedapp.com/API/V3/Account/98765/Sale/12.json"
        );
    }

    #[test]
    fn test_single_item_lists_are_normalized() {
        assert_eq!(into_items(Some(json!([{ "itemID": "1" }]))).len(), 1);
        assert_eq!(into_items(Some(json!({ "itemID": "1" }))).len(), 1);
        assert!(into_items(None).is_empty());
    }

    #[test]
    fn test_next_cursor() {
        let body = json!({ "@attributes": { "next": "https://api/next", "previous": "" } });
        assert_eq!(next_cursor(&body).as_deref(), Some("https://api/next"));

        let last = json!({ "@attributes": { "next": "", "previous": "https://api/prev" } });
        assert_eq!(next_cursor(&last), None);
        assert_eq!(next_cursor(&json!({})), None);
    }

    #[test]
    fn test_authorization_url() {
        let oauth = LightspeedOAuth::new(&config(), Duration::from_secs(5)).unwrap();
        let url = Url::parse(&oauth.authorization_url("csrf-123").unwrap()).unwrap();

        assert_eq!(url.host_str(), Some("cloud.lightspeedapp.com"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("state".to_string(), "csrf-123".to_string())));
        assert!(pairs.contains(&("client_id".to_string(), "ls-client".to_string())));
        assert!(pairs.contains(&("response_type".to_string(), "code".to_string())));
    }

    #[test]
    fn test_token_response_expiry() {
        let now = Utc::now();
        let token = TokenResponse {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_in: Some(1800),
        }
        .into_token(now);
        assert_eq!(token.expires_at, Some(now + chrono::Duration::seconds(1800)));
        assert!(!token.is_expired_at(now));
    }

    #[test]
    fn test_oauth_debug_redacts_secret() {
        let oauth = LightspeedOAuth::new(&config(), Duration::from_secs(5)).unwrap();
        let debug = format!("{oauth:?}");
        assert!(debug.contains("ls-client"));
        assert!(!debug.contains("ls-private-client"));
    }

    #[tokio::test]
    async fn test_webhook_management_unsupported() {
        let client = client();
        assert!(matches!(
            client.list_webhooks().await,
            Err(PlatformError::Unsupported(_))
        ));
    }
}
