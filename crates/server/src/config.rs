//! Sync service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STORESYNC_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`; not needed when `STORESYNC_STORE=memory`)
//! - `STORESYNC_PUBLIC_URL` - Public base URL the platform calls back to
//! - `WEBHOOK_SECRET` - Shared secret used to sign webhooks (high entropy)
//!
//! ## Platform
//! - `STORESYNC_PLATFORM` - `shopify` (default) or `lightspeed`
//! - `SHOPIFY_STORE` - Shopify store domain (e.g., your-store.myshopify.com)
//! - `SHOPIFY_API_VERSION` - API version (default: 2026-01)
//! - `SHOPIFY_ACCESS_TOKEN` - Admin API access token
//! - `LIGHTSPEED_ACCOUNT_ID` - Lightspeed account ID
//! - `LIGHTSPEED_CLIENT_ID` - OAuth client ID
//! - `LIGHTSPEED_CLIENT_SECRET` - OAuth client secret
//! - `LIGHTSPEED_REDIRECT_URL` - OAuth callback URL registered with Lightspeed
//! - `LIGHTSPEED_REFRESH_TOKEN` - Bootstrap refresh token (optional)
//!
//! ## Optional
//! - `STORESYNC_HOST` - Bind address (default: 127.0.0.1)
//! - `STORESYNC_PORT` - Listen port (default: 3002)
//! - `STORESYNC_STORE` - `postgres` (default) or `memory`
//! - `STORESYNC_HTTP_TIMEOUT_SECS` - Outbound request timeout (default: 30)
//! - `STORESYNC_PAGE_SIZE` - Page size for bulk listing (default: 250)
//! - `WEBHOOK_SECRET_SECONDARY` - Previous secret, accepted during rotation
//! - `WEBHOOK_VERIFY_SHOP` - Ignore webhooks from other shops (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` - (default: 1.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const MIN_SECRET_CHARS: usize = 16;
const DEFAULT_PORT: u16 = 3002;
const DEFAULT_API_VERSION: &str = "2026-01";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PAGE_SIZE: u32 = 250;
/// Shopify rejects page sizes above this.
const MAX_PAGE_SIZE: u32 = 250;

/// Substrings that mark a value as copied from a template.
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Which local store backs the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Process-local store; contents are lost on restart.
    Memory,
}

/// Sync service configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// `PostgreSQL` connection URL; `None` only with the memory backend.
    pub database_url: Option<SecretString>,
    pub host: IpAddr,
    pub port: u16,
    /// Public base URL, used for webhook subscriptions.
    pub public_url: String,
    pub store: StoreBackend,
    pub platform: PlatformConfig,
    pub webhook: WebhookConfig,
    /// Per-request timeout for outbound platform calls.
    pub http_timeout: Duration,
    /// Items requested per page during bulk sync.
    pub page_size: u32,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

/// The external commerce platform being mirrored.
#[derive(Debug, Clone)]
pub enum PlatformConfig {
    Shopify(ShopifyConfig),
    Lightspeed(LightspeedConfig),
}

/// Shopify Admin API configuration.
#[derive(Debug, Clone)]
pub struct ShopifyConfig {
    /// `{shop}.myshopify.com`; also the expected shop header on webhooks.
    pub store: String,
    pub api_version: String,
    pub access_token: SecretString,
}

/// Lightspeed Retail (R-Series) configuration.
#[derive(Debug, Clone)]
pub struct LightspeedConfig {
    pub account_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Callback URL registered with the Lightspeed OAuth app.
    pub redirect_url: String,
    /// Refresh token used until the OAuth flow stores a fresh one.
    pub refresh_token: Option<SecretString>,
}

/// Inbound webhook settings. Secrets print as `[REDACTED]` in `Debug`.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub secret: SecretString,
    /// Previous secret, still accepted while the platform rotates.
    pub secondary_secret: Option<SecretString>,
    /// Drop webhooks whose shop header names a different store.
    pub verify_shop: bool,
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env is normal outside local development
        dotenvy::dotenv().ok();

        let store = match or_default("STORESYNC_STORE", "postgres")
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "STORESYNC_STORE".to_string(),
                    format!("expected 'postgres' or 'memory', got '{other}'"),
                ));
            }
        };
        let database_url = database_url();
        if store == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingEnvVar("STORESYNC_DATABASE_URL".to_string()));
        }

        let host = parsed("STORESYNC_HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port = parsed("STORESYNC_PORT", DEFAULT_PORT)?;
        let public_url = required("STORESYNC_PUBLIC_URL")?
            .trim_end_matches('/')
            .to_string();
        let http_timeout =
            Duration::from_secs(parsed("STORESYNC_HTTP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?);
        let page_size = validate_page_size(parsed("STORESYNC_PAGE_SIZE", DEFAULT_PAGE_SIZE)?)?;

        let platform = PlatformConfig::from_env()?;
        let webhook = WebhookConfig::from_env()?;

        let sentry_dsn = optional("SENTRY_DSN");
        let sentry_environment = optional("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = parsed("SENTRY_SAMPLE_RATE", 1.0)?;
        let sentry_traces_sample_rate = parsed("SENTRY_TRACES_SAMPLE_RATE", 1.0)?;

        Ok(Self {
            database_url,
            host,
            port,
            public_url,
            store,
            platform,
            webhook,
            http_timeout,
            page_size,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// The URL the platform should deliver webhooks to.
    #[must_use]
    pub fn webhook_callback_url(&self) -> String {
        format!("{}/webhook", self.public_url)
    }

    /// The Shopify store domain, when mirroring Shopify.
    #[must_use]
    pub fn shop_domain(&self) -> Option<&str> {
        match &self.platform {
            PlatformConfig::Shopify(shopify) => Some(shopify.store.as_str()),
            PlatformConfig::Lightspeed(_) => None,
        }
    }
}

impl PlatformConfig {
    fn from_env() -> Result<Self, ConfigError> {
        match or_default("STORESYNC_PLATFORM", "shopify")
            .to_ascii_lowercase()
            .as_str()
        {
            "shopify" => Ok(Self::Shopify(ShopifyConfig::from_env()?)),
            "lightspeed" => Ok(Self::Lightspeed(LightspeedConfig::from_env()?)),
            other => Err(ConfigError::InvalidEnvVar(
                "STORESYNC_PLATFORM".to_string(),
                format!("expected 'shopify' or 'lightspeed', got '{other}'"),
            )),
        }
    }
}

impl ShopifyConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            store: required("SHOPIFY_STORE")?.to_ascii_lowercase(),
            api_version: or_default("SHOPIFY_API_VERSION", DEFAULT_API_VERSION),
            access_token: SecretString::from(required("SHOPIFY_ACCESS_TOKEN")?),
        })
    }
}

impl LightspeedConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            account_id: required("LIGHTSPEED_ACCOUNT_ID")?,
            client_id: required("LIGHTSPEED_CLIENT_ID")?,
            client_secret: SecretString::from(required("LIGHTSPEED_CLIENT_SECRET")?),
            redirect_url: required("LIGHTSPEED_REDIRECT_URL")?,
            refresh_token: optional("LIGHTSPEED_REFRESH_TOKEN").map(SecretString::from),
        })
    }
}

impl WebhookConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let secret = secret("WEBHOOK_SECRET")?;
        // The outgoing secret was accepted before; a weak one only warns.
        let secondary_secret = optional("WEBHOOK_SECRET_SECONDARY").map(|value| {
            if let Err(reason) = check_secret(&value) {
                tracing::warn!(%reason, "WEBHOOK_SECRET_SECONDARY is weak");
            }
            SecretString::from(value)
        });
        let verify_shop = parsed("WEBHOOK_VERIFY_SHOP", false)?;

        Ok(Self {
            secret,
            secondary_secret,
            verify_shop,
        })
    }
}

// =============================================================================
// Environment Readers
// =============================================================================

fn required(key: &str) -> Result<String, ConfigError> {
    optional(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Unset and blank are the same thing.
fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn or_default(key: &str, default: &str) -> String {
    optional(key).unwrap_or_else(|| default.to_string())
}

fn parsed<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    optional(key).map_or(Ok(default), |raw| {
        raw.parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// `STORESYNC_DATABASE_URL`, or `DATABASE_URL` as set by `fly postgres attach`.
fn database_url() -> Option<SecretString> {
    optional("STORESYNC_DATABASE_URL")
        .or_else(|| optional("DATABASE_URL"))
        .map(SecretString::from)
}

fn secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = required(key)?;
    check_secret(&value)
        .map_err(|reason| ConfigError::InsecureSecret(key.to_string(), reason))?;
    Ok(SecretString::from(value))
}

fn validate_page_size(page_size: u32) -> Result<u32, ConfigError> {
    if (1..=MAX_PAGE_SIZE).contains(&page_size) {
        Ok(page_size)
    } else {
        Err(ConfigError::InvalidEnvVar(
            "STORESYNC_PAGE_SIZE".to_string(),
            format!("must be between 1 and {MAX_PAGE_SIZE} (got {page_size})"),
        ))
    }
}

// =============================================================================
// Secret Strength
// =============================================================================

/// Reject secrets that look copied from a template or are too predictable to
/// sign webhooks with.
fn check_secret(value: &str) -> Result<(), String> {
    let lower = value.to_ascii_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(format!("looks like a placeholder (contains '{pattern}')"));
    }
    if value.chars().count() < MIN_SECRET_CHARS {
        return Err(format!("shorter than {MIN_SECRET_CHARS} characters"));
    }

    let bits = bits_per_char(value);
    if bits < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(format!(
            "entropy too low ({bits:.2} bits/char, need {MIN_ENTROPY_BITS_PER_CHAR:.1}); generate it randomly"
        ));
    }
    Ok(())
}

/// Shannon entropy of the character distribution.
#[allow(clippy::cast_precision_loss)]
fn bits_per_char(value: &str) -> f64 {
    let mut counts: HashMap<char, u32> = HashMap::new();
    for c in value.chars() {
        *counts.entry(c).or_default() += 1;
    }
    let total: u32 = counts.values().sum();
    if total == 0 {
        return 0.0;
    }
    counts
        .values()
        .map(|&n| f64::from(n) / f64::from(total))
        .map(|p| -p * p.log2())
        .sum()
}
