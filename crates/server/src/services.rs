//! Start-up wiring: builds the store, the platform client, and the sync
//! service from configuration.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::config::{LightspeedConfig, PlatformConfig, StoreBackend, SyncConfig};
use crate::db::{self, EntityStore, MemoryStore, PgStore, PgTokenStore};
use crate::platform::auth::{MemoryTokenStore, OAuthToken, TokenStore};
use crate::platform::lightspeed::LightspeedOAuth;
use crate::platform::{LightspeedClient, Platform, PlatformClient, PlatformError, ShopifyClient};
use crate::state::{AppState, OAuthConnector};
use crate::sync::SyncService;

/// Errors that prevent the services from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("STORESYNC_DATABASE_URL is required for the postgres store")]
    MissingDatabaseUrl,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("platform client error: {0}")]
    Platform(#[from] PlatformError),
}

/// Every long-lived service, built once.
pub struct Services {
    pub sync: SyncService,
    pub oauth: Option<OAuthConnector>,
}

impl Services {
    /// Build the services described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `StartupError` if the database is unreachable or a platform
    /// client cannot be constructed.
    pub async fn build(config: &SyncConfig) -> Result<Self, StartupError> {
        let pool = match config.store {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_ref()
                    .ok_or(StartupError::MissingDatabaseUrl)?;
                let pool = db::create_pool(url).await?;
                tracing::info!("Database pool created");
                Some(pool)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using the in-memory store; mirrored data is lost on restart");
                None
            }
        };

        let store: Arc<dyn EntityStore> = match &pool {
            Some(pool) => Arc::new(PgStore::new(pool.clone())),
            None => Arc::new(MemoryStore::new()),
        };
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let mut oauth = None;
        let platform: Arc<dyn PlatformClient> = match &config.platform {
            PlatformConfig::Shopify(shopify) => {
                Arc::new(ShopifyClient::new(shopify, config.http_timeout)?)
            }
            PlatformConfig::Lightspeed(lightspeed) => {
                let tokens = lightspeed_tokens(lightspeed, pool.as_ref()).await?;
                let connector = LightspeedOAuth::new(lightspeed, config.http_timeout)?;
                let client = LightspeedClient::new(
                    lightspeed,
                    config.http_timeout,
                    Arc::clone(&tokens),
                    Arc::new(connector.clone()),
                    Arc::clone(&clock),
                )?;
                oauth = Some(OAuthConnector {
                    oauth: connector,
                    tokens,
                });
                Arc::new(client)
            }
        };

        let sync = SyncService::new(store, platform, clock, config.page_size);
        Ok(Self { sync, oauth })
    }

    /// Consume the services into handler state.
    #[must_use]
    pub fn into_state(self, config: SyncConfig) -> AppState {
        AppState::new(config, self.sync, self.oauth)
    }
}

/// The token store for the POS platform, seeded with the configured refresh
/// token when nothing is stored yet.
async fn lightspeed_tokens(
    config: &LightspeedConfig,
    pool: Option<&PgPool>,
) -> Result<Arc<dyn TokenStore>, PlatformError> {
    let tokens: Arc<dyn TokenStore> = match pool {
        Some(pool) => Arc::new(PgTokenStore::new(pool.clone(), Platform::Lightspeed)),
        None => Arc::new(MemoryTokenStore::default()),
    };

    if tokens.load().await?.is_none() {
        match &config.refresh_token {
            Some(refresh_token) => {
                tokens
                    .save(&OAuthToken::from_refresh_token(refresh_token.clone()))
                    .await?;
                tracing::info!("Seeded token store from LIGHTSPEED_REFRESH_TOKEN");
            }
            None => tracing::warn!("No Lightspeed token stored; visit /oauth/connect"),
        }
    }

    Ok(tokens)
}
