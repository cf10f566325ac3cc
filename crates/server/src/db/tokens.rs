//! Platform OAuth token repository.
//!
//! Stores one token row per platform so a refreshed token survives restarts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

use crate::platform::auth::{OAuthToken, TokenStore};
use crate::platform::{Platform, PlatformError};

/// Internal row type for `PostgreSQL` queries.
#[derive(sqlx::FromRow)]
struct PlatformTokenRow {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl From<PlatformTokenRow> for OAuthToken {
    fn from(row: PlatformTokenRow) -> Self {
        Self {
            access_token: SecretString::from(row.access_token),
            refresh_token: row.refresh_token.map(SecretString::from),
            expires_at: row.expires_at,
        }
    }
}

/// [`TokenStore`] backed by `storesync.platform_token`.
#[derive(Debug, Clone)]
pub struct PgTokenStore {
    pool: PgPool,
    platform: Platform,
}

impl PgTokenStore {
    #[must_use]
    pub const fn new(pool: PgPool, platform: Platform) -> Self {
        Self { pool, platform }
    }
}

fn store_error(err: &sqlx::Error) -> PlatformError {
    PlatformError::TokenStore(err.to_string())
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn load(&self) -> Result<Option<OAuthToken>, PlatformError> {
        let row = sqlx::query_as::<_, PlatformTokenRow>(
            r"
            SELECT access_token, refresh_token, expires_at
            FROM storesync.platform_token
            WHERE platform = $1
            ",
        )
        .bind(self.platform.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error(&e))?;

        Ok(row.map(OAuthToken::from))
    }

    async fn save(&self, token: &OAuthToken) -> Result<(), PlatformError> {
        sqlx::query(
            r"
            INSERT INTO storesync.platform_token (platform, access_token, refresh_token, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (platform) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                expires_at = EXCLUDED.expires_at,
                updated_at = now()
            ",
        )
        .bind(self.platform.as_str())
        .bind(token.access_token.expose_secret())
        .bind(token.refresh_token.as_ref().map(|t| t.expose_secret()))
        .bind(token.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error(&e))?;

        Ok(())
    }
}
