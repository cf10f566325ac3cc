//! OAuth token handling for platforms with expiring access tokens.
//!
//! Tokens live in an explicit [`TokenStore`] that is read on every call, so a
//! token refreshed by one task is seen by all others. The refresh policy is a
//! plain function, [`with_token_refresh`]:
//!
//! 1. Load the token; refresh first if it expires within a minute.
//! 2. Run the operation.
//! 3. If the platform rejects the token, refresh and retry exactly once.
//! 4. A second rejection surfaces as [`PlatformError::Unauthorized`].

use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use tokio::sync::RwLock;

use super::PlatformError;
use crate::clock::Clock;

/// Seconds before expiry at which a token is treated as expired.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// An OAuth access token with its refresh token.
///
/// Implements `Debug` manually to redact both tokens.
#[derive(Clone)]
pub struct OAuthToken {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    /// `None` when the platform did not report a lifetime.
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthToken")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl OAuthToken {
    /// A placeholder holding only a refresh token.
    ///
    /// Already expired, so the first call refreshes it into a usable token.
    #[must_use]
    pub fn from_refresh_token(refresh_token: SecretString) -> Self {
        Self {
            access_token: SecretString::from(String::new()),
            refresh_token: Some(refresh_token),
            expires_at: Some(DateTime::<Utc>::UNIX_EPOCH),
        }
    }

    /// Check if the access token has expired (or expires within a minute).
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|expires_at| now >= expires_at - Duration::seconds(EXPIRY_BUFFER_SECS))
    }

    #[must_use]
    pub const fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }
}

/// Persistence for the current platform token.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self) -> Result<Option<OAuthToken>, PlatformError>;

    async fn save(&self, token: &OAuthToken) -> Result<(), PlatformError>;
}

/// Exchanges a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(
        &self,
        refresh_token: &SecretString,
        now: DateTime<Utc>,
    ) -> Result<OAuthToken, PlatformError>;
}

/// Process-local token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<OAuthToken>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new(token: Option<OAuthToken>) -> Self {
        Self {
            token: RwLock::new(token),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<OAuthToken>, PlatformError> {
        Ok(self.token.read().await.clone())
    }

    async fn save(&self, token: &OAuthToken) -> Result<(), PlatformError> {
        *self.token.write().await = Some(token.clone());
        Ok(())
    }
}

/// Run `op` with a valid access token, refreshing as needed.
///
/// `op` receives the access token and reports a rejected token as
/// [`PlatformError::TokenExpired`].
///
/// # Errors
///
/// Returns `PlatformError::NoAccessToken` when nothing is stored,
/// `PlatformError::Unauthorized` when the token is still rejected after one
/// refresh (or cannot be refreshed), and any other error from `op` or the
/// refresher unchanged.
pub async fn with_token_refresh<T, F, Fut>(
    store: &dyn TokenStore,
    refresher: &dyn TokenRefresher,
    clock: &dyn Clock,
    op: F,
) -> Result<T, PlatformError>
where
    F: Fn(SecretString) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, PlatformError>> + Send,
    T: Send,
{
    let mut token = store.load().await?.ok_or(PlatformError::NoAccessToken)?;
    if token.is_expired_at(clock.now()) {
        tracing::debug!("Access token expired, refreshing before use");
        token = refresh_and_save(store, refresher, clock, &token).await?;
    }

    match op(token.access_token.clone()).await {
        Err(PlatformError::TokenExpired) => {
            tracing::info!("Access token rejected, refreshing and retrying once");
            let refreshed = refresh_and_save(store, refresher, clock, &token).await?;
            match op(refreshed.access_token.clone()).await {
                Err(PlatformError::TokenExpired) => Err(PlatformError::Unauthorized),
                other => other,
            }
        }
        other => other,
    }
}

async fn refresh_and_save(
    store: &dyn TokenStore,
    refresher: &dyn TokenRefresher,
    clock: &dyn Clock,
    token: &OAuthToken,
) -> Result<OAuthToken, PlatformError> {
    let Some(refresh_token) = token.refresh_token.as_ref() else {
        return Err(PlatformError::Unauthorized);
    };

    let mut fresh = refresher.refresh(refresh_token, clock.now()).await?;
    // Platforms that do not rotate refresh tokens omit them from the response.
    if fresh.refresh_token.is_none() {
        fresh.refresh_token = Some(refresh_token.clone());
    }
    store.save(&fresh).await?;
    Ok(fresh)
}
