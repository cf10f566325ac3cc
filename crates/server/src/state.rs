//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::config::SyncConfig;
use crate::db::EntityStore;
use crate::platform::PlatformClient;
use crate::platform::auth::TokenStore;
use crate::platform::lightspeed::LightspeedOAuth;
use crate::signature::SignatureVerifier;
use crate::sync::SyncService;

/// How long an OAuth `state` value stays valid.
const OAUTH_STATE_TTL: Duration = Duration::from_secs(600);

/// Everything the OAuth routes need to connect the POS platform.
pub struct OAuthConnector {
    pub oauth: LightspeedOAuth,
    pub tokens: Arc<dyn TokenStore>,
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Services are built once at start-up and
/// injected here.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: SyncConfig,
    sync: SyncService,
    verifier: SignatureVerifier,
    oauth: Option<OAuthConnector>,
    /// Outstanding OAuth `state` values (CSRF protection).
    oauth_states: Cache<String, ()>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The webhook verifier is built from `config.webhook`.
    #[must_use]
    pub fn new(config: SyncConfig, sync: SyncService, oauth: Option<OAuthConnector>) -> Self {
        let verifier = SignatureVerifier::new(
            config.webhook.secret.clone(),
            config.webhook.secondary_secret.clone(),
        );

        let oauth_states = Cache::builder()
            .max_capacity(1_000)
            .time_to_live(OAUTH_STATE_TTL)
            .build();

        Self {
            inner: Arc::new(AppStateInner {
                config,
                sync,
                verifier,
                oauth,
                oauth_states,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// The sync orchestrator.
    #[must_use]
    pub fn sync(&self) -> &SyncService {
        &self.inner.sync
    }

    #[must_use]
    pub fn store(&self) -> &dyn EntityStore {
        self.inner.sync.store()
    }

    #[must_use]
    pub fn platform(&self) -> &dyn PlatformClient {
        self.inner.sync.platform()
    }

    #[must_use]
    pub fn verifier(&self) -> &SignatureVerifier {
        &self.inner.verifier
    }

    /// OAuth connection support; `None` for platforms with static tokens.
    #[must_use]
    pub fn oauth(&self) -> Option<&OAuthConnector> {
        self.inner.oauth.as_ref()
    }

    #[must_use]
    pub fn oauth_states(&self) -> &Cache<String, ()> {
        &self.inner.oauth_states
    }
}
