//! OAuth authorization-code flow for the POS platform.
//!
//! - Connect: redirects the operator to the platform's consent page
//! - Callback: checks the CSRF state, exchanges the code, saves the token

use axum::{
    Json, Router,
    extract::{Query, State},
    response::Redirect,
    routing::get,
};
use rand::Rng;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::error::AppError;
use crate::state::{AppState, OAuthConnector};

/// Length of the generated CSRF state.
const STATE_LENGTH: usize = 32;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/oauth/connect", get(connect))
        .route("/oauth/callback", get(callback))
}

/// Query parameters from the OAuth callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code to exchange for tokens.
    pub code: Option<String>,
    /// State parameter for CSRF protection.
    pub state: Option<String>,
    /// Error code if authorization failed.
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Generate a cryptographically secure random string.
fn generate_state() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..STATE_LENGTH)
        .filter_map(|_| CHARSET.get(rng.random_range(0..CHARSET.len())))
        .map(|&b| char::from(b))
        .collect()
}

fn connector(state: &AppState) -> Result<&OAuthConnector, AppError> {
    state.oauth().ok_or_else(|| {
        AppError::Unsupported(format!(
            "{} does not use an OAuth connection",
            state.platform().platform()
        ))
    })
}

/// `GET /oauth/connect`
#[instrument(skip(state))]
async fn connect(State(state): State<AppState>) -> Result<Redirect, AppError> {
    let connector = connector(&state)?;

    let oauth_state = generate_state();
    let url = connector.oauth.authorization_url(&oauth_state)?;
    state.oauth_states().insert(oauth_state, ()).await;

    Ok(Redirect::to(&url))
}

/// `GET /oauth/callback`
#[instrument(skip(state, query))]
async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<Value>, AppError> {
    let connector = connector(&state)?;

    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        warn!(%error, %description, "Platform denied OAuth authorization");
        return Err(AppError::BadRequest(format!("Authorization denied: {error}")));
    }

    let returned_state = query
        .state
        .ok_or_else(|| AppError::BadRequest("Missing OAuth state".into()))?;
    if state.oauth_states().remove(&returned_state).await.is_none() {
        warn!("OAuth callback with unknown or expired state");
        return Err(AppError::BadRequest("Invalid OAuth state".into()));
    }

    let code = query
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".into()))?;

    let token = connector
        .oauth
        .exchange_code(&code, chrono::Utc::now())
        .await?;
    connector.tokens.save(&token).await?;

    info!("Platform connected");
    Ok(Json(json!({ "success": true, "message": "Platform connected" })))
}
