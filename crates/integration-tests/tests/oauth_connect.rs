//! OAuth connect flow on a Lightspeed deployment.
//!
//! Only the local half of the flow is exercised: the consent redirect and
//! callback state checks. Code exchange needs the real token endpoint.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode, header::LOCATION};
use secrecy::SecretString;
use url::Url;

use storesync_integration_tests::{FakePlatform, TestContext, test_config};
use storesync_server::config::{LightspeedConfig, PlatformConfig};
use storesync_server::platform::auth::MemoryTokenStore;
use storesync_server::platform::lightspeed::LightspeedOAuth;
use storesync_server::state::OAuthConnector;

fn lightspeed() -> TestContext {
    let settings = LightspeedConfig {
        account_id: "1".to_string(),
        client_id: "storesync-test".to_string(),
        client_secret: SecretString::from("client-secret"),
        redirect_url: "https://sync.example.com/oauth/callback".to_string(),
        refresh_token: None,
    };
    let connector = OAuthConnector {
        oauth: LightspeedOAuth::new(&settings, Duration::from_secs(5)).unwrap(),
        tokens: Arc::new(MemoryTokenStore::default()),
    };
    let mut config = test_config();
    config.platform = PlatformConfig::Lightspeed(settings);
    TestContext::build_with_oauth(FakePlatform::lightspeed(), config, Some(connector))
}

/// Start the flow and return the state handed to the platform.
async fn connect(ctx: &TestContext) -> String {
    let response = ctx.raw(Method::GET, "/oauth/connect").await;
    assert!(response.status().is_redirection());

    let location = response.headers()[LOCATION].to_str().unwrap();
    let url = Url::parse(location).unwrap();
    assert_eq!(url.host_str(), Some("cloud.lightspeedapp.com"));

    let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert!(query.contains(&("client_id".to_string(), "storesync-test".to_string())));
    query
        .into_iter()
        .find_map(|(key, value)| (key == "state").then_some(value))
        .unwrap()
}

#[tokio::test]
async fn test_connect_redirects_with_fresh_state() {
    let ctx = lightspeed();

    let first = connect(&ctx).await;
    let second = connect(&ctx).await;

    assert_eq!(first.len(), 32);
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_callback_rejects_unknown_state() {
    let ctx = lightspeed();
    connect(&ctx).await;

    let (status, body) = ctx
        .call(Method::GET, "/oauth/callback?code=abc&state=forged")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad request: Invalid OAuth state");
}

#[tokio::test]
async fn test_callback_state_is_single_use() {
    let ctx = lightspeed();
    let state = connect(&ctx).await;

    // No code: fails after the state has been consumed.
    let (status, body) = ctx
        .call(Method::GET, &format!("/oauth/callback?state={state}"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad request: Missing authorization code");

    let (status, body) = ctx
        .call(Method::GET, &format!("/oauth/callback?code=abc&state={state}"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad request: Invalid OAuth state");
}

#[tokio::test]
async fn test_callback_reports_denied_authorization() {
    let ctx = lightspeed();

    let (status, body) = ctx
        .call(
            Method::GET,
            "/oauth/callback?error=access_denied&error_description=User+declined",
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad request: Authorization denied: access_denied");
}
