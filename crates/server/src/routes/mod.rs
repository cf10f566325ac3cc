//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health               - Liveness
//! GET    /health/ready         - Store reachable
//!
//! # Ingestion
//! POST   /webhook              - Signed platform webhook
//!
//! # Bulk sync
//! POST   /sync/all             - Products, customers, then orders
//! POST   /sync/{kind}          - One kind (products|customers|orders)
//!
//! # Webhook subscriptions
//! GET    /webhooks             - List subscriptions
//! POST   /webhooks/register    - Subscribe the fixed topic set
//! DELETE /webhooks             - Delete every subscription
//! DELETE /webhooks/{id}        - Delete one subscription
//!
//! # OAuth (POS platform)
//! GET    /oauth/connect        - Redirect to the platform consent page
//! GET    /oauth/callback       - Exchange the code and save the token
//! ```

pub mod health;
pub mod oauth;
pub mod sync;
pub mod webhook;
pub mod webhooks;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::state::AppState;

/// Build the route table.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(webhook::router())
        .merge(sync::router())
        .merge(webhooks::router())
        .merge(oauth::router())
}

/// Build the application with request tracing, bound to `state`.
pub fn app(state: AppState) -> Router {
    routes()
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}
