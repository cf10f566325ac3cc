//! Storesync server binary.
//!
//! Mirrors one commerce platform into the local store: receives webhooks,
//! runs bulk syncs on request, and manages webhook subscriptions.
//!
//! Migrations are not applied here; run `storesync migrate` first.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::error::Error;

use sentry::integrations::tracing::{self as sentry_tracing, EventFilter};
use tracing::{Level, Metadata, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use storesync_server::config::SyncConfig;
use storesync_server::routes;
use storesync_server::services::Services;

const DEFAULT_LOG_FILTER: &str = "storesync_server=info,tower_http=debug";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = SyncConfig::from_env()?;

    // Sentry has to exist before the tracing layer that feeds it.
    let sentry_guard = config.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: config.sentry_environment.clone().map(Into::into),
                sample_rate: config.sentry_sample_rate,
                traces_sample_rate: config.sentry_traces_sample_rate,
                attach_stacktrace: true,
                // Webhook payloads carry customer PII
                send_default_pii: false,
                ..Default::default()
            },
        ))
    });

    init_tracing();
    if sentry_guard.is_some() {
        info!("Sentry error reporting enabled");
    }

    let services = Services::build(&config).await?;
    info!(
        platform = %services.sync.platform().platform(),
        store = ?config.store,
        "Services ready"
    );

    let addr = config.socket_addr();
    let app = routes::app(services.into_state(config))
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "storesync listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("storesync stopped");
    Ok(())
}

/// Text logs locally, flattened JSON when `LOG_FORMAT=json` or on Fly.io.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"))
        || std::env::var_os("FLY_APP_NAME").is_some();

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().flatten_event(true)))
        .with((!json).then(fmt::layer))
        .with(sentry_tracing::layer().event_filter(to_sentry))
        .init();
}

/// Warnings and errors become Sentry events; info and debug ride along as
/// breadcrumbs.
fn to_sentry(metadata: &Metadata<'_>) -> EventFilter {
    match *metadata.level() {
        Level::ERROR | Level::WARN => EventFilter::Event,
        Level::INFO | Level::DEBUG => EventFilter::Breadcrumb,
        _ => EventFilter::Ignore,
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix. If a handler cannot be
/// installed, that signal is simply not waited for.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => info!("Interrupted, shutting down"),
        () = terminate => info!("SIGTERM received, shutting down"),
    }
}
