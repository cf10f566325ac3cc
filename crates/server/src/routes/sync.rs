//! Bulk sync triggers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;
use tracing::instrument;

use storesync_core::EntityKind;

use crate::error::AppError;
use crate::state::AppState;
use crate::sync::{KindReport, SyncReport};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sync/all", post(sync_all_kinds))
        .route("/sync/{kind}", post(sync_kind))
}

#[derive(Debug, Serialize)]
struct SyncResponse {
    success: bool,
    kind: EntityKind,
    #[serde(flatten)]
    report: SyncReport,
}

#[derive(Debug, Serialize)]
struct FullSyncResponse {
    success: bool,
    #[serde(flatten)]
    report: SyncReport,
    kinds: Vec<KindReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

/// `POST /sync/{kind}`: mirror every entity of one kind.
#[instrument(skip(state))]
async fn sync_kind(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<SyncResponse>, AppError> {
    let kind: EntityKind = kind
        .parse()
        .map_err(|e: storesync_core::UnknownEntityKind| AppError::BadRequest(e.to_string()))?;

    // Any listing failure aborts the run, including a platform 404.
    let report = state
        .sync()
        .sync_all(kind)
        .await
        .map_err(AppError::Platform)?;
    Ok(Json(SyncResponse {
        success: true,
        kind,
        report,
    }))
}

/// `POST /sync/all`: mirror products, customers, then orders.
///
/// Returns 200 with a per-kind breakdown unless every kind failed.
#[instrument(skip(state))]
async fn sync_all_kinds(State(state): State<AppState>) -> Response {
    let full = state.sync().sync_everything().await;
    let status = if full.all_failed() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };

    let body = FullSyncResponse {
        success: full.is_complete(),
        report: full.totals(),
        error: full.all_failed().then_some("Platform request failed"),
        kinds: full.kinds,
    };
    (status, Json(body)).into_response()
}
