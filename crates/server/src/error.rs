//! Route errors and their JSON responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::StoreError;
use crate::platform::PlatformError;

/// Error returned by every route handler.
#[derive(Debug, Error)]
pub enum AppError {
    /// Neither webhook secret produced the signature header.
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A call to Shopify or Lightspeed failed.
    #[error("Platform error: {0}")]
    Platform(PlatformError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The configured platform has no API for this, e.g. Lightspeed
    /// webhook subscriptions.
    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PlatformError> for AppError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Unsupported(what) => Self::Unsupported(what),
            PlatformError::NotFound(what) => Self::NotFound(what),
            other => Self::Platform(other),
        }
    }
}

impl AppError {
    /// Failures on our side, as opposed to a bad request or an unsupported
    /// operation. These are reported to Sentry.
    const fn is_server_error(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Internal(_) | Self::Platform(_))
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Store(_) | Self::Internal(_) | Self::Platform(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The message shown to the caller. Store and internal details stay in
    /// the logs.
    fn public_message(&self) -> String {
        match self {
            Self::Store(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Platform(_) => "Platform request failed".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(error = %self, sentry_event_id = %event_id, "Request failed");
        }

        let body = if matches!(self, Self::InvalidSignature) {
            json!({ "error": self.public_message() })
        } else {
            json!({ "success": false, "error": self.public_message() })
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("webhook 42".to_string());
        assert_eq!(err.to_string(), "Not found: webhook 42");

        let err = AppError::BadRequest("unknown entity kind: widgets".to_string());
        assert_eq!(err.to_string(), "Bad request: unknown entity kind: widgets");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(get_status(AppError::InvalidSignature), StatusCode::UNAUTHORIZED);
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Unsupported("test".to_string())),
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(
            get_status(AppError::Platform(PlatformError::Unauthorized)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_platform_error_conversion() {
        assert!(matches!(
            AppError::from(PlatformError::Unsupported("webhooks".to_string())),
            AppError::Unsupported(_)
        ));
        assert!(matches!(
            AppError::from(PlatformError::RateLimited(2)),
            AppError::Platform(_)
        ));
    }

    #[tokio::test]
    async fn test_invalid_signature_body() {
        let body = body_json(AppError::InvalidSignature.into_response()).await;
        assert_eq!(body, json!({ "error": "Invalid signature" }));
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let response = AppError::Internal("pool exhausted at 10.0.0.3".to_string()).into_response();
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Internal server error");
    }
}
