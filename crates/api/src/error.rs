use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use creditpulse_core::CoreError;
use serde_json::json;

/// Handler error. Wraps the core taxonomy so handlers can use `?` on pipeline calls.
#[derive(Debug)]
pub struct ApiError(CoreError);

impl ApiError {
    pub fn database_unavailable() -> Self {
        ApiError(CoreError::DependencyUnavailable(
            "database is not connected".to_string(),
        ))
    }

    pub fn ingestion_unavailable() -> Self {
        ApiError(CoreError::DependencyUnavailable(
            "data providers are not configured".to_string(),
        ))
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError(CoreError::Internal(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self.0 {
            CoreError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            CoreError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            CoreError::DependencyUnavailable(msg) => {
                tracing::warn!(detail = %msg, "dependency unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            CoreError::Internal(err) => {
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %format!("{err:#}"), "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
