use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::analysis::AnalysisFailure;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Analysis(#[from] AnalysisFailure),
}

fn analysis_status(kind: &str) -> StatusCode {
    match kind {
        "unsupported_organization" | "invalid_input" => StatusCode::UNPROCESSABLE_ENTITY,
        "missing_record" => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                msg.clone(),
            ),
            AppError::Analysis(failure) => {
                let status = analysis_status(failure.kind());
                if status.is_server_error() {
                    tracing::error!("Analysis error [{}]: {}", failure.kind(), failure);
                }
                let body = Json(json!({
                    "error": failure.error.to_string(),
                    "error_type": failure.kind(),
                    "elapsed_seconds": failure.elapsed_seconds,
                }));
                return (status, body).into_response();
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
