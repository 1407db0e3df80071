//! Error-kind to HTTP status mapping. Direct `match`, no
//! generic trait-based mapper — same style `everruns-api` uses for its
//! own `StatusCode` translations.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use loom_core::ServiceError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Maps a [`ServiceError`] to an HTTP status code.
pub fn service_error_response(err: ServiceError) -> Response {
    let status = match &err {
        ServiceError::MigrationNotFound(_)
        | ServiceError::CandidateNotFound { .. }
        | ServiceError::RunNotFound { .. } => StatusCode::NOT_FOUND,
        ServiceError::CandidateAlreadyRun { .. } | ServiceError::CandidateNotRunning { .. } => {
            StatusCode::CONFLICT
        }
        ServiceError::Identity(_) => StatusCode::BAD_REQUEST,
        ServiceError::Transient(_) | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "service call failed");
    }

    (status, Json(ErrorBody { error: err.to_string() })).into_response()
}

/// A malformed request body or query string.
pub fn malformed_body(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { error: message.into() })).into_response()
}
