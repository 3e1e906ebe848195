use crate::error::AppError;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    pub status: u16,
}

/// Map domain errors to HTTP responses. Store failures surface as opaque
/// 500s; the caller decides whether to resubmit.
pub fn map_error(err: &AppError) -> (StatusCode, ErrorBody) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let error = match err {
        AppError::Validation(_) => "validation_failed",
        AppError::Unauthorized => "unauthorized",
        AppError::Forbidden(_) => "authorization_denied",
        AppError::NotFound(_) => "not_found",
        AppError::Database(_) => "store_failure",
        AppError::Config(_) | AppError::StartServer(_) | AppError::Internal => "server_error",
    };

    // Never leak database detail to clients
    let message = match err {
        AppError::Database(e) => {
            tracing::error!(error = %e, "store failure");
            "backing store unavailable".to_string()
        }
        other => other.to_string(),
    };

    let body = ErrorBody {
        error: error.to_string(),
        message,
        status: status.as_u16(),
    };
    (status, body)
}

pub fn into_response(err: AppError) -> impl IntoResponse {
    let (status, body) = map_error(&err);
    (status, Json(body))
}
