use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("API token required")]
    MissingCredential,

    /// Covers both "no record with that digest" and "record is inactive".
    /// The two are intentionally indistinguishable to the caller.
    #[error("invalid API token")]
    InvalidCredential,

    #[error("API token expired")]
    ExpiredCredential,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("token not found")]
    NotFound,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::MissingCredential => (
                StatusCode::UNAUTHORIZED,
                "API token required",
                "Please provide a valid API token in X-API-Token header or Authorization header"
                    .to_string(),
            ),
            AppError::InvalidCredential => (
                StatusCode::UNAUTHORIZED,
                "Invalid API token",
                "The provided API token is invalid or has been revoked".to_string(),
            ),
            AppError::ExpiredCredential => (
                StatusCode::UNAUTHORIZED,
                "API token expired",
                "The provided API token has expired".to_string(),
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "Unauthorized", msg.clone()),
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                "Not found",
                "API token not found".to_string(),
            ),
            AppError::Validation(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "Validation failed", msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    "internal server error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error,
            "message": message,
        }));

        (status, body).into_response()
    }
}
