use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::publish::PublishError;
use crate::render::compose::ComposeError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Compose error: {0}")]
    Compose(#[from] ComposeError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Compose(e) => {
                tracing::error!("Compose error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "COMPOSE_ERROR",
                    "Failed to generate grid".to_string(),
                )
            }
            AppError::Publish(PublishError::NotConfigured) => {
                tracing::error!("Publish requested but object storage is not configured");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORAGE_NOT_CONFIGURED",
                    "Grid publishing is not configured".to_string(),
                )
            }
            AppError::Publish(PublishError::InvalidIdentifier(id)) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                format!("Cannot derive a storage key from '{id}'"),
            ),
            AppError::Publish(e) => {
                tracing::error!("Publish error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "STORAGE_ERROR",
                    "Failed to upload grid".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
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
