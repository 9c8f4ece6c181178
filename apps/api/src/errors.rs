use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::LlmError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Upstream response error: {0}")]
    UpstreamResponse(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout => AppError::UpstreamTimeout(
                "Request to the AI provider timed out. Please try again.".to_string(),
            ),
            LlmError::Http(e) => {
                AppError::Upstream(format!("Error communicating with the AI provider: {e}"))
            }
            LlmError::Api { status, message } => AppError::Upstream(format!(
                "AI provider returned status {status}: {message}"
            )),
            LlmError::Parse(_) | LlmError::MissingContent(_) => {
                AppError::UpstreamResponse(err.to_string())
            }
            LlmError::EmptyContent => AppError::UpstreamResponse(
                "AI provider returned empty content. Please try again.".to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::UpstreamTimeout(msg) => {
                tracing::error!("AI provider timeout: {msg}");
                (StatusCode::GATEWAY_TIMEOUT, "UPSTREAM_TIMEOUT", msg.clone())
            }
            AppError::Upstream(msg) => {
                tracing::error!("AI provider error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    "Error communicating with the AI provider".to_string(),
                )
            }
            AppError::UpstreamResponse(msg) => {
                tracing::error!("AI provider response error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "UPSTREAM_RESPONSE_ERROR",
                    msg.clone(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_errors_map_to_gateway_statuses() {
        let timeout = AppError::from(LlmError::Timeout).into_response();
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);

        let api = AppError::from(LlmError::Api {
            status: 503,
            message: "overloaded".to_string(),
        })
        .into_response();
        assert_eq!(api.status(), StatusCode::BAD_GATEWAY);

        let empty = AppError::from(LlmError::EmptyContent).into_response();
        assert_eq!(empty.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_client_errors_keep_their_status() {
        assert_eq!(
            AppError::Validation("bad".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Forbidden("no".into()).into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::NotFound("gone".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
    }
}
