//! API Error Responses
//!
//! Every error body is `{ "error": <code>, "message": <text> }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::{AuthzError, ServiceError};
use crate::store::StoreError;

/// Errors surfaced by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        Self::Service(err.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Service(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Service(err) => err.into_response(),
            Self::Validation(message) => {
                error_body(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            Self::Authz(AuthzError::NotFound(reason)) => {
                error_body(StatusCode::NOT_FOUND, "NOT_FOUND", reason)
            }
            Self::Authz(AuthzError::NotAuthorized(reason)) => {
                error_body(StatusCode::FORBIDDEN, "NOT_AUTHORIZED", reason)
            }
            Self::Authz(AuthzError::Conflict(reason)) => {
                error_body(StatusCode::CONFLICT, "CONFLICT", reason)
            }
            Self::Contention(id) => {
                tracing::warn!(aggregate_id = %id, "Responding busy after repeated version conflicts");
                error_body(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "CONTENTION",
                    "Resource is busy, retry later",
                )
            }
            Self::Store(err) => {
                tracing::error!("Store error: {}", err);
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Storage error",
                )
            }
        }
    }
}

fn error_body(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": code, "message": message.into() })),
    )
        .into_response()
}
