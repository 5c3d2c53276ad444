//! Service-to-service endpoints.
//!
//! Mounted behind [`require_service_token`]; callers present the shared
//! `INTERNAL_SERVICE_TOKEN` in `X-Service-Token`.

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use super::error::ApiError;
use super::AppState;
use crate::membership::remote::MembershipAnswer;

pub const SERVICE_TOKEN_HEADER: &str = "x-service-token";

/// Rejection for internal requests without the shared service token.
#[derive(Debug, thiserror::Error)]
pub enum ServiceTokenRejection {
    #[error("Internal routes are disabled")]
    NotConfigured,

    #[error("Missing or invalid service token")]
    InvalidToken,
}

impl IntoResponse for ServiceTokenRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "UNAUTHENTICATED", "message": self.to_string() })),
        )
            .into_response()
    }
}

/// Middleware to require the shared service token.
///
/// Without a configured token every internal request is rejected.
pub async fn require_service_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ServiceTokenRejection> {
    let expected = state
        .config
        .internal_service_token
        .as_deref()
        .ok_or(ServiceTokenRejection::NotConfigured)?;

    let presented = request
        .headers()
        .get(SERVICE_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or(ServiceTokenRejection::InvalidToken)?;

    if presented != expected {
        tracing::warn!(path = %request.uri().path(), "Rejected internal request with a bad service token");
        return Err(ServiceTokenRejection::InvalidToken);
    }

    Ok(next.run(request).await)
}

/// Active membership fact consumed by [`crate::membership::HttpMembershipQuery`].
/// GET /internal/channels/{channel_id}/members/{user_id}
pub async fn membership(
    State(state): State<AppState>,
    Path((channel_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MembershipAnswer>, ApiError> {
    let is_member = state.channels.is_member(channel_id, user_id).await?;
    Ok(Json(MembershipAnswer { is_member }))
}
