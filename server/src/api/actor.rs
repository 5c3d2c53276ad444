//! Acting identity extractor.
//!
//! Authentication happens upstream; the gateway forwards the verified user
//! id in `X-User-Id` and platform admin status in `X-Admin`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const ADMIN_HEADER: &str = "x-admin";

/// The identity performing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub is_admin: bool,
}

/// Rejection for requests without a usable identity.
#[derive(Debug, thiserror::Error)]
pub enum ActorRejection {
    #[error("Missing X-User-Id header")]
    MissingUserId,

    #[error("Invalid X-User-Id header")]
    InvalidUserId,
}

impl IntoResponse for ActorRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "UNAUTHENTICATED", "message": self.to_string() })),
        )
            .into_response()
    }
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ActorRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or(ActorRejection::MissingUserId)?
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .ok_or(ActorRejection::InvalidUserId)?;

        let is_admin = parts
            .headers
            .get(ADMIN_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));

        Ok(Self { user_id, is_admin })
    }
}
