//! Channel Membership Handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::error::ApiError;
use super::{Actor, AppState};
use crate::channels::{Channel, ChannelType, Member, MemberRole};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateChannelRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(max = 1024, message = "Description must be at most 1024 characters"))]
    pub description: Option<String>,
    pub channel_type: ChannelType,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    #[serde(default = "default_role")]
    pub role: MemberRole,
}

const fn default_role() -> MemberRole {
    MemberRole::Member
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: MemberRole,
}

#[derive(Debug, Serialize)]
pub struct ChannelResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub channel_type: ChannelType,
    pub is_archived: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub members: Vec<Member>,
}

impl From<Channel> for ChannelResponse {
    fn from(channel: Channel) -> Self {
        let members = channel.active_members().cloned().collect();
        Self {
            id: channel.id,
            name: channel.name,
            description: channel.description,
            channel_type: channel.channel_type,
            is_archived: channel.is_archived,
            created_by: channel.created_by,
            created_at: channel.created_at,
            members,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MembershipResponse {
    pub is_member: bool,
    pub role: Option<MemberRole>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a channel owned by the caller.
/// POST /api/channels
pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    Json(body): Json<CreateChannelRequest>,
) -> Result<(StatusCode, Json<ChannelResponse>), ApiError> {
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let channel = state
        .channels
        .create_channel(body.name, body.description, body.channel_type, actor.user_id)
        .await?;

    Ok((StatusCode::CREATED, Json(channel.into())))
}

/// Get a channel with its active members.
/// GET /api/channels/{id}
///
/// Non-public channels are readable by active members and admins only.
pub async fn get(
    State(state): State<AppState>,
    actor: Actor,
    Path(channel_id): Path<Uuid>,
) -> Result<Json<ChannelResponse>, ApiError> {
    let channel = state
        .channels
        .get_channel_for(channel_id, actor.user_id, actor.is_admin)
        .await?;
    Ok(Json(channel.into()))
}

/// Membership status of one user.
/// GET /api/channels/{id}/members/{user_id}
pub async fn membership(
    State(state): State<AppState>,
    actor: Actor,
    Path((channel_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MembershipResponse>, ApiError> {
    let role = state
        .channels
        .member_role_for(channel_id, user_id, actor.user_id, actor.is_admin)
        .await?;
    Ok(Json(MembershipResponse {
        is_member: role.is_some(),
        role,
    }))
}

/// Add a member.
/// POST /api/channels/{id}/members
pub async fn add_member(
    State(state): State<AppState>,
    actor: Actor,
    Path(channel_id): Path<Uuid>,
    Json(body): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<Member>), ApiError> {
    let member = state
        .channels
        .add_member(channel_id, body.user_id, actor.user_id, body.role)
        .await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// Remove a member.
/// DELETE /api/channels/{id}/members/{user_id}
pub async fn remove_member(
    State(state): State<AppState>,
    actor: Actor,
    Path((channel_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Member>, ApiError> {
    let member = state
        .channels
        .remove_member(channel_id, user_id, actor.user_id)
        .await?;
    Ok(Json(member))
}

/// Change a member's role.
/// PATCH /api/channels/{id}/members/{user_id}
pub async fn change_role(
    State(state): State<AppState>,
    actor: Actor,
    Path((channel_id, user_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ChangeRoleRequest>,
) -> Result<Json<Member>, ApiError> {
    let member = state
        .channels
        .change_member_role(channel_id, user_id, body.role, actor.user_id)
        .await?;
    Ok(Json(member))
}

/// Leave a channel.
/// POST /api/channels/{id}/leave
pub async fn leave(
    State(state): State<AppState>,
    actor: Actor,
    Path(channel_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.channels.leave_channel(channel_id, actor.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Archive a channel.
/// POST /api/channels/{id}/archive
pub async fn archive(
    State(state): State<AppState>,
    actor: Actor,
    Path(channel_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.channels.archive(channel_id, actor.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Unarchive a channel.
/// POST /api/channels/{id}/unarchive
pub async fn unarchive(
    State(state): State<AppState>,
    actor: Actor,
    Path(channel_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.channels.unarchive(channel_id, actor.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_validation() {
        let ok = CreateChannelRequest {
            name: "general".into(),
            description: None,
            channel_type: ChannelType::Public,
        };
        assert!(ok.validate().is_ok());

        let empty = CreateChannelRequest {
            name: String::new(),
            description: None,
            channel_type: ChannelType::Public,
        };
        assert!(empty.validate().is_err());

        let long_description = CreateChannelRequest {
            name: "general".into(),
            description: Some("x".repeat(1025)),
            channel_type: ChannelType::Private,
        };
        assert!(long_description.validate().is_err());
    }

    #[test]
    fn test_add_member_role_defaults_to_member() {
        let body: AddMemberRequest =
            serde_json::from_value(serde_json::json!({ "user_id": Uuid::new_v4() })).unwrap();
        assert_eq!(body.role, MemberRole::Member);
    }
}
