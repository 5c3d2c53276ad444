//! File Access Handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ApiError;
use super::{Actor, AppState};
use crate::files::{AccessLevel, File, FileAccess};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateFileRequest {
    pub access_level: AccessLevel,
    pub channel_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAccessLevelRequest {
    pub access_level: AccessLevel,
}

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub id: Uuid,
    pub access_level: AccessLevel,
    pub uploaded_by: Uuid,
    pub channel_id: Option<Uuid>,
    pub is_deleted: bool,
    pub grants: Vec<FileAccess>,
}

impl From<File> for FileResponse {
    fn from(file: File) -> Self {
        let grants = file.active_grants().cloned().collect();
        Self {
            id: file.id,
            access_level: file.access_level,
            uploaded_by: file.uploaded_by,
            channel_id: file.channel_id,
            is_deleted: file.is_deleted,
            grants,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessResponse {
    pub allowed: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// Register an uploaded file.
/// POST /api/files
pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    Json(body): Json<CreateFileRequest>,
) -> Result<(StatusCode, Json<FileResponse>), ApiError> {
    let file = state
        .files
        .create_file(actor.user_id, body.access_level, body.channel_id)
        .await?;
    Ok((StatusCode::CREATED, Json(file.into())))
}

/// File metadata with active grants, for the uploader or an admin.
/// GET /api/files/{id}
pub async fn get(
    State(state): State<AppState>,
    actor: Actor,
    Path(file_id): Path<Uuid>,
) -> Result<Json<FileResponse>, ApiError> {
    let file = state
        .files
        .get_file_for_manager(file_id, actor.user_id, actor.is_admin)
        .await?;
    Ok(Json(file.into()))
}

/// Soft delete a file.
/// DELETE /api/files/{id}
pub async fn delete(
    State(state): State<AppState>,
    actor: Actor,
    Path(file_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .files
        .delete_file(file_id, actor.user_id, actor.is_admin)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Whether the caller may read the file.
/// GET /api/files/{id}/access
pub async fn check_access(
    State(state): State<AppState>,
    actor: Actor,
    Path(file_id): Path<Uuid>,
) -> Result<Json<AccessResponse>, ApiError> {
    let allowed = state
        .files
        .check_access(file_id, actor.user_id, actor.is_admin)
        .await?;
    Ok(Json(AccessResponse { allowed }))
}

/// Change the access level.
/// PUT /api/files/{id}/access-level
pub async fn update_access_level(
    State(state): State<AppState>,
    actor: Actor,
    Path(file_id): Path<Uuid>,
    Json(body): Json<UpdateAccessLevelRequest>,
) -> Result<Json<FileResponse>, ApiError> {
    let file = state
        .files
        .update_access_level(file_id, body.access_level, actor.user_id, actor.is_admin)
        .await?;
    Ok(Json(file.into()))
}

/// Grant access to a user.
/// PUT /api/files/{id}/grants/{user_id}
pub async fn grant(
    State(state): State<AppState>,
    actor: Actor,
    Path((file_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<FileAccess>, ApiError> {
    let grant = state
        .files
        .grant_access(file_id, user_id, actor.user_id, actor.is_admin)
        .await?;
    Ok(Json(grant))
}

/// Revoke a user's access.
/// DELETE /api/files/{id}/grants/{user_id}
pub async fn revoke(
    State(state): State<AppState>,
    actor: Actor,
    Path((file_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<FileAccess>, ApiError> {
    let grant = state
        .files
        .revoke_access(file_id, user_id, actor.user_id, actor.is_admin)
        .await?;
    Ok(Json(grant))
}
