//! File access service.
//!
//! Every operation except [`FileService::create_file`] treats a deleted file
//! as missing unless the caller is an admin.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use super::mutate;
use crate::error::{AuthzError, AuthzResult, ServiceError};
use crate::files::{AccessLevel, File, FileAccess};
use crate::membership::{resolve_membership, MembershipQuery};
use crate::store::{FileStore, NEW_AGGREGATE_VERSION};

const FILE_NOT_FOUND: &str = "file not found";

fn ensure_visible(file: &File, is_admin: bool) -> AuthzResult<()> {
    if file.is_deleted && !is_admin {
        return Err(AuthzError::not_found(FILE_NOT_FOUND));
    }
    Ok(())
}

/// File operations over a [`FileStore`] and a [`MembershipQuery`].
#[derive(Clone)]
pub struct FileService {
    store: Arc<FileStore>,
    membership: Arc<dyn MembershipQuery>,
    membership_timeout: Duration,
    max_retries: u32,
}

impl FileService {
    pub fn new(
        store: Arc<FileStore>,
        membership: Arc<dyn MembershipQuery>,
        membership_timeout: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            store,
            membership,
            membership_timeout,
            max_retries,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_file(
        &self,
        uploaded_by: Uuid,
        access_level: AccessLevel,
        channel_id: Option<Uuid>,
    ) -> Result<File, ServiceError> {
        let file = File::create(uploaded_by, access_level, channel_id)?;
        self.store.save(&file, NEW_AGGREGATE_VERSION).await?;

        info!(file_id = %file.id, %access_level, "File registered");
        Ok(file)
    }

    async fn load_visible(&self, file_id: Uuid, is_admin: bool) -> Result<File, ServiceError> {
        let file = self
            .store
            .load(file_id)
            .await?
            .ok_or_else(|| AuthzError::not_found(FILE_NOT_FOUND))?
            .value;
        ensure_visible(&file, is_admin)?;
        Ok(file)
    }

    /// Full file record, grants included. Only the uploader or an admin may
    /// read it.
    #[tracing::instrument(skip(self))]
    pub async fn get_file_for_manager(
        &self,
        file_id: Uuid,
        requester: Uuid,
        is_admin: bool,
    ) -> Result<File, ServiceError> {
        let file = self.load_visible(file_id, is_admin).await?;
        file.require_manager(requester, is_admin)?;
        Ok(file)
    }

    /// Decide read access, consulting channel membership only when the
    /// decision depends on it.
    #[tracing::instrument(skip(self))]
    pub async fn check_access(
        &self,
        file_id: Uuid,
        requester: Uuid,
        is_admin: bool,
    ) -> Result<bool, ServiceError> {
        let file = self.load_visible(file_id, is_admin).await?;

        let is_channel_member = match file.membership_channel(requester, is_admin) {
            Some(channel_id) => {
                resolve_membership(
                    &*self.membership,
                    channel_id,
                    requester,
                    self.membership_timeout,
                )
                .await
            }
            None => false,
        };

        let allowed = file.can_access(requester, is_admin, is_channel_member);
        tracing::debug!(%file_id, %requester, allowed, "Access decided");
        Ok(allowed)
    }

    #[tracing::instrument(skip(self))]
    pub async fn grant_access(
        &self,
        file_id: Uuid,
        user_id: Uuid,
        granted_by: Uuid,
        is_admin: bool,
    ) -> Result<FileAccess, ServiceError> {
        let (_, grant) = mutate(
            &*self.store,
            file_id,
            self.max_retries,
            FILE_NOT_FOUND,
            |file| {
                ensure_visible(file, is_admin)?;
                file.require_manager(granted_by, is_admin)?;
                file.grant_access(user_id, granted_by).cloned()
            },
        )
        .await?;

        info!(%file_id, %user_id, "File access granted");
        Ok(grant)
    }

    #[tracing::instrument(skip(self))]
    pub async fn revoke_access(
        &self,
        file_id: Uuid,
        user_id: Uuid,
        revoked_by: Uuid,
        is_admin: bool,
    ) -> Result<FileAccess, ServiceError> {
        let (_, grant) = mutate(
            &*self.store,
            file_id,
            self.max_retries,
            FILE_NOT_FOUND,
            |file| {
                ensure_visible(file, is_admin)?;
                file.require_manager(revoked_by, is_admin)?;
                file.revoke_access(user_id, revoked_by).cloned()
            },
        )
        .await?;

        info!(%file_id, %user_id, "File access revoked");
        Ok(grant)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_access_level(
        &self,
        file_id: Uuid,
        new_level: AccessLevel,
        changed_by: Uuid,
        is_admin: bool,
    ) -> Result<File, ServiceError> {
        let (file, cleared) = mutate(
            &*self.store,
            file_id,
            self.max_retries,
            FILE_NOT_FOUND,
            |file| {
                ensure_visible(file, is_admin)?;
                file.require_manager(changed_by, is_admin)?;
                file.update_access_level(new_level)
            },
        )
        .await?;

        info!(%file_id, level = %new_level, cleared_grants = cleared, "File access level changed");
        Ok(file)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_file(
        &self,
        file_id: Uuid,
        deleted_by: Uuid,
        is_admin: bool,
    ) -> Result<(), ServiceError> {
        mutate(
            &*self.store,
            file_id,
            self.max_retries,
            FILE_NOT_FOUND,
            |file| {
                ensure_visible(file, is_admin)?;
                file.delete(deleted_by, is_admin)
            },
        )
        .await?;

        info!(%file_id, "File deleted");
        Ok(())
    }
}
