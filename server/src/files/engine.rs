//! File authorization engine.

use chrono::Utc;
use uuid::Uuid;

use super::models::{AccessLevel, File, FileAccess};
use crate::error::{AuthzError, AuthzResult};
use crate::ledger::Ledger;

impl File {
    /// Register a file uploaded by `uploaded_by`.
    pub fn create(
        uploaded_by: Uuid,
        access_level: AccessLevel,
        channel_id: Option<Uuid>,
    ) -> AuthzResult<Self> {
        require_channel_for(access_level, channel_id)?;
        Ok(Self {
            id: Uuid::now_v7(),
            access_level,
            uploaded_by,
            channel_id,
            is_deleted: false,
            grants: Ledger::new(),
        })
    }

    /// Decide whether `requester` may read this file.
    ///
    /// Channel membership must be resolved beforehand; see
    /// [`File::membership_channel`].
    #[must_use]
    pub fn can_access(&self, requester: Uuid, is_admin: bool, is_channel_member: bool) -> bool {
        if is_admin || requester == self.uploaded_by {
            return true;
        }

        match self.access_level {
            AccessLevel::Public => true,
            AccessLevel::Private => false,
            AccessLevel::ChannelMembers => is_channel_member,
            AccessLevel::Restricted => self.grants.is_active(requester),
        }
    }

    /// The channel whose membership decides access for `requester`, if any.
    ///
    /// `None` means [`File::can_access`] does not depend on membership.
    #[must_use]
    pub fn membership_channel(&self, requester: Uuid, is_admin: bool) -> Option<Uuid> {
        if is_admin || requester == self.uploaded_by {
            return None;
        }
        match self.access_level {
            AccessLevel::ChannelMembers => self.channel_id,
            _ => None,
        }
    }

    #[must_use]
    pub fn has_active_grant(&self, user_id: Uuid) -> bool {
        self.grants.is_active(user_id)
    }

    pub fn active_grants(&self) -> impl Iterator<Item = &FileAccess> {
        self.grants.iter_active()
    }

    /// Grant `user_id` access. Granting an existing active grant is a no-op.
    pub fn grant_access(&mut self, user_id: Uuid, granted_by: Uuid) -> AuthzResult<&FileAccess> {
        if self.access_level != AccessLevel::Restricted {
            return Err(AuthzError::conflict(format!(
                "grants require restricted access, file is {}",
                self.access_level
            )));
        }
        if self.grants.is_active(user_id) {
            return self
                .grants
                .active(user_id)
                .ok_or_else(|| AuthzError::not_found("grant disappeared"));
        }

        self.grants
            .append(FileAccess::new(self.id, user_id, granted_by))
            .map_err(|e| AuthzError::conflict(e.to_string()))
    }

    /// Revoke the active grant held by `user_id`.
    pub fn revoke_access(&mut self, user_id: Uuid, revoked_by: Uuid) -> AuthzResult<&FileAccess> {
        let now = Utc::now();
        self.grants
            .tombstone(user_id, |g| {
                g.is_revoked = true;
                g.revoked_at = Some(now);
                g.revoked_by = Some(revoked_by);
            })
            .ok_or_else(|| AuthzError::not_found("user has no active grant on this file"))
    }

    /// Switch the access level. Returns how many grant rows were dropped.
    ///
    /// Leaving `Restricted` drops every grant row, active or revoked, so a
    /// later switch back starts from an empty ledger.
    pub fn update_access_level(&mut self, new_level: AccessLevel) -> AuthzResult<usize> {
        require_channel_for(new_level, self.channel_id)?;

        let cleared = if self.access_level == AccessLevel::Restricted
            && new_level != AccessLevel::Restricted
        {
            self.grants.clear()
        } else {
            0
        };
        self.access_level = new_level;
        Ok(cleared)
    }

    /// Soft delete, allowed for the uploader or an admin.
    pub fn delete(&mut self, by: Uuid, is_admin: bool) -> AuthzResult<()> {
        if !is_admin && by != self.uploaded_by {
            return Err(AuthzError::not_authorized(
                "only the uploader can delete this file",
            ));
        }
        self.is_deleted = true;
        Ok(())
    }

    /// Grant management and level changes belong to the uploader or an admin.
    pub fn require_manager(&self, actor: Uuid, is_admin: bool) -> AuthzResult<()> {
        if is_admin || actor == self.uploaded_by {
            Ok(())
        } else {
            Err(AuthzError::not_authorized(
                "only the uploader can manage access to this file",
            ))
        }
    }
}

fn require_channel_for(level: AccessLevel, channel_id: Option<Uuid>) -> AuthzResult<()> {
    if level == AccessLevel::ChannelMembers && channel_id.is_none() {
        return Err(AuthzError::conflict(
            "channel_members access requires the file to belong to a channel",
        ));
    }
    Ok(())
}
