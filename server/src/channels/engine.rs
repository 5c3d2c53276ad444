//! Channel authorization engine.
//!
//! Every operation validates the actor's standing against the membership
//! ledger and checks the owner invariant before touching any record, so a
//! rejected call leaves the aggregate unchanged.

use chrono::Utc;
use uuid::Uuid;

use super::models::{Channel, ChannelType, Member, MemberRole};
use super::rules;
use crate::error::{AuthzError, AuthzResult};
use crate::ledger::Ledger;

impl Channel {
    /// Create a channel with `created_by` as its first Owner.
    pub fn create(
        name: impl Into<String>,
        description: Option<String>,
        channel_type: ChannelType,
        created_by: Uuid,
    ) -> Self {
        let id = Uuid::now_v7();
        let creator = Member::new(id, created_by, MemberRole::Owner, created_by);
        let members = Ledger::with_record(creator);

        Self {
            id,
            name: name.into(),
            description,
            channel_type,
            is_archived: false,
            created_by,
            created_at: Utc::now(),
            members,
        }
    }

    #[must_use]
    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.members.is_active(user_id)
    }

    #[must_use]
    pub fn member_role(&self, user_id: Uuid) -> Option<MemberRole> {
        self.members.active(user_id).map(|m| m.role)
    }

    /// Public channels are readable by anyone; others only by active members
    /// and platform admins.
    #[must_use]
    pub fn can_view(&self, requester: Uuid, is_admin: bool) -> bool {
        is_admin || self.channel_type == ChannelType::Public || self.is_member(requester)
    }

    #[must_use]
    pub fn active_owner_count(&self) -> usize {
        self.members
            .iter_active()
            .filter(|m| m.role == MemberRole::Owner)
            .count()
    }

    pub fn active_members(&self) -> impl Iterator<Item = &Member> {
        self.members.iter_active()
    }

    /// Add `user_id` with `role`, acting as `added_by`.
    pub fn add_member(
        &mut self,
        user_id: Uuid,
        added_by: Uuid,
        role: MemberRole,
    ) -> AuthzResult<&Member> {
        let actor = self.actor_role(added_by)?;
        if !matches!(actor, MemberRole::Owner | MemberRole::Moderator) {
            return Err(AuthzError::not_authorized(
                "only owners and moderators can add members",
            ));
        }
        if self.is_archived {
            return Err(AuthzError::conflict("channel is archived"));
        }
        if !rules::may_add(actor, role) {
            return Err(AuthzError::not_authorized(format!(
                "a {actor} cannot add a member as {role}"
            )));
        }
        if self.members.is_active(user_id) {
            return Err(AuthzError::conflict("user is already a member"));
        }

        self.members
            .append(Member::new(self.id, user_id, role, added_by))
            .map_err(|e| AuthzError::conflict(e.to_string()))
    }

    /// Remove `user_id`, acting as `removed_by`.
    pub fn remove_member(&mut self, user_id: Uuid, removed_by: Uuid) -> AuthzResult<&Member> {
        let target = self
            .member_role(user_id)
            .ok_or_else(|| AuthzError::not_found("user is not a member of this channel"))?;
        let actor = self.actor_role(removed_by)?;

        self.guard_last_owner(target)?;
        if !rules::may_remove(actor, target) {
            return Err(AuthzError::not_authorized(format!(
                "a {actor} cannot remove a {target}"
            )));
        }

        self.tombstone(user_id, removed_by)
    }

    /// Remove `user_id` on their own behalf.
    pub fn leave(&mut self, user_id: Uuid) -> AuthzResult<&Member> {
        let role = self
            .member_role(user_id)
            .ok_or_else(|| AuthzError::not_found("user is not a member of this channel"))?;
        self.guard_last_owner(role)?;

        self.tombstone(user_id, user_id)
    }

    /// Change the role of `user_id`, acting as `changed_by`.
    pub fn change_member_role(
        &mut self,
        user_id: Uuid,
        new_role: MemberRole,
        changed_by: Uuid,
    ) -> AuthzResult<&Member> {
        let actor = self.actor_role(changed_by)?;
        if !rules::may_change_role(actor) {
            return Err(AuthzError::not_authorized("only owners can change roles"));
        }
        if self.is_archived {
            return Err(AuthzError::conflict("channel is archived"));
        }
        let current = self
            .member_role(user_id)
            .ok_or_else(|| AuthzError::not_found("user is not a member of this channel"))?;
        if new_role != MemberRole::Owner {
            self.guard_last_owner(current)?;
        }

        self.members.update_active(user_id, |m| m.role = new_role);
        self.members
            .active(user_id)
            .ok_or_else(|| AuthzError::not_found("user is not a member of this channel"))
    }

    pub fn archive(&mut self, by: Uuid) -> AuthzResult<()> {
        self.require_archive_rights(by)?;
        self.is_archived = true;
        Ok(())
    }

    pub fn unarchive(&mut self, by: Uuid) -> AuthzResult<()> {
        self.require_archive_rights(by)?;
        self.is_archived = false;
        Ok(())
    }

    fn require_archive_rights(&self, by: Uuid) -> AuthzResult<()> {
        let actor = self.actor_role(by)?;
        if rules::may_archive(actor) {
            Ok(())
        } else {
            Err(AuthzError::not_authorized(
                "only owners can archive or unarchive",
            ))
        }
    }

    /// Role of an acting user, who must be an active member.
    fn actor_role(&self, actor: Uuid) -> AuthzResult<MemberRole> {
        self.member_role(actor)
            .ok_or_else(|| AuthzError::not_authorized("actor is not a member of this channel"))
    }

    /// Reject losing a role of `role` if it would leave no active Owner.
    fn guard_last_owner(&self, role: MemberRole) -> AuthzResult<()> {
        if role == MemberRole::Owner && self.active_owner_count() <= 1 {
            return Err(AuthzError::conflict(
                "channel must retain at least one owner",
            ));
        }
        Ok(())
    }

    fn tombstone(&mut self, user_id: Uuid, removed_by: Uuid) -> AuthzResult<&Member> {
        let now = Utc::now();
        self.members
            .tombstone(user_id, |m| {
                m.is_removed = true;
                m.removed_at = Some(now);
                m.removed_by = Some(removed_by);
            })
            .ok_or_else(|| AuthzError::not_found("user is not a member of this channel"))
    }
}
