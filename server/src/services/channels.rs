//! Channel membership service.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use super::mutate;
use crate::channels::{Channel, ChannelType, Member, MemberRole};
use crate::error::{AuthzError, ServiceError};
use crate::store::{ChannelStore, NEW_AGGREGATE_VERSION};

const CHANNEL_NOT_FOUND: &str = "channel not found";

/// Channel operations over a [`ChannelStore`].
#[derive(Clone)]
pub struct ChannelService {
    store: Arc<ChannelStore>,
    max_retries: u32,
}

impl ChannelService {
    pub fn new(store: Arc<ChannelStore>, max_retries: u32) -> Self {
        Self { store, max_retries }
    }

    /// The underlying store, shared with the in-process membership query.
    #[must_use]
    pub fn store(&self) -> Arc<ChannelStore> {
        Arc::clone(&self.store)
    }

    #[tracing::instrument(skip(self, name, description))]
    pub async fn create_channel(
        &self,
        name: String,
        description: Option<String>,
        channel_type: ChannelType,
        created_by: Uuid,
    ) -> Result<Channel, ServiceError> {
        let channel = Channel::create(name, description, channel_type, created_by);
        self.store.save(&channel, NEW_AGGREGATE_VERSION).await?;

        info!(channel_id = %channel.id, "Channel created");
        Ok(channel)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_channel(&self, channel_id: Uuid) -> Result<Channel, ServiceError> {
        let channel = self
            .store
            .load(channel_id)
            .await?
            .ok_or_else(|| AuthzError::not_found(CHANNEL_NOT_FOUND))?;
        Ok(channel.value)
    }

    /// Load a channel on behalf of `requester`, hiding non-public channels
    /// from outsiders.
    #[tracing::instrument(skip(self))]
    pub async fn get_channel_for(
        &self,
        channel_id: Uuid,
        requester: Uuid,
        is_admin: bool,
    ) -> Result<Channel, ServiceError> {
        let channel = self.get_channel(channel_id).await?;
        if !channel.can_view(requester, is_admin) {
            return Err(AuthzError::not_authorized("not a member of this channel").into());
        }
        Ok(channel)
    }

    #[tracing::instrument(skip(self))]
    pub async fn add_member(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        added_by: Uuid,
        role: MemberRole,
    ) -> Result<Member, ServiceError> {
        let (_, member) = mutate(
            &*self.store,
            channel_id,
            self.max_retries,
            CHANNEL_NOT_FOUND,
            |channel| channel.add_member(user_id, added_by, role).cloned(),
        )
        .await?;

        info!(%channel_id, %user_id, %role, "Member added");
        Ok(member)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_member(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        removed_by: Uuid,
    ) -> Result<Member, ServiceError> {
        let (_, member) = mutate(
            &*self.store,
            channel_id,
            self.max_retries,
            CHANNEL_NOT_FOUND,
            |channel| channel.remove_member(user_id, removed_by).cloned(),
        )
        .await?;

        info!(%channel_id, %user_id, "Member removed");
        Ok(member)
    }

    #[tracing::instrument(skip(self))]
    pub async fn leave_channel(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
    ) -> Result<Member, ServiceError> {
        let (_, member) = mutate(
            &*self.store,
            channel_id,
            self.max_retries,
            CHANNEL_NOT_FOUND,
            |channel| channel.leave(user_id).cloned(),
        )
        .await?;

        info!(%channel_id, %user_id, "Member left");
        Ok(member)
    }

    #[tracing::instrument(skip(self))]
    pub async fn change_member_role(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        new_role: MemberRole,
        changed_by: Uuid,
    ) -> Result<Member, ServiceError> {
        let (_, member) = mutate(
            &*self.store,
            channel_id,
            self.max_retries,
            CHANNEL_NOT_FOUND,
            |channel| {
                channel
                    .change_member_role(user_id, new_role, changed_by)
                    .cloned()
            },
        )
        .await?;

        info!(%channel_id, %user_id, role = %new_role, "Member role changed");
        Ok(member)
    }

    #[tracing::instrument(skip(self))]
    pub async fn archive(&self, channel_id: Uuid, by: Uuid) -> Result<(), ServiceError> {
        mutate(
            &*self.store,
            channel_id,
            self.max_retries,
            CHANNEL_NOT_FOUND,
            |channel| channel.archive(by),
        )
        .await?;

        info!(%channel_id, "Channel archived");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn unarchive(&self, channel_id: Uuid, by: Uuid) -> Result<(), ServiceError> {
        mutate(
            &*self.store,
            channel_id,
            self.max_retries,
            CHANNEL_NOT_FOUND,
            |channel| channel.unarchive(by),
        )
        .await?;

        info!(%channel_id, "Channel unarchived");
        Ok(())
    }

    /// Unknown channels answer `false`.
    #[tracing::instrument(skip(self))]
    pub async fn is_member(&self, channel_id: Uuid, user_id: Uuid) -> Result<bool, ServiceError> {
        let channel = self.store.load(channel_id).await?;
        Ok(channel.is_some_and(|c| c.value.is_member(user_id)))
    }

    /// Role of `user_id` as seen by `requester`. Anyone may ask about
    /// themselves; asking about others follows [`Channel::can_view`].
    #[tracing::instrument(skip(self))]
    pub async fn member_role_for(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        requester: Uuid,
        is_admin: bool,
    ) -> Result<Option<MemberRole>, ServiceError> {
        let channel = self.get_channel(channel_id).await?;
        if requester != user_id && !channel.can_view(requester, is_admin) {
            return Err(AuthzError::not_authorized("not a member of this channel").into());
        }
        Ok(channel.member_role(user_id))
    }
}
