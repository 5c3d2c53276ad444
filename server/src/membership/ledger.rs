//! In-process membership lookup against the channel store.

use std::sync::Arc;

use futures::future::BoxFuture;
use uuid::Uuid;

use super::{MembershipQuery, MembershipQueryError};
use crate::store::ChannelStore;

/// Answers membership by loading the channel aggregate directly.
#[derive(Clone)]
pub struct LedgerMembershipQuery {
    channels: Arc<ChannelStore>,
}

impl LedgerMembershipQuery {
    pub fn new(channels: Arc<ChannelStore>) -> Self {
        Self { channels }
    }
}

impl MembershipQuery for LedgerMembershipQuery {
    fn is_active_member(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'_, Result<bool, MembershipQueryError>> {
        Box::pin(async move {
            let channel = self.channels.load(channel_id).await?;
            Ok(channel.is_some_and(|c| c.value.is_member(user_id)))
        })
    }
}
