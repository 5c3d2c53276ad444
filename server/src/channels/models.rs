//! Channel and membership models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::ledger::{Ledger, LedgerRecord};

/// Channel type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "channel_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Public,
    Private,
    DirectMessage,
}

/// Role of an active channel member.
///
/// A closed set; what each role may do lives in [`super::rules`], not in an
/// ordering between variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Member,
    Moderator,
    Owner,
}

impl MemberRole {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Moderator => "moderator",
            Self::Owner => "owner",
        }
    }
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Membership record. Removal tombstones the row; it is never deleted.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Member {
    /// Record id (one user may own several records over time).
    pub id: Uuid,
    pub channel_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    pub added_by: Uuid,
    pub joined_at: DateTime<Utc>,
    pub is_removed: bool,
    pub removed_at: Option<DateTime<Utc>>,
    pub removed_by: Option<Uuid>,
}

impl Member {
    pub(crate) fn new(channel_id: Uuid, user_id: Uuid, role: MemberRole, added_by: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            channel_id,
            user_id,
            role,
            added_by,
            joined_at: Utc::now(),
            is_removed: false,
            removed_at: None,
            removed_by: None,
        }
    }
}

impl LedgerRecord for Member {
    fn user_id(&self) -> Uuid {
        self.user_id
    }

    fn is_active(&self) -> bool {
        !self.is_removed
    }
}

/// Channel aggregate: the channel and its full membership ledger.
///
/// Invariant: from creation onward at least one active member holds
/// [`MemberRole::Owner`].
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub channel_type: ChannelType,
    pub is_archived: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub(crate) members: Ledger<Member>,
}

impl Channel {
    /// The membership ledger, tombstones included.
    #[must_use]
    pub const fn members(&self) -> &Ledger<Member> {
        &self.members
    }
}
