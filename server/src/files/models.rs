//! File and access-grant models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::ledger::{Ledger, LedgerRecord};

/// Per-file policy selecting who may read it without an explicit grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "file_access_level", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Uploader (and admins) only.
    Private,
    /// Anyone.
    Public,
    /// Active members of the file's channel.
    ChannelMembers,
    /// Users holding an active grant.
    Restricted,
}

impl AccessLevel {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
            Self::ChannelMembers => "channel_members",
            Self::Restricted => "restricted",
        }
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit access grant on a restricted file. Revocation tombstones the row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct FileAccess {
    pub id: Uuid,
    pub file_id: Uuid,
    pub user_id: Uuid,
    pub granted_by: Uuid,
    pub granted_at: DateTime<Utc>,
    pub is_revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<Uuid>,
}

impl FileAccess {
    pub(crate) fn new(file_id: Uuid, user_id: Uuid, granted_by: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            file_id,
            user_id,
            granted_by,
            granted_at: Utc::now(),
            is_revoked: false,
            revoked_at: None,
            revoked_by: None,
        }
    }
}

impl LedgerRecord for FileAccess {
    fn user_id(&self) -> Uuid {
        self.user_id
    }

    fn is_active(&self) -> bool {
        !self.is_revoked
    }
}

/// File aggregate: authorization metadata plus its grant ledger.
///
/// Invariants: `ChannelMembers` requires `channel_id`; grants exist only
/// while the level is `Restricted`.
#[derive(Debug, Clone)]
pub struct File {
    pub id: Uuid,
    pub access_level: AccessLevel,
    pub uploaded_by: Uuid,
    pub channel_id: Option<Uuid>,
    pub is_deleted: bool,
    pub(crate) grants: Ledger<FileAccess>,
}

impl File {
    /// The grant ledger, revoked grants included.
    #[must_use]
    pub const fn grants(&self) -> &Ledger<FileAccess> {
        &self.grants
    }
}
