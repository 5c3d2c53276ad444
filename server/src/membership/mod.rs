//! Cross-Service Membership Query
//!
//! The only coupling between file and channel authorization: "is this user an
//! active member of this channel?". Answered in-process from the channel
//! ledger ([`LedgerMembershipQuery`]) or by a remote membership service
//! ([`HttpMembershipQuery`]).
//!
//! Callers go through [`resolve_membership`], which bounds the query with a
//! timeout and treats every inconclusive outcome as "not a member".

pub mod ledger;
pub mod remote;

use std::time::Duration;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::store::StoreError;

pub use ledger::LedgerMembershipQuery;
pub use remote::HttpMembershipQuery;

/// Membership lookup capability injected into the file service.
pub trait MembershipQuery: Send + Sync {
    /// Whether `user_id` is an active member of `channel_id`.
    ///
    /// Unknown channels answer `Ok(false)`.
    fn is_active_member(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'_, Result<bool, MembershipQueryError>>;
}

/// Failure to obtain a membership answer.
#[derive(Debug, thiserror::Error)]
pub enum MembershipQueryError {
    #[error("Membership service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Membership service returned status {0}")]
    Status(u16),

    #[error("Membership lookup failed: {0}")]
    Store(#[from] StoreError),
}

/// Resolve membership with a deadline, failing closed.
///
/// Errors and timeouts both yield `false`; a file must never be served on an
/// inconclusive check.
#[tracing::instrument(skip(query))]
pub async fn resolve_membership(
    query: &dyn MembershipQuery,
    channel_id: Uuid,
    user_id: Uuid,
    timeout: Duration,
) -> bool {
    match tokio::time::timeout(timeout, query.is_active_member(channel_id, user_id)).await {
        Ok(Ok(is_member)) => is_member,
        Ok(Err(e)) => {
            tracing::warn!(
                error = %e,
                %channel_id,
                %user_id,
                "Membership query failed, denying"
            );
            false
        }
        Err(_) => {
            tracing::warn!(
                %channel_id,
                %user_id,
                timeout_ms = timeout.as_millis() as u64,
                "Membership query timed out, denying"
            );
            false
        }
    }
}
