//! Authorization Services
//!
//! Compose the engines with persistence: load one aggregate, let the engine
//! validate and apply the mutation, then save it back with a version
//! compare-and-swap. A lost race reloads and re-validates from scratch.

pub mod channels;
pub mod files;

pub use channels::ChannelService;
pub use files::FileService;

use uuid::Uuid;

use crate::error::{AuthzError, AuthzResult, ServiceError};
use crate::store::{Aggregate, AggregateStore, Versioned};

/// Load, apply `op`, and save the aggregate `id`, retrying on version conflicts.
///
/// `op` may run more than once and must only touch the aggregate it is given.
pub(crate) async fn mutate<T, R, F>(
    store: &dyn AggregateStore<T>,
    id: Uuid,
    max_retries: u32,
    missing: &'static str,
    mut op: F,
) -> Result<(T, R), ServiceError>
where
    T: Aggregate,
    F: FnMut(&mut T) -> AuthzResult<R>,
{
    let mut attempt = 0;
    loop {
        let Versioned { mut value, version } = store
            .load(id)
            .await?
            .ok_or_else(|| AuthzError::not_found(missing))?;

        let out = op(&mut value).inspect_err(|e| {
            tracing::debug!(aggregate_id = %id, reason = %e, "Operation rejected");
        })?;

        match store.save(&value, version).await {
            Ok(_) => return Ok((value, out)),
            Err(e) if e.is_version_conflict() && attempt < max_retries => {
                attempt += 1;
                tracing::debug!(aggregate_id = %id, attempt, "Version conflict, retrying");
            }
            Err(e) if e.is_version_conflict() => {
                tracing::warn!(aggregate_id = %id, attempts = attempt + 1, "Giving up after repeated version conflicts");
                return Err(ServiceError::Contention(id));
            }
            Err(e) => return Err(e.into()),
        }
    }
}
