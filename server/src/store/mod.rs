//! Aggregate Persistence
//!
//! Each aggregate (a channel with its members, a file with its grants) is
//! loaded and saved as a unit. Saves are compare-and-swap on the aggregate's
//! version so concurrent writers to the same aggregate are serialized.

pub mod memory;
pub mod postgres;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::channels::Channel;
use crate::files::File;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Version expected when saving an aggregate that has never been stored.
pub const NEW_AGGREGATE_VERSION: i64 = 0;

/// A consistency boundary persisted as one unit.
pub trait Aggregate: Clone + Send + Sync + 'static {
    fn id(&self) -> Uuid;
}

impl Aggregate for Channel {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Aggregate for File {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// An aggregate together with the version it was loaded at.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub value: T,
    pub version: i64,
}

/// Storage backend for one aggregate type.
pub trait AggregateStore<T: Aggregate>: Send + Sync {
    /// Load the aggregate, or `None` if it does not exist.
    fn load(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Versioned<T>>, StoreError>>;

    /// Persist the aggregate if its stored version still equals
    /// `expected_version`. Returns the new version.
    ///
    /// Use [`NEW_AGGREGATE_VERSION`] to insert.
    fn save<'a>(
        &'a self,
        aggregate: &'a T,
        expected_version: i64,
    ) -> BoxFuture<'a, Result<i64, StoreError>>;
}

pub type ChannelStore = dyn AggregateStore<Channel>;
pub type FileStore = dyn AggregateStore<File>;

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Another writer saved the aggregate first.
    #[error("Version conflict on {id}: expected version {expected}")]
    VersionConflict { id: Uuid, expected: i64 },

    /// Stored rows violate an aggregate invariant.
    #[error("Corrupt aggregate {id}: {reason}")]
    Corrupt { id: Uuid, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    #[must_use]
    pub const fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}
