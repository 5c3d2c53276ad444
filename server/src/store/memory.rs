//! In-memory aggregate store.
//!
//! Backed by a `DashMap`; the compare-and-swap runs under the entry's shard
//! lock, so it is atomic with respect to other saves of the same aggregate.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{ready, BoxFuture, FutureExt};
use uuid::Uuid;

use super::{Aggregate, AggregateStore, StoreError, Versioned, NEW_AGGREGATE_VERSION};

/// Thread-safe in-memory store for one aggregate type.
pub struct MemoryStore<T> {
    entries: DashMap<Uuid, Versioned<T>>,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MemoryStore<T> {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Aggregate> MemoryStore<T> {
    fn compare_and_swap(&self, aggregate: &T, expected: i64) -> Result<i64, StoreError> {
        let id = aggregate.id();
        let conflict = StoreError::VersionConflict { id, expected };

        match self.entries.entry(id) {
            Entry::Occupied(mut entry) => {
                if entry.get().version != expected {
                    return Err(conflict);
                }
                let version = expected + 1;
                entry.insert(Versioned {
                    value: aggregate.clone(),
                    version,
                });
                Ok(version)
            }
            Entry::Vacant(entry) => {
                if expected != NEW_AGGREGATE_VERSION {
                    return Err(conflict);
                }
                entry.insert(Versioned {
                    value: aggregate.clone(),
                    version: 1,
                });
                Ok(1)
            }
        }
    }
}

impl<T: Aggregate> AggregateStore<T> for MemoryStore<T> {
    fn load(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Versioned<T>>, StoreError>> {
        let found = self.entries.get(&id).map(|entry| entry.value().clone());
        ready(Ok(found)).boxed()
    }

    fn save<'a>(
        &'a self,
        aggregate: &'a T,
        expected_version: i64,
    ) -> BoxFuture<'a, Result<i64, StoreError>> {
        ready(self.compare_and_swap(aggregate, expected_version)).boxed()
    }
}
