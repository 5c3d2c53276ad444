//! Tombstoned Record Ledger
//!
//! An append-mostly arena of per-user records belonging to one resource.
//! Records are never removed by the domain logic; they are tombstoned and
//! drop out of the active index. The index guarantees at most one active
//! record per user and O(1) lookups.

use std::collections::HashMap;

use uuid::Uuid;

/// A record that can live in a [`Ledger`].
pub trait LedgerRecord {
    /// The user this record belongs to.
    fn user_id(&self) -> Uuid;

    /// Whether the record is active (not tombstoned).
    fn is_active(&self) -> bool;
}

/// A second active record for a user that already has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("duplicate active record for user {user_id}")]
pub struct DuplicateActiveRecord {
    pub user_id: Uuid,
}

/// Indexed arena of tombstoned records keyed by user id.
#[derive(Debug, Clone)]
pub struct Ledger<R> {
    records: Vec<R>,
    /// user id -> position of the active record in `records`
    active: HashMap<Uuid, usize>,
}

impl<R> Default for Ledger<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            active: HashMap::new(),
        }
    }
}

impl<R: LedgerRecord> Ledger<R> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger holding a single record.
    pub fn with_record(record: R) -> Self {
        let mut active = HashMap::new();
        if record.is_active() {
            active.insert(record.user_id(), 0);
        }
        Self {
            records: vec![record],
            active,
        }
    }

    /// Rebuild a ledger from persisted records, in append order.
    pub fn from_records(records: Vec<R>) -> Result<Self, DuplicateActiveRecord> {
        let mut active = HashMap::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            if record.is_active() && active.insert(record.user_id(), idx).is_some() {
                return Err(DuplicateActiveRecord {
                    user_id: record.user_id(),
                });
            }
        }
        Ok(Self { records, active })
    }

    /// The active record for `user_id`, if any.
    #[must_use]
    pub fn active(&self, user_id: Uuid) -> Option<&R> {
        self.active.get(&user_id).map(|&idx| &self.records[idx])
    }

    /// Mutable access to the active record for `user_id`.
    ///
    /// The closure must not tombstone the record; use [`Ledger::tombstone`].
    pub fn update_active<T>(&mut self, user_id: Uuid, f: impl FnOnce(&mut R) -> T) -> Option<T> {
        let idx = *self.active.get(&user_id)?;
        let out = f(&mut self.records[idx]);
        debug_assert!(self.records[idx].is_active(), "update_active tombstoned a record");
        Some(out)
    }

    #[must_use]
    pub fn is_active(&self, user_id: Uuid) -> bool {
        self.active.contains_key(&user_id)
    }

    /// Append a new active record.
    pub fn append(&mut self, record: R) -> Result<&R, DuplicateActiveRecord> {
        let user_id = record.user_id();
        if self.active.contains_key(&user_id) {
            return Err(DuplicateActiveRecord { user_id });
        }
        let idx = self.records.len();
        self.records.push(record);
        if self.records[idx].is_active() {
            self.active.insert(user_id, idx);
        }
        Ok(&self.records[idx])
    }

    /// Tombstone the active record for `user_id` by applying `mark`.
    ///
    /// Returns the tombstoned record, or `None` if the user had no active record.
    pub fn tombstone(&mut self, user_id: Uuid, mark: impl FnOnce(&mut R)) -> Option<&R> {
        let idx = self.active.remove(&user_id)?;
        let record = &mut self.records[idx];
        mark(record);
        debug_assert!(!record.is_active(), "tombstone left the record active");
        Some(&*record)
    }

    /// Drop every record, active or not.
    pub fn clear(&mut self) -> usize {
        let dropped = self.records.len();
        self.records.clear();
        self.active.clear();
        dropped
    }

    /// All records in append order, tombstones included.
    #[must_use]
    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn iter_active(&self) -> impl Iterator<Item = &R> {
        self.records.iter().filter(|r| r.is_active())
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn into_records(self) -> Vec<R> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Row {
        user_id: Uuid,
        removed: bool,
    }

    impl LedgerRecord for Row {
        fn user_id(&self) -> Uuid {
            self.user_id
        }

        fn is_active(&self) -> bool {
            !self.removed
        }
    }

    fn row(user_id: Uuid) -> Row {
        Row {
            user_id,
            removed: false,
        }
    }

    #[test]
    fn test_append_rejects_second_active_record() {
        let user = Uuid::new_v4();
        let mut ledger = Ledger::new();
        ledger.append(row(user)).unwrap();

        let err = ledger.append(row(user)).unwrap_err();
        assert_eq!(err.user_id, user);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_tombstone_then_append_keeps_history() {
        let user = Uuid::new_v4();
        let mut ledger = Ledger::new();
        ledger.append(row(user)).unwrap();

        let tombstoned = ledger.tombstone(user, |r| r.removed = true).unwrap();
        assert!(tombstoned.removed);
        assert!(!ledger.is_active(user));

        ledger.append(row(user)).unwrap();
        assert!(ledger.is_active(user));
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.active_count(), 1);
        assert!(ledger.records()[0].removed);
    }

    #[test]
    fn test_tombstone_unknown_user_is_none() {
        let mut ledger: Ledger<Row> = Ledger::new();
        assert!(ledger.tombstone(Uuid::new_v4(), |r| r.removed = true).is_none());
    }

    #[test]
    fn test_from_records_rebuilds_index() {
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let ledger = Ledger::from_records(vec![
            Row {
                user_id: user,
                removed: true,
            },
            row(user),
            row(other),
        ])
        .unwrap();

        assert_eq!(ledger.active_count(), 2);
        assert!(ledger.active(user).is_some_and(|r| !r.removed));
    }

    #[test]
    fn test_from_records_rejects_duplicate_active() {
        let user = Uuid::new_v4();
        let result = Ledger::from_records(vec![row(user), row(user)]);
        assert_eq!(result.unwrap_err(), DuplicateActiveRecord { user_id: user });
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut ledger = Ledger::new();
        ledger.append(row(Uuid::new_v4())).unwrap();
        ledger.append(row(Uuid::new_v4())).unwrap();

        assert_eq!(ledger.clear(), 2);
        assert!(ledger.is_empty());
        assert_eq!(ledger.active_count(), 0);
    }
}
