//! In-memory index over the snack log.

use super::log::{EntryKind, LogEntry};
use crate::types::{SnackId, UserId};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

/// Where the latest state of a snack lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub owner: UserId,
    pub offset: u64,
}

/// Index mapping snack ids to log offsets, and owners to their snacks.
///
/// Not persisted: rebuilt by replaying the log when the store opens.
#[derive(Default)]
pub struct SnackIndex {
    /// Snack ID to latest entry.
    by_id: RwLock<HashMap<SnackId, IndexEntry>>,

    /// Owner to live snack IDs.
    by_owner: RwLock<HashMap<UserId, BTreeSet<SnackId>>>,
}

impl SnackIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a log entry found at `offset`.
    pub fn apply(&self, entry: &LogEntry, offset: u64) {
        match entry.kind {
            EntryKind::Put => self.put(entry.snack.id, entry.snack.owner, offset),
            EntryKind::Delete => {
                self.remove(entry.snack.id);
            }
        }
    }

    /// Point a snack at its latest offset.
    pub fn put(&self, id: SnackId, owner: UserId, offset: u64) {
        let previous = self
            .by_id
            .write()
            .insert(id, IndexEntry { owner, offset });

        let mut by_owner = self.by_owner.write();
        if let Some(previous) = previous {
            if previous.owner != owner {
                if let Some(ids) = by_owner.get_mut(&previous.owner) {
                    ids.remove(&id);
                }
            }
        }
        by_owner.entry(owner).or_default().insert(id);
    }

    /// Drop a snack from the index.
    pub fn remove(&self, id: SnackId) -> Option<IndexEntry> {
        let removed = self.by_id.write().remove(&id)?;

        let mut by_owner = self.by_owner.write();
        if let Some(ids) = by_owner.get_mut(&removed.owner) {
            ids.remove(&id);
            if ids.is_empty() {
                by_owner.remove(&removed.owner);
            }
        }

        Some(removed)
    }

    /// Get the latest entry for a snack.
    pub fn get(&self, id: SnackId) -> Option<IndexEntry> {
        self.by_id.read().get(&id).copied()
    }

    /// Get the entry for a snack only if `owner` owns it.
    pub fn get_owned(&self, owner: UserId, id: SnackId) -> Option<IndexEntry> {
        self.get(id).filter(|entry| entry.owner == owner)
    }

    /// Live snack IDs for an owner, ascending.
    pub fn ids_for_owner(&self, owner: UserId) -> Vec<SnackId> {
        self.by_owner
            .read()
            .get(&owner)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Get count of live snacks.
    pub fn count(&self) -> usize {
        self.by_id.read().len()
    }

    /// Get count of owners with at least one live snack.
    pub fn owner_count(&self) -> usize {
        self.by_owner.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Snack, Timestamp};

    fn entry(kind: EntryKind, id: u64, owner: u64) -> LogEntry {
        LogEntry {
            kind,
            snack: Snack {
                id: SnackId(id),
                owner: UserId(owner),
                name: "apple".into(),
                description: String::new(),
                created_at: Timestamp(id as i64),
                on_diet: true,
            },
        }
    }

    #[test]
    fn test_put_and_lookup() {
        let index = SnackIndex::new();
        index.put(SnackId(1), UserId(7), 0);

        assert_eq!(index.get(SnackId(1)).unwrap().offset, 0);
        assert!(index.get_owned(UserId(7), SnackId(1)).is_some());
        assert!(index.get_owned(UserId(8), SnackId(1)).is_none());
    }

    #[test]
    fn test_latest_put_wins() {
        let index = SnackIndex::new();
        index.apply(&entry(EntryKind::Put, 1, 7), 0);
        index.apply(&entry(EntryKind::Put, 1, 7), 120);

        assert_eq!(index.get(SnackId(1)).unwrap().offset, 120);
        assert_eq!(index.ids_for_owner(UserId(7)), vec![SnackId(1)]);
        assert_eq!(index.count(), 1);
    }

    #[test]
    fn test_delete_removes_from_owner() {
        let index = SnackIndex::new();
        index.apply(&entry(EntryKind::Put, 1, 7), 0);
        index.apply(&entry(EntryKind::Put, 2, 7), 100);
        index.apply(&entry(EntryKind::Put, 3, 9), 200);
        index.apply(&entry(EntryKind::Delete, 1, 7), 300);

        assert!(index.get(SnackId(1)).is_none());
        assert_eq!(index.ids_for_owner(UserId(7)), vec![SnackId(2)]);
        assert_eq!(index.owner_count(), 2);

        index.apply(&entry(EntryKind::Delete, 2, 7), 400);
        assert!(index.ids_for_owner(UserId(7)).is_empty());
        assert_eq!(index.owner_count(), 1);
    }

    #[test]
    fn test_owners_are_isolated() {
        let index = SnackIndex::new();
        for id in 1..=6 {
            index.put(SnackId(id), UserId(id % 2), id * 10);
        }

        assert_eq!(
            index.ids_for_owner(UserId(1)),
            vec![SnackId(1), SnackId(3), SnackId(5)]
        );
        assert!(index.ids_for_owner(UserId(42)).is_empty());
    }
}
