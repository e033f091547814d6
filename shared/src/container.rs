//! Mutual exclusion over shared inventories
//!
//! A chest can be open for at most one participant at a time. The server owns
//! the authoritative table; clients keep a mirror fed by `ChestAccess` replies
//! so they can show which chests are occupied.

use crate::protocol::{ChestOutcome, InventoryId, PlayerId};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerLock {
    holder: Option<PlayerId>,
}

impl ContainerLock {
    pub fn holder(&self) -> Option<PlayerId> {
        self.holder
    }

    pub fn is_open(&self) -> bool {
        self.holder.is_some()
    }
}

#[derive(Debug, Default)]
pub struct ContainerLockTable {
    locks: HashMap<InventoryId, ContainerLock>,
}

impl ContainerLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants the lock if it is free or already held by `player`.
    pub fn request_open(&mut self, chest: InventoryId, player: PlayerId) -> ChestOutcome {
        let lock = self.locks.entry(chest).or_default();
        match lock.holder {
            None => {
                lock.holder = Some(player);
                ChestOutcome::Opened
            }
            Some(holder) if holder == player => ChestOutcome::Opened,
            Some(_) => ChestOutcome::Denied,
        }
    }

    /// Releases the lock if `player` holds it. Returns `None` for a no-op.
    pub fn request_close(&mut self, chest: InventoryId, player: PlayerId) -> Option<ChestOutcome> {
        let lock = self.locks.entry(chest).or_default();
        if lock.holder == Some(player) {
            lock.holder = None;
            Some(ChestOutcome::Closed)
        } else {
            None
        }
    }

    /// Releases every lock held by `player`, returning the affected chests.
    pub fn release_all(&mut self, player: PlayerId) -> Vec<InventoryId> {
        let mut released: Vec<InventoryId> = self
            .locks
            .iter_mut()
            .filter(|(_, lock)| lock.holder == Some(player))
            .map(|(chest, lock)| {
                lock.holder = None;
                *chest
            })
            .collect();
        released.sort_unstable();
        released
    }

    pub fn holder(&self, chest: InventoryId) -> Option<PlayerId> {
        self.locks.get(&chest).and_then(ContainerLock::holder)
    }

    pub fn is_open(&self, chest: InventoryId) -> bool {
        self.holder(chest).is_some()
    }

    /// Overwrites the holder without arbitration. Used by client mirrors.
    pub fn set_holder(&mut self, chest: InventoryId, holder: Option<PlayerId>) {
        self.locks.entry(chest).or_default().holder = holder;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_requester_wins() {
        let mut table = ContainerLockTable::new();
        assert_eq!(table.request_open(10, 1), ChestOutcome::Opened);
        assert_eq!(table.request_open(10, 2), ChestOutcome::Denied);
        assert_eq!(table.holder(10), Some(1));
        assert!(table.is_open(10));
    }

    #[test]
    fn test_reopen_by_holder_is_granted() {
        let mut table = ContainerLockTable::new();
        table.request_open(10, 1);
        assert_eq!(table.request_open(10, 1), ChestOutcome::Opened);
        assert_eq!(table.holder(10), Some(1));
    }

    #[test]
    fn test_close_by_non_holder_is_noop() {
        let mut table = ContainerLockTable::new();
        table.request_open(10, 1);
        assert_eq!(table.request_close(10, 2), None);
        assert_eq!(table.holder(10), Some(1));

        assert_eq!(table.request_close(10, 1), Some(ChestOutcome::Closed));
        assert_eq!(table.holder(10), None);
        assert!(!table.is_open(10));
    }

    #[test]
    fn test_close_of_untouched_chest_is_noop() {
        let mut table = ContainerLockTable::new();
        assert_eq!(table.request_close(42, 1), None);
        assert!(!table.is_open(42));
    }

    #[test]
    fn test_release_all() {
        let mut table = ContainerLockTable::new();
        table.request_open(12, 1);
        table.request_open(10, 1);
        table.request_open(11, 2);

        assert_eq!(table.release_all(1), vec![10, 12]);
        assert!(!table.is_open(10));
        assert!(!table.is_open(12));
        assert_eq!(table.holder(11), Some(2));
        assert!(table.release_all(1).is_empty());

        assert_eq!(table.request_open(10, 2), ChestOutcome::Opened);
    }
}
