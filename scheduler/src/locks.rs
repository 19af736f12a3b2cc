//! Per-key mutual exclusion for commits and clears.
//!
//! A commit locks every cell it writes and every (teacher/room, day, slot) it
//! books, re-checks availability while holding them, writes, then releases.
//! Two commits that touch a common key run one after the other, so both
//! cannot pass the availability check for the same resource. Keys are always
//! taken in sorted order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

use crate::model::{CellKey, ClassAssignment, Day, Resource, SlotId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    Cell(CellKey),
    Booking(Resource, Day, SlotId),
}

impl LockKey {
    /// The cell and every booking a row needs.
    pub fn for_row(row: &ClassAssignment) -> Vec<LockKey> {
        let mut keys = vec![LockKey::Cell(row.cell())];
        keys.extend(
            row.resources()
                .into_iter()
                .map(|resource| LockKey::Booking(resource, row.day, row.slot_id)),
        );
        keys
    }
}

/// Holds the locks until dropped.
#[derive(Debug)]
pub struct KeyGuard {
    keys: Vec<LockKey>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl KeyGuard {
    pub fn keys(&self) -> &[LockKey] {
        &self.keys
    }
}

#[derive(Debug, Default)]
pub struct KeyLocks {
    table: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until every key is held by the caller.
    pub async fn acquire(&self, keys: impl IntoIterator<Item = LockKey>) -> KeyGuard {
        let mut keys: Vec<LockKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries nobody holds or waits on only cost memory.
            table.retain(|_, mutex| Arc::strong_count(mutex) > 1);
            keys.iter()
                .map(|key| table.entry(key.clone()).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        trace!("holding {} routine locks", keys.len());

        KeyGuard {
            keys,
            _guards: guards,
        }
    }

    /// Number of keys currently tracked.
    pub fn tracked(&self) -> usize {
        self.table.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TeacherId;
    use std::time::Duration;

    fn booking(teacher: i32) -> LockKey {
        LockKey::Booking(Resource::Teacher(TeacherId(teacher)), Day::Sunday, SlotId(0))
    }

    #[tokio::test]
    async fn test_acquire_dedups_and_sorts() {
        let locks = KeyLocks::new();
        let guard = locks.acquire([booking(2), booking(1), booking(2)]).await;
        assert_eq!(guard.keys(), &[booking(1), booking(2)]);
    }

    #[tokio::test]
    async fn test_overlapping_keys_wait() {
        let locks = Arc::new(KeyLocks::new());
        let first = locks.acquire([booking(1), booking(2)]).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire([booking(2)]).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should get the lock once released")
            .unwrap();
    }

    #[tokio::test]
    async fn test_disjoint_keys_do_not_wait() {
        let locks = KeyLocks::new();
        let _first = locks.acquire([booking(1)]).await;
        let second = tokio::time::timeout(Duration::from_millis(200), locks.acquire([booking(3)])).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_released_keys_are_pruned() {
        let locks = KeyLocks::new();
        drop(locks.acquire([booking(1), booking(2)]).await);
        let _guard = locks.acquire([booking(3)]).await;
        assert_eq!(locks.tracked(), 1);
    }
}
