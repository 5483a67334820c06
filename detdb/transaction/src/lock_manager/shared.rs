use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace, warn};

use super::queue::{LockQueue, WaitTable};
use super::{LockKey, LockManager, LockMode, LockRequest, LockStatus, TxnHandle};
use crate::error::{LockError, LockResult};
use crate::ready_queue::ReadyQueue;

/// Lock manager with shared locks for reads and exclusive locks for writes.
///
/// A shared request is admitted next to the current shared holders only while
/// no exclusive request is queued on the key. Once a writer is queued, later
/// readers wait behind it, so a stream of readers cannot starve a writer.
pub struct SharedLockManager<K: LockKey, T: TxnHandle> {
    lock_table: DashMap<K, LockQueue<T>>,
    txn_waits: WaitTable<T>,
    ready_txns: Arc<ReadyQueue<T>>,
}

impl<K: LockKey, T: TxnHandle> SharedLockManager<K, T> {
    pub fn new(ready_txns: Arc<ReadyQueue<T>>) -> Self {
        Self {
            lock_table: DashMap::new(),
            txn_waits: WaitTable::default(),
            ready_txns,
        }
    }

    /// Number of exclusive requests, held or waiting, queued on `key`.
    pub fn exclusive_waiting(&self, key: &K) -> usize {
        self.lock_table
            .get(key)
            .map_or(0, |queue| queue.exclusive_waiting())
    }

    fn add_lock(&self, mode: LockMode, txn: &T, key: &K) -> bool {
        let mut queue = self.lock_table.entry(key.clone()).or_default();
        let granted = match queue.mode() {
            LockMode::Unlocked => true,
            _ => mode == LockMode::Shared && queue.exclusive_waiting() == 0,
        };
        queue.push(LockRequest::new(mode, txn.clone()), granted);
        if !granted {
            self.txn_waits.increment(txn);
        }
        trace!(?txn, ?key, ?mode, granted, "lock requested");
        granted
    }
}

impl<K: LockKey, T: TxnHandle> LockManager<K, T> for SharedLockManager<K, T> {
    fn write_lock(&self, txn: &T, key: &K) -> bool {
        self.add_lock(LockMode::Exclusive, txn, key)
    }

    fn read_lock(&self, txn: &T, key: &K) -> bool {
        self.add_lock(LockMode::Shared, txn, key)
    }

    fn release(&self, txn: &T, key: &K) -> LockResult<()> {
        let not_queued = || {
            warn!(?txn, ?key, "release of a lock that was never requested");
            LockError::NotQueued {
                txn: format!("{txn:?}"),
                key: format!("{key:?}"),
            }
        };
        let mut queue = self.lock_table.get_mut(key).ok_or_else(not_queued)?;
        let (_, removed) = queue.remove(txn).ok_or_else(not_queued)?;
        if !removed.granted {
            // The transaction gave up on a lock it was still waiting for.
            // Reaching zero here does not make it ready: it withdrew, so the
            // entry is only dropped.
            self.txn_waits.decrement(txn);
        }

        // Owners that were granted earlier are not waiting on this key and are
        // skipped; only requests that just became owners count down.
        for owner in queue.owners_mut().filter(|owner| !owner.granted) {
            owner.granted = true;
            let owner_txn = owner.request.txn();
            if self.txn_waits.decrement(owner_txn) {
                debug!(txn = ?owner_txn, ?key, "transaction ready");
                self.ready_txns.push(owner_txn.clone());
            }
        }
        Ok(())
    }

    fn status(&self, key: &K) -> LockStatus<T> {
        self.lock_table
            .get(key)
            .map_or_else(LockStatus::unlocked, |queue| queue.status())
    }

    fn wait_count(&self, txn: &T) -> Option<usize> {
        self.txn_waits.get(txn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (SharedLockManager<&'static str, char>, Arc<ReadyQueue<char>>) {
        let ready = Arc::new(ReadyQueue::new());
        (SharedLockManager::new(ready.clone()), ready)
    }

    #[test]
    fn test_writer_blocks_later_readers() {
        let (lm, ready) = manager();

        assert!(lm.read_lock(&'A', &"y"));
        assert!(lm.read_lock(&'B', &"y"));
        assert!(!lm.write_lock(&'C', &"y"));
        assert_eq!(lm.exclusive_waiting(&"y"), 1);
        assert!(!lm.read_lock(&'D', &"y"));
        assert_eq!(lm.wait_count(&'D'), Some(1));

        let status = lm.status(&"y");
        assert_eq!(status.mode, LockMode::Shared);
        assert_eq!(status.owners, vec!['A', 'B']);

        // B already owns the lock, nothing becomes ready.
        lm.release(&'A', &"y").unwrap();
        assert!(ready.is_empty());
        assert_eq!(lm.status(&"y").owners, vec!['B']);

        lm.release(&'B', &"y").unwrap();
        assert_eq!(ready.drain(), vec!['C']);
        assert_eq!(lm.wait_count(&'C'), None);
        let status = lm.status(&"y");
        assert_eq!(status.mode, LockMode::Exclusive);
        assert_eq!(status.owners, vec!['C']);
        assert_eq!(lm.wait_count(&'D'), Some(1));

        lm.release(&'C', &"y").unwrap();
        assert_eq!(lm.exclusive_waiting(&"y"), 0);
        assert_eq!(ready.drain(), vec!['D']);
        assert_eq!(lm.status(&"y").owners, vec!['D']);
    }

    #[test]
    fn test_reader_waits_behind_held_writer() {
        let (lm, ready) = manager();
        assert!(lm.write_lock(&'A', &"k"));
        assert!(!lm.read_lock(&'B', &"k"));
        assert!(!lm.read_lock(&'C', &"k"));

        lm.release(&'A', &"k").unwrap();
        assert_eq!(ready.drain(), vec!['B', 'C']);
        let status = lm.status(&"k");
        assert_eq!(status.mode, LockMode::Shared);
        assert_eq!(status.owners, vec!['B', 'C']);
    }

    #[test]
    fn test_owner_waiting_elsewhere_is_not_recounted() {
        let (lm, ready) = manager();
        // A holds "x" shared and waits for "z".
        assert!(lm.write_lock(&'Z', &"z"));
        assert!(lm.read_lock(&'A', &"x"));
        assert!(!lm.write_lock(&'A', &"z"));
        assert!(lm.read_lock(&'B', &"x"));
        assert_eq!(lm.wait_count(&'A'), Some(1));

        // A stays an owner of "x" after B leaves, but its wait on "z" is intact.
        lm.release(&'B', &"x").unwrap();
        assert_eq!(lm.wait_count(&'A'), Some(1));
        assert!(ready.is_empty());

        lm.release(&'Z', &"z").unwrap();
        assert_eq!(ready.drain(), vec!['A']);
    }

    #[test]
    fn test_waiting_writer_withdraws() {
        let (lm, ready) = manager();
        assert!(lm.read_lock(&'A', &"k"));
        assert!(!lm.write_lock(&'B', &"k"));
        assert!(!lm.read_lock(&'C', &"k"));

        lm.release(&'B', &"k").unwrap();
        assert_eq!(lm.exclusive_waiting(&"k"), 0);
        assert_eq!(lm.wait_count(&'B'), None);
        // C is now part of the shared prefix and is promoted.
        assert_eq!(ready.drain(), vec!['C']);
        assert_eq!(lm.status(&"k").owners, vec!['A', 'C']);
    }

    #[test]
    fn test_release_without_request() {
        let (lm, _ready) = manager();
        assert!(lm.release(&'A', &"k").is_err());
        assert!(lm.read_lock(&'A', &"k"));
        assert!(matches!(
            lm.release(&'B', &"k"),
            Err(LockError::NotQueued { .. })
        ));
        assert_eq!(lm.status(&"k").owners, vec!['A']);
    }
}
