use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace, warn};

use super::queue::{LockQueue, WaitTable};
use super::{LockKey, LockManager, LockMode, LockRequest, LockStatus, TxnHandle};
use crate::error::{LockError, LockResult};
use crate::ready_queue::ReadyQueue;

/// Lock manager that serializes every access to a key.
///
/// Each key has a FIFO queue of exclusive requests and only the front of the
/// queue holds the lock. `read_lock` is the same as `write_lock`.
pub struct ExclusiveLockManager<K: LockKey, T: TxnHandle> {
    lock_table: DashMap<K, LockQueue<T>>,
    txn_waits: WaitTable<T>,
    ready_txns: Arc<ReadyQueue<T>>,
}

impl<K: LockKey, T: TxnHandle> ExclusiveLockManager<K, T> {
    pub fn new(ready_txns: Arc<ReadyQueue<T>>) -> Self {
        Self {
            lock_table: DashMap::new(),
            txn_waits: WaitTable::default(),
            ready_txns,
        }
    }
}

impl<K: LockKey, T: TxnHandle> LockManager<K, T> for ExclusiveLockManager<K, T> {
    fn write_lock(&self, txn: &T, key: &K) -> bool {
        let mut queue = self.lock_table.entry(key.clone()).or_default();
        let granted = queue.is_empty();
        queue.push(LockRequest::new(LockMode::Exclusive, txn.clone()), granted);
        if !granted {
            self.txn_waits.increment(txn);
        }
        trace!(?txn, ?key, granted, "exclusive lock requested");
        granted
    }

    fn read_lock(&self, txn: &T, key: &K) -> bool {
        self.write_lock(txn, key)
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
        let (pos, removed) = queue.remove(txn).ok_or_else(not_queued)?;

        if !removed.granted {
            // The transaction gave up on a lock it was still waiting for.
            // Reaching zero here does not make it ready: it withdrew, so the
            // entry is only dropped.
            self.txn_waits.decrement(txn);
            return Ok(());
        }
        debug_assert_eq!(pos, 0, "only the front of an exclusive queue is granted");

        if let Some(next) = queue.front_mut().filter(|next| !next.granted) {
            next.granted = true;
            let next_txn = next.request.txn();
            if self.txn_waits.decrement(next_txn) {
                debug!(txn = ?next_txn, ?key, "transaction ready");
                self.ready_txns.push(next_txn.clone());
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
