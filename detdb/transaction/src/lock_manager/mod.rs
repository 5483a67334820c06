//! Deterministic two-phase lock manager.
//!
//! Requests on a key are served in arrival order. A request that cannot be
//! granted right away is left in the key's queue and the transaction's wait
//! count is bumped; the manager never blocks. When the last outstanding lock
//! of a transaction is granted, the transaction is pushed onto the
//! [`ReadyQueue`] for the scheduler to pick up.
//!
//! Two policies are available behind the [`LockManager`] trait:
//! [`ExclusiveLockManager`] treats every access as exclusive, and
//! [`SharedLockManager`] lets readers share a key until a writer queues up.

mod exclusive;
mod queue;
mod shared;

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

pub use exclusive::ExclusiveLockManager;
use serde::{Deserialize, Serialize};
pub use shared::SharedLockManager;

use crate::error::LockResult;
use crate::ready_queue::ReadyQueue;

/// Anything usable as a lockable key.
pub trait LockKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<K> LockKey for K where K: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// Transaction identity as seen by the lock manager. Only equality and
/// hashing are ever used; the handle is cloned into the ready queue.
pub trait TxnHandle: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> TxnHandle for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockMode {
    Unlocked,
    Shared,
    Exclusive,
}

/// A transaction's request for a lock on one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequest<T> {
    mode: LockMode,
    txn: T,
}

impl<T> LockRequest<T> {
    pub fn new(mode: LockMode, txn: T) -> Self {
        Self { mode, txn }
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    pub fn txn(&self) -> &T {
        &self.txn
    }
}

/// Mode currently held on a key together with every transaction holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockStatus<T> {
    pub mode: LockMode,
    pub owners: Vec<T>,
}

impl<T> LockStatus<T> {
    pub fn unlocked() -> Self {
        Self {
            mode: LockMode::Unlocked,
            owners: Vec::new(),
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.mode == LockMode::Unlocked
    }
}

/// Lock manager capability shared by both policies.
pub trait LockManager<K, T>: Send + Sync {
    /// Request an exclusive lock on `key`. Returns whether it was granted
    /// immediately; otherwise the request stays queued.
    fn write_lock(&self, txn: &T, key: &K) -> bool;

    /// Request a shared lock on `key`. Returns whether it was granted
    /// immediately; otherwise the request stays queued.
    fn read_lock(&self, txn: &T, key: &K) -> bool;

    /// Remove `txn`'s request on `key`, promoting whichever requests become
    /// owners as a result.
    ///
    /// Returns [`LockError::NotQueued`](crate::LockError::NotQueued) if `txn`
    /// has no request on `key`; the lock table is left untouched in that case.
    fn release(&self, txn: &T, key: &K) -> LockResult<()>;

    fn status(&self, key: &K) -> LockStatus<T>;

    /// Number of locks `txn` is still waiting for, or `None` if it is not
    /// waiting on anything.
    fn wait_count(&self, txn: &T) -> Option<usize>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockPolicy {
    /// Every lock is exclusive, `read_lock` behaves like `write_lock`.
    Exclusive,
    /// Shared locks for reads and exclusive locks for writes.
    #[default]
    Shared,
}

/// Configuration selecting the lock policy at construction time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockManagerConfig {
    #[serde(default)]
    pub policy: LockPolicy,
}

impl LockManagerConfig {
    pub fn new(policy: LockPolicy) -> Self {
        Self { policy }
    }

    /// Build a lock manager of the configured policy feeding `ready_txns`.
    pub fn build<K: LockKey, T: TxnHandle>(
        &self,
        ready_txns: Arc<ReadyQueue<T>>,
    ) -> Box<dyn LockManager<K, T>> {
        match self.policy {
            LockPolicy::Exclusive => Box::new(ExclusiveLockManager::new(ready_txns)),
            LockPolicy::Shared => Box::new(SharedLockManager::new(ready_txns)),
        }
    }
}
