//! Multi-version storage with timestamp-ordering checks.
//!
//! Every key owns a latch guarding its [`VersionChain`]. Callers take the
//! latch with [`MvccStorage::lock`] and perform their read/check/write
//! sequence on the returned [`KeyLatch`]; the latch is released when the
//! guard is dropped. Latches of different keys are independent.
//!
//! The write check only looks at the newest version of a key. That is
//! sufficient as long as writers arrive in timestamp order, which a
//! deterministic scheduler guarantees.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use detdb_transaction::Timestamp;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use tracing::{debug, trace};

use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use crate::version::{Version, VersionChain};
use crate::Storage;

/// Anything usable as a storage key.
pub trait StorageKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<K> StorageKey for K where K: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// A key's latch. `None` until the first write creates the chain.
type Slot<V> = Arc<Mutex<Option<VersionChain<V>>>>;

pub struct MvccStorage<K: StorageKey, V> {
    slots: DashMap<K, Slot<V>>,
}

impl<K: StorageKey, V: Clone + Send> MvccStorage<K, V> {
    /// Create an empty store. No key has a version until it is written.
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Create a store where every key in `keys` starts with a baseline version
    /// at [`Timestamp::ZERO`] holding `V::default()`.
    pub fn with_keys(keys: impl IntoIterator<Item = K>) -> Self
    where
        V: Default,
    {
        let slots = DashMap::new();
        for key in keys {
            let mut chain = VersionChain::new();
            chain.insert(Version::new(V::default(), Timestamp::ZERO));
            slots.insert(key, Arc::new(Mutex::new(Some(chain))));
        }
        Self { slots }
    }

    /// Acquire the latch of `key`, blocking until it is free.
    ///
    /// Keys outside the seeded key space get a latch on first use.
    pub fn lock(&self, key: &K) -> KeyLatch<K, V> {
        let slot = match self.slot(key) {
            Some(slot) => slot,
            None => self.slots.entry(key.clone()).or_default().clone(),
        };
        KeyLatch::new(key.clone(), slot)
    }

    /// Like [`lock`](Self::lock), but returns `None` instead of creating a
    /// latch for a key that has none yet.
    pub fn try_lock_existing(&self, key: &K) -> Option<KeyLatch<K, V>> {
        self.slot(key).map(|slot| KeyLatch::new(key.clone(), slot))
    }

    fn slot(&self, key: &K) -> Option<Slot<V>> {
        self.slots.get(key).map(|slot| slot.value().clone())
    }

    /// Number of keys that currently have a latch.
    pub fn latch_count(&self) -> usize {
        self.slots.len()
    }

    /// Acquire the latches of several keys in ascending key order, so that
    /// two callers locking overlapping key sets cannot deadlock.
    pub fn lock_all<'a>(&self, keys: impl IntoIterator<Item = &'a K>) -> Vec<KeyLatch<K, V>>
    where
        K: Ord,
    {
        let mut keys: Vec<&K> = keys.into_iter().collect();
        keys.sort_unstable();
        keys.dedup();
        keys.into_iter().map(|key| self.lock(key)).collect()
    }

    /// Check and write `value` at `ts` under a single latch acquisition.
    pub fn apply_write(&self, key: &K, value: V, ts: Timestamp) -> StorageResult<()> {
        let mut latch = self.lock(key);
        latch.try_write(value, ts)
    }

    /// Number of versions stored for `key`.
    pub fn version_count(&self, key: &K) -> usize {
        self.try_lock_existing(key)
            .map_or(0, |latch| latch.chain().map_or(0, VersionChain::len))
    }
}

impl<V: Clone + Send + Default> MvccStorage<u64, V> {
    /// Create a store seeded over `0..config.key_space`.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::with_keys(config.keys())
    }
}

impl<K: StorageKey, V: Clone + Send> Default for MvccStorage<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: StorageKey, V: Clone + Send> Storage<K, V> for MvccStorage<K, V> {
    fn read(&self, key: &K, ts: Timestamp) -> Option<V> {
        self.try_lock_existing(key)?.read(ts)
    }

    fn write(&self, key: &K, value: V, ts: Timestamp) -> StorageResult<()> {
        self.apply_write(key, value, ts)
    }
}

/// Exclusive access to one key's version chain. Dropping it releases the
/// latch.
pub struct KeyLatch<K, V> {
    key: K,
    guard: ArcMutexGuard<RawMutex, Option<VersionChain<V>>>,
}

impl<K, V> KeyLatch<K, V> {
    fn new(key: K, slot: Slot<V>) -> Self {
        Self {
            key,
            guard: slot.lock_arc(),
        }
    }
}

impl<K: StorageKey, V: Clone> KeyLatch<K, V> {
    pub fn key(&self) -> &K {
        &self.key
    }

    fn chain(&self) -> Option<&VersionChain<V>> {
        let slot: &Option<VersionChain<V>> = &self.guard;
        slot.as_ref()
    }

    /// Read the value visible at `ts` and record the read on that version.
    ///
    /// Returns `None` if the key has never been written, or if every version
    /// was written after `ts`.
    pub fn read(&mut self, ts: Timestamp) -> Option<V> {
        let slot: &mut Option<VersionChain<V>> = &mut self.guard;
        let version = slot.as_mut()?.visible_mut(ts)?;
        version.mark_read(ts);
        Some(version.value().clone())
    }

    /// Whether a write at `ts` may be applied.
    ///
    /// The write is rejected if the newest version has already been read by a
    /// transaction later than `ts`.
    pub fn check_write(&self, ts: Timestamp) -> bool {
        match self.chain().and_then(VersionChain::latest) {
            None => true,
            Some(latest) => latest.max_read_ts() <= ts,
        }
    }

    /// Add a version written at `ts`. Only call this after
    /// [`check_write`](Self::check_write) returned true.
    pub fn write(&mut self, value: V, ts: Timestamp) {
        trace!(key = ?self.key, %ts, "version written");
        self.guard
            .get_or_insert_with(VersionChain::new)
            .insert(Version::new(value, ts));
    }

    /// [`check_write`](Self::check_write) followed by [`write`](Self::write).
    pub fn try_write(&mut self, value: V, ts: Timestamp) -> StorageResult<()> {
        if !self.check_write(ts) {
            let max_read_ts = self
                .chain()
                .and_then(VersionChain::latest)
                .map_or(Timestamp::ZERO, Version::max_read_ts);
            debug!(key = ?self.key, %ts, %max_read_ts, "write rejected");
            return Err(StorageError::WriteConflict {
                key: format!("{:?}", self.key),
                ts,
                max_read_ts,
            });
        }
        self.write(value, ts);
        Ok(())
    }

    /// Release the latch. Equivalent to dropping the guard.
    pub fn unlock(self) {}
}
