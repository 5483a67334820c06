//! Single-version key-value store.
//!
//! Keeps only the latest value of each key together with the timestamp of
//! the write that produced it. Used by schedulers that rely purely on locking
//! for isolation and by optimistic validators that compare write timestamps.

use dashmap::DashMap;
use detdb_transaction::Timestamp;
use tracing::trace;

use crate::Storage;
use crate::config::StorageConfig;
use crate::error::StorageResult;
use crate::mvcc::StorageKey;

#[derive(Debug, Clone)]
struct Record<V> {
    value: V,
    write_ts: Timestamp,
}

pub struct MemStorage<K: StorageKey, V> {
    records: DashMap<K, Record<V>>,
}

impl<K: StorageKey, V: Clone + Send + Sync> MemStorage<K, V> {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Create a store where every key in `keys` holds `V::default()` written
    /// at [`Timestamp::ZERO`].
    pub fn with_keys(keys: impl IntoIterator<Item = K>) -> Self
    where
        V: Default,
    {
        let records = keys
            .into_iter()
            .map(|key| {
                (key, Record {
                    value: V::default(),
                    write_ts: Timestamp::ZERO,
                })
            })
            .collect();
        Self { records }
    }

    /// Timestamp of the last write to `key`.
    pub fn last_write_ts(&self, key: &K) -> Option<Timestamp> {
        self.records.get(key).map(|record| record.write_ts)
    }
}

impl<V: Clone + Send + Sync + Default> MemStorage<u64, V> {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::with_keys(config.keys())
    }
}

impl<K: StorageKey, V: Clone + Send + Sync> Default for MemStorage<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: StorageKey, V: Clone + Send + Sync> Storage<K, V> for MemStorage<K, V> {
    /// Returns the latest value; `ts` is not consulted.
    fn read(&self, key: &K, _ts: Timestamp) -> Option<V> {
        self.records.get(key).map(|record| record.value.clone())
    }

    fn write(&self, key: &K, value: V, ts: Timestamp) -> StorageResult<()> {
        trace!(?key, %ts, "value overwritten");
        self.records.insert(key.clone(), Record {
            value,
            write_ts: ts,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_write_wins() {
        let storage = MemStorage::<u64, i64>::from_config(&StorageConfig::with_key_space(4));
        assert_eq!(storage.read(&2, Timestamp::ZERO), Some(0));
        assert_eq!(storage.last_write_ts(&2), Some(Timestamp::ZERO));
        assert_eq!(storage.read(&9, Timestamp::ZERO), None);

        storage.write(&2, 5, Timestamp::with_ts(8)).unwrap();
        storage.write(&2, 6, Timestamp::with_ts(3)).unwrap();
        assert_eq!(storage.read(&2, Timestamp::with_ts(1)), Some(6));
        assert_eq!(storage.last_write_ts(&2), Some(Timestamp::with_ts(3)));
    }
}
