//! Storage engines for detdb.
//!
//! [`MvccStorage`] keeps every version of a key and applies timestamp
//! ordering to reads and writes. [`MemStorage`] keeps only the latest value.
//! Both are reachable through the [`Storage`] trait.

pub mod config;
pub mod error;
pub mod memory;
pub mod mvcc;
pub mod version;

pub use config::StorageConfig;
use detdb_transaction::Timestamp;
pub use error::{StorageError, StorageResult};
pub use memory::MemStorage;
pub use mvcc::{KeyLatch, MvccStorage, StorageKey};
pub use version::{Version, VersionChain};

/// Point access to a key-value store on behalf of a transaction stamped `ts`.
pub trait Storage<K, V>: Send + Sync {
    /// Read the value of `key` as seen at `ts`, or `None` if there is none.
    fn read(&self, key: &K, ts: Timestamp) -> Option<V>;

    /// Write `value` to `key` on behalf of the transaction stamped `ts`.
    fn write(&self, key: &K, value: V, ts: Timestamp) -> StorageResult<()>;
}
