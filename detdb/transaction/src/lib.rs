//! Transaction-side concurrency control for detdb.
//!
//! This crate provides the logical clock transactions are stamped with, the
//! deterministic lock manager that decides when a transaction may run, and the
//! ready queue through which runnable transactions are handed to the
//! scheduler.

pub mod error;
pub mod lock_manager;
pub mod ready_queue;
pub mod timestamp;

pub use error::{LockError, LockResult, TimestampError};
// Re-export commonly used types
pub use lock_manager::{
    ExclusiveLockManager, LockKey, LockManager, LockManagerConfig, LockMode, LockPolicy,
    LockRequest, LockStatus, SharedLockManager, TxnHandle,
};
pub use ready_queue::ReadyQueue;
pub use timestamp::{Timestamp, TimestampGenerator, global_timestamp_generator};
