//! Logical clock for transactions.
//!
//! Every transaction carries a unique timestamp handed out by a
//! [`TimestampGenerator`]. The MVCC engine orders versions and reads by it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::error::TimestampError;

/// A logical timestamp, unique per transaction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Stamp of the baseline version every key starts with.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Create a timestamp from a raw value.
    pub const fn with_ts(timestamp: u64) -> Self {
        Self(timestamp)
    }

    /// Returns the raw value of the timestamp.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ts#{}", self.0)
    }
}

/// Hands out strictly increasing timestamps.
pub struct TimestampGenerator {
    counter: AtomicU64,
}

impl TimestampGenerator {
    /// Create a new generator. The first timestamp it returns is 1, so no
    /// transaction ever shares the baseline stamp.
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    /// Create a new generator with a starting value
    pub fn with_start(start: u64) -> Self {
        Self {
            counter: AtomicU64::new(start),
        }
    }

    /// Generate the next timestamp
    pub fn next(&self) -> Result<Timestamp, TimestampError> {
        let mut cur = self.counter.load(Ordering::SeqCst);
        loop {
            if cur == u64::MAX {
                return Err(TimestampError::Overflow(cur));
            }
            match self.counter.compare_exchange_weak(
                cur,
                cur + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(Timestamp::with_ts(cur)),
                Err(actual) => cur = actual,
            }
        }
    }

    /// Get the timestamp the next call to [`next`](Self::next) would return.
    pub fn current(&self) -> Timestamp {
        Timestamp::with_ts(self.counter.load(Ordering::SeqCst))
    }

    /// Move the counter past `ts` if it is not already. Used when replaying a
    /// batch whose timestamps were assigned elsewhere.
    pub fn update_if_greater(&self, ts: Timestamp) -> Result<(), TimestampError> {
        if ts.raw() == u64::MAX {
            return Err(TimestampError::Overflow(ts.raw()));
        }
        self.counter.fetch_max(ts.raw() + 1, Ordering::SeqCst);
        Ok(())
    }
}

impl Default for TimestampGenerator {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_TIMESTAMP_GENERATOR: OnceLock<Arc<TimestampGenerator>> = OnceLock::new();

/// Get the process-wide timestamp generator
pub fn global_timestamp_generator() -> Arc<TimestampGenerator> {
    GLOBAL_TIMESTAMP_GENERATOR
        .get_or_init(|| Arc::new(TimestampGenerator::new()))
        .clone()
}
