use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Number of keys seeded by default, `0..DEFAULT_KEY_SPACE`.
pub const DEFAULT_KEY_SPACE: u64 = 1_000_000;

/// Configuration of an integer-keyed store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Keys `0..key_space` are seeded with a baseline version before any
    /// transaction runs.
    #[serde(default = "default_key_space")]
    pub key_space: u64,
}

fn default_key_space() -> u64 {
    DEFAULT_KEY_SPACE
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key_space: DEFAULT_KEY_SPACE,
        }
    }
}

impl StorageConfig {
    pub fn with_key_space(key_space: u64) -> Self {
        Self { key_space }
    }

    pub fn keys(&self) -> Range<u64> {
        0..self.key_space
    }
}
