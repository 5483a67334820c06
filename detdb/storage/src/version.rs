use detdb_transaction::Timestamp;

/// One value of a key as written by a single transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version<V> {
    value: V,
    /// Timestamp of the transaction that wrote this version.
    write_ts: Timestamp,
    /// Highest timestamp of any transaction that has read this version.
    max_read_ts: Timestamp,
}

impl<V> Version<V> {
    pub fn new(value: V, write_ts: Timestamp) -> Self {
        Self {
            value,
            write_ts,
            max_read_ts: Timestamp::ZERO,
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn write_ts(&self) -> Timestamp {
        self.write_ts
    }

    pub fn max_read_ts(&self) -> Timestamp {
        self.max_read_ts
    }

    /// Record a read at `ts`.
    pub fn mark_read(&mut self, ts: Timestamp) {
        self.max_read_ts = self.max_read_ts.max(ts);
    }
}

/// Every version ever written to a key, kept sorted by write timestamp.
///
/// Versions are never removed.
#[derive(Debug, Clone)]
pub struct VersionChain<V> {
    versions: Vec<Version<V>>,
}

impl<V> Default for VersionChain<V> {
    fn default() -> Self {
        Self {
            versions: Vec::new(),
        }
    }
}

impl<V> VersionChain<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Insert a version in timestamp order. A version with the same write
    /// timestamp as an existing one is placed after it.
    pub fn insert(&mut self, version: Version<V>) {
        let pos = self
            .versions
            .partition_point(|v| v.write_ts <= version.write_ts);
        self.versions.insert(pos, version);
    }

    /// The version visible at `ts`: the one with the largest write timestamp
    /// not after `ts`.
    pub fn visible_mut(&mut self, ts: Timestamp) -> Option<&mut Version<V>> {
        let pos = self.versions.partition_point(|v| v.write_ts <= ts);
        pos.checked_sub(1).map(|idx| &mut self.versions[idx])
    }

    /// The version with the largest write timestamp.
    pub fn latest(&self) -> Option<&Version<V>> {
        self.versions.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Version<V>> {
        self.versions.iter()
    }
}
