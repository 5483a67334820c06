//! Hand-off channel from the lock manager to the scheduler.

use std::fmt;

use crossbeam_queue::SegQueue;

/// Transactions whose last outstanding lock has been granted.
///
/// The lock manager is the producer; the scheduler drains it. Pushes may race
/// with each other and with the drain without losing or duplicating entries.
pub struct ReadyQueue<T> {
    inner: SegQueue<T>,
}

impl<T> ReadyQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: SegQueue::new(),
        }
    }

    pub fn push(&self, txn: T) {
        self.inner.push(txn);
    }

    pub fn pop(&self) -> Option<T> {
        self.inner.pop()
    }

    /// Take every transaction queued at the time of the call, oldest first.
    pub fn drain(&self) -> Vec<T> {
        let mut drained = Vec::with_capacity(self.inner.len());
        while let Some(txn) = self.inner.pop() {
            drained.push(txn);
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<T> Default for ReadyQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ReadyQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadyQueue")
            .field("len", &self.inner.len())
            .finish()
    }
}
