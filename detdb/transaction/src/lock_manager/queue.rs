use std::collections::VecDeque;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::warn;

use super::{LockMode, LockRequest, LockStatus, TxnHandle};

#[derive(Debug)]
pub(super) struct QueuedRequest<T> {
    pub(super) request: LockRequest<T>,
    /// Whether this request has been counted as granted. A request is granted
    /// at most once, either on arrival or by a later promotion.
    pub(super) granted: bool,
}

/// FIFO queue of requests on a single key. The front is the earliest arrival.
#[derive(Debug)]
pub(super) struct LockQueue<T> {
    requests: VecDeque<QueuedRequest<T>>,
    /// Exclusive requests present in the queue, held or waiting.
    exclusive_waiting: usize,
}

impl<T> Default for LockQueue<T> {
    fn default() -> Self {
        Self {
            requests: VecDeque::new(),
            exclusive_waiting: 0,
        }
    }
}

impl<T: TxnHandle> LockQueue<T> {
    pub(super) fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub(super) fn exclusive_waiting(&self) -> usize {
        self.exclusive_waiting
    }

    pub(super) fn push(&mut self, request: LockRequest<T>, granted: bool) {
        debug_assert!(
            self.requests.iter().all(|r| r.request.txn() != request.txn()),
            "transaction {:?} already has a request on this key",
            request.txn()
        );
        if request.mode() == LockMode::Exclusive {
            self.exclusive_waiting += 1;
        }
        self.requests.push_back(QueuedRequest { request, granted });
    }

    /// Remove `txn`'s request, returning its former position and the entry.
    pub(super) fn remove(&mut self, txn: &T) -> Option<(usize, QueuedRequest<T>)> {
        let pos = self.requests.iter().position(|r| r.request.txn() == txn)?;
        let removed = self.requests.remove(pos)?;
        if removed.request.mode() == LockMode::Exclusive {
            self.exclusive_waiting -= 1;
        }
        Some((pos, removed))
    }

    pub(super) fn front_mut(&mut self) -> Option<&mut QueuedRequest<T>> {
        self.requests.front_mut()
    }

    /// Number of requests at the front of the queue that currently own the
    /// lock: one exclusive request, or a run of shared requests ending before
    /// the first exclusive one.
    fn owner_count(&self) -> usize {
        match self.requests.front() {
            None => 0,
            Some(front) if front.request.mode() == LockMode::Exclusive => 1,
            Some(_) => self
                .requests
                .iter()
                .take_while(|r| r.request.mode() == LockMode::Shared)
                .count(),
        }
    }

    pub(super) fn owners_mut(&mut self) -> impl Iterator<Item = &mut QueuedRequest<T>> {
        let count = self.owner_count();
        self.requests.iter_mut().take(count)
    }

    pub(super) fn mode(&self) -> LockMode {
        self.requests
            .front()
            .map_or(LockMode::Unlocked, |front| front.request.mode())
    }

    pub(super) fn status(&self) -> LockStatus<T> {
        LockStatus {
            mode: self.mode(),
            owners: self
                .requests
                .iter()
                .take(self.owner_count())
                .map(|r| r.request.txn().clone())
                .collect(),
        }
    }
}

/// Locks each waiting transaction still needs before it may run.
///
/// A transaction is present only while its count is positive.
#[derive(Debug)]
pub(super) struct WaitTable<T: TxnHandle> {
    counts: DashMap<T, usize>,
}

impl<T: TxnHandle> Default for WaitTable<T> {
    fn default() -> Self {
        Self {
            counts: DashMap::new(),
        }
    }
}

impl<T: TxnHandle> WaitTable<T> {
    pub(super) fn get(&self, txn: &T) -> Option<usize> {
        self.counts.get(txn).map(|count| *count)
    }

    pub(super) fn increment(&self, txn: &T) {
        *self.counts.entry(txn.clone()).or_insert(0) += 1;
    }

    /// Decrement `txn`'s count. Returns true if it just reached zero, in which
    /// case the entry has been removed.
    pub(super) fn decrement(&self, txn: &T) -> bool {
        match self.counts.entry(txn.clone()) {
            Entry::Occupied(mut entry) => {
                *entry.get_mut() -= 1;
                if *entry.get() == 0 {
                    entry.remove();
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(_) => {
                warn!(?txn, "granted a lock to a transaction that was not waiting");
                false
            }
        }
    }
}
