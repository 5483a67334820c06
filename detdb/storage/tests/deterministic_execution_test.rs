//! Runs a batch of read-modify-write transactions through the lock manager
//! and the MVCC store on several worker threads.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use detdb_storage::{MvccStorage, StorageConfig};
use detdb_transaction::{
    LockManager, LockManagerConfig, LockPolicy, ReadyQueue, Timestamp, TimestampGenerator,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const KEYS: u64 = 10;
const TXNS: usize = 300;
const WORKERS: usize = 4;

struct BatchTxn {
    ts: Timestamp,
    reads: BTreeSet<u64>,
    writes: BTreeSet<u64>,
}

fn make_batch(seed: u64) -> Vec<BatchTxn> {
    let mut rng = StdRng::seed_from_u64(seed);
    let clock = TimestampGenerator::new();
    (0..TXNS)
        .map(|_| {
            let writes: BTreeSet<u64> = (0..rng.random_range(1..3))
                .map(|_| rng.random_range(0..KEYS))
                .collect();
            let reads: BTreeSet<u64> = (0..rng.random_range(0..3))
                .map(|_| rng.random_range(0..KEYS))
                .filter(|key| !writes.contains(key))
                .collect();
            BatchTxn {
                ts: clock.next().unwrap(),
                reads,
                writes,
            }
        })
        .collect()
}

fn run_batch(policy: LockPolicy, seed: u64) {
    let batch = Arc::new(make_batch(seed));
    let storage = Arc::new(MvccStorage::<u64, u64>::from_config(
        &StorageConfig::with_key_space(KEYS),
    ));
    let ready = Arc::new(ReadyQueue::new());
    let lm: Arc<dyn LockManager<u64, usize>> =
        Arc::from(LockManagerConfig::new(policy).build::<u64, usize>(ready.clone()));

    // Lock acquisition for the whole batch happens up front, in batch order.
    for (idx, txn) in batch.iter().enumerate() {
        let mut blocked = 0;
        for key in &txn.reads {
            if !lm.read_lock(&idx, key) {
                blocked += 1;
            }
        }
        for key in &txn.writes {
            if !lm.write_lock(&idx, key) {
                blocked += 1;
            }
        }
        if blocked == 0 {
            ready.push(idx);
        }
    }

    let finished = Arc::new(AtomicUsize::new(0));
    // Values observed by each transaction, by key.
    let observed = Arc::new(Mutex::new(HashMap::new()));
    let workers: Vec<_> = (0..WORKERS)
        .map(|_| {
            let (batch, storage, ready, lm, finished, observed) = (
                batch.clone(),
                storage.clone(),
                ready.clone(),
                lm.clone(),
                finished.clone(),
                observed.clone(),
            );
            thread::spawn(move || {
                while finished.load(Ordering::SeqCst) < TXNS {
                    let Some(idx) = ready.pop() else {
                        thread::yield_now();
                        continue;
                    };
                    let txn = &batch[idx];
                    let mut seen = HashMap::new();
                    for key in &txn.reads {
                        seen.insert(*key, storage.lock(key).read(txn.ts).unwrap());
                    }
                    let mut latches = storage.lock_all(&txn.writes);
                    for latch in &mut latches {
                        let current = latch.read(txn.ts).unwrap();
                        seen.insert(*latch.key(), current);
                        assert!(latch.check_write(txn.ts));
                        latch.write(current + 1, txn.ts);
                    }
                    drop(latches);
                    observed.lock().insert(idx, seen);

                    for key in txn.reads.union(&txn.writes) {
                        lm.release(&idx, key).unwrap();
                    }
                    finished.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    // Serial replay in timestamp order must observe exactly the same values.
    let observed = observed.lock();
    let mut serial: HashMap<u64, u64> = (0..KEYS).map(|key| (key, 0)).collect();
    for (idx, txn) in batch.iter().enumerate() {
        for key in txn.reads.union(&txn.writes) {
            assert_eq!(observed[&idx][key], serial[key], "txn {idx} key {key}");
        }
        for key in &txn.writes {
            *serial.get_mut(key).unwrap() += 1;
        }
    }

    let last = Timestamp::with_ts(u64::MAX);
    for key in 0..KEYS {
        let mut latch = storage.lock(&key);
        assert_eq!(latch.read(last), Some(serial[&key]));
        assert!(lm.status(&key).is_unlocked());
    }
    assert!(ready.is_empty());
}

#[test]
fn test_exclusive_batch_is_serializable() {
    for seed in 0..5 {
        run_batch(LockPolicy::Exclusive, seed);
    }
}

#[test]
fn test_shared_batch_is_serializable() {
    for seed in 0..5 {
        run_batch(LockPolicy::Shared, seed);
    }
}
