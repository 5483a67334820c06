use thiserror::Error;

pub type LockResult<T> = Result<T, LockError>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LockError {
    #[error("transaction {txn} has no lock request queued on key {key}")]
    NotQueued { txn: String, key: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TimestampError {
    #[error("timestamp overflow, reached {0}")]
    Overflow(u64),
}
