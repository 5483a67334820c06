use detdb_transaction::Timestamp;
use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StorageError {
    #[error(
        "write conflict on key {key}: write at {ts} precedes a read at {max_read_ts} of the latest version"
    )]
    WriteConflict {
        key: String,
        ts: Timestamp,
        max_read_ts: Timestamp,
    },
}
