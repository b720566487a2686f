use chainweb_db::errors::DbError;
use chainweb_db::types::CheckpointKey;
use chainweb_state::payload::PayloadHash;
use thiserror::Error;

pub type CheckpointResult<T> = Result<T, CheckpointError>;

#[derive(Debug, Error)]
pub enum CheckpointError {
    /// No record exists for the requested key.  Retryable once whatever
    /// produces that checkpoint has run.
    #[error("no checkpoint recorded at height {0} for payload {1:?}")]
    RestoreNotFound(u64, PayloadHash),

    /// A record already exists under this key with different content.  The
    /// payload hash commits to the batch and its outputs, so this can only
    /// happen if an invariant broke somewhere; it is never recovered from.
    #[error("checkpoint {0:?} already recorded with different content")]
    RecordConflict(CheckpointKey),

    /// The record's counters don't match the state file it points at.
    #[error("checkpoint {0:?} does not match its state file")]
    CorruptRecord(CheckpointKey),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("db: {0}")]
    Db(#[from] DbError),
}
