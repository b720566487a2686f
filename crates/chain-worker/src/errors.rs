use chainweb_checkpointer::CheckpointError;
use chainweb_state::id::BlockId;
use chainweb_state::payload::PayloadHash;
use thiserror::Error;

/// Return type for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// The block's parent isn't indexed or executed yet.  Retryable once it
    /// is.
    #[error("parent {0:?} not available, request out of order")]
    OutOfOrder(BlockId),

    /// Executing the batch produced a different commitment than the header
    /// claims.  The block is invalid; never retried.
    #[error("block {0:?} payload mismatch (claimed {1:?}, computed {2:?})")]
    PayloadMismatch(BlockId, PayloadHash, PayloadHash),

    /// The header's own linkage doesn't fit the parent it names.
    #[error("block {0:?} does not extend its parent")]
    InvalidHeader(BlockId),

    /// The execution engine itself failed, as opposed to one transaction.
    #[error("execution engine: {0}")]
    ExecFatal(String),

    #[error("checkpoint: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("store: {0}")]
    Store(#[from] chainweb_consensus_logic::errors::Error),

    #[error("worker exited")]
    WorkerExited,
}

/// Error applying one transaction.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The transaction itself failed.  Recorded as a rejected output; the
    /// batch continues.
    #[error("tx rejected: {0}")]
    Tx(String),

    /// The engine is broken.  Aborts the whole cycle.
    #[error("engine fatal: {0}")]
    Fatal(String),
}
