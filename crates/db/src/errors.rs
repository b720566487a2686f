use rockbound::CodecError;
use thiserror::Error;

use crate::types::CheckpointKey;

/// Simple result type used across database interfaces.
pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("tried to overwrite checkpoint record for {0:?}")]
    OverwriteCheckpoint(CheckpointKey),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for DbError {
    fn from(value: anyhow::Error) -> Self {
        Self::Other(value.to_string())
    }
}

impl From<CodecError> for DbError {
    fn from(value: CodecError) -> Self {
        Self::Other(value.to_string())
    }
}
