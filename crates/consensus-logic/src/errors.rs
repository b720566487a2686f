use chainweb_db::errors::DbError;
use chainweb_primitives::chain::{ChainId, ChainwebVersion};
use chainweb_state::id::BlockId;
use thiserror::Error;

/// Rejection reasons for header insertion.  All of these are structural;
/// retrying the same header can never succeed except for `UnknownParent`
/// once the parent arrives.
#[derive(Debug, Error)]
pub enum InsertError {
    #[error("parent {0:?} not present in store")]
    UnknownParent(BlockId),

    #[error("block {0:?} at height {1} does not extend parent height {2}")]
    InvalidHeight(BlockId, u64, u64),

    #[error("block {0:?} weight inconsistent with parent weight and target")]
    InvalidDifficulty(BlockId),

    #[error("block {0:?} hash exceeds its PoW target")]
    InvalidProofOfWork(BlockId),

    #[error("block {0:?} is on {1}, store tracks {2}")]
    WrongChain(BlockId, ChainId, ChainId),

    #[error("block {0:?} is for version {1}, store tracks {2}")]
    WrongVersion(BlockId, ChainwebVersion, ChainwebVersion),

    #[error("genesis header has height {0}, must be 0")]
    GenesisHeight(u64),

    #[error("db: {0}")]
    Db(#[from] DbError),
}

/// Errors from the in-memory tree structure.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("tried to attach block {0:?} but missing parent {1:?}")]
    AttachMissingParent(BlockId, BlockId),

    #[error("tried to finalize unknown block {0:?}")]
    MissingBlock(BlockId),
}

/// Errors from store queries.
#[derive(Debug, Error)]
pub enum Error {
    #[error("block {0:?} missing from store")]
    MissingBlock(BlockId),

    #[error("store has no headers, genesis not written")]
    NotInitialized,

    #[error("blocks {0:?} and {1:?} share no ancestor")]
    NoCommonAncestor(BlockId, BlockId),

    #[error("tree: {0}")]
    Tree(#[from] TreeError),

    #[error("db: {0}")]
    Db(#[from] DbError),
}
