//! Low level database traits.  Operations are NOT VALIDATED at this level;
//! structural checks happen in the consensus layer before anything is
//! written through here.

use std::sync::Arc;

use chainweb_state::header::BlockHeader;
use chainweb_state::id::BlockId;

use crate::types::{CheckpointKey, CheckpointRecord};
use crate::DbResult;

/// Common database interface we can parameterize worker tasks over if
/// passing the individual traits around gets cumbersome.
pub trait Database {
    type HeaderDB: HeaderDatabase + Send + Sync;
    type CheckpointDB: CheckpointDatabase + Send + Sync;

    fn header_db(&self) -> &Arc<Self::HeaderDB>;
    fn checkpoint_db(&self) -> &Arc<Self::CheckpointDB>;
}

/// Durable store for block headers, keyed by content hash with a height
/// secondary index.  One store per `(chain, version)` pair.
pub trait HeaderDatabase {
    /// Atomically writes a header and its height index entry.  Either both
    /// land or neither does.  Writing the same header twice is a no-op.
    fn put_header(&self, header: BlockHeader) -> DbResult<()>;

    /// Gets a header by its content hash, if we have it.
    fn get_header(&self, id: BlockId) -> DbResult<Option<BlockHeader>>;

    /// Gets the header ids we have at some height, in case there's more than
    /// one on competing forks.
    fn get_headers_at_height(&self, height: u64) -> DbResult<Vec<BlockId>>;

    /// Gets the greatest height any stored header has, if any are stored.
    fn get_max_height(&self) -> DbResult<Option<u64>>;
}

/// Durable index of execution-state checkpoint records.
///
/// Records are insert-only; a key is never remapped to different content.
/// The checkpointer enforces the content-equality rules, this layer only
/// refuses blind overwrites.
pub trait CheckpointDatabase {
    /// Inserts a record under a key, erroring with
    /// [`DbError::OverwriteCheckpoint`](crate::errors::DbError) if the key
    /// is already mapped.
    fn insert_record(&self, key: CheckpointKey, record: CheckpointRecord) -> DbResult<()>;

    /// Gets the record for a key, if present.
    fn get_record(&self, key: &CheckpointKey) -> DbResult<Option<CheckpointRecord>>;

    /// Gets all keys recorded at a height.
    fn get_keys_at_height(&self, height: u64) -> DbResult<Vec<CheckpointKey>>;

    /// Gets all keys recorded strictly below a height, in height order.
    fn get_keys_below_height(&self, height: u64) -> DbResult<Vec<CheckpointKey>>;

    /// Gets the greatest height any record is stored at, if any.
    fn get_max_height(&self) -> DbResult<Option<u64>>;

    /// Deletes a record, returning whether it existed.  Only used when
    /// pruning rejected forks or deep history.
    fn del_record(&self, key: &CheckpointKey) -> DbResult<bool>;
}
