//! Checkpoint record manager.  Read-only; all mutation of the checkpoint
//! index goes through the checkpointer, which owns the content rules.

use std::sync::Arc;

use chainweb_db::traits::{CheckpointDatabase, Database};
use chainweb_db::types::{CheckpointKey, CheckpointRecord};
use chainweb_db::DbResult;

use crate::exec::inst_ops;

pub struct Context<D: Database> {
    db: Arc<D>,
}

impl<D: Database> Context<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self { db }
    }
}

inst_ops! {
    (CheckpointManager, Context<D: Database>) {
        get_record(CheckpointKey) => Option<CheckpointRecord> [get_record_blocking, get_record_async];
        get_keys_at_height(u64) => Vec<CheckpointKey> [get_keys_at_height_blocking, get_keys_at_height_async];
        get_max_height(()) => Option<u64> [get_max_height_blocking, get_max_height_async];
    }
}

fn get_record<D: Database>(
    context: &Context<D>,
    key: CheckpointKey,
) -> DbResult<Option<CheckpointRecord>> {
    context.db.checkpoint_db().get_record(&key)
}

fn get_keys_at_height<D: Database>(context: &Context<D>, h: u64) -> DbResult<Vec<CheckpointKey>> {
    context.db.checkpoint_db().get_keys_at_height(h)
}

fn get_max_height<D: Database>(context: &Context<D>, _arg: ()) -> DbResult<Option<u64>> {
    context.db.checkpoint_db().get_max_height()
}
