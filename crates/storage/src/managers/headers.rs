//! Header data manager.  Async/blocking access for the sync and API layers.

use std::sync::Arc;

use chainweb_db::traits::{Database, HeaderDatabase};
use chainweb_db::DbResult;
use chainweb_state::header::BlockHeader;
use chainweb_state::id::BlockId;

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
    (HeaderManager, Context<D: Database>) {
        get_header(BlockId) => Option<BlockHeader> [get_header_blocking, get_header_async];
        get_headers_at_height(u64) => Vec<BlockId> [get_headers_at_height_blocking, get_headers_at_height_async];
        get_max_height(()) => Option<u64> [get_max_height_blocking, get_max_height_async];
        put_header(BlockHeader) => () [put_header_blocking, put_header_async];
    }
}

fn get_header<D: Database>(context: &Context<D>, id: BlockId) -> DbResult<Option<BlockHeader>> {
    context.db.header_db().get_header(id)
}

fn get_headers_at_height<D: Database>(context: &Context<D>, h: u64) -> DbResult<Vec<BlockId>> {
    context.db.header_db().get_headers_at_height(h)
}

fn get_max_height<D: Database>(context: &Context<D>, _arg: ()) -> DbResult<Option<u64>> {
    context.db.header_db().get_max_height()
}

// Unvalidated write-through; validated insertion happens in the consensus
// layer's header store.
fn put_header<D: Database>(context: &Context<D>, header: BlockHeader) -> DbResult<()> {
    context.db.header_db().put_header(header)
}
