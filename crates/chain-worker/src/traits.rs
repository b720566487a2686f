//! Traits for the worker to interface with the underlying system.

use std::sync::Arc;

use chainweb_checkpointer::PactState;
use chainweb_consensus_logic::HeaderStore;
use chainweb_db::traits::HeaderDatabase;
use chainweb_state::header::BlockHeader;
use chainweb_state::id::BlockId;
use chainweb_state::payload::{Transaction, TxOutput};

use crate::errors::ExecError;
use crate::WorkerResult;

/// Header access the worker needs while validating: just enough to find a
/// block's parent and decide whether a request is out of order.
pub trait WorkerContext {
    /// Fetches a header by id.
    fn fetch_header(&self, id: &BlockId) -> WorkerResult<Option<BlockHeader>>;
}

impl<D: HeaderDatabase> WorkerContext for HeaderStore<D> {
    fn fetch_header(&self, id: &BlockId) -> WorkerResult<Option<BlockHeader>> {
        Ok(self.lookup(id)?)
    }
}

impl<T: WorkerContext> WorkerContext for Arc<T> {
    fn fetch_header(&self, id: &BlockId) -> WorkerResult<Option<BlockHeader>> {
        self.as_ref().fetch_header(id)
    }
}

/// The opaque "apply transaction" capability of the execution engine.  The
/// coordinator drives it in batch order and treats both the transaction
/// bytes and the produced outputs as opaque.
pub trait ExecCapability {
    fn apply(&self, state: &mut PactState, tx: &Transaction) -> Result<TxOutput, ExecError>;
}
