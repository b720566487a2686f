//! Messages from the handle to the worker.

use chainweb_state::header::BlockHeader;
use chainweb_state::payload::{Transaction, TxOutput};
use tokio::sync::oneshot;

use crate::WorkerResult;

/// Messages from the handle to the worker to give it work to do, with a
/// completion to return a result.
pub(crate) enum WorkerMessage {
    ProduceBlock(
        BlockHeader,
        BlockEnv,
        Vec<Transaction>,
        oneshot::Sender<WorkerResult<BlockProposal>>,
    ),
    ValidateBlock(
        BlockHeader,
        Vec<Transaction>,
        oneshot::Sender<WorkerResult<Vec<TxOutput>>>,
    ),
}

/// Environment the block-production driver supplies for the block being
/// built.
#[derive(Clone, Debug)]
pub struct BlockEnv {
    /// Timestamp we're attesting this block was created on.
    pub creation_time: u64,

    /// Miner reward data to embed.
    pub miner_data: Vec<u8>,
}

/// A produced block candidate: the child header (nonce still zero, PoW
/// search happens downstream) plus the per-transaction outputs its payload
/// hash commits to.
#[derive(Clone, Debug)]
pub struct BlockProposal {
    header: BlockHeader,
    outputs: Vec<TxOutput>,
}

impl BlockProposal {
    pub(crate) fn new(header: BlockHeader, outputs: Vec<TxOutput>) -> Self {
        Self { header, outputs }
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }
}
