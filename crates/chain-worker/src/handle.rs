use chainweb_state::header::BlockHeader;
use chainweb_state::payload::{Transaction, TxOutput};
use tokio::sync::{mpsc, oneshot};

use crate::message::{BlockEnv, BlockProposal, WorkerMessage};
use crate::{WorkerError, WorkerResult};

/// Builds the channel pair connecting a handle to a worker loop.  The
/// single-slot-ish queue is the per-chain serialization point; the worker
/// drains it one cycle at a time.
pub fn worker_channel(depth: usize) -> (ChainWorkerHandle, ChainWorkerInput) {
    let (msg_tx, msg_rx) = mpsc::channel(depth);
    (ChainWorkerHandle { msg_tx }, ChainWorkerInput { msg_rx })
}

pub struct ChainWorkerHandle {
    msg_tx: mpsc::Sender<WorkerMessage>,
}

impl ChainWorkerHandle {
    /// Low-level caller to dispatch work to the worker thread.
    async fn send_and_wait<R>(
        &self,
        make_fn: impl FnOnce(oneshot::Sender<WorkerResult<R>>) -> WorkerMessage,
    ) -> WorkerResult<R> {
        // Construct the message with the lambda.
        let (completion_tx, completion_rx) = oneshot::channel();
        let msg = make_fn(completion_tx);

        // Then send it and wait for a response.
        if self.msg_tx.send(msg).await.is_err() {
            return Err(WorkerError::WorkerExited);
        }

        match completion_rx.await {
            Ok(r) => r,
            Err(_) => Err(WorkerError::WorkerExited),
        }
    }

    /// Low-level caller to dispatch work to the worker thread.
    fn send_and_wait_blocking<R>(
        &self,
        make_fn: impl FnOnce(oneshot::Sender<WorkerResult<R>>) -> WorkerMessage,
    ) -> WorkerResult<R> {
        // Construct the message with the lambda.
        let (completion_tx, completion_rx) = oneshot::channel();
        let msg = make_fn(completion_tx);

        if self.msg_tx.blocking_send(msg).is_err() {
            return Err(WorkerError::WorkerExited);
        }

        match completion_rx.blocking_recv() {
            Ok(r) => r,
            Err(_) => Err(WorkerError::WorkerExited),
        }
    }

    /// Produces a block candidate on top of a parent.
    pub async fn produce_block(
        &self,
        parent: BlockHeader,
        env: BlockEnv,
        txs: Vec<Transaction>,
    ) -> WorkerResult<BlockProposal> {
        self.send_and_wait(|tx| WorkerMessage::ProduceBlock(parent, env, txs, tx))
            .await
    }

    /// Produces a block candidate on top of a parent.
    pub fn produce_block_blocking(
        &self,
        parent: BlockHeader,
        env: BlockEnv,
        txs: Vec<Transaction>,
    ) -> WorkerResult<BlockProposal> {
        self.send_and_wait_blocking(|tx| WorkerMessage::ProduceBlock(parent, env, txs, tx))
    }

    /// Validates an externally produced block against its claimed payload.
    pub async fn validate_block(
        &self,
        header: BlockHeader,
        txs: Vec<Transaction>,
    ) -> WorkerResult<Vec<TxOutput>> {
        self.send_and_wait(|tx| WorkerMessage::ValidateBlock(header, txs, tx))
            .await
    }

    /// Validates an externally produced block against its claimed payload.
    pub fn validate_block_blocking(
        &self,
        header: BlockHeader,
        txs: Vec<Transaction>,
    ) -> WorkerResult<Vec<TxOutput>> {
        self.send_and_wait_blocking(|tx| WorkerMessage::ValidateBlock(header, txs, tx))
    }
}

/// Input to the worker, reading requests from the handle.
pub struct ChainWorkerInput {
    msg_rx: mpsc::Receiver<WorkerMessage>,
}

impl ChainWorkerInput {
    pub(crate) fn recv_next(&mut self) -> Option<WorkerMessage> {
        self.msg_rx.blocking_recv()
    }
}
