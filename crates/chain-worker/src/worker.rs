//! Chain worker task.
//!
//! Runs the restore -> execute -> save cycle for one chain.  The live state
//! handle is closed before any error escapes, so a failed cycle never leaves
//! a connection open or a half-linked checkpoint behind.

use std::sync::Arc;

use chainweb_checkpointer::{CheckpointError, Checkpointer, PactState};
use chainweb_db::traits::CheckpointDatabase;
use chainweb_primitives::chain::ChainId;
use chainweb_state::header::BlockHeader;
use chainweb_state::payload::{PayloadBody, Transaction, TxOutput};
use tracing::{debug, warn};

use crate::errors::ExecError;
use crate::handle::ChainWorkerInput;
use crate::message::{BlockEnv, BlockProposal, WorkerMessage};
use crate::traits::{ExecCapability, WorkerContext};
use crate::{WorkerError, WorkerResult};

/// Where the worker is within a cycle.  `Failed` is only observable between
/// a failed cycle and the next request; by the time it's set, the live
/// handle has already been closed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CyclePhase {
    Idle,
    Restoring,
    Executing,
    Saving,
    Failed,
}

/// Internal worker task state.
pub struct WorkerState<W, E, D>
where
    W: WorkerContext,
    E: ExecCapability,
    D: CheckpointDatabase,
{
    /// Header access for parent resolution.
    context: W,

    /// Execution capability we run batches through.
    exec: E,

    /// Checkpoint store for this chain's execution state.
    checkpointer: Arc<Checkpointer<D>>,

    /// Chain this worker drives.
    chain_id: ChainId,

    /// Current cycle phase.
    phase: CyclePhase,
}

impl<W, E, D> WorkerState<W, E, D>
where
    W: WorkerContext,
    E: ExecCapability,
    D: CheckpointDatabase,
{
    pub fn new(context: W, exec: E, checkpointer: Arc<Checkpointer<D>>, chain_id: ChainId) -> Self {
        Self {
            context,
            exec,
            checkpointer,
            chain_id,
            phase: CyclePhase::Idle,
        }
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Opens the execution state a block building on `parent` starts from.
    /// The genesis sentinel has no checkpoint; it gets a fresh state.
    fn open_parent_state(&mut self, parent: &BlockHeader) -> Result<PactState, CheckpointError> {
        self.phase = CyclePhase::Restoring;
        if parent.is_genesis() {
            self.checkpointer.initial_state()
        } else {
            self.checkpointer
                .restore(parent.height(), *parent.payload_hash())
        }
    }

    /// Runs a batch in order.  Transaction-level failures become rejected
    /// outputs; only an engine-fatal error aborts.
    fn exec_batch(
        &mut self,
        state: &mut PactState,
        txs: &[Transaction],
    ) -> WorkerResult<Vec<TxOutput>> {
        self.phase = CyclePhase::Executing;
        let mut outputs = Vec::with_capacity(txs.len());
        for tx in txs {
            match self.exec.apply(state, tx) {
                Ok(out) => outputs.push(out),
                Err(ExecError::Tx(reason)) => {
                    debug!(chain = %self.chain_id, txid = %tx.txid(), %reason, "tx rejected");
                    outputs.push(TxOutput::rejected(reason));
                }
                Err(ExecError::Fatal(msg)) => return Err(WorkerError::ExecFatal(msg)),
            }
        }
        Ok(outputs)
    }

    /// Builds a block candidate extending `parent` from a transaction
    /// batch.  Does not insert the header anywhere; that's the caller's
    /// step once PoW is satisfied.
    pub fn produce_block(
        &mut self,
        parent: &BlockHeader,
        env: &BlockEnv,
        txs: Vec<Transaction>,
    ) -> WorkerResult<BlockProposal> {
        let res = self.produce_inner(parent, env, txs);
        self.settle_cycle(res.is_ok());
        res
    }

    fn produce_inner(
        &mut self,
        parent: &BlockHeader,
        env: &BlockEnv,
        txs: Vec<Transaction>,
    ) -> WorkerResult<BlockProposal> {
        let mut state = self.open_parent_state(parent)?;

        let outputs = match self.exec_batch(&mut state, &txs) {
            Ok(outputs) => outputs,
            Err(e) => {
                self.checkpointer.discard(state);
                return Err(e);
            }
        };

        let body = PayloadBody::new(txs, outputs);
        let payload_hash = body.commitment();
        let header = BlockHeader::new_child(
            parent,
            payload_hash,
            env.creation_time,
            0,
            env.miner_data.clone(),
        );

        self.phase = CyclePhase::Saving;
        self.checkpointer
            .save(header.height(), payload_hash, state)?;

        debug!(chain = %self.chain_id, height = header.height(), "produced block candidate");
        let (_, outputs) = body.into_parts();
        Ok(BlockProposal::new(header, outputs))
    }

    /// Replays an externally produced block against its parent state and
    /// checks the computed commitment against the header's claim.
    pub fn validate_block(
        &mut self,
        header: &BlockHeader,
        txs: Vec<Transaction>,
    ) -> WorkerResult<Vec<TxOutput>> {
        let res = self.validate_inner(header, txs);
        self.settle_cycle(res.is_ok());
        res
    }

    fn validate_inner(
        &mut self,
        header: &BlockHeader,
        txs: Vec<Transaction>,
    ) -> WorkerResult<Vec<TxOutput>> {
        let block_id = header.compute_hash();

        let parent = self
            .context
            .fetch_header(header.parent())?
            .ok_or(WorkerError::OutOfOrder(*header.parent()))?;

        if header.height() != parent.height() + 1 {
            return Err(WorkerError::InvalidHeader(block_id));
        }

        let mut state = match self.open_parent_state(&parent) {
            Ok(state) => state,
            // The parent is indexed but its state hasn't been computed yet.
            // Same signal as a missing parent: come back later.
            Err(CheckpointError::RestoreNotFound(_, _)) => {
                return Err(WorkerError::OutOfOrder(*header.parent()))
            }
            Err(e) => return Err(e.into()),
        };

        let outputs = match self.exec_batch(&mut state, &txs) {
            Ok(outputs) => outputs,
            Err(e) => {
                self.checkpointer.discard(state);
                return Err(e);
            }
        };

        let body = PayloadBody::new(txs, outputs);
        let computed = body.commitment();
        if computed != *header.payload_hash() {
            self.checkpointer.discard(state);
            return Err(WorkerError::PayloadMismatch(
                block_id,
                *header.payload_hash(),
                computed,
            ));
        }

        // A fork re-deriving a payload we've already recorded lands on the
        // same key with byte-equal content; the save absorbs it.
        self.phase = CyclePhase::Saving;
        self.checkpointer.save(header.height(), computed, state)?;

        debug!(chain = %self.chain_id, height = header.height(), "validated block");
        let (_, outputs) = body.into_parts();
        Ok(outputs)
    }

    fn settle_cycle(&mut self, ok: bool) {
        if ok {
            self.phase = CyclePhase::Idle;
        } else {
            // Every error path above has already closed the live handle, so
            // Failed is safe to leave from on the next request.
            warn!(chain = %self.chain_id, "cycle failed");
            self.phase = CyclePhase::Failed;
        }
    }
}

pub fn worker_task<W, E, D>(
    mut state: WorkerState<W, E, D>,
    mut input: ChainWorkerInput,
) -> anyhow::Result<()>
where
    W: WorkerContext,
    E: ExecCapability,
    D: CheckpointDatabase,
{
    while let Some(m) = input.recv_next() {
        match m {
            WorkerMessage::ProduceBlock(parent, env, txs, completion) => {
                let res = state.produce_block(&parent, &env, txs);
                let _ = completion.send(res);
            }
            WorkerMessage::ValidateBlock(header, txs, completion) => {
                let res = state.validate_block(&header, txs);
                let _ = completion.send(res);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chainweb_checkpointer::StateBackend;
    use chainweb_consensus_logic::HeaderStore;
    use chainweb_rocksdb::test_utils::get_rocksdb_tmp_instance;
    use chainweb_rocksdb::{CheckpointDb, HeaderDb};
    use chainweb_state::payload::TxStatus;
    use chainweb_test_utils::chain::gen_genesis;
    use tempfile::TempDir;

    use super::*;
    use crate::handle::worker_channel;
    use crate::stub::StubExec;

    type TestWorker = WorkerState<Arc<HeaderStore<HeaderDb>>, StubExec, CheckpointDb>;

    struct Harness {
        store: Arc<HeaderStore<HeaderDb>>,
        checkpointer: Arc<Checkpointer<CheckpointDb>>,
        genesis: BlockHeader,
        _dir: TempDir,
    }

    fn setup() -> (TestWorker, Harness) {
        let (db, ops) = get_rocksdb_tmp_instance().unwrap();
        let hdb = Arc::new(HeaderDb::new(db.clone(), ops));
        let cdb = Arc::new(CheckpointDb::new(db, ops));

        let genesis = gen_genesis(0);
        let store = Arc::new(HeaderStore::initialize(hdb, genesis.clone()).unwrap());

        let dir = TempDir::new().unwrap();
        let checkpointer =
            Arc::new(Checkpointer::new(cdb, StateBackend::new_file(), dir.path()).unwrap());

        let worker = WorkerState::new(
            store.clone(),
            StubExec,
            checkpointer.clone(),
            genesis.chain_id(),
        );

        (
            worker,
            Harness {
                store,
                checkpointer,
                genesis,
                _dir: dir,
            },
        )
    }

    fn env(t: u64) -> BlockEnv {
        BlockEnv {
            creation_time: t,
            miner_data: Vec::new(),
        }
    }

    fn tx(b: &[u8]) -> Transaction {
        Transaction::new(b.to_vec())
    }

    #[test]
    fn test_produce_empty_batch_on_genesis() {
        let (mut worker, h) = setup();

        let proposal = worker
            .produce_block(&h.genesis, &env(1), Vec::new())
            .unwrap();

        let header = proposal.header();
        assert_eq!(header.height(), 1);
        assert_eq!(*header.parent(), h.genesis.compute_hash());
        assert_eq!(*header.payload_hash(), PayloadBody::empty().commitment());
        assert_eq!(worker.phase(), CyclePhase::Idle);
        assert_eq!(h.checkpointer.open_connections(), 0);

        // The saved state has nothing applied beyond genesis.
        let state = h
            .checkpointer
            .restore(1, *header.payload_hash())
            .unwrap();
        assert_eq!(state.txid(), 0);
        assert_eq!(state.entry_count(), 0);
        h.checkpointer.discard(state);
    }

    #[test]
    fn test_produce_then_validate_roundtrip() {
        let (mut worker, h) = setup();
        let batch = vec![tx(b"transfer a"), tx(b"transfer b")];

        let proposal = worker
            .produce_block(&h.genesis, &env(1), batch.clone())
            .unwrap();
        assert_eq!(proposal.outputs().len(), 2);

        // A peer hands us the same block; replay must agree with the
        // claimed commitment, and the duplicate save is absorbed.
        let outputs = worker
            .validate_block(proposal.header(), batch)
            .unwrap();
        assert_eq!(outputs, proposal.outputs());
        assert_eq!(worker.phase(), CyclePhase::Idle);
        assert_eq!(h.checkpointer.open_connections(), 0);
    }

    #[test]
    fn test_extend_chain_across_heights() {
        let (mut worker, h) = setup();

        let p1 = worker
            .produce_block(&h.genesis, &env(1), vec![tx(b"one")])
            .unwrap();
        h.store.insert(p1.header().clone()).unwrap();

        let p2 = worker
            .produce_block(p1.header(), &env(2), vec![tx(b"two")])
            .unwrap();
        assert_eq!(p2.header().height(), 2);

        // Saved state at height 2 reflects both applied txs.
        let state = h
            .checkpointer
            .restore(2, *p2.header().payload_hash())
            .unwrap();
        assert_eq!(state.txid(), 2);
        assert_eq!(state.entry_count(), 2);
        h.checkpointer.discard(state);
    }

    #[test]
    fn test_validate_out_of_order_then_retry() {
        let (mut worker, h) = setup();

        let p1 = worker
            .produce_block(&h.genesis, &env(1), vec![tx(b"one")])
            .unwrap();
        let p2 = worker
            .produce_block(p1.header(), &env(2), vec![tx(b"two")])
            .unwrap();

        // Fresh node state: only genesis indexed, child states unknown.
        let (db, ops) = get_rocksdb_tmp_instance().unwrap();
        let hdb = Arc::new(HeaderDb::new(db.clone(), ops));
        let cdb = Arc::new(CheckpointDb::new(db, ops));
        let store = Arc::new(HeaderStore::initialize(hdb, h.genesis.clone()).unwrap());
        let dir = TempDir::new().unwrap();
        let ckpt = Arc::new(Checkpointer::new(cdb, StateBackend::new_file(), dir.path()).unwrap());
        let mut fresh = WorkerState::new(store.clone(), StubExec, ckpt.clone(), h.genesis.chain_id());

        // Grandchild before child: parent header unknown.
        let res = fresh.validate_block(p2.header(), vec![tx(b"two")]);
        assert!(matches!(res, Err(WorkerError::OutOfOrder(_))));
        assert_eq!(fresh.phase(), CyclePhase::Failed);
        assert_eq!(ckpt.open_connections(), 0);

        // Catch up in order and the retry succeeds.
        fresh.validate_block(p1.header(), vec![tx(b"one")]).unwrap();
        store.insert(p1.header().clone()).unwrap();
        fresh.validate_block(p2.header(), vec![tx(b"two")]).unwrap();
        assert_eq!(fresh.phase(), CyclePhase::Idle);
    }

    #[test]
    fn test_validate_parent_indexed_but_not_executed() {
        let (mut worker, h) = setup();

        let p1 = worker
            .produce_block(&h.genesis, &env(1), vec![tx(b"one")])
            .unwrap();
        let p2 = worker
            .produce_block(p1.header(), &env(2), vec![tx(b"two")])
            .unwrap();

        // Index p1's header on a node that never executed it.
        let (db, ops) = get_rocksdb_tmp_instance().unwrap();
        let hdb = Arc::new(HeaderDb::new(db.clone(), ops));
        let cdb = Arc::new(CheckpointDb::new(db, ops));
        let store = Arc::new(HeaderStore::initialize(hdb, h.genesis.clone()).unwrap());
        store.insert(p1.header().clone()).unwrap();
        let dir = TempDir::new().unwrap();
        let ckpt = Arc::new(Checkpointer::new(cdb, StateBackend::new_file(), dir.path()).unwrap());
        let mut fresh = WorkerState::new(store, StubExec, ckpt.clone(), h.genesis.chain_id());

        let res = fresh.validate_block(p2.header(), vec![tx(b"two")]);
        assert!(matches!(res, Err(WorkerError::OutOfOrder(_))));
        assert_eq!(ckpt.open_connections(), 0);
    }

    #[test]
    fn test_validate_payload_mismatch() {
        let (mut worker, h) = setup();

        let proposal = worker
            .produce_block(&h.genesis, &env(1), vec![tx(b"real")])
            .unwrap();

        // Same header, different batch: commitment can't match.
        let res = worker.validate_block(proposal.header(), vec![tx(b"forged")]);
        assert!(matches!(res, Err(WorkerError::PayloadMismatch(_, _, _))));
        assert_eq!(worker.phase(), CyclePhase::Failed);
        assert_eq!(h.checkpointer.open_connections(), 0);

        // The failure didn't corrupt anything; the real block validates.
        worker
            .validate_block(proposal.header(), vec![tx(b"real")])
            .unwrap();
        assert_eq!(worker.phase(), CyclePhase::Idle);
    }

    #[test]
    fn test_engine_fatal_closes_handle() {
        let (mut worker, h) = setup();

        let res = worker.produce_block(&h.genesis, &env(1), vec![tx(b"!fatal boom")]);
        assert!(matches!(res, Err(WorkerError::ExecFatal(_))));
        assert_eq!(worker.phase(), CyclePhase::Failed);
        assert_eq!(h.checkpointer.open_connections(), 0);

        // Failed -> Idle via the next cycle.
        worker
            .produce_block(&h.genesis, &env(2), Vec::new())
            .unwrap();
        assert_eq!(worker.phase(), CyclePhase::Idle);
    }

    #[test]
    fn test_tx_rejection_recorded_not_aborting() {
        let (mut worker, h) = setup();

        let proposal = worker
            .produce_block(
                &h.genesis,
                &env(1),
                vec![tx(b"good one"), tx(b"!bad nope"), tx(b"good two")],
            )
            .unwrap();

        let statuses: Vec<_> = proposal.outputs().iter().map(|o| o.status()).collect();
        assert_eq!(
            statuses,
            vec![TxStatus::Applied, TxStatus::Rejected, TxStatus::Applied]
        );
    }

    #[test]
    fn test_single_connection_during_execution() {
        struct GaugedExec {
            ckpt: Arc<Checkpointer<CheckpointDb>>,
        }

        impl ExecCapability for GaugedExec {
            fn apply(
                &self,
                state: &mut PactState,
                tx: &Transaction,
            ) -> Result<TxOutput, ExecError> {
                assert_eq!(self.ckpt.open_connections(), 1);
                StubExec.apply(state, tx)
            }
        }

        let (_, h) = setup();
        let mut worker = WorkerState::new(
            h.store.clone(),
            GaugedExec {
                ckpt: h.checkpointer.clone(),
            },
            h.checkpointer.clone(),
            h.genesis.chain_id(),
        );

        worker
            .produce_block(&h.genesis, &env(1), vec![tx(b"a"), tx(b"b")])
            .unwrap();
        assert_eq!(h.checkpointer.open_connections(), 0);
    }

    #[test]
    fn test_handle_roundtrip_blocking() {
        let (worker, h) = setup();
        let (handle, input) = worker_channel(8);

        let join = std::thread::spawn(move || worker_task(worker, input));

        let proposal = handle
            .produce_block_blocking(h.genesis.clone(), env(1), vec![tx(b"via handle")])
            .unwrap();
        assert_eq!(proposal.header().height(), 1);

        let outputs = handle
            .validate_block_blocking(proposal.header().clone(), vec![tx(b"via handle")])
            .unwrap();
        assert_eq!(outputs.len(), 1);

        drop(handle);
        join.join().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_handle_roundtrip_async() {
        let (worker, h) = setup();
        let (handle, input) = worker_channel(8);

        let join = std::thread::spawn(move || worker_task(worker, input));

        let proposal = handle
            .produce_block(h.genesis.clone(), env(1), Vec::new())
            .await
            .unwrap();
        assert_eq!(proposal.header().height(), 1);

        drop(handle);
        join.join().unwrap().unwrap();
    }

    #[test]
    fn test_handle_worker_exited() {
        let (handle, input) = worker_channel(1);
        drop(input);

        let (_, h) = setup();
        let res = handle.produce_block_blocking(h.genesis.clone(), env(1), Vec::new());
        assert!(matches!(res, Err(WorkerError::WorkerExited)));
    }
}
