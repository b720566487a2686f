//! Transaction batches and the payload commitment.
//!
//! A block's payload hash commits to its ordered transaction batch *and* the
//! outputs execution produced for it, so replaying a batch against the wrong
//! parent state is always detectable.

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use chainweb_primitives::buf::Buf32;
use chainweb_primitives::{hash, impl_buf_wrapper};
use serde::{Deserialize, Serialize};

/// Commitment to a block's transaction batch and execution outputs.
#[derive(
    Copy,
    Clone,
    Eq,
    Default,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct PayloadHash(Buf32);

impl_buf_wrapper!(PayloadHash, Buf32, 32);

/// Opaque transaction record, ordered within its batch.  The execution
/// capability is the only thing that interprets the bytes.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Serialize, Deserialize,
)]
pub struct Transaction {
    raw: Vec<u8>,
}

impl Transaction {
    pub fn new(raw: Vec<u8>) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Hash of the raw command bytes, used as the command id.
    pub fn txid(&self) -> Buf32 {
        hash::raw(&self.raw)
    }
}

/// Whether a transaction applied or was rejected by the execution engine.
///
/// A rejected transaction still occupies its slot in the batch; rejection is
/// an output, not an abort.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Arbitrary,
    BorshDeserialize,
    BorshSerialize,
    Serialize,
    Deserialize,
)]
pub enum TxStatus {
    Applied,
    Rejected,
}

/// Per-transaction execution output.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Serialize, Deserialize,
)]
pub struct TxOutput {
    status: TxStatus,
    result: Vec<u8>,
    logs: Vec<Vec<u8>>,
}

impl TxOutput {
    pub fn applied(result: Vec<u8>, logs: Vec<Vec<u8>>) -> Self {
        Self {
            status: TxStatus::Applied,
            result,
            logs,
        }
    }

    pub fn rejected(reason: String) -> Self {
        Self {
            status: TxStatus::Rejected,
            result: reason.into_bytes(),
            logs: Vec::new(),
        }
    }

    pub fn status(&self) -> TxStatus {
        self.status
    }

    pub fn result(&self) -> &[u8] {
        &self.result
    }

    pub fn logs(&self) -> &[Vec<u8>] {
        &self.logs
    }
}

/// The material a payload hash commits to, in execution order.
#[derive(Clone, Debug, Eq, PartialEq, BorshDeserialize, BorshSerialize)]
pub struct PayloadBody {
    txs: Vec<Transaction>,
    outputs: Vec<TxOutput>,
}

impl PayloadBody {
    pub fn new(txs: Vec<Transaction>, outputs: Vec<TxOutput>) -> Self {
        Self { txs, outputs }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    pub fn txs(&self) -> &[Transaction] {
        &self.txs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    pub fn into_parts(self) -> (Vec<Transaction>, Vec<TxOutput>) {
        (self.txs, self.outputs)
    }

    /// Computes the payload commitment over the canonical serialization.
    pub fn commitment(&self) -> PayloadHash {
        PayloadHash::from(hash::compute_borsh_hash(self))
    }
}
