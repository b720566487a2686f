//! Durable entry types shared between the db traits and their impls.

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use chainweb_state::payload::PayloadHash;
use serde::{Deserialize, Serialize};

/// Key a checkpoint record is stored under.
///
/// Height comes first so the serialized key ordering is height-major and
/// range scans by height work on the raw table.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Arbitrary,
    BorshDeserialize,
    BorshSerialize,
    Serialize,
    Deserialize,
)]
pub struct CheckpointKey {
    height: u64,
    payload_hash: PayloadHash,
}

impl CheckpointKey {
    pub fn new(height: u64, payload_hash: PayloadHash) -> Self {
        Self {
            height,
            payload_hash,
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn payload_hash(&self) -> &PayloadHash {
        &self.payload_hash
    }
}

/// Serialized execution-state handle at rest: the backend segment file the
/// state lives in plus the counters needed to resume from it.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Serialize, Deserialize,
)]
pub struct CheckpointRecord {
    state_file: String,
    txid: u64,
    cmd_seq: u64,
}

impl CheckpointRecord {
    pub fn new(state_file: String, txid: u64, cmd_seq: u64) -> Self {
        Self {
            state_file,
            txid,
            cmd_seq,
        }
    }

    pub fn state_file(&self) -> &str {
        &self.state_file
    }

    pub fn txid(&self) -> u64 {
        self.txid
    }

    pub fn cmd_seq(&self) -> u64 {
        self.cmd_seq
    }
}
