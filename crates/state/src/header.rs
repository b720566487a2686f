use std::io::{self, Cursor, Write};

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use chainweb_primitives::buf::Buf32;
use chainweb_primitives::chain::{ChainId, ChainwebVersion};
use chainweb_primitives::hash;
use chainweb_primitives::pow::{Target, Weight};
use serde::{Deserialize, Serialize};

use crate::id::BlockId;
use crate::payload::PayloadHash;

/// Block header that forms the per-chain tree we use to reach consensus.
///
/// The header's own id is always derived from [`compute_hash`] and never
/// stored alongside the fields it commits to.
///
/// [`compute_hash`]: BlockHeader::compute_hash
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Serialize, Deserialize,
)]
pub struct BlockHeader {
    /// Hash of the parent header, null for genesis.
    pub(crate) parent: BlockId,

    /// Commitment to the transaction batch and its execution outputs.
    pub(crate) payload_hash: PayloadHash,

    /// Distance from genesis, which sits at zero.
    pub(crate) height: u64,

    /// Creation timestamp in micros since the epoch.
    pub(crate) creation_time: u64,

    /// PoW bound this header's hash must satisfy.
    pub(crate) pow_target: Target,

    /// Cumulative difficulty along the path from genesis.
    pub(crate) weight: Weight,

    /// Solution counter found by mining.
    pub(crate) nonce: u64,

    /// Chain this header belongs to within the graph.
    pub(crate) chain_id: ChainId,

    /// Network version, fixing genesis parameters.
    pub(crate) version: ChainwebVersion,

    /// Opaque miner reward data.
    pub(crate) miner_data: Vec<u8>,
}

impl BlockHeader {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        parent: BlockId,
        payload_hash: PayloadHash,
        height: u64,
        creation_time: u64,
        pow_target: Target,
        weight: Weight,
        nonce: u64,
        chain_id: ChainId,
        version: ChainwebVersion,
        miner_data: Vec<u8>,
    ) -> Self {
        Self {
            parent,
            payload_hash,
            height,
            creation_time,
            pow_target,
            weight,
            nonce,
            chain_id,
            version,
            miner_data,
        }
    }

    /// Builds the header extending a parent, deriving height, weight, and
    /// target from it.
    pub fn new_child(
        parent: &BlockHeader,
        payload_hash: PayloadHash,
        creation_time: u64,
        nonce: u64,
        miner_data: Vec<u8>,
    ) -> Self {
        let pow_target = parent.pow_target;
        Self {
            parent: parent.compute_hash(),
            payload_hash,
            height: parent.height + 1,
            creation_time,
            pow_target,
            weight: parent.weight + pow_target.difficulty(),
            nonce,
            chain_id: parent.chain_id,
            version: parent.version,
            miner_data,
        }
    }

    /// Same header with a different nonce, for PoW search.
    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn parent(&self) -> &BlockId {
        &self.parent
    }

    pub fn payload_hash(&self) -> &PayloadHash {
        &self.payload_hash
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn creation_time(&self) -> u64 {
        self.creation_time
    }

    pub fn pow_target(&self) -> Target {
        self.pow_target
    }

    pub fn weight(&self) -> Weight {
        self.weight
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn version(&self) -> ChainwebVersion {
        self.version
    }

    pub fn miner_data(&self) -> &[u8] {
        &self.miner_data
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }

    /// Computes the header's content hash from the canonical fixed-width
    /// serialization of every field.
    pub fn compute_hash(&self) -> BlockId {
        // 32 + 32 + 8 + 8 + 32 + 32 + 8 + 4 + 4 + 32 = 192
        let mut buf = [0; 192];
        fill_hash_buf(self, &mut buf).expect("header: compute hash");
        BlockId::from(hash::raw(&buf))
    }

    /// Checks the header's own hash against its PoW target.
    pub fn check_pow(&self) -> bool {
        self.pow_target.is_met_by(self.compute_hash().into())
    }
}

fn fill_hash_buf(header: &BlockHeader, buf: &mut [u8]) -> Result<(), io::Error> {
    // Using a cursor here to avoid manually keeping track of indexes.  This
    // should all be optimized out to basically just memcopies.
    let mut cur = Cursor::new(&mut buf[..]);
    cur.write_all(Buf32::from(header.parent).as_ref())?;
    cur.write_all(Buf32::from(header.payload_hash).as_ref())?;
    cur.write_all(&header.height.to_be_bytes())?;
    cur.write_all(&header.creation_time.to_be_bytes())?;
    cur.write_all(header.pow_target.to_be_buf().as_ref())?;
    cur.write_all(header.weight.to_be_buf().as_ref())?;
    cur.write_all(&header.nonce.to_be_bytes())?;
    cur.write_all(&header.chain_id.value().to_be_bytes())?;
    cur.write_all(&header.version.code().to_be_bytes())?;
    // The one variable-width field enters through its own hash so the
    // buffer stays fixed-width.
    cur.write_all(hash::raw(&header.miner_data).as_ref())?;

    #[cfg(test)]
    if cur.position() as usize != buf.len() {
        panic!("header: did not exactly fill hash buffer");
    }

    Ok(())
}
