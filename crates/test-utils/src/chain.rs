//! Generators for structurally valid header chains on the devnet version,
//! whose trivial PoW target means generated headers genuinely pass the
//! hash-vs-target check without real mining.

use chainweb_primitives::chain::{ChainId, ChainwebVersion};
use chainweb_state::genesis::make_genesis_header;
use chainweb_state::header::BlockHeader;
use chainweb_state::payload::{PayloadBody, Transaction};

pub fn gen_genesis(chain: u32) -> BlockHeader {
    make_genesis_header(ChainwebVersion::Devnet, ChainId(chain))
}

/// Searches nonces until the header meets its own target.  On devnet this
/// returns on the first try.
pub fn mine(header: BlockHeader) -> BlockHeader {
    let mut nonce = 0u64;
    loop {
        let candidate = header.clone().with_nonce(nonce);
        if candidate.check_pow() {
            return candidate;
        }
        nonce += 1;
    }
}

/// Generates a valid child whose payload is derived from `seed`, so distinct
/// seeds produce distinct siblings.
pub fn gen_child(parent: &BlockHeader, seed: u64) -> BlockHeader {
    let body = PayloadBody::new(
        vec![Transaction::new(seed.to_be_bytes().to_vec())],
        Vec::new(),
    );
    let header = BlockHeader::new_child(
        parent,
        body.commitment(),
        parent.creation_time() + 1,
        0,
        Vec::new(),
    );
    mine(header)
}

/// Generates a chain of `n` valid blocks descending from `parent`, seeds
/// offset so parallel calls with different bases produce disjoint payloads.
pub fn gen_chain(parent: &BlockHeader, n: usize, seed_base: u64) -> Vec<BlockHeader> {
    let mut out = Vec::with_capacity(n);
    let mut cur = parent.clone();
    for i in 0..n {
        let child = gen_child(&cur, seed_base + i as u64);
        out.push(child.clone());
        cur = child;
    }
    out
}
