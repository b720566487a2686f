//! Genesis header construction.
//!
//! Each `(version, chain)` pair has exactly one genesis header, derived
//! entirely from the version parameters so every node agrees on it without
//! exchanging anything.

use chainweb_primitives::chain::{ChainId, ChainwebVersion};
use chainweb_primitives::pow::Weight;

use crate::header::BlockHeader;
use crate::id::BlockId;
use crate::payload::PayloadBody;

/// Builds the genesis header for a chain.  Height zero, null parent, zero
/// weight, and the payload commitment of an empty batch.
pub fn make_genesis_header(version: ChainwebVersion, chain_id: ChainId) -> BlockHeader {
    BlockHeader::new(
        BlockId::null(),
        PayloadBody::empty().commitment(),
        0,
        version.genesis_time(),
        version.genesis_target(),
        Weight::ZERO,
        0,
        chain_id,
        version,
        Vec::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_shape() {
        let g = make_genesis_header(ChainwebVersion::Devnet, ChainId(2));
        assert!(g.is_genesis());
        assert!(g.parent().is_null());
        assert_eq!(g.weight(), Weight::ZERO);
        assert_eq!(g.chain_id(), ChainId(2));
    }

    #[test]
    fn test_genesis_distinct_per_chain() {
        let a = make_genesis_header(ChainwebVersion::Devnet, ChainId(0));
        let b = make_genesis_header(ChainwebVersion::Devnet, ChainId(1));
        assert_ne!(a.compute_hash(), b.compute_hash());
    }

    #[test]
    fn test_genesis_distinct_per_version() {
        let a = make_genesis_header(ChainwebVersion::Devnet, ChainId(0));
        let b = make_genesis_header(ChainwebVersion::Testnet, ChainId(0));
        assert_ne!(a.compute_hash(), b.compute_hash());
    }
}
