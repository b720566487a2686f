//! Chain and network identity.
//!
//! A braided network runs many parallel chains; each header store instance is
//! scoped to one `(ChainId, ChainwebVersion)` pair.

use std::fmt;

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::buf::Buf32;
use crate::pow::Target;

/// Index of a chain within the network's chain graph.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Default,
    Arbitrary,
    BorshDeserialize,
    BorshSerialize,
    Serialize,
    Deserialize,
)]
pub struct ChainId(pub u32);

impl ChainId {
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chain{}", self.0)
    }
}

/// Network version, fixing the chain count and genesis parameters.
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
pub enum ChainwebVersion {
    Mainnet,
    Testnet,
    Devnet,
}

impl ChainwebVersion {
    /// Stable numeric code included in header hashing.
    pub fn code(self) -> u32 {
        match self {
            Self::Mainnet => 1,
            Self::Testnet => 2,
            Self::Devnet => 3,
        }
    }

    /// Number of parallel chains in this network's graph.
    pub fn chain_count(self) -> u32 {
        match self {
            Self::Mainnet => 20,
            Self::Testnet => 20,
            Self::Devnet => 4,
        }
    }

    /// PoW bound genesis blocks start from.  Devnet accepts every hash so
    /// tests and local networks never mine.
    pub fn genesis_target(self) -> Target {
        match self {
            Self::Mainnet | Self::Testnet => {
                let mut bound = [0u8; 32];
                // Leading 24 zero bits.
                bound[3] = 0xff;
                for b in bound.iter_mut().skip(4) {
                    *b = 0xff;
                }
                Target::from_be_buf(Buf32::from(bound))
            }
            Self::Devnet => Target::MAX,
        }
    }

    /// Creation time of genesis blocks, in micros since the epoch.
    pub fn genesis_time(self) -> u64 {
        match self {
            Self::Mainnet => 1_563_388_117_613_832,
            Self::Testnet => 1_563_388_117_613_832,
            Self::Devnet => 0,
        }
    }

    /// Checks that a chain id is part of this version's graph.
    pub fn contains_chain(self, chain: ChainId) -> bool {
        chain.0 < self.chain_count()
    }
}

impl fmt::Display for ChainwebVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Devnet => "devnet",
        };
        f.write_str(s)
    }
}
