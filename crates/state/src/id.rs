use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use chainweb_primitives::buf::Buf32;
use chainweb_primitives::impl_buf_wrapper;
use serde::{Deserialize, Serialize};

/// ID of a block, the hash of its header's canonical serialization.
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
pub struct BlockId(Buf32);

impl_buf_wrapper!(BlockId, Buf32, 32);

impl BlockId {
    /// Returns the all-zeroes id used as the genesis parent sentinel.
    pub fn null() -> Self {
        Self::from(Buf32::zero())
    }

    /// Checks to see if this is the sentinel "zero" id.
    pub fn is_null(&self) -> bool {
        self.0.is_zero()
    }
}
