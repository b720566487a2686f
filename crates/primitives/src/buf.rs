use crate::macros::impl_buf;

// 32-byte buf, useful for hashes, PoW targets, and commitments.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Buf32(pub [u8; 32]);
impl_buf!(Buf32, 32);

// 64-byte buf, useful for signatures and larger digests.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Buf64(pub [u8; 64]);
impl_buf!(Buf64, 64);
