//! Proof-of-work target, difficulty, and cumulative weight arithmetic.
//!
//! All three are 256-bit quantities serialized as fixed 32-byte big-endian
//! values so the on-disk encoding sorts the same way the numbers do.

use std::fmt;
use std::ops::Add;

use ethnum::U256;
use serde::{Deserialize, Serialize};

use crate::buf::Buf32;

macro_rules! impl_u256_newtype {
    ($name:ident) => {
        impl $name {
            pub fn from_u256(v: U256) -> Self {
                Self(v)
            }

            pub fn to_u256(self) -> U256 {
                self.0
            }

            pub fn from_be_buf(buf: Buf32) -> Self {
                Self(U256::from_be_bytes(buf.into_inner()))
            }

            pub fn to_be_buf(self) -> Buf32 {
                Buf32::from(self.0.to_be_bytes())
            }
        }

        impl ::borsh::BorshSerialize for $name {
            fn serialize<W: ::std::io::Write>(&self, writer: &mut W) -> ::std::io::Result<()> {
                writer.write_all(&self.0.to_be_bytes())
            }
        }

        impl ::borsh::BorshDeserialize for $name {
            fn deserialize_reader<R: ::std::io::Read>(reader: &mut R) -> ::std::io::Result<Self> {
                let mut array = [0u8; 32];
                reader.read_exact(&mut array)?;
                Ok(Self(U256::from_be_bytes(array)))
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(
                &self,
                serializer: S,
            ) -> Result<S::Ok, S::Error> {
                self.to_be_buf().serialize(serializer)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(
                deserializer: D,
            ) -> Result<Self, D::Error> {
                Buf32::deserialize(deserializer).map(Self::from_be_buf)
            }
        }

        impl<'a> ::arbitrary::Arbitrary<'a> for $name {
            fn arbitrary(u: &mut ::arbitrary::Unstructured<'a>) -> ::arbitrary::Result<Self> {
                Buf32::arbitrary(u).map(Self::from_be_buf)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(&self.to_be_buf(), f)
            }
        }
    };
}

/// Upper bound a header's own hash must not exceed.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Target(U256);
impl_u256_newtype!(Target);

impl Target {
    /// The easiest possible target, met by every hash.
    pub const MAX: Target = Target(U256::MAX);

    /// Work represented by one hash attempt against this target.
    ///
    /// A zero target is unmeetable and maps to the max difficulty rather
    /// than dividing by zero.
    pub fn difficulty(self) -> Difficulty {
        if self.0 == U256::ZERO {
            Difficulty(U256::MAX)
        } else {
            Difficulty(U256::MAX / self.0)
        }
    }

    /// Checks a header hash against the target bound.
    pub fn is_met_by(self, hash: Buf32) -> bool {
        U256::from_be_bytes(hash.into_inner()) <= self.0
    }
}

/// Expected number of hash attempts a target represents.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Difficulty(U256);
impl_u256_newtype!(Difficulty);

/// Cumulative difficulty from genesis to a header, the fork-choice metric.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Weight(U256);
impl_u256_newtype!(Weight);

impl Weight {
    pub const ZERO: Weight = Weight(U256::ZERO);
}

impl Add<Difficulty> for Weight {
    type Output = Weight;

    fn add(self, rhs: Difficulty) -> Weight {
        Weight(self.0.saturating_add(rhs.0))
    }
}
