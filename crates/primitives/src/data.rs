use core::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Type tag carried next to a [`DataName`](crate::DataName) so that chunks
/// of different kinds with colliding names stay distinct records.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
#[borsh(use_discriminant = true)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
#[non_exhaustive]
pub enum DataTag {
    ImmutableData = 0,
    MutableData = 1,
    StructuredData = 2,
}

impl fmt::Display for DataTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ImmutableData => "immutable",
            Self::MutableData => "mutable",
            Self::StructuredData => "structured",
        };

        f.pad(name)
    }
}
