//! Wire encoding for keys, actions and values.
//!
//! Peers vote by comparing what they decoded from each other's messages, so
//! the encoding must round-trip bit-identically. Borsh is canonical for every
//! type we exchange (no maps with unordered iteration, no floats).

use std::io;

use borsh::{BorshDeserialize, BorshSerialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    #[error("failed to serialise {kind}: {source}")]
    Serialisation {
        kind: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {kind}: {source}")]
    Parsing {
        kind: &'static str,
        #[source]
        source: io::Error,
    },
}

impl CodecError {
    #[must_use]
    pub const fn is_parsing(&self) -> bool {
        matches!(self, Self::Parsing { .. })
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let name = core::any::type_name::<T>();

    name.rsplit("::").next().unwrap_or(name)
}

pub fn serialise<T: BorshSerialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    borsh::to_vec(value).map_err(|source| CodecError::Serialisation {
        kind: short_type_name::<T>(),
        source,
    })
}

/// Parses `bytes` as a `T`, rejecting trailing bytes.
pub fn parse<T: BorshDeserialize>(bytes: &[u8]) -> Result<T, CodecError> {
    borsh::from_slice(bytes).map_err(|source| CodecError::Parsing {
        kind: short_type_name::<T>(),
        source,
    })
}
