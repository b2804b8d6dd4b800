#[cfg(test)]
#[path = "tests/identity.rs"]
mod tests;

use core::fmt;
use core::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use thiserror::Error;

pub const ID_LEN: usize = 32;

#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum IdError {
    #[error("invalid identifier length")]
    InvalidLength,

    #[error("invalid base58")]
    DecodeError(#[from] bs58::decode::Error),
}

fn decode(s: &str) -> Result<[u8; ID_LEN], IdError> {
    let mut bytes = [0; ID_LEN];

    match bs58::decode(s).onto(&mut bytes) {
        Ok(len) if len == ID_LEN => Ok(bytes),
        Ok(_) => Err(IdError::InvalidLength),
        Err(bs58::decode::Error::BufferTooSmall) => Err(IdError::InvalidLength),
        Err(err) => Err(IdError::DecodeError(err)),
    }
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd, BorshSerialize, BorshDeserialize,
        )]
        pub struct $name([u8; ID_LEN]);

        impl $name {
            #[must_use]
            pub const fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
                Self(bytes)
            }

            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; ID_LEN] {
                &self.0
            }
        }

        impl From<[u8; ID_LEN]> for $name {
            fn from(bytes: [u8; ID_LEN]) -> Self {
                Self(bytes)
            }
        }

        impl From<$name> for [u8; ID_LEN] {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&bs58::encode(&self.0).into_string())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name))
                    .field(&bs58::encode(&self.0).into_string())
                    .finish()
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode(s).map(Self)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                struct IdVisitor;

                impl serde::de::Visitor<'_> for IdVisitor {
                    type Value = $name;

                    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                        formatter.write_str(concat!("a base58 encoded ", stringify!($name)))
                    }

                    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
                        v.parse().map_err(E::custom)
                    }
                }

                deserializer.deserialize_str(IdVisitor)
            }
        }
    };
}

define_id! {
    /// Identity of a vault node in the overlay.
    ///
    /// Peers are compared by their raw bytes, so a `NodeId` decoded from a
    /// sync message compares equal to the one the sender derived locally.
    NodeId
}

define_id! {
    /// Name of a group account held by a persona, e.g. the pmid node a
    /// PmidManager account tracks, or the client a MaidManager account
    /// belongs to.
    GroupName
}

impl From<NodeId> for GroupName {
    fn from(node: NodeId) -> Self {
        Self(node.0)
    }
}

impl From<GroupName> for NodeId {
    fn from(group: GroupName) -> Self {
        Self(group.0)
    }
}

define_id! {
    /// Content address of a stored chunk.
    DataName
}
