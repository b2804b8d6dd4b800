//! Traits each persona implements for its records.
//!
//! A persona is a concrete choice of key, value, metadata and action types;
//! the consensus core and the group store are generic over these traits.

use core::fmt;
use core::hash::Hash;

use borsh::{BorshDeserialize, BorshSerialize};
use thiserror::Error;

use crate::identity::GroupName;

/// Identifier of a logical record within a group.
///
/// Independently derived keys are compared after a round trip through the
/// wire encoding, so `Ord`/`Eq` must agree with the encoded bytes.
pub trait Key:
    Clone + Ord + Hash + fmt::Debug + BorshSerialize + BorshDeserialize + Send + 'static
{
}

impl<T> Key for T where
    T: Clone + Ord + Hash + fmt::Debug + BorshSerialize + BorshDeserialize + Send + 'static
{
}

/// A key that belongs to a group account.
pub trait GroupKey: Key {
    fn group_name(&self) -> GroupName;
}

/// Stable wire-level discriminant of an action type.
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, BorshSerialize, BorshDeserialize,
)]
pub struct ActionId(u8);

impl ActionId {
    #[must_use]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action#{}", self.0)
    }
}

/// Identifier of the request that triggered a mutation.
///
/// Every group member derives the same id for the same request, and two
/// requests never share one, so repeated mutations of a key are told apart
/// from retransmissions of the same mutation.
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, BorshSerialize, BorshDeserialize,
)]
pub struct MessageId(u64);

impl MessageId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg#{}", self.0)
    }
}

/// A typed, serialisable state mutation proposed by group members.
pub trait Action:
    Clone + fmt::Debug + PartialEq + BorshSerialize + BorshDeserialize + Send + 'static
{
    fn action_id(&self) -> ActionId;
}

/// What the store must do with a value once an action has been applied to it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Disposition {
    Put,
    Delete,
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum ActionError {
    #[error("no such element")]
    NoSuchElement,

    #[error("element already exists")]
    AlreadyExists,

    #[error("invalid action: {0}")]
    Invalid(&'static str),
}

/// Per-group summary state kept alongside a group's values.
pub trait Metadata:
    Clone + fmt::Debug + BorshSerialize + BorshDeserialize + Send + 'static
{
    /// Fresh metadata for a group created by its first accepted write.
    fn new(group_name: GroupName) -> Self;

    /// Whether the group holds nothing worth keeping. An empty group is
    /// deleted together with the commit that emptied it.
    fn is_empty(&self) -> bool;
}

/// An action committed into a group account.
pub trait GroupAction<M, V>: Action {
    fn apply(&self, metadata: &mut M, value: &mut Option<V>) -> Result<Disposition, ActionError>;
}

/// An action committed into an ungrouped record.
pub trait DataAction<V>: Action {
    fn apply(&self, value: &mut Option<V>) -> Result<Disposition, ActionError>;
}

/// An action that changes only a group's metadata, such as a pmid node's
/// claimed free space.
pub trait MetadataAction<M>: Action {
    fn apply(&self, metadata: &mut M) -> Result<(), ActionError>;
}
