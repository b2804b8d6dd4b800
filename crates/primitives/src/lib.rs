//! Shared vocabulary of the vault consensus core.
//!
//! Every persona (DataManager, PmidManager, MaidManager, ...) describes its
//! records with the traits in [`action`] and names peers, groups and data with
//! the identifiers in [`identity`] and [`data`]. Everything that crosses the
//! wire goes through [`codec`].

pub mod action;
pub mod codec;
pub mod data;
pub mod identity;

pub use action::{
    Action, ActionError, ActionId, DataAction, Disposition, GroupAction, GroupKey, Key, MessageId,
    Metadata, MetadataAction,
};
pub use codec::{parse, serialise, CodecError};
pub use data::DataTag;
pub use identity::{DataName, GroupName, NodeId};
