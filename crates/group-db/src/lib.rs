//! Durable per-group state of a persona.
//!
//! [`GroupDb`] holds values that belong to a group account together with
//! the account's metadata; [`Db`] holds values that belong to no account.
//! In both, committing an action is the only way state changes.

mod data;
mod error;
mod group;

pub use data::Db;
pub use error::GroupDbError;
pub use group::{GroupContents, GroupDb};
