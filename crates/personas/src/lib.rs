//! Concrete personas built on the consensus core.
//!
//! Each persona picks its key, value, metadata and action types and plugs
//! them into one of the generic services in [`service`]:
//!
//! - [`data_manager`] tracks which pmid nodes hold each chunk (ungrouped).
//! - [`pmid_manager`] accounts for what one storage node holds.
//! - [`maid_manager`] accounts for what one client has stored.

pub mod data_manager;
pub mod maid_manager;
pub mod pmid_manager;
pub mod service;

pub use service::{DataService, GroupService, ServiceError, TransferValue};
