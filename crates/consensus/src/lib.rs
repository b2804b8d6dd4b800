//! Group consensus core.
//!
//! Every node of a group independently observes the same logical mutation
//! and proposes it to its peers. The pieces here turn those proposals into
//! exactly one agreed outcome:
//!
//! - [`SyncAccumulator`] collects per-key votes and emits an action once a
//!   quorum of distinct peers agree on it.
//! - [`Resolve`] is the per-persona policy that folds several peer-submitted
//!   values into one (majority vote or median).
//! - [`AccountTransferHandler`] rebuilds a key's value from peer snapshots
//!   after the group's membership changed.
//!
//! Nothing here is async: each operation is a short critical section behind
//! the instance's own mutex.

pub mod account_transfer;
pub mod resolution;
pub mod sync;
pub mod unresolved;

pub use account_transfer::{AccountTransferHandler, AddResult};
pub use resolution::{median, quorum, resolve_by_majority, Resolve, ResolutionError};
pub use sync::{Resolved, SyncAccumulator};
pub use unresolved::UnresolvedEntry;
