//! Routing between the consensus core and a persona's store.
//!
//! A service owns one [`SyncAccumulator`] for the persona's actions, the
//! persona's store, and the [`AccountTransferHandler`]s that rebuild state
//! after churn. Resolved output is committed before the call returns; the
//! caller only decodes messages and authenticates their sender.

#[cfg(test)]
#[path = "tests/service.rs"]
mod tests;

use core::fmt::{self, Debug, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use vault_config::ConsensusConfig;
use vault_consensus::{
    AccountTransferHandler, AddResult, Resolve, Resolved, SyncAccumulator, UnresolvedEntry,
};
use vault_group_db::{Db, GroupContents, GroupDb, GroupDbError};
use vault_primitives::{
    parse, CodecError, DataAction, Disposition, GroupAction, GroupKey, GroupName, Key, MessageId,
    Metadata, NodeId,
};
use vault_store::Store;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("malformed sync message: {0}")]
    Malformed(#[source] CodecError),

    #[error(transparent)]
    Store(#[from] GroupDbError),
}

/// A group value that can be installed from an account transfer.
pub trait TransferValue<M>: Resolve + Clone + BorshSerialize + BorshDeserialize {
    /// Updates `metadata` for `self` replacing `previous`.
    fn account(&self, metadata: &mut M, previous: Option<&Self>);
}

/// Decodes a peer's sync payload. The vote is always attributed to the
/// authenticated `sender`, whatever peer the payload names.
fn decode_entry<K, A>(payload: &[u8], sender: NodeId) -> Result<UnresolvedEntry<K, A>, ServiceError>
where
    K: BorshDeserialize,
    A: BorshDeserialize,
{
    let entry: UnresolvedEntry<K, A> = parse(payload).map_err(|err| {
        warn!(%sender, %err, "Dropping malformed sync message");
        ServiceError::Malformed(err)
    })?;

    Ok(UnresolvedEntry::new(
        entry.key,
        entry.action,
        entry.message_id,
        sender,
    ))
}

/// Commits `resolved` with `commit`.
///
/// Every holder applies the same agreed action to the same state, so an
/// action the store rejects is rejected group-wide; it is logged and the
/// round still counts as resolved.
fn commit_resolved<K, A, F>(
    resolved: Option<Resolved<K, A>>,
    commit: F,
) -> Result<Option<Resolved<K, A>>, ServiceError>
where
    K: Debug,
    A: Debug,
    F: FnOnce(&K, &A) -> Result<(), GroupDbError>,
{
    let Some(resolved) = resolved else {
        return Ok(None);
    };

    match commit(&resolved.key, &resolved.action) {
        Ok(()) => debug!(key = ?resolved.key, action = ?resolved.action, "Committed agreed action"),
        Err(GroupDbError::Action(err)) => {
            warn!(key = ?resolved.key, action = ?resolved.action, %err, "Agreed action rejected");
        }
        Err(err) => return Err(err.into()),
    }

    Ok(Some(resolved))
}

/// A persona whose records live in group accounts.
pub struct GroupService<K, A, V, M> {
    sync: SyncAccumulator<K, A>,
    db: GroupDb<K, V, M>,
    value_transfers: AccountTransferHandler<K, V>,
    metadata_transfers: AccountTransferHandler<GroupName, M>,
}

impl<K: Debug, A: Debug, V, M> Debug for GroupService<K, A, V, M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupService")
            .field("sync", &self.sync)
            .field("db", &self.db)
            .finish_non_exhaustive()
    }
}

impl<K, A, V, M> GroupService<K, A, V, M>
where
    K: GroupKey,
    A: GroupAction<M, V>,
    V: TransferValue<M>,
    M: Metadata + Resolve,
{
    pub fn new(this_node: NodeId, config: &ConsensusConfig, store: Store) -> Result<Self, ServiceError> {
        Ok(Self {
            sync: SyncAccumulator::new(this_node, config),
            db: GroupDb::open(store)?,
            value_transfers: AccountTransferHandler::new(config),
            metadata_transfers: AccountTransferHandler::new(config),
        })
    }

    #[must_use]
    pub const fn db(&self) -> &GroupDb<K, V, M> {
        &self.db
    }

    #[must_use]
    pub const fn sync(&self) -> &SyncAccumulator<K, A> {
        &self.sync
    }

    /// Votes for an action this node observed itself while handling the
    /// request `message_id`.
    pub fn propose(
        &self,
        key: K,
        action: A,
        message_id: MessageId,
    ) -> Result<Option<Resolved<K, A>>, ServiceError> {
        let resolved = self.sync.add_local_action(key, action, message_id);

        commit_resolved(resolved, |key, action| self.db.commit(key, action))
    }

    /// Records a peer's vote, committing the action once it resolves.
    pub fn handle_sync(
        &self,
        entry: UnresolvedEntry<K, A>,
    ) -> Result<Option<Resolved<K, A>>, ServiceError> {
        let resolved = self.sync.add_unresolved_action(entry);

        commit_resolved(resolved, |key, action| self.db.commit(key, action))
    }

    pub fn handle_sync_message(
        &self,
        payload: &[u8],
        sender: NodeId,
    ) -> Result<Option<Resolved<K, A>>, ServiceError> {
        self.handle_sync(decode_entry(payload, sender)?)
    }

    /// Entries to rebroadcast this round.
    #[must_use]
    pub fn unresolved_for_rebroadcast(&self) -> Vec<UnresolvedEntry<K, A>> {
        self.sync.get_unresolved_actions()
    }

    /// Moves `old`'s in-flight votes to `new` after churn.
    pub fn handle_node_replaced(&self, old: NodeId, new: NodeId) {
        self.sync.replace_node(old, new);
    }

    /// Records `source`'s copy of `key` and installs the agreed value.
    pub fn handle_value_transfer(
        &self,
        key: K,
        value: V,
        source: NodeId,
    ) -> Result<AddResult<V>, ServiceError> {
        let result = self.value_transfers.add(key.clone(), value, source);

        if let AddResult::Success(ref value) = result {
            self.db.commit_with(&key, |metadata, current| {
                value.account(metadata, current.as_ref());
                *current = Some(value.clone());

                Ok(Disposition::Put)
            })?;

            info!(?key, "Installed transferred value");
        }

        Ok(result)
    }

    /// Records `source`'s copy of a group's metadata and installs the
    /// agreed one. The account must already exist.
    pub fn handle_metadata_transfer(
        &self,
        group_name: GroupName,
        metadata: M,
        source: NodeId,
    ) -> Result<AddResult<M>, ServiceError> {
        let result = self.metadata_transfers.add(group_name, metadata, source);

        if let AddResult::Success(ref metadata) = result {
            self.db.commit_metadata(group_name, |current| {
                *current = metadata.clone();

                Ok(())
            })?;

            info!(%group_name, "Installed transferred metadata");
        }

        Ok(result)
    }

    /// The account to hand over to a node joining the group.
    pub fn account_snapshot(
        &self,
        group_name: GroupName,
    ) -> Result<GroupContents<K, V, M>, ServiceError> {
        Ok(self.db.get_contents(group_name)?)
    }

    /// Sweeps transfers that never completed. Returns how many were dropped.
    pub fn prune_transfers(&self) -> usize {
        self.value_transfers
            .prune()
            .saturating_add(self.metadata_transfers.prune())
    }
}

/// A persona whose records belong to no group.
pub struct DataService<K, A, V> {
    sync: SyncAccumulator<K, A>,
    db: Db<K, V>,
    transfers: AccountTransferHandler<K, V>,
}

impl<K: Debug, A: Debug, V> Debug for DataService<K, A, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataService")
            .field("sync", &self.sync)
            .finish_non_exhaustive()
    }
}

impl<K, A, V> DataService<K, A, V>
where
    K: Key,
    A: DataAction<V>,
    V: Resolve + Clone + BorshSerialize + BorshDeserialize,
{
    #[must_use]
    pub fn new(this_node: NodeId, config: &ConsensusConfig, store: Store) -> Self {
        Self {
            sync: SyncAccumulator::new(this_node, config),
            db: Db::new(store),
            transfers: AccountTransferHandler::new(config),
        }
    }

    #[must_use]
    pub const fn db(&self) -> &Db<K, V> {
        &self.db
    }

    #[must_use]
    pub const fn sync(&self) -> &SyncAccumulator<K, A> {
        &self.sync
    }

    pub fn propose(
        &self,
        key: K,
        action: A,
        message_id: MessageId,
    ) -> Result<Option<Resolved<K, A>>, ServiceError> {
        let resolved = self.sync.add_local_action(key, action, message_id);

        commit_resolved(resolved, |key, action| self.db.commit(key, action))
    }

    pub fn handle_sync(
        &self,
        entry: UnresolvedEntry<K, A>,
    ) -> Result<Option<Resolved<K, A>>, ServiceError> {
        let resolved = self.sync.add_unresolved_action(entry);

        commit_resolved(resolved, |key, action| self.db.commit(key, action))
    }

    pub fn handle_sync_message(
        &self,
        payload: &[u8],
        sender: NodeId,
    ) -> Result<Option<Resolved<K, A>>, ServiceError> {
        self.handle_sync(decode_entry(payload, sender)?)
    }

    #[must_use]
    pub fn unresolved_for_rebroadcast(&self) -> Vec<UnresolvedEntry<K, A>> {
        self.sync.get_unresolved_actions()
    }

    pub fn handle_node_replaced(&self, old: NodeId, new: NodeId) {
        self.sync.replace_node(old, new);
    }

    /// Records `source`'s copy of `key`; the agreed copy replaces whatever
    /// is held.
    pub fn handle_value_transfer(
        &self,
        key: K,
        value: V,
        source: NodeId,
    ) -> Result<AddResult<V>, ServiceError> {
        let result = self.transfers.add(key.clone(), value, source);

        if let AddResult::Success(ref value) = result {
            self.db.commit_with(&key, |current| {
                *current = Some(value.clone());

                Ok(Disposition::Put)
            })?;

            info!(?key, "Installed transferred record");
        }

        Ok(result)
    }

    pub fn prune_transfers(&self) -> usize {
        self.transfers.prune()
    }
}
