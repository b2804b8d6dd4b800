//! PmidManager: one account per storage (pmid) node, listing the chunks it
//! was asked to hold and how much of it has been lost.

use core::fmt::{self, Debug, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};
use tracing::{debug, warn};
use vault_config::ConsensusConfig;
use vault_consensus::{
    median, resolve_by_majority, Resolve, Resolved, ResolutionError, SyncAccumulator,
    UnresolvedEntry,
};
use vault_group_db::GroupDbError;
use vault_primitives::{
    Action, ActionError, ActionId, DataName, DataTag, Disposition, GroupAction, GroupKey,
    GroupName, MessageId, Metadata, MetadataAction, NodeId,
};
use vault_store::Store;

use crate::service::{GroupService, ServiceError, TransferValue};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, BorshSerialize, BorshDeserialize,
)]
pub struct PmidManagerKey {
    pub pmid_node: GroupName,
    pub name: DataName,
    pub tag: DataTag,
}

impl PmidManagerKey {
    #[must_use]
    pub const fn new(pmid_node: GroupName, name: DataName, tag: DataTag) -> Self {
        Self {
            pmid_node,
            name,
            tag,
        }
    }
}

impl GroupKey for PmidManagerKey {
    fn group_name(&self) -> GroupName {
        self.pmid_node
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct PmidManagerValue {
    pub size: u64,
}

impl Resolve for PmidManagerValue {
    fn resolve(values: &[Self], group_size: usize) -> Result<Self, ResolutionError> {
        resolve_by_majority(values, group_size)
    }
}

impl TransferValue<PmidManagerMetadata> for PmidManagerValue {
    fn account(&self, metadata: &mut PmidManagerMetadata, previous: Option<&Self>) {
        match previous {
            Some(previous) => {
                metadata.stored_total_size = metadata.stored_total_size.saturating_sub(previous.size);
            }
            None => metadata.stored_count = metadata.stored_count.saturating_add(1),
        }

        metadata.stored_total_size = metadata.stored_total_size.saturating_add(self.size);
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct PmidManagerMetadata {
    pub stored_count: u64,
    pub stored_total_size: u64,
    pub lost_count: u64,
    pub lost_total_size: u64,
    pub claimed_available_size: u64,
}

impl Metadata for PmidManagerMetadata {
    fn new(_group_name: GroupName) -> Self {
        Self::default()
    }

    fn is_empty(&self) -> bool {
        self.stored_count == 0 && self.lost_count == 0 && self.claimed_available_size == 0
    }
}

/// Each counter is the median of what the holders reported.
impl Resolve for PmidManagerMetadata {
    fn resolve(values: &[Self], group_size: usize) -> Result<Self, ResolutionError> {
        Ok(Self {
            stored_count: median(values.iter().map(|m| m.stored_count), group_size)?,
            stored_total_size: median(values.iter().map(|m| m.stored_total_size), group_size)?,
            lost_count: median(values.iter().map(|m| m.lost_count), group_size)?,
            lost_total_size: median(values.iter().map(|m| m.lost_total_size), group_size)?,
            claimed_available_size: median(
                values.iter().map(|m| m.claimed_available_size),
                group_size,
            )?,
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
#[non_exhaustive]
pub enum PmidManagerAction {
    Put { size: u64 },
    /// The chunk left the node. `data_failed` marks it as lost rather than
    /// deleted on request.
    Delete { data_failed: bool },
}

impl Action for PmidManagerAction {
    fn action_id(&self) -> ActionId {
        ActionId::new(match self {
            Self::Put { .. } => 0,
            Self::Delete { .. } => 1,
        })
    }
}

impl GroupAction<PmidManagerMetadata, PmidManagerValue> for PmidManagerAction {
    fn apply(
        &self,
        metadata: &mut PmidManagerMetadata,
        value: &mut Option<PmidManagerValue>,
    ) -> Result<Disposition, ActionError> {
        match *self {
            Self::Put { size } => {
                if value.is_some() {
                    return Err(ActionError::AlreadyExists);
                }

                metadata.stored_count = metadata.stored_count.saturating_add(1);
                metadata.stored_total_size = metadata.stored_total_size.saturating_add(size);
                *value = Some(PmidManagerValue { size });

                Ok(Disposition::Put)
            }
            Self::Delete { data_failed } => {
                let Some(PmidManagerValue { size }) = value.take() else {
                    return Err(ActionError::NoSuchElement);
                };

                metadata.stored_count = metadata.stored_count.saturating_sub(1);
                metadata.stored_total_size = metadata.stored_total_size.saturating_sub(size);

                if data_failed {
                    metadata.lost_count = metadata.lost_count.saturating_add(1);
                    metadata.lost_total_size = metadata.lost_total_size.saturating_add(size);
                }

                Ok(Disposition::Delete)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
#[non_exhaustive]
pub enum PmidManagerMetadataAction {
    /// The node's own report of its free space.
    SetAvailableSize { size: u64 },
}

impl Action for PmidManagerMetadataAction {
    fn action_id(&self) -> ActionId {
        match self {
            Self::SetAvailableSize { .. } => ActionId::new(2),
        }
    }
}

impl MetadataAction<PmidManagerMetadata> for PmidManagerMetadataAction {
    fn apply(&self, metadata: &mut PmidManagerMetadata) -> Result<(), ActionError> {
        match *self {
            Self::SetAvailableSize { size } => metadata.claimed_available_size = size,
        }

        Ok(())
    }
}

pub type PmidGroupService =
    GroupService<PmidManagerKey, PmidManagerAction, PmidManagerValue, PmidManagerMetadata>;

/// The PmidManager persona: per-chunk actions go through the group service,
/// account-wide ones through a second accumulator keyed by pmid node.
pub struct PmidManagerService {
    group: PmidGroupService,
    metadata_sync: SyncAccumulator<GroupName, PmidManagerMetadataAction>,
}

impl Debug for PmidManagerService {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PmidManagerService")
            .field("group", &self.group)
            .field("metadata_sync", &self.metadata_sync)
            .finish()
    }
}

impl PmidManagerService {
    pub fn new(this_node: NodeId, config: &ConsensusConfig, store: Store) -> Result<Self, ServiceError> {
        Ok(Self {
            group: GroupService::new(this_node, config, store)?,
            metadata_sync: SyncAccumulator::new(this_node, config),
        })
    }

    #[must_use]
    pub const fn group(&self) -> &PmidGroupService {
        &self.group
    }

    pub fn propose_metadata(
        &self,
        pmid_node: GroupName,
        action: PmidManagerMetadataAction,
        message_id: MessageId,
    ) -> Result<Option<Resolved<GroupName, PmidManagerMetadataAction>>, ServiceError> {
        let resolved = self
            .metadata_sync
            .add_local_action(pmid_node, action, message_id);

        self.commit_metadata(resolved)
    }

    pub fn handle_metadata_sync(
        &self,
        entry: UnresolvedEntry<GroupName, PmidManagerMetadataAction>,
    ) -> Result<Option<Resolved<GroupName, PmidManagerMetadataAction>>, ServiceError> {
        let resolved = self.metadata_sync.add_unresolved_action(entry);

        self.commit_metadata(resolved)
    }

    #[must_use]
    pub fn unresolved_metadata_for_rebroadcast(
        &self,
    ) -> Vec<UnresolvedEntry<GroupName, PmidManagerMetadataAction>> {
        self.metadata_sync.get_unresolved_actions()
    }

    /// Updates an existing account. A report for a node with no account is
    /// dropped.
    fn commit_metadata(
        &self,
        resolved: Option<Resolved<GroupName, PmidManagerMetadataAction>>,
    ) -> Result<Option<Resolved<GroupName, PmidManagerMetadataAction>>, ServiceError> {
        let Some(resolved) = resolved else {
            return Ok(None);
        };

        let pmid_node = resolved.key;

        match self
            .group
            .db()
            .commit_metadata(pmid_node, |metadata| resolved.action.apply(metadata))
        {
            Ok(()) => debug!(%pmid_node, action = ?resolved.action, "Committed account update"),
            Err(GroupDbError::NoSuchAccount) => {
                warn!(%pmid_node, "Account update for unknown pmid node dropped");
            }
            Err(err) => return Err(err.into()),
        }

        Ok(Some(resolved))
    }
}

#[cfg(test)]
mod tests {
    use claims::{assert_err_eq, assert_ok, assert_ok_eq};
    use rand::seq::SliceRandom;
    use rand::thread_rng;

    use super::*;

    fn metadata(stored_count: u64, stored_total_size: u64) -> PmidManagerMetadata {
        PmidManagerMetadata {
            stored_count,
            stored_total_size,
            ..PmidManagerMetadata::default()
        }
    }

    #[test]
    fn test_put_and_failed_delete() {
        let mut account = PmidManagerMetadata::default();
        let mut value = None;

        assert_ok_eq!(
            PmidManagerAction::Put { size: 100 }.apply(&mut account, &mut value),
            Disposition::Put
        );
        assert_eq!(account, metadata(1, 100), "stored counters grow");

        assert_err_eq!(
            PmidManagerAction::Put { size: 100 }.apply(&mut account, &mut value),
            ActionError::AlreadyExists
        );

        assert_ok_eq!(
            PmidManagerAction::Delete { data_failed: true }.apply(&mut account, &mut value),
            Disposition::Delete
        );
        assert_eq!(
            account,
            PmidManagerMetadata {
                lost_count: 1,
                lost_total_size: 100,
                ..PmidManagerMetadata::default()
            },
            "failed data moves to the lost counters"
        );
        assert!(!account.is_empty(), "an account with losses is kept");
    }

    #[test]
    fn test_requested_delete_empties_account() {
        let mut account = PmidManagerMetadata::default();
        let mut value = None;

        assert_ok_eq!(
            PmidManagerAction::Put { size: 7 }.apply(&mut account, &mut value),
            Disposition::Put
        );
        assert_ok_eq!(
            PmidManagerAction::Delete { data_failed: false }.apply(&mut account, &mut value),
            Disposition::Delete
        );

        assert!(account.is_empty(), "nothing stored, nothing lost");
        assert_err_eq!(
            PmidManagerAction::Delete { data_failed: false }.apply(&mut account, &mut value),
            ActionError::NoSuchElement
        );
    }

    #[test]
    fn test_set_available_size() {
        let mut account = metadata(1, 1);

        assert_ok!(PmidManagerMetadataAction::SetAvailableSize { size: 4096 }.apply(&mut account));
        assert_eq!(account.claimed_available_size, 4096, "claim recorded");
    }

    #[test]
    fn test_metadata_median_per_field() {
        let mut reports = vec![
            PmidManagerMetadata {
                stored_count: 10,
                lost_count: 3,
                ..PmidManagerMetadata::default()
            },
            PmidManagerMetadata {
                stored_count: 30,
                lost_count: 1,
                ..PmidManagerMetadata::default()
            },
            PmidManagerMetadata {
                stored_count: 20,
                lost_count: 2,
                ..PmidManagerMetadata::default()
            },
        ];

        for _ in 0..8 {
            reports.shuffle(&mut thread_rng());

            let resolved = PmidManagerMetadata::resolve(&reports, 5).expect("quorum reached");

            assert_eq!(resolved.stored_count, 20, "median of stored counts");
            assert_eq!(resolved.lost_count, 2, "median of lost counts");
        }

        assert_err_eq!(
            PmidManagerMetadata::resolve(&reports[..2], 5),
            ResolutionError::TooFewEntriesToResolve
        );
    }

    #[test]
    fn test_transfer_accounting() {
        let mut account = PmidManagerMetadata::default();

        PmidManagerValue { size: 10 }.account(&mut account, None);
        assert_eq!(account, metadata(1, 10), "new value counted");

        PmidManagerValue { size: 15 }.account(&mut account, Some(&PmidManagerValue { size: 10 }));
        assert_eq!(account, metadata(1, 15), "replacement only adjusts the size");
    }
}
