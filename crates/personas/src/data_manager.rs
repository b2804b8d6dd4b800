//! DataManager: for every chunk, how many clients reference it and which
//! pmid nodes hold a replica.

use std::collections::BTreeSet;

use borsh::{BorshDeserialize, BorshSerialize};
use vault_consensus::{resolve_by_majority, Resolve, ResolutionError};
use vault_primitives::{
    Action, ActionError, ActionId, DataAction, DataName, DataTag, Disposition, NodeId,
};

use crate::service::DataService;

pub type DataManagerService = DataService<DataManagerKey, DataManagerAction, DataManagerValue>;

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, BorshSerialize, BorshDeserialize,
)]
pub struct DataManagerKey {
    pub name: DataName,
    pub tag: DataTag,
}

impl DataManagerKey {
    #[must_use]
    pub const fn new(name: DataName, tag: DataTag) -> Self {
        Self { name, tag }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct DataManagerValue {
    pub subscribers: u64,
    pub size: u64,
    pub online_pmids: BTreeSet<NodeId>,
    pub offline_pmids: BTreeSet<NodeId>,
}

impl DataManagerValue {
    #[must_use]
    pub const fn new(size: u64) -> Self {
        Self {
            subscribers: 1,
            size,
            online_pmids: BTreeSet::new(),
            offline_pmids: BTreeSet::new(),
        }
    }

    /// Every pmid node holding a replica, reachable or not.
    pub fn holders(&self) -> impl Iterator<Item = &NodeId> {
        self.online_pmids.iter().chain(&self.offline_pmids)
    }
}

impl Resolve for DataManagerValue {
    fn resolve(values: &[Self], group_size: usize) -> Result<Self, ResolutionError> {
        resolve_by_majority(values, group_size)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
#[non_exhaustive]
pub enum DataManagerAction {
    /// A client stored the chunk; a repeat store only adds a subscriber.
    Put { size: u64 },
    Delete,
    AddPmid { pmid: NodeId },
    RemovePmid { pmid: NodeId },
    NodeDown { pmid: NodeId },
    NodeUp { pmid: NodeId },
}

impl Action for DataManagerAction {
    fn action_id(&self) -> ActionId {
        ActionId::new(match self {
            Self::Put { .. } => 0,
            Self::Delete => 1,
            Self::AddPmid { .. } => 2,
            Self::RemovePmid { .. } => 3,
            Self::NodeDown { .. } => 4,
            Self::NodeUp { .. } => 5,
        })
    }
}

impl DataAction<DataManagerValue> for DataManagerAction {
    fn apply(&self, value: &mut Option<DataManagerValue>) -> Result<Disposition, ActionError> {
        if let Self::Put { size } = *self {
            if let Some(held) = value.as_mut() {
                if held.size != size {
                    return Err(ActionError::Invalid("size differs from the stored chunk"));
                }

                held.subscribers = held.subscribers.saturating_add(1);
            } else {
                *value = Some(DataManagerValue::new(size));
            }

            return Ok(Disposition::Put);
        }

        let Some(held) = value else {
            return Err(ActionError::NoSuchElement);
        };

        match *self {
            Self::Put { .. } => {}
            Self::Delete => {
                held.subscribers = held.subscribers.saturating_sub(1);

                if held.subscribers == 0 {
                    *value = None;
                    return Ok(Disposition::Delete);
                }
            }
            Self::AddPmid { pmid } => {
                drop(held.offline_pmids.remove(&pmid));

                if !held.online_pmids.insert(pmid) {
                    return Err(ActionError::AlreadyExists);
                }
            }
            Self::RemovePmid { pmid } => {
                let online = held.online_pmids.remove(&pmid);
                let offline = held.offline_pmids.remove(&pmid);

                if !online && !offline {
                    return Err(ActionError::NoSuchElement);
                }
            }
            Self::NodeDown { pmid } => {
                if !held.online_pmids.remove(&pmid) {
                    return Err(ActionError::NoSuchElement);
                }

                let _inserted = held.offline_pmids.insert(pmid);
            }
            Self::NodeUp { pmid } => {
                if !held.offline_pmids.remove(&pmid) {
                    return Err(ActionError::NoSuchElement);
                }

                let _inserted = held.online_pmids.insert(pmid);
            }
        }

        Ok(Disposition::Put)
    }
}
