//! MaidManager: one account per client, charging it for what it stores.

#[cfg(test)]
#[path = "tests/maid_manager.rs"]
mod tests;

use borsh::{BorshDeserialize, BorshSerialize};
use vault_consensus::{median, resolve_by_majority, Resolve, ResolutionError};
use vault_primitives::{
    Action, ActionError, ActionId, DataName, DataTag, Disposition, GroupAction, GroupKey,
    GroupName, Metadata,
};

use crate::service::{GroupService, TransferValue};

pub type MaidManagerService =
    GroupService<MaidManagerKey, MaidManagerAction, MaidManagerValue, MaidManagerMetadata>;

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, BorshSerialize, BorshDeserialize,
)]
pub struct MaidManagerKey {
    pub maid: GroupName,
    pub name: DataName,
    pub tag: DataTag,
}

impl MaidManagerKey {
    #[must_use]
    pub const fn new(maid: GroupName, name: DataName, tag: DataTag) -> Self {
        Self { maid, name, tag }
    }
}

impl GroupKey for MaidManagerKey {
    fn group_name(&self) -> GroupName {
        self.maid
    }
}

/// How often the client stored one chunk and what it paid in total.
#[derive(Clone, Copy, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct MaidManagerValue {
    pub count: u64,
    pub total_cost: u64,
}

impl MaidManagerValue {
    /// Cost of one of the `count` stores; what a delete refunds.
    #[must_use]
    pub fn average_cost(self) -> u64 {
        self.total_cost.checked_div(self.count).unwrap_or(0)
    }
}

impl Resolve for MaidManagerValue {
    fn resolve(values: &[Self], group_size: usize) -> Result<Self, ResolutionError> {
        resolve_by_majority(values, group_size)
    }
}

impl TransferValue<MaidManagerMetadata> for MaidManagerValue {
    fn account(&self, metadata: &mut MaidManagerMetadata, previous: Option<&Self>) {
        match previous {
            Some(previous) => {
                metadata.total_put_data = metadata.total_put_data.saturating_sub(previous.total_cost);
            }
            None => metadata.data_count = metadata.data_count.saturating_add(1),
        }

        metadata.total_put_data = metadata.total_put_data.saturating_add(self.total_cost);
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct MaidManagerMetadata {
    /// Distinct chunks the client holds.
    pub data_count: u64,
    pub total_put_data: u64,
}

impl Metadata for MaidManagerMetadata {
    fn new(_group_name: GroupName) -> Self {
        Self::default()
    }

    fn is_empty(&self) -> bool {
        self.data_count == 0
    }
}

impl Resolve for MaidManagerMetadata {
    fn resolve(values: &[Self], group_size: usize) -> Result<Self, ResolutionError> {
        Ok(Self {
            data_count: median(values.iter().map(|m| m.data_count), group_size)?,
            total_put_data: median(values.iter().map(|m| m.total_put_data), group_size)?,
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
#[non_exhaustive]
pub enum MaidManagerAction {
    Put { cost: u64 },
    Delete,
}

impl Action for MaidManagerAction {
    fn action_id(&self) -> ActionId {
        ActionId::new(match self {
            Self::Put { .. } => 0,
            Self::Delete => 1,
        })
    }
}

impl GroupAction<MaidManagerMetadata, MaidManagerValue> for MaidManagerAction {
    fn apply(
        &self,
        metadata: &mut MaidManagerMetadata,
        value: &mut Option<MaidManagerValue>,
    ) -> Result<Disposition, ActionError> {
        match *self {
            Self::Put { cost } => {
                let held = value.get_or_insert_with(|| {
                    metadata.data_count = metadata.data_count.saturating_add(1);

                    MaidManagerValue {
                        count: 0,
                        total_cost: 0,
                    }
                });

                held.count = held.count.saturating_add(1);
                held.total_cost = held.total_cost.saturating_add(cost);
                metadata.total_put_data = metadata.total_put_data.saturating_add(cost);

                Ok(Disposition::Put)
            }
            Self::Delete => {
                let Some(held) = value else {
                    return Err(ActionError::NoSuchElement);
                };

                let refund = held.average_cost();

                held.count = held.count.saturating_sub(1);
                held.total_cost = held.total_cost.saturating_sub(refund);
                metadata.total_put_data = metadata.total_put_data.saturating_sub(refund);

                if held.count > 0 {
                    return Ok(Disposition::Put);
                }

                metadata.data_count = metadata.data_count.saturating_sub(1);
                *value = None;

                Ok(Disposition::Delete)
            }
        }
    }
}
