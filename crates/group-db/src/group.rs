//! Group accounts: metadata plus values, committed together.
//!
//! Layout in the backing store:
//!
//! | column           | key                          | value            |
//! |------------------|------------------------------|------------------|
//! | [`Column::Meta`]  | group name                   | encoded metadata |
//! | [`Column::Group`] | group name ‖ encoded key     | encoded value    |
//!
//! Every value key starts with its group's name, so one group is one
//! contiguous key range.

#[cfg(test)]
#[path = "tests/group.rs"]
mod tests;

use core::fmt::{self, Debug, Formatter};
use core::marker::PhantomData;
use std::collections::BTreeSet;

use borsh::{BorshDeserialize, BorshSerialize};
use eyre::eyre;
use parking_lot::Mutex;
use tracing::{debug, info};
use vault_primitives::identity::ID_LEN;
use vault_primitives::{
    parse, serialise, ActionError, Disposition, GroupAction, GroupKey, GroupName, Metadata,
};
use vault_store::db::Column;
use vault_store::tx::Transaction;
use vault_store::Store;

use crate::error::GroupDbError;

/// A full snapshot of one group account.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct GroupContents<K, V, M> {
    pub group_name: GroupName,
    pub metadata: M,
    pub values: Vec<(K, V)>,
}

struct Inner {
    store: Store,
    groups: BTreeSet<GroupName>,
}

/// Per-group state of one persona.
///
/// All reads and commits go through one mutex, so commits on different
/// groups of the same instance are serialised too.
pub struct GroupDb<K, V, M> {
    inner: Mutex<Inner>,
    _marker: PhantomData<fn() -> (K, V, M)>,
}

impl<K, V, M> Debug for GroupDb<K, V, M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupDb").finish_non_exhaustive()
    }
}

fn value_key<K: BorshSerialize>(group_name: &GroupName, key: &K) -> Result<Vec<u8>, GroupDbError> {
    let mut bytes = group_name.as_bytes().to_vec();

    bytes.extend(serialise(key)?);

    Ok(bytes)
}

impl<K, V, M> GroupDb<K, V, M>
where
    K: GroupKey,
    V: BorshSerialize + BorshDeserialize,
    M: Metadata,
{
    /// Opens the persona's state in `store`, picking up every group
    /// committed before.
    pub fn open(store: Store) -> Result<Self, GroupDbError> {
        let mut groups = BTreeSet::new();

        let mut iter = store.iter(Column::Meta)?;

        for entry in iter.entries() {
            let (key, _) = entry?;

            let bytes = <[u8; ID_LEN]>::try_from(&*key)
                .map_err(|_| eyre!("malformed group name of length {}", key.len()))?;

            let _inserted = groups.insert(GroupName::from_bytes(bytes));
        }

        drop(iter);

        debug!(groups = groups.len(), "Opened group database");

        Ok(Self {
            inner: Mutex::new(Inner { store, groups }),
            _marker: PhantomData,
        })
    }

    /// Explicitly creates an empty account.
    pub fn add_group(&self, group_name: GroupName) -> Result<(), GroupDbError> {
        let mut inner = self.inner.lock();

        if inner.groups.contains(&group_name) {
            return Err(GroupDbError::AccountAlreadyExists);
        }

        let metadata = serialise(&M::new(group_name))?;

        inner
            .store
            .put(Column::Meta, group_name.as_bytes(), &metadata)?;

        let _inserted = inner.groups.insert(group_name);

        info!(%group_name, "Added group");

        Ok(())
    }

    /// Removes an account with all of its values.
    pub fn delete_group(&self, group_name: GroupName) -> Result<(), GroupDbError> {
        let mut inner = self.inner.lock();

        if !inner.groups.contains(&group_name) {
            return Err(GroupDbError::NoSuchAccount);
        }

        let mut tx = Transaction::default();
        let removed = inner.stage_group_deletion(&mut tx, &group_name)?;

        inner.store.apply(&tx)?;

        let _removed = inner.groups.remove(&group_name);

        info!(%group_name, values = removed, "Deleted group");

        Ok(())
    }

    /// Applies a resolved action to `key`.
    pub fn commit<A>(&self, key: &K, action: &A) -> Result<(), GroupDbError>
    where
        A: GroupAction<M, V>,
    {
        self.commit_with(key, |metadata, value| action.apply(metadata, value))
    }

    /// Applies `f` to the group's metadata and `key`'s current value, then
    /// writes both back in one transaction.
    ///
    /// A group that does not exist yet is created with fresh metadata. If
    /// the metadata reports itself empty afterwards, the whole group is
    /// deleted in the same transaction.
    pub fn commit_with<F>(&self, key: &K, f: F) -> Result<(), GroupDbError>
    where
        F: FnOnce(&mut M, &mut Option<V>) -> Result<Disposition, ActionError>,
    {
        let mut inner = self.inner.lock();

        let group_name = key.group_name();
        let exists = inner.groups.contains(&group_name);

        let mut metadata = if exists {
            inner.read_metadata(&group_name)?
        } else {
            M::new(group_name)
        };

        let storage_key = value_key(&group_name, key)?;

        let mut value = match inner.store.get(Column::Group, &storage_key)? {
            Some(bytes) => Some(parse::<V>(&bytes)?),
            None => None,
        };

        let disposition = f(&mut metadata, &mut value)?;

        if disposition == Disposition::Put && value.is_none() {
            return Err(GroupDbError::MissingValue);
        }

        let mut tx = Transaction::default();

        if metadata.is_empty() {
            if exists {
                let _removed = inner.stage_group_deletion(&mut tx, &group_name)?;

                inner.store.apply(&tx)?;

                let _removed = inner.groups.remove(&group_name);

                info!(%group_name, "Group emptied, deleted");
            }

            return Ok(());
        }

        match value {
            Some(value) if disposition == Disposition::Put => {
                tx.put(Column::Group, storage_key.into(), serialise(&value)?.into());
            }
            _ => tx.delete(Column::Group, storage_key.into()),
        }

        tx.put(
            Column::Meta,
            group_name.as_bytes().to_vec().into(),
            serialise(&metadata)?.into(),
        );

        inner.store.apply(&tx)?;

        if inner.groups.insert(group_name) {
            info!(%group_name, "Group created by first write");
        }

        debug!(%group_name, ?key, ?disposition, "Committed");

        Ok(())
    }

    /// Mutates the metadata of an existing group without touching its
    /// values.
    pub fn commit_metadata<F>(&self, group_name: GroupName, f: F) -> Result<(), GroupDbError>
    where
        F: FnOnce(&mut M) -> Result<(), ActionError>,
    {
        let mut inner = self.inner.lock();

        if !inner.groups.contains(&group_name) {
            return Err(GroupDbError::NoSuchAccount);
        }

        let mut metadata = inner.read_metadata(&group_name)?;

        f(&mut metadata)?;

        let mut tx = Transaction::default();

        if metadata.is_empty() {
            let _removed = inner.stage_group_deletion(&mut tx, &group_name)?;

            inner.store.apply(&tx)?;

            let _removed = inner.groups.remove(&group_name);

            info!(%group_name, "Group emptied, deleted");

            return Ok(());
        }

        tx.put(
            Column::Meta,
            group_name.as_bytes().to_vec().into(),
            serialise(&metadata)?.into(),
        );

        inner.store.apply(&tx)?;

        debug!(%group_name, "Committed metadata");

        Ok(())
    }

    pub fn get_value(&self, key: &K) -> Result<V, GroupDbError> {
        let inner = self.inner.lock();

        let group_name = key.group_name();

        if !inner.groups.contains(&group_name) {
            return Err(GroupDbError::NoSuchAccount);
        }

        let Some(bytes) = inner
            .store
            .get(Column::Group, &value_key(&group_name, key)?)?
        else {
            return Err(GroupDbError::NoSuchElement);
        };

        Ok(parse(&bytes)?)
    }

    pub fn get_metadata(&self, group_name: GroupName) -> Result<M, GroupDbError> {
        let inner = self.inner.lock();

        if !inner.groups.contains(&group_name) {
            return Err(GroupDbError::NoSuchAccount);
        }

        inner.read_metadata(&group_name)
    }

    /// Everything held for `group_name`, for handing the account over to
    /// new holders.
    pub fn get_contents(&self, group_name: GroupName) -> Result<GroupContents<K, V, M>, GroupDbError> {
        let inner = self.inner.lock();

        if !inner.groups.contains(&group_name) {
            return Err(GroupDbError::NoSuchAccount);
        }

        let metadata = inner.read_metadata(&group_name)?;

        let mut values = Vec::new();

        for (key, value) in inner.store.prefix_entries(Column::Group, group_name.as_bytes())? {
            let key = parse::<K>(&key[ID_LEN..])?;

            values.push((key, parse::<V>(&value)?));
        }

        Ok(GroupContents {
            group_name,
            metadata,
            values,
        })
    }

    #[must_use]
    pub fn group_names(&self) -> Vec<GroupName> {
        self.inner.lock().groups.iter().copied().collect()
    }
}

impl Inner {
    fn read_metadata<M: Metadata>(&self, group_name: &GroupName) -> Result<M, GroupDbError> {
        let Some(bytes) = self.store.get(Column::Meta, group_name.as_bytes())? else {
            return Err(eyre!("metadata of indexed group {group_name} is missing").into());
        };

        Ok(parse(&bytes)?)
    }

    /// Adds deletes for the group's metadata and every value to `tx`.
    /// Returns how many values were staged.
    fn stage_group_deletion(
        &self,
        tx: &mut Transaction<'_>,
        group_name: &GroupName,
    ) -> Result<usize, GroupDbError> {
        let entries = self
            .store
            .prefix_entries(Column::Group, group_name.as_bytes())?;

        for (key, _) in &entries {
            tx.delete(Column::Group, key.clone().into());
        }

        tx.delete(Column::Meta, group_name.as_bytes().to_vec().into());

        Ok(entries.len())
    }
}
