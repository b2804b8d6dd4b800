#[cfg(test)]
#[path = "tests/data.rs"]
mod tests;

use core::fmt::{self, Debug, Formatter};
use core::marker::PhantomData;

use borsh::{BorshDeserialize, BorshSerialize};
use parking_lot::Mutex;
use tracing::debug;
use vault_primitives::{parse, serialise, ActionError, DataAction, Disposition, Key};
use vault_store::db::Column;
use vault_store::Store;

use crate::error::GroupDbError;

/// Records that belong to no group account, keyed by their encoded key in
/// [`Column::Data`].
pub struct Db<K, V> {
    store: Mutex<Store>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Debug for Db<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db").finish_non_exhaustive()
    }
}

impl<K, V> Db<K, V>
where
    K: Key,
    V: BorshSerialize + BorshDeserialize,
{
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            store: Mutex::new(store),
            _marker: PhantomData,
        }
    }

    pub fn commit<A>(&self, key: &K, action: &A) -> Result<(), GroupDbError>
    where
        A: DataAction<V>,
    {
        self.commit_with(key, |value| action.apply(value))
    }

    /// Applies `f` to `key`'s current value and writes the outcome back.
    pub fn commit_with<F>(&self, key: &K, f: F) -> Result<(), GroupDbError>
    where
        F: FnOnce(&mut Option<V>) -> Result<Disposition, ActionError>,
    {
        let store = self.store.lock();

        let storage_key = serialise(key)?;

        let mut value = match store.get(Column::Data, &storage_key)? {
            Some(bytes) => Some(parse::<V>(&bytes)?),
            None => None,
        };

        let disposition = f(&mut value)?;

        match (disposition, value) {
            (Disposition::Put, Some(value)) => {
                store.put(Column::Data, &storage_key, &serialise(&value)?)?;
            }
            (Disposition::Put, None) => return Err(GroupDbError::MissingValue),
            (Disposition::Delete, _) => store.delete(Column::Data, &storage_key)?,
        }

        debug!(?key, ?disposition, "Committed");

        Ok(())
    }

    pub fn get(&self, key: &K) -> Result<V, GroupDbError> {
        let store = self.store.lock();

        let Some(bytes) = store.get(Column::Data, &serialise(key)?)? else {
            return Err(GroupDbError::NoSuchElement);
        };

        Ok(parse(&bytes)?)
    }

    /// Every record held, ordered by encoded key.
    pub fn entries(&self) -> Result<Vec<(K, V)>, GroupDbError> {
        let store = self.store.lock();

        let mut entries = Vec::new();

        for (key, value) in store.prefix_entries(Column::Data, &[])? {
            entries.push((parse(&key)?, parse(&value)?));
        }

        Ok(entries)
    }
}
