use core::fmt::{self, Debug, Formatter};
use core::ops::Bound;
use std::collections::BTreeMap;
use std::sync::Arc;

use eyre::{eyre, Result as EyreResult};
use parking_lot::RwLock;

use crate::config::StoreConfig;
use crate::db::{Column, Database};
use crate::iter::{DBIter, Iter};
use crate::slice::Slice;
use crate::tx::{Operation, Transaction};

type Columns = BTreeMap<Column, BTreeMap<Box<[u8]>, Arc<[u8]>>>;

/// A volatile engine backed by ordered maps, for tests and ephemeral nodes.
///
/// Clones share the same contents.
#[derive(Clone, Default)]
pub struct InMemoryDB {
    inner: Arc<RwLock<Columns>>,
}

impl Debug for InMemoryDB {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryDB").finish_non_exhaustive()
    }
}

impl InMemoryDB {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Database for InMemoryDB {
    fn open(_config: &StoreConfig) -> EyreResult<Self> {
        Ok(Self::new())
    }

    fn has(&self, col: Column, key: Slice<'_>) -> EyreResult<bool> {
        let db = self.inner.read();

        Ok(db.get(&col).is_some_and(|entries| entries.contains_key(&*key)))
    }

    fn get(&self, col: Column, key: Slice<'_>) -> EyreResult<Option<Slice<'_>>> {
        let db = self.inner.read();

        let value = db
            .get(&col)
            .and_then(|entries| entries.get(&*key))
            .map(|value| Slice::from(Arc::clone(value)));

        Ok(value)
    }

    fn put(&self, col: Column, key: Slice<'_>, value: Slice<'_>) -> EyreResult<()> {
        let mut db = self.inner.write();

        drop(
            db.entry(col)
                .or_default()
                .insert(key.into_boxed(), Arc::from(value.into_boxed())),
        );

        Ok(())
    }

    fn delete(&self, col: Column, key: Slice<'_>) -> EyreResult<()> {
        let mut db = self.inner.write();

        if let Some(entries) = db.get_mut(&col) {
            drop(entries.remove(&*key));
        }

        Ok(())
    }

    fn iter(&self, col: Column) -> EyreResult<Iter<'_>> {
        Ok(Iter::new(InMemoryIter {
            db: Arc::clone(&self.inner),
            col,
            started: false,
            state: None,
        }))
    }

    fn apply(&self, tx: &Transaction<'_>) -> EyreResult<()> {
        let mut db = self.inner.write();

        for (entry, op) in tx.iter() {
            let entries = db.entry(entry.column()).or_default();

            match op {
                Operation::Put { value } => {
                    drop(entries.insert(entry.key().into(), Arc::from(&**value)));
                }
                Operation::Delete => {
                    drop(entries.remove(entry.key()));
                }
            }
        }

        Ok(())
    }
}

/// A cursor that re-reads the shared maps on every step, so it never holds
/// the lock between calls.
struct InMemoryIter {
    db: Arc<RwLock<Columns>>,
    col: Column,
    started: bool,
    state: Option<(Box<[u8]>, Arc<[u8]>)>,
}

impl InMemoryIter {
    fn first_from(&self, from: Bound<&[u8]>) -> Option<(Box<[u8]>, Arc<[u8]>)> {
        let db = self.db.read();

        let entry = db
            .get(&self.col)?
            .range::<[u8], _>((from, Bound::Unbounded))
            .next()
            .map(|(key, value)| (key.clone(), Arc::clone(value)));

        entry
    }

    fn current_key(&self) -> Option<Slice<'_>> {
        self.state.as_ref().map(|(key, _)| Slice::from(&**key))
    }
}

impl DBIter for InMemoryIter {
    fn seek(&mut self, key: Slice<'_>) -> EyreResult<Option<Slice<'_>>> {
        self.started = true;
        self.state = self.first_from(Bound::Included(&*key));

        Ok(self.current_key())
    }

    fn next(&mut self) -> EyreResult<Option<Slice<'_>>> {
        let next = if self.started {
            match &self.state {
                Some((key, _)) => self.first_from(Bound::Excluded(&**key)),
                None => None,
            }
        } else {
            self.started = true;
            self.first_from(Bound::Unbounded)
        };

        self.state = next;

        Ok(self.current_key())
    }

    fn read(&self) -> EyreResult<Slice<'_>> {
        self.state
            .as_ref()
            .map(|(_, value)| Slice::from(Arc::clone(value)))
            .ok_or_else(|| eyre!("iterator is not positioned on an entry"))
    }
}
