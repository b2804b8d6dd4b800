//! Ordered byte-string storage behind a pluggable [`Database`] engine.

use core::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use eyre::Result as EyreResult;

pub mod config;
pub mod db;
pub mod iter;
pub mod slice;
pub mod tx;

use crate::config::StoreConfig;
use crate::db::{Column, Database};
use crate::iter::Iter;
use crate::slice::Slice;
use crate::tx::Transaction;

/// A shared handle onto an opened engine.
#[derive(Clone)]
pub struct Store {
    db: Arc<dyn Database>,
}

impl Debug for Store {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    pub fn open<T: Database>(config: &StoreConfig) -> EyreResult<Self> {
        let db = T::open(config)?;

        Ok(Self::new(db))
    }

    pub fn new<T: Database>(db: T) -> Self {
        Self { db: Arc::new(db) }
    }

    pub fn has(&self, col: Column, key: &[u8]) -> EyreResult<bool> {
        self.db.has(col, key.into())
    }

    pub fn get(&self, col: Column, key: &[u8]) -> EyreResult<Option<Slice<'_>>> {
        self.db.get(col, key.into())
    }

    pub fn put(&self, col: Column, key: &[u8], value: &[u8]) -> EyreResult<()> {
        self.db.put(col, key.into(), value.into())
    }

    pub fn delete(&self, col: Column, key: &[u8]) -> EyreResult<()> {
        self.db.delete(col, key.into())
    }

    pub fn iter(&self, col: Column) -> EyreResult<Iter<'_>> {
        self.db.iter(col)
    }

    pub fn apply(&self, tx: &Transaction<'_>) -> EyreResult<()> {
        self.db.apply(tx)
    }

    /// Every entry in `col` whose key starts with `prefix`, in key order.
    pub fn prefix_entries(
        &self,
        col: Column,
        prefix: &[u8],
    ) -> EyreResult<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let mut iter = self.db.iter(col)?;
        let mut entries = Vec::new();

        let mut key = iter.seek(prefix.into())?.map(Slice::into_boxed);

        while let Some(current) = key.take() {
            if !current.starts_with(prefix) {
                break;
            }

            let value = iter.read()?.into_boxed();
            entries.push((current, value));

            key = iter.next()?.map(Slice::into_boxed);
        }

        Ok(entries)
    }
}
