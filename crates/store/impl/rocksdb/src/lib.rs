//! RocksDB engine for the vault store.
//!
//! Each [`Column`] is its own column family. `Meta` and `Data` are only ever
//! read by exact key, so their families are tuned for point lookups; `Group`
//! keeps the default block format because whole accounts are read and
//! dropped as contiguous key ranges.
//!
//! A [`Transaction`] becomes one `WriteBatch`: a group commit, including the
//! deletion of an emptied account, lands entirely or not at all.


use eyre::{eyre, Result as EyreResult};
use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamily, ColumnFamilyDescriptor, DBRawIteratorWithThreadMode,
    Options, WriteBatch, DB,
};
use strum::IntoEnumIterator;
use vault_store::config::StoreConfig;
use vault_store::db::{Column, Database};
use vault_store::iter::{DBIter, Iter};
use vault_store::slice::Slice;
use vault_store::tx::{Operation, Transaction};

const MAX_OPEN_FILES: i32 = 256;

/// Shared block cache for range-scanned families, in bytes.
const BLOCK_CACHE_SIZE: usize = 32 << 20;

/// Block cache of each point-lookup family, in megabytes.
const POINT_LOOKUP_CACHE_MB: u64 = 8;

#[derive(Debug)]
pub struct RocksDB {
    db: DB,
}

fn column_options(column: Column, cache: &Cache) -> Options {
    let mut options = Options::default();

    match column {
        Column::Meta | Column::Data => options.optimize_for_point_lookup(POINT_LOOKUP_CACHE_MB),
        _ => {
            let mut table = BlockBasedOptions::default();
            table.set_block_cache(cache);
            options.set_block_based_table_factory(&table);
        }
    }

    options
}

impl RocksDB {
    fn family(&self, column: Column) -> EyreResult<&ColumnFamily> {
        self.db
            .cf_handle(column.as_ref())
            .ok_or_else(|| eyre!("column family {} is not open", column.as_ref()))
    }
}

impl Database for RocksDB {
    fn open(config: &StoreConfig) -> EyreResult<Self> {
        let mut options = Options::default();
        options.create_if_missing(true);
        options.create_missing_column_families(true);
        options.set_max_open_files(MAX_OPEN_FILES);

        let cache = Cache::new_lru_cache(BLOCK_CACHE_SIZE);

        let families = Column::iter()
            .map(|column| ColumnFamilyDescriptor::new(column.as_ref(), column_options(column, &cache)));

        let db = DB::open_cf_descriptors(&options, &config.path, families)?;

        Ok(Self { db })
    }

    fn has(&self, col: Column, key: Slice<'_>) -> EyreResult<bool> {
        let family = self.family(col)?;

        if !self.db.key_may_exist_cf(family, &key) {
            return Ok(false);
        }

        Ok(self.db.get_pinned_cf(family, &key)?.is_some())
    }

    fn get(&self, col: Column, key: Slice<'_>) -> EyreResult<Option<Slice<'_>>> {
        let value = self.db.get_cf(self.family(col)?, &key)?;

        Ok(value.map(Slice::from))
    }

    fn put(&self, col: Column, key: Slice<'_>, value: Slice<'_>) -> EyreResult<()> {
        self.db.put_cf(self.family(col)?, &key, &value)?;

        Ok(())
    }

    fn delete(&self, col: Column, key: Slice<'_>) -> EyreResult<()> {
        self.db.delete_cf(self.family(col)?, &key)?;

        Ok(())
    }

    fn iter(&self, col: Column) -> EyreResult<Iter<'_>> {
        let mut raw = self.db.raw_iterator_cf(self.family(col)?);

        raw.seek_to_first();

        Ok(Iter::new(Cursor { fresh: true, raw }))
    }

    fn apply(&self, tx: &Transaction<'_>) -> EyreResult<()> {
        let mut batch = WriteBatch::default();

        for (entry, op) in tx.iter() {
            let family = self.family(entry.column())?;

            match op {
                Operation::Put { value } => batch.put_cf(family, entry.key(), value),
                Operation::Delete => batch.delete_cf(family, entry.key()),
            }
        }

        self.db.write(batch)?;

        Ok(())
    }
}

/// A raw RocksDB iterator adapted to [`DBIter`]. A fresh cursor already
/// sits on the first key, so its first `next` must not advance.
struct Cursor<'a> {
    fresh: bool,
    raw: DBRawIteratorWithThreadMode<'a, DB>,
}

impl Cursor<'_> {
    fn key(&self) -> EyreResult<Option<Slice<'_>>> {
        self.raw.status()?;

        Ok(self.raw.key().map(Slice::from))
    }
}

impl DBIter for Cursor<'_> {
    fn seek(&mut self, key: Slice<'_>) -> EyreResult<Option<Slice<'_>>> {
        self.fresh = false;
        self.raw.seek(&key);

        self.key()
    }

    fn next(&mut self) -> EyreResult<Option<Slice<'_>>> {
        if !self.raw.valid() {
            return Ok(None);
        }

        if !self.fresh {
            self.raw.next();
        }

        self.fresh = false;

        self.key()
    }

    fn read(&self) -> EyreResult<Slice<'_>> {
        self.raw
            .value()
            .map(Slice::from)
            .ok_or_else(|| eyre!("cursor is not positioned on an entry"))
    }
}
