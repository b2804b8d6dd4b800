use eyre::Result as EyreResult;
use strum::{AsRefStr, EnumIter};

use crate::config::StoreConfig;
use crate::iter::Iter;
use crate::slice::Slice;
use crate::tx::Transaction;

mod memory;

pub use memory::InMemoryDB;

#[derive(Eq, Ord, Copy, Clone, Debug, PartialEq, PartialOrd, EnumIter, AsRefStr)]
#[non_exhaustive]
pub enum Column {
    /// Group metadata, keyed by group name.
    Meta,
    /// Group values, keyed by group name followed by the encoded key.
    Group,
    /// Ungrouped persona records.
    Data,
}

/// An ordered byte-string key-value engine.
///
/// Keys within a column iterate in lexicographic byte order, which is what
/// lets a group's values be scanned and dropped as one contiguous range.
pub trait Database: Send + Sync + 'static {
    fn open(config: &StoreConfig) -> EyreResult<Self>
    where
        Self: Sized;

    fn has(&self, col: Column, key: Slice<'_>) -> EyreResult<bool>;
    fn get(&self, col: Column, key: Slice<'_>) -> EyreResult<Option<Slice<'_>>>;
    fn put(&self, col: Column, key: Slice<'_>, value: Slice<'_>) -> EyreResult<()>;
    fn delete(&self, col: Column, key: Slice<'_>) -> EyreResult<()>;
    fn iter(&self, col: Column) -> EyreResult<Iter<'_>>;

    /// Applies every operation in `tx` atomically.
    fn apply(&self, tx: &Transaction<'_>) -> EyreResult<()>;
}
