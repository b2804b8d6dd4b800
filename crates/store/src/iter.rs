use core::fmt::{self, Debug, Formatter};

use eyre::Result as EyreResult;

use crate::slice::Slice;

/// A database cursor over one column, in key order.
///
/// # Error Handling
///
/// All methods return `EyreResult` so engine failures propagate. Adapters
/// built on top of this trait (like [`IterEntries`]) fuse after the first
/// error rather than continue in an unknown state.
pub trait DBIter {
    /// Positions the cursor on the first key greater than or equal to `key`.
    fn seek(&mut self, key: Slice<'_>) -> EyreResult<Option<Slice<'_>>>;

    /// Advances to the next key. On a fresh cursor this yields the first key.
    fn next(&mut self) -> EyreResult<Option<Slice<'_>>>;

    /// Reads the value at the current cursor position.
    fn read(&self) -> EyreResult<Slice<'_>>;
}

pub struct Iter<'a> {
    done: bool,
    inner: Box<dyn DBIter + 'a>,
}

impl Debug for Iter<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter").field("done", &self.done).finish_non_exhaustive()
    }
}

impl<'a> Iter<'a> {
    pub fn new<T: DBIter + 'a>(inner: T) -> Self {
        Self {
            done: false,
            inner: Box::new(inner),
        }
    }

    pub fn seek(&mut self, key: Slice<'_>) -> EyreResult<Option<Slice<'_>>> {
        self.done = false;

        self.inner.seek(key)
    }

    #[expect(
        clippy::should_implement_trait,
        reason = "keys borrow from the cursor, which `Iterator` cannot express"
    )]
    pub fn next(&mut self) -> EyreResult<Option<Slice<'_>>> {
        if self.done {
            return Ok(None);
        }

        let key = self.inner.next()?;

        if key.is_none() {
            self.done = true;
        }

        Ok(key)
    }

    pub fn read(&self) -> EyreResult<Slice<'_>> {
        self.inner.read()
    }

    /// Owned key-value pairs from the current position onwards.
    pub fn entries(&mut self) -> IterEntries<'_, 'a> {
        IterEntries { iter: self }
    }
}

/// An iterator adapter that yields owned key-value entries.
///
/// Each item is an `EyreResult`; the adapter fuses after yielding the first
/// error so a failing engine is never polled again.
///
/// ```ignore
/// let mut iter = db.iter(Column::Group)?;
/// for entry in iter.entries() {
///     let (key, value) = entry?;
///     // ... use key and value
/// }
/// ```
#[derive(Debug)]
pub struct IterEntries<'a, 'b> {
    iter: &'a mut Iter<'b>,
}

impl Iterator for IterEntries<'_, '_> {
    type Item = EyreResult<(Box<[u8]>, Box<[u8]>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.iter.done {
            return None;
        }

        let key = match self.iter.inner.next() {
            Ok(Some(key)) => key.into_boxed(),
            Ok(None) => {
                self.iter.done = true;
                return None;
            }
            Err(err) => {
                self.iter.done = true;
                return Some(Err(err));
            }
        };

        match self.iter.inner.read() {
            Ok(value) => Some(Ok((key, value.into_boxed()))),
            Err(err) => {
                self.iter.done = true;
                Some(Err(err))
            }
        }
    }
}
