use core::cmp::Ordering;
use core::hash::{Hash, Hasher};
use core::ops::Deref;
use std::sync::Arc;

#[derive(Clone, Debug)]
enum SliceInner<'a> {
    Ref(&'a [u8]),
    Box(Box<[u8]>),
    Shared(Arc<[u8]>),
}

/// A byte buffer that is either borrowed, owned, or shared with the engine
/// that produced it.
#[derive(Clone, Debug)]
pub struct Slice<'a> {
    inner: SliceInner<'a>,
}

impl Slice<'_> {
    #[must_use]
    pub fn into_boxed(self) -> Box<[u8]> {
        match self.inner {
            SliceInner::Ref(inner) => inner.into(),
            SliceInner::Box(inner) => inner,
            SliceInner::Shared(inner) => Box::from(&*inner),
        }
    }
}

impl Deref for Slice<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_ref()
    }
}

impl AsRef<[u8]> for Slice<'_> {
    fn as_ref(&self) -> &[u8] {
        match &self.inner {
            SliceInner::Ref(inner) => inner,
            SliceInner::Box(inner) => inner,
            SliceInner::Shared(inner) => inner,
        }
    }
}

impl<'a, T: AsRef<[u8]>> From<&'a T> for Slice<'a> {
    fn from(inner: &'a T) -> Self {
        Self {
            inner: SliceInner::Ref(inner.as_ref()),
        }
    }
}

impl<'a> From<&'a [u8]> for Slice<'a> {
    fn from(inner: &'a [u8]) -> Self {
        Self {
            inner: SliceInner::Ref(inner),
        }
    }
}

impl From<Box<[u8]>> for Slice<'_> {
    fn from(inner: Box<[u8]>) -> Self {
        Self {
            inner: SliceInner::Box(inner),
        }
    }
}

impl From<Vec<u8>> for Slice<'_> {
    fn from(inner: Vec<u8>) -> Self {
        Self {
            inner: SliceInner::Box(inner.into_boxed_slice()),
        }
    }
}

impl From<Arc<[u8]>> for Slice<'_> {
    fn from(inner: Arc<[u8]>) -> Self {
        Self {
            inner: SliceInner::Shared(inner),
        }
    }
}

impl<'a> From<Slice<'a>> for Box<[u8]> {
    fn from(slice: Slice<'a>) -> Self {
        slice.into_boxed()
    }
}

impl PartialEq for Slice<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.as_ref() == other.as_ref()
    }
}

impl Eq for Slice<'_> {}

impl PartialEq<[u8]> for Slice<'_> {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_ref() == other
    }
}

impl<const N: usize> PartialEq<[u8; N]> for Slice<'_> {
    fn eq(&self, other: &[u8; N]) -> bool {
        self.as_ref() == other
    }
}

impl PartialOrd for Slice<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Slice<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_ref().cmp(other.as_ref())
    }
}

impl Hash for Slice<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_ref().hash(state);
    }
}
