use std::hash::{Hash, Hasher};

/// A compact handle for an interned internal class name.
/// Class identity throughout the VM is this handle, never the string.
#[derive(Debug, Copy, Clone)]
pub struct ClassNameId(u32);
impl ClassNameId {
    pub(crate) fn new_unchecked(id: u32) -> ClassNameId {
        ClassNameId(id)
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

// This only really holds true if they're from the same `ClassNames` instance
impl PartialEq for ClassNameId {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for ClassNameId {}
impl Hash for ClassNameId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.0);
    }
}
#[cfg(feature = "implementation-cheaper-map-hashing")]
impl nohash_hasher::IsEnabled for ClassNameId {}

/// The id of a Java thread, assigned by the thread table at creation.
pub type ThreadId = u32;

pub(crate) fn is_array_class_bytes(first: &[u8]) -> bool {
    first.starts_with(&[b'['])
}
