//! The object arena. Every Object lives here and is addressed by [`ObjRef`];
//! field tables reference other objects by handle, never by owning pointer.
//! There is no collector; the arena relies on the host's memory manager.

use std::hash::{Hash, Hasher};

use crate::object::Object;

/// A handle to an object in the [`Heap`].
/// Should not be used across heap instances.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct ObjRef(usize);
impl ObjRef {
    /// The raw arena index; the identity hash is derived from this.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}
impl Hash for ObjRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.0);
    }
}
impl std::fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "objref({})", self.0)
    }
}

#[derive(Default)]
pub struct Heap {
    objects: Vec<Object>,
}
impl Heap {
    #[must_use]
    pub fn new() -> Heap {
        Heap {
            objects: Vec::new(),
        }
    }

    pub fn alloc(&mut self, value: Object) -> ObjRef {
        self.objects.push(value);
        ObjRef(self.objects.len() - 1)
    }

    #[must_use]
    pub fn get(&self, reference: ObjRef) -> Option<&Object> {
        self.objects.get(reference.0)
    }

    #[must_use]
    pub fn get_mut(&mut self, reference: ObjRef) -> Option<&mut Object> {
        self.objects.get_mut(reference.0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
