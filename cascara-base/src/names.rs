//! The process-global intern pool for internal class names.
//! Equal names share one [`ClassNameId`]; comparisons elsewhere in the VM are
//! integer equality on the handle. Writers take the internal lock; readers
//! take a shared lock and copy the few bytes they need out.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{self, AtomicU32};
use std::sync::RwLock;

use indexmap::{Equivalent, IndexMap};

use crate::id::{self, ClassNameId};
use crate::{util, BadIdError};

#[derive(Clone)]
pub struct RawClassName(pub Vec<u8>);
impl RawClassName {
    #[must_use]
    pub fn get(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn as_slice(&self) -> RawClassNameSlice<'_> {
        RawClassNameSlice(self.0.as_slice())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
impl Eq for RawClassName {}
impl PartialEq for RawClassName {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Hash for RawClassName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}
impl std::fmt::Debug for RawClassName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "\"{}\"",
            util::convert_classfile_text(&self.0)
        ))
    }
}

#[derive(Clone, Copy, Eq, PartialEq)]
pub struct RawClassNameSlice<'a>(&'a [u8]);
impl<'a> RawClassNameSlice<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> RawClassNameSlice<'a> {
        RawClassNameSlice(bytes)
    }

    #[must_use]
    pub fn get(&self) -> &'a [u8] {
        self.0
    }

    #[must_use]
    pub fn to_owned(&self) -> RawClassName {
        RawClassName(self.0.to_owned())
    }
}
impl<'a> Equivalent<RawClassName> for RawClassNameSlice<'a> {
    fn equivalent(&self, key: &RawClassName) -> bool {
        self.0 == key.0
    }
}
impl<'a> Hash for RawClassNameSlice<'a> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // This mimics normal slice hashing, but we explicitly decide how we
        // hash so the owned and borrowed forms always agree.
        self.0.len().hash(state);
        for piece in self.0 {
            piece.hash(state);
        }
    }
}
impl<'a> std::fmt::Debug for RawClassNameSlice<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("\"{}\"", util::convert_classfile_text(self.0)))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClassNameInfo {
    is_array: bool,
    id: ClassNameId,
}
impl ClassNameInfo {
    #[must_use]
    pub fn id(&self) -> ClassNameId {
        self.id
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        self.is_array
    }
}

/// Ids reserved by [`ClassNames::new`], in insertion order.
const RESERVED: &[&[u8]] = &[
    b"java/lang/Object",
    b"java/lang/Throwable",
    b"java/lang/Exception",
    b"java/lang/Error",
    b"java/lang/String",
];

#[derive(Debug)]
pub struct ClassNames {
    next_id: AtomicU32,
    names: RwLock<IndexMap<RawClassName, ClassNameInfo>>,
}
impl ClassNames {
    #[must_use]
    pub fn new() -> Self {
        let class_names = ClassNames {
            next_id: AtomicU32::new(0),
            names: RwLock::new(IndexMap::with_capacity(64)),
        };

        // Reserve fixed ids for the names the exception engine compares
        // against on every handler search.
        for name in RESERVED {
            class_names.intern(name);
        }

        class_names
    }

    fn get_new_id(&self) -> ClassNameId {
        // Relaxed is fine for a counter that only increments.
        ClassNameId::new_unchecked(self.next_id.fetch_add(1, atomic::Ordering::Relaxed))
    }

    /// The id of `b"java/lang/Object"`. Fixed at pool creation.
    #[must_use]
    pub fn object_id(&self) -> ClassNameId {
        ClassNameId::new_unchecked(0)
    }

    /// The id of `b"java/lang/Throwable"`. Fixed at pool creation.
    #[must_use]
    pub fn throwable_id(&self) -> ClassNameId {
        ClassNameId::new_unchecked(1)
    }

    /// The id of `b"java/lang/Exception"`. Fixed at pool creation.
    #[must_use]
    pub fn exception_id(&self) -> ClassNameId {
        ClassNameId::new_unchecked(2)
    }

    /// The id of `b"java/lang/Error"`. Fixed at pool creation.
    #[must_use]
    pub fn error_id(&self) -> ClassNameId {
        ClassNameId::new_unchecked(3)
    }

    /// The id of `b"java/lang/String"`. Fixed at pool creation.
    #[must_use]
    pub fn string_id(&self) -> ClassNameId {
        ClassNameId::new_unchecked(4)
    }

    /// Intern a name, returning the existing handle if the name was already in
    /// the pool.
    pub fn intern(&self, class_path: &[u8]) -> ClassNameId {
        let slice = RawClassNameSlice(class_path);
        {
            let names = self.names.read().unwrap();
            if let Some(info) = names.get(&slice) {
                return info.id;
            }
        }

        let mut names = self.names.write().unwrap();
        // Another thread may have inserted between the read and write locks.
        if let Some(info) = names.get(&slice) {
            return info.id;
        }

        let id = self.get_new_id();
        names.insert(
            slice.to_owned(),
            ClassNameInfo {
                is_array: id::is_array_class_bytes(class_path),
                id,
            },
        );
        id
    }

    /// Intern from an owned buffer, avoiding a copy on first insertion.
    pub fn intern_vec(&self, class_path: Vec<u8>) -> ClassNameId {
        let slice = RawClassNameSlice(&class_path);
        {
            let names = self.names.read().unwrap();
            if let Some(info) = names.get(&slice) {
                return info.id;
            }
        }

        let mut names = self.names.write().unwrap();
        if let Some(info) = names.get(&slice) {
            return info.id;
        }

        let id = self.get_new_id();
        let is_array = id::is_array_class_bytes(&class_path);
        names.insert(RawClassName(class_path), ClassNameInfo { is_array, id });
        id
    }

    pub fn intern_str(&self, class_path: &str) -> ClassNameId {
        self.intern(class_path.as_bytes())
    }

    /// Get the name for a given id. The bytes are copied out of the pool.
    pub fn name_from_id(&self, id: ClassNameId) -> Result<RawClassName, BadIdError> {
        let names = self.names.read().unwrap();
        names
            .iter()
            .find(|(_, info)| info.id == id)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| {
                tracing::warn!("name_from_id: got a bad id {:?}", id);
                BadIdError { id }
            })
    }

    /// Check if the given id is for an array class.
    pub fn is_array(&self, id: ClassNameId) -> Result<bool, BadIdError> {
        let names = self.names.read().unwrap();
        names
            .iter()
            .find(|(_, info)| info.id == id)
            .map(|(_, info)| info.is_array)
            .ok_or(BadIdError { id })
    }

    /// The name in a nice representation for logging.
    /// The output of this function is not guaranteed.
    #[must_use]
    pub fn tpath(&self, id: ClassNameId) -> String {
        self.name_from_id(id)
            .map(|name| util::convert_classfile_text(name.get()).into_owned())
            .unwrap_or_else(|_| "[UNKNOWN CLASS NAME]".to_owned())
    }

    /// The user-facing dotted form of the name, for diagnostics in strict
    /// mode.
    #[must_use]
    pub fn user_path(&self, id: ClassNameId) -> String {
        util::internal_to_user_format(&self.tpath(id))
    }
}

impl Default for ClassNames {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::ClassNames;

    #[test]
    fn interning_is_identity() {
        let names = ClassNames::new();
        let a = names.intern(b"java/lang/String");
        // Same name arriving from a different source, in a different form
        let b = names.intern_vec(b"java/lang/String".to_vec());
        let c = names.intern_str("java/lang/String");
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a, names.string_id());

        let other = names.intern(b"java/lang/Integer");
        assert_ne!(a, other);
    }

    #[test]
    fn reserved_ids_are_fixed() {
        let names = ClassNames::new();
        assert_eq!(names.intern(b"java/lang/Object"), names.object_id());
        assert_eq!(names.intern(b"java/lang/Throwable"), names.throwable_id());
        assert_eq!(names.intern(b"java/lang/Exception"), names.exception_id());
        assert_eq!(names.intern(b"java/lang/Error"), names.error_id());
    }

    #[test]
    fn array_names() {
        let names = ClassNames::new();
        let arr = names.intern(b"[I");
        let obj_arr = names.intern(b"[[Ljava/lang/String;");
        assert!(names.is_array(arr).unwrap());
        assert!(names.is_array(obj_arr).unwrap());
        assert!(!names.is_array(names.object_id()).unwrap());
    }
}
