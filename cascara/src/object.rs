//! The object model: a class-name handle plus a field table. Arrays, strings
//! and shim-backed instances keep their backing storage in the reserved
//! `value` field, which may hold a live host-side container.

use std::collections::VecDeque;

use cascara_base::names::ClassNames;
use cascara_base::{id::ClassNameId, types};
use indexmap::IndexMap;

use crate::heap::{Heap, ObjRef};
use crate::value::JavaValue;

/// The field name reserved for array/string/shim backing storage.
pub const VALUE_FIELD: &str = "value";

/// A key in a `HashMap` shim backing. Boxed numerics unwrap to their numeric
/// identity, strings to their contents, everything else to object identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Null,
    Int(i64),
    /// Float keys compare by bit pattern
    Bits(u64),
    Str(Vec<u8>),
    Ref(ObjRef),
}

#[derive(Debug, Clone)]
pub enum FieldValue {
    Value(JavaValue),
    /// String backing as raw utf8
    Bytes(Vec<u8>),
    /// String backing as Java (signed) bytes, selected by configuration
    JavaBytes(Vec<i8>),
    /// Backing for `[Z [B [C [S [I [J`, widened uniformly
    Ints(Vec<i64>),
    /// Backing for `[F [D`
    Floats(Vec<f64>),
    /// Backing for reference arrays
    Refs(Vec<JavaValue>),
    /// `LinkedList` shim backing
    List(VecDeque<JavaValue>),
    /// `HashMap` shim backing: key -> (original key value, mapped value)
    Map(IndexMap<MapKey, (JavaValue, JavaValue)>),
}

#[derive(Debug, Clone)]
pub struct Field {
    pub type_tag: String,
    pub value: FieldValue,
}

#[derive(Debug, Clone)]
pub struct Object {
    pub class: ClassNameId,
    pub fields: IndexMap<String, Field>,
}
impl Object {
    #[must_use]
    pub fn new(class: ClassNameId) -> Object {
        Object {
            class,
            fields: IndexMap::new(),
        }
    }

    /// An object whose only field is the reserved `value` backing field.
    #[must_use]
    pub fn with_value(class: ClassNameId, type_tag: &str, value: FieldValue) -> Object {
        let mut object = Object::new(class);
        object.set_field(VALUE_FIELD, type_tag, value);
        object
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.get_mut(name)
    }

    pub fn set_field(&mut self, name: &str, type_tag: &str, value: FieldValue) {
        self.fields.insert(
            name.to_owned(),
            Field {
                type_tag: type_tag.to_owned(),
                value,
            },
        );
    }

    #[must_use]
    pub fn value_field(&self) -> Option<&FieldValue> {
        self.field(VALUE_FIELD).map(|f| &f.value)
    }

    pub fn value_field_mut(&mut self) -> Option<&mut FieldValue> {
        self.field_mut(VALUE_FIELD).map(|f| &mut f.value)
    }

    /// Length of the array backing, if this object is an array.
    #[must_use]
    pub fn array_length(&self) -> Option<usize> {
        Some(match self.value_field()? {
            FieldValue::Bytes(data) => data.len(),
            FieldValue::JavaBytes(data) => data.len(),
            FieldValue::Ints(data) => data.len(),
            FieldValue::Floats(data) => data.len(),
            FieldValue::Refs(data) => data.len(),
            FieldValue::List(data) => data.len(),
            FieldValue::Map(data) => data.len(),
            FieldValue::Value(_) => return None,
        })
    }
}

/// The element category an array class name encodes (`[I`, `[[Ljava/lang/String;`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Bool,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Ref,
}
impl ElementKind {
    /// Read the element kind out of an array class name.
    #[must_use]
    pub fn of_array_class(name: &[u8]) -> Option<ElementKind> {
        if name.first() != Some(&b'[') {
            return None;
        }
        Some(match name.get(1)? {
            b'Z' => ElementKind::Bool,
            b'B' => ElementKind::Byte,
            b'C' => ElementKind::Char,
            b'S' => ElementKind::Short,
            b'I' => ElementKind::Int,
            b'J' => ElementKind::Long,
            b'F' => ElementKind::Float,
            b'D' => ElementKind::Double,
            b'L' | b'[' => ElementKind::Ref,
            _ => return None,
        })
    }
}

/// Allocate a zeroed array object of the given array class name.
pub fn make_array(
    heap: &mut Heap,
    names: &ClassNames,
    array_class: &str,
    length: usize,
) -> Option<ObjRef> {
    let kind = ElementKind::of_array_class(array_class.as_bytes())?;
    let backing = match kind {
        ElementKind::Bool
        | ElementKind::Byte
        | ElementKind::Char
        | ElementKind::Short
        | ElementKind::Int
        | ElementKind::Long => FieldValue::Ints(vec![0; length]),
        ElementKind::Float | ElementKind::Double => FieldValue::Floats(vec![0.0; length]),
        ElementKind::Ref => FieldValue::Refs(vec![JavaValue::NULL; length]),
    };
    let class = names.intern_str(array_class);
    Some(heap.alloc(Object::with_value(class, array_class, backing)))
}

/// Allocate a `java/lang/String` whose backing is chosen by the charset
/// configuration.
pub fn make_string(heap: &mut Heap, names: &ClassNames, signed: bool, text: &str) -> ObjRef {
    let backing = if signed {
        FieldValue::JavaBytes(text.bytes().map(|b| b as i8).collect())
    } else {
        FieldValue::Bytes(text.as_bytes().to_vec())
    };
    heap.alloc(Object::with_value(
        names.string_id(),
        types::BYTE_ARRAY,
        backing,
    ))
}

/// Read a string object's contents back out, whichever backing it carries.
#[must_use]
pub fn get_string(heap: &Heap, reference: ObjRef) -> Option<String> {
    let object = heap.get(reference)?;
    match object.value_field()? {
        FieldValue::Bytes(data) => Some(String::from_utf8_lossy(data).into_owned()),
        FieldValue::JavaBytes(data) => {
            let raw: Vec<u8> = data.iter().map(|&b| b as u8).collect();
            Some(String::from_utf8_lossy(&raw).into_owned())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use cascara_base::names::ClassNames;

    use super::{get_string, make_array, make_string, ElementKind, FieldValue};
    use crate::heap::Heap;

    #[test]
    fn element_kinds() {
        assert_eq!(ElementKind::of_array_class(b"[I"), Some(ElementKind::Int));
        assert_eq!(
            ElementKind::of_array_class(b"[[Ljava/lang/String;"),
            Some(ElementKind::Ref)
        );
        assert_eq!(
            ElementKind::of_array_class(b"[Ljava/lang/String;"),
            Some(ElementKind::Ref)
        );
        assert_eq!(ElementKind::of_array_class(b"java/lang/String"), None);
    }

    #[test]
    fn string_round_trip() {
        let names = ClassNames::new();
        let mut heap = Heap::new();

        let raw = make_string(&mut heap, &names, false, "hello");
        assert_eq!(get_string(&heap, raw).as_deref(), Some("hello"));

        let signed = make_string(&mut heap, &names, true, "hello");
        assert_eq!(get_string(&heap, signed).as_deref(), Some("hello"));
        assert!(matches!(
            heap.get(signed).unwrap().value_field(),
            Some(FieldValue::JavaBytes(_))
        ));
    }

    #[test]
    fn arrays_are_zeroed() {
        let names = ClassNames::new();
        let mut heap = Heap::new();
        let arr = make_array(&mut heap, &names, "[I", 4).unwrap();
        let object = heap.get(arr).unwrap();
        assert_eq!(object.array_length(), Some(4));
        assert!(matches!(
            object.value_field(),
            Some(FieldValue::Ints(v)) if v.iter().all(|&x| x == 0)
        ));
    }
}
