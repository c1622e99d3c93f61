//! An indexed view over a class's constant pool, in the already-parsed
//! in-memory form the execution core consumes.
//! All accessors are pure; a bad index or a wrong tag is a recoverable error
//! that the interpreter reports as a Java-level `InternalError`.

use std::borrow::Cow;

use crate::util;

#[derive(Debug, Clone)]
pub enum CpEntry {
    Utf8(Vec<u8>),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    ClassRef {
        name_index: u16,
    },
    StringConst {
        utf8_index: u16,
    },
    FieldRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    MethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        desc_index: u16,
    },
    /// The filler slot occupied by the second half of a Long/Double entry,
    /// and the reserved slot 0.
    Unusable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpError {
    OutOfRange { index: u16, len: usize },
    WrongTag { index: u16, expected: &'static str },
}
impl std::fmt::Display for CpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CpError::OutOfRange { index, len } => {
                write!(f, "constant pool index {} out of range for size {}", index, len)
            }
            CpError::WrongTag { index, expected } => {
                write!(f, "constant pool entry {} is not a {}", index, expected)
            }
        }
    }
}

/// A value loadable by the `ldc` family, already widened to stack form.
#[derive(Debug, Clone)]
pub enum CpValue {
    Int(i64),
    Float(f64),
    Long(i64),
    Double(f64),
    Str(Vec<u8>),
    Class(Vec<u8>),
}
impl CpValue {
    /// Whether this constant occupies two operand-stack slots.
    #[must_use]
    pub fn is_wide(&self) -> bool {
        matches!(self, CpValue::Long(_) | CpValue::Double(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    // Slot 0 is reserved; indices are 1-based as in the classfile.
    entries: Vec<CpEntry>,
}
impl ConstantPool {
    #[must_use]
    pub fn new() -> ConstantPool {
        ConstantPool {
            entries: vec![CpEntry::Unusable],
        }
    }

    /// Build from entries in 1-based order (do not include slot 0).
    #[must_use]
    pub fn from_entries(entries: Vec<CpEntry>) -> ConstantPool {
        let mut pool = ConstantPool::new();
        for entry in entries {
            pool.push(entry);
        }
        pool
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Append an entry, returning its index. Long and Double entries consume
    /// the following slot as well, per the classfile layout.
    pub fn push(&mut self, entry: CpEntry) -> u16 {
        let index = self.entries.len() as u16;
        let wide = matches!(entry, CpEntry::Long(_) | CpEntry::Double(_));
        self.entries.push(entry);
        if wide {
            self.entries.push(CpEntry::Unusable);
        }
        index
    }

    pub fn push_utf8(&mut self, text: &str) -> u16 {
        self.push(CpEntry::Utf8(text.as_bytes().to_vec()))
    }

    pub fn push_class(&mut self, class_name: &str) -> u16 {
        let name_index = self.push_utf8(class_name);
        self.push(CpEntry::ClassRef { name_index })
    }

    pub fn push_string(&mut self, text: &str) -> u16 {
        let utf8_index = self.push_utf8(text);
        self.push(CpEntry::StringConst { utf8_index })
    }

    pub fn push_name_and_type(&mut self, name: &str, desc: &str) -> u16 {
        let name_index = self.push_utf8(name);
        let desc_index = self.push_utf8(desc);
        self.push(CpEntry::NameAndType {
            name_index,
            desc_index,
        })
    }

    pub fn push_method_ref(&mut self, class_name: &str, name: &str, desc: &str) -> u16 {
        let class_index = self.push_class(class_name);
        let name_and_type_index = self.push_name_and_type(name, desc);
        self.push(CpEntry::MethodRef {
            class_index,
            name_and_type_index,
        })
    }

    pub fn push_field_ref(&mut self, class_name: &str, name: &str, desc: &str) -> u16 {
        let class_index = self.push_class(class_name);
        let name_and_type_index = self.push_name_and_type(name, desc);
        self.push(CpEntry::FieldRef {
            class_index,
            name_and_type_index,
        })
    }

    pub fn entry(&self, index: u16) -> Result<&CpEntry, CpError> {
        let got = self.entries.get(usize::from(index));
        match got {
            None | Some(CpEntry::Unusable) => Err(CpError::OutOfRange {
                index,
                len: self.entries.len(),
            }),
            Some(entry) => Ok(entry),
        }
    }

    pub fn utf8_bytes_of(&self, index: u16) -> Result<&[u8], CpError> {
        match self.entry(index)? {
            CpEntry::Utf8(data) => Ok(data),
            _ => Err(CpError::WrongTag {
                index,
                expected: "Utf8",
            }),
        }
    }

    pub fn utf8_of(&self, index: u16) -> Result<Cow<'_, str>, CpError> {
        self.utf8_bytes_of(index).map(util::convert_classfile_text)
    }

    /// Resolve a `ClassRef` slot to the interned-form class name bytes.
    pub fn classname_of(&self, index: u16) -> Result<&[u8], CpError> {
        match self.entry(index)? {
            CpEntry::ClassRef { name_index } => self.utf8_bytes_of(*name_index),
            _ => Err(CpError::WrongTag {
                index,
                expected: "ClassRef",
            }),
        }
    }

    pub fn name_and_type_of(&self, index: u16) -> Result<(Cow<'_, str>, Cow<'_, str>), CpError> {
        match self.entry(index)? {
            CpEntry::NameAndType {
                name_index,
                desc_index,
            } => Ok((self.utf8_of(*name_index)?, self.utf8_of(*desc_index)?)),
            _ => Err(CpError::WrongTag {
                index,
                expected: "NameAndType",
            }),
        }
    }

    /// Resolve a `MethodRef`/`InterfaceMethodRef` slot to
    /// `(class_name, method_name, descriptor)`.
    pub fn method_info_of(
        &self,
        index: u16,
    ) -> Result<(&[u8], Cow<'_, str>, Cow<'_, str>), CpError> {
        let (class_index, name_and_type_index) = match self.entry(index)? {
            CpEntry::MethodRef {
                class_index,
                name_and_type_index,
            }
            | CpEntry::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => (*class_index, *name_and_type_index),
            _ => {
                return Err(CpError::WrongTag {
                    index,
                    expected: "MethodRef",
                })
            }
        };
        let class_name = self.classname_of(class_index)?;
        let (name, desc) = self.name_and_type_of(name_and_type_index)?;
        Ok((class_name, name, desc))
    }

    /// Resolve a `FieldRef` slot to `(class_name, field_name, descriptor)`.
    pub fn field_info_of(
        &self,
        index: u16,
    ) -> Result<(&[u8], Cow<'_, str>, Cow<'_, str>), CpError> {
        let (class_index, name_and_type_index) = match self.entry(index)? {
            CpEntry::FieldRef {
                class_index,
                name_and_type_index,
            } => (*class_index, *name_and_type_index),
            _ => {
                return Err(CpError::WrongTag {
                    index,
                    expected: "FieldRef",
                })
            }
        };
        let class_name = self.classname_of(class_index)?;
        let (name, desc) = self.name_and_type_of(name_and_type_index)?;
        Ok((class_name, name, desc))
    }

    /// Fetch a constant for the `ldc` family, widened to stack form.
    pub fn loadable_of(&self, index: u16) -> Result<CpValue, CpError> {
        Ok(match self.entry(index)? {
            CpEntry::Integer(v) => CpValue::Int(i64::from(*v)),
            CpEntry::Float(v) => CpValue::Float(f64::from(*v)),
            CpEntry::Long(v) => CpValue::Long(*v),
            CpEntry::Double(v) => CpValue::Double(*v),
            CpEntry::StringConst { utf8_index } => {
                CpValue::Str(self.utf8_bytes_of(*utf8_index)?.to_vec())
            }
            CpEntry::ClassRef { name_index } => {
                CpValue::Class(self.utf8_bytes_of(*name_index)?.to_vec())
            }
            _ => {
                return Err(CpError::WrongTag {
                    index,
                    expected: "loadable constant",
                })
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ConstantPool, CpEntry, CpError, CpValue};

    #[test]
    fn out_of_range_and_slot_zero() {
        let pool = ConstantPool::new();
        assert!(matches!(pool.entry(0), Err(CpError::OutOfRange { .. })));
        assert!(matches!(pool.entry(3), Err(CpError::OutOfRange { .. })));
    }

    #[test]
    fn wide_constants_consume_two_slots() {
        let mut pool = ConstantPool::new();
        let long_idx = pool.push(CpEntry::Long(77));
        let next_idx = pool.push(CpEntry::Integer(5));
        assert_eq!(long_idx + 2, next_idx);
        // The filler slot is not addressable
        assert!(pool.entry(long_idx + 1).is_err());
        assert!(matches!(pool.loadable_of(long_idx), Ok(CpValue::Long(77))));
    }

    #[test]
    fn method_ref_resolution() {
        let mut pool = ConstantPool::new();
        let idx = pool.push_method_ref("java/lang/Integer", "valueOf", "(I)Ljava/lang/Integer;");
        let (class_name, name, desc) = pool.method_info_of(idx).unwrap();
        assert_eq!(class_name, b"java/lang/Integer");
        assert_eq!(name, "valueOf");
        assert_eq!(desc, "(I)Ljava/lang/Integer;");
    }

    #[test]
    fn wrong_tag_reports() {
        let mut pool = ConstantPool::new();
        let idx = pool.push_utf8("whatever");
        assert!(matches!(
            pool.method_info_of(idx),
            Err(CpError::WrongTag { .. })
        ));
        assert!(matches!(
            pool.classname_of(idx),
            Err(CpError::WrongTag { .. })
        ));
    }
}
