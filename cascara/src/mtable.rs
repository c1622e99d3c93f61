//! The method table: fully-qualified `class.name+descriptor` keys mapping to
//! either a bytecode method or a host-method entry. Bytecode entries arrive
//! with class loading; host entries are bulk-registered per domain at
//! startup. Re-registration under the same key overrides.

use std::sync::Arc;

use cascara_base::constant_pool::ConstantPool;
use cascara_base::descriptor::{DescriptorError, MethodDescriptor};
use cascara_base::method::{CodeInfo, ACC_NATIVE, ACC_STATIC, ACC_SYNCHRONIZED};
use indexmap::IndexMap;

use crate::gfunction::GMeth;

/// A bytecode method and its code attribute, ready to be framed.
#[derive(Debug, Clone)]
pub struct BMethod {
    pub class_name: String,
    pub name: String,
    pub desc: String,
    pub access_flags: u16,
    pub code: CodeInfo,
    pub descriptor: MethodDescriptor,
    pub cp: Arc<ConstantPool>,
}
impl BMethod {
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }

    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        self.access_flags & ACC_SYNCHRONIZED != 0
    }

    #[must_use]
    pub fn is_native(&self) -> bool {
        self.access_flags & ACC_NATIVE != 0
    }

    #[must_use]
    pub fn key(&self) -> String {
        MethodTable::method_key(&self.class_name, &self.name, &self.desc)
    }
}

#[derive(Clone)]
pub enum MTEntry {
    Bytecode(Arc<BMethod>),
    Host(GMeth),
}

#[derive(Default)]
pub struct MethodTable {
    entries: IndexMap<String, MTEntry>,
}
impl MethodTable {
    #[must_use]
    pub fn new() -> MethodTable {
        MethodTable::default()
    }

    #[must_use]
    pub fn method_key(class_name: &str, name: &str, desc: &str) -> String {
        format!("{}.{}{}", class_name, name, desc)
    }

    pub fn insert(&mut self, key: String, entry: MTEntry) {
        self.entries.insert(key, entry);
    }

    /// Parse the descriptor once and insert the method under its key.
    pub fn insert_bytecode(
        &mut self,
        class_name: &str,
        name: &str,
        desc: &str,
        access_flags: u16,
        code: CodeInfo,
        cp: Arc<ConstantPool>,
    ) -> Result<Arc<BMethod>, DescriptorError> {
        let descriptor = MethodDescriptor::parse(desc)?;
        let method = Arc::new(BMethod {
            class_name: class_name.to_owned(),
            name: name.to_owned(),
            desc: desc.to_owned(),
            access_flags,
            code,
            descriptor,
            cp,
        });
        self.entries
            .insert(method.key(), MTEntry::Bytecode(Arc::clone(&method)));
        Ok(method)
    }

    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&MTEntry> {
        self.entries.get(key)
    }

    /// Bulk-register one host-method domain.
    pub fn load_host_library<I>(&mut self, library: I)
    where
        I: IntoIterator<Item = (&'static str, GMeth)>,
    {
        for (key, entry) in library {
            self.entries.insert(key.to_owned(), MTEntry::Host(entry));
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cascara_base::constant_pool::ConstantPool;
    use cascara_base::method::CodeInfo;

    use super::{MTEntry, MethodTable};
    use crate::gfunction::{GMeth, GValue};
    use crate::value::JavaValue;

    fn host_answer(
        _ctx: &mut crate::gfunction::GCtx<'_>,
        _args: &mut Vec<JavaValue>,
    ) -> GValue {
        GValue::Value(JavaValue::Int(42))
    }

    #[test]
    fn keys_and_overrides() {
        let mut mtable = MethodTable::new();
        let cp = Arc::new(ConstantPool::new());
        mtable
            .insert_bytecode("X", "y", "(I)I", 0, CodeInfo::default(), cp)
            .unwrap();
        assert!(matches!(mtable.lookup("X.y(I)I"), Some(MTEntry::Bytecode(_))));

        // Re-registration under the same key overrides
        mtable.load_host_library([(
            "X.y(I)I",
            GMeth {
                param_slots: 1,
                needs_frames: false,
                func: host_answer,
            },
        )]);
        assert!(matches!(mtable.lookup("X.y(I)I"), Some(MTEntry::Host(_))));
        assert!(mtable.lookup("X.z()V").is_none());
    }
}
