//! The class registry: superclass links, declared fields and source file
//! names for classes the VM knows about. Class file parsing happens outside
//! the execution core; whatever loads a class registers its metadata here.

use cascara_base::id::ClassNameId;
use cascara_base::names::ClassNames;
use cascara_base::types;
use indexmap::IndexMap;

use crate::exceptions::ExceptionKind;
use crate::heap::{Heap, ObjRef};
use crate::object::Object;

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub type_tag: String,
}
impl FieldDef {
    #[must_use]
    pub fn new(name: &str, type_tag: &str) -> FieldDef {
        FieldDef {
            name: name.to_owned(),
            type_tag: type_tag.to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassMeta {
    pub id: ClassNameId,
    pub super_id: Option<ClassNameId>,
    pub source_file: Option<String>,
    pub fields: Vec<FieldDef>,
    /// Synthetic per-class object, the lock target of static synchronized
    /// methods. Allocated lazily.
    class_object: Option<ObjRef>,
}

#[derive(Default)]
pub struct ClassRegistry {
    classes: IndexMap<ClassNameId, ClassMeta>,
}
impl ClassRegistry {
    #[must_use]
    pub fn new() -> ClassRegistry {
        ClassRegistry::default()
    }

    /// Register (or re-register) a class. Later registrations override.
    pub fn register(
        &mut self,
        id: ClassNameId,
        super_id: Option<ClassNameId>,
        source_file: Option<&str>,
        fields: Vec<FieldDef>,
    ) {
        self.classes.insert(
            id,
            ClassMeta {
                id,
                super_id,
                source_file: source_file.map(ToOwned::to_owned),
                fields,
                class_object: None,
            },
        );
    }

    #[must_use]
    pub fn get(&self, id: ClassNameId) -> Option<&ClassMeta> {
        self.classes.get(&id)
    }

    #[must_use]
    pub fn super_of(&self, id: ClassNameId) -> Option<ClassNameId> {
        self.classes.get(&id).and_then(|meta| meta.super_id)
    }

    #[must_use]
    pub fn source_of(&self, id: ClassNameId) -> Option<&str> {
        self.classes
            .get(&id)
            .and_then(|meta| meta.source_file.as_deref())
    }

    /// Transitive subclass check, used by `checkcast`/`instanceof`.
    /// The walk is bounded so that a malformed circular chain terminates.
    #[must_use]
    pub fn is_same_or_subclass(&self, sub: ClassNameId, sup: ClassNameId) -> bool {
        let mut cursor = Some(sub);
        for _ in 0..64 {
            match cursor {
                Some(id) if id == sup => return true,
                Some(id) => cursor = self.super_of(id),
                None => return false,
            }
        }
        false
    }

    /// Declared and inherited fields, own fields first.
    #[must_use]
    pub fn all_fields(&self, id: ClassNameId) -> Vec<FieldDef> {
        let mut fields = Vec::new();
        let mut cursor = Some(id);
        for _ in 0..64 {
            let Some(current) = cursor else { break };
            let Some(meta) = self.classes.get(&current) else {
                break;
            };
            fields.extend(meta.fields.iter().cloned());
            cursor = meta.super_id;
        }
        fields
    }

    /// The synthetic class object static synchronized methods lock on.
    pub fn class_object(
        &mut self,
        heap: &mut Heap,
        names: &ClassNames,
        id: ClassNameId,
    ) -> ObjRef {
        if let Some(meta) = self.classes.get(&id) {
            if let Some(existing) = meta.class_object {
                return existing;
            }
        } else {
            self.register(id, Some(names.object_id()), None, Vec::new());
        }

        let class_class = names.intern(b"java/lang/Class");
        let reference = heap.alloc(Object::new(class_class));
        if let Some(meta) = self.classes.get_mut(&id) {
            meta.class_object = Some(reference);
        }
        reference
    }
}

/// Seed the registry with the classes the engine itself depends on: the
/// throwable hierarchy, String, StackTraceElement, the boxed numerics and the
/// shim-backed library classes.
pub fn register_core_classes(registry: &mut ClassRegistry, names: &ClassNames) {
    let object = names.object_id();
    registry.register(object, None, Some("Object.java"), Vec::new());

    let throwable = names.throwable_id();
    registry.register(
        throwable,
        Some(object),
        Some("Throwable.java"),
        vec![
            FieldDef::new("message", types::STRING_DESC),
            FieldDef::new("stackTrace", "[Ljava/lang/StackTraceElement;"),
        ],
    );
    registry.register(names.exception_id(), Some(throwable), None, Vec::new());
    registry.register(names.error_id(), Some(throwable), None, Vec::new());

    // Intermediate throwable classes the kind catalog names as direct supers
    for (name, super_name) in [
        ("java/lang/RuntimeException", types::EXCEPTION_CLASS),
        ("java/lang/VirtualMachineError", types::ERROR_CLASS),
        ("java/lang/LinkageError", types::ERROR_CLASS),
        (
            "java/lang/IncompatibleClassChangeError",
            "java/lang/LinkageError",
        ),
    ] {
        let id = names.intern_str(name);
        let super_id = names.intern_str(super_name);
        registry.register(id, Some(super_id), None, Vec::new());
    }

    for kind in ExceptionKind::ALL {
        let id = names.intern_str(kind.internal_name());
        let super_id = names.intern_str(kind.direct_super_name());
        registry.register(id, Some(super_id), None, Vec::new());
    }

    registry.register(
        names.string_id(),
        Some(object),
        Some("String.java"),
        vec![FieldDef::new(crate::object::VALUE_FIELD, types::BYTE_ARRAY)],
    );

    let string_field = |name: &str| FieldDef::new(name, types::STRING_DESC);
    registry.register(
        names.intern_str(types::STACK_TRACE_ELEMENT_CLASS),
        Some(object),
        None,
        vec![
            string_field("declaringClass"),
            string_field("methodName"),
            string_field("fileName"),
            string_field("sourceLine"),
        ],
    );

    let number = names.intern_str("java/lang/Number");
    registry.register(number, Some(object), None, Vec::new());
    for (name, tag) in [
        ("java/lang/Integer", types::INT),
        ("java/lang/Long", types::LONG),
        ("java/lang/Short", types::SHORT),
        ("java/lang/Byte", types::BYTE),
        ("java/lang/Float", types::FLOAT),
        ("java/lang/Double", types::DOUBLE),
    ] {
        registry.register(
            names.intern_str(name),
            Some(number),
            None,
            vec![FieldDef::new(crate::object::VALUE_FIELD, tag)],
        );
    }
    registry.register(
        names.intern_str("java/lang/Character"),
        Some(object),
        None,
        vec![FieldDef::new(crate::object::VALUE_FIELD, types::CHAR)],
    );
    registry.register(
        names.intern_str("java/lang/Boolean"),
        Some(object),
        None,
        vec![FieldDef::new(crate::object::VALUE_FIELD, types::BOOL)],
    );

    // Shim-backed library classes; their constructors install the backing
    for name in [
        "java/lang/Class",
        "java/lang/System",
        "java/io/PrintStream",
        "java/util/ArrayList",
        "java/util/LinkedList",
        "java/util/HashMap",
        "java/util/Iterator",
        "java/util/Base64",
        "java/util/Base64$Encoder",
        "java/util/Base64$Decoder",
        "java/util/Date",
        "java/util/TimeZone",
        "java/util/concurrent/atomic/AtomicInteger",
    ] {
        registry.register(names.intern_str(name), Some(object), None, Vec::new());
    }
}

#[cfg(test)]
mod tests {
    use cascara_base::names::ClassNames;

    use super::{register_core_classes, ClassRegistry};

    #[test]
    fn subclass_walks_are_transitive() {
        let names = ClassNames::new();
        let mut registry = ClassRegistry::new();
        register_core_classes(&mut registry, &names);

        let npe = names.intern(b"java/lang/NullPointerException");
        let runtime = names.intern(b"java/lang/RuntimeException");
        assert!(registry.is_same_or_subclass(npe, runtime));
        assert!(registry.is_same_or_subclass(npe, names.exception_id()));
        assert!(registry.is_same_or_subclass(npe, names.throwable_id()));
        assert!(registry.is_same_or_subclass(npe, names.object_id()));
        assert!(!registry.is_same_or_subclass(npe, names.error_id()));
        assert!(!registry.is_same_or_subclass(runtime, npe));
    }

    #[test]
    fn inherited_fields_are_collected() {
        let names = ClassNames::new();
        let mut registry = ClassRegistry::new();
        register_core_classes(&mut registry, &names);

        let aioobe = names.intern(b"java/lang/ArrayIndexOutOfBoundsException");
        let fields = registry.all_fields(aioobe);
        assert!(fields.iter().any(|f| f.name == "message"));
        assert!(fields.iter().any(|f| f.name == "stackTrace"));
    }
}
