//! Instance materialization: zeroed instances from registry metadata and
//! boxed primitive wrappers.

use cascara_base::id::ClassNameId;
use cascara_base::names::ClassNames;

use crate::classes::ClassRegistry;
use crate::heap::{Heap, ObjRef};
use crate::object::{FieldValue, Object};
use crate::value::JavaValue;

/// Create an instance with its declared and inherited fields set to their
/// type defaults. Classes the registry does not know get an empty field
/// table; their fields appear as they are written.
pub fn instantiate_class(heap: &mut Heap, classes: &ClassRegistry, class_id: ClassNameId) -> ObjRef {
    let mut object = Object::new(class_id);
    for field in classes.all_fields(class_id) {
        object.set_field(
            &field.name,
            &field.type_tag,
            FieldValue::Value(JavaValue::default_for_tag(&field.type_tag)),
        );
    }
    heap.alloc(object)
}

/// A primitive wrapper instance (`java/lang/Integer` and friends) whose
/// `value` field holds the given value.
pub fn make_primitive(
    heap: &mut Heap,
    names: &ClassNames,
    class_name: &str,
    type_tag: &str,
    value: JavaValue,
) -> ObjRef {
    heap.alloc(Object::with_value(
        names.intern_str(class_name),
        type_tag,
        FieldValue::Value(value),
    ))
}

#[cfg(test)]
mod tests {
    use cascara_base::names::ClassNames;
    use cascara_base::types;

    use super::{instantiate_class, make_primitive};
    use crate::classes::{register_core_classes, ClassRegistry};
    use crate::heap::Heap;
    use crate::object::FieldValue;
    use crate::value::JavaValue;

    #[test]
    fn fields_default_by_tag() {
        let names = ClassNames::new();
        let mut registry = ClassRegistry::new();
        register_core_classes(&mut registry, &names);
        let mut heap = Heap::new();

        let npe = names.intern(b"java/lang/NullPointerException");
        let obj = instantiate_class(&mut heap, &registry, npe);
        let object = heap.get(obj).unwrap();
        assert!(matches!(
            object.field("message").map(|f| &f.value),
            Some(FieldValue::Value(JavaValue::Ref(None)))
        ));
    }

    #[test]
    fn boxed_primitive() {
        let names = ClassNames::new();
        let mut heap = Heap::new();
        let boxed = make_primitive(
            &mut heap,
            &names,
            "java/lang/Integer",
            types::INT,
            JavaValue::Int(7),
        );
        let object = heap.get(boxed).unwrap();
        assert!(matches!(
            object.value_field(),
            Some(FieldValue::Value(JavaValue::Int(7)))
        ));
    }
}
