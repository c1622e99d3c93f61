//! `java/util/HashMap` host methods. Backing is a host ordered map from a
//! hashable key projection to `(original key, value)` so the original key
//! objects survive for future iteration support.

use indexmap::IndexMap;

use crate::exceptions::ExceptionKind;
use crate::gfunction::{
    arg_obj, arg_value, clinit_generic, gmeth, trap_not_supported, try_g, values_equal, GCtx,
    GErrBlk, GLibrary, GValue,
};
use crate::heap::ObjRef;
use crate::object::{self, FieldValue, MapKey};
use crate::value::JavaValue;
use crate::Vm;

const BACKING_TAG: &str = "Ljava/util/HashMap;";

pub fn load_util_hash_map() -> GLibrary {
    vec![
        ("java/util/HashMap.<clinit>()V", gmeth(0, clinit_generic)),
        ("java/util/HashMap.<init>()V", gmeth(0, hashmap_init)),
        ("java/util/HashMap.<init>(I)V", gmeth(1, hashmap_init_sized)),
        (
            "java/util/HashMap.put(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;",
            gmeth(2, hashmap_put),
        ),
        (
            "java/util/HashMap.get(Ljava/lang/Object;)Ljava/lang/Object;",
            gmeth(1, hashmap_get),
        ),
        (
            "java/util/HashMap.getOrDefault(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;",
            gmeth(2, hashmap_get_or_default),
        ),
        (
            "java/util/HashMap.remove(Ljava/lang/Object;)Ljava/lang/Object;",
            gmeth(1, hashmap_remove),
        ),
        (
            "java/util/HashMap.containsKey(Ljava/lang/Object;)Z",
            gmeth(1, hashmap_contains_key),
        ),
        (
            "java/util/HashMap.containsValue(Ljava/lang/Object;)Z",
            gmeth(1, hashmap_contains_value),
        ),
        ("java/util/HashMap.size()I", gmeth(0, hashmap_size)),
        ("java/util/HashMap.isEmpty()Z", gmeth(0, hashmap_is_empty)),
        ("java/util/HashMap.clear()V", gmeth(0, hashmap_clear)),
        (
            "java/util/HashMap.keySet()Ljava/util/Set;",
            gmeth(0, trap_not_supported),
        ),
        (
            "java/util/HashMap.entrySet()Ljava/util/Set;",
            gmeth(0, trap_not_supported),
        ),
        (
            "java/util/HashMap.values()Ljava/util/Collection;",
            gmeth(0, trap_not_supported),
        ),
    ]
}

type Backing = IndexMap<MapKey, (JavaValue, JavaValue)>;

/// Project a Java value to a hashable key: primitives by value, boxed
/// numerics unwrapped, strings by contents, other references by identity.
fn map_key_of(vm: &Vm, value: JavaValue) -> MapKey {
    match value {
        JavaValue::Int(v) | JavaValue::Long(v) => MapKey::Int(v),
        JavaValue::Float(v) | JavaValue::Double(v) => MapKey::Bits(v.to_bits()),
        JavaValue::RetAddr(v) => MapKey::Int(i64::from(v)),
        JavaValue::Ref(None) => MapKey::Null,
        JavaValue::Ref(Some(reference)) => {
            if let Some(text) = object::get_string(&vm.heap, reference) {
                return MapKey::Str(text.into_bytes());
            }
            if let Some(object) = vm.heap.get(reference) {
                if let Some(FieldValue::Value(inner)) = object.value_field() {
                    match inner {
                        JavaValue::Int(v) | JavaValue::Long(v) => return MapKey::Int(*v),
                        JavaValue::Float(v) | JavaValue::Double(v) => {
                            return MapKey::Bits(v.to_bits())
                        }
                        _ => {}
                    }
                }
            }
            MapKey::Ref(reference)
        }
    }
}

fn backing_mut<'a>(ctx: &'a mut GCtx<'_>, map: ObjRef) -> Result<&'a mut Backing, GErrBlk> {
    match ctx
        .vm
        .heap
        .get_mut(map)
        .and_then(|object| object.value_field_mut())
    {
        Some(FieldValue::Map(entries)) => Ok(entries),
        _ => Err(GErrBlk::new(
            ExceptionKind::IllegalStateException,
            "HashMap backing missing",
        )),
    }
}

fn backing<'a>(ctx: &'a GCtx<'_>, map: ObjRef) -> Result<&'a Backing, GErrBlk> {
    match ctx.vm.heap.get(map).and_then(|object| object.value_field()) {
        Some(FieldValue::Map(entries)) => Ok(entries),
        _ => Err(GErrBlk::new(
            ExceptionKind::IllegalStateException,
            "HashMap backing missing",
        )),
    }
}

fn hashmap_init(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let map = try_g!(arg_obj(args, 0));
    if let Some(object) = ctx.vm.heap.get_mut(map) {
        object.set_field(
            crate::object::VALUE_FIELD,
            BACKING_TAG,
            FieldValue::Map(IndexMap::new()),
        );
    }
    GValue::Void
}

/// The capacity hint is accepted and ignored; the host map grows on its own.
fn hashmap_init_sized(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    hashmap_init(ctx, args)
}

fn hashmap_put(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let map = try_g!(arg_obj(args, 0));
    let key = try_g!(arg_value(args, 1));
    let value = try_g!(arg_value(args, 2));
    let projected = map_key_of(ctx.vm, key);
    let entries = try_g!(backing_mut(ctx, map));
    let previous = entries.insert(projected, (key, value));
    GValue::Value(previous.map_or(JavaValue::NULL, |(_, v)| v))
}

fn hashmap_get(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let map = try_g!(arg_obj(args, 0));
    let key = try_g!(arg_value(args, 1));
    let projected = map_key_of(ctx.vm, key);
    let entries = try_g!(backing(ctx, map));
    GValue::Value(entries.get(&projected).map_or(JavaValue::NULL, |(_, v)| *v))
}

fn hashmap_get_or_default(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let map = try_g!(arg_obj(args, 0));
    let key = try_g!(arg_value(args, 1));
    let fallback = try_g!(arg_value(args, 2));
    let projected = map_key_of(ctx.vm, key);
    let entries = try_g!(backing(ctx, map));
    GValue::Value(entries.get(&projected).map_or(fallback, |(_, v)| *v))
}

fn hashmap_remove(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let map = try_g!(arg_obj(args, 0));
    let key = try_g!(arg_value(args, 1));
    let projected = map_key_of(ctx.vm, key);
    let entries = try_g!(backing_mut(ctx, map));
    let previous = entries.shift_remove(&projected);
    GValue::Value(previous.map_or(JavaValue::NULL, |(_, v)| v))
}

fn hashmap_contains_key(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let map = try_g!(arg_obj(args, 0));
    let key = try_g!(arg_value(args, 1));
    let projected = map_key_of(ctx.vm, key);
    let entries = try_g!(backing(ctx, map));
    GValue::Value(JavaValue::Int(i64::from(entries.contains_key(&projected))))
}

fn hashmap_contains_value(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let map = try_g!(arg_obj(args, 0));
    let target = try_g!(arg_value(args, 1));
    let values: Vec<JavaValue> = try_g!(backing(ctx, map))
        .values()
        .map(|(_, v)| *v)
        .collect();
    let found = values
        .iter()
        .any(|&value| values_equal(ctx.vm, value, target));
    GValue::Value(JavaValue::Int(i64::from(found)))
}

fn hashmap_size(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let map = try_g!(arg_obj(args, 0));
    GValue::Value(JavaValue::Int(try_g!(backing(ctx, map)).len() as i64))
}

fn hashmap_is_empty(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let map = try_g!(arg_obj(args, 0));
    GValue::Value(JavaValue::Int(i64::from(try_g!(backing(ctx, map)).is_empty())))
}

fn hashmap_clear(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let map = try_g!(arg_obj(args, 0));
    try_g!(backing_mut(ctx, map)).clear();
    GValue::Void
}

#[cfg(test)]
mod tests {
    use super::{hashmap_get, hashmap_init, hashmap_put, hashmap_remove, hashmap_size};
    use crate::gfunction::{expect_value, GCtx};
    use crate::object::{make_string, Object};
    use crate::testutil::test_vm;
    use crate::value::JavaValue;

    #[test]
    fn put_get_remove_with_string_keys() {
        let mut vm = test_vm();
        let class = vm.class_names.intern(b"java/util/HashMap");
        let map = vm.heap.alloc(Object::new(class));
        let key_a = make_string(&mut vm.heap, &vm.class_names, false, "a");
        // A second, distinct string object with the same contents
        let key_a2 = make_string(&mut vm.heap, &vm.class_names, false, "a");
        let map_arg = JavaValue::Ref(Some(map));

        let mut ctx = GCtx {
            vm: &mut vm,
            frames: None,
        };
        hashmap_init(&mut ctx, &mut vec![map_arg]);

        let previous = expect_value(hashmap_put(
            &mut ctx,
            &mut vec![map_arg, JavaValue::Ref(Some(key_a)), JavaValue::Int(1)],
        ));
        assert_eq!(previous, JavaValue::NULL);

        // Content-equal key hits the same slot
        let got = expect_value(hashmap_get(
            &mut ctx,
            &mut vec![map_arg, JavaValue::Ref(Some(key_a2))],
        ));
        assert_eq!(got, JavaValue::Int(1));

        let removed = expect_value(hashmap_remove(
            &mut ctx,
            &mut vec![map_arg, JavaValue::Ref(Some(key_a))],
        ));
        assert_eq!(removed, JavaValue::Int(1));
        assert_eq!(
            expect_value(hashmap_size(&mut ctx, &mut vec![map_arg])),
            JavaValue::Int(0)
        );
    }

    #[test]
    fn int_keys_and_missing_lookups() {
        let mut vm = test_vm();
        let class = vm.class_names.intern(b"java/util/HashMap");
        let map = vm.heap.alloc(Object::new(class));
        let map_arg = JavaValue::Ref(Some(map));

        let mut ctx = GCtx {
            vm: &mut vm,
            frames: None,
        };
        hashmap_init(&mut ctx, &mut vec![map_arg]);
        hashmap_put(
            &mut ctx,
            &mut vec![map_arg, JavaValue::Int(9), JavaValue::Int(90)],
        );
        assert_eq!(
            expect_value(hashmap_get(&mut ctx, &mut vec![map_arg, JavaValue::Int(9)])),
            JavaValue::Int(90)
        );
        assert_eq!(
            expect_value(hashmap_get(&mut ctx, &mut vec![map_arg, JavaValue::Int(8)])),
            JavaValue::NULL
        );
    }
}
