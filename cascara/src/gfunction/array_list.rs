//! `java/util/ArrayList` host methods. The backing is a live host vector in
//! the reserved `value` field; mutations are visible to subsequent
//! Java-level reads.

use crate::exceptions::ExceptionKind;
use crate::gfunction::{
    arg_int, arg_obj, arg_value, clinit_generic, gmeth, iterator, trap_not_supported, try_g,
    values_equal, GCtx, GErrBlk, GLibrary, GValue,
};
use crate::heap::ObjRef;
use crate::object::FieldValue;
use crate::value::JavaValue;

const BACKING_TAG: &str = "[Ljava/lang/Object;";

pub fn load_util_array_list() -> GLibrary {
    vec![
        ("java/util/ArrayList.<clinit>()V", gmeth(0, clinit_generic)),
        ("java/util/ArrayList.<init>()V", gmeth(0, arraylist_init)),
        (
            "java/util/ArrayList.<init>(I)V",
            gmeth(1, arraylist_init_with_capacity),
        ),
        (
            "java/util/ArrayList.<init>(Ljava/util/Collection;)V",
            gmeth(1, trap_not_supported),
        ),
        (
            "java/util/ArrayList.add(Ljava/lang/Object;)Z",
            gmeth(1, arraylist_add),
        ),
        (
            "java/util/ArrayList.add(ILjava/lang/Object;)V",
            gmeth(2, arraylist_add_at_index),
        ),
        (
            "java/util/ArrayList.addAll(Ljava/util/Collection;)Z",
            gmeth(1, trap_not_supported),
        ),
        (
            "java/util/ArrayList.get(I)Ljava/lang/Object;",
            gmeth(1, arraylist_get),
        ),
        (
            "java/util/ArrayList.set(ILjava/lang/Object;)Ljava/lang/Object;",
            gmeth(2, arraylist_set),
        ),
        (
            "java/util/ArrayList.remove(I)Ljava/lang/Object;",
            gmeth(1, arraylist_remove_at_index),
        ),
        ("java/util/ArrayList.size()I", gmeth(0, arraylist_size)),
        ("java/util/ArrayList.isEmpty()Z", gmeth(0, arraylist_is_empty)),
        ("java/util/ArrayList.clear()V", gmeth(0, arraylist_clear)),
        (
            "java/util/ArrayList.contains(Ljava/lang/Object;)Z",
            gmeth(1, arraylist_contains),
        ),
        (
            "java/util/ArrayList.indexOf(Ljava/lang/Object;)I",
            gmeth(1, arraylist_index_of),
        ),
        (
            "java/util/ArrayList.lastIndexOf(Ljava/lang/Object;)I",
            gmeth(1, arraylist_last_index_of),
        ),
        (
            "java/util/ArrayList.ensureCapacity(I)V",
            gmeth(1, arraylist_ensure_capacity),
        ),
        (
            "java/util/ArrayList.iterator()Ljava/util/Iterator;",
            gmeth(0, arraylist_iterator),
        ),
        (
            "java/util/ArrayList.forEach(Ljava/util/function/Consumer;)V",
            gmeth(1, trap_not_supported),
        ),
        (
            "java/util/ArrayList.trimToSize()V",
            gmeth(0, arraylist_trim_to_size),
        ),
    ]
}

fn backing_mut<'a>(ctx: &'a mut GCtx<'_>, list: ObjRef) -> Result<&'a mut Vec<JavaValue>, GErrBlk> {
    match ctx
        .vm
        .heap
        .get_mut(list)
        .and_then(|object| object.value_field_mut())
    {
        Some(FieldValue::Refs(items)) => Ok(items),
        _ => Err(GErrBlk::new(
            ExceptionKind::IllegalStateException,
            "ArrayList backing missing",
        )),
    }
}

fn backing<'a>(ctx: &'a GCtx<'_>, list: ObjRef) -> Result<&'a Vec<JavaValue>, GErrBlk> {
    match ctx.vm.heap.get(list).and_then(|object| object.value_field()) {
        Some(FieldValue::Refs(items)) => Ok(items),
        _ => Err(GErrBlk::new(
            ExceptionKind::IllegalStateException,
            "ArrayList backing missing",
        )),
    }
}

fn install_backing(ctx: &mut GCtx<'_>, list: ObjRef, items: Vec<JavaValue>) {
    if let Some(object) = ctx.vm.heap.get_mut(list) {
        object.set_field(
            crate::object::VALUE_FIELD,
            BACKING_TAG,
            FieldValue::Refs(items),
        );
    }
}

fn arraylist_init(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    install_backing(ctx, list, Vec::new());
    GValue::Void
}

fn arraylist_init_with_capacity(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    let capacity = try_g!(arg_int(args, 1));
    if capacity < 0 {
        return GValue::Err(GErrBlk::new(
            ExceptionKind::IllegalArgumentException,
            format!("Illegal Capacity: {}", capacity),
        ));
    }
    install_backing(ctx, list, Vec::with_capacity(capacity as usize));
    GValue::Void
}

fn arraylist_add(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    let element = try_g!(arg_value(args, 1));
    let items = try_g!(backing_mut(ctx, list));
    items.push(element);
    GValue::Value(JavaValue::Int(1))
}

fn arraylist_add_at_index(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    let index = try_g!(arg_int(args, 1));
    let element = try_g!(arg_value(args, 2));
    let items = try_g!(backing_mut(ctx, list));
    if index < 0 || index as usize > items.len() {
        return GValue::Err(GErrBlk::new(
            ExceptionKind::IndexOutOfBoundsException,
            format!("Index: {}, Size: {}", index, items.len()),
        ));
    }
    items.insert(index as usize, element);
    GValue::Void
}

fn arraylist_get(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    let index = try_g!(arg_int(args, 1));
    let items = try_g!(backing(ctx, list));
    match usize::try_from(index).ok().and_then(|i| items.get(i)) {
        Some(element) => GValue::Value(*element),
        None => GValue::Err(GErrBlk::new(
            ExceptionKind::IndexOutOfBoundsException,
            format!("Index: {}, Size: {}", index, items.len()),
        )),
    }
}

fn arraylist_set(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    let index = try_g!(arg_int(args, 1));
    let element = try_g!(arg_value(args, 2));
    let items = try_g!(backing_mut(ctx, list));
    match usize::try_from(index).ok().and_then(|i| items.get_mut(i)) {
        Some(slot) => {
            let previous = *slot;
            *slot = element;
            GValue::Value(previous)
        }
        None => GValue::Err(GErrBlk::new(
            ExceptionKind::IndexOutOfBoundsException,
            format!("Index: {}, Size: {}", index, items.len()),
        )),
    }
}

fn arraylist_remove_at_index(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    let index = try_g!(arg_int(args, 1));
    let items = try_g!(backing_mut(ctx, list));
    if index < 0 || index as usize >= items.len() {
        return GValue::Err(GErrBlk::new(
            ExceptionKind::IndexOutOfBoundsException,
            format!("Index: {}, Size: {}", index, items.len()),
        ));
    }
    GValue::Value(items.remove(index as usize))
}

fn arraylist_size(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    let items = try_g!(backing(ctx, list));
    GValue::Value(JavaValue::Int(items.len() as i64))
}

fn arraylist_is_empty(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    let items = try_g!(backing(ctx, list));
    GValue::Value(JavaValue::Int(i64::from(items.is_empty())))
}

fn arraylist_clear(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    let items = try_g!(backing_mut(ctx, list));
    items.clear();
    GValue::Void
}

fn arraylist_contains(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    let target = try_g!(arg_value(args, 1));
    let items = try_g!(backing(ctx, list)).clone();
    let found = items.iter().any(|&item| values_equal(ctx.vm, item, target));
    GValue::Value(JavaValue::Int(i64::from(found)))
}

fn arraylist_index_of(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    let target = try_g!(arg_value(args, 1));
    let items = try_g!(backing(ctx, list)).clone();
    let index = items
        .iter()
        .position(|&item| values_equal(ctx.vm, item, target))
        .map_or(-1, |i| i as i64);
    GValue::Value(JavaValue::Int(index))
}

fn arraylist_last_index_of(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    let target = try_g!(arg_value(args, 1));
    let items = try_g!(backing(ctx, list)).clone();
    let index = items
        .iter()
        .rposition(|&item| values_equal(ctx.vm, item, target))
        .map_or(-1, |i| i as i64);
    GValue::Value(JavaValue::Int(index))
}

fn arraylist_ensure_capacity(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    let capacity = try_g!(arg_int(args, 1));
    let items = try_g!(backing_mut(ctx, list));
    if capacity as usize > items.len() {
        items.reserve(capacity as usize - items.len());
    }
    GValue::Void
}

fn arraylist_trim_to_size(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    let items = try_g!(backing_mut(ctx, list));
    items.shrink_to_fit();
    GValue::Void
}

fn arraylist_iterator(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    let iterator = iterator::make_iterator(ctx, list);
    GValue::Value(JavaValue::Ref(Some(iterator)))
}

#[cfg(test)]
mod tests {
    use super::{
        arraylist_add, arraylist_get, arraylist_init, arraylist_remove_at_index, arraylist_size,
    };
    use crate::gfunction::{expect_value, GCtx, GValue};
    use crate::object::Object;
    use crate::testutil::test_vm;
    use crate::value::JavaValue;

    #[test]
    fn add_get_remove() {
        let mut vm = test_vm();
        let class = vm.class_names.intern(b"java/util/ArrayList");
        let list = vm.heap.alloc(Object::new(class));
        let list_arg = JavaValue::Ref(Some(list));

        let mut ctx = GCtx {
            vm: &mut vm,
            frames: None,
        };
        arraylist_init(&mut ctx, &mut vec![list_arg]);
        arraylist_add(&mut ctx, &mut vec![list_arg, JavaValue::Int(5)]);
        arraylist_add(&mut ctx, &mut vec![list_arg, JavaValue::Int(7)]);

        assert_eq!(
            expect_value(arraylist_size(&mut ctx, &mut vec![list_arg])),
            JavaValue::Int(2)
        );
        assert_eq!(
            expect_value(arraylist_get(&mut ctx, &mut vec![list_arg, JavaValue::Int(1)])),
            JavaValue::Int(7)
        );

        let removed = expect_value(arraylist_remove_at_index(
            &mut ctx,
            &mut vec![list_arg, JavaValue::Int(0)],
        ));
        assert_eq!(removed, JavaValue::Int(5));
        assert_eq!(
            expect_value(arraylist_size(&mut ctx, &mut vec![list_arg])),
            JavaValue::Int(1)
        );
    }

    #[test]
    fn out_of_range_get_is_an_error_block() {
        let mut vm = test_vm();
        let class = vm.class_names.intern(b"java/util/ArrayList");
        let list = vm.heap.alloc(Object::new(class));
        let list_arg = JavaValue::Ref(Some(list));

        let mut ctx = GCtx {
            vm: &mut vm,
            frames: None,
        };
        arraylist_init(&mut ctx, &mut vec![list_arg]);
        assert!(matches!(
            arraylist_get(&mut ctx, &mut vec![list_arg, JavaValue::Int(0)]),
            GValue::Err(block) if block.kind == crate::exceptions::ExceptionKind::IndexOutOfBoundsException
        ));
    }
}
