//! `java/util/LinkedList` host methods over a host deque backing.

use std::collections::VecDeque;

use crate::exceptions::ExceptionKind;
use crate::gfunction::{
    arg_int, arg_obj, arg_value, clinit_generic, gmeth, iterator, trap_not_supported, try_g,
    values_equal, GCtx, GErrBlk, GLibrary, GValue,
};
use crate::heap::ObjRef;
use crate::object::FieldValue;
use crate::value::JavaValue;

const BACKING_TAG: &str = "Ljava/util/LinkedList;";

pub fn load_util_linked_list() -> GLibrary {
    vec![
        ("java/util/LinkedList.<clinit>()V", gmeth(0, clinit_generic)),
        ("java/util/LinkedList.<init>()V", gmeth(0, linkedlist_init)),
        (
            "java/util/LinkedList.<init>(Ljava/util/Collection;)V",
            gmeth(1, trap_not_supported),
        ),
        (
            "java/util/LinkedList.add(Ljava/lang/Object;)Z",
            gmeth(1, linkedlist_add_last),
        ),
        (
            "java/util/LinkedList.addFirst(Ljava/lang/Object;)V",
            gmeth(1, linkedlist_add_first_void),
        ),
        (
            "java/util/LinkedList.addLast(Ljava/lang/Object;)V",
            gmeth(1, linkedlist_add_last_void),
        ),
        (
            "java/util/LinkedList.getFirst()Ljava/lang/Object;",
            gmeth(0, linkedlist_get_first),
        ),
        (
            "java/util/LinkedList.getLast()Ljava/lang/Object;",
            gmeth(0, linkedlist_get_last),
        ),
        (
            "java/util/LinkedList.removeFirst()Ljava/lang/Object;",
            gmeth(0, linkedlist_remove_first),
        ),
        (
            "java/util/LinkedList.removeLast()Ljava/lang/Object;",
            gmeth(0, linkedlist_remove_last),
        ),
        (
            "java/util/LinkedList.peekFirst()Ljava/lang/Object;",
            gmeth(0, linkedlist_peek_first),
        ),
        (
            "java/util/LinkedList.peekLast()Ljava/lang/Object;",
            gmeth(0, linkedlist_peek_last),
        ),
        (
            "java/util/LinkedList.pollFirst()Ljava/lang/Object;",
            gmeth(0, linkedlist_poll_first),
        ),
        (
            "java/util/LinkedList.push(Ljava/lang/Object;)V",
            gmeth(1, linkedlist_add_first_void),
        ),
        (
            "java/util/LinkedList.pop()Ljava/lang/Object;",
            gmeth(0, linkedlist_remove_first),
        ),
        ("java/util/LinkedList.size()I", gmeth(0, linkedlist_size)),
        (
            "java/util/LinkedList.isEmpty()Z",
            gmeth(0, linkedlist_is_empty),
        ),
        ("java/util/LinkedList.clear()V", gmeth(0, linkedlist_clear)),
        (
            "java/util/LinkedList.contains(Ljava/lang/Object;)Z",
            gmeth(1, linkedlist_contains),
        ),
        (
            "java/util/LinkedList.get(I)Ljava/lang/Object;",
            gmeth(1, linkedlist_get),
        ),
        (
            "java/util/LinkedList.iterator()Ljava/util/Iterator;",
            gmeth(0, linkedlist_iterator),
        ),
        (
            "java/util/LinkedList.sort(Ljava/util/Comparator;)V",
            gmeth(1, trap_not_supported),
        ),
    ]
}

fn backing_mut<'a>(
    ctx: &'a mut GCtx<'_>,
    list: ObjRef,
) -> Result<&'a mut VecDeque<JavaValue>, GErrBlk> {
    match ctx
        .vm
        .heap
        .get_mut(list)
        .and_then(|object| object.value_field_mut())
    {
        Some(FieldValue::List(items)) => Ok(items),
        _ => Err(GErrBlk::new(
            ExceptionKind::IllegalStateException,
            "LinkedList backing missing",
        )),
    }
}

fn backing<'a>(ctx: &'a GCtx<'_>, list: ObjRef) -> Result<&'a VecDeque<JavaValue>, GErrBlk> {
    match ctx.vm.heap.get(list).and_then(|object| object.value_field()) {
        Some(FieldValue::List(items)) => Ok(items),
        _ => Err(GErrBlk::new(
            ExceptionKind::IllegalStateException,
            "LinkedList backing missing",
        )),
    }
}

fn no_such_element() -> GValue {
    GValue::Err(GErrBlk::new(
        ExceptionKind::NoSuchElementException,
        "list is empty",
    ))
}

fn linkedlist_init(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    if let Some(object) = ctx.vm.heap.get_mut(list) {
        object.set_field(
            crate::object::VALUE_FIELD,
            BACKING_TAG,
            FieldValue::List(VecDeque::new()),
        );
    }
    GValue::Void
}

fn linkedlist_add_last(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    let element = try_g!(arg_value(args, 1));
    try_g!(backing_mut(ctx, list)).push_back(element);
    GValue::Value(JavaValue::Int(1))
}

fn linkedlist_add_last_void(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    let element = try_g!(arg_value(args, 1));
    try_g!(backing_mut(ctx, list)).push_back(element);
    GValue::Void
}

fn linkedlist_add_first_void(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    let element = try_g!(arg_value(args, 1));
    try_g!(backing_mut(ctx, list)).push_front(element);
    GValue::Void
}

fn linkedlist_get_first(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    match try_g!(backing(ctx, list)).front() {
        Some(element) => GValue::Value(*element),
        None => no_such_element(),
    }
}

fn linkedlist_get_last(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    match try_g!(backing(ctx, list)).back() {
        Some(element) => GValue::Value(*element),
        None => no_such_element(),
    }
}

fn linkedlist_remove_first(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    match try_g!(backing_mut(ctx, list)).pop_front() {
        Some(element) => GValue::Value(element),
        None => no_such_element(),
    }
}

fn linkedlist_remove_last(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    match try_g!(backing_mut(ctx, list)).pop_back() {
        Some(element) => GValue::Value(element),
        None => no_such_element(),
    }
}

fn linkedlist_peek_first(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    GValue::Value(
        try_g!(backing(ctx, list))
            .front()
            .copied()
            .unwrap_or(JavaValue::NULL),
    )
}

fn linkedlist_peek_last(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    GValue::Value(
        try_g!(backing(ctx, list))
            .back()
            .copied()
            .unwrap_or(JavaValue::NULL),
    )
}

fn linkedlist_poll_first(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    GValue::Value(
        try_g!(backing_mut(ctx, list))
            .pop_front()
            .unwrap_or(JavaValue::NULL),
    )
}

fn linkedlist_size(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    GValue::Value(JavaValue::Int(try_g!(backing(ctx, list)).len() as i64))
}

fn linkedlist_is_empty(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    GValue::Value(JavaValue::Int(i64::from(
        try_g!(backing(ctx, list)).is_empty(),
    )))
}

fn linkedlist_clear(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    try_g!(backing_mut(ctx, list)).clear();
    GValue::Void
}

fn linkedlist_contains(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    let target = try_g!(arg_value(args, 1));
    let items: Vec<JavaValue> = try_g!(backing(ctx, list)).iter().copied().collect();
    let found = items.iter().any(|&item| values_equal(ctx.vm, item, target));
    GValue::Value(JavaValue::Int(i64::from(found)))
}

fn linkedlist_get(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
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

fn linkedlist_iterator(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let list = try_g!(arg_obj(args, 0));
    let iterator = iterator::make_iterator(ctx, list);
    GValue::Value(JavaValue::Ref(Some(iterator)))
}

#[cfg(test)]
mod tests {
    use super::{
        linkedlist_add_first_void, linkedlist_add_last, linkedlist_init, linkedlist_remove_first,
        linkedlist_remove_last, linkedlist_size,
    };
    use crate::gfunction::{expect_value, GCtx, GValue};
    use crate::object::Object;
    use crate::testutil::test_vm;
    use crate::value::JavaValue;

    #[test]
    fn deque_discipline() {
        let mut vm = test_vm();
        let class = vm.class_names.intern(b"java/util/LinkedList");
        let list = vm.heap.alloc(Object::new(class));
        let list_arg = JavaValue::Ref(Some(list));

        let mut ctx = GCtx {
            vm: &mut vm,
            frames: None,
        };
        linkedlist_init(&mut ctx, &mut vec![list_arg]);
        linkedlist_add_last(&mut ctx, &mut vec![list_arg, JavaValue::Int(2)]);
        linkedlist_add_first_void(&mut ctx, &mut vec![list_arg, JavaValue::Int(1)]);
        linkedlist_add_last(&mut ctx, &mut vec![list_arg, JavaValue::Int(3)]);

        assert_eq!(
            expect_value(linkedlist_size(&mut ctx, &mut vec![list_arg])),
            JavaValue::Int(3)
        );
        assert_eq!(
            expect_value(linkedlist_remove_first(&mut ctx, &mut vec![list_arg])),
            JavaValue::Int(1)
        );
        assert_eq!(
            expect_value(linkedlist_remove_last(&mut ctx, &mut vec![list_arg])),
            JavaValue::Int(3)
        );
        assert_eq!(
            expect_value(linkedlist_remove_first(&mut ctx, &mut vec![list_arg])),
            JavaValue::Int(2)
        );
        assert!(matches!(
            linkedlist_remove_first(&mut ctx, &mut vec![list_arg]),
            GValue::Err(block)
                if block.kind == crate::exceptions::ExceptionKind::NoSuchElementException
        ));
    }
}
