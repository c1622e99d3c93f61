//! `java/util/Iterator` over the collection shim backings. An iterator is an
//! object holding a reference to its collection and an int cursor.

use cascara_base::types;

use crate::exceptions::ExceptionKind;
use crate::gfunction::{arg_obj, gmeth, trap_not_supported, try_g, GCtx, GErrBlk, GLibrary, GValue};
use crate::heap::{Heap, ObjRef};
use crate::object::{FieldValue, Object};
use crate::value::JavaValue;
use crate::Vm;

pub fn load_util_iterator() -> GLibrary {
    vec![
        ("java/util/Iterator.hasNext()Z", gmeth(0, iterator_has_next)),
        (
            "java/util/Iterator.next()Ljava/lang/Object;",
            gmeth(0, iterator_next),
        ),
        ("java/util/Iterator.remove()V", gmeth(0, trap_not_supported)),
    ]
}

/// Build an iterator object positioned at the start of `collection`.
pub fn make_iterator(ctx: &mut GCtx<'_>, collection: ObjRef) -> ObjRef {
    let class = ctx.vm.class_names.intern(b"java/util/Iterator");
    let mut iterator = Object::new(class);
    iterator.set_field(
        "collection",
        "Ljava/lang/Object;",
        FieldValue::Value(JavaValue::Ref(Some(collection))),
    );
    iterator.set_field("cursor", types::INT, FieldValue::Value(JavaValue::Int(0)));
    ctx.vm.heap.alloc(iterator)
}

fn iterator_state(vm: &Vm, iterator: ObjRef) -> Result<(ObjRef, i64), GErrBlk> {
    let object = vm
        .heap
        .get(iterator)
        .ok_or_else(|| GErrBlk::new(ExceptionKind::InternalError, "dangling iterator"))?;
    let collection = match object.field("collection").map(|f| &f.value) {
        Some(FieldValue::Value(JavaValue::Ref(Some(reference)))) => *reference,
        _ => {
            return Err(GErrBlk::new(
                ExceptionKind::IllegalStateException,
                "iterator has no collection",
            ))
        }
    };
    let cursor = match object.field("cursor").map(|f| &f.value) {
        Some(FieldValue::Value(JavaValue::Int(cursor))) => *cursor,
        _ => 0,
    };
    Ok((collection, cursor))
}

fn collection_len(heap: &Heap, collection: ObjRef) -> Result<usize, GErrBlk> {
    heap.get(collection)
        .and_then(Object::array_length)
        .ok_or_else(|| {
            GErrBlk::new(
                ExceptionKind::IllegalStateException,
                "iterated object has no backing",
            )
        })
}

fn element_at(heap: &Heap, collection: ObjRef, index: usize) -> Option<JavaValue> {
    match heap.get(collection)?.value_field()? {
        FieldValue::Refs(items) => items.get(index).copied(),
        FieldValue::List(items) => items.get(index).copied(),
        FieldValue::Ints(items) => items.get(index).map(|&v| JavaValue::Int(v)),
        FieldValue::Floats(items) => items.get(index).map(|&v| JavaValue::Double(v)),
        _ => None,
    }
}

fn iterator_has_next(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let iterator = try_g!(arg_obj(args, 0));
    let (collection, cursor) = try_g!(iterator_state(ctx.vm, iterator));
    let len = try_g!(collection_len(&ctx.vm.heap, collection));
    GValue::Value(JavaValue::Int(i64::from((cursor as usize) < len)))
}

fn iterator_next(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let iterator = try_g!(arg_obj(args, 0));
    let (collection, cursor) = try_g!(iterator_state(ctx.vm, iterator));
    let len = try_g!(collection_len(&ctx.vm.heap, collection));
    if cursor as usize >= len {
        return GValue::Err(GErrBlk::new(
            ExceptionKind::NoSuchElementException,
            "iteration past the end",
        ));
    }
    let Some(element) = element_at(&ctx.vm.heap, collection, cursor as usize) else {
        return GValue::Err(GErrBlk::new(
            ExceptionKind::InternalError,
            "iterator cursor out of sync",
        ));
    };
    if let Some(object) = ctx.vm.heap.get_mut(iterator) {
        object.set_field(
            "cursor",
            types::INT,
            FieldValue::Value(JavaValue::Int(cursor + 1)),
        );
    }
    GValue::Value(element)
}

#[cfg(test)]
mod tests {
    use super::{iterator_has_next, iterator_next, make_iterator};
    use crate::gfunction::{expect_value, GCtx, GValue};
    use crate::object::{FieldValue, Object};
    use crate::testutil::test_vm;
    use crate::value::JavaValue;

    #[test]
    fn walks_and_then_refuses() {
        let mut vm = test_vm();
        let list_class = vm.class_names.intern(b"java/util/ArrayList");
        let backing = FieldValue::Refs(vec![JavaValue::Int(10), JavaValue::Int(20)]);
        let list = vm
            .heap
            .alloc(Object::with_value(list_class, "[Ljava/lang/Object;", backing));

        let mut ctx = GCtx {
            vm: &mut vm,
            frames: None,
        };
        let iter = make_iterator(&mut ctx, list);
        let iter_arg = JavaValue::Ref(Some(iter));

        assert_eq!(
            expect_value(iterator_has_next(&mut ctx, &mut vec![iter_arg])),
            JavaValue::Int(1)
        );
        assert_eq!(
            expect_value(iterator_next(&mut ctx, &mut vec![iter_arg])),
            JavaValue::Int(10)
        );
        assert_eq!(
            expect_value(iterator_next(&mut ctx, &mut vec![iter_arg])),
            JavaValue::Int(20)
        );
        assert_eq!(
            expect_value(iterator_has_next(&mut ctx, &mut vec![iter_arg])),
            JavaValue::Int(0)
        );
        assert!(matches!(
            iterator_next(&mut ctx, &mut vec![iter_arg]),
            GValue::Err(block) if block.kind == crate::exceptions::ExceptionKind::NoSuchElementException
        ));
    }
}
