//! `java/util/concurrent/atomic/AtomicInteger` host methods. Every mutator
//! runs under the VM's dedicated atomic mutex; compare-and-set is atomic
//! under that lock.

use std::sync::Arc;

use cascara_base::types;

use crate::exceptions::ExceptionKind;
use crate::gfunction::{
    arg_int, arg_obj, clinit_generic, gmeth, string_value, trap_not_supported, try_g, GCtx,
    GErrBlk, GLibrary, GValue,
};
use crate::heap::ObjRef;
use crate::object::FieldValue;
use crate::value::JavaValue;

const ATOMIC_CLASS: &str = "java/util/concurrent/atomic/AtomicInteger";

pub fn load_util_atomic_integer() -> GLibrary {
    vec![
        (
            "java/util/concurrent/atomic/AtomicInteger.<clinit>()V",
            gmeth(0, clinit_generic),
        ),
        (
            "java/util/concurrent/atomic/AtomicInteger.<init>()V",
            gmeth(0, atomic_init_zero),
        ),
        (
            "java/util/concurrent/atomic/AtomicInteger.<init>(I)V",
            gmeth(1, atomic_init_value),
        ),
        (
            "java/util/concurrent/atomic/AtomicInteger.get()I",
            gmeth(0, atomic_get),
        ),
        (
            "java/util/concurrent/atomic/AtomicInteger.getAcquire()I",
            gmeth(0, atomic_get),
        ),
        (
            "java/util/concurrent/atomic/AtomicInteger.set(I)V",
            gmeth(1, atomic_set),
        ),
        (
            "java/util/concurrent/atomic/AtomicInteger.lazySet(I)V",
            gmeth(1, atomic_set),
        ),
        (
            "java/util/concurrent/atomic/AtomicInteger.getAndSet(I)I",
            gmeth(1, atomic_get_and_set),
        ),
        (
            "java/util/concurrent/atomic/AtomicInteger.incrementAndGet()I",
            gmeth(0, atomic_increment_and_get),
        ),
        (
            "java/util/concurrent/atomic/AtomicInteger.decrementAndGet()I",
            gmeth(0, atomic_decrement_and_get),
        ),
        (
            "java/util/concurrent/atomic/AtomicInteger.getAndIncrement()I",
            gmeth(0, atomic_get_and_increment),
        ),
        (
            "java/util/concurrent/atomic/AtomicInteger.getAndDecrement()I",
            gmeth(0, atomic_get_and_decrement),
        ),
        (
            "java/util/concurrent/atomic/AtomicInteger.addAndGet(I)I",
            gmeth(1, atomic_add_and_get),
        ),
        (
            "java/util/concurrent/atomic/AtomicInteger.getAndAdd(I)I",
            gmeth(1, atomic_get_and_add),
        ),
        (
            "java/util/concurrent/atomic/AtomicInteger.compareAndSet(II)Z",
            gmeth(2, atomic_compare_and_set),
        ),
        (
            "java/util/concurrent/atomic/AtomicInteger.weakCompareAndSet(II)Z",
            gmeth(2, atomic_compare_and_set),
        ),
        (
            "java/util/concurrent/atomic/AtomicInteger.accumulateAndGet(ILjava/util/function/IntBinaryOperator;)I",
            gmeth(2, trap_not_supported),
        ),
        (
            "java/util/concurrent/atomic/AtomicInteger.intValue()I",
            gmeth(0, atomic_get),
        ),
        (
            "java/util/concurrent/atomic/AtomicInteger.longValue()J",
            gmeth(0, atomic_long_value),
        ),
        (
            "java/util/concurrent/atomic/AtomicInteger.doubleValue()D",
            gmeth(0, atomic_double_value),
        ),
        (
            "java/util/concurrent/atomic/AtomicInteger.toString()Ljava/lang/String;",
            gmeth(0, atomic_to_string),
        ),
    ]
}

fn backing_value(ctx: &GCtx<'_>, receiver: ObjRef) -> Result<i64, GErrBlk> {
    match ctx
        .vm
        .heap
        .get(receiver)
        .and_then(|object| object.value_field())
    {
        Some(FieldValue::Value(JavaValue::Int(value))) => Ok(*value),
        _ => Err(GErrBlk::new(
            ExceptionKind::IllegalStateException,
            "AtomicInteger backing missing",
        )),
    }
}

fn store_value(ctx: &mut GCtx<'_>, receiver: ObjRef, value: i64) {
    if let Some(object) = ctx.vm.heap.get_mut(receiver) {
        object.set_field(
            crate::object::VALUE_FIELD,
            types::INT,
            FieldValue::Value(JavaValue::Int(value as i32 as i64)),
        );
    }
}

fn atomic_init_zero(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    store_value(ctx, receiver, 0);
    GValue::Void
}

fn atomic_init_value(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    let value = try_g!(arg_int(args, 1));
    store_value(ctx, receiver, value);
    GValue::Void
}

fn atomic_get(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    let lock = Arc::clone(&ctx.vm.atomic_guard);
    let _guard = lock.lock().unwrap();
    let value = try_g!(backing_value(ctx, receiver));
    GValue::Value(JavaValue::Int(value))
}

fn atomic_set(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    let value = try_g!(arg_int(args, 1));
    let lock = Arc::clone(&ctx.vm.atomic_guard);
    let _guard = lock.lock().unwrap();
    store_value(ctx, receiver, value);
    GValue::Void
}

fn atomic_get_and_set(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    let value = try_g!(arg_int(args, 1));
    let lock = Arc::clone(&ctx.vm.atomic_guard);
    let _guard = lock.lock().unwrap();
    let previous = try_g!(backing_value(ctx, receiver));
    store_value(ctx, receiver, value);
    GValue::Value(JavaValue::Int(previous))
}

fn fetch_add(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>, delta: i64, return_new: bool) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    let lock = Arc::clone(&ctx.vm.atomic_guard);
    let _guard = lock.lock().unwrap();
    let previous = try_g!(backing_value(ctx, receiver));
    let updated = (previous as i32).wrapping_add(delta as i32);
    store_value(ctx, receiver, i64::from(updated));
    let result = if return_new { i64::from(updated) } else { previous };
    GValue::Value(JavaValue::Int(result))
}

fn atomic_increment_and_get(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    fetch_add(ctx, args, 1, true)
}

fn atomic_decrement_and_get(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    fetch_add(ctx, args, -1, true)
}

fn atomic_get_and_increment(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    fetch_add(ctx, args, 1, false)
}

fn atomic_get_and_decrement(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    fetch_add(ctx, args, -1, false)
}

fn atomic_add_and_get(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let delta = try_g!(arg_int(args, 1));
    fetch_add(ctx, args, delta, true)
}

fn atomic_get_and_add(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let delta = try_g!(arg_int(args, 1));
    fetch_add(ctx, args, delta, false)
}

fn atomic_compare_and_set(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    let expected = try_g!(arg_int(args, 1));
    let update = try_g!(arg_int(args, 2));
    let lock = Arc::clone(&ctx.vm.atomic_guard);
    let _guard = lock.lock().unwrap();
    let current = try_g!(backing_value(ctx, receiver));
    let swapped = current == expected;
    if swapped {
        store_value(ctx, receiver, update);
    }
    GValue::Value(JavaValue::Int(i64::from(swapped)))
}

fn atomic_long_value(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    let value = try_g!(backing_value(ctx, receiver));
    GValue::Value(JavaValue::Long(value))
}

fn atomic_double_value(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    let value = try_g!(backing_value(ctx, receiver));
    GValue::Value(JavaValue::Double(value as f64))
}

fn atomic_to_string(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    let value = try_g!(backing_value(ctx, receiver));
    let text = value.to_string();
    let value = string_value(ctx, &text);
    GValue::Value(value)
}

/// The interned class name, for tests and registration checks.
#[must_use]
pub fn class_name() -> &'static str {
    ATOMIC_CLASS
}

#[cfg(test)]
mod tests {
    use super::{
        atomic_compare_and_set, atomic_get, atomic_increment_and_get, atomic_init_value,
    };
    use crate::gfunction::{expect_value, GCtx};
    use crate::object::Object;
    use crate::testutil::test_vm;
    use crate::value::JavaValue;

    #[test]
    fn increment_and_cas() {
        let mut vm = test_vm();
        let class = vm.class_names.intern(super::ATOMIC_CLASS.as_bytes());
        let counter = vm.heap.alloc(Object::new(class));
        let counter_arg = JavaValue::Ref(Some(counter));

        let mut ctx = GCtx {
            vm: &mut vm,
            frames: None,
        };
        atomic_init_value(&mut ctx, &mut vec![counter_arg, JavaValue::Int(5)]);
        assert_eq!(
            expect_value(atomic_increment_and_get(&mut ctx, &mut vec![counter_arg])),
            JavaValue::Int(6)
        );

        // CAS succeeds only against the current value
        assert_eq!(
            expect_value(atomic_compare_and_set(
                &mut ctx,
                &mut vec![counter_arg, JavaValue::Int(5), JavaValue::Int(9)],
            )),
            JavaValue::Int(0)
        );
        assert_eq!(
            expect_value(atomic_compare_and_set(
                &mut ctx,
                &mut vec![counter_arg, JavaValue::Int(6), JavaValue::Int(9)],
            )),
            JavaValue::Int(1)
        );
        assert_eq!(
            expect_value(atomic_get(&mut ctx, &mut vec![counter_arg])),
            JavaValue::Int(9)
        );
    }
}
