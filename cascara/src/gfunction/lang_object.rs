//! `java/lang/Object` host methods.

use crate::exceptions::ExceptionKind;
use crate::gfunction::{
    arg_obj, arg_value, clinit_generic, gmeth, string_value, trap_not_supported, GCtx, GErrBlk,
    GLibrary, GValue,
};
use crate::value::JavaValue;

pub fn load_lang_object() -> GLibrary {
    vec![
        ("java/lang/Object.<clinit>()V", gmeth(0, clinit_generic)),
        ("java/lang/Object.<init>()V", gmeth(0, object_init)),
        ("java/lang/Object.hashCode()I", gmeth(0, object_hash_code)),
        (
            "java/lang/Object.equals(Ljava/lang/Object;)Z",
            gmeth(1, object_equals),
        ),
        (
            "java/lang/Object.toString()Ljava/lang/String;",
            gmeth(0, object_to_string),
        ),
        (
            "java/lang/Object.getClass()Ljava/lang/Class;",
            gmeth(0, object_get_class),
        ),
        (
            "java/lang/Object.clone()Ljava/lang/Object;",
            gmeth(0, object_clone),
        ),
        ("java/lang/Object.wait()V", gmeth(0, trap_not_supported)),
        ("java/lang/Object.wait(J)V", gmeth(2, trap_not_supported)),
        ("java/lang/Object.notify()V", gmeth(0, trap_not_supported)),
        (
            "java/lang/Object.notifyAll()V",
            gmeth(0, trap_not_supported),
        ),
    ]
}

/// The root constructor has nothing to initialize.
fn object_init(_ctx: &mut GCtx<'_>, _args: &mut Vec<JavaValue>) -> GValue {
    GValue::Void
}

/// Identity hash, derived from the arena index.
fn object_hash_code(_ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    match arg_obj(args, 0) {
        Ok(receiver) => GValue::Value(JavaValue::Int(receiver.index() as i64)),
        Err(block) => GValue::Err(block),
    }
}

/// Reference equality.
fn object_equals(_ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = match arg_value(args, 0) {
        Ok(v) => v,
        Err(block) => return GValue::Err(block),
    };
    let other = match arg_value(args, 1) {
        Ok(v) => v,
        Err(block) => return GValue::Err(block),
    };
    let equal = matches!(
        (receiver, other),
        (JavaValue::Ref(Some(a)), JavaValue::Ref(Some(b))) if a == b
    );
    GValue::Value(JavaValue::Int(i64::from(equal)))
}

/// `ClassName@hexhash`, class name in internal form.
fn object_to_string(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = match arg_obj(args, 0) {
        Ok(r) => r,
        Err(block) => return GValue::Err(block),
    };
    let Some(object) = ctx.vm.heap.get(receiver) else {
        return GValue::Err(GErrBlk::new(
            ExceptionKind::InternalError,
            "dangling receiver",
        ));
    };
    let text = format!(
        "{}@{:x}",
        ctx.vm.class_names.tpath(object.class),
        receiver.index()
    );
    let value = string_value(ctx, &text);
    GValue::Value(value)
}

fn object_get_class(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = match arg_obj(args, 0) {
        Ok(r) => r,
        Err(block) => return GValue::Err(block),
    };
    let Some(object) = ctx.vm.heap.get(receiver) else {
        return GValue::Err(GErrBlk::new(
            ExceptionKind::InternalError,
            "dangling receiver",
        ));
    };
    let class_id = object.class;
    let class_ref = ctx
        .vm
        .classes
        .class_object(&mut ctx.vm.heap, &ctx.vm.class_names, class_id);
    GValue::Value(JavaValue::Ref(Some(class_ref)))
}

fn object_clone(_ctx: &mut GCtx<'_>, _args: &mut Vec<JavaValue>) -> GValue {
    GValue::Err(GErrBlk::new(
        ExceptionKind::CloneNotSupportedException,
        "clone requires Cloneable",
    ))
}

#[cfg(test)]
mod tests {
    use super::{load_lang_object, object_equals, object_hash_code};
    use crate::gfunction::{expect_value, GCtx, GValue};
    use crate::object::Object;
    use crate::testutil::test_vm;
    use crate::value::JavaValue;

    #[test]
    fn hash_and_equals() {
        let mut vm = test_vm();
        let a = vm.heap.alloc(Object::new(vm.class_names.object_id()));
        let b = vm.heap.alloc(Object::new(vm.class_names.object_id()));

        let mut ctx = GCtx {
            vm: &mut vm,
            frames: None,
        };
        let hash = expect_value(object_hash_code(
            &mut ctx,
            &mut vec![JavaValue::Ref(Some(a))],
        ));
        assert_eq!(hash, JavaValue::Int(a.index() as i64));

        let same = expect_value(object_equals(
            &mut ctx,
            &mut vec![JavaValue::Ref(Some(a)), JavaValue::Ref(Some(a))],
        ));
        assert_eq!(same, JavaValue::Int(1));
        let different = expect_value(object_equals(
            &mut ctx,
            &mut vec![JavaValue::Ref(Some(a)), JavaValue::Ref(Some(b))],
        ));
        assert_eq!(different, JavaValue::Int(0));
    }

    #[test]
    fn library_covers_init() {
        let keys: Vec<&str> = load_lang_object().into_iter().map(|(k, _)| k).collect();
        assert!(keys.contains(&"java/lang/Object.<init>()V"));
    }

    #[test]
    fn clone_is_an_error_block() {
        let mut vm = test_vm();
        let mut ctx = GCtx {
            vm: &mut vm,
            frames: None,
        };
        assert!(matches!(
            super::object_clone(&mut ctx, &mut Vec::new()),
            GValue::Err(_)
        ));
    }
}
