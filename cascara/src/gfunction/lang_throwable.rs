//! `java/lang/Throwable` host methods. Subclasses reach these through
//! virtual dispatch walking the superclass handles.

use cascara_base::types;

use crate::exceptions;
use crate::gfunction::{
    arg_obj, arg_value, clinit_generic, gmeth, gmeth_ctx, string_value, try_g, GCtx, GErrBlk,
    GLibrary, GValue,
};
use crate::object::FieldValue;
use crate::value::JavaValue;

pub fn load_lang_throwable() -> GLibrary {
    vec![
        ("java/lang/Throwable.<clinit>()V", gmeth(0, clinit_generic)),
        ("java/lang/Throwable.<init>()V", gmeth(0, throwable_init)),
        (
            "java/lang/Throwable.<init>(Ljava/lang/String;)V",
            gmeth(1, throwable_init_message),
        ),
        (
            "java/lang/Throwable.getMessage()Ljava/lang/String;",
            gmeth(0, throwable_get_message),
        ),
        (
            "java/lang/Throwable.toString()Ljava/lang/String;",
            gmeth(0, throwable_to_string),
        ),
        (
            "java/lang/Throwable.fillInStackTrace()Ljava/lang/Throwable;",
            gmeth_ctx(0, throwable_fill_in_stack_trace),
        ),
    ]
}

fn throwable_init(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    if let Some(object) = ctx.vm.heap.get_mut(receiver) {
        object.set_field(
            "message",
            types::STRING_DESC,
            FieldValue::Value(JavaValue::NULL),
        );
    }
    GValue::Void
}

fn throwable_init_message(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    let message = try_g!(arg_value(args, 1));
    if let Some(object) = ctx.vm.heap.get_mut(receiver) {
        object.set_field("message", types::STRING_DESC, FieldValue::Value(message));
    }
    GValue::Void
}

fn throwable_get_message(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    let message = ctx
        .vm
        .heap
        .get(receiver)
        .and_then(|object| object.field("message"))
        .and_then(|field| match field.value {
            FieldValue::Value(v) => Some(v),
            _ => None,
        })
        .unwrap_or(JavaValue::NULL);
    GValue::Value(message)
}

fn throwable_to_string(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    let class_name = match ctx.vm.heap.get(receiver) {
        Some(object) => ctx.vm.class_names.user_path(object.class),
        None => {
            return GValue::Err(GErrBlk::new(
                crate::exceptions::ExceptionKind::InternalError,
                "dangling receiver",
            ))
        }
    };
    let text = match exceptions::message_of(ctx.vm, receiver) {
        Some(message) if !message.is_empty() => format!("{}: {}", class_name, message),
        _ => class_name,
    };
    let value = string_value(ctx, &text);
    GValue::Value(value)
}

/// Capture the current frame stack into the receiver's stackTrace field.
fn throwable_fill_in_stack_trace(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    let Some(frames) = ctx.frames.as_deref() else {
        return GValue::Err(GErrBlk::new(
            crate::exceptions::ExceptionKind::InternalError,
            "fillInStackTrace needs the frame stack",
        ));
    };
    let trace = exceptions::build_stack_trace(ctx.vm, frames);
    if let Some(object) = ctx.vm.heap.get_mut(receiver) {
        object.set_field(
            "stackTrace",
            "[Ljava/lang/StackTraceElement;",
            FieldValue::Refs(trace),
        );
    }
    GValue::Value(JavaValue::Ref(Some(receiver)))
}

#[cfg(test)]
mod tests {
    use super::{throwable_get_message, throwable_init_message};
    use crate::gfunction::{expect_value, string_value, GCtx};
    use crate::instantiate;
    use crate::object::get_string;
    use crate::testutil::test_vm;
    use crate::value::JavaValue;

    #[test]
    fn message_round_trip() {
        let mut vm = test_vm();
        let npe = vm.class_names.intern(b"java/lang/NullPointerException");
        let thrown = instantiate::instantiate_class(&mut vm.heap, &vm.classes, npe);

        let mut ctx = GCtx {
            vm: &mut vm,
            frames: None,
        };
        let message = string_value(&mut ctx, "was null");
        throwable_init_message(&mut ctx, &mut vec![JavaValue::Ref(Some(thrown)), message]);

        let got = expect_value(throwable_get_message(
            &mut ctx,
            &mut vec![JavaValue::Ref(Some(thrown))],
        ));
        let JavaValue::Ref(Some(msg_ref)) = got else {
            panic!("expected a string ref");
        };
        assert_eq!(get_string(&vm.heap, msg_ref).as_deref(), Some("was null"));
    }
}
