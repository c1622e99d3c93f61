//! `java/io/PrintStream` host methods for the standard streams. The stream
//! object's `fd` field selects stdout or stderr.

use std::io::Write;

use cascara_base::names::ClassNames;
use cascara_base::types;

use crate::gfunction::{
    arg_float, arg_int, arg_obj, arg_string, clinit_generic, gmeth, try_g, GCtx, GLibrary, GValue,
};
use crate::heap::{Heap, ObjRef};
use crate::object::{FieldValue, Object};
use crate::value::JavaValue;
use crate::Vm;

pub fn load_io_print_stream() -> GLibrary {
    vec![
        ("java/io/PrintStream.<clinit>()V", gmeth(0, clinit_generic)),
        (
            "java/io/PrintStream.println(Ljava/lang/String;)V",
            gmeth(1, println_string),
        ),
        ("java/io/PrintStream.println(I)V", gmeth(1, println_int)),
        ("java/io/PrintStream.println(J)V", gmeth(2, println_int)),
        ("java/io/PrintStream.println(Z)V", gmeth(1, println_boolean)),
        ("java/io/PrintStream.println(D)V", gmeth(2, println_float)),
        ("java/io/PrintStream.println(F)V", gmeth(1, println_float)),
        ("java/io/PrintStream.println()V", gmeth(0, println_empty)),
        (
            "java/io/PrintStream.print(Ljava/lang/String;)V",
            gmeth(1, print_string),
        ),
        ("java/io/PrintStream.print(I)V", gmeth(1, print_int)),
    ]
}

/// Build a stream object bound to fd 1 (stdout) or 2 (stderr).
pub fn make_print_stream(heap: &mut Heap, names: &ClassNames, fd: i64) -> ObjRef {
    let class = names.intern(b"java/io/PrintStream");
    let mut stream = Object::new(class);
    stream.set_field("fd", types::INT, FieldValue::Value(JavaValue::Int(fd)));
    heap.alloc(stream)
}

fn fd_of(vm: &Vm, stream: ObjRef) -> i64 {
    vm.heap
        .get(stream)
        .and_then(|object| object.field("fd"))
        .and_then(|field| match field.value {
            FieldValue::Value(JavaValue::Int(fd)) => Some(fd),
            _ => None,
        })
        .unwrap_or(1)
}

fn emit(fd: i64, text: &str, newline: bool) {
    if fd == 2 {
        let stderr = std::io::stderr();
        let mut handle = stderr.lock();
        if newline {
            let _ = writeln!(handle, "{}", text);
        } else {
            let _ = write!(handle, "{}", text);
        }
    } else {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        if newline {
            let _ = writeln!(handle, "{}", text);
        } else {
            let _ = write!(handle, "{}", text);
        }
    }
}

fn println_string(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let stream = try_g!(arg_obj(args, 0));
    let text = try_g!(arg_string(ctx.vm, args, 1));
    emit(fd_of(ctx.vm, stream), &text, true);
    GValue::Void
}

fn println_int(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let stream = try_g!(arg_obj(args, 0));
    let value = try_g!(arg_int(args, 1));
    emit(fd_of(ctx.vm, stream), &value.to_string(), true);
    GValue::Void
}

fn println_boolean(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let stream = try_g!(arg_obj(args, 0));
    let value = try_g!(arg_int(args, 1));
    let text = if value != 0 { "true" } else { "false" };
    emit(fd_of(ctx.vm, stream), text, true);
    GValue::Void
}

fn println_float(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let stream = try_g!(arg_obj(args, 0));
    let value = try_g!(arg_float(args, 1));
    emit(fd_of(ctx.vm, stream), &value.to_string(), true);
    GValue::Void
}

fn println_empty(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let stream = try_g!(arg_obj(args, 0));
    emit(fd_of(ctx.vm, stream), "", true);
    GValue::Void
}

fn print_string(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let stream = try_g!(arg_obj(args, 0));
    let text = try_g!(arg_string(ctx.vm, args, 1));
    emit(fd_of(ctx.vm, stream), &text, false);
    GValue::Void
}

fn print_int(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let stream = try_g!(arg_obj(args, 0));
    let value = try_g!(arg_int(args, 1));
    emit(fd_of(ctx.vm, stream), &value.to_string(), false);
    GValue::Void
}
