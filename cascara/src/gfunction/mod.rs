//! The host-method shim ("G-methods"): Java library methods implemented on
//! the host side and invoked through a uniform calling convention.
//!
//! A host body receives its Java-level arguments in declaration order, the
//! receiver first for instance methods. Category-2 arguments arrive as two
//! consecutive identical slots, mirroring the operand stack; bodies index by
//! slot. A body returns exactly one of: a value, the no-value sentinel, or an
//! error block, which the interpreter hands to the exception engine as if a
//! `throw` had happened at the current pc.

use crate::exceptions::ExceptionKind;
use crate::frame::FrameStack;
use crate::heap::ObjRef;
use crate::mtable::MethodTable;
use crate::object;
use crate::value::JavaValue;
use crate::Vm;

pub mod array_list;
pub mod atomic;
pub mod base64;
pub mod date;
pub mod hash_map;
pub mod iterator;
pub mod lang_object;
pub mod lang_string;
pub mod lang_system;
pub mod lang_throwable;
pub mod linked_list;
pub mod numerics;
pub mod print_stream;

/// Context a host body runs against. `frames` is populated only for entries
/// registered with `needs_frames`.
pub struct GCtx<'a> {
    pub vm: &'a mut Vm,
    pub frames: Option<&'a mut FrameStack>,
}

/// The uniform host-method signature.
pub type GFunction = fn(&mut GCtx<'_>, &mut Vec<JavaValue>) -> GValue;

/// What a host body hands back.
pub enum GValue {
    /// `void` return
    Void,
    Value(JavaValue),
    /// A Java-level throw
    Err(GErrBlk),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GErrBlk {
    pub kind: ExceptionKind,
    pub msg: String,
}
impl GErrBlk {
    #[must_use]
    pub fn new(kind: ExceptionKind, msg: impl Into<String>) -> GErrBlk {
        GErrBlk {
            kind,
            msg: msg.into(),
        }
    }
}

#[derive(Clone, Copy)]
pub struct GMeth {
    /// Operand-stack slots to consume from the caller, receiver excluded;
    /// longs and doubles count as two.
    pub param_slots: usize,
    /// The body needs access to the calling thread's frame stack.
    pub needs_frames: bool,
    pub func: GFunction,
}

/// Shorthand constructor for the common no-frame-access case.
#[must_use]
pub fn gmeth(param_slots: usize, func: GFunction) -> GMeth {
    GMeth {
        param_slots,
        needs_frames: false,
        func,
    }
}

#[must_use]
pub fn gmeth_ctx(param_slots: usize, func: GFunction) -> GMeth {
    GMeth {
        param_slots,
        needs_frames: true,
        func,
    }
}

/// One host-method domain, ready for bulk registration.
pub type GLibrary = Vec<(&'static str, GMeth)>;

/// Invoke a host body. `args` arrive in pop order (the interpreter popped
/// them off the caller's operand stack); they are reversed here into
/// declaration order, receiver first.
pub fn run_gfunction(
    vm: &mut Vm,
    frames: &mut FrameStack,
    entry: &GMeth,
    full_name: &str,
    mut args: Vec<JavaValue>,
    tracing_on: bool,
) -> GValue {
    if tracing_on {
        tracing::trace!(
            "run gfunction: {}, param slots: {}",
            full_name,
            entry.param_slots
        );
    }
    args.reverse();

    let func = entry.func;
    if entry.needs_frames {
        let mut ctx = GCtx {
            vm,
            frames: Some(frames),
        };
        func(&mut ctx, &mut args)
    } else {
        let mut ctx = GCtx { vm, frames: None };
        func(&mut ctx, &mut args)
    }
}

/// Register every host-method domain. Called once during the single-threaded
/// startup phase.
pub fn register_all(mtable: &mut MethodTable) {
    mtable.load_host_library(lang_object::load_lang_object());
    mtable.load_host_library(lang_throwable::load_lang_throwable());
    mtable.load_host_library(lang_string::load_lang_string());
    mtable.load_host_library(lang_system::load_lang_system());
    mtable.load_host_library(print_stream::load_io_print_stream());
    mtable.load_host_library(numerics::load_lang_numerics());
    mtable.load_host_library(array_list::load_util_array_list());
    mtable.load_host_library(linked_list::load_util_linked_list());
    mtable.load_host_library(hash_map::load_util_hash_map());
    mtable.load_host_library(iterator::load_util_iterator());
    mtable.load_host_library(base64::load_util_base64());
    mtable.load_host_library(date::load_util_date());
    mtable.load_host_library(date::load_util_time_zone());
    mtable.load_host_library(atomic::load_util_atomic_integer());
}

// === the three standard trap bodies ===

pub fn trap_not_supported(_ctx: &mut GCtx<'_>, _args: &mut Vec<JavaValue>) -> GValue {
    GValue::Err(GErrBlk::new(
        ExceptionKind::UnsupportedOperationException,
        "not yet supported",
    ))
}

pub fn trap_deprecated(_ctx: &mut GCtx<'_>, _args: &mut Vec<JavaValue>) -> GValue {
    GValue::Err(GErrBlk::new(
        ExceptionKind::UnsupportedOperationException,
        "deprecated / not supported",
    ))
}

pub fn trap_undocumented(_ctx: &mut GCtx<'_>, _args: &mut Vec<JavaValue>) -> GValue {
    GValue::Err(GErrBlk::new(
        ExceptionKind::UnsupportedOperationException,
        "undocumented / not supported",
    ))
}

/// `<clinit>` bodies that have nothing to initialize.
pub fn clinit_generic(_ctx: &mut GCtx<'_>, _args: &mut Vec<JavaValue>) -> GValue {
    GValue::Void
}

// === argument accessors shared by the domain bodies ===

pub fn arg_value(args: &[JavaValue], index: usize) -> Result<JavaValue, GErrBlk> {
    args.get(index).copied().ok_or_else(|| {
        GErrBlk::new(
            ExceptionKind::IllegalArgumentException,
            format!("missing argument slot {}", index),
        )
    })
}

pub fn arg_int(args: &[JavaValue], index: usize) -> Result<i64, GErrBlk> {
    arg_value(args, index)?.as_int().ok_or_else(|| {
        GErrBlk::new(
            ExceptionKind::IllegalArgumentException,
            format!("argument slot {} is not an int", index),
        )
    })
}

pub fn arg_float(args: &[JavaValue], index: usize) -> Result<f64, GErrBlk> {
    arg_value(args, index)?.as_float().ok_or_else(|| {
        GErrBlk::new(
            ExceptionKind::IllegalArgumentException,
            format!("argument slot {} is not a float", index),
        )
    })
}

/// A non-null reference argument; null raises `NullPointerException`.
pub fn arg_obj(args: &[JavaValue], index: usize) -> Result<ObjRef, GErrBlk> {
    match arg_value(args, index)? {
        JavaValue::Ref(Some(reference)) => Ok(reference),
        JavaValue::Ref(None) => Err(GErrBlk::new(
            ExceptionKind::NullPointerException,
            format!("argument slot {} is null", index),
        )),
        _ => Err(GErrBlk::new(
            ExceptionKind::IllegalArgumentException,
            format!("argument slot {} is not a reference", index),
        )),
    }
}

/// A string argument's contents.
pub fn arg_string(vm: &Vm, args: &[JavaValue], index: usize) -> Result<String, GErrBlk> {
    let reference = arg_obj(args, index)?;
    object::get_string(&vm.heap, reference).ok_or_else(|| {
        GErrBlk::new(
            ExceptionKind::IllegalArgumentException,
            format!("argument slot {} is not a string", index),
        )
    })
}

/// Early-return an error block out of a host body.
macro_rules! try_g {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(block) => return $crate::gfunction::GValue::Err(block),
        }
    };
}
pub(crate) use try_g;

/// Allocate a string object and wrap it as a reference value.
pub fn string_value(ctx: &mut GCtx<'_>, text: &str) -> JavaValue {
    let reference = object::make_string(
        &mut ctx.vm.heap,
        &ctx.vm.class_names,
        ctx.vm.conf.string_signed_bytes,
        text,
    );
    JavaValue::Ref(Some(reference))
}

/// Element equality as the collection shims see it: primitives by value,
/// strings by contents, other references by identity.
#[must_use]
pub fn values_equal(vm: &Vm, a: JavaValue, b: JavaValue) -> bool {
    if let (JavaValue::Ref(Some(ra)), JavaValue::Ref(Some(rb))) = (a, b) {
        if ra == rb {
            return true;
        }
        if let (Some(sa), Some(sb)) = (
            object::get_string(&vm.heap, ra),
            object::get_string(&vm.heap, rb),
        ) {
            return sa == sb;
        }
        return false;
    }
    a == b
}

/// Unwrap the result variants that carry values, for the shim tests.
#[cfg(test)]
pub(crate) fn expect_value(result: GValue) -> JavaValue {
    match result {
        GValue::Value(v) => v,
        GValue::Void => panic!("expected a value, got void"),
        GValue::Err(block) => panic!("expected a value, got error block: {:?}", block),
    }
}
