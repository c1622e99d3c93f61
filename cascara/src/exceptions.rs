//! The exception engine: throw-site capture, handler search across the frame
//! stack, monitor release on unwind, and uncaught-exception termination.
//! Interpreter-detected faults, the `athrow` opcode, and host-method error
//! blocks all enter through here.

use std::backtrace::Backtrace;

use cascara_base::id::ClassNameId;
use cascara_base::{types, util};

use crate::frame::{Frame, FrameStack};
use crate::heap::ObjRef;
use crate::instantiate;
use crate::object::{self, FieldValue, Object};
use crate::value::JavaValue;
use crate::{ExitStatus, StateConfig, Vm};

/// The Java-level error kinds the VM itself raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    ArithmeticException,
    ArrayIndexOutOfBoundsException,
    ArrayStoreException,
    ClassCastException,
    ConcurrentModificationException,
    IllegalArgumentException,
    IllegalMonitorStateException,
    IllegalStateException,
    IndexOutOfBoundsException,
    NegativeArraySizeException,
    NoSuchElementException,
    NullPointerException,
    NumberFormatException,
    StringIndexOutOfBoundsException,
    UnsupportedOperationException,
    ClassNotFoundException,
    CloneNotSupportedException,
    InterruptedException,
    IoException,
    AssertionError,
    AbstractMethodError,
    ClassFormatError,
    InternalError,
    NoClassDefFoundError,
    NoSuchFieldError,
    NoSuchMethodError,
    OutOfMemoryError,
    StackOverflowError,
    UnknownError,
    UnsatisfiedLinkError,
    VerifyError,
}

impl ExceptionKind {
    pub const ALL: &'static [ExceptionKind] = &[
        ExceptionKind::ArithmeticException,
        ExceptionKind::ArrayIndexOutOfBoundsException,
        ExceptionKind::ArrayStoreException,
        ExceptionKind::ClassCastException,
        ExceptionKind::ConcurrentModificationException,
        ExceptionKind::IllegalArgumentException,
        ExceptionKind::IllegalMonitorStateException,
        ExceptionKind::IllegalStateException,
        ExceptionKind::IndexOutOfBoundsException,
        ExceptionKind::NegativeArraySizeException,
        ExceptionKind::NoSuchElementException,
        ExceptionKind::NullPointerException,
        ExceptionKind::NumberFormatException,
        ExceptionKind::StringIndexOutOfBoundsException,
        ExceptionKind::UnsupportedOperationException,
        ExceptionKind::ClassNotFoundException,
        ExceptionKind::CloneNotSupportedException,
        ExceptionKind::InterruptedException,
        ExceptionKind::IoException,
        ExceptionKind::AssertionError,
        ExceptionKind::AbstractMethodError,
        ExceptionKind::ClassFormatError,
        ExceptionKind::InternalError,
        ExceptionKind::NoClassDefFoundError,
        ExceptionKind::NoSuchFieldError,
        ExceptionKind::NoSuchMethodError,
        ExceptionKind::OutOfMemoryError,
        ExceptionKind::StackOverflowError,
        ExceptionKind::UnknownError,
        ExceptionKind::UnsatisfiedLinkError,
        ExceptionKind::VerifyError,
    ];

    /// The canonical internal (slashed) class name.
    #[must_use]
    pub fn internal_name(self) -> &'static str {
        match self {
            ExceptionKind::ArithmeticException => "java/lang/ArithmeticException",
            ExceptionKind::ArrayIndexOutOfBoundsException => {
                "java/lang/ArrayIndexOutOfBoundsException"
            }
            ExceptionKind::ArrayStoreException => "java/lang/ArrayStoreException",
            ExceptionKind::ClassCastException => "java/lang/ClassCastException",
            ExceptionKind::ConcurrentModificationException => {
                "java/util/ConcurrentModificationException"
            }
            ExceptionKind::IllegalArgumentException => "java/lang/IllegalArgumentException",
            ExceptionKind::IllegalMonitorStateException => {
                "java/lang/IllegalMonitorStateException"
            }
            ExceptionKind::IllegalStateException => "java/lang/IllegalStateException",
            ExceptionKind::IndexOutOfBoundsException => "java/lang/IndexOutOfBoundsException",
            ExceptionKind::NegativeArraySizeException => "java/lang/NegativeArraySizeException",
            ExceptionKind::NoSuchElementException => "java/util/NoSuchElementException",
            ExceptionKind::NullPointerException => "java/lang/NullPointerException",
            ExceptionKind::NumberFormatException => "java/lang/NumberFormatException",
            ExceptionKind::StringIndexOutOfBoundsException => {
                "java/lang/StringIndexOutOfBoundsException"
            }
            ExceptionKind::UnsupportedOperationException => {
                "java/lang/UnsupportedOperationException"
            }
            ExceptionKind::ClassNotFoundException => "java/lang/ClassNotFoundException",
            ExceptionKind::CloneNotSupportedException => "java/lang/CloneNotSupportedException",
            ExceptionKind::InterruptedException => "java/lang/InterruptedException",
            ExceptionKind::IoException => "java/io/IOException",
            ExceptionKind::AssertionError => "java/lang/AssertionError",
            ExceptionKind::AbstractMethodError => "java/lang/AbstractMethodError",
            ExceptionKind::ClassFormatError => "java/lang/ClassFormatError",
            ExceptionKind::InternalError => "java/lang/InternalError",
            ExceptionKind::NoClassDefFoundError => "java/lang/NoClassDefFoundError",
            ExceptionKind::NoSuchFieldError => "java/lang/NoSuchFieldError",
            ExceptionKind::NoSuchMethodError => "java/lang/NoSuchMethodError",
            ExceptionKind::OutOfMemoryError => "java/lang/OutOfMemoryError",
            ExceptionKind::StackOverflowError => "java/lang/StackOverflowError",
            ExceptionKind::UnknownError => "java/lang/UnknownError",
            ExceptionKind::UnsatisfiedLinkError => "java/lang/UnsatisfiedLinkError",
            ExceptionKind::VerifyError => "java/lang/VerifyError",
        }
    }

    /// The internal name of the direct superclass.
    #[must_use]
    pub fn direct_super_name(self) -> &'static str {
        match self {
            ExceptionKind::ArithmeticException
            | ExceptionKind::ArrayStoreException
            | ExceptionKind::ClassCastException
            | ExceptionKind::ConcurrentModificationException
            | ExceptionKind::IllegalArgumentException
            | ExceptionKind::IllegalMonitorStateException
            | ExceptionKind::IllegalStateException
            | ExceptionKind::IndexOutOfBoundsException
            | ExceptionKind::NegativeArraySizeException
            | ExceptionKind::NoSuchElementException
            | ExceptionKind::NullPointerException
            | ExceptionKind::UnsupportedOperationException => types::RUNTIME_EXCEPTION_CLASS,
            ExceptionKind::ArrayIndexOutOfBoundsException
            | ExceptionKind::StringIndexOutOfBoundsException => {
                "java/lang/IndexOutOfBoundsException"
            }
            ExceptionKind::NumberFormatException => "java/lang/IllegalArgumentException",
            ExceptionKind::ClassNotFoundException
            | ExceptionKind::CloneNotSupportedException
            | ExceptionKind::InterruptedException
            | ExceptionKind::IoException => types::EXCEPTION_CLASS,
            ExceptionKind::AssertionError => types::ERROR_CLASS,
            ExceptionKind::AbstractMethodError
            | ExceptionKind::NoSuchFieldError
            | ExceptionKind::NoSuchMethodError => "java/lang/IncompatibleClassChangeError",
            ExceptionKind::ClassFormatError
            | ExceptionKind::NoClassDefFoundError
            | ExceptionKind::UnsatisfiedLinkError
            | ExceptionKind::VerifyError => "java/lang/LinkageError",
            ExceptionKind::InternalError
            | ExceptionKind::OutOfMemoryError
            | ExceptionKind::StackOverflowError
            | ExceptionKind::UnknownError => "java/lang/VirtualMachineError",
        }
    }

    /// The user-facing dotted name.
    #[must_use]
    pub fn user_name(self) -> String {
        util::internal_to_user_format(self.internal_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrowResult {
    Caught,
    NotCaught,
}

/// Throw a VM-raised exception of the given kind at the current pc of the top
/// frame.
pub fn throw_ex(vm: &mut Vm, frames: &mut FrameStack, kind: ExceptionKind, msg: &str) -> ThrowResult {
    tracing::trace!("throw {}, msg: {}", kind.internal_name(), msg);
    let class_id = vm.class_names.intern_str(kind.internal_name());
    dispatch_throw(vm, frames, class_id, None, msg)
}

/// Throw by internal class name; used when the class is not one of the VM's
/// own kinds.
pub fn throw_class(
    vm: &mut Vm,
    frames: &mut FrameStack,
    class_id: ClassNameId,
    msg: &str,
) -> ThrowResult {
    dispatch_throw(vm, frames, class_id, None, msg)
}

/// `athrow`: propagate an existing exception object.
pub fn throw_object(vm: &mut Vm, frames: &mut FrameStack, object_ref: ObjRef) -> ThrowResult {
    let Some(thrown) = vm.heap.get(object_ref) else {
        return throw_ex(vm, frames, ExceptionKind::InternalError, "invalid throw reference");
    };
    let class_id = thrown.class;
    let msg = message_of(vm, object_ref).unwrap_or_default();
    dispatch_throw(vm, frames, class_id, Some(object_ref), &msg)
}

/// Read the `message` field of a throwable object.
#[must_use]
pub fn message_of(vm: &Vm, object_ref: ObjRef) -> Option<String> {
    let object = vm.heap.get(object_ref)?;
    match &object.field("message")?.value {
        FieldValue::Value(JavaValue::Ref(Some(msg_ref))) => object::get_string(&vm.heap, *msg_ref),
        _ => None,
    }
}

fn dispatch_throw(
    vm: &mut Vm,
    frames: &mut FrameStack,
    exc_class: ClassNameId,
    existing: Option<ObjRef>,
    msg: &str,
) -> ThrowResult {
    if frames.is_empty() {
        // No frame: pre-frame failure path
        minimal_abort_named(&vm.conf, &vm.class_names.tpath(exc_class), msg);
        return ThrowResult::NotCaught;
    }

    // Sticky throw-site capture; the pc gets mutated once a handler runs.
    {
        let top = frames.top_mut().unwrap();
        if top.exception_pc.is_none() {
            top.exception_pc = Some(top.pc);
        }
    }

    // Walk the stack top-down for a matching handler. The caller frames'
    // pc already points past their invoke instruction, so the search pc
    // steps back one byte for every frame below the top.
    let mut found: Option<(usize, usize)> = None;
    let mut first_iteration = true;
    for index in (0..frames.len()).rev() {
        let frame = frames.get(index).unwrap();
        let mut search_pc = frame.exception_pc.unwrap_or(frame.pc);
        if !first_iteration {
            search_pc = search_pc.saturating_sub(1);
        }
        if let Some(handler_pc) = locate_handler(vm, frame, exc_class, search_pc) {
            found = Some((index, handler_pc));
            break;
        }
        first_iteration = false;
    }

    if let Some((handler_index, handler_pc)) = found {
        tracing::trace!(
            "caught {}, handler pc {}",
            vm.class_names.tpath(exc_class),
            handler_pc
        );

        // Pop everything above the handler frame, releasing monitors on the
        // way down.
        for popped in frames.remove_top_until(handler_index + 1) {
            release_monitor(vm, &popped);
        }

        let thrown = match existing {
            Some(object_ref) => object_ref,
            None => instantiate_exception(vm, frames, exc_class, msg),
        };

        let top = frames.top_mut().unwrap();
        top.stack.clear();
        top.stack.push(JavaValue::Ref(Some(thrown)));
        top.pc = handler_pc;
        // A handler can itself throw; the next capture must start fresh.
        top.exception_pc = None;
        return ThrowResult::Caught;
    }

    // ---- uncaught ----
    let _thrown = match existing {
        Some(object_ref) => object_ref,
        None => instantiate_exception(vm, frames, exc_class, msg),
    };
    let report = uncaught_report(vm, frames, exc_class, msg);

    for popped in frames.remove_top_until(0) {
        release_monitor(vm, &popped);
    }

    if vm.conf.test_mode {
        tracing::error!("{}", report);
    } else {
        eprintln!("{}", report);
    }
    ThrowResult::NotCaught
}

fn release_monitor(vm: &Vm, frame: &Frame) {
    if let Some(monitor) = frame.monitor {
        if vm.monitors.exit(monitor, frame.thread).is_err() {
            tracing::warn!(
                "monitor for {} was not held at unwind",
                vm.class_names.tpath(frame.class_name)
            );
        }
    }
}

/// Scan one frame's exception table for a handler covering `search_pc`.
/// Host-method frames have no handlers. Matching recognizes the exact thrown
/// class, the three root catch types, and one direct-superclass step; the
/// first table entry in declaration order wins.
fn locate_handler(
    vm: &Vm,
    frame: &Frame,
    exc_class: ClassNameId,
    search_pc: usize,
) -> Option<usize> {
    let method = frame.method.as_ref()?;
    for entry in &method.code.exception_table {
        let start = usize::from(entry.start_pc);
        let end = usize::from(entry.end_pc);
        if search_pc < start || search_pc >= end {
            continue;
        }
        if entry.catch_type == 0 {
            return Some(usize::from(entry.handler_pc));
        }
        let catch_name = match frame.cp.classname_of(entry.catch_type) {
            Ok(name) => name,
            Err(err) => {
                tracing::warn!("bad catch type in exception table: {}", err);
                continue;
            }
        };
        let catch_id = vm.class_names.intern(catch_name);
        let names = &vm.class_names;
        let catch_is_root = catch_id == names.throwable_id()
            || catch_id == names.exception_id()
            || catch_id == names.error_id();
        if catch_id == exc_class
            || catch_is_root
            || vm.classes.super_of(exc_class) == Some(catch_id)
        {
            return Some(usize::from(entry.handler_pc));
        }
    }
    None
}

/// Materialize an exception object: resolved class, message field, and a
/// stack trace captured from the given frames.
pub fn instantiate_exception(
    vm: &mut Vm,
    frames: &FrameStack,
    exc_class: ClassNameId,
    msg: &str,
) -> ObjRef {
    let object_ref = instantiate::instantiate_class(&mut vm.heap, &vm.classes, exc_class);
    let msg_ref = object::make_string(
        &mut vm.heap,
        &vm.class_names,
        vm.conf.string_signed_bytes,
        msg,
    );
    let trace = build_stack_trace(vm, frames);
    if let Some(object) = vm.heap.get_mut(object_ref) {
        object.set_field(
            "message",
            types::STRING_DESC,
            FieldValue::Value(JavaValue::Ref(Some(msg_ref))),
        );
        object.set_field(
            "stackTrace",
            "[Ljava/lang/StackTraceElement;",
            FieldValue::Refs(trace),
        );
    }
    object_ref
}

/// One `StackTraceElement` per frame, newest first.
pub fn build_stack_trace(vm: &mut Vm, frames: &FrameStack) -> Vec<JavaValue> {
    let element_class = vm.class_names.intern_str(types::STACK_TRACE_ELEMENT_CLASS);
    let mut out = Vec::with_capacity(frames.len());
    for frame in frames.iter_top_down() {
        let declaring = vm.class_names.tpath(frame.class_name);
        let file = source_file_of(vm, frame, &declaring);
        let line = line_of(frame).map(|l| l.to_string()).unwrap_or_default();

        let mut element = Object::new(element_class);
        for (field, text) in [
            ("declaringClass", declaring.as_str()),
            ("methodName", frame.method_name.as_str()),
            ("fileName", file.as_str()),
            ("sourceLine", line.as_str()),
        ] {
            let text_ref = object::make_string(
                &mut vm.heap,
                &vm.class_names,
                vm.conf.string_signed_bytes,
                text,
            );
            element.set_field(
                field,
                types::STRING_DESC,
                FieldValue::Value(JavaValue::Ref(Some(text_ref))),
            );
        }
        out.push(JavaValue::Ref(Some(vm.heap.alloc(element))));
    }
    out
}

fn source_file_of(vm: &Vm, frame: &Frame, declaring: &str) -> String {
    if let Some(source) = vm.classes.source_of(frame.class_name) {
        return source.to_owned();
    }
    let simple = declaring.rsplit('/').next().unwrap_or(declaring);
    format!("{}.java", simple)
}

fn line_of(frame: &Frame) -> Option<u16> {
    let method = frame.method.as_ref()?;
    method
        .code
        .line_for_pc(frame.exception_pc.unwrap_or(frame.pc))
}

fn display_class(vm: &Vm, id: ClassNameId) -> String {
    if vm.conf.strict_jdk {
        vm.class_names.user_path(id)
    } else {
        vm.class_names.tpath(id)
    }
}

/// The report printed for an uncaught exception: a header naming the
/// exception and the throw site, then one `at` line per live frame.
#[must_use]
pub fn uncaught_report(
    vm: &Vm,
    frames: &FrameStack,
    exc_class: ClassNameId,
    msg: &str,
) -> String {
    let mut report = String::new();
    let exc_name = util::internal_to_user_format(&vm.class_names.tpath(exc_class));
    if let Some(origin) = frames.top() {
        report.push_str(&format!(
            "{}: FQN: {}.{}{}, {}",
            exc_name,
            display_class(vm, origin.class_name),
            origin.method_name,
            origin.method_desc,
            msg
        ));
    } else {
        report.push_str(&format!("{}: {}", exc_name, msg));
    }

    for frame in frames.iter_top_down() {
        let class = display_class(vm, frame.class_name);
        let file = source_file_of(vm, frame, &vm.class_names.tpath(frame.class_name));
        match line_of(frame) {
            Some(line) => report.push_str(&format!(
                "\n  at {}.{}({}:{})",
                class, frame.method_name, file, line
            )),
            None => report.push_str(&format!("\n  at {}.{}({})", class, frame.method_name, file)),
        }
    }
    report
}

/// The short path for errors that occur before any frame exists: one
/// formatted line and a host-level stack trace, engine frames filtered out.
pub fn minimal_abort(conf: &StateConfig, kind: ExceptionKind, msg: &str) -> ExitStatus {
    minimal_abort_named(conf, kind.internal_name(), msg)
}

fn minimal_abort_named(conf: &StateConfig, class_name: &str, msg: &str) -> ExitStatus {
    let err_msg = format!("{}: {}", util::internal_to_user_format(class_name), msg);
    if conf.test_mode {
        tracing::error!("{}", err_msg);
        return ExitStatus::AppException;
    }
    eprintln!("{}", err_msg);
    let backtrace = Backtrace::force_capture().to_string();
    for line in backtrace.lines() {
        if line.contains("cascara::exceptions") {
            continue;
        }
        eprintln!("{}", line);
    }
    ExitStatus::AppException
}

#[cfg(test)]
mod tests {
    use cascara_base::op;

    use super::{throw_ex, uncaught_report, ExceptionKind, ThrowResult};
    use crate::frame::{Frame, FrameStack};
    use crate::testutil::{test_vm, MethodBuilder};
    use crate::value::JavaValue;

    #[test]
    fn name_forms() {
        assert_eq!(
            ExceptionKind::ArithmeticException.internal_name(),
            "java/lang/ArithmeticException"
        );
        assert_eq!(
            ExceptionKind::ArithmeticException.user_name(),
            "java.lang.ArithmeticException"
        );
        assert_eq!(
            ExceptionKind::NoSuchElementException.internal_name(),
            "java/util/NoSuchElementException"
        );
    }

    #[test]
    fn host_frames_are_skipped_and_search_pc_steps_back() {
        let mut vm = test_vm();
        let mut builder = MethodBuilder::static_method("Outer", "run", "()V").code(&[
            op::NOP,
            op::NOP,
            op::NOP,
            op::NOP,
            op::NOP,
            op::RETURN,
            op::POP,
            op::RETURN,
        ]);
        let throwable = builder.cp().push_class("java/lang/Throwable");
        let outer = builder.catch(0, 5, 6, throwable).register(&mut vm);

        let mut frames = FrameStack::new(8);
        let outer_class = vm.class_names.intern(b"Outer");
        let mut outer_frame = Frame::new_bytecode(outer_class, outer, 1);
        // As if the host call site were the instruction ending at pc 3
        outer_frame.pc = 3;
        frames.push(outer_frame).unwrap();

        let shim_class = vm.class_names.intern(b"java/util/ArrayList");
        frames
            .push(Frame::new_host(shim_class, "get", "(I)Ljava/lang/Object;", 1))
            .unwrap();

        let result = throw_ex(
            &mut vm,
            &mut frames,
            ExceptionKind::IndexOutOfBoundsException,
            "Index: 9, Size: 0",
        );
        assert_eq!(result, ThrowResult::Caught);

        // The host frame is gone, the handler frame holds only the
        // exception object, and its pc points at the handler.
        assert_eq!(frames.len(), 1);
        let handler = frames.top().unwrap();
        assert_eq!(handler.pc, 6);
        assert_eq!(handler.exception_pc, None);
        assert_eq!(handler.stack.len(), 1);
        assert!(matches!(handler.stack[0], JavaValue::Ref(Some(_))));
    }

    #[test]
    fn uncaught_report_has_header_and_at_lines() {
        let mut vm = test_vm();
        let callee = MethodBuilder::static_method("B", "boom", "()V")
            .code(&[op::NOP, op::RETURN])
            .register(&mut vm);
        let caller = MethodBuilder::static_method("A", "go", "()V")
            .code(&[op::NOP, op::NOP, op::NOP, op::RETURN])
            .register(&mut vm);

        let mut frames = FrameStack::new(8);
        let a_class = vm.class_names.intern(b"A");
        let b_class = vm.class_names.intern(b"B");
        let mut caller_frame = Frame::new_bytecode(a_class, caller, 1);
        caller_frame.pc = 3;
        frames.push(caller_frame).unwrap();
        frames.push(Frame::new_bytecode(b_class, callee, 1)).unwrap();

        let npe = vm.class_names.intern(b"java/lang/NullPointerException");
        let report = uncaught_report(&vm, &frames, npe, "oops");
        let mut lines = report.lines();
        assert_eq!(
            lines.next(),
            Some("java.lang.NullPointerException: FQN: B.boom()V, oops")
        );
        assert_eq!(lines.next(), Some("  at B.boom(B.java)"));
        assert_eq!(lines.next(), Some("  at A.go(A.java)"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn supers_are_one_level() {
        assert_eq!(
            ExceptionKind::ArrayIndexOutOfBoundsException.direct_super_name(),
            "java/lang/IndexOutOfBoundsException"
        );
        assert_eq!(
            ExceptionKind::NumberFormatException.direct_super_name(),
            "java/lang/IllegalArgumentException"
        );
        assert_eq!(
            ExceptionKind::StackOverflowError.direct_super_name(),
            "java/lang/VirtualMachineError"
        );
    }
}
