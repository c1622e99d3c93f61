//! The bytecode interpreter: one dispatch loop per thread over the top
//! frame's bytecode. Return opcodes hand their result to the caller frame and
//! the loop continues on the new top frame; invocation either pushes a callee
//! frame or dispatches a host method. Between opcodes `pc` points at the next
//! opcode; at the instant an opcode faults it still points at that opcode,
//! which the exception engine relies on.

use std::sync::Arc;

use cascara_base::constant_pool::CpValue;
use cascara_base::descriptor::MethodDescriptor;
use cascara_base::id::ClassNameId;
use cascara_base::{op, types};
use smallvec::SmallVec;

use crate::exceptions::{self, ExceptionKind, ThrowResult};
use crate::frame::{Frame, StackError};
use crate::gfunction::{self, GValue};
use crate::heap::ObjRef;
use crate::instantiate;
use crate::mtable::{MTEntry, MethodTable};
use crate::object::{self, ElementKind, FieldValue, Object};
use crate::thread::JavaThread;
use crate::value::JavaValue;
use crate::{Vm, VmFault};

/// How a thread's execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The bottom frame returned normally
    Completed,
    /// An uncaught exception terminated the thread
    Uncaught,
}

/// A Java-level condition detected mid-opcode, to be routed through the
/// exception engine at the current pc.
type ExcSignal = (ExceptionKind, String);

enum InvokeError {
    Fault(VmFault),
    Throw(ExcSignal),
}
impl From<VmFault> for InvokeError {
    fn from(fault: VmFault) -> Self {
        InvokeError::Fault(fault)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

fn u8_at(code: &[u8], pc: usize, offset: usize) -> Result<u8, VmFault> {
    code.get(pc + offset)
        .copied()
        .ok_or(VmFault::CodeTruncated { pc })
}

fn u16_at(code: &[u8], pc: usize, offset: usize) -> Result<u16, VmFault> {
    let hi = u8_at(code, pc, offset)?;
    let lo = u8_at(code, pc, offset + 1)?;
    Ok(u16::from_be_bytes([hi, lo]))
}

fn i16_at(code: &[u8], pc: usize, offset: usize) -> Result<i16, VmFault> {
    u16_at(code, pc, offset).map(|v| v as i16)
}

fn i32_at(code: &[u8], pc: usize, offset: usize) -> Result<i32, VmFault> {
    let b0 = u8_at(code, pc, offset)?;
    let b1 = u8_at(code, pc, offset + 1)?;
    let b2 = u8_at(code, pc, offset + 2)?;
    let b3 = u8_at(code, pc, offset + 3)?;
    Ok(i32::from_be_bytes([b0, b1, b2, b3]))
}

fn stack_fault_msg(vm: &Vm, thread: &JavaThread, err: &StackError) -> String {
    match thread.frames.top() {
        Some(frame) => format!(
            "{} in {}.{}{} at pc {}",
            err,
            vm.class_names.tpath(frame.class_name),
            frame.method_name,
            frame.method_desc,
            frame.pc
        ),
        None => err.to_string(),
    }
}

/// `f2i`/`d2i` saturation per the classfile specification.
fn float_to_int(value: f64) -> i64 {
    if value.is_nan() {
        0
    } else if value >= f64::from(i32::MAX) {
        i64::from(i32::MAX)
    } else if value <= f64::from(i32::MIN) {
        i64::from(i32::MIN)
    } else {
        value as i32 as i64
    }
}

fn float_to_long(value: f64) -> i64 {
    if value.is_nan() {
        0
    } else if value >= i64::MAX as f64 {
        i64::MAX
    } else if value <= i64::MIN as f64 {
        i64::MIN
    } else {
        value as i64
    }
}

fn is_assignable(vm: &Vm, sub: ClassNameId, sup: ClassNameId) -> bool {
    sub == sup || sup == vm.class_names.object_id() || vm.classes.is_same_or_subclass(sub, sup)
}

/// Bounds-checked array element read; the element category comes from the
/// array object's class-name handle.
fn array_get(vm: &Vm, array: ObjRef, index: i64) -> Result<JavaValue, ExcSignal> {
    let object = vm
        .heap
        .get(array)
        .ok_or_else(|| (ExceptionKind::InternalError, "dangling array reference".to_owned()))?;
    let name = vm
        .class_names
        .name_from_id(object.class)
        .map_err(|_| (ExceptionKind::InternalError, "array class unknown".to_owned()))?;
    let kind = ElementKind::of_array_class(name.get())
        .ok_or_else(|| (ExceptionKind::InternalError, "receiver is not an array".to_owned()))?;
    let length = object
        .array_length()
        .ok_or_else(|| (ExceptionKind::InternalError, "array backing missing".to_owned()))?;
    if index < 0 || index as usize >= length {
        return Err((
            ExceptionKind::ArrayIndexOutOfBoundsException,
            format!("array index {} out of bounds for length {}", index, length),
        ));
    }
    let i = index as usize;
    let backing = object.value_field().unwrap();
    Ok(match (kind, backing) {
        (ElementKind::Long, FieldValue::Ints(items)) => JavaValue::Long(items[i]),
        (_, FieldValue::Ints(items)) => JavaValue::Int(items[i]),
        (ElementKind::Double, FieldValue::Floats(items)) => JavaValue::Double(items[i]),
        (_, FieldValue::Floats(items)) => JavaValue::Float(items[i]),
        (_, FieldValue::Refs(items)) => items[i],
        (_, FieldValue::Bytes(items)) => JavaValue::Int(i64::from(items[i] as i8)),
        (_, FieldValue::JavaBytes(items)) => JavaValue::Int(i64::from(items[i])),
        _ => {
            return Err((
                ExceptionKind::InternalError,
                "array backing mismatch".to_owned(),
            ))
        }
    })
}

/// Bounds-checked array element write.
fn array_set(vm: &mut Vm, array: ObjRef, index: i64, value: JavaValue) -> Result<(), ExcSignal> {
    // Reference stores get an assignability check when both classes are known
    if let JavaValue::Ref(Some(stored)) = value {
        let element_class = vm
            .heap
            .get(array)
            .and_then(|object| vm.class_names.name_from_id(object.class).ok())
            .and_then(|name| {
                let name = name.get().to_vec();
                match name.split_first() {
                    Some((b'[', rest)) if rest.first() == Some(&b'L') => {
                        Some(rest[1..rest.len() - 1].to_vec())
                    }
                    _ => None,
                }
            });
        if let Some(component) = element_class {
            let component_id = vm.class_names.intern(&component);
            let stored_class = vm.heap.get(stored).map(|object| object.class);
            if let Some(stored_class) = stored_class {
                let known = vm.classes.get(stored_class).is_some();
                if known && !is_assignable(vm, stored_class, component_id) {
                    return Err((
                        ExceptionKind::ArrayStoreException,
                        format!(
                            "{} into array of {}",
                            vm.class_names.tpath(stored_class),
                            vm.class_names.tpath(component_id)
                        ),
                    ));
                }
            }
        }
    }

    let object = vm
        .heap
        .get_mut(array)
        .ok_or_else(|| (ExceptionKind::InternalError, "dangling array reference".to_owned()))?;
    let length = object
        .array_length()
        .ok_or_else(|| (ExceptionKind::InternalError, "array backing missing".to_owned()))?;
    if index < 0 || index as usize >= length {
        return Err((
            ExceptionKind::ArrayIndexOutOfBoundsException,
            format!("array index {} out of bounds for length {}", index, length),
        ));
    }
    let i = index as usize;
    match (object.value_field_mut().unwrap(), value) {
        (FieldValue::Ints(items), v) => {
            items[i] = v
                .as_int()
                .ok_or_else(|| (ExceptionKind::InternalError, "int array store of non-int".to_owned()))?;
        }
        (FieldValue::Floats(items), v) => {
            items[i] = v.as_float().ok_or_else(|| {
                (ExceptionKind::InternalError, "float array store of non-float".to_owned())
            })?;
        }
        (FieldValue::Refs(items), v) => items[i] = v,
        (FieldValue::Bytes(items), v) => {
            items[i] = v
                .as_int()
                .ok_or_else(|| (ExceptionKind::InternalError, "byte array store of non-int".to_owned()))?
                as u8;
        }
        (FieldValue::JavaBytes(items), v) => {
            items[i] = v
                .as_int()
                .ok_or_else(|| (ExceptionKind::InternalError, "byte array store of non-int".to_owned()))?
                as i8;
        }
        _ => {
            return Err((
                ExceptionKind::InternalError,
                "array backing mismatch".to_owned(),
            ))
        }
    }
    Ok(())
}

fn make_multi_array(vm: &mut Vm, array_class: &str, counts: &[i64]) -> Option<ObjRef> {
    let first = usize::try_from(counts[0]).ok()?;
    if counts.len() == 1 {
        return object::make_array(&mut vm.heap, &vm.class_names, array_class, first);
    }
    let component_class = &array_class[1..];
    let mut elements = Vec::with_capacity(first);
    for _ in 0..first {
        let child = make_multi_array(vm, component_class, &counts[1..])?;
        elements.push(JavaValue::Ref(Some(child)));
    }
    let class = vm.class_names.intern_str(array_class);
    Some(
        vm.heap
            .alloc(Object::with_value(class, array_class, FieldValue::Refs(elements))),
    )
}

/// Pop the current frame and hand `value` (if any) to the caller's operand
/// stack, releasing the frame's monitor.
fn return_from_frame(
    vm: &Vm,
    thread: &mut JavaThread,
    value: Option<JavaValue>,
) -> Result<(), VmFault> {
    let finished = thread.frames.pop().ok_or(VmFault::EmptyFrameStack)?;
    if let Some(monitor) = finished.monitor {
        if vm.monitors.exit(monitor, finished.thread).is_err() {
            tracing::warn!(
                "monitor for {} was not held at return",
                finished.method_name
            );
        }
    }
    if let Some(value) = value {
        if let Some(caller) = thread.frames.top_mut() {
            caller.push_value(value).map_err(VmFault::Frame)?;
        }
    }
    Ok(())
}

/// Resolve and dispatch one invocation opcode. On success the callee frame is
/// pushed (bytecode) or the host body has run and its result is pushed; the
/// caller's pc has been advanced past the instruction.
fn invoke(
    vm: &mut Vm,
    thread: &mut JavaThread,
    class_name: &str,
    name: &str,
    desc: &str,
    kind: InvokeKind,
    inst_len: usize,
) -> Result<(), InvokeError> {
    let descriptor = MethodDescriptor::parse(desc).map_err(|err| {
        InvokeError::Fault(VmFault::MalformedDescriptor {
            desc: desc.to_owned(),
            err,
        })
    })?;
    let arg_slots = usize::from(descriptor.param_slots());
    let has_receiver = kind != InvokeKind::Static;

    let mut key = MethodTable::method_key(class_name, name, desc);

    // Virtual and interface dispatch resolve by the receiver's class-name
    // handle, walking superclass handles when there is no override.
    if matches!(kind, InvokeKind::Virtual | InvokeKind::Interface) {
        let receiver = thread
            .frames
            .top()
            .and_then(|frame| frame.peek_at(arg_slots))
            .copied();
        match receiver {
            Some(JavaValue::Ref(Some(receiver_ref))) => {
                let mut cursor = vm.heap.get(receiver_ref).map(|object| object.class);
                while let Some(class_id) = cursor {
                    let candidate = MethodTable::method_key(
                        &vm.class_names.tpath(class_id),
                        name,
                        desc,
                    );
                    if vm.mtable.lookup(&candidate).is_some() {
                        key = candidate;
                        break;
                    }
                    cursor = vm.classes.super_of(class_id);
                }
            }
            Some(JavaValue::Ref(None)) => {
                return Err(InvokeError::Throw((
                    ExceptionKind::NullPointerException,
                    format!("invoke {} on null receiver", name),
                )));
            }
            _ => {
                return Err(InvokeError::Throw((
                    ExceptionKind::InternalError,
                    format!("receiver for {}.{}{} is not a reference", class_name, name, desc),
                )));
            }
        }
    }

    let entry = match vm.mtable.lookup(&key) {
        Some(entry) => entry.clone(),
        None => {
            return Err(InvokeError::Throw((
                ExceptionKind::NoSuchMethodError,
                format!("Class method not found: {}.{}{}", class_name, name, desc),
            )));
        }
    };

    match entry {
        MTEntry::Host(gmeth) => {
            // Collect the declared slot count, then the receiver; the pc
            // stays at the invoke until the body has run so an error block
            // throws from the right site.
            let mut args = Vec::with_capacity(gmeth.param_slots + 1);
            for _ in 0..gmeth.param_slots + usize::from(has_receiver) {
                let popped = thread
                    .frames
                    .top_mut()
                    .ok_or(VmFault::EmptyFrameStack)?
                    .pop();
                match popped {
                    Ok(value) => args.push(value),
                    Err(err) => {
                        let msg = stack_fault_msg(vm, thread, &err);
                        return Err(InvokeError::Throw((ExceptionKind::InternalError, msg)));
                    }
                }
            }

            let result = gfunction::run_gfunction(vm, &mut thread.frames, &gmeth, &key, args, thread.trace);
            match result {
                GValue::Void => {}
                GValue::Value(value) => {
                    let frame = thread.frames.top_mut().ok_or(VmFault::EmptyFrameStack)?;
                    if let Err(err) = frame.push_value(value) {
                        let msg = stack_fault_msg(vm, thread, &err);
                        return Err(InvokeError::Throw((ExceptionKind::InternalError, msg)));
                    }
                }
                GValue::Err(block) => {
                    return Err(InvokeError::Throw((block.kind, block.msg)));
                }
            }
            thread
                .frames
                .top_mut()
                .ok_or(VmFault::EmptyFrameStack)?
                .pc += inst_len;
        }
        MTEntry::Bytecode(bmethod) => {
            if bmethod.is_native() {
                return Err(InvokeError::Throw((
                    ExceptionKind::UnsupportedOperationException,
                    format!("Native method requested: {}.{}{}", class_name, name, desc),
                )));
            }
            if thread.frames.is_full() {
                return Err(InvokeError::Throw((
                    ExceptionKind::StackOverflowError,
                    format!("frame stack depth exceeded invoking {}", key),
                )));
            }

            let callee_class = vm.class_names.intern_str(&bmethod.class_name);
            let mut callee = Frame::new_bytecode(callee_class, Arc::clone(&bmethod), thread.id);

            let total_slots = arg_slots + usize::from(has_receiver);
            let mut slots: SmallVec<[JavaValue; 8]> = SmallVec::with_capacity(total_slots);
            for _ in 0..total_slots {
                let popped = thread
                    .frames
                    .top_mut()
                    .ok_or(VmFault::EmptyFrameStack)?
                    .pop();
                match popped {
                    Ok(value) => slots.push(value),
                    Err(err) => {
                        let msg = stack_fault_msg(vm, thread, &err);
                        return Err(InvokeError::Throw((ExceptionKind::InternalError, msg)));
                    }
                }
            }
            slots.reverse();

            if has_receiver && slots.first().map_or(false, JavaValue::is_null) {
                return Err(InvokeError::Throw((
                    ExceptionKind::NullPointerException,
                    format!("invoke {} on null receiver", name),
                )));
            }
            if slots.len() > callee.locals.len() {
                return Err(InvokeError::Throw((
                    ExceptionKind::InternalError,
                    format!("max_locals too small for arguments of {}", key),
                )));
            }
            for (index, value) in slots.iter().enumerate() {
                callee.locals[index] = *value;
            }

            if bmethod.is_synchronized() {
                let target = if bmethod.is_static() {
                    vm.classes
                        .class_object(&mut vm.heap, &vm.class_names, callee_class)
                } else {
                    match slots.first() {
                        Some(JavaValue::Ref(Some(receiver_ref))) => *receiver_ref,
                        _ => {
                            return Err(InvokeError::Throw((
                                ExceptionKind::NullPointerException,
                                format!("synchronized {} without receiver", key),
                            )));
                        }
                    }
                };
                vm.monitors.enter(target, thread.id);
                callee.monitor = Some(target);
            }

            // The caller resumes after the invoke once the callee returns
            thread
                .frames
                .top_mut()
                .ok_or(VmFault::EmptyFrameStack)?
                .pc += inst_len;
            thread
                .frames
                .push(callee)
                .map_err(|err| InvokeError::Fault(VmFault::Frame(err)))?;
        }
    }
    Ok(())
}

// The dispatch macros re-borrow the thread on every use so the arms can also
// reach the vm without fighting the borrow checker.

macro_rules! throw {
    ($vm:expr, $thread:expr, $kind:expr, $msg:expr) => {{
        match exceptions::throw_ex($vm, &mut $thread.frames, $kind, &$msg) {
            ThrowResult::Caught => continue,
            ThrowResult::NotCaught => return Ok(RunOutcome::Uncaught),
        }
    }};
}

macro_rules! frame {
    ($thread:expr) => {
        $thread.frames.top_mut().ok_or(VmFault::EmptyFrameStack)?
    };
}

macro_rules! pop {
    ($vm:expr, $thread:expr) => {{
        let result = frame!($thread).pop();
        match result {
            Ok(value) => value,
            Err(err) => {
                let msg = stack_fault_msg($vm, $thread, &err);
                throw!($vm, $thread, ExceptionKind::InternalError, msg)
            }
        }
    }};
}

macro_rules! popw {
    ($vm:expr, $thread:expr) => {{
        let result = frame!($thread).pop_wide();
        match result {
            Ok(value) => value,
            Err(err) => {
                let msg = stack_fault_msg($vm, $thread, &err);
                throw!($vm, $thread, ExceptionKind::InternalError, msg)
            }
        }
    }};
}

macro_rules! pop_int {
    ($vm:expr, $thread:expr) => {{
        match pop!($vm, $thread).as_int() {
            Some(value) => value,
            None => throw!(
                $vm,
                $thread,
                ExceptionKind::InternalError,
                "expected an int on the operand stack"
            ),
        }
    }};
}

macro_rules! popw_int {
    ($vm:expr, $thread:expr) => {{
        match popw!($vm, $thread).as_int() {
            Some(value) => value,
            None => throw!(
                $vm,
                $thread,
                ExceptionKind::InternalError,
                "expected a long on the operand stack"
            ),
        }
    }};
}

macro_rules! pop_float {
    ($vm:expr, $thread:expr) => {{
        match pop!($vm, $thread).as_float() {
            Some(value) => value,
            None => throw!(
                $vm,
                $thread,
                ExceptionKind::InternalError,
                "expected a float on the operand stack"
            ),
        }
    }};
}

macro_rules! popw_float {
    ($vm:expr, $thread:expr) => {{
        match popw!($vm, $thread).as_float() {
            Some(value) => value,
            None => throw!(
                $vm,
                $thread,
                ExceptionKind::InternalError,
                "expected a double on the operand stack"
            ),
        }
    }};
}

macro_rules! pop_ref {
    ($vm:expr, $thread:expr) => {{
        match pop!($vm, $thread) {
            JavaValue::Ref(reference) => reference,
            _ => throw!(
                $vm,
                $thread,
                ExceptionKind::InternalError,
                "expected a reference on the operand stack"
            ),
        }
    }};
}

/// A non-null reference or `NullPointerException`.
macro_rules! pop_nonnull {
    ($vm:expr, $thread:expr, $what:expr) => {{
        match pop_ref!($vm, $thread) {
            Some(reference) => reference,
            None => throw!(
                $vm,
                $thread,
                ExceptionKind::NullPointerException,
                format!("{} on null reference", $what)
            ),
        }
    }};
}

macro_rules! push {
    ($vm:expr, $thread:expr, $value:expr) => {{
        let result = frame!($thread).push($value);
        if let Err(err) = result {
            let msg = stack_fault_msg($vm, $thread, &err);
            throw!($vm, $thread, ExceptionKind::InternalError, msg)
        }
    }};
}

macro_rules! pushw {
    ($vm:expr, $thread:expr, $value:expr) => {{
        let result = frame!($thread).push_wide($value);
        if let Err(err) = result {
            let msg = stack_fault_msg($vm, $thread, &err);
            throw!($vm, $thread, ExceptionKind::InternalError, msg)
        }
    }};
}

macro_rules! advance {
    ($thread:expr, $n:expr) => {
        frame!($thread).pc += $n
    };
}

macro_rules! branch {
    ($thread:expr, $pc:expr, $delta:expr, $len:expr) => {{
        let target = $pc as i64 + $delta;
        if target < 0 || target as usize >= $len {
            return Err(VmFault::BranchOutOfRange {
                pc: $pc,
                target,
            });
        }
        frame!($thread).pc = target as usize;
    }};
}

macro_rules! local {
    ($vm:expr, $thread:expr, $index:expr) => {{
        let result = frame!($thread).local($index);
        match result {
            Ok(value) => value,
            Err(err) => {
                let msg = stack_fault_msg($vm, $thread, &err);
                throw!($vm, $thread, ExceptionKind::InternalError, msg)
            }
        }
    }};
}

macro_rules! set_local {
    ($vm:expr, $thread:expr, $index:expr, $value:expr) => {{
        let result = frame!($thread).set_local($index, $value);
        if let Err(err) = result {
            let msg = stack_fault_msg($vm, $thread, &err);
            throw!($vm, $thread, ExceptionKind::InternalError, msg)
        }
    }};
}

macro_rules! cp_try {
    ($vm:expr, $thread:expr, $expr:expr) => {{
        match $expr {
            Ok(value) => value,
            Err(err) => throw!(
                $vm,
                $thread,
                ExceptionKind::InternalError,
                format!("{}", err)
            ),
        }
    }};
}

/// Run the thread's interpreter loop until its frame stack drains or an
/// uncaught exception terminates it. VM-internal faults propagate as `Err`.
pub fn run_thread(vm: &mut Vm, thread: &mut JavaThread) -> Result<RunOutcome, VmFault> {
    loop {
        let Some(top) = thread.frames.top() else {
            return Ok(RunOutcome::Completed);
        };
        let Some(method) = top.method.clone() else {
            return Err(VmFault::MissingMethod(format!(
                "{}{}",
                top.method_name, top.method_desc
            )));
        };
        let pc = top.pc;
        let code: &[u8] = &method.code.code;
        let code_len = code.len();

        if pc >= code_len {
            // Fell off the end of the method; treat as a void return
            return_from_frame(vm, thread, None)?;
            continue;
        }

        let opcode = code[pc];

        if thread.trace {
            let frame = thread.frames.top().unwrap();
            tracing::trace!(
                target: "instruction",
                "class: {}, meth: {}, pc: {}, inst: {}, tos: {}",
                vm.class_names.tpath(frame.class_name),
                frame.method_name,
                pc,
                op::name(opcode),
                frame.tos()
            );
        }

        match opcode {
            op::NOP => advance!(thread, 1),

            // === constants ===
            op::ACONST_NULL => {
                push!(vm, thread, JavaValue::NULL);
                advance!(thread, 1);
            }
            op::ICONST_M1..=op::ICONST_5 => {
                let value = i64::from(opcode) - i64::from(op::ICONST_0);
                push!(vm, thread, JavaValue::Int(value));
                advance!(thread, 1);
            }
            op::LCONST_0 | op::LCONST_1 => {
                let value = i64::from(opcode - op::LCONST_0);
                pushw!(vm, thread, JavaValue::Long(value));
                advance!(thread, 1);
            }
            op::FCONST_0..=op::FCONST_2 => {
                let value = f64::from(opcode - op::FCONST_0);
                push!(vm, thread, JavaValue::Float(value));
                advance!(thread, 1);
            }
            op::DCONST_0 | op::DCONST_1 => {
                let value = f64::from(opcode - op::DCONST_0);
                pushw!(vm, thread, JavaValue::Double(value));
                advance!(thread, 1);
            }
            op::BIPUSH => {
                let value = i64::from(u8_at(code, pc, 1)? as i8);
                push!(vm, thread, JavaValue::Int(value));
                advance!(thread, 2);
            }
            op::SIPUSH => {
                let value = i64::from(i16_at(code, pc, 1)?);
                push!(vm, thread, JavaValue::Int(value));
                advance!(thread, 3);
            }
            op::LDC | op::LDC_W => {
                let (index, inst_len) = if opcode == op::LDC {
                    (u16::from(u8_at(code, pc, 1)?), 2)
                } else {
                    (u16_at(code, pc, 1)?, 3)
                };
                let loaded = cp_try!(vm, thread, method.cp.loadable_of(index));
                if loaded.is_wide() {
                    throw!(
                        vm,
                        thread,
                        ExceptionKind::ClassFormatError,
                        "ldc: invalid type for bytecode operand"
                    );
                }
                let value = match loaded {
                    CpValue::Int(v) => JavaValue::Int(v),
                    CpValue::Float(v) => JavaValue::Float(v),
                    CpValue::Str(data) => {
                        let text = String::from_utf8_lossy(&data).into_owned();
                        let reference = object::make_string(
                            &mut vm.heap,
                            &vm.class_names,
                            vm.conf.string_signed_bytes,
                            &text,
                        );
                        JavaValue::Ref(Some(reference))
                    }
                    CpValue::Class(name) => {
                        let class_id = vm.class_names.intern(&name);
                        let reference = vm.classes.class_object(
                            &mut vm.heap,
                            &vm.class_names,
                            class_id,
                        );
                        JavaValue::Ref(Some(reference))
                    }
                    _ => unreachable!("wide constants rejected above"),
                };
                push!(vm, thread, value);
                advance!(thread, inst_len);
            }
            op::LDC2_W => {
                let index = u16_at(code, pc, 1)?;
                let loaded = cp_try!(vm, thread, method.cp.loadable_of(index));
                match loaded {
                    CpValue::Long(v) => {
                        pushw!(vm, thread, JavaValue::Long(v));
                    }
                    CpValue::Double(v) => {
                        pushw!(vm, thread, JavaValue::Double(v));
                    }
                    _ => throw!(
                        vm,
                        thread,
                        ExceptionKind::ClassFormatError,
                        "ldc2_w: invalid type for bytecode operand"
                    ),
                }
                advance!(thread, 3);
            }

            // === local loads ===
            op::ILOAD | op::FLOAD | op::ALOAD | op::LLOAD | op::DLOAD => {
                let wide = {
                    let frame = frame!(thread);
                    let wide = frame.wide;
                    frame.wide = false;
                    wide
                };
                let (index, inst_len) = if wide {
                    (usize::from(u16_at(code, pc, 1)?), 3)
                } else {
                    (usize::from(u8_at(code, pc, 1)?), 2)
                };
                let value = local!(vm, thread, index);
                if opcode == op::LLOAD || opcode == op::DLOAD {
                    pushw!(vm, thread, value);
                } else {
                    push!(vm, thread, value);
                }
                advance!(thread, inst_len);
            }
            op::ILOAD_0..=op::ILOAD_3 => {
                let value = local!(vm, thread, usize::from(opcode - op::ILOAD_0));
                push!(vm, thread, value);
                advance!(thread, 1);
            }
            op::LLOAD_0..=op::LLOAD_3 => {
                let value = local!(vm, thread, usize::from(opcode - op::LLOAD_0));
                pushw!(vm, thread, value);
                advance!(thread, 1);
            }
            op::FLOAD_0..=op::FLOAD_3 => {
                let value = local!(vm, thread, usize::from(opcode - op::FLOAD_0));
                push!(vm, thread, value);
                advance!(thread, 1);
            }
            op::DLOAD_0..=op::DLOAD_3 => {
                let value = local!(vm, thread, usize::from(opcode - op::DLOAD_0));
                pushw!(vm, thread, value);
                advance!(thread, 1);
            }
            op::ALOAD_0..=op::ALOAD_3 => {
                let value = local!(vm, thread, usize::from(opcode - op::ALOAD_0));
                push!(vm, thread, value);
                advance!(thread, 1);
            }

            // === array loads ===
            op::IALOAD | op::BALOAD | op::CALOAD | op::SALOAD | op::FALOAD | op::AALOAD => {
                let index = pop_int!(vm, thread);
                let array = pop_nonnull!(vm, thread, "array load");
                match array_get(vm, array, index) {
                    Ok(value) => push!(vm, thread, value),
                    Err((kind, msg)) => throw!(vm, thread, kind, msg),
                }
                advance!(thread, 1);
            }
            op::LALOAD | op::DALOAD => {
                let index = pop_int!(vm, thread);
                let array = pop_nonnull!(vm, thread, "array load");
                match array_get(vm, array, index) {
                    Ok(value) => pushw!(vm, thread, value),
                    Err((kind, msg)) => throw!(vm, thread, kind, msg),
                }
                advance!(thread, 1);
            }

            // === local stores ===
            op::ISTORE | op::FSTORE | op::ASTORE | op::LSTORE | op::DSTORE => {
                let wide = {
                    let frame = frame!(thread);
                    let wide = frame.wide;
                    frame.wide = false;
                    wide
                };
                let (index, inst_len) = if wide {
                    (usize::from(u16_at(code, pc, 1)?), 3)
                } else {
                    (usize::from(u8_at(code, pc, 1)?), 2)
                };
                if opcode == op::LSTORE || opcode == op::DSTORE {
                    let value = popw!(vm, thread);
                    set_local!(vm, thread, index, value);
                    set_local!(vm, thread, index + 1, value);
                } else {
                    let value = pop!(vm, thread);
                    set_local!(vm, thread, index, value);
                }
                advance!(thread, inst_len);
            }
            op::ISTORE_0..=op::ISTORE_3 => {
                let value = pop!(vm, thread);
                set_local!(vm, thread, usize::from(opcode - op::ISTORE_0), value);
                advance!(thread, 1);
            }
            op::LSTORE_0..=op::LSTORE_3 => {
                let index = usize::from(opcode - op::LSTORE_0);
                let value = popw!(vm, thread);
                set_local!(vm, thread, index, value);
                set_local!(vm, thread, index + 1, value);
                advance!(thread, 1);
            }
            op::FSTORE_0..=op::FSTORE_3 => {
                let value = pop!(vm, thread);
                set_local!(vm, thread, usize::from(opcode - op::FSTORE_0), value);
                advance!(thread, 1);
            }
            op::DSTORE_0..=op::DSTORE_3 => {
                let index = usize::from(opcode - op::DSTORE_0);
                let value = popw!(vm, thread);
                set_local!(vm, thread, index, value);
                set_local!(vm, thread, index + 1, value);
                advance!(thread, 1);
            }
            op::ASTORE_0..=op::ASTORE_3 => {
                let value = pop!(vm, thread);
                set_local!(vm, thread, usize::from(opcode - op::ASTORE_0), value);
                advance!(thread, 1);
            }

            // === array stores ===
            op::IASTORE | op::BASTORE | op::CASTORE | op::SASTORE | op::FASTORE | op::AASTORE => {
                let value = pop!(vm, thread);
                let index = pop_int!(vm, thread);
                let array = pop_nonnull!(vm, thread, "array store");
                if let Err((kind, msg)) = array_set(vm, array, index, value) {
                    throw!(vm, thread, kind, msg);
                }
                advance!(thread, 1);
            }
            op::LASTORE | op::DASTORE => {
                let value = popw!(vm, thread);
                let index = pop_int!(vm, thread);
                let array = pop_nonnull!(vm, thread, "array store");
                if let Err((kind, msg)) = array_set(vm, array, index, value) {
                    throw!(vm, thread, kind, msg);
                }
                advance!(thread, 1);
            }

            // === operand stack manipulation ===
            op::POP => {
                pop!(vm, thread);
                advance!(thread, 1);
            }
            op::POP2 => {
                pop!(vm, thread);
                pop!(vm, thread);
                advance!(thread, 1);
            }
            op::DUP => {
                let value = pop!(vm, thread);
                push!(vm, thread, value);
                push!(vm, thread, value);
                advance!(thread, 1);
            }
            op::DUP_X1 => {
                let a = pop!(vm, thread);
                let b = pop!(vm, thread);
                push!(vm, thread, a);
                push!(vm, thread, b);
                push!(vm, thread, a);
                advance!(thread, 1);
            }
            op::DUP_X2 => {
                let a = pop!(vm, thread);
                let b = pop!(vm, thread);
                let c = pop!(vm, thread);
                push!(vm, thread, a);
                push!(vm, thread, c);
                push!(vm, thread, b);
                push!(vm, thread, a);
                advance!(thread, 1);
            }
            op::DUP2 => {
                let a = pop!(vm, thread);
                let b = pop!(vm, thread);
                push!(vm, thread, b);
                push!(vm, thread, a);
                push!(vm, thread, b);
                push!(vm, thread, a);
                advance!(thread, 1);
            }
            op::DUP2_X1 => {
                let a = pop!(vm, thread);
                let b = pop!(vm, thread);
                let c = pop!(vm, thread);
                push!(vm, thread, b);
                push!(vm, thread, a);
                push!(vm, thread, c);
                push!(vm, thread, b);
                push!(vm, thread, a);
                advance!(thread, 1);
            }
            op::DUP2_X2 => {
                let a = pop!(vm, thread);
                let b = pop!(vm, thread);
                let c = pop!(vm, thread);
                let d = pop!(vm, thread);
                push!(vm, thread, b);
                push!(vm, thread, a);
                push!(vm, thread, d);
                push!(vm, thread, c);
                push!(vm, thread, b);
                push!(vm, thread, a);
                advance!(thread, 1);
            }
            op::SWAP => {
                let a = pop!(vm, thread);
                let b = pop!(vm, thread);
                push!(vm, thread, a);
                push!(vm, thread, b);
                advance!(thread, 1);
            }

            // === int arithmetic ===
            op::IADD => {
                let v2 = pop_int!(vm, thread) as i32;
                let v1 = pop_int!(vm, thread) as i32;
                push!(vm, thread, JavaValue::Int(i64::from(v1.wrapping_add(v2))));
                advance!(thread, 1);
            }
            op::ISUB => {
                let v2 = pop_int!(vm, thread) as i32;
                let v1 = pop_int!(vm, thread) as i32;
                push!(vm, thread, JavaValue::Int(i64::from(v1.wrapping_sub(v2))));
                advance!(thread, 1);
            }
            op::IMUL => {
                let v2 = pop_int!(vm, thread) as i32;
                let v1 = pop_int!(vm, thread) as i32;
                push!(vm, thread, JavaValue::Int(i64::from(v1.wrapping_mul(v2))));
                advance!(thread, 1);
            }
            op::IDIV => {
                let v2 = pop_int!(vm, thread) as i32;
                let v1 = pop_int!(vm, thread) as i32;
                if v2 == 0 {
                    throw!(vm, thread, ExceptionKind::ArithmeticException, "/ by zero");
                }
                push!(vm, thread, JavaValue::Int(i64::from(v1.wrapping_div(v2))));
                advance!(thread, 1);
            }
            op::IREM => {
                let v2 = pop_int!(vm, thread) as i32;
                let v1 = pop_int!(vm, thread) as i32;
                if v2 == 0 {
                    throw!(vm, thread, ExceptionKind::ArithmeticException, "/ by zero");
                }
                push!(vm, thread, JavaValue::Int(i64::from(v1.wrapping_rem(v2))));
                advance!(thread, 1);
            }
            op::INEG => {
                let value = pop_int!(vm, thread) as i32;
                push!(vm, thread, JavaValue::Int(i64::from(value.wrapping_neg())));
                advance!(thread, 1);
            }

            // === long arithmetic ===
            op::LADD => {
                let v2 = popw_int!(vm, thread);
                let v1 = popw_int!(vm, thread);
                pushw!(vm, thread, JavaValue::Long(v1.wrapping_add(v2)));
                advance!(thread, 1);
            }
            op::LSUB => {
                let v2 = popw_int!(vm, thread);
                let v1 = popw_int!(vm, thread);
                pushw!(vm, thread, JavaValue::Long(v1.wrapping_sub(v2)));
                advance!(thread, 1);
            }
            op::LMUL => {
                let v2 = popw_int!(vm, thread);
                let v1 = popw_int!(vm, thread);
                pushw!(vm, thread, JavaValue::Long(v1.wrapping_mul(v2)));
                advance!(thread, 1);
            }
            op::LDIV => {
                let v2 = popw_int!(vm, thread);
                let v1 = popw_int!(vm, thread);
                if v2 == 0 {
                    throw!(vm, thread, ExceptionKind::ArithmeticException, "/ by zero");
                }
                pushw!(vm, thread, JavaValue::Long(v1.wrapping_div(v2)));
                advance!(thread, 1);
            }
            op::LREM => {
                let v2 = popw_int!(vm, thread);
                let v1 = popw_int!(vm, thread);
                if v2 == 0 {
                    throw!(vm, thread, ExceptionKind::ArithmeticException, "/ by zero");
                }
                pushw!(vm, thread, JavaValue::Long(v1.wrapping_rem(v2)));
                advance!(thread, 1);
            }
            op::LNEG => {
                let value = popw_int!(vm, thread);
                pushw!(vm, thread, JavaValue::Long(value.wrapping_neg()));
                advance!(thread, 1);
            }

            // === float/double arithmetic (IEEE, never throws) ===
            op::FADD => {
                let v2 = pop_float!(vm, thread);
                let v1 = pop_float!(vm, thread);
                push!(vm, thread, JavaValue::Float(v1 + v2));
                advance!(thread, 1);
            }
            op::FSUB => {
                let v2 = pop_float!(vm, thread);
                let v1 = pop_float!(vm, thread);
                push!(vm, thread, JavaValue::Float(v1 - v2));
                advance!(thread, 1);
            }
            op::FMUL => {
                let v2 = pop_float!(vm, thread);
                let v1 = pop_float!(vm, thread);
                push!(vm, thread, JavaValue::Float(v1 * v2));
                advance!(thread, 1);
            }
            op::FDIV => {
                let v2 = pop_float!(vm, thread);
                let v1 = pop_float!(vm, thread);
                push!(vm, thread, JavaValue::Float(v1 / v2));
                advance!(thread, 1);
            }
            op::FREM => {
                let v2 = pop_float!(vm, thread);
                let v1 = pop_float!(vm, thread);
                push!(vm, thread, JavaValue::Float(v1 % v2));
                advance!(thread, 1);
            }
            op::FNEG => {
                let value = pop_float!(vm, thread);
                push!(vm, thread, JavaValue::Float(-value));
                advance!(thread, 1);
            }
            op::DADD => {
                let v2 = popw_float!(vm, thread);
                let v1 = popw_float!(vm, thread);
                pushw!(vm, thread, JavaValue::Double(v1 + v2));
                advance!(thread, 1);
            }
            op::DSUB => {
                let v2 = popw_float!(vm, thread);
                let v1 = popw_float!(vm, thread);
                pushw!(vm, thread, JavaValue::Double(v1 - v2));
                advance!(thread, 1);
            }
            op::DMUL => {
                let v2 = popw_float!(vm, thread);
                let v1 = popw_float!(vm, thread);
                pushw!(vm, thread, JavaValue::Double(v1 * v2));
                advance!(thread, 1);
            }
            op::DDIV => {
                let v2 = popw_float!(vm, thread);
                let v1 = popw_float!(vm, thread);
                pushw!(vm, thread, JavaValue::Double(v1 / v2));
                advance!(thread, 1);
            }
            op::DREM => {
                let v2 = popw_float!(vm, thread);
                let v1 = popw_float!(vm, thread);
                pushw!(vm, thread, JavaValue::Double(v1 % v2));
                advance!(thread, 1);
            }
            op::DNEG => {
                let value = popw_float!(vm, thread);
                pushw!(vm, thread, JavaValue::Double(-value));
                advance!(thread, 1);
            }

            // === shifts and bitwise ===
            op::ISHL => {
                let shift = pop_int!(vm, thread) & 0x1F;
                let value = pop_int!(vm, thread) as i32;
                push!(vm, thread, JavaValue::Int(i64::from(value.wrapping_shl(shift as u32))));
                advance!(thread, 1);
            }
            op::ISHR => {
                let shift = pop_int!(vm, thread) & 0x1F;
                let value = pop_int!(vm, thread) as i32;
                push!(vm, thread, JavaValue::Int(i64::from(value.wrapping_shr(shift as u32))));
                advance!(thread, 1);
            }
            op::IUSHR => {
                let shift = pop_int!(vm, thread) & 0x1F;
                let value = pop_int!(vm, thread) as i32 as u32;
                push!(vm, thread, JavaValue::Int(i64::from((value >> shift) as i32)));
                advance!(thread, 1);
            }
            op::LSHL => {
                let shift = pop_int!(vm, thread) & 0x3F;
                let value = popw_int!(vm, thread);
                pushw!(vm, thread, JavaValue::Long(value.wrapping_shl(shift as u32)));
                advance!(thread, 1);
            }
            op::LSHR => {
                let shift = pop_int!(vm, thread) & 0x3F;
                let value = popw_int!(vm, thread);
                pushw!(vm, thread, JavaValue::Long(value.wrapping_shr(shift as u32)));
                advance!(thread, 1);
            }
            op::LUSHR => {
                let shift = pop_int!(vm, thread) & 0x3F;
                let value = popw_int!(vm, thread) as u64;
                pushw!(vm, thread, JavaValue::Long((value >> shift) as i64));
                advance!(thread, 1);
            }
            op::IAND => {
                let v2 = pop_int!(vm, thread) as i32;
                let v1 = pop_int!(vm, thread) as i32;
                push!(vm, thread, JavaValue::Int(i64::from(v1 & v2)));
                advance!(thread, 1);
            }
            op::LAND => {
                let v2 = popw_int!(vm, thread);
                let v1 = popw_int!(vm, thread);
                pushw!(vm, thread, JavaValue::Long(v1 & v2));
                advance!(thread, 1);
            }
            op::IOR => {
                let v2 = pop_int!(vm, thread) as i32;
                let v1 = pop_int!(vm, thread) as i32;
                push!(vm, thread, JavaValue::Int(i64::from(v1 | v2)));
                advance!(thread, 1);
            }
            op::LOR => {
                let v2 = popw_int!(vm, thread);
                let v1 = popw_int!(vm, thread);
                pushw!(vm, thread, JavaValue::Long(v1 | v2));
                advance!(thread, 1);
            }
            op::IXOR => {
                let v2 = pop_int!(vm, thread) as i32;
                let v1 = pop_int!(vm, thread) as i32;
                push!(vm, thread, JavaValue::Int(i64::from(v1 ^ v2)));
                advance!(thread, 1);
            }
            op::LXOR => {
                let v2 = popw_int!(vm, thread);
                let v1 = popw_int!(vm, thread);
                pushw!(vm, thread, JavaValue::Long(v1 ^ v2));
                advance!(thread, 1);
            }

            op::IINC => {
                let wide = {
                    let frame = frame!(thread);
                    let wide = frame.wide;
                    frame.wide = false;
                    wide
                };
                let (index, delta, inst_len) = if wide {
                    (
                        usize::from(u16_at(code, pc, 1)?),
                        i64::from(i16_at(code, pc, 3)?),
                        5,
                    )
                } else {
                    (
                        usize::from(u8_at(code, pc, 1)?),
                        i64::from(u8_at(code, pc, 2)? as i8),
                        3,
                    )
                };
                let original = local!(vm, thread, index);
                let Some(original) = original.as_int() else {
                    throw!(
                        vm,
                        thread,
                        ExceptionKind::InternalError,
                        "iinc on a non-int local"
                    );
                };
                let updated = (original as i32).wrapping_add(delta as i32);
                set_local!(vm, thread, index, JavaValue::Int(i64::from(updated)));
                advance!(thread, inst_len);
            }

            // === conversions ===
            op::I2L => {
                let value = pop_int!(vm, thread) as i32;
                pushw!(vm, thread, JavaValue::Long(i64::from(value)));
                advance!(thread, 1);
            }
            op::I2F => {
                let value = pop_int!(vm, thread) as i32;
                push!(vm, thread, JavaValue::Float(f64::from(value)));
                advance!(thread, 1);
            }
            op::I2D => {
                let value = pop_int!(vm, thread) as i32;
                pushw!(vm, thread, JavaValue::Double(f64::from(value)));
                advance!(thread, 1);
            }
            op::L2I => {
                let value = popw_int!(vm, thread);
                push!(vm, thread, JavaValue::Int(i64::from(value as i32)));
                advance!(thread, 1);
            }
            op::L2F => {
                let value = popw_int!(vm, thread);
                push!(vm, thread, JavaValue::Float(value as f64));
                advance!(thread, 1);
            }
            op::L2D => {
                let value = popw_int!(vm, thread);
                pushw!(vm, thread, JavaValue::Double(value as f64));
                advance!(thread, 1);
            }
            op::F2I => {
                let value = pop_float!(vm, thread);
                push!(vm, thread, JavaValue::Int(float_to_int(value)));
                advance!(thread, 1);
            }
            op::F2L => {
                let value = pop_float!(vm, thread);
                pushw!(vm, thread, JavaValue::Long(float_to_long(value)));
                advance!(thread, 1);
            }
            op::F2D => {
                let value = pop_float!(vm, thread);
                pushw!(vm, thread, JavaValue::Double(value));
                advance!(thread, 1);
            }
            op::D2I => {
                let value = popw_float!(vm, thread);
                push!(vm, thread, JavaValue::Int(float_to_int(value)));
                advance!(thread, 1);
            }
            op::D2L => {
                let value = popw_float!(vm, thread);
                pushw!(vm, thread, JavaValue::Long(float_to_long(value)));
                advance!(thread, 1);
            }
            op::D2F => {
                let value = popw_float!(vm, thread);
                push!(vm, thread, JavaValue::Float(f64::from(value as f32)));
                advance!(thread, 1);
            }
            op::I2B => {
                let value = pop_int!(vm, thread);
                push!(vm, thread, JavaValue::Int(i64::from(value as i8)));
                advance!(thread, 1);
            }
            op::I2C => {
                let value = pop_int!(vm, thread);
                push!(vm, thread, JavaValue::Int(i64::from(value as u16)));
                advance!(thread, 1);
            }
            op::I2S => {
                let value = pop_int!(vm, thread);
                push!(vm, thread, JavaValue::Int(i64::from(value as i16)));
                advance!(thread, 1);
            }

            // === comparisons ===
            op::LCMP => {
                let v2 = popw_int!(vm, thread);
                let v1 = popw_int!(vm, thread);
                push!(vm, thread, JavaValue::Int(i64::from(v1.cmp(&v2) as i8)));
                advance!(thread, 1);
            }
            op::FCMPL | op::FCMPG => {
                let v2 = pop_float!(vm, thread);
                let v1 = pop_float!(vm, thread);
                let result = match v1.partial_cmp(&v2) {
                    Some(order) => order as i8 as i64,
                    // NaN ordering depends on the opcode flavor
                    None if opcode == op::FCMPG => 1,
                    None => -1,
                };
                push!(vm, thread, JavaValue::Int(result));
                advance!(thread, 1);
            }
            op::DCMPL | op::DCMPG => {
                let v2 = popw_float!(vm, thread);
                let v1 = popw_float!(vm, thread);
                let result = match v1.partial_cmp(&v2) {
                    Some(order) => order as i8 as i64,
                    None if opcode == op::DCMPG => 1,
                    None => -1,
                };
                push!(vm, thread, JavaValue::Int(result));
                advance!(thread, 1);
            }

            // === branches ===
            op::IFEQ..=op::IFLE => {
                let value = pop_int!(vm, thread) as i32;
                let taken = match opcode {
                    op::IFEQ => value == 0,
                    op::IFNE => value != 0,
                    op::IFLT => value < 0,
                    op::IFGE => value >= 0,
                    op::IFGT => value > 0,
                    _ => value <= 0,
                };
                if taken {
                    let delta = i64::from(i16_at(code, pc, 1)?);
                    branch!(thread, pc, delta, code_len);
                } else {
                    advance!(thread, 3);
                }
            }
            op::IF_ICMPEQ..=op::IF_ICMPLE => {
                let v2 = pop_int!(vm, thread) as i32;
                let v1 = pop_int!(vm, thread) as i32;
                let taken = match opcode {
                    op::IF_ICMPEQ => v1 == v2,
                    op::IF_ICMPNE => v1 != v2,
                    op::IF_ICMPLT => v1 < v2,
                    op::IF_ICMPGE => v1 >= v2,
                    op::IF_ICMPGT => v1 > v2,
                    _ => v1 <= v2,
                };
                if taken {
                    let delta = i64::from(i16_at(code, pc, 1)?);
                    branch!(thread, pc, delta, code_len);
                } else {
                    advance!(thread, 3);
                }
            }
            op::IF_ACMPEQ | op::IF_ACMPNE => {
                let v2 = pop_ref!(vm, thread);
                let v1 = pop_ref!(vm, thread);
                let taken = if opcode == op::IF_ACMPEQ {
                    v1 == v2
                } else {
                    v1 != v2
                };
                if taken {
                    let delta = i64::from(i16_at(code, pc, 1)?);
                    branch!(thread, pc, delta, code_len);
                } else {
                    advance!(thread, 3);
                }
            }
            op::IFNULL | op::IFNONNULL => {
                let value = pop!(vm, thread);
                let taken = if opcode == op::IFNULL {
                    value.is_null()
                } else {
                    !value.is_null()
                };
                if taken {
                    let delta = i64::from(i16_at(code, pc, 1)?);
                    branch!(thread, pc, delta, code_len);
                } else {
                    advance!(thread, 3);
                }
            }
            op::GOTO => {
                let delta = i64::from(i16_at(code, pc, 1)?);
                branch!(thread, pc, delta, code_len);
            }
            op::GOTO_W => {
                let delta = i64::from(i32_at(code, pc, 1)?);
                branch!(thread, pc, delta, code_len);
            }
            op::JSR => {
                let delta = i64::from(i16_at(code, pc, 1)?);
                push!(vm, thread, JavaValue::RetAddr((pc + 3) as u32));
                branch!(thread, pc, delta, code_len);
            }
            op::JSR_W => {
                let delta = i64::from(i32_at(code, pc, 1)?);
                push!(vm, thread, JavaValue::RetAddr((pc + 5) as u32));
                branch!(thread, pc, delta, code_len);
            }
            op::RET => {
                let wide = {
                    let frame = frame!(thread);
                    let wide = frame.wide;
                    frame.wide = false;
                    wide
                };
                let index = if wide {
                    usize::from(u16_at(code, pc, 1)?)
                } else {
                    usize::from(u8_at(code, pc, 1)?)
                };
                let value = local!(vm, thread, index);
                let JavaValue::RetAddr(target) = value else {
                    throw!(
                        vm,
                        thread,
                        ExceptionKind::InternalError,
                        "ret local is not a return address"
                    );
                };
                if target as usize >= code_len {
                    return Err(VmFault::BranchOutOfRange {
                        pc,
                        target: i64::from(target),
                    });
                }
                frame!(thread).pc = target as usize;
            }
            op::TABLESWITCH => {
                let base = pc + 1;
                let pad = (4 - base % 4) % 4;
                let mut cursor = base + pad;
                let default = i64::from(i32_at(code, cursor, 0)?);
                let low = i64::from(i32_at(code, cursor, 4)?);
                let high = i64::from(i32_at(code, cursor, 8)?);
                cursor += 12;
                let index = pop_int!(vm, thread) as i32 as i64;
                let delta = if index < low || index > high {
                    default
                } else {
                    let slot = (index - low) as usize;
                    i64::from(i32_at(code, cursor, slot * 4)?)
                };
                branch!(thread, pc, delta, code_len);
            }
            op::LOOKUPSWITCH => {
                let base = pc + 1;
                let pad = (4 - base % 4) % 4;
                let cursor = base + pad;
                let default = i64::from(i32_at(code, cursor, 0)?);
                let npairs = i32_at(code, cursor, 4)?;
                let key = pop_int!(vm, thread) as i32;
                let mut delta = default;
                for pair in 0..npairs as usize {
                    let matched = i32_at(code, cursor, 8 + pair * 8)?;
                    if matched == key {
                        delta = i64::from(i32_at(code, cursor, 12 + pair * 8)?);
                        break;
                    }
                }
                branch!(thread, pc, delta, code_len);
            }

            // === returns ===
            op::IRETURN | op::FRETURN | op::ARETURN => {
                let value = pop!(vm, thread);
                return_from_frame(vm, thread, Some(value))?;
            }
            op::LRETURN | op::DRETURN => {
                let value = popw!(vm, thread);
                return_from_frame(vm, thread, Some(value))?;
            }
            op::RETURN => {
                return_from_frame(vm, thread, None)?;
            }

            // === statics and fields ===
            op::GETSTATIC => {
                let index = u16_at(code, pc, 1)?;
                let (class_bytes, field_name, _desc) =
                    cp_try!(vm, thread, method.cp.field_info_of(index));
                let class_name = String::from_utf8_lossy(class_bytes).into_owned();
                let key = crate::statics::Statics::key(&class_name, &field_name);
                if thread.trace {
                    tracing::trace!(target: "instruction", "getstatic {}", key);
                }
                let Some(entry) = vm.statics.get(&key) else {
                    throw!(
                        vm,
                        thread,
                        ExceptionKind::NoSuchFieldError,
                        format!("getstatic: could not find static field {}", key)
                    );
                };
                let value = entry.value;
                if value.is_category2() {
                    pushw!(vm, thread, value);
                } else {
                    push!(vm, thread, value);
                }
                advance!(thread, 3);
            }
            op::PUTSTATIC => {
                let index = u16_at(code, pc, 1)?;
                let (class_bytes, field_name, field_desc) =
                    cp_try!(vm, thread, method.cp.field_info_of(index));
                let class_name = String::from_utf8_lossy(class_bytes).into_owned();
                let field_name = field_name.into_owned();
                let field_desc = field_desc.into_owned();
                let value = if types::is_wide_tag(&field_desc) {
                    popw!(vm, thread)
                } else {
                    pop!(vm, thread)
                };
                vm.statics.set(&class_name, &field_name, &field_desc, value);
                advance!(thread, 3);
            }
            op::GETFIELD => {
                let index = u16_at(code, pc, 1)?;
                let (_class, field_name, _desc) =
                    cp_try!(vm, thread, method.cp.field_info_of(index));
                let field_name = field_name.into_owned();
                let receiver = pop_nonnull!(vm, thread, "getfield");
                let Some(object) = vm.heap.get(receiver) else {
                    return Err(VmFault::InvalidObjRef(receiver));
                };
                let Some(field) = object.field(&field_name) else {
                    let msg = format!(
                        "getfield: no field {} in {}",
                        field_name,
                        vm.class_names.tpath(object.class)
                    );
                    throw!(vm, thread, ExceptionKind::NoSuchFieldError, msg);
                };
                let FieldValue::Value(value) = field.value else {
                    throw!(
                        vm,
                        thread,
                        ExceptionKind::InternalError,
                        format!("getfield on container-backed field {}", field_name)
                    );
                };
                if value.is_category2() {
                    pushw!(vm, thread, value);
                } else {
                    push!(vm, thread, value);
                }
                advance!(thread, 3);
            }
            op::PUTFIELD => {
                let index = u16_at(code, pc, 1)?;
                let (_class, field_name, field_desc) =
                    cp_try!(vm, thread, method.cp.field_info_of(index));
                let field_name = field_name.into_owned();
                let field_desc = field_desc.into_owned();
                let value = if types::is_wide_tag(&field_desc) {
                    popw!(vm, thread)
                } else {
                    pop!(vm, thread)
                };
                let receiver = pop_nonnull!(vm, thread, "putfield");
                let Some(object) = vm.heap.get_mut(receiver) else {
                    return Err(VmFault::InvalidObjRef(receiver));
                };
                object.set_field(&field_name, &field_desc, FieldValue::Value(value));
                advance!(thread, 3);
            }

            // === invocation ===
            op::INVOKEVIRTUAL | op::INVOKESPECIAL | op::INVOKESTATIC | op::INVOKEINTERFACE => {
                let index = u16_at(code, pc, 1)?;
                let (kind, inst_len) = match opcode {
                    op::INVOKEVIRTUAL => (InvokeKind::Virtual, 3),
                    op::INVOKESPECIAL => (InvokeKind::Special, 3),
                    op::INVOKESTATIC => (InvokeKind::Static, 3),
                    _ => (InvokeKind::Interface, 5),
                };
                let (class_bytes, name, desc) =
                    cp_try!(vm, thread, method.cp.method_info_of(index));
                let class_name = String::from_utf8_lossy(class_bytes).into_owned();
                let name = name.into_owned();
                let desc = desc.into_owned();
                match invoke(vm, thread, &class_name, &name, &desc, kind, inst_len) {
                    Ok(()) => {}
                    Err(InvokeError::Fault(fault)) => return Err(fault),
                    Err(InvokeError::Throw((kind, msg))) => throw!(vm, thread, kind, msg),
                }
            }
            op::INVOKEDYNAMIC => {
                throw!(
                    vm,
                    thread,
                    ExceptionKind::UnsupportedOperationException,
                    "invokedynamic is not supported"
                );
            }

            // === allocation ===
            op::NEW => {
                let index = u16_at(code, pc, 1)?;
                let class_bytes = cp_try!(vm, thread, method.cp.classname_of(index)).to_vec();
                let class_id = vm.class_names.intern(&class_bytes);
                let reference = instantiate::instantiate_class(&mut vm.heap, &vm.classes, class_id);
                push!(vm, thread, JavaValue::Ref(Some(reference)));
                advance!(thread, 3);
            }
            op::NEWARRAY => {
                let atype = u8_at(code, pc, 1)?;
                let count = pop_int!(vm, thread);
                if count < 0 {
                    throw!(
                        vm,
                        thread,
                        ExceptionKind::NegativeArraySizeException,
                        format!("{}", count)
                    );
                }
                let Some(array_class) = types::array_class_of_atype(atype) else {
                    throw!(
                        vm,
                        thread,
                        ExceptionKind::ClassFormatError,
                        format!("newarray: bad atype {}", atype)
                    );
                };
                let Some(reference) =
                    object::make_array(&mut vm.heap, &vm.class_names, array_class, count as usize)
                else {
                    throw!(vm, thread, ExceptionKind::InternalError, "newarray failed");
                };
                push!(vm, thread, JavaValue::Ref(Some(reference)));
                advance!(thread, 2);
            }
            op::ANEWARRAY => {
                let index = u16_at(code, pc, 1)?;
                let component = cp_try!(vm, thread, method.cp.classname_of(index)).to_vec();
                let count = pop_int!(vm, thread);
                if count < 0 {
                    throw!(
                        vm,
                        thread,
                        ExceptionKind::NegativeArraySizeException,
                        format!("{}", count)
                    );
                }
                let component_text = String::from_utf8_lossy(&component);
                let array_class = if component.first() == Some(&b'[') {
                    format!("[{}", component_text)
                } else {
                    format!("[L{};", component_text)
                };
                let Some(reference) =
                    object::make_array(&mut vm.heap, &vm.class_names, &array_class, count as usize)
                else {
                    throw!(vm, thread, ExceptionKind::InternalError, "anewarray failed");
                };
                push!(vm, thread, JavaValue::Ref(Some(reference)));
                advance!(thread, 3);
            }
            op::MULTIANEWARRAY => {
                let index = u16_at(code, pc, 1)?;
                let dims = usize::from(u8_at(code, pc, 3)?);
                let array_class =
                    String::from_utf8_lossy(cp_try!(vm, thread, method.cp.classname_of(index)))
                        .into_owned();
                let mut counts = Vec::with_capacity(dims);
                for _ in 0..dims {
                    counts.push(pop_int!(vm, thread));
                }
                counts.reverse();
                if counts.iter().any(|&count| count < 0) {
                    throw!(
                        vm,
                        thread,
                        ExceptionKind::NegativeArraySizeException,
                        "multianewarray with negative dimension"
                    );
                }
                let Some(reference) = make_multi_array(vm, &array_class, &counts) else {
                    throw!(
                        vm,
                        thread,
                        ExceptionKind::InternalError,
                        "multianewarray failed"
                    );
                };
                push!(vm, thread, JavaValue::Ref(Some(reference)));
                advance!(thread, 4);
            }
            op::ARRAYLENGTH => {
                let array = pop_nonnull!(vm, thread, "arraylength");
                let length = vm.heap.get(array).and_then(Object::array_length);
                let Some(length) = length else {
                    throw!(
                        vm,
                        thread,
                        ExceptionKind::InternalError,
                        "arraylength on a non-array"
                    );
                };
                push!(vm, thread, JavaValue::Int(length as i64));
                advance!(thread, 1);
            }

            // === throw ===
            op::ATHROW => {
                let thrown = pop_nonnull!(vm, thread, "athrow");
                match exceptions::throw_object(vm, &mut thread.frames, thrown) {
                    ThrowResult::Caught => continue,
                    ThrowResult::NotCaught => return Ok(RunOutcome::Uncaught),
                }
            }

            // === casts ===
            op::CHECKCAST => {
                let index = u16_at(code, pc, 1)?;
                let target_bytes = cp_try!(vm, thread, method.cp.classname_of(index)).to_vec();
                let target = vm.class_names.intern(&target_bytes);
                let value = frame!(thread).peek().copied();
                match value {
                    Some(JavaValue::Ref(None)) | None => {}
                    Some(JavaValue::Ref(Some(reference))) => {
                        let class = vm
                            .heap
                            .get(reference)
                            .map(|object| object.class)
                            .ok_or(VmFault::InvalidObjRef(reference))?;
                        if !is_assignable(vm, class, target) {
                            let msg = format!(
                                "class {} cannot be cast to class {}",
                                vm.class_names.tpath(class),
                                vm.class_names.tpath(target)
                            );
                            throw!(vm, thread, ExceptionKind::ClassCastException, msg);
                        }
                    }
                    Some(_) => throw!(
                        vm,
                        thread,
                        ExceptionKind::InternalError,
                        "checkcast on a non-reference"
                    ),
                }
                advance!(thread, 3);
            }
            op::INSTANCEOF => {
                let index = u16_at(code, pc, 1)?;
                let target_bytes = cp_try!(vm, thread, method.cp.classname_of(index)).to_vec();
                let target = vm.class_names.intern(&target_bytes);
                let value = pop!(vm, thread);
                let result = match value {
                    JavaValue::Ref(Some(reference)) => {
                        let class = vm
                            .heap
                            .get(reference)
                            .map(|object| object.class)
                            .ok_or(VmFault::InvalidObjRef(reference))?;
                        i64::from(is_assignable(vm, class, target))
                    }
                    _ => 0,
                };
                push!(vm, thread, JavaValue::Int(result));
                advance!(thread, 3);
            }

            // === monitors ===
            op::MONITORENTER => {
                let target = pop_nonnull!(vm, thread, "monitorenter");
                vm.monitors.enter(target, thread.id);
                advance!(thread, 1);
            }
            op::MONITOREXIT => {
                let target = pop_nonnull!(vm, thread, "monitorexit");
                if vm.monitors.exit(target, thread.id).is_err() {
                    throw!(
                        vm,
                        thread,
                        ExceptionKind::IllegalMonitorStateException,
                        "monitorexit without ownership"
                    );
                }
                advance!(thread, 1);
            }

            op::WIDE => {
                frame!(thread).wide = true;
                advance!(thread, 1);
            }

            _ => return Err(VmFault::InvalidOpcode { opcode, pc }),
        }
    }
}

#[cfg(test)]
mod tests {
    use cascara_base::method::ACC_SYNCHRONIZED;
    use cascara_base::op;

    use crate::exceptions;
    use crate::gfunction::{arg_int, arg_obj, GCtx, GErrBlk, GMeth, GValue};
    use crate::instantiate;
    use crate::object::Object;
    use crate::testutil::{call_static, call_virtual, test_vm, CallOutcome, MethodBuilder};
    use crate::value::JavaValue;

    fn int_result(outcome: CallOutcome) -> i64 {
        match outcome {
            CallOutcome::Returned(Some(value)) => value.as_int().expect("int result"),
            other => panic!("expected an int result, got {:?}", other),
        }
    }

    #[test]
    fn bytecode_arithmetic_returns_difference() {
        // bipush 5; bipush 3; isub; ireturn
        let mut vm = test_vm();
        MethodBuilder::static_method("Calc", "sub", "()I")
            .code(&[op::BIPUSH, 5, op::BIPUSH, 3, op::ISUB, op::IRETURN])
            .register(&mut vm);

        let outcome = call_static(&mut vm, "Calc", "sub", "()I", &[]).unwrap();
        assert_eq!(int_result(outcome), 2);
    }

    #[test]
    fn locals_and_iinc() {
        // Instance method: receiver in local 0, argument in local 1.
        // iload_1; iinc 1 27; iload_1; iadd; ireturn
        let mut vm = test_vm();
        MethodBuilder::new("Calc", "inc", "(I)I")
            .code(&[
                op::ILOAD_1,
                op::IINC,
                1,
                27,
                op::ILOAD_1,
                op::IADD,
                op::IRETURN,
            ])
            .register(&mut vm);

        let calc_class = vm.class_names.intern(b"Calc");
        let receiver = vm.heap.alloc(Object::new(calc_class));
        let outcome = call_virtual(
            &mut vm,
            "Calc",
            "inc",
            "(I)I",
            &[JavaValue::Ref(Some(receiver)), JavaValue::Int(10)],
        )
        .unwrap();
        assert_eq!(int_result(outcome), 47);
    }

    #[test]
    fn long_arithmetic_round_trips_two_slots() {
        let mut vm = test_vm();
        MethodBuilder::static_method("Calc", "bump", "(J)J")
            .code(&[op::LLOAD_0, op::LCONST_1, op::LADD, op::LRETURN])
            .register(&mut vm);

        let outcome = call_static(&mut vm, "Calc", "bump", "(J)J", &[JavaValue::Long(41)]).unwrap();
        assert_eq!(
            outcome,
            CallOutcome::Returned(Some(JavaValue::Long(42)))
        );
    }

    #[test]
    fn caught_division_by_zero_resumes_in_handler() {
        // try { 10 / 0 } catch (Throwable t) { return 9; }
        let mut vm = test_vm();
        let mut builder = MethodBuilder::static_method("Try", "div", "()I").code(&[
            op::BIPUSH,
            10,
            op::ICONST_0,
            op::IDIV,
            op::IRETURN,
            op::POP,
            op::BIPUSH,
            9,
            op::IRETURN,
        ]);
        let throwable = builder.cp().push_class("java/lang/Throwable");
        builder.catch(0, 4, 5, throwable).register(&mut vm);

        let outcome = call_static(&mut vm, "Try", "div", "()I", &[]).unwrap();
        assert_eq!(int_result(outcome), 9);
    }

    #[test]
    fn uncaught_exception_across_two_frames() {
        // A calls B; B raises NullPointerException; neither has a handler
        let mut vm = test_vm();
        MethodBuilder::static_method("B", "boom", "()V")
            .code(&[op::ACONST_NULL, op::ATHROW])
            .register(&mut vm);
        let mut builder = MethodBuilder::static_method("A", "go", "()V");
        let target = builder.cp().push_method_ref("B", "boom", "()V");
        let [hi, lo] = target.to_be_bytes();
        builder
            .code(&[op::INVOKESTATIC, hi, lo, op::RETURN])
            .register(&mut vm);

        let outcome = call_static(&mut vm, "A", "go", "()V", &[]).unwrap();
        assert_eq!(outcome, CallOutcome::Uncaught);
    }

    fn probe_monitor_held(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
        let target = match arg_obj(args, 0) {
            Ok(reference) => reference,
            Err(block) => return GValue::Err(block),
        };
        GValue::Value(JavaValue::Int(i64::from(ctx.vm.monitors.is_held(target))))
    }

    #[test]
    fn synchronized_method_holds_and_releases_monitor() {
        let mut vm = test_vm();
        vm.mtable.load_host_library([(
            "Probe.held(Ljava/lang/Object;)Z",
            GMeth {
                param_slots: 1,
                needs_frames: false,
                func: probe_monitor_held,
            },
        )]);

        // synchronized int m() { return Probe.held(this); }
        let mut builder =
            MethodBuilder::new("Sync", "m", "()I").flags(ACC_SYNCHRONIZED);
        let target = builder
            .cp()
            .push_method_ref("Probe", "held", "(Ljava/lang/Object;)Z");
        let [hi, lo] = target.to_be_bytes();
        builder
            .code(&[op::ALOAD_0, op::INVOKESTATIC, hi, lo, op::IRETURN])
            .register(&mut vm);

        let sync_class = vm.class_names.intern(b"Sync");
        let receiver = vm.heap.alloc(Object::new(sync_class));
        let outcome = call_virtual(
            &mut vm,
            "Sync",
            "m",
            "()I",
            &[JavaValue::Ref(Some(receiver))],
        )
        .unwrap();

        // Held inside the body, released after return
        assert_eq!(int_result(outcome), 1);
        assert!(!vm.monitors.is_held(receiver));
    }

    #[test]
    fn synchronized_monitor_released_on_unwind() {
        // synchronized void m() { B.boom(); } with boom throwing uncaught
        let mut vm = test_vm();
        MethodBuilder::static_method("B", "boom", "()V")
            .code(&[op::ICONST_0, op::ICONST_0, op::IDIV, op::POP, op::RETURN])
            .register(&mut vm);
        let mut builder =
            MethodBuilder::new("Sync", "m", "()V").flags(ACC_SYNCHRONIZED);
        let target = builder.cp().push_method_ref("B", "boom", "()V");
        let [hi, lo] = target.to_be_bytes();
        builder
            .code(&[op::INVOKESTATIC, hi, lo, op::RETURN])
            .register(&mut vm);

        let sync_class = vm.class_names.intern(b"Sync");
        let receiver = vm.heap.alloc(Object::new(sync_class));
        let outcome = call_virtual(
            &mut vm,
            "Sync",
            "m",
            "()V",
            &[JavaValue::Ref(Some(receiver))],
        )
        .unwrap();

        assert_eq!(outcome, CallOutcome::Uncaught);
        assert!(!vm.monitors.is_held(receiver));
    }

    fn host_double_or_reject(_ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
        let value = match arg_int(args, 0) {
            Ok(value) => value,
            Err(block) => return GValue::Err(block),
        };
        if value == -1 {
            return GValue::Err(GErrBlk::new(
                exceptions::ExceptionKind::IllegalArgumentException,
                "bad",
            ));
        }
        GValue::Value(JavaValue::Int(value * 2))
    }

    #[test]
    fn host_error_block_behaves_like_a_throw() {
        let mut vm = test_vm();
        vm.mtable.load_host_library([(
            "X.y(I)I",
            GMeth {
                param_slots: 1,
                needs_frames: false,
                func: host_double_or_reject,
            },
        )]);

        // int call(int v) { try { return X.y(v); } catch (IllegalArgumentException e) { caught = e; return 1; } }
        let mut builder = MethodBuilder::static_method("C", "call", "(I)I");
        let target = builder.cp().push_method_ref("X", "y", "(I)I");
        let [t_hi, t_lo] = target.to_be_bytes();
        let caught_field = builder.cp().push_field_ref("C", "caught", "Ljava/lang/Object;");
        let [f_hi, f_lo] = caught_field.to_be_bytes();
        let iae = builder.cp().push_class("java/lang/IllegalArgumentException");
        builder
            .code(&[
                op::ILOAD_0,
                op::INVOKESTATIC,
                t_hi,
                t_lo,
                op::IRETURN,
                op::PUTSTATIC,
                f_hi,
                f_lo,
                op::BIPUSH,
                1,
                op::IRETURN,
            ])
            .catch(0, 5, 5, iae)
            .register(&mut vm);

        // The success path pushes the host result
        let ok = call_static(&mut vm, "C", "call", "(I)I", &[JavaValue::Int(3)]).unwrap();
        assert_eq!(int_result(ok), 6);

        // The error block transfers control to the catch clause
        let caught = call_static(&mut vm, "C", "call", "(I)I", &[JavaValue::Int(-1)]).unwrap();
        assert_eq!(int_result(caught), 1);

        let stored = vm.statics.get("C.caught").expect("handler stored exception");
        let JavaValue::Ref(Some(exception)) = stored.value else {
            panic!("caught field should hold the exception object");
        };
        let class = vm.heap.get(exception).unwrap().class;
        assert_eq!(
            vm.class_names.tpath(class),
            "java/lang/IllegalArgumentException"
        );
        assert_eq!(
            exceptions::message_of(&vm, exception).as_deref(),
            Some("bad")
        );
    }

    #[test]
    fn deepest_frame_handler_wins() {
        let mut vm = test_vm();
        // inner: try { 0/0 } catch (any) { return 2; }
        MethodBuilder::static_method("Deep", "inner", "()I")
            .code(&[
                op::ICONST_0,
                op::ICONST_0,
                op::IDIV,
                op::IRETURN,
                op::POP,
                op::ICONST_2,
                op::IRETURN,
            ])
            .catch(0, 4, 4, 0)
            .register(&mut vm);
        // outer: try { return inner(); } catch (any) { return 1; }
        let mut builder = MethodBuilder::static_method("Deep", "outer", "()I");
        let target = builder.cp().push_method_ref("Deep", "inner", "()I");
        let [hi, lo] = target.to_be_bytes();
        builder
            .code(&[
                op::INVOKESTATIC,
                hi,
                lo,
                op::IRETURN,
                op::POP,
                op::ICONST_1,
                op::IRETURN,
            ])
            .catch(0, 4, 4, 0)
            .register(&mut vm);

        let outcome = call_static(&mut vm, "Deep", "outer", "()I", &[]).unwrap();
        assert_eq!(int_result(outcome), 2);
    }

    #[test]
    fn first_matching_table_entry_wins() {
        let mut vm = test_vm();
        let mut builder = MethodBuilder::static_method("Tie", "m", "()I").code(&[
            op::ICONST_0,
            op::ICONST_0,
            op::IDIV,
            op::IRETURN,
            op::POP,
            op::BIPUSH,
            7,
            op::IRETURN,
            op::POP,
            op::BIPUSH,
            8,
            op::IRETURN,
        ]);
        let throwable = builder.cp().push_class("java/lang/Throwable");
        builder
            .catch(0, 3, 4, throwable)
            .catch(0, 3, 8, throwable)
            .register(&mut vm);

        let outcome = call_static(&mut vm, "Tie", "m", "()I", &[]).unwrap();
        assert_eq!(int_result(outcome), 7);
    }

    #[test]
    fn exception_table_bounds_are_half_open() {
        let mut vm = test_vm();
        // Fault at pc 5 with range [5, 10): caught
        MethodBuilder::static_method("Rng", "atStart", "()I")
            .code(&[
                op::ICONST_0,
                op::ICONST_0,
                op::GOTO,
                0,
                3,
                op::IDIV,
                op::IRETURN,
                op::NOP,
                op::NOP,
                op::NOP,
                op::NOP,
                op::POP,
                op::BIPUSH,
                7,
                op::IRETURN,
            ])
            .catch(5, 10, 11, 0)
            .register(&mut vm);
        let outcome = call_static(&mut vm, "Rng", "atStart", "()I", &[]).unwrap();
        assert_eq!(int_result(outcome), 7);

        // Fault at pc 10 with range [5, 10): not caught
        MethodBuilder::static_method("Rng", "atEnd", "()I")
            .code(&[
                op::ICONST_0,
                op::ICONST_0,
                op::GOTO,
                0,
                8,
                op::NOP,
                op::NOP,
                op::NOP,
                op::NOP,
                op::NOP,
                op::IDIV,
                op::IRETURN,
                op::POP,
                op::BIPUSH,
                7,
                op::IRETURN,
            ])
            .catch(5, 10, 12, 0)
            .register(&mut vm);
        let outcome = call_static(&mut vm, "Rng", "atEnd", "()I", &[]).unwrap();
        assert_eq!(outcome, CallOutcome::Uncaught);
    }

    #[test]
    fn array_bounds_are_checked() {
        let mut vm = test_vm();
        // int get(int i) { int[] a = new int[3]; a[1] = 42; return a[i]; }
        let mut builder = MethodBuilder::static_method("Arr", "get", "(I)I");
        let caught_field = builder
            .cp()
            .push_field_ref("Arr", "caught", "Ljava/lang/Object;");
        let [f_hi, f_lo] = caught_field.to_be_bytes();
        builder
            .code(&[
                op::BIPUSH,
                3,
                op::NEWARRAY,
                10,
                op::ASTORE_1,
                op::ALOAD_1,
                op::ICONST_1,
                op::BIPUSH,
                42,
                op::IASTORE,
                op::ALOAD_1,
                op::ILOAD_0,
                op::IALOAD,
                op::IRETURN,
                op::PUTSTATIC,
                f_hi,
                f_lo,
                op::BIPUSH,
                99,
                op::IRETURN,
            ])
            .catch(0, 14, 14, 0)
            .register(&mut vm);

        // In-range accesses succeed
        let hit = call_static(&mut vm, "Arr", "get", "(I)I", &[JavaValue::Int(1)]).unwrap();
        assert_eq!(int_result(hit), 42);
        let zero = call_static(&mut vm, "Arr", "get", "(I)I", &[JavaValue::Int(0)]).unwrap();
        assert_eq!(int_result(zero), 0);

        // Out-of-range accesses raise ArrayIndexOutOfBoundsException
        for bad in [-1, 3] {
            let outcome =
                call_static(&mut vm, "Arr", "get", "(I)I", &[JavaValue::Int(bad)]).unwrap();
            assert_eq!(int_result(outcome), 99);
            let stored = vm.statics.get("Arr.caught").unwrap();
            let JavaValue::Ref(Some(exception)) = stored.value else {
                panic!("handler should capture the exception");
            };
            let class = vm.heap.get(exception).unwrap().class;
            assert_eq!(
                vm.class_names.tpath(class),
                "java/lang/ArrayIndexOutOfBoundsException"
            );
        }
    }

    #[test]
    fn float_division_by_zero_does_not_throw() {
        let mut vm = test_vm();
        MethodBuilder::static_method("F", "div", "(DD)D")
            .code(&[op::DLOAD_0, op::DLOAD_2, op::DDIV, op::DRETURN])
            .register(&mut vm);

        let outcome = call_static(
            &mut vm,
            "F",
            "div",
            "(DD)D",
            &[JavaValue::Double(1.0), JavaValue::Double(0.0)],
        )
        .unwrap();
        let CallOutcome::Returned(Some(JavaValue::Double(result))) = outcome else {
            panic!("expected a double, got {:?}", outcome);
        };
        assert!(result.is_infinite() && result.is_sign_positive());

        let outcome = call_static(
            &mut vm,
            "F",
            "div",
            "(DD)D",
            &[JavaValue::Double(0.0), JavaValue::Double(0.0)],
        )
        .unwrap();
        let CallOutcome::Returned(Some(JavaValue::Double(result))) = outcome else {
            panic!("expected a double, got {:?}", outcome);
        };
        assert!(result.is_nan());
    }

    #[test]
    fn tableswitch_selects_and_defaults() {
        let mut vm = test_vm();
        let mut code = vec![op::ILOAD_0, op::TABLESWITCH, 0, 0];
        let push_i32 = |code: &mut Vec<u8>, v: i32| code.extend_from_slice(&v.to_be_bytes());
        push_i32(&mut code, 29); // default -> pc 30
        push_i32(&mut code, 0); // low
        push_i32(&mut code, 1); // high
        push_i32(&mut code, 23); // case 0 -> pc 24
        push_i32(&mut code, 26); // case 1 -> pc 27
        assert_eq!(code.len(), 24);
        code.extend_from_slice(&[op::BIPUSH, 10, op::IRETURN]); // pc 24
        code.extend_from_slice(&[op::BIPUSH, 20, op::IRETURN]); // pc 27
        code.extend_from_slice(&[op::BIPUSH, 30, op::IRETURN]); // pc 30
        MethodBuilder::static_method("Sw", "pick", "(I)I")
            .code(&code)
            .register(&mut vm);

        for (input, expected) in [(0, 10), (1, 20), (5, 30), (-3, 30)] {
            let outcome =
                call_static(&mut vm, "Sw", "pick", "(I)I", &[JavaValue::Int(input)]).unwrap();
            assert_eq!(int_result(outcome), expected, "pick({})", input);
        }
    }

    #[test]
    fn instanceof_and_checkcast() {
        let mut vm = test_vm();
        let mut builder = MethodBuilder::static_method("Cast", "isNpe", "(Ljava/lang/Object;)I");
        let npe = builder.cp().push_class("java/lang/NullPointerException");
        let [hi, lo] = npe.to_be_bytes();
        builder
            .code(&[op::ALOAD_0, op::INSTANCEOF, hi, lo, op::IRETURN])
            .register(&mut vm);

        let npe_class = vm.class_names.intern(b"java/lang/NullPointerException");
        let npe_obj = instantiate::instantiate_class(&mut vm.heap, &vm.classes, npe_class);
        let plain = vm.heap.alloc(Object::new(vm.class_names.object_id()));

        let yes = call_static(
            &mut vm,
            "Cast",
            "isNpe",
            "(Ljava/lang/Object;)I",
            &[JavaValue::Ref(Some(npe_obj))],
        )
        .unwrap();
        assert_eq!(int_result(yes), 1);

        let no = call_static(
            &mut vm,
            "Cast",
            "isNpe",
            "(Ljava/lang/Object;)I",
            &[JavaValue::Ref(Some(plain))],
        )
        .unwrap();
        assert_eq!(int_result(no), 0);

        let null = call_static(
            &mut vm,
            "Cast",
            "isNpe",
            "(Ljava/lang/Object;)I",
            &[JavaValue::NULL],
        )
        .unwrap();
        assert_eq!(int_result(null), 0);
    }

    #[test]
    fn getfield_and_putfield_traverse_the_field_table() {
        let mut vm = test_vm();
        let mut builder = MethodBuilder::new("Point", "bumpX", "(I)I");
        let x_field = builder.cp().push_field_ref("Point", "x", "I");
        let [hi, lo] = x_field.to_be_bytes();
        // this.x = this.x + delta; return this.x;
        builder
            .code(&[
                op::ALOAD_0,
                op::ALOAD_0,
                op::GETFIELD,
                hi,
                lo,
                op::ILOAD_1,
                op::IADD,
                op::PUTFIELD,
                hi,
                lo,
                op::ALOAD_0,
                op::GETFIELD,
                hi,
                lo,
                op::IRETURN,
            ])
            .register(&mut vm);

        let point_class = vm.class_names.intern(b"Point");
        let mut point = Object::new(point_class);
        point.set_field(
            "x",
            "I",
            crate::object::FieldValue::Value(JavaValue::Int(7)),
        );
        let receiver = vm.heap.alloc(point);

        let outcome = call_virtual(
            &mut vm,
            "Point",
            "bumpX",
            "(I)I",
            &[JavaValue::Ref(Some(receiver)), JavaValue::Int(5)],
        )
        .unwrap();
        assert_eq!(int_result(outcome), 12);
    }
}
