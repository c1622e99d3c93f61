//! Test scaffolding: assemble in-memory methods with real constant pools and
//! run them through the actual interpreter and exception engine.

use std::sync::Arc;

use cascara_base::constant_pool::ConstantPool;
use cascara_base::method::{CodeInfo, ExceptionTableEntry, ACC_STATIC};
use cascara_base::op;

use crate::frame::Frame;
use crate::interp::{self, RunOutcome};
use crate::mtable::BMethod;
use crate::value::JavaValue;
use crate::{StateConfig, Vm, VmFault};

pub(crate) const HARNESS_CLASS: &str = "TestHarness";
const RESULT_KEY: &str = "TestHarness.result";
/// Sentinel meaning "no result was stored this run".
const UNSET: JavaValue = JavaValue::RetAddr(u32::MAX);

pub(crate) fn test_vm() -> Vm {
    let mut conf = StateConfig::new();
    conf.test_mode = true;
    let mut vm = Vm::new(conf);
    vm.bootstrap();
    vm
}

/// Register a class with the given superclass (default `java/lang/Object`).
pub(crate) fn register_class(vm: &mut Vm, name: &str, super_name: Option<&str>) {
    let id = vm.class_names.intern_str(name);
    let super_id = vm
        .class_names
        .intern_str(super_name.unwrap_or("java/lang/Object"));
    vm.classes.register(id, Some(super_id), None, Vec::new());
}

/// Builder for a bytecode method registered straight into the method table.
pub(crate) struct MethodBuilder {
    class_name: String,
    name: String,
    desc: String,
    access_flags: u16,
    max_stack: u16,
    max_locals: u16,
    code: Vec<u8>,
    exception_table: Vec<ExceptionTableEntry>,
    cp: ConstantPool,
}
impl MethodBuilder {
    pub(crate) fn new(class_name: &str, name: &str, desc: &str) -> MethodBuilder {
        MethodBuilder {
            class_name: class_name.to_owned(),
            name: name.to_owned(),
            desc: desc.to_owned(),
            access_flags: 0,
            max_stack: 8,
            max_locals: 8,
            code: Vec::new(),
            exception_table: Vec::new(),
            cp: ConstantPool::new(),
        }
    }

    pub(crate) fn static_method(class_name: &str, name: &str, desc: &str) -> MethodBuilder {
        let mut builder = MethodBuilder::new(class_name, name, desc);
        builder.access_flags |= ACC_STATIC;
        builder
    }

    pub(crate) fn flags(mut self, access_flags: u16) -> MethodBuilder {
        self.access_flags |= access_flags;
        self
    }

    pub(crate) fn code(mut self, code: &[u8]) -> MethodBuilder {
        self.code = code.to_vec();
        self
    }

    pub(crate) fn max_stack(mut self, max_stack: u16) -> MethodBuilder {
        self.max_stack = max_stack;
        self
    }

    pub(crate) fn max_locals(mut self, max_locals: u16) -> MethodBuilder {
        self.max_locals = max_locals;
        self
    }

    pub(crate) fn catch(
        mut self,
        start_pc: u16,
        end_pc: u16,
        handler_pc: u16,
        catch_type: u16,
    ) -> MethodBuilder {
        self.exception_table.push(ExceptionTableEntry {
            start_pc,
            end_pc,
            handler_pc,
            catch_type,
        });
        self
    }

    /// Access the builder's constant pool, for composing refs the code needs.
    pub(crate) fn cp(&mut self) -> &mut ConstantPool {
        &mut self.cp
    }

    pub(crate) fn register(self, vm: &mut Vm) -> Arc<BMethod> {
        // Virtual dispatch walks the registry; make sure the class is known
        let class_id = vm.class_names.intern_str(&self.class_name);
        if vm.classes.get(class_id).is_none() {
            vm.classes
                .register(class_id, Some(vm.class_names.object_id()), None, Vec::new());
        }

        let code = CodeInfo {
            max_stack: self.max_stack,
            max_locals: self.max_locals,
            code: self.code,
            exception_table: self.exception_table,
            line_numbers: Vec::new(),
        };
        vm.mtable
            .insert_bytecode(
                &self.class_name,
                &self.name,
                &self.desc,
                self.access_flags,
                code,
                Arc::new(self.cp),
            )
            .expect("test method descriptor must parse")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum CallOutcome {
    Returned(Option<JavaValue>),
    Uncaught,
}

/// Invoke a registered static method through a synthetic harness frame whose
/// bytecode performs the call and stores any result into
/// `TestHarness.result`. Arguments are pre-pushed onto the harness operand
/// stack, category-2 values in their two slots.
pub(crate) fn call_static(
    vm: &mut Vm,
    class_name: &str,
    name: &str,
    desc: &str,
    args: &[JavaValue],
) -> Result<CallOutcome, VmFault> {
    call(vm, op::INVOKESTATIC, class_name, name, desc, args)
}

/// Invoke an instance method; `args[0]` is the receiver.
pub(crate) fn call_virtual(
    vm: &mut Vm,
    class_name: &str,
    name: &str,
    desc: &str,
    args: &[JavaValue],
) -> Result<CallOutcome, VmFault> {
    call(vm, op::INVOKEVIRTUAL, class_name, name, desc, args)
}

fn call(
    vm: &mut Vm,
    invoke_op: u8,
    class_name: &str,
    name: &str,
    desc: &str,
    args: &[JavaValue],
) -> Result<CallOutcome, VmFault> {
    let mut cp = ConstantPool::new();
    let method_index = cp.push_method_ref(class_name, name, desc);

    let ret_desc = &desc[desc.find(')').map_or(desc.len() - 1, |i| i + 1)..];
    let result_index = if ret_desc == "V" {
        None
    } else {
        Some(cp.push_field_ref(HARNESS_CLASS, "result", ret_desc))
    };

    let mut code = vec![invoke_op];
    code.extend_from_slice(&method_index.to_be_bytes());
    if invoke_op == op::INVOKEINTERFACE {
        code.extend_from_slice(&[1, 0]);
    }
    if let Some(result_index) = result_index {
        code.push(op::PUTSTATIC);
        code.extend_from_slice(&result_index.to_be_bytes());
    }
    code.push(op::RETURN);

    let harness = Arc::new(BMethod {
        class_name: HARNESS_CLASS.to_owned(),
        name: "run".to_owned(),
        desc: "()V".to_owned(),
        access_flags: ACC_STATIC,
        code: CodeInfo {
            max_stack: 16,
            max_locals: 0,
            code,
            exception_table: Vec::new(),
            line_numbers: Vec::new(),
        },
        descriptor: cascara_base::descriptor::MethodDescriptor::parse("()V").unwrap(),
        cp: Arc::new(cp),
    });

    vm.statics
        .set(HARNESS_CLASS, "result", "Ljava/lang/Object;", UNSET);

    let mut thread = vm.threads.create(false, 64);
    let harness_class = vm.class_names.intern_str(HARNESS_CLASS);
    let mut frame = Frame::new_bytecode(harness_class, harness, thread.id);
    for arg in args {
        if arg.is_category2() {
            frame.push_wide(*arg).expect("harness stack too small");
        } else {
            frame.push(*arg).expect("harness stack too small");
        }
    }
    thread
        .frames
        .push(frame)
        .expect("fresh thread cannot be at depth limit");

    let outcome = interp::run_thread(vm, &mut thread)?;
    vm.threads.remove(thread.id);

    Ok(match outcome {
        RunOutcome::Completed => {
            let value = vm
                .statics
                .get(RESULT_KEY)
                .map(|entry| entry.value)
                .filter(|value| *value != UNSET);
            CallOutcome::Returned(value)
        }
        RunOutcome::Uncaught => CallOutcome::Uncaught,
    })
}
