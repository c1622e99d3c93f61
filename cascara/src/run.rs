//! Execution bootstrap: resolve the entry point, push the `main` frame on a
//! fresh thread, run the interpreter, and map the outcome to an exit code.

use std::sync::Arc;

use crate::exceptions::{self, ExceptionKind};
use crate::frame::Frame;
use crate::interp::{self, RunOutcome};
use crate::mtable::{MTEntry, MethodTable};
use crate::value::JavaValue;
use crate::{ExitStatus, Vm};

pub const MAIN_DESC: &str = "([Ljava/lang/String;)V";

/// Run `class_name.main` to completion. The method table must already hold
/// the entry point (classes are loaded by an external collaborator).
pub fn start_exec(vm: &mut Vm, class_name: &str, trace: bool) -> ExitStatus {
    let key = MethodTable::method_key(class_name, "main", MAIN_DESC);
    let main_method = match vm.mtable.lookup(&key) {
        Some(MTEntry::Bytecode(method)) => Arc::clone(method),
        _ => {
            // No frame exists yet; this takes the short abort path
            return exceptions::minimal_abort(
                &vm.conf,
                ExceptionKind::ClassNotFoundException,
                &format!("Class not found: {}.main()", class_name),
            );
        }
    };

    let trace = trace || vm.conf.trace_instructions;
    let mut thread = vm.threads.create(trace, vm.conf.max_frame_depth);
    let main_class = vm.class_names.intern_str(class_name);
    let mut frame = Frame::new_bytecode(main_class, main_method, thread.id);
    // main(String[] args): no CLI surface is wired, args arrive null
    if !frame.locals.is_empty() {
        frame.locals[0] = JavaValue::NULL;
    }
    if thread.frames.push(frame).is_err() {
        vm.threads.remove(thread.id);
        return ExitStatus::JvmInternal;
    }

    let outcome = interp::run_thread(vm, &mut thread);
    vm.threads.remove(thread.id);

    match outcome {
        Ok(RunOutcome::Completed) => ExitStatus::Ok,
        Ok(RunOutcome::Uncaught) => ExitStatus::JvmException,
        Err(fault) => {
            if vm.conf.test_mode {
                tracing::error!("VM internal fault: {}", fault);
            } else {
                eprintln!("VM internal fault: {}", fault);
            }
            ExitStatus::JvmInternal
        }
    }
}

#[cfg(test)]
mod tests {
    use cascara_base::op;

    use super::start_exec;
    use crate::testutil::{test_vm, MethodBuilder};
    use crate::ExitStatus;

    #[test]
    fn normal_termination() {
        let mut vm = test_vm();
        MethodBuilder::static_method("Main", "main", super::MAIN_DESC)
            .code(&[op::ICONST_2, op::ICONST_3, op::IADD, op::POP, op::RETURN])
            .register(&mut vm);
        assert_eq!(start_exec(&mut vm, "Main", false), ExitStatus::Ok);
    }

    #[test]
    fn uncaught_exception_exit_code() {
        let mut vm = test_vm();
        MethodBuilder::static_method("Main", "main", super::MAIN_DESC)
            .code(&[op::ICONST_1, op::ICONST_0, op::IDIV, op::POP, op::RETURN])
            .register(&mut vm);
        assert_eq!(start_exec(&mut vm, "Main", false), ExitStatus::JvmException);
    }

    #[test]
    fn missing_entry_point_aborts() {
        let mut vm = test_vm();
        assert_eq!(
            start_exec(&mut vm, "NoSuchClass", false),
            ExitStatus::AppException
        );
    }
}
