#![warn(clippy::pedantic)]
// The interpreter is one large dispatch and the shim bodies are many small
// functions; these lints highlight entire functions and drown everything else.
#![allow(clippy::too_many_lines)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
// Too error prone
#![allow(clippy::similar_names)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_precision_loss)]

use std::sync::{Arc, Mutex};

use cascara_base::constant_pool::CpError;
use cascara_base::descriptor::DescriptorError;
use cascara_base::names::ClassNames;
use cascara_base::BadIdError;

use classes::ClassRegistry;
use frame::StackError;
use heap::{Heap, ObjRef};
use monitor::Monitors;
use mtable::MethodTable;
use statics::Statics;
use thread::ThreadTable;

pub mod classes;
pub mod exceptions;
pub mod frame;
pub mod gfunction;
pub mod heap;
pub mod instantiate;
pub mod interp;
pub mod monitor;
pub mod mtable;
pub mod object;
pub mod run;
pub mod statics;
pub mod thread;
pub mod value;

#[cfg(test)]
pub(crate) mod testutil;

pub const ENV_TRACING_LEVEL: &str = "CASCARA_LOG_LEVEL";
pub const DEFAULT_TRACING_LEVEL: tracing::Level = tracing::Level::WARN;

/// Default limit on frame stack depth; exceeding it throws
/// `StackOverflowError` at the invocation site.
pub const DEFAULT_MAX_FRAME_DEPTH: usize = 2048;

pub struct StateConfig {
    pub tracing_level: tracing::Level,
    /// Prefer user-facing dotted class names in diagnostics.
    pub strict_jdk: bool,
    /// Suppress process exit on termination paths; report through return
    /// values instead.
    pub test_mode: bool,
    /// Default per-opcode trace flag handed to new threads.
    pub trace_instructions: bool,
    /// String backing uses Java (signed) bytes instead of raw utf8.
    pub string_signed_bytes: bool,
    pub max_frame_depth: usize,
}
impl StateConfig {
    #[must_use]
    pub fn new() -> StateConfig {
        StateConfig {
            tracing_level: StateConfig::compute_tracing_level(),
            strict_jdk: false,
            test_mode: false,
            trace_instructions: false,
            string_signed_bytes: false,
            max_frame_depth: DEFAULT_MAX_FRAME_DEPTH,
        }
    }

    #[must_use]
    pub fn compute_tracing_level() -> tracing::Level {
        let env_log = std::env::var(ENV_TRACING_LEVEL);
        if let Ok(env_log) = env_log {
            if env_log.eq_ignore_ascii_case("trace") || env_log == "*" {
                tracing::Level::TRACE
            } else if env_log.eq_ignore_ascii_case("info") {
                tracing::Level::INFO
            } else if env_log.eq_ignore_ascii_case("warn") {
                tracing::Level::WARN
            } else if env_log.eq_ignore_ascii_case("error") {
                tracing::Level::ERROR
            } else {
                DEFAULT_TRACING_LEVEL
            }
        } else {
            DEFAULT_TRACING_LEVEL
        }
    }
}
impl Default for StateConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Ok,
    /// Pre-frame failures: classloader errors, main-class resolution
    AppException,
    /// An uncaught Java exception terminated the program
    JvmException,
    /// VM-internal fatal
    JvmInternal,
}
impl ExitStatus {
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Ok => 0,
            ExitStatus::AppException => 1,
            ExitStatus::JvmException => 2,
            ExitStatus::JvmInternal => 3,
        }
    }
}

/// VM-internal, unrecoverable faults: corrupt frame stack, malformed class
/// material that slipped past verification. Java code cannot catch these.
#[derive(Debug)]
pub enum VmFault {
    /// Popping or reading the top of an empty frame stack
    EmptyFrameStack,
    InvalidObjRef(ObjRef),
    InvalidOpcode { opcode: u8, pc: usize },
    /// An opcode's inline operands run past the end of the bytecode
    CodeTruncated { pc: usize },
    /// A branch target landed outside the method's bytecode
    BranchOutOfRange { pc: usize, target: i64 },
    MalformedDescriptor { desc: String, err: DescriptorError },
    /// An entry vanished between resolution and dispatch
    MissingMethod(String),
    /// Frame stack corruption detected through operand bookkeeping
    Frame(StackError),
}
impl std::fmt::Display for VmFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VmFault::EmptyFrameStack => write!(f, "frame stack empty"),
            VmFault::InvalidObjRef(reference) => write!(f, "invalid object ref {:?}", reference),
            VmFault::InvalidOpcode { opcode, pc } => {
                write!(f, "invalid bytecode {:#04x} at pc {}", opcode, pc)
            }
            VmFault::CodeTruncated { pc } => write!(f, "bytecode truncated at pc {}", pc),
            VmFault::BranchOutOfRange { pc, target } => {
                write!(f, "branch from pc {} to invalid target {}", pc, target)
            }
            VmFault::MalformedDescriptor { desc, err } => {
                write!(f, "malformed descriptor {}: {:?}", desc, err)
            }
            VmFault::MissingMethod(key) => write!(f, "method table entry vanished: {}", key),
            VmFault::Frame(err) => write!(f, "{}", err),
        }
    }
}
impl From<StackError> for VmFault {
    fn from(err: StackError) -> Self {
        VmFault::Frame(err)
    }
}

#[derive(Debug)]
pub enum GeneralError {
    Fault(VmFault),
    Cp(CpError),
    Descriptor(DescriptorError),
    BadId(BadIdError),
    /// The entry point could not be resolved
    MissingEntryPoint(String),
}
impl From<VmFault> for GeneralError {
    fn from(err: VmFault) -> Self {
        Self::Fault(err)
    }
}
impl From<CpError> for GeneralError {
    fn from(err: CpError) -> Self {
        Self::Cp(err)
    }
}
impl From<DescriptorError> for GeneralError {
    fn from(err: DescriptorError) -> Self {
        Self::Descriptor(err)
    }
}
impl From<BadIdError> for GeneralError {
    fn from(err: BadIdError) -> Self {
        Self::BadId(err)
    }
}

/// Process-wide VM state. The frame stacks live on the threads themselves;
/// everything here is shared.
pub struct Vm {
    pub conf: StateConfig,
    pub class_names: ClassNames,
    pub classes: ClassRegistry,
    pub heap: Heap,
    pub mtable: MethodTable,
    pub statics: Statics,
    pub monitors: Monitors,
    pub threads: ThreadTable,
    /// The dedicated mutex the atomic wrappers serialize on. Shared so a
    /// host body can hold the guard while it mutates the heap.
    pub atomic_guard: Arc<Mutex<()>>,
}
impl Vm {
    #[must_use]
    pub fn new(conf: StateConfig) -> Vm {
        Vm {
            conf,
            class_names: ClassNames::new(),
            classes: ClassRegistry::new(),
            heap: Heap::new(),
            mtable: MethodTable::new(),
            statics: Statics::new(),
            monitors: Monitors::new(),
            threads: ThreadTable::new(),
            atomic_guard: Arc::new(Mutex::new(())),
        }
    }

    /// The single-threaded startup phase: seed the class registry, the
    /// statics table, and the host-method table, and wire the standard
    /// streams.
    pub fn bootstrap(&mut self) {
        classes::register_core_classes(&mut self.classes, &self.class_names);
        statics::load_primitive_statics(&mut self.statics);
        gfunction::register_all(&mut self.mtable);

        let out = gfunction::print_stream::make_print_stream(&mut self.heap, &self.class_names, 1);
        let err = gfunction::print_stream::make_print_stream(&mut self.heap, &self.class_names, 2);
        self.statics.set(
            "java/lang/System",
            "out",
            "Ljava/io/PrintStream;",
            value::JavaValue::Ref(Some(out)),
        );
        self.statics.set(
            "java/lang/System",
            "err",
            "Ljava/io/PrintStream;",
            value::JavaValue::Ref(Some(err)),
        );

        tracing::info!(
            "bootstrap complete: {} host methods registered",
            self.mtable.len()
        );
    }
}
