use std::sync::Arc;

use cascara_base::constant_pool::ConstantPool;
use cascara_base::method::{CodeInfo, ACC_PUBLIC, ACC_STATIC};
use cascara_base::op;

use cascara::{run, StateConfig, Vm};

mod formatter;

fn main() {
    let mut conf = StateConfig::new();
    let mut class_name = String::from("HelloWorld");
    let mut trace = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "-trace" => trace = true,
            "-strictJDK" => conf.strict_jdk = true,
            other => class_name = other.to_owned(),
        }
    }

    let t_subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(conf.tracing_level)
        .without_time()
        .event_format(formatter::Formatter)
        .finish();
    tracing::subscriber::set_global_default(t_subscriber)
        .expect("failed to set global default tracing subscriber");

    tracing::info!("Cascara initializing");

    let mut vm = Vm::new(conf);
    vm.bootstrap();
    install_demo_class(&mut vm);

    let status = run::start_exec(&mut vm, &class_name, trace);
    std::process::exit(status.code());
}

/// The built-in entry point image. The classpath walker is an external
/// collaborator; until one is wired in, this stands in for it the same way
/// the pinned HelloWorld entry point does in early frontends.
fn install_demo_class(vm: &mut Vm) {
    let mut cp = ConstantPool::new();
    let out_field = cp.push_field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let greeting = cp.push_string("Hello from Cascara");
    let println_str =
        cp.push_method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V");
    let println_int = cp.push_method_ref("java/io/PrintStream", "println", "(I)V");

    let [out_hi, out_lo] = out_field.to_be_bytes();
    let [ps_hi, ps_lo] = println_str.to_be_bytes();
    let [pi_hi, pi_lo] = println_int.to_be_bytes();

    // System.out.println("Hello from Cascara");
    // System.out.println(5 - 3);
    let code = vec![
        op::GETSTATIC,
        out_hi,
        out_lo,
        op::LDC,
        greeting as u8,
        op::INVOKEVIRTUAL,
        ps_hi,
        ps_lo,
        op::GETSTATIC,
        out_hi,
        out_lo,
        op::BIPUSH,
        5,
        op::BIPUSH,
        3,
        op::ISUB,
        op::INVOKEVIRTUAL,
        pi_hi,
        pi_lo,
        op::RETURN,
    ];

    let code_info = CodeInfo {
        max_stack: 4,
        max_locals: 1,
        code,
        exception_table: Vec::new(),
        line_numbers: Vec::new(),
    };
    vm.mtable
        .insert_bytecode(
            "HelloWorld",
            "main",
            run::MAIN_DESC,
            ACC_PUBLIC | ACC_STATIC,
            code_info,
            Arc::new(cp),
        )
        .expect("demo descriptor parses");
}
