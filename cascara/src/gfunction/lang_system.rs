//! `java/lang/System` host methods: the wall clock and the monotonic clock.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::gfunction::{clinit_generic, gmeth, trap_not_supported, GCtx, GLibrary, GValue};
use crate::value::JavaValue;

pub fn load_lang_system() -> GLibrary {
    vec![
        ("java/lang/System.<clinit>()V", gmeth(0, clinit_generic)),
        (
            "java/lang/System.currentTimeMillis()J",
            gmeth(0, system_current_time_millis),
        ),
        ("java/lang/System.nanoTime()J", gmeth(0, system_nano_time)),
        (
            "java/lang/System.getProperty(Ljava/lang/String;)Ljava/lang/String;",
            gmeth(1, trap_not_supported),
        ),
        ("java/lang/System.gc()V", gmeth(0, system_gc)),
    ]
}

pub(super) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

fn system_current_time_millis(_ctx: &mut GCtx<'_>, _args: &mut Vec<JavaValue>) -> GValue {
    GValue::Value(JavaValue::Long(now_millis()))
}

fn system_nano_time(_ctx: &mut GCtx<'_>, _args: &mut Vec<JavaValue>) -> GValue {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as i64)
        .unwrap_or(0);
    GValue::Value(JavaValue::Long(nanos))
}

/// Collection is the host's problem; the request is honored by doing nothing.
fn system_gc(_ctx: &mut GCtx<'_>, _args: &mut Vec<JavaValue>) -> GValue {
    GValue::Void
}
