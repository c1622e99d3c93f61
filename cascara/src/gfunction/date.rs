//! `java/util/Date` and `java/util/TimeZone` host methods. A Date wraps
//! epoch millis in its `value` field; formatting is done against UTC with
//! civil-calendar arithmetic on the host clock.

use cascara_base::types;

use crate::exceptions::ExceptionKind;
use crate::gfunction::{
    arg_int, arg_obj, arg_string, clinit_generic, gmeth, lang_system::now_millis, string_value,
    trap_not_supported, try_g, GCtx, GErrBlk, GLibrary, GValue,
};
use crate::heap::ObjRef;
use crate::object::{FieldValue, Object};
use crate::value::JavaValue;
use crate::Vm;

pub fn load_util_date() -> GLibrary {
    vec![
        ("java/util/Date.<clinit>()V", gmeth(0, clinit_generic)),
        ("java/util/Date.<init>()V", gmeth(0, date_init_now)),
        ("java/util/Date.<init>(J)V", gmeth(2, date_init_millis)),
        ("java/util/Date.getTime()J", gmeth(0, date_get_time)),
        ("java/util/Date.setTime(J)V", gmeth(2, date_set_time)),
        (
            "java/util/Date.before(Ljava/util/Date;)Z",
            gmeth(1, date_before),
        ),
        (
            "java/util/Date.after(Ljava/util/Date;)Z",
            gmeth(1, date_after),
        ),
        (
            "java/util/Date.toString()Ljava/lang/String;",
            gmeth(0, date_to_string),
        ),
        (
            "java/util/Date.clone()Ljava/lang/Object;",
            gmeth(0, date_clone),
        ),
    ]
}

pub fn load_util_time_zone() -> GLibrary {
    vec![
        ("java/util/TimeZone.<clinit>()V", gmeth(0, clinit_generic)),
        (
            "java/util/TimeZone.getDefault()Ljava/util/TimeZone;",
            gmeth(0, timezone_get_default),
        ),
        (
            "java/util/TimeZone.getTimeZone(Ljava/lang/String;)Ljava/util/TimeZone;",
            gmeth(1, timezone_get_time_zone),
        ),
        (
            "java/util/TimeZone.getID()Ljava/lang/String;",
            gmeth(0, timezone_get_id),
        ),
        (
            "java/util/TimeZone.setDefault(Ljava/util/TimeZone;)V",
            gmeth(1, trap_not_supported),
        ),
    ]
}

fn millis_of(vm: &Vm, date: ObjRef) -> Result<i64, GErrBlk> {
    match vm.heap.get(date).and_then(|object| object.value_field()) {
        Some(FieldValue::Value(JavaValue::Long(millis))) => Ok(*millis),
        _ => Err(GErrBlk::new(
            ExceptionKind::IllegalStateException,
            "Date has no time value",
        )),
    }
}

fn set_millis(ctx: &mut GCtx<'_>, date: ObjRef, millis: i64) {
    if let Some(object) = ctx.vm.heap.get_mut(date) {
        object.set_field(
            crate::object::VALUE_FIELD,
            types::LONG,
            FieldValue::Value(JavaValue::Long(millis)),
        );
    }
}

fn date_init_now(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let date = try_g!(arg_obj(args, 0));
    set_millis(ctx, date, now_millis());
    GValue::Void
}

fn date_init_millis(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let date = try_g!(arg_obj(args, 0));
    let millis = try_g!(arg_int(args, 1));
    set_millis(ctx, date, millis);
    GValue::Void
}

fn date_get_time(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let date = try_g!(arg_obj(args, 0));
    GValue::Value(JavaValue::Long(try_g!(millis_of(ctx.vm, date))))
}

fn date_set_time(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let date = try_g!(arg_obj(args, 0));
    let millis = try_g!(arg_int(args, 1));
    set_millis(ctx, date, millis);
    GValue::Void
}

fn date_before(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let date = try_g!(arg_obj(args, 0));
    let other = try_g!(arg_obj(args, 1));
    let result = try_g!(millis_of(ctx.vm, date)) < try_g!(millis_of(ctx.vm, other));
    GValue::Value(JavaValue::Int(i64::from(result)))
}

fn date_after(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let date = try_g!(arg_obj(args, 0));
    let other = try_g!(arg_obj(args, 1));
    let result = try_g!(millis_of(ctx.vm, date)) > try_g!(millis_of(ctx.vm, other));
    GValue::Value(JavaValue::Int(i64::from(result)))
}

fn date_to_string(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let date = try_g!(arg_obj(args, 0));
    let millis = try_g!(millis_of(ctx.vm, date));
    let text = format_utc(millis);
    let value = string_value(ctx, &text);
    GValue::Value(value)
}

fn date_clone(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let date = try_g!(arg_obj(args, 0));
    let millis = try_g!(millis_of(ctx.vm, date));
    let class = ctx.vm.class_names.intern(b"java/util/Date");
    let copy = ctx.vm.heap.alloc(Object::with_value(
        class,
        types::LONG,
        FieldValue::Value(JavaValue::Long(millis)),
    ));
    GValue::Value(JavaValue::Ref(Some(copy)))
}

const DAY_NAMES: [&str; 7] = ["Thu", "Fri", "Sat", "Sun", "Mon", "Tue", "Wed"];
const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Days-from-civil inverse (Hinnant's algorithm), enough to render
/// `EEE MMM dd HH:mm:ss UTC yyyy` without pulling a calendar crate in.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if m <= 2 { y + 1 } else { y };
    (year, m as u32, d as u32)
}

fn format_utc(millis: i64) -> String {
    let secs = millis.div_euclid(1000);
    let days = secs.div_euclid(86_400);
    let tod = secs.rem_euclid(86_400);
    let (year, month, day) = civil_from_days(days);
    // Day 0 (1970-01-01) was a Thursday
    let weekday = DAY_NAMES[days.rem_euclid(7) as usize];
    format!(
        "{} {} {:02} {:02}:{:02}:{:02} UTC {}",
        weekday,
        MONTH_NAMES[(month - 1) as usize],
        day,
        tod / 3600,
        (tod % 3600) / 60,
        tod % 60,
        year
    )
}

fn timezone_object(ctx: &mut GCtx<'_>, id: &str) -> GValue {
    let id_value = string_value(ctx, id);
    let class = ctx.vm.class_names.intern(b"java/util/TimeZone");
    let mut object = Object::new(class);
    object.set_field("ID", types::STRING_DESC, FieldValue::Value(id_value));
    GValue::Value(JavaValue::Ref(Some(ctx.vm.heap.alloc(object))))
}

/// The VM renders all times against UTC.
fn timezone_get_default(ctx: &mut GCtx<'_>, _args: &mut Vec<JavaValue>) -> GValue {
    timezone_object(ctx, "UTC")
}

fn timezone_get_time_zone(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let id = try_g!(arg_string(ctx.vm, args, 0));
    timezone_object(ctx, &id)
}

fn timezone_get_id(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let zone = try_g!(arg_obj(args, 0));
    let id = ctx
        .vm
        .heap
        .get(zone)
        .and_then(|object| object.field("ID"))
        .and_then(|field| match field.value {
            FieldValue::Value(value) => Some(value),
            _ => None,
        })
        .unwrap_or(JavaValue::NULL);
    GValue::Value(id)
}

#[cfg(test)]
mod tests {
    use super::{civil_from_days, format_utc};

    #[test]
    fn civil_calendar() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
        assert_eq!(civil_from_days(365), (1971, 1, 1));
        // 2000-02-29 is day 11016
        assert_eq!(civil_from_days(11_016), (2000, 2, 29));
        assert_eq!(civil_from_days(-1), (1969, 12, 31));
    }

    #[test]
    fn formatting() {
        assert_eq!(format_utc(0), "Thu Jan 01 00:00:00 UTC 1970");
        // 2021-03-04 05:06:07 UTC
        assert_eq!(format_utc(1_614_834_367_000), "Thu Mar 04 05:06:07 UTC 2021");
    }
}
