//! Boxed-numerics host methods: `Integer`, `Long`, `Short`, `Byte`,
//! `Character`, `Boolean`, `Float`, `Double`. Wrappers are objects whose
//! `value` field holds the widened primitive.

use cascara_base::types;

use crate::exceptions::ExceptionKind;
use crate::gfunction::{
    arg_float, arg_int, arg_obj, arg_string, clinit_generic, gmeth, string_value, try_g, GCtx,
    GErrBlk, GLibrary, GValue,
};
use crate::heap::ObjRef;
use crate::instantiate;
use crate::object::FieldValue;
use crate::value::JavaValue;

pub fn load_lang_numerics() -> GLibrary {
    vec![
        // Integer
        ("java/lang/Integer.<clinit>()V", gmeth(0, clinit_generic)),
        (
            "java/lang/Integer.valueOf(I)Ljava/lang/Integer;",
            gmeth(1, integer_value_of),
        ),
        ("java/lang/Integer.intValue()I", gmeth(0, unbox_int)),
        ("java/lang/Integer.longValue()J", gmeth(0, unbox_long)),
        ("java/lang/Integer.doubleValue()D", gmeth(0, unbox_double)),
        (
            "java/lang/Integer.parseInt(Ljava/lang/String;)I",
            gmeth(1, integer_parse_int),
        ),
        (
            "java/lang/Integer.parseInt(Ljava/lang/String;I)I",
            gmeth(2, integer_parse_int_radix),
        ),
        (
            "java/lang/Integer.toString(I)Ljava/lang/String;",
            gmeth(1, integer_to_string),
        ),
        (
            "java/lang/Integer.toString(II)Ljava/lang/String;",
            gmeth(2, integer_to_string_radix),
        ),
        (
            "java/lang/Integer.toHexString(I)Ljava/lang/String;",
            gmeth(1, integer_to_hex_string),
        ),
        (
            "java/lang/Integer.toOctalString(I)Ljava/lang/String;",
            gmeth(1, integer_to_octal_string),
        ),
        (
            "java/lang/Integer.toBinaryString(I)Ljava/lang/String;",
            gmeth(1, integer_to_binary_string),
        ),
        // Long
        ("java/lang/Long.<clinit>()V", gmeth(0, clinit_generic)),
        (
            "java/lang/Long.valueOf(J)Ljava/lang/Long;",
            gmeth(2, long_value_of),
        ),
        ("java/lang/Long.longValue()J", gmeth(0, unbox_long)),
        ("java/lang/Long.intValue()I", gmeth(0, unbox_int)),
        (
            "java/lang/Long.parseLong(Ljava/lang/String;)J",
            gmeth(1, long_parse_long),
        ),
        (
            "java/lang/Long.toString(J)Ljava/lang/String;",
            gmeth(2, long_to_string),
        ),
        (
            "java/lang/Long.toHexString(J)Ljava/lang/String;",
            gmeth(2, long_to_hex_string),
        ),
        // Short / Byte / Character / Boolean
        ("java/lang/Short.<clinit>()V", gmeth(0, clinit_generic)),
        (
            "java/lang/Short.valueOf(S)Ljava/lang/Short;",
            gmeth(1, short_value_of),
        ),
        ("java/lang/Short.shortValue()S", gmeth(0, unbox_int)),
        ("java/lang/Byte.<clinit>()V", gmeth(0, clinit_generic)),
        (
            "java/lang/Byte.valueOf(B)Ljava/lang/Byte;",
            gmeth(1, byte_value_of),
        ),
        ("java/lang/Byte.byteValue()B", gmeth(0, unbox_int)),
        ("java/lang/Character.<clinit>()V", gmeth(0, clinit_generic)),
        (
            "java/lang/Character.valueOf(C)Ljava/lang/Character;",
            gmeth(1, character_value_of),
        ),
        ("java/lang/Character.charValue()C", gmeth(0, unbox_int)),
        ("java/lang/Boolean.<clinit>()V", gmeth(0, clinit_generic)),
        (
            "java/lang/Boolean.valueOf(Z)Ljava/lang/Boolean;",
            gmeth(1, boolean_value_of),
        ),
        ("java/lang/Boolean.booleanValue()Z", gmeth(0, unbox_int)),
        (
            "java/lang/Boolean.parseBoolean(Ljava/lang/String;)Z",
            gmeth(1, boolean_parse_boolean),
        ),
        // Float / Double
        ("java/lang/Float.<clinit>()V", gmeth(0, clinit_generic)),
        (
            "java/lang/Float.valueOf(F)Ljava/lang/Float;",
            gmeth(1, float_value_of),
        ),
        ("java/lang/Float.floatValue()F", gmeth(0, unbox_float)),
        ("java/lang/Double.<clinit>()V", gmeth(0, clinit_generic)),
        (
            "java/lang/Double.valueOf(D)Ljava/lang/Double;",
            gmeth(2, double_value_of),
        ),
        ("java/lang/Double.doubleValue()D", gmeth(0, unbox_double)),
        (
            "java/lang/Double.parseDouble(Ljava/lang/String;)D",
            gmeth(1, double_parse_double),
        ),
    ]
}

/// Read a wrapper's `value` field.
fn wrapped_value(ctx: &GCtx<'_>, receiver: ObjRef) -> Result<JavaValue, GErrBlk> {
    ctx.vm
        .heap
        .get(receiver)
        .and_then(|object| match object.value_field() {
            Some(FieldValue::Value(v)) => Some(*v),
            _ => None,
        })
        .ok_or_else(|| GErrBlk::new(ExceptionKind::InternalError, "wrapper without a value field"))
}

fn boxed(ctx: &mut GCtx<'_>, class_name: &str, tag: &str, value: JavaValue) -> GValue {
    let reference = instantiate::make_primitive(
        &mut ctx.vm.heap,
        &ctx.vm.class_names,
        class_name,
        tag,
        value,
    );
    GValue::Value(JavaValue::Ref(Some(reference)))
}

// === shared unboxers ===

fn unbox_int(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    let value = try_g!(wrapped_value(ctx, receiver));
    match value.as_int() {
        Some(v) => GValue::Value(JavaValue::Int(v)),
        None => GValue::Err(GErrBlk::new(
            ExceptionKind::InternalError,
            "wrapper value has the wrong category",
        )),
    }
}

fn unbox_long(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    let value = try_g!(wrapped_value(ctx, receiver));
    match value.as_int() {
        Some(v) => GValue::Value(JavaValue::Long(v)),
        None => GValue::Err(GErrBlk::new(
            ExceptionKind::InternalError,
            "wrapper value has the wrong category",
        )),
    }
}

fn unbox_float(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    let value = try_g!(wrapped_value(ctx, receiver));
    match value.as_float() {
        Some(v) => GValue::Value(JavaValue::Float(v)),
        None => GValue::Err(GErrBlk::new(
            ExceptionKind::InternalError,
            "wrapper value has the wrong category",
        )),
    }
}

fn unbox_double(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    let value = try_g!(wrapped_value(ctx, receiver));
    let widened = value
        .as_float()
        .or_else(|| value.as_int().map(|v| v as f64));
    match widened {
        Some(v) => GValue::Value(JavaValue::Double(v)),
        None => GValue::Err(GErrBlk::new(
            ExceptionKind::InternalError,
            "wrapper value has the wrong category",
        )),
    }
}

// === Integer ===

fn integer_value_of(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let value = try_g!(arg_int(args, 0));
    boxed(
        ctx,
        "java/lang/Integer",
        types::INT,
        JavaValue::Int(value as i32 as i64),
    )
}

fn parse_int_with_radix(text: &str, radix: u32) -> Result<i64, GErrBlk> {
    if !(2..=36).contains(&radix) {
        return Err(GErrBlk::new(
            ExceptionKind::NumberFormatException,
            format!("radix {} out of range", radix),
        ));
    }
    i32::from_str_radix(text.trim(), radix)
        .map(i64::from)
        .map_err(|_| {
            GErrBlk::new(
                ExceptionKind::NumberFormatException,
                format!("For input string: \"{}\"", text),
            )
        })
}

fn integer_parse_int(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let text = try_g!(arg_string(ctx.vm, args, 0));
    let parsed = try_g!(parse_int_with_radix(&text, 10));
    GValue::Value(JavaValue::Int(parsed))
}

fn integer_parse_int_radix(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let text = try_g!(arg_string(ctx.vm, args, 0));
    let radix = try_g!(arg_int(args, 1));
    let parsed = try_g!(parse_int_with_radix(&text, radix as u32));
    GValue::Value(JavaValue::Int(parsed))
}

fn integer_to_string(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let value = try_g!(arg_int(args, 0)) as i32;
    let text = value.to_string();
    let value = string_value(ctx, &text);
    GValue::Value(value)
}

fn integer_to_string_radix(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let value = try_g!(arg_int(args, 0)) as i32;
    let radix = try_g!(arg_int(args, 1));
    if !(2..=36).contains(&radix) {
        return GValue::Err(GErrBlk::new(
            ExceptionKind::NumberFormatException,
            format!("radix {} out of range", radix),
        ));
    }
    let text = format!("{}", radix_fmt::radix(value, radix as u8));
    let value = string_value(ctx, &text);
    GValue::Value(value)
}

/// Hex/octal/binary strings treat the int as unsigned 32-bit.
fn integer_to_hex_string(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let value = try_g!(arg_int(args, 0)) as i32 as u32;
    let text = format!("{}", radix_fmt::radix(value, 16));
    let value = string_value(ctx, &text);
    GValue::Value(value)
}

fn integer_to_octal_string(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let value = try_g!(arg_int(args, 0)) as i32 as u32;
    let text = format!("{}", radix_fmt::radix(value, 8));
    let value = string_value(ctx, &text);
    GValue::Value(value)
}

fn integer_to_binary_string(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let value = try_g!(arg_int(args, 0)) as i32 as u32;
    let text = format!("{}", radix_fmt::radix(value, 2));
    let value = string_value(ctx, &text);
    GValue::Value(value)
}

// === Long ===

fn long_value_of(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let value = try_g!(arg_int(args, 0));
    boxed(ctx, "java/lang/Long", types::LONG, JavaValue::Long(value))
}

fn long_parse_long(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let text = try_g!(arg_string(ctx.vm, args, 0));
    match text.trim().parse::<i64>() {
        Ok(parsed) => GValue::Value(JavaValue::Long(parsed)),
        Err(_) => GValue::Err(GErrBlk::new(
            ExceptionKind::NumberFormatException,
            format!("For input string: \"{}\"", text),
        )),
    }
}

fn long_to_string(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let value = try_g!(arg_int(args, 0));
    let text = value.to_string();
    let value = string_value(ctx, &text);
    GValue::Value(value)
}

fn long_to_hex_string(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let value = try_g!(arg_int(args, 0)) as u64;
    let text = format!("{}", radix_fmt::radix(value, 16));
    let value = string_value(ctx, &text);
    GValue::Value(value)
}

// === Short / Byte / Character / Boolean ===

fn short_value_of(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let value = try_g!(arg_int(args, 0));
    boxed(
        ctx,
        "java/lang/Short",
        types::SHORT,
        JavaValue::Int(value as i16 as i64),
    )
}

fn byte_value_of(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let value = try_g!(arg_int(args, 0));
    boxed(
        ctx,
        "java/lang/Byte",
        types::BYTE,
        JavaValue::Int(value as i8 as i64),
    )
}

fn character_value_of(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let value = try_g!(arg_int(args, 0));
    boxed(
        ctx,
        "java/lang/Character",
        types::CHAR,
        JavaValue::Int(value & 0xFFFF),
    )
}

fn boolean_value_of(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let value = try_g!(arg_int(args, 0));
    boxed(
        ctx,
        "java/lang/Boolean",
        types::BOOL,
        JavaValue::Int(i64::from(value != 0)),
    )
}

fn boolean_parse_boolean(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let text = try_g!(arg_string(ctx.vm, args, 0));
    GValue::Value(JavaValue::Int(i64::from(text.eq_ignore_ascii_case("true"))))
}

// === Float / Double ===

fn float_value_of(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let value = try_g!(arg_float(args, 0));
    boxed(ctx, "java/lang/Float", types::FLOAT, JavaValue::Float(value))
}

fn double_value_of(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let value = try_g!(arg_float(args, 0));
    boxed(
        ctx,
        "java/lang/Double",
        types::DOUBLE,
        JavaValue::Double(value),
    )
}

fn double_parse_double(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let text = try_g!(arg_string(ctx.vm, args, 0));
    match text.trim().parse::<f64>() {
        Ok(parsed) => GValue::Value(JavaValue::Double(parsed)),
        Err(_) => GValue::Err(GErrBlk::new(
            ExceptionKind::NumberFormatException,
            format!("For input string: \"{}\"", text),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::{integer_parse_int, integer_to_hex_string, integer_value_of, unbox_int};
    use crate::gfunction::{expect_value, GCtx, GValue};
    use crate::object::{get_string, make_string};
    use crate::testutil::test_vm;
    use crate::value::JavaValue;

    #[test]
    fn box_then_unbox() {
        let mut vm = test_vm();
        let mut ctx = GCtx {
            vm: &mut vm,
            frames: None,
        };
        let boxed = expect_value(integer_value_of(&mut ctx, &mut vec![JavaValue::Int(41)]));
        let unboxed = expect_value(unbox_int(&mut ctx, &mut vec![boxed]));
        assert_eq!(unboxed, JavaValue::Int(41));
    }

    #[test]
    fn parse_int_failure_is_number_format() {
        let mut vm = test_vm();
        let bad = make_string(&mut vm.heap, &vm.class_names, false, "12x");
        let mut ctx = GCtx {
            vm: &mut vm,
            frames: None,
        };
        let result = integer_parse_int(&mut ctx, &mut vec![JavaValue::Ref(Some(bad))]);
        match result {
            GValue::Err(block) => assert_eq!(
                block.kind,
                crate::exceptions::ExceptionKind::NumberFormatException
            ),
            _ => panic!("expected an error block"),
        }
    }

    #[test]
    fn hex_uses_unsigned_form() {
        let mut vm = test_vm();
        let mut ctx = GCtx {
            vm: &mut vm,
            frames: None,
        };
        let value = expect_value(integer_to_hex_string(&mut ctx, &mut vec![JavaValue::Int(-1)]));
        let JavaValue::Ref(Some(s)) = value else {
            panic!("expected a string ref");
        };
        assert_eq!(get_string(&vm.heap, s).as_deref(), Some("ffffffff"));
    }
}
