//! A focused subset of `java/lang/String`, enough for the library shims and
//! diagnostics that pass strings around.

use crate::exceptions::ExceptionKind;
use crate::gfunction::{
    arg_obj, arg_int, arg_string, clinit_generic, gmeth, string_value, trap_not_supported, try_g,
    GCtx, GErrBlk, GLibrary, GValue,
};
use crate::value::JavaValue;

pub fn load_lang_string() -> GLibrary {
    vec![
        ("java/lang/String.<clinit>()V", gmeth(0, clinit_generic)),
        ("java/lang/String.length()I", gmeth(0, string_length)),
        ("java/lang/String.isEmpty()Z", gmeth(0, string_is_empty)),
        ("java/lang/String.charAt(I)C", gmeth(1, string_char_at)),
        (
            "java/lang/String.concat(Ljava/lang/String;)Ljava/lang/String;",
            gmeth(1, string_concat),
        ),
        (
            "java/lang/String.equals(Ljava/lang/Object;)Z",
            gmeth(1, string_equals),
        ),
        ("java/lang/String.hashCode()I", gmeth(0, string_hash_code)),
        (
            "java/lang/String.toString()Ljava/lang/String;",
            gmeth(0, string_to_string),
        ),
        (
            "java/lang/String.intern()Ljava/lang/String;",
            gmeth(0, string_to_string),
        ),
        (
            "java/lang/String.format(Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/String;",
            gmeth(2, trap_not_supported),
        ),
    ]
}

fn string_length(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let text = try_g!(arg_string(ctx.vm, args, 0));
    GValue::Value(JavaValue::Int(text.chars().count() as i64))
}

fn string_is_empty(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let text = try_g!(arg_string(ctx.vm, args, 0));
    GValue::Value(JavaValue::Int(i64::from(text.is_empty())))
}

fn string_char_at(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let text = try_g!(arg_string(ctx.vm, args, 0));
    let index = try_g!(arg_int(args, 1));
    let length = text.chars().count() as i64;
    if index < 0 || index >= length {
        return GValue::Err(GErrBlk::new(
            ExceptionKind::StringIndexOutOfBoundsException,
            format!("index {} out of bounds for length {}", index, length),
        ));
    }
    let ch = text.chars().nth(index as usize).unwrap_or('\0');
    GValue::Value(JavaValue::Int(i64::from(u32::from(ch))))
}

fn string_concat(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let left = try_g!(arg_string(ctx.vm, args, 0));
    let right = try_g!(arg_string(ctx.vm, args, 1));
    let value = string_value(ctx, &format!("{}{}", left, right));
    GValue::Value(value)
}

fn string_equals(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let left = try_g!(arg_string(ctx.vm, args, 0));
    let right = match arg_string(ctx.vm, args, 1) {
        Ok(text) => text,
        // Not a string (or null): unequal, not an error
        Err(_) => return GValue::Value(JavaValue::Int(0)),
    };
    GValue::Value(JavaValue::Int(i64::from(left == right)))
}

/// The canonical `s[0]*31^(n-1) + ... + s[n-1]` hash, in int arithmetic.
fn string_hash_code(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let text = try_g!(arg_string(ctx.vm, args, 0));
    let mut hash: i32 = 0;
    for ch in text.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(i32::from(ch));
    }
    GValue::Value(JavaValue::Int(i64::from(hash)))
}

fn string_to_string(_ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    GValue::Value(JavaValue::Ref(Some(receiver)))
}

#[cfg(test)]
mod tests {
    use super::{string_char_at, string_hash_code, string_length};
    use crate::gfunction::{expect_value, GCtx, GValue};
    use crate::object::make_string;
    use crate::testutil::test_vm;
    use crate::value::JavaValue;

    #[test]
    fn length_and_char_at() {
        let mut vm = test_vm();
        let s = make_string(&mut vm.heap, &vm.class_names, false, "abc");
        let mut ctx = GCtx {
            vm: &mut vm,
            frames: None,
        };

        let len = expect_value(string_length(&mut ctx, &mut vec![JavaValue::Ref(Some(s))]));
        assert_eq!(len, JavaValue::Int(3));

        let ch = expect_value(string_char_at(
            &mut ctx,
            &mut vec![JavaValue::Ref(Some(s)), JavaValue::Int(1)],
        ));
        assert_eq!(ch, JavaValue::Int(i64::from(b'b')));

        assert!(matches!(
            string_char_at(&mut ctx, &mut vec![JavaValue::Ref(Some(s)), JavaValue::Int(3)]),
            GValue::Err(_)
        ));
    }

    #[test]
    fn hash_matches_reference_values() {
        let mut vm = test_vm();
        let s = make_string(&mut vm.heap, &vm.class_names, false, "hello");
        let mut ctx = GCtx {
            vm: &mut vm,
            frames: None,
        };
        let hash = expect_value(string_hash_code(
            &mut ctx,
            &mut vec![JavaValue::Ref(Some(s))],
        ));
        // "hello".hashCode() in any JDK
        assert_eq!(hash, JavaValue::Int(99_162_322));
    }
}
