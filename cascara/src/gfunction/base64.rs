//! `java/util/Base64` host methods: the basic and URL encoders/decoders.
//! The MIME flavor is declared but trapped.

use cascara_base::types;

use crate::exceptions::ExceptionKind;
use crate::gfunction::{
    arg_obj, arg_string, clinit_generic, gmeth, string_value, trap_not_supported, try_g, GCtx,
    GErrBlk, GLibrary, GValue,
};
use crate::heap::ObjRef;
use crate::object::{self, FieldValue, Object};
use crate::value::JavaValue;
use crate::Vm;

const ENCODER_CLASS: &str = "java/util/Base64$Encoder";
const DECODER_CLASS: &str = "java/util/Base64$Decoder";

const FLAVOR_STANDARD: i64 = 0;
const FLAVOR_URL: i64 = 1;

pub fn load_util_base64() -> GLibrary {
    vec![
        ("java/util/Base64.<clinit>()V", gmeth(0, clinit_generic)),
        (
            "java/util/Base64.getEncoder()Ljava/util/Base64$Encoder;",
            gmeth(0, base64_get_encoder),
        ),
        (
            "java/util/Base64.getUrlEncoder()Ljava/util/Base64$Encoder;",
            gmeth(0, base64_get_url_encoder),
        ),
        (
            "java/util/Base64.getMimeEncoder()Ljava/util/Base64$Encoder;",
            gmeth(0, trap_not_supported),
        ),
        (
            "java/util/Base64.getDecoder()Ljava/util/Base64$Decoder;",
            gmeth(0, base64_get_decoder),
        ),
        (
            "java/util/Base64.getUrlDecoder()Ljava/util/Base64$Decoder;",
            gmeth(0, base64_get_url_decoder),
        ),
        (
            "java/util/Base64.getMimeDecoder()Ljava/util/Base64$Decoder;",
            gmeth(0, trap_not_supported),
        ),
        (
            "java/util/Base64$Encoder.encodeToString([B)Ljava/lang/String;",
            gmeth(1, encoder_encode_to_string),
        ),
        (
            "java/util/Base64$Encoder.encode([B)[B",
            gmeth(1, encoder_encode),
        ),
        (
            "java/util/Base64$Decoder.decode(Ljava/lang/String;)[B",
            gmeth(1, decoder_decode_string),
        ),
        (
            "java/util/Base64$Decoder.decode([B)[B",
            gmeth(1, decoder_decode_bytes),
        ),
    ]
}

fn make_flavored(ctx: &mut GCtx<'_>, class_name: &str, flavor: i64) -> GValue {
    let class = ctx.vm.class_names.intern_str(class_name);
    let mut object = Object::new(class);
    object.set_field("flavor", types::INT, FieldValue::Value(JavaValue::Int(flavor)));
    GValue::Value(JavaValue::Ref(Some(ctx.vm.heap.alloc(object))))
}

fn base64_get_encoder(ctx: &mut GCtx<'_>, _args: &mut Vec<JavaValue>) -> GValue {
    make_flavored(ctx, ENCODER_CLASS, FLAVOR_STANDARD)
}

fn base64_get_url_encoder(ctx: &mut GCtx<'_>, _args: &mut Vec<JavaValue>) -> GValue {
    make_flavored(ctx, ENCODER_CLASS, FLAVOR_URL)
}

fn base64_get_decoder(ctx: &mut GCtx<'_>, _args: &mut Vec<JavaValue>) -> GValue {
    make_flavored(ctx, DECODER_CLASS, FLAVOR_STANDARD)
}

fn base64_get_url_decoder(ctx: &mut GCtx<'_>, _args: &mut Vec<JavaValue>) -> GValue {
    make_flavored(ctx, DECODER_CLASS, FLAVOR_URL)
}

fn flavor_of(vm: &Vm, receiver: ObjRef) -> i64 {
    vm.heap
        .get(receiver)
        .and_then(|object| object.field("flavor"))
        .and_then(|field| match field.value {
            FieldValue::Value(JavaValue::Int(flavor)) => Some(flavor),
            _ => None,
        })
        .unwrap_or(FLAVOR_STANDARD)
}

fn config_for(flavor: i64) -> ::base64::Config {
    if flavor == FLAVOR_URL {
        ::base64::URL_SAFE
    } else {
        ::base64::STANDARD
    }
}

/// The bytes of a `[B` argument, whichever backing it carries.
fn bytes_of_array(vm: &Vm, reference: ObjRef) -> Result<Vec<u8>, GErrBlk> {
    let object = vm
        .heap
        .get(reference)
        .ok_or_else(|| GErrBlk::new(ExceptionKind::InternalError, "dangling array ref"))?;
    match object.value_field() {
        Some(FieldValue::Bytes(data)) => Ok(data.clone()),
        Some(FieldValue::JavaBytes(data)) => Ok(data.iter().map(|&b| b as u8).collect()),
        Some(FieldValue::Ints(data)) => Ok(data.iter().map(|&b| b as u8).collect()),
        _ => Err(GErrBlk::new(
            ExceptionKind::IllegalArgumentException,
            "expected a byte array",
        )),
    }
}

fn make_byte_array(ctx: &mut GCtx<'_>, data: &[u8]) -> JavaValue {
    let class = ctx.vm.class_names.intern_str(types::BYTE_ARRAY);
    let backing = FieldValue::Ints(data.iter().map(|&b| i64::from(b as i8)).collect());
    let reference = ctx
        .vm
        .heap
        .alloc(Object::with_value(class, types::BYTE_ARRAY, backing));
    JavaValue::Ref(Some(reference))
}

fn encoder_encode_to_string(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    let input = try_g!(arg_obj(args, 1));
    let data = try_g!(bytes_of_array(ctx.vm, input));
    let encoded = ::base64::encode_config(data, config_for(flavor_of(ctx.vm, receiver)));
    let value = string_value(ctx, &encoded);
    GValue::Value(value)
}

fn encoder_encode(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    let input = try_g!(arg_obj(args, 1));
    let data = try_g!(bytes_of_array(ctx.vm, input));
    let encoded = ::base64::encode_config(data, config_for(flavor_of(ctx.vm, receiver)));
    GValue::Value(make_byte_array(ctx, encoded.as_bytes()))
}

fn decode_with(ctx: &mut GCtx<'_>, receiver: ObjRef, data: &[u8]) -> GValue {
    match ::base64::decode_config(data, config_for(flavor_of(ctx.vm, receiver))) {
        Ok(decoded) => GValue::Value(make_byte_array(ctx, &decoded)),
        Err(err) => GValue::Err(GErrBlk::new(
            ExceptionKind::IllegalArgumentException,
            format!("Illegal base64 input: {}", err),
        )),
    }
}

fn decoder_decode_string(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    let text = try_g!(arg_string(ctx.vm, args, 1));
    decode_with(ctx, receiver, text.as_bytes())
}

fn decoder_decode_bytes(ctx: &mut GCtx<'_>, args: &mut Vec<JavaValue>) -> GValue {
    let receiver = try_g!(arg_obj(args, 0));
    let input = try_g!(arg_obj(args, 1));
    let data = try_g!(bytes_of_array(ctx.vm, input));
    decode_with(ctx, receiver, &data)
}

#[cfg(test)]
mod tests {
    use super::{
        base64_get_decoder, base64_get_encoder, bytes_of_array, decoder_decode_string,
        encoder_encode_to_string,
    };
    use crate::gfunction::{expect_value, GCtx, GValue};
    use crate::object::{get_string, make_array, make_string, FieldValue};
    use crate::testutil::test_vm;
    use crate::value::JavaValue;

    #[test]
    fn encode_decode_round_trip() {
        let mut vm = test_vm();
        let input = make_array(&mut vm.heap, &vm.class_names, "[B", 3).unwrap();
        if let Some(FieldValue::Ints(items)) = vm.heap.get_mut(input).unwrap().value_field_mut() {
            items.copy_from_slice(&[i64::from(b'h'), i64::from(b'i'), i64::from(b'!')]);
        }

        let mut ctx = GCtx {
            vm: &mut vm,
            frames: None,
        };
        let encoder = expect_value(base64_get_encoder(&mut ctx, &mut Vec::new()));
        let encoded = expect_value(encoder_encode_to_string(
            &mut ctx,
            &mut vec![encoder, JavaValue::Ref(Some(input))],
        ));
        let JavaValue::Ref(Some(encoded_str)) = encoded else {
            panic!("expected a string");
        };
        assert_eq!(get_string(&vm.heap, encoded_str).as_deref(), Some("aGkh"));

        let mut ctx = GCtx {
            vm: &mut vm,
            frames: None,
        };
        let decoder = expect_value(base64_get_decoder(&mut ctx, &mut Vec::new()));
        let decoded = expect_value(decoder_decode_string(
            &mut ctx,
            &mut vec![decoder, encoded],
        ));
        let JavaValue::Ref(Some(decoded_arr)) = decoded else {
            panic!("expected an array");
        };
        assert_eq!(bytes_of_array(&vm, decoded_arr).unwrap(), b"hi!");
    }

    #[test]
    fn bad_input_is_illegal_argument() {
        let mut vm = test_vm();
        let bad = make_string(&mut vm.heap, &vm.class_names, false, "!!!not-base64!!!");
        let mut ctx = GCtx {
            vm: &mut vm,
            frames: None,
        };
        let decoder = expect_value(base64_get_decoder(&mut ctx, &mut Vec::new()));
        assert!(matches!(
            decoder_decode_string(&mut ctx, &mut vec![decoder, JavaValue::Ref(Some(bad))]),
            GValue::Err(block)
                if block.kind == crate::exceptions::ExceptionKind::IllegalArgumentException
        ));
    }
}
