//! Field and descriptor type tags, in the classfile's internal notation.
//! These are the tags stored in object field tables; knowing the tag is what
//! tells `getfield`/`putfield` whether a value occupies one or two slots.

pub const BOOL: &str = "Z";
pub const BYTE: &str = "B";
pub const CHAR: &str = "C";
pub const SHORT: &str = "S";
pub const INT: &str = "I";
pub const LONG: &str = "J";
pub const FLOAT: &str = "F";
pub const DOUBLE: &str = "D";

pub const REF_PREFIX: char = 'L';
pub const ARRAY_PREFIX: char = '[';

pub const BYTE_ARRAY: &str = "[B";
pub const INT_ARRAY: &str = "[I";
pub const LONG_ARRAY: &str = "[J";
pub const FLOAT_ARRAY: &str = "[F";
pub const DOUBLE_ARRAY: &str = "[D";
pub const CHAR_ARRAY: &str = "[C";
pub const SHORT_ARRAY: &str = "[S";
pub const BOOL_ARRAY: &str = "[Z";

pub const OBJECT_CLASS: &str = "java/lang/Object";
pub const STRING_CLASS: &str = "java/lang/String";
pub const STRING_DESC: &str = "Ljava/lang/String;";
pub const THROWABLE_CLASS: &str = "java/lang/Throwable";
pub const EXCEPTION_CLASS: &str = "java/lang/Exception";
pub const ERROR_CLASS: &str = "java/lang/Error";
pub const RUNTIME_EXCEPTION_CLASS: &str = "java/lang/RuntimeException";
pub const STACK_TRACE_ELEMENT_CLASS: &str = "java/lang/StackTraceElement";

/// Whether a field/descriptor tag names a category-2 (two slot) value.
#[must_use]
pub fn is_wide_tag(tag: &str) -> bool {
    tag == LONG || tag == DOUBLE
}

/// The `newarray` atype operands, per the classfile specification.
#[must_use]
pub fn array_class_of_atype(atype: u8) -> Option<&'static str> {
    Some(match atype {
        4 => BOOL_ARRAY,
        5 => CHAR_ARRAY,
        6 => FLOAT_ARRAY,
        7 => DOUBLE_ARRAY,
        8 => BYTE_ARRAY,
        9 => SHORT_ARRAY,
        10 => INT_ARRAY,
        11 => LONG_ARRAY,
        _ => return None,
    })
}
