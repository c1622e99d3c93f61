use std::borrow::Cow;

/// Converts the text from a classfile into utf8, converting if needed.
/// Classfiles use a modified cesu8 encoding for their text.
#[must_use]
pub fn convert_classfile_text(bytes: &[u8]) -> Cow<str> {
    cesu8::from_java_cesu8(bytes).unwrap_or_else(|_| String::from_utf8_lossy(bytes))
}

/// Internal form (`java/lang/String` or `Ljava/lang/String;`) to the
/// user-facing dotted form (`java.lang.String`).
#[must_use]
pub fn internal_to_user_format(name: &str) -> String {
    let name = name
        .strip_prefix('L')
        .and_then(|rest| rest.strip_suffix(';'))
        .unwrap_or(name);
    name.replace('/', ".")
}

/// User-facing dotted form back to the internal slashed form.
#[must_use]
pub fn user_to_internal_format(name: &str) -> String {
    name.replace('.', "/")
}

/// A class *file* name (`java/lang/String.class`, possibly dotted) to the
/// internal slashed form without the extension.
#[must_use]
pub fn class_filename_to_internal(name: &str) -> String {
    let name = name.strip_suffix(".class").unwrap_or(name);
    name.replace('.', "/")
}

/// Internal form to the on-disk class file name.
#[must_use]
pub fn internal_to_class_filename(name: &str) -> String {
    format!("{}.class", name)
}

#[cfg(test)]
mod tests {
    use super::{
        class_filename_to_internal, internal_to_class_filename, internal_to_user_format,
        user_to_internal_format,
    };

    #[test]
    fn user_format_round_trip() {
        for name in ["java/lang/String", "Main", "a/b/c/D"] {
            let user = internal_to_user_format(name);
            assert_eq!(user_to_internal_format(&user), name);
        }

        assert_eq!(
            internal_to_user_format("Ljava/lang/String;"),
            "java.lang.String"
        );
    }

    #[test]
    fn filename_round_trip() {
        for name in ["java/lang/String", "Main", "a/b/C"] {
            let file = internal_to_class_filename(name);
            assert_eq!(class_filename_to_internal(&file), name);
        }

        // Dotted names normalize on the way in
        assert_eq!(
            class_filename_to_internal("java.lang.String.class"),
            "java/lang/String"
        );
    }
}
