//! The tagged runtime value that occupies operand-stack slots and locals.

use cascara_base::types;

use crate::heap::ObjRef;

/// A Java value. `Int` carries boolean, byte, char, short and int uniformly
/// widened to 64 bits; `Long` and `Double` are category 2 and occupy two
/// consecutive operand-stack slots. `Ref(None)` is Java `null`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JavaValue {
    Int(i64),
    Long(i64),
    Float(f64),
    Double(f64),
    Ref(Option<ObjRef>),
    /// `jsr`/`ret` return address
    RetAddr(u32),
}

impl JavaValue {
    pub const NULL: JavaValue = JavaValue::Ref(None);

    #[must_use]
    pub fn is_category2(&self) -> bool {
        matches!(self, JavaValue::Long(_) | JavaValue::Double(_))
    }

    /// The value as an integer, accepting any of the int-repr widths.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            JavaValue::Int(v) | JavaValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            JavaValue::Float(v) | JavaValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as a reference; `Some(None)` is a null reference.
    #[must_use]
    pub fn as_ref(&self) -> Option<Option<ObjRef>> {
        match self {
            JavaValue::Ref(r) => Some(*r),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, JavaValue::Ref(None))
    }

    /// The zero value for a field/descriptor type tag.
    #[must_use]
    pub fn default_for_tag(tag: &str) -> JavaValue {
        match tag {
            types::LONG => JavaValue::Long(0),
            types::DOUBLE => JavaValue::Double(0.0),
            types::FLOAT => JavaValue::Float(0.0),
            types::INT | types::BOOL | types::BYTE | types::CHAR | types::SHORT => {
                JavaValue::Int(0)
            }
            _ => JavaValue::NULL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::JavaValue;

    #[test]
    fn categories() {
        assert!(JavaValue::Long(1).is_category2());
        assert!(JavaValue::Double(1.0).is_category2());
        assert!(!JavaValue::Int(1).is_category2());
        assert!(!JavaValue::NULL.is_category2());
    }

    #[test]
    fn defaults() {
        assert_eq!(JavaValue::default_for_tag("J"), JavaValue::Long(0));
        assert_eq!(JavaValue::default_for_tag("I"), JavaValue::Int(0));
        assert_eq!(JavaValue::default_for_tag("Z"), JavaValue::Int(0));
        assert_eq!(
            JavaValue::default_for_tag("Ljava/lang/String;"),
            JavaValue::NULL
        );
    }
}
