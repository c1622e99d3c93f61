//! Class-level statics, keyed `Class.field`. Populated during the
//! single-threaded startup phase and by `putstatic`.

use cascara_base::types;
use indexmap::IndexMap;

use crate::value::JavaValue;

#[derive(Debug, Clone)]
pub struct Static {
    pub type_tag: String,
    pub value: JavaValue,
}

#[derive(Default)]
pub struct Statics {
    table: IndexMap<String, Static>,
}
impl Statics {
    #[must_use]
    pub fn new() -> Statics {
        Statics::default()
    }

    #[must_use]
    pub fn key(class_name: &str, field_name: &str) -> String {
        format!("{}.{}", class_name, field_name)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Static> {
        self.table.get(key)
    }

    pub fn set(&mut self, class_name: &str, field_name: &str, type_tag: &str, value: JavaValue) {
        self.table.insert(
            Statics::key(class_name, field_name),
            Static {
                type_tag: type_tag.to_owned(),
                value,
            },
        );
    }

    pub fn set_by_key(&mut self, key: &str, type_tag: &str, value: JavaValue) {
        self.table.insert(
            key.to_owned(),
            Static {
                type_tag: type_tag.to_owned(),
                value,
            },
        );
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Seed the bounds constants of the primitive wrapper classes.
pub fn load_primitive_statics(statics: &mut Statics) {
    let int = |v: i64| JavaValue::Int(v);

    statics.set("java/lang/Integer", "MAX_VALUE", types::INT, int(i64::from(i32::MAX)));
    statics.set("java/lang/Integer", "MIN_VALUE", types::INT, int(i64::from(i32::MIN)));
    statics.set("java/lang/Integer", "SIZE", types::INT, int(32));

    statics.set("java/lang/Long", "MAX_VALUE", types::LONG, JavaValue::Long(i64::MAX));
    statics.set("java/lang/Long", "MIN_VALUE", types::LONG, JavaValue::Long(i64::MIN));
    statics.set("java/lang/Long", "SIZE", types::INT, int(64));

    statics.set("java/lang/Short", "MAX_VALUE", types::SHORT, int(i64::from(i16::MAX)));
    statics.set("java/lang/Short", "MIN_VALUE", types::SHORT, int(i64::from(i16::MIN)));

    statics.set("java/lang/Byte", "MAX_VALUE", types::BYTE, int(i64::from(i8::MAX)));
    statics.set("java/lang/Byte", "MIN_VALUE", types::BYTE, int(i64::from(i8::MIN)));

    statics.set("java/lang/Character", "MAX_VALUE", types::CHAR, int(0xFFFF));
    statics.set("java/lang/Character", "MIN_VALUE", types::CHAR, int(0));

    statics.set("java/lang/Boolean", "TRUE", types::BOOL, int(1));
    statics.set("java/lang/Boolean", "FALSE", types::BOOL, int(0));

    statics.set(
        "java/lang/Double",
        "MAX_VALUE",
        types::DOUBLE,
        JavaValue::Double(f64::MAX),
    );
    statics.set(
        "java/lang/Double",
        "MIN_VALUE",
        types::DOUBLE,
        JavaValue::Double(f64::MIN_POSITIVE),
    );
    statics.set(
        "java/lang/Float",
        "MAX_VALUE",
        types::FLOAT,
        JavaValue::Float(f64::from(f32::MAX)),
    );
}

#[cfg(test)]
mod tests {
    use super::{load_primitive_statics, Statics};
    use crate::value::JavaValue;

    #[test]
    fn preloaded_bounds() {
        let mut statics = Statics::new();
        load_primitive_statics(&mut statics);

        let max = statics.get("java/lang/Integer.MAX_VALUE").unwrap();
        assert_eq!(max.value, JavaValue::Int(2_147_483_647));
        let min = statics.get("java/lang/Long.MIN_VALUE").unwrap();
        assert_eq!(min.value, JavaValue::Long(i64::MIN));
        assert!(statics.get("java/lang/Integer.nope").is_none());
    }
}
