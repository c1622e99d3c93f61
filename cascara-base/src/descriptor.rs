//! Method and field descriptor parsing (`(IJLjava/lang/String;)V` and
//! friends). Parsing is pure; a malformed descriptor is a VM-internal fault
//! at the call sites, never a Java-level exception.

use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}
impl BaseType {
    #[must_use]
    pub fn from_byte(b: u8) -> Option<BaseType> {
        Some(match b {
            b'B' => BaseType::Byte,
            b'C' => BaseType::Char,
            b'D' => BaseType::Double,
            b'F' => BaseType::Float,
            b'I' => BaseType::Int,
            b'J' => BaseType::Long,
            b'S' => BaseType::Short,
            b'Z' => BaseType::Boolean,
            _ => return None,
        })
    }

    /// Operand stack slots a value of this type occupies.
    #[must_use]
    pub fn slot_count(self) -> u16 {
        match self {
            BaseType::Double | BaseType::Long => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentType {
    Base(BaseType),
    Object(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Base(BaseType),
    Object(Vec<u8>),
    Array { dims: u8, component: ComponentType },
}
impl ParamType {
    #[must_use]
    pub fn slot_count(&self) -> u16 {
        match self {
            ParamType::Base(base) => base.slot_count(),
            ParamType::Object(_) | ParamType::Array { .. } => 1,
        }
    }

    #[must_use]
    pub fn is_wide(&self) -> bool {
        self.slot_count() == 2
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    MissingOpenParen,
    UnexpectedEnd,
    InvalidTypeCode(u8),
    UnterminatedObject,
    TrailingData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    params: SmallVec<[ParamType; 8]>,
    ret: Option<ParamType>,
}
impl MethodDescriptor {
    pub fn parse(desc: &str) -> Result<MethodDescriptor, DescriptorError> {
        let bytes = desc.as_bytes();
        if bytes.first() != Some(&b'(') {
            return Err(DescriptorError::MissingOpenParen);
        }

        let mut pos = 1;
        let mut params = SmallVec::new();
        loop {
            match bytes.get(pos) {
                Some(b')') => {
                    pos += 1;
                    break;
                }
                Some(_) => params.push(parse_type(bytes, &mut pos)?),
                None => return Err(DescriptorError::UnexpectedEnd),
            }
        }

        let ret = match bytes.get(pos) {
            Some(b'V') => {
                pos += 1;
                None
            }
            Some(_) => Some(parse_type(bytes, &mut pos)?),
            None => return Err(DescriptorError::UnexpectedEnd),
        };

        if pos != bytes.len() {
            return Err(DescriptorError::TrailingData);
        }

        Ok(MethodDescriptor { params, ret })
    }

    #[must_use]
    pub fn params(&self) -> &[ParamType] {
        &self.params
    }

    #[must_use]
    pub fn return_type(&self) -> Option<&ParamType> {
        self.ret.as_ref()
    }

    /// Operand-stack slots the declared parameters occupy, receiver excluded.
    #[must_use]
    pub fn param_slots(&self) -> u16 {
        self.params.iter().map(ParamType::slot_count).sum()
    }

    /// Operand-stack slots the return value occupies (0 for void).
    #[must_use]
    pub fn return_slots(&self) -> u16 {
        self.ret.as_ref().map_or(0, ParamType::slot_count)
    }
}

fn parse_type(bytes: &[u8], pos: &mut usize) -> Result<ParamType, DescriptorError> {
    let first = *bytes.get(*pos).ok_or(DescriptorError::UnexpectedEnd)?;
    match first {
        b'[' => {
            let mut dims: u8 = 0;
            while bytes.get(*pos) == Some(&b'[') {
                dims = dims.saturating_add(1);
                *pos += 1;
            }
            let component = match parse_type(bytes, pos)? {
                ParamType::Base(base) => ComponentType::Base(base),
                ParamType::Object(name) => ComponentType::Object(name),
                // Dimensions were all consumed above
                ParamType::Array { .. } => return Err(DescriptorError::InvalidTypeCode(b'[')),
            };
            Ok(ParamType::Array { dims, component })
        }
        b'L' => {
            let start = *pos + 1;
            let end = bytes[start..]
                .iter()
                .position(|&b| b == b';')
                .ok_or(DescriptorError::UnterminatedObject)?;
            *pos = start + end + 1;
            Ok(ParamType::Object(bytes[start..start + end].to_vec()))
        }
        other => {
            let base = BaseType::from_byte(other).ok_or(DescriptorError::InvalidTypeCode(other))?;
            *pos += 1;
            Ok(ParamType::Base(base))
        }
    }
}

/// Parse a single field descriptor (`I`, `[B`, `Ljava/lang/String;`, ...).
pub fn parse_field_descriptor(desc: &str) -> Result<ParamType, DescriptorError> {
    let bytes = desc.as_bytes();
    let mut pos = 0;
    let parsed = parse_type(bytes, &mut pos)?;
    if pos != bytes.len() {
        return Err(DescriptorError::TrailingData);
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::{
        parse_field_descriptor, BaseType, ComponentType, DescriptorError, MethodDescriptor,
        ParamType,
    };

    #[test]
    fn slot_counts_match_declarations() {
        let desc = MethodDescriptor::parse("(IJD)V").unwrap();
        assert_eq!(desc.params().len(), 3);
        assert_eq!(desc.param_slots(), 5);
        assert_eq!(desc.return_slots(), 0);

        let desc = MethodDescriptor::parse("(Ljava/lang/String;[I)J").unwrap();
        assert_eq!(desc.params().len(), 2);
        assert_eq!(desc.param_slots(), 2);
        assert_eq!(desc.return_slots(), 2);

        let desc = MethodDescriptor::parse("()F").unwrap();
        assert_eq!(desc.param_slots(), 0);
        assert_eq!(desc.return_slots(), 1);
    }

    #[test]
    fn nested_arrays() {
        let desc = MethodDescriptor::parse("([[Ljava/lang/String;)V").unwrap();
        assert_eq!(
            desc.params()[0],
            ParamType::Array {
                dims: 2,
                component: ComponentType::Object(b"java/lang/String".to_vec()),
            }
        );
    }

    #[test]
    fn field_descriptors() {
        assert_eq!(
            parse_field_descriptor("I").unwrap(),
            ParamType::Base(BaseType::Int)
        );
        assert_eq!(
            parse_field_descriptor("[B").unwrap(),
            ParamType::Array {
                dims: 1,
                component: ComponentType::Base(BaseType::Byte),
            }
        );
    }

    #[test]
    fn malformed_descriptors_are_rejected() {
        assert_eq!(
            MethodDescriptor::parse("IJ)V"),
            Err(DescriptorError::MissingOpenParen)
        );
        assert_eq!(
            MethodDescriptor::parse("(I"),
            Err(DescriptorError::UnexpectedEnd)
        );
        assert_eq!(
            MethodDescriptor::parse("(Q)V"),
            Err(DescriptorError::InvalidTypeCode(b'Q'))
        );
        assert_eq!(
            MethodDescriptor::parse("(Ljava/lang/String)V"),
            Err(DescriptorError::UnterminatedObject)
        );
        assert_eq!(
            MethodDescriptor::parse("()Vx"),
            Err(DescriptorError::TrailingData)
        );
    }
}
