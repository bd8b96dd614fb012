//! Typed field slots for marshalling from and unmarshalling into caller
//! structures without intermediate attribute lists.

use crate::error::{Error, ErrorKind, Result};
use crate::policy::Effect;
use crate::types::Type;
use crate::value::{canonical_addr, AttributeValue, DomainName, Network};
use std::net::IpAddr;

/// Read-only view of a caller field to marshal.
#[derive(Debug, Clone, Copy)]
pub enum FieldRef<'a> {
    /// bool
    Bool(bool),
    /// i8
    I8(i8),
    /// i16
    I16(i16),
    /// i32
    I32(i32),
    /// i64
    I64(i64),
    /// u8
    U8(u8),
    /// u16
    U16(u16),
    /// u32
    U32(u32),
    /// u64
    U64(u64),
    /// f32
    F32(f32),
    /// f64
    F64(f64),
    /// String or domain name as text
    Str(&'a str),
    /// IP address
    Address(IpAddr),
    /// IP network
    Network(Network),
    /// Domain name
    Domain(&'a DomainName),
}

impl<'a> FieldRef<'a> {
    /// Name of the field kind for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldRef::Bool(_) => "bool",
            FieldRef::I8(_) => "i8",
            FieldRef::I16(_) => "i16",
            FieldRef::I32(_) => "i32",
            FieldRef::I64(_) => "i64",
            FieldRef::U8(_) => "u8",
            FieldRef::U16(_) => "u16",
            FieldRef::U32(_) => "u32",
            FieldRef::U64(_) => "u64",
            FieldRef::F32(_) => "f32",
            FieldRef::F64(_) => "f64",
            FieldRef::Str(_) => "string",
            FieldRef::Address(_) => "IP address",
            FieldRef::Network(_) => "network",
            FieldRef::Domain(_) => "domain name",
        }
    }

    fn integer(&self) -> Option<Result<i64>> {
        let v = match *self {
            FieldRef::I8(v) => v as i64,
            FieldRef::I16(v) => v as i64,
            FieldRef::I32(v) => v as i64,
            FieldRef::I64(v) => v,
            FieldRef::U8(v) => v as i64,
            FieldRef::U16(v) => v as i64,
            FieldRef::U32(v) => v as i64,
            FieldRef::U64(v) => {
                return Some(i64::try_from(v).map_err(|_| {
                    Error::new(ErrorKind::IntegerOverflow {
                        value: v as i128,
                        target: "i64".to_string(),
                    })
                }))
            }
            _ => return None,
        };

        Some(Ok(v))
    }

    /// Convert the field to a value of the type.
    pub fn to_value(&self, t: &Type) -> Result<AttributeValue> {
        let mismatch = || {
            Error::new(ErrorKind::FieldTypeMismatch {
                value: self.kind().to_string(),
                target: t.name().to_string(),
            })
        };

        match (t, *self) {
            (Type::Boolean, FieldRef::Bool(b)) => Ok(AttributeValue::Boolean(b)),
            (Type::String, FieldRef::Str(s)) => Ok(AttributeValue::String(s.to_string())),
            (Type::Integer, _) => match self.integer() {
                Some(v) => v.map(AttributeValue::Integer),
                None => Err(mismatch()),
            },
            (Type::Float, FieldRef::F32(f)) => Ok(AttributeValue::Float(f as f64)),
            (Type::Float, FieldRef::F64(f)) => Ok(AttributeValue::Float(f)),
            (Type::Address, FieldRef::Address(a)) => Ok(AttributeValue::Address(canonical_addr(a))),
            (Type::Network, FieldRef::Network(n)) => Ok(AttributeValue::Network(n)),
            (Type::Domain, FieldRef::Domain(d)) => Ok(AttributeValue::Domain(d.clone())),
            (Type::Domain, FieldRef::Str(s)) => DomainName::new(s).map(AttributeValue::Domain),
            (
                Type::Boolean
                | Type::String
                | Type::Float
                | Type::Address
                | Type::Network
                | Type::Domain,
                _,
            ) => Err(mismatch()),
            _ => Err(Error::new(ErrorKind::RequestAttributeMarshallingNotImplemented {
                type_name: t.name().to_string(),
            })),
        }
    }
}

/// Writable caller field an unmarshalled value goes to.
///
/// Every setter validates first and writes only on success so a failed
/// call leaves the field as it was.
#[derive(Debug)]
pub enum FieldMut<'a> {
    /// bool
    Bool(&'a mut bool),
    /// i8
    I8(&'a mut i8),
    /// i16
    I16(&'a mut i16),
    /// i32
    I32(&'a mut i32),
    /// i64
    I64(&'a mut i64),
    /// u8
    U8(&'a mut u8),
    /// u16
    U16(&'a mut u16),
    /// u32
    U32(&'a mut u32),
    /// u64
    U64(&'a mut u64),
    /// f32
    F32(&'a mut f32),
    /// f64
    F64(&'a mut f64),
    /// String
    String(&'a mut String),
    /// IP address
    Address(&'a mut IpAddr),
    /// IP network
    Network(&'a mut Network),
    /// Domain name
    Domain(&'a mut DomainName),
    /// Response status as an error
    Status(&'a mut Option<Error>),
}

macro_rules! check_range {
    ($t:ty, $i:expr) => {{
        let i = $i;
        if (i as i128) < <$t>::MIN as i128 {
            return Err(Error::new(ErrorKind::IntegerUnderflow {
                value: i as i128,
                target: stringify!($t).to_string(),
            }));
        }
        if (i as i128) > <$t>::MAX as i128 {
            return Err(Error::new(ErrorKind::IntegerOverflow {
                value: i as i128,
                target: stringify!($t).to_string(),
            }));
        }
    }};
}

impl<'a> FieldMut<'a> {
    /// Name of the field kind for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldMut::Bool(_) => "bool",
            FieldMut::I8(_) => "i8",
            FieldMut::I16(_) => "i16",
            FieldMut::I32(_) => "i32",
            FieldMut::I64(_) => "i64",
            FieldMut::U8(_) => "u8",
            FieldMut::U16(_) => "u16",
            FieldMut::U32(_) => "u32",
            FieldMut::U64(_) => "u64",
            FieldMut::F32(_) => "f32",
            FieldMut::F64(_) => "f64",
            FieldMut::String(_) => "string",
            FieldMut::Address(_) => "IP address",
            FieldMut::Network(_) => "network",
            FieldMut::Domain(_) => "domain name",
            FieldMut::Status(_) => "status",
        }
    }

    fn mismatch(&self, value: &str) -> Error {
        Error::new(ErrorKind::FieldTypeMismatch {
            value: value.to_string(),
            target: self.kind().to_string(),
        })
    }

    /// Set a boolean.
    pub fn set_bool(self, b: bool) -> Result<()> {
        match self {
            FieldMut::Bool(slot) => *slot = b,
            other => return Err(other.mismatch("boolean")),
        }
        Ok(())
    }

    /// Set a string.
    pub fn set_string(self, s: &str) -> Result<()> {
        match self {
            FieldMut::String(slot) => *slot = s.to_string(),
            other => return Err(other.mismatch("string")),
        }
        Ok(())
    }

    fn check_int(&self, i: i64) -> Result<()> {
        match self {
            FieldMut::I8(_) => check_range!(i8, i),
            FieldMut::I16(_) => check_range!(i16, i),
            FieldMut::I32(_) => check_range!(i32, i),
            FieldMut::I64(_) => {}
            FieldMut::U8(_) => check_range!(u8, i),
            FieldMut::U16(_) => check_range!(u16, i),
            FieldMut::U32(_) => check_range!(u32, i),
            FieldMut::U64(_) => check_range!(u64, i),
            other => return Err(other.mismatch("integer")),
        }
        Ok(())
    }

    /// Set an integer checking the range of the field.
    pub fn set_int(self, i: i64) -> Result<()> {
        self.check_int(i)?;
        match self {
            FieldMut::I8(slot) => *slot = i as i8,
            FieldMut::I16(slot) => *slot = i as i16,
            FieldMut::I32(slot) => *slot = i as i32,
            FieldMut::I64(slot) => *slot = i,
            FieldMut::U8(slot) => *slot = i as u8,
            FieldMut::U16(slot) => *slot = i as u16,
            FieldMut::U32(slot) => *slot = i as u32,
            FieldMut::U64(slot) => *slot = i as u64,
            _ => {}
        }
        Ok(())
    }

    /// Set a float.
    pub fn set_float(self, f: f64) -> Result<()> {
        match self {
            FieldMut::F32(slot) => *slot = f as f32,
            FieldMut::F64(slot) => *slot = f,
            other => return Err(other.mismatch("float")),
        }
        Ok(())
    }

    /// Set an address.
    pub fn set_address(self, a: IpAddr) -> Result<()> {
        match self {
            FieldMut::Address(slot) => *slot = a,
            other => return Err(other.mismatch("address")),
        }
        Ok(())
    }

    /// Set a network.
    pub fn set_network(self, n: Network) -> Result<()> {
        match self {
            FieldMut::Network(slot) => *slot = n,
            other => return Err(other.mismatch("network")),
        }
        Ok(())
    }

    /// Set a domain to a domain name or a string field.
    pub fn set_domain(self, d: &DomainName) -> Result<()> {
        match self {
            FieldMut::Domain(slot) => *slot = d.clone(),
            FieldMut::String(slot) => *slot = d.to_string(),
            other => return Err(other.mismatch("domain")),
        }
        Ok(())
    }

    /// Check that [`FieldMut::set_value`] would accept the value without
    /// touching the field.
    pub fn check_value(&self, v: &AttributeValue) -> Result<()> {
        let (fits, name) = match v {
            AttributeValue::Boolean(_) => (matches!(self, FieldMut::Bool(_)), "boolean"),
            AttributeValue::String(_) => (matches!(self, FieldMut::String(_)), "string"),
            AttributeValue::Integer(i) => return self.check_int(*i),
            AttributeValue::Float(_) => (matches!(self, FieldMut::F32(_) | FieldMut::F64(_)), "float"),
            AttributeValue::Address(_) => (matches!(self, FieldMut::Address(_)), "address"),
            AttributeValue::Network(_) => (matches!(self, FieldMut::Network(_)), "network"),
            AttributeValue::Domain(_) => (
                matches!(self, FieldMut::Domain(_) | FieldMut::String(_)),
                "domain",
            ),
            other => {
                return Err(Error::new(
                    ErrorKind::RequestAttributeUnmarshallingNotImplemented {
                        type_name: other.get_result_type().name().to_string(),
                    },
                ))
            }
        };

        if fits {
            Ok(())
        } else {
            Err(self.mismatch(name))
        }
    }

    /// Set any scalar value.
    pub fn set_value(self, v: &AttributeValue) -> Result<()> {
        self.check_value(v)?;
        match v {
            AttributeValue::Boolean(b) => self.set_bool(*b),
            AttributeValue::String(s) => self.set_string(s),
            AttributeValue::Integer(i) => self.set_int(*i),
            AttributeValue::Float(f) => self.set_float(*f),
            AttributeValue::Address(a) => self.set_address(*a),
            AttributeValue::Network(n) => self.set_network(*n),
            AttributeValue::Domain(d) => self.set_domain(d),
            other => Err(Error::new(
                ErrorKind::RequestAttributeUnmarshallingNotImplemented {
                    type_name: other.get_result_type().name().to_string(),
                },
            )),
        }
    }

    /// Check that [`FieldMut::set_effect`] would accept the effect.
    pub fn check_effect(&self, effect: Effect) -> Result<()> {
        match self {
            FieldMut::Bool(_) | FieldMut::String(_) => Ok(()),
            FieldMut::I8(_)
            | FieldMut::I16(_)
            | FieldMut::I32(_)
            | FieldMut::I64(_)
            | FieldMut::U8(_)
            | FieldMut::U16(_)
            | FieldMut::U32(_)
            | FieldMut::U64(_) => self.check_int(effect.code() as i64),
            other => Err(other.mismatch("effect")),
        }
    }

    /// Check that [`FieldMut::set_status`] would accept a status.
    pub fn check_status(&self) -> Result<()> {
        match self {
            FieldMut::String(_) | FieldMut::Status(_) => Ok(()),
            other => Err(other.mismatch("status")),
        }
    }

    /// Set an effect. Booleans get true for Permit only, integers get the
    /// effect code and strings get the effect name.
    pub fn set_effect(self, effect: Effect) -> Result<()> {
        match self {
            FieldMut::Bool(slot) => {
                *slot = effect == Effect::Permit;
                Ok(())
            }
            FieldMut::String(slot) => {
                *slot = effect.as_str().to_string();
                Ok(())
            }
            slot @ (FieldMut::I8(_)
            | FieldMut::I16(_)
            | FieldMut::I32(_)
            | FieldMut::I64(_)
            | FieldMut::U8(_)
            | FieldMut::U16(_)
            | FieldMut::U32(_)
            | FieldMut::U64(_)) => slot.set_int(effect.code() as i64),
            other => Err(other.mismatch("effect")),
        }
    }

    /// Set a response status. Error slots get a server error for a non-empty
    /// status and stay untouched otherwise.
    pub fn set_status(self, status: &str) -> Result<()> {
        match self {
            FieldMut::String(slot) => *slot = status.to_string(),
            FieldMut::Status(slot) => {
                if !status.is_empty() {
                    *slot = Some(Error::new(ErrorKind::ResponseServerError {
                        status: status.to_string(),
                    }));
                }
            }
            other => return Err(other.mismatch("status")),
        }
        Ok(())
    }
}

/// Destination of reflection unmarshalling.
pub trait FieldSink {
    /// Slot for the attribute. `None` skips it.
    fn field(&mut self, id: &str, t: &Type) -> Option<FieldMut<'_>>;

    /// Slot for the response effect.
    fn effect(&mut self) -> Option<FieldMut<'_>> {
        None
    }

    /// Slot for the response status.
    fn status(&mut self) -> Option<FieldMut<'_>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_int_range() {
        let mut v: u8 = 7;
        FieldMut::U8(&mut v).set_int(255).unwrap();
        assert_eq!(v, 255);

        let err = FieldMut::U8(&mut v).set_int(256).unwrap_err();
        assert_eq!(err.to_string(), "#5b: Integer 256 overflows u8");
        let err = FieldMut::U8(&mut v).set_int(-1).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::IntegerUnderflow { .. }));
        assert_eq!(v, 255);

        let mut v: i16 = 0;
        FieldMut::I16(&mut v).set_int(-32768).unwrap();
        assert_eq!(v, -32768);
        assert!(FieldMut::I16(&mut v).set_int(-32769).is_err());

        let mut v: u64 = 0;
        assert!(FieldMut::U64(&mut v).set_int(-5).is_err());
        FieldMut::U64(&mut v).set_int(i64::MAX).unwrap();
        assert_eq!(v, i64::MAX as u64);
    }

    #[test]
    fn test_set_mismatch() {
        let mut b = false;
        let err = FieldMut::Bool(&mut b).set_int(1).unwrap_err();
        assert_eq!(err.to_string(), "#5a: Can't set integer value to bool field");

        let mut s = String::new();
        let err = FieldMut::String(&mut s).set_value(&AttributeValue::list_of_strings(["a"]));
        assert!(matches!(
            err.unwrap_err().kind(),
            ErrorKind::RequestAttributeUnmarshallingNotImplemented { .. }
        ));
    }

    #[test]
    fn test_set_effect() {
        let mut b = false;
        FieldMut::Bool(&mut b).set_effect(Effect::Permit).unwrap();
        assert!(b);
        FieldMut::Bool(&mut b).set_effect(Effect::IndeterminateP).unwrap();
        assert!(!b);

        let mut code: u8 = 0;
        FieldMut::U8(&mut code).set_effect(Effect::NotApplicable).unwrap();
        assert_eq!(code, Effect::NotApplicable.code());

        let mut name = String::new();
        FieldMut::String(&mut name).set_effect(Effect::Deny).unwrap();
        assert_eq!(name, "Deny");

        let mut f = 0.0;
        assert!(FieldMut::F64(&mut f).set_effect(Effect::Deny).is_err());
    }

    #[test]
    fn test_set_status() {
        let mut err = None;
        FieldMut::Status(&mut err).set_status("").unwrap();
        assert!(err.is_none());
        FieldMut::Status(&mut err).set_status("boom").unwrap();
        assert_eq!(err.unwrap().to_string(), "#5f: Server error: boom");
    }

    #[test]
    fn test_field_ref_to_value() {
        let v = FieldRef::U16(80).to_value(&Type::Integer).unwrap();
        assert!(matches!(v, AttributeValue::Integer(80)));

        let err = FieldRef::U64(u64::MAX).to_value(&Type::Integer).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::IntegerOverflow { .. }));

        let v = FieldRef::Str("Example.COM").to_value(&Type::Domain).unwrap();
        assert_eq!(v.domain().unwrap().as_str(), "example.com");

        let err = FieldRef::Bool(true).to_value(&Type::String).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::FieldTypeMismatch { .. }));

        let err = FieldRef::Str("a").to_value(&Type::SetOfStrings).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::RequestAttributeMarshallingNotImplemented { .. }
        ));
    }
}
