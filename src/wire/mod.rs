//! Binary request and response codec.
//!
//! All integers are little-endian. A message starts with a 2-byte version
//! and a 2-byte attribute count followed by the attributes. Each attribute
//! is a 1-byte name length, the name, a 1-byte wire type and a payload
//! which depends on the type.
//!
//! Responses put a 1-byte effect and a status string between the version
//! and the obligations.

mod reflect;
mod request;
mod response;

pub use reflect::{FieldMut, FieldRef, FieldSink};
pub use request::{
    marshal_request, marshal_request_reflection, marshal_request_to_buffer, request_size,
    unmarshal_request, unmarshal_request_reflection, unmarshal_request_to_buffer,
};
pub use response::{
    marshal_response, unmarshal_response, unmarshal_response_reflection,
    STATUS_OBLIGATIONS_TOO_LONG, STATUS_TOO_LONG,
};

use crate::error::{Error, ErrorKind, Result};
use crate::types::Type;

/// Supported protocol version.
pub const REQUEST_VERSION: u16 = 1;

const VERSION_SIZE: usize = 2;
const SMALL_COUNTER_SIZE: usize = 1;
const BIG_COUNTER_SIZE: usize = 2;
const TYPE_SIZE: usize = 1;
const INTEGER_SIZE: usize = 8;
const FLOAT_SIZE: usize = 8;
const IPV4_SIZE: usize = 4;
const IPV6_SIZE: usize = 16;
const MASK_SIZE: usize = 1;

/// Added to the mask byte of IPv4 networks inside a set of networks.
const IPV4_SET_MASK_MARK: u8 = 0xc0;

/// Wire type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    /// Boolean false, no payload
    BooleanFalse = 0,
    /// Boolean true, no payload
    BooleanTrue,
    /// String
    String,
    /// Integer
    Integer,
    /// Float
    Float,
    /// IPv4 address
    IPv4Address,
    /// IPv6 address
    IPv6Address,
    /// IPv4 network
    IPv4Network,
    /// IPv6 network
    IPv6Network,
    /// Domain name
    Domain,
    /// Set of strings
    SetOfStrings,
    /// Set of networks
    SetOfNetworks,
    /// Set of domains
    SetOfDomains,
    /// List of strings
    ListOfStrings,
    /// Flags
    SetOfFlags,
}

const WIRE_TYPES: [WireType; 15] = [
    WireType::BooleanFalse,
    WireType::BooleanTrue,
    WireType::String,
    WireType::Integer,
    WireType::Float,
    WireType::IPv4Address,
    WireType::IPv6Address,
    WireType::IPv4Network,
    WireType::IPv6Network,
    WireType::Domain,
    WireType::SetOfStrings,
    WireType::SetOfNetworks,
    WireType::SetOfDomains,
    WireType::ListOfStrings,
    WireType::SetOfFlags,
];

impl WireType {
    /// Tag by its byte.
    pub fn from_tag(tag: u8) -> Option<Self> {
        WIRE_TYPES.get(tag as usize).copied()
    }

    /// Human readable name.
    pub fn name(self) -> &'static str {
        match self {
            WireType::BooleanFalse => "boolean false",
            WireType::BooleanTrue => "boolean true",
            WireType::String => "string",
            WireType::Integer => "integer",
            WireType::Float => "float",
            WireType::IPv4Address => "IPv4 address",
            WireType::IPv6Address => "IPv6 address",
            WireType::IPv4Network => "IPv4 network",
            WireType::IPv6Network => "IPv6 network",
            WireType::Domain => "domain",
            WireType::SetOfStrings => "set of strings",
            WireType::SetOfNetworks => "set of networks",
            WireType::SetOfDomains => "set of domains",
            WireType::ListOfStrings => "list of strings",
            WireType::SetOfFlags => "set of flags",
        }
    }

    /// Builtin type the wire type decodes to. Flags have no builtin
    /// counterpart.
    pub fn builtin_type(self) -> Option<Type> {
        match self {
            WireType::BooleanFalse | WireType::BooleanTrue => Some(Type::Boolean),
            WireType::String => Some(Type::String),
            WireType::Integer => Some(Type::Integer),
            WireType::Float => Some(Type::Float),
            WireType::IPv4Address | WireType::IPv6Address => Some(Type::Address),
            WireType::IPv4Network | WireType::IPv6Network => Some(Type::Network),
            WireType::Domain => Some(Type::Domain),
            WireType::SetOfStrings => Some(Type::SetOfStrings),
            WireType::SetOfNetworks => Some(Type::SetOfNetworks),
            WireType::SetOfDomains => Some(Type::SetOfDomains),
            WireType::ListOfStrings => Some(Type::ListOfStrings),
            WireType::SetOfFlags => None,
        }
    }

    fn is_collection(self) -> bool {
        matches!(
            self,
            WireType::SetOfStrings
                | WireType::SetOfNetworks
                | WireType::SetOfDomains
                | WireType::ListOfStrings
                | WireType::SetOfFlags
        )
    }
}

/// Output cursor failing with a buffer overflow instead of growing.
struct Writer<'a> {
    buf: &'a mut [u8],
    off: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, off: 0 }
    }

    fn written(&self) -> usize {
        self.off
    }

    fn reserve(&mut self, n: usize) -> Result<&mut [u8]> {
        if self.buf.len() - self.off < n {
            return Err(Error::new(ErrorKind::RequestBufferOverflow));
        }

        let start = self.off;
        self.off += n;
        Ok(&mut self.buf[start..start + n])
    }

    fn put_bytes(&mut self, b: &[u8]) -> Result<()> {
        self.reserve(b.len())?.copy_from_slice(b);
        Ok(())
    }

    fn put_u8(&mut self, v: u8) -> Result<()> {
        self.put_bytes(&[v])
    }

    fn put_u16(&mut self, v: u16) -> Result<()> {
        self.put_bytes(&v.to_le_bytes())
    }

    fn put_version(&mut self) -> Result<()> {
        self.put_u16(REQUEST_VERSION)
    }

    fn put_count(&mut self, n: usize) -> Result<()> {
        let n = u16::try_from(n)
            .map_err(|_| Error::new(ErrorKind::RequestTooManyAttributes { count: n }))?;
        self.put_u16(n)
    }

    fn put_name(&mut self, name: &str) -> Result<()> {
        let len = u8::try_from(name.len()).map_err(|_| {
            Error::new(ErrorKind::RequestTooLongAttributeName { len: name.len() })
        })?;
        let out = self.reserve(SMALL_COUNTER_SIZE + name.len())?;
        out[0] = len;
        out[SMALL_COUNTER_SIZE..].copy_from_slice(name.as_bytes());
        Ok(())
    }

    fn put_type(&mut self, t: WireType) -> Result<()> {
        self.put_u8(t as u8)
    }

    fn put_string(&mut self, s: &str) -> Result<()> {
        let len = u16::try_from(s.len())
            .map_err(|_| Error::new(ErrorKind::RequestTooLongStringValue { len: s.len() }))?;
        self.put_u16(len)?;
        self.put_bytes(s.as_bytes())
    }
}

/// Input cursor failing with a buffer underflow on short input.
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() < n {
            return Err(Error::new(ErrorKind::RequestBufferUnderflow));
        }

        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        self.take_array().map(u16::from_le_bytes)
    }

    fn version(&mut self) -> Result<()> {
        let actual = self.u16()?;
        if actual != REQUEST_VERSION {
            return Err(Error::new(ErrorKind::RequestVersion {
                actual,
                expected: REQUEST_VERSION,
            }));
        }

        Ok(())
    }

    fn name(&mut self) -> Result<String> {
        let len = self.u8()? as usize;
        utf8(self.take(len)?)
    }

    fn wire_type(&mut self) -> Result<WireType> {
        let tag = self.u8()?;
        WireType::from_tag(tag)
            .ok_or_else(|| Error::new(ErrorKind::RequestAttributeUnmarshallingType { wire_type: tag }))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        utf8(self.take(len)?)
    }
}

fn utf8(b: &[u8]) -> Result<String> {
    std::str::from_utf8(b).map(str::to_string).map_err(|err| {
        Error::new(ErrorKind::RequestInvalidUtf8 {
            offset: err.valid_up_to(),
        })
    })
}
