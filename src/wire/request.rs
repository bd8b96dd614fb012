//! Request marshalling.

use super::{
    FieldRef, FieldSink, Reader, WireType, Writer, BIG_COUNTER_SIZE, FLOAT_SIZE, INTEGER_SIZE,
    IPV4_SET_MASK_MARK, IPV4_SIZE, IPV6_SIZE, MASK_SIZE, SMALL_COUNTER_SIZE, TYPE_SIZE,
    VERSION_SIZE,
};
use crate::error::{Error, ErrorContext, ErrorKind, Result};
use crate::types::Type;
use crate::value::{AttributeValue, DomainName, Network};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Exact number of bytes [`marshal_request_to_buffer`] writes for the
/// attributes.
pub fn request_size<S: AsRef<str>>(attrs: &[(S, AttributeValue)]) -> Result<usize> {
    attributes_size(attrs).map(|n| VERSION_SIZE + n)
}

/// Marshal attributes to a new buffer.
pub fn marshal_request<S: AsRef<str>>(attrs: &[(S, AttributeValue)]) -> Result<Vec<u8>> {
    let mut b = vec![0; request_size(attrs)?];
    let n = put_request(&mut b, attrs)?;
    b.truncate(n);
    Ok(b)
}

/// Marshal attributes to the caller's buffer and return the number of bytes
/// written. The buffer isn't touched if the request doesn't fit.
pub fn marshal_request_to_buffer<S: AsRef<str>>(
    b: &mut [u8],
    attrs: &[(S, AttributeValue)],
) -> Result<usize> {
    if request_size(attrs)? > b.len() {
        return Err(Error::new(ErrorKind::RequestBufferOverflow));
    }

    put_request(b, attrs)
}

fn put_request<S: AsRef<str>>(b: &mut [u8], attrs: &[(S, AttributeValue)]) -> Result<usize> {
    let mut w = Writer::new(b);
    w.put_version()?;
    put_attributes(&mut w, attrs)?;
    Ok(w.written())
}

/// Marshal `count` caller fields. The callback returns the id, the type and
/// the field for each index.
pub fn marshal_request_reflection<'a, F>(count: usize, f: F) -> Result<Vec<u8>>
where
    F: Fn(usize) -> Result<(&'a str, Type, FieldRef<'a>)>,
{
    let attrs = (0..count)
        .map(|i| {
            let (id, t, field) = f(i)?;
            field.to_value(&t).bind(id).map(|v| (id, v))
        })
        .collect::<Result<Vec<_>>>()?;

    marshal_request(&attrs)
}

/// Unmarshal all attributes of a request.
pub fn unmarshal_request(b: &[u8]) -> Result<Vec<(String, AttributeValue)>> {
    let mut r = Reader::new(b);
    r.version()?;
    get_attributes(&mut r)
}

/// Unmarshal attributes into the caller's array and return their number.
/// The array isn't touched if the request is broken or doesn't fit.
pub fn unmarshal_request_to_buffer(
    b: &[u8],
    out: &mut [(String, AttributeValue)],
) -> Result<usize> {
    let attrs = unmarshal_request(b)?;
    if attrs.len() > out.len() {
        return Err(Error::new(ErrorKind::RequestAssignmentsOverflow {
            count: attrs.len(),
            capacity: out.len(),
        }));
    }

    let n = attrs.len();
    for (slot, attr) in out.iter_mut().zip(attrs) {
        *slot = attr;
    }

    Ok(n)
}

/// Unmarshal attributes into fields the sink provides. The whole request
/// is decoded before any field is set.
pub fn unmarshal_request_reflection<S: FieldSink + ?Sized>(b: &[u8], sink: &mut S) -> Result<()> {
    let mut r = Reader::new(b);
    r.version()?;
    let attrs = get_attributes(&mut r)?;
    set_fields(&attrs, sink)
}

pub(super) fn set_fields<S: FieldSink + ?Sized>(
    attrs: &[(String, AttributeValue)],
    sink: &mut S,
) -> Result<()> {
    check_fields(attrs, sink)?;
    for (id, v) in attrs {
        if let Some(field) = sink.field(id, &v.get_result_type()) {
            field.set_value(v).bind(id.as_str())?;
        }
    }

    Ok(())
}

/// Fails if any field would reject its value, so that either all fields are
/// set or none.
pub(super) fn check_fields<S: FieldSink + ?Sized>(
    attrs: &[(String, AttributeValue)],
    sink: &mut S,
) -> Result<()> {
    for (id, v) in attrs {
        if let Some(field) = sink.field(id, &v.get_result_type()) {
            field.check_value(v).bind(id.as_str())?;
        }
    }

    Ok(())
}

fn attributes_size<S: AsRef<str>>(attrs: &[(S, AttributeValue)]) -> Result<usize> {
    if attrs.len() > u16::MAX as usize {
        return Err(Error::new(ErrorKind::RequestTooManyAttributes {
            count: attrs.len(),
        }));
    }

    attrs.iter().try_fold(BIG_COUNTER_SIZE, |total, (id, v)| {
        let id = id.as_ref();
        if id.len() > u8::MAX as usize {
            return Err(Error::new(ErrorKind::RequestTooLongAttributeName { len: id.len() }));
        }

        let n = value_size(v).bind(id)?;
        Ok(total + SMALL_COUNTER_SIZE + id.len() + n)
    })
}

fn string_size(s: &str) -> Result<usize> {
    if s.len() > u16::MAX as usize {
        return Err(Error::new(ErrorKind::RequestTooLongStringValue { len: s.len() }));
    }

    Ok(BIG_COUNTER_SIZE + s.len())
}

fn collection_size<I, F>(t: Type, items: I, item_size: F) -> Result<usize>
where
    I: ExactSizeIterator,
    F: Fn(I::Item) -> Result<usize>,
{
    if items.len() > u16::MAX as usize {
        return Err(Error::new(ErrorKind::RequestTooLongCollectionValue {
            type_name: t.name().to_string(),
            count: items.len(),
        }));
    }

    items
        .enumerate()
        .try_fold(BIG_COUNTER_SIZE, |total, (i, item)| {
            Ok(total + item_size(item).bind_with(|| (i + 1).to_string())?)
        })
}

fn addr_size(a: &IpAddr) -> usize {
    match a {
        IpAddr::V4(_) => IPV4_SIZE,
        IpAddr::V6(_) => IPV6_SIZE,
    }
}

fn value_size(v: &AttributeValue) -> Result<usize> {
    let payload = match v {
        AttributeValue::Boolean(_) => 0,
        AttributeValue::String(s) => string_size(s)?,
        AttributeValue::Integer(_) => INTEGER_SIZE,
        AttributeValue::Float(_) => FLOAT_SIZE,
        AttributeValue::Address(a) => addr_size(a),
        AttributeValue::Network(n) => MASK_SIZE + addr_size(&n.addr()),
        AttributeValue::Domain(d) => string_size(d.as_str())?,
        AttributeValue::SetOfStrings(s) => collection_size(
            Type::SetOfStrings,
            s.iter_sorted_by_insertion().into_iter(),
            string_size,
        )?,
        AttributeValue::SetOfNetworks(s) => {
            let nets: Vec<Network> = s.iter().map(|(n, _)| n).collect();
            collection_size(Type::SetOfNetworks, nets.iter(), |n| {
                Ok(MASK_SIZE + addr_size(&n.addr()))
            })?
        }
        AttributeValue::SetOfDomains(s) => {
            let names: Vec<String> = s.iter().map(|(d, _)| d).collect();
            collection_size(Type::SetOfDomains, names.iter(), |d| string_size(d))?
        }
        AttributeValue::ListOfStrings(l) => {
            collection_size(Type::ListOfStrings, l.iter(), |s| string_size(s))?
        }
        AttributeValue::Flags(t, _) => SMALL_COUNTER_SIZE + t.capacity() / 8,
        AttributeValue::Undefined => {
            return Err(Error::new(
                ErrorKind::RequestAttributeMarshallingNotImplemented {
                    type_name: v.get_result_type().name().to_string(),
                },
            ))
        }
    };

    Ok(TYPE_SIZE + payload)
}

pub(super) fn put_attributes<S: AsRef<str>>(
    w: &mut Writer<'_>,
    attrs: &[(S, AttributeValue)],
) -> Result<()> {
    w.put_count(attrs.len())?;
    for (id, v) in attrs {
        let id = id.as_ref();
        w.put_name(id)?;
        put_value(w, v).bind(id)?;
    }

    Ok(())
}

fn put_addr(w: &mut Writer<'_>, a: &IpAddr) -> Result<()> {
    match a {
        IpAddr::V4(a) => w.put_bytes(&a.octets()),
        IpAddr::V6(a) => w.put_bytes(&a.octets()),
    }
}

fn put_strings<'s>(
    w: &mut Writer<'_>,
    t: WireType,
    items: impl ExactSizeIterator<Item = &'s str>,
) -> Result<()> {
    w.put_type(t)?;
    w.put_u16(items.len() as u16)?;
    for s in items {
        w.put_string(s)?;
    }

    Ok(())
}

fn put_value(w: &mut Writer<'_>, v: &AttributeValue) -> Result<()> {
    // Sizes and limits are checked up front by value_size.
    value_size(v)?;

    match v {
        AttributeValue::Boolean(false) => w.put_type(WireType::BooleanFalse),
        AttributeValue::Boolean(true) => w.put_type(WireType::BooleanTrue),
        AttributeValue::String(s) => {
            w.put_type(WireType::String)?;
            w.put_string(s)
        }
        AttributeValue::Integer(i) => {
            w.put_type(WireType::Integer)?;
            w.put_bytes(&i.to_le_bytes())
        }
        AttributeValue::Float(f) => {
            w.put_type(WireType::Float)?;
            w.put_bytes(&f.to_le_bytes())
        }
        AttributeValue::Address(a) => {
            w.put_type(match a {
                IpAddr::V4(_) => WireType::IPv4Address,
                IpAddr::V6(_) => WireType::IPv6Address,
            })?;
            put_addr(w, a)
        }
        AttributeValue::Network(n) => {
            w.put_type(if n.is_ipv4() {
                WireType::IPv4Network
            } else {
                WireType::IPv6Network
            })?;
            w.put_u8(n.prefix())?;
            put_addr(w, &n.addr())
        }
        AttributeValue::Domain(d) => {
            w.put_type(WireType::Domain)?;
            w.put_string(d.as_str())
        }
        AttributeValue::SetOfStrings(s) => put_strings(
            w,
            WireType::SetOfStrings,
            s.iter_sorted_by_insertion().into_iter(),
        ),
        AttributeValue::SetOfNetworks(s) => {
            let nets: Vec<Network> = s.iter().map(|(n, _)| n).collect();
            w.put_type(WireType::SetOfNetworks)?;
            w.put_u16(nets.len() as u16)?;
            for n in &nets {
                let mark = if n.is_ipv4() { IPV4_SET_MASK_MARK } else { 0 };
                w.put_u8(n.prefix() + mark)?;
                put_addr(w, &n.addr())?;
            }
            Ok(())
        }
        AttributeValue::SetOfDomains(s) => {
            let names: Vec<String> = s.iter().map(|(d, _)| d).collect();
            put_strings(w, WireType::SetOfDomains, names.iter().map(String::as_str))
        }
        AttributeValue::ListOfStrings(l) => {
            put_strings(w, WireType::ListOfStrings, l.iter().map(String::as_str))
        }
        AttributeValue::Flags(t, bits) => {
            w.put_type(WireType::SetOfFlags)?;
            w.put_u8(t.flags().len() as u8)?;
            let bytes = bits.to_le_bytes();
            w.put_bytes(&bytes[..t.capacity() / 8])
        }
        AttributeValue::Undefined => Ok(()),
    }
}

pub(super) fn get_attributes(r: &mut Reader<'_>) -> Result<Vec<(String, AttributeValue)>> {
    let count = r.u16()? as usize;
    (0..count)
        .map(|i| get_attribute(r).bind_with(|| (i + 1).to_string()))
        .collect()
}

fn get_attribute(r: &mut Reader<'_>) -> Result<(String, AttributeValue)> {
    let id = r.name().bind("name")?;
    let v = get_value(r).bind(id.as_str())?;
    Ok((id, v))
}

fn get_value(r: &mut Reader<'_>) -> Result<AttributeValue> {
    let t = r.wire_type().bind("type")?;
    if t.is_collection() {
        return Err(Error::new(
            ErrorKind::RequestAttributeUnmarshallingNotImplemented {
                type_name: t.name().to_string(),
            },
        ));
    }

    get_scalar(r, t).bind("value")
}

fn get_scalar(r: &mut Reader<'_>, t: WireType) -> Result<AttributeValue> {
    let v = match t {
        WireType::BooleanFalse => AttributeValue::Boolean(false),
        WireType::BooleanTrue => AttributeValue::Boolean(true),
        WireType::String => AttributeValue::String(r.string()?),
        WireType::Integer => AttributeValue::Integer(i64::from_le_bytes(r.take_array()?)),
        WireType::Float => AttributeValue::Float(f64::from_le_bytes(r.take_array()?)),
        WireType::IPv4Address => {
            AttributeValue::Address(IpAddr::V4(Ipv4Addr::from(r.take_array::<IPV4_SIZE>()?)))
        }
        WireType::IPv6Address => {
            AttributeValue::Address(IpAddr::V6(Ipv6Addr::from(r.take_array::<IPV6_SIZE>()?)))
        }
        WireType::IPv4Network => {
            let mask = r.u8()?;
            let addr = Ipv4Addr::from(r.take_array::<IPV4_SIZE>()?);
            if mask > 32 {
                return Err(Error::new(ErrorKind::RequestIPv4InvalidMask { mask }));
            }
            AttributeValue::Network(Network::new(IpAddr::V4(addr), mask)?)
        }
        WireType::IPv6Network => {
            let mask = r.u8()?;
            let addr = Ipv6Addr::from(r.take_array::<IPV6_SIZE>()?);
            if mask > 128 {
                return Err(Error::new(ErrorKind::RequestIPv6InvalidMask { mask }));
            }
            network_v6(addr, mask)?
        }
        WireType::Domain => AttributeValue::Domain(DomainName::new(&r.string()?)?),
        collection => {
            return Err(Error::new(
                ErrorKind::RequestAttributeUnmarshallingNotImplemented {
                    type_name: collection.name().to_string(),
                },
            ))
        }
    };

    Ok(v)
}

// IPv4-mapped networks stay IPv6 on the wire but are canonicalized to IPv4
// which shortens the prefix by the mapping bits.
fn network_v6(addr: Ipv6Addr, mask: u8) -> Result<AttributeValue> {
    let n = match addr.to_ipv4_mapped() {
        Some(v4) if mask >= 96 => Network::new(IpAddr::V4(v4), mask - 96)?,
        _ => Network::new(IpAddr::V6(addr), mask)?,
    };

    Ok(AttributeValue::Network(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::parse_addr;
    use crate::wire::FieldMut;

    fn sample() -> Vec<(&'static str, AttributeValue)> {
        vec![
            ("b", AttributeValue::Boolean(true)),
            ("f", AttributeValue::Boolean(false)),
            ("s", AttributeValue::String("test".into())),
            ("i", AttributeValue::Integer(-42)),
            ("x", AttributeValue::Float(1.5)),
            ("a4", AttributeValue::Address(parse_addr("192.0.2.1").unwrap())),
            ("a6", AttributeValue::Address(parse_addr("2001:db8::1").unwrap())),
            ("n4", AttributeValue::Network("192.0.2.0/24".parse().unwrap())),
            ("n6", AttributeValue::Network("2001:db8::/32".parse().unwrap())),
            ("d", AttributeValue::Domain(DomainName::new("example.com").unwrap())),
        ]
    }

    #[test]
    fn test_marshal_layout() {
        let b = marshal_request(&[
            ("b", AttributeValue::Boolean(true)),
            ("s", AttributeValue::String("ab".into())),
            ("i", AttributeValue::Integer(1)),
        ])
        .unwrap();

        assert_eq!(
            b,
            vec![
                1, 0, 3, 0, //
                1, b'b', 1, //
                1, b's', 2, 2, 0, b'a', b'b', //
                1, b'i', 3, 1, 0, 0, 0, 0, 0, 0, 0,
            ]
        );
    }

    #[test]
    fn test_round_trip() {
        let attrs = sample();
        let b = marshal_request(&attrs).unwrap();
        assert_eq!(b.len(), request_size(&attrs).unwrap());

        let out = unmarshal_request(&b).unwrap();
        assert_eq!(out.len(), attrs.len());
        for ((id, v), (eid, ev)) in out.iter().zip(&attrs) {
            assert_eq!(id, eid);
            assert_eq!(v.to_string(), ev.to_string());
        }
    }

    #[test]
    fn test_collections_marshal_only() {
        let attrs = [
            ("ss", AttributeValue::set_of_strings(["b", "a"])),
            ("ls", AttributeValue::list_of_strings(["x", "y", "x"])),
        ];
        let b = marshal_request(&attrs).unwrap();
        assert_eq!(
            &b[4..20],
            &[2, b's', b's', 10, 2, 0, 1, 0, b'b', 1, 0, b'a', 2, b'l', b's', 13]
        );

        let err = unmarshal_request(&b).unwrap_err();
        assert_eq!(
            err.to_string(),
            "#56 (1>ss): Unmarshalling for type set of strings hasn't been implemented"
        );
    }

    #[test]
    fn test_marshal_limits() {
        let long = "x".repeat(256);
        let err = marshal_request(&[(long.as_str(), AttributeValue::Boolean(true))]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::RequestTooLongAttributeName { len: 256 }));

        let err = marshal_request(&[("s", AttributeValue::String("x".repeat(65536)))]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "#52 (s): Expected string value no longer than 65535 bytes but got 65536 bytes"
        );

        let err = marshal_request(&[("u", AttributeValue::Undefined)]).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::RequestAttributeMarshallingNotImplemented { .. }
        ));

        let mut small = [0u8; 5];
        let err = marshal_request_to_buffer(&mut small, &sample()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::RequestBufferOverflow));
    }

    #[test]
    fn test_marshal_overflow_leaves_buffer() {
        let attrs = [("a", AttributeValue::String("0123456789abcdef".into()))];
        let mut b = [0xaau8; 12];
        let err = marshal_request_to_buffer(&mut b, &attrs).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::RequestBufferOverflow));
        assert!(b.iter().all(|&x| x == 0xaa));

        let mut b = vec![0xaau8; request_size(&attrs).unwrap()];
        assert_eq!(marshal_request_to_buffer(&mut b, &attrs).unwrap(), b.len());
        assert_eq!(&b[..4], &[1, 0, 1, 0]);
    }

    #[test]
    fn test_unmarshal_errors() {
        let err = unmarshal_request(&[2, 0, 0, 0]).unwrap_err();
        assert_eq!(err.to_string(), "#4f: Expected request version 1 but got 2");

        let err = unmarshal_request(&[1]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::RequestBufferUnderflow));

        let err = unmarshal_request(&[1, 0, 1, 0, 1, b'x', 200]).unwrap_err();
        assert_eq!(err.to_string(), "#55 (1>x>type): Unknown attribute type 200");

        let err = unmarshal_request(&[1, 0, 1, 0, 1, b'n', 7, 33, 10, 0, 0, 0]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::RequestIPv4InvalidMask { mask: 33 }));

        let err = unmarshal_request(&[1, 0, 1, 0, 2, 0xff, 0xfe, 2, 1, 0, b'x']).unwrap_err();
        assert_eq!(
            err.to_string(),
            "#61 (1>name): Expected UTF-8 encoded string but got invalid byte at 0"
        );
        let err = unmarshal_request(&[1, 0, 1, 0, 1, b's', 2, 2, 0, b'x', 0xc3]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "#61 (1>s>value): Expected UTF-8 encoded string but got invalid byte at 1"
        );
        assert!(matches!(
            unmarshal_request(&[1, 0, 1, 0, 1, b'd', 9, 1, 0, 0x80]).unwrap_err().kind(),
            ErrorKind::RequestInvalidUtf8 { offset: 0 }
        ));

        let mut b = vec![1, 0, 1, 0, 1, b'n', 8, 129];
        b.extend_from_slice(&[0; 16]);
        let err = unmarshal_request(&b).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::RequestIPv6InvalidMask { mask: 129 }));
    }

    #[test]
    fn test_unmarshal_to_buffer() {
        let b = marshal_request(&sample()).unwrap();

        let mut out = vec![(String::new(), AttributeValue::Undefined); 3];
        let err = unmarshal_request_to_buffer(&b, &mut out).unwrap_err();
        assert_eq!(
            err.to_string(),
            "#59: Expected no more than 3 attributes but got 10"
        );
        assert!(out.iter().all(|(id, _)| id.is_empty()));

        let mut out = vec![(String::new(), AttributeValue::Undefined); 16];
        assert_eq!(unmarshal_request_to_buffer(&b, &mut out).unwrap(), 10);
        assert_eq!(out[2].0, "s");
    }

    struct Fields {
        flag: bool,
        name: String,
        port: u16,
        addr: IpAddr,
    }

    impl FieldSink for Fields {
        fn field(&mut self, id: &str, _: &Type) -> Option<FieldMut<'_>> {
            match id {
                "flag" => Some(FieldMut::Bool(&mut self.flag)),
                "name" => Some(FieldMut::String(&mut self.name)),
                "port" => Some(FieldMut::U16(&mut self.port)),
                "addr" => Some(FieldMut::Address(&mut self.addr)),
                _ => None,
            }
        }
    }

    #[test]
    fn test_reflection_round_trip() {
        let name = "example.com".to_string();
        let addr = parse_addr("10.0.0.1").unwrap();
        let fields = [
            ("flag", Type::Boolean, FieldRef::Bool(true)),
            ("name", Type::Domain, FieldRef::Str(name.as_str())),
            ("port", Type::Integer, FieldRef::U16(8080)),
            ("addr", Type::Address, FieldRef::Address(addr)),
            ("skip", Type::String, FieldRef::Str("ignored")),
        ];

        let b = marshal_request_reflection(fields.len(), |i| Ok(fields[i].clone())).unwrap();

        let mut out = Fields {
            flag: false,
            name: String::new(),
            port: 0,
            addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        unmarshal_request_reflection(&b, &mut out).unwrap();
        assert!(out.flag);
        assert_eq!(out.name, "example.com");
        assert_eq!(out.port, 8080);
        assert_eq!(out.addr, addr);
    }

    #[test]
    fn test_reflection_overflow() {
        let b = marshal_request(&[("port", AttributeValue::Integer(70000))]).unwrap();
        let mut out = Fields {
            flag: false,
            name: String::new(),
            port: 1,
            addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        let err = unmarshal_request_reflection(&b, &mut out).unwrap_err();
        assert_eq!(err.to_string(), "#5b (port): Integer 70000 overflows u16");
        assert_eq!(out.port, 1);
    }

    #[test]
    fn test_reflection_sets_all_or_nothing() {
        let b = marshal_request(&[
            ("flag", AttributeValue::Boolean(true)),
            ("name", AttributeValue::String("new".into())),
            ("port", AttributeValue::Integer(70000)),
        ])
        .unwrap();
        let mut out = Fields {
            flag: false,
            name: "old".into(),
            port: 1,
            addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        let err = unmarshal_request_reflection(&b, &mut out).unwrap_err();
        assert_eq!(err.to_string(), "#5b (port): Integer 70000 overflows u16");
        assert!(!out.flag);
        assert_eq!(out.name, "old");
        assert_eq!(out.port, 1);

        let b = marshal_request(&[
            ("flag", AttributeValue::Boolean(true)),
            ("addr", AttributeValue::String("10.0.0.1".into())),
        ])
        .unwrap();
        let err = unmarshal_request_reflection(&b, &mut out).unwrap_err();
        assert_eq!(
            err.to_string(),
            "#5a (addr): Can't set string value to IP address field"
        );
        assert!(!out.flag);
    }
}
