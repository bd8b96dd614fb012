//! Attribute values.
//!
//! An [`AttributeValue`] is a typed payload. Extractors check the type and
//! fail with a bound type mismatch error instead of panicking.

mod collections;
mod domain;
mod network;

pub use collections::StringSet;
pub use domain::DomainName;
pub use network::{canonical_addr, parse_addr, Network};

use crate::error::{Error, ErrorKind, Result};
use crate::trie::{DomainTree, NetworkTree};
use crate::types::{FlagsType, Type};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

/// A typed value of an attribute or an expression.
#[derive(Debug, Clone)]
pub enum AttributeValue {
    /// The "no value" sentinel
    Undefined,
    /// Boolean value
    Boolean(bool),
    /// String value
    String(String),
    /// Integer value
    Integer(i64),
    /// Float value
    Float(f64),
    /// IP address
    Address(IpAddr),
    /// IP network
    Network(Network),
    /// Domain name
    Domain(DomainName),
    /// Set of strings
    SetOfStrings(Arc<StringSet>),
    /// Set of networks
    SetOfNetworks(Arc<NetworkTree<()>>),
    /// Set of domains
    SetOfDomains(Arc<DomainTree<()>>),
    /// List of strings
    ListOfStrings(Arc<Vec<String>>),
    /// Flags value as a bit mask of the type flags
    Flags(Arc<FlagsType>, u64),
}

impl AttributeValue {
    /// Make a set of strings value.
    pub fn set_of_strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AttributeValue::SetOfStrings(Arc::new(items.into_iter().collect()))
    }

    /// Make a set of networks value.
    pub fn set_of_networks<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a Network>,
    {
        let tree = items
            .into_iter()
            .fold(NetworkTree::new(), |t, n| t.insert_net(n, ()));
        AttributeValue::SetOfNetworks(Arc::new(tree))
    }

    /// Make a set of domains value.
    pub fn set_of_domains<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a DomainName>,
    {
        let tree = items
            .into_iter()
            .fold(DomainTree::new(), |t, d| t.insert(d, ()));
        AttributeValue::SetOfDomains(Arc::new(tree))
    }

    /// Make a list of strings value.
    pub fn list_of_strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AttributeValue::ListOfStrings(Arc::new(items.into_iter().map(Into::into).collect()))
    }

    /// Make a flags value out of flag names.
    pub fn flags_from<I, S>(t: &Arc<FlagsType>, flags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(AttributeValue::Flags(t.clone(), t.mask(flags)?))
    }

    /// Make a value of the type out of its string representation.
    pub fn from_string(t: &Type, s: &str) -> Result<Self> {
        match t {
            Type::Undefined => Err(Error::new(ErrorKind::InvalidTypeStringCast {
                type_name: t.name().to_string(),
            })),

            Type::SetOfStrings
            | Type::SetOfNetworks
            | Type::SetOfDomains
            | Type::ListOfStrings
            | Type::Flags(_) => Err(Error::new(ErrorKind::NotImplementedStringCast {
                type_name: t.name().to_string(),
            })),

            Type::Boolean => parse_bool(s).map(AttributeValue::Boolean),
            Type::String => Ok(AttributeValue::String(s.to_string())),
            Type::Integer => parse_int(s).map(AttributeValue::Integer),
            Type::Float => s.parse::<f64>().map(AttributeValue::Float).map_err(|e| {
                Error::new(ErrorKind::InvalidFloatStringCast {
                    value: s.to_string(),
                    message: e.to_string(),
                })
            }),
            Type::Address => parse_addr(s).map(AttributeValue::Address),
            Type::Network => s.parse::<Network>().map(AttributeValue::Network),
            Type::Domain => DomainName::new(s).map(AttributeValue::Domain),
        }
    }

    /// Type of the value.
    pub fn get_result_type(&self) -> Type {
        match self {
            AttributeValue::Undefined => Type::Undefined,
            AttributeValue::Boolean(_) => Type::Boolean,
            AttributeValue::String(_) => Type::String,
            AttributeValue::Integer(_) => Type::Integer,
            AttributeValue::Float(_) => Type::Float,
            AttributeValue::Address(_) => Type::Address,
            AttributeValue::Network(_) => Type::Network,
            AttributeValue::Domain(_) => Type::Domain,
            AttributeValue::SetOfStrings(_) => Type::SetOfStrings,
            AttributeValue::SetOfNetworks(_) => Type::SetOfNetworks,
            AttributeValue::SetOfDomains(_) => Type::SetOfDomains,
            AttributeValue::ListOfStrings(_) => Type::ListOfStrings,
            AttributeValue::Flags(t, _) => Type::Flags(t.clone()),
        }
    }

    fn type_error(&self, expected: Type) -> Error {
        Error::attribute_value_type(expected, self.get_result_type()).bind(self.describe())
    }

    /// Get boolean payload.
    pub fn boolean(&self) -> Result<bool> {
        match self {
            AttributeValue::Boolean(b) => Ok(*b),
            _ => Err(self.type_error(Type::Boolean)),
        }
    }

    /// Get string payload.
    pub fn str(&self) -> Result<&str> {
        match self {
            AttributeValue::String(s) => Ok(s),
            _ => Err(self.type_error(Type::String)),
        }
    }

    /// Get integer payload.
    pub fn integer(&self) -> Result<i64> {
        match self {
            AttributeValue::Integer(n) => Ok(*n),
            _ => Err(self.type_error(Type::Integer)),
        }
    }

    /// Get float payload.
    pub fn float(&self) -> Result<f64> {
        match self {
            AttributeValue::Float(f) => Ok(*f),
            _ => Err(self.type_error(Type::Float)),
        }
    }

    /// Get address payload.
    pub fn address(&self) -> Result<IpAddr> {
        match self {
            AttributeValue::Address(a) => Ok(*a),
            _ => Err(self.type_error(Type::Address)),
        }
    }

    /// Get network payload.
    pub fn network(&self) -> Result<&Network> {
        match self {
            AttributeValue::Network(n) => Ok(n),
            _ => Err(self.type_error(Type::Network)),
        }
    }

    /// Get domain payload.
    pub fn domain(&self) -> Result<&DomainName> {
        match self {
            AttributeValue::Domain(d) => Ok(d),
            _ => Err(self.type_error(Type::Domain)),
        }
    }

    /// Get set of strings payload.
    pub fn set_of_strings_value(&self) -> Result<&StringSet> {
        match self {
            AttributeValue::SetOfStrings(s) => Ok(s),
            _ => Err(self.type_error(Type::SetOfStrings)),
        }
    }

    /// Get set of networks payload.
    pub fn set_of_networks_value(&self) -> Result<&NetworkTree<()>> {
        match self {
            AttributeValue::SetOfNetworks(s) => Ok(s),
            _ => Err(self.type_error(Type::SetOfNetworks)),
        }
    }

    /// Get set of domains payload.
    pub fn set_of_domains_value(&self) -> Result<&DomainTree<()>> {
        match self {
            AttributeValue::SetOfDomains(s) => Ok(s),
            _ => Err(self.type_error(Type::SetOfDomains)),
        }
    }

    /// Get list of strings payload.
    pub fn list_of_strings_value(&self) -> Result<&[String]> {
        match self {
            AttributeValue::ListOfStrings(l) => Ok(l),
            _ => Err(self.type_error(Type::ListOfStrings)),
        }
    }

    /// Get flags payload. Any flags type is accepted.
    pub fn flags(&self) -> Result<(&Arc<FlagsType>, u64)> {
        match self {
            AttributeValue::Flags(t, bits) => Ok((t, *bits)),
            _ => Err(Error::attribute_value_type("Flags", self.get_result_type())
                .bind(self.describe())),
        }
    }

    /// Names of the set flags in declaration order.
    pub fn flag_names(&self) -> Result<Vec<&str>> {
        let (t, bits) = self.flags()?;
        Ok(t.flag_names(bits))
    }

    /// Check the value against a declared type and rebind flags values to
    /// the declared flags type.
    pub fn rebind_type(&self, t: &Type) -> Result<Self> {
        let actual = self.get_result_type();
        if !actual.matches(t) {
            return Err(self.type_error(t.clone()));
        }

        match (self, t) {
            (AttributeValue::Flags(_, bits), Type::Flags(ft)) => {
                Ok(AttributeValue::Flags(ft.clone(), *bits))
            }
            _ => Ok(self.clone()),
        }
    }

    /// Short human readable description for diagnostics. Collections show
    /// at most two items.
    pub fn describe(&self) -> String {
        match self {
            AttributeValue::Undefined => "val(undefined)".to_string(),
            AttributeValue::Boolean(b) => b.to_string(),
            AttributeValue::String(s) => format!("{:?}", s),
            AttributeValue::Integer(n) => n.to_string(),
            AttributeValue::Float(f) => format_float(*f),
            AttributeValue::Address(a) => a.to_string(),
            AttributeValue::Network(n) => n.to_string(),
            AttributeValue::Domain(d) => format!("domain({})", d),
            AttributeValue::SetOfStrings(s) => format!(
                "set({})",
                truncate(s.iter_by_key().map(|s| format!("{:?}", s)))
            ),
            AttributeValue::SetOfNetworks(s) => {
                format!("set({})", truncate(s.iter().map(|(n, _)| n.to_string())))
            }
            AttributeValue::SetOfDomains(s) => format!(
                "domains({})",
                truncate(s.iter().map(|(d, _)| format!("{:?}", d)))
            ),
            AttributeValue::ListOfStrings(l) => {
                format!("[{}]", truncate(l.iter().map(|s| format!("{:?}", s))))
            }
            AttributeValue::Flags(t, bits) => format!(
                "flags<{}>({})",
                t.name(),
                truncate(t.flag_names(*bits).into_iter().map(|f| format!("{:?}", f)))
            ),
        }
    }

    /// String representation which [`AttributeValue::from_string`] accepts
    /// back for scalar types.
    pub fn serialize(&self) -> Result<String> {
        match self {
            AttributeValue::Undefined => Err(Error::new(ErrorKind::InvalidTypeSerialization {
                type_name: Type::Undefined.name().to_string(),
            })),
            AttributeValue::Boolean(b) => Ok(b.to_string()),
            AttributeValue::String(s) => Ok(s.clone()),
            AttributeValue::Integer(n) => Ok(n.to_string()),
            AttributeValue::Float(f) => Ok(format_float(*f)),
            AttributeValue::Address(a) => Ok(a.to_string()),
            AttributeValue::Network(n) => Ok(n.to_string()),
            AttributeValue::Domain(d) => Ok(d.to_string()),
            AttributeValue::SetOfStrings(s) => Ok(quote_join(
                s.iter_sorted_by_insertion().into_iter().map(str::to_string),
            )),
            AttributeValue::SetOfNetworks(s) => {
                Ok(quote_join(s.iter().map(|(n, _)| n.to_string())))
            }
            AttributeValue::SetOfDomains(s) => Ok(quote_join(s.iter().map(|(d, _)| d))),
            AttributeValue::ListOfStrings(l) => Ok(quote_join(l.iter().cloned())),
            AttributeValue::Flags(t, bits) => Ok(quote_join(
                t.flag_names(*bits).into_iter().map(str::to_string),
            )),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

fn truncate(items: impl Iterator<Item = String>) -> String {
    let mut out: Vec<String> = Vec::with_capacity(3);
    for item in items {
        if out.len() == 2 {
            out.push("...".to_string());
            break;
        }
        out.push(item);
    }

    out.join(", ")
}

fn quote_join(items: impl Iterator<Item = String>) -> String {
    items
        .map(|s| format!("{:?}", s))
        .collect::<Vec<_>>()
        .join(",")
}

/// Format a float in the shortest form which parses back to the same value.
/// Exponent notation is used below 1e-4 and from 1e21 on.
pub(crate) fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }

    if f.is_infinite() {
        return if f > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }

    let abs = f.abs();
    if abs != 0.0 && !(1e-4..1e21).contains(&abs) {
        let s = format!("{:e}", f);
        return match s.split_once('e') {
            Some((mantissa, exp)) => {
                let (sign, digits) = match exp.strip_prefix('-') {
                    Some(d) => ('-', d),
                    None => ('+', exp),
                };
                format!("{}E{}{:0>2}", mantissa, sign, digits)
            }
            None => s,
        };
    }

    f.to_string()
}

fn parse_bool(s: &str) -> Result<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(Error::new(ErrorKind::InvalidBooleanStringCast {
            value: s.to_string(),
        })),
    }
}

fn parse_int(s: &str) -> Result<i64> {
    let invalid = |message: String| {
        Error::new(ErrorKind::InvalidIntegerStringCast {
            value: s.to_string(),
            message,
        })
    };

    let (negative, body) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let lower = body.to_ascii_lowercase();
    let (radix, digits) = if let Some(d) = lower.strip_prefix("0x") {
        (16, d)
    } else if let Some(d) = lower.strip_prefix("0o") {
        (8, d)
    } else if let Some(d) = lower.strip_prefix("0b") {
        (2, d)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };

    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(invalid("invalid syntax".to_string()));
    }

    let magnitude = u64::from_str_radix(digits, radix).map_err(|e| invalid(e.to_string()))?;
    if negative {
        if magnitude > i64::MAX as u64 + 1 {
            return Err(invalid("value out of range".to_string()));
        }
        Ok((magnitude as i64).wrapping_neg())
    } else {
        i64::try_from(magnitude).map_err(|_| invalid("value out of range".to_string()))
    }
}
