//! Attribute types.
//!
//! The engine works with a closed set of builtin types plus custom flags
//! types registered at load time.

mod flags;
mod registry;

pub use flags::{FlagsType, MAX_FLAGS};
pub use registry::TypeRegistry;

use std::fmt;
use std::sync::Arc;

/// Type of an attribute, an expression result or a content item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// No value
    Undefined,
    /// Boolean
    Boolean,
    /// UTF-8 string
    String,
    /// Signed 64-bit integer
    Integer,
    /// 64-bit float
    Float,
    /// IPv4 or IPv6 address
    Address,
    /// IPv4 or IPv6 network
    Network,
    /// Domain name
    Domain,
    /// Set of strings remembering insertion order
    SetOfStrings,
    /// Set of networks
    SetOfNetworks,
    /// Set of domains
    SetOfDomains,
    /// Ordered list of strings
    ListOfStrings,
    /// Custom flags type
    Flags(Arc<FlagsType>),
}

/// Builtin types in id order.
pub const BUILTIN_TYPES: [Type; 12] = [
    Type::Undefined,
    Type::Boolean,
    Type::String,
    Type::Integer,
    Type::Float,
    Type::Address,
    Type::Network,
    Type::Domain,
    Type::SetOfStrings,
    Type::SetOfNetworks,
    Type::SetOfDomains,
    Type::ListOfStrings,
];

impl Type {
    /// Create a flags type.
    pub fn flags<I, S>(name: impl Into<String>, flags: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Type::Flags(Arc::new(FlagsType::new(name, flags)?)))
    }

    /// Stable numeric id. All flags types share the id after the builtins.
    pub fn id(&self) -> usize {
        match self {
            Type::Undefined => 0,
            Type::Boolean => 1,
            Type::String => 2,
            Type::Integer => 3,
            Type::Float => 4,
            Type::Address => 5,
            Type::Network => 6,
            Type::Domain => 7,
            Type::SetOfStrings => 8,
            Type::SetOfNetworks => 9,
            Type::SetOfDomains => 10,
            Type::ListOfStrings => 11,
            Type::Flags(_) => 12,
        }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        match self {
            Type::Undefined => "Undefined",
            Type::Boolean => "Boolean",
            Type::String => "String",
            Type::Integer => "Integer",
            Type::Float => "Float",
            Type::Address => "Address",
            Type::Network => "Network",
            Type::Domain => "Domain",
            Type::SetOfStrings => "Set of Strings",
            Type::SetOfNetworks => "Set of Networks",
            Type::SetOfDomains => "Set of Domains",
            Type::ListOfStrings => "List of Strings",
            Type::Flags(t) => t.name(),
        }
    }

    /// Lowercase key used in serialized form and lookup tables.
    pub fn key(&self) -> String {
        match self {
            Type::Flags(t) => t.key().to_string(),
            t => t.name().to_lowercase(),
        }
    }

    /// Parse a builtin type key (case insensitive).
    pub fn from_key(key: &str) -> Option<Type> {
        let key = key.to_lowercase();
        BUILTIN_TYPES.iter().find(|t| t.key() == key).cloned()
    }

    /// Check compatibility. Builtin types match only themselves, flags
    /// types match any flags type with the same number of flags.
    pub fn matches(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Flags(a), Type::Flags(b)) => {
                Arc::ptr_eq(a, b) || a.flags().len() == b.flags().len()
            }
            (a, b) => a == b,
        }
    }

    /// Check if the type is one of the collection types.
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            Type::SetOfStrings | Type::SetOfNetworks | Type::SetOfDomains | Type::ListOfStrings
        )
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Join type names for error messages.
pub(crate) fn describe_types(types: &[Type]) -> String {
    if types.is_empty() {
        return "nothing".to_string();
    }

    types
        .iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_keys() {
        assert_eq!(Type::SetOfStrings.key(), "set of strings");
        assert_eq!(Type::from_key("List of Strings"), Some(Type::ListOfStrings));
        assert_eq!(Type::from_key("address"), Some(Type::Address));
        assert_eq!(Type::from_key("flags"), None);
        for (i, t) in BUILTIN_TYPES.iter().enumerate() {
            assert_eq!(t.id(), i);
        }
    }

    #[test]
    fn test_flags_match_by_count() {
        let a = Type::flags("A", ["x", "y"]).unwrap();
        let b = Type::flags("B", ["p", "q"]).unwrap();
        let c = Type::flags("C", ["p", "q", "r"]).unwrap();

        assert!(a.matches(&b));
        assert!(!a.matches(&c));
        assert_ne!(a, b);
        assert!(!a.matches(&Type::String));
        assert!(Type::String.matches(&Type::String));
        assert_eq!(a.to_string(), "A");
    }
}
