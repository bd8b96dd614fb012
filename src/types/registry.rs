use super::{FlagsType, Type, BUILTIN_TYPES};
use crate::error::{Error, ErrorKind, Result};
use crate::value::AttributeValue;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of builtin and custom types keyed by lowercase type key.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: HashMap<String, Type>,
}

impl TypeRegistry {
    /// Create a registry holding the builtin types.
    pub fn new() -> Self {
        let types = BUILTIN_TYPES
            .iter()
            .filter(|t| **t != Type::Undefined)
            .map(|t| (t.key(), t.clone()))
            .collect();

        Self { types }
    }

    /// Register a custom flags type.
    pub fn register_flags<I, S>(&mut self, name: impl Into<String>, flags: I) -> Result<Type>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.into();
        if self.types.contains_key(&name.to_lowercase()) {
            return Err(Error::new(ErrorKind::DuplicatesBuiltinType { name }));
        }

        let t = Type::Flags(Arc::new(FlagsType::new(name, flags)?));
        self.types.insert(t.key(), t.clone());
        Ok(t)
    }

    /// Look a type up by key (case insensitive).
    pub fn get(&self, key: &str) -> Option<&Type> {
        self.types.get(&key.to_lowercase())
    }

    /// Parse a value of the type with the given key.
    pub fn parse_value(&self, key: &str, s: &str) -> Result<AttributeValue> {
        let t = self.get(key).ok_or_else(|| {
            Error::new(ErrorKind::UnknownTypeStringCast {
                key: key.to_string(),
            })
        })?;

        AttributeValue::from_string(t, s)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
