//! Custom flags types.

use crate::error::{Error, ErrorKind, Result};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Maximum number of flags a single type can declare.
pub const MAX_FLAGS: usize = 64;

/// A custom bit-field enumeration of up to 64 named flags.
///
/// Flag names are case insensitive and stored lowercase. A value of the type
/// is any combination of the declared flags, including the empty one.
#[derive(Debug, Clone)]
pub struct FlagsType {
    name: String,
    key: String,
    flags: Vec<String>,
    bits: HashMap<String, usize>,
    capacity: usize,
}

impl FlagsType {
    /// Create a flags type. The name must not clash with a builtin type key.
    pub fn new<I, S>(name: impl Into<String>, flags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.into();
        let key = name.to_lowercase();
        if super::Type::from_key(&key).is_some() {
            return Err(Error::new(ErrorKind::DuplicatesBuiltinType { name }));
        }

        let flags: Vec<String> = flags
            .into_iter()
            .map(|f| f.as_ref().to_lowercase())
            .collect();
        if flags.is_empty() {
            return Err(Error::new(ErrorKind::NoTypedFlags { name }));
        }

        if flags.len() > MAX_FLAGS {
            return Err(Error::new(ErrorKind::TooManyFlags {
                name,
                count: flags.len(),
            }));
        }

        let capacity = match flags.len() {
            0..=8 => 8,
            9..=16 => 16,
            17..=32 => 32,
            _ => 64,
        };

        let mut bits = HashMap::with_capacity(flags.len());
        for (i, flag) in flags.iter().enumerate() {
            if bits.insert(flag.clone(), i).is_some() {
                return Err(Error::new(ErrorKind::DuplicateFlagName {
                    name,
                    flag: flag.clone(),
                }));
            }
        }

        Ok(Self {
            name,
            key,
            flags,
            bits,
            capacity,
        })
    }

    /// Human readable type name as given at creation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercase type key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Declared flags in declaration order.
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    /// Number of bits used to represent a value (8, 16, 32 or 64).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bit number of the flag, if the type declares it.
    pub fn get_flag_bit(&self, flag: &str) -> Option<usize> {
        self.bits.get(&flag.to_lowercase()).copied()
    }

    /// Build a bit mask out of flag names.
    pub fn mask<I, S>(&self, flags: I) -> Result<u64>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mask = 0u64;
        for flag in flags {
            let bit = self.get_flag_bit(flag.as_ref()).ok_or_else(|| {
                Error::new(ErrorKind::UnknownFlagName {
                    name: self.name.clone(),
                    flag: flag.as_ref().to_string(),
                })
            })?;
            mask |= 1 << bit;
        }

        Ok(mask)
    }

    /// Names of the flags set in the mask, in declaration order.
    pub fn flag_names(&self, mask: u64) -> Vec<&str> {
        self.flags
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, f)| f.as_str())
            .collect()
    }
}

impl PartialEq for FlagsType {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.flags == other.flags
    }
}

impl Eq for FlagsType {}

impl Hash for FlagsType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for FlagsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_type_capacity() {
        let t = FlagsType::new("Small", ["a", "b", "c"]).unwrap();
        assert_eq!(t.capacity(), 8);
        assert_eq!(t.key(), "small");

        let names: Vec<String> = (0..17).map(|i| format!("f{i}")).collect();
        let t = FlagsType::new("Wide", &names).unwrap();
        assert_eq!(t.capacity(), 32);
    }

    #[test]
    fn test_flags_type_errors() {
        let err = FlagsType::new("String", ["a"]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DuplicatesBuiltinType { .. }));

        let err = FlagsType::new("Empty", Vec::<String>::new()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::NoTypedFlags { .. }));

        let names: Vec<String> = (0..65).map(|i| format!("f{i}")).collect();
        let err = FlagsType::new("Huge", &names).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::TooManyFlags { count: 65, .. }));

        let err = FlagsType::new("Dup", ["Red", "red"]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DuplicateFlagName { .. }));
    }

    #[test]
    fn test_flags_mask() {
        let t = FlagsType::new("Colors", ["Red", "Green", "Blue"]).unwrap();
        assert_eq!(t.get_flag_bit("GREEN"), Some(1));
        assert_eq!(t.get_flag_bit("purple"), None);

        let mask = t.mask(["blue", "red"]).unwrap();
        assert_eq!(mask, 0b101);
        assert_eq!(t.flag_names(mask), vec!["red", "blue"]);
        assert!(t.mask(["purple"]).is_err());
    }
}
