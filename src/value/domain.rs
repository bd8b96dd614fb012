//! Domain names.

use crate::error::{Error, ErrorKind, Result};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 253;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[-._a-z0-9]+$").expect("valid domain pattern"))
}

/// A validated lowercase domain name without trailing dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainName(String);

impl DomainName {
    /// Validate and normalize a domain name.
    pub fn new(s: &str) -> Result<Self> {
        let invalid = |message: String| {
            Error::new(ErrorKind::InvalidDomainStringCast {
                value: s.to_string(),
                message,
            })
        };

        let name = s.strip_suffix('.').unwrap_or(s).to_lowercase();
        if name.is_empty() {
            return Err(invalid("empty domain name".to_string()));
        }

        if name.len() > MAX_NAME_LEN {
            return Err(invalid(format!(
                "domain name is longer than {} bytes",
                MAX_NAME_LEN
            )));
        }

        if !name_pattern().is_match(&name) {
            return Err(invalid("domain name contains invalid characters".to_string()));
        }

        for label in name.split('.') {
            if label.is_empty() {
                return Err(invalid("empty label".to_string()));
            }

            if label.len() > MAX_LABEL_LEN {
                return Err(invalid(format!(
                    "label {:?} is longer than {} bytes",
                    label, MAX_LABEL_LEN
                )));
            }
        }

        Ok(Self(name))
    }

    /// The name as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Labels from the top level domain down.
    pub fn labels_rev(&self) -> impl Iterator<Item = &str> {
        self.0.rsplit('.')
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DomainName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DomainName::new(s)
    }
}
