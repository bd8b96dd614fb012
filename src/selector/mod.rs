//! Selectors: expressions resolving values from content at evaluation time.
//!
//! A selector is addressed by URI. `local:<content>/<item>` reads the local
//! content storage attached to the request context, while
//! `pip://<service>/<content>/<item>` asks an external information point
//! through a client registered under `<service>`.

mod cache;
mod local;
mod pip;

pub use cache::{CacheStats, CachingPipClient};
pub use local::LocalSelector;
pub use pip::{PipAttribute, PipClient, PipSelector};

use crate::error::{Error, ErrorKind, Result};
use crate::expression::Expression;
use crate::types::Type;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Scheme of local content selectors.
pub const LOCAL_SCHEME: &str = "local";

/// Scheme of information point selectors.
pub const PIP_SCHEME: &str = "pip";

/// Factory building a selector expression out of the part of the URI
/// following the scheme.
pub type SelectorFactory =
    Arc<dyn Fn(&str, Vec<Expression>, Type) -> Result<Expression> + Send + Sync>;

/// Maps selector URI schemes to selector constructors.
#[derive(Clone, Default)]
pub struct SelectorRegistry {
    clients: HashMap<String, Arc<dyn PipClient>>,
    schemes: HashMap<String, SelectorFactory>,
}

impl fmt::Debug for SelectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectorRegistry")
            .field("clients", &self.clients.keys().collect::<Vec<_>>())
            .field("schemes", &self.schemes.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SelectorRegistry {
    /// Create a registry knowing only the builtin schemes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an information point client under a service name.
    pub fn register_pip(&mut self, service: impl Into<String>, client: Arc<dyn PipClient>) {
        self.clients.insert(service.into(), client);
    }

    /// Register a custom scheme.
    pub fn register_scheme(&mut self, scheme: impl Into<String>, factory: SelectorFactory) {
        self.schemes.insert(scheme.into().to_lowercase(), factory);
    }

    /// Client registered under the service.
    pub fn pip_client(&self, service: &str) -> Option<&Arc<dyn PipClient>> {
        self.clients.get(service)
    }

    /// Build a selector expression for the URI.
    pub fn make(&self, uri: &str, path: Vec<Expression>, t: Type) -> Result<Expression> {
        let (scheme, rest) = uri.split_once(':').ok_or_else(|| {
            Error::new(ErrorKind::InvalidSelectorUri {
                expected: "<scheme>:<location>".to_string(),
                uri: uri.to_string(),
            })
        })?;

        match scheme.to_lowercase().as_str() {
            LOCAL_SCHEME => {
                let (content, item) = split_location::<2>(rest, uri, "<content>/<item>")
                    .map(|[c, i]| (c, i))?;
                Ok(Expression::LocalSelector(Arc::new(LocalSelector::new(
                    content, item, path, t,
                ))))
            }

            PIP_SCHEME => {
                let location = rest.strip_prefix("//").unwrap_or(rest);
                let [service, content, item] =
                    split_location::<3>(location, uri, "//<service>/<content>/<item>")?;
                let client = self.clients.get(service).ok_or_else(|| {
                    Error::new(ErrorKind::UnknownPipService {
                        service: service.to_string(),
                    })
                })?;
                Ok(Expression::PipSelector(Arc::new(PipSelector::new(
                    service,
                    content,
                    item,
                    path,
                    t,
                    Arc::clone(client),
                ))))
            }

            other => match self.schemes.get(other) {
                Some(factory) => factory(rest, path, t),
                None => Err(Error::new(ErrorKind::UnsupportedSelectorScheme {
                    scheme: scheme.to_string(),
                })),
            },
        }
    }
}

fn split_location<'a, const N: usize>(
    location: &'a str,
    uri: &str,
    expected: &str,
) -> Result<[&'a str; N]> {
    let parts: Vec<&str> = location.split('/').collect();
    let invalid = || {
        Error::new(ErrorKind::InvalidSelectorUri {
            expected: expected.to_string(),
            uri: uri.to_string(),
        })
    };

    if parts.iter().any(|p| p.is_empty()) {
        return Err(invalid());
    }
    <[&str; N]>::try_from(parts).map_err(|_| invalid())
}
