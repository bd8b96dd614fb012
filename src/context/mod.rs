//! Request context.
//!
//! A context holds the attributes of a single decision request keyed by
//! attribute id and type, plus an optional handle on the local content
//! storage selectors read from.

use crate::content::{ContentItem, LocalContentStorage};
use crate::error::{Error, ErrorKind, Result};
use crate::expression::Attribute;
use crate::types::Type;
use crate::value::AttributeValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Attributes of a request together with content used by selectors.
#[derive(Debug, Clone, Default)]
pub struct Context {
    attributes: HashMap<String, HashMap<Type, AttributeValue>>,
    content: Option<Arc<LocalContentStorage>>,
}

impl Context {
    /// Build a context from `count` attributes produced by `f`.
    ///
    /// Attributes are distinguished by id and type, so the same id may
    /// carry values of different types. Giving the same id and type twice
    /// fails with [`ErrorKind::DuplicateAttributeValue`].
    pub fn new<F>(content: Option<Arc<LocalContentStorage>>, count: usize, mut f: F) -> Result<Self>
    where
        F: FnMut(usize) -> Result<(String, AttributeValue)>,
    {
        let mut attributes: HashMap<String, HashMap<Type, AttributeValue>> =
            HashMap::with_capacity(count);

        for i in 0..count {
            let (id, value) = f(i)?;
            let t = value.get_result_type();
            let types = attributes.entry(id.clone()).or_default();
            if let Some(prev) = types.get(&t) {
                return Err(Error::new(ErrorKind::DuplicateAttributeValue {
                    id,
                    type_name: t.name().to_string(),
                    first: prev.describe(),
                    second: value.describe(),
                }));
            }
            types.insert(t, value);
        }

        Ok(Self {
            attributes,
            content,
        })
    }

    /// Build a context from (id, value) pairs.
    pub fn from_values<I, S>(content: Option<Arc<LocalContentStorage>>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, AttributeValue)>,
        S: Into<String>,
    {
        let values: Vec<(String, AttributeValue)> =
            values.into_iter().map(|(id, v)| (id.into(), v)).collect();
        let mut it = values.into_iter();
        let count = it.len();
        Self::new(content, count, |_| {
            it.next()
                .ok_or_else(|| Error::config("attribute iterator exhausted"))
        })
    }

    /// Context with no attributes and no content.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up an attribute value by id and type.
    pub fn get_attribute(&self, a: &Attribute) -> Result<&AttributeValue> {
        self.attributes
            .get(a.id())
            .and_then(|types| types.get(a.get_type()))
            .ok_or_else(|| Error::missing_attribute().bind(a.describe()))
    }

    /// Look up a local content item.
    pub fn get_content_item(&self, content: &str, item: &str) -> Result<&Arc<ContentItem>> {
        match &self.content {
            Some(storage) => storage.get(content, item),
            None => Err(Error::new(ErrorKind::MissingContent).bind(format!("content {content:?}"))),
        }
    }

    /// Content storage attached to the context.
    pub fn content(&self) -> Option<&Arc<LocalContentStorage>> {
        self.content.as_ref()
    }

    /// Number of attribute values in the context.
    pub fn len(&self) -> usize {
        self.attributes.values().map(HashMap::len).sum()
    }

    /// Whether the context has no attributes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attributes.is_empty() {
            return f.write_str("no attributes");
        }

        let mut lines = Vec::with_capacity(self.len());
        for (id, types) in &self.attributes {
            for (t, v) in types {
                lines.push(format!("- {}.({}): {}", id, t.name(), v.describe()));
            }
        }
        lines.sort();

        f.write_str("attributes:")?;
        for line in lines {
            write!(f, "\n{line}")?;
        }
        Ok(())
    }
}
