//! Local content storage.
//!
//! Content is a named bundle of items. Each item is a tree of maps keyed by
//! strings, networks or domains with typed values in the leaves. Selectors
//! walk an item with keys calculated from the request context.

mod transaction;

pub use transaction::{ContentCommand, ContentEntity, ContentTransaction, ContentUpdate};

use crate::context::Context;
use crate::error::{Error, ErrorContext, ErrorKind, Result};
use crate::expression::Expression;
use crate::trie::{DomainTree, NetworkTree};
use crate::types::{describe_types, Type};
use crate::value::{parse_addr, AttributeValue, DomainName, Network};
use serde_json::{json, Map, Value as JsonValue};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

const LOCATION_SEPARATOR: &str = "/";

/// Node of a content item tree.
#[derive(Debug, Clone)]
pub enum ContentSubItem {
    /// Map with exact string keys
    StringMap(Arc<BTreeMap<String, ContentSubItem>>),
    /// Map keyed by networks with longest prefix lookup
    NetworkMap(NetworkTree<ContentSubItem>),
    /// Map keyed by domains with zone lookup
    DomainMap(DomainTree<ContentSubItem>),
    /// Final value
    Value(AttributeValue),
}

impl ContentSubItem {
    /// Make a string map out of (key, sub-item) pairs.
    pub fn string_map<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = (S, ContentSubItem)>,
        S: Into<String>,
    {
        ContentSubItem::StringMap(Arc::new(
            items.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Make a network map out of (network, sub-item) pairs.
    pub fn network_map<I>(items: I) -> Self
    where
        I: IntoIterator<Item = (Network, ContentSubItem)>,
    {
        ContentSubItem::NetworkMap(
            items
                .into_iter()
                .fold(NetworkTree::new(), |t, (n, v)| t.insert_net(&n, v)),
        )
    }

    /// Make a domain map out of (domain, sub-item) pairs.
    pub fn domain_map<I>(items: I) -> Self
    where
        I: IntoIterator<Item = (DomainName, ContentSubItem)>,
    {
        ContentSubItem::DomainMap(
            items
                .into_iter()
                .fold(DomainTree::new(), |t, (d, v)| t.insert(&d, v)),
        )
    }

    /// Make a final value.
    pub fn value(v: AttributeValue) -> Self {
        ContentSubItem::Value(v)
    }

    fn kind_name(&self) -> &'static str {
        match self {
            ContentSubItem::StringMap(_) => "string map",
            ContentSubItem::NetworkMap(_) => "network map",
            ContentSubItem::DomainMap(_) => "domain map",
            ContentSubItem::Value(_) => "value",
        }
    }

    /// Step into the map with a calculated key.
    pub fn next(&self, key: &AttributeValue) -> Result<&ContentSubItem> {
        let found = match self {
            ContentSubItem::StringMap(m) => m.get(key.str()?),
            ContentSubItem::NetworkMap(t) => match key {
                AttributeValue::Address(a) => t.get_by_addr(a),
                AttributeValue::Network(n) => t.get_by_net(n),
                _ => {
                    return Err(Error::attribute_value_type(
                        "Address or Network",
                        key.get_result_type(),
                    ))
                }
            },
            ContentSubItem::DomainMap(t) => t.get(key.domain()?),
            ContentSubItem::Value(_) => {
                return Err(Error::new(ErrorKind::MapContentSubitem))
            }
        };

        found.ok_or_else(Error::missing_value)
    }

    /// Step into the map and return the final value found there.
    pub fn get_value(&self, key: &AttributeValue) -> Result<AttributeValue> {
        self.next(key)?.final_value()
    }

    fn final_value(&self) -> Result<AttributeValue> {
        match self {
            ContentSubItem::Value(v) => Ok(v.clone()),
            _ => Err(Error::new(ErrorKind::FinalContentSubitem)),
        }
    }

    fn lookup(&self, key: &str) -> Result<&ContentSubItem> {
        let found = match self {
            ContentSubItem::StringMap(m) => m.get(key),
            ContentSubItem::NetworkMap(t) => t.get_exact_net(&parse_network_key(key)?),
            ContentSubItem::DomainMap(t) => t.get_exact(&DomainName::new(key)?),
            ContentSubItem::Value(_) => {
                return Err(Error::new(ErrorKind::MapContentSubitem))
            }
        };

        found.ok_or_else(Error::missing_value)
    }

    fn put(&self, key: &str, v: ContentSubItem) -> Result<ContentSubItem> {
        match self {
            ContentSubItem::StringMap(m) => {
                let mut m = Arc::clone(m);
                Arc::make_mut(&mut m).insert(key.to_string(), v);
                Ok(ContentSubItem::StringMap(m))
            }
            ContentSubItem::NetworkMap(t) => Ok(ContentSubItem::NetworkMap(
                t.insert_net(&parse_network_key(key)?, v),
            )),
            ContentSubItem::DomainMap(t) => Ok(ContentSubItem::DomainMap(
                t.insert(&DomainName::new(key)?, v),
            )),
            ContentSubItem::Value(_) => Err(Error::new(ErrorKind::MapContentSubitem)),
        }
    }

    fn remove(&self, key: &str) -> Result<ContentSubItem> {
        let (item, ok) = match self {
            ContentSubItem::StringMap(m) => {
                if !m.contains_key(key) {
                    (self.clone(), false)
                } else {
                    let mut m = Arc::clone(m);
                    Arc::make_mut(&mut m).remove(key);
                    (ContentSubItem::StringMap(m), true)
                }
            }
            ContentSubItem::NetworkMap(t) => {
                let (t, ok) = t.delete_net(&parse_network_key(key)?);
                (ContentSubItem::NetworkMap(t), ok)
            }
            ContentSubItem::DomainMap(t) => {
                let (t, ok) = t.delete(&DomainName::new(key)?);
                (ContentSubItem::DomainMap(t), ok)
            }
            ContentSubItem::Value(_) => return Err(Error::new(ErrorKind::MapContentSubitem)),
        };

        if ok {
            Ok(item)
        } else {
            Err(Error::missing_value())
        }
    }

    /// Copy of the tree with `v` placed at the key path.
    pub(crate) fn set_at(&self, keys: &[String], v: ContentSubItem) -> Result<ContentSubItem> {
        match keys {
            [] => Ok(v),
            [key] => self.put(key, v).bind_with(|| format!("{key:?}")),
            [key, rest @ ..] => {
                let child = self
                    .lookup(key)
                    .and_then(|c| c.set_at(rest, v))
                    .bind_with(|| format!("{key:?}"))?;
                self.put(key, child)
            }
        }
    }

    /// Copy of the tree without the node at the key path.
    pub(crate) fn remove_at(&self, keys: &[String]) -> Result<ContentSubItem> {
        match keys {
            [] => Err(Error::new(ErrorKind::EmptyPathModification)),
            [key] => self.remove(key).bind_with(|| format!("{key:?}")),
            [key, rest @ ..] => {
                let child = self
                    .lookup(key)
                    .and_then(|c| c.remove_at(rest))
                    .bind_with(|| format!("{key:?}"))?;
                self.put(key, child)
            }
        }
    }

    fn to_json(&self) -> JsonValue {
        match self {
            ContentSubItem::StringMap(m) => JsonValue::Object(
                m.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
            ContentSubItem::NetworkMap(t) => JsonValue::Object(
                t.iter()
                    .map(|(n, v)| (n.to_string(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
            ContentSubItem::DomainMap(t) => JsonValue::Object(
                t.iter()
                    .map(|(d, v)| (d, v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
            ContentSubItem::Value(v) => value_to_json(v),
        }
    }
}

fn parse_network_key(s: &str) -> Result<Network> {
    if s.contains('/') {
        return s.parse();
    }

    let addr = parse_addr(s)?;
    let prefix = if addr.is_ipv4() { 32 } else { 128 };
    Network::new(addr, prefix)
}

fn value_to_json(v: &AttributeValue) -> JsonValue {
    match v {
        AttributeValue::Undefined => JsonValue::Null,
        AttributeValue::Boolean(b) => json!(b),
        AttributeValue::String(s) => json!(s),
        AttributeValue::Integer(n) => json!(n),
        AttributeValue::Float(f) => json!(f),
        AttributeValue::Address(a) => json!(a.to_string()),
        AttributeValue::Network(n) => json!(n.to_string()),
        AttributeValue::Domain(d) => json!(d.as_str()),
        AttributeValue::SetOfStrings(s) => json!(s.iter_sorted_by_insertion()),
        AttributeValue::SetOfNetworks(s) => {
            json!(s.iter().map(|(n, _)| n.to_string()).collect::<Vec<_>>())
        }
        AttributeValue::SetOfDomains(s) => json!(s.iter().map(|(d, _)| d).collect::<Vec<_>>()),
        AttributeValue::ListOfStrings(l) => json!(l.as_slice()),
        AttributeValue::Flags(t, bits) => json!(t.flag_names(*bits)),
    }
}

/// Typed content item.
#[derive(Debug, Clone)]
pub struct ContentItem {
    t: Type,
    keys: Vec<Type>,
    root: ContentSubItem,
}

impl ContentItem {
    /// Create an item with the given value type, key types and data.
    pub fn new(t: Type, keys: Vec<Type>, root: ContentSubItem) -> Result<Self> {
        for k in &keys {
            if !matches!(
                k,
                Type::String | Type::Address | Type::Network | Type::Domain
            ) {
                return Err(Error::new(ErrorKind::InvalidContentKeyType {
                    actual: k.name().to_string(),
                }));
            }
        }

        Ok(Self { t, keys, root })
    }

    /// Type of values stored in the item.
    pub fn get_type(&self) -> &Type {
        &self.t
    }

    /// Types of keys leading to values.
    pub fn keys(&self) -> &[Type] {
        &self.keys
    }

    /// Root of the item tree.
    pub fn root(&self) -> &ContentSubItem {
        &self.root
    }

    /// Walk the item with keys calculated from the context.
    ///
    /// Errors are bound to the location reached so far, rendered as
    /// `/key1/key2`.
    pub fn get(&self, path: &[Expression], ctx: &Context) -> Result<AttributeValue> {
        if path.len() != self.keys.len() {
            let actual: Vec<Type> = path.iter().map(Expression::get_result_type).collect();
            return Err(Error::new(ErrorKind::InvalidSelectorPath {
                expected: describe_types(&self.keys),
                actual: describe_types(&actual),
            }));
        }

        let (last, init) = match path.split_last() {
            Some(split) => split,
            None => return self.root.final_value(),
        };

        let mut loc = vec![String::new()];
        let mut node = &self.root;
        for e in init {
            let key = e
                .calculate(ctx)
                .bind_with(|| loc.join(LOCATION_SEPARATOR))?;
            loc.push(key.describe());
            node = node
                .next(&key)
                .bind_with(|| loc.join(LOCATION_SEPARATOR))?;
        }

        let key = last
            .calculate(ctx)
            .bind_with(|| loc.join(LOCATION_SEPARATOR))?;
        loc.push(key.describe());
        node.get_value(&key)
            .bind_with(|| loc.join(LOCATION_SEPARATOR))
    }

    /// JSON rendering of the item.
    pub fn to_json(&self) -> JsonValue {
        let mut obj = Map::new();
        if !self.keys.is_empty() {
            obj.insert(
                "keys".to_string(),
                json!(self.keys.iter().map(Type::name).collect::<Vec<_>>()),
            );
        }
        obj.insert("type".to_string(), json!(self.t.name()));
        obj.insert("data".to_string(), self.root.to_json());
        JsonValue::Object(obj)
    }

    pub(crate) fn with_root(&self, root: ContentSubItem) -> Self {
        Self {
            t: self.t.clone(),
            keys: self.keys.clone(),
            root,
        }
    }
}

/// Named set of content items with an optional tag.
#[derive(Debug, Clone)]
pub struct LocalContent {
    id: String,
    tag: Option<Uuid>,
    items: HashMap<String, Arc<ContentItem>>,
}

impl LocalContent {
    /// Create content out of (id, item) pairs.
    pub fn new<I, S>(id: impl Into<String>, tag: Option<Uuid>, items: I) -> Self
    where
        I: IntoIterator<Item = (S, ContentItem)>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            tag,
            items: items
                .into_iter()
                .map(|(k, v)| (k.into(), Arc::new(v)))
                .collect(),
        }
    }

    /// Content id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current tag.
    pub fn tag(&self) -> Option<Uuid> {
        self.tag
    }

    /// Get an item by id.
    pub fn get(&self, item: &str) -> Result<&Arc<ContentItem>> {
        self.items
            .get(item)
            .ok_or_else(|| Error::new(ErrorKind::MissingContentItem))
            .bind_with(|| format!("content item {item:?}"))
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the content has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Ids of all items.
    pub fn item_ids(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    /// JSON rendering of all items.
    pub fn to_json(&self) -> JsonValue {
        let items: Map<String, JsonValue> = self
            .items
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        json!({ "id": self.id, "items": items })
    }
}

/// Copy-on-write map from content ids to content.
#[derive(Debug, Clone, Default)]
pub struct LocalContentStorage {
    contents: HashMap<String, Arc<LocalContent>>,
}

impl LocalContentStorage {
    /// Create a storage from a list of contents.
    pub fn new<I>(contents: I) -> Self
    where
        I: IntoIterator<Item = LocalContent>,
    {
        Self {
            contents: contents
                .into_iter()
                .map(|c| (c.id.clone(), Arc::new(c)))
                .collect(),
        }
    }

    /// Get an item of a content.
    pub fn get(&self, content: &str, item: &str) -> Result<&Arc<ContentItem>> {
        self.get_content(content)?.get(item)
    }

    /// Get a content by id.
    pub fn get_content(&self, content: &str) -> Result<&Arc<LocalContent>> {
        self.contents
            .get(content)
            .ok_or_else(|| Error::new(ErrorKind::MissingContent))
            .bind_with(|| format!("content {content:?}"))
    }

    /// Copy of the storage with the content added or replaced.
    pub fn add(&self, content: LocalContent) -> Self {
        let mut contents = self.contents.clone();
        contents.insert(content.id.clone(), Arc::new(content));
        Self { contents }
    }

    /// Copy of the storage without the content.
    pub fn remove(&self, id: &str) -> Self {
        let mut contents = self.contents.clone();
        contents.remove(id);
        Self { contents }
    }

    /// Start a transaction over a tagged content.
    pub fn new_transaction(&self, id: &str, tag: Option<Uuid>) -> Result<ContentTransaction> {
        let content = self.get_content(id)?;
        let current = content
            .tag
            .ok_or_else(|| Error::new(ErrorKind::UntaggedContentModification { id: id.to_string() }))?;
        let requested = tag.ok_or_else(|| Error::new(ErrorKind::MissingContentTag))?;
        if current != requested {
            return Err(Error::new(ErrorKind::ContentTagsNotMatch {
                id: id.to_string(),
                current: current.to_string(),
                requested: requested.to_string(),
            }));
        }

        Ok(ContentTransaction::new(content, requested))
    }

    /// Number of contents.
    pub fn len(&self) -> usize {
        self.contents.len()
    }

    /// Whether the storage holds no content.
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Ids of all contents.
    pub fn content_ids(&self) -> impl Iterator<Item = &str> {
        self.contents.keys().map(String::as_str)
    }
}

impl fmt::Display for LocalContentStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&str> = self.content_ids().collect();
        ids.sort_unstable();
        write!(f, "content: {}", ids.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested_item() -> ContentItem {
        let inner = ContentSubItem::network_map([(
            "10.0.0.0/8".parse::<Network>().unwrap(),
            ContentSubItem::value(AttributeValue::String("private".into())),
        )]);
        let root = ContentSubItem::string_map([("office", inner)]);
        ContentItem::new(Type::String, vec![Type::String, Type::Address], root).unwrap()
    }

    fn path(site: &str, addr: &str) -> Vec<Expression> {
        vec![
            Expression::value(AttributeValue::String(site.into())),
            Expression::value(AttributeValue::Address(parse_addr(addr).unwrap())),
        ]
    }

    #[test]
    fn test_get_nested() {
        let item = nested_item();
        let v = item.get(&path("office", "10.1.2.3"), &Context::empty()).unwrap();
        assert_eq!(v.str().unwrap(), "private");
    }

    #[test]
    fn test_get_missing_binds_location() {
        let item = nested_item();
        let err = item
            .get(&path("office", "192.0.2.1"), &Context::empty())
            .unwrap_err();
        assert!(err.is_missing_value());
        assert_eq!(err.path(), ["/\"office\"/192.0.2.1"]);

        let err = item
            .get(&path("home", "10.0.0.1"), &Context::empty())
            .unwrap_err();
        assert!(err.is_missing_value());
        assert_eq!(err.path(), ["/\"home\""]);
    }

    #[test]
    fn test_get_wrong_path_length() {
        let item = nested_item();
        let err = item
            .get(
                &[Expression::value(AttributeValue::String("office".into()))],
                &Context::empty(),
            )
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidSelectorPath { .. }));
    }

    #[test]
    fn test_final_and_map_subitems() {
        let root = ContentSubItem::string_map([(
            "a",
            ContentSubItem::string_map([("b", ContentSubItem::value(AttributeValue::Integer(1)))]),
        )]);
        let one_key = ContentItem::new(Type::Integer, vec![Type::String], root.clone()).unwrap();
        let err = one_key
            .get(
                &[Expression::value(AttributeValue::String("a".into()))],
                &Context::empty(),
            )
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::FinalContentSubitem));

        let leaf = ContentSubItem::value(AttributeValue::Integer(1));
        let err = leaf
            .next(&AttributeValue::String("a".into()))
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MapContentSubitem));
    }

    #[test]
    fn test_invalid_key_type() {
        let err = ContentItem::new(
            Type::String,
            vec![Type::Integer],
            ContentSubItem::string_map(Vec::<(String, ContentSubItem)>::new()),
        )
        .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidContentKeyType { .. }));
    }

    #[test]
    fn test_domain_zone_lookup() {
        let root = ContentSubItem::domain_map([(
            DomainName::new("example.com").unwrap(),
            ContentSubItem::value(AttributeValue::Boolean(true)),
        )]);
        let item = ContentItem::new(Type::Boolean, vec![Type::Domain], root).unwrap();
        let key = Expression::value(AttributeValue::Domain(
            DomainName::new("www.example.com").unwrap(),
        ));
        assert!(item.get(&[key], &Context::empty()).unwrap().boolean().unwrap());
    }

    #[test]
    fn test_to_json() {
        let item = ContentItem::new(
            Type::String,
            vec![Type::String],
            ContentSubItem::string_map([(
                "k",
                ContentSubItem::value(AttributeValue::String("v".into())),
            )]),
        )
        .unwrap();
        assert_eq!(
            item.to_json().to_string(),
            r#"{"data":{"k":"v"},"keys":["String"],"type":"String"}"#
        );

        let single = ContentItem::new(
            Type::Integer,
            vec![],
            ContentSubItem::value(AttributeValue::Integer(5)),
        )
        .unwrap();
        assert_eq!(single.to_json().to_string(), r#"{"data":5,"type":"Integer"}"#);
    }

    #[test]
    fn test_storage_lookup_errors() {
        let storage = LocalContentStorage::new([LocalContent::new(
            "c",
            None,
            [("i", nested_item())],
        )]);
        assert!(storage.get("c", "i").is_ok());

        let err = storage.get("c", "x").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MissingContentItem));
        let err = storage.get("x", "i").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MissingContent));

        let storage = storage.remove("c");
        assert!(storage.is_empty());
    }
}
