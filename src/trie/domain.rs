//! Persistent label trie over domain names.

use crate::value::DomainName;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug)]
struct Label<V> {
    value: Option<V>,
    children: BTreeMap<String, Arc<Label<V>>>,
}

impl<V> Default for Label<V> {
    fn default() -> Self {
        Self {
            value: None,
            children: BTreeMap::new(),
        }
    }
}

impl<V: Clone> Clone for Label<V> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            children: self.children.clone(),
        }
    }
}

impl<V: Clone> Label<V> {
    fn insert(&self, labels: &[&str], value: V) -> Self {
        let mut m = self.clone();
        match labels.split_first() {
            None => m.value = Some(value),
            Some((first, rest)) => {
                let child = match self.children.get(*first) {
                    Some(c) => c.insert(rest, value),
                    None => Label::default().insert(rest, value),
                };
                m.children.insert(first.to_string(), Arc::new(child));
            }
        }

        m
    }

    fn delete(&self, labels: &[&str]) -> Option<Self> {
        let mut m = self.clone();
        match labels.split_first() {
            None => {
                m.value.take()?;
            }
            Some((first, rest)) => {
                let child = self.children.get(*first)?.delete(rest)?;
                if child.value.is_none() && child.children.is_empty() {
                    m.children.remove(*first);
                } else {
                    m.children.insert(first.to_string(), Arc::new(child));
                }
            }
        }

        Some(m)
    }
}

/// Persistent map from domain names to values.
///
/// Lookups walk from the top level domain down and return the value of the
/// deepest node on the way, so a value stored for a zone covers all of its
/// subdomains.
#[derive(Debug)]
pub struct DomainTree<V> {
    root: Arc<Label<V>>,
}

impl<V> Clone for DomainTree<V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

impl<V> Default for DomainTree<V> {
    fn default() -> Self {
        Self {
            root: Arc::new(Label::default()),
        }
    }
}

impl<V: Clone> DomainTree<V> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the tree holds no names.
    pub fn is_empty(&self) -> bool {
        self.root.value.is_none() && self.root.children.is_empty()
    }

    /// Insert a value for the name and return the new tree.
    pub fn insert(&self, name: &DomainName, value: V) -> Self {
        let labels: Vec<&str> = name.labels_rev().collect();
        Self {
            root: Arc::new(self.root.insert(&labels, value)),
        }
    }

    /// Get the value of the name or its closest enclosing zone.
    pub fn get(&self, name: &DomainName) -> Option<&V> {
        let mut node = self.root.as_ref();
        let mut found = node.value.as_ref();
        for label in name.labels_rev() {
            match node.children.get(label) {
                Some(c) => node = c.as_ref(),
                None => break,
            }

            if let Some(v) = &node.value {
                found = Some(v);
            }
        }

        found
    }

    /// Get the value stored for exactly this name.
    pub fn get_exact(&self, name: &DomainName) -> Option<&V> {
        let mut node = self.root.as_ref();
        for label in name.labels_rev() {
            node = node.children.get(label)?.as_ref();
        }

        node.value.as_ref()
    }

    /// Delete the value stored for the name. Returns the new tree and
    /// whether anything was removed.
    pub fn delete(&self, name: &DomainName) -> (Self, bool) {
        let labels: Vec<&str> = name.labels_rev().collect();
        match self.root.delete(&labels) {
            Some(root) => (
                Self {
                    root: Arc::new(root),
                },
                true,
            ),
            None => (self.clone(), false),
        }
    }

    /// Iterate over stored names in lexical label order from the top level
    /// domain down.
    pub fn iter(&self) -> impl Iterator<Item = (String, &V)> + '_ {
        let mut stack: Vec<(Vec<&str>, &Label<V>)> = vec![(Vec::new(), self.root.as_ref())];
        std::iter::from_fn(move || {
            while let Some((path, node)) = stack.pop() {
                for (label, child) in node.children.iter().rev() {
                    let mut next = path.clone();
                    next.push(label.as_str());
                    stack.push((next, child.as_ref()));
                }

                if let Some(v) = &node.value {
                    let name: Vec<&str> = path.iter().rev().copied().collect();
                    return Some((name.join("."), v));
                }
            }

            None
        })
    }

    /// Number of stored names.
    pub fn len(&self) -> usize {
        self.iter().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> DomainName {
        DomainName::new(s).unwrap()
    }

    #[test]
    fn test_zone_lookup() {
        let t = DomainTree::new()
            .insert(&d("example.com"), "zone")
            .insert(&d("www.example.com"), "host");

        assert_eq!(t.get(&d("www.example.com")), Some(&"host"));
        assert_eq!(t.get(&d("mail.example.com")), Some(&"zone"));
        assert_eq!(t.get(&d("a.b.example.com")), Some(&"zone"));
        assert_eq!(t.get(&d("example.org")), None);
        assert_eq!(t.get(&d("com")), None);
        assert_eq!(t.get_exact(&d("mail.example.com")), None);
    }

    #[test]
    fn test_delete_keeps_old_version() {
        let t = DomainTree::new()
            .insert(&d("example.com"), 1)
            .insert(&d("www.example.com"), 2);

        let (n, ok) = t.delete(&d("www.example.com"));
        assert!(ok);
        assert_eq!(n.get(&d("www.example.com")), Some(&1));
        assert_eq!(t.get(&d("www.example.com")), Some(&2));

        let (n, ok) = n.delete(&d("www.example.com"));
        assert!(!ok);
        let (n, _) = n.delete(&d("example.com"));
        assert!(n.is_empty());
    }

    #[test]
    fn test_iter_order() {
        let t = DomainTree::new()
            .insert(&d("b.example.com"), ())
            .insert(&d("example.com"), ())
            .insert(&d("a.example.com"), ())
            .insert(&d("example.org"), ());

        let names: Vec<String> = t.iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec!["example.com", "a.example.com", "b.example.com", "example.org"]
        );
    }
}
