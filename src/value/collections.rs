//! String collections.

use std::collections::BTreeMap;

/// Set of strings which remembers insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringSet {
    items: BTreeMap<String, usize>,
    next: usize,
}

impl StringSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a string. Returns false if it is already in the set, the original
    /// position is kept in that case.
    pub fn insert(&mut self, s: impl Into<String>) -> bool {
        let s = s.into();
        if self.items.contains_key(&s) {
            return false;
        }

        self.items.insert(s, self.next);
        self.next += 1;
        true
    }

    /// Remove a string.
    pub fn remove(&mut self, s: &str) -> bool {
        self.items.remove(s).is_some()
    }

    /// Check if the string is in the set.
    pub fn contains(&self, s: &str) -> bool {
        self.items.contains_key(s)
    }

    /// Number of strings.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate in lexical order.
    pub fn iter_by_key(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    /// Strings in insertion order.
    pub fn iter_sorted_by_insertion(&self) -> Vec<&str> {
        let mut items: Vec<(&String, &usize)> = self.items.iter().collect();
        items.sort_by_key(|(_, i)| **i);
        items.into_iter().map(|(s, _)| s.as_str()).collect()
    }
}

impl<S: Into<String>> FromIterator<S> for StringSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = StringSet::new();
        for s in iter {
            set.insert(s);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order() {
        let set: StringSet = ["zeta", "alpha", "mid", "alpha"].into_iter().collect();
        assert_eq!(set.len(), 3);
        assert_eq!(set.iter_sorted_by_insertion(), vec!["zeta", "alpha", "mid"]);
        assert_eq!(set.iter_by_key().collect::<Vec<_>>(), vec!["alpha", "mid", "zeta"]);
        assert!(set.contains("mid"));
        assert!(!set.contains("beta"));
    }
}
