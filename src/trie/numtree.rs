//! Persistent binary radix tries keyed by fixed width integers.
//!
//! A key is the top `bits` significant bits of an integer. Every update
//! returns a new root and leaves the old one untouched, unchanged subtrees are
//! shared between versions.

use crate::error::{Error, ErrorKind, Result};
use std::fmt::{self, Write as _};
use std::sync::Arc;

macro_rules! radix_tree {
    ($(#[$meta:meta])* $tree:ident, $node:ident, $key:ty, $width:expr) => {
        #[derive(Debug)]
        struct $node<V> {
            key: $key,
            bits: u8,
            value: Option<V>,
            children: [Option<Arc<$node<V>>>; 2],
        }

        impl<V: Clone> Clone for $node<V> {
            fn clone(&self) -> Self {
                Self {
                    key: self.key,
                    bits: self.bits,
                    value: self.value.clone(),
                    children: self.children.clone(),
                }
            }
        }

        impl<V: Clone> $node<V> {
            fn mask(bits: u8) -> $key {
                if bits == 0 {
                    0
                } else {
                    <$key>::MAX << ($width - bits as u32)
                }
            }

            fn branch(key: $key, after: u8) -> usize {
                ((key >> ($width - 1 - after as u32)) & 1) as usize
            }

            fn insert(n: &Option<Arc<Self>>, mut c: Self) -> Arc<Self> {
                let n = match n {
                    None => return Arc::new(c),
                    Some(n) => n,
                };

                // Number of common most significant bits. Masks put ones past
                // the shorter prefix so the count can't go beyond it.
                let bits = ((n.key ^ c.key) | !Self::mask(n.bits) | !Self::mask(c.bits))
                    .leading_zeros() as u8;

                if bits < n.bits {
                    let branch = Self::branch(n.key, bits);
                    if bits == c.bits {
                        c.children[branch] = Some(n.clone());
                        return Arc::new(c);
                    }

                    let mut m = Self {
                        key: c.key & Self::mask(bits),
                        bits,
                        value: None,
                        children: [None, None],
                    };
                    m.children[branch] = Some(n.clone());
                    m.children[1 - branch] = Some(Arc::new(c));
                    return Arc::new(m);
                }

                if c.bits == n.bits {
                    c.children = n.children.clone();
                    return Arc::new(c);
                }

                let mut m = n.as_ref().clone();
                let branch = Self::branch(c.key, bits);
                m.children[branch] = Some(Self::insert(&m.children[branch], c));
                Arc::new(m)
            }

            fn get<'a>(n: &'a Option<Arc<Self>>, key: $key, bits: u8) -> Option<&'a Self> {
                let n = n.as_deref()?;
                if n.bits > bits {
                    return None;
                }

                let contains = n.value.is_some() && (n.key ^ key) & Self::mask(n.bits) == 0;
                if n.bits == bits {
                    return if contains { Some(n) } else { None };
                }

                if let Some(r) = Self::get(&n.children[Self::branch(key, n.bits)], key, bits) {
                    return Some(r);
                }

                if contains {
                    Some(n)
                } else {
                    None
                }
            }

            fn exact<'a>(n: &'a Option<Arc<Self>>, key: $key, bits: u8) -> Option<&'a Self> {
                let n = n.as_deref()?;
                if n.bits > bits || (n.key ^ key) & Self::mask(n.bits) != 0 {
                    return None;
                }

                if n.bits == bits {
                    return n.value.as_ref().map(|_| n);
                }

                Self::exact(&n.children[Self::branch(key, n.bits)], key, bits)
            }

            fn delete(n: &Option<Arc<Self>>, key: $key, bits: u8) -> Option<Option<Arc<Self>>> {
                let node = n.as_deref()?;
                if node.bits > bits || (node.key ^ key) & Self::mask(node.bits) != 0 {
                    return None;
                }

                if node.bits == bits {
                    node.value.as_ref()?;
                    return Some(Self::collapse(node.children.clone()));
                }

                let branch = Self::branch(key, node.bits);
                let child = Self::delete(&node.children[branch], key, bits)?;

                let mut m = node.clone();
                m.children[branch] = child;
                if m.value.is_none() {
                    return Some(Self::collapse(m.children));
                }

                Some(Some(Arc::new(m)))
            }

            fn collapse(children: [Option<Arc<Self>>; 2]) -> Option<Arc<Self>> {
                match children {
                    [None, None] => None,
                    [Some(c), None] | [None, Some(c)] => Some(c),
                    [Some(l), Some(r)] => {
                        let bits = ((l.key ^ r.key) | !Self::mask(l.bits) | !Self::mask(r.bits))
                            .leading_zeros() as u8;
                        Some(Arc::new(Self {
                            key: l.key & Self::mask(bits),
                            bits,
                            value: None,
                            children: [Some(l), Some(r)],
                        }))
                    }
                }
            }
        }

        $(#[$meta])*
        #[derive(Debug)]
        pub struct $tree<V> {
            root: Option<Arc<$node<V>>>,
        }

        impl<V> Clone for $tree<V> {
            fn clone(&self) -> Self {
                Self {
                    root: self.root.clone(),
                }
            }
        }

        impl<V> Default for $tree<V> {
            fn default() -> Self {
                Self { root: None }
            }
        }

        impl<V: Clone> $tree<V> {
            /// Width of the key in bits.
            pub const WIDTH: usize = $width as usize;

            /// Create an empty tree.
            pub fn new() -> Self {
                Self::default()
            }

            /// Check if the tree has no nodes.
            pub fn is_empty(&self) -> bool {
                self.root.is_none()
            }

            /// Insert a value for the top `bits` bits of `key` and return the
            /// new tree. Replaces the value of an identical key.
            pub fn insert(&self, key: $key, bits: usize, value: V) -> Result<Self> {
                if bits > Self::WIDTH {
                    return Err(Error::new(ErrorKind::KeyBitsOutOfRange {
                        bits,
                        width: Self::WIDTH,
                    }));
                }

                let bits = bits as u8;
                let leaf = $node {
                    key: key & $node::<V>::mask(bits),
                    bits,
                    value: Some(value),
                    children: [None, None],
                };

                Ok(Self {
                    root: Some($node::insert(&self.root, leaf)),
                })
            }

            /// Get the value of the longest prefix containing the top `bits`
            /// bits of `key`. Bits beyond the key width are clamped.
            pub fn get(&self, key: $key, bits: usize) -> Option<&V> {
                let bits = bits.min(Self::WIDTH) as u8;
                $node::get(&self.root, key & $node::<V>::mask(bits), bits)
                    .and_then(|n| n.value.as_ref())
            }

            /// Get the value stored for exactly this prefix.
            pub fn get_exact(&self, key: $key, bits: usize) -> Option<&V> {
                if bits > Self::WIDTH {
                    return None;
                }

                let bits = bits as u8;
                $node::exact(&self.root, key & $node::<V>::mask(bits), bits)
                    .and_then(|n| n.value.as_ref())
            }

            /// Delete the value stored for exactly this prefix. Returns the new
            /// tree and whether anything was removed.
            pub fn delete(&self, key: $key, bits: usize) -> (Self, bool) {
                if bits > Self::WIDTH {
                    return (self.clone(), false);
                }

                let bits = bits as u8;
                match $node::delete(&self.root, key & $node::<V>::mask(bits), bits) {
                    Some(root) => (Self { root }, true),
                    None => (self.clone(), false),
                }
            }

            /// Iterate over stored (key, bits, value) triples in pre-order.
            pub fn iter(&self) -> impl Iterator<Item = ($key, usize, &V)> + '_ {
                let mut stack: Vec<&$node<V>> = self.root.as_deref().into_iter().collect();
                std::iter::from_fn(move || {
                    while let Some(n) = stack.pop() {
                        for c in n.children.iter().rev().flatten() {
                            stack.push(c);
                        }

                        if let Some(v) = &n.value {
                            return Some((n.key, n.bits as usize, v));
                        }
                    }

                    None
                })
            }
        }

        impl<V: Clone + fmt::Debug> $tree<V> {
            /// Dump the tree in Graphviz dot format.
            pub fn dot(&self) -> String {
                let digits = $width as usize / 4;
                let mut body = String::new();
                let mut queue: std::collections::VecDeque<Option<&$node<V>>> =
                    std::collections::VecDeque::new();
                queue.push_back(self.root.as_deref());

                let mut i = 0;
                while let Some(n) = queue.pop_front() {
                    match n {
                        None => {
                            let _ = writeln!(body, "N{} [label=\"nil\"]", i);
                        }
                        Some(n) => {
                            let label = match &n.value {
                                Some(v) => format!(
                                    "k: {:0width$x}, b: {}, v: \\\"{}\\\"",
                                    n.key,
                                    n.bits,
                                    format!("{:?}", v).replace('"', "\\\""),
                                    width = digits
                                ),
                                None => format!("k: {:0width$x}, b: {}", n.key, n.bits, width = digits),
                            };
                            let _ = writeln!(body, "N{} [label=\"{}\"]", i, label);

                            if n.children.iter().any(Option::is_some) {
                                let next = i + queue.len() + 1;
                                let _ = writeln!(body, "N{} -> {{ N{} N{} }}", i, next, next + 1);
                                queue.push_back(n.children[0].as_deref());
                                queue.push_back(n.children[1].as_deref());
                            }
                        }
                    }
                    i += 1;
                }

                format!("digraph d {{\n{}}}\n", body)
            }
        }
    };
}

radix_tree!(
    /// Persistent radix trie keyed by the top bits of a 32-bit integer.
    Node32,
    Leaf32,
    u32,
    32u32
);

radix_tree!(
    /// Persistent radix trie keyed by the top bits of a 64-bit integer.
    Node64,
    Leaf64,
    u64,
    64u32
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node32_longest_prefix() {
        let t = Node32::new()
            .insert(0xc0000000, 8, "192")
            .unwrap()
            .insert(0xc0a80000, 16, "192.168")
            .unwrap();

        assert_eq!(t.get(0xc0a80101, 32), Some(&"192.168"));
        assert_eq!(t.get(0xc0010101, 32), Some(&"192"));
        assert_eq!(t.get(0x0a000001, 32), None);
        assert_eq!(t.get(0xc0a80000, 4), None);
        assert_eq!(t.get_exact(0xc0a80101, 16), Some(&"192.168"));
        assert_eq!(t.get_exact(0xc0a80101, 24), None);
    }

    #[test]
    fn test_node32_copy_on_write() {
        let old = Node32::new().insert(0xc0000000, 8, 1).unwrap();
        let new = old.insert(0xc0000000, 8, 2).unwrap();

        assert_eq!(old.get(0xc0000001, 32), Some(&1));
        assert_eq!(new.get(0xc0000001, 32), Some(&2));
    }

    #[test]
    fn test_node32_bits_out_of_range() {
        let err = Node32::new().insert(0, 33, ()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::KeyBitsOutOfRange { bits: 33, width: 32 }));
    }

    #[test]
    fn test_node32_root_prefix() {
        let t = Node32::new().insert(0, 0, "all").unwrap();
        assert_eq!(t.get(0xffffffff, 32), Some(&"all"));
    }

    #[test]
    fn test_node32_delete() {
        let t = Node32::new()
            .insert(0xc0000000, 8, "a")
            .unwrap()
            .insert(0xc0a80000, 16, "b")
            .unwrap()
            .insert(0x0a000000, 8, "c")
            .unwrap();

        let (d, ok) = t.delete(0xc0000000, 8);
        assert!(ok);
        assert_eq!(d.get(0xc0010101, 32), None);
        assert_eq!(d.get(0xc0a80101, 32), Some(&"b"));
        assert_eq!(d.get(0x0a000001, 32), Some(&"c"));
        assert_eq!(t.get(0xc0010101, 32), Some(&"a"));

        let (_, ok) = d.delete(0xc0000000, 8);
        assert!(!ok);

        let (d, _) = d.delete(0xc0a80000, 16);
        let (d, _) = d.delete(0x0a000000, 8);
        assert!(d.is_empty());
    }

    #[test]
    fn test_node64_iter_order() {
        let t = Node64::new()
            .insert(0x8000000000000000, 1, 2)
            .unwrap()
            .insert(0, 1, 1)
            .unwrap()
            .insert(0, 0, 0)
            .unwrap();

        let items: Vec<_> = t.iter().map(|(_, bits, v)| (bits, *v)).collect();
        assert_eq!(items, vec![(0, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn test_dot() {
        let t = Node32::new().insert(0xc0000000, 8, 1).unwrap();
        let dot = t.dot();
        assert!(dot.starts_with("digraph d {\n"));
        assert!(dot.contains("k: c0000000, b: 8"));
    }
}
