//! Prefix map over IPv4 and IPv6 networks.

use super::numtree::{Node32, Node64};
use crate::value::{canonical_addr, Network};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const HALF: usize = 64;

#[derive(Debug)]
struct V6Entry<V> {
    value: Option<V>,
    low: Node64<V>,
}

impl<V: Clone> Clone for V6Entry<V> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            low: self.low.clone(),
        }
    }
}

/// Persistent map from networks to values with longest prefix lookup.
///
/// IPv6 prefixes up to /64 live in the upper tree, longer prefixes go to a
/// lower tree hanging off the /64 entry they belong to.
#[derive(Debug)]
pub struct NetworkTree<V> {
    v4: Node32<V>,
    v6: Node64<V6Entry<V>>,
}

impl<V> Clone for NetworkTree<V> {
    fn clone(&self) -> Self {
        Self {
            v4: self.v4.clone(),
            v6: self.v6.clone(),
        }
    }
}

impl<V> Default for NetworkTree<V> {
    fn default() -> Self {
        Self {
            v4: Node32::default(),
            v6: Node64::default(),
        }
    }
}

fn split(addr: Ipv6Addr) -> (u64, u64) {
    let n = u128::from(addr);
    ((n >> 64) as u64, n as u64)
}

impl<V: Clone> NetworkTree<V> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the tree holds no networks.
    pub fn is_empty(&self) -> bool {
        self.v4.is_empty() && self.v6.is_empty()
    }

    /// Insert a value for the network and return the new tree.
    pub fn insert_net(&self, net: &Network, value: V) -> Self {
        let prefix = net.prefix() as usize;
        match net.addr() {
            IpAddr::V4(a) => Self {
                v4: self
                    .v4
                    .insert(u32::from(a), prefix, value)
                    .unwrap_or_else(|_| self.v4.clone()),
                v6: self.v6.clone(),
            },
            IpAddr::V6(a) => {
                let (high, low) = split(a);
                let entry = if prefix <= HALF {
                    let low = self
                        .v6
                        .get_exact(high, prefix)
                        .map(|e| e.low.clone())
                        .unwrap_or_default();
                    V6Entry {
                        value: Some(value),
                        low,
                    }
                } else {
                    let current = self.v6.get_exact(high, HALF);
                    let base = current.map(|e| e.low.clone()).unwrap_or_default();
                    V6Entry {
                        value: current.and_then(|e| e.value.clone()),
                        low: base
                            .insert(low, prefix - HALF, value)
                            .unwrap_or_else(|_| base.clone()),
                    }
                };

                let bits = prefix.min(HALF);
                Self {
                    v4: self.v4.clone(),
                    v6: self
                        .v6
                        .insert(high, bits, entry)
                        .unwrap_or_else(|_| self.v6.clone()),
                }
            }
        }
    }

    /// Get the value of the most specific network containing the address.
    pub fn get_by_addr(&self, addr: &IpAddr) -> Option<&V> {
        match canonical_addr(*addr) {
            IpAddr::V4(a) => self.v4.get(u32::from(a), 32),
            IpAddr::V6(a) => {
                let (high, low) = split(a);
                self.get_v6(high, low, 128)
            }
        }
    }

    /// Get the value of the most specific network containing the network.
    pub fn get_by_net(&self, net: &Network) -> Option<&V> {
        match net.addr() {
            IpAddr::V4(a) => self.v4.get(u32::from(a), net.prefix() as usize),
            IpAddr::V6(a) => {
                let (high, low) = split(a);
                self.get_v6(high, low, net.prefix() as usize)
            }
        }
    }

    /// Get the value stored for exactly this network.
    pub fn get_exact_net(&self, net: &Network) -> Option<&V> {
        let prefix = net.prefix() as usize;
        match net.addr() {
            IpAddr::V4(a) => self.v4.get_exact(u32::from(a), prefix),
            IpAddr::V6(a) => {
                let (high, low) = split(a);
                let entry = self.v6.get_exact(high, prefix.min(HALF))?;
                if prefix > HALF {
                    entry.low.get_exact(low, prefix - HALF)
                } else {
                    entry.value.as_ref()
                }
            }
        }
    }

    fn get_v6(&self, high: u64, low: u64, prefix: usize) -> Option<&V> {
        let bits = prefix.min(HALF);
        let entry = self.v6.get(high, bits)?;
        if prefix > HALF {
            if let Some(v) = entry.low.get(low, prefix - HALF) {
                return Some(v);
            }
        }

        match &entry.value {
            Some(v) => Some(v),
            None if bits > 0 => self.v6.get(high, bits - 1).and_then(|e| e.value.as_ref()),
            None => None,
        }
    }

    /// Delete the value stored for exactly this network.
    pub fn delete_net(&self, net: &Network) -> (Self, bool) {
        let prefix = net.prefix() as usize;
        match net.addr() {
            IpAddr::V4(a) => {
                let (v4, ok) = self.v4.delete(u32::from(a), prefix);
                (
                    Self {
                        v4,
                        v6: self.v6.clone(),
                    },
                    ok,
                )
            }
            IpAddr::V6(a) => {
                let (high, low) = split(a);
                let bits = prefix.min(HALF);
                let entry = match self.v6.get_exact(high, bits) {
                    Some(e) => e,
                    None => return (self.clone(), false),
                };

                let updated = if prefix <= HALF {
                    if entry.value.is_none() {
                        return (self.clone(), false);
                    }

                    V6Entry {
                        value: None,
                        low: entry.low.clone(),
                    }
                } else {
                    let (low, ok) = entry.low.delete(low, prefix - HALF);
                    if !ok {
                        return (self.clone(), false);
                    }

                    V6Entry {
                        value: entry.value.clone(),
                        low,
                    }
                };

                let v6 = if updated.value.is_none() && updated.low.is_empty() {
                    self.v6.delete(high, bits).0
                } else {
                    self.v6
                        .insert(high, bits, updated)
                        .unwrap_or_else(|_| self.v6.clone())
                };

                (
                    Self {
                        v4: self.v4.clone(),
                        v6,
                    },
                    true,
                )
            }
        }
    }

    /// Iterate over stored networks, IPv4 first.
    pub fn iter(&self) -> impl Iterator<Item = (Network, &V)> + '_ {
        let v4 = self.v4.iter().filter_map(|(key, bits, v)| {
            Network::new(IpAddr::V4(Ipv4Addr::from(key)), bits as u8)
                .ok()
                .map(|n| (n, v))
        });

        let v6 = self.v6.iter().flat_map(|(high, bits, entry)| {
            let own = entry.value.as_ref().and_then(|v| {
                let addr = Ipv6Addr::from((high as u128) << 64);
                Network::new(IpAddr::V6(addr), bits as u8)
                    .ok()
                    .map(|n| (n, v))
            });

            let low = entry.low.iter().filter_map(move |(low, lbits, v)| {
                let addr = Ipv6Addr::from(((high as u128) << 64) | low as u128);
                Network::new(IpAddr::V6(addr), (HALF + lbits) as u8)
                    .ok()
                    .map(|n| (n, v))
            });

            own.into_iter().chain(low)
        });

        v4.chain(v6)
    }

    /// Number of stored networks.
    pub fn len(&self) -> usize {
        self.iter().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::parse_addr;

    fn net(s: &str) -> Network {
        s.parse().unwrap()
    }

    #[test]
    fn test_ipv4_lookup() {
        let t = NetworkTree::new()
            .insert_net(&net("192.168.0.0/16"), "wide")
            .insert_net(&net("192.168.1.0/24"), "narrow");

        assert_eq!(t.get_by_addr(&parse_addr("192.168.1.1").unwrap()), Some(&"narrow"));
        assert_eq!(t.get_by_addr(&parse_addr("192.168.2.1").unwrap()), Some(&"wide"));
        assert_eq!(t.get_by_addr(&parse_addr("10.0.0.1").unwrap()), None);
        assert_eq!(t.get_by_net(&net("192.168.1.128/25")), Some(&"narrow"));
        assert_eq!(t.get_by_net(&net("192.0.0.0/8")), None);
    }

    #[test]
    fn test_ipv6_lookup() {
        let t = NetworkTree::new()
            .insert_net(&net("2001:db8::/32"), 1)
            .insert_net(&net("2001:db8:0:1::/64"), 2)
            .insert_net(&net("2001:db8:0:1:8000::/65"), 3);

        let get = |s: &str| t.get_by_addr(&parse_addr(s).unwrap()).copied();
        assert_eq!(get("2001:db8:0:1:8000::1"), Some(3));
        assert_eq!(get("2001:db8:0:1::1"), Some(2));
        assert_eq!(get("2001:db8:0:2::1"), Some(1));
        assert_eq!(get("2001:db9::1"), None);
    }

    #[test]
    fn test_ipv6_long_prefix_without_parent() {
        let t = NetworkTree::new()
            .insert_net(&net("2001:db8::/32"), 1)
            .insert_net(&net("2001:db8:0:1:8000::/65"), 3);

        let get = |s: &str| t.get_by_addr(&parse_addr(s).unwrap()).copied();
        assert_eq!(get("2001:db8:0:1:8000::1"), Some(3));
        assert_eq!(get("2001:db8:0:1::1"), Some(1));
    }

    #[test]
    fn test_delete_and_iter() {
        let t = NetworkTree::new()
            .insert_net(&net("10.0.0.0/8"), ())
            .insert_net(&net("2001:db8::/32"), ())
            .insert_net(&net("2001:db8::/96"), ());

        let nets: Vec<String> = t.iter().map(|(n, _)| n.to_string()).collect();
        assert_eq!(nets, vec!["10.0.0.0/8", "2001:db8::/32", "2001:db8::/96"]);

        let (d, ok) = t.delete_net(&net("2001:db8::/96"));
        assert!(ok);
        assert_eq!(d.len(), 2);
        let (d, ok) = d.delete_net(&net("2001:db8::/96"));
        assert!(!ok);
        let (d, _) = d.delete_net(&net("2001:db8::/32"));
        let (d, _) = d.delete_net(&net("10.0.0.0/8"));
        assert!(d.is_empty());
        assert_eq!(t.len(), 3);
    }
}
