//! IP networks.

use crate::error::{Error, ErrorKind, Result};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// An IPv4 or IPv6 network with host bits cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Network {
    addr: IpAddr,
    prefix: u8,
}

impl Network {
    /// Create a network out of an address and a prefix length. Host bits of
    /// the address are cleared.
    pub fn new(addr: IpAddr, prefix: u8) -> Result<Self> {
        let addr = canonical_addr(addr);
        let width = addr_width(&addr);
        if prefix as usize > width {
            return Err(Error::new(ErrorKind::InvalidNetworkStringCast {
                value: format!("{}/{}", addr, prefix),
                message: format!("prefix length must not exceed {}", width),
            }));
        }

        let addr = match addr {
            IpAddr::V4(a) => IpAddr::V4(Ipv4Addr::from(u32::from(a) & mask32(prefix))),
            IpAddr::V6(a) => IpAddr::V6(Ipv6Addr::from(u128::from(a) & mask128(prefix))),
        };

        Ok(Self { addr, prefix })
    }

    /// Network address.
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    /// Prefix length.
    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Check if it is an IPv4 network.
    pub fn is_ipv4(&self) -> bool {
        self.addr.is_ipv4()
    }

    /// Check if the network contains the address.
    pub fn contains(&self, addr: &IpAddr) -> bool {
        match (self.addr, canonical_addr(*addr)) {
            (IpAddr::V4(n), IpAddr::V4(a)) => {
                (u32::from(n) ^ u32::from(a)) & mask32(self.prefix) == 0
            }
            (IpAddr::V6(n), IpAddr::V6(a)) => {
                (u128::from(n) ^ u128::from(a)) & mask128(self.prefix) == 0
            }
            _ => false,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |message: &str| {
            Error::new(ErrorKind::InvalidNetworkStringCast {
                value: s.to_string(),
                message: message.to_string(),
            })
        };

        let (addr, prefix) = s.split_once('/').ok_or_else(|| invalid("missing prefix length"))?;
        let addr = IpAddr::from_str(addr).map_err(|e| invalid(&e.to_string()))?;
        let prefix = prefix
            .parse::<u8>()
            .map_err(|e| invalid(&e.to_string()))?;

        Network::new(addr, prefix).map_err(|_| invalid("invalid prefix length"))
    }
}

/// Convert IPv4-mapped IPv6 addresses to plain IPv4.
pub fn canonical_addr(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(a) => match a.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(a),
        },
        a => a,
    }
}

/// Parse an IPv4 or IPv6 address.
pub fn parse_addr(s: &str) -> Result<IpAddr> {
    IpAddr::from_str(s).map(canonical_addr).map_err(|_| {
        Error::new(ErrorKind::InvalidAddressStringCast {
            value: s.to_string(),
        })
    })
}

fn addr_width(addr: &IpAddr) -> usize {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn mask32(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix as u32)
    }
}

fn mask128(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - prefix as u32)
    }
}
