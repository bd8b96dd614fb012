//! Persistent radix tries.
//!
//! Integer keyed binary tries back the network map, a label trie backs the
//! domain map. All of them are copy-on-write and safe to share between
//! threads once built.

mod domain;
mod network;
mod numtree;

pub use domain::DomainTree;
pub use network::NetworkTree;
pub use numtree::{Node32, Node64};
