//! Public API for the decision point.
//!
//! [`PdpEngine`] publishes policy and content storages, evaluates requests
//! against them and serves the binary request/response protocol.

mod engine;

pub use engine::{EngineMetrics, PdpEngine, PdpEngineBuilder};
