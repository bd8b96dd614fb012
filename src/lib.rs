//! # PDP Engine
//!
//! Evaluation core of an XACML-like policy decision point. Policies are
//! trees of policy sets, policies and rules with targets, conditions and
//! obligations. A request is a bag of typed attributes, and the answer is an
//! effect (Permit, Deny, NotApplicable or one of the Indeterminate kinds)
//! with obligations to enforce.
//!
//! ## Features
//!
//! - **Typed values**: booleans, strings, integers, floats, addresses,
//!   networks, domains, string/network/domain collections and custom flags
//! - **Expressions**: a registry of typed functions picked by argument types
//!   when policies are built
//! - **Combining algorithms**: first-applicable, deny-overrides and the
//!   mapper which dispatches to children named by an expression
//! - **Selectors**: late-bound lookups in local content or external
//!   information points
//! - **Transactional updates**: copy-on-write policy and content trees
//!   guarded by UUID tags
//! - **Wire protocol**: compact binary requests and responses
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdp_engine::core::BasicAlgorithm;
//! use pdp_engine::policy::{Effect, Policy, Rule};
//! use pdp_engine::storage::PolicyStorage;
//! use pdp_engine::value::AttributeValue;
//! use pdp_engine::wire::{marshal_request, unmarshal_response};
//! use pdp_engine::PdpEngine;
//! use std::collections::HashMap;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let root = Policy::builder("root")
//!         .algorithm(BasicAlgorithm::FirstApplicableEffect)
//!         .rule(Rule::builder("permit").effect(Effect::Permit).build()?)
//!         .build()?;
//!
//!     let engine = PdpEngine::builder()
//!         .with_policies(PolicyStorage::new(Some(root.into()), HashMap::new(), None))
//!         .build()?;
//!
//!     let request = marshal_request(&[("user", AttributeValue::String("alice".into()))])?;
//!     let response = engine.decide_to_vec(&request)?;
//!     let (effect, _obligations) = unmarshal_response(&response)?;
//!     assert_eq!(effect, Effect::Permit);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod api;
pub mod config;
pub mod content;
pub mod context;
pub mod core;
pub mod error;
pub mod expression;
pub mod policy;
pub mod selector;
pub mod storage;
pub mod telemetry;
pub mod trie;
pub mod types;
pub mod value;
pub mod wire;

// Re-export main types for convenience
pub use api::{EngineMetrics, PdpEngine, PdpEngineBuilder};
pub use config::Config;
pub use context::Context;
pub use error::{Error, ErrorKind, Result};
pub use expression::{Attribute, AttributeAssignment, Expression, FunctionRegistry};
pub use policy::{Effect, Evaluable, Policy, PolicySet, Response, Rule};
pub use types::Type;
pub use value::AttributeValue;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
