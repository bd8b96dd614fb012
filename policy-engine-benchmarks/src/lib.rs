//! PDP Engine Benchmarks
//!
//! Benchmark suite for the PDP engine. Each target measures one hot path
//! of the engine against the shared [`fixtures`]:
//! - wire request decisions through `PdpEngine::decide`
//! - request and response marshalling
//! - chained policy storage transactions
//! - network radix tree lookups
//!
//! Results are written as raw JSON plus a markdown summary.

pub mod adapters;
pub mod benchmarks;
pub mod fixtures;

pub use adapters::{all_targets, BenchTarget};
pub use benchmarks::{run_all_benchmarks, BenchmarkResult};
