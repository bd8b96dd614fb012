//! Benchmark targets.
//!
//! Every target implements [`BenchTarget`] and is registered in
//! [`all_targets`]. Engine calls are synchronous, so targets run their
//! measurement loops on tokio's blocking pool.

pub mod concurrent_decisions;
pub mod network_lookup;
pub mod policy_evaluation;
pub mod storage_update;
pub mod wire_codec;

use crate::benchmarks::BenchmarkResult;
use async_trait::async_trait;
use std::error::Error;

pub use concurrent_decisions::ConcurrentDecisionsAdapter;
pub use network_lookup::NetworkLookupAdapter;
pub use policy_evaluation::PolicyEvaluationAdapter;
pub use storage_update::StorageUpdateAdapter;
pub use wire_codec::WireCodecAdapter;

/// Error returned by a benchmark run.
pub type BenchError = Box<dyn Error + Send + Sync>;

/// Benchmark target.
///
/// ```rust
/// use policy_engine_benchmarks::adapters::{BenchError, BenchTarget};
/// use policy_engine_benchmarks::benchmarks::BenchmarkResult;
/// use async_trait::async_trait;
///
/// struct MyBenchmark;
///
/// #[async_trait]
/// impl BenchTarget for MyBenchmark {
///     fn id(&self) -> &str {
///         "my_benchmark"
///     }
///
///     async fn run(&self) -> Result<BenchmarkResult, BenchError> {
///         Ok(BenchmarkResult::new("my_benchmark", serde_json::json!({"duration_ms": 10.0})))
///     }
/// }
/// ```
#[async_trait]
pub trait BenchTarget: Send + Sync {
    /// Unique identifier, also used as the raw result file name.
    fn id(&self) -> &str;

    /// Execute the benchmark and return its metrics.
    async fn run(&self) -> Result<BenchmarkResult, BenchError>;

    /// Human-readable description.
    fn description(&self) -> &str {
        "No description provided"
    }

    /// Expected duration category.
    fn duration_category(&self) -> DurationCategory {
        DurationCategory::Medium
    }
}

/// Duration category for benchmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationCategory {
    /// Under a second
    Fast,
    /// One to ten seconds
    Medium,
    /// Over ten seconds
    Slow,
}

/// Run a synchronous measurement on the blocking pool.
pub(crate) async fn blocking<F>(f: F) -> Result<BenchmarkResult, BenchError>
where
    F: FnOnce() -> Result<BenchmarkResult, BenchError> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

/// All registered benchmark targets.
pub fn all_targets() -> Vec<Box<dyn BenchTarget>> {
    vec![
        Box::new(PolicyEvaluationAdapter::new()),
        Box::new(ConcurrentDecisionsAdapter::new()),
        Box::new(WireCodecAdapter::new()),
        Box::new(StorageUpdateAdapter::new()),
        Box::new(NetworkLookupAdapter::new()),
    ]
}
