//! Benchmark infrastructure: results, the markdown report and result I/O.

pub mod io;
pub mod markdown;
pub mod result;

pub use result::{BenchmarkResult, LatencyStats};

use crate::adapters::{all_targets, BenchTarget};
use tracing::{error, info};

/// Run every registered benchmark.
///
/// ```rust,no_run
/// use policy_engine_benchmarks::benchmarks::run_all_benchmarks;
///
/// #[tokio::main]
/// async fn main() {
///     for result in run_all_benchmarks().await {
///         println!("Target: {}, Metrics: {}", result.target_id, result.metrics);
///     }
/// }
/// ```
pub async fn run_all_benchmarks() -> Vec<BenchmarkResult> {
    run_targets(all_targets()).await
}

/// Run the benchmarks whose id contains `pattern`.
pub async fn run_matching(pattern: &str) -> Vec<BenchmarkResult> {
    let targets = all_targets()
        .into_iter()
        .filter(|t| t.id().contains(pattern))
        .collect();
    run_targets(targets).await
}

/// Run targets in order. A target which fails still produces a result,
/// marked as failed.
pub async fn run_targets(targets: Vec<Box<dyn BenchTarget>>) -> Vec<BenchmarkResult> {
    info!(
        engine = pdp_engine::VERSION,
        targets = targets.len(),
        "Running benchmarks"
    );

    let mut results = Vec::with_capacity(targets.len());
    for target in targets {
        match target.run().await {
            Ok(result) => {
                info!(target = target.id(), duration_ms = ?result.duration_ms(), "Completed");
                results.push(result);
            }
            Err(e) => {
                error!(target = target.id(), error = %e, "Failed");
                results.push(BenchmarkResult::failed(target.id(), e.to_string()));
            }
        }
    }

    results
}
