//! Decisions from several threads sharing one engine while policies are
//! being republished.

use super::{BenchError, BenchTarget, DurationCategory};
use crate::benchmarks::{BenchmarkResult, LatencyStats};
use crate::fixtures::{sample_engine, sample_policies, sample_request};
use async_trait::async_trait;
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

const WORKERS: usize = 4;
const ITERATIONS: usize = 5_000;
const USERS: usize = 16;
const REPUBLISHES: usize = 20;

/// Measures decision latency under concurrent readers and a writer
/// replacing the policy storage.
pub struct ConcurrentDecisionsAdapter {
    workers: usize,
    iterations: usize,
}

impl ConcurrentDecisionsAdapter {
    /// Create an adapter with the default sizes.
    pub fn new() -> Self {
        Self {
            workers: WORKERS,
            iterations: ITERATIONS,
        }
    }

    /// Adapter with custom worker count and per-worker iterations.
    pub fn with_sizes(workers: usize, iterations: usize) -> Self {
        Self {
            workers,
            iterations,
        }
    }
}

impl Default for ConcurrentDecisionsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BenchTarget for ConcurrentDecisionsAdapter {
    fn id(&self) -> &str {
        "concurrent_decisions"
    }

    fn description(&self) -> &str {
        "Decides requests from parallel workers while policies are republished"
    }

    fn duration_category(&self) -> DurationCategory {
        DurationCategory::Medium
    }

    async fn run(&self) -> Result<BenchmarkResult, BenchError> {
        let engine = Arc::new(sample_engine(USERS)?);
        let iterations = self.iterations;
        let start = Instant::now();

        let mut workers = Vec::with_capacity(self.workers);
        for w in 0..self.workers {
            let engine = engine.clone();
            workers.push(tokio::task::spawn_blocking(move || {
                let request = sample_request(w % USERS)?;
                let mut out = vec![0; engine.config().engine.max_response_size];
                LatencyStats::measure(iterations, |_| {
                    let n = engine.decide(&request, &mut out)?;
                    black_box(&out[..n]);
                    Ok::<_, pdp_engine::Error>(())
                })
            }));
        }

        let writer = {
            let engine = engine.clone();
            tokio::task::spawn_blocking(move || {
                for _ in 0..REPUBLISHES {
                    engine.set_policies(sample_policies(USERS, Some(Uuid::new_v4()))?);
                }
                Ok::<_, pdp_engine::Error>(())
            })
        };

        let mut samples = Vec::with_capacity(self.workers);
        for worker in workers {
            samples.push(worker.await??);
        }
        writer.await??;

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        let total = samples.iter().map(|s| s.iterations).sum::<usize>();
        let worst_p99 = samples.iter().map(|s| s.p99_ms).fold(0.0, f64::max);
        let mean_ms = if samples.is_empty() {
            0.0
        } else {
            samples.iter().map(|s| s.mean_ms).sum::<f64>() / samples.len() as f64
        };

        Ok(BenchmarkResult::new(
            self.id(),
            json!({
                "success": true,
                "operation": "decide",
                "workers": self.workers,
                "republishes": REPUBLISHES,
                "iterations": total,
                "duration_ms": duration_ms,
                "mean_ms": mean_ms,
                "p99_ms": worst_p99,
                "throughput": if duration_ms > 0.0 { total as f64 * 1000.0 / duration_ms } else { 0.0 },
                "policy_tag": engine.metrics().policy_tag,
            }),
        ))
    }
}
