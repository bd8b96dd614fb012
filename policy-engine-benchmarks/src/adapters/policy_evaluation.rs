//! Decisions on marshalled requests through `PdpEngine::decide`.

use super::{blocking, BenchError, BenchTarget, DurationCategory};
use crate::benchmarks::{BenchmarkResult, LatencyStats};
use crate::fixtures::{sample_engine, sample_request};
use async_trait::async_trait;
use serde_json::json;
use std::hint::black_box;

const ITERATIONS: usize = 10_000;
const USERS: usize = 64;

/// Measures full request decisions: unmarshalling, evaluation of the
/// sample policy set and marshalling of the response.
pub struct PolicyEvaluationAdapter {
    users: usize,
    iterations: usize,
}

impl PolicyEvaluationAdapter {
    /// Create an adapter with the default sizes.
    pub fn new() -> Self {
        Self {
            users: USERS,
            iterations: ITERATIONS,
        }
    }

    /// Adapter with custom sizes.
    pub fn with_sizes(users: usize, iterations: usize) -> Self {
        Self { users, iterations }
    }
}

impl Default for PolicyEvaluationAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BenchTarget for PolicyEvaluationAdapter {
    fn id(&self) -> &str {
        "policy_evaluation"
    }

    fn description(&self) -> &str {
        "Decides marshalled requests against a first-applicable policy set"
    }

    fn duration_category(&self) -> DurationCategory {
        DurationCategory::Medium
    }

    async fn run(&self) -> Result<BenchmarkResult, BenchError> {
        let (users, iterations) = (self.users, self.iterations);
        let id = self.id().to_string();

        blocking(move || {
            let engine = sample_engine(users)?;
            // One request past the last user exercises the default policy.
            let requests = (0..=users)
                .map(sample_request)
                .collect::<Result<Vec<_>, _>>()?;
            let mut out = vec![0; engine.config().engine.max_response_size];

            let stats = LatencyStats::measure(iterations, |i| {
                let n = engine.decide(&requests[i % requests.len()], &mut out)?;
                black_box(&out[..n]);
                Ok::<_, pdp_engine::Error>(())
            })?;

            Ok(BenchmarkResult::new(
                id,
                stats.to_metrics(
                    "decide",
                    json!({
                        "users": users,
                        "policies": users + 1,
                        "request_bytes": requests[0].len(),
                    }),
                ),
            ))
        })
        .await
    }
}
