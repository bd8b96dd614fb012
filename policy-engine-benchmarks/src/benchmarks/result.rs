//! Benchmark results and latency statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;

/// Result of one benchmark target.
///
/// # Fields
///
/// * `target_id` - Unique identifier for the benchmark target
/// * `metrics` - JSON value containing benchmark metrics (duration, throughput, etc.)
/// * `timestamp` - UTC timestamp when the benchmark was executed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Unique identifier for the benchmark target
    pub target_id: String,

    /// JSON object containing benchmark metrics
    ///
    /// Common metrics include:
    /// - `duration_ms`: Execution time in milliseconds
    /// - `iterations`: Number of iterations performed
    /// - `throughput`: Operations per second
    /// - `success`: Boolean indicating success/failure
    /// - `error`: Error message if failed
    pub metrics: Value,

    /// UTC timestamp when the benchmark was executed
    pub timestamp: DateTime<Utc>,
}

impl BenchmarkResult {
    /// Create a new benchmark result with the current timestamp.
    ///
    /// ```rust
    /// use policy_engine_benchmarks::benchmarks::result::BenchmarkResult;
    /// use serde_json::json;
    ///
    /// let result = BenchmarkResult::new(
    ///     "wire_codec",
    ///     json!({
    ///         "duration_ms": 4.2,
    ///         "iterations": 1000,
    ///         "throughput": 238095.2
    ///     })
    /// );
    /// assert!(result.is_success());
    /// ```
    pub fn new(target_id: impl Into<String>, metrics: Value) -> Self {
        Self {
            target_id: target_id.into(),
            metrics,
            timestamp: Utc::now(),
        }
    }

    /// Create a failed benchmark result.
    pub fn failed(target_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(
            target_id,
            json!({
                "success": false,
                "error": error.into()
            }),
        )
    }

    /// Check if the benchmark succeeded.
    pub fn is_success(&self) -> bool {
        self.metrics
            .get("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(true)
    }

    /// Get the duration in milliseconds if available.
    pub fn duration_ms(&self) -> Option<f64> {
        self.metrics.get("duration_ms").and_then(|v| v.as_f64())
    }

    /// Get the throughput if available.
    pub fn throughput(&self) -> Option<f64> {
        self.metrics.get("throughput").and_then(|v| v.as_f64())
    }
}

/// Latency distribution of repeated operation calls in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    /// Number of samples
    pub iterations: usize,
    /// Wall time of all iterations
    pub duration_ms: f64,
    /// Mean latency
    pub mean_ms: f64,
    /// Median latency
    pub median_ms: f64,
    /// Fastest call
    pub min_ms: f64,
    /// Slowest call
    pub max_ms: f64,
    /// 95th percentile
    pub p95_ms: f64,
    /// 99th percentile
    pub p99_ms: f64,
    /// Calls per second
    pub throughput: f64,
}

impl LatencyStats {
    /// Call `f` the given number of times and collect its latencies. The
    /// first error stops the measurement.
    pub fn measure<E>(iterations: usize, mut f: impl FnMut(usize) -> Result<(), E>) -> Result<Self, E> {
        let start = Instant::now();
        let mut samples = Vec::with_capacity(iterations);
        for i in 0..iterations {
            let t = Instant::now();
            f(i)?;
            samples.push(t.elapsed().as_secs_f64() * 1000.0);
        }

        Ok(Self::from_samples(samples, start.elapsed().as_secs_f64() * 1000.0))
    }

    /// Statistics of latency samples.
    pub fn from_samples(mut samples: Vec<f64>, duration_ms: f64) -> Self {
        if samples.is_empty() {
            return Self {
                iterations: 0,
                duration_ms,
                mean_ms: 0.0,
                median_ms: 0.0,
                min_ms: 0.0,
                max_ms: 0.0,
                p95_ms: 0.0,
                p99_ms: 0.0,
                throughput: 0.0,
            };
        }

        samples.sort_by(f64::total_cmp);
        let n = samples.len();
        let pct = |p: f64| samples[((n as f64 * p) as usize).min(n - 1)];
        let mean_ms = samples.iter().sum::<f64>() / n as f64;

        Self {
            iterations: n,
            duration_ms,
            mean_ms,
            median_ms: samples[n / 2],
            min_ms: samples[0],
            max_ms: samples[n - 1],
            p95_ms: pct(0.95),
            p99_ms: pct(0.99),
            throughput: if mean_ms > 0.0 { 1000.0 / mean_ms } else { 0.0 },
        }
    }

    /// Metrics object of a successful run with extra fields merged in.
    pub fn to_metrics(&self, operation: &str, extra: Value) -> Value {
        let mut metrics = json!({
            "success": true,
            "operation": operation,
        });

        if let (Some(m), Ok(Value::Object(stats))) =
            (metrics.as_object_mut(), serde_json::to_value(self))
        {
            m.extend(stats);
            if let Value::Object(extra) = extra {
                m.extend(extra);
            }
        }

        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_result() {
        let result = BenchmarkResult::new(
            "test_target",
            json!({
                "duration_ms": 100.0,
                "success": true
            }),
        );

        assert_eq!(result.target_id, "test_target");
        assert!(result.is_success());
        assert_eq!(result.duration_ms(), Some(100.0));
    }

    #[test]
    fn test_failed_result() {
        let result = BenchmarkResult::failed("test_target", "buffer overflow");

        assert!(!result.is_success());
        assert!(result.metrics["error"].as_str().unwrap().contains("overflow"));
    }

    #[test]
    fn test_stats() {
        let samples: Vec<f64> = (1..=100).map(f64::from).collect();
        let stats = LatencyStats::from_samples(samples, 5050.0);

        assert_eq!(stats.iterations, 100);
        assert_eq!(stats.min_ms, 1.0);
        assert_eq!(stats.max_ms, 100.0);
        assert_eq!(stats.median_ms, 51.0);
        assert_eq!(stats.p95_ms, 96.0);
        assert_eq!(stats.p99_ms, 100.0);
        assert!((stats.mean_ms - 50.5).abs() < 1e-9);
    }

    #[test]
    fn test_measure_stops_on_error() {
        let res = LatencyStats::measure(10, |i| if i == 3 { Err("boom") } else { Ok(()) });
        assert_eq!(res.unwrap_err(), "boom");

        let stats = LatencyStats::measure::<()>(5, |_| Ok(())).unwrap();
        assert_eq!(stats.iterations, 5);

        let metrics = stats.to_metrics("noop", json!({"users": 3}));
        assert_eq!(metrics["operation"], "noop");
        assert_eq!(metrics["iterations"], 5);
        assert_eq!(metrics["users"], 3);
        assert_eq!(metrics["success"], true);
    }

    #[test]
    fn test_serialization() {
        let result = BenchmarkResult::new("test", json!({"value": 42}));
        let json = serde_json::to_string(&result).unwrap();
        let deserialized: BenchmarkResult = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.target_id, result.target_id);
    }
}
