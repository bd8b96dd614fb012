//! Markdown summary of benchmark results.

use super::BenchmarkResult;
use std::fmt::Write;

fn cell(v: Option<f64>, precision: usize) -> String {
    v.map(|v| format!("{v:.precision$}"))
        .unwrap_or_else(|| "N/A".to_string())
}

/// Render results as a markdown report with one table row per target and
/// a section listing failures.
pub fn generate_summary(results: &[BenchmarkResult]) -> String {
    let mut out = String::new();
    let passed = results.iter().filter(|r| r.is_success()).count();

    let _ = writeln!(out, "# PDP Engine Benchmark Summary\n");
    if let Some(first) = results.iter().map(|r| r.timestamp).min() {
        let _ = writeln!(out, "Run at {}\n", first.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    let _ = writeln!(out, "{passed} of {} targets succeeded.\n", results.len());

    let _ = writeln!(
        out,
        "| Target | Iterations | Duration (ms) | Mean (ms) | p99 (ms) | Throughput (ops/s) | Status |"
    );
    let _ = writeln!(out, "|---|---:|---:|---:|---:|---:|---|");

    for r in results {
        let iterations = r
            .metrics
            .get("iterations")
            .and_then(|v| v.as_u64())
            .map(|v| v.to_string())
            .unwrap_or_else(|| "N/A".to_string());

        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} |",
            r.target_id,
            iterations,
            cell(r.duration_ms(), 2),
            cell(r.metrics.get("mean_ms").and_then(|v| v.as_f64()), 4),
            cell(r.metrics.get("p99_ms").and_then(|v| v.as_f64()), 4),
            cell(r.throughput(), 1),
            if r.is_success() { "OK" } else { "FAIL" },
        );
    }

    let failures: Vec<_> = results.iter().filter(|r| !r.is_success()).collect();
    if !failures.is_empty() {
        let _ = writeln!(out, "\n## Failures\n");
        for r in failures {
            let error = r
                .metrics
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            let _ = writeln!(out, "- `{}`: {}", r.target_id, error);
        }
    }

    out
}
