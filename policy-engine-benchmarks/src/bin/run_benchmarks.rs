//! PDP engine benchmark runner.
//!
//! Usage:
//!   run_benchmarks [OPTIONS]
//!
//! Options:
//!   -o, --output <DIR>      Base directory for results (default: .)
//!   -f, --filter <PATTERN>  Only run benchmarks matching pattern
//!   -v, --verbose           Enable debug logging
//!   --json                  Print results as JSON to stdout
//!   --json-logs             Emit logs as JSON
//!   --no-write              Don't write results to files
//!   --list                  List benchmarks without running them

use anyhow::Context;
use clap::Parser;
use policy_engine_benchmarks::adapters::all_targets;
use policy_engine_benchmarks::benchmarks::{self, io, BenchmarkResult};
use std::path::PathBuf;

/// Run PDP engine benchmarks and generate reports
#[derive(Parser, Debug)]
#[command(name = "run_benchmarks")]
#[command(version, about)]
struct Args {
    /// Base directory for benchmark results
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Only run benchmarks matching this pattern
    #[arg(short, long)]
    filter: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Print results as JSON to stdout
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Don't write results to files
    #[arg(long)]
    no_write: bool,

    /// List available benchmarks without running them
    #[arg(long)]
    list: bool,
}

fn print_table(results: &[BenchmarkResult]) {
    println!("\nResults Summary:");
    println!("{:-<70}", "");
    println!(
        "{:<30} {:>15} {:>10} {:>10}",
        "Target", "Duration (ms)", "Throughput", "Status"
    );
    println!("{:-<70}", "");

    for result in results {
        let duration = result
            .duration_ms()
            .map(|d| format!("{d:.2}"))
            .unwrap_or_else(|| "N/A".to_string());

        let throughput = result
            .throughput()
            .map(|t| format!("{t:.1}"))
            .unwrap_or_else(|| "N/A".to_string());

        let status = if result.is_success() { "OK" } else { "FAIL" };

        println!(
            "{:<30} {:>15} {:>10} {:>10}",
            result.target_id, duration, throughput, status
        );
    }

    println!("{:-<70}\n", "");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    pdp_engine::telemetry::init_logging(level, args.json_logs)
        .context("failed to initialize logging")?;

    if args.list {
        println!("Available benchmark targets:\n");
        for target in all_targets() {
            println!(
                "  {} - {} ({:?})",
                target.id(),
                target.description(),
                target.duration_category()
            );
        }
        return Ok(());
    }

    let results = match &args.filter {
        Some(pattern) => benchmarks::run_matching(pattern).await,
        None => benchmarks::run_all_benchmarks().await,
    };

    if results.is_empty() {
        eprintln!("No benchmarks match the filter pattern");
        return Ok(());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_table(&results);
    }

    if !args.no_write {
        io::write_results(&results, &args.output)
            .with_context(|| format!("failed to write results to {}", args.output.display()))?;
    }

    let failed = results.iter().filter(|r| !r.is_success()).count();
    if failed > 0 {
        anyhow::bail!("{failed} benchmark(s) failed");
    }

    Ok(())
}
