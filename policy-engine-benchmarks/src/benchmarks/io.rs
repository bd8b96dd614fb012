//! Reading and writing benchmark results.
//!
//! Layout under the base path:
//! - `benchmarks/output/summary.md`
//! - `benchmarks/output/raw/<target>.json`
//! - `benchmarks/output/raw/all_results.json`

use super::BenchmarkResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

/// Output directory relative to the base path.
pub const OUTPUT_DIR: &str = "benchmarks/output";

/// Raw JSON directory relative to the base path.
pub const RAW_OUTPUT_DIR: &str = "benchmarks/output/raw";

const ALL_RESULTS: &str = "all_results.json";

fn invalid_data(e: serde_json::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
    let w = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(w, value).map_err(invalid_data)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    let f = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    serde_json::from_reader(BufReader::new(f))
        .map(Some)
        .map_err(invalid_data)
}

/// Write raw JSON for every result, the combined results file and the
/// markdown summary.
pub fn write_results(results: &[BenchmarkResult], base_path: &Path) -> io::Result<()> {
    let output_dir = base_path.join(OUTPUT_DIR);
    let raw_dir = base_path.join(RAW_OUTPUT_DIR);
    fs::create_dir_all(&raw_dir)?;

    for result in results {
        let name = format!("{}.json", sanitize_filename(&result.target_id));
        write_json(&raw_dir.join(name), result)?;
    }
    write_json(&raw_dir.join(ALL_RESULTS), results)?;

    fs::write(
        output_dir.join("summary.md"),
        super::markdown::generate_summary(results),
    )?;

    tracing::info!(
        count = results.len(),
        dir = %output_dir.display(),
        "Wrote benchmark results"
    );
    Ok(())
}

/// Read the combined results of the last run. Missing results read as empty.
pub fn read_results(base_path: &Path) -> io::Result<Vec<BenchmarkResult>> {
    let path = base_path.join(RAW_OUTPUT_DIR).join(ALL_RESULTS);
    Ok(read_json(&path)?.unwrap_or_default())
}

/// Read the result of a single target.
pub fn read_result(base_path: &Path, target_id: &str) -> io::Result<Option<BenchmarkResult>> {
    let name = format!("{}.json", sanitize_filename(target_id));
    read_json(&base_path.join(RAW_OUTPUT_DIR).join(name))
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_read_results() {
        let temp_dir = TempDir::new().unwrap();
        let base_path = temp_dir.path();

        let results = vec![
            BenchmarkResult::new("policy_evaluation", json!({"duration_ms": 10.0})),
            BenchmarkResult::failed("wire_codec", "buffer overflow"),
        ];

        write_results(&results, base_path).unwrap();

        assert!(base_path.join(OUTPUT_DIR).join("summary.md").exists());
        assert!(base_path.join(RAW_OUTPUT_DIR).join(ALL_RESULTS).exists());
        assert!(base_path.join(RAW_OUTPUT_DIR).join("wire_codec.json").exists());

        let all = read_results(base_path).unwrap();
        assert_eq!(all.len(), 2);
        assert!(!all[1].is_success());

        let single = read_result(base_path, "policy_evaluation").unwrap().unwrap();
        assert_eq!(single.duration_ms(), Some(10.0));
        assert!(read_result(base_path, "missing").unwrap().is_none());
    }

    #[test]
    fn test_read_without_results() {
        let temp_dir = TempDir::new().unwrap();
        assert!(read_results(temp_dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("network_lookup"), "network_lookup");
        assert_eq!(sanitize_filename("with spaces"), "with_spaces");
        assert_eq!(sanitize_filename("with/slashes"), "with_slashes");
        assert_eq!(sanitize_filename("kebab-case"), "kebab-case");
    }
}
