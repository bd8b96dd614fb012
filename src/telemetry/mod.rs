//! Logging setup and decision metrics.

use crate::config::TelemetryConfig;
use crate::error::{Error, Result};
use crate::policy::{Effect, EFFECTS};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Fails if a global subscriber
/// has already been installed.
pub fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| Error::config(format!("invalid log filter {level:?}: {e}")))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let res = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    res.map_err(|e| Error::config(format!("can't install log subscriber: {e}")))
}

/// Decision and update counters.
pub struct Telemetry {
    config: TelemetryConfig,
    decisions: [AtomicU64; EFFECTS.len()],
    wire_errors: AtomicU64,
    policy_commits: AtomicU64,
    content_commits: AtomicU64,
    evaluation_time_us: AtomicU64,
    started_at: DateTime<Utc>,
    last_commit: Mutex<Option<DateTime<Utc>>>,
}

impl Telemetry {
    /// Create counters for the configuration.
    pub fn new(config: &TelemetryConfig) -> Self {
        Self {
            config: config.clone(),
            decisions: Default::default(),
            wire_errors: AtomicU64::new(0),
            policy_commits: AtomicU64::new(0),
            content_commits: AtomicU64::new(0),
            evaluation_time_us: AtomicU64::new(0),
            started_at: Utc::now(),
            last_commit: Mutex::new(None),
        }
    }

    /// Record a decision and the time spent on it.
    pub fn record_decision(&self, effect: Effect, elapsed: Duration) {
        self.decisions[effect.code() as usize].fetch_add(1, Ordering::Relaxed);
        self.evaluation_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a request or response codec failure.
    pub fn record_wire_error(&self) {
        self.wire_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a published policy transaction.
    pub fn record_policy_commit(&self) {
        self.policy_commits.fetch_add(1, Ordering::Relaxed);
        *self.last_commit.lock() = Some(Utc::now());
    }

    /// Record a published content transaction.
    pub fn record_content_commit(&self) {
        self.content_commits.fetch_add(1, Ordering::Relaxed);
        *self.last_commit.lock() = Some(Utc::now());
    }

    /// Snapshot of the counters.
    pub fn metrics(&self) -> TelemetryMetrics {
        let decisions: BTreeMap<String, u64> = EFFECTS
            .iter()
            .zip(&self.decisions)
            .map(|(e, c)| (e.as_str().to_string(), c.load(Ordering::Relaxed)))
            .collect();
        let total_decisions = decisions.values().sum();

        let total_time_us = self.evaluation_time_us.load(Ordering::Relaxed);
        let avg_evaluation_time_us = if total_decisions > 0 {
            total_time_us as f64 / total_decisions as f64
        } else {
            0.0
        };

        TelemetryMetrics {
            service_name: self.config.service_name.clone(),
            total_decisions,
            decisions,
            wire_errors: self.wire_errors.load(Ordering::Relaxed),
            policy_commits: self.policy_commits.load(Ordering::Relaxed),
            content_commits: self.content_commits.load(Ordering::Relaxed),
            avg_evaluation_time_us,
            started_at: self.started_at,
            last_commit: *self.last_commit.lock(),
        }
    }

    /// Check if metrics are collected.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Service name from the configuration.
    pub fn service_name(&self) -> &str {
        &self.config.service_name
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("service_name", &self.config.service_name)
            .finish_non_exhaustive()
    }
}

/// Counter snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryMetrics {
    /// Service name
    pub service_name: String,
    /// Number of decisions
    pub total_decisions: u64,
    /// Number of decisions by effect name
    pub decisions: BTreeMap<String, u64>,
    /// Number of broken requests and responses
    pub wire_errors: u64,
    /// Number of published policy transactions
    pub policy_commits: u64,
    /// Number of published content transactions
    pub content_commits: u64,
    /// Average evaluation time in microseconds
    pub avg_evaluation_time_us: f64,
    /// Time the counters were created
    pub started_at: DateTime<Utc>,
    /// Time of the last published transaction
    pub last_commit: Option<DateTime<Utc>>,
}
