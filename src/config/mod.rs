//! Engine configuration.
//!
//! Settings come from an optional file (YAML, TOML or JSON) overlaid with
//! `PDP__SECTION__KEY` environment variables, for example
//! `PDP__ENGINE__MAX_OBLIGATIONS=16`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "PDP";

const ENV_SEPARATOR: &str = "__";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Request and response limits
    pub engine: EngineConfig,
    /// Information point settings
    pub pip: PipConfig,
    /// Logging and metrics
    pub telemetry: TelemetryConfig,
}

/// Request and response limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest request accepted by the engine in bytes
    pub max_request_size: usize,
    /// Size of the response buffer in bytes
    pub max_response_size: usize,
    /// Largest number of obligations put into a response
    pub max_obligations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_request_size: 10240,
            max_response_size: 10240,
            max_obligations: 64,
        }
    }
}

/// Information point settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipConfig {
    /// Cache information point responses
    pub cache_enabled: bool,
    /// Cache capacity
    pub cache_max_entries: usize,
    /// Lifetime of a cached response in seconds
    pub cache_ttl_secs: u64,
}

impl Default for PipConfig {
    fn default() -> Self {
        Self {
            cache_enabled: false,
            cache_max_entries: 10000,
            cache_ttl_secs: 600,
        }
    }
}

/// Logging and metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Collect decision metrics
    pub enabled: bool,
    /// Service name attached to logs
    pub service_name: String,
    /// Default log level when `RUST_LOG` isn't set
    pub log_level: String,
    /// Emit logs as JSON lines
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_name: "pdp-engine".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables over the defaults.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load configuration from the file with environment variables on top.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::load(Some(path.as_ref()))
    }

    fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        let cfg = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| Error::config(e.to_string()))?;

        let config: Self = cfg
            .try_deserialize()
            .map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.engine.max_request_size == 0 {
            return Err(Error::config("engine.max_request_size must be positive"));
        }

        if self.engine.max_response_size == 0 {
            return Err(Error::config("engine.max_response_size must be positive"));
        }

        if self.pip.cache_enabled && self.pip.cache_max_entries == 0 {
            return Err(Error::config(
                "pip.cache_max_entries must be positive when the cache is enabled",
            ));
        }

        let level = self.telemetry.log_level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(Error::config(format!(
                "unknown log level {:?}",
                self.telemetry.log_level
            )));
        }

        Ok(())
    }
}
