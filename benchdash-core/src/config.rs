//! Client configuration.
//!
//! Uses `figment` for layered configuration: defaults -> config file ->
//! environment. Environment variables are prefixed with `BENCHDASH_` and
//! nested with `__` (e.g. `BENCHDASH_STREAM__RETRY_MAX_MS`).

use crate::error::ConfigError;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level dashboard client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Backend base URL, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout for snapshot and inference calls, in seconds.
    /// Benchmark inference can be slow on a cold model, so this is generous.
    pub request_timeout_secs: u64,
    /// Timeout for establishing connections, in seconds.
    pub connect_timeout_secs: u64,
    pub stream: StreamConfig,
    pub bench: BenchConfig,
}

/// Reconnect behavior for the metrics stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Initial delay before reconnecting after a stream failure, in ms.
    pub retry_initial_ms: u64,
    /// Ceiling for the exponential reconnect backoff, in ms.
    pub retry_max_ms: u64,
}

/// Defaults for user-triggered benchmark runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    pub model_size: String,
    pub max_new_tokens: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 120,
            connect_timeout_secs: 10,
            stream: StreamConfig::default(),
            bench: BenchConfig::default(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            retry_initial_ms: 500,
            retry_max_ms: 15_000,
        }
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            model_size: "gpt2".to_string(),
            max_new_tokens: 50,
        }
    }
}

impl DashboardConfig {
    /// Validate invariants that figment cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "base_url must not be empty".to_string(),
            });
        }
        if self.stream.retry_initial_ms == 0 || self.stream.retry_max_ms < self.stream.retry_initial_ms
        {
            return Err(ConfigError::Invalid {
                message: "stream retry delays must satisfy 0 < retry_initial_ms <= retry_max_ms"
                    .to_string(),
            });
        }
        Ok(())
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `BENCHDASH_`)
/// 2. Explicit config file (passed as argument)
/// 3. User config (`~/.config/benchdash/config.toml`)
/// 4. Built-in defaults
pub fn load_config(config_file: Option<&Path>) -> Result<DashboardConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(DashboardConfig::default()));

    if let Some(dirs) = directories::ProjectDirs::from("dev", "benchdash", "benchdash") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(path) = config_file {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("BENCHDASH_").split("__"));

    figment.extract().map_err(Box::new)
}
