//! Configuration models for migrator.
//!
//! Every tunable of a run lives here and is loaded from a TOML file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for migrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Per-file processing settings
    #[serde(default)]
    pub process: ProcessConfig,

    /// Admission rate limiting (shared by all files of a pool)
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Multi-file worker pool
    #[serde(default)]
    pub pool: PoolConfig,

    /// Task applied to every line
    #[serde(default)]
    pub task: TaskConfig,
}

/// Per-file processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Window size for progress reporting and breaker evaluation.
    /// 0 disables both.
    #[serde(default = "default_rows_to_inform")]
    pub rows_to_inform: u64,

    /// Maximum tolerated failure/success ratio inside a window
    #[serde(default = "default_rate_to_stop")]
    pub rate_to_stop: f64,
}

fn default_rows_to_inform() -> u64 {
    100
}

fn default_rate_to_stop() -> f64 {
    0.1
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            rows_to_inform: default_rows_to_inform(),
            rate_to_stop: default_rate_to_stop(),
        }
    }
}

/// Token bucket settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Whether fresh executions wait for a token
    #[serde(default)]
    pub enabled: bool,

    /// Tokens added per second
    #[serde(default = "default_per_second")]
    pub per_second: f64,

    /// Bucket capacity
    #[serde(default = "default_burst")]
    pub burst: u32,
}

fn default_per_second() -> f64 {
    10.0
}

fn default_burst() -> u32 {
    1
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            per_second: default_per_second(),
            burst: default_burst(),
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum files processed concurrently
    #[serde(default = "default_pool_size")]
    pub size: usize,
}

fn default_pool_size() -> usize {
    4
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: default_pool_size(),
        }
    }
}

/// Which built-in task to run on each line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TaskConfig {
    /// Log each line, optionally sleeping to simulate work
    Log {
        #[serde(default)]
        delay_ms: u64,
    },
    /// Spawn `program args... <line>`; non-zero exit marks the line failed
    Command {
        program: PathBuf,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self::Log { delay_ms: 0 }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rate = self.process.rate_to_stop;
        if !rate.is_finite() || rate < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "process.rate_to_stop must be a finite value >= 0, got {rate}"
            )));
        }
        if self.rate_limit.enabled {
            let per_second = self.rate_limit.per_second;
            if !per_second.is_finite() || per_second <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "rate_limit.per_second must be > 0, got {per_second}"
                )));
            }
            if self.rate_limit.burst == 0 {
                return Err(ConfigError::Invalid(
                    "rate_limit.burst must be >= 1".to_string(),
                ));
            }
        }
        if self.pool.size == 0 {
            return Err(ConfigError::Invalid("pool.size must be >= 1".to_string()));
        }
        if matches!(&self.task, TaskConfig::Command { program, .. } if program.as_os_str().is_empty())
        {
            return Err(ConfigError::Invalid(
                "task.program must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
