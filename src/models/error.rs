//! Error types for migrator.
//!
//! Taxonomy:
//! - Fatal to the run: IO failures, breaker trips, cancellation
//! - Absorbed per line: task failures (recorded as `ER`, never surfaced here)
//! - Not an error at all: history mismatch (replay is just switched off)

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Top-level error type for migrator.
#[derive(Debug, Error)]
pub enum MigratorError {
    // ═══════════════════════════════════════════════════════════════════
    // Run aborted, checkpoint state allows a later resume
    // ═══════════════════════════════════════════════════════════════════
    #[error("IO error: {context} ({path})")]
    Io {
        context: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "{file}: the error rate exceeded {rate_to_stop} ({failures} failed / {successes} ok in window), the process stops"
    )]
    CircuitBreakerTripped {
        file: PathBuf,
        rate_to_stop: f64,
        failures: u64,
        successes: u64,
    },

    #[error("{file}: run cancelled")]
    Cancelled { file: PathBuf },

    // ═══════════════════════════════════════════════════════════════════
    // Setup
    // ═══════════════════════════════════════════════════════════════════
    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    // ═══════════════════════════════════════════════════════════════════
    // Invariant broken (bug)
    // ═══════════════════════════════════════════════════════════════════
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MigratorError {
    /// Create an IO error with context and the path involved.
    pub fn io(context: impl Into<String>, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    pub fn is_breaker_trip(&self) -> bool {
        matches!(self, Self::CircuitBreakerTripped { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Whether re-invoking the run later can pick up where this one stopped.
    ///
    /// Every outcome written before the failure is already on disk, so IO
    /// failures, breaker trips and cancellations are all resumable.
    /// Configuration and internal errors need a fix first.
    pub fn is_resumable(&self) -> bool {
        self.is_io() || self.is_breaker_trip() || self.is_cancelled()
    }
}

/// Result type alias for migrator.
pub type Result<T> = std::result::Result<T, MigratorError>;
