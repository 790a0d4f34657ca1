//! Per-file control loop.
//!
//! Flow per input line:
//! Input → Replayer (skip?) → [RateLimiter → Task → CircuitBreaker] → CheckpointWriter
//!
//! Each line's outcome is on disk before the next line is read, which is
//! what makes a killed run resumable from its track file.

use super::Task;
use crate::checkpoint::{
    CheckpointReplayer, CheckpointWriter, ReplayDecision, TrackFileRegistry, track_file_path,
};
use crate::control::{CircuitBreaker, RateLimiter, Shutdown};
use crate::models::{InputLine, MigratorError, ProcessConfig, Result, RunSummary, Status};
use chrono::Utc;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sequential reader of the input file.
///
/// Lines are right-trimmed; blank lines are not units of work and are
/// passed over without consuming a line number. Bytes that are not valid
/// UTF-8 are replaced, the same way track records are decoded, so both
/// sides still compare equal on replay.
pub struct InputLines {
    path: PathBuf,
    reader: BufReader<File>,
    next_index: u64,
    raw_line: u64,
    buf: Vec<u8>,
}

impl InputLines {
    pub fn open(path: &Path) -> Result<Self> {
        let file =
            File::open(path).map_err(|e| MigratorError::io("opening input file", path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            next_index: 0,
            raw_line: 0,
            buf: Vec::new(),
        })
    }

    /// Next non-blank line, or `None` at end of file.
    pub fn next_line(&mut self) -> Result<Option<InputLine>> {
        loop {
            self.buf.clear();
            let n = self
                .reader
                .read_until(b'\n', &mut self.buf)
                .map_err(|e| MigratorError::io("reading input file", &self.path, e))?;
            if n == 0 {
                return Ok(None);
            }
            self.raw_line += 1;

            let decoded = String::from_utf8_lossy(&self.buf);
            let text = decoded.trim_end();
            if text.is_empty() {
                debug!(
                    file = %self.path.display(),
                    raw_line = self.raw_line,
                    "Skipping blank line"
                );
                continue;
            }

            let line = InputLine {
                index: self.next_index,
                text: text.to_string(),
            };
            self.next_index += 1;
            return Ok(Some(line));
        }
    }

    /// Lines handed out so far.
    pub fn consumed(&self) -> u64 {
        self.next_index
    }
}

/// Runs one input file to completion, resuming from its track files.
pub struct ProcessOrchestrator<T> {
    task: Arc<T>,
    config: ProcessConfig,
    limiter: Option<Arc<RateLimiter>>,
    shutdown: Shutdown,
}

impl<T: Task> ProcessOrchestrator<T> {
    pub fn new(task: Arc<T>, config: ProcessConfig) -> Self {
        Self {
            task,
            config,
            limiter: None,
            shutdown: Shutdown::never(),
        }
    }

    /// Gate every fresh execution on `limiter`.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Process `input` until end of file.
    ///
    /// Returns `Ok` only on a clean end of input. Every handle opened here is
    /// owned by this call and released on all exit paths.
    pub async fn run(&self, input: &Path) -> Result<RunSummary> {
        let started_at = Utc::now();
        info!(file = %input.display(), "Starting migrator process");

        let registry = TrackFileRegistry::discover(input)?;
        let output = track_file_path(input, registry.next_seq());
        let mut lines = InputLines::open(input)?;
        let mut replayer = CheckpointReplayer::open(registry)?;
        let mut writer = CheckpointWriter::open(&output)?;
        let mut breaker = CircuitBreaker::from_config(&self.config);
        let mut replayed = 0u64;
        let mut replaying = !replayer.is_exhausted();

        info!(file = %input.display(), output = %writer.path().display(), "Opened run files");

        while let Some(line) = lines.next_line()? {
            if replaying {
                if replayer.next_decision(&line)? == ReplayDecision::Skip {
                    writer.record_success(&line.text)?;
                    replayed += 1;
                    continue;
                }
                if replayer.is_exhausted() {
                    replaying = false;
                    info!(
                        file = %input.display(),
                        line = line.index,
                        replayed,
                        "History exhausted, executing remaining lines"
                    );
                }
            }

            let status = self.execute(input, &line).await?;
            writer.append(&line.text, status)?;

            if let Some(trip) = breaker.record(status) {
                warn!(
                    file = %input.display(),
                    line = line.index,
                    failures = trip.failures,
                    successes = trip.successes,
                    rate_to_stop = trip.rate_to_stop,
                    "Error rate exceeded, stopping"
                );
                return Err(MigratorError::CircuitBreakerTripped {
                    file: input.to_path_buf(),
                    rate_to_stop: trip.rate_to_stop,
                    failures: trip.failures,
                    successes: trip.successes,
                });
            }

            if let Some(report) = breaker.roll_window() {
                info!(
                    file = %input.display(),
                    executed = report.executed,
                    window_ok = report.window_successes,
                    window_err = report.window_failures,
                    total_err = report.total_failures,
                    "Processed rows"
                );
            }
        }

        let summary = RunSummary {
            file: input.to_path_buf(),
            output,
            lines: lines.consumed(),
            replayed,
            executed: breaker.executed(),
            failed: breaker.total_failures(),
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            file = %input.display(),
            lines = summary.lines,
            replayed = summary.replayed,
            executed = summary.executed,
            failed = summary.failed,
            "Migrator process finished"
        );
        Ok(summary)
    }

    /// Admit and run the task on one line.
    async fn execute(&self, input: &Path, line: &InputLine) -> Result<Status> {
        let cancelled = || {
            warn!(file = %input.display(), line = line.index, "Cancelled before execution");
            MigratorError::Cancelled {
                file: input.to_path_buf(),
            }
        };

        match &self.limiter {
            Some(limiter) => {
                limiter.wait(&self.shutdown).await.map_err(|_| cancelled())?;
            }
            None if self.shutdown.is_triggered() => return Err(cancelled()),
            None => {}
        }

        match self.task.run(&line.text).await {
            Ok(()) => {
                debug!(line = line.index, "Line processed");
                Ok(Status::Ok)
            }
            Err(e) => {
                warn!(
                    file = %input.display(),
                    line = line.index,
                    text = %line.text,
                    error = %e,
                    "Task failed"
                );
                Ok(Status::Er)
            }
        }
    }
}
