//! Append-only writer of the current run's track file.

use crate::models::{CheckpointRecord, MigratorError, Result, Status};
use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes one `<text>,<STATUS>` record per consumed input line.
///
/// The file is opened in append mode, so reopening after a crash never
/// clobbers records already written. Every record is flushed before the
/// call returns.
pub struct CheckpointWriter {
    path: PathBuf,
    writer: LineWriter<File>,
    written: u64,
}

impl CheckpointWriter {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| MigratorError::io("opening output track file", path, e))?;
        debug!(path = %path.display(), "Opened output track file");

        Ok(Self {
            path: path.to_path_buf(),
            writer: LineWriter::new(file),
            written: 0,
        })
    }

    pub fn record_success(&mut self, text: &str) -> Result<()> {
        self.append(text, Status::Ok)
    }

    pub fn record_failure(&mut self, text: &str) -> Result<()> {
        self.append(text, Status::Er)
    }

    pub fn append(&mut self, text: &str, status: Status) -> Result<()> {
        let line = CheckpointRecord::new(text, status).to_line();
        self.writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.flush())
            .map_err(|e| MigratorError::io("writing track file", &self.path, e))?;
        self.written += 1;
        Ok(())
    }

    /// Records written by this writer (not counting pre-existing content).
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
