//! Line and checkpoint record models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Separator between the line text and its status in a track file record.
pub const RECORD_SEPARATOR: char = ',';

/// Outcome of processing one input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Task completed successfully
    Ok,
    /// Task returned an error; the line is re-executed on the next run
    Er,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Er => "ER",
        }
    }

    /// Parse an on-disk status code. Only the exact codes are accepted.
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "OK" => Some(Self::Ok),
            "ER" => Some(Self::Er),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line read from the input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLine {
    /// 0-based position among the consumed lines
    pub index: u64,
    /// Right-trimmed line text
    pub text: String,
}

/// One record of a track file: `<text>,<STATUS>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointRecord {
    pub text: String,
    pub status: Status,
}

impl CheckpointRecord {
    pub fn new(text: impl Into<String>, status: Status) -> Self {
        Self {
            text: text.into(),
            status,
        }
    }

    /// Parse a raw record line (trailing newline allowed).
    ///
    /// The status is always the last field, so the record is split on the
    /// last separator and the status must be an exact code. Text may contain
    /// separators of its own. Torn or foreign lines yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim_end_matches(['\n', '\r']);
        let (text, code) = raw.rsplit_once(RECORD_SEPARATOR)?;
        let status = Status::parse(code)?;
        Some(Self::new(text, status))
    }

    /// Serialized form including the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{}{}{}\n", self.text, RECORD_SEPARATOR, self.status)
    }
}

/// Outcome of a completed run over one input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Input file
    pub file: PathBuf,
    /// Track file written by this run
    pub output: PathBuf,
    /// Total lines consumed
    pub lines: u64,
    /// Lines skipped because a previous run already completed them
    pub replayed: u64,
    /// Lines handed to the task
    pub executed: u64,
    /// Executed lines whose task failed
    pub failed: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn runtime_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    /// Fraction of executed lines that failed.
    pub fn failure_rate(&self) -> f64 {
        if self.executed == 0 {
            return 0.0;
        }
        self.failed as f64 / self.executed as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_record() {
        let rec = CheckpointRecord::parse("12345,OK\n").unwrap();
        assert_eq!(rec.text, "12345");
        assert_eq!(rec.status, Status::Ok);
    }

    #[test]
    fn test_parse_text_containing_separator() {
        let rec = CheckpointRecord::parse("a,b,OK,ER\n").unwrap();
        assert_eq!(rec.text, "a,b,OK");
        assert_eq!(rec.status, Status::Er);
    }

    #[test]
    fn test_parse_crlf() {
        let rec = CheckpointRecord::parse("7,ER\r\n").unwrap();
        assert_eq!(rec, CheckpointRecord::new("7", Status::Er));
    }

    #[test]
    fn test_parse_rejects_torn_records() {
        assert!(CheckpointRecord::parse("12345,O").is_none());
        assert!(CheckpointRecord::parse("12345").is_none());
        assert!(CheckpointRecord::parse("OK").is_none());
        assert!(CheckpointRecord::parse("12345,ok\n").is_none());
        assert!(CheckpointRecord::parse("").is_none());
    }

    #[test]
    fn test_to_line_matches_on_disk_format() {
        assert_eq!(CheckpointRecord::new("1", Status::Ok).to_line(), "1,OK\n");
        assert_eq!(CheckpointRecord::new("2", Status::Er).to_line(), "2,ER\n");
    }

    #[test]
    fn test_failure_rate() {
        let now = Utc::now();
        let summary = RunSummary {
            file: PathBuf::from("in.txt"),
            output: PathBuf::from("in.txt.0"),
            lines: 10,
            replayed: 6,
            executed: 4,
            failed: 1,
            started_at: now,
            finished_at: now,
        };
        assert!((summary.failure_rate() - 0.25).abs() < f64::EPSILON);
    }
}
