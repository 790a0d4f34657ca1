//! Discovery of the track file chain left behind by previous runs.
//!
//! A run over `ids.txt` writes its outcomes to `ids.txt.N`, where N is the
//! first free sequence number. The chain `ids.txt.0 .. ids.txt.(N-1)` is the
//! history a new run replays from, newest first.

use crate::models::{MigratorError, Result};
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Descriptor of one historical run's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFile {
    /// 0-based sequence number, contiguous across the chain
    pub seq: usize,
    pub path: PathBuf,
    /// Number of records, counted once at discovery
    pub lines: u64,
}

/// Path of track file `seq` for `input`: `<input>.<seq>`.
pub fn track_file_path(input: &Path, seq: usize) -> PathBuf {
    let mut name = OsString::from(input.as_os_str());
    name.push(format!(".{seq}"));
    PathBuf::from(name)
}

/// The ordered, immutable chain of track files for one input file.
#[derive(Debug, Clone, Default)]
pub struct TrackFileRegistry {
    files: Vec<TrackFile>,
}

impl TrackFileRegistry {
    /// Probe `<input>.0`, `<input>.1`, ... until the first missing index.
    ///
    /// A missing `.0` just means no prior run. Any error other than
    /// "not found" while opening or counting is fatal.
    pub fn discover(input: &Path) -> Result<Self> {
        let mut files = Vec::new();

        loop {
            let seq = files.len();
            let path = track_file_path(input, seq);
            let file = match File::open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::NotFound => break,
                Err(e) => return Err(MigratorError::io("opening track file", &path, e)),
            };

            let lines = count_lines(file).map_err(|e| {
                MigratorError::io("counting track file lines", &path, e)
            })?;
            debug!(path = %path.display(), lines, "Found track file");
            files.push(TrackFile { seq, path, lines });
        }

        if !files.is_empty() {
            info!(
                file = %input.display(),
                track_files = files.len(),
                "Discovered previous runs"
            );
        }
        Ok(Self { files })
    }

    /// Build a registry from known descriptors (oldest first).
    pub fn from_files(files: Vec<TrackFile>) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &[TrackFile] {
        &self.files
    }

    /// The most recent run's log, if any run happened.
    pub fn latest(&self) -> Option<&TrackFile> {
        self.files.last()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Sequence number the current run writes to.
    pub fn next_seq(&self) -> usize {
        self.files.len()
    }

    /// Newest track file strictly older than `below` that holds a record at
    /// 0-based position `line`.
    pub fn older_covering(&self, below: usize, line: u64) -> Option<&TrackFile> {
        self.files[..below.min(self.files.len())]
            .iter()
            .rev()
            .find(|tf| tf.lines > line)
    }
}

/// Count newline-delimited records; a torn final record counts as one.
fn count_lines(file: File) -> io::Result<u64> {
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut lines = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(lines);
        }
        lines += 1;
    }
}
