//! Replay of historical track files.
//!
//! The replayer walks the chain newest first. Records are read in lockstep
//! with the input: record `n` of the active track file describes input line
//! `n`. When the active file runs out, the next-older file long enough to
//! hold the current position takes over, fast-forwarded to that position.
//!
//! History is abandoned for the rest of the run as soon as it stops
//! matching the live input, and never re-attempted.

use super::TrackFileRegistry;
use crate::models::{CheckpointRecord, InputLine, MigratorError, Result, Status};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// What to do with the current input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayDecision {
    /// A previous run completed this line successfully
    Skip,
    /// The line must be executed
    Stop,
}

struct ActiveTrack {
    seq: usize,
    path: PathBuf,
    reader: BufReader<File>,
}

/// Decides, line by line, whether history already covers the input.
pub struct CheckpointReplayer {
    registry: TrackFileRegistry,
    active: Option<ActiveTrack>,
    exhausted: bool,
    buf: Vec<u8>,
}

impl CheckpointReplayer {
    /// Open the most recent track file of the chain.
    ///
    /// An empty chain yields a replayer that is exhausted from the start.
    pub fn open(registry: TrackFileRegistry) -> Result<Self> {
        let active = match registry.latest() {
            Some(latest) => {
                let file = File::open(&latest.path)
                    .map_err(|e| MigratorError::io("opening track file", &latest.path, e))?;
                debug!(path = %latest.path.display(), "Opened track file for replay");
                Some(ActiveTrack {
                    seq: latest.seq,
                    path: latest.path.clone(),
                    reader: BufReader::new(file),
                })
            }
            None => None,
        };

        Ok(Self {
            exhausted: active.is_none(),
            registry,
            active,
            buf: Vec::new(),
        })
    }

    /// Whether replay has been abandoned for the rest of the run.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Sequence number of the track file currently being replayed.
    pub fn active_seq(&self) -> Option<usize> {
        self.active.as_ref().map(|a| a.seq)
    }

    /// Decide whether `line` was already completed by a previous run.
    ///
    /// Must be called exactly once per input line, in input order, for as
    /// long as the replayer is not exhausted.
    pub fn next_decision(&mut self, line: &InputLine) -> Result<ReplayDecision> {
        if self.exhausted {
            return Ok(ReplayDecision::Stop);
        }

        if !self.read_record()? && !self.hop(line.index)? {
            debug!(line = line.index, "History ends before this line");
            self.exhaust();
            return Ok(ReplayDecision::Stop);
        }

        let raw = String::from_utf8_lossy(&self.buf).into_owned();
        let Some(record) = CheckpointRecord::parse(&raw) else {
            warn!(
                line = line.index,
                record = %raw.trim_end(),
                "Unreadable track record, replay disabled"
            );
            self.exhaust();
            return Ok(ReplayDecision::Stop);
        };

        if record.text != line.text {
            info!(
                line = line.index,
                previous = %record.text,
                current = %line.text,
                "Input differs from history, replay disabled"
            );
            self.exhaust();
            return Ok(ReplayDecision::Stop);
        }

        Ok(match record.status {
            Status::Ok => ReplayDecision::Skip,
            Status::Er => ReplayDecision::Stop,
        })
    }

    /// Read the next record of the active file into `buf`.
    fn read_record(&mut self) -> Result<bool> {
        self.buf.clear();
        let Some(active) = self.active.as_mut() else {
            return Ok(false);
        };
        let n = active
            .reader
            .read_until(b'\n', &mut self.buf)
            .map_err(|e| MigratorError::io("reading track file", &active.path, e))?;
        Ok(n > 0)
    }

    /// Switch to the next-older track file that holds a record at `line`,
    /// leaving that record in `buf`.
    fn hop(&mut self, line: u64) -> Result<bool> {
        let below = match self.active.take() {
            Some(active) => active.seq,
            None => return Ok(false),
        };

        let Some(older) = self.registry.older_covering(below, line).cloned() else {
            return Ok(false);
        };
        debug!(
            line,
            from = below,
            to = older.seq,
            lines = older.lines,
            "Continuing replay from older track file"
        );

        let file = File::open(&older.path)
            .map_err(|e| MigratorError::io("opening track file", &older.path, e))?;
        self.active = Some(ActiveTrack {
            seq: older.seq,
            path: older.path,
            reader: BufReader::new(file),
        });

        for _ in 0..line {
            if !self.read_record()? {
                return Ok(false);
            }
        }
        self.read_record()
    }

    fn exhaust(&mut self) {
        self.exhausted = true;
        self.active = None;
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::track_file_path;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn line(index: u64, text: &str) -> InputLine {
        InputLine {
            index,
            text: text.to_string(),
        }
    }

    fn replayer(input: &Path) -> CheckpointReplayer {
        CheckpointReplayer::open(TrackFileRegistry::discover(input).unwrap()).unwrap()
    }

    #[test]
    fn test_empty_chain_is_exhausted() {
        let dir = TempDir::new().unwrap();
        let mut replayer = replayer(&dir.path().join("ids.txt"));
        assert!(replayer.is_exhausted());
        assert_eq!(
            replayer.next_decision(&line(0, "1")).unwrap(),
            ReplayDecision::Stop
        );
    }

    #[test]
    fn test_ok_skips_and_er_stops_without_exhausting() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("ids.txt");
        fs::write(track_file_path(&input, 0), "1,OK\n2,ER\n3,OK\n").unwrap();

        let mut replayer = replayer(&input);
        assert_eq!(replayer.next_decision(&line(0, "1")).unwrap(), ReplayDecision::Skip);
        assert_eq!(replayer.next_decision(&line(1, "2")).unwrap(), ReplayDecision::Stop);
        assert!(!replayer.is_exhausted());
        assert_eq!(replayer.next_decision(&line(2, "3")).unwrap(), ReplayDecision::Skip);

        // history ends here
        assert_eq!(replayer.next_decision(&line(3, "4")).unwrap(), ReplayDecision::Stop);
        assert!(replayer.is_exhausted());
    }

    #[test]
    fn test_mismatch_abandons_history() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("ids.txt");
        fs::write(track_file_path(&input, 0), "1,OK\n2,OK\n3,OK\n").unwrap();

        let mut replayer = replayer(&input);
        assert_eq!(replayer.next_decision(&line(0, "1")).unwrap(), ReplayDecision::Skip);
        assert_eq!(replayer.next_decision(&line(1, "X")).unwrap(), ReplayDecision::Stop);
        assert!(replayer.is_exhausted());
        // line 2 would have matched, but history is not consulted again
        assert_eq!(replayer.next_decision(&line(2, "3")).unwrap(), ReplayDecision::Stop);
    }

    #[test]
    fn test_hops_to_older_file_covering_position() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("ids.txt");
        // run 0 got through four lines, run 1 crashed after two
        fs::write(track_file_path(&input, 0), "a,OK\nb,OK\nc,OK\nd,ER\n").unwrap();
        fs::write(track_file_path(&input, 1), "a,OK\nb,OK\n").unwrap();

        let mut replayer = replayer(&input);
        assert_eq!(replayer.active_seq(), Some(1));
        assert_eq!(replayer.next_decision(&line(0, "a")).unwrap(), ReplayDecision::Skip);
        assert_eq!(replayer.next_decision(&line(1, "b")).unwrap(), ReplayDecision::Skip);
        assert_eq!(replayer.next_decision(&line(2, "c")).unwrap(), ReplayDecision::Skip);
        assert_eq!(replayer.active_seq(), Some(0));
        assert_eq!(replayer.next_decision(&line(3, "d")).unwrap(), ReplayDecision::Stop);
        assert!(!replayer.is_exhausted());
        assert_eq!(replayer.next_decision(&line(4, "e")).unwrap(), ReplayDecision::Stop);
        assert!(replayer.is_exhausted());
    }

    #[test]
    fn test_hop_skips_files_too_short() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("ids.txt");
        fs::write(track_file_path(&input, 0), "a,OK\nb,OK\nc,OK\n").unwrap();
        fs::write(track_file_path(&input, 1), "a,OK\n").unwrap();
        fs::write(track_file_path(&input, 2), "").unwrap();

        let mut replayer = replayer(&input);
        assert_eq!(replayer.next_decision(&line(0, "a")).unwrap(), ReplayDecision::Skip);
        assert_eq!(replayer.active_seq(), Some(1));
        assert_eq!(replayer.next_decision(&line(1, "b")).unwrap(), ReplayDecision::Skip);
        assert_eq!(replayer.active_seq(), Some(0));
        assert_eq!(replayer.next_decision(&line(2, "c")).unwrap(), ReplayDecision::Skip);
    }

    #[test]
    fn test_torn_record_disables_replay() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("ids.txt");
        fs::write(track_file_path(&input, 0), "1,OK\n2,O").unwrap();

        let mut replayer = replayer(&input);
        assert_eq!(replayer.next_decision(&line(0, "1")).unwrap(), ReplayDecision::Skip);
        assert_eq!(replayer.next_decision(&line(1, "2")).unwrap(), ReplayDecision::Stop);
        assert!(replayer.is_exhausted());
    }

    #[test]
    fn test_text_ending_like_a_status_is_not_confused() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("ids.txt");
        fs::write(track_file_path(&input, 0), "x,OK,ER\n").unwrap();

        let mut replayer = replayer(&input);
        assert_eq!(
            replayer.next_decision(&line(0, "x,OK")).unwrap(),
            ReplayDecision::Stop
        );
        assert!(!replayer.is_exhausted());
    }

    #[test]
    fn test_invalid_utf8_record_matches_decoded_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("ids.txt");
        fs::write(track_file_path(&input, 0), b"1,OK\n2\xff,OK\n3,ER\n").unwrap();

        let mut replayer = replayer(&input);
        let decoded = String::from_utf8_lossy(b"2\xff").into_owned();
        assert_eq!(replayer.next_decision(&line(0, "1")).unwrap(), ReplayDecision::Skip);
        assert_eq!(replayer.next_decision(&line(1, &decoded)).unwrap(), ReplayDecision::Skip);
        assert_eq!(replayer.next_decision(&line(2, "3")).unwrap(), ReplayDecision::Stop);
        assert!(!replayer.is_exhausted());
    }
}
