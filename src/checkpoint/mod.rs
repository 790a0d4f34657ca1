//! Checkpoint module for resumable line processing.
//!
//! Provides:
//! - `TrackFileRegistry`: discovery of the track files of previous runs
//! - `CheckpointReplayer`: per-line skip/execute decisions from that history
//! - `CheckpointWriter`: append-only outcome log of the current run

mod registry;
mod replay;
mod writer;

pub use registry::*;
pub use replay::*;
pub use writer::*;
