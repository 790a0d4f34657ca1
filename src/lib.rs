//! migrator - resumable, checkpointed batch processing of line-oriented files.
//!
//! ## Architecture
//!
//! Every input line is one unit of work handed to a [`Task`]. Each run over
//! `ids.txt` appends one `<line>,OK|ER` record per line to a new track file
//! `ids.txt.N`. A later run replays the chain `ids.txt.(N-1) .. ids.txt.0`
//! to skip lines already completed, so a crashed or aborted run can simply be
//! started again.
//!
//! - **checkpoint**: track file discovery, replay and writing
//! - **control**: rate limiter, circuit breaker, shutdown signal
//! - **process**: the per-file orchestrator and the task capability
//! - **pool**: many files at once, sharing one rate limiter

pub mod checkpoint;
pub mod control;
pub mod models;
pub mod pool;
pub mod process;

// Re-exports for convenience
pub use checkpoint::{CheckpointReplayer, CheckpointWriter, TrackFile, TrackFileRegistry};
pub use control::{CircuitBreaker, RateLimiter, Shutdown, ShutdownTrigger, shutdown_channel};
pub use models::{Config, MigratorError, Result, RunSummary, Status};
pub use pool::{FileOutcome, FilePool};
pub use process::{BuiltinTask, ProcessOrchestrator, Task};
