//! Process module - the per-file orchestrator and the task it drives.

mod orchestrator;
mod task;

pub use orchestrator::*;
pub use task::*;
