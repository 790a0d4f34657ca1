//! The unit of work applied to every input line.

use crate::models::TaskConfig;
use anyhow::{Context, bail};
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tracing::info;

/// Capability applied to each line that has not been completed yet.
///
/// An error marks the line `ER`; it is counted, never fatal on its own.
pub trait Task: Send + Sync {
    fn run(&self, line: &str) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Logs every line, optionally sleeping to simulate work.
#[derive(Debug, Clone, Default)]
pub struct LogTask {
    delay: Duration,
}

impl LogTask {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Task for LogTask {
    async fn run(&self, line: &str) -> anyhow::Result<()> {
        info!(line, "Processing line");
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }
}

/// Spawns `program args... <line>` and waits for it.
#[derive(Debug, Clone)]
pub struct CommandTask {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandTask {
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

impl Task for CommandTask {
    async fn run(&self, line: &str) -> anyhow::Result<()> {
        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(line)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("spawning {}", self.program.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            );
        }
        Ok(())
    }
}

/// Task selected by configuration.
#[derive(Debug, Clone)]
pub enum BuiltinTask {
    Log(LogTask),
    Command(CommandTask),
}

impl From<&TaskConfig> for BuiltinTask {
    fn from(config: &TaskConfig) -> Self {
        match config {
            TaskConfig::Log { delay_ms } => Self::Log(LogTask::new(Duration::from_millis(*delay_ms))),
            TaskConfig::Command { program, args } => {
                Self::Command(CommandTask::new(program.clone(), args.clone()))
            }
        }
    }
}

impl Task for BuiltinTask {
    async fn run(&self, line: &str) -> anyhow::Result<()> {
        match self {
            Self::Log(task) => task.run(line).await,
            Self::Command(task) => task.run(line).await,
        }
    }
}
