//! Worker pool for processing many input files at once.
//!
//! Each file gets its own orchestrator and file handles. The task, the
//! optional rate limiter and the shutdown signal are the only shared state.

use crate::control::{RateLimiter, Shutdown};
use crate::models::{MigratorError, ProcessConfig, Result, RunSummary};
use crate::process::{ProcessOrchestrator, Task};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Outcome of one file in a batch.
#[derive(Debug)]
pub struct FileOutcome {
    pub file: PathBuf,
    pub result: Result<RunSummary>,
}

/// Bounded pool of per-file orchestrators.
pub struct FilePool<T> {
    task: Arc<T>,
    config: ProcessConfig,
    limiter: Option<Arc<RateLimiter>>,
    shutdown: Shutdown,
    semaphore: Arc<Semaphore>,
}

impl<T: Task + 'static> FilePool<T> {
    pub fn new(task: Arc<T>, config: ProcessConfig, pool_size: usize) -> Self {
        Self {
            task,
            config,
            limiter: None,
            shutdown: Shutdown::never(),
            semaphore: Arc::new(Semaphore::new(pool_size.max(1))),
        }
    }

    /// Share one rate limiter across every file of the pool.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Run every file; results come back in input order.
    pub async fn run_all(&self, files: Vec<PathBuf>) -> Vec<FileOutcome> {
        info!(files = files.len(), "Starting file pool");
        let mut handles = Vec::with_capacity(files.len());

        for file in files {
            let orchestrator = self.orchestrator();
            let semaphore = Arc::clone(&self.semaphore);
            let handle = tokio::spawn({
                let file = file.clone();
                async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| MigratorError::Internal("Semaphore closed".to_string()))?;
                    orchestrator.run(&file).await
                }
            });
            handles.push((file, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (file, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!(file = %file.display(), error = %e, "File worker panicked");
                    Err(MigratorError::Internal(format!(
                        "worker for {} panicked: {e}",
                        file.display()
                    )))
                }
            };
            if let Err(e) = &result {
                warn!(file = %file.display(), error = %e, "File run failed");
            }
            outcomes.push(FileOutcome { file, result });
        }
        outcomes
    }

    fn orchestrator(&self) -> ProcessOrchestrator<T> {
        let orchestrator = ProcessOrchestrator::new(Arc::clone(&self.task), self.config.clone())
            .with_shutdown(self.shutdown.clone());
        match &self.limiter {
            Some(limiter) => orchestrator.with_rate_limiter(Arc::clone(limiter)),
            None => orchestrator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::track_file_path;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingTask {
        calls: AtomicUsize,
    }

    impl Task for CountingTask {
        async fn run(&self, line: &str) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if line.starts_with("bad") {
                anyhow::bail!("bad line {line}");
            }
            Ok(())
        }
    }

    fn config() -> ProcessConfig {
        ProcessConfig {
            rows_to_inform: 0,
            rate_to_stop: 0.1,
        }
    }

    #[tokio::test]
    async fn test_runs_every_file_with_own_track_file() {
        let dir = TempDir::new().unwrap();
        let files: Vec<PathBuf> = (0..5)
            .map(|i| {
                let path = dir.path().join(format!("part-{i}.txt"));
                fs::write(&path, format!("{i}-a\n{i}-b\nbad-{i}\n")).unwrap();
                path
            })
            .collect();

        let task = Arc::new(CountingTask::default());
        let limiter = Arc::new(RateLimiter::new(1000.0, 100));
        let pool = FilePool::new(Arc::clone(&task), config(), 2)
            .with_rate_limiter(Arc::clone(&limiter));

        let outcomes = pool.run_all(files.clone()).await;

        assert_eq!(outcomes.len(), 5);
        for (outcome, file) in outcomes.iter().zip(&files) {
            assert_eq!(&outcome.file, file);
            let summary = outcome.result.as_ref().unwrap();
            assert_eq!(summary.executed, 3);
            assert_eq!(summary.failed, 1);
            let track = fs::read_to_string(track_file_path(file, 0)).unwrap();
            assert_eq!(track.lines().count(), 3);
            assert!(track.ends_with(",ER\n"));
        }
        assert_eq!(task.calls.load(Ordering::Relaxed), 15);
        assert_eq!(limiter.stats().total_admitted, 15);
    }

    #[tokio::test]
    async fn test_one_failing_file_does_not_stop_others() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.txt");
        fs::write(&good, "1\n2\n").unwrap();
        let missing = dir.path().join("missing.txt");

        let pool = FilePool::new(Arc::new(CountingTask::default()), config(), 4);
        let outcomes = pool.run_all(vec![missing, good]).await;

        assert!(outcomes[0].result.as_ref().unwrap_err().is_io());
        assert_eq!(outcomes[1].result.as_ref().unwrap().lines, 2);
    }
}
