//! migrator CLI - resumable batch processing of line-oriented files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use migrator::{BuiltinTask, Config, FilePool, MigratorError, RateLimiter, shutdown_channel};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "migrator")]
#[command(version)]
#[command(about = "Resumable, checkpointed batch processing of line-oriented files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "migrator.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Process input files, resuming from their track files
    Run {
        /// Input files, one unit of work per line
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print run summaries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

fn print_example_config() {
    let example = r#"# migrator configuration file

[process]
# Progress is logged and the error window reset every N executed lines (0 = off)
rows_to_inform = 100
# Stop when failures/successes inside a window exceeds this ratio
rate_to_stop = 0.1

[rate_limit]
enabled = false
per_second = 10.0
burst = 1

[pool]
# Files processed concurrently
size = 4

[task]
kind = "log"
delay_ms = 0
# kind = "command"
# program = "/usr/local/bin/publish-id"
# args = ["--queue", "movements"]
"#;
    println!("{example}");
}

fn load_config(path: &Path) -> migrator::Result<Config> {
    if path.exists() {
        Ok(Config::from_file(path)?)
    } else {
        warn!(config = %path.display(), "Config file not found, using defaults");
        Ok(Config::default())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Example => {
            print_example_config();
        }

        Commands::Validate => {
            let config = Config::from_file(&cli.config).map_err(MigratorError::from)?;

            info!("Configuration is valid");
            info!(
                "  Window: {} rows, stop above {} failures per success",
                config.process.rows_to_inform, config.process.rate_to_stop
            );
            if config.rate_limit.enabled {
                info!(
                    "  Rate limit: {}/s (burst {})",
                    config.rate_limit.per_second, config.rate_limit.burst
                );
            }
            info!("  Pool size: {}", config.pool.size);
        }

        Commands::Run { files, json } => {
            let config = load_config(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
            let task = Arc::new(BuiltinTask::from(&config.task));

            let (trigger, shutdown) = shutdown_channel();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, stopping after the current lines");
                    trigger.trigger();
                }
            });

            let mut pool = FilePool::new(task, config.process.clone(), config.pool.size)
                .with_shutdown(shutdown);
            let limiter = config.rate_limit.enabled.then(|| {
                Arc::new(RateLimiter::new(
                    config.rate_limit.per_second,
                    config.rate_limit.burst,
                ))
            });
            if let Some(limiter) = &limiter {
                pool = pool.with_rate_limiter(Arc::clone(limiter));
            }

            let outcomes = pool.run_all(files).await;
            if let Some(limiter) = &limiter {
                let stats = limiter.stats();
                info!(
                    admitted = stats.total_admitted,
                    wait_secs = stats.total_wait_secs,
                    "Rate limiter totals"
                );
            }
            let mut failures = 0;

            for outcome in &outcomes {
                match &outcome.result {
                    Ok(summary) if json => println!("{}", serde_json::to_string(summary)?),
                    Ok(summary) => {
                        println!("\n=== {} ===", summary.file.display());
                        println!("Lines:       {}", summary.lines);
                        println!("Replayed:    {}", summary.replayed);
                        println!("Executed:    {}", summary.executed);
                        println!("Failed:      {}", summary.failed);
                        println!("Error rate:  {:.1}%", summary.failure_rate() * 100.0);
                        println!("Runtime:     {:.1}s", summary.runtime_secs());
                        println!("Track file:  {}", summary.output.display());
                    }
                    Err(e) => {
                        failures += 1;
                        eprintln!("{}: the process ends with error: {e}", outcome.file.display());
                    }
                }
            }

            if failures > 0 {
                eprintln!("{failures} of {} files failed; rerun to resume", outcomes.len());
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
