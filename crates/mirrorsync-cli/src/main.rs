//! mirrorsync - keep a replica directory identical to a source directory
//!
//! Runs a sync cycle, waits for the configured interval, and repeats until
//! interrupted. Settings come from a configuration file, `MIRRORSYNC_*`
//! environment variables and command line flags, in increasing priority.

mod display;
mod json_output;
mod progress;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use json_output::CycleResultJson;
use mirrorsync_config::{normalize_log_level, Config, ConfigLoader};
use mirrorsync_io::LocalFileSystem;
use mirrorsync_sync::{CancellationToken, FanOutSink, SyncEngine, SyncOptions, TracingEventSink};
use mirrorsync_types::{Error as SyncError, SyncOutcome, WorkerCount};
use progress::ProgressSink;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// Exit status used when a cycle was interrupted before it finished
const EXIT_INTERRUPTED: u8 = 130;

/// mirrorsync - one-way periodic directory mirroring
#[derive(Parser, Debug)]
#[command(
    name = "mirrorsync",
    version = env!("CARGO_PKG_VERSION"),
    about = "Keep a replica directory identical to a source directory",
    long_about = "mirrorsync periodically mirrors a source directory into a replica.\n\
                  Changed files are copied and verified by content digest, and files\n\
                  that no longer exist in the source are removed from the replica."
)]
struct Cli {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Source directory
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Replica directory
    #[arg(short, long)]
    replica: Option<PathBuf>,

    /// Seconds between sync cycles
    #[arg(short, long)]
    interval: Option<u64>,

    /// Number of parallel copies
    #[arg(short, long)]
    workers: Option<usize>,

    /// Also write logs to this file (default: sync.log)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log to the console only
    #[arg(long, conflicts_with = "log_file")]
    no_log_file: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Skip digests for files whose size and modification time match
    #[arg(long)]
    quick_check: bool,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Print each cycle summary as a JSON line
    #[arg(long)]
    json: bool,

    /// Quiet mode - only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    /// Apply flags given on the command line over loaded configuration
    fn apply_overrides(&self, config: &mut Config) -> Result<()> {
        if let Some(source) = &self.source {
            config.source = Some(source.clone());
        }
        if let Some(replica) = &self.replica {
            config.replica = Some(replica.clone());
        }
        if let Some(interval) = self.interval {
            config.interval_secs = interval;
        }
        if let Some(workers) = self.workers {
            config.workers = WorkerCount::new(workers)
                .map_err(|e| anyhow!("Invalid --workers value: {}", e))?;
        }
        if let Some(log_file) = &self.log_file {
            config.log_file = Some(log_file.clone());
        }
        if self.no_log_file {
            config.log_file = None;
        }
        if let Some(log_level) = &self.log_level {
            config.log_level = log_level.clone();
        }
        if self.quick_check {
            config.quick_check = true;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    let _log_guard = init_logging(&config, cli.quiet)?;

    info!("mirrorsync v{} starting", env!("CARGO_PKG_VERSION"));

    run(&cli, &config).await
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ConfigLoader::load_default().context("Failed to load configuration")?,
    };

    cli.apply_overrides(&mut config)?;
    config.validate().context("Invalid configuration")?;

    Ok(config)
}

fn init_logging(config: &Config, quiet: bool) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{fmt, EnvFilter, Layer};

    let level = normalize_log_level(&config.log_level).unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Invalid log filter")?;

    let console_level = if quiet {
        LevelFilter::WARN
    } else {
        LevelFilter::TRACE
    };
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_filter(console_level);

    let (file_layer, guard) = match &config.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

async fn run(cli: &Cli, config: &Config) -> Result<ExitCode> {
    let source = config.source.clone().context("No source directory configured")?;
    let replica = config.replica.clone().context("No replica directory configured")?;

    let progress = (!cli.quiet && !cli.json).then(|| Arc::new(ProgressSink::new()));
    let mut sink = FanOutSink::new().with(Arc::new(TracingEventSink));
    if let Some(progress) = &progress {
        sink = sink.with(progress.clone());
    }

    let options = SyncOptions::default()
        .with_worker_count(config.workers)
        .with_compare_mode(config.compare_mode())
        .with_chunk_size(config.chunk_size);
    let engine = SyncEngine::with_components(Arc::new(LocalFileSystem::new()), Arc::new(sink), options);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing in-flight copies");
                cancel.cancel();
            }
        }
    });

    info!(
        workers = config.workers.get(),
        interval_secs = config.interval_secs,
        "Mirroring {} -> {}",
        source.display(),
        replica.display()
    );

    let mut cycle = 0u64;
    loop {
        cycle += 1;

        if let Some(progress) = &progress {
            progress.start_cycle(cycle);
        }
        let result = engine.sync_with_cancel(&source, &replica, &cancel).await;
        if let Some(progress) = &progress {
            progress.finish();
        }

        match result {
            Ok(outcome) => {
                report_outcome(cli, cycle, &source, &replica, &outcome)?;
                if outcome.cancelled {
                    info!("Sync cancelled");
                    return Ok(ExitCode::from(EXIT_INTERRUPTED));
                }
                if cli.once {
                    return Ok(ExitCode::from(exit_status(&outcome)));
                }
            }
            Err(err) => {
                error!(error = %err, "Sync cycle failed");
                report_failure(cli, cycle, &source, &replica, &err)?;
                if should_stop(cli, config, &err) {
                    return Ok(ExitCode::FAILURE);
                }
                warn!("Retrying in {} seconds", config.interval_secs);
            }
        }

        tokio::select! {
            () = tokio::time::sleep(config.interval()) => {}
            () = cancel.cancelled() => {
                info!("Stopping");
                return Ok(ExitCode::SUCCESS);
            }
        }
    }
}

fn report_outcome(
    cli: &Cli,
    cycle: u64,
    source: &Path,
    replica: &Path,
    outcome: &SyncOutcome,
) -> Result<()> {
    if cli.json {
        let json = CycleResultJson::from_outcome(cycle, source, replica, outcome);
        println!("{}", serde_json::to_string(&json)?);
    } else if !cli.quiet {
        display::print_summary(cycle, outcome);
        display::print_errors(&outcome.errors);
    }
    Ok(())
}

fn report_failure(
    cli: &Cli,
    cycle: u64,
    source: &Path,
    replica: &Path,
    err: &SyncError,
) -> Result<()> {
    if cli.json {
        let json = CycleResultJson::from_error(cycle, source, replica, err);
        println!("{}", serde_json::to_string(&json)?);
    } else if !cli.quiet {
        display::print_failure(cycle, err);
    }
    Ok(())
}

/// Whether a failed cycle ends the loop instead of being retried next interval
fn should_stop(cli: &Cli, config: &Config, err: &SyncError) -> bool {
    cli.once || !err.is_recoverable() || (config.stop_on_fatal && err.is_fatal())
}

/// Exit status for a single `--once` cycle
fn exit_status(outcome: &SyncOutcome) -> u8 {
    u8::from(!outcome.is_clean())
}
