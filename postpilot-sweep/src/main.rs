//! postpilot-sweep - Publishes scheduled posts when they come due
//!
//! Runs one sweep (`--once`, for cron or systemd timers) or polls on an
//! interval until SIGINT/SIGTERM.

use anyhow::Context;
use clap::Parser;
use libpostpilot::logging::{LogFormat, LoggingConfig};
use libpostpilot::{
    Clock, Config, PlatformRegistry, PostpilotError, SqlitePostStore, SqliteSweepLock,
    SweepCancel, Sweeper, SystemClock,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "postpilot-sweep")]
#[command(version)]
#[command(about = "Publish scheduled posts that have come due")]
#[command(long_about = "\
postpilot-sweep - Publish scheduled posts that have come due

DESCRIPTION:
    postpilot-sweep finds every post whose status is 'scheduled' and whose
    scheduled time has passed, publishes it to each platform it has copy
    for, and marks it published.

    Only one sweep runs at a time across all processes sharing the
    database. A run that finds another sweep in progress exits cleanly.

USAGE:
    # One sweep, report on stdout (cron / systemd timer)
    postpilot-sweep --once

    # Poll every 30 seconds until interrupted
    postpilot-sweep --interval 30s

    # JSON logs for a log pipeline
    postpilot-sweep --log-format json

SIGNALS:
    SIGTERM, SIGINT - Stop starting new posts, finish in-flight ones, exit

CONFIGURATION:
    Configuration file: ~/.config/postpilot/config.toml
    (override with --config or POSTPILOT_CONFIG)

    [database]
    path = \"~/.local/share/postpilot/posts.db\"

    [sweep]
    interval = \"60s\"
    publish_timeout = \"30s\"
    lease_ttl = \"5m\"
    max_concurrent_posts = 4
    on_total_failure = \"retry\"   # or \"fail\"

    [platforms.facebook]
    access_token = \"...\"

EXIT CODES:
    0 - Success (including: another sweep already in progress)
    1 - Runtime or store error
    2 - Configuration error
")]
struct Cli {
    /// Run a single sweep, print its report as JSON and exit
    #[arg(long)]
    once: bool,

    /// Poll interval in daemon mode (overrides config)
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    #[arg(help = "How often to sweep, e.g. 30s or 5m (default: from config, 60s)")]
    interval: Option<Duration>,

    /// Configuration file
    #[arg(long, value_name = "PATH", env = "POSTPILOT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Log output format: text, json or pretty
    #[arg(long, value_name = "FORMAT", env = "POSTPILOT_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    logging.verbose = cli.verbose;
    if let Err(e) = logging.init() {
        eprintln!("postpilot-sweep: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        let code = e
            .downcast_ref::<PostpilotError>()
            .map(PostpilotError::exit_code)
            .unwrap_or(1);
        error!("{:#}", e);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    info!("postpilot-sweep starting");

    let store = SqlitePostStore::new(&config.database.path)
        .await
        .with_context(|| format!("Failed to open post database {}", config.database.path))?;
    let lock = SqliteSweepLock::new(store.pool().clone());
    let registry = PlatformRegistry::from_config(&config.platforms);
    info!(
        platforms = registry.len(),
        "Publishing clients ready: {}",
        registry
            .platforms()
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let sweeper = Sweeper::new(Arc::new(store), Arc::new(lock), registry, config.sweep);
    let interval = cli.interval.unwrap_or(sweeper.config().interval);
    info!(holder = sweeper.holder_id(), "Sweeping as {}", sweeper.holder_id());

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;
    let cancel = SweepCancel::from_flag(shutdown.clone());

    info!("Poll interval: {}", humantime::format_duration(interval));

    if cli.once {
        run_once(&sweeper, &cancel).await?;
        info!("postpilot-sweep: swept once, exiting");
    } else {
        run_daemon_loop(&sweeper, interval, &cancel, &shutdown).await;
    }

    info!("postpilot-sweep stopped");
    Ok(())
}

async fn run_once(sweeper: &Sweeper, cancel: &SweepCancel) -> anyhow::Result<()> {
    match sweeper.run_sweep_with_cancel(SystemClock.now(), cancel).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        // Logged by the sweeper; not a failure for this run.
        Err(PostpilotError::SweepInProgress { .. }) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn run_daemon_loop(
    sweeper: &Sweeper,
    interval: Duration,
    cancel: &SweepCancel,
    shutdown: &AtomicBool,
) {
    let clock = SystemClock;

    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        match sweeper.run_sweep_with_cancel(clock.now(), cancel).await {
            Ok(_) | Err(PostpilotError::SweepInProgress { .. }) => {}
            Err(e) => error!("Sweep failed: {}", e),
        }

        // Sleep until the next sweep, checking for shutdown every second
        let mut remaining = interval;
        while !remaining.is_zero() && !shutdown.load(Ordering::Relaxed) {
            let step = remaining.min(Duration::from_secs(1));
            sleep(step).await;
            remaining -= step;
        }
    }
}

#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("Failed to install signal handlers")?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!(signal = sig, "Received shutdown signal, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    Ok(())
}
