//! Drift Monitor
//!
//! Tails a prediction log and reports drift per completed window until
//! interrupted (Ctrl-C or SIGTERM), then prints a final summary.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use drift_guard::config::{DEFAULT_DELTA, DEFAULT_THRESHOLD_SCALE, DEFAULT_WINDOW_SIZE};
use drift_guard::prelude::*;
use drift_monitor::resolve_log_file;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "drift-monitor",
    version,
    about = "Real-time drift monitoring for prediction logs"
)]
struct Args {
    /// Prediction log to monitor (one JSON record per line)
    #[arg(long, conflicts_with = "auto")]
    log_file: Option<PathBuf>,

    /// Monitor today's log: <log-dir>/predictions_YYYYMMDD.jsonl
    #[arg(long)]
    auto: bool,

    /// Directory searched by --auto
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Observations per tumbling window
    #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
    window_size: usize,

    /// Sensitivity; lower values flag drift more readily
    #[arg(long, default_value_t = DEFAULT_DELTA)]
    delta: f64,

    /// Baseline threshold = delta * threshold-scale
    #[arg(long, default_value_t = DEFAULT_THRESHOLD_SCALE)]
    threshold_scale: f64,

    /// Suppress status reports and diagnostics; alerts are always shown
    #[arg(long, short)]
    quiet: bool,

    /// Process existing file content instead of only new lines
    #[arg(long)]
    from_beginning: bool,

    /// Emit events as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// Seconds between fallback polls
    #[arg(long, default_value_t = 2)]
    poll_interval: u64,

    /// Seconds between status reports
    #[arg(long, default_value_t = 60)]
    status_interval: u64,

    /// Disable filesystem notifications and rely on polling only
    #[arg(long)]
    no_notify: bool,

    /// Verbose diagnostics on stderr
    #[arg(long, short)]
    verbose: bool,

    /// Diagnostics on stderr as JSON
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn monitor_config(&self) -> Result<MonitorConfig> {
        let path = resolve_log_file(
            self.log_file.clone(),
            self.auto,
            &self.log_dir,
            Local::now().date_naive(),
        )?;

        Ok(MonitorConfig::new(path)
            .with_window_size(self.window_size)
            .with_delta(self.delta)
            .with_threshold_scale(self.threshold_scale)
            .with_quiet(self.quiet)
            .with_from_beginning(self.from_beginning)
            .with_poll_interval(Duration::from_secs(self.poll_interval))
            .with_status_interval(Duration::from_secs(self.status_interval))
            .with_notifications(!self.no_notify))
    }

    fn logging_config(&self) -> LoggingConfig {
        let config = if self.verbose {
            LoggingConfig::development()
        } else {
            LoggingConfig::default()
        };
        config.with_json_format(self.log_json)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.logging_config()).context("failed to initialise logging")?;

    let config = match args.monitor_config() {
        Ok(config) => config,
        Err(e) => exit_with_config_error(&e.to_string()),
    };

    if !args.quiet && !args.json {
        print_banner(&config);
    }

    let sink: Box<dyn EventSink> = if args.json {
        Box::new(JsonLinesSink::stdout())
    } else {
        Box::new(ConsoleSink::stdout())
    };

    let monitor = match DriftMonitor::new(config, sink) {
        Ok(monitor) => monitor,
        Err(e @ MonitorError::Configuration { .. }) => exit_with_config_error(&e.to_string()),
        Err(e) => return Err(e.into()),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    monitor.run(shutdown_rx).await;
    Ok(())
}

fn exit_with_config_error(message: &str) -> ! {
    eprintln!("drift-monitor: {message}");
    process::exit(2);
}

fn print_banner(config: &MonitorConfig) {
    let rule = "=".repeat(70);
    println!("{rule}");
    println!("Real-time drift monitor");
    println!("{rule}");
    println!("Log file:        {}", config.log_file().display());
    println!("Window size:     {}", config.window_size());
    println!("Delta:           {}", config.delta());
    println!("Drift threshold: {:.4}", config.baseline_threshold());
    println!(
        "Reading:         {}",
        if config.from_beginning() {
            "from beginning"
        } else {
            "new lines only"
        }
    );
    println!("Press Ctrl-C to stop");
    println!("{rule}");
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
