//! Writes a synthetic prediction stream to a log file.
//!
//! A stable baseline phase is followed by a shifted phase, so a monitor
//! tailing the file should stay quiet for a while and then report drift.
//!
//! ```text
//! cargo run -p drift-monitor --bin drift-monitor -- --auto --window-size 10
//! cargo run -p drift-demos --example simulate_stream -- --auto
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use drift_demos::{prediction_line, synthetic_value};
use drift_monitor::resolve_log_file;

#[derive(Debug, Parser)]
#[command(about = "Append a baseline-then-drift prediction stream to a log file")]
struct Args {
    /// Log file to append to
    #[arg(long, conflicts_with = "auto")]
    log_file: Option<PathBuf>,

    /// Append to <log-dir>/predictions_YYYYMMDD.jsonl
    #[arg(long)]
    auto: bool,

    /// Directory used by --auto
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Records in the stable phase
    #[arg(long, default_value_t = 20)]
    baseline: usize,

    /// Records in the shifted phase
    #[arg(long, default_value_t = 20)]
    drifted: usize,

    /// Mean of the stable phase
    #[arg(long, default_value_t = 0.05)]
    baseline_level: f64,

    /// Mean of the shifted phase
    #[arg(long, default_value_t = 0.5)]
    drift_level: f64,

    /// Delay between records, in milliseconds
    #[arg(long, default_value_t = 100)]
    interval_ms: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let path = resolve_log_file(
        args.log_file.clone(),
        args.auto,
        &args.log_dir,
        Local::now().date_naive(),
    )?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    println!("Writing to {}", path.display());

    let phases = [
        ("baseline", args.baseline, args.baseline_level),
        ("drifted", args.drifted, args.drift_level),
    ];
    for (phase, count, level) in phases {
        println!("Phase {phase}: {count} records around {level}");
        for i in 0..count {
            writeln!(file, "{}", prediction_line(synthetic_value(level, i)))?;
            file.flush()?;
            std::thread::sleep(Duration::from_millis(args.interval_ms));
        }
    }

    println!("Done: {} records", args.baseline + args.drifted);
    Ok(())
}
