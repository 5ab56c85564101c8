//! Drift Diagnose
//!
//! Inspects a prediction log offline: record counts, decode errors,
//! timestamps and window coverage.

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use drift_guard::config::DEFAULT_WINDOW_SIZE;
use drift_monitor::{diagnose, render_diagnosis, resolve_log_file};
use std::path::PathBuf;
use std::process;

#[derive(Debug, Parser)]
#[command(
    name = "drift-diagnose",
    version,
    about = "Inspect a prediction log before monitoring it"
)]
struct Args {
    /// Prediction log to inspect
    #[arg(long, conflicts_with = "auto")]
    log_file: Option<PathBuf>,

    /// Inspect today's log: <log-dir>/predictions_YYYYMMDD.jsonl
    #[arg(long)]
    auto: bool,

    /// Directory searched by --auto
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Window size to compute coverage for
    #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
    window_size: usize,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let path = match resolve_log_file(
        args.log_file,
        args.auto,
        &args.log_dir,
        Local::now().date_naive(),
    ) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("drift-diagnose: {e}");
            process::exit(2);
        }
    };

    let diagnosis = match diagnose(&path, args.window_size) {
        Ok(diagnosis) => diagnosis,
        Err(e) => {
            eprintln!("drift-diagnose: {e:#}");
            process::exit(1);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&diagnosis)?);
    } else {
        print!("{}", render_diagnosis(&diagnosis));
    }
    Ok(())
}
