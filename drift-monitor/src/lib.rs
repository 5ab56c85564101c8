//! Drift Monitor - command-line front end for drift-guard
//!
//! Shared helpers for the `drift-monitor` and `drift-diagnose` binaries.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use drift_guard::record::RecordDecoder;
use drift_guard::MonitorConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Number of decode errors kept in a diagnosis report.
const MAX_REPORTED_ERRORS: usize = 5;

/// Picks the log file to monitor: an explicit path wins, otherwise the
/// day's `predictions_YYYYMMDD.jsonl` inside `log_dir`.
pub fn resolve_log_file(
    log_file: Option<PathBuf>,
    auto: bool,
    log_dir: &Path,
    today: NaiveDate,
) -> Result<PathBuf> {
    match (log_file, auto) {
        (Some(path), false) => Ok(path),
        (None, true) => Ok(MonitorConfig::daily_log_path(log_dir, today)),
        (Some(_), true) => bail!("--log-file and --auto are mutually exclusive"),
        (None, false) => bail!("either --log-file or --auto is required"),
    }
}

/// Offline inspection of a prediction log.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnosis {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Local>>,
    pub records: usize,
    pub skipped_lines: usize,
    pub first_timestamp: Option<String>,
    pub last_timestamp: Option<String>,
    pub value_min: Option<f64>,
    pub value_max: Option<f64>,
    pub value_mean: Option<f64>,
    pub window_size: usize,
    pub complete_windows: usize,
    /// Records still needed to complete the next window.
    pub records_to_next_window: usize,
    /// The first few decode errors.
    pub errors: Vec<String>,
}

/// Reads the whole file and summarises what a monitor started with
/// `--from-beginning` would see.
pub fn diagnose(path: &Path, window_size: usize) -> Result<Diagnosis> {
    if window_size == 0 {
        bail!("window size must be a positive integer");
    }

    let metadata = std::fs::metadata(path)
        .with_context(|| format!("log file {} is not accessible", path.display()))?;
    let content = std::fs::read(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let content = String::from_utf8_lossy(&content);

    let decoder = RecordDecoder::new();
    let mut diagnosis = Diagnosis {
        path: path.to_path_buf(),
        size_bytes: metadata.len(),
        modified: metadata.modified().ok().map(DateTime::<Local>::from),
        records: 0,
        skipped_lines: 0,
        first_timestamp: None,
        last_timestamp: None,
        value_min: None,
        value_max: None,
        value_mean: None,
        window_size,
        complete_windows: 0,
        records_to_next_window: window_size,
        errors: Vec::new(),
    };

    let mut sum = 0.0;
    for (number, line) in content.lines().enumerate() {
        match decoder.decode(line) {
            Ok(Some(observation)) => {
                diagnosis.records += 1;
                sum += observation.value;
                diagnosis.value_min = Some(
                    diagnosis
                        .value_min
                        .map_or(observation.value, |m| m.min(observation.value)),
                );
                diagnosis.value_max = Some(
                    diagnosis
                        .value_max
                        .map_or(observation.value, |m| m.max(observation.value)),
                );
                if diagnosis.first_timestamp.is_none() {
                    diagnosis.first_timestamp = Some(observation.timestamp.clone());
                }
                diagnosis.last_timestamp = Some(observation.timestamp);
            }
            Ok(None) => {}
            Err(e) => {
                diagnosis.skipped_lines += 1;
                if diagnosis.errors.len() < MAX_REPORTED_ERRORS {
                    diagnosis.errors.push(format!("line {}: {e}", number + 1));
                }
            }
        }
    }

    if diagnosis.records > 0 {
        diagnosis.value_mean = Some(sum / diagnosis.records as f64);
    }
    diagnosis.complete_windows = diagnosis.records / window_size;
    diagnosis.records_to_next_window = window_size - diagnosis.records % window_size;

    Ok(diagnosis)
}

/// Renders a diagnosis for a terminal.
pub fn render_diagnosis(d: &Diagnosis) -> String {
    let rule = "=".repeat(70);
    let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    let num = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));

    let mut out = format!(
        "{rule}\nPrediction log diagnostics\n{rule}\n\n\
         File:             {}\n\
         Size:             {} bytes\n\
         Last modified:    {}\n\n\
         Records:          {}\n\
         Skipped lines:    {}\n\
         First timestamp:  {}\n\
         Last timestamp:   {}\n\
         Value min/max:    {} / {}\n\
         Value mean:       {}\n\n\
         Window size:      {}\n\
         Complete windows: {}\n\
         Next window in:   {} records\n",
        d.path.display(),
        d.size_bytes,
        d.modified
            .map_or_else(|| "-".to_string(), |m| m.format("%Y-%m-%d %H:%M:%S").to_string()),
        d.records,
        d.skipped_lines,
        opt(&d.first_timestamp),
        opt(&d.last_timestamp),
        num(d.value_min),
        num(d.value_max),
        num(d.value_mean),
        d.window_size,
        d.complete_windows,
        d.records_to_next_window,
    );

    if !d.errors.is_empty() {
        out.push_str("\nDecode errors:\n");
        for error in &d.errors {
            out.push_str(&format!("  {error}\n"));
        }
    }

    if d.complete_windows == 0 {
        out.push_str(&format!(
            "\nNot enough records for a window yet: need {} more.\n",
            d.records_to_next_window
        ));
    }
    out.push_str(
        "\nA monitor started without --from-beginning only reads lines appended after it starts.\n",
    );
    out.push_str(&rule);
    out.push('\n');
    out
}
