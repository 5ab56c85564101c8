//! Running the monitor inside an application.
//!
//! A writer task appends predictions to a temporary log while a
//! `DriftMonitor` tails it. Alerts are collected in a `MemorySink` and
//! inspected once the monitor is stopped.

use std::io::Write;
use std::time::Duration;

use drift_demos::{prediction_line, synthetic_value};
use drift_guard::prelude::*;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing_subscriber::filter::LevelFilter::INFO)
        .init();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("predictions.jsonl");

    let config = MonitorConfig::new(&path)
        .with_window_size(25)
        .with_poll_interval(Duration::from_millis(100))
        .with_status_interval(Duration::from_secs(1));

    let sink = MemorySink::new();
    let monitor = DriftMonitor::new(config, sink.clone())?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(monitor.run(shutdown_rx));

    let writer = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        for i in 0..200 {
            let level = if i < 100 { 0.2 } else { 0.7 };
            writeln!(file, "{}", prediction_line(synthetic_value(level, i)))?;
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    });
    writer.await??;

    tokio::time::sleep(Duration::from_millis(500)).await;
    shutdown_tx.send(true)?;
    let summary = handle.await?;

    for alert in sink.alerts() {
        println!(
            "window {:>2}  mean {:.3}  drift={:<5}  {}",
            alert.window_id, alert.current_mean, alert.drift_detected, alert.message
        );
    }
    println!(
        "{} observations, {} windows, {:.1}% flagged",
        summary.total_observations,
        summary.total_windows,
        summary.detection_rate()
    );
    Ok(())
}
