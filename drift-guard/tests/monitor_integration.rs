//! End-to-end tests running the monitor loop against real files.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use drift_guard::prelude::*;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

const WAIT: Duration = Duration::from_secs(10);

fn record(value: f64) -> String {
    format!("{{\"timestamp\": \"2025-12-14T10:00:00Z\", \"value\": {value}}}\n")
}

/// Low-variance periodic signal around `level`.
fn stable(level: f64, i: usize) -> f64 {
    level + (i % 10) as f64 * 0.001
}

fn append(path: &Path, text: &str) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("Failed to open log file");
    file.write_all(text.as_bytes())
        .expect("Failed to append to log file");
}

fn fast_config(path: &Path) -> MonitorConfig {
    MonitorConfig::new(path)
        .with_poll_interval(Duration::from_millis(50))
        .with_status_interval(Duration::from_secs(3600))
        .with_notifications(false)
}

struct Running {
    sink: MemorySink,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<RunSummary>,
}

impl Running {
    fn start(config: MonitorConfig) -> Self {
        let sink = MemorySink::new();
        let monitor = DriftMonitor::new(config, sink.clone()).expect("Failed to create monitor");
        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(monitor.run(rx));
        Self {
            sink,
            shutdown,
            handle,
        }
    }

    async fn wait_until(&self, condition: impl Fn(&MemorySink) -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if condition(&self.sink) {
                return true;
            }
            sleep(Duration::from_millis(20)).await;
        }
        condition(&self.sink)
    }

    async fn wait_for_alerts(&self, count: usize) {
        assert!(
            self.wait_until(|s| s.alerts().len() >= count).await,
            "expected {count} alerts, got {}",
            self.sink.alerts().len()
        );
    }

    async fn stop(self) -> (RunSummary, MemorySink) {
        self.shutdown.send(true).expect("Monitor task exited early");
        let summary = self.handle.await.expect("Monitor task panicked");
        (summary, self.sink)
    }
}

#[tokio::test]
async fn test_sustained_shift_is_flagged_by_baseline() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("predictions.jsonl");

    let mut lines = String::new();
    for i in 0..200 {
        lines.push_str(&record(stable(0.08, i)));
    }
    for i in 0..200 {
        lines.push_str(&record(stable(0.50, i)));
    }
    append(&path, &lines);

    let running = Running::start(
        fast_config(&path)
            .with_window_size(100)
            .with_from_beginning(true),
    );
    running.wait_for_alerts(4).await;
    let (summary, sink) = running.stop().await;

    let alerts = sink.alerts();
    assert_eq!(
        alerts.iter().map(|a| a.window_id).collect::<Vec<_>>(),
        vec![0, 1, 2, 3]
    );

    assert!(!alerts[0].drift_detected);
    assert!(!alerts[1].drift_detected);
    assert!((alerts[1].current_mean - 0.0845).abs() < 1e-9);

    assert!(alerts[2].baseline_triggered);
    assert!(alerts[2].drift_detected);
    assert!((alerts[2].drift_statistic - 0.42).abs() < 1e-9);
    assert!(alerts[2].message.starts_with("DRIFT DETECTED"));

    // Deep inside the shift the baseline keeps flagging.
    assert!(alerts[3].baseline_triggered);

    assert_eq!(summary.total_observations, 400);
    assert_eq!(summary.total_windows, 4);
    assert_eq!(summary.drift_windows, 2);
    assert_eq!(summary.baseline_mean, Some(alerts[0].current_mean));
    assert_eq!(sink.summaries(), vec![summary]);
}

#[tokio::test]
async fn test_small_windows_detect_mean_jump() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("predictions.jsonl");

    let lines: String = std::iter::repeat(record(0.12))
        .take(10)
        .chain(std::iter::repeat(record(0.52)).take(10))
        .collect();
    append(&path, &lines);

    let running = Running::start(
        fast_config(&path)
            .with_window_size(10)
            .with_delta(0.002)
            .with_from_beginning(true),
    );
    running.wait_for_alerts(2).await;
    let (_, sink) = running.stop().await;

    let alerts = sink.alerts();
    assert!((alerts[0].current_mean - 0.12).abs() < 1e-9);
    assert!((alerts[1].drift_statistic - 0.40).abs() < 1e-9);
    assert!(alerts[1].baseline_triggered);
    assert!(alerts[1].drift_detected);
}

#[tokio::test]
async fn test_late_file_creation_is_picked_up() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("predictions.jsonl");

    // Notifications on: the watcher sees the directory, not the missing file.
    let running = Running::start(
        MonitorConfig::new(&path)
            .with_window_size(10)
            .with_poll_interval(Duration::from_millis(200)),
    );

    sleep(Duration::from_secs(3)).await;
    assert!(running.sink.alerts().is_empty());

    for i in 0..50 {
        append(&path, &record(stable(0.3, i)));
    }

    running.wait_for_alerts(5).await;
    let (summary, sink) = running.stop().await;

    assert_eq!(summary.total_observations, 50);
    assert_eq!(summary.total_windows, 5);
    assert_eq!(sink.alerts().len(), 5);
}

#[tokio::test]
async fn test_shutdown_mid_window_does_not_flush() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("predictions.jsonl");
    let lines: String = (0..40).map(|i| record(stable(0.2, i))).collect();
    append(&path, &lines);

    let running = Running::start(
        fast_config(&path)
            .with_window_size(100)
            .with_from_beginning(true)
            .with_status_interval(Duration::from_millis(50)),
    );

    assert!(
        running
            .wait_until(|s| s
                .statuses()
                .iter()
                .any(|st| st.observations_processed == 40))
            .await
    );
    let (summary, sink) = running.stop().await;

    let status = sink.statuses().pop().expect("status report");
    assert_eq!(status.current_window_progress, "40/100");

    assert_eq!(summary.total_observations, 40);
    assert_eq!(summary.total_windows, 0);
    assert_eq!(summary.baseline_mean, None);
    assert!(sink.alerts().is_empty());
    assert_eq!(sink.summaries().len(), 1);
}

#[tokio::test]
async fn test_quiet_mode_suppresses_status_only() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("predictions.jsonl");
    let lines: String = (0..10).map(|i| record(stable(0.2, i))).collect();
    append(&path, &lines);

    let running = Running::start(
        fast_config(&path)
            .with_window_size(5)
            .with_from_beginning(true)
            .with_quiet(true)
            .with_status_interval(Duration::from_millis(20)),
    );
    running.wait_for_alerts(2).await;
    sleep(Duration::from_millis(200)).await;
    let (_, sink) = running.stop().await;

    assert!(sink.statuses().is_empty());
    assert_eq!(sink.alerts().len(), 2);
    assert_eq!(sink.summaries().len(), 1);
}

#[tokio::test]
async fn test_truncation_resumes_from_start() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("predictions.jsonl");
    let lines: String = (0..10).map(|i| record(stable(0.2, i))).collect();
    append(&path, &lines);

    let running = Running::start(
        fast_config(&path)
            .with_window_size(5)
            .with_from_beginning(true),
    );
    running.wait_for_alerts(2).await;

    let shorter: String = (0..5).map(|i| record(stable(0.2, i))).collect();
    std::fs::write(&path, shorter).expect("Failed to truncate");
    running.wait_for_alerts(3).await;

    append(&path, &(0..5).map(|i| record(stable(0.2, i))).collect::<String>());
    running.wait_for_alerts(4).await;

    let (summary, sink) = running.stop().await;
    assert_eq!(
        sink.alerts().iter().map(|a| a.window_id).collect::<Vec<_>>(),
        vec![0, 1, 2, 3]
    );
    assert_eq!(summary.total_observations, 20);
}

#[cfg(unix)]
#[tokio::test]
async fn test_rotation_switches_to_new_file() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("predictions.jsonl");
    let lines: String = (0..5).map(|i| record(stable(0.2, i))).collect();
    append(&path, &lines);

    let running = Running::start(
        fast_config(&path)
            .with_window_size(5)
            .with_from_beginning(true),
    );
    running.wait_for_alerts(1).await;

    std::fs::rename(&path, dir.path().join("predictions.jsonl.1")).expect("Failed to rotate");
    let lines: String = (0..5).map(|i| record(stable(0.6, i))).collect();
    append(&path, &lines);

    running.wait_for_alerts(2).await;
    let (summary, sink) = running.stop().await;

    assert_eq!(summary.total_observations, 10);
    assert!(sink.alerts()[1].baseline_triggered);
}

#[tokio::test]
async fn test_partial_and_malformed_lines() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("predictions.jsonl");
    append(&path, "");

    let running = Running::start(fast_config(&path).with_window_size(3));
    sleep(Duration::from_millis(200)).await;

    append(&path, &record(0.1));
    append(&path, "{broken json\n");
    append(&path, r#"{"timestamp": "2025-12-14T10:00:00Z", "val"#);
    sleep(Duration::from_millis(200)).await;
    assert!(running.sink.alerts().is_empty());

    append(&path, "ue\": 0.2}\n");
    append(&path, "{\"timestamp\": \"2025-12-14T10:00:01Z\"}\n");
    append(&path, &record(0.3));

    running.wait_for_alerts(1).await;
    let (summary, sink) = running.stop().await;

    let alert = &sink.alerts()[0];
    assert_eq!(alert.observation_count, 3);
    assert!((alert.current_mean - 0.2).abs() < 1e-9);
    assert_eq!(summary.total_observations, 3);
    assert_eq!(summary.skipped_lines, 2);
}

#[tokio::test]
async fn test_dropped_shutdown_sender_stops_monitor() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let sink = MemorySink::new();
    let monitor = DriftMonitor::new(fast_config(&dir.path().join("absent.jsonl")), sink.clone())
        .expect("Failed to create monitor");

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(monitor.run(rx));
    sleep(Duration::from_millis(100)).await;
    drop(tx);

    let summary = tokio::time::timeout(WAIT, handle)
        .await
        .expect("monitor did not stop")
        .expect("Monitor task panicked");
    assert_eq!(summary.total_observations, 0);
    assert_eq!(sink.summaries().len(), 1);
}
