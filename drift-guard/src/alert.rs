//! Per-window alerts, periodic status reports and the run summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::baseline::BaselineResult;
use crate::sink::{EventSink, MonitorEvent};
use crate::window::{Window, WindowProgress};

/// Outcome of analysing one completed window. Emitted for every window,
/// drifting or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub window_id: u64,
    /// Timestamp of the last observation in the window.
    pub timestamp: String,
    pub drift_detected: bool,
    /// The change detector flagged a change while this window was filling.
    pub adwin_triggered: bool,
    pub baseline_triggered: bool,
    pub drift_statistic: f64,
    pub baseline_mean: f64,
    pub current_mean: f64,
    pub current_stddev: f64,
    pub observation_count: usize,
    /// Human-readable verdict. For drift it names the signals and the mean
    /// shift, with a signed percentage relative to `|baseline_mean|` (`-`
    /// for a drop, `n/a` for a zero baseline).
    pub message: String,
}

/// Periodic progress report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub observations_processed: u64,
    pub windows_analyzed: u64,
    pub drift_count: u64,
    /// Percentage of analysed windows flagged as drifting.
    pub drift_rate: f64,
    /// `"filled/capacity"` for the window currently being built.
    pub current_window_progress: String,
    pub skipped_lines: u64,
    pub generated_at: DateTime<Utc>,
}

/// Aggregate counters for a run, emitted once at shutdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_observations: u64,
    pub total_windows: u64,
    pub drift_windows: u64,
    pub skipped_lines: u64,
    pub baseline_mean: Option<f64>,
}

impl RunSummary {
    /// Percentage of completed windows flagged as drifting; `0.0` before any window.
    pub fn detection_rate(&self) -> f64 {
        if self.total_windows == 0 {
            0.0
        } else {
            100.0 * self.drift_windows as f64 / self.total_windows as f64
        }
    }
}

/// Combines detector signals into alerts and keeps the run counters.
///
/// This is the only component that writes to the output sink.
pub struct AlertEngine<S> {
    sink: S,
    detector_name: String,
    summary: RunSummary,
}

impl<S: EventSink> AlertEngine<S> {
    /// Creates an engine writing to `sink`. `detector_name` labels change
    /// detector hits in alert messages.
    pub fn new(sink: S, detector_name: impl Into<String>) -> Self {
        Self {
            sink,
            detector_name: detector_name.into(),
            summary: RunSummary::default(),
        }
    }

    /// Counts one decoded observation.
    pub fn record_observation(&mut self) {
        self.summary.total_observations += 1;
    }

    /// Counts one line that failed to decode.
    pub fn record_skipped_line(&mut self) {
        self.summary.skipped_lines += 1;
    }

    /// Builds, counts and emits the alert for a completed window.
    pub fn on_window_complete(
        &mut self,
        window: &Window,
        adwin_triggered: bool,
        baseline: BaselineResult,
        baseline_mean: f64,
    ) -> Alert {
        let drift_detected = adwin_triggered || baseline.triggered;

        self.summary.total_windows += 1;
        self.summary.baseline_mean = Some(baseline_mean);
        if drift_detected {
            self.summary.drift_windows += 1;
        }

        let alert = Alert {
            window_id: window.id,
            timestamp: window.last_timestamp().unwrap_or_default().to_string(),
            drift_detected,
            adwin_triggered,
            baseline_triggered: baseline.triggered,
            drift_statistic: baseline.drift_statistic,
            baseline_mean,
            current_mean: window.mean,
            current_stddev: window.stddev,
            observation_count: window.len(),
            message: self.alert_message(
                window.mean,
                baseline_mean,
                adwin_triggered,
                baseline.triggered,
            ),
        };

        if drift_detected {
            warn!(
                window_id = alert.window_id,
                drift_statistic = alert.drift_statistic,
                adwin = adwin_triggered,
                baseline = baseline.triggered,
                "Drift detected"
            );
        } else {
            info!(
                window_id = alert.window_id,
                current_mean = alert.current_mean,
                "Window stable"
            );
        }

        self.emit(MonitorEvent::Alert(alert.clone()));
        alert
    }

    /// Builds and emits a status report.
    pub fn emit_status(&mut self, progress: WindowProgress) -> StatusReport {
        let report = StatusReport {
            observations_processed: self.summary.total_observations,
            windows_analyzed: self.summary.total_windows,
            drift_count: self.summary.drift_windows,
            drift_rate: self.summary.detection_rate(),
            current_window_progress: progress.to_string(),
            skipped_lines: self.summary.skipped_lines,
            generated_at: Utc::now(),
        };
        self.emit(MonitorEvent::Status(report.clone()));
        report
    }

    /// Emits the final summary and releases the sink.
    pub fn finish(mut self) -> RunSummary {
        let summary = self.summary.clone();
        self.emit(MonitorEvent::Summary(summary.clone()));
        summary
    }

    /// Counters so far.
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    fn emit(&mut self, event: MonitorEvent) {
        if let Err(e) = self.sink.emit(&event) {
            warn!(error = %e, "Failed to emit event");
        }
    }

    fn alert_message(
        &self,
        current_mean: f64,
        baseline_mean: f64,
        adwin_triggered: bool,
        baseline_triggered: bool,
    ) -> String {
        if !(adwin_triggered || baseline_triggered) {
            return format!("Stable - mean {current_mean:.4}, baseline {baseline_mean:.4}");
        }

        let mut signals = Vec::with_capacity(2);
        if adwin_triggered {
            signals.push(self.detector_name.as_str());
        }
        if baseline_triggered {
            signals.push("Baseline");
        }

        let change = if baseline_mean != 0.0 {
            format!(
                "{:+.1}%",
                (current_mean - baseline_mean) / baseline_mean.abs() * 100.0
            )
        } else {
            "n/a".to_string()
        };

        format!(
            "DRIFT DETECTED [{}] - mean shifted from {baseline_mean:.4} to {current_mean:.4} ({change})",
            signals.join(", ")
        )
    }
}
