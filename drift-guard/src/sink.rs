//! Output sinks for monitor events.
//!
//! The engine produces three kinds of [`MonitorEvent`]: one alert per
//! completed window, periodic status reports, and a single run summary at
//! shutdown. Where they end up is decided by the [`EventSink`] handed to
//! [`crate::DriftMonitor::new`]:
//!
//! - [`ConsoleSink`] renders human-readable blocks for an operator terminal
//! - [`JsonLinesSink`] writes one JSON object per line for log shippers
//! - [`MemorySink`] collects events in memory for tests and embedding
//!
//! # Examples
//!
//! ```rust
//! use drift_guard::sink::{EventSink, MemorySink, MonitorEvent};
//! use drift_guard::alert::RunSummary;
//!
//! let sink = MemorySink::new();
//! let mut writer = sink.clone();
//! writer.emit(&MonitorEvent::Summary(RunSummary::default())).unwrap();
//! assert_eq!(sink.summaries().len(), 1);
//! ```

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::alert::{Alert, RunSummary, StatusReport};
use crate::error::{MonitorError, MonitorResult};

/// An event produced by the monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    Alert(Alert),
    Status(StatusReport),
    Summary(RunSummary),
}

/// Destination for monitor events.
pub trait EventSink: Send {
    /// Writes one event. A failure is logged by the caller and does not stop
    /// monitoring.
    fn emit(&mut self, event: &MonitorEvent) -> MonitorResult<()>;
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn emit(&mut self, event: &MonitorEvent) -> MonitorResult<()> {
        (**self).emit(event)
    }
}

fn sink_error(err: io::Error) -> MonitorError {
    MonitorError::Sink {
        message: err.to_string(),
    }
}

/// Human-readable console output.
pub struct ConsoleSink {
    out: Box<dyn Write + Send>,
}

impl ConsoleSink {
    /// Writes to stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Writes to an arbitrary writer.
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self { out: Box::new(out) }
    }

    /// Renders an event the way it appears on the console.
    pub fn render(event: &MonitorEvent) -> String {
        match event {
            MonitorEvent::Alert(alert) => Self::render_alert(alert),
            MonitorEvent::Status(status) => Self::render_status(status),
            MonitorEvent::Summary(summary) => Self::render_summary(summary),
        }
    }

    fn render_alert(alert: &Alert) -> String {
        if alert.drift_detected {
            let rule = "=".repeat(60);
            format!(
                "{rule}\n\
                 Window #{id} @ {ts}\n\
                 {msg}\n\
                 Baseline mean:   {baseline:.4}\n\
                 Current mean:    {mean:.4} (std {std:.4})\n\
                 Drift statistic: {stat:.4}\n\
                 Observations:    {count}\n\
                 {rule}\n",
                id = alert.window_id,
                ts = alert.timestamp,
                msg = alert.message,
                baseline = alert.baseline_mean,
                mean = alert.current_mean,
                std = alert.current_stddev,
                stat = alert.drift_statistic,
                count = alert.observation_count,
            )
        } else {
            format!("Window #{} @ {}: {}\n", alert.window_id, alert.timestamp, alert.message)
        }
    }

    fn render_status(status: &StatusReport) -> String {
        format!(
            "[{}] Status: {} observations, {} windows analyzed, {} drift ({:.1}%), \
             current window {}, {} skipped lines\n",
            status.generated_at.format("%H:%M:%S"),
            status.observations_processed,
            status.windows_analyzed,
            status.drift_count,
            status.drift_rate,
            status.current_window_progress,
            status.skipped_lines,
        )
    }

    fn render_summary(summary: &RunSummary) -> String {
        let baseline = summary
            .baseline_mean
            .map_or_else(|| "not established".to_string(), |m| format!("{m:.4}"));
        format!(
            "\nFinal summary\n\
             Total observations: {}\n\
             Windows analyzed:   {}\n\
             Drift detections:   {}\n\
             Detection rate:     {:.1}%\n\
             Skipped lines:      {}\n\
             Baseline mean:      {}\n",
            summary.total_observations,
            summary.total_windows,
            summary.drift_windows,
            summary.detection_rate(),
            summary.skipped_lines,
            baseline,
        )
    }
}

impl EventSink for ConsoleSink {
    fn emit(&mut self, event: &MonitorEvent) -> MonitorResult<()> {
        self.out
            .write_all(Self::render(event).as_bytes())
            .and_then(|()| self.out.flush())
            .map_err(sink_error)
    }
}

/// One JSON object per line.
pub struct JsonLinesSink {
    out: Box<dyn Write + Send>,
}

impl JsonLinesSink {
    /// Writes to stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Writes to an arbitrary writer.
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self { out: Box::new(out) }
    }
}

impl EventSink for JsonLinesSink {
    fn emit(&mut self, event: &MonitorEvent) -> MonitorResult<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        self.out
            .write_all(line.as_bytes())
            .and_then(|()| self.out.flush())
            .map_err(sink_error)
    }
}

/// Collects events in a shared buffer. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<MonitorEvent>>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<MonitorEvent>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All events received so far, in order.
    pub fn events(&self) -> Vec<MonitorEvent> {
        self.lock().clone()
    }

    /// Alerts received so far.
    pub fn alerts(&self) -> Vec<Alert> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                MonitorEvent::Alert(a) => Some(a.clone()),
                _ => None,
            })
            .collect()
    }

    /// Status reports received so far.
    pub fn statuses(&self) -> Vec<StatusReport> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                MonitorEvent::Status(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    /// Summaries received so far.
    pub fn summaries(&self) -> Vec<RunSummary> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                MonitorEvent::Summary(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&mut self, event: &MonitorEvent) -> MonitorResult<()> {
        self.lock().push(event.clone());
        Ok(())
    }
}
