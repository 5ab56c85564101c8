use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;

use crate::error::{MonitorError, MonitorResult};

/// Default number of observations per tumbling window.
pub const DEFAULT_WINDOW_SIZE: usize = 100;

/// Default sensitivity for the change detector and the baseline threshold.
pub const DEFAULT_DELTA: f64 = 0.002;

/// Default multiplier turning `delta` into an absolute baseline threshold.
/// `0.002 * 50.0 = 0.1`, roughly a 10% absolute deviation.
pub const DEFAULT_THRESHOLD_SCALE: f64 = 50.0;

/// Parameters for a single drift monitor instance.
///
/// Values are resolved by the caller (CLI, embedding application) and handed
/// to [`crate::DriftMonitor::new`], which validates them before any state is
/// created.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    log_file: PathBuf,
    window_size: usize,
    delta: f64,
    threshold_scale: f64,
    quiet: bool,
    from_beginning: bool,
    poll_interval: Duration,
    status_interval: Duration,
    notifications: bool,
}

impl MonitorConfig {
    /// Create a configuration monitoring the given log file with defaults.
    pub fn new(log_file: impl AsRef<Path>) -> Self {
        Self {
            log_file: log_file.as_ref().to_path_buf(),
            window_size: DEFAULT_WINDOW_SIZE,
            delta: DEFAULT_DELTA,
            threshold_scale: DEFAULT_THRESHOLD_SCALE,
            quiet: false,
            from_beginning: false,
            poll_interval: Duration::from_secs(2),
            status_interval: Duration::from_secs(60),
            notifications: true,
        }
    }

    /// Resolves the daily log file written by the prediction service:
    /// `<dir>/predictions_YYYYMMDD.jsonl`.
    pub fn daily_log_path(dir: impl AsRef<Path>, date: NaiveDate) -> PathBuf {
        dir.as_ref()
            .join(format!("predictions_{}.jsonl", date.format("%Y%m%d")))
    }

    /// Set the number of observations per window.
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Set the sensitivity delta. Smaller values lower the baseline threshold
    /// and make the change detector flag more changes.
    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }

    /// Set the multiplier applied to `delta` to get the baseline threshold.
    pub fn with_threshold_scale(mut self, scale: f64) -> Self {
        self.threshold_scale = scale;
        self
    }

    /// Suppress status events and demote diagnostics. Alerts are never suppressed.
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Process content already in the file instead of tailing from its end.
    pub fn with_from_beginning(mut self, from_beginning: bool) -> Self {
        self.from_beginning = from_beginning;
        self
    }

    /// Set the fallback poll interval (also the waiting re-check interval).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the interval between status events.
    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }

    /// Enable or disable filesystem notifications. Polling always stays on.
    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.notifications = enabled;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> MonitorResult<()> {
        if self.log_file.as_os_str().is_empty() {
            return Err(MonitorError::configuration("log file path cannot be empty"));
        }

        if self.window_size == 0 {
            return Err(MonitorError::configuration(
                "window size must be a positive integer",
            ));
        }

        if !self.delta.is_finite() || self.delta <= 0.0 || self.delta >= 1.0 {
            return Err(MonitorError::configuration(format!(
                "delta must be in (0, 1), got {}",
                self.delta
            )));
        }

        if !self.threshold_scale.is_finite() || self.threshold_scale <= 0.0 {
            return Err(MonitorError::configuration(format!(
                "threshold scale must be positive, got {}",
                self.threshold_scale
            )));
        }

        if self.poll_interval.is_zero() {
            return Err(MonitorError::configuration(
                "poll interval must be greater than zero",
            ));
        }

        if self.status_interval.is_zero() {
            return Err(MonitorError::configuration(
                "status interval must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Get the monitored log file.
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Get the window capacity.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Get the sensitivity delta.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Get the baseline threshold scale factor.
    pub fn threshold_scale(&self) -> f64 {
        self.threshold_scale
    }

    /// Absolute baseline deviation above which a window is flagged.
    pub fn baseline_threshold(&self) -> f64 {
        self.delta * self.threshold_scale
    }

    /// Check if quiet mode is enabled.
    pub fn quiet(&self) -> bool {
        self.quiet
    }

    /// Check if existing content is processed.
    pub fn from_beginning(&self) -> bool {
        self.from_beginning
    }

    /// Get the fallback poll interval.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Get the status interval.
    pub fn status_interval(&self) -> Duration {
        self.status_interval
    }

    /// Check if filesystem notifications are enabled.
    pub fn notifications(&self) -> bool {
        self.notifications
    }
}
