//! The monitoring control loop.
//!
//! [`DriftMonitor`] owns every piece of per-stream state and drives it from a
//! single task. Two wake-up producers feed it, the file notification queue
//! and a fixed poll interval, and either one triggers the same read. The
//! loop's only suspension point is a `tokio::select!` over those producers,
//! the status timer and the shutdown channel.

use std::fmt;

use tokio::sync::watch;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::alert::{Alert, AlertEngine, RunSummary};
use crate::baseline::BaselineMonitor;
use crate::config::MonitorConfig;
use crate::detector::{Adwin, ChangeDetector};
use crate::error::MonitorResult;
use crate::log_diagnostic;
use crate::record::{Observation, RecordDecoder};
use crate::sink::EventSink;
use crate::source::{LineSource, ReadOutcome, WakeSource};
use crate::window::{WindowAggregator, WindowProgress};

/// Lifecycle of a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    /// The log file does not exist.
    Waiting,
    Active,
    /// Shutdown requested; no further reads.
    Draining,
    /// Terminal; `run` has returned the summary.
    Stopped,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MonitorState::Idle => "idle",
            MonitorState::Waiting => "waiting",
            MonitorState::Active => "active",
            MonitorState::Draining => "draining",
            MonitorState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Decode → window → detect → alert, one line at a time.
struct DetectionPipeline<S> {
    decoder: RecordDecoder,
    aggregator: WindowAggregator,
    detector: Box<dyn ChangeDetector>,
    /// Set when the detector flags a change; cleared when a window completes.
    change_since_last_window: bool,
    baseline: BaselineMonitor,
    alerts: AlertEngine<S>,
    quiet: bool,
}

impl<S: EventSink> DetectionPipeline<S> {
    fn process_line(&mut self, line: &str) -> Option<Alert> {
        match self.decoder.decode(line) {
            Ok(Some(observation)) => self.process(observation),
            Ok(None) => None,
            Err(e) => {
                self.alerts.record_skipped_line();
                log_diagnostic!(self.quiet, error = %e, "Skipping undecodable line");
                None
            }
        }
    }

    fn process(&mut self, observation: Observation) -> Option<Alert> {
        self.alerts.record_observation();
        if self.detector.observe(observation.value) {
            self.change_since_last_window = true;
        }

        let window = self.aggregator.observe(observation)?;
        let adwin_triggered = std::mem::take(&mut self.change_since_last_window);
        let result = self.baseline.evaluate(&window);
        let baseline_mean = self.baseline.baseline_mean().unwrap_or(window.mean);

        Some(
            self.alerts
                .on_window_complete(&window, adwin_triggered, result, baseline_mean),
        )
    }
}

/// Tails one prediction log and emits drift alerts to a sink.
///
/// # Examples
///
/// ```rust,no_run
/// use drift_guard::prelude::*;
/// use tokio::sync::watch;
///
/// # async fn example() -> MonitorResult<()> {
/// let config = MonitorConfig::new("logs/predictions.jsonl").with_window_size(100);
/// let monitor = DriftMonitor::new(config, ConsoleSink::stdout())?;
///
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let handle = tokio::spawn(monitor.run(shutdown_rx));
///
/// // ... later
/// shutdown_tx.send(true).ok();
/// let summary = handle.await.expect("monitor task panicked");
/// println!("{} windows analyzed", summary.total_windows);
/// # Ok(())
/// # }
/// ```
pub struct DriftMonitor<S> {
    config: MonitorConfig,
    state: MonitorState,
    source: LineSource,
    pipeline: DetectionPipeline<S>,
}

impl<S: EventSink> DriftMonitor<S> {
    /// Creates a monitor using ADWIN as the change detector.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` is invalid. Nothing is
    /// opened or allocated in that case.
    pub fn new(config: MonitorConfig, sink: S) -> MonitorResult<Self> {
        let detector = Adwin::from_sensitivity(config.delta());
        Self::with_detector(config, sink, Box::new(detector))
    }

    /// Creates a monitor with a custom change detector.
    pub fn with_detector(
        config: MonitorConfig,
        sink: S,
        detector: Box<dyn ChangeDetector>,
    ) -> MonitorResult<Self> {
        config.validate()?;

        let pipeline = DetectionPipeline {
            decoder: RecordDecoder::new(),
            aggregator: WindowAggregator::new(config.window_size())?,
            baseline: BaselineMonitor::new(config.delta(), config.threshold_scale()),
            alerts: AlertEngine::new(sink, detector.name()),
            detector,
            change_since_last_window: false,
            quiet: config.quiet(),
        };

        Ok(Self {
            source: LineSource::new(config.log_file(), config.from_beginning()),
            state: MonitorState::Idle,
            pipeline,
            config,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Counters so far.
    pub fn summary(&self) -> &RunSummary {
        self.pipeline.alerts.summary()
    }

    /// Progress of the window being filled.
    pub fn progress(&self) -> WindowProgress {
        self.pipeline.aggregator.progress()
    }

    /// Reads one chunk and processes every complete line found in it.
    ///
    /// Returns the alerts for windows completed during this cycle. Read
    /// failures are logged and retried on the next call. When the chunk
    /// stopped short of end-of-file, [`DriftMonitor::has_backlog`] is true.
    pub async fn ingest(&mut self) -> Vec<Alert> {
        let lines = match self.source.read_available().await {
            Ok(ReadOutcome::Lines(lines)) => lines,
            Ok(ReadOutcome::Waiting) => {
                if self.state != MonitorState::Waiting {
                    self.transition(MonitorState::Waiting);
                    log_diagnostic!(
                        self.config.quiet(),
                        path = %self.config.log_file().display(),
                        "Waiting for log file to appear"
                    );
                }
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, transient = e.is_transient(), "Read failed, retrying on next tick");
                return Vec::new();
            }
        };

        if self.state != MonitorState::Active {
            self.transition(MonitorState::Active);
        }
        for _ in 0..self.source.take_oversized_lines() {
            self.pipeline.alerts.record_skipped_line();
        }

        lines
            .iter()
            .filter_map(|line| self.pipeline.process_line(line))
            .collect()
    }

    /// Whether the file holds bytes past the last chunk read.
    pub fn has_backlog(&self) -> bool {
        self.source.has_unread()
    }

    /// Runs until `shutdown` carries `true` or its sender is dropped, then
    /// emits the run summary exactly once and returns it.
    ///
    /// A backlog is read one chunk per loop turn, so shutdown is honoured
    /// between chunks. An incomplete window at shutdown is discarded, never
    /// flushed. Taking `self` by value means nothing can touch the monitor
    /// once it has stopped.
    #[instrument(skip_all, fields(path = %self.config.log_file().display()))]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> RunSummary {
        let mut wake = self.wake_source();
        let quiet = self.config.quiet();

        let mut poll = interval(self.config.poll_interval());
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let status_period = self.config.status_interval();
        let mut status = interval_at(Instant::now() + status_period, status_period);
        status.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            window_size = self.config.window_size(),
            delta = self.config.delta(),
            threshold = self.pipeline.baseline.threshold(),
            "Drift monitor started"
        );

        while !*shutdown.borrow() {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("Shutdown sender dropped");
                        break;
                    }
                }
                _ = std::future::ready(()), if self.has_backlog() => {
                    self.ingest().await;
                }
                _ = wake.notified() => {
                    self.ingest().await;
                }
                _ = poll.tick() => {
                    self.ingest().await;
                }
                _ = status.tick(), if !quiet => {
                    let progress = self.pipeline.aggregator.progress();
                    self.pipeline.alerts.emit_status(progress);
                }
            }
        }

        self.transition(MonitorState::Draining);
        let dropped = self.pipeline.aggregator.progress().filled;
        if dropped > 0 {
            debug!(dropped, "Discarding incomplete window");
        }

        let summary = self.pipeline.alerts.finish();
        info!(
            total_observations = summary.total_observations,
            total_windows = summary.total_windows,
            drift_windows = summary.drift_windows,
            "Drift monitor stopped"
        );
        summary
    }

    fn wake_source(&self) -> WakeSource {
        if !self.config.notifications() {
            return WakeSource::disabled();
        }
        match WakeSource::watch(self.config.log_file()) {
            Ok(wake) => wake,
            Err(e) => {
                warn!(error = %e, "File notifications unavailable, polling only");
                WakeSource::disabled()
            }
        }
    }

    fn transition(&mut self, next: MonitorState) {
        debug!(from = %self.state, to = %next, "State transition");
        self.state = next;
    }
}
