//! # drift-guard - real-time drift monitoring for model outputs
//!
//! drift-guard tails an append-only, newline-delimited JSON log of model
//! predictions and raises an alert when the distribution of the predicted
//! value moves away from where it started.
//!
//! ## How it works
//!
//! Every appended line is decoded into an [`Observation`] and fed to two
//! independent signals:
//!
//! - a streaming change-point detector ([`detector::Adwin`]) that sees the
//!   whole stream and flags the *transition* into a new regime
//! - a [`baseline::BaselineMonitor`] that compares each completed tumbling
//!   window's mean against the first window's mean and keeps flagging for as
//!   long as a shift lasts
//!
//! Each completed window produces one [`Alert`]; `drift_detected` is the OR of
//! both signals.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use drift_guard::prelude::*;
//! use std::time::Duration;
//! use tokio::sync::watch;
//!
//! # async fn example() -> MonitorResult<()> {
//! let config = MonitorConfig::new("logs/predictions_20251214.jsonl")
//!     .with_window_size(100)
//!     .with_delta(0.002)
//!     .with_status_interval(Duration::from_secs(60));
//!
//! let monitor = DriftMonitor::new(config, JsonLinesSink::stdout())?;
//! let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//! let summary = monitor.run(shutdown_rx).await;
//! println!("detection rate: {:.1}%", summary.detection_rate());
//! # Ok(())
//! # }
//! ```
//!
//! ## Input format
//!
//! ```text
//! {"timestamp": "2025-12-14T10:00:00Z", "value": 0.42, "model_version": "v1"}
//! ```
//!
//! Extra fields are ignored. Lines that fail to decode are counted and
//! skipped; they never stop the monitor.
//!
//! ## Logging
//!
//! Diagnostics go through `tracing`. Binaries install a subscriber with
//! [`logging::init_logging`]; libraries embedding drift-guard can install
//! their own.

pub mod alert;
pub mod baseline;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod record;
pub mod sink;
pub mod source;
pub mod window;

pub use alert::{Alert, RunSummary, StatusReport};
pub use config::MonitorConfig;
pub use engine::{DriftMonitor, MonitorState};
pub use error::{MonitorError, MonitorResult};
pub use record::{DecodeError, Observation};
