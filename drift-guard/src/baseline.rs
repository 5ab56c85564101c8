//! Sustained-deviation check against the first completed window.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::window::Window;

/// The reference mean, captured once from window 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineState {
    pub mean: Option<f64>,
}

/// Outcome of comparing one window against the baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineResult {
    /// `|window.mean - baseline_mean|`, `0.0` for the baseline window itself.
    pub drift_statistic: f64,
    pub triggered: bool,
}

/// Flags windows whose mean strays too far from the baseline.
///
/// The change detector only reports transitions; this monitor keeps flagging
/// for as long as the shift lasts.
#[derive(Debug, Clone)]
pub struct BaselineMonitor {
    state: BaselineState,
    threshold: f64,
}

impl BaselineMonitor {
    /// Creates a monitor with threshold `delta * scale`.
    pub fn new(delta: f64, scale: f64) -> Self {
        Self {
            state: BaselineState::default(),
            threshold: delta * scale,
        }
    }

    /// Evaluates a completed window.
    ///
    /// The first window ever evaluated becomes the baseline and is never
    /// flagged.
    pub fn evaluate(&mut self, window: &Window) -> BaselineResult {
        let Some(baseline) = self.state.mean else {
            self.state.mean = Some(window.mean);
            info!(
                window_id = window.id,
                baseline_mean = window.mean,
                "Baseline established"
            );
            return BaselineResult {
                drift_statistic: 0.0,
                triggered: false,
            };
        };

        let drift_statistic = (window.mean - baseline).abs();
        BaselineResult {
            drift_statistic,
            triggered: drift_statistic > self.threshold,
        }
    }

    /// The baseline mean, once established.
    pub fn baseline_mean(&self) -> Option<f64> {
        self.state.mean
    }

    /// Current state.
    pub fn state(&self) -> BaselineState {
        self.state
    }

    /// Absolute deviation that triggers.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}
