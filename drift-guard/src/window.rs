//! Fixed-capacity tumbling windows over the observation stream.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, MonitorResult};
use crate::record::Observation;

/// Single-pass mean/variance accumulator (Welford).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStats {
    /// Number of values seen.
    pub count: u64,
    /// Running mean.
    pub mean: f64,
    /// Sum of squared deviations from the running mean.
    pub m2: f64,
}

impl RunningStats {
    /// Folds one value into the accumulator.
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Population variance; `0.0` when empty.
    pub fn population_variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).max(0.0)
        }
    }

    /// Population standard deviation; `0.0` when empty.
    pub fn population_std_dev(&self) -> f64 {
        self.population_variance().sqrt()
    }
}

/// A completed tumbling window.
///
/// Only complete windows leave the aggregator, so `observations.len()` always
/// equals the configured capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub id: u64,
    pub observations: Vec<Observation>,
    pub mean: f64,
    /// Population standard deviation.
    pub stddev: f64,
}

impl Window {
    /// Number of observations in the window.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Returns true if the window holds no observations.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Timestamp of the newest observation.
    pub fn last_timestamp(&self) -> Option<&str> {
        self.observations.last().map(|o| o.timestamp.as_str())
    }
}

/// Progress toward completing the current window, rendered as `"X/capacity"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowProgress {
    pub filled: usize,
    pub capacity: usize,
}

impl fmt::Display for WindowProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.filled, self.capacity)
    }
}

/// Accumulates observations into non-overlapping windows of fixed capacity.
#[derive(Debug)]
pub struct WindowAggregator {
    capacity: usize,
    current_id: u64,
    buffer: Vec<Observation>,
    stats: RunningStats,
}

impl WindowAggregator {
    /// Creates an aggregator producing windows of exactly `capacity` observations.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `capacity` is zero.
    pub fn new(capacity: usize) -> MonitorResult<Self> {
        if capacity == 0 {
            return Err(MonitorError::configuration(
                "window capacity must be a positive integer",
            ));
        }

        Ok(Self {
            capacity,
            current_id: 0,
            buffer: Vec::with_capacity(capacity),
            stats: RunningStats::default(),
        })
    }

    /// Appends an observation; returns the window it completed, if any.
    ///
    /// When a window completes, a fresh empty window with the next id takes
    /// its place before this call returns.
    pub fn observe(&mut self, observation: Observation) -> Option<Window> {
        self.stats.push(observation.value);
        self.buffer.push(observation);

        if self.buffer.len() < self.capacity {
            return None;
        }

        let observations = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.capacity));
        let stats = std::mem::take(&mut self.stats);
        let window = Window {
            id: self.current_id,
            observations,
            mean: stats.mean,
            stddev: stats.population_std_dev(),
        };
        self.current_id += 1;

        Some(window)
    }

    /// Id the next completed window will carry.
    pub fn current_id(&self) -> u64 {
        self.current_id
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Progress of the window currently being filled.
    pub fn progress(&self) -> WindowProgress {
        WindowProgress {
            filled: self.buffer.len(),
            capacity: self.capacity,
        }
    }
}
