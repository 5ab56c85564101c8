//! Streaming change-point detection.
//!
//! A [`ChangeDetector`] sees every observed value, in order, for the lifetime
//! of the process. Unlike the tumbling windows it has no fixed boundaries: it
//! compares older and more recent regions of the whole stream and flags the
//! point where they diverge. Once it has re-adapted to a shifted regime it
//! goes quiet again, which is why [`crate::baseline::BaselineMonitor`] runs
//! alongside it.

mod adwin;

pub use adwin::Adwin;

/// Trait for adaptive change-point detectors fed one value at a time.
pub trait ChangeDetector: Send {
    /// Feeds one value. Returns true if this value caused a change to be flagged.
    fn observe(&mut self, value: f64) -> bool;

    /// Whether the most recent call to [`observe`](Self::observe) flagged a change.
    fn change_detected(&self) -> bool;

    /// Number of changes flagged since construction.
    fn detections(&self) -> u64;

    /// Short name of the detection strategy, used in alert messages.
    fn name(&self) -> &str;
}
