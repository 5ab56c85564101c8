use std::collections::VecDeque;

use tracing::debug;

use super::ChangeDetector;
use crate::config::DEFAULT_DELTA;

/// Maximum buckets per row before the two oldest are merged upward.
const MAX_BUCKETS: usize = 5;

/// Cut points are only evaluated every `CLOCK` observations.
const CLOCK: u64 = 32;

/// Minimum length of either sub-window for a cut to be considered.
const MIN_SUB_WINDOW: f64 = 5.0;

/// No cut is evaluated until the window holds more than this many values.
const GRACE_PERIOD: u64 = 10;

fn sensitivity_to_confidence(sensitivity: f64) -> f64 {
    (DEFAULT_DELTA * DEFAULT_DELTA / sensitivity).min(1.0)
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    total: f64,
    /// Sum of squared deviations of the bucket's values from their mean.
    variance: f64,
}

/// ADWIN (ADaptive WINdowing) change detector.
///
/// The window is stored as an exponential histogram: row `i` holds buckets
/// summarising `2^i` consecutive values, front = oldest. Memory and per-value
/// work are logarithmic in the window length. Every [`CLOCK`] values the
/// window is scanned from oldest to newest for a split whose two halves have
/// significantly different means; the oldest data is dropped until no such
/// split remains.
///
/// `delta` is the confidence parameter of the cut bound: smaller values need
/// stronger evidence and flag fewer changes. Monitors configured with a
/// sensitivity, where smaller means more eager, go through
/// [`Adwin::from_sensitivity`].
#[derive(Debug, Clone)]
pub struct Adwin {
    delta: f64,
    rows: Vec<VecDeque<Bucket>>,
    total: f64,
    variance: f64,
    width: u64,
    tick: u64,
    detections: u64,
    change: bool,
}

impl Adwin {
    /// Creates a detector with the given confidence parameter.
    pub fn new(delta: f64) -> Self {
        Self {
            delta,
            rows: vec![VecDeque::with_capacity(MAX_BUCKETS + 1)],
            total: 0.0,
            variance: 0.0,
            width: 0,
            tick: 0,
            detections: 0,
            change: false,
        }
    }

    /// Creates a detector from a monitor sensitivity, where lower values flag
    /// more changes.
    ///
    /// The sensitivity is mirrored around [`DEFAULT_DELTA`] onto the confidence
    /// parameter (`DEFAULT_DELTA^2 / sensitivity`, capped at 1), so the default
    /// sensitivity keeps the default confidence.
    pub fn from_sensitivity(sensitivity: f64) -> Self {
        Self::new(sensitivity_to_confidence(sensitivity))
    }

    /// Confidence parameter used by the cut bound.
    pub fn confidence(&self) -> f64 {
        self.delta
    }

    /// Number of values currently retained in the adaptive window.
    pub fn width(&self) -> u64 {
        self.width
    }

    /// Mean of the adaptive window; `0.0` when empty.
    pub fn estimation(&self) -> f64 {
        if self.width == 0 {
            0.0
        } else {
            self.total / self.width as f64
        }
    }

    /// Variance of the values in the adaptive window.
    pub fn variance(&self) -> f64 {
        if self.width == 0 {
            0.0
        } else {
            self.variance / self.width as f64
        }
    }

    fn bucket_size(row: usize) -> f64 {
        (1u64 << row) as f64
    }

    fn insert(&mut self, value: f64) {
        self.width += 1;
        if self.width > 1 {
            let previous = (self.width - 1) as f64;
            let mean = self.total / previous;
            self.variance += previous * (value - mean).powi(2) / self.width as f64;
        }
        self.total += value;

        self.rows[0].push_back(Bucket {
            total: value,
            variance: 0.0,
        });
        self.compress();
    }

    fn compress(&mut self) {
        let mut row = 0;
        while row < self.rows.len() && self.rows[row].len() > MAX_BUCKETS {
            let (Some(first), Some(second)) = (self.rows[row].pop_front(), self.rows[row].pop_front())
            else {
                break;
            };

            let n = Self::bucket_size(row);
            let mean_gap = first.total / n - second.total / n;
            let merged = Bucket {
                total: first.total + second.total,
                variance: first.variance + second.variance + n * n * mean_gap.powi(2) / (2.0 * n),
            };

            if row + 1 == self.rows.len() {
                self.rows.push(VecDeque::with_capacity(MAX_BUCKETS + 1));
            }
            self.rows[row + 1].push_back(merged);
            row += 1;
        }
    }

    /// Drops the oldest bucket from the window.
    fn delete_oldest(&mut self) {
        let Some(row) = (0..self.rows.len()).rev().find(|&r| !self.rows[r].is_empty()) else {
            return;
        };
        let Some(bucket) = self.rows[row].pop_front() else {
            return;
        };

        let n = Self::bucket_size(row);
        self.width = self.width.saturating_sub(1u64 << row);
        self.total -= bucket.total;

        if self.width == 0 {
            self.total = 0.0;
            self.variance = 0.0;
        } else {
            let w = self.width as f64;
            let gap = bucket.total / n - self.total / w;
            self.variance -= bucket.variance + n * w * gap.powi(2) / (n + w);
            self.variance = self.variance.max(0.0);
        }

        while self.rows.len() > 1 && self.rows.last().is_some_and(VecDeque::is_empty) {
            self.rows.pop();
        }
    }

    fn cut_is_significant(&self, n0: f64, n1: f64, mean_gap: f64) -> bool {
        let width = self.width as f64;
        let delta_prime = (2.0 * width.ln() / self.delta).ln();
        let m_recip = 1.0 / (n0 - MIN_SUB_WINDOW + 1.0) + 1.0 / (n1 - MIN_SUB_WINDOW + 1.0);
        let epsilon = (2.0 * m_recip * self.variance() * delta_prime).sqrt()
            + 2.0 / 3.0 * delta_prime * m_recip;

        mean_gap.abs() > epsilon
    }

    /// Scans for a significant split, shrinking the window while one exists.
    fn detect(&mut self) -> bool {
        if self.tick % CLOCK != 0 || self.width <= GRACE_PERIOD {
            return false;
        }

        let mut detected = false;
        let mut shrink = true;

        while shrink {
            shrink = false;

            let mut n0 = 0.0;
            let mut n1 = self.width as f64;
            let mut u0 = 0.0;
            let mut u1 = self.total;

            'scan: for row in (0..self.rows.len()).rev() {
                let n = Self::bucket_size(row);
                for bucket in &self.rows[row] {
                    n0 += n;
                    n1 -= n;
                    u0 += bucket.total;
                    u1 -= bucket.total;

                    if n1 < MIN_SUB_WINDOW {
                        break 'scan;
                    }

                    if n0 >= MIN_SUB_WINDOW && self.cut_is_significant(n0, n1, u0 / n0 - u1 / n1) {
                        detected = true;
                        shrink = true;
                        break 'scan;
                    }
                }
            }

            if shrink {
                self.delete_oldest();
            }
        }

        detected
    }
}

impl Default for Adwin {
    fn default() -> Self {
        Self::new(DEFAULT_DELTA)
    }
}

impl ChangeDetector for Adwin {
    fn observe(&mut self, value: f64) -> bool {
        self.tick += 1;
        self.insert(value);
        self.change = self.detect();

        if self.change {
            self.detections += 1;
            debug!(
                tick = self.tick,
                width = self.width,
                estimation = self.estimation(),
                "ADWIN flagged a change"
            );
        }
        self.change
    }

    fn change_detected(&self) -> bool {
        self.change
    }

    fn detections(&self) -> u64 {
        self.detections
    }

    fn name(&self) -> &str {
        "ADWIN"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Low-variance periodic signal around `level`.
    fn stable(level: f64, i: usize) -> f64 {
        level + (i % 10) as f64 * 0.001
    }

    #[test]
    fn test_no_change_on_stable_stream() {
        let mut adwin = Adwin::new(0.002);
        for i in 0..2000 {
            assert!(!adwin.observe(stable(0.08, i)), "false alarm at {i}");
        }
        assert_eq!(adwin.detections(), 0);
        assert_eq!(adwin.width(), 2000);
        assert!((adwin.estimation() - 0.0845).abs() < 1e-9);
    }

    #[test]
    fn test_detects_abrupt_shift_near_transition() {
        let mut adwin = Adwin::new(0.002);
        for i in 0..500 {
            adwin.observe(stable(0.1, i));
        }

        let mut first_flag = None;
        for i in 0..500 {
            if adwin.observe(stable(0.9, i)) && first_flag.is_none() {
                first_flag = Some(i);
            }
        }

        let first_flag = first_flag.expect("shift should be detected");
        assert!(first_flag < 100, "detected too late: {first_flag}");
        // The old regime has been dropped from the window.
        assert!(adwin.estimation() > 0.8);
        assert!(adwin.width() < 1000);
    }

    #[test]
    fn test_readapts_inside_sustained_shift() {
        let mut adwin = Adwin::new(0.002);
        for i in 0..400 {
            adwin.observe(stable(0.08, i));
        }
        for i in 0..800 {
            adwin.observe(stable(0.5, i));
        }
        assert!(adwin.detections() >= 1);

        // Deep inside the new regime there is nothing left to flag.
        let flagged = (0..400).filter(|&i| adwin.observe(stable(0.5, i))).count();
        assert_eq!(flagged, 0);
    }

    #[test]
    fn test_higher_confidence_flags_no_later() {
        // A modest shift: a permissive bound should flag no later than a strict one.
        let run = |delta: f64| {
            let mut adwin = Adwin::new(delta);
            for i in 0..300 {
                adwin.observe(stable(0.30, i));
            }
            (0..600).position(|i| adwin.observe(stable(0.45, i)))
        };

        let strict = run(0.0001);
        let permissive = run(0.1);
        assert!(permissive.is_some());
        if let (Some(s), Some(p)) = (strict, permissive) {
            assert!(p <= s);
        }
    }

    #[test]
    fn test_sensitivity_maps_inversely_onto_confidence() {
        let default = Adwin::from_sensitivity(DEFAULT_DELTA);
        assert!((default.confidence() - DEFAULT_DELTA).abs() < 1e-12);
        assert!(Adwin::from_sensitivity(0.0001).confidence() > DEFAULT_DELTA);
        assert!(Adwin::from_sensitivity(0.1).confidence() < DEFAULT_DELTA);
        assert_eq!(Adwin::from_sensitivity(1e-9).confidence(), 1.0);
    }

    #[test]
    fn test_lower_sensitivity_flags_more_changes() {
        // Mean alternates between 0.30 and 0.36 every 300 values.
        let count = |sensitivity: f64| {
            let mut adwin = Adwin::from_sensitivity(sensitivity);
            for i in 0..3000 {
                let level = if (i / 300) % 2 == 0 { 0.30 } else { 0.36 };
                let noise = ((i * 37) % 21) as f64 * 0.005 - 0.05;
                adwin.observe(level + noise);
            }
            adwin.detections()
        };

        let eager = count(0.00001);
        let reluctant = count(0.1);
        assert!(eager > 0);
        assert!(eager >= reluctant, "eager={eager} reluctant={reluctant}");
    }

    #[test]
    fn test_bucket_structure_stays_logarithmic() {
        let mut adwin = Adwin::new(0.002);
        for i in 0..10_000 {
            adwin.observe(stable(0.5, i));
        }
        assert!(adwin.rows.len() <= 14);
        assert!(adwin.rows.iter().all(|row| row.len() <= MAX_BUCKETS));

        let counted: u64 = adwin
            .rows
            .iter()
            .enumerate()
            .map(|(row, buckets)| buckets.len() as u64 * (1u64 << row))
            .sum();
        assert_eq!(counted, adwin.width());
    }

    #[test]
    fn test_change_flag_resets_on_next_value() {
        let mut adwin = Adwin::new(0.002);
        for i in 0..320 {
            adwin.observe(stable(0.0, i));
        }
        let mut flagged_at = None;
        for i in 0..320 {
            if adwin.observe(1.0) {
                flagged_at = Some(i);
                break;
            }
        }
        assert!(flagged_at.is_some());
        assert!(adwin.change_detected());
        adwin.observe(1.0);
        assert!(!adwin.change_detected());
    }
}
