use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Number of timing offsets kept for display by default.
pub const DEFAULT_CAPACITY: usize = 80;

/// Aggregate view over the recorded offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracySummary {
    pub count: usize,
    pub mean_ms: f64,
    pub mean_abs_ms: f64,
    pub min_ms: Option<i32>,
    pub max_ms: Option<i32>,
}

/// Rolling buffer of signed timing offsets in milliseconds (positive = late).
/// The oldest sample is evicted once the buffer is full.
#[derive(Debug, Clone)]
pub struct AccuracyRecorder {
    samples: VecDeque<i32>,
    capacity: usize,
}

impl AccuracyRecorder {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn record(&mut self, offset_ms: i32) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(offset_ms);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Oldest first.
    pub fn samples(&self) -> impl Iterator<Item = i32> + '_ {
        self.samples.iter().copied()
    }

    pub fn summary(&self) -> AccuracySummary {
        if self.samples.is_empty() {
            return AccuracySummary::default();
        }

        let count = self.samples.len();
        let sum: i64 = self.samples().map(i64::from).sum();
        let abs_sum: i64 = self.samples().map(|s| i64::from(s).abs()).sum();
        AccuracySummary {
            count,
            mean_ms: sum as f64 / count as f64,
            mean_abs_ms: abs_sum as f64 / count as f64,
            min_ms: self.samples().min(),
            max_ms: self.samples().max(),
        }
    }
}

impl Default for AccuracyRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_on_overflow() {
        let mut recorder = AccuracyRecorder::new(3);
        for offset in [10, -20, 30, -40] {
            recorder.record(offset);
        }
        assert_eq!(recorder.len(), 3);
        assert_eq!(recorder.samples().collect::<Vec<_>>(), vec![-20, 30, -40]);
    }

    #[test]
    fn summarises_offsets() {
        let mut recorder = AccuracyRecorder::default();
        assert_eq!(recorder.summary(), AccuracySummary::default());

        for offset in [-30, 10, 50] {
            recorder.record(offset);
        }
        let summary = recorder.summary();
        assert_eq!(summary.count, 3);
        assert!((summary.mean_ms - 10.0).abs() < 1e-9);
        assert!((summary.mean_abs_ms - 30.0).abs() < 1e-9);
        assert_eq!(summary.min_ms, Some(-30));
        assert_eq!(summary.max_ms, Some(50));

        recorder.clear();
        assert!(recorder.is_empty());
    }

    #[test]
    fn zero_capacity_keeps_one_sample() {
        let mut recorder = AccuracyRecorder::new(0);
        recorder.record(1);
        recorder.record(2);
        assert_eq!(recorder.samples().collect::<Vec<_>>(), vec![2]);
    }
}
