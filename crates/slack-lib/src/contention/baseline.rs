//! Short rolling baseline for one smoothed series

use std::collections::VecDeque;

/// Rolling mean over the last `capacity` accepted values
#[derive(Debug, Clone)]
pub struct Baseline {
    values: VecDeque<f64>,
    capacity: usize,
}

impl Baseline {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Mean of the retained values, `None` until the first push
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let mut mean = 0.0;
        for (i, v) in self.values.iter().enumerate() {
            mean += (v - mean) / (i + 1) as f64;
        }
        Some(mean)
    }

    /// Relative deviation of `value` from the baseline mean
    ///
    /// The baseline magnitude is floored at `min_baseline` so near-zero
    /// baselines do not turn tiny absolute changes into huge ratios.
    pub fn deviation(&self, value: f64, min_baseline: f64) -> Option<f64> {
        self.mean()
            .map(|mean| (value - mean).abs() / mean.abs().max(min_baseline))
    }
}
