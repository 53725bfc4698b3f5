//! Bounded, time-ordered sample window for one key

use std::collections::VecDeque;

use crate::models::SampleKey;

/// Sliding window of `(timestamp, value)` pairs for a single key
///
/// The mean is maintained incrementally (`mean += delta / n`) so a window
/// filled with identical values reports that value exactly. The mean is
/// re-derived from the retained samples once every `capacity` evictions to
/// bound accumulated rounding error.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    key: SampleKey,
    capacity: usize,
    samples: VecDeque<(f64, f64)>,
    mean: f64,
    evictions_since_recompute: usize,
}

impl SampleWindow {
    pub fn new(key: SampleKey, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            key,
            capacity,
            samples: VecDeque::with_capacity(capacity),
            mean: 0.0,
            evictions_since_recompute: 0,
        }
    }

    pub fn key(&self) -> &SampleKey {
        &self.key
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Timestamp of the most recent sample
    pub fn latest_timestamp(&self) -> Option<f64> {
        self.samples.back().map(|(ts, _)| *ts)
    }

    /// Arithmetic mean of the retained samples
    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            None
        } else {
            Some(self.mean)
        }
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|(_, v)| *v)
    }

    /// Insert a sample, evicting the oldest when full. Ordering is the
    /// caller's responsibility.
    pub fn push(&mut self, timestamp: f64, value: f64) {
        if self.samples.len() == self.capacity {
            if let Some((_, evicted)) = self.samples.pop_front() {
                self.samples.push_back((timestamp, value));
                // Same count: shift the mean by the replaced value
                self.mean += (value - evicted) / self.capacity as f64;
                self.evictions_since_recompute += 1;
                if self.evictions_since_recompute >= self.capacity {
                    self.recompute();
                }
                return;
            }
        }

        self.samples.push_back((timestamp, value));
        self.mean += (value - self.mean) / self.samples.len() as f64;
    }

    fn recompute(&mut self) {
        let mut mean = 0.0;
        for (i, (_, v)) in self.samples.iter().enumerate() {
            mean += (v - mean) / (i + 1) as f64;
        }
        self.mean = mean;
        self.evictions_since_recompute = 0;
    }
}
