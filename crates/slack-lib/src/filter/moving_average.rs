//! Moving average smoothing
//!
//! Keeps one bounded window per (resource kind, executor) key and emits the
//! arithmetic mean of that window for every accepted sample.

use std::collections::HashMap;

use tracing::debug;

use super::SampleWindow;
use crate::config::DEFAULT_WINDOW_SIZE;
use crate::error::FilterError;
use crate::models::{SampleKey, SmoothedValue, UsageSample};

/// Per-key moving average filter
#[derive(Debug, Clone)]
pub struct MovingAverageFilter {
    window_size: usize,
    windows: HashMap<SampleKey, SampleWindow>,
}

impl MovingAverageFilter {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(1),
            windows: HashMap::new(),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Smooth one sample
    ///
    /// # Returns
    /// * `Ok(SmoothedValue)` with the window mean and the sample's timestamp
    /// * `Err(OutOfOrderSample)` if the sample is older than the latest one
    ///   already in its window; the window is left unchanged
    pub fn consume(&mut self, sample: &UsageSample) -> Result<SmoothedValue, FilterError> {
        let key = sample.key();

        if !sample.value.is_finite() || !sample.timestamp.is_finite() {
            return Err(FilterError::NonFiniteValue { key });
        }

        if let Some(latest) = self.windows.get(&key).and_then(|w| w.latest_timestamp()) {
            if sample.timestamp < latest {
                debug!(
                    key = %key,
                    timestamp = sample.timestamp,
                    latest = latest,
                    "Rejecting out-of-order sample"
                );
                return Err(FilterError::OutOfOrderSample {
                    key,
                    timestamp: sample.timestamp,
                    latest,
                });
            }
        }

        let window_size = self.window_size;
        let window = self
            .windows
            .entry(key.clone())
            .or_insert_with(|| SampleWindow::new(key.clone(), window_size));
        window.push(sample.timestamp, sample.value);

        Ok(SmoothedValue {
            value: window.mean().unwrap_or(sample.value),
            timestamp: sample.timestamp,
            key,
        })
    }

    pub fn window(&self, key: &SampleKey) -> Option<&SampleWindow> {
        self.windows.get(key)
    }

    /// Number of tracked keys
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Drop every window belonging to an executor
    pub fn forget_executor(&mut self, executor_id: &str) {
        self.windows.retain(|key, _| key.executor_id != executor_id);
    }

    /// Keep only windows of the listed executors
    pub fn retain_executors<'a, I>(&mut self, executor_ids: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let keep: std::collections::HashSet<&str> = executor_ids.into_iter().collect();
        self.windows
            .retain(|key, _| keep.contains(key.executor_id.as_str()));
    }

    pub fn reset(&mut self) {
        self.windows.clear();
    }
}

impl Default for MovingAverageFilter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceKind;
    use crate::testing::{LoadGenerator, SymmetricNoise, ZeroNoise};
    use proptest::prelude::*;

    fn cpu(executor: &str, value: f64, ts: f64) -> UsageSample {
        UsageSample::new(ResourceKind::Cpu, executor, value, ts)
    }

    #[test]
    fn test_first_sample_is_its_own_mean() {
        let mut filter = MovingAverageFilter::new(5);
        let smoothed = filter.consume(&cpu("e1", 3.25, 1.0)).unwrap();
        assert_eq!(smoothed.value, 3.25);
        assert_eq!(smoothed.timestamp, 1.0);
        assert_eq!(smoothed.key, SampleKey::new(ResourceKind::Cpu, "e1"));
    }

    #[test]
    fn test_mean_over_sliding_window() {
        let mut filter = MovingAverageFilter::new(3);
        let outputs: Vec<f64> = [1.0, 2.0, 3.0, 4.0, 5.0]
            .iter()
            .enumerate()
            .map(|(i, v)| filter.consume(&cpu("e1", *v, i as f64)).unwrap().value)
            .collect();
        assert_eq!(outputs, vec![1.0, 1.5, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_out_of_order_rejected_and_window_unchanged() {
        let mut filter = MovingAverageFilter::new(4);
        filter.consume(&cpu("e1", 1.0, 10.0)).unwrap();
        filter.consume(&cpu("e1", 2.0, 11.0)).unwrap();

        let err = filter.consume(&cpu("e1", 100.0, 9.0)).unwrap_err();
        assert!(matches!(err, FilterError::OutOfOrderSample { latest, .. } if latest == 11.0));

        let key = SampleKey::new(ResourceKind::Cpu, "e1");
        let window = filter.window(&key).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window.mean(), Some(1.5));
    }

    #[test]
    fn test_equal_timestamp_accepted() {
        let mut filter = MovingAverageFilter::new(4);
        filter.consume(&cpu("e1", 1.0, 10.0)).unwrap();
        assert!(filter.consume(&cpu("e1", 3.0, 10.0)).is_ok());
    }

    #[test]
    fn test_keys_are_isolated() {
        let mut filter = MovingAverageFilter::new(4);
        filter.consume(&cpu("e1", 1.0, 10.0)).unwrap();
        // Older timestamp for a different key is fine
        let other = filter.consume(&cpu("e2", 8.0, 5.0)).unwrap();
        assert_eq!(other.value, 8.0);

        let mem = UsageSample::new(ResourceKind::Memory, "e1", 64.0, 1.0);
        assert_eq!(filter.consume(&mem).unwrap().value, 64.0);
        assert_eq!(filter.tracked_keys(), 3);
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut filter = MovingAverageFilter::new(4);
        let err = filter.consume(&cpu("e1", f64::NAN, 1.0)).unwrap_err();
        assert!(matches!(err, FilterError::NonFiniteValue { .. }));
        assert_eq!(filter.tracked_keys(), 0);
    }

    #[test]
    fn test_forget_and_retain_executors() {
        let mut filter = MovingAverageFilter::new(4);
        for id in ["e1", "e2", "e3"] {
            filter.consume(&cpu(id, 1.0, 1.0)).unwrap();
        }
        filter.forget_executor("e1");
        assert_eq!(filter.tracked_keys(), 2);

        filter.retain_executors(["e3"]);
        assert_eq!(filter.tracked_keys(), 1);
        assert!(filter.window(&SampleKey::new(ResourceKind::Cpu, "e3")).is_some());
    }

    #[test]
    fn test_symmetric_noise_is_smoothed_out() {
        // Symmetric noise averages to zero, so a full window tracks the
        // clean signal far more closely than raw samples do.
        let mut filter = MovingAverageFilter::new(8);
        let mut generator = LoadGenerator::new(|_: f64| 4.0, SymmetricNoise::new(1.0), 200);
        let mut worst_raw: f64 = 0.0;
        let mut worst_smoothed: f64 = 0.0;

        while let Some(sample) = generator.next_sample() {
            let smoothed = filter.consume(&cpu("e1", sample.noisy(), sample.timestamp)).unwrap();
            if generator.iteration() > 16 {
                worst_raw = worst_raw.max((sample.noisy() - sample.value).abs());
                worst_smoothed = worst_smoothed.max((smoothed.value - sample.value).abs());
            }
        }

        assert!(worst_smoothed < worst_raw);
    }

    #[test]
    fn test_tracks_clean_ramp() {
        let mut filter = MovingAverageFilter::new(1);
        let mut generator = LoadGenerator::new(|i: f64| i * 0.5, ZeroNoise, 20);
        while let Some(sample) = generator.next_sample() {
            let smoothed = filter.consume(&cpu("e1", sample.noisy(), sample.timestamp)).unwrap();
            assert_eq!(smoothed.value, sample.value);
        }
    }

    proptest! {
        #[test]
        fn prop_identical_values_average_exactly(value in -1.0e9f64..1.0e9, window in 1usize..64, extra in 0usize..64) {
            let mut filter = MovingAverageFilter::new(window);
            let mut last = None;
            for i in 0..(window + extra) {
                last = Some(filter.consume(&cpu("e1", value, i as f64)).unwrap().value);
            }
            prop_assert_eq!(last, Some(value));
        }

        #[test]
        fn prop_decreasing_timestamp_rejected(values in proptest::collection::vec(0.0f64..100.0, 1..20), back in 0.001f64..50.0) {
            let mut filter = MovingAverageFilter::new(5);
            for (i, v) in values.iter().enumerate() {
                filter.consume(&cpu("e1", *v, i as f64)).unwrap();
            }
            let key = SampleKey::new(ResourceKind::Cpu, "e1");
            let before: Vec<f64> = filter.window(&key).unwrap().values().collect();
            let latest = (values.len() - 1) as f64;

            let result = filter.consume(&cpu("e1", 1.0, latest - back));
            let is_out_of_order = matches!(result, Err(FilterError::OutOfOrderSample { .. }));
            prop_assert!(is_out_of_order);
            let after: Vec<f64> = filter.window(&key).unwrap().values().collect();
            prop_assert_eq!(before, after);
        }
    }
}
