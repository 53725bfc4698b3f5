//! Contention detection on smoothed usage series
//!
//! Compares every smoothed value against a short per-key baseline. A
//! deviation above the mild threshold is flagged `Mild`; a deviation above
//! the severe threshold is only flagged `Severe` once it has persisted for
//! `sustained_count` consecutive values, so a single transient spike never
//! escalates.
//!
//! Deviating values stay out of the baseline until the deviation has lasted
//! longer than `baseline_window` values. From then on they are folded in, so
//! a lasting level change becomes the new normal and its flags clear.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::Baseline;
use crate::config::ContentionConfig;
use crate::error::DetectorError;
use crate::models::{ContentionFlag, ContentionSeverity, SampleKey, SmoothedValue};

/// Per-key detection state
#[derive(Debug, Clone)]
struct KeyState {
    baseline: Baseline,
    latest_timestamp: f64,
    /// Consecutive values above the severe threshold
    severe_streak: usize,
    /// Consecutive values above the mild threshold
    deviating_streak: usize,
    /// Start of the current run of above-mild values
    deviating_since: Option<f64>,
}

/// Flags executors whose smoothed usage deviates from their recent baseline
#[derive(Debug, Clone)]
pub struct ContentionDetector {
    config: ContentionConfig,
    states: HashMap<SampleKey, KeyState>,
}

impl ContentionDetector {
    pub fn new(config: ContentionConfig) -> Self {
        Self {
            config,
            states: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ContentionConfig {
        &self.config
    }

    /// Evaluate one smoothed value
    ///
    /// # Returns
    /// * `Ok(Some(flag))` when the value deviates beyond the mild threshold
    /// * `Ok(None)` when it is within threshold (the common case) or seeds a
    ///   new key's baseline
    /// * `Err(..)` for non-finite or out-of-order values; state is unchanged
    pub fn consume(
        &mut self,
        smoothed: &SmoothedValue,
    ) -> Result<Option<ContentionFlag>, DetectorError> {
        if !smoothed.value.is_finite() || !smoothed.timestamp.is_finite() {
            return Err(DetectorError::NonFiniteValue {
                key: smoothed.key.clone(),
            });
        }

        let Some(state) = self.states.get_mut(&smoothed.key) else {
            let mut baseline = Baseline::new(self.config.baseline_window);
            baseline.push(smoothed.value);
            self.states.insert(
                smoothed.key.clone(),
                KeyState {
                    baseline,
                    latest_timestamp: smoothed.timestamp,
                    severe_streak: 0,
                    deviating_streak: 0,
                    deviating_since: None,
                },
            );
            return Ok(None);
        };

        if smoothed.timestamp < state.latest_timestamp {
            return Err(DetectorError::OutOfOrderValue {
                key: smoothed.key.clone(),
                timestamp: smoothed.timestamp,
                latest: state.latest_timestamp,
            });
        }
        state.latest_timestamp = smoothed.timestamp;

        let deviation = state
            .baseline
            .deviation(smoothed.value, self.config.min_baseline)
            .unwrap_or(0.0);

        if deviation > self.config.severe_threshold {
            state.severe_streak += 1;
        } else {
            state.severe_streak = 0;
        }

        let severity = if state.severe_streak >= self.config.sustained_count {
            ContentionSeverity::Severe
        } else if deviation > self.config.mild_threshold {
            ContentionSeverity::Mild
        } else {
            ContentionSeverity::None
        };

        if severity == ContentionSeverity::None {
            state.baseline.push(smoothed.value);
            state.deviating_streak = 0;
            state.deviating_since = None;
            return Ok(None);
        }

        state.deviating_streak += 1;
        if state.deviating_streak > self.config.baseline_window {
            state.baseline.push(smoothed.value);
        }

        let window_start = *state.deviating_since.get_or_insert(smoothed.timestamp);

        debug!(
            key = %smoothed.key,
            value = smoothed.value,
            deviation = deviation,
            severity = %severity,
            streak = state.severe_streak,
            "Contention detected"
        );

        Ok(Some(ContentionFlag {
            executor_id: smoothed.key.executor_id.clone(),
            metric_kind: smoothed.key.kind,
            severity,
            window_start,
            window_end: smoothed.timestamp,
        }))
    }

    /// Current baseline mean for a key
    pub fn baseline(&self, key: &SampleKey) -> Option<f64> {
        self.states.get(key).and_then(|s| s.baseline.mean())
    }

    pub fn tracked_keys(&self) -> usize {
        self.states.len()
    }

    pub fn forget_executor(&mut self, executor_id: &str) {
        self.states.retain(|key, _| key.executor_id != executor_id);
    }

    /// Keep only baselines of the listed executors
    pub fn retain_executors<'a, I>(&mut self, executor_ids: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let keep: HashSet<&str> = executor_ids.into_iter().collect();
        self.states
            .retain(|key, _| keep.contains(key.executor_id.as_str()));
    }

    /// Drop all baselines; detection restarts from scratch
    pub fn reset(&mut self) {
        self.states.clear();
    }
}

impl Default for ContentionDetector {
    fn default() -> Self {
        Self::new(ContentionConfig::default())
    }
}
