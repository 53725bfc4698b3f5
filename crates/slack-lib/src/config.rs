//! Pipeline configuration
//!
//! Every field has a default so a partially specified source (file or
//! environment) still yields a usable configuration. `validate` rejects
//! values the stages cannot operate with.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ConfigError;
use crate::pipeline::StageKind;

/// Default moving average window (samples)
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// Report up to this fraction of host capacity as slack
pub const DEFAULT_MAX_OVERSUBSCRIPTION_FRACTION: f64 = 0.8;

/// Don't report slack below this value
pub const SLACK_EPSILON: f64 = 0.001;

/// Role used when no override is configured
pub const DEFAULT_ROLE: &str = "*";

/// Environment variable consulted for the default role
pub const DEFAULT_ROLE_ENV: &str = "MESOS_DEFAULT_ROLE";

/// Thresholds for the contention detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentionConfig {
    /// Relative deviation above which a value is flagged mild
    pub mild_threshold: f64,
    /// Relative deviation above which a value counts toward severe
    pub severe_threshold: f64,
    /// Consecutive severe-level values required before flagging severe
    pub sustained_count: usize,
    /// Number of in-threshold values kept as the baseline
    pub baseline_window: usize,
    /// Floor for the baseline magnitude when computing relative deviation
    pub min_baseline: f64,
}

impl Default for ContentionConfig {
    fn default() -> Self {
        Self {
            mild_threshold: 0.25,
            severe_threshold: 0.5,
            sustained_count: 2,
            baseline_window: 5,
            min_baseline: 0.01,
        }
    }
}

/// Configuration for the whole slack pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Samples per moving average window
    pub window_size: usize,
    pub max_oversubscription_fraction: f64,
    pub slack_epsilon: f64,
    pub contention: ContentionConfig,
    /// Role attached to emitted estimates; `"*"` when unset
    pub default_role: Option<String>,
    /// Stages in execution order
    pub stages: Vec<StageKind>,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            max_oversubscription_fraction: DEFAULT_MAX_OVERSUBSCRIPTION_FRACTION,
            slack_epsilon: SLACK_EPSILON,
            contention: ContentionConfig::default(),
            default_role: None,
            stages: StageKind::ALL.to_vec(),
        }
    }
}

impl SlackConfig {
    /// Role attached to estimates
    pub fn role(&self) -> String {
        resolve_default_role(self.default_role.as_deref())
    }

    /// Check that every value is usable by the stages
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(invalid("window_size", "must be at least 1"));
        }

        let fraction = self.max_oversubscription_fraction;
        if !fraction.is_finite() || fraction <= 0.0 || fraction > 1.0 {
            return Err(invalid(
                "max_oversubscription_fraction",
                format!("{} is outside (0, 1]", fraction),
            ));
        }

        if !self.slack_epsilon.is_finite() || self.slack_epsilon < 0.0 {
            return Err(invalid("slack_epsilon", "must be a non-negative number"));
        }

        self.contention.validate()?;

        let mut seen = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(*stage) {
                return Err(ConfigError::DuplicateStage(stage.to_string()));
            }
        }

        Ok(())
    }
}

impl ContentionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.mild_threshold.is_finite() || self.mild_threshold < 0.0 {
            return Err(invalid("contention.mild_threshold", "must be a non-negative number"));
        }
        if !self.severe_threshold.is_finite() || self.severe_threshold < self.mild_threshold {
            return Err(invalid(
                "contention.severe_threshold",
                "must be at least the mild threshold",
            ));
        }
        if self.sustained_count == 0 {
            return Err(invalid("contention.sustained_count", "must be at least 1"));
        }
        if self.baseline_window == 0 {
            return Err(invalid("contention.baseline_window", "must be at least 1"));
        }
        if !self.min_baseline.is_finite() || self.min_baseline <= 0.0 {
            return Err(invalid("contention.min_baseline", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

/// Pick the override when it is set and non-empty, otherwise `"*"`
pub fn resolve_default_role(override_role: Option<&str>) -> String {
    match override_role.map(str::trim) {
        Some(role) if !role.is_empty() => role.to_string(),
        _ => DEFAULT_ROLE.to_string(),
    }
}

/// Resolve the default role through an environment-style lookup
///
/// The lookup is supplied by the caller so the core never reads the
/// process environment itself.
pub fn default_role_from_env<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    resolve_default_role(lookup(DEFAULT_ROLE_ENV).as_deref())
}
