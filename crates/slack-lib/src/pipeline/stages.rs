//! Stage adapters wrapping each pipeline component
//!
//! Per-key and per-kind errors are recorded on the tick as partial failures
//! and the stage carries on. Only an error that leaves a stage unable to
//! produce any output is returned, which aborts the run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Pipeline, Stage, Tick};
use crate::config::SlackConfig;
use crate::contention::ContentionDetector;
use crate::error::{ConfigError, PartialFailure, StageError};
use crate::estimator::SlackEstimator;
use crate::filter::MovingAverageFilter;
use crate::models::SmoothedValue;
use crate::qos::QosController;

/// Stages that can be named in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    MovingAverage,
    Contention,
    SlackEstimator,
    Qos,
}

impl StageKind {
    /// All stages in data-flow order
    pub const ALL: [StageKind; 4] = [
        StageKind::MovingAverage,
        StageKind::Contention,
        StageKind::SlackEstimator,
        StageKind::Qos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::MovingAverage => "moving_average",
            StageKind::Contention => "contention",
            StageKind::SlackEstimator => "slack_estimator",
            StageKind::Qos => "qos",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StageKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| ConfigError::UnknownStage(s.to_string()))
    }
}

/// Assemble the slack pipeline in the configured stage order
pub fn build_pipeline(config: &SlackConfig) -> Result<Pipeline<Tick>, ConfigError> {
    config.validate()?;

    let mut pipeline = Pipeline::new();
    for kind in &config.stages {
        let stage: Box<dyn Stage<Tick>> = match kind {
            StageKind::MovingAverage => Box::new(MovingAverageStage::new(
                MovingAverageFilter::new(config.window_size),
            )),
            StageKind::Contention => Box::new(ContentionStage::new(ContentionDetector::new(
                config.contention.clone(),
            ))),
            StageKind::SlackEstimator => {
                Box::new(SlackEstimatorStage::new(SlackEstimator::from_config(config)))
            }
            StageKind::Qos => Box::new(QosStage::new(QosController::new())),
        };
        pipeline.push(stage);
    }

    debug!(stages = ?pipeline.stage_names(), "Pipeline assembled");
    Ok(pipeline)
}

fn record_failure(tick: &mut Tick, stage: StageKind, error: impl Into<StageError>) {
    let failure = PartialFailure::new(stage.as_str(), error);
    warn!(stage = %stage, error = %failure.message, "Partial failure");
    tick.failures.push(failure);
}

/// Smooths every sample of the tick
#[derive(Debug, Default)]
pub struct MovingAverageStage {
    filter: MovingAverageFilter,
}

impl MovingAverageStage {
    pub fn new(filter: MovingAverageFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &MovingAverageFilter {
        &self.filter
    }
}

impl Stage<Tick> for MovingAverageStage {
    fn name(&self) -> &str {
        StageKind::MovingAverage.as_str()
    }

    fn consume(&mut self, mut tick: Tick) -> Result<Tick, StageError> {
        // Windows of executors missing from this report are dropped
        self.filter.retain_executors(tick.executor_ids());

        let mut smoothed = Vec::with_capacity(tick.samples.len());
        let mut failures = Vec::new();
        for sample in &tick.samples {
            match self.filter.consume(sample) {
                Ok(value) => smoothed.push(value),
                Err(e) => failures.push(e),
            }
        }

        tick.smoothed = Some(smoothed);
        for error in failures {
            record_failure(&mut tick, StageKind::MovingAverage, error);
        }
        Ok(tick)
    }
}

/// Raises contention flags from smoothed values
///
/// Without an upstream moving average stage the raw samples are evaluated
/// directly.
#[derive(Debug, Default)]
pub struct ContentionStage {
    detector: ContentionDetector,
}

impl ContentionStage {
    pub fn new(detector: ContentionDetector) -> Self {
        Self { detector }
    }

    pub fn detector(&self) -> &ContentionDetector {
        &self.detector
    }
}

impl Stage<Tick> for ContentionStage {
    fn name(&self) -> &str {
        StageKind::Contention.as_str()
    }

    fn consume(&mut self, mut tick: Tick) -> Result<Tick, StageError> {
        self.detector.retain_executors(tick.executor_ids());

        let values: Vec<SmoothedValue> = match &tick.smoothed {
            Some(smoothed) => smoothed.clone(),
            None => tick
                .samples
                .iter()
                .map(|s| SmoothedValue {
                    key: s.key(),
                    value: s.value,
                    timestamp: s.timestamp,
                })
                .collect(),
        };

        let mut failures = Vec::new();
        for value in &values {
            match self.detector.consume(value) {
                Ok(Some(flag)) => tick.flags.push(flag),
                Ok(None) => {}
                Err(e) => failures.push(e),
            }
        }

        for error in failures {
            record_failure(&mut tick, StageKind::Contention, error);
        }
        Ok(tick)
    }
}

/// Estimates slack from the tick's report and contention flags
#[derive(Debug, Default)]
pub struct SlackEstimatorStage {
    estimator: SlackEstimator,
}

impl SlackEstimatorStage {
    pub fn new(estimator: SlackEstimator) -> Self {
        Self { estimator }
    }

    pub fn estimator(&self) -> &SlackEstimator {
        &self.estimator
    }
}

impl Stage<Tick> for SlackEstimatorStage {
    fn name(&self) -> &str {
        StageKind::SlackEstimator.as_str()
    }

    fn consume(&mut self, mut tick: Tick) -> Result<Tick, StageError> {
        let departed = self.estimator.departed(&tick.report);
        let mut outcome = self.estimator.consume(&tick.report, &tick.flags)?;

        for error in std::mem::take(&mut outcome.failures) {
            record_failure(&mut tick, StageKind::SlackEstimator, error);
        }
        tick.outcome = outcome;
        tick.departed = departed;
        Ok(tick)
    }
}

/// Chooses QoS decisions from the tick's estimates and flags
#[derive(Debug, Default)]
pub struct QosStage {
    controller: QosController,
}

impl QosStage {
    pub fn new(controller: QosController) -> Self {
        Self { controller }
    }
}

impl Stage<Tick> for QosStage {
    fn name(&self) -> &str {
        StageKind::Qos.as_str()
    }

    fn consume(&mut self, mut tick: Tick) -> Result<Tick, StageError> {
        tick.decisions = self.controller.decide_all(tick.estimates(), &tick.flags);
        Ok(tick)
    }
}
