//! Error taxonomy for the pipeline stages

use serde::Serialize;
use thiserror::Error;

use crate::models::{ResourceKind, SampleKey};

/// Errors raised by the moving average filter for a single key
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("out-of-order sample for {key}: timestamp {timestamp} is older than {latest}")]
    OutOfOrderSample {
        key: SampleKey,
        timestamp: f64,
        latest: f64,
    },

    #[error("non-finite sample value for {key}")]
    NonFiniteValue { key: SampleKey },
}

/// Errors raised by the contention detector for a single key
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectorError {
    #[error("out-of-order smoothed value for {key}: timestamp {timestamp} is older than {latest}")]
    OutOfOrderValue {
        key: SampleKey,
        timestamp: f64,
        latest: f64,
    },

    #[error("non-finite smoothed value for {key}")]
    NonFiniteValue { key: SampleKey },
}

/// Errors raised by the slack estimator
///
/// `MissingCapacity` and `UnknownExecutor` are scoped to one resource kind or
/// executor and surface as partial failures; `DuplicateExecutor` rejects the
/// whole report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EstimatorError {
    #[error("host capacity unknown for resource {kind}")]
    MissingCapacity { kind: ResourceKind },

    #[error("contention flag references executor {executor_id} which is not in the report")]
    UnknownExecutor { executor_id: String },

    #[error("executor {executor_id} appears more than once in the report")]
    DuplicateExecutor { executor_id: String },
}

/// Invalid pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("unknown pipeline stage: {0}")]
    UnknownStage(String),

    #[error("pipeline stage listed more than once: {0}")]
    DuplicateStage(String),
}

/// Error returned by a pipeline stage that cannot proceed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Detector(#[from] DetectorError),

    #[error(transparent)]
    Estimator(#[from] EstimatorError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("stage misconfigured: {0}")]
    Misconfigured(String),
}

/// Fatal failure of one pipeline run
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("pipeline stage {index} ({name}) failed: {source}")]
    StageFailure {
        index: usize,
        name: String,
        #[source]
        source: StageError,
    },
}

impl PipelineError {
    pub fn stage_index(&self) -> usize {
        match self {
            PipelineError::StageFailure { index, .. } => *index,
        }
    }

    pub fn stage_name(&self) -> &str {
        match self {
            PipelineError::StageFailure { name, .. } => name,
        }
    }
}

/// A scoped error that suppressed one key's or one kind's output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialFailure {
    pub stage: String,
    pub message: String,
    #[serde(skip)]
    pub error: StageError,
}

impl PartialFailure {
    pub fn new(stage: impl Into<String>, error: impl Into<StageError>) -> Self {
        let error = error.into();
        Self {
            stage: stage.into(),
            message: error.to_string(),
            error,
        }
    }
}
