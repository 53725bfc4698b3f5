//! Slack estimation pipeline
//!
//! This crate provides the core functionality for:
//! - Smoothing per-executor usage samples
//! - Detecting contention from smoothed usage
//! - Estimating revocable slack bounded by host capacity
//! - QoS decisions for contended executors
//! - Composing the above into a configurable pipeline
//! - Health checks and observability

pub mod config;
pub mod contention;
pub mod error;
pub mod estimator;
pub mod filter;
pub mod health;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod qos;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::{ContentionConfig, SlackConfig};
pub use error::{
    ConfigError, DetectorError, EstimatorError, FilterError, PartialFailure, PipelineError,
    StageError,
};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{PipelineMetrics, StructuredLogger};
pub use pipeline::{build_pipeline, Pipeline, SlackPipeline, Stage, StageKind, Tick, TickOutput};
