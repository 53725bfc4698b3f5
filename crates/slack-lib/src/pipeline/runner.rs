//! Instrumented driver for the slack pipeline

use std::time::Instant;

use tracing::debug;

use super::{build_pipeline, Pipeline, Tick, TickOutput};
use crate::config::SlackConfig;
use crate::error::{ConfigError, PipelineError};
use crate::models::ResourceUsageReport;
use crate::observability::{PipelineMetrics, StructuredLogger};

/// Runs reports through a [`Pipeline<Tick>`], recording metrics and
/// structured events for every run
pub struct SlackPipeline {
    pipeline: Pipeline<Tick>,
    metrics: PipelineMetrics,
    logger: StructuredLogger,
}

impl SlackPipeline {
    pub fn new(pipeline: Pipeline<Tick>, logger: StructuredLogger) -> Self {
        Self {
            pipeline,
            metrics: PipelineMetrics::new(),
            logger,
        }
    }

    /// Build the configured pipeline
    pub fn from_config(config: &SlackConfig, logger: StructuredLogger) -> Result<Self, ConfigError> {
        Ok(Self::new(build_pipeline(config)?, logger))
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.pipeline.stage_names()
    }

    /// Run one report through every stage
    ///
    /// # Returns
    /// * `Ok(TickOutput)` with estimates, decisions, flags and any partial
    ///   failures
    /// * `Err(StageFailure)` if a stage could not process the report at all
    pub fn run_report(&mut self, report: ResourceUsageReport) -> Result<TickOutput, PipelineError> {
        let start = Instant::now();
        let executors = report.executors.len();
        let result = self.pipeline.run(Tick::from_report(report));
        self.metrics.observe_run(start.elapsed().as_secs_f64());

        let tick = match result {
            Ok(tick) => tick,
            Err(e) => {
                self.metrics.inc_stage_failure(e.stage_name());
                self.logger.log_stage_failure(&e);
                return Err(e);
            }
        };

        self.metrics.set_executors_tracked(executors as i64);
        self.metrics.record_flags(&tick.flags);
        self.metrics.set_estimates(tick.estimates());
        self.metrics.record_decisions(&tick.decisions);

        for failure in &tick.failures {
            self.metrics.inc_partial_failure(&failure.stage);
            self.logger.log_partial_failure(failure);
        }
        for flag in &tick.flags {
            self.logger.log_contention(flag);
        }
        self.logger.log_estimates(tick.timestamp(), tick.estimates());
        for decision in &tick.decisions {
            self.logger.log_decision(decision);
        }

        if !tick.departed.is_empty() {
            debug!(departed = ?tick.departed, "Executors left the host");
        }

        Ok(TickOutput::from(tick))
    }
}

impl std::fmt::Debug for SlackPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackPipeline")
            .field("pipeline", &self.pipeline)
            .field("node", &self.logger.node_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageError;
    use crate::models::{ExecutorSnapshot, QosDecision, ResourceKind};

    fn pipeline() -> SlackPipeline {
        SlackPipeline::from_config(&SlackConfig::default(), StructuredLogger::new("test-node"))
            .unwrap()
    }

    fn report(ts: f64, usage: f64) -> ResourceUsageReport {
        ResourceUsageReport::new(ts)
            .with_capacity(ResourceKind::Cpu, 10.0)
            .with_executor(
                ExecutorSnapshot::new("e1")
                    .with_allocated(ResourceKind::Cpu, 4.0)
                    .with_usage(ResourceKind::Cpu, usage),
            )
    }

    #[test]
    fn test_run_report_produces_estimate() {
        let mut pipeline = pipeline();
        let first = pipeline.run_report(report(1.0, 1.0)).unwrap();
        assert!(first.estimates.is_empty());
        assert_eq!(first.decisions, vec![QosDecision::Continue]);

        let second = pipeline.run_report(report(2.0, 1.5)).unwrap();
        assert_eq!(second.timestamp, 2.0);
        assert_eq!(second.estimates.len(), 1);
        assert_eq!(second.estimates[0].value, 2.5);
        assert!(second.failures.is_empty());
    }

    #[test]
    fn test_run_report_propagates_stage_failure() {
        let mut pipeline = pipeline();
        let duplicated = report(1.0, 1.0).with_executor(ExecutorSnapshot::new("e1"));
        let err = pipeline.run_report(duplicated).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::StageFailure {
                source: StageError::Estimator(_),
                ..
            }
        ));

        // A failed run leaves the pipeline usable
        assert!(pipeline.run_report(report(2.0, 1.0)).is_ok());
    }
}
