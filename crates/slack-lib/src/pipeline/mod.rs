//! Pipeline composition
//!
//! Stages share one input/output type so they can be chained in any order
//! and an empty pipeline is the identity. The slack pipeline threads a
//! [`Tick`] through the filter, detector, estimator and QoS stages.

mod runner;
mod stages;
mod tick;

pub use runner::SlackPipeline;
pub use stages::{
    build_pipeline, ContentionStage, MovingAverageStage, QosStage, SlackEstimatorStage, StageKind,
};
pub use tick::{Tick, TickOutput};

use std::fmt;

use crate::error::{PipelineError, StageError};

/// One step of a pipeline
///
/// A stage owns its state and is driven synchronously by the pipeline.
pub trait Stage<T>: Send {
    /// Name used in logs, metrics and failures
    fn name(&self) -> &str;

    /// Transform the value, or fail the whole run
    fn consume(&mut self, input: T) -> Result<T, StageError>;
}

/// Ordered chain of stages
pub struct Pipeline<T> {
    stages: Vec<Box<dyn Stage<T>>>,
}

impl<T> Pipeline<T> {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a stage to the end of the chain
    pub fn push(&mut self, stage: Box<dyn Stage<T>>) {
        self.stages.push(stage);
    }

    pub fn with_stage<S>(mut self, stage: S) -> Self
    where
        S: Stage<T> + 'static,
    {
        self.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Thread a value through every stage in order
    ///
    /// # Returns
    /// * `Ok(value)` after the last stage; the input itself when empty
    /// * `Err(StageFailure)` naming the first stage that failed; later
    ///   stages do not run
    pub fn run(&mut self, input: T) -> Result<T, PipelineError> {
        let mut value = input;
        for (index, stage) in self.stages.iter_mut().enumerate() {
            value = stage
                .consume(value)
                .map_err(|source| PipelineError::StageFailure {
                    index,
                    name: stage.name().to_string(),
                    source,
                })?;
        }
        Ok(value)
    }
}

impl<T> Default for Pipeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Add(i64);

    impl Stage<i64> for Add {
        fn name(&self) -> &str {
            "add"
        }

        fn consume(&mut self, input: i64) -> Result<i64, StageError> {
            Ok(input + self.0)
        }
    }

    struct Double;

    impl Stage<i64> for Double {
        fn name(&self) -> &str {
            "double"
        }

        fn consume(&mut self, input: i64) -> Result<i64, StageError> {
            Ok(input * 2)
        }
    }

    struct Fail;

    impl Stage<i64> for Fail {
        fn name(&self) -> &str {
            "fail"
        }

        fn consume(&mut self, _input: i64) -> Result<i64, StageError> {
            Err(StageError::Misconfigured("boom".to_string()))
        }
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let mut pipeline: Pipeline<i64> = Pipeline::new();
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.run(7).unwrap(), 7);
    }

    #[test]
    fn test_stages_run_in_order() {
        let mut add_then_double = Pipeline::new().with_stage(Add(1)).with_stage(Double);
        let mut double_then_add = Pipeline::new().with_stage(Double).with_stage(Add(1));
        assert_eq!(add_then_double.run(3).unwrap(), 8);
        assert_eq!(double_then_add.run(3).unwrap(), 7);
        assert_eq!(add_then_double.stage_names(), vec!["add", "double"]);
    }

    #[test]
    fn test_failure_reports_stage_and_stops() {
        let mut pipeline = Pipeline::new()
            .with_stage(Add(1))
            .with_stage(Fail)
            .with_stage(Double);

        let err = pipeline.run(1).unwrap_err();
        assert_eq!(err.stage_index(), 1);
        assert_eq!(err.stage_name(), "fail");
        assert!(matches!(
            err,
            PipelineError::StageFailure {
                source: StageError::Misconfigured(_),
                ..
            }
        ));

        // The next run starts fresh
        assert!(pipeline.run(1).is_err());
    }

    #[test]
    fn test_debug_lists_stage_names() {
        let pipeline = Pipeline::new().with_stage(Double);
        assert_eq!(format!("{:?}", pipeline), "Pipeline { stages: [\"double\"] }");
    }
}
