//! The frame passed between slack pipeline stages

use serde::Serialize;

use crate::error::PartialFailure;
use crate::estimator::EstimationOutcome;
use crate::models::{
    ContentionFlag, QosDecision, ResourceEstimate, ResourceUsageReport, SmoothedValue, UsageSample,
};

/// Everything known about one report as it moves through the pipeline
///
/// Each stage reads the fields produced upstream and fills in its own. A
/// stage that is not configured simply leaves its fields empty.
#[derive(Debug, Clone, Default)]
pub struct Tick {
    pub report: ResourceUsageReport,
    /// One sample per executor usage reading
    pub samples: Vec<UsageSample>,
    /// `None` until a moving average stage has run
    pub smoothed: Option<Vec<SmoothedValue>>,
    pub flags: Vec<ContentionFlag>,
    pub outcome: EstimationOutcome,
    pub decisions: Vec<QosDecision>,
    pub failures: Vec<PartialFailure>,
    /// Executors dropped from the estimator's history by this report
    pub departed: Vec<String>,
}

impl Tick {
    pub fn from_report(report: ResourceUsageReport) -> Self {
        Self {
            samples: report.samples(),
            report,
            ..Default::default()
        }
    }

    pub fn timestamp(&self) -> f64 {
        self.report.timestamp
    }

    pub fn estimates(&self) -> &[ResourceEstimate] {
        &self.outcome.estimates
    }

    /// Ids of the executors in this tick's report
    pub fn executor_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.report.executors.iter().map(|e| e.executor_id.as_str())
    }
}

/// Serializable result of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickOutput {
    pub timestamp: f64,
    pub estimates: Vec<ResourceEstimate>,
    pub decisions: Vec<QosDecision>,
    pub flags: Vec<ContentionFlag>,
    pub failures: Vec<PartialFailure>,
}

impl From<Tick> for TickOutput {
    fn from(tick: Tick) -> Self {
        Self {
            timestamp: tick.report.timestamp,
            estimates: tick.outcome.estimates,
            decisions: tick.decisions,
            flags: tick.flags,
            failures: tick.failures,
        }
    }
}
