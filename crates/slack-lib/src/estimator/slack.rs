//! Slack (oversubscribable capacity) estimation
//!
//! For every executor seen in both the previous and the current report the
//! estimator takes `allocated - observed usage` per resource kind, clamps it
//! at zero and drops it when the executor is under severe contention. The
//! per-kind sum is capped at `max_oversubscription_fraction` of host
//! capacity by scaling every share by the same ratio, and totals below the
//! epsilon are not reported.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, info, warn};

use super::ExecutorHistory;
use crate::config::{SlackConfig, DEFAULT_MAX_OVERSUBSCRIPTION_FRACTION, DEFAULT_ROLE, SLACK_EPSILON};
use crate::error::EstimatorError;
use crate::models::{
    ContentionFlag, ExecutorSnapshot, ResourceEstimate, ResourceKind, ResourceUsageReport,
    SlackShare,
};

/// Result of estimating one report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EstimationOutcome {
    /// Emitted estimates, one per resource kind, ordered by kind
    pub estimates: Vec<ResourceEstimate>,
    /// Per-executor contributions for every kind that was computed
    pub shares: Vec<SlackShare>,
    /// Scoped failures that suppressed a kind or referenced a missing executor
    pub failures: Vec<EstimatorError>,
}

impl EstimationOutcome {
    pub fn estimate(&self, kind: ResourceKind) -> Option<&ResourceEstimate> {
        self.estimates.iter().find(|e| e.kind == kind)
    }

    /// Emitted value for a kind, zero when suppressed
    pub fn total(&self, kind: ResourceKind) -> f64 {
        self.estimate(kind).map(|e| e.value).unwrap_or(0.0)
    }

    pub fn share(&self, executor_id: &str, kind: ResourceKind) -> Option<&SlackShare> {
        self.shares
            .iter()
            .find(|s| s.executor_id == executor_id && s.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.estimates.is_empty()
    }
}

/// Estimates reclaimable capacity from consecutive usage reports
#[derive(Debug, Clone)]
pub struct SlackEstimator {
    max_oversubscription_fraction: f64,
    slack_epsilon: f64,
    role: String,
    previous: ExecutorHistory,
}

impl SlackEstimator {
    pub fn new(max_oversubscription_fraction: f64, slack_epsilon: f64, role: impl Into<String>) -> Self {
        Self {
            max_oversubscription_fraction,
            slack_epsilon,
            role: role.into(),
            previous: ExecutorHistory::new(),
        }
    }

    pub fn from_config(config: &SlackConfig) -> Self {
        Self::new(
            config.max_oversubscription_fraction,
            config.slack_epsilon,
            config.role(),
        )
    }

    pub fn history(&self) -> &ExecutorHistory {
        &self.previous
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    /// Executors that the next `consume` of `report` will drop from history
    pub fn departed(&self, report: &ResourceUsageReport) -> Vec<String> {
        self.previous.departed(report)
    }

    /// Estimate slack for one report
    ///
    /// # Arguments
    /// * `report` - Snapshots of every executor on the host
    /// * `flags` - Contention flags raised for the current window
    ///
    /// # Returns
    /// * `Ok(outcome)` with estimates and any scoped failures
    /// * `Err(DuplicateExecutor)` if the report lists an executor twice;
    ///   history is left untouched
    pub fn consume(
        &mut self,
        report: &ResourceUsageReport,
        flags: &[ContentionFlag],
    ) -> Result<EstimationOutcome, EstimatorError> {
        check_unique_executors(report)?;

        let mut outcome = EstimationOutcome::default();

        let severe: HashSet<(&str, ResourceKind)> = flags
            .iter()
            .filter(|f| f.is_severe())
            .map(|f| (f.executor_id.as_str(), f.metric_kind))
            .collect();

        let mut unknown: BTreeSet<&str> = BTreeSet::new();
        for &(executor_id, _) in &severe {
            if report.executor(executor_id).is_none() {
                unknown.insert(executor_id);
            }
        }
        for executor_id in unknown {
            warn!(executor_id = %executor_id, "Contention flag for executor missing from report");
            outcome.failures.push(EstimatorError::UnknownExecutor {
                executor_id: executor_id.to_string(),
            });
        }

        let capacities = resolve_capacities(report, &mut outcome.failures);
        let elapsed = self
            .previous
            .timestamp()
            .map(|previous_ts| report.timestamp - previous_ts);

        let mut contributions: BTreeMap<ResourceKind, Vec<(String, f64)>> = BTreeMap::new();
        for executor in &report.executors {
            let Some(previous) = self.previous.get(&executor.executor_id) else {
                debug!(executor_id = %executor.executor_id, "No previous snapshot, skipping");
                continue;
            };

            for (kind, allocated) in &executor.allocated {
                if !capacities.contains_key(kind) {
                    continue;
                }

                let mut slack = executor_slack(previous, executor, *kind, *allocated, elapsed);
                if slack > 0.0 && severe.contains(&(executor.executor_id.as_str(), *kind)) {
                    debug!(
                        executor_id = %executor.executor_id,
                        kind = %kind,
                        slack = slack,
                        "Excluding slack of executor under severe contention"
                    );
                    slack = 0.0;
                }

                contributions
                    .entry(*kind)
                    .or_default()
                    .push((executor.executor_id.clone(), slack));
            }
        }

        for (kind, shares) in contributions {
            let capacity = capacities[&kind];
            let cap = (self.max_oversubscription_fraction * capacity).max(0.0);
            let raw_total: f64 = shares.iter().map(|(_, s)| s).sum();

            let (total, ratio) = if raw_total > cap {
                (cap, cap / raw_total)
            } else {
                (raw_total, 1.0)
            };

            if ratio < 1.0 {
                info!(
                    kind = %kind,
                    raw_total = raw_total,
                    cap = cap,
                    ratio = ratio,
                    "Capping slack at oversubscription limit"
                );
            }

            for (executor_id, raw) in shares {
                let scaled = if raw > 0.0 { raw * ratio } else { 0.0 };
                outcome.shares.push(SlackShare {
                    executor_id,
                    kind,
                    raw,
                    scaled,
                });
            }

            if total < self.slack_epsilon {
                debug!(kind = %kind, total = total, "Slack below epsilon, not reported");
                continue;
            }

            outcome
                .estimates
                .push(ResourceEstimate::revocable(kind, total, self.role.clone()));
        }

        let departed = self.previous.replace(report);
        if !departed.is_empty() {
            debug!(departed = ?departed, "Dropped snapshots of departed executors");
        }

        Ok(outcome)
    }

    pub fn reset(&mut self) {
        self.previous.clear();
    }
}

impl Default for SlackEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OVERSUBSCRIPTION_FRACTION, SLACK_EPSILON, DEFAULT_ROLE)
    }
}

fn check_unique_executors(report: &ResourceUsageReport) -> Result<(), EstimatorError> {
    let mut seen = HashSet::new();
    for executor in &report.executors {
        if !seen.insert(executor.executor_id.as_str()) {
            return Err(EstimatorError::DuplicateExecutor {
                executor_id: executor.executor_id.clone(),
            });
        }
    }
    Ok(())
}

/// Capacity for every kind referenced by an allocation. Kinds without a
/// usable capacity are reported as failures and left out.
fn resolve_capacities(
    report: &ResourceUsageReport,
    failures: &mut Vec<EstimatorError>,
) -> BTreeMap<ResourceKind, f64> {
    let referenced: BTreeSet<ResourceKind> = report
        .executors
        .iter()
        .flat_map(|e| e.allocated.keys().copied())
        .collect();

    let mut capacities = BTreeMap::new();
    for kind in referenced {
        match report.host_capacity.get(&kind) {
            Some(capacity) if capacity.is_finite() => {
                capacities.insert(kind, *capacity);
            }
            _ => {
                warn!(kind = %kind, "Host capacity unknown, skipping resource");
                failures.push(EstimatorError::MissingCapacity { kind });
            }
        }
    }
    capacities
}

/// Reserved-but-unused capacity of one executor, never negative
fn executor_slack(
    previous: &ExecutorSnapshot,
    current: &ExecutorSnapshot,
    kind: ResourceKind,
    allocated: f64,
    elapsed: Option<f64>,
) -> f64 {
    if !allocated.is_finite() {
        return 0.0;
    }
    match observed_usage(previous, current, kind, elapsed) {
        Some(usage) => (allocated - usage).max(0.0),
        // Unknown usage is never treated as idle
        None => 0.0,
    }
}

/// Usage over the last interval
///
/// CPU usage is derived from the cumulative CPU time when both snapshots
/// carry it and time advanced; otherwise the reported current usage is used.
fn observed_usage(
    previous: &ExecutorSnapshot,
    current: &ExecutorSnapshot,
    kind: ResourceKind,
    elapsed: Option<f64>,
) -> Option<f64> {
    if kind == ResourceKind::Cpu {
        if let (Some(prev_secs), Some(cur_secs), Some(dt)) = (
            previous.cumulative_cpu_secs,
            current.cumulative_cpu_secs,
            elapsed,
        ) {
            let delta = cur_secs - prev_secs;
            if dt > 0.0 && delta >= 0.0 && delta.is_finite() {
                return Some(delta / dt);
            }
        }
    }

    current
        .current_usage
        .get(&kind)
        .copied()
        .filter(|u| u.is_finite())
        .map(|u| u.max(0.0))
}
