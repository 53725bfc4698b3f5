//! Corrective actions for executors under severe contention

use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use crate::models::{ContentionFlag, QosDecision, ResourceEstimate, ResourceKind};

/// Stateless controller mapping severe contention to QoS decisions
///
/// An executor under severe contention on a kind that is currently being
/// offered as slack gets that slack revoked. When nothing of that kind is on
/// offer the executor is throttled instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct QosController;

impl QosController {
    pub fn new() -> Self {
        Self
    }

    /// The most urgent decision, `Continue` when nothing is severe
    pub fn decide(&self, estimates: &[ResourceEstimate], flags: &[ContentionFlag]) -> QosDecision {
        self.decide_all(estimates, flags)
            .into_iter()
            .next()
            .unwrap_or(QosDecision::Continue)
    }

    /// Every decision for the current window
    ///
    /// # Returns
    /// One decision per implicated (executor, kind), throttles deduplicated
    /// per executor, ordered by executor id then kind. `[Continue]` when no
    /// flag is severe.
    pub fn decide_all(
        &self,
        estimates: &[ResourceEstimate],
        flags: &[ContentionFlag],
    ) -> Vec<QosDecision> {
        let offered: HashSet<ResourceKind> = estimates
            .iter()
            .filter(|e| e.value > 0.0)
            .map(|e| e.kind)
            .collect();

        let implicated: BTreeSet<(&str, ResourceKind)> = flags
            .iter()
            .filter(|f| f.is_severe())
            .map(|f| (f.executor_id.as_str(), f.metric_kind))
            .collect();

        if implicated.is_empty() {
            return vec![QosDecision::Continue];
        }

        let mut throttled: HashSet<&str> = HashSet::new();
        let mut decisions = Vec::with_capacity(implicated.len());
        for (executor_id, kind) in implicated {
            if offered.contains(&kind) {
                decisions.push(QosDecision::Revoke {
                    executor_id: executor_id.to_string(),
                    kind,
                });
            } else if throttled.insert(executor_id) {
                decisions.push(QosDecision::Throttle {
                    executor_id: executor_id.to_string(),
                });
            }
        }

        debug!(decisions = decisions.len(), "QoS decisions made");
        decisions
    }
}
