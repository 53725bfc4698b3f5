//! Core data models for the slack estimation pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of resource tracked on a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Cpu,
    Memory,
    Io,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [ResourceKind::Cpu, ResourceKind::Memory, ResourceKind::Io];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Cpu => "cpu",
            ResourceKind::Memory => "memory",
            ResourceKind::Io => "io",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one tracked series: a resource kind on one executor
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SampleKey {
    pub kind: ResourceKind,
    pub executor_id: String,
}

impl SampleKey {
    pub fn new(kind: ResourceKind, executor_id: impl Into<String>) -> Self {
        Self {
            kind,
            executor_id: executor_id.into(),
        }
    }
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.executor_id, self.kind)
    }
}

/// A single usage reading for one executor and resource kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSample {
    pub kind: ResourceKind,
    pub executor_id: String,
    /// Usage in resource units (cores, bytes, IO ops/s)
    pub value: f64,
    /// Monotonic timestamp in seconds
    pub timestamp: f64,
}

impl UsageSample {
    pub fn new(kind: ResourceKind, executor_id: impl Into<String>, value: f64, timestamp: f64) -> Self {
        Self {
            kind,
            executor_id: executor_id.into(),
            value,
            timestamp,
        }
    }

    pub fn key(&self) -> SampleKey {
        SampleKey::new(self.kind, self.executor_id.clone())
    }
}

/// Output of the moving average filter for one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothedValue {
    pub key: SampleKey,
    pub value: f64,
    pub timestamp: f64,
}

/// Contention severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentionSeverity {
    None,
    Mild,
    Severe,
}

impl ContentionSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentionSeverity::None => "none",
            ContentionSeverity::Mild => "mild",
            ContentionSeverity::Severe => "severe",
        }
    }
}

impl fmt::Display for ContentionSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signal that an executor's measured idle capacity may not be safely reclaimable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentionFlag {
    pub executor_id: String,
    pub metric_kind: ResourceKind,
    pub severity: ContentionSeverity,
    pub window_start: f64,
    pub window_end: f64,
}

impl ContentionFlag {
    pub fn is_severe(&self) -> bool {
        self.severity == ContentionSeverity::Severe
    }
}

/// Usage and allocation of one executor at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorSnapshot {
    pub executor_id: String,
    #[serde(default)]
    pub current_usage: BTreeMap<ResourceKind, f64>,
    #[serde(default)]
    pub allocated: BTreeMap<ResourceKind, f64>,
    /// Cumulative CPU time (user + system) in seconds, when the runtime reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cumulative_cpu_secs: Option<f64>,
}

impl ExecutorSnapshot {
    pub fn new(executor_id: impl Into<String>) -> Self {
        Self {
            executor_id: executor_id.into(),
            ..Default::default()
        }
    }

    pub fn with_usage(mut self, kind: ResourceKind, value: f64) -> Self {
        self.current_usage.insert(kind, value);
        self
    }

    pub fn with_allocated(mut self, kind: ResourceKind, value: f64) -> Self {
        self.allocated.insert(kind, value);
        self
    }

    pub fn with_cumulative_cpu(mut self, secs: f64) -> Self {
        self.cumulative_cpu_secs = Some(secs);
        self
    }
}

/// Snapshots of every executor on a host at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsageReport {
    pub timestamp: f64,
    #[serde(default)]
    pub executors: Vec<ExecutorSnapshot>,
    #[serde(default)]
    pub host_capacity: BTreeMap<ResourceKind, f64>,
}

impl ResourceUsageReport {
    pub fn new(timestamp: f64) -> Self {
        Self {
            timestamp,
            ..Default::default()
        }
    }

    pub fn with_executor(mut self, executor: ExecutorSnapshot) -> Self {
        self.executors.push(executor);
        self
    }

    pub fn with_capacity(mut self, kind: ResourceKind, value: f64) -> Self {
        self.host_capacity.insert(kind, value);
        self
    }

    pub fn executor(&self, executor_id: &str) -> Option<&ExecutorSnapshot> {
        self.executors.iter().find(|e| e.executor_id == executor_id)
    }

    /// One usage sample per executor usage reading, stamped with the report time
    pub fn samples(&self) -> Vec<UsageSample> {
        self.executors
            .iter()
            .flat_map(|executor| {
                executor.current_usage.iter().map(move |(kind, value)| {
                    UsageSample::new(*kind, executor.executor_id.clone(), *value, self.timestamp)
                })
            })
            .collect()
    }
}

/// Reclaimable capacity offered back to the cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEstimate {
    pub kind: ResourceKind,
    pub value: f64,
    pub revocable: bool,
    pub role: String,
}

impl ResourceEstimate {
    /// Slack estimates are always revocable; negative values are clamped to zero
    pub fn revocable(kind: ResourceKind, value: f64, role: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.max(0.0),
            revocable: true,
            role: role.into(),
        }
    }
}

/// One executor's contribution to a per-kind estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackShare {
    pub executor_id: String,
    pub kind: ResourceKind,
    /// Contribution before capping
    pub raw: f64,
    /// Contribution after proportional capping
    pub scaled: f64,
}

/// Corrective action chosen by the QoS controller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum QosDecision {
    Continue,
    Revoke {
        executor_id: String,
        kind: ResourceKind,
    },
    Throttle {
        executor_id: String,
    },
}

impl QosDecision {
    pub fn action(&self) -> &'static str {
        match self {
            QosDecision::Continue => "continue",
            QosDecision::Revoke { .. } => "revoke",
            QosDecision::Throttle { .. } => "throttle",
        }
    }

    pub fn executor_id(&self) -> Option<&str> {
        match self {
            QosDecision::Continue => None,
            QosDecision::Revoke { executor_id, .. } | QosDecision::Throttle { executor_id } => {
                Some(executor_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_samples_follow_usage_readings() {
        let report = ResourceUsageReport::new(42.0)
            .with_executor(
                ExecutorSnapshot::new("e1")
                    .with_usage(ResourceKind::Cpu, 1.5)
                    .with_usage(ResourceKind::Memory, 512.0),
            )
            .with_executor(ExecutorSnapshot::new("e2").with_allocated(ResourceKind::Cpu, 2.0));

        let samples = report.samples();
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s.executor_id == "e1"));
        assert!(samples.iter().all(|s| s.timestamp == 42.0));
    }

    #[test]
    fn test_estimate_never_negative() {
        let estimate = ResourceEstimate::revocable(ResourceKind::Cpu, -3.0, "*");
        assert_eq!(estimate.value, 0.0);
        assert!(estimate.revocable);
    }

    #[test]
    fn test_report_deserializes_lowercase_kinds() {
        let json = r#"{
            "timestamp": 10.0,
            "executors": [
                {"executor_id": "e1", "current_usage": {"cpu": 1.0}, "allocated": {"cpu": 4.0}}
            ],
            "host_capacity": {"cpu": 10.0, "memory": 4096.0}
        }"#;
        let report: ResourceUsageReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.executors[0].allocated[&ResourceKind::Cpu], 4.0);
        assert_eq!(report.host_capacity.len(), 2);
        assert!(report.executors[0].cumulative_cpu_secs.is_none());
    }

    #[test]
    fn test_decision_serializes_with_action_tag() {
        let decision = QosDecision::Revoke {
            executor_id: "e1".to_string(),
            kind: ResourceKind::Cpu,
        };
        let value = serde_json::to_value(&decision).unwrap();
        assert_eq!(value["action"], "revoke");
        assert_eq!(value["kind"], "cpu");
        assert_eq!(decision.executor_id(), Some("e1"));
    }
}
