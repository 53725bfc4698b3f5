//! Previous-report snapshots keyed by executor id

use std::collections::HashMap;

use crate::models::{ExecutorSnapshot, ResourceUsageReport};

/// At most one retained snapshot per executor, plus the timestamp of the
/// report it came from
#[derive(Debug, Clone, Default)]
pub struct ExecutorHistory {
    snapshots: HashMap<String, ExecutorSnapshot>,
    timestamp: Option<f64>,
}

impl ExecutorHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, executor_id: &str) -> Option<&ExecutorSnapshot> {
        self.snapshots.get(executor_id)
    }

    pub fn contains(&self, executor_id: &str) -> bool {
        self.snapshots.contains_key(executor_id)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Timestamp of the report the snapshots were taken from
    pub fn timestamp(&self) -> Option<f64> {
        self.timestamp
    }

    /// Executors retained from the previous report but absent from `report`
    pub fn departed(&self, report: &ResourceUsageReport) -> Vec<String> {
        let mut departed: Vec<String> = self
            .snapshots
            .keys()
            .filter(|id| report.executor(id).is_none())
            .cloned()
            .collect();
        departed.sort();
        departed
    }

    /// Replace the history with the report's snapshots, returning the ids of
    /// executors that were dropped
    pub fn replace(&mut self, report: &ResourceUsageReport) -> Vec<String> {
        let departed = self.departed(report);
        self.snapshots = report
            .executors
            .iter()
            .map(|e| (e.executor_id.clone(), e.clone()))
            .collect();
        self.timestamp = Some(report.timestamp);
        departed
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.timestamp = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceKind;

    fn report(ts: f64, ids: &[&str]) -> ResourceUsageReport {
        ids.iter().fold(ResourceUsageReport::new(ts), |r, id| {
            r.with_executor(ExecutorSnapshot::new(*id).with_usage(ResourceKind::Cpu, 1.0))
        })
    }

    #[test]
    fn test_replace_drops_departed_executors() {
        let mut history = ExecutorHistory::new();
        assert!(history.replace(&report(1.0, &["a", "b", "c"])).is_empty());
        assert_eq!(history.len(), 3);

        let departed = history.replace(&report(2.0, &["b", "d"]));
        assert_eq!(departed, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(history.len(), 2);
        assert!(history.contains("d"));
        assert!(!history.contains("a"));
        assert_eq!(history.timestamp(), Some(2.0));
    }

    #[test]
    fn test_one_snapshot_per_executor() {
        let mut history = ExecutorHistory::new();
        for ts in 0..10 {
            history.replace(&report(ts as f64, &["a"]));
        }
        assert_eq!(history.len(), 1);
    }
}
