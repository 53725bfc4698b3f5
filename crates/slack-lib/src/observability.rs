//! Observability infrastructure for the slack pipeline
//!
//! Provides:
//! - Prometheus metrics (run latency, failures, contention flags, estimates, decisions)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, GaugeVec, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::error::{PartialFailure, PipelineError};
use crate::models::{ContentionFlag, QosDecision, ResourceEstimate, ResourceKind};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PipelineMetricsInner> = OnceLock::new();

struct PipelineMetricsInner {
    run_latency_seconds: Histogram,
    runs_total: IntCounter,
    stage_failures: IntCounterVec,
    partial_failures: IntCounterVec,
    contention_flags: IntCounterVec,
    slack_estimate: GaugeVec,
    qos_decisions: IntCounterVec,
    executors_tracked: IntGauge,
}

impl PipelineMetricsInner {
    fn new() -> Self {
        Self {
            run_latency_seconds: register_histogram!(
                "slack_pipeline_run_latency_seconds",
                "Time spent running one report through the pipeline",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register run_latency_seconds"),

            runs_total: register_int_counter!(
                "slack_pipeline_runs_total",
                "Total number of pipeline runs"
            )
            .expect("Failed to register runs_total"),

            stage_failures: register_int_counter_vec!(
                "slack_pipeline_stage_failures_total",
                "Pipeline runs aborted by a failing stage",
                &["stage"]
            )
            .expect("Failed to register stage_failures"),

            partial_failures: register_int_counter_vec!(
                "slack_pipeline_partial_failures_total",
                "Scoped failures that suppressed a key or resource kind",
                &["stage"]
            )
            .expect("Failed to register partial_failures"),

            contention_flags: register_int_counter_vec!(
                "slack_pipeline_contention_flags_total",
                "Contention flags raised",
                &["severity"]
            )
            .expect("Failed to register contention_flags"),

            slack_estimate: register_gauge_vec!(
                "slack_pipeline_estimate",
                "Most recent revocable slack estimate per resource kind",
                &["kind"]
            )
            .expect("Failed to register slack_estimate"),

            qos_decisions: register_int_counter_vec!(
                "slack_pipeline_qos_decisions_total",
                "QoS decisions made",
                &["action"]
            )
            .expect("Failed to register qos_decisions"),

            executors_tracked: register_int_gauge!(
                "slack_pipeline_executors_tracked",
                "Number of executors in the most recent report"
            )
            .expect("Failed to register executors_tracked"),
        }
    }
}

/// Pipeline metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct PipelineMetrics {
    _private: (),
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PipelineMetricsInner {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new)
    }

    /// Record one completed or aborted run
    pub fn observe_run(&self, duration_secs: f64) {
        self.inner().run_latency_seconds.observe(duration_secs);
        self.inner().runs_total.inc();
    }

    pub fn inc_stage_failure(&self, stage: &str) {
        self.inner().stage_failures.with_label_values(&[stage]).inc();
    }

    pub fn inc_partial_failure(&self, stage: &str) {
        self.inner().partial_failures.with_label_values(&[stage]).inc();
    }

    pub fn record_flags(&self, flags: &[ContentionFlag]) {
        for flag in flags {
            self.inner()
                .contention_flags
                .with_label_values(&[flag.severity.as_str()])
                .inc();
        }
    }

    /// Publish the latest estimates; kinds without an estimate drop to zero
    pub fn set_estimates(&self, estimates: &[ResourceEstimate]) {
        for kind in ResourceKind::ALL {
            let value = estimates
                .iter()
                .find(|e| e.kind == kind)
                .map(|e| e.value)
                .unwrap_or(0.0);
            self.inner()
                .slack_estimate
                .with_label_values(&[kind.as_str()])
                .set(value);
        }
    }

    pub fn record_decisions(&self, decisions: &[QosDecision]) {
        for decision in decisions {
            self.inner()
                .qos_decisions
                .with_label_values(&[decision.action()])
                .inc();
        }
    }

    pub fn set_executors_tracked(&self, count: i64) {
        self.inner().executors_tracked.set(count);
    }
}

/// Structured logger for pipeline events
///
/// Provides consistent JSON-formatted logging for estimates,
/// contention and QoS decisions.
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, role: &str, stages: &[&str]) {
        info!(
            event = "agent_started",
            node = %self.node_name,
            agent_version = %version,
            role = %role,
            stages = ?stages,
            "Slack agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Slack agent shutting down"
        );
    }

    pub fn log_estimates(&self, timestamp: f64, estimates: &[ResourceEstimate]) {
        for estimate in estimates {
            info!(
                event = "slack_estimated",
                node = %self.node_name,
                timestamp = timestamp,
                kind = %estimate.kind,
                value = estimate.value,
                revocable = estimate.revocable,
                role = %estimate.role,
                "Revocable slack estimated"
            );
        }
    }

    pub fn log_contention(&self, flag: &ContentionFlag) {
        if flag.is_severe() {
            warn!(
                event = "contention_detected",
                node = %self.node_name,
                executor_id = %flag.executor_id,
                kind = %flag.metric_kind,
                severity = %flag.severity,
                window_start = flag.window_start,
                window_end = flag.window_end,
                "Severe contention detected"
            );
        } else {
            info!(
                event = "contention_detected",
                node = %self.node_name,
                executor_id = %flag.executor_id,
                kind = %flag.metric_kind,
                severity = %flag.severity,
                window_start = flag.window_start,
                window_end = flag.window_end,
                "Contention detected"
            );
        }
    }

    pub fn log_decision(&self, decision: &QosDecision) {
        match decision {
            QosDecision::Continue => {}
            QosDecision::Revoke { executor_id, kind } => {
                warn!(
                    event = "qos_decision",
                    node = %self.node_name,
                    action = "revoke",
                    executor_id = %executor_id,
                    kind = %kind,
                    "Revoking slack from contended executor"
                );
            }
            QosDecision::Throttle { executor_id } => {
                warn!(
                    event = "qos_decision",
                    node = %self.node_name,
                    action = "throttle",
                    executor_id = %executor_id,
                    "Throttling contended executor"
                );
            }
        }
    }

    pub fn log_partial_failure(&self, failure: &PartialFailure) {
        warn!(
            event = "partial_failure",
            node = %self.node_name,
            stage = %failure.stage,
            error = %failure.message,
            "Pipeline stage skipped part of a report"
        );
    }

    pub fn log_stage_failure(&self, error: &PipelineError) {
        warn!(
            event = "stage_failure",
            node = %self.node_name,
            stage_index = error.stage_index(),
            stage = %error.stage_name(),
            error = %error,
            "Pipeline run aborted"
        );
    }
}
