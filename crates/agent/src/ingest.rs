//! Report processing loop
//!
//! Pulls reports from a [`ReportSource`], runs each through the pipeline and
//! writes one JSON line per successful run. A run aborted by a stage is
//! logged and reflected in health; the loop moves on to the next report.

use anyhow::{Context, Result};
use slack_lib::{
    health::{components, HealthRegistry},
    SlackPipeline,
};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, error};

use crate::api::AppState;
use crate::source::ReportSource;

/// Counters for one processing session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub processed: usize,
    pub aborted: usize,
}

/// Process reports until the source is exhausted
///
/// # Arguments
/// * `source` - Where reports come from
/// * `pipeline` - Pipeline every report is run through
/// * `state` - Health registry and latest-output slot shared with the API
/// * `out` - Sink for one JSON line per successful run
///
/// # Returns
/// Counts of processed and aborted runs once the source ends, or the first
/// read/write error. A read error marks the ingest component unhealthy.
pub async fn process_reports<S, W>(
    source: &mut S,
    pipeline: &mut SlackPipeline,
    state: &Arc<AppState>,
    out: &mut W,
) -> Result<IngestSummary>
where
    S: ReportSource,
    W: AsyncWrite + Unpin,
{
    let health: &HealthRegistry = &state.health_registry;
    let mut summary = IngestSummary::default();

    loop {
        let report = match source.next_report().await {
            Ok(Some(report)) => report,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "Report source failed");
                health
                    .set_unhealthy(components::INGEST, e.to_string())
                    .await;
                return Err(e);
            }
        };

        match pipeline.run_report(report) {
            Ok(output) => {
                health.record_run(output.failures.len(), None).await;

                let mut line =
                    serde_json::to_vec(&output).context("failed to serialize pipeline output")?;
                line.push(b'\n');
                out.write_all(&line)
                    .await
                    .context("failed to write pipeline output")?;
                out.flush().await.context("failed to flush pipeline output")?;

                state.publish(output).await;
                summary.processed += 1;
            }
            Err(e) => {
                health.record_run(0, Some(&e)).await;
                summary.aborted += 1;
            }
        }
    }

    debug!(
        processed = summary.processed,
        aborted = summary.aborted,
        "Report source exhausted"
    );
    Ok(summary)
}
