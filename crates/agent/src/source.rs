//! Report sources feeding the pipeline
//!
//! The host runtime hands the agent one [`ResourceUsageReport`] per
//! sampling interval. [`JsonLinesSource`] reads them as newline-delimited
//! JSON from any async reader, typically stdin.

use anyhow::{Context, Result};
use async_trait::async_trait;
use slack_lib::ResourceUsageReport;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::warn;

/// Supplier of usage reports
#[async_trait]
pub trait ReportSource: Send {
    /// Next report, or `None` once the source is exhausted
    async fn next_report(&mut self) -> Result<Option<ResourceUsageReport>>;
}

/// Newline-delimited JSON reports
///
/// Blank lines are ignored. Lines that do not parse as a report are logged
/// and skipped so one bad record does not stop the stream.
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line_number: usize,
    skipped: usize,
}

impl<R> JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
            skipped: 0,
        }
    }

    /// Number of malformed lines skipped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl JsonLinesSource<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R> ReportSource for JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_report(&mut self) -> Result<Option<ResourceUsageReport>> {
        loop {
            let Some(line) = self
                .lines
                .next_line()
                .await
                .context("failed to read report stream")?
            else {
                return Ok(None);
            };
            self.line_number += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<ResourceUsageReport>(line) {
                Ok(report) => return Ok(Some(report)),
                Err(e) => {
                    self.skipped += 1;
                    warn!(
                        line = self.line_number,
                        error = %e,
                        "Skipping malformed usage report"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slack_lib::ResourceKind;

    #[tokio::test]
    async fn test_reads_reports_and_skips_bad_lines() {
        let input = concat!(
            r#"{"timestamp": 1.0, "executors": [{"executor_id": "e1", "current_usage": {"cpu": 1.5}, "allocated": {"cpu": 4.0}}], "host_capacity": {"cpu": 10.0}}"#,
            "\n\n",
            "not json\n",
            r#"{"timestamp": 2.0, "executors": [], "host_capacity": {}}"#,
            "\n",
        );
        let mut source = JsonLinesSource::new(input.as_bytes());

        let first = source.next_report().await.unwrap().unwrap();
        assert_eq!(first.timestamp, 1.0);
        let executor = first.executor("e1").unwrap();
        assert_eq!(executor.current_usage[&ResourceKind::Cpu], 1.5);
        assert_eq!(executor.cumulative_cpu_secs, None);

        let second = source.next_report().await.unwrap().unwrap();
        assert_eq!(second.timestamp, 2.0);
        assert_eq!(source.skipped(), 1);

        assert!(source.next_report().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_partial_chunks_are_joined() {
        let reader = tokio_test::io::Builder::new()
            .read(br#"{"timestamp": 5.0, "#)
            .read(b"\"executors\": []}\n")
            .build();
        let mut source = JsonLinesSource::new(BufReader::new(reader));

        let report = source.next_report().await.unwrap().unwrap();
        assert_eq!(report.timestamp, 5.0);
        assert!(report.host_capacity.is_empty());
        assert!(source.next_report().await.unwrap().is_none());
    }
}
