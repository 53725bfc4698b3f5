//! Slack Agent - revocable capacity estimation
//!
//! Runs on each host, reading resource usage reports as JSON lines on stdin
//! and writing estimates and QoS decisions as JSON lines on stdout.

use anyhow::Result;
use slack_agent::{api, config::AgentConfig, ingest, source::JsonLinesSource};
use slack_lib::{
    config::default_role_from_env,
    health::{components, HealthRegistry},
    observability::{PipelineMetrics, StructuredLogger},
    SlackPipeline,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only pipeline output
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    info!("Starting slack-agent");

    let mut config = AgentConfig::load()?;
    if config.pipeline.default_role.is_none() {
        config.pipeline.default_role = Some(default_role_from_env(|key| std::env::var(key).ok()));
    }
    info!(node_name = %config.node_name, role = %config.pipeline.role(), "Agent configured");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::INGEST).await;
    health_registry.register(components::PIPELINE).await;

    let logger = StructuredLogger::new(&config.node_name);
    let mut pipeline = SlackPipeline::from_config(&config.pipeline, logger.clone())?;
    logger.log_startup(AGENT_VERSION, &config.pipeline.role(), &pipeline.stage_names());

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        PipelineMetrics::new(),
    ));

    health_registry.set_ready(true).await;

    let api_handle = tokio::spawn(api::serve(config.api_port, app_state.clone()));

    let mut source = JsonLinesSource::stdin();
    let mut stdout = tokio::io::stdout();

    let outcome = tokio::select! {
        result = ingest::process_reports(&mut source, &mut pipeline, &app_state, &mut stdout) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    match outcome {
        Some(Ok(summary)) => {
            info!(
                processed = summary.processed,
                aborted = summary.aborted,
                skipped = source.skipped(),
                "Report stream closed"
            );
            logger.log_shutdown("report stream closed");
        }
        Some(Err(e)) => {
            error!(error = %e, "Report processing failed");
            logger.log_shutdown("report processing failed");
            api_handle.abort();
            return Err(e);
        }
        None => logger.log_shutdown("SIGINT received"),
    }

    api_handle.abort();
    info!("Shutting down");

    Ok(())
}
