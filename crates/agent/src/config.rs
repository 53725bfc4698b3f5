//! Agent configuration
//!
//! Values come from an optional TOML file named by `SLACK_AGENT_CONFIG`,
//! overridden by `SLACK_*` environment variables. Nested pipeline settings
//! use a double underscore, e.g. `SLACK_PIPELINE__WINDOW_SIZE=20`.

use anyhow::{Context, Result};
use serde::Deserialize;
use slack_lib::SlackConfig;

/// Environment variable naming the optional configuration file
pub const CONFIG_PATH_ENV: &str = "SLACK_AGENT_CONFIG";

const ENV_PREFIX: &str = "SLACK";

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Host name reported in structured events
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default)]
    pub pipeline: SlackConfig,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            api_port: default_api_port(),
            pipeline: SlackConfig::default(),
        }
    }
}

fn env_source() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("pipeline.stages")
}

impl AgentConfig {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(config::File::with_name(&path));
        }

        let config = builder
            .add_source(env_source())
            .build()
            .context("failed to read agent configuration")?;
        Self::from_config(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(contents, config::FileFormat::Toml))
            .build()
            .context("failed to parse agent configuration")?;
        Self::from_config(config)
    }

    fn from_config(config: config::Config) -> Result<Self> {
        let agent: AgentConfig = config
            .try_deserialize()
            .context("invalid agent configuration")?;
        agent
            .pipeline
            .validate()
            .context("invalid pipeline configuration")?;
        Ok(agent)
    }
}
