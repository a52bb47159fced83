//! Agent configuration
//!
//! Loaded once at startup from an optional file and the `AGENT_*`
//! environment, then handed to the source, sink and detector at
//! construction. Nested keys use `__` in the environment, e.g.
//! `AGENT_CLICKHOUSE__PASSWORD` or `AGENT_TELEGRAM__CHAT_ID`.

use anyhow::{Context, Result};
use detector_lib::anomaly::IqrDetector;
use detector_lib::notify::TelegramConfig;
use detector_lib::source::ClickHouseConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Name of this agent instance in logs
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Interval between evaluation runs in seconds
    #[serde(default = "default_cadence_secs")]
    pub cadence_secs: u64,

    /// Run once immediately at startup instead of waiting for the first boundary
    #[serde(default)]
    pub run_on_start: bool,

    /// Band multiplier and smoothing width
    #[serde(default)]
    pub detector: IqrDetector,

    /// Metric source connection
    #[serde(default)]
    pub clickhouse: ClickHouseConfig,

    /// Alert chat; alerts are only logged when absent
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "anomaly-agent".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_cadence_secs() -> u64 {
    15 * 60
}

impl AgentConfig {
    /// Load configuration from an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("AGENT")
                .prefix_separator("_")
                .separator("__"),
        );

        let config: AgentConfig = builder
            .build()
            .context("Failed to read agent configuration")?
            .try_deserialize()
            .context("Invalid agent configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the agent cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.cadence_secs == 0 {
            anyhow::bail!("cadence_secs must be greater than zero");
        }
        self.detector
            .validate()
            .context("Invalid detector configuration")?;
        if let Some(ref telegram) = self.telegram {
            if telegram.token.is_empty() || telegram.chat_id.is_empty() {
                anyhow::bail!("telegram.token and telegram.chat_id must both be set");
            }
        }
        Ok(())
    }

    pub fn cadence(&self) -> Duration {
        Duration::from_secs(self.cadence_secs)
    }
}
