//! Notification sinks for alert reports
//!
//! Sinks deliver one [`AlertReport`] per alerting metric. A failed delivery
//! is reported to the caller and never affects other metrics.

mod telegram;

pub use telegram::{TelegramConfig, TelegramSink};

use crate::anomaly::AlertReport;
use anyhow::Result;
use tracing::warn;

pub use async_trait::async_trait;

/// Trait for alert delivery channels
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Channel name
    fn name(&self) -> &str;

    /// Deliver a single alert report
    async fn send(&self, report: &AlertReport) -> Result<()>;
}

/// Sink that only writes the rendered message to the log
///
/// Used when no chat is configured or for dry runs.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, report: &AlertReport) -> Result<()> {
        warn!(
            event = "alert_message",
            metric = %report.metric,
            timestamp = %report.timestamp.to_rfc3339(),
            message = %report.message(),
            "Alert (log sink)"
        );
        Ok(())
    }
}
