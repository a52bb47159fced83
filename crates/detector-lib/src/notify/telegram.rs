//! Telegram Bot API sink

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{async_trait, NotificationSink};
use crate::anomaly::AlertReport;

/// Bot credentials and target chat
#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather
    pub token: String,

    /// Target chat id (numeric id or `@channel`)
    pub chat_id: String,

    /// Bot API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl TelegramConfig {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            chat_id: chat_id.into(),
            api_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// Keeps the bot token out of logs
impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("api_url", &self.api_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Bot API response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Delivers alert messages to a Telegram chat
pub struct TelegramSink {
    client: Client,
    send_message_url: Url,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        let send_message_url = Url::parse(&format!(
            "{}/bot{}/sendMessage",
            config.api_url.trim_end_matches('/'),
            config.token
        ))
        .context("Invalid Telegram API URL")?;

        Ok(Self {
            client,
            send_message_url,
            chat_id: config.chat_id.clone(),
        })
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, report: &AlertReport) -> Result<()> {
        let payload = json!({
            "chat_id": self.chat_id,
            "text": report.message(),
        });

        // without_url() keeps the token out of error messages
        let response = self
            .client
            .post(self.send_message_url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| e.without_url())
            .context("Failed to send Telegram message")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| e.without_url())
            .context("Failed to read Telegram response")?;
        let body = serde_json::from_str::<ApiResponse>(&text);

        if !status.is_success() {
            // Gateways in front of the Bot API answer with plain text or HTML
            let description = match body {
                Ok(ApiResponse {
                    description: Some(description),
                    ..
                }) => description,
                _ => text.trim().chars().take(200).collect(),
            };
            anyhow::bail!("Telegram API error ({}): {}", status, description);
        }

        let body = body.context("Failed to parse Telegram response")?;
        if !body.ok {
            anyhow::bail!(
                "Telegram API rejected message: {}",
                body.description.unwrap_or_default()
            );
        }

        debug!(metric = %report.metric, chat_id = %self.chat_id, "Delivered Telegram alert");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrackedMetric;
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;

    fn report() -> AlertReport {
        AlertReport {
            metric: TrackedMetric::Views,
            timestamp: Utc.with_ymd_and_hms(2024, 7, 6, 10, 15, 0).unwrap(),
            current_value: 100.0,
            previous_value: Some(80.0),
            low: Some(7.0),
            up: Some(14.0),
            series: Vec::new(),
        }
    }

    fn config(api_url: String) -> TelegramConfig {
        TelegramConfig {
            api_url,
            ..TelegramConfig::new("123:ABC", "-100200")
        }
    }

    #[tokio::test]
    async fn test_send_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bot123:ABC/sendMessage")
            .match_body(Matcher::PartialJson(json!({
                "chat_id": "-100200",
                "text": "Metric views:\ncurrent value = 100.00\ndeviation from previous value 25.00%",
            })))
            .with_status(200)
            .with_body(r#"{"ok":true,"result":{"message_id":1}}"#)
            .create_async()
            .await;

        let sink = TelegramSink::new(&config(server.url())).unwrap();
        sink.send(&report()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/bot123:ABC/sendMessage")
            .with_status(400)
            .with_body(r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#)
            .create_async()
            .await;

        let sink = TelegramSink::new(&config(server.url())).unwrap();
        let err = sink.send(&report()).await.unwrap_err();
        assert!(err.to_string().contains("chat not found"));
        assert!(!err.to_string().contains("123:ABC"));
    }

    #[tokio::test]
    async fn test_gateway_error_keeps_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/bot123:ABC/sendMessage")
            .with_status(502)
            .with_header("content-type", "text/html")
            .with_body("<html><body>502 Bad Gateway</body></html>")
            .create_async()
            .await;

        let sink = TelegramSink::new(&config(server.url())).unwrap();
        let err = format!("{:#}", sink.send(&report()).await.unwrap_err());
        assert!(err.contains("502"), "status missing from: {}", err);
        assert!(err.contains("Bad Gateway"));
        assert!(!err.contains("Failed to parse"));
    }

    #[tokio::test]
    async fn test_not_ok_response_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/bot123:ABC/sendMessage")
            .with_status(200)
            .with_body(r#"{"ok":false,"description":"Forbidden: bot was kicked"}"#)
            .create_async()
            .await;

        let sink = TelegramSink::new(&config(server.url())).unwrap();
        let err = sink.send(&report()).await.unwrap_err();
        assert!(err.to_string().contains("bot was kicked"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let rendered = format!("{:?}", TelegramConfig::new("123:ABC", "42"));
        assert!(!rendered.contains("123:ABC"));
        assert!(rendered.contains("42"));
    }
}
