//! Metric sources
//!
//! A source returns every tracked metric over the trailing window in one
//! fetch. The ClickHouse source talks to the HTTP interface; tests and the
//! CLI can supply frames directly through [`StaticSource`].

mod clickhouse;

pub use clickhouse::{parse_json_each_row, ClickHouseConfig, ClickHouseSource};

use crate::models::MetricFrame;
use anyhow::Result;

pub use async_trait::async_trait;

/// Trait for metric source implementations
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Human-readable name for logs
    fn name(&self) -> &str;

    /// Fetch all tracked metrics for the trailing window
    async fn fetch(&self) -> Result<MetricFrame>;
}

/// Source that always returns the same frame
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    frame: MetricFrame,
}

impl StaticSource {
    pub fn new(frame: MetricFrame) -> Self {
        Self { frame }
    }
}

#[async_trait]
impl MetricSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<MetricFrame> {
        Ok(self.frame.clone())
    }
}
