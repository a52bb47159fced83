//! Detector library for aggregate metric anomaly alerting
//!
//! This crate provides the core functionality for:
//! - Rolling IQR anomaly detection on metric series
//! - Fetching metric frames from ClickHouse
//! - Delivering alert messages to Telegram
//! - Scheduled per-metric evaluation runs
//! - Health checks and observability

pub mod anomaly;
pub mod health;
pub mod models;
pub mod notify;
pub mod observability;
pub mod pipeline;
pub mod source;

pub use anomaly::{AlertReport, AnnotatedPoint, DetectError, Detection, IqrDetector, Verdict};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{DetectorMetrics, StructuredLogger};
pub use pipeline::{EvaluationRunner, MetricEvaluator, MetricOutcome, RunScheduler, RunSummary};
