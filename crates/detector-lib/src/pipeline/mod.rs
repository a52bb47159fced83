//! Per-run evaluation of every tracked metric
//!
//! The runner fetches one frame, evaluates each metric independently and
//! delivers alerts; the scheduler fires runs on a fixed wall-clock cadence.

mod runner;
mod scheduler;

pub use runner::EvaluationRunner;
pub use scheduler::{following_boundary, next_boundary, RunScheduler, DEFAULT_CADENCE};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{MetricFrame, TrackedMetric};

pub use async_trait::async_trait;

/// Evaluates one tracked metric of a fetched frame
#[async_trait]
pub trait MetricEvaluator: Send + Sync {
    async fn evaluate(&self, metric: TrackedMetric, frame: &MetricFrame) -> MetricOutcome;
}

/// Result of evaluating one metric in one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MetricOutcome {
    /// Anomaly detected and delivered
    Alerted { message: String },
    /// Latest point inside the band
    Normal,
    /// Not enough history at the latest point; treated as no alert
    NotEvaluable,
    /// Series rejected by validation
    InvalidInput { error: String },
    /// Anomaly detected but the sink failed to deliver it
    DeliveryFailed { message: String, error: String },
}

impl MetricOutcome {
    /// Stable label for metrics and logs
    pub fn label(&self) -> &'static str {
        match self {
            MetricOutcome::Alerted { .. } => "alerted",
            MetricOutcome::Normal => "normal",
            MetricOutcome::NotEvaluable => "not_evaluable",
            MetricOutcome::InvalidInput { .. } => "invalid_input",
            MetricOutcome::DeliveryFailed { .. } => "delivery_failed",
        }
    }

    /// Whether an anomaly was detected, delivered or not
    pub fn is_anomaly(&self) -> bool {
        matches!(
            self,
            MetricOutcome::Alerted { .. } | MetricOutcome::DeliveryFailed { .. }
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            MetricOutcome::InvalidInput { .. } | MetricOutcome::DeliveryFailed { .. }
        )
    }
}

/// Outcome for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEvaluation {
    pub metric: TrackedMetric,
    #[serde(flatten)]
    pub outcome: MetricOutcome,
}

/// Outcomes of one evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub evaluations: Vec<MetricEvaluation>,
}

impl RunSummary {
    /// Outcome recorded for `metric`
    pub fn outcome(&self, metric: TrackedMetric) -> Option<&MetricOutcome> {
        self.evaluations
            .iter()
            .find(|e| e.metric == metric)
            .map(|e| &e.outcome)
    }

    pub fn anomalies(&self) -> usize {
        self.evaluations
            .iter()
            .filter(|e| e.outcome.is_anomaly())
            .count()
    }

    pub fn failures(&self) -> usize {
        self.evaluations
            .iter()
            .filter(|e| e.outcome.is_failure())
            .count()
    }
}
