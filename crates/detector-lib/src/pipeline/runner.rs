//! One evaluation run over all tracked metrics

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

use super::{async_trait, MetricEvaluation, MetricEvaluator, MetricOutcome, RunSummary};
use crate::anomaly::{AlertReport, IqrDetector, Verdict};
use crate::health::{components, HealthRegistry};
use crate::models::{MetricFrame, TrackedMetric};
use crate::notify::NotificationSink;
use crate::observability::{DetectorMetrics, StructuredLogger};
use crate::source::MetricSource;

/// Fetches a frame and evaluates every tracked metric against it
pub struct EvaluationRunner {
    source: Arc<dyn MetricSource>,
    sink: Arc<dyn NotificationSink>,
    detector: IqrDetector,
    metrics: DetectorMetrics,
    logger: StructuredLogger,
    health: Option<HealthRegistry>,
}

impl EvaluationRunner {
    pub fn new(
        source: Arc<dyn MetricSource>,
        sink: Arc<dyn NotificationSink>,
        detector: IqrDetector,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            source,
            sink,
            detector,
            metrics: DetectorMetrics::new(),
            logger,
            health: None,
        }
    }

    /// Report component health to `registry` after each run
    pub fn with_health(mut self, registry: HealthRegistry) -> Self {
        self.health = Some(registry);
        self
    }

    pub fn detector(&self) -> &IqrDetector {
        &self.detector
    }

    /// Run one full evaluation
    ///
    /// Fails only when the source cannot be fetched; per-metric problems are
    /// recorded in the summary.
    pub async fn run_once(&self) -> Result<RunSummary> {
        let started_at = Utc::now();
        let start = Instant::now();
        self.metrics.inc_runs();

        let frame = match self.source.fetch().await {
            Ok(frame) => frame,
            Err(e) => {
                self.metrics.inc_fetch_errors();
                self.logger
                    .log_fetch_failure(self.source.name(), &format!("{:#}", e));
                if let Some(ref health) = self.health {
                    health
                        .set_degraded(components::SOURCE, format!("{:#}", e))
                        .await;
                }
                return Err(e).with_context(|| {
                    format!("Failed to fetch metrics from {}", self.source.name())
                });
            }
        };

        self.logger.log_run_started(self.source.name(), frame.len());
        let evaluations = self.evaluate_frame(&frame).await;
        let summary = RunSummary {
            started_at,
            evaluations,
        };

        let elapsed = start.elapsed();
        self.metrics.observe_run_latency(elapsed.as_secs_f64());
        self.metrics.set_last_run_timestamp(Utc::now().timestamp());
        self.logger
            .log_run_finished(summary.anomalies(), summary.failures(), elapsed.as_millis());

        if let Some(ref health) = self.health {
            self.report_health(health, &summary).await;
        }

        Ok(summary)
    }

    /// Evaluate every tracked metric of an already fetched frame
    pub async fn evaluate_frame(&self, frame: &MetricFrame) -> Vec<MetricEvaluation> {
        let mut evaluations = Vec::with_capacity(TrackedMetric::ALL.len());
        for metric in TrackedMetric::ALL {
            let outcome = self.evaluate(metric, frame).await;
            self.metrics.inc_evaluation(metric, outcome.label());
            evaluations.push(MetricEvaluation { metric, outcome });
        }
        evaluations
    }

    async fn deliver(&self, report: &AlertReport) -> MetricOutcome {
        let message = report.message();
        match self.sink.send(report).await {
            Ok(()) => MetricOutcome::Alerted { message },
            Err(e) => {
                let error = format!("{:#}", e);
                self.metrics.inc_delivery_errors(report.metric);
                self.logger
                    .log_delivery_failure(report.metric, self.sink.name(), &error);
                MetricOutcome::DeliveryFailed { message, error }
            }
        }
    }

    async fn report_health(&self, health: &HealthRegistry, summary: &RunSummary) {
        health.set_healthy(components::SOURCE).await;

        let failed_deliveries = summary
            .evaluations
            .iter()
            .filter(|e| matches!(e.outcome, MetricOutcome::DeliveryFailed { .. }))
            .count();
        if failed_deliveries > 0 {
            health
                .set_degraded(
                    components::NOTIFIER,
                    format!("{} alert deliveries failed", failed_deliveries),
                )
                .await;
        } else {
            health.set_healthy(components::NOTIFIER).await;
        }

        health.record_run(Utc::now()).await;
    }
}

#[async_trait]
impl MetricEvaluator for EvaluationRunner {
    async fn evaluate(&self, metric: TrackedMetric, frame: &MetricFrame) -> MetricOutcome {
        let series = frame.series(metric);

        let detection = match self.detector.detect(&series) {
            Ok(detection) => detection,
            Err(e) => {
                let error = e.to_string();
                self.logger.log_invalid_input(metric, &error);
                return MetricOutcome::InvalidInput { error };
            }
        };

        match detection.verdict {
            Verdict::Normal => MetricOutcome::Normal,
            Verdict::NotEvaluable => {
                self.logger.log_not_evaluable(metric, series.len());
                MetricOutcome::NotEvaluable
            }
            Verdict::Alert => match AlertReport::from_detection(metric, &detection) {
                Some(report) => {
                    self.metrics.inc_alerts(metric);
                    self.logger.log_anomaly(&report);
                    self.deliver(&report).await
                }
                None => MetricOutcome::NotEvaluable,
            },
        }
    }
}
