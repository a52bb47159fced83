//! Observability infrastructure for the anomaly agent
//!
//! Provides:
//! - Prometheus metrics (run latency, evaluations per outcome, alerts, delivery errors)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{debug, error, info, warn};

use crate::anomaly::AlertReport;
use crate::models::TrackedMetric;

/// Histogram buckets for run latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<DetectorMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct DetectorMetricsInner {
    run_latency_seconds: Histogram,
    runs_total: IntCounter,
    fetch_errors_total: IntCounter,
    evaluations_total: IntCounterVec,
    alerts_total: IntCounterVec,
    delivery_errors_total: IntCounterVec,
    last_run_timestamp_seconds: IntGauge,
}

impl DetectorMetricsInner {
    fn new() -> Self {
        Self {
            run_latency_seconds: register_histogram!(
                "anomaly_agent_run_latency_seconds",
                "Time spent on one evaluation run (fetch, detect, deliver)",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register run_latency_seconds"),

            runs_total: register_int_counter!(
                "anomaly_agent_runs_total",
                "Total number of evaluation runs started"
            )
            .expect("Failed to register runs_total"),

            fetch_errors_total: register_int_counter!(
                "anomaly_agent_fetch_errors_total",
                "Total number of runs aborted because the metric source failed"
            )
            .expect("Failed to register fetch_errors_total"),

            evaluations_total: register_int_counter_vec!(
                "anomaly_agent_evaluations_total",
                "Metric evaluations by outcome",
                &["metric", "outcome"]
            )
            .expect("Failed to register evaluations_total"),

            alerts_total: register_int_counter_vec!(
                "anomaly_agent_alerts_total",
                "Anomalies detected per metric",
                &["metric"]
            )
            .expect("Failed to register alerts_total"),

            delivery_errors_total: register_int_counter_vec!(
                "anomaly_agent_delivery_errors_total",
                "Alert deliveries that failed per metric",
                &["metric"]
            )
            .expect("Failed to register delivery_errors_total"),

            last_run_timestamp_seconds: register_int_gauge!(
                "anomaly_agent_last_run_timestamp_seconds",
                "Unix timestamp of the last completed evaluation run"
            )
            .expect("Failed to register last_run_timestamp_seconds"),
        }
    }
}

/// Detector metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct DetectorMetrics {
    _private: (),
}

impl Default for DetectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(DetectorMetricsInner::new);
        Self { _private: () }
    }

    /// Encode every registered metric in the Prometheus text format
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    fn inner(&self) -> &DetectorMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record the duration of a completed run
    pub fn observe_run_latency(&self, duration_secs: f64) {
        self.inner().run_latency_seconds.observe(duration_secs);
    }

    pub fn inc_runs(&self) {
        self.inner().runs_total.inc();
    }

    pub fn inc_fetch_errors(&self) {
        self.inner().fetch_errors_total.inc();
    }

    /// Count one evaluation of `metric` ending in `outcome`
    pub fn inc_evaluation(&self, metric: TrackedMetric, outcome: &str) {
        self.inner()
            .evaluations_total
            .with_label_values(&[metric.as_str(), outcome])
            .inc();
    }

    pub fn inc_alerts(&self, metric: TrackedMetric) {
        self.inner()
            .alerts_total
            .with_label_values(&[metric.as_str()])
            .inc();
    }

    pub fn inc_delivery_errors(&self, metric: TrackedMetric) {
        self.inner()
            .delivery_errors_total
            .with_label_values(&[metric.as_str()])
            .inc();
    }

    pub fn set_last_run_timestamp(&self, timestamp: i64) {
        self.inner().last_run_timestamp_seconds.set(timestamp);
    }

    /// Alerts counted so far for `metric`
    pub fn alerts(&self, metric: TrackedMetric) -> u64 {
        self.inner()
            .alerts_total
            .with_label_values(&[metric.as_str()])
            .get()
    }
}

/// Structured logger for agent events
///
/// Provides consistent JSON-formatted logging for runs, anomalies, and
/// delivery problems.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log the start of an evaluation run
    pub fn log_run_started(&self, source: &str, rows: usize) {
        info!(
            event = "run_started",
            instance = %self.instance,
            source = %source,
            rows = rows,
            "Evaluation run started"
        );
    }

    /// Log the end of an evaluation run
    pub fn log_run_finished(&self, alerts: usize, failures: usize, elapsed_ms: u128) {
        info!(
            event = "run_finished",
            instance = %self.instance,
            alerts = alerts,
            failures = failures,
            elapsed_ms = elapsed_ms as u64,
            "Evaluation run finished"
        );
    }

    /// Log a failed fetch from the metric source
    pub fn log_fetch_failure(&self, source: &str, error: &str) {
        error!(
            event = "fetch_failed",
            instance = %self.instance,
            source = %source,
            error = %error,
            "Failed to fetch metrics, skipping run"
        );
    }

    /// Log an anomaly detection event
    pub fn log_anomaly(&self, report: &AlertReport) {
        warn!(
            event = "anomaly_detected",
            instance = %self.instance,
            metric = %report.metric,
            timestamp = %report.timestamp.to_rfc3339(),
            current_value = report.current_value,
            previous_value = ?report.previous_value,
            low = ?report.low,
            up = ?report.up,
            "Anomaly detected"
        );
    }

    /// Log a metric whose band is undefined at the latest point
    pub fn log_not_evaluable(&self, metric: TrackedMetric, points: usize) {
        debug!(
            event = "metric_not_evaluable",
            instance = %self.instance,
            metric = %metric,
            points = points,
            "Not enough history to evaluate metric"
        );
    }

    /// Log a series rejected by validation
    pub fn log_invalid_input(&self, metric: TrackedMetric, error: &str) {
        warn!(
            event = "metric_invalid_input",
            instance = %self.instance,
            metric = %metric,
            error = %error,
            "Metric series rejected"
        );
    }

    /// Log a failed alert delivery
    pub fn log_delivery_failure(&self, metric: TrackedMetric, sink: &str, error: &str) {
        error!(
            event = "delivery_failed",
            instance = %self.instance,
            metric = %metric,
            sink = %sink,
            error = %error,
            "Failed to deliver alert"
        );
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, source: &str, sink: &str) {
        info!(
            event = "agent_started",
            instance = %self.instance,
            agent_version = %version,
            source = %source,
            sink = %sink,
            "Anomaly agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Anomaly agent shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_metrics_creation() {
        let metrics = DetectorMetrics::new();

        metrics.observe_run_latency(0.2);
        metrics.inc_runs();
        metrics.inc_fetch_errors();
        metrics.inc_evaluation(TrackedMetric::Views, "normal");
        metrics.inc_delivery_errors(TrackedMetric::Views);
        metrics.set_last_run_timestamp(1_720_260_000);

        let before = metrics.alerts(TrackedMetric::Likes);
        metrics.inc_alerts(TrackedMetric::Likes);
        assert!(metrics.alerts(TrackedMetric::Likes) > before);
    }

    #[test]
    fn test_render_text_format() {
        let metrics = DetectorMetrics::new();
        metrics.inc_evaluation(TrackedMetric::Ctr, "not_evaluable");

        let text = metrics.render().unwrap();
        assert!(text.contains("# TYPE anomaly_agent_evaluations_total counter"));
        assert!(text.contains(r#"metric="ctr""#));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-instance");
        assert_eq!(logger.instance, "test-instance");
    }
}
