//! Alert reports for anomalous metrics
//!
//! Turns an alerting [`Detection`] into the report handed to notification
//! sinks, including the human-readable message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AnnotatedPoint, Detection};
use crate::models::TrackedMetric;

/// Everything a notification sink needs to describe one anomaly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertReport {
    pub metric: TrackedMetric,
    /// Timestamp of the anomalous point
    pub timestamp: DateTime<Utc>,
    /// Value of the anomalous point
    pub current_value: f64,
    /// Value of the point immediately before it
    pub previous_value: Option<f64>,
    /// Smoothed lower bound at the anomalous point
    pub low: Option<f64>,
    /// Smoothed upper bound at the anomalous point
    pub up: Option<f64>,
    /// Annotated series for charting downstream
    pub series: Vec<AnnotatedPoint>,
}

impl AlertReport {
    /// Build a report if the detection raised an alert
    pub fn from_detection(metric: TrackedMetric, detection: &Detection) -> Option<Self> {
        if !detection.is_alert() {
            return None;
        }
        let latest = detection.latest()?;

        Some(Self {
            metric,
            timestamp: latest.timestamp,
            current_value: latest.value,
            previous_value: detection.previous().map(|p| p.value),
            low: latest.low,
            up: latest.up,
            series: detection.series.clone(),
        })
    }

    /// Relative change versus the previous point (`0.1` = +10%)
    ///
    /// `None` when there is no previous point or it is zero.
    pub fn relative_change(&self) -> Option<f64> {
        match self.previous_value {
            Some(prev) if prev != 0.0 => Some(self.current_value / prev - 1.0),
            _ => None,
        }
    }

    /// Render the alert message
    pub fn message(&self) -> String {
        let deviation = match self.relative_change() {
            Some(change) => format!("{:.2}%", change * 100.0),
            None => "n/a".to_string(),
        };

        format!(
            "Metric {}:\ncurrent value = {:.2}\ndeviation from previous value {}",
            self.metric, self.current_value, deviation
        )
    }

    /// Short single-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "{} = {:.2} outside [{}, {}]",
            self.metric,
            self.current_value,
            format_bound(self.low),
            format_bound(self.up)
        )
    }
}

fn format_bound(bound: Option<f64>) -> String {
    bound
        .map(|b| format!("{:.2}", b))
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::IqrDetector;
    use crate::models::SeriesPoint;
    use chrono::{Duration, TimeZone};

    fn detect(values: &[f64]) -> Detection {
        let start = Utc.with_ymd_and_hms(2024, 7, 6, 12, 0, 0).unwrap();
        let points: Vec<SeriesPoint> = values
            .iter()
            .enumerate()
            .map(|(i, v)| SeriesPoint::new(start + Duration::minutes(15 * i as i64), *v))
            .collect();
        IqrDetector::default().detect(&points).unwrap()
    }

    #[test]
    fn test_report_from_alert() {
        let detection = detect(&[10.0, 11.0, 9.0, 10.0, 12.0, 11.0, 10.0, 9.0, 11.0, 100.0]);
        let report = AlertReport::from_detection(TrackedMetric::Views, &detection).unwrap();

        assert_eq!(report.metric, TrackedMetric::Views);
        assert_eq!(report.current_value, 100.0);
        assert_eq!(report.previous_value, Some(11.0));
        assert_eq!(report.up, Some(14.0));
        assert_eq!(report.low, Some(7.0));
        assert_eq!(report.series.len(), 10);
    }

    #[test]
    fn test_no_report_without_alert() {
        let detection = detect(&[10.0, 11.0, 9.0, 10.0, 12.0, 11.0, 10.0, 9.0, 11.0, 11.0]);
        assert!(AlertReport::from_detection(TrackedMetric::Views, &detection).is_none());

        let short = detect(&[10.0, 11.0]);
        assert!(AlertReport::from_detection(TrackedMetric::Views, &short).is_none());
    }

    #[test]
    fn test_message_format() {
        let detection = detect(&[10.0, 11.0, 9.0, 10.0, 12.0, 11.0, 10.0, 9.0, 10.0, 2.5]);
        let report = AlertReport::from_detection(TrackedMetric::Likes, &detection).unwrap();

        assert_eq!(
            report.message(),
            "Metric likes:\ncurrent value = 2.50\ndeviation from previous value -75.00%"
        );
    }

    #[test]
    fn test_message_without_previous_value() {
        let report = AlertReport {
            metric: TrackedMetric::Ctr,
            timestamp: Utc.with_ymd_and_hms(2024, 7, 6, 12, 0, 0).unwrap(),
            current_value: 0.1234,
            previous_value: Some(0.0),
            low: Some(0.15),
            up: Some(0.25),
            series: Vec::new(),
        };

        assert_eq!(report.relative_change(), None);
        assert!(report.message().ends_with("deviation from previous value n/a"));
        assert!(report.message().contains("current value = 0.12"));
        assert_eq!(report.summary(), "ctr = 0.12 outside [0.15, 0.25]");
    }
}
