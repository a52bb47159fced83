//! Core data models for the anomaly agent

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single observation of one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    #[serde(rename = "ts", deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Metrics evaluated on every run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedMetric {
    /// Count of distinct active users
    UsersQty,
    /// Number of post views
    Views,
    /// Number of post likes
    Likes,
    /// Click-through rate (likes / views)
    Ctr,
}

impl TrackedMetric {
    /// Every tracked metric, in evaluation order
    pub const ALL: [TrackedMetric; 4] = [
        TrackedMetric::UsersQty,
        TrackedMetric::Views,
        TrackedMetric::Likes,
        TrackedMetric::Ctr,
    ];

    /// Column name used by the metric source and in alert messages
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackedMetric::UsersQty => "users_qty",
            TrackedMetric::Views => "views",
            TrackedMetric::Likes => "likes",
            TrackedMetric::Ctr => "ctr",
        }
    }
}

impl fmt::Display for TrackedMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackedMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrackedMetric::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown metric '{}'", s))
    }
}

/// One 15-minute bucket with every tracked metric
///
/// A `None` column means the source returned `null` (e.g. `ctr` over zero
/// views).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub ts: DateTime<Utc>,
    pub users_qty: Option<f64>,
    pub views: Option<f64>,
    pub likes: Option<f64>,
    pub ctr: Option<f64>,
}

impl MetricRow {
    /// Value of one metric column
    pub fn get(&self, metric: TrackedMetric) -> Option<f64> {
        match metric {
            TrackedMetric::UsersQty => self.users_qty,
            TrackedMetric::Views => self.views,
            TrackedMetric::Likes => self.likes,
            TrackedMetric::Ctr => self.ctr,
        }
    }
}

/// Result of a single fetch: all tracked metrics over the trailing window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricFrame {
    pub rows: Vec<MetricRow>,
}

impl MetricFrame {
    pub fn new(rows: Vec<MetricRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Project one metric column into a series
    ///
    /// Missing values become NaN so the detector rejects this metric without
    /// affecting the others.
    pub fn series(&self, metric: TrackedMetric) -> Vec<SeriesPoint> {
        self.rows
            .iter()
            .map(|row| SeriesPoint::new(row.ts, row.get(metric).unwrap_or(f64::NAN)))
            .collect()
    }
}

/// Parse a timestamp as RFC 3339 or as ClickHouse's `YYYY-MM-DD hh:mm:ss` (UTC)
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        Err(_) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ts| ts.and_utc()),
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_metric_names_round_trip() {
        for metric in TrackedMetric::ALL {
            assert_eq!(metric.as_str().parse::<TrackedMetric>().unwrap(), metric);
        }
        assert!("clicks".parse::<TrackedMetric>().is_err());
    }

    #[test]
    fn test_parse_clickhouse_timestamp() {
        let ts = parse_timestamp("2024-07-06 10:15:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 7, 6, 10, 15, 0).unwrap());

        let ts = parse_timestamp("2024-07-06T10:15:00+02:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 7, 6, 8, 15, 0).unwrap());

        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_frame_series_projection() {
        let json = r#"[
            {"ts": "2024-07-06 10:00:00", "users_qty": 120, "views": 900, "likes": 180, "ctr": 0.2},
            {"ts": "2024-07-06 10:15:00", "users_qty": 0, "views": 0, "likes": 0, "ctr": null}
        ]"#;
        let frame: MetricFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.len(), 2);

        let views = frame.series(TrackedMetric::Views);
        assert_eq!(views[0].value, 900.0);
        assert_eq!(views[1].value, 0.0);

        let ctr = frame.series(TrackedMetric::Ctr);
        assert_eq!(ctr[0].value, 0.2);
        assert!(ctr[1].value.is_nan());
    }

    #[test]
    fn test_series_point_from_json() {
        let point: SeriesPoint =
            serde_json::from_str(r#"{"ts": "2024-07-06T10:00:00Z", "value": 10.5}"#).unwrap();
        assert_eq!(point.value, 10.5);
        assert_eq!(
            point.timestamp,
            Utc.with_ymd_and_hms(2024, 7, 6, 10, 0, 0).unwrap()
        );
    }
}
