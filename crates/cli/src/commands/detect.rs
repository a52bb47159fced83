//! Single-series detection

use anyhow::{Context, Result};
use colored::Colorize;
use detector_lib::{AlertReport, AnnotatedPoint, IqrDetector, TrackedMetric};
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

use crate::input::load_series;
use crate::output::{format_value, print_info, print_json, print_table, print_verdict, OutputFormat};

/// Row for the annotated series table
#[derive(Tabled, Serialize)]
struct BandRow {
    #[tabled(rename = "Timestamp")]
    ts: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Q25")]
    q25: String,
    #[tabled(rename = "Q75")]
    q75: String,
    #[tabled(rename = "IQR")]
    iqr: String,
    #[tabled(rename = "Low")]
    low: String,
    #[tabled(rename = "Up")]
    up: String,
    #[tabled(rename = "")]
    flag: String,
}

impl From<&AnnotatedPoint> for BandRow {
    fn from(point: &AnnotatedPoint) -> Self {
        let flag = match (point.low, point.up) {
            (Some(low), Some(up)) if point.value < low || point.value > up => "!".to_string(),
            _ => String::new(),
        };
        Self {
            ts: point.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            value: format!("{:.2}", point.value),
            q25: format_value(point.q25),
            q75: format_value(point.q75),
            iqr: format_value(point.iqr),
            low: format_value(point.low),
            up: format_value(point.up),
            flag,
        }
    }
}

/// Run the detector over one series file
pub fn detect_file(
    path: &Path,
    detector: IqrDetector,
    metric: Option<TrackedMetric>,
    tail: usize,
    format: OutputFormat,
) -> Result<()> {
    let series = load_series(path)?;
    let detection = detector
        .detect(&series)
        .with_context(|| format!("Cannot evaluate {}", path.display()))?;

    match format {
        OutputFormat::Json => print_json(&detection)?,
        OutputFormat::Table => {
            let skip = detection.series.len().saturating_sub(tail);
            let rows: Vec<BandRow> = detection.series[skip..].iter().map(BandRow::from).collect();
            print_info(&format!(
                "{} points, sensitivity {}, smoothing window {}",
                detection.series.len(),
                detector.sensitivity,
                detector.smoothing_window
            ));
            print_table(&rows, format);
            print_verdict(detection.verdict);

            if let Some(metric) = metric {
                if let Some(report) = AlertReport::from_detection(metric, &detection) {
                    println!();
                    println!("{}", report.message().bold());
                }
            }
        }
    }

    Ok(())
}
