//! Whole-frame evaluation of every tracked metric

use anyhow::Result;
use colored::Colorize;
use detector_lib::{
    notify::LogSink, source::StaticSource, EvaluationRunner, IqrDetector, MetricOutcome,
    StructuredLogger,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tabled::Tabled;

use crate::input::load_frame;
use crate::output::{color_label, print_json, print_table, print_warning, OutputFormat};

/// Row for the per-metric outcome table
#[derive(Tabled, Serialize)]
struct OutcomeRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

/// Evaluate all tracked metrics of one frame file
///
/// Alerts go to the log sink only; nothing is delivered.
pub async fn evaluate_file(path: &Path, detector: IqrDetector, format: OutputFormat) -> Result<()> {
    let frame = load_frame(path)?;
    if frame.is_empty() {
        print_warning("Frame is empty, every metric will be not evaluable");
    }

    let runner = EvaluationRunner::new(
        Arc::new(StaticSource::new(frame)),
        Arc::new(LogSink),
        detector,
        StructuredLogger::new("cli"),
    );
    let summary = runner.run_once().await?;

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => {
            let rows: Vec<OutcomeRow> = summary
                .evaluations
                .iter()
                .map(|e| OutcomeRow {
                    metric: e.metric.to_string(),
                    outcome: color_label(e.outcome.label()),
                    detail: match &e.outcome {
                        MetricOutcome::InvalidInput { error } => error.clone(),
                        MetricOutcome::DeliveryFailed { error, .. } => error.clone(),
                        _ => String::new(),
                    },
                })
                .collect();
            print_table(&rows, format);

            for evaluation in &summary.evaluations {
                if let MetricOutcome::Alerted { message } = &evaluation.outcome {
                    println!();
                    println!("{}", message.bold());
                }
            }
        }
    }

    Ok(())
}
