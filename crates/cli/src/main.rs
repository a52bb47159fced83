//! Anomaly detector CLI
//!
//! Runs the rolling IQR detector over series and frames stored as JSON,
//! for tuning sensitivity and smoothing before changing the agent config.

mod commands;
mod input;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{detect, evaluate};
use detector_lib::{
    anomaly::{DEFAULT_SENSITIVITY, DEFAULT_SMOOTHING_WINDOW},
    IqrDetector, TrackedMetric,
};
use std::path::PathBuf;

/// Anomaly detector CLI
#[derive(Parser)]
#[command(name = "anomaly")]
#[command(author, version, about = "CLI for the rolling IQR anomaly detector", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Band width multiplier applied to the IQR
    #[arg(long, short = 'a', global = true, default_value_t = DEFAULT_SENSITIVITY)]
    pub sensitivity: f64,

    /// Width of the centered moving average applied to the bounds
    #[arg(long, short = 'n', global = true, default_value_t = DEFAULT_SMOOTHING_WINDOW)]
    pub smoothing: usize,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate a single series
    Detect {
        /// JSON array of {"ts", "value"} points (`-` for stdin)
        #[arg(long)]
        file: PathBuf,

        /// Metric name used to render the alert message
        #[arg(long, short)]
        metric: Option<TrackedMetric>,

        /// Number of trailing points to show
        #[arg(long, default_value_t = 20)]
        tail: usize,
    },

    /// Evaluate every tracked metric of a frame
    Evaluate {
        /// JSON array of rows with ts, users_qty, views, likes and ctr (`-` for stdin)
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let detector = IqrDetector::new(cli.sensitivity, cli.smoothing);
    detector.validate()?;

    match cli.command {
        Commands::Detect { file, metric, tail } => {
            detect::detect_file(&file, detector, metric, tail, cli.format)?;
        }
        Commands::Evaluate { file } => {
            evaluate::evaluate_file(&file, detector, cli.format).await?;
        }
    }

    Ok(())
}
