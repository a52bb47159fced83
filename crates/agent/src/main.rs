//! Anomaly Agent - scheduled metric anomaly alerting
//!
//! Fetches the trailing day of aggregate feed metrics every quarter hour,
//! runs the rolling IQR detector on each metric and posts alerts to chat.

use anomaly_agent::{api, config::AgentConfig};
use anyhow::Result;
use clap::Parser;
use detector_lib::{
    health::{components, HealthRegistry},
    notify::{LogSink, NotificationSink, TelegramSink},
    observability::StructuredLogger,
    pipeline::{EvaluationRunner, RunScheduler},
    source::{ClickHouseSource, MetricSource},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "anomaly-agent", version, about = "Scheduled metric anomaly alerting agent")]
struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "AGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Run a single evaluation, print the summary and exit
    #[arg(long)]
    once: bool,

    /// Log alerts instead of sending them to chat
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = AgentConfig::load(cli.config.as_deref())?;
    info!(
        instance = %config.instance_name,
        cadence_secs = config.cadence_secs,
        sensitivity = config.detector.sensitivity,
        smoothing_window = config.detector.smoothing_window,
        "Agent configured"
    );

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::SOURCE).await;
    health_registry.register(components::NOTIFIER).await;
    health_registry.register(components::SCHEDULER).await;

    let logger = StructuredLogger::new(&config.instance_name);

    // Wire collaborators from explicit configuration
    let source: Arc<dyn MetricSource> = Arc::new(ClickHouseSource::new(config.clickhouse.clone())?);
    let sink: Arc<dyn NotificationSink> = match (&config.telegram, cli.dry_run) {
        (Some(telegram), false) => Arc::new(TelegramSink::new(telegram)?),
        _ => Arc::new(LogSink),
    };
    logger.log_startup(AGENT_VERSION, source.name(), sink.name());

    let runner = Arc::new(
        EvaluationRunner::new(source, sink, config.detector, logger.clone())
            .with_health(health_registry.clone()),
    );

    if cli.once {
        let summary = runner.run_once().await?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    // Create shared application state
    let app_state = Arc::new(api::AppState::new(health_registry.clone(), config.cadence()));
    health_registry.set_ready(true).await;

    // Start health and metrics server
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Start the evaluation scheduler
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let scheduler = RunScheduler::new(runner, config.cadence())
        .with_run_on_start(config.run_on_start)
        .with_health(health_registry.clone());
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    // Wait for shutdown signal or API server failure
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            logger.log_shutdown("SIGINT received");
        }
        result = api_handle => {
            match result {
                Ok(Err(e)) => error!(error = %e, "API server failed"),
                Err(e) => error!(error = %e, "API server task panicked"),
                Ok(Ok(())) => {}
            }
            logger.log_shutdown("API server stopped");
        }
    }

    health_registry.set_ready(false).await;
    let _ = shutdown_tx.send(());
    if let Err(e) = scheduler_handle.await {
        error!(error = %e, "Scheduler task panicked");
    }
    info!("Shutting down");

    Ok(())
}
