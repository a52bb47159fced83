//! Probe and scrape endpoints of the agent
//!
//! `/healthz` reports component health and flags a scheduler that has not
//! completed a run within two cadences. `/readyz` follows the registry's
//! readiness. `/metrics` serves the detector metrics in Prometheus text form.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use detector_lib::{
    health::{components, ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse},
    observability::DetectorMetrics,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Runs missed before the scheduler is reported as overdue
const OVERDUE_AFTER_CADENCES: u32 = 2;

/// State shared by the probe handlers
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: DetectorMetrics,
    cadence: Duration,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, cadence: Duration) -> Self {
        Self {
            health_registry,
            metrics: DetectorMetrics::new(),
            cadence,
        }
    }

    /// Registry health, with the scheduler degraded when runs are overdue
    pub async fn health(&self, now: DateTime<Utc>) -> HealthResponse {
        let mut health = self.health_registry.health().await;

        if let Some(last_run) = health.last_run {
            if is_overdue(last_run, now, self.cadence) {
                let idle = (now - last_run).num_seconds();
                health.components.insert(
                    components::SCHEDULER.to_string(),
                    ComponentHealth::degraded(format!("No run completed for {}s", idle)),
                );
                health.status = HealthResponse::compute_status(&health.components);
            }
        }

        health
    }
}

/// Whether the last completed run is older than the allowed idle period
fn is_overdue(last_run: DateTime<Utc>, now: DateTime<Utc>, cadence: Duration) -> bool {
    let allowed = cadence.saturating_mul(OVERDUE_AFTER_CADENCES);
    match (now - last_run).to_std() {
        Ok(idle) => idle > allowed,
        Err(_) => false,
    }
}

/// Probe status code: degraded still answers 200 since the next run may recover
fn probe_status(status: ComponentStatus) -> StatusCode {
    if status.is_operational() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health(Utc::now()).await;
    (probe_status(health.status), Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Bind `port` on all interfaces and serve until the listener fails
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, create_router(state)).await?;

    Ok(())
}
