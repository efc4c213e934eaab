use crate::error::{GatekeeperError, Result};
use crate::rate_limit::types::Decision;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use tracing::{debug, info};

/// Metrics service for collecting and exposing Prometheus metrics
#[derive(Clone)]
pub struct MetricsService {
    handle: Arc<PrometheusHandle>,
}

impl MetricsService {
    /// Install the global Prometheus recorder
    pub fn new() -> Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            GatekeeperError::Internal(format!("Failed to install metrics recorder: {}", e))
        })?;

        Self::register_metrics();

        info!("Metrics service initialized successfully");

        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    fn register_metrics() {
        describe_counter!(
            "gatekeeper_admissions_total",
            "Admission decisions, labelled by decision"
        );
        describe_counter!(
            "gatekeeper_violations_total",
            "Quota violations recorded against clients"
        );
        describe_counter!(
            "gatekeeper_blocks_total",
            "Block entries created, labelled by kind (manual or automatic)"
        );
        describe_counter!(
            "gatekeeper_store_errors_total",
            "Counter store operations that failed"
        );

        debug!("All metrics registered with descriptions");
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Metrics endpoint handler
pub async fn metrics_handler(State(service): State<MetricsService>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        service.render(),
    )
}

/// Record an admission decision
pub fn record_admission(decision: Decision) {
    counter!("gatekeeper_admissions_total", "decision" => decision.as_str()).increment(1);
}

/// Record a quota violation
pub fn record_violation() {
    counter!("gatekeeper_violations_total").increment(1);
}

/// Record a new block entry
pub fn record_block(automatic: bool) {
    let kind = if automatic { "automatic" } else { "manual" };
    counter!("gatekeeper_blocks_total", "kind" => kind).increment(1);
}

/// Record a failed store operation
pub fn record_store_error() {
    counter!("gatekeeper_store_errors_total").increment(1);
}
