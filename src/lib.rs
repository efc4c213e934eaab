pub mod api;
pub mod blocklist;
pub mod clock;
pub mod config;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod rate_limit;
pub mod store;

use crate::clock::{Clock, SystemClock};
use crate::config::GatekeeperConfig;
use crate::error::{GatekeeperError, Result};
use crate::metrics::{metrics_handler, MetricsService};
use crate::rate_limit::{AdmissionService, AdmissionState};
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the HTTP application for an admission state
pub fn build_app(state: AdmissionState, metrics: Option<MetricsService>) -> Router {
    let mut app = api::router(state);

    if let Some(metrics) = metrics {
        app = app.merge(
            Router::new()
                .route("/metrics", get(metrics_handler))
                .with_state(metrics),
        );
    }

    app.layer(TraceLayer::new_for_http())
}

/// Initialize the gatekeeper server
pub async fn init_gatekeeper(config: GatekeeperConfig) -> Result<()> {
    // Validate configuration
    config.validate()?;

    info!("Starting gatekeeper");
    info!(
        "Server listening on {}:{}",
        config.server.host, config.server.port
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let kv = store::connect(&config.store, clock.clone()).await?;
    let service = Arc::new(AdmissionService::new(kv, clock, &config));
    info!("Loaded {} tool profiles", config.tools.len());

    let metrics = if config.metrics.enabled {
        Some(MetricsService::new()?)
    } else {
        None
    };

    let state = AdmissionState::new(service, config.identity.clone());
    let app = build_app(state, metrics);

    // Bind and serve
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(GatekeeperError::Io)?;

    info!("Gatekeeper ready to accept connections");

    axum::serve(listener, app)
        .await
        .map_err(|e| GatekeeperError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatekeeper=debug,tower_http=debug".into()),
        )
        .with_target(false)
        .compact()
        .init();
}
