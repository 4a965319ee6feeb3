//! Observability for Vigil.
//!
//! Provides logging initialization and Prometheus metrics.

use crate::config::ObservabilityConfig;
use crate::error::{HaError, Result};
use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging.
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| HaError::Internal(format!("Failed to init logging: {}", e)))?;
    } else {
        subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| HaError::Internal(format!("Failed to init logging: {}", e)))?;
    }

    Ok(())
}

/// Run the Prometheus metrics server.
pub async fn run_metrics_server(config: ObservabilityConfig) -> Result<()> {
    let builder = PrometheusBuilder::new();

    let handle = builder
        .install_recorder()
        .map_err(|e| HaError::Internal(format!("Failed to install metrics recorder: {}", e)))?;

    register_metrics();

    let app = axum::Router::new()
        .route(
            "/metrics",
            axum::routing::get(move || async move { handle.render() }),
        )
        .route("/health", axum::routing::get(|| async { "OK" }));

    let listener = TcpListener::bind(config.metrics_addr).await?;
    info!(addr = %config.metrics_addr, "Metrics server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| HaError::Internal(format!("Metrics server failed: {}", e)))?;

    Ok(())
}

/// Register standard metrics so they render with zero values before the
/// first event.
fn register_metrics() {
    gauge!("vigil_ha_nodes_total").set(0.0);
    gauge!("vigil_ha_nodes_active").set(0.0);

    counter!("vigil_ha_promotions_total").absolute(0);
    counter!("vigil_ha_heartbeat_failures_total").absolute(0);
    counter!("vigil_control_commands_total").absolute(0);
}

/// Record a failed heartbeat write.
pub fn record_heartbeat_failure() {
    counter!("vigil_ha_heartbeat_failures_total").increment(1);
}

/// Record a won promotion to active.
pub fn record_promotion() {
    counter!("vigil_ha_promotions_total").increment(1);
}

/// Record a handled runtime control command.
pub fn record_control_command(command: &str) {
    counter!("vigil_control_commands_total", "command" => command.to_string()).increment(1);
}

/// Update cluster-view gauges from the latest registry listing.
pub fn update_cluster_gauges(nodes_total: usize, nodes_active: usize) {
    gauge!("vigil_ha_nodes_total").set(nodes_total as f64);
    gauge!("vigil_ha_nodes_active").set(nodes_active as f64);
}
