//! Vigil - High availability coordinator for server clusters.
//!
//! Vigil keeps exactly one server in a cluster acting as the active node.
//! Every node registers a row in a shared registry and refreshes it with
//! heartbeats; standby nodes watch the active row and promote themselves
//! through a compare-and-swap once the active has been silent for longer
//! than the failover delay. A server started without a node name runs
//! standalone, outside any cluster.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                        Vigil                           │
//! ├────────────────────────────────────────────────────────┤
//! │  Runtime Control: unix socket | ha_status | hanode.get │
//! ├────────────────────────────────────────────────────────┤
//! │  HA Manager: heartbeat loop | monitor loop | failover  │
//! ├────────────────────────────────────────────────────────┤
//! │  Node Registry: RocksDB rows | promotion CAS | delay   │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use vigil::config::VigilConfig;
//!
//! #[tokio::main]
//! async fn main() -> vigil::Result<()> {
//!     let config = VigilConfig::development(std::path::Path::new("/tmp/vigil"));
//!     vigil::run(config).await
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod ha;
pub mod observability;
pub mod registry;
pub mod shutdown;
pub mod types;

// Re-exports
pub use error::{HaError, Result};
pub use types::*;

use config::VigilConfig;
use ha::HaManager;
use registry::{NodeRegistry, RocksRegistry};
use shutdown::{ShutdownCoordinator, SignalHandler};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Run the Vigil server with the given configuration.
pub async fn run(config: VigilConfig) -> Result<()> {
    observability::init(&config.observability)?;

    match &config.node.name {
        Some(name) => info!(node = %name, "Starting Vigil node"),
        None => info!("Starting Vigil in standalone mode"),
    }

    std::fs::create_dir_all(&config.registry.path)?;
    std::fs::create_dir_all(&config.control.socket_dir)?;

    let registry: Arc<dyn NodeRegistry> = Arc::new(RocksRegistry::open_with_default_delay(
        &config.registry.path,
        config.registry.cache_size,
        config.ha.default_failover_delay,
    )?);
    let events = events::HaEventBus::new();

    let manager = HaManager::new(
        config.node.clone(),
        config.ha.clone(),
        config.registry.op_timeout,
        Arc::clone(&registry),
        events.clone(),
    );
    manager.start().await?;

    let coordinator = ShutdownCoordinator::new();

    let control = control::ControlServer::new(
        config.control.socket_path(),
        Arc::clone(&registry),
        events.clone(),
        coordinator.clone(),
    );
    let control_handle = tokio::spawn(async move {
        if let Err(e) = control.run().await {
            error!("Control server error: {}", e);
        }
    });

    let metrics_handle = if config.observability.metrics_enabled {
        let obs_config = config.observability.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = observability::run_metrics_server(obs_config).await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    let signal_coordinator = coordinator.clone();
    tokio::spawn(async move {
        SignalHandler::new(signal_coordinator).run().await;
    });

    coordinator.wait_for_shutdown().await;

    info!("Shutting down Vigil gracefully...");

    manager.stop().await;
    let _ = control_handle.await;

    if let Some(handle) = metrics_handle {
        if !handle.is_finished() {
            warn!("Force aborting metrics server");
            handle.abort();
        }
    }

    info!("Vigil shutdown complete");
    Ok(())
}
