//! Configuration for a Vigil server node.

use crate::error::{HaError, Result};
use crate::types::{duration, DEFAULT_FAILOVER_DELAY, MAX_FAILOVER_DELAY, MIN_FAILOVER_DELAY};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest node name accepted.
const MAX_NODE_NAME_LEN: usize = 64;

/// Registry cache bounds. Outside this range the server refuses to start.
const MIN_REGISTRY_CACHE: u64 = 128 * 1024;
const MAX_REGISTRY_CACHE: u64 = 64 * 1024 * 1024 * 1024;

/// Main configuration for a Vigil node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VigilConfig {
    /// Node identity.
    pub node: NodeConfig,
    /// Shared node registry storage.
    pub registry: RegistryConfig,
    /// HA manager timing.
    pub ha: HaTimingConfig,
    /// Runtime control interface.
    pub control: ControlConfig,
    /// Observability configuration.
    pub observability: ObservabilityConfig,
}

impl VigilConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HaError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| HaError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration. Misconfiguration is fatal at startup:
    /// the server must exit with a diagnosable error, not run degraded.
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.node.name {
            if name.is_empty() {
                return Err(HaError::InvalidConfig {
                    field: "node.name".to_string(),
                    reason: "Node name must not be empty".to_string(),
                });
            }
            if name.len() > MAX_NODE_NAME_LEN {
                return Err(HaError::InvalidConfig {
                    field: "node.name".to_string(),
                    reason: format!("Node name longer than {} characters", MAX_NODE_NAME_LEN),
                });
            }
            if name.contains('"') {
                return Err(HaError::InvalidConfig {
                    field: "node.name".to_string(),
                    reason: "Node name must not contain quotes".to_string(),
                });
            }
        }

        if self.node.name.is_none() && self.node.address.is_some() {
            return Err(HaError::InvalidConfig {
                field: "node.address".to_string(),
                reason: "Node address requires a node name (cluster mode)".to_string(),
            });
        }

        if let Some(address) = &self.node.address {
            let (host, port) = address.rsplit_once(':').ok_or_else(|| HaError::InvalidConfig {
                field: "node.address".to_string(),
                reason: "Expected host:port".to_string(),
            })?;
            if host.is_empty() || port.parse::<u16>().is_err() {
                return Err(HaError::InvalidConfig {
                    field: "node.address".to_string(),
                    reason: "Expected host:port".to_string(),
                });
            }
        }

        if self.registry.cache_size < MIN_REGISTRY_CACHE
            || self.registry.cache_size > MAX_REGISTRY_CACHE
        {
            return Err(HaError::InvalidConfig {
                field: "registry.cache_size".to_string(),
                reason: format!(
                    "Cache size {} outside allowed range {}..{}",
                    self.registry.cache_size, MIN_REGISTRY_CACHE, MAX_REGISTRY_CACHE
                ),
            });
        }

        if self.registry.op_timeout.is_zero() {
            return Err(HaError::InvalidConfig {
                field: "registry.op_timeout".to_string(),
                reason: "Registry timeout must be non-zero".to_string(),
            });
        }

        if self.ha.heartbeat_interval.is_zero() || self.ha.monitor_interval.is_zero() {
            return Err(HaError::InvalidConfig {
                field: "ha.heartbeat_interval".to_string(),
                reason: "Intervals must be non-zero".to_string(),
            });
        }

        if self.ha.default_failover_delay < MIN_FAILOVER_DELAY
            || self.ha.default_failover_delay > MAX_FAILOVER_DELAY
        {
            return Err(HaError::InvalidConfig {
                field: "ha.default_failover_delay".to_string(),
                reason: format!(
                    "Failover delay {} outside allowed range {}..{}",
                    duration::format(self.ha.default_failover_delay),
                    duration::format(MIN_FAILOVER_DELAY),
                    duration::format(MAX_FAILOVER_DELAY)
                ),
            });
        }

        Ok(())
    }

    /// Whether this node runs outside an HA cluster.
    pub fn is_standalone(&self) -> bool {
        self.node.name.is_none()
    }

    /// Create a minimal development configuration rooted at `dir`.
    pub fn development(dir: &Path) -> Self {
        Self {
            node: NodeConfig {
                name: Some("dev-node".to_string()),
                address: Some("localhost:10051".to_string()),
            },
            registry: RegistryConfig {
                path: dir.join("registry"),
                ..RegistryConfig::default()
            },
            ha: HaTimingConfig::default(),
            control: ControlConfig {
                socket_dir: dir.to_path_buf(),
            },
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Node identity configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// HA node name. Absent means the server runs standalone.
    pub name: Option<String>,
    /// Optional `host:port` under which peers can reach this node.
    pub address: Option<String>,
}

/// Shared node registry storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Directory for the registry database.
    pub path: PathBuf,
    /// Row cache size in bytes.
    pub cache_size: u64,
    /// Bound on any single registry operation issued by the manager.
    #[serde(with = "duration")]
    pub op_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/vigil/registry"),
            cache_size: 8 * 1024 * 1024,
            op_timeout: Duration::from_secs(5),
        }
    }
}

/// HA manager timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaTimingConfig {
    /// How often this node refreshes its own heartbeat.
    #[serde(with = "duration")]
    pub heartbeat_interval: Duration,
    /// How often the monitor loop evaluates the cluster view.
    #[serde(with = "duration")]
    pub monitor_interval: Duration,
    /// Failover delay seeded into a fresh registry. The live value is
    /// cluster-wide registry state, mutable via `ha_set_failover_delay`.
    #[serde(with = "duration")]
    pub default_failover_delay: Duration,
    /// Staleness threshold after which the active node marks a peer
    /// `unavailable`. Defaults to the live failover delay when unset;
    /// may be configured faster to shorten the reporting lag.
    #[serde(default, with = "duration::option")]
    pub detection_threshold: Option<Duration>,
}

impl Default for HaTimingConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            monitor_interval: Duration::from_secs(5),
            default_failover_delay: DEFAULT_FAILOVER_DELAY,
            detection_threshold: None,
        }
    }
}

/// Runtime control interface configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Directory holding the control socket.
    pub socket_dir: PathBuf,
}

impl ControlConfig {
    /// Full path of the control socket.
    pub fn socket_path(&self) -> PathBuf {
        self.socket_dir.join("vigil_control.sock")
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            socket_dir: PathBuf::from("/run/vigil"),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics.
    pub metrics_enabled: bool,
    /// Metrics bind address.
    pub metrics_addr: SocketAddr,
    /// Log level.
    pub log_level: String,
    /// Enable JSON logging.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_addr: "0.0.0.0:9090".parse().expect("valid socket address"),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}
