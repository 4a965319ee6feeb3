//! Error types for the Vigil HA coordinator.
//!
//! All operations return [`Result`], a type alias over [`HaError`]. Errors
//! fall into a few categories: registry access, promotion/coordination,
//! runtime control, and configuration. [`HaError::is_retryable`] tells the
//! loops which failures are transient.

use std::io;
use thiserror::Error;

/// Main error type for HA operations.
#[derive(Error, Debug)]
pub enum HaError {
    // Registry errors
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("RocksDB error: {0}")]
    RocksDb(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Registry operation timed out after {0:?}")]
    RegistryTimeout(std::time::Duration),

    // Coordination errors
    #[error("Cannot remove the active node: {0}")]
    NodeActive(String),

    #[error("Node is still running: {0}")]
    NodeAlive(String),

    // Runtime control errors
    #[error("Unknown runtime control command: {0}")]
    UnknownCommand(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Failover delay out of range: {0} (allowed {1}..{2})")]
    FailoverDelayOutOfRange(String, String, String),

    #[error("Control socket error: {0}")]
    ControlSocket(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // External errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HaError {
    /// Check if the error is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HaError::Registry(_) | HaError::RegistryTimeout(_) | HaError::Io(_)
        )
    }
}

impl From<rocksdb::Error> for HaError {
    fn from(e: rocksdb::Error) -> Self {
        HaError::RocksDb(e.to_string())
    }
}

impl From<bincode::Error> for HaError {
    fn from(e: bincode::Error) -> Self {
        HaError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for HaError {
    fn from(e: serde_json::Error) -> Self {
        HaError::Serialization(e.to_string())
    }
}

/// Result type alias for HA operations.
pub type Result<T> = std::result::Result<T, HaError>;
