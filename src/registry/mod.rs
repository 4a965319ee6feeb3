//! Shared node registry.
//!
//! The registry is the only shared mutable resource in the cluster: one row
//! per node plus the cluster-wide failover delay. Every process writes its
//! own row and reads all rows; there is no direct peer RPC. The mutual
//! exclusion invariant (at most one `active` node) rests entirely on
//! [`NodeRegistry::try_promote`], which is a compare-and-swap over the
//! "who is active" slot: the write commits only if no other fresh `active`
//! row exists at commit time. First successful writer wins; losing the race
//! is an expected outcome, not an error.

mod memory;
mod rocks;

pub use memory::MemoryRegistry;
pub use rocks::RocksRegistry;

use crate::error::Result;
use crate::types::{NodeRecord, NodeStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Outcome of a promotion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionOutcome {
    /// This node now holds the active slot.
    Promoted,
    /// Another node holds a fresh active row; remain standby.
    Lost {
        /// Name of the node that holds the slot.
        current_active: String,
    },
}

/// Durable, concurrently-accessed store of node state.
///
/// Implementations serialize `try_promote` internally so that concurrent
/// promotion attempts cannot both succeed.
#[async_trait]
pub trait NodeRegistry: Send + Sync {
    /// Create or replace a node's row. Used by the owning process at startup.
    async fn upsert(&self, record: NodeRecord) -> Result<()>;

    /// Refresh the owning node's heartbeat timestamp and status.
    async fn heartbeat(&self, name: &str, status: NodeStatus, now: DateTime<Utc>) -> Result<()>;

    /// Fetch a single row by name.
    async fn get(&self, name: &str) -> Result<Option<NodeRecord>>;

    /// Fetch all rows.
    async fn list(&self) -> Result<Vec<NodeRecord>>;

    /// Atomically claim the active slot for `name`.
    ///
    /// Succeeds only if no *other* row is `active` with a heartbeat younger
    /// than `failover_delay`. On success the node's row is rewritten as
    /// `active` with `last_seen = now`.
    async fn try_promote(
        &self,
        name: &str,
        failover_delay: Duration,
        now: DateTime<Utc>,
    ) -> Result<PromotionOutcome>;

    /// Overwrite a node's status, leaving the heartbeat timestamp alone.
    ///
    /// Used for the self `stopped` write on shutdown and for the peer
    /// `unavailable` marking.
    async fn set_status(&self, name: &str, status: NodeStatus) -> Result<()>;

    /// Remove a node's row. Administrative path only.
    async fn remove(&self, name: &str) -> Result<()>;

    /// Current cluster-wide failover delay.
    async fn failover_delay(&self) -> Result<Duration>;

    /// Replace the cluster-wide failover delay.
    async fn set_failover_delay(&self, delay: Duration) -> Result<()>;
}
