//! In-memory registry implementation.
//!
//! Backs unit and integration tests: sharing one `Arc<MemoryRegistry>`
//! between several managers models N processes sharing one database table.

use super::{NodeRegistry, PromotionOutcome};
use crate::error::{HaError, Result};
use crate::types::{NodeRecord, NodeStatus, DEFAULT_FAILOVER_DELAY};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;

struct State {
    nodes: HashMap<String, NodeRecord>,
    failover_delay: Duration,
}

/// Registry held entirely in process memory.
pub struct MemoryRegistry {
    state: RwLock<State>,
}

impl MemoryRegistry {
    /// Create an empty registry with the default failover delay.
    pub fn new() -> Self {
        Self::with_failover_delay(DEFAULT_FAILOVER_DELAY)
    }

    /// Create an empty registry with a specific failover delay.
    pub fn with_failover_delay(delay: Duration) -> Self {
        Self {
            state: RwLock::new(State {
                nodes: HashMap::new(),
                failover_delay: delay,
            }),
        }
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeRegistry for MemoryRegistry {
    async fn upsert(&self, record: NodeRecord) -> Result<()> {
        let mut state = self.state.write();
        state.nodes.insert(record.name.clone(), record);
        Ok(())
    }

    async fn heartbeat(&self, name: &str, status: NodeStatus, now: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.write();
        let record = state
            .nodes
            .get_mut(name)
            .ok_or_else(|| HaError::NodeNotFound(name.to_string()))?;
        record.status = status;
        record.last_seen = now;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<NodeRecord>> {
        Ok(self.state.read().nodes.get(name).cloned())
    }

    async fn list(&self) -> Result<Vec<NodeRecord>> {
        let state = self.state.read();
        let mut records: Vec<_> = state.nodes.values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    async fn try_promote(
        &self,
        name: &str,
        failover_delay: Duration,
        now: DateTime<Utc>,
    ) -> Result<PromotionOutcome> {
        // Single write lock spans the check and the write: this is the CAS.
        let mut state = self.state.write();

        if let Some(holder) = state
            .nodes
            .values()
            .find(|r| {
                r.status == NodeStatus::Active && r.name != name && !r.is_stale(failover_delay, now)
            })
            .map(|r| r.name.clone())
        {
            return Ok(PromotionOutcome::Lost {
                current_active: holder,
            });
        }

        let record = state
            .nodes
            .get_mut(name)
            .ok_or_else(|| HaError::NodeNotFound(name.to_string()))?;
        record.status = NodeStatus::Active;
        record.last_seen = now;
        Ok(PromotionOutcome::Promoted)
    }

    async fn set_status(&self, name: &str, status: NodeStatus) -> Result<()> {
        let mut state = self.state.write();
        let record = state
            .nodes
            .get_mut(name)
            .ok_or_else(|| HaError::NodeNotFound(name.to_string()))?;
        record.status = status;
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let mut state = self.state.write();
        state
            .nodes
            .remove(name)
            .ok_or_else(|| HaError::NodeNotFound(name.to_string()))?;
        Ok(())
    }

    async fn failover_delay(&self) -> Result<Duration> {
        Ok(self.state.read().failover_delay)
    }

    async fn set_failover_delay(&self, delay: Duration) -> Result<()> {
        self.state.write().failover_delay = delay;
        Ok(())
    }
}
