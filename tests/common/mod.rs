//! Shared helpers for integration tests.
//!
//! Clusters are simulated in-process: several managers share one registry,
//! which is exactly the coupling real nodes have. Timings are scaled to
//! milliseconds so failover scenarios complete quickly.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use vigil::config::{HaTimingConfig, NodeConfig};
use vigil::error::{HaError, Result};
use vigil::events::{HaEvent, HaEventBus};
use vigil::ha::HaManager;
use vigil::registry::{MemoryRegistry, NodeRegistry, PromotionOutcome};
use vigil::types::{NodeRecord, NodeStatus};

/// Heartbeat/monitor tick used by simulated nodes.
pub const TICK: Duration = Duration::from_millis(20);

/// Failover delay used by simulated clusters.
pub const DELAY: Duration = Duration::from_millis(200);

/// Timings scaled for tests.
pub fn fast_timings() -> HaTimingConfig {
    HaTimingConfig {
        heartbeat_interval: TICK,
        monitor_interval: TICK,
        default_failover_delay: DELAY,
        detection_threshold: None,
    }
}

/// A registry whose live failover delay matches the test timings.
pub fn fast_registry() -> Arc<MemoryRegistry> {
    Arc::new(MemoryRegistry::with_failover_delay(DELAY))
}

/// Create and start a cluster node.
pub async fn start_node(
    name: &str,
    registry: Arc<dyn NodeRegistry>,
    events: HaEventBus,
) -> Arc<HaManager> {
    let node = NodeConfig {
        name: Some(name.to_string()),
        address: Some("localhost:10051".to_string()),
    };
    let manager = HaManager::new(node, fast_timings(), Duration::from_secs(1), registry, events);
    manager.start().await.expect("node failed to start");
    manager
}

/// Registry wrapper that can be switched into a failing or stalled state,
/// modelling a database outage as the manager loops see one.
pub struct UnreliableRegistry {
    inner: MemoryRegistry,
    failing: AtomicBool,
    stalled: AtomicBool,
}

impl UnreliableRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryRegistry::with_failover_delay(DELAY),
            failing: AtomicBool::new(false),
            stalled: AtomicBool::new(false),
        })
    }

    /// Make every subsequent operation return a registry error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every subsequent operation hang forever.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    async fn gate(&self) -> Result<()> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(HaError::Registry("registry offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl NodeRegistry for UnreliableRegistry {
    async fn upsert(&self, record: NodeRecord) -> Result<()> {
        self.gate().await?;
        self.inner.upsert(record).await
    }

    async fn heartbeat(&self, name: &str, status: NodeStatus, now: DateTime<Utc>) -> Result<()> {
        self.gate().await?;
        self.inner.heartbeat(name, status, now).await
    }

    async fn get(&self, name: &str) -> Result<Option<NodeRecord>> {
        self.gate().await?;
        self.inner.get(name).await
    }

    async fn list(&self) -> Result<Vec<NodeRecord>> {
        self.gate().await?;
        self.inner.list().await
    }

    async fn try_promote(
        &self,
        name: &str,
        failover_delay: Duration,
        now: DateTime<Utc>,
    ) -> Result<PromotionOutcome> {
        self.gate().await?;
        self.inner.try_promote(name, failover_delay, now).await
    }

    async fn set_status(&self, name: &str, status: NodeStatus) -> Result<()> {
        self.gate().await?;
        self.inner.set_status(name, status).await
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.gate().await?;
        self.inner.remove(name).await
    }

    async fn failover_delay(&self) -> Result<Duration> {
        self.gate().await?;
        self.inner.failover_delay().await
    }

    async fn set_failover_delay(&self, delay: Duration) -> Result<()> {
        self.gate().await?;
        self.inner.set_failover_delay(delay).await
    }
}

/// Collects published events and waits for specific rendered lines.
///
/// External tooling observes the coordinator through its log lines; tests
/// assert through the same rendered strings.
pub struct EventCollector {
    rx: broadcast::Receiver<HaEvent>,
}

impl EventCollector {
    pub fn new(events: &HaEventBus) -> Self {
        Self {
            rx: events.subscribe(),
        }
    }

    /// Wait until an event renders to a line containing `fragment`.
    pub async fn wait_for(&mut self, fragment: &str, timeout: Duration) -> HaEvent {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline
                .checked_duration_since(tokio::time::Instant::now())
                .unwrap_or_else(|| panic!("no event containing {:?} within {:?}", fragment, timeout));

            match tokio::time::timeout(remaining, self.rx.recv()).await {
                Ok(Ok(event)) => {
                    if event.to_string().contains(fragment) {
                        return event;
                    }
                }
                // A lagged receiver dropped old events; newer ones still come.
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => {
                    panic!("no event containing {:?} within {:?}", fragment, timeout)
                }
            }
        }
    }
}
