//! Per-process HA manager.

use super::{FailoverCoordinator, FailoverDecision};
use crate::config::{HaTimingConfig, NodeConfig};
use crate::error::{HaError, Result};
use crate::events::{HaEvent, HaEventBus};
use crate::observability;
use crate::registry::{NodeRegistry, PromotionOutcome};
use crate::shutdown::ShutdownCoordinator;
use crate::types::{NodeRecord, NodeStatus, STANDALONE_NODE_NAME};
use chrono::Utc;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tracing::{debug, error, warn};

/// This process's participation in the HA cluster.
///
/// Owns the heartbeat and monitor loops; all coordination with peers goes
/// through the shared [`NodeRegistry`]. The local mode mirrors the node's
/// own registry row and is exposed through a watch channel so callers can
/// await mode changes.
pub struct HaManager {
    node_name: String,
    address: Option<String>,
    standalone: bool,
    coordinator: FailoverCoordinator,
    timings: HaTimingConfig,
    op_timeout: Duration,
    registry: Arc<dyn NodeRegistry>,
    events: HaEventBus,
    shutdown: ShutdownCoordinator,
    mode_tx: tokio::sync::watch::Sender<NodeStatus>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl HaManager {
    /// Create a manager for the configured node.
    ///
    /// A node without a configured name participates as a standalone server:
    /// it claims the reserved standalone row and never runs the monitor loop.
    pub fn new(
        node: NodeConfig,
        timings: HaTimingConfig,
        op_timeout: Duration,
        registry: Arc<dyn NodeRegistry>,
        events: HaEventBus,
    ) -> Arc<Self> {
        let standalone = node.name.is_none();
        let node_name = node
            .name
            .unwrap_or_else(|| STANDALONE_NODE_NAME.to_string());
        let (mode_tx, _) = tokio::sync::watch::channel(NodeStatus::Standby);

        Arc::new(Self {
            coordinator: FailoverCoordinator::new(node_name.clone()),
            node_name,
            address: node.address,
            standalone,
            timings,
            op_timeout,
            registry,
            events,
            shutdown: ShutdownCoordinator::new(),
            mode_tx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// This node's name as recorded in the registry.
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Current local mode.
    pub fn mode(&self) -> NodeStatus {
        *self.mode_tx.borrow()
    }

    /// Watch receiver for mode changes.
    pub fn watch_mode(&self) -> tokio::sync::watch::Receiver<NodeStatus> {
        self.mode_tx.subscribe()
    }

    fn set_mode(&self, status: NodeStatus) {
        self.mode_tx.send_replace(status);
    }

    /// Bound a registry operation by the configured timeout so a stalled
    /// registry cannot wedge a loop.
    async fn bounded<T, F>(&self, op: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match timeout(self.op_timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(HaError::RegistryTimeout(self.op_timeout)),
        }
    }

    /// Register this node and start the background loops.
    ///
    /// Decides the startup mode: active if no other node holds a fresh
    /// active row (arbitrated by the registry CAS), standby otherwise.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let now = Utc::now();

        if self.standalone {
            let mut record = NodeRecord::new(&self.node_name, None, now);
            record.status = NodeStatus::Active;
            self.bounded(self.registry.upsert(record)).await?;
            self.set_mode(NodeStatus::Active);
            self.events.publish(HaEvent::StandaloneStarted);

            let heartbeat = tokio::spawn(Arc::clone(self).heartbeat_loop());
            self.tasks.lock().push(heartbeat);
            return Ok(());
        }

        self.events.publish(HaEvent::ManagerStarted);

        let record = NodeRecord::new(&self.node_name, self.address.clone(), now);
        self.bounded(self.registry.upsert(record)).await?;

        let delay = self.bounded(self.registry.failover_delay()).await?;
        let mode = match self
            .bounded(self.registry.try_promote(&self.node_name, delay, now))
            .await?
        {
            PromotionOutcome::Promoted => NodeStatus::Active,
            PromotionOutcome::Lost { current_active } => {
                debug!(active = %current_active, "starting behind an active node");
                NodeStatus::Standby
            }
        };

        self.set_mode(mode);
        self.events.publish(HaEvent::NodeStarted {
            name: self.node_name.clone(),
            mode,
        });

        let heartbeat = tokio::spawn(Arc::clone(self).heartbeat_loop());
        let monitor = tokio::spawn(Arc::clone(self).monitor_loop());
        let mut tasks = self.tasks.lock();
        tasks.push(heartbeat);
        tasks.push(monitor);

        Ok(())
    }

    /// Graceful stop: cancel the loops, then mark the row `stopped` so
    /// peers see the slot free immediately instead of waiting out a timeout.
    pub async fn stop(&self) {
        self.shutdown.shutdown();

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }

        let write = self
            .bounded(
                self.registry
                    .heartbeat(&self.node_name, NodeStatus::Stopped, Utc::now()),
            )
            .await;
        if let Err(e) = write {
            error!(node = %self.node_name, error = %e, "failed to record stopped status");
        }
        self.set_mode(NodeStatus::Stopped);
    }

    /// Crash-style termination: kill the loops without the `stopped` write,
    /// leaving a stale row behind exactly as a SIGKILL would. Peers must
    /// detect the silence via heartbeat timeout.
    pub fn abort(&self) {
        self.shutdown.shutdown();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }

    /// Heartbeat loop: refresh this node's `last_seen` on a fixed interval.
    ///
    /// Sustained registry failure past the configured failover delay forces
    /// self-demotion; a node that cannot prove liveness must never keep
    /// acting as active.
    async fn heartbeat_loop(self: Arc<Self>) {
        let mut shutdown_rx = self.shutdown.subscribe();
        let mut ticker = interval(self.timings.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_ok = Instant::now();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let status = self.mode();
                    let write = self
                        .bounded(self.registry.heartbeat(&self.node_name, status, Utc::now()))
                        .await;

                    match write {
                        Ok(()) => last_ok = Instant::now(),
                        Err(e) => {
                            observability::record_heartbeat_failure();
                            warn!(node = %self.node_name, error = %e, "heartbeat write failed");

                            let tolerance = self.timings.default_failover_delay;
                            if status == NodeStatus::Active && last_ok.elapsed() > tolerance {
                                warn!(
                                    node = %self.node_name,
                                    "registry unreachable beyond tolerance, demoting to standby"
                                );
                                self.set_mode(NodeStatus::Standby);
                            }
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!(node = %self.node_name, "heartbeat loop stopping");
                    break;
                }
            }
        }
    }

    /// Monitor loop: standby nodes watch the active slot and race for it
    /// once it goes stale; the active node flags silent peers.
    async fn monitor_loop(self: Arc<Self>) {
        let mut shutdown_rx = self.shutdown.subscribe();
        let mut ticker = interval(self.timings.monitor_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.monitor_tick().await {
                        if e.is_retryable() {
                            debug!(node = %self.node_name, error = %e, "monitor tick skipped");
                        } else {
                            warn!(node = %self.node_name, error = %e, "monitor tick failed");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!(node = %self.node_name, "monitor loop stopping");
                    break;
                }
            }
        }
    }

    async fn monitor_tick(&self) -> Result<()> {
        let now = Utc::now();
        let delay = self.bounded(self.registry.failover_delay()).await?;
        let view = self.bounded(self.registry.list()).await?;

        let active = view
            .iter()
            .filter(|r| r.status == NodeStatus::Active)
            .count();
        observability::update_cluster_gauges(view.len(), active);

        match self.coordinator.decide(&view, self.mode(), delay, now) {
            FailoverDecision::AlreadyActive => {
                let threshold = self.timings.detection_threshold.unwrap_or(delay);
                for peer in self.coordinator.stale_peers(&view, threshold, now) {
                    warn!(
                        node = %peer.name,
                        age = ?peer.heartbeat_age(now),
                        "peer heartbeat stale, marking unavailable"
                    );
                    self.bounded(
                        self.registry
                            .set_status(&peer.name, NodeStatus::Unavailable),
                    )
                    .await?;
                }
            }
            FailoverDecision::RemainStandby => {}
            FailoverDecision::AttemptPromotion => {
                match self
                    .bounded(self.registry.try_promote(&self.node_name, delay, now))
                    .await?
                {
                    PromotionOutcome::Promoted => {
                        self.set_mode(NodeStatus::Active);
                        observability::record_promotion();
                        self.events.publish(HaEvent::SwitchedToActive {
                            name: self.node_name.clone(),
                        });
                    }
                    PromotionOutcome::Lost { current_active } => {
                        // Lost the race; not an error.
                        debug!(
                            node = %self.node_name,
                            active = %current_active,
                            "promotion lost"
                        );
                    }
                }
            }
        }

        Ok(())
    }
}
