//! HA event bus and the legacy log-line contract.
//!
//! Mode switches, node removal and failover-delay changes are observed by
//! external tooling through exact log lines. Rather than scattering string
//! formatting across the coordinator, every observable transition is a
//! structured [`HaEvent`]; the `Display` impl is the rendering layer that
//! produces the contract strings, and [`HaEventBus::publish`] emits the
//! rendered line through `tracing` while fanning the structured event out to
//! in-process subscribers.
//!
//! The rendered strings are load-bearing: administrators' log-watching
//! tooling matches them verbatim. Change them only with a migration plan.

use crate::types::{duration, NodeStatus};
use std::fmt;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

/// Capacity of the broadcast channel behind the bus.
const EVENT_BUS_CAPACITY: usize = 64;

/// An observable HA state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaEvent {
    /// The HA manager finished its bootstrap.
    ManagerStarted,
    /// The server came up outside any cluster.
    StandaloneStarted,
    /// A node joined the cluster in the given mode.
    NodeStarted { name: String, mode: NodeStatus },
    /// A standby promoted itself to active.
    SwitchedToActive { name: String },
    /// An administrator removed a node from the registry.
    NodeRemoved { name: String },
    /// The cluster-wide failover delay was changed at runtime.
    FailoverDelaySet { delay: Duration },
}

impl fmt::Display for HaEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaEvent::ManagerStarted => write!(f, "HA manager started"),
            HaEvent::StandaloneStarted => write!(f, "standalone node started"),
            HaEvent::NodeStarted { name, mode } => {
                write!(f, "\"{}\" node started in \"{}\" mode", name, mode)
            }
            HaEvent::SwitchedToActive { name } => {
                write!(f, "\"{}\" node switched to \"active\" mode", name)
            }
            HaEvent::NodeRemoved { name } => write!(f, "removed node \"{}\"", name),
            HaEvent::FailoverDelaySet { delay } => {
                write!(f, "HA failover delay set to {}", duration::format(*delay))
            }
        }
    }
}

/// Broadcast bus for HA events.
///
/// Cheap to clone; all clones publish into the same channel.
#[derive(Clone)]
pub struct HaEventBus {
    tx: broadcast::Sender<HaEvent>,
}

impl HaEventBus {
    /// Create a new event bus.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self { tx }
    }

    /// Publish an event: log the contract line and fan out to subscribers.
    pub fn publish(&self, event: HaEvent) {
        info!("{}", event);
        // No subscribers is fine; the log line is the primary contract.
        let _ = self.tx.send(event);
    }

    /// Subscribe to subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<HaEvent> {
        self.tx.subscribe()
    }
}

impl Default for HaEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_strings() {
        assert_eq!(HaEvent::ManagerStarted.to_string(), "HA manager started");
        assert_eq!(
            HaEvent::StandaloneStarted.to_string(),
            "standalone node started"
        );
        assert_eq!(
            HaEvent::NodeStarted {
                name: "node1".into(),
                mode: NodeStatus::Active
            }
            .to_string(),
            "\"node1\" node started in \"active\" mode"
        );
        assert_eq!(
            HaEvent::NodeStarted {
                name: "node2".into(),
                mode: NodeStatus::Standby
            }
            .to_string(),
            "\"node2\" node started in \"standby\" mode"
        );
        assert_eq!(
            HaEvent::SwitchedToActive {
                name: "node2".into()
            }
            .to_string(),
            "\"node2\" node switched to \"active\" mode"
        );
        assert_eq!(
            HaEvent::NodeRemoved {
                name: "node1".into()
            }
            .to_string(),
            "removed node \"node1\""
        );
        assert_eq!(
            HaEvent::FailoverDelaySet {
                delay: Duration::from_secs(10)
            }
            .to_string(),
            "HA failover delay set to 10s"
        );
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = HaEventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(HaEvent::ManagerStarted);
        bus.publish(HaEvent::SwitchedToActive {
            name: "node2".into(),
        });

        assert_eq!(rx.recv().await.unwrap(), HaEvent::ManagerStarted);
        assert_eq!(
            rx.recv().await.unwrap(),
            HaEvent::SwitchedToActive {
                name: "node2".into()
            }
        );
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = HaEventBus::new();
        bus.publish(HaEvent::ManagerStarted);
    }
}
