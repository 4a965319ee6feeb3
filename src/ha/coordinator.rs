//! Failover decision logic.
//!
//! Pure evaluation of the cluster view, kept free of I/O so promotion policy
//! is testable without a registry or clock. The coordinator only decides
//! whether a promotion should be *attempted*; the registry CAS is the
//! arbiter of who actually wins.

use crate::types::{NodeRecord, NodeStatus};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Decision produced by one evaluation of the cluster view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverDecision {
    /// This node already holds the active slot.
    AlreadyActive,
    /// A fresh active node exists; keep waiting.
    RemainStandby,
    /// The active slot is empty or stale; race for it.
    AttemptPromotion,
}

/// Evaluates promotion policy for one node.
#[derive(Debug, Clone)]
pub struct FailoverCoordinator {
    node_name: String,
}

impl FailoverCoordinator {
    /// Create a coordinator for the named node.
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    /// Name of the node this coordinator decides for.
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Decide what this node should do given the current cluster view.
    pub fn decide(
        &self,
        view: &[NodeRecord],
        own_mode: NodeStatus,
        failover_delay: Duration,
        now: DateTime<Utc>,
    ) -> FailoverDecision {
        if own_mode == NodeStatus::Active {
            return FailoverDecision::AlreadyActive;
        }

        let fresh_active = view.iter().any(|r| {
            r.status == NodeStatus::Active
                && r.name != self.node_name
                && !r.is_stale(failover_delay, now)
        });

        if fresh_active {
            FailoverDecision::RemainStandby
        } else {
            FailoverDecision::AttemptPromotion
        }
    }

    /// Peers whose heartbeat is stale past the detection threshold and that
    /// still look like cluster members. The active node flags these as
    /// `unavailable` so status queries reflect the outage before (or
    /// independently of) any failover.
    pub fn stale_peers<'a>(
        &self,
        view: &'a [NodeRecord],
        detection_threshold: Duration,
        now: DateTime<Utc>,
    ) -> Vec<&'a NodeRecord> {
        view.iter()
            .filter(|r| {
                r.name != self.node_name
                    && r.status.is_member()
                    && r.is_stale(detection_threshold, now)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_secs(10);

    fn record(name: &str, status: NodeStatus, age_secs: i64, now: DateTime<Utc>) -> NodeRecord {
        NodeRecord {
            name: name.to_string(),
            address: None,
            status,
            last_seen: now - chrono::Duration::seconds(age_secs),
        }
    }

    #[test]
    fn test_already_active() {
        let now = Utc::now();
        let coordinator = FailoverCoordinator::new("node1");
        let view = vec![record("node1", NodeStatus::Active, 0, now)];

        assert_eq!(
            coordinator.decide(&view, NodeStatus::Active, DELAY, now),
            FailoverDecision::AlreadyActive
        );
    }

    #[test]
    fn test_remain_standby_behind_fresh_active() {
        let now = Utc::now();
        let coordinator = FailoverCoordinator::new("node2");
        let view = vec![
            record("node1", NodeStatus::Active, 2, now),
            record("node2", NodeStatus::Standby, 0, now),
        ];

        assert_eq!(
            coordinator.decide(&view, NodeStatus::Standby, DELAY, now),
            FailoverDecision::RemainStandby
        );
    }

    #[test]
    fn test_promote_when_no_active() {
        let now = Utc::now();
        let coordinator = FailoverCoordinator::new("node2");
        let view = vec![
            record("node1", NodeStatus::Stopped, 0, now),
            record("node2", NodeStatus::Standby, 0, now),
        ];

        assert_eq!(
            coordinator.decide(&view, NodeStatus::Standby, DELAY, now),
            FailoverDecision::AttemptPromotion
        );
    }

    #[test]
    fn test_promote_when_active_stale() {
        let now = Utc::now();
        let coordinator = FailoverCoordinator::new("node2");
        let view = vec![
            record("node1", NodeStatus::Active, 30, now),
            record("node2", NodeStatus::Standby, 0, now),
        ];

        assert_eq!(
            coordinator.decide(&view, NodeStatus::Standby, DELAY, now),
            FailoverDecision::AttemptPromotion
        );
    }

    #[test]
    fn test_active_age_right_at_delay_is_fresh() {
        let now = Utc::now();
        let coordinator = FailoverCoordinator::new("node2");
        // Staleness requires age strictly beyond the delay.
        let view = vec![record("node1", NodeStatus::Active, 10, now)];

        assert_eq!(
            coordinator.decide(&view, NodeStatus::Standby, DELAY, now),
            FailoverDecision::RemainStandby
        );
    }

    #[test]
    fn test_own_stale_active_row_does_not_block() {
        let now = Utc::now();
        let coordinator = FailoverCoordinator::new("node1");
        // A crash can leave this node's own row marked active. Re-claiming
        // it must not be blocked by that row.
        let view = vec![record("node1", NodeStatus::Active, 30, now)];

        assert_eq!(
            coordinator.decide(&view, NodeStatus::Standby, DELAY, now),
            FailoverDecision::AttemptPromotion
        );
    }

    #[test]
    fn test_stale_peers() {
        let now = Utc::now();
        let coordinator = FailoverCoordinator::new("node1");
        let view = vec![
            record("node1", NodeStatus::Active, 0, now),
            record("node2", NodeStatus::Standby, 30, now),
            record("node3", NodeStatus::Standby, 2, now),
            record("node4", NodeStatus::Stopped, 30, now),
            record("node5", NodeStatus::Unavailable, 30, now),
        ];

        let stale = coordinator.stale_peers(&view, DELAY, now);
        // Stopped and already-unavailable rows are left alone.
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].name, "node2");
    }
}
