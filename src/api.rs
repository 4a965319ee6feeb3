//! Read-only node query API.
//!
//! Backs the `hanode.get` control command: a filtered read-through to the
//! registry with no caching, so answers always reflect current rows.

use crate::error::Result;
use crate::registry::NodeRegistry;
use crate::types::{NodeRecord, NodeStatus};
use serde::{Deserialize, Serialize};

/// Filter for node queries. Empty filter matches every node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFilter {
    /// Match a single node by exact name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Match nodes by status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeStatus>,
}

impl NodeFilter {
    fn matches(&self, record: &NodeRecord) -> bool {
        if let Some(name) = &self.name {
            if record.name != *name {
                return false;
            }
        }
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        true
    }
}

/// List node records matching the filter, ordered by name.
pub async fn get_nodes(
    registry: &dyn NodeRegistry,
    filter: &NodeFilter,
) -> Result<Vec<NodeRecord>> {
    let records = registry.list().await?;
    Ok(records.into_iter().filter(|r| filter.matches(r)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;
    use chrono::Utc;

    async fn seeded_registry() -> MemoryRegistry {
        let registry = MemoryRegistry::new();
        let now = Utc::now();

        for (name, status) in [
            ("node1", NodeStatus::Active),
            ("node2", NodeStatus::Standby),
            ("node3", NodeStatus::Unavailable),
        ] {
            let mut record = NodeRecord::new(name, Some("localhost:10051".to_string()), now);
            record.status = status;
            registry.upsert(record).await.unwrap();
        }

        registry
    }

    #[tokio::test]
    async fn test_empty_filter_returns_all() {
        let registry = seeded_registry().await;
        let nodes = get_nodes(&registry, &NodeFilter::default()).await.unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].name, "node1");
    }

    #[tokio::test]
    async fn test_filter_by_name() {
        let registry = seeded_registry().await;
        let filter = NodeFilter {
            name: Some("node2".to_string()),
            status: None,
        };

        let nodes = get_nodes(&registry, &filter).await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].status, NodeStatus::Standby);
    }

    #[tokio::test]
    async fn test_filter_by_status() {
        let registry = seeded_registry().await;
        let filter = NodeFilter {
            name: None,
            status: Some(NodeStatus::Unavailable),
        };

        let nodes = get_nodes(&registry, &filter).await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "node3");
    }

    #[tokio::test]
    async fn test_filter_no_match() {
        let registry = seeded_registry().await;
        let filter = NodeFilter {
            name: Some("node2".to_string()),
            status: Some(NodeStatus::Active),
        };

        let nodes = get_nodes(&registry, &filter).await.unwrap();
        assert!(nodes.is_empty());
    }
}
