//! Core types shared across the HA subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Registry row name used by a server running outside an HA cluster.
pub const STANDALONE_NODE_NAME: &str = "<standalone server>";

/// Default cluster-wide failover delay.
pub const DEFAULT_FAILOVER_DELAY: Duration = Duration::from_secs(60);

/// Lower bound accepted for the failover delay.
pub const MIN_FAILOVER_DELAY: Duration = Duration::from_secs(10);

/// Upper bound accepted for the failover delay.
pub const MAX_FAILOVER_DELAY: Duration = Duration::from_secs(15 * 60);

/// Status of a node as recorded in the shared registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// The single node authorized to perform primary work.
    Active,
    /// Ready to be promoted, not performing primary work.
    Standby,
    /// Peer-observed label for a node whose heartbeat went stale.
    Unavailable,
    /// Set by the node itself on graceful shutdown.
    Stopped,
}

impl NodeStatus {
    /// Whether this status counts as cluster membership (active or standby).
    pub fn is_member(&self) -> bool {
        matches!(self, NodeStatus::Active | NodeStatus::Standby)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeStatus::Active => "active",
            NodeStatus::Standby => "standby",
            NodeStatus::Unavailable => "unavailable",
            NodeStatus::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

impl FromStr for NodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(NodeStatus::Active),
            "standby" => Ok(NodeStatus::Standby),
            "unavailable" => Ok(NodeStatus::Unavailable),
            "stopped" => Ok(NodeStatus::Stopped),
            other => Err(format!("unknown node status: {}", other)),
        }
    }
}

/// One row of the shared node registry.
///
/// Each process exclusively owns writes to its own row; the only cross-node
/// writes are the peer `unavailable` marking and the administrative remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Unique node name, stable across restarts of the same logical node.
    pub name: String,
    /// Optional `host:port` for peer reachability.
    pub address: Option<String>,
    /// Current status.
    pub status: NodeStatus,
    /// Last heartbeat timestamp, refreshed by the owning process.
    pub last_seen: DateTime<Utc>,
}

impl NodeRecord {
    /// Create a fresh record in standby state.
    pub fn new(name: impl Into<String>, address: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            address,
            status: NodeStatus::Standby,
            last_seen: now,
        }
    }

    /// Heartbeat age relative to `now`. Clock skew yields zero, not a panic.
    pub fn heartbeat_age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.last_seen)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Whether the heartbeat is stale relative to `now` and the given delay.
    pub fn is_stale(&self, delay: Duration, now: DateTime<Utc>) -> bool {
        self.heartbeat_age(now) > delay
    }
}

/// Duration parsing/formatting in the short form used by operators
/// (`10s`, `3m`, `1h`) plus a serde helper for config fields.
pub mod duration {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Parse a duration in short operator form. Bare numbers are seconds.
    pub fn parse(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty duration".to_string());
        }
        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| e.to_string())
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| e.to_string())
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.parse::<u64>()
                .map(|v| Duration::from_secs(v * 60))
                .map_err(|e| e.to_string())
        } else if let Some(hours) = s.strip_suffix('h') {
            hours
                .parse::<u64>()
                .map(|v| Duration::from_secs(v * 3600))
                .map_err(|e| e.to_string())
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| e.to_string())
        }
    }

    /// Render a duration in the same short form, using the largest unit
    /// that divides it evenly. Sub-second durations render as `Nms`.
    pub fn format(d: Duration) -> String {
        let ms = d.as_millis();
        if ms == 0 {
            return "0s".to_string();
        }
        if ms % 1000 != 0 {
            return format!("{}ms", ms);
        }
        let secs = d.as_secs();
        if secs % 3600 == 0 {
            format!("{}h", secs / 3600)
        } else if secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }

    /// Serde helper for `Option<Duration>` fields.
    pub mod option {
        use serde::{self, Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => serializer.serialize_some(&super::format(*d)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s: Option<String> = Option::deserialize(deserializer)?;
            match s {
                Some(s) => super::parse(&s).map(Some).map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}
