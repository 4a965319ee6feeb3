//! Runtime control command decoding.
//!
//! Commands arrive as single text lines in the legacy `name=value` form
//! administrators already script against. They are decoded into a tagged
//! enum at this boundary and dispatched by pattern match; no handler ever
//! sees the raw string.

use crate::api::NodeFilter;
use crate::error::HaError;
use crate::types::{duration, MAX_FAILOVER_DELAY, MIN_FAILOVER_DELAY};
use std::str::FromStr;
use std::time::Duration;

/// A decoded runtime control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// `ha_status`: list every node with its current status.
    HaStatus,
    /// `ha_remove_node=<name>`: remove a node's registry row.
    HaRemoveNode { name: String },
    /// `ha_set_failover_delay=<duration>`: change the cluster-wide delay.
    HaSetFailoverDelay { delay: Duration },
    /// `hanode.get` / `hanode.get=<json filter>`: query node records.
    NodeGet { filter: NodeFilter },
}

impl FromStr for ControlCommand {
    type Err = HaError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (name, value) = match line.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (line, None),
        };

        match (name, value) {
            ("ha_status", None) => Ok(ControlCommand::HaStatus),
            ("ha_remove_node", Some(node)) if !node.is_empty() => {
                Ok(ControlCommand::HaRemoveNode {
                    name: node.to_string(),
                })
            }
            ("ha_set_failover_delay", Some(value)) => {
                let delay = duration::parse(value)
                    .map_err(|_| HaError::InvalidDuration(value.to_string()))?;
                if delay < MIN_FAILOVER_DELAY || delay > MAX_FAILOVER_DELAY {
                    return Err(HaError::FailoverDelayOutOfRange(
                        duration::format(delay),
                        duration::format(MIN_FAILOVER_DELAY),
                        duration::format(MAX_FAILOVER_DELAY),
                    ));
                }
                Ok(ControlCommand::HaSetFailoverDelay { delay })
            }
            ("hanode.get", None) => Ok(ControlCommand::NodeGet {
                filter: NodeFilter::default(),
            }),
            ("hanode.get", Some(json)) => {
                let filter: NodeFilter = serde_json::from_str(json)?;
                Ok(ControlCommand::NodeGet { filter })
            }
            _ => Err(HaError::UnknownCommand(line.to_string())),
        }
    }
}
