//! High availability manager and failover coordination.
//!
//! Each server process runs one [`HaManager`]. It registers the node in the
//! shared registry, heartbeats on a fixed interval, and while standby
//! watches the active node's heartbeat, promoting itself through the
//! registry's compare-and-swap once the active goes silent for longer than
//! the failover delay.

mod coordinator;
mod manager;

pub use coordinator::{FailoverCoordinator, FailoverDecision};
pub use manager::HaManager;
