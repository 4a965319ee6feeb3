//! Runtime control interface.
//!
//! A line protocol over a unix domain socket: one command line in, one reply
//! out, connection closed. The socket lives next to the server's runtime
//! files so only local administrators reach it.

mod command;

pub use command::ControlCommand;

use crate::api::{self, NodeFilter};
use crate::error::{HaError, Result};
use crate::events::{HaEvent, HaEventBus};
use crate::observability;
use crate::registry::NodeRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::types::{duration, NodeStatus};
use chrono::Utc;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

/// Longest accepted command line, in bytes.
const MAX_COMMAND_LEN: u64 = 4 * 1024;

/// Serves runtime control commands on a unix socket.
pub struct ControlServer {
    socket_path: PathBuf,
    registry: Arc<dyn NodeRegistry>,
    events: HaEventBus,
    shutdown: ShutdownCoordinator,
}

impl ControlServer {
    /// Create a control server bound to the given socket path.
    pub fn new(
        socket_path: PathBuf,
        registry: Arc<dyn NodeRegistry>,
        events: HaEventBus,
        shutdown: ShutdownCoordinator,
    ) -> Arc<Self> {
        Arc::new(Self {
            socket_path,
            registry,
            events,
            shutdown,
        })
    }

    /// Bind the socket and serve until shutdown.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        // A previous run may have left the socket file behind.
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)
            .map_err(|e| HaError::ControlSocket(format!("bind failed: {}", e)))?;
        info!(path = %self.socket_path.display(), "Control socket listening");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _)) => {
                            let server = Arc::clone(&self);
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream).await {
                                    warn!(error = %e, "control connection failed");
                                }
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "control accept failed");
                        }
                    }
                }
                _ = self.shutdown.wait_for_shutdown() => {
                    debug!("control server stopping");
                    break;
                }
            }
        }

        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }

    async fn handle_connection(&self, stream: UnixStream) -> Result<()> {
        // Cap the read so a client writing an endless newline-free stream
        // cannot grow the line buffer without bound.
        let mut reader = BufReader::new(stream).take(MAX_COMMAND_LEN);
        let mut line = String::new();
        reader.read_line(&mut line).await?;

        let reply = match line.trim().parse::<ControlCommand>() {
            Ok(command) => match self.dispatch(command).await {
                Ok(reply) => reply,
                Err(e) => format!("failed: {}", e),
            },
            Err(e) => format!("failed: {}", e),
        };

        let mut stream = reader.into_inner().into_inner();
        stream.write_all(reply.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.shutdown().await?;
        Ok(())
    }

    /// Execute one decoded command against the registry.
    pub async fn dispatch(&self, command: ControlCommand) -> Result<String> {
        match command {
            ControlCommand::HaStatus => {
                observability::record_control_command("ha_status");
                self.ha_status().await
            }
            ControlCommand::HaRemoveNode { name } => {
                observability::record_control_command("ha_remove_node");
                self.remove_node(&name).await
            }
            ControlCommand::HaSetFailoverDelay { delay } => {
                observability::record_control_command("ha_set_failover_delay");
                self.set_failover_delay(delay).await
            }
            ControlCommand::NodeGet { filter } => {
                observability::record_control_command("hanode.get");
                self.node_get(&filter).await
            }
        }
    }

    /// List every node with its status and heartbeat age. Each node is also
    /// logged on its own line, name before status, which is what operators'
    /// log tooling matches when polling cluster state.
    async fn ha_status(&self) -> Result<String> {
        let now = Utc::now();
        let delay = self.registry.failover_delay().await?;
        let nodes = self.registry.list().await?;

        let mut reply = format!("failover delay: {}\n", duration::format(delay));
        for (i, node) in nodes.iter().enumerate() {
            let address = node.address.as_deref().unwrap_or("-");
            let age = duration::format(node.heartbeat_age(now));
            let line = format!(
                "#{}: \"{}\" {} \"{}\" {}",
                i + 1,
                node.name,
                address,
                node.status,
                age
            );
            info!("{}", line);
            let _ = writeln!(reply, "{}", line);
        }
        Ok(reply)
    }

    /// Remove a node's registry row. The active node is refused: removing
    /// it would erase the row its peers arbitrate failover against. A node
    /// that is still heartbeating is refused too; stop it first.
    async fn remove_node(&self, name: &str) -> Result<String> {
        let record = self
            .registry
            .get(name)
            .await?
            .ok_or_else(|| HaError::NodeNotFound(name.to_string()))?;

        if record.status == NodeStatus::Active {
            return Err(HaError::NodeActive(name.to_string()));
        }
        let delay = self.registry.failover_delay().await?;
        if record.status.is_member() && !record.is_stale(delay, Utc::now()) {
            return Err(HaError::NodeAlive(name.to_string()));
        }

        self.registry.remove(name).await?;
        let event = HaEvent::NodeRemoved {
            name: name.to_string(),
        };
        let reply = event.to_string();
        self.events.publish(event);
        Ok(reply)
    }

    /// Set the cluster-wide failover delay. Bounds were checked at decode;
    /// the new value takes effect on every node's next monitor tick.
    async fn set_failover_delay(&self, delay: Duration) -> Result<String> {
        self.registry.set_failover_delay(delay).await?;
        let event = HaEvent::FailoverDelaySet { delay };
        let reply = event.to_string();
        self.events.publish(event);
        Ok(reply)
    }

    async fn node_get(&self, filter: &NodeFilter) -> Result<String> {
        let nodes = api::get_nodes(self.registry.as_ref(), filter).await?;
        Ok(serde_json::to_string(&nodes)?)
    }
}

/// Send one command line to a control socket and return the reply.
pub async fn send_command(socket_path: &Path, line: &str) -> Result<String> {
    let mut stream = UnixStream::connect(socket_path)
        .await
        .map_err(|e| HaError::ControlSocket(format!("connect failed: {}", e)))?;

    stream.write_all(line.as_bytes()).await?;
    stream.write_all(b"\n").await?;

    let mut reply = String::new();
    stream.read_to_string(&mut reply).await?;
    Ok(reply.trim_end().to_string())
}
