//! Command-line interface for Vigil.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Vigil - High availability coordinator for server clusters.
#[derive(Parser)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "VIGIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "VIGIL_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Start a Vigil server node
    Server {
        /// HA node name; omit to run standalone
        #[arg(long, env = "VIGIL_NODE_NAME")]
        node_name: Option<String>,

        /// Address (host:port) under which peers can reach this node
        #[arg(long, env = "VIGIL_NODE_ADDRESS")]
        node_address: Option<String>,

        /// Data directory
        #[arg(long, default_value = "/var/lib/vigil")]
        data_dir: PathBuf,

        /// Directory holding the runtime control socket
        #[arg(long, default_value = "/run/vigil")]
        socket_dir: PathBuf,
    },

    /// Runtime control of a running server
    Ha {
        #[command(subcommand)]
        command: HaCommands,
    },

    /// Show version information
    Version,
}

/// Runtime control subcommands, sent over the control socket.
#[derive(Subcommand)]
pub enum HaCommands {
    /// Show cluster status
    Status {
        /// Directory holding the runtime control socket
        #[arg(long, default_value = "/run/vigil")]
        socket_dir: PathBuf,
    },

    /// Remove a node from the registry
    RemoveNode {
        /// Node name
        name: String,

        /// Directory holding the runtime control socket
        #[arg(long, default_value = "/run/vigil")]
        socket_dir: PathBuf,
    },

    /// Set the cluster-wide failover delay
    SetFailoverDelay {
        /// New delay (e.g. 10s, 3m)
        delay: String,

        /// Directory holding the runtime control socket
        #[arg(long, default_value = "/run/vigil")]
        socket_dir: PathBuf,
    },

    /// Query node records as JSON
    Nodes {
        /// Filter by node name
        #[arg(long)]
        name: Option<String>,

        /// Filter by status (active, standby, unavailable, stopped)
        #[arg(long)]
        status: Option<String>,

        /// Directory holding the runtime control socket
        #[arg(long, default_value = "/run/vigil")]
        socket_dir: PathBuf,
    },
}
