//! Vigil CLI - Main entry point.

use std::path::PathBuf;
use vigil::api::NodeFilter;
use vigil::cli::{Cli, Commands, HaCommands};
use vigil::config::{ControlConfig, VigilConfig};
use vigil::control;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Server {
            node_name,
            node_address,
            data_dir,
            socket_dir,
        } => {
            let mut config = match &cli.config {
                Some(path) => VigilConfig::from_file(path)?,
                None => VigilConfig::default(),
            };

            if node_name.is_some() {
                config.node.name = node_name;
            }
            if node_address.is_some() {
                config.node.address = node_address;
            }
            config.registry.path = data_dir.join("registry");
            config.control.socket_dir = socket_dir;
            config.observability.log_level = cli.log_level;

            config.validate()?;
            vigil::run(config).await?;
        }

        Commands::Ha { command } => match command {
            HaCommands::Status { socket_dir } => {
                let reply = send(&socket_dir, "ha_status").await;
                println!("{}", reply);
            }
            HaCommands::RemoveNode { name, socket_dir } => {
                let reply = send(&socket_dir, &format!("ha_remove_node={}", name)).await;
                println!("{}", reply);
            }
            HaCommands::SetFailoverDelay { delay, socket_dir } => {
                let reply =
                    send(&socket_dir, &format!("ha_set_failover_delay={}", delay)).await;
                println!("{}", reply);
            }
            HaCommands::Nodes {
                name,
                status,
                socket_dir,
            } => {
                let status = match status {
                    Some(s) => match s.parse() {
                        Ok(status) => Some(status),
                        Err(e) => {
                            eprintln!("Invalid status filter: {}", e);
                            std::process::exit(1);
                        }
                    },
                    None => None,
                };

                let filter = NodeFilter { name, status };
                let line = if filter == NodeFilter::default() {
                    "hanode.get".to_string()
                } else {
                    format!("hanode.get={}", serde_json::to_string(&filter)?)
                };

                let reply = send(&socket_dir, &line).await;
                println!("{}", reply);
            }
        },

        Commands::Version => {
            println!("Vigil v{}", env!("CARGO_PKG_VERSION"));
            println!("High availability coordinator for server clusters");
        }
    }

    Ok(())
}

/// Send one command line to a server's control socket, exiting on failure.
async fn send(socket_dir: &PathBuf, line: &str) -> String {
    let socket_path = ControlConfig {
        socket_dir: socket_dir.clone(),
    }
    .socket_path();

    match control::send_command(&socket_path, line).await {
        Ok(reply) => reply,
        Err(e) => {
            eprintln!("Failed to reach server at {:?}: {}", socket_path, e);
            std::process::exit(1);
        }
    }
}
