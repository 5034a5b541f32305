//! Onion overlay node binary

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use synapsed_onion::OnionConfig;
use synapsed_onion_node::{launch_network, spawn_registry, spawn_relay, spawn_user};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "onion-node")]
#[command(about = "Run registry, relay and user services of the onion overlay", long_about = None)]
struct Cli {
    /// TOML configuration file; `SYNAPSED_ONION_*` variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node registry
    Registry,
    /// Run one relay; it registers with the registry at startup
    Relay {
        #[arg(long)]
        id: u32,
    },
    /// Run one user
    User {
        #[arg(long)]
        id: u32,
    },
    /// Run a registry, relays and users in one process
    Network {
        #[arg(long, default_value_t = 10)]
        relays: u32,
        #[arg(long, default_value_t = 2)]
        users: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = OnionConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Registry => {
            let (_, service) = spawn_registry(&config).await?;
            wait_for_ctrl_c().await?;
            service.shutdown().await?;
        }
        Commands::Relay { id } => {
            let handle = spawn_relay(&config, id)
                .await
                .with_context(|| format!("starting relay {id}"))?;
            wait_for_ctrl_c().await?;
            handle.service.shutdown().await?;
        }
        Commands::User { id } => {
            let handle = spawn_user(&config, id)
                .await
                .with_context(|| format!("starting user {id}"))?;
            wait_for_ctrl_c().await?;
            handle.service.shutdown().await?;
        }
        Commands::Network { relays, users } => {
            let overlay = launch_network(&config, relays, users).await?;
            for user in &overlay.users {
                tracing::info!(
                    user_id = user.user.user_id(),
                    addr = %user.service.local_addr(),
                    "User ready"
                );
            }
            wait_for_ctrl_c().await?;
            overlay.shutdown().await?;
        }
    }

    Ok(())
}

async fn wait_for_ctrl_c() -> anyhow::Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl+C")?;
    tracing::info!("Shutting down");
    Ok(())
}
