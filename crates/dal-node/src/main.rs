//! # DAL Node
//!
//! Entry point of the DAL node binary.
//!
//! ## Startup Sequence
//!
//! 1. Parse command-line flags
//! 2. Load configuration (TOML file, `DAL_*` environment, then flags)
//! 3. Initialize logging and metrics
//! 4. Build the subsystem container and start the runtime
//! 5. Run until Ctrl+C or a fatal error

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use dal_node::container::parse_profile;
use dal_node::{NodeConfig, NodeRuntime};

#[derive(Debug, Parser)]
#[command(name = "dal-node", version, about = "Data-availability layer node")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "DAL_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Address of the RPC server.
    #[arg(long)]
    rpc_addr: Option<SocketAddr>,

    /// Address the gossip listener binds to.
    #[arg(long)]
    p2p_addr: Option<String>,

    /// Peers dialed at startup, `host:port`.
    #[arg(long = "bootstrap-peer")]
    bootstrap_peers: Vec<String>,

    /// Base URL of the L1 node serving finalized blocks.
    #[arg(long)]
    l1_endpoint: Option<String>,

    /// `attester:<pkh>`, `producer:<index>`, `observer:<index>` or `bootstrap`.
    #[arg(long = "profile")]
    profiles: Vec<String>,

    /// One JSON object per log line.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn into_config(self) -> Result<NodeConfig> {
        let mut config =
            NodeConfig::load(self.config.as_deref()).context("failed to load configuration")?;

        if let Some(dir) = self.data_dir {
            config.storage.data_dir = dir;
        }
        if let Some(addr) = self.rpc_addr {
            config.rpc.listen_addr = addr;
        }
        if let Some(addr) = self.p2p_addr {
            config.network.listen_addr = addr;
        }
        if !self.bootstrap_peers.is_empty() {
            config.network.bootstrap_peers = self.bootstrap_peers;
        }
        if let Some(endpoint) = self.l1_endpoint {
            config.l1.endpoint = Some(endpoint);
        }
        for profile in &self.profiles {
            config
                .profiles
                .push(parse_profile(profile).context("invalid --profile")?);
        }
        if self.json_logs {
            config.telemetry.json_logs = true;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Cli::parse().into_config()?;

    dal_telemetry::init_telemetry(&config.telemetry).context("failed to initialize telemetry")?;

    let runtime = NodeRuntime::new(config)?;
    runtime.start().await?;

    info!("Node is running. Press Ctrl+C to stop.");
    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("cannot listen for Ctrl+C")
        }
        fatal = runtime.fatal_error() => {
            error!(error = %fatal, "[dal-node] Fatal error, stopping");
            Err(fatal)
        }
    };

    runtime.shutdown().await;
    outcome
}
