// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use dfs_node::config::NodeConfig;
use dfs_node::datanode::run_datanode_agent;
use dfs_node::image_transfer::ImageUploadServer;
use dfs_node::persistence::CheckpointStore;
use dfs_node::namenode::NameNode;
use dfs_node::network::NameNodeClient;
use dfs_node::registry::NodeId;
use dfs_node::replication::BackupNode;
use dfs_node::server::build_router;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "dfs-node")]
#[command(about = "Primary/backup namespace metadata service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the namespace, the edit log and the storage-node registry
    Primary {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Tail a Primary's edit log and ship checkpoints back to it
    Backup {
        #[command(flatten)]
        common: CommonArgs,
        /// Primary RPC base URL
        #[arg(long, default_value = "http://127.0.0.1:50070")]
        primary: String,
        /// Primary image upload channel
        #[arg(long, default_value = "127.0.0.1:50080")]
        primary_image: SocketAddr,
    },
    /// Register a storage node and keep it alive with heartbeats
    Datanode {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long, default_value = "http://127.0.0.1:50070")]
        primary: String,
        #[arg(long)]
        ip: String,
        #[arg(long)]
        hostname: String,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// JSON config file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    data_dir: Option<PathBuf>,
    #[arg(long)]
    rpc_addr: Option<SocketAddr>,
    #[arg(long)]
    image_addr: Option<SocketAddr>,
}

impl CommonArgs {
    fn load(&self) -> anyhow::Result<NodeConfig> {
        let mut cfg = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
                serde_json::from_str(&text).with_context(|| format!("parsing {:?}", path))?
            }
            None => NodeConfig::default(),
        };
        if let Some(dir) = &self.data_dir {
            cfg.data_dir = dir.clone();
        }
        if let Some(addr) = self.rpc_addr {
            cfg.rpc_addr = addr;
        }
        if let Some(addr) = self.image_addr {
            cfg.image_addr = addr;
        }
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dfs_node::telemetry::init_telemetry();
    let cli = Cli::parse();

    match cli.command {
        Command::Primary { common } => run_primary(common.load()?).await,
        Command::Backup { common, primary, primary_image } => {
            run_backup(common.load()?, primary, primary_image).await
        }
        Command::Datanode { common, primary, ip, hostname } => {
            let cfg = common.load()?;
            let token = CancellationToken::new();
            spawn_ctrl_c(token.clone());
            run_datanode_agent(
                NameNodeClient::new(primary),
                NodeId::new(ip, hostname),
                cfg.heartbeat_interval,
                token,
            )
            .await;
            Ok(())
        }
    }
}

async fn run_primary(cfg: NodeConfig) -> anyhow::Result<()> {
    tracing::info!("Starting Primary with config: {:?}", cfg);
    let rpc_addr = cfg.rpc_addr;
    let image_addr = cfg.image_addr;
    let image_path = cfg.primary_image_path();
    let checkpoints = CheckpointStore::new(cfg.checkpoint_txid_path());

    let node = tokio::task::spawn_blocking(move || NameNode::open(cfg)).await??;
    let node = Arc::new(node);
    let token = node.shutdown_token();
    let background = node.spawn_background_tasks();

    let images = ImageUploadServer::bind(image_addr, image_path, checkpoints).await?;
    tokio::spawn(images.run(token.clone()));

    let ctrl_c = CancellationToken::new();
    spawn_ctrl_c(ctrl_c.clone());
    {
        let node = node.clone();
        let token = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = ctrl_c.cancelled() => {
                    match tokio::task::spawn_blocking(move || node.shutdown_close()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => tracing::error!("Shutdown failed: {}", e),
                        Err(e) => tracing::error!("Shutdown task failed: {}", e),
                    }
                }
            }
        });
    }

    let listener = TcpListener::bind(rpc_addr).await?;
    tracing::info!("Listening on {}", rpc_addr);
    axum::serve(listener, build_router(node))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;

    for handle in background {
        let _ = handle.await;
    }
    Ok(())
}

async fn run_backup(cfg: NodeConfig, primary: String, primary_image: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("Starting Backup of {} with config: {:?}", primary, cfg);
    let node = Arc::new(BackupNode::new(cfg, NameNodeClient::new(primary), primary_image));

    let ctrl_c = CancellationToken::new();
    spawn_ctrl_c(ctrl_c.clone());
    {
        let node = node.clone();
        tokio::spawn(async move {
            ctrl_c.cancelled().await;
            if let Err(e) = node.shutdown() {
                tracing::error!("Backup shutdown failed: {}", e);
            }
        });
    }

    node.run().await?;
    Ok(())
}

fn spawn_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, shutting down");
            token.cancel();
        }
    });
}
