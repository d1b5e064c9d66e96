//! # Node Runtime
//!
//! Owns the subsystem container and every background task.
//!
//! ## Startup Sequence
//!
//! 1. Bind the P2P listener and start accepting peers
//! 2. Start the gossip inbound handler and the heartbeat
//! 3. Start the GC handler and the metrics bridge
//! 4. Start the block consumer, then the L1 follower (if an endpoint is set)
//! 5. Bind and serve the RPC API
//! 6. Dial bootstrap peers
//!
//! ## Shutdown Sequence
//!
//! 1. Flip the shutdown watch; every task leaves its loop
//! 2. Close all peer connections
//! 3. Wait for tasks to finish, aborting stragglers after a grace period

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use dal_08_rpc::RpcServer;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::adapters::NodeBackend;
use crate::container::{NodeConfig, SubsystemContainer};
use crate::handlers::{
    BlockConsumer, GcHandler, GossipInboundHandler, HeartbeatHandler, MetricsBridge,
};
use crate::l1::{block_channel, BlockFeed, HttpFollower, RawFinalizedBlock};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The main node runtime orchestrating all subsystems.
pub struct NodeRuntime {
    /// Subsystem container with all initialized services.
    container: Arc<SubsystemContainer>,
    /// In-process source of finalized blocks.
    feed: BlockFeed,
    blocks: Mutex<Option<mpsc::Receiver<RawFinalizedBlock>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    /// Fatal errors reported by background tasks.
    fatal_tx: mpsc::Sender<anyhow::Error>,
    fatal_rx: tokio::sync::Mutex<mpsc::Receiver<anyhow::Error>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    p2p_addr: Mutex<Option<SocketAddr>>,
    rpc_addr: Mutex<Option<SocketAddr>>,
    started: AtomicBool,
}

impl NodeRuntime {
    /// Build the container. Must be called inside a Tokio runtime.
    pub fn new(config: NodeConfig) -> Result<Self> {
        info!("[dal-node] Creating DAL node runtime");
        dal_telemetry::register_metrics().context("cannot register metrics")?;

        let blocks_capacity = config.l1.channel_capacity;
        let container =
            Arc::new(SubsystemContainer::new(config).context("failed to initialize subsystems")?);
        let (feed, blocks) = block_channel(blocks_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (fatal_tx, fatal_rx) = mpsc::channel(1);

        Ok(Self {
            container,
            feed,
            blocks: Mutex::new(Some(blocks)),
            shutdown_tx,
            shutdown_rx,
            fatal_tx,
            fatal_rx: tokio::sync::Mutex::new(fatal_rx),
            tasks: Mutex::new(Vec::new()),
            p2p_addr: Mutex::new(None),
            rpc_addr: Mutex::new(None),
            started: AtomicBool::new(false),
        })
    }

    /// Start every background task.
    pub async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            bail!("node runtime already started");
        }
        let container = &self.container;
        let config = &container.config;

        info!("===========================================");
        info!("  DAL Node v{}", env!("CARGO_PKG_VERSION"));
        info!("  Peer: {}", container.local_peer_id);
        info!("===========================================");

        // Step 1: P2P listener
        let listener = container
            .transport
            .bind(&config.network.listen_addr)
            .await
            .with_context(|| format!("cannot bind P2P listener on {}", config.network.listen_addr))?;
        *self.p2p_addr.lock() = listener.local_addr().ok();
        let transport = container.transport.clone();
        self.spawn("dal-04", async move { transport.run_listener(listener).await });

        // Step 2: overlay tasks
        let inbound = container
            .take_inbound()
            .context("transport receiver already taken")?;
        self.spawn(
            "dal-04",
            GossipInboundHandler::new(container.gossip.clone(), inbound).run(),
        );
        self.spawn(
            "dal-04",
            HeartbeatHandler::new(
                container.gossip.clone(),
                Duration::from_millis(config.gossip.heartbeat_interval_ms.max(1)),
            )
            .run(),
        );

        // Step 3: housekeeping
        self.spawn("dal-node", GcHandler::new(container).run());
        self.spawn("dal-node", MetricsBridge::new(&container.event_bus).run());

        // Step 4: L1
        let blocks = self
            .blocks
            .lock()
            .take()
            .context("block receiver already taken")?;
        let consumer = BlockConsumer::new(container, blocks);
        let fatal = self.fatal_tx.clone();
        self.spawn("dal-node", async move {
            if let Err(e) = consumer.run().await {
                error!(error = %e, "[dal-node] Block consumer failed");
                let _ = fatal.send(e.into()).await;
            }
        });

        match &config.l1.endpoint {
            Some(endpoint) => {
                let follower = HttpFollower::new(
                    endpoint.clone(),
                    Duration::from_millis(config.l1.poll_interval_ms),
                    Duration::from_secs(config.l1.request_timeout_secs),
                    container.resume_level(),
                    self.feed.clone(),
                )
                .context("cannot build L1 client")?;
                self.spawn("dal-node", follower.run());
            }
            None => info!("[dal-node] No L1 endpoint configured; blocks come from the in-process feed"),
        }

        // Step 5: RPC
        let server = RpcServer::new(
            config.rpc.clone(),
            Arc::new(NodeBackend::new(container)),
        );
        let listener = server.bind().await.context("cannot bind RPC server")?;
        *self.rpc_addr.lock() = listener.local_addr().ok();
        let fatal = self.fatal_tx.clone();
        let shutdown = self.shutdown_rx.clone();
        self.tasks.lock().push(tokio::spawn(async move {
            if let Err(e) = server.serve_on(listener, shutdown).await {
                error!(error = %e, "[dal-08] RPC server failed");
                let _ = fatal.send(e.into()).await;
            }
        }));

        // Step 6: bootstrap peers
        for addr in &config.network.bootstrap_peers {
            container.transport.dial_addr(addr);
        }

        info!(
            p2p = ?self.p2p_addr(),
            rpc = ?self.rpc_addr(),
            data_dir = ?config.storage.data_dir,
            profiles = ?container.membership.profiles(),
            "[dal-node] All tasks running"
        );
        Ok(())
    }

    /// Run `task` until it ends or shutdown is signalled.
    fn spawn<F>(&self, subsystem: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown = self.shutdown_rx.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = task => {}
                _ = shutdown.changed() => {
                    info!("[{}] Shutdown signal received", subsystem);
                }
            }
        });
        self.tasks.lock().push(handle);
    }

    /// Resolves with the first fatal error reported by a background task.
    pub async fn fatal_error(&self) -> anyhow::Error {
        let mut rx = self.fatal_rx.lock().await;
        match rx.recv().await {
            Some(e) => e,
            // The runtime keeps a sender alive.
            None => std::future::pending().await,
        }
    }

    /// Shutdown the node gracefully.
    pub async fn shutdown(&self) {
        info!("[dal-node] Initiating graceful shutdown...");
        if self.shutdown_tx.send(true).is_err() {
            warn!("[dal-node] No task was listening for shutdown");
        }
        self.container.transport.close_all();

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        for mut task in tasks {
            if tokio::time::timeout_at(deadline, &mut task).await.is_err() {
                task.abort();
            }
        }
        info!("[dal-node] Shutdown complete");
    }

    pub fn container(&self) -> Arc<SubsystemContainer> {
        Arc::clone(&self.container)
    }

    /// Sender for feeding finalized blocks in-process.
    pub fn feed(&self) -> BlockFeed {
        self.feed.clone()
    }

    /// Bound P2P address, once started.
    pub fn p2p_addr(&self) -> Option<SocketAddr> {
        *self.p2p_addr.lock()
    }

    /// Bound RPC address, once started.
    pub fn rpc_addr(&self) -> Option<SocketAddr> {
        *self.rpc_addr.lock()
    }
}
