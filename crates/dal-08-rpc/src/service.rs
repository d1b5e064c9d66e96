//! # RPC Server
//!
//! Binds the router and serves until the shutdown flag flips.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::domain::{RpcConfig, RpcError};
use crate::ports::DalBackend;
use crate::router::build_router;

pub struct RpcServer {
    config: RpcConfig,
    backend: Arc<dyn DalBackend>,
}

impl RpcServer {
    pub fn new(config: RpcConfig, backend: Arc<dyn DalBackend>) -> Self {
        Self { config, backend }
    }

    pub async fn bind(&self) -> Result<TcpListener, RpcError> {
        let addr = self.config.listen_addr;
        TcpListener::bind(addr)
            .await
            .map_err(|source| RpcError::Bind { addr, source })
    }

    pub async fn serve(self, shutdown: watch::Receiver<bool>) -> Result<(), RpcError> {
        let listener = self.bind().await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener, e.g. one bound to port 0.
    pub async fn serve_on(
        self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), RpcError> {
        let local: Option<SocketAddr> = listener.local_addr().ok();
        info!(addr = ?local, "[dal-08] RPC server listening");
        let router = build_router(self.backend, &self.config);
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await
            .map_err(RpcError::Serve)?;
        info!("[dal-08] RPC server stopped");
        Ok(())
    }
}
