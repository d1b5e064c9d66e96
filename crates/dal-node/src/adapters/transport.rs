//! # TCP Peer Transport
//!
//! [`PeerTransport`] over plain TCP. Each frame is a 4-byte big-endian length
//! followed by the bincode body produced by [`Frame::encode`].
//!
//! ```text
//!  dial / accept ──▶ Hello ⇄ Hello ──▶ register ──▶ Inbound::Connected
//!                                         │
//!           send() ─▶ [bounded queue] ─▶ writer task ─▶ socket
//!           socket ─▶ reader task ─▶ [inbound channel] ─▶ gossip dispatcher
//! ```
//!
//! `send` never waits: a full per-peer queue is reported as an error and the
//! overlay treats the frame as lost. Every event about a connection (connect,
//! frames, disconnect) goes through one channel so the dispatcher sees them
//! in order.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dal_04_gossip::{Frame, GossipError, GossipResult, PeerTransport, MAX_FRAME_SIZE};
use parking_lot::{Mutex, RwLock};
use shared_types::PeerId;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

const HEADER_SIZE: usize = 4;

/// Time allowed for the Hello exchange.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection events delivered to the overlay.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Connected { peer: PeerId, addr: Option<String> },
    Frame { peer: PeerId, frame: Frame },
    Disconnected { peer: PeerId },
    DialFailed { peer: PeerId },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Frame(#[from] GossipError),

    #[error("handshake failed: {0}")]
    Handshake(String),
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Address announced in Hello; the bound address when `None`.
    pub public_addr: Option<String>,
    /// Frames buffered per peer.
    pub queue_capacity: usize,
    pub dial_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            public_addr: None,
            queue_capacity: 256,
            dial_timeout: Duration::from_secs(10),
        }
    }
}

struct Connection {
    id: u64,
    outbound: mpsc::Sender<Frame>,
    tasks: Vec<AbortHandle>,
}

impl Connection {
    fn abort(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

struct Inner {
    local: PeerId,
    config: TransportConfig,
    announce: RwLock<Option<String>>,
    connections: Mutex<HashMap<PeerId, Connection>>,
    next_id: AtomicU64,
    inbound: mpsc::Sender<Inbound>,
    runtime: Handle,
}

/// TCP transport shared between the overlay and the accept loop.
#[derive(Clone)]
pub struct TcpTransport {
    inner: Arc<Inner>,
}

impl TcpTransport {
    /// Must be called inside a Tokio runtime.
    pub fn new(local: PeerId, config: TransportConfig, inbound: mpsc::Sender<Inbound>) -> Self {
        Self {
            inner: Arc::new(Inner {
                local,
                announce: RwLock::new(config.public_addr.clone()),
                config,
                connections: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                inbound,
                runtime: Handle::current(),
            }),
        }
    }

    pub fn local_peer_id(&self) -> PeerId {
        self.inner.local
    }

    /// Bind the P2P listener. The bound address is announced unless a public
    /// address was configured.
    pub async fn bind(&self, addr: &str) -> std::io::Result<TcpListener> {
        let listener = TcpListener::bind(addr).await?;
        let bound = listener.local_addr()?;
        let mut announce = self.inner.announce.write();
        if announce.is_none() {
            *announce = Some(bound.to_string());
        }
        info!(%bound, "[dal-node] P2P listener bound");
        Ok(listener)
    }

    /// Accept connections until the task is dropped.
    pub async fn run_listener(&self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, remote)) => {
                    debug!(%remote, "[dal-node] Accepted connection");
                    let inner = Arc::clone(&self.inner);
                    tokio::spawn(async move {
                        if let Err(e) = inner.establish(stream, None, None).await {
                            debug!(%remote, error = %e, "[dal-node] Inbound handshake failed");
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "[dal-node] Accept failed");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    /// Connect to an address whose peer id is not known yet.
    pub fn dial_addr(&self, addr: &str) {
        let inner = Arc::clone(&self.inner);
        let addr = addr.to_string();
        self.inner.runtime.spawn(async move {
            if let Err(e) = inner.connect(None, &addr).await {
                warn!(%addr, error = %e, "[dal-node] Bootstrap dial failed");
            }
        });
    }

    pub fn is_connected(&self, peer: &PeerId) -> bool {
        self.inner.connections.lock().contains_key(peer)
    }

    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.inner.connections.lock().keys().copied().collect()
    }

    /// Drop every connection without notifying the overlay.
    pub fn close_all(&self) {
        let drained: Vec<Connection> = self.inner.connections.lock().drain().map(|(_, c)| c).collect();
        for connection in &drained {
            connection.abort();
        }
        if !drained.is_empty() {
            info!(count = drained.len(), "[dal-node] Closed all peer connections");
        }
    }
}

impl PeerTransport for TcpTransport {
    fn send(&self, peer: &PeerId, frame: Frame) -> GossipResult<()> {
        let connections = self.inner.connections.lock();
        let connection = connections.get(peer).ok_or(GossipError::UnknownPeer(*peer))?;
        connection.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                GossipError::Transport(format!("outgoing queue of {} is full", peer.short()))
            }
            mpsc::error::TrySendError::Closed(_) => GossipError::UnknownPeer(*peer),
        })
    }

    fn disconnect(&self, peer: &PeerId) {
        let removed = self.inner.connections.lock().remove(peer);
        if let Some(connection) = removed {
            connection.abort();
            self.inner.notify(Inbound::Disconnected { peer: *peer });
            debug!(peer = %peer.short(), "[dal-node] Connection closed locally");
        }
    }

    fn dial(&self, peer: &PeerId, addr: &str) -> GossipResult<()> {
        if *peer == self.inner.local {
            return Err(GossipError::Transport("refusing to dial self".into()));
        }
        if self.is_connected(peer) {
            return Ok(());
        }
        let inner = Arc::clone(&self.inner);
        let peer = *peer;
        let addr = addr.to_string();
        self.inner.runtime.spawn(async move {
            if let Err(e) = inner.connect(Some(peer), &addr).await {
                debug!(peer = %peer.short(), %addr, error = %e, "[dal-node] Dial failed");
                inner.notify(Inbound::DialFailed { peer });
            }
        });
        Ok(())
    }
}

impl Inner {
    async fn connect(self: &Arc<Self>, expected: Option<PeerId>, addr: &str) -> Result<(), TransportError> {
        let stream = tokio::time::timeout(self.config.dial_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::Handshake(format!("connect to {addr} timed out")))??;
        self.establish(stream, expected, Some(addr.to_string())).await
    }

    /// Exchange Hellos, then register the connection and start its tasks.
    async fn establish(
        self: &Arc<Self>,
        stream: TcpStream,
        expected: Option<PeerId>,
        dialed: Option<String>,
    ) -> Result<(), TransportError> {
        stream.set_nodelay(true)?;
        let remote: Option<SocketAddr> = stream.peer_addr().ok();
        let (mut reader, mut writer) = stream.into_split();

        let hello = Frame::Hello {
            peer_id: self.local,
            listen_addr: self.announce.read().clone(),
        };
        let (peer, listen_addr) = tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
            write_frame(&mut writer, &hello).await?;
            match read_frame(&mut reader).await? {
                Frame::Hello { peer_id, listen_addr } => {
                    Ok::<_, TransportError>((peer_id, listen_addr))
                }
                other => Err(TransportError::Handshake(format!(
                    "expected hello, got {}",
                    other.name()
                ))),
            }
        })
        .await
        .map_err(|_| TransportError::Handshake("hello timed out".into()))??;

        if peer == self.local {
            return Err(TransportError::Handshake("connected to self".into()));
        }
        if let Some(expected) = expected {
            if expected != peer {
                return Err(TransportError::Handshake(format!(
                    "expected peer {}, found {}",
                    expected.short(),
                    peer.short()
                )));
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut connections = self.connections.lock();
            if connections.contains_key(&peer) {
                debug!(peer = %peer.short(), "[dal-node] Duplicate connection dropped");
                return Ok(());
            }
            let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));

            // Connected is queued before the reader starts, so no frame of
            // this connection can overtake it.
            let addr = dialed.or(listen_addr);
            if self
                .inbound
                .try_send(Inbound::Connected { peer, addr: addr.clone() })
                .is_err()
            {
                return Err(TransportError::Handshake("inbound channel saturated".into()));
            }

            let writer_task = self.runtime.spawn(Arc::clone(self).write_loop(peer, id, writer, rx));
            let reader_task = self.runtime.spawn(Arc::clone(self).read_loop(peer, id, reader));
            connections.insert(
                peer,
                Connection {
                    id,
                    outbound: tx,
                    tasks: vec![writer_task.abort_handle(), reader_task.abort_handle()],
                },
            );
        }
        info!(
            peer = %peer.short(),
            remote = ?remote,
            "[dal-node] Peer connection established"
        );
        Ok(())
    }

    async fn write_loop<W: AsyncWrite + Unpin>(
        self: Arc<Self>,
        peer: PeerId,
        id: u64,
        mut writer: W,
        mut rx: mpsc::Receiver<Frame>,
    ) {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = write_frame(&mut writer, &frame).await {
                debug!(peer = %peer.short(), error = %e, "[dal-node] Write failed");
                break;
            }
        }
        self.close(peer, id);
    }

    async fn read_loop<R: AsyncRead + Unpin>(self: Arc<Self>, peer: PeerId, id: u64, mut reader: R) {
        loop {
            match read_frame(&mut reader).await {
                Ok(frame) => {
                    if self.inbound.send(Inbound::Frame { peer, frame }).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    debug!(peer = %peer.short(), error = %e, "[dal-node] Read ended");
                    break;
                }
            }
        }
        self.close(peer, id);
    }

    /// Remove connection `id` of `peer` if it is still the registered one.
    fn close(&self, peer: PeerId, id: u64) {
        let removed = {
            let mut connections = self.connections.lock();
            match connections.get(&peer) {
                Some(connection) if connection.id == id => connections.remove(&peer),
                _ => None,
            }
        };
        if let Some(connection) = removed {
            connection.abort();
            self.notify(Inbound::Disconnected { peer });
            info!(peer = %peer.short(), "[dal-node] Peer connection lost");
        }
    }

    /// Queue an event without blocking the caller.
    fn notify(&self, event: Inbound) {
        let inbound = self.inbound.clone();
        self.runtime.spawn(async move {
            let _ = inbound.send(event).await;
        });
    }
}

// =============================================================================
// FRAMING
// =============================================================================

/// Write one length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> Result<(), TransportError> {
    let body = frame.encode()?;
    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    buf.extend_from_slice(&(body.len() as u32).to_be_bytes());
    buf.extend_from_slice(&body);
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame. Oversized lengths are rejected before
/// any body byte is read.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame, TransportError> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header).await?;
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(GossipError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        }
        .into());
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Frame::decode(&body)?)
}
