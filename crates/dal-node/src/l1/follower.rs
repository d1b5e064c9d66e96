//! # Finalized Block Sources
//!
//! Sources push [`RawFinalizedBlock`]s into one bounded channel drained by the
//! block consumer. A full channel applies backpressure to the source.
//!
//! - [`BlockFeed`]: in-process sender, used by embedders and tests
//! - [`HttpFollower`]: polls `GET {endpoint}/finalized/{level}`

use std::time::Duration;

use reqwest::StatusCode;
use shared_types::Level;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::protocol::RawFinalizedBlock;

#[derive(Debug, Error)]
pub enum FollowerError {
    #[error("L1 request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("L1 endpoint answered {status} for level {level}")]
    Status { level: Level, status: u16 },

    #[error("L1 endpoint returned level {actual} when asked for {requested}")]
    WrongLevel { requested: Level, actual: Level },

    #[error("block consumer is gone")]
    Closed,
}

/// Sending side of the block channel.
#[derive(Debug, Clone)]
pub struct BlockFeed {
    tx: mpsc::Sender<RawFinalizedBlock>,
}

/// Create the bounded block channel.
pub fn block_channel(capacity: usize) -> (BlockFeed, mpsc::Receiver<RawFinalizedBlock>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (BlockFeed { tx }, rx)
}

impl BlockFeed {
    /// Wait for room in the channel and enqueue `block`.
    pub async fn push(&self, block: RawFinalizedBlock) -> Result<(), FollowerError> {
        self.tx.send(block).await.map_err(|_| FollowerError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Polls an L1 node for finalized blocks, one level at a time.
pub struct HttpFollower {
    client: reqwest::Client,
    endpoint: String,
    poll_interval: Duration,
    next_level: Level,
    feed: BlockFeed,
}

impl HttpFollower {
    pub fn new(
        endpoint: impl Into<String>,
        poll_interval: Duration,
        request_timeout: Duration,
        start_level: Level,
        feed: BlockFeed,
    ) -> Result<Self, FollowerError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            poll_interval,
            next_level: start_level,
            feed,
        })
    }

    pub fn next_level(&self) -> Level {
        self.next_level
    }

    /// Fetch `level`; `None` while it is not finalized yet.
    pub async fn fetch(&self, level: Level) -> Result<Option<RawFinalizedBlock>, FollowerError> {
        let url = format!("{}/finalized/{}", self.endpoint, level);
        let response = self.client.get(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let block: RawFinalizedBlock = response.json().await?;
                if block.level != level {
                    return Err(FollowerError::WrongLevel {
                        requested: level,
                        actual: block.level,
                    });
                }
                Ok(Some(block))
            }
            status => Err(FollowerError::Status {
                level,
                status: status.as_u16(),
            }),
        }
    }

    /// Follow the chain until the consumer goes away.
    pub async fn run(mut self) {
        info!(
            endpoint = %self.endpoint,
            start_level = self.next_level,
            "[dal-node] L1 follower started"
        );
        loop {
            match self.fetch(self.next_level).await {
                Ok(Some(block)) => {
                    debug!(level = block.level, "[dal-node] Finalized block fetched");
                    if self.feed.push(block).await.is_err() {
                        info!("[dal-node] Block consumer closed, follower stopping");
                        return;
                    }
                    self.next_level += 1;
                    continue;
                }
                Ok(None) => {}
                Err(FollowerError::Closed) => return,
                Err(e) => warn!(level = self.next_level, error = %e, "[dal-node] L1 poll failed"),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
