use std::net::SocketAddr;

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub listen_addr: SocketAddr,
    /// Upper bound on request bodies; must exceed the slot size.
    pub max_body_bytes: usize,
    pub request_timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 10732)),
            max_body_bytes: 4 * 1024 * 1024,
            request_timeout_secs: 30,
        }
    }
}
