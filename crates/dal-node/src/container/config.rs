//! # Node Configuration
//!
//! Unified configuration for all subsystems and runtime parameters.
//!
//! Precedence, lowest first: built-in defaults, the TOML file given with
//! `--config`, `DAL_*` environment variables, command-line flags.
//!
//! ```toml
//! profiles = [{ observer = 3 }, { attester = "tz1..." }]
//!
//! [network]
//! listen_addr = "0.0.0.0:11732"
//! bootstrap_peers = ["10.0.0.2:11732"]
//!
//! [storage]
//! data_dir = "/var/lib/dal"
//! retention_period = 150
//!
//! [l1]
//! endpoint = "http://127.0.0.1:8732"
//! ```

use std::path::{Path, PathBuf};

use dal_04_gossip::GossipConfig;
use dal_08_rpc::RpcConfig;
use dal_telemetry::TelemetryConfig;
use serde::Deserialize;
use shared_types::{Level, PeerId, Profile, PublicKeyHash};
use thiserror::Error;

use crate::l1::PROTO_ALPHA;

/// Complete node configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    pub gossip: GossipConfig,
    pub rpc: RpcConfig,
    pub l1: L1Config,
    /// Profiles added to the persisted list at startup.
    pub profiles: Vec<Profile>,
    pub telemetry: TelemetryConfig,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("invalid profile {input:?}: expected attester:<pkh>, producer:<index>, observer:<index> or bootstrap")]
    InvalidProfile { input: String },

    #[error("storage backend {0:?} is not compiled in")]
    BackendUnavailable(StorageBackend),
}

impl NodeConfig {
    /// Defaults, overlaid with `path` when given, then with the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `DAL_*` environment variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `DAL_DATA_DIR` | `storage.data_dir` |
    /// | `DAL_P2P_ADDR` | `network.listen_addr` |
    /// | `DAL_PUBLIC_ADDR` | `network.public_addr` |
    /// | `DAL_BOOTSTRAP_PEERS` | `network.bootstrap_peers` (comma separated) |
    /// | `DAL_RPC_ADDR` | `rpc.listen_addr` |
    /// | `DAL_L1_ENDPOINT` | `l1.endpoint` |
    /// | `DAL_PROTOCOL` | `l1.protocol` |
    /// | `DAL_PROFILES` | `profiles` (comma separated) |
    ///
    /// Logging variables are read by [`TelemetryConfig::with_env_overrides`].
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        if let Some(dir) = var("DAL_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(addr) = var("DAL_P2P_ADDR") {
            self.network.listen_addr = addr;
        }
        if let Some(addr) = var("DAL_PUBLIC_ADDR") {
            self.network.public_addr = Some(addr);
        }
        if let Some(peers) = var("DAL_BOOTSTRAP_PEERS") {
            self.network.bootstrap_peers = split_list(&peers);
        }
        if let Some(addr) = var("DAL_RPC_ADDR") {
            self.rpc.listen_addr = addr.parse().map_err(|e| ConfigError::InvalidValue {
                key: "DAL_RPC_ADDR".into(),
                reason: format!("{e}"),
            })?;
        }
        if let Some(endpoint) = var("DAL_L1_ENDPOINT") {
            self.l1.endpoint = Some(endpoint);
        }
        if let Some(protocol) = var("DAL_PROTOCOL") {
            self.l1.protocol = protocol;
        }
        if let Some(profiles) = var("DAL_PROFILES") {
            for item in split_list(&profiles) {
                self.profiles.push(parse_profile(&item)?);
            }
        }
        self.telemetry = self.telemetry.with_env_overrides();
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.peer_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "network.peer_queue_capacity".into(),
                reason: "must be positive".into(),
            });
        }
        if self.l1.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "l1.channel_capacity".into(),
                reason: "must be positive".into(),
            });
        }
        if self.gossip.d_low > self.gossip.d || self.gossip.d > self.gossip.d_high {
            return Err(ConfigError::InvalidValue {
                key: "gossip.d".into(),
                reason: format!(
                    "expected d_low <= d <= d_high, got {} <= {} <= {}",
                    self.gossip.d_low, self.gossip.d, self.gossip.d_high
                ),
            });
        }
        for peer in &self.network.trusted_peers {
            peer.peer_id()?;
        }
        #[cfg(not(feature = "rocksdb"))]
        if self.storage.backend == StorageBackend::RocksDb {
            return Err(ConfigError::BackendUnavailable(StorageBackend::RocksDb));
        }
        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse the command-line form of a profile.
///
/// `attester:<pkh>`, `producer:<index>`, `observer:<index>`, `bootstrap`.
pub fn parse_profile(input: &str) -> Result<Profile, ConfigError> {
    let invalid = || ConfigError::InvalidProfile {
        input: input.to_string(),
    };
    let (kind, arg) = match input.split_once(':') {
        Some((kind, arg)) => (kind, Some(arg)),
        None => (input, None),
    };
    match (kind.to_ascii_lowercase().as_str(), arg) {
        ("bootstrap", None) => Ok(Profile::Bootstrap),
        ("attester", Some(pkh)) => pkh
            .parse::<PublicKeyHash>()
            .map(Profile::Attester)
            .map_err(|_| invalid()),
        ("producer", Some(index)) => index.parse().map(Profile::Producer).map_err(|_| invalid()),
        ("observer", Some(index)) => index.parse().map(Profile::Observer).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

/// Network configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// P2P listening address.
    pub listen_addr: String,
    /// Address announced to peers; defaults to the bound address.
    pub public_addr: Option<String>,
    /// Addresses dialed once at startup.
    pub bootstrap_peers: Vec<String>,
    /// Peers kept connected regardless of score.
    pub trusted_peers: Vec<TrustedPeer>,
    /// Outgoing frames buffered per peer before sends fail.
    pub peer_queue_capacity: usize,
    /// Inbound frames buffered before readers wait.
    pub inbound_capacity: usize,
    pub dial_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:11732".to_string(),
            public_addr: None,
            bootstrap_peers: Vec::new(),
            trusted_peers: Vec::new(),
            peer_queue_capacity: 256,
            inbound_capacity: 4_096,
            dial_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrustedPeer {
    /// Hex peer id.
    pub peer_id: String,
    pub addr: String,
}

impl TrustedPeer {
    pub fn peer_id(&self) -> Result<PeerId, ConfigError> {
        self.peer_id.parse().map_err(|e| ConfigError::InvalidValue {
            key: "network.trusted_peers.peer_id".into(),
            reason: format!("{e}"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// One file per shard plus single-file tables.
    Directory,
    RocksDb,
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub backend: StorageBackend,
    /// Levels shards and headers are kept past their attestation level.
    pub retention_period: Level,
    /// Committees kept below the current level.
    pub committee_history: Level,
    /// Check every stored shard's checksum at startup.
    pub verify_on_startup: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./dal-data"),
            backend: StorageBackend::Directory,
            retention_period: 150,
            committee_history: 16,
            verify_on_startup: true,
        }
    }
}

/// L1 follower configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct L1Config {
    /// Protocol whose DAL parameters the node runs with.
    pub protocol: String,
    /// L1 node to poll; without it blocks only arrive in-process.
    pub endpoint: Option<String>,
    pub poll_interval_ms: u64,
    pub request_timeout_secs: u64,
    /// First level to fetch when nothing was processed yet.
    pub start_level: Level,
    /// Decoded blocks buffered ahead of the consumer.
    pub channel_capacity: usize,
}

impl Default for L1Config {
    fn default() -> Self {
        Self {
            protocol: PROTO_ALPHA.to_string(),
            endpoint: None,
            poll_interval_ms: 2_000,
            request_timeout_secs: 10,
            start_level: 1,
            channel_capacity: 64,
        }
    }
}
