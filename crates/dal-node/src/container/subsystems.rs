//! # Subsystem Container
//!
//! Holds every subsystem instance and wires their ports together.
//!
//! ## Initialization Order
//!
//! ```text
//! Phase 1: data directory lock, identity, event bus, protocol parameters
//! Phase 2: cryptobox, shard store (integrity scan), slot tracker
//! Phase 3: topic membership, amplifier (overlay reached through GossipSlot)
//! Phase 4: TCP transport, gossip overlay (validator + sink)
//! Phase 5: attestation resolver, configured profiles
//! ```
//!
//! The overlay depends on the membership service (validation) and the
//! membership service on the overlay (join/leave). The cycle is cut by
//! [`GossipSlot`], filled in phase 4 before any topic can be joined.

use std::sync::Arc;

use dal_01_cryptobox::{Cryptobox, CryptoboxError, CryptoboxParameters};
use dal_02_shard_store::{DirectoryLock, LockError, ShardStoreApi, ShardStoreService, StoreConfig, StoreError};
use dal_03_slot_tracker::{SlotTrackerApi, SlotTrackerService, TrackerConfig, TrackerError};
use dal_04_gossip::{GossipApi, GossipService};
use dal_05_topic_membership::{MembershipConfig, MembershipError, MembershipService, TopicMembershipApi};
use dal_06_amplification::{AmplificationApi, Amplifier};
use dal_07_attestation::{
    AttestationApi, AttestationResolver, MembershipCommittees, StoreAvailability, TrackerHeaders,
};
use parking_lot::Mutex;
use shared_bus::InMemoryEventBus;
use shared_types::{DalParameters, KVStoreError, Level, PeerId};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use crate::adapters::gossip_bridge::{
    GossipShardPublisher, GossipSlot, GossipSubscriber, ShardSink, ShardValidator,
};
use crate::adapters::identity::{self, IdentityError};
use crate::adapters::storage::Tables;
use crate::adapters::transport::{Inbound, TcpTransport, TransportConfig};
use crate::container::config::NodeConfig;
use crate::l1::{DecodeError, ProtocolRegistry};

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("cannot open storage: {0}")]
    Storage(#[from] KVStoreError),

    #[error("shard store: {0}")]
    Store(#[from] StoreError),

    #[error("{0} corrupted shard(s) found at startup")]
    Corrupted(usize),

    #[error("slot tracker: {0}")]
    Tracker(#[from] TrackerError),

    #[error("topic membership: {0}")]
    Membership(#[from] MembershipError),

    #[error("protocol parameters rejected: {0}")]
    Cryptobox(#[from] CryptoboxError),

    #[error(transparent)]
    Protocol(#[from] DecodeError),
}

/// Central container holding all subsystem instances.
pub struct SubsystemContainer {
    /// Node configuration, fixed after initialization.
    pub config: NodeConfig,
    pub parameters: DalParameters,
    pub local_peer_id: PeerId,
    pub registry: ProtocolRegistry,
    pub event_bus: Arc<InMemoryEventBus>,

    pub cryptobox: Arc<Cryptobox>,
    pub store: Arc<dyn ShardStoreApi>,
    pub tracker: Arc<dyn SlotTrackerApi>,
    pub membership: Arc<dyn TopicMembershipApi>,
    pub amplifier: Arc<dyn AmplificationApi>,
    pub gossip: Arc<dyn GossipApi>,
    pub transport: TcpTransport,
    pub publisher: Arc<GossipShardPublisher>,
    pub attestation: Arc<dyn AttestationApi>,

    inbound: Mutex<Option<mpsc::Receiver<Inbound>>>,
    _lock: DirectoryLock,
}

impl SubsystemContainer {
    /// Open every store under the data directory and wire the subsystems.
    ///
    /// Must be called inside a Tokio runtime: the transport keeps a handle
    /// to it.
    #[instrument(name = "subsystem_init", skip(config))]
    pub fn new(config: NodeConfig) -> Result<Self, ContainerError> {
        info!("[dal-node] Initializing subsystem container");

        // =====================================================================
        // PHASE 1: Shared Infrastructure
        // =====================================================================
        info!("Phase 1: Creating shared infrastructure");
        let data_dir = config.storage.data_dir.clone();
        let lock = DirectoryLock::acquire(&data_dir)?;
        let local_peer_id = identity::load_or_create(&data_dir)?;
        let event_bus = Arc::new(InMemoryEventBus::new());
        let registry = ProtocolRegistry::with_supported();
        let protocol = registry.get(&config.l1.protocol)?;
        let parameters = protocol.parameters();
        let lag: Level = parameters.attestation_lag;
        info!(
            peer = %local_peer_id.short(),
            protocol = protocol.name(),
            slots = parameters.number_of_slots,
            lag,
            "  Identity and protocol parameters loaded"
        );

        // =====================================================================
        // PHASE 2: Cryptography and storage
        // =====================================================================
        info!("Phase 2: Initializing cryptobox and storage");
        let cryptobox = Arc::new(Cryptobox::new(CryptoboxParameters::from(&parameters))?);
        info!(
            shards = cryptobox.number_of_shards(),
            threshold = cryptobox.reconstruction_threshold(),
            "  [01] Cryptobox initialized"
        );

        let Tables {
            shards,
            headers,
            profiles,
        } = Tables::open(&data_dir, config.storage.backend)?;

        let store = ShardStoreService::new(
            shards,
            cryptobox.clone(),
            StoreConfig {
                retention_period: config.storage.retention_period,
            },
        )
        .with_event_sink(event_bus.clone());
        if config.storage.verify_on_startup {
            let report = store.verify_integrity()?;
            if !report.is_clean() {
                return Err(ContainerError::Corrupted(report.corrupted_keys.len()));
            }
            info!(checked = report.shards_checked, "  [02] Shard store verified");
        }
        let store: Arc<dyn ShardStoreApi> = Arc::new(store);

        let tracker: Arc<dyn SlotTrackerApi> = Arc::new(
            SlotTrackerService::open(
                headers,
                TrackerConfig::from_parameters(&parameters, config.storage.retention_period),
            )?
            .with_event_sink(event_bus.clone()),
        );
        info!(
            last_level = ?tracker.last_processed_level(),
            "  [03] Slot tracker initialized"
        );

        // =====================================================================
        // PHASE 3: Membership and amplification
        // =====================================================================
        info!("Phase 3: Initializing membership and amplification");
        let gossip_slot = Arc::new(GossipSlot::new());
        let membership: Arc<dyn TopicMembershipApi> = Arc::new(MembershipService::open(
            profiles,
            MembershipConfig {
                number_of_slots: parameters.number_of_slots,
                committee_history: config.storage.committee_history,
                attestation_lag: lag,
            },
            Arc::new(GossipSubscriber(gossip_slot.clone())),
        )?);
        info!(profiles = ?membership.profiles(), "  [05] Topic membership initialized");

        let publisher = Arc::new(GossipShardPublisher::new(
            gossip_slot.clone(),
            membership.clone(),
            lag,
        ));
        let amplifier: Arc<dyn AmplificationApi> = Arc::new(
            Amplifier::new(cryptobox.clone(), store.clone(), publisher.clone())
                .with_event_sink(event_bus.clone()),
        );
        info!("  [06] Amplifier initialized");

        // =====================================================================
        // PHASE 4: Overlay
        // =====================================================================
        info!("Phase 4: Initializing transport and gossip overlay");
        let (inbound_tx, inbound_rx) = mpsc::channel(config.network.inbound_capacity.max(1));
        let transport = TcpTransport::new(
            local_peer_id,
            TransportConfig {
                public_addr: config.network.public_addr.clone(),
                queue_capacity: config.network.peer_queue_capacity,
                dial_timeout: std::time::Duration::from_secs(config.network.dial_timeout_secs),
            },
            inbound_tx,
        );
        let gossip: Arc<dyn GossipApi> = Arc::new(
            GossipService::new(local_peer_id, config.gossip.clone(), Arc::new(transport.clone()))
                .with_validator(Arc::new(ShardValidator::new(
                    membership.clone(),
                    tracker.clone(),
                    cryptobox.clone(),
                    lag,
                )))
                .with_sink(Arc::new(ShardSink::new(
                    store.clone(),
                    membership.clone(),
                    amplifier.clone(),
                    lag,
                )))
                .with_event_sink(event_bus.clone()),
        );
        gossip_slot.fill(gossip.clone());
        for peer in &config.network.trusted_peers {
            // Validated with the configuration.
            if let Ok(peer_id) = peer.peer_id() {
                gossip.trust(peer_id, Some(peer.addr.clone()));
            }
        }
        info!(
            d = config.gossip.d,
            trusted = config.network.trusted_peers.len(),
            "  [04] Gossip overlay initialized"
        );

        // =====================================================================
        // PHASE 5: Attestation and profiles
        // =====================================================================
        info!("Phase 5: Initializing attestation resolver");
        let attestation: Arc<dyn AttestationApi> = Arc::new(AttestationResolver::new(
            parameters,
            Arc::new(MembershipCommittees(membership.clone())),
            Arc::new(TrackerHeaders(tracker.clone())),
            Arc::new(StoreAvailability(store.clone())),
        ));
        info!("  [07] Attestation resolver initialized");

        if !config.profiles.is_empty() {
            membership.add_profiles(config.profiles.clone())?;
        }
        if membership.profiles().is_empty() {
            warn!("[dal-node] No profile configured; the node only relays");
        }

        info!("[dal-node] All subsystems initialized");
        Ok(Self {
            config,
            parameters,
            local_peer_id,
            registry,
            event_bus,
            cryptobox,
            store,
            tracker,
            membership,
            amplifier,
            gossip,
            transport,
            publisher,
            attestation,
            inbound: Mutex::new(Some(inbound_rx)),
            _lock: lock,
        })
    }

    /// The transport's event receiver; `None` once taken.
    pub fn take_inbound(&self) -> Option<mpsc::Receiver<Inbound>> {
        self.inbound.lock().take()
    }

    /// First level the L1 follower should fetch.
    pub fn resume_level(&self) -> Level {
        self.tracker
            .last_processed_level()
            .map(|level| level + 1)
            .unwrap_or(self.config.l1.start_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::config::StorageBackend;
    use crate::l1::PROTO_BETA;
    use shared_types::Profile;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> NodeConfig {
        let mut config = NodeConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();
        config.storage.backend = StorageBackend::Directory;
        config.l1.protocol = PROTO_BETA.to_string();
        config.network.listen_addr = "127.0.0.1:0".into();
        config
    }

    #[tokio::test]
    async fn test_container_wires_beta_parameters() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.profiles = vec![Profile::Observer(2)];
        let container = SubsystemContainer::new(config).unwrap();

        assert_eq!(container.parameters.number_of_slots, 16);
        assert_eq!(container.membership.profiles(), vec![Profile::Observer(2)]);
        assert_eq!(container.resume_level(), 1);
        assert!(container.take_inbound().is_some());
        assert!(container.take_inbound().is_none());
    }

    #[tokio::test]
    async fn test_data_dir_locked_while_running() {
        let dir = TempDir::new().unwrap();
        let _first = SubsystemContainer::new(test_config(&dir)).unwrap();
        assert!(matches!(
            SubsystemContainer::new(test_config(&dir)),
            Err(ContainerError::Lock(_))
        ));
    }

    #[tokio::test]
    async fn test_identity_and_profiles_survive_restart() {
        let dir = TempDir::new().unwrap();
        let (peer, profiles) = {
            let mut config = test_config(&dir);
            config.profiles = vec![Profile::Producer(1)];
            let container = SubsystemContainer::new(config).unwrap();
            (container.local_peer_id, container.membership.profiles())
        };
        let container = SubsystemContainer::new(test_config(&dir)).unwrap();
        assert_eq!(container.local_peer_id, peer);
        assert_eq!(container.membership.profiles(), profiles);
    }

    #[tokio::test]
    async fn test_unknown_protocol_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.l1.protocol = "ProtoUnknown".into();
        assert!(matches!(
            SubsystemContainer::new(config),
            Err(ContainerError::Protocol(DecodeError::UnknownProtocol(_)))
        ));
    }
}
