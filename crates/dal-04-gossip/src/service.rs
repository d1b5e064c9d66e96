//! # Gossip Service
//!
//! Implements [`GossipApi`] over a [`PeerTransport`].
//!
//! ## Locking
//!
//! All overlay state sits behind one mutex. Handlers collect outgoing frames
//! into an outbox while holding it and hand them to the transport after
//! releasing it. Validation and delivery to the application also run outside
//! the lock, so a slow validator never stalls other peers' frames.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use shared_bus::{DalEvent, EventSink, NoopSink};
use shared_types::{PeerId, SystemTimeSource, TimeSource, Timestamp, Topic};
use tracing::{debug, info, trace, warn};

use crate::domain::{
    ConnectionState, Frame, GossipConfig, GossipError, GossipMessage, GossipResult,
    HeartbeatReport, MessageCache, MessageId, MessageKey, PeerInfo, PeerRecord, ReconnectSchedule,
    SeenCache,
};
use crate::ports::inbound::GossipApi;
use crate::ports::outbound::{
    AcceptAll, DiscardSink, MessageSink, MessageValidator, PeerTransport, ValidationResult,
};

type Outbox = Vec<(PeerId, Frame)>;

/// Copies of one message held while its first copy is being validated.
const MAX_QUEUED_COPIES: usize = 8;

// =============================================================================
// OVERLAY STATE
// =============================================================================

struct OverlayState {
    peers: HashMap<PeerId, PeerRecord>,
    joined: BTreeSet<Topic>,
    mesh: BTreeMap<Topic, BTreeSet<PeerId>>,
    banned: BTreeSet<PeerId>,
    seen: SeenCache,
    mcache: MessageCache,
    /// Keys under validation, with copies from other peers that arrived meanwhile.
    validating: HashMap<MessageKey, Vec<(PeerId, GossipMessage)>>,
}

impl OverlayState {
    fn new(config: &GossipConfig) -> Self {
        Self {
            peers: HashMap::new(),
            joined: BTreeSet::new(),
            mesh: BTreeMap::new(),
            banned: BTreeSet::new(),
            seen: SeenCache::new(config.seen_cache_size),
            mcache: MessageCache::new(config.history_length, config.history_gossip),
            validating: HashMap::new(),
        }
    }

    fn connected_peers(&self) -> impl Iterator<Item = &PeerRecord> {
        self.peers.values().filter(|r| r.is_connected())
    }

    /// Best-scored connected peers eligible for the `topic` mesh.
    fn graft_candidates(&self, topic: &Topic, now: Timestamp, config: &GossipConfig) -> Vec<PeerId> {
        let members = self.mesh.get(topic);
        let mut candidates: Vec<&PeerRecord> = self
            .connected_peers()
            .filter(|r| r.topics.contains(topic))
            .filter(|r| members.map_or(true, |m| !m.contains(&r.id)))
            .filter(|r| !self.banned.contains(&r.id))
            .filter(|r| r.meshable(&config.score))
            .filter(|r| !r.in_backoff(topic, now))
            .collect();
        sort_by_preference(&mut candidates, config);
        candidates.into_iter().map(|r| r.id).collect()
    }

    fn remove_from_meshes(&mut self, peer: &PeerId) {
        for members in self.mesh.values_mut() {
            members.remove(peer);
        }
    }

    /// Drop `peer` from the `topic` mesh and queue a `Prune` with backoff.
    fn prune(&mut self, peer: PeerId, topic: Topic, now: Timestamp, config: &GossipConfig, outbox: &mut Outbox) {
        if let Some(members) = self.mesh.get_mut(&topic) {
            members.remove(&peer);
        }
        if let Some(record) = self.peers.get_mut(&peer) {
            record
                .backoff
                .insert(topic, now + config.prune_backoff_secs * 1_000);
        }
        outbox.push((
            peer,
            Frame::Prune {
                topic,
                backoff_secs: config.prune_backoff_secs,
            },
        ));
    }
}

/// Trusted first, then highest score, then peer id for determinism.
fn sort_by_preference(peers: &mut [&PeerRecord], config: &GossipConfig) {
    peers.sort_by(|a, b| {
        b.trusted
            .cmp(&a.trusted)
            .then_with(|| b.score.score(&config.score).total_cmp(&a.score.score(&config.score)))
            .then_with(|| a.id.cmp(&b.id))
    });
}

// =============================================================================
// SERVICE
// =============================================================================

pub struct GossipService {
    local: PeerId,
    config: GossipConfig,
    state: Mutex<OverlayState>,
    transport: Arc<dyn PeerTransport>,
    validator: Arc<dyn MessageValidator>,
    sink: Arc<dyn MessageSink>,
    time: Arc<dyn TimeSource>,
    events: Arc<dyn EventSink>,
}

impl GossipService {
    pub fn new(local: PeerId, config: GossipConfig, transport: Arc<dyn PeerTransport>) -> Self {
        Self {
            local,
            state: Mutex::new(OverlayState::new(&config)),
            config,
            transport,
            validator: Arc::new(AcceptAll),
            sink: Arc::new(DiscardSink),
            time: Arc::new(SystemTimeSource),
            events: Arc::new(NoopSink),
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn MessageValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn local_peer_id(&self) -> PeerId {
        self.local
    }

    pub fn config(&self) -> &GossipConfig {
        &self.config
    }

    fn flush(&self, outbox: Outbox) {
        for (peer, frame) in outbox {
            let name = frame.name();
            if let Err(e) = self.transport.send(&peer, frame) {
                debug!(peer = %peer.short(), frame = name, error = %e, "[dal-04] Send failed");
            }
        }
    }

    // =========================================================================
    // FRAME HANDLERS
    // =========================================================================

    fn on_subscribe(&self, from: PeerId, topic: Topic, now: Timestamp) {
        let mut outbox = Outbox::new();
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(record) = state.peers.get_mut(&from) else {
                return;
            };
            record.topics.insert(topic);

            if !state.joined.contains(&topic) {
                return;
            }
            let eligible = record.meshable(&self.config.score) && !record.in_backoff(&topic, now);
            let members = state.mesh.entry(topic).or_default();
            if eligible && members.len() < self.config.d && members.insert(from) {
                outbox.push((from, Frame::Graft(topic)));
                debug!(peer = %from.short(), %topic, "[dal-04] Grafted on subscribe");
            }
        }
        self.flush(outbox);
    }

    fn on_unsubscribe(&self, from: PeerId, topic: Topic) {
        let mut state = self.state.lock();
        if let Some(record) = state.peers.get_mut(&from) {
            record.topics.remove(&topic);
        }
        if let Some(members) = state.mesh.get_mut(&topic) {
            members.remove(&from);
        }
    }

    fn on_graft(&self, from: PeerId, topic: Topic, now: Timestamp) {
        let mut outbox = Outbox::new();
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let banned = state.banned.contains(&from);
            let joined = state.joined.contains(&topic);
            let Some(record) = state.peers.get_mut(&from) else {
                return;
            };
            record.topics.insert(topic);
            let accepted = joined
                && !banned
                && record.meshable(&self.config.score)
                && !record.in_backoff(&topic, now);

            if accepted {
                state.mesh.entry(topic).or_default().insert(from);
                trace!(peer = %from.short(), %topic, "[dal-04] Graft accepted");
            } else {
                debug!(peer = %from.short(), %topic, joined, "[dal-04] Graft refused");
                state.prune(from, topic, now, &self.config, &mut outbox);
            }
        }
        self.flush(outbox);
    }

    fn on_prune(&self, from: PeerId, topic: Topic, backoff_secs: u64, now: Timestamp) {
        let mut state = self.state.lock();
        if let Some(members) = state.mesh.get_mut(&topic) {
            members.remove(&from);
        }
        if let Some(record) = state.peers.get_mut(&from) {
            record.backoff.insert(topic, now + backoff_secs * 1_000);
        }
    }

    fn on_ihave(&self, from: PeerId, topic: Topic, ids: Vec<MessageId>) {
        let wanted: Vec<MessageId> = {
            let state = self.state.lock();
            if !state.joined.contains(&topic) {
                return;
            }
            let mut keys = BTreeSet::new();
            ids.into_iter()
                .filter(|id| id.topic() == topic)
                .filter(|id| !state.seen.contains(&id.key()))
                .filter(|id| keys.insert(id.key()))
                .collect()
        };
        if !wanted.is_empty() {
            debug!(peer = %from.short(), %topic, count = wanted.len(), "[dal-04] Requesting advertised messages");
            self.flush(vec![(from, Frame::IWant { ids: wanted })]);
        }
    }

    fn on_iwant(&self, from: PeerId, ids: Vec<MessageId>) {
        let outbox: Outbox = {
            let state = self.state.lock();
            ids.iter()
                .filter_map(|id| state.mcache.get(&id.key()))
                .map(|message| (from, Frame::Publish(message.clone())))
                .collect()
        };
        self.flush(outbox);
    }

    fn on_publish(&self, from: PeerId, message: GossipMessage) {
        let key = message.id.key();
        let topic = message.topic();
        {
            let mut state = self.state.lock();
            if !state.joined.contains(&topic) {
                trace!(peer = %from.short(), %topic, "[dal-04] Message on unjoined topic dropped");
                return;
            }
            if !state.seen.insert(key) {
                if let Some(queued) = state.validating.get_mut(&key) {
                    if queued.len() < MAX_QUEUED_COPIES && queued.iter().all(|(peer, _)| *peer != from) {
                        queued.push((from, message));
                    }
                    return;
                }
                trace!(peer = %from.short(), shard_index = message.id.shard_index, "[dal-04] Duplicate message");
                return;
            }
            state.validating.insert(key, Vec::new());
        }

        let verdict = self.validator.validate(&message);

        let mut outbox = Outbox::new();
        let retry = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let queued = state.validating.remove(&key).unwrap_or_default();
            match verdict {
                ValidationResult::Reject(reason) => {
                    state.seen.remove(&key);
                    if let Some(record) = state.peers.get_mut(&from) {
                        record.score.on_invalid_message();
                        warn!(
                            peer = %from.short(),
                            commitment = %message.id.commitment,
                            shard_index = message.id.shard_index,
                            score = record.score.score(&self.config.score),
                            reason = %reason,
                            "[dal-04] Rejected invalid message"
                        );
                    }
                    Some(queued)
                }
                ValidationResult::Ignore => {
                    state.seen.remove(&key);
                    debug!(peer = %from.short(), shard_index = message.id.shard_index, "[dal-04] Message ignored");
                    Some(queued)
                }
                ValidationResult::Accept => {
                    if let Some(record) = state.peers.get_mut(&from) {
                        record.score.on_first_delivery(&self.config.score);
                    }
                    state.mcache.put(message.clone());
                    if let Some(members) = state.mesh.get(&topic) {
                        outbox.extend(
                            members
                                .iter()
                                .filter(|peer| **peer != from)
                                .map(|peer| (*peer, Frame::Publish(message.clone()))),
                        );
                    }
                    None
                }
            }
        };

        match retry {
            // The first copy failed; give the held copies their own turn.
            Some(queued) => {
                for (peer, copy) in queued {
                    self.on_publish(peer, copy);
                }
            }
            None => {
                self.sink.deliver(&message);
                self.flush(outbox);
            }
        }
    }
}

// =============================================================================
// API
// =============================================================================

impl GossipApi for GossipService {
    fn join(&self, topic: Topic) -> bool {
        let now = self.time.now_ms();
        let mut outbox = Outbox::new();
        let grafted = {
            let mut state = self.state.lock();
            if !state.joined.insert(topic) {
                return false;
            }
            let selected: BTreeSet<PeerId> = state
                .graft_candidates(&topic, now, &self.config)
                .into_iter()
                .take(self.config.d)
                .collect();
            outbox.extend(state.connected_peers().map(|r| (r.id, Frame::Subscribe(topic))));
            outbox.extend(selected.iter().map(|peer| (*peer, Frame::Graft(topic))));
            let grafted = selected.len();
            state.mesh.insert(topic, selected);
            grafted
        };
        self.flush(outbox);
        self.events.emit(DalEvent::TopicJoined(topic));
        info!(%topic, grafted, "[dal-04] Joined topic");
        true
    }

    fn leave(&self, topic: Topic) -> bool {
        let now = self.time.now_ms();
        let mut outbox = Outbox::new();
        {
            let mut state = self.state.lock();
            if !state.joined.remove(&topic) {
                return false;
            }
            let members = state.mesh.get(&topic).cloned().unwrap_or_default();
            for peer in members {
                state.prune(peer, topic, now, &self.config, &mut outbox);
            }
            state.mesh.remove(&topic);
            outbox.extend(state.connected_peers().map(|r| (r.id, Frame::Unsubscribe(topic))));
        }
        self.flush(outbox);
        self.events.emit(DalEvent::TopicLeft(topic));
        info!(%topic, "[dal-04] Left topic");
        true
    }

    fn publish(&self, message: GossipMessage) -> GossipResult<usize> {
        let topic = message.topic();
        let outbox: Outbox = {
            let mut state = self.state.lock();
            if !state.seen.insert(message.id.key()) {
                return Err(GossipError::DuplicateMessage {
                    commitment: message.id.commitment,
                    shard_index: message.id.shard_index,
                });
            }
            state.mcache.put(message.clone());

            let targets: Vec<PeerId> = if state.joined.contains(&topic) {
                state
                    .mesh
                    .get(&topic)
                    .map(|m| m.iter().copied().collect())
                    .unwrap_or_default()
            } else {
                // Fanout: best subscribed peers, without joining.
                let mut subscribed: Vec<&PeerRecord> = state
                    .connected_peers()
                    .filter(|r| r.topics.contains(&topic))
                    .filter(|r| r.meshable(&self.config.score))
                    .collect();
                sort_by_preference(&mut subscribed, &self.config);
                subscribed.into_iter().take(self.config.d).map(|r| r.id).collect()
            };
            targets
                .into_iter()
                .map(|peer| (peer, Frame::Publish(message.clone())))
                .collect()
        };
        let sent = outbox.len();
        trace!(%topic, shard_index = message.id.shard_index, sent, "[dal-04] Published");
        self.flush(outbox);
        Ok(sent)
    }

    fn on_peer_connected(&self, peer: PeerId, addr: Option<String>) -> GossipResult<()> {
        let outbox: Outbox = {
            let mut guard = self.state.lock();
            if guard.banned.contains(&peer) {
                drop(guard);
                self.transport.disconnect(&peer);
                warn!(peer = %peer.short(), "[dal-04] Refused connection from banned peer");
                return Err(GossipError::Banned(peer));
            }
            let state = &mut *guard;
            let record = state
                .peers
                .entry(peer)
                .or_insert_with(|| PeerRecord::new(peer));
            if addr.is_some() {
                record.addr = addr;
            }
            record.state = ConnectionState::Connected;
            record.reconnect = None;
            record.disconnected_at = None;
            record.topics.clear();
            state
                .joined
                .iter()
                .map(|topic| (peer, Frame::Subscribe(*topic)))
                .collect()
        };
        self.flush(outbox);
        self.events.emit(DalEvent::PeerConnected(peer));
        info!(peer = %peer.short(), "[dal-04] Peer connected");
        Ok(())
    }

    fn on_peer_disconnected(&self, peer: PeerId) {
        let now = self.time.now_ms();
        {
            let mut state = self.state.lock();
            let Some(record) = state.peers.get_mut(&peer) else {
                return;
            };
            if record.state == ConnectionState::Disconnected {
                return;
            }
            record.state = ConnectionState::Disconnected;
            record.topics.clear();
            if record.trusted {
                record.reconnect = Some(ReconnectSchedule {
                    attempts: 0,
                    next_at: now + self.config.reconnect_delay_ms(0),
                });
            } else {
                record.disconnected_at = Some(now);
            }
            state.remove_from_meshes(&peer);
        }
        self.events.emit(DalEvent::PeerDisconnected(peer));
        info!(peer = %peer.short(), "[dal-04] Peer disconnected");
    }

    fn on_dial_failed(&self, peer: PeerId) {
        let mut state = self.state.lock();
        if let Some(record) = state.peers.get_mut(&peer) {
            if record.state == ConnectionState::Connecting {
                record.state = ConnectionState::Disconnected;
            }
        }
    }

    fn handle_frame(&self, from: PeerId, frame: Frame) {
        let now = self.time.now_ms();
        {
            let state = self.state.lock();
            match state.peers.get(&from) {
                Some(record) if record.is_connected() => {
                    if record.score.is_graylisted(&self.config.score) {
                        trace!(peer = %from.short(), frame = frame.name(), "[dal-04] Graylisted peer ignored");
                        return;
                    }
                }
                _ => {
                    debug!(peer = %from.short(), frame = frame.name(), "[dal-04] Frame from unconnected peer");
                    return;
                }
            }
        }

        match frame {
            Frame::Hello { listen_addr, .. } => {
                if let Some(addr) = listen_addr {
                    if let Some(record) = self.state.lock().peers.get_mut(&from) {
                        record.addr = Some(addr);
                    }
                }
            }
            Frame::Subscribe(topic) => self.on_subscribe(from, topic, now),
            Frame::Unsubscribe(topic) => self.on_unsubscribe(from, topic),
            Frame::Graft(topic) => self.on_graft(from, topic, now),
            Frame::Prune {
                topic,
                backoff_secs,
            } => self.on_prune(from, topic, backoff_secs, now),
            Frame::IHave { topic, ids } => self.on_ihave(from, topic, ids),
            Frame::IWant { ids } => self.on_iwant(from, ids),
            Frame::Publish(message) => self.on_publish(from, message),
        }
    }

    fn heartbeat(&self) -> HeartbeatReport {
        let now = self.time.now_ms();
        let config = &self.config;
        let mut report = HeartbeatReport::default();
        let mut outbox = Outbox::new();
        let mut dials = Vec::new();
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            // 1. Peers below the prune threshold leave every mesh.
            let mut to_prune = Vec::new();
            for (topic, members) in &state.mesh {
                for peer in members {
                    let meshable = state
                        .peers
                        .get(peer)
                        .is_some_and(|r| r.is_connected() && r.meshable(&config.score));
                    if !meshable {
                        to_prune.push((*peer, *topic));
                    }
                }
            }
            for (peer, topic) in to_prune {
                state.prune(peer, topic, now, config, &mut outbox);
                report.pruned.push((peer, topic));
            }

            // 2-3. Keep every joined mesh between D_low and D_high.
            let joined: Vec<Topic> = state.joined.iter().copied().collect();
            for topic in &joined {
                let size = state.mesh.get(topic).map_or(0, BTreeSet::len);
                if size < config.d_low {
                    let selected: Vec<PeerId> = state
                        .graft_candidates(topic, now, config)
                        .into_iter()
                        .take(config.d - size)
                        .collect();
                    let members = state.mesh.entry(*topic).or_default();
                    for peer in selected {
                        members.insert(peer);
                        outbox.push((peer, Frame::Graft(*topic)));
                        report.grafted.push((peer, *topic));
                    }
                } else if size > config.d_high {
                    let mut members: Vec<&PeerRecord> = state.mesh[topic]
                        .iter()
                        .filter_map(|peer| state.peers.get(peer))
                        .collect();
                    sort_by_preference(&mut members, config);
                    let excess: Vec<PeerId> = members.iter().skip(config.d).map(|r| r.id).collect();
                    for peer in excess {
                        state.prune(peer, *topic, now, config, &mut outbox);
                        report.pruned.push((peer, *topic));
                    }
                }
            }

            // 4. Advertise recent messages to subscribed peers outside the mesh.
            for topic in &joined {
                let ids = state.mcache.gossip_ids(topic);
                if ids.is_empty() {
                    continue;
                }
                let members = state.mesh.get(topic);
                let mut lazy: Vec<&PeerRecord> = state
                    .connected_peers()
                    .filter(|r| r.topics.contains(topic))
                    .filter(|r| members.map_or(true, |m| !m.contains(&r.id)))
                    .filter(|r| !r.score.is_graylisted(&config.score))
                    .collect();
                sort_by_preference(&mut lazy, config);
                for record in lazy.into_iter().take(config.d_lazy) {
                    outbox.push((
                        record.id,
                        Frame::IHave {
                            topic: *topic,
                            ids: ids.clone(),
                        },
                    ));
                    report.ihave_sent += 1;
                }
            }

            // 5. Shift the message cache.
            state.mcache.shift();

            // 6. Decay scores.
            for record in state.peers.values_mut() {
                record.score.decay(&config.score);
            }

            // 7. Trusted peers due for reconnection.
            for record in state.peers.values_mut() {
                if !record.trusted || record.is_connected() {
                    continue;
                }
                let Some(schedule) = record.reconnect.as_mut() else {
                    continue;
                };
                if schedule.next_at > now {
                    continue;
                }
                let Some(addr) = record.addr.clone() else {
                    debug!(peer = %record.id.short(), "[dal-04] Trusted peer has no known address");
                    continue;
                };
                record.state = ConnectionState::Connecting;
                schedule.next_at = now + config.reconnect_delay_ms(schedule.attempts + 1);
                schedule.attempts += 1;
                dials.push((record.id, addr));
            }

            // Forget regular peers disconnected for longer than the retention.
            let retain_ms = config.score.retain_score_secs * 1_000;
            let before = state.peers.len();
            state.peers.retain(|_, r| {
                r.trusted
                    || r.state != ConnectionState::Disconnected
                    || r.disconnected_at.map_or(true, |at| now.saturating_sub(at) < retain_ms)
            });
            report.forgotten = before - state.peers.len();
        }

        self.flush(outbox);

        for (peer, addr) in dials {
            match self.transport.dial(&peer, &addr) {
                Ok(()) => {
                    debug!(peer = %peer.short(), %addr, "[dal-04] Reconnecting trusted peer");
                    report.reconnecting.push(peer);
                }
                Err(e) => {
                    debug!(peer = %peer.short(), %addr, error = %e, "[dal-04] Dial failed");
                    self.on_dial_failed(peer);
                }
            }
        }

        if !report.pruned.is_empty() || !report.grafted.is_empty() {
            debug!(
                pruned = report.pruned.len(),
                grafted = report.grafted.len(),
                ihave = report.ihave_sent,
                "[dal-04] Heartbeat"
            );
        }
        report
    }

    fn ban(&self, peer: PeerId) {
        let now = self.time.now_ms();
        {
            let mut state = self.state.lock();
            state.banned.insert(peer);
            let record = state
                .peers
                .entry(peer)
                .or_insert_with(|| PeerRecord::new(peer));
            record.trusted = false;
            record.reconnect = None;
            record.state = ConnectionState::Disconnected;
            record.topics.clear();
            record.disconnected_at = Some(now);
            state.remove_from_meshes(&peer);
        }
        self.transport.disconnect(&peer);
        self.events.emit(DalEvent::PeerBanned(peer));
        warn!(peer = %peer.short(), "[dal-04] Peer banned");
    }

    fn unban(&self, peer: PeerId) {
        if self.state.lock().banned.remove(&peer) {
            info!(peer = %peer.short(), "[dal-04] Peer unbanned");
        }
    }

    fn trust(&self, peer: PeerId, addr: Option<String>) {
        let now = self.time.now_ms();
        let mut state = self.state.lock();
        state.banned.remove(&peer);
        let record = state
            .peers
            .entry(peer)
            .or_insert_with(|| PeerRecord::new(peer));
        record.trusted = true;
        record.disconnected_at = None;
        if addr.is_some() {
            record.addr = addr;
        }
        if !record.is_connected() {
            record.reconnect = Some(ReconnectSchedule {
                attempts: 0,
                next_at: now,
            });
        }
        info!(peer = %peer.short(), "[dal-04] Peer trusted");
    }

    fn open(&self, peer: PeerId) {
        let now = self.time.now_ms();
        let mut state = self.state.lock();
        state.banned.remove(&peer);
        if let Some(record) = state.peers.get_mut(&peer) {
            record.trusted = false;
            record.reconnect = None;
            if record.state != ConnectionState::Connected {
                record.state = ConnectionState::Disconnected;
                record.disconnected_at = Some(now);
            }
        }
    }

    fn peers(&self) -> Vec<PeerInfo> {
        let state = self.state.lock();
        let mut peers: Vec<PeerInfo> = state
            .peers
            .values()
            .map(|r| r.info(&self.config.score))
            .collect();
        peers.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        peers
    }

    fn peer(&self, peer: &PeerId) -> Option<PeerInfo> {
        self.state
            .lock()
            .peers
            .get(peer)
            .map(|r| r.info(&self.config.score))
    }

    fn is_banned(&self, peer: &PeerId) -> bool {
        self.state.lock().banned.contains(peer)
    }

    fn topics(&self) -> Vec<Topic> {
        self.state.lock().joined.iter().copied().collect()
    }

    fn mesh(&self) -> BTreeMap<Topic, Vec<PeerId>> {
        self.state
            .lock()
            .mesh
            .iter()
            .map(|(topic, members)| (*topic, members.iter().copied().collect()))
            .collect()
    }
}
