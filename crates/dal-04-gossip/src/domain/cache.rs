//! # Message Caches
//!
//! - [`SeenCache`]: bounded FIFO set of message keys, for deduplication.
//! - [`MessageCache`]: recent messages bucketed by heartbeat. The newest
//!   `gossip_windows` buckets are advertised through `IHave`; all
//!   `history_windows` buckets answer `IWant`.

use std::collections::{HashMap, HashSet, VecDeque};

use shared_types::Topic;

use super::message::{GossipMessage, MessageId, MessageKey};

// =============================================================================
// SEEN CACHE
// =============================================================================

#[derive(Debug)]
pub struct SeenCache {
    keys: HashSet<MessageKey>,
    order: VecDeque<MessageKey>,
    capacity: usize,
}

impl SeenCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            keys: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn contains(&self, key: &MessageKey) -> bool {
        self.keys.contains(key)
    }

    /// Returns `false` if the key was already present.
    pub fn insert(&mut self, key: MessageKey) -> bool {
        if self.keys.contains(&key) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
        self.keys.insert(key);
        self.order.push_back(key);
        true
    }

    /// Forget a key so a later copy of the message is processed again.
    pub fn remove(&mut self, key: &MessageKey) {
        if self.keys.remove(key) {
            self.order.retain(|k| k != key);
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// =============================================================================
// MESSAGE CACHE
// =============================================================================

#[derive(Debug)]
pub struct MessageCache {
    messages: HashMap<MessageKey, GossipMessage>,
    /// Front is the current heartbeat window.
    windows: VecDeque<Vec<MessageId>>,
    history_windows: usize,
    gossip_windows: usize,
}

impl MessageCache {
    pub fn new(history_windows: usize, gossip_windows: usize) -> Self {
        let history_windows = history_windows.max(1);
        let mut windows = VecDeque::with_capacity(history_windows);
        windows.push_front(Vec::new());
        Self {
            messages: HashMap::new(),
            windows,
            history_windows,
            gossip_windows: gossip_windows.min(history_windows),
        }
    }

    pub fn put(&mut self, message: GossipMessage) {
        let key = message.id.key();
        if self.messages.contains_key(&key) {
            return;
        }
        if let Some(current) = self.windows.front_mut() {
            current.push(message.id);
        }
        self.messages.insert(key, message);
    }

    pub fn get(&self, key: &MessageKey) -> Option<&GossipMessage> {
        self.messages.get(key)
    }

    /// Ids from the gossip windows that belong to `topic`.
    pub fn gossip_ids(&self, topic: &Topic) -> Vec<MessageId> {
        self.windows
            .iter()
            .take(self.gossip_windows)
            .flatten()
            .filter(|id| id.topic() == *topic)
            .copied()
            .collect()
    }

    /// Open a new window, forgetting the oldest once history is full.
    pub fn shift(&mut self) {
        self.windows.push_front(Vec::new());
        while self.windows.len() > self.history_windows {
            if let Some(expired) = self.windows.pop_back() {
                for id in expired {
                    self.messages.remove(&id.key());
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
