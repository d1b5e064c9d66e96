//! Protocol hash to [`ProtocolServices`] lookup, built once at startup.

use std::collections::HashMap;

use shared_types::FinalizedBlock;
use tracing::debug;

use super::protocol::{DecodeError, ProtocolServices, RawFinalizedBlock};

#[derive(Debug, Clone, Default)]
pub struct ProtocolRegistry {
    services: HashMap<String, ProtocolServices>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry knowing every protocol this node supports.
    pub fn with_supported() -> Self {
        let mut registry = Self::new();
        for services in ProtocolServices::ALL {
            registry.register(services);
        }
        registry
    }

    pub fn register(&mut self, services: ProtocolServices) {
        self.services.insert(services.hash().to_string(), services);
    }

    /// ## Errors
    ///
    /// - `UnknownProtocol`: no services registered for `protocol`
    pub fn get(&self, protocol: &str) -> Result<ProtocolServices, DecodeError> {
        self.services
            .get(protocol)
            .copied()
            .ok_or_else(|| DecodeError::UnknownProtocol(protocol.to_string()))
    }

    /// Decode `raw` with the services of its own protocol.
    pub fn decode(&self, raw: &RawFinalizedBlock) -> Result<FinalizedBlock, DecodeError> {
        let services = self.get(&raw.protocol)?;
        debug!(level = raw.level, protocol = services.name(), "[dal-node] Decoding block");
        services.decode_block(raw)
    }

    pub fn protocols(&self) -> Vec<&str> {
        let mut hashes: Vec<&str> = self.services.keys().map(String::as_str).collect();
        hashes.sort_unstable();
        hashes
    }
}
