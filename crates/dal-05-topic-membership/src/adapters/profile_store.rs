//! Profile list persisted as JSON under a single key.

use shared_types::{KeyValueStore, Profile};
use tracing::debug;

use crate::domain::{MembershipError, MembershipResult};

const PROFILES_KEY: &[u8] = b"profiles/current";

pub struct ProfileStore<KV: KeyValueStore> {
    kv: KV,
}

impl<KV: KeyValueStore> ProfileStore<KV> {
    pub fn new(kv: KV) -> Self {
        Self { kv }
    }

    /// `None` when no profile list was ever saved.
    pub fn load(&self) -> MembershipResult<Option<Vec<Profile>>> {
        let Some(bytes) = self.kv.get(PROFILES_KEY)? else {
            return Ok(None);
        };
        let profiles = serde_json::from_slice(&bytes)
            .map_err(|e| MembershipError::Corrupted(e.to_string()))?;
        Ok(Some(profiles))
    }

    pub fn save(&self, profiles: &[Profile]) -> MembershipResult<()> {
        let bytes =
            serde_json::to_vec(profiles).map_err(|e| MembershipError::Corrupted(e.to_string()))?;
        self.kv.put(PROFILES_KEY, &bytes)?;
        debug!(count = profiles.len(), "[dal-05] Profiles persisted");
        Ok(())
    }
}
