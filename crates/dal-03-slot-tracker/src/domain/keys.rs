//! Persisted layout.
//!
//! - `header/` ‖ level (BE 4) ‖ slot (BE 2) ‖ commitment (32) → bincode `SlotHeader`
//! - `intent/` ‖ level (BE 4) ‖ slot (BE 2) ‖ commitment (32) → empty
//! - `meta/last_level` → level (BE 4)

use shared_types::{Commitment, Level, SlotIndex};

pub const HEADER: &[u8] = b"header/";
pub const INTENT: &[u8] = b"intent/";
pub const LAST_LEVEL: &[u8] = b"meta/last_level";

fn coordinate_key(prefix: &[u8], level: Level, slot_index: SlotIndex, commitment: &Commitment) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 38);
    key.extend_from_slice(prefix);
    key.extend_from_slice(&level.to_be_bytes());
    key.extend_from_slice(&slot_index.to_be_bytes());
    key.extend_from_slice(commitment.as_bytes());
    key
}

pub fn header_key(level: Level, slot_index: SlotIndex, commitment: &Commitment) -> Vec<u8> {
    coordinate_key(HEADER, level, slot_index, commitment)
}

pub fn intent_key(level: Level, slot_index: SlotIndex, commitment: &Commitment) -> Vec<u8> {
    coordinate_key(INTENT, level, slot_index, commitment)
}

/// Parse the coordinates of an `intent/` key.
pub fn parse_intent_key(key: &[u8]) -> Option<(Level, SlotIndex, Commitment)> {
    let rest = key.strip_prefix(INTENT)?;
    if rest.len() != 38 {
        return None;
    }
    let level = Level::from_be_bytes(rest[0..4].try_into().ok()?);
    let slot = SlotIndex::from_be_bytes(rest[4..6].try_into().ok()?);
    let commitment = Commitment(rest[6..38].try_into().ok()?);
    Some((level, slot, commitment))
}
