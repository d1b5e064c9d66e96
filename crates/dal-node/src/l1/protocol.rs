//! # Protocol Services
//!
//! Each supported L1 protocol encodes finalized blocks differently and fixes
//! its own DAL parameters. [`ProtocolServices`] has one variant per protocol;
//! the variant is picked per block from the block's protocol hash through the
//! [`ProtocolRegistry`](super::ProtocolRegistry).
//!
//! | Protocol | Payload | Parameters |
//! |----------|---------|------------|
//! | `ProtoAlpha` | JSON | 32 slots, lag 8, 512 shards |
//! | `ProtoBeta` | bincode | 16 slots, lag 4, 256 shards |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shared_types::{
    AttestationRecord, Commitment, Committee, DalParameters, Fee, FinalizedBlock, Level,
    PublicKeyHash, PublishedHeader, ShardIndex, SlotIndex,
};
use thiserror::Error;

pub const PROTO_ALPHA: &str = "ProtoALphaDALxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx";
pub const PROTO_BETA: &str = "ProtoBetaDALxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx";

/// A finalized block as delivered by the L1 feed, not yet decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFinalizedBlock {
    /// Hash of the protocol the block was produced under.
    pub protocol: String,
    pub level: Level,
    /// Protocol-specific encoding, hex in JSON.
    #[serde(with = "hex_payload")]
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown protocol {0}")]
    UnknownProtocol(String),

    #[error("malformed {protocol} payload: {reason}")]
    Malformed {
        protocol: &'static str,
        reason: String,
    },

    #[error("payload describes level {payload}, block is at level {block}")]
    LevelMismatch { block: Level, payload: Level },

    #[error("attestation bitset of {actual} entries, protocol has {expected} slots")]
    AttestationLength { expected: usize, actual: usize },

    #[error("cannot encode for {protocol}: {reason}")]
    Unencodable {
        protocol: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolServices {
    /// JSON payloads, mainnet-like parameters.
    ProtoAlpha,
    /// bincode payloads, attestation as a bitmask, smaller slots.
    ProtoBeta,
}

impl ProtocolServices {
    pub const ALL: [ProtocolServices; 2] = [ProtocolServices::ProtoAlpha, ProtocolServices::ProtoBeta];

    pub fn hash(&self) -> &'static str {
        match self {
            ProtocolServices::ProtoAlpha => PROTO_ALPHA,
            ProtocolServices::ProtoBeta => PROTO_BETA,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProtocolServices::ProtoAlpha => "proto_alpha",
            ProtocolServices::ProtoBeta => "proto_beta",
        }
    }

    pub fn parameters(&self) -> DalParameters {
        match self {
            ProtocolServices::ProtoAlpha => DalParameters::default(),
            ProtocolServices::ProtoBeta => DalParameters {
                number_of_slots: 16,
                attestation_lag: 4,
                slot_size: 63_488,
                page_size: 1_984,
                redundancy_factor: 4,
                number_of_shards: 256,
            },
        }
    }

    /// Decode `raw` into the DAL view of the block. Never panics on
    /// malformed input.
    pub fn decode_block(&self, raw: &RawFinalizedBlock) -> Result<FinalizedBlock, DecodeError> {
        let block = match self {
            ProtocolServices::ProtoAlpha => {
                let payload: AlphaBlock =
                    serde_json::from_slice(&raw.payload).map_err(|e| self.malformed(e))?;
                payload.into_block()
            }
            ProtocolServices::ProtoBeta => {
                let payload: BetaBlock =
                    bincode::deserialize(&raw.payload).map_err(|e| self.malformed(e))?;
                payload.into_block(self.parameters().number_of_slots)?
            }
        };
        if block.level != raw.level {
            return Err(DecodeError::LevelMismatch {
                block: raw.level,
                payload: block.level,
            });
        }
        if let Some(record) = &block.attestation {
            let expected = self.parameters().number_of_slots as usize;
            if record.attested.len() != expected {
                return Err(DecodeError::AttestationLength {
                    expected,
                    actual: record.attested.len(),
                });
            }
        }
        Ok(block)
    }

    /// Encode `block` the way this protocol's L1 node serves it. Used by
    /// in-process feeds.
    pub fn encode_block(&self, block: &FinalizedBlock) -> Result<RawFinalizedBlock, DecodeError> {
        let payload = match self {
            ProtocolServices::ProtoAlpha => serde_json::to_vec(&AlphaBlock::from_block(block))
                .map_err(|e| self.unencodable(e))?,
            ProtocolServices::ProtoBeta => {
                let beta = BetaBlock::from_block(block).map_err(|e| self.unencodable(e))?;
                bincode::serialize(&beta).map_err(|e| self.unencodable(e))?
            }
        };
        Ok(RawFinalizedBlock {
            protocol: self.hash().to_string(),
            level: block.level,
            payload,
        })
    }

    fn malformed(&self, reason: impl ToString) -> DecodeError {
        DecodeError::Malformed {
            protocol: self.name(),
            reason: reason.to_string(),
        }
    }

    fn unencodable(&self, reason: impl ToString) -> DecodeError {
        DecodeError::Unencodable {
            protocol: self.name(),
            reason: reason.to_string(),
        }
    }
}

// =============================================================================
// PROTO ALPHA (JSON)
// =============================================================================

#[derive(Serialize, Deserialize)]
struct AlphaBlock {
    level: Level,
    /// Publications in operation order.
    #[serde(default)]
    dal_publications: Vec<AlphaPublication>,
    #[serde(default)]
    dal_attestation: Option<AlphaAttestation>,
    #[serde(default)]
    dal_committees: Vec<AlphaCommittee>,
}

#[derive(Serialize, Deserialize)]
struct AlphaPublication {
    slot_index: SlotIndex,
    commitment: Commitment,
    fee: Fee,
}

#[derive(Serialize, Deserialize)]
struct AlphaAttestation {
    published_level: Level,
    attested: Vec<bool>,
}

#[derive(Serialize, Deserialize)]
struct AlphaCommittee {
    level: Level,
    shard_assignment: BTreeMap<PublicKeyHash, Vec<ShardIndex>>,
}

impl AlphaBlock {
    fn into_block(self) -> FinalizedBlock {
        FinalizedBlock {
            level: self.level,
            headers: self
                .dal_publications
                .into_iter()
                .enumerate()
                .map(|(position, p)| PublishedHeader {
                    slot_index: p.slot_index,
                    commitment: p.commitment,
                    fee: p.fee,
                    op_position: position as u32,
                })
                .collect(),
            attestation: self.dal_attestation.map(|a| AttestationRecord {
                published_level: a.published_level,
                attested: a.attested,
            }),
            committees: self
                .dal_committees
                .into_iter()
                .map(|c| Committee::new(c.level, c.shard_assignment))
                .collect(),
        }
    }

    fn from_block(block: &FinalizedBlock) -> Self {
        let mut headers: Vec<&PublishedHeader> = block.headers.iter().collect();
        headers.sort_by_key(|h| h.op_position);
        Self {
            level: block.level,
            dal_publications: headers
                .into_iter()
                .map(|h| AlphaPublication {
                    slot_index: h.slot_index,
                    commitment: h.commitment,
                    fee: h.fee,
                })
                .collect(),
            dal_attestation: block.attestation.as_ref().map(|a| AlphaAttestation {
                published_level: a.published_level,
                attested: a.attested.clone(),
            }),
            dal_committees: block
                .committees
                .iter()
                .map(|c| AlphaCommittee {
                    level: c.level,
                    shard_assignment: c.assignments.clone(),
                })
                .collect(),
        }
    }
}

// =============================================================================
// PROTO BETA (bincode)
// =============================================================================

#[derive(Serialize, Deserialize)]
struct BetaBlock {
    level: Level,
    publications: Vec<BetaPublication>,
    /// (published level, bit `i` set when slot `i` is attested)
    attestation: Option<(Level, u64)>,
    committees: Vec<(Level, Vec<([u8; 20], Vec<ShardIndex>)>)>,
}

#[derive(Serialize, Deserialize)]
struct BetaPublication {
    slot_index: SlotIndex,
    commitment: [u8; 32],
    fee: Fee,
    position: u32,
}

impl BetaBlock {
    fn into_block(self, number_of_slots: u16) -> Result<FinalizedBlock, DecodeError> {
        if number_of_slots > 64 {
            return Err(DecodeError::Malformed {
                protocol: "proto_beta",
                reason: format!("{number_of_slots} slots do not fit the attestation mask"),
            });
        }
        Ok(FinalizedBlock {
            level: self.level,
            headers: self
                .publications
                .into_iter()
                .map(|p| PublishedHeader {
                    slot_index: p.slot_index,
                    commitment: Commitment(p.commitment),
                    fee: p.fee,
                    op_position: p.position,
                })
                .collect(),
            attestation: self.attestation.map(|(published_level, mask)| AttestationRecord {
                published_level,
                attested: (0..number_of_slots).map(|i| mask & (1 << i) != 0).collect(),
            }),
            committees: self
                .committees
                .into_iter()
                .map(|(level, members)| {
                    let assignments = members
                        .into_iter()
                        .map(|(pkh, shards)| (PublicKeyHash(pkh), shards))
                        .collect();
                    Committee::new(level, assignments)
                })
                .collect(),
        })
    }

    fn from_block(block: &FinalizedBlock) -> Result<Self, String> {
        let attestation = match &block.attestation {
            Some(record) => {
                if record.attested.len() > 64 {
                    return Err(format!("{} slots in attestation", record.attested.len()));
                }
                let mask = record
                    .attested
                    .iter()
                    .enumerate()
                    .filter(|(_, attested)| **attested)
                    .fold(0u64, |mask, (i, _)| mask | (1 << i));
                Some((record.published_level, mask))
            }
            None => None,
        };
        Ok(Self {
            level: block.level,
            publications: block
                .headers
                .iter()
                .map(|h| BetaPublication {
                    slot_index: h.slot_index,
                    commitment: h.commitment.0,
                    fee: h.fee,
                    position: h.op_position,
                })
                .collect(),
            attestation,
            committees: block
                .committees
                .iter()
                .map(|c| {
                    let members = c
                        .assignments
                        .iter()
                        .map(|(pkh, shards)| (pkh.0, shards.clone()))
                        .collect();
                    (c.level, members)
                })
                .collect(),
        })
    }
}

mod hex_payload {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkh(b: u8) -> PublicKeyHash {
        PublicKeyHash([b; 20])
    }

    fn sample_block(level: Level, number_of_slots: usize) -> FinalizedBlock {
        let mut assignments = BTreeMap::new();
        assignments.insert(pkh(1), vec![0, 2]);
        assignments.insert(pkh(2), vec![1, 3]);
        let mut attested = vec![false; number_of_slots];
        attested[1] = true;
        FinalizedBlock {
            level,
            headers: vec![
                PublishedHeader {
                    slot_index: 0,
                    commitment: Commitment([7; 32]),
                    fee: 1_200,
                    op_position: 0,
                },
                PublishedHeader {
                    slot_index: 0,
                    commitment: Commitment([8; 32]),
                    fee: 1_500,
                    op_position: 1,
                },
            ],
            attestation: Some(AttestationRecord {
                published_level: level - 4,
                attested,
            }),
            committees: vec![Committee::new(level + 4, assignments)],
        }
    }

    #[test]
    fn test_alpha_payload_is_json() {
        let alpha = ProtocolServices::ProtoAlpha;
        let block = sample_block(20, 32);
        let raw = alpha.encode_block(&block).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw.payload).unwrap();
        assert_eq!(json["dal_publications"][1]["fee"], 1_500);
        assert_eq!(alpha.decode_block(&raw).unwrap(), block);
    }

    #[test]
    fn test_beta_decodes_attestation_mask() {
        let beta = ProtocolServices::ProtoBeta;
        let block = sample_block(20, 16);
        let raw = beta.encode_block(&block).unwrap();
        let decoded = beta.decode_block(&raw).unwrap();
        let record = decoded.attestation.unwrap();
        assert_eq!(record.attested.len(), 16);
        assert!(record.is_attested(1));
        assert!(!record.is_attested(0));
        assert_eq!(decoded.committees[0].shards_of(&pkh(2)), &[1, 3]);
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        for services in ProtocolServices::ALL {
            let raw = RawFinalizedBlock {
                protocol: services.hash().to_string(),
                level: 3,
                payload: vec![0xff, 0x00, 0x13],
            };
            assert!(matches!(
                services.decode_block(&raw),
                Err(DecodeError::Malformed { .. })
            ));
        }
    }

    #[test]
    fn test_level_mismatch_rejected() {
        let alpha = ProtocolServices::ProtoAlpha;
        let mut raw = alpha.encode_block(&sample_block(20, 32)).unwrap();
        raw.level = 21;
        assert_eq!(
            alpha.decode_block(&raw),
            Err(DecodeError::LevelMismatch {
                block: 21,
                payload: 20
            })
        );
    }

    #[test]
    fn test_short_attestation_rejected() {
        let alpha = ProtocolServices::ProtoAlpha;
        let raw = alpha.encode_block(&sample_block(20, 5)).unwrap();
        assert_eq!(
            alpha.decode_block(&raw),
            Err(DecodeError::AttestationLength {
                expected: 32,
                actual: 5
            })
        );
    }

    #[test]
    fn test_raw_block_json_uses_hex_payload() {
        let raw = RawFinalizedBlock {
            protocol: PROTO_ALPHA.to_string(),
            level: 1,
            payload: vec![0xab, 0xcd],
        };
        let json = serde_json::to_value(&raw).unwrap();
        assert_eq!(json["payload"], "abcd");
        let back: RawFinalizedBlock = serde_json::from_value(json).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_beta_parameters_are_valid() {
        let params = ProtocolServices::ProtoBeta.parameters();
        let cryptobox =
            dal_01_cryptobox::Cryptobox::new(dal_01_cryptobox::CryptoboxParameters::from(&params));
        assert!(cryptobox.is_ok());
    }
}
