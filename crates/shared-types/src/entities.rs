//! # Core Domain Entities
//!
//! Identifiers and small value types of the DAL.
//!
//! ## Clusters
//!
//! - **Coordinates**: `Level`, `SlotIndex`, `ShardIndex`
//! - **Content**: `Commitment`, `CommitmentProof`, `ShardProof`, `Shard`
//! - **Identity**: `PublicKeyHash`, `PeerId`
//! - **Overlay**: `Topic`, `Profile`

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::errors::IdentifierError;

// =============================================================================
// COORDINATES
// =============================================================================

/// L1 block level.
pub type Level = u32;

/// Index of a slot within a level, in `0..number_of_slots`.
pub type SlotIndex = u16;

/// Index of a shard within a slot encoding, in `0..number_of_shards`.
pub type ShardIndex = u16;

/// Fee paid by a commitment publication operation, in mutez.
pub type Fee = u64;

// =============================================================================
// BASE58CHECK HELPERS
// =============================================================================

/// Version prefix of commitments.
pub const COMMITMENT_PREFIX: [u8; 3] = [17, 165, 134];

/// Version prefix of ed25519 public key hashes (renders as `tz1…`).
pub const PKH_PREFIX: [u8; 3] = [6, 161, 159];

fn b58check_encode(prefix: &[u8], payload: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(prefix.len() + payload.len());
    bytes.extend_from_slice(prefix);
    bytes.extend_from_slice(payload);
    bs58::encode(bytes).with_check().into_string()
}

fn b58check_decode<const N: usize>(
    kind: &'static str,
    prefix: &[u8],
    s: &str,
) -> Result<[u8; N], IdentifierError> {
    let bytes = bs58::decode(s)
        .with_check(None)
        .into_vec()
        .map_err(|e| IdentifierError::InvalidBase58(e.to_string()))?;
    let payload = bytes
        .strip_prefix(prefix)
        .ok_or(IdentifierError::WrongPrefix { kind })?;
    payload
        .try_into()
        .map_err(|_| IdentifierError::WrongLength {
            kind,
            expected: N,
            actual: payload.len(),
        })
}

fn hex_decode<const N: usize>(kind: &'static str, s: &str) -> Result<[u8; N], IdentifierError> {
    let bytes = hex::decode(s).map_err(|e| IdentifierError::InvalidHex(e.to_string()))?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| IdentifierError::WrongLength {
        kind,
        expected: N,
        actual,
    })
}

/// Implements string serde for human readable formats and raw bytes otherwise.
macro_rules! readable_bytes_serde {
    ($ty:ident, $len:expr) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.collect_str(self)
                } else {
                    self.0.serialize(serializer)
                }
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    let s = String::deserialize(deserializer)?;
                    s.parse().map_err(D::Error::custom)
                } else {
                    <[u8; $len]>::deserialize(deserializer).map($ty)
                }
            }
        }
    };
}

// =============================================================================
// CONTENT
// =============================================================================

/// Digest binding a slot's erasure-coded representation.
///
/// Identical slot bytes always yield the same commitment.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Commitment(pub [u8; 32]);

impl Commitment {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&b58check_encode(&COMMITMENT_PREFIX, &self.0))
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", self)
    }
}

impl FromStr for Commitment {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        b58check_decode("commitment", &COMMITMENT_PREFIX, s).map(Commitment)
    }
}

readable_bytes_serde!(Commitment, 32);

/// Proof that a committed polynomial respects the degree bound.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CommitmentProof(pub [u8; 32]);

impl fmt::Display for CommitmentProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for CommitmentProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitmentProof({})", self)
    }
}

impl FromStr for CommitmentProof {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        hex_decode("commitment proof", s).map(CommitmentProof)
    }
}

readable_bytes_serde!(CommitmentProof, 32);

/// Authentication path proving a shard belongs to a commitment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ShardProof(pub Vec<[u8; 32]>);

impl ShardProof {
    /// Hex rendering: sibling digests joined in leaf-to-root order.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(hex::encode).collect()
    }

    pub fn from_hex(s: &str) -> Result<Self, IdentifierError> {
        if s.len() % 64 != 0 {
            return Err(IdentifierError::InvalidHex(format!(
                "proof length {} is not a multiple of 64",
                s.len()
            )));
        }
        (0..s.len())
            .step_by(64)
            .map(|start| hex_decode::<32>("proof node", &s[start..start + 64]))
            .collect::<Result<Vec<_>, _>>()
            .map(ShardProof)
    }
}

/// One erasure-coded fragment of a slot together with its proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    pub commitment: Commitment,
    pub index: ShardIndex,
    /// Serialized field elements of this shard.
    pub share: Vec<u8>,
    pub proof: ShardProof,
}

// =============================================================================
// IDENTITY
// =============================================================================

/// Public key hash of an attester (`tz1…`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PublicKeyHash(pub [u8; 20]);

impl PublicKeyHash {
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for PublicKeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&b58check_encode(&PKH_PREFIX, &self.0))
    }
}

impl fmt::Debug for PublicKeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for PublicKeyHash {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        b58check_decode("public key hash", &PKH_PREFIX, s).map(PublicKeyHash)
    }
}

readable_bytes_serde!(PublicKeyHash, 20);

/// Network identity of a DAL node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PeerId(pub [u8; 32]);

impl PeerId {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// First four bytes in hex, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.short())
    }
}

impl FromStr for PeerId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        hex_decode("peer id", s).map(PeerId)
    }
}

readable_bytes_serde!(PeerId, 32);

// =============================================================================
// OVERLAY
// =============================================================================

/// Gossip partition: shards of one slot index destined to one attester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Topic {
    pub slot_index: SlotIndex,
    pub pkh: PublicKeyHash,
}

impl Topic {
    pub const fn new(slot_index: SlotIndex, pkh: PublicKeyHash) -> Self {
        Self { slot_index, pkh }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.slot_index, self.pkh)
    }
}

/// Declared role of a node in the DAL network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Follows every slot index for the shards assigned to this attester.
    Attester(PublicKeyHash),
    /// Publishes slots on this index and follows all its shards.
    Producer(SlotIndex),
    /// Follows all shards of this index and amplifies.
    Observer(SlotIndex),
    /// Joins no topic; only relays peers.
    Bootstrap,
}

impl Profile {
    pub fn is_bootstrap(&self) -> bool {
        matches!(self, Profile::Bootstrap)
    }
}
