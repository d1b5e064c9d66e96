//! # Cryptobox Service
//!
//! Facade tying the erasure code to the Merkle commitment. Every method is
//! pure and safe to call concurrently from blocking worker threads.

use std::collections::BTreeMap;

use shared_types::{Commitment, CommitmentProof, Shard, ShardIndex, ShardProof};
use tracing::debug;

use crate::domain::erasure::ErasureCode;
use crate::domain::errors::CryptoboxError;
use crate::domain::field::{
    bytes_to_scalars, decode_share, encode_share, scalars_to_bytes, SCALAR_SERIALIZED_BYTES,
};
use crate::domain::merkle::{leaf_hash, tagged_hash, verify_path, MerkleTree};
use crate::domain::parameters::{CryptoboxParameters, Layout};

const COMMITMENT_PROOF_TAG: &[u8] = b"dal-commitment-degree";

/// Output of [`Cryptobox::commit_slot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSlot {
    pub commitment: Commitment,
    pub commitment_proof: CommitmentProof,
    /// All shards, indexed by position.
    pub shards: Vec<Shard>,
}

pub struct Cryptobox {
    parameters: CryptoboxParameters,
    layout: Layout,
    code: ErasureCode,
}

impl Cryptobox {
    pub fn new(parameters: CryptoboxParameters) -> Result<Self, CryptoboxError> {
        let layout = parameters.layout()?;
        let code = ErasureCode::new(layout)?;
        debug!(
            slot_size = parameters.slot_size,
            data_len = layout.data_len,
            encoded_len = layout.encoded_len,
            shards = layout.number_of_shards,
            "[dal-01] Cryptobox initialized"
        );
        Ok(Self {
            parameters,
            layout,
            code,
        })
    }

    pub fn parameters(&self) -> &CryptoboxParameters {
        &self.parameters
    }

    pub fn number_of_shards(&self) -> usize {
        self.layout.number_of_shards
    }

    /// Distinct shards needed by [`Cryptobox::reconstruct_slot`].
    pub fn reconstruction_threshold(&self) -> usize {
        self.layout.threshold()
    }

    /// Byte length of every valid share.
    pub fn share_size(&self) -> usize {
        self.layout.shard_len * SCALAR_SERIALIZED_BYTES
    }

    pub fn number_of_pages(&self) -> usize {
        self.layout.number_of_pages
    }

    fn merkle_depth(&self) -> usize {
        self.layout.number_of_shards.trailing_zeros() as usize
    }

    // =========================================================================
    // COMMIT
    // =========================================================================

    /// Erasure code `slot` and commit to the resulting shards.
    ///
    /// Deterministic: the same bytes always give the same commitment.
    pub fn commit_slot(&self, slot: &[u8]) -> Result<EncodedSlot, CryptoboxError> {
        self.check_slot_size(slot)?;
        let data = bytes_to_scalars(slot, self.layout.data_len);
        Ok(self.encode_data(&data))
    }

    pub fn commitment_of(&self, slot: &[u8]) -> Result<Commitment, CryptoboxError> {
        self.commit_slot(slot).map(|encoded| encoded.commitment)
    }

    /// Shards of `slot`, checked against `commitment`.
    pub fn shards_from_slot(
        &self,
        commitment: &Commitment,
        slot: &[u8],
    ) -> Result<Vec<Shard>, CryptoboxError> {
        let encoded = self.commit_slot(slot)?;
        if &encoded.commitment != commitment {
            return Err(CryptoboxError::InconsistentShards);
        }
        Ok(encoded.shards)
    }

    fn encode_data(&self, data: &[ark_bls12_381::Fr]) -> EncodedSlot {
        let codeword = self.code.encode(data);
        let shares: Vec<Vec<u8>> = (0..self.layout.number_of_shards)
            .map(|j| encode_share(&self.code.shard_evaluations(&codeword, j)))
            .collect();

        let leaves = shares
            .iter()
            .enumerate()
            .map(|(j, share)| leaf_hash(j as ShardIndex, share))
            .collect();
        let tree = MerkleTree::new(leaves);
        let commitment = Commitment(tree.root());

        let shards = shares
            .into_iter()
            .enumerate()
            .map(|(j, share)| Shard {
                commitment,
                index: j as ShardIndex,
                share,
                proof: ShardProof(tree.proof(j)),
            })
            .collect();

        EncodedSlot {
            commitment,
            commitment_proof: self.prove_commitment(&commitment),
            shards,
        }
    }

    fn check_slot_size(&self, slot: &[u8]) -> Result<(), CryptoboxError> {
        if slot.len() != self.parameters.slot_size {
            return Err(CryptoboxError::InvalidSlotSize {
                expected: self.parameters.slot_size,
                actual: slot.len(),
            });
        }
        Ok(())
    }

    // =========================================================================
    // VERIFY
    // =========================================================================

    /// Check a single shard against `commitment`.
    pub fn verify_shard(&self, commitment: &Commitment, shard: &Shard) -> Result<(), CryptoboxError> {
        let index = shard.index;
        if index as usize >= self.layout.number_of_shards {
            return Err(CryptoboxError::ShardIndexOutOfRange {
                index,
                number_of_shards: self.layout.number_of_shards,
            });
        }
        if shard.share.len() != self.share_size() {
            return Err(CryptoboxError::InvalidShardLength {
                expected: self.share_size(),
                actual: shard.share.len(),
            });
        }
        if decode_share(&shard.share).is_none() {
            return Err(CryptoboxError::InvalidShardEncoding { index });
        }
        let leaf = leaf_hash(index, &shard.share);
        if !verify_path(
            commitment.as_bytes(),
            index as usize,
            leaf,
            &shard.proof.0,
            self.merkle_depth(),
        ) {
            return Err(CryptoboxError::InvalidShardProof { index });
        }
        Ok(())
    }

    /// Degree proof for `commitment` under these parameters.
    pub fn prove_commitment(&self, commitment: &Commitment) -> CommitmentProof {
        CommitmentProof(tagged_hash(
            COMMITMENT_PROOF_TAG,
            &[
                commitment.as_bytes(),
                &(self.layout.data_len as u64).to_le_bytes(),
                &(self.layout.encoded_len as u64).to_le_bytes(),
            ],
        ))
    }

    pub fn verify_commitment(&self, commitment: &Commitment, proof: &CommitmentProof) -> bool {
        &self.prove_commitment(commitment) == proof
    }

    // =========================================================================
    // RECONSTRUCT
    // =========================================================================

    /// Rebuild the slot bytes from any `threshold` distinct shards.
    ///
    /// The result is re-committed, so the returned bytes always match
    /// `commitment`. Shards are deduplicated by index.
    pub fn reconstruct_slot(
        &self,
        commitment: &Commitment,
        shards: &[Shard],
    ) -> Result<Vec<u8>, CryptoboxError> {
        let data = self.decode_shards(commitment, shards)?;
        let encoded = self.encode_data(&data);
        if &encoded.commitment != commitment {
            return Err(CryptoboxError::InconsistentShards);
        }
        Ok(scalars_to_bytes(&data, self.parameters.slot_size))
    }

    /// Rebuild every shard of `commitment` from any `threshold` distinct shards.
    pub fn reconstruct_shards(
        &self,
        commitment: &Commitment,
        shards: &[Shard],
    ) -> Result<EncodedSlot, CryptoboxError> {
        let data = self.decode_shards(commitment, shards)?;
        let encoded = self.encode_data(&data);
        if &encoded.commitment != commitment {
            return Err(CryptoboxError::InconsistentShards);
        }
        Ok(encoded)
    }

    fn decode_shards(
        &self,
        commitment: &Commitment,
        shards: &[Shard],
    ) -> Result<Vec<ark_bls12_381::Fr>, CryptoboxError> {
        let mut by_index = BTreeMap::new();
        for shard in shards {
            if &shard.commitment != commitment {
                return Err(CryptoboxError::CommitmentMismatch { index: shard.index });
            }
            if shard.index as usize >= self.layout.number_of_shards {
                return Err(CryptoboxError::ShardIndexOutOfRange {
                    index: shard.index,
                    number_of_shards: self.layout.number_of_shards,
                });
            }
            if by_index.contains_key(&(shard.index as usize)) {
                continue;
            }
            if shard.share.len() != self.share_size() {
                return Err(CryptoboxError::InvalidShardLength {
                    expected: self.share_size(),
                    actual: shard.share.len(),
                });
            }
            let values = decode_share(&shard.share)
                .ok_or(CryptoboxError::InvalidShardEncoding { index: shard.index })?;
            by_index.insert(shard.index as usize, values);
        }
        self.code.decode(&by_index)
    }

    // =========================================================================
    // PAGES
    // =========================================================================

    /// Split a slot into `slot_size / page_size` pages.
    pub fn pages(&self, slot: &[u8]) -> Result<Vec<Vec<u8>>, CryptoboxError> {
        self.check_slot_size(slot)?;
        Ok(slot
            .chunks(self.parameters.page_size)
            .map(<[u8]>::to_vec)
            .collect())
    }

    pub fn page(&self, slot: &[u8], index: usize) -> Result<Vec<u8>, CryptoboxError> {
        self.check_slot_size(slot)?;
        let number_of_pages = self.layout.number_of_pages;
        if index >= number_of_pages {
            return Err(CryptoboxError::PageIndexOutOfRange {
                index,
                number_of_pages,
            });
        }
        let start = index * self.parameters.page_size;
        Ok(slot[start..start + self.parameters.page_size].to_vec())
    }
}
