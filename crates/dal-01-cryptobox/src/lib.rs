//! # DAL Cryptobox
//!
//! Turns a slot (a fixed-size byte blob) into `number_of_shards` verifiable
//! shards, and back.
//!
//! ## Pipeline
//!
//! ```text
//! slot bytes ──31B chunks──▶ k scalars ──iFFT──▶ P(X), deg < k
//!                                                  │
//!                                    FFT on n = k·redundancy roots
//!                                                  ▼
//!                         codeword w^0 … w^(n-1) ──stride S──▶ shard j
//!                                                  │
//!                           Merkle(BLAKE2b-256) over shard shares
//!                                                  ▼
//!                        commitment = root, shard proof = sibling path
//! ```
//!
//! Any `S / redundancy` distinct shards rebuild the slot. Reconstruction
//! re-commits the result, so a set of well-formed shards that does not
//! belong to the claimed commitment fails with `InconsistentShards`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let cryptobox = Cryptobox::new(CryptoboxParameters::from(&dal_params))?;
//! let encoded = cryptobox.commit_slot(&slot)?;
//! cryptobox.verify_shard(&encoded.commitment, &encoded.shards[0])?;
//! let slot = cryptobox.reconstruct_slot(&encoded.commitment, &encoded.shards[..64])?;
//! ```

pub mod domain;
pub mod service;

pub use domain::errors::CryptoboxError;
pub use domain::parameters::{CryptoboxParameters, Layout};
pub use service::{Cryptobox, EncodedSlot};
