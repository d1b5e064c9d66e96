//! Conversions between raw bytes and BLS12-381 scalars.
//!
//! Slot bytes are packed 31 to a scalar so every chunk is below the field
//! modulus. Shares travel as 32-byte little-endian canonical encodings.

use ark_bls12_381::Fr;
use ark_ff::{BigInteger, PrimeField, Zero};
use ark_serialize::CanonicalDeserialize;

/// Slot bytes carried by one scalar.
pub const SCALAR_DATA_BYTES: usize = 31;

/// Serialized size of one scalar inside a share.
pub const SCALAR_SERIALIZED_BYTES: usize = 32;

/// Pack `bytes` into `len` scalars, zero padding the tail.
pub fn bytes_to_scalars(bytes: &[u8], len: usize) -> Vec<Fr> {
    let mut scalars: Vec<Fr> = bytes
        .chunks(SCALAR_DATA_BYTES)
        .map(Fr::from_le_bytes_mod_order)
        .collect();
    scalars.resize(len, Fr::zero());
    scalars
}

/// Inverse of [`bytes_to_scalars`], truncated to `len` bytes.
pub fn scalars_to_bytes(scalars: &[Fr], len: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(scalars.len() * SCALAR_DATA_BYTES);
    for scalar in scalars {
        let le = scalar.into_bigint().to_bytes_le();
        bytes.extend_from_slice(&le[..SCALAR_DATA_BYTES]);
        if bytes.len() >= len {
            break;
        }
    }
    bytes.truncate(len);
    bytes
}

pub fn encode_share(scalars: &[Fr]) -> Vec<u8> {
    let mut out = Vec::with_capacity(scalars.len() * SCALAR_SERIALIZED_BYTES);
    for scalar in scalars {
        out.extend_from_slice(&scalar.into_bigint().to_bytes_le());
    }
    out
}

/// Decode a share; `None` if any element is not a canonical scalar.
pub fn decode_share(bytes: &[u8]) -> Option<Vec<Fr>> {
    if bytes.len() % SCALAR_SERIALIZED_BYTES != 0 {
        return None;
    }
    bytes
        .chunks_exact(SCALAR_SERIALIZED_BYTES)
        .map(|mut chunk| Fr::deserialize_compressed(&mut chunk).ok())
        .collect()
}
