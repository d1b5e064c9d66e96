//! Reed-Solomon code over the BLS12-381 scalar field.
//!
//! The slot polynomial `P` has degree below `k` and is evaluated on the
//! `n = k * redundancy` roots of unity `w^i`. Shard `j` owns the points
//! `w^(j + S*t)` for `t < L`, i.e. the roots of `X^L - w^(j*L)`.
//!
//! Recovery with missing shards uses the vanishing polynomial `Z` of the
//! missing points: `(E*Z)` is known everywhere, so `P*Z` is recovered by
//! interpolation and divided by `Z` on a coset where `Z` has no root.

use std::collections::BTreeMap;

use ark_bls12_381::Fr;
use ark_ff::{batch_inversion, FftField, Field, One, Zero};
use ark_poly::{EvaluationDomain, GeneralEvaluationDomain};

use super::errors::CryptoboxError;
use super::parameters::Layout;

pub struct ErasureCode {
    data_domain: GeneralEvaluationDomain<Fr>,
    encoding_domain: GeneralEvaluationDomain<Fr>,
    layout: Layout,
}

impl ErasureCode {
    pub fn new(layout: Layout) -> Result<Self, CryptoboxError> {
        let domain = |size: usize| {
            GeneralEvaluationDomain::<Fr>::new(size)
                .filter(|d| d.size() == size)
                .ok_or_else(|| {
                    CryptoboxError::InvalidParameters(format!("no evaluation domain of size {size}"))
                })
        };
        Ok(Self {
            data_domain: domain(layout.data_len)?,
            encoding_domain: domain(layout.encoded_len)?,
            layout,
        })
    }

    /// Extend `data` (evaluations on the data domain) to the full codeword.
    pub fn encode(&self, data: &[Fr]) -> Vec<Fr> {
        let mut coeffs = self.data_domain.ifft(data);
        coeffs.resize(self.layout.encoded_len, Fr::zero());
        self.encoding_domain.fft(&coeffs)
    }

    /// Codeword positions owned by shard `index`.
    pub fn shard_evaluations(&self, codeword: &[Fr], index: usize) -> Vec<Fr> {
        codeword
            .iter()
            .skip(index)
            .step_by(self.layout.number_of_shards)
            .copied()
            .collect()
    }

    /// Recover the data evaluations from at least `threshold` shards.
    ///
    /// Fails with `InconsistentShards` when the received points do not lie
    /// on a single polynomial of degree below `k`.
    pub fn decode(&self, shards: &BTreeMap<usize, Vec<Fr>>) -> Result<Vec<Fr>, CryptoboxError> {
        let Layout {
            data_len,
            encoded_len,
            number_of_shards,
            ..
        } = self.layout;

        let required = self.layout.threshold();
        if shards.len() < required {
            return Err(CryptoboxError::NotEnoughShards {
                required,
                received: shards.len(),
            });
        }

        let mut codeword = vec![Fr::zero(); encoded_len];
        let mut present = vec![false; number_of_shards];
        for (&index, values) in shards {
            for (t, value) in values.iter().enumerate() {
                codeword[index + number_of_shards * t] = *value;
            }
            present[index] = true;
        }

        let coeffs = if present.iter().all(|p| *p) {
            self.encoding_domain.ifft(&codeword)
        } else {
            self.recover_coefficients(&codeword, &present)?
        };

        if coeffs[data_len..].iter().any(|c| !c.is_zero()) {
            return Err(CryptoboxError::InconsistentShards);
        }
        Ok(self.data_domain.fft(&coeffs[..data_len]))
    }

    fn recover_coefficients(&self, codeword: &[Fr], present: &[bool]) -> Result<Vec<Fr>, CryptoboxError> {
        let n = self.layout.encoded_len;
        let shard_len = self.layout.shard_len;

        // Z(X) = prod (X^L - w^(jL)) over missing j, built as a polynomial in X^L.
        let mut z_sparse = vec![Fr::one()];
        for (index, _) in present.iter().enumerate().filter(|(_, p)| !**p) {
            let root = self.encoding_domain.element(index * shard_len);
            let mut next = vec![Fr::zero(); z_sparse.len() + 1];
            for (i, c) in z_sparse.iter().enumerate() {
                next[i + 1] += *c;
                next[i] -= root * c;
            }
            z_sparse = next;
        }
        let mut z = vec![Fr::zero(); n];
        for (e, c) in z_sparse.into_iter().enumerate() {
            z[e * shard_len] = c;
        }

        let z_evals = self.encoding_domain.fft(&z);
        let ez: Vec<Fr> = codeword.iter().zip(&z_evals).map(|(e, z)| *e * z).collect();
        let mut pz = self.encoding_domain.ifft(&ez);

        let shift = Fr::GENERATOR;
        scale_by_powers(&mut pz, shift);
        scale_by_powers(&mut z, shift);
        let pz_coset = self.encoding_domain.fft(&pz);
        let mut z_coset = self.encoding_domain.fft(&z);
        batch_inversion(&mut z_coset);

        let quotient: Vec<Fr> = pz_coset.iter().zip(&z_coset).map(|(a, b)| *a * b).collect();
        let mut coeffs = self.encoding_domain.ifft(&quotient);
        let shift_inv = shift
            .inverse()
            .ok_or_else(|| CryptoboxError::InvalidParameters("zero coset shift".into()))?;
        scale_by_powers(&mut coeffs, shift_inv);
        Ok(coeffs)
    }
}

/// `coeffs[i] *= g^i`
fn scale_by_powers(coeffs: &mut [Fr], g: Fr) {
    let mut power = Fr::one();
    for c in coeffs.iter_mut() {
        *c *= power;
        power *= g;
    }
}
