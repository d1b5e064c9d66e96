//! Cryptobox parameters and the sizes derived from them.

use shared_types::DalParameters;

use super::errors::CryptoboxError;
use super::field::SCALAR_DATA_BYTES;

/// Subset of the DAL parameters the encoding depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CryptoboxParameters {
    pub slot_size: usize,
    pub page_size: usize,
    pub redundancy_factor: usize,
    pub number_of_shards: usize,
}

impl From<&DalParameters> for CryptoboxParameters {
    fn from(params: &DalParameters) -> Self {
        Self {
            slot_size: params.slot_size,
            page_size: params.page_size,
            redundancy_factor: params.redundancy_factor,
            number_of_shards: params.number_of_shards,
        }
    }
}

/// Sizes fixed once parameters are validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Field elements carrying slot data (power of two).
    pub data_len: usize,
    /// Field elements after erasure coding.
    pub encoded_len: usize,
    /// Field elements per shard.
    pub shard_len: usize,
    pub number_of_shards: usize,
    pub number_of_pages: usize,
}

impl Layout {
    /// Shards needed for reconstruction.
    pub fn threshold(&self) -> usize {
        self.data_len / self.shard_len
    }
}

impl CryptoboxParameters {
    /// Check the constraints of the encoding and derive the layout.
    pub fn layout(&self) -> Result<Layout, CryptoboxError> {
        let invalid = |msg: String| Err(CryptoboxError::InvalidParameters(msg));

        if self.slot_size == 0 {
            return invalid("slot_size must be positive".into());
        }
        if self.page_size == 0 || self.slot_size % self.page_size != 0 {
            return invalid(format!(
                "page_size {} must divide slot_size {}",
                self.page_size, self.slot_size
            ));
        }
        if self.redundancy_factor < 2 || !self.redundancy_factor.is_power_of_two() {
            return invalid(format!(
                "redundancy_factor {} must be a power of two >= 2",
                self.redundancy_factor
            ));
        }
        if self.number_of_shards == 0 || !self.number_of_shards.is_power_of_two() {
            return invalid(format!(
                "number_of_shards {} must be a power of two",
                self.number_of_shards
            ));
        }

        let data_len = self.slot_size.div_ceil(SCALAR_DATA_BYTES).next_power_of_two();
        let encoded_len = data_len * self.redundancy_factor;
        if self.number_of_shards > data_len {
            return invalid(format!(
                "number_of_shards {} exceeds the {} data elements",
                self.number_of_shards, data_len
            ));
        }

        Ok(Layout {
            data_len,
            encoded_len,
            shard_len: encoded_len / self.number_of_shards,
            number_of_shards: self.number_of_shards,
            number_of_pages: self.slot_size / self.page_size,
        })
    }
}
