use dal_01_cryptobox::Cryptobox;
use shared_types::{Commitment, Shard};

use crate::ports::outbound::ShardVerifier;

impl ShardVerifier for Cryptobox {
    fn verify(&self, commitment: &Commitment, shard: &Shard) -> Result<(), String> {
        self.verify_shard(commitment, shard).map_err(|e| e.to_string())
    }
}
