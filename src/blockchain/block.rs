use crate::crypto::Sha256Hash;
use crate::error::ChainError;
use crate::transaction::Transaction;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Validator recorded on the genesis block, which no validator produces.
pub const GENESIS_VALIDATOR: &[u8] = b"genesis-validator";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// RFC 3339 with nanosecond precision, as hashed.
    pub timestamp: String,
    pub transactions: Vec<Transaction>,
    pub hash: Sha256Hash,
    /// `None` only for genesis.
    pub previous_hash: Option<Sha256Hash>,
    #[serde(with = "serde_bytes")]
    pub validator: Vec<u8>,
    /// Reserved. Always zero and not part of the hash.
    pub nonce: u64,
}

impl Block {
    pub fn new(
        transactions: Vec<Transaction>,
        previous_hash: Option<Sha256Hash>,
        validator: Vec<u8>,
    ) -> Self {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
        let mut block = Block {
            timestamp,
            transactions,
            hash: [0u8; 32],
            previous_hash,
            validator,
            nonce: 0,
        };
        block.hash = block.calculate_hash();
        block
    }

    pub fn genesis() -> Self {
        Block::new(Vec::new(), None, GENESIS_VALIDATOR.to_vec())
    }

    /// SHA-256 over the previous hash (nothing for genesis), every
    /// transaction id in order, then the timestamp text.
    pub fn calculate_hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        if let Some(previous) = &self.previous_hash {
            hasher.update(previous);
        }
        for tx in &self.transactions {
            hasher.update(tx.id);
        }
        hasher.update(self.timestamp.as_bytes());
        hasher.finalize().into()
    }

    pub fn is_genesis(&self) -> bool {
        self.previous_hash.is_none()
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ChainError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        Ok(bincode::deserialize(bytes)?)
    }
}
