//! Key material and derived address for a single ledger participant

use crate::blockchain::Blockchain;
use crate::crypto::KeyPair;
use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    #[serde(with = "serde_bytes")]
    pub private_key: Vec<u8>,
    /// Raw 64-byte X || Y encoding; this is the ledger identity.
    #[serde(with = "serde_bytes")]
    pub public_key: Vec<u8>,
    pub address: String,
}

impl Wallet {
    pub fn create() -> Self {
        Self::from_keypair(&KeyPair::generate())
    }

    pub fn from_keypair(keypair: &KeyPair) -> Self {
        Wallet {
            private_key: keypair.secret_bytes().to_vec(),
            public_key: keypair.public_key_bytes(),
            address: keypair.address(),
        }
    }

    /// Restores the signing key. Fails if the stored private key is
    /// malformed or does not belong to the stored public key.
    pub fn keypair(&self) -> Result<KeyPair, ChainError> {
        let keypair = KeyPair::from_secret_bytes(&self.private_key)?;
        if keypair.public_key_bytes() != self.public_key {
            return Err(ChainError::CryptoError(format!(
                "Private key does not match wallet {}",
                self.address
            )));
        }
        Ok(keypair)
    }

    pub fn balance(&self, chain: &Blockchain) -> u64 {
        chain.balance(&self.public_key)
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(&self.public_key)
    }

    pub fn private_key_hex(&self) -> String {
        hex::encode(&self.private_key)
    }

    /// Compares a caller-supplied private key with this wallet's.
    pub fn owns_private_key(&self, candidate: &[u8]) -> bool {
        !candidate.is_empty() && candidate == self.private_key.as_slice()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ChainError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("public_key", &self.public_key_hex())
            .field("private_key", &"<redacted>")
            .finish()
    }
}
