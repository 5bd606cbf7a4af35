/// Transaction types for UFChain
use crate::blockchain::{OutPoint, TxId, Utxo};
use crate::crypto::{KeyPair, PUBLIC_KEY_LEN};
use crate::error::ChainError;
use crate::wallet::Wallet;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Maximum transaction size in bytes (100KB) to prevent DoS
pub const MAX_TRANSACTION_SIZE: usize = 100_000;

/// Reference to a previous output plus the spender's key and signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub tx_id: TxId,
    pub output_index: u32,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub public_key: Vec<u8>,
}

impl TxInput {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.tx_id, self.output_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    #[serde(with = "serde_bytes")]
    pub public_key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    /// Zero for transfers; distinguishes otherwise identical mints.
    #[serde(default)]
    pub nonce: u64,
}

impl Transaction {
    /// Builds an unsigned transaction with its id already computed.
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>, nonce: u64) -> Self {
        let mut tx = Transaction {
            id: [0u8; 32],
            inputs,
            outputs,
            nonce,
        };
        tx.id = tx.hash_trimmed();
        tx
    }

    /// Minting transaction: no inputs, a single output to `recipient`.
    pub fn mint(recipient: Vec<u8>, amount: u64, nonce: u64) -> Self {
        Transaction::new(
            Vec::new(),
            vec![TxOutput {
                value: amount,
                public_key: recipient,
            }],
            nonce,
        )
    }

    /// Builds and signs a transfer of `amount` from `sender` to `recipient`.
    ///
    /// Sender-owned candidates are taken in identity-key order until the
    /// amount is covered, so the same inputs always produce the same id.
    /// Any excess comes back to the sender as a change output.
    pub fn create(
        sender: &Wallet,
        recipient: &[u8],
        amount: u64,
        candidates: &[Utxo],
    ) -> Result<Self, ChainError> {
        if amount == 0 {
            return Err(ChainError::Validation(
                "Transfer amount must be greater than zero".to_string(),
            ));
        }
        if recipient.len() != PUBLIC_KEY_LEN {
            return Err(ChainError::Validation(format!(
                "Recipient public key must be {} bytes, got {}",
                PUBLIC_KEY_LEN,
                recipient.len()
            )));
        }
        let keypair = sender.keypair()?;

        let mut owned: Vec<&Utxo> = candidates
            .iter()
            .filter(|utxo| utxo.owner == sender.public_key)
            .collect();
        owned.sort_by_key(|utxo| utxo.outpoint());
        owned.dedup_by_key(|utxo| utxo.outpoint());

        let mut total_input: u64 = 0;
        let mut inputs = Vec::new();
        for utxo in owned {
            total_input = total_input.checked_add(utxo.value).ok_or_else(|| {
                ChainError::Validation("Input value overflow".to_string())
            })?;
            inputs.push(TxInput {
                tx_id: utxo.tx_id,
                output_index: utxo.output_index,
                signature: Vec::new(),
                public_key: sender.public_key.clone(),
            });
            if total_input >= amount {
                break;
            }
        }

        if total_input < amount {
            return Err(ChainError::InsufficientFunds {
                available: total_input,
                required: amount,
            });
        }

        let mut outputs = vec![TxOutput {
            value: amount,
            public_key: recipient.to_vec(),
        }];
        let change = total_input - amount;
        if change > 0 {
            outputs.push(TxOutput {
                value: change,
                public_key: sender.public_key.clone(),
            });
        }

        let mut tx = Transaction::new(inputs, outputs, 0);
        tx.sign(&keypair);
        Ok(tx)
    }

    pub fn is_mint(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn id_hex(&self) -> String {
        hex::encode(self.id)
    }

    /// Hash of everything except the signatures. Variable-length keys are
    /// length-prefixed so distinct contents cannot share a preimage.
    pub fn hash_trimmed(&self) -> TxId {
        let mut hasher = Sha256::new();
        hasher.update((self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            hasher.update(input.tx_id);
            hasher.update(input.output_index.to_le_bytes());
            hasher.update((input.public_key.len() as u32).to_le_bytes());
            hasher.update(&input.public_key);
        }
        hasher.update((self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            hasher.update((output.public_key.len() as u32).to_le_bytes());
            hasher.update(&output.public_key);
            hasher.update(output.value.to_le_bytes());
        }
        hasher.update(self.nonce.to_le_bytes());
        hasher.finalize().into()
    }

    /// Copy with every signature cleared and the id recomputed.
    pub fn trimmed_copy(&self) -> Transaction {
        let inputs = self
            .inputs
            .iter()
            .map(|input| TxInput {
                signature: Vec::new(),
                ..input.clone()
            })
            .collect();
        Transaction::new(inputs, self.outputs.clone(), self.nonce)
    }

    /// Signs every input owned by `keypair` over the trimmed hash.
    pub fn sign(&mut self, keypair: &KeyPair) {
        self.id = self.hash_trimmed();
        let signer = keypair.public_key_bytes();
        let signature = keypair.sign_digest(&self.id).to_vec();
        for input in self.inputs.iter_mut().filter(|i| i.public_key == signer) {
            input.signature = signature.clone();
        }
    }

    pub fn output_value(&self) -> Result<u64, ChainError> {
        self.outputs.iter().try_fold(0u64, |acc, output| {
            acc.checked_add(output.value)
                .ok_or_else(|| ChainError::Validation("Output value overflow".to_string()))
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ChainError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Validate transaction size to prevent DoS attacks
    pub fn validate_size(&self) -> Result<(), ChainError> {
        let size = bincode::serialized_size(self)? as usize;
        if size > MAX_TRANSACTION_SIZE {
            return Err(ChainError::Validation(format!(
                "Transaction too large: {} bytes (max: {})",
                size, MAX_TRANSACTION_SIZE
            )));
        }
        Ok(())
    }
}
