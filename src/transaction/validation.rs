/// Validation logic for transactions separated from type definitions
use crate::blockchain::UtxoSet;
use crate::crypto::{verify_signature, PUBLIC_KEY_LEN, SIGNATURE_LEN};
use crate::error::ChainError;
use crate::transaction::types::Transaction;
use std::collections::HashSet;

impl Transaction {
    /// True only if every input carries a valid signature over this
    /// transaction's trimmed hash. Never partially trusts a transaction.
    pub fn verify(&self) -> bool {
        self.validate_signatures().is_ok()
    }

    /// Stateless check of the id and of every input signature.
    pub fn validate_signatures(&self) -> Result<(), ChainError> {
        let expected = self.hash_trimmed();
        if expected != self.id {
            return Err(ChainError::InvalidSignature(format!(
                "{}: id does not match transaction content",
                self.id_hex()
            )));
        }

        for (i, input) in self.inputs.iter().enumerate() {
            if input.public_key.len() != PUBLIC_KEY_LEN || input.signature.len() != SIGNATURE_LEN {
                return Err(ChainError::InvalidSignature(format!(
                    "{}: input {} has malformed key or signature ({} / {} bytes)",
                    self.id_hex(),
                    i,
                    input.public_key.len(),
                    input.signature.len()
                )));
            }
            verify_signature(&input.public_key, &expected, &input.signature).map_err(|e| {
                ChainError::InvalidSignature(format!("{}: input {}: {}", self.id_hex(), i, e))
            })?;
        }
        Ok(())
    }

    /// Checks the transaction against the current UTXO state: referenced
    /// outputs exist and belong to the signer, no input repeats, and inputs
    /// cover outputs. Minting transactions only have their outputs checked.
    pub fn validate_against(&self, utxos: &UtxoSet) -> Result<(), ChainError> {
        if self.outputs.is_empty() {
            return Err(ChainError::Validation(format!(
                "{}: transaction has no outputs",
                self.id_hex()
            )));
        }
        for (i, output) in self.outputs.iter().enumerate() {
            if output.value == 0 {
                return Err(ChainError::Validation(format!(
                    "{}: output {} has zero value",
                    self.id_hex(),
                    i
                )));
            }
            if output.public_key.len() != PUBLIC_KEY_LEN {
                return Err(ChainError::Validation(format!(
                    "{}: output {} owner key must be {} bytes",
                    self.id_hex(),
                    i,
                    PUBLIC_KEY_LEN
                )));
            }
        }
        let total_output = self.output_value()?;

        if self.is_mint() {
            return Ok(());
        }

        let mut seen = HashSet::new();
        let mut total_input: u64 = 0;
        for input in &self.inputs {
            let outpoint = input.outpoint();
            if !seen.insert(outpoint) {
                return Err(ChainError::Validation(format!(
                    "{}: input {} referenced twice",
                    self.id_hex(),
                    outpoint
                )));
            }
            let utxo = utxos.get(&outpoint).ok_or_else(|| {
                ChainError::Validation(format!(
                    "{}: UTXO {} not found or already spent",
                    self.id_hex(),
                    outpoint
                ))
            })?;
            if utxo.owner != input.public_key {
                return Err(ChainError::Validation(format!(
                    "{}: input {} is not owned by its signer",
                    self.id_hex(),
                    outpoint
                )));
            }
            total_input = total_input
                .checked_add(utxo.value)
                .ok_or_else(|| ChainError::Validation("Input value overflow".to_string()))?;
        }

        if total_input < total_output {
            return Err(ChainError::InsufficientFunds {
                available: total_input,
                required: total_output,
            });
        }
        Ok(())
    }
}
