use crate::crypto::Sha256Hash;
use crate::error::ChainError;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type TxId = Sha256Hash;

/// Identity key of an unspent output: the creating transaction and the
/// output's position in it. Ordering is by transaction id, then index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub tx_id: TxId,
    pub index: u32,
}

impl OutPoint {
    pub fn new(tx_id: TxId, index: u32) -> Self {
        Self { tx_id, index }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", hex::encode(self.tx_id), self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub tx_id: TxId,
    pub output_index: u32,
    pub value: u64,
    #[serde(with = "serde_bytes")]
    pub owner: Vec<u8>,
}

impl Utxo {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.tx_id, self.output_index)
    }
}

/// The spendable state of the whole ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoSet {
    entries: BTreeMap<OutPoint, Utxo>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, tx_id: TxId, output_index: u32, value: u64, owner: Vec<u8>) {
        self.entries.insert(
            OutPoint::new(tx_id, output_index),
            Utxo {
                tx_id,
                output_index,
                value,
                owner,
            },
        );
    }

    /// Removes and returns the entry; a missing entry means the reference
    /// was never created or has already been spent.
    pub fn spend(&mut self, outpoint: &OutPoint) -> Result<Utxo, ChainError> {
        self.entries.remove(outpoint).ok_or_else(|| {
            ChainError::Validation(format!("UTXO {} not found or already spent", outpoint))
        })
    }

    /// Spends every input and records every output of an already validated
    /// transaction. Fails if an output identity key is already present.
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Result<(), ChainError> {
        for input in &tx.inputs {
            self.spend(&input.outpoint())?;
        }
        for (index, output) in tx.outputs.iter().enumerate() {
            let outpoint = OutPoint::new(tx.id, index as u32);
            if self.contains(&outpoint) {
                return Err(ChainError::Validation(format!(
                    "Transaction {} would overwrite unspent output {}",
                    tx.id_hex(),
                    outpoint
                )));
            }
            self.add(tx.id, index as u32, output.value, output.public_key.clone());
        }
        Ok(())
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&Utxo> {
        self.entries.get(outpoint)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.entries.contains_key(outpoint)
    }

    /// Every entry owned by `owner`, in identity-key order.
    pub fn utxos_for(&self, owner: &[u8]) -> Vec<Utxo> {
        self.entries
            .values()
            .filter(|utxo| utxo.owner == owner)
            .cloned()
            .collect()
    }

    /// Sums are plain additions: block application keeps the total supply
    /// within `u64`, so no owner's balance can exceed it either.
    pub fn balance(&self, owner: &[u8]) -> u64 {
        self.entries
            .values()
            .filter(|utxo| utxo.owner == owner)
            .map(|utxo| utxo.value)
            .sum()
    }

    pub fn total_value(&self) -> u64 {
        self.entries.values().map(|utxo| utxo.value).sum()
    }

    /// Total value, failing instead of wrapping for a set assembled by hand.
    pub fn checked_total_value(&self) -> Result<u64, ChainError> {
        self.entries
            .values()
            .try_fold(0u64, |acc, utxo| acc.checked_add(utxo.value))
            .ok_or_else(|| ChainError::Validation("UTXO set value overflow".to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Utxo> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_spend_and_balance() {
        let mut set = UtxoSet::new();
        set.add([1u8; 32], 0, 700, vec![9; 64]);
        set.add([1u8; 32], 1, 300, vec![8; 64]);
        set.add([2u8; 32], 0, 50, vec![9; 64]);

        assert_eq!(set.balance(&[9; 64]), 750);
        assert_eq!(set.total_value(), 1050);

        let spent = set.spend(&OutPoint::new([1u8; 32], 0)).unwrap();
        assert_eq!(spent.value, 700);
        assert_eq!(set.balance(&[9; 64]), 50);
        assert!(set.spend(&OutPoint::new([1u8; 32], 0)).is_err());
    }

    #[test]
    fn test_apply_transaction_moves_value() {
        let mint = Transaction::mint(vec![4; 64], 90, 1);
        let mut set = UtxoSet::new();
        set.apply_transaction(&mint).unwrap();
        assert_eq!(set.balance(&[4; 64]), 90);

        // Same id again would clobber the live output.
        assert!(set.apply_transaction(&mint).is_err());
    }

    #[test]
    fn test_utxos_for_is_ordered_by_identity_key() {
        let mut set = UtxoSet::new();
        set.add([3u8; 32], 0, 1, vec![7; 64]);
        set.add([1u8; 32], 2, 1, vec![7; 64]);
        set.add([1u8; 32], 1, 1, vec![7; 64]);

        let keys: Vec<OutPoint> = set.utxos_for(&[7; 64]).iter().map(Utxo::outpoint).collect();
        assert_eq!(
            keys,
            vec![
                OutPoint::new([1u8; 32], 1),
                OutPoint::new([1u8; 32], 2),
                OutPoint::new([3u8; 32], 0),
            ]
        );
    }
}
