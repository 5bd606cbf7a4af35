use crate::blockchain::state::UtxoSet;
use crate::error::ChainError;
use crate::transaction::Transaction;
use std::collections::{HashMap, HashSet};

pub fn validate_no_double_spend(transactions: &[Transaction]) -> Result<(), ChainError> {
    let mut seen_inputs = HashMap::new();
    for tx in transactions {
        for input in &tx.inputs {
            let outpoint = input.outpoint();
            if let Some(conflicting_tx) = seen_inputs.get(&outpoint) {
                return Err(ChainError::Validation(format!(
                    "Double spend detected in block. UTXO {} is spent by both {} and {}",
                    outpoint,
                    hex::encode(conflicting_tx),
                    tx.id_hex()
                )));
            }
            seen_inputs.insert(outpoint, tx.id);
        }
    }
    Ok(())
}

pub fn validate_unique_ids(transactions: &[Transaction]) -> Result<(), ChainError> {
    let mut seen = HashSet::new();
    for tx in transactions {
        if !seen.insert(tx.id) {
            return Err(ChainError::Validation(format!(
                "Transaction {} appears twice in block",
                tx.id_hex()
            )));
        }
    }
    Ok(())
}

/// Runs every check a block's transaction list must pass and returns the
/// UTXO set that results from applying it to `utxos`. The input set is
/// never touched; on any failure nothing is returned.
///
/// Signatures are checked for all transactions before any state check.
/// State checks then run in block order against a working copy, so a later
/// transaction may spend outputs created earlier in the same block.
/// Mints are rejected once the total supply would no longer fit in a `u64`.
pub fn apply_block_transactions(
    utxos: &UtxoSet,
    transactions: &[Transaction],
) -> Result<UtxoSet, ChainError> {
    for tx in transactions {
        tx.validate_size()?;
        tx.validate_signatures()?;
    }
    validate_unique_ids(transactions)?;
    validate_no_double_spend(transactions)?;

    let mut supply = utxos.checked_total_value()?;
    let mut temp_state = utxos.clone();
    for tx in transactions {
        tx.validate_against(&temp_state)?;
        if tx.is_mint() {
            supply = supply.checked_add(tx.output_value()?).ok_or_else(|| {
                ChainError::Validation(format!(
                    "Mint {} would push total supply past {}",
                    tx.id_hex(),
                    u64::MAX
                ))
            })?;
        }
        temp_state.apply_transaction(tx)?;
    }
    Ok(temp_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;

    #[test]
    fn test_double_spend_across_transactions() {
        let alice = Wallet::create();
        let bob = Wallet::create();
        let carol = Wallet::create();
        let mut set = UtxoSet::new();
        set.add([1u8; 32], 0, 100, alice.public_key.clone());
        let candidates = set.utxos_for(&alice.public_key);

        let to_bob = Transaction::create(&alice, &bob.public_key, 100, &candidates).unwrap();
        let to_carol = Transaction::create(&alice, &carol.public_key, 100, &candidates).unwrap();

        let err = apply_block_transactions(&set, &[to_bob, to_carol]).unwrap_err();
        assert!(err.to_string().contains("Double spend"));
        assert_eq!(set.balance(&alice.public_key), 100);
    }

    #[test]
    fn test_chained_spend_within_block() {
        let alice = Wallet::create();
        let bob = Wallet::create();
        let mint = Transaction::mint(alice.public_key.clone(), 50, 1);
        let mut staged = UtxoSet::new();
        staged.apply_transaction(&mint).unwrap();
        let spend =
            Transaction::create(&alice, &bob.public_key, 20, &staged.utxos_for(&alice.public_key))
                .unwrap();

        let next = apply_block_transactions(&UtxoSet::new(), &[mint, spend]).unwrap();
        assert_eq!(next.balance(&alice.public_key), 30);
        assert_eq!(next.balance(&bob.public_key), 20);
    }

    #[test]
    fn test_duplicate_transaction_rejected() {
        let mint = Transaction::mint(vec![1; 64], 5, 1);
        let err = apply_block_transactions(&UtxoSet::new(), &[mint.clone(), mint]).unwrap_err();
        assert!(err.to_string().contains("appears twice"));
    }

    #[test]
    fn test_signature_checked_before_state() {
        let alice = Wallet::create();
        let bob = Wallet::create();
        let mut set = UtxoSet::new();
        set.add([1u8; 32], 0, 100, alice.public_key.clone());
        let mut tx =
            Transaction::create(&alice, &bob.public_key, 10, &set.utxos_for(&alice.public_key))
                .unwrap();
        tx.inputs[0].signature[0] ^= 0xff;

        let err = apply_block_transactions(&set, &[tx]).unwrap_err();
        assert!(matches!(err, ChainError::InvalidSignature(_)));
    }

    #[test]
    fn test_mint_past_supply_limit_rejected() {
        let alice = Wallet::create();
        let full = Transaction::mint(alice.public_key.clone(), u64::MAX, 1);
        let one_more = Transaction::mint(alice.public_key.clone(), 1, 2);

        let err = apply_block_transactions(&UtxoSet::new(), &[full.clone(), one_more.clone()])
            .unwrap_err();
        assert!(err.to_string().contains("total supply"));

        let at_limit = apply_block_transactions(&UtxoSet::new(), &[full]).unwrap();
        assert_eq!(at_limit.total_value(), u64::MAX);
        assert!(apply_block_transactions(&at_limit, &[one_more]).is_err());
    }

    #[test]
    fn test_overflowing_input_set_rejected() {
        let mut set = UtxoSet::new();
        set.add([1u8; 32], 0, u64::MAX, vec![1; 64]);
        set.add([2u8; 32], 0, 1, vec![1; 64]);
        assert!(set.checked_total_value().is_err());
        assert!(apply_block_transactions(&set, &[]).is_err());
    }
}
