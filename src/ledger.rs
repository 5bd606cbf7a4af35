//! Shared ledger service: the published chain snapshot, validator registry
//! and storage behind one handle.
//!
//! Writers serialize on a single mutex. Each accepted block is validated
//! against a private copy of the chain, persisted, and only then published,
//! so a storage failure leaves the visible chain exactly as it was. Readers
//! take an `Arc` snapshot and never wait on a writer's disk I/O.

use crate::blockchain::{Block, Blockchain};
use crate::consensus::{proof_of_stake, Validator, ValidatorSet};
use crate::contract::SmartContract;
use crate::crypto::{Sha256Hash, PUBLIC_KEY_LEN};
use crate::error::ChainError;
use crate::persistence::{InMemoryStorage, Storage};
use crate::transaction::Transaction;
use crate::wallet::Wallet;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub height: u64,
    pub blocks: usize,
    pub utxos: usize,
    pub total_supply: u64,
    pub validators: usize,
    pub total_stake: u64,
    pub tip: String,
}

pub struct Ledger {
    chain: RwLock<Arc<Blockchain>>,
    writer: Mutex<()>,
    validators: RwLock<ValidatorSet>,
    contracts: RwLock<HashMap<String, SmartContract>>,
    storage: Box<dyn Storage>,
}

impl Ledger {
    /// Rebuilds the chain stored in `storage`, or creates and persists a
    /// fresh genesis block when the store is empty.
    pub fn open(storage: Box<dyn Storage>) -> Result<Self, ChainError> {
        let chain = match storage.load_chain()? {
            Some(blocks) => {
                let chain = Blockchain::from_blocks(blocks)?;
                info!(
                    blocks = chain.len(),
                    tip = %chain.tip().hash_hex(),
                    "ledger.reloaded"
                );
                chain
            }
            None => {
                let genesis = Block::genesis();
                storage.save_block(&genesis)?;
                info!(genesis = %genesis.hash_hex(), "ledger.genesis_created");
                Blockchain::new(genesis)?
            }
        };

        Ok(Ledger {
            chain: RwLock::new(Arc::new(chain)),
            writer: Mutex::new(()),
            validators: RwLock::new(ValidatorSet::new()),
            contracts: RwLock::new(HashMap::new()),
            storage,
        })
    }

    /// Like [`open`](Self::open), but fails with `NotFound` instead of
    /// writing a genesis block when the store holds no chain.
    pub fn open_existing(storage: Box<dyn Storage>) -> Result<Self, ChainError> {
        if storage.tip()?.is_none() {
            return Err(ChainError::NotFound("No chain stored".to_string()));
        }
        Self::open(storage)
    }

    pub fn in_memory() -> Result<Self, ChainError> {
        Self::open(Box::new(InMemoryStorage::new()))
    }

    /// Consistent view of the chain as of the last published block.
    pub fn snapshot(&self) -> Arc<Blockchain> {
        self.chain.read().clone()
    }

    pub fn create_wallet(&self) -> Result<Wallet, ChainError> {
        let wallet = Wallet::create();
        self.storage.save_wallet(&wallet.address, &wallet)?;
        debug!(address = %wallet.address, "wallet.created");
        Ok(wallet)
    }

    pub fn get_wallet(&self, address: &str) -> Result<Wallet, ChainError> {
        self.storage.get_wallet(address)
    }

    /// Builds and signs a transfer against the current snapshot without
    /// submitting it.
    pub fn create_transaction(
        &self,
        from: &Wallet,
        to: &[u8],
        amount: u64,
    ) -> Result<Transaction, ChainError> {
        let chain = self.snapshot();
        Transaction::create(from, to, amount, &chain.utxo_set().utxos_for(&from.public_key))
    }

    /// Validates `transactions`, seals them into a block signed off by a
    /// stake-selected validator, persists it and publishes the new chain.
    pub fn add_block(&self, transactions: Vec<Transaction>) -> Result<Block, ChainError> {
        self.commit_with(move |_| Ok(transactions))
    }

    /// Moves `amount` from `from` to `to` in a block of its own. Inputs are
    /// chosen while holding the writer lock so concurrent transfers from
    /// one wallet cannot pick the same outputs.
    pub fn transfer(&self, from: &Wallet, to: &[u8], amount: u64) -> Result<Block, ChainError> {
        self.commit_with(|chain| {
            let candidates = chain.utxo_set().utxos_for(&from.public_key);
            Ok(vec![Transaction::create(from, to, amount, &candidates)?])
        })
    }

    /// Issues new value to `recipient`. The mint nonce is the height of the
    /// block that will carry it.
    pub fn mint(&self, recipient: &[u8], amount: u64) -> Result<Block, ChainError> {
        if amount == 0 {
            return Err(ChainError::Validation(
                "Mint amount must be greater than zero".to_string(),
            ));
        }
        let recipient = recipient.to_vec();
        self.commit_with(move |chain| {
            Ok(vec![Transaction::mint(recipient, amount, chain.height() + 1)])
        })
    }

    fn commit_with<F>(&self, build: F) -> Result<Block, ChainError>
    where
        F: FnOnce(&Blockchain) -> Result<Vec<Transaction>, ChainError>,
    {
        let _writer = self.writer.lock();
        let current = self.snapshot();
        let transactions = build(&current)?;
        let validator = self.select_validator()?;

        let mut next = (*current).clone();
        let pending = next.prepare_block(transactions, validator)?;
        let block = pending.block.clone();
        next.commit_block(pending)?;

        if let Err(e) = self.storage.save_block(&block) {
            warn!(block = %block.hash_hex(), error = %e, "block.persist_failed");
            return Err(e);
        }

        *self.chain.write() = Arc::new(next);
        info!(
            height = current.height() + 1,
            block = %block.hash_hex(),
            transactions = block.transactions.len(),
            validator = %hex::encode(&block.validator),
            "block.accepted"
        );
        Ok(block)
    }

    pub fn balance(&self, public_key: &[u8]) -> u64 {
        self.snapshot().balance(public_key)
    }

    pub fn balance_of_address(&self, address: &str) -> Result<u64, ChainError> {
        let wallet = self.get_wallet(address)?;
        Ok(self.balance(&wallet.public_key))
    }

    /// Accepts either a stored wallet address (`0x` + 40 hex) or a hex
    /// encoded 64-byte public key.
    pub fn resolve_public_key(&self, recipient: &str) -> Result<Vec<u8>, ChainError> {
        if recipient.starts_with("0x") && recipient.len() == 42 {
            return Ok(self.get_wallet(recipient)?.public_key);
        }
        let bytes = hex::decode(recipient.trim_start_matches("0x"))
            .map_err(|e| ChainError::Validation(format!("Invalid recipient: {}", e)))?;
        if bytes.len() != PUBLIC_KEY_LEN {
            return Err(ChainError::Validation(format!(
                "Recipient public key must be {} bytes, got {}",
                PUBLIC_KEY_LEN,
                bytes.len()
            )));
        }
        Ok(bytes)
    }

    pub fn get_block(&self, hash: &Sha256Hash) -> Result<Block, ChainError> {
        self.snapshot().get_block(hash).cloned()
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.snapshot().blocks().to_vec()
    }

    pub fn register_validator(&self, public_key: Vec<u8>, stake: u64) -> Result<(), ChainError> {
        if public_key.len() != PUBLIC_KEY_LEN {
            return Err(ChainError::Validation(format!(
                "Validator public key must be {} bytes, got {}",
                PUBLIC_KEY_LEN,
                public_key.len()
            )));
        }
        let validator = hex::encode(&public_key);
        self.validators
            .write()
            .register(Validator::new(public_key, stake))?;
        info!(validator = %validator, stake, "validator.registered");
        Ok(())
    }

    pub fn validators(&self) -> Vec<Validator> {
        self.validators.read().sorted().into_iter().cloned().collect()
    }

    /// Public key of the validator chosen for the next block.
    pub fn select_validator(&self) -> Result<Vec<u8>, ChainError> {
        let validators = self.validators.read();
        proof_of_stake(&validators).map(|v| v.public_key.clone())
    }

    pub fn deploy_contract(&self, code: &str) -> Result<SmartContract, ChainError> {
        let contract = SmartContract::new(code);
        contract.validate()?;
        self.contracts
            .write()
            .insert(contract.id.clone(), contract.clone());
        Ok(contract)
    }

    pub fn execute_contract(
        &self,
        id: &str,
        input: serde_json::Value,
    ) -> Result<HashMap<String, serde_json::Value>, ChainError> {
        let mut contracts = self.contracts.write();
        let contract = contracts
            .get_mut(id)
            .ok_or_else(|| ChainError::NotFound(format!("Contract {} not found", id)))?;
        Ok(contract.execute(input)?.clone())
    }

    pub fn stats(&self) -> LedgerStats {
        let chain = self.snapshot();
        let validators = self.validators.read();
        LedgerStats {
            height: chain.height(),
            blocks: chain.len(),
            utxos: chain.utxo_set().len(),
            total_supply: chain.utxo_set().total_value(),
            validators: validators.len(),
            total_stake: validators.total_stake(),
            tip: chain.tip().hash_hex(),
        }
    }

    /// Closes the storage backend. Safe to call more than once.
    pub fn close(&self) -> Result<(), ChainError> {
        let _writer = self.writer.lock();
        self.storage.close()?;
        info!("ledger.closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::persistence::Database;

    fn ledger() -> Ledger {
        let ledger = Ledger::in_memory().unwrap();
        ledger.register_validator(vec![1; 64], 10).unwrap();
        ledger
    }

    #[test]
    fn test_open_creates_genesis() {
        let ledger = Ledger::in_memory().unwrap();
        let chain = ledger.snapshot();
        assert_eq!(chain.len(), 1);
        assert!(chain.tip().is_genesis());
    }

    #[test]
    fn test_open_existing_leaves_empty_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let db = Database::open(&path).unwrap();

        let err = Ledger::open_existing(Box::new(db)).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(Database::open(&path).unwrap().tip().unwrap().is_none());

        Ledger::open(Box::new(Database::open(&path).unwrap())).unwrap();
        let reopened = Ledger::open_existing(Box::new(Database::open(&path).unwrap())).unwrap();
        assert_eq!(reopened.snapshot().len(), 1);
    }

    #[test]
    fn test_add_block_requires_a_validator() {
        let ledger = Ledger::in_memory().unwrap();
        let err = ledger.mint(&[2; 64], 10).unwrap_err();
        assert!(matches!(err, ChainError::NoEligibleValidator(_)));
        assert_eq!(ledger.snapshot().len(), 1);
    }

    #[test]
    fn test_mint_and_transfer() {
        let ledger = ledger();
        let alice = ledger.create_wallet().unwrap();
        let bob = ledger.create_wallet().unwrap();

        let block = ledger.mint(&alice.public_key, 1000).unwrap();
        assert_eq!(block.validator, vec![1; 64]);
        ledger.transfer(&alice, &bob.public_key, 400).unwrap();

        assert_eq!(ledger.balance(&alice.public_key), 600);
        assert_eq!(ledger.balance_of_address(&bob.address).unwrap(), 400);
        assert_eq!(ledger.stats().total_supply, 1000);
    }

    #[test]
    fn test_repeated_mints_get_distinct_ids() {
        let ledger = ledger();
        let first = ledger.mint(&[5; 64], 10).unwrap();
        let second = ledger.mint(&[5; 64], 10).unwrap();
        assert_ne!(first.transactions[0].id, second.transactions[0].id);
        assert_eq!(ledger.balance(&[5; 64]), 20);
    }

    #[test]
    fn test_snapshot_is_stable_across_writes() {
        let ledger = ledger();
        let before = ledger.snapshot();
        ledger.mint(&[5; 64], 10).unwrap();
        assert_eq!(before.len(), 1);
        assert_eq!(ledger.snapshot().len(), 2);
    }

    #[test]
    fn test_resolve_public_key() {
        let ledger = ledger();
        let wallet = ledger.create_wallet().unwrap();
        assert_eq!(ledger.resolve_public_key(&wallet.address).unwrap(), wallet.public_key);
        assert_eq!(
            ledger.resolve_public_key(&wallet.public_key_hex()).unwrap(),
            wallet.public_key
        );
        assert!(ledger.resolve_public_key("abcd").is_err());
        assert!(matches!(
            ledger.resolve_public_key("0x0000000000000000000000000000000000000000"),
            Err(ChainError::NotFound(_))
        ));
    }

    #[test]
    fn test_contracts() {
        let ledger = ledger();
        assert!(ledger.deploy_contract("").is_err());
        let contract = ledger.deploy_contract("counter").unwrap();
        let state = ledger
            .execute_contract(&contract.id, serde_json::json!(7))
            .unwrap();
        assert_eq!(state.get("lastExecution"), Some(&serde_json::json!(7)));
        assert!(matches!(
            ledger.execute_contract("missing", serde_json::json!(null)),
            Err(ChainError::NotFound(_))
        ));
    }

    #[test]
    fn test_register_validator_checks_key_length() {
        let ledger = ledger();
        assert!(ledger.register_validator(vec![1; 10], 5).is_err());
        assert_eq!(ledger.validators().len(), 1);
    }
}
