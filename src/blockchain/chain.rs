use crate::blockchain::block::Block;
use crate::blockchain::state::UtxoSet;
use crate::blockchain::validation::apply_block_transactions;
use crate::crypto::Sha256Hash;
use crate::error::ChainError;
use crate::transaction::Transaction;

/// A validated block and the UTXO set it produces, not yet part of any
/// chain. Produced by [`Blockchain::prepare_block`].
#[derive(Debug, Clone)]
pub struct PendingBlock {
    pub block: Block,
    pub utxo_set: UtxoSet,
}

/// Ordered blocks from genesis plus the UTXO set derived from them.
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    utxo_set: UtxoSet,
}

impl Blockchain {
    /// Starts a chain from `genesis`, applying its (usually empty)
    /// transaction list to an empty UTXO set.
    pub fn new(genesis: Block) -> Result<Self, ChainError> {
        Self::check_genesis(&genesis)?;
        let utxo_set = apply_block_transactions(&UtxoSet::new(), &genesis.transactions)?;
        Ok(Blockchain {
            blocks: vec![genesis],
            utxo_set,
        })
    }

    /// Rebuilds a chain from stored blocks, re-verifying every link, hash
    /// and transaction along the way.
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, ChainError> {
        let mut iter = blocks.into_iter();
        let genesis = iter
            .next()
            .ok_or_else(|| ChainError::Validation("Cannot rebuild an empty chain".to_string()))?;
        let mut chain = Blockchain::new(genesis)?;
        for block in iter {
            chain.apply_block(block)?;
        }
        Ok(chain)
    }

    fn check_genesis(genesis: &Block) -> Result<(), ChainError> {
        if !genesis.is_genesis() {
            return Err(ChainError::Validation(
                "First block must not reference a previous block".to_string(),
            ));
        }
        if genesis.calculate_hash() != genesis.hash {
            return Err(ChainError::Validation(format!(
                "Genesis hash mismatch. Expected {}, but got {}.",
                hex::encode(genesis.calculate_hash()),
                genesis.hash_hex()
            )));
        }
        Ok(())
    }

    /// Builds the next block on top of the tip and validates its
    /// transactions against a copy of the current UTXO set. The chain
    /// itself is left untouched.
    pub fn prepare_block(
        &self,
        transactions: Vec<Transaction>,
        validator: Vec<u8>,
    ) -> Result<PendingBlock, ChainError> {
        let utxo_set = apply_block_transactions(&self.utxo_set, &transactions)?;
        let block = Block::new(transactions, Some(self.tip().hash), validator);
        Ok(PendingBlock { block, utxo_set })
    }

    /// Appends a block produced by [`prepare_block`](Self::prepare_block).
    /// Fails without changes if the tip moved since preparation.
    pub fn commit_block(&mut self, pending: PendingBlock) -> Result<&Block, ChainError> {
        let tip = self.tip().hash;
        if pending.block.previous_hash != Some(tip) {
            return Err(ChainError::Validation(format!(
                "Pending block {} does not extend tip {}",
                pending.block.hash_hex(),
                hex::encode(tip)
            )));
        }
        self.blocks.push(pending.block);
        self.utxo_set = pending.utxo_set;
        Ok(self.tip())
    }

    /// Validates `transactions`, builds a block for them and appends it.
    pub fn add_block(
        &mut self,
        transactions: Vec<Transaction>,
        validator: Vec<u8>,
    ) -> Result<&Block, ChainError> {
        let pending = self.prepare_block(transactions, validator)?;
        self.commit_block(pending)
    }

    /// Appends an already built block after checking it links to the tip
    /// and that its hash and transactions are valid.
    pub fn apply_block(&mut self, block: Block) -> Result<(), ChainError> {
        let last_block = self.tip();
        if block.previous_hash != Some(last_block.hash) {
            return Err(ChainError::Validation(format!(
                "Invalid previous block hash. Expected {}, but got {}.",
                last_block.hash_hex(),
                block
                    .previous_hash
                    .map(hex::encode)
                    .unwrap_or_else(|| "none".to_string())
            )));
        }
        let expected = block.calculate_hash();
        if expected != block.hash {
            return Err(ChainError::Validation(format!(
                "Block hash mismatch. Expected {}, but got {}.",
                hex::encode(expected),
                block.hash_hex()
            )));
        }

        let temp_state = apply_block_transactions(&self.utxo_set, &block.transactions)?;
        self.blocks.push(block);
        self.utxo_set = temp_state;
        Ok(())
    }

    pub fn tip(&self) -> &Block {
        // `new` always seeds the chain with genesis.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn genesis(&self) -> &Block {
        &self.blocks[0]
    }

    /// Index of the tip; genesis is height zero.
    pub fn height(&self) -> u64 {
        (self.blocks.len() - 1) as u64
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn utxo_set(&self) -> &UtxoSet {
        &self.utxo_set
    }

    pub fn get_block(&self, hash: &Sha256Hash) -> Result<&Block, ChainError> {
        self.blocks
            .iter()
            .find(|block| &block.hash == hash)
            .ok_or_else(|| ChainError::NotFound(format!("Block {} not found", hex::encode(hash))))
    }

    pub fn balance(&self, owner: &[u8]) -> u64 {
        self.utxo_set.balance(owner)
    }

    /// Sum of every mint ever accepted. Equals the UTXO total on a chain
    /// where no transfer left value unclaimed. Value given up that way can
    /// be minted again, so the history total may exceed `u64`.
    pub fn total_minted(&self) -> Result<u64, ChainError> {
        self.blocks
            .iter()
            .flat_map(|block| block.transactions.iter())
            .filter(|tx| tx.is_mint())
            .flat_map(|tx| tx.outputs.iter())
            .try_fold(0u64, |acc, output| acc.checked_add(output.value))
            .ok_or_else(|| ChainError::Validation("Minted value overflow".to_string()))
    }

    /// Recomputes every hash and link, then replays all transactions from
    /// scratch and compares the result with the live UTXO set.
    pub fn verify_integrity(&self) -> Result<(), ChainError> {
        let replayed = Blockchain::from_blocks(self.blocks.clone())?;
        if replayed.utxo_set != self.utxo_set {
            return Err(ChainError::Validation(
                "UTXO set does not match replayed chain".to_string(),
            ));
        }
        Ok(())
    }
}
