//! Key-value persistence for blocks, wallets and the chain tip

use crate::blockchain::Block;
use crate::crypto::Sha256Hash;
use crate::error::ChainError;
use crate::wallet::Wallet;
use parking_lot::Mutex as FastMutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub const TIP_KEY: &[u8] = b"tip";
pub const WALLET_KEY_PREFIX: &str = "wallet_";

pub fn wallet_key(address: &str) -> Vec<u8> {
    format!("{}{}", WALLET_KEY_PREFIX, address).into_bytes()
}

/// Abstraction for persistence backends. `save_block` must store the block
/// and move the tip in one atomic write.
pub trait Storage: Send + Sync {
    fn save_block(&self, block: &Block) -> Result<(), ChainError>;
    fn get_block(&self, hash: &Sha256Hash) -> Result<Block, ChainError>;
    fn save_wallet(&self, address: &str, wallet: &Wallet) -> Result<(), ChainError>;
    fn get_wallet(&self, address: &str) -> Result<Wallet, ChainError>;
    /// Hash of the most recently saved block, if any.
    fn tip(&self) -> Result<Option<Sha256Hash>, ChainError>;
    /// Releases the backend. Calling it again is a no-op; every other
    /// operation fails afterwards.
    fn close(&self) -> Result<(), ChainError>;

    /// Stored blocks from genesis to tip, found by walking back from the
    /// tip. `None` when nothing has been saved yet.
    fn load_chain(&self) -> Result<Option<Vec<Block>>, ChainError> {
        let mut cursor = match self.tip()? {
            Some(hash) => hash,
            None => return Ok(None),
        };
        let mut seen = HashSet::new();
        let mut blocks = Vec::new();
        loop {
            if !seen.insert(cursor) {
                return Err(ChainError::StorageError(format!(
                    "Cycle in stored chain at block {}",
                    hex::encode(cursor)
                )));
            }
            let block = self.get_block(&cursor)?;
            let previous = block.previous_hash;
            blocks.push(block);
            match previous {
                Some(hash) => cursor = hash,
                None => break,
            }
        }
        blocks.reverse();
        Ok(Some(blocks))
    }
}

pub struct Database {
    conn: Mutex<Option<Connection>>,
}

impl Database {
    /// Opens a database file that must already exist; never creates one.
    pub fn open_existing<P: AsRef<Path>>(path: P) -> Result<Self, ChainError> {
        if !path.as_ref().exists() {
            return Err(ChainError::NotFound(format!(
                "Database {} does not exist",
                path.as_ref().display()
            )));
        }
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ChainError> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| ChainError::StorageError(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key BLOB PRIMARY KEY,
                value BLOB NOT NULL
            )",
            [],
        )
        .map_err(|e| ChainError::StorageError(format!("Failed to create kv table: {}", e)))?;

        Ok(Database {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, ChainError>,
    ) -> Result<T, ChainError> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| ChainError::StorageError("Mutex poisoned".to_string()))?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| ChainError::StorageError("Database is closed".to_string()))?;
        f(conn)
    }

    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()
            .map_err(|e| ChainError::StorageError(format!("Failed to read key: {}", e)))
        })
    }

    fn put_raw(&self, key: &[u8], value: &[u8]) -> Result<(), ChainError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| ChainError::StorageError(format!("Failed to write key: {}", e)))?;
            Ok(())
        })
    }
}

impl Storage for Database {
    fn save_block(&self, block: &Block) -> Result<(), ChainError> {
        let bytes = block.to_bytes()?;
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction().map_err(|e| {
                ChainError::StorageError(format!("Failed to start transaction: {}", e))
            })?;
            tx.execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![block.hash.to_vec(), bytes],
            )
            .map_err(|e| ChainError::StorageError(format!("Failed to save block: {}", e)))?;
            tx.execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![TIP_KEY, block.hash.to_vec()],
            )
            .map_err(|e| ChainError::StorageError(format!("Failed to move tip: {}", e)))?;
            tx.commit().map_err(|e| {
                ChainError::StorageError(format!("Failed to commit transaction: {}", e))
            })
        })
    }

    fn get_block(&self, hash: &Sha256Hash) -> Result<Block, ChainError> {
        let bytes = self
            .get_raw(hash)?
            .ok_or_else(|| ChainError::NotFound(format!("Block {} not found", hex::encode(hash))))?;
        Block::from_bytes(&bytes)
    }

    fn save_wallet(&self, address: &str, wallet: &Wallet) -> Result<(), ChainError> {
        self.put_raw(&wallet_key(address), &wallet.to_bytes()?)
    }

    fn get_wallet(&self, address: &str) -> Result<Wallet, ChainError> {
        let bytes = self
            .get_raw(&wallet_key(address))?
            .ok_or_else(|| ChainError::NotFound(format!("Wallet {} not found", address)))?;
        Wallet::from_bytes(&bytes)
    }

    fn tip(&self) -> Result<Option<Sha256Hash>, ChainError> {
        match self.get_raw(TIP_KEY)? {
            None => Ok(None),
            Some(bytes) => {
                let hash: Sha256Hash = bytes.as_slice().try_into().map_err(|_| {
                    ChainError::StorageError(format!("Corrupt tip record ({} bytes)", bytes.len()))
                })?;
                Ok(Some(hash))
            }
        }
    }

    fn close(&self) -> Result<(), ChainError> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| ChainError::StorageError("Mutex poisoned".to_string()))?;
        match guard.take() {
            None => Ok(()),
            Some(conn) => conn
                .close()
                .map_err(|(_, e)| ChainError::StorageError(format!("Failed to close database: {}", e))),
        }
    }
}

/// Process-local backend holding the same encoded records as [`Database`].
#[derive(Default)]
pub struct InMemoryStorage {
    entries: FastMutex<HashMap<Vec<u8>, Vec<u8>>>,
    closed: AtomicBool,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), ChainError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChainError::StorageError("Storage is closed".to_string()));
        }
        Ok(())
    }

    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        self.ensure_open()?;
        Ok(self.entries.lock().get(key).cloned())
    }
}

impl Storage for InMemoryStorage {
    fn save_block(&self, block: &Block) -> Result<(), ChainError> {
        self.ensure_open()?;
        let bytes = block.to_bytes()?;
        let mut entries = self.entries.lock();
        entries.insert(block.hash.to_vec(), bytes);
        entries.insert(TIP_KEY.to_vec(), block.hash.to_vec());
        Ok(())
    }

    fn get_block(&self, hash: &Sha256Hash) -> Result<Block, ChainError> {
        let bytes = self
            .get_raw(hash)?
            .ok_or_else(|| ChainError::NotFound(format!("Block {} not found", hex::encode(hash))))?;
        Block::from_bytes(&bytes)
    }

    fn save_wallet(&self, address: &str, wallet: &Wallet) -> Result<(), ChainError> {
        self.ensure_open()?;
        let bytes = wallet.to_bytes()?;
        self.entries.lock().insert(wallet_key(address), bytes);
        Ok(())
    }

    fn get_wallet(&self, address: &str) -> Result<Wallet, ChainError> {
        let bytes = self
            .get_raw(&wallet_key(address))?
            .ok_or_else(|| ChainError::NotFound(format!("Wallet {} not found", address)))?;
        Wallet::from_bytes(&bytes)
    }

    fn tip(&self) -> Result<Option<Sha256Hash>, ChainError> {
        match self.get_raw(TIP_KEY)? {
            None => Ok(None),
            Some(bytes) => bytes
                .as_slice()
                .try_into()
                .map(Some)
                .map_err(|_| ChainError::StorageError("Corrupt tip record".to_string())),
        }
    }

    fn close(&self) -> Result<(), ChainError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
