//! UFChain - a minimal UTXO ledger with stake-weighted validator selection
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, the chain, the UTXO set and block validation
//! - [`transaction`] - Transaction types, signing and validation
//! - [`wallet`] - Key material and addresses
//!
//! ## Consensus
//! - [`consensus`] - Stake-weighted validator selection
//!
//! ## Cryptography
//! - [`crypto`] - Hashing, signatures and verification (secp256k1)
//!
//! ## State Management
//! - [`persistence`] - Key-value storage (SQLite and in-memory)
//! - [`ledger`] - Shared ledger service used by the node and the API
//! - [`contract`] - Opaque contract records
//!
//! ## Node & Integration
//! - [`node`] - Node bootstrap
//! - `api` - REST API server (feature `api`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod transaction;
pub mod wallet;

// ============================================================================
// Consensus
// ============================================================================
pub mod consensus;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// State Management
// ============================================================================
pub mod contract;
pub mod ledger;
pub mod persistence;

// ============================================================================
// Node & Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;
pub mod node;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

pub use error::{ChainError, Result};
