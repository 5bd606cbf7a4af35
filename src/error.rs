//! Error types for UFChain

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Insufficient funds: have {available}, need {required}")]
    InsufficientFunds { available: u64, required: u64 },
    #[error("Invalid signature on transaction {0}")]
    InvalidSignature(String),
    #[error("Cryptographic error: {0}")]
    CryptoError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("No eligible validator: {0}")]
    NoEligibleValidator(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Coarse classification used at request boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Storage,
    Consensus,
    Config,
}

impl ChainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChainError::Validation(_)
            | ChainError::InsufficientFunds { .. }
            | ChainError::InvalidSignature(_)
            | ChainError::CryptoError(_)
            | ChainError::SerializationError(_) => ErrorKind::Validation,
            ChainError::NotFound(_) => ErrorKind::NotFound,
            ChainError::StorageError(_) => ErrorKind::Storage,
            ChainError::NoEligibleValidator(_) => ErrorKind::Consensus,
            ChainError::ConfigError(_) => ErrorKind::Config,
        }
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::StorageError(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for ChainError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        ChainError::SerializationError(err.to_string())
    }
}

impl From<rusqlite::Error> for ChainError {
    fn from(err: rusqlite::Error) -> Self {
        ChainError::StorageError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            ChainError::InsufficientFunds { available: 1, required: 2 }.kind(),
            ErrorKind::Validation
        );
        assert_eq!(ChainError::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(ChainError::StorageError("x".into()).kind(), ErrorKind::Storage);
        assert_eq!(
            ChainError::NoEligibleValidator("x".into()).kind(),
            ErrorKind::Consensus
        );
    }

    #[test]
    fn test_insufficient_funds_message() {
        let err = ChainError::InsufficientFunds { available: 600, required: 1000 };
        assert_eq!(err.to_string(), "Insufficient funds: have 600, need 1000");
    }
}
