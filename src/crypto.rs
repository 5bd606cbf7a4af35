//! Cryptographic primitives for UFChain

use crate::error::ChainError;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{COMPACT_SIGNATURE_SIZE, SECRET_KEY_SIZE, UNCOMPRESSED_PUBLIC_KEY_SIZE},
    ecdsa::Signature,
    All, Message, PublicKey, Secp256k1, SecretKey,
};
use sha2::{Digest, Sha256};

/// A thread-safe, lazily initialized Secp256k1 context.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Length of a raw public key: the X and Y coordinates, 32 bytes each.
pub const PUBLIC_KEY_LEN: usize = UNCOMPRESSED_PUBLIC_KEY_SIZE - 1;

/// Length of a compact `r || s` signature.
pub const SIGNATURE_LEN: usize = COMPACT_SIGNATURE_SIZE;

/// Tag byte that prefixes an uncompressed SEC1 point.
const UNCOMPRESSED_TAG: u8 = 0x04;

pub type Sha256Hash = [u8; 32];

pub fn sha256(data: &[u8]) -> Sha256Hash {
    Sha256::digest(data).into()
}

/// Derives the display address of a raw public key:
/// `0x` followed by the hex of the last 20 bytes of its SHA-256.
pub fn address_from_public_key(public_key: &[u8]) -> String {
    let hash = sha256(public_key);
    format!("0x{}", hex::encode(&hash[hash.len() - 20..]))
}

/// Parses a raw 64-byte public key back into a curve point.
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey, ChainError> {
    if bytes.len() != PUBLIC_KEY_LEN {
        return Err(ChainError::CryptoError(format!(
            "Public key must be exactly {} bytes, got {}",
            PUBLIC_KEY_LEN,
            bytes.len()
        )));
    }
    let mut sec1 = [0u8; UNCOMPRESSED_PUBLIC_KEY_SIZE];
    sec1[0] = UNCOMPRESSED_TAG;
    sec1[1..].copy_from_slice(bytes);
    PublicKey::from_slice(&sec1)
        .map_err(|e| ChainError::CryptoError(format!("Invalid public key: {}", e)))
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    /// A failing OS RNG aborts; there is no safe way to continue without one.
    pub fn generate() -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        Self::from_secret_key(secret_key)
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    /// Creates a KeyPair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        if bytes.len() != SECRET_KEY_SIZE {
            return Err(ChainError::CryptoError(format!(
                "Secret key must be {} bytes, got {}",
                SECRET_KEY_SIZE,
                bytes.len()
            )));
        }
        let secret_key = SecretKey::from_slice(bytes)
            .map_err(|e| ChainError::CryptoError(format!("Invalid secret key bytes: {}", e)))?;
        Ok(Self::from_secret_key(secret_key))
    }

    pub fn secret_bytes(&self) -> [u8; SECRET_KEY_SIZE] {
        self.secret_key.secret_bytes()
    }

    /// Raw public key (X || Y) without the SEC1 tag byte.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.public_key.serialize_uncompressed()[1..].to_vec()
    }

    pub fn address(&self) -> String {
        address_from_public_key(&self.public_key_bytes())
    }

    /// Signs a 32-byte digest and returns the compact signature bytes.
    pub fn sign_digest(&self, digest: &Sha256Hash) -> [u8; SIGNATURE_LEN] {
        let message = Message::from_digest(*digest);
        SECP256K1_CONTEXT
            .sign_ecdsa(&message, &self.secret_key)
            .serialize_compact()
    }
}

/// Verifies a compact ECDSA signature over a 32-byte digest.
pub fn verify_signature(
    public_key_bytes: &[u8],
    digest: &Sha256Hash,
    signature_bytes: &[u8],
) -> Result<(), ChainError> {
    if signature_bytes.len() != SIGNATURE_LEN {
        return Err(ChainError::CryptoError(format!(
            "Signature must be exactly {} bytes (compact), got {}",
            SIGNATURE_LEN,
            signature_bytes.len()
        )));
    }
    let public_key = parse_public_key(public_key_bytes)?;
    let signature = Signature::from_compact(signature_bytes)
        .map_err(|e| ChainError::CryptoError(format!("Invalid signature: {}", e)))?;

    SECP256K1_CONTEXT
        .verify_ecdsa(&Message::from_digest(*digest), &signature, &public_key)
        .map_err(|_| ChainError::CryptoError("Signature verification failed".to_string()))
}
