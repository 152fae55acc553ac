//! Error types for BioKey cryptographic operations.

use thiserror::Error;

/// Errors raised by key generation, signing and record sealing.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Key encoding error: {0}")]
    Encoding(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Sealing failed: {0}")]
    Sealing(String),

    #[error("Unsealing failed: {0}")]
    Unsealing(String),

    #[error("Entropy source unavailable: {0}")]
    Entropy(String),
}

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
