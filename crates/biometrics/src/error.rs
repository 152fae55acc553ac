//! Error types for biometric key operations.
//!
//! These errors stay inside the crate boundary: the store, key-pair manager
//! and challenge signer translate them into statuses, absent values or
//! `false` before anything reaches a caller.

use thiserror::Error;

/// Errors that can occur in biometric key operations.
#[derive(Debug, Error)]
pub enum BiometricsError {
    /// Storage backend errors
    #[error("Secure store error: {0}")]
    Store(String),

    /// Stored record failed integrity or envelope checks
    #[error("Corrupt record '{name}': {reason}")]
    CorruptRecord { name: String, reason: String },

    /// Key record missing or its access policy unsatisfied
    #[error("Key not found: {name}")]
    KeyNotFound { name: String },

    /// Challenge could not be decoded from its transport encoding
    #[error("Challenge decode failed: {0}")]
    ChallengeDecode(String),

    /// Cryptographic errors
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] biokey_crypto::CryptoError),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Core errors
    #[error("Core error: {0}")]
    Core(#[from] biokey_core::CoreError),
}

/// Result type for biometric key operations.
pub type BiometricsResult<T> = Result<T, BiometricsError>;
