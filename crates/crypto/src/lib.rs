//! Cryptographic primitives for BioKey.
//!
//! This crate provides the key-pair primitive behind biometric challenge
//! signing and the authenticated encryption used to seal secure-store records.
//!
//! # Core Capabilities
//!
//! - **Key Generation**: asymmetric key pairs encoded as PEM (PKCS#8 / SPKI)
//! - **Challenge Signing**: ECDSA P-256 with SHA-256, or Ed25519
//! - **Verification**: the relying-party check over a signed challenge
//! - **Record Sealing**: ChaCha20-Poly1305 with the record identity bound as
//!   associated data
//!
//! # Security Principles
//!
//! - Never roll custom cryptographic primitives
//! - Private key buffers are zeroized on drop
//! - Secrets must never be logged; log [`key_fingerprint`] instead

pub mod backend;
pub mod error;
pub mod primitive;
pub mod seal;
pub mod software;

pub use backend::{select_backend, BackendKind};
pub use error::{CryptoError, CryptoResult};
pub use primitive::{key_fingerprint, GeneratedKeyPair, KeyAlgorithm, SigningPrimitive};
pub use seal::{RecordCipher, SealedBox, SealingKey, NONCE_SIZE, SEALING_KEY_LEN};
pub use software::SoftwareKeystore;
