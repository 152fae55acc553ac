//! Capability interface over the asymmetric key primitive.
//!
//! A platform keystore (Android Keystore, Secure Enclave, TPM) and the
//! software fallback all expose the same three operations: mint a key pair,
//! sign with the private half, verify with the public half.

use biokey_core::KeyAlgorithmName;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::backend::BackendKind;
use crate::error::CryptoResult;

/// Signature scheme of a key pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    /// ECDSA over NIST P-256 with SHA-256; signatures are ASN.1 DER.
    EcdsaP256,
    /// Ed25519; signatures are the raw 64-byte encoding.
    Ed25519,
}

impl KeyAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyAlgorithm::EcdsaP256 => "ecdsa-p256",
            KeyAlgorithm::Ed25519 => "ed25519",
        }
    }
}

impl From<KeyAlgorithmName> for KeyAlgorithm {
    fn from(name: KeyAlgorithmName) -> Self {
        match name {
            KeyAlgorithmName::EcdsaP256 => KeyAlgorithm::EcdsaP256,
            KeyAlgorithmName::Ed25519 => KeyAlgorithm::Ed25519,
        }
    }
}

/// The two halves produced by a key-generation primitive.
///
/// Either half may come back empty from a misbehaving backend; callers must
/// check [`GeneratedKeyPair::is_complete`] before persisting anything.
pub struct GeneratedKeyPair {
    /// PKCS#8 PEM private key. Zeroized on drop.
    pub private_key: Zeroizing<Vec<u8>>,
    /// SubjectPublicKeyInfo PEM public key.
    pub public_key: Vec<u8>,
}

impl GeneratedKeyPair {
    /// Both components are present.
    pub fn is_complete(&self) -> bool {
        !self.private_key.is_empty() && !self.public_key.is_empty()
    }
}

impl std::fmt::Debug for GeneratedKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedKeyPair")
            .field("private_key", &"<redacted>")
            .field("public_key_len", &self.public_key.len())
            .finish()
    }
}

/// Key-pair primitive implemented once per backing keystore.
pub trait SigningPrimitive: Send + Sync {
    /// Signature scheme this primitive produces.
    fn algorithm(&self) -> KeyAlgorithm;

    /// Where key operations execute.
    fn backend(&self) -> BackendKind;

    /// Mint a fresh key pair.
    fn generate_key_pair(&self) -> CryptoResult<GeneratedKeyPair>;

    /// Sign `data` with an encoded private key previously returned by
    /// [`SigningPrimitive::generate_key_pair`].
    fn sign(&self, data: &[u8], private_key: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Verify `signature` over `data`. Malformed signatures verify as `false`;
    /// malformed public keys are an error.
    fn verify(&self, data: &[u8], signature: &[u8], public_key: &[u8]) -> CryptoResult<bool>;
}

/// Short BLAKE3 fingerprint of a public key, safe to log.
pub fn key_fingerprint(public_key: &[u8]) -> String {
    let hash = blake3::hash(public_key);
    hex::encode(&hash.as_bytes()[..8])
}
