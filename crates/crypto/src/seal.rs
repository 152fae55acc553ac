//! Authenticated sealing of secure-store records with ChaCha20-Poly1305.
//!
//! Every record is sealed under the device sealing key with a fresh random
//! nonce. The caller supplies associated data (record name and access policy)
//! so a ciphertext only opens under the identity it was sealed for.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};

/// Nonce size for ChaCha20-Poly1305 (96 bits / 12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Sealing key length in bytes (256-bit).
pub const SEALING_KEY_LEN: usize = 32;

/// Device-bound symmetric key. Zeroized on drop.
pub struct SealingKey {
    bytes: Zeroizing<[u8; SEALING_KEY_LEN]>,
}

impl SealingKey {
    /// Generate a new key from the OS entropy source.
    pub fn generate() -> CryptoResult<Self> {
        let mut bytes = Zeroizing::new([0u8; SEALING_KEY_LEN]);
        getrandom::getrandom(bytes.as_mut())
            .map_err(|e| CryptoError::Entropy(e.to_string()))?;
        Ok(Self { bytes })
    }

    /// Rebuild a key from persisted bytes.
    pub fn from_bytes(raw: &[u8]) -> CryptoResult<Self> {
        if raw.len() != SEALING_KEY_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "sealing key must be {} bytes, got {}",
                SEALING_KEY_LEN,
                raw.len()
            )));
        }
        let mut bytes = Zeroizing::new([0u8; SEALING_KEY_LEN]);
        bytes.copy_from_slice(raw);
        Ok(Self { bytes })
    }

    /// Raw key bytes, for persisting to device-local storage.
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_ref()
    }
}

impl std::fmt::Debug for SealingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SealingKey(<redacted>)")
    }
}

/// Ciphertext plus the nonce it was sealed with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SealedBox {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
}

/// AEAD wrapper bound to a single sealing key.
pub struct RecordCipher {
    cipher: ChaCha20Poly1305,
}

impl RecordCipher {
    pub fn new(key: &SealingKey) -> Self {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
        Self { cipher }
    }

    /// Seal `plaintext` with `aad` bound into the authentication tag.
    pub fn seal(&self, plaintext: &[u8], aad: &[u8]) -> CryptoResult<SealedBox> {
        let mut nonce = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce).map_err(|e| CryptoError::Entropy(e.to_string()))?;

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
            .map_err(|e| CryptoError::Sealing(e.to_string()))?;

        Ok(SealedBox { nonce, ciphertext })
    }

    /// Open a sealed box. Fails if the key, nonce, ciphertext or `aad` differ.
    pub fn open(&self, sealed: &SealedBox, aad: &[u8]) -> CryptoResult<Zeroizing<Vec<u8>>> {
        self.cipher
            .decrypt(
                Nonce::from_slice(&sealed.nonce),
                Payload {
                    msg: &sealed.ciphertext,
                    aad,
                },
            )
            .map(Zeroizing::new)
            .map_err(|e| CryptoError::Unsealing(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_and_open() {
        let key = SealingKey::generate().unwrap();
        let cipher = RecordCipher::new(&key);

        let sealed = cipher.seal(b"private key pem", b"privateKey").unwrap();
        assert_ne!(sealed.ciphertext, b"private key pem");

        let opened = cipher.open(&sealed, b"privateKey").unwrap();
        assert_eq!(opened.as_slice(), b"private key pem");
    }

    #[test]
    fn test_wrong_aad_rejected() {
        let key = SealingKey::generate().unwrap();
        let cipher = RecordCipher::new(&key);

        let sealed = cipher.seal(b"payload", b"privateKey").unwrap();
        assert!(matches!(
            cipher.open(&sealed, b"publicKey"),
            Err(CryptoError::Unsealing(_))
        ));
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let key = SealingKey::generate().unwrap();
        let cipher = RecordCipher::new(&key);

        let mut sealed = cipher.seal(b"payload", b"name").unwrap();
        sealed.ciphertext[0] ^= 0xFF;
        assert!(cipher.open(&sealed, b"name").is_err());
    }

    #[test]
    fn test_other_device_key_rejected() {
        let sealed = RecordCipher::new(&SealingKey::generate().unwrap())
            .seal(b"payload", b"name")
            .unwrap();
        let other = RecordCipher::new(&SealingKey::generate().unwrap());
        assert!(other.open(&sealed, b"name").is_err());
    }

    #[test]
    fn test_nonces_are_unique() {
        let cipher = RecordCipher::new(&SealingKey::generate().unwrap());
        let a = cipher.seal(b"payload", b"name").unwrap();
        let b = cipher.seal(b"payload", b"name").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_key_round_trips_through_bytes() {
        let key = SealingKey::generate().unwrap();
        let restored = SealingKey::from_bytes(key.as_bytes()).unwrap();
        let sealed = RecordCipher::new(&key).seal(b"payload", b"name").unwrap();
        let opened = RecordCipher::new(&restored).open(&sealed, b"name").unwrap();
        assert_eq!(opened.as_slice(), b"payload");

        assert!(SealingKey::from_bytes(&[0u8; 16]).is_err());
        assert_eq!(format!("{:?}", key), "SealingKey(<redacted>)");
    }

    #[test]
    fn test_sealed_box_serializes() {
        let cipher = RecordCipher::new(&SealingKey::generate().unwrap());
        let sealed = cipher.seal(b"payload", b"name").unwrap();
        let json = serde_json::to_string(&sealed).unwrap();
        let decoded: SealedBox = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, sealed);
    }
}
