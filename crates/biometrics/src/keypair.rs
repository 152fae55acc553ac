//! Key-pair lifecycle: generate, publish and remove the device key pair.
//!
//! Generation is all-or-nothing. Either both records are persisted and the
//! public key is returned, or neither record remains.

use std::sync::Arc;

use biokey_crypto::{key_fingerprint, SigningPrimitive};
use tracing::{error, info, warn};

use crate::store::{AccessPolicy, SecureKeyStore};

/// Store record holding the PKCS#8 PEM private key.
pub const PRIVATE_KEY_RECORD: &str = "privateKey";

/// Store record holding the SPKI PEM public key.
pub const PUBLIC_KEY_RECORD: &str = "publicKey";

pub struct KeyPairManager {
    store: Arc<dyn SecureKeyStore>,
    primitive: Arc<dyn SigningPrimitive>,
}

impl KeyPairManager {
    pub fn new(store: Arc<dyn SecureKeyStore>, primitive: Arc<dyn SigningPrimitive>) -> Self {
        Self { store, primitive }
    }

    /// Generate a fresh pair, replacing any existing one.
    ///
    /// Returns the PEM public key, or `None` if nothing was persisted.
    pub fn generate(&self) -> Option<String> {
        let pair = match self.primitive.generate_key_pair() {
            Ok(pair) => pair,
            Err(e) => {
                error!(error = %e, "Key pair generation failed");
                return None;
            }
        };

        if !pair.is_complete() {
            error!(?pair, "Key generation returned an incomplete pair");
            return None;
        }

        let public_key = match String::from_utf8(pair.public_key.clone()) {
            Ok(pem) => pem,
            Err(_) => {
                error!("Generated public key is not valid PEM text");
                return None;
            }
        };

        let committed = self.store.save_with_policy(
            PRIVATE_KEY_RECORD,
            &pair.private_key,
            AccessPolicy::RequiresBiometric,
        ) && self.store.save_with_policy(
            PUBLIC_KEY_RECORD,
            &pair.public_key,
            AccessPolicy::DeviceBound,
        );

        if !committed {
            warn!("Key pair persistence failed; rolling back");
            self.rollback();
            return None;
        }

        info!(
            key_id = %key_fingerprint(&pair.public_key),
            algorithm = self.primitive.algorithm().as_str(),
            backend = ?self.primitive.backend(),
            "Key pair generated"
        );
        Some(public_key)
    }

    /// The stored public key, if any. Never requires a ceremony.
    pub fn get_public_key(&self) -> Option<String> {
        let raw = self.store.load(PUBLIC_KEY_RECORD)?;
        match String::from_utf8(raw.to_vec()) {
            Ok(pem) => Some(pem),
            Err(_) => {
                error!(record = PUBLIC_KEY_RECORD, "Stored public key is not UTF-8");
                None
            }
        }
    }

    /// Remove both records. `true` only if both deletions succeed; deleting
    /// absent records counts as success.
    pub fn delete(&self) -> bool {
        let private_removed = self.store.delete(PRIVATE_KEY_RECORD);
        let public_removed = self.store.delete(PUBLIC_KEY_RECORD);
        let deleted = private_removed && public_removed;
        if deleted {
            info!("Key pair deleted");
        } else {
            warn!(private_removed, public_removed, "Key pair deletion incomplete");
        }
        deleted
    }

    /// Whether a full pair is provisioned, checked without opening the records.
    pub fn has_key_pair(&self) -> bool {
        self.store.contains(PRIVATE_KEY_RECORD) && self.store.contains(PUBLIC_KEY_RECORD)
    }

    fn rollback(&self) {
        for name in [PRIVATE_KEY_RECORD, PUBLIC_KEY_RECORD] {
            if !self.store.delete(name) {
                error!(record = name, "Rollback could not remove record");
            }
        }
    }
}

impl std::fmt::Debug for KeyPairManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPairManager")
            .field("algorithm", &self.primitive.algorithm())
            .field("backend", &self.primitive.backend())
            .finish()
    }
}
