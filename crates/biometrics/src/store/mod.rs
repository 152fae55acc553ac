//! Secure key store: sealed named records gated by an access policy.
//!
//! Records are sealed with ChaCha20-Poly1305 under the device sealing key and
//! written to a [`RecordBackend`] as JSON envelopes. The record name and
//! policy are bound into the AEAD associated data, so an envelope renamed on
//! disk or downgraded to a weaker policy fails to open.
//!
//! Writes are delete-then-insert. Reads return `None` for a missing record,
//! an unsatisfied policy or a damaged envelope. Nothing in this layer returns
//! an error to the caller; failures are logged and surface as `None`/`false`.

mod backend;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use biokey_crypto::{RecordCipher, SealedBox, SealingKey};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use crate::error::{BiometricsError, BiometricsResult};
use crate::gate::BiometricAuthorization;

pub use backend::{FileBackend, MemoryBackend, RecordBackend};

/// Envelope format version.
const ENVELOPE_VERSION: u32 = 1;

/// Who may read a record back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPolicy {
    /// When unlocked, this device only, any enrolled biometric: reads need a
    /// live [`BiometricAuthorization`].
    RequiresBiometric,
    /// When unlocked, this device only: readable without a ceremony.
    DeviceBound,
}

impl AccessPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessPolicy::RequiresBiometric => "requires_biometric",
            AccessPolicy::DeviceBound => "device_bound",
        }
    }

    fn is_satisfied(&self, authorization: Option<&BiometricAuthorization>) -> bool {
        match self {
            AccessPolicy::DeviceBound => true,
            AccessPolicy::RequiresBiometric => authorization.is_some_and(|a| a.is_valid()),
        }
    }
}

/// Persisted form of one record.
#[derive(Debug, Serialize, Deserialize)]
struct RecordEnvelope {
    version: u32,
    name: String,
    policy: AccessPolicy,
    sealed: SealedBox,
}

fn associated_data(name: &str, policy: AccessPolicy) -> Vec<u8> {
    let mut aad = Vec::with_capacity(name.len() + 24);
    aad.extend_from_slice(name.as_bytes());
    aad.push(0);
    aad.extend_from_slice(policy.as_str().as_bytes());
    aad
}

/// Named-record store. Implementations never let an error escape.
pub trait SecureKeyStore: Send + Sync {
    /// Seal and persist `payload` under `name`, replacing any existing record.
    fn save_with_policy(&self, name: &str, payload: &[u8], policy: AccessPolicy) -> bool;

    /// Fetch and open a record if the policy admits `authorization`.
    fn read(
        &self,
        name: &str,
        authorization: Option<&BiometricAuthorization>,
    ) -> Option<Zeroizing<Vec<u8>>>;

    /// Remove a record. `true` if removed or already absent.
    fn delete(&self, name: &str) -> bool;

    /// Whether a record exists, without opening it.
    fn contains(&self, name: &str) -> bool;

    /// Save under [`AccessPolicy::RequiresBiometric`].
    fn save(&self, name: &str, payload: &[u8]) -> bool {
        self.save_with_policy(name, payload, AccessPolicy::RequiresBiometric)
    }

    /// Read without an authorization; only device-bound records open.
    fn load(&self, name: &str) -> Option<Zeroizing<Vec<u8>>> {
        self.read(name, None)
    }

    /// Read with the authorization from a successful ceremony.
    fn load_authorized(
        &self,
        name: &str,
        authorization: &BiometricAuthorization,
    ) -> Option<Zeroizing<Vec<u8>>> {
        self.read(name, Some(authorization))
    }
}

/// One mutex per record name; names never block each other.
///
/// An entry lives only while some caller holds or waits on it.
#[derive(Default)]
struct NameLocks {
    table: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl NameLocks {
    /// Run `f` inside the critical section for `name`.
    fn with_name<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(table.entry(name.to_string()).or_default())
        };

        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        drop(lock);
        if table
            .get(name)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            table.remove(name);
        }
        result
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// [`SecureKeyStore`] sealing records onto a [`RecordBackend`].
pub struct EncryptedStore<B: RecordBackend> {
    backend: B,
    cipher: RecordCipher,
    locks: NameLocks,
}

impl EncryptedStore<MemoryBackend> {
    /// Process-lifetime store with a fresh random sealing key.
    pub fn in_memory() -> BiometricsResult<Self> {
        let key = SealingKey::generate()?;
        Ok(Self::with_backend(MemoryBackend::new(), &key))
    }
}

impl EncryptedStore<FileBackend> {
    /// Store rooted at `dir`, creating the directory and device key on first use.
    pub fn open(dir: impl AsRef<Path>) -> BiometricsResult<Self> {
        let backend = FileBackend::open(dir)?;
        let key = backend.load_or_create_sealing_key()?;
        info!(path = %backend.dir().display(), "Secure store opened");
        Ok(Self::with_backend(backend, &key))
    }
}

impl<B: RecordBackend> EncryptedStore<B> {
    pub fn with_backend(backend: B, key: &SealingKey) -> Self {
        Self {
            backend,
            cipher: RecordCipher::new(key),
            locks: NameLocks::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn seal(&self, name: &str, payload: &[u8], policy: AccessPolicy) -> BiometricsResult<Vec<u8>> {
        let sealed = self.cipher.seal(payload, &associated_data(name, policy))?;
        let envelope = RecordEnvelope {
            version: ENVELOPE_VERSION,
            name: name.to_string(),
            policy,
            sealed,
        };
        Ok(serde_json::to_vec(&envelope)?)
    }

    fn write(&self, name: &str, payload: &[u8], policy: AccessPolicy) -> BiometricsResult<()> {
        let envelope = self.seal(name, payload, policy)?;
        self.backend.remove(name)?;
        self.backend.put(name, &envelope)
    }

    fn fetch(
        &self,
        name: &str,
        authorization: Option<&BiometricAuthorization>,
    ) -> BiometricsResult<Option<Zeroizing<Vec<u8>>>> {
        let raw = match self.backend.get(name)? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let envelope: RecordEnvelope = serde_json::from_slice(&raw)?;
        if envelope.version != ENVELOPE_VERSION || envelope.name != name {
            return Err(BiometricsError::CorruptRecord {
                name: name.to_string(),
                reason: format!(
                    "envelope v{} for '{}' does not match",
                    envelope.version, envelope.name
                ),
            });
        }

        if !envelope.policy.is_satisfied(authorization) {
            warn!(
                record = name,
                policy = envelope.policy.as_str(),
                "Access policy not satisfied; record withheld"
            );
            return Ok(None);
        }

        let payload = self
            .cipher
            .open(&envelope.sealed, &associated_data(name, envelope.policy))
            .map_err(|e| BiometricsError::CorruptRecord {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Some(payload))
    }
}

impl<B: RecordBackend> SecureKeyStore for EncryptedStore<B> {
    fn save_with_policy(&self, name: &str, payload: &[u8], policy: AccessPolicy) -> bool {
        self.locks.with_name(name, || match self.write(name, payload, policy) {
            Ok(()) => {
                debug!(record = name, policy = policy.as_str(), "Record saved");
                true
            }
            Err(e) => {
                error!(record = name, error = %e, "Failed to save record");
                false
            }
        })
    }

    fn read(
        &self,
        name: &str,
        authorization: Option<&BiometricAuthorization>,
    ) -> Option<Zeroizing<Vec<u8>>> {
        self.locks.with_name(name, || match self.fetch(name, authorization) {
            Ok(payload) => payload,
            Err(e) => {
                error!(record = name, error = %e, "Failed to load record");
                None
            }
        })
    }

    fn delete(&self, name: &str) -> bool {
        self.locks.with_name(name, || match self.backend.remove(name) {
            Ok(removed) => {
                if removed {
                    debug!(record = name, "Record deleted");
                }
                true
            }
            Err(e) => {
                error!(record = name, error = %e, "Failed to delete record");
                false
            }
        })
    }

    fn contains(&self, name: &str) -> bool {
        match self.backend.exists(name) {
            Ok(exists) => exists,
            Err(e) => {
                error!(record = name, error = %e, "Failed to query record");
                false
            }
        }
    }
}
