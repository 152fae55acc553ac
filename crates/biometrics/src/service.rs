//! Boundary surface for the UI or bridge layer.
//!
//! [`BiometricService`] wires the configured store, signing primitive and
//! gate together and exposes the operations a host application calls. Every
//! operation answers with a status, an optional value or a boolean; nothing
//! here returns an error once the service is built.

use std::sync::Arc;

use biokey_core::{Config, CoreError, StoreBackendKind};
use biokey_crypto::{select_backend, KeyAlgorithm, SigningPrimitive};
use tracing::{info, warn};

use crate::challenge::{self, ChallengeSigner};
use crate::error::BiometricsResult;
use crate::gate::BiometricGate;
use crate::keypair::KeyPairManager;
use crate::outcome::{AuthenticationOutcome, ChallengeOutcome};
use crate::platform::{BiometricPlatform, InteractiveContext};
use crate::store::{EncryptedStore, SecureKeyStore};

pub struct BiometricService {
    gate: Arc<BiometricGate>,
    keys: KeyPairManager,
    signer: ChallengeSigner,
    primitive: Arc<dyn SigningPrimitive>,
    usage_description: Option<String>,
}

impl BiometricService {
    /// Build a service from configuration.
    ///
    /// `hardware` is the platform keystore primitive, if the host has one;
    /// it is used when `[keys] prefer_hardware` is set and the algorithm
    /// matches.
    pub fn new<C: InteractiveContext + 'static>(
        config: &Config,
        platform: Arc<dyn BiometricPlatform>,
        context: &Arc<C>,
        hardware: Option<Arc<dyn SigningPrimitive>>,
    ) -> BiometricsResult<Self> {
        config.validate()?;

        let store: Arc<dyn SecureKeyStore> = match config.store.backend {
            StoreBackendKind::Memory => Arc::new(EncryptedStore::in_memory()?),
            StoreBackendKind::File => {
                let path = config.store.path.as_ref().ok_or_else(|| {
                    CoreError::InvalidConfig("store.path is required for the file backend".into())
                })?;
                Arc::new(EncryptedStore::open(path)?)
            }
        };

        let primitive = select_backend(
            KeyAlgorithm::from(config.keys.algorithm),
            config.keys.prefer_hardware,
            hardware,
        );

        Ok(Self::with_parts(
            store,
            primitive,
            BiometricGate::from_config(platform, context, &config.ceremony),
            config.platform.usage_description.clone(),
        ))
    }

    /// Assemble a service from already-built parts.
    pub fn with_parts(
        store: Arc<dyn SecureKeyStore>,
        primitive: Arc<dyn SigningPrimitive>,
        gate: BiometricGate,
        usage_description: Option<String>,
    ) -> Self {
        let gate = Arc::new(gate);
        info!(
            algorithm = primitive.algorithm().as_str(),
            backend = ?primitive.backend(),
            "Biometric service ready"
        );
        Self {
            keys: KeyPairManager::new(Arc::clone(&store), Arc::clone(&primitive)),
            signer: ChallengeSigner::new(Arc::clone(&gate), store, Arc::clone(&primitive)),
            gate,
            primitive,
            usage_description,
        }
    }

    pub fn is_biometric_available(&self) -> bool {
        self.gate.is_available()
    }

    pub async fn authenticate(&self, reason: &str) -> AuthenticationOutcome {
        self.gate.authenticate(reason).await
    }

    pub async fn authenticate_with_challenge(
        &self,
        reason: &str,
        challenge_b64: &str,
    ) -> ChallengeOutcome {
        self.signer
            .authenticate_with_challenge(reason, challenge_b64)
            .await
    }

    /// Generate a key pair; returns the PEM public key.
    pub fn generate_key_pair(&self) -> Option<String> {
        self.keys.generate()
    }

    pub fn get_public_key(&self) -> Option<String> {
        self.keys.get_public_key()
    }

    pub fn delete_key_pair(&self) -> bool {
        self.keys.delete()
    }

    pub fn has_key_pair(&self) -> bool {
        self.keys.has_key_pair()
    }

    /// Whether the host declared why it uses biometrics. Face-based prompts
    /// on some platforms refuse to run without it.
    pub fn is_usage_description_present(&self) -> bool {
        let present = self
            .usage_description
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty());
        if !present {
            warn!("No biometric usage description configured");
        }
        present
    }

    /// Check a challenge signature against a PEM public key.
    pub fn verify_challenge(
        &self,
        public_key_pem: &str,
        challenge_b64: &str,
        signature_b64: &str,
    ) -> bool {
        challenge::verify_challenge(
            self.primitive.as_ref(),
            public_key_pem,
            challenge_b64,
            signature_b64,
        )
    }

    pub fn gate(&self) -> &BiometricGate {
        &self.gate
    }
}

impl std::fmt::Debug for BiometricService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiometricService")
            .field("gate", &self.gate)
            .field("keys", &self.keys)
            .finish()
    }
}
