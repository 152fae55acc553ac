//! Biometric authentication with challenge signing for BioKey.
//!
//! This crate binds a device biometric ceremony to a public-key
//! challenge/response protocol. A key pair is provisioned into a secure
//! store; a relying party later sends a challenge, the user passes the
//! biometric ceremony, and the stored private key signs the challenge.
//!
//! # Components
//!
//! - [`SecureKeyStore`]: sealed named records gated by an [`AccessPolicy`]
//! - [`KeyPairManager`]: atomic key-pair provisioning (commit or rollback)
//! - [`BiometricGate`]: capability query and single-resolution ceremonies
//! - [`ChallengeSigner`]: signs a challenge only after a successful ceremony
//! - [`BiometricService`]: the boundary a UI or bridge layer calls
//!
//! # Platform Integration
//!
//! The OS biometric prompt and the UI-owning execution context are supplied
//! by the embedder through [`BiometricPlatform`] and [`InteractiveContext`].
//! [`simulated`] provides scripted implementations for tests and headless
//! hosts.

pub mod challenge;
pub mod error;
pub mod gate;
pub mod keypair;
pub mod outcome;
pub mod platform;
pub mod service;
pub mod simulated;
pub mod store;

pub use challenge::{ChallengeSignature, ChallengeSigner};
pub use error::{BiometricsError, BiometricsResult};
pub use gate::{BiometricAuthorization, BiometricGate, CeremonyResult};
pub use keypair::{KeyPairManager, PRIVATE_KEY_RECORD, PUBLIC_KEY_RECORD};
pub use outcome::{AuthStatus, AuthenticationOutcome, ChallengeOutcome};
pub use platform::{
    BiometricPlatform, Capability, CeremonySink, InteractiveContext, PlatformErrorCode,
    PlatformEvent, PromptInfo, UiTask,
};
pub use service::BiometricService;
pub use store::{
    AccessPolicy, EncryptedStore, FileBackend, MemoryBackend, RecordBackend, SecureKeyStore,
};
