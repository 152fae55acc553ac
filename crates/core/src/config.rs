//! Configuration management for BioKey.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CoreError;

/// Default prompt title shown above the reason text.
pub const DEFAULT_PROMPT_TITLE: &str = "Authentication Required";

/// Default label of the prompt's negative button.
pub const DEFAULT_NEGATIVE_BUTTON: &str = "Cancel";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub ceremony: CeremonyConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
}

/// Which backend holds the sealed records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackendKind {
    /// Records live only for the lifetime of the process.
    Memory,
    /// One sealed envelope per record inside `StoreConfig::path`.
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackendKind,
    /// Directory for the file backend. Ignored by the memory backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Signature algorithm used for generated key pairs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum KeyAlgorithmName {
    #[serde(rename = "ecdsa-p256", alias = "p256")]
    EcdsaP256,
    #[serde(rename = "ed25519")]
    Ed25519,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeysConfig {
    #[serde(default = "default_algorithm")]
    pub algorithm: KeyAlgorithmName,
    /// Request a hardware-backed keystore; falls back to software when absent.
    #[serde(default)]
    pub prefer_hardware: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CeremonyConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_negative_button")]
    pub negative_button_text: String,
    /// Caller-side timeout for a single ceremony. `None` waits indefinitely.
    #[serde(default)]
    pub ceremony_timeout_secs: Option<u64>,
    /// How long a successful ceremony unlocks biometric-gated records.
    #[serde(default = "default_authorization_validity")]
    pub authorization_validity_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PlatformConfig {
    /// Usage-disclosure string shipped in app metadata (e.g. NSFaceIDUsageDescription).
    #[serde(default)]
    pub usage_description: Option<String>,
}

fn default_backend() -> StoreBackendKind {
    StoreBackendKind::Memory
}

fn default_algorithm() -> KeyAlgorithmName {
    KeyAlgorithmName::EcdsaP256
}

fn default_title() -> String {
    DEFAULT_PROMPT_TITLE.to_string()
}

fn default_negative_button() -> String {
    DEFAULT_NEGATIVE_BUTTON.to_string()
}

fn default_authorization_validity() -> u64 {
    10
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            prefer_hardware: false,
        }
    }
}

impl Default for CeremonyConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            negative_button_text: default_negative_button(),
            ceremony_timeout_secs: None,
            authorization_validity_secs: default_authorization_validity(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    #[cfg(feature = "toml")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            store: StoreConfig::default(),
            keys: KeysConfig::default(),
            ceremony: CeremonyConfig::default(),
            platform: PlatformConfig::default(),
        }
    }

    /// File-backed configuration rooted at `dir`.
    pub fn with_file_store(dir: impl AsRef<Path>) -> Self {
        let mut config = Self::default_config();
        config.store.backend = StoreBackendKind::File;
        config.store.path = Some(dir.as_ref().to_path_buf());
        config
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.store.backend == StoreBackendKind::File && self.store.path.is_none() {
            return Err(CoreError::InvalidConfig(
                "store.path is required when store.backend = \"file\"".to_string(),
            ));
        }
        if self.ceremony.authorization_validity_secs == 0 {
            return Err(CoreError::InvalidConfig(
                "ceremony.authorization_validity_secs must be positive".to_string(),
            ));
        }
        if self.ceremony.ceremony_timeout_secs == Some(0) {
            return Err(CoreError::InvalidConfig(
                "ceremony.ceremony_timeout_secs must be positive when set".to_string(),
            ));
        }
        if self.ceremony.title.trim().is_empty() {
            return Err(CoreError::InvalidConfig(
                "ceremony.title must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
