//! Core functionality shared by the BioKey workspace.
//!
//! This crate provides configuration, logging initialisation and the core
//! error type used by the crypto and biometrics crates.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    CeremonyConfig, Config, KeyAlgorithmName, KeysConfig, PlatformConfig, StoreBackendKind,
    StoreConfig,
};
pub use error::{CoreError, Result};
