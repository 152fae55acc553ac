//! Keystore backend selection.
//!
//! Hardware keystores are reached through platform bindings that live outside
//! this workspace and implement [`SigningPrimitive`] themselves. When none is
//! supplied the software keystore is used and the downgrade is logged.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::primitive::{KeyAlgorithm, SigningPrimitive};
use crate::software::SoftwareKeystore;

/// Where key operations execute.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Secure element, TEE, StrongBox or Secure Enclave.
    Hardware,
    /// In-process software implementation.
    Software,
}

/// Pick the signing primitive for `algorithm`.
///
/// `hardware` is the platform-provided primitive, if the embedding layer has
/// one. It is used only when `prefer_hardware` is set and its algorithm
/// matches; otherwise the software keystore is returned.
pub fn select_backend(
    algorithm: KeyAlgorithm,
    prefer_hardware: bool,
    hardware: Option<Arc<dyn SigningPrimitive>>,
) -> Arc<dyn SigningPrimitive> {
    if prefer_hardware {
        match hardware {
            Some(primitive) if primitive.algorithm() == algorithm => {
                info!(
                    algorithm = algorithm.as_str(),
                    "STATUS: Keystore :: Hardware Root of Trust :: ACTIVE"
                );
                return primitive;
            }
            Some(primitive) => {
                warn!(
                    requested = algorithm.as_str(),
                    offered = primitive.algorithm().as_str(),
                    "Hardware keystore algorithm mismatch"
                );
            }
            None => {}
        }
        warn!(
            algorithm = algorithm.as_str(),
            "STATUS: Keystore :: Hardware Root of Trust :: STUBBED"
        );
    }
    Arc::new(SoftwareKeystore::new(algorithm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CryptoResult;
    use crate::primitive::GeneratedKeyPair;

    struct FakeHardware(KeyAlgorithm);

    impl SigningPrimitive for FakeHardware {
        fn algorithm(&self) -> KeyAlgorithm {
            self.0
        }
        fn backend(&self) -> BackendKind {
            BackendKind::Hardware
        }
        fn generate_key_pair(&self) -> CryptoResult<GeneratedKeyPair> {
            SoftwareKeystore::new(self.0).generate_key_pair()
        }
        fn sign(&self, data: &[u8], private_key: &[u8]) -> CryptoResult<Vec<u8>> {
            SoftwareKeystore::new(self.0).sign(data, private_key)
        }
        fn verify(&self, data: &[u8], signature: &[u8], public_key: &[u8]) -> CryptoResult<bool> {
            SoftwareKeystore::new(self.0).verify(data, signature, public_key)
        }
    }

    #[test]
    fn test_software_when_hardware_not_preferred() {
        let hw: Arc<dyn SigningPrimitive> = Arc::new(FakeHardware(KeyAlgorithm::EcdsaP256));
        let selected = select_backend(KeyAlgorithm::EcdsaP256, false, Some(hw));
        assert_eq!(selected.backend(), BackendKind::Software);
    }

    #[test]
    fn test_hardware_when_preferred_and_matching() {
        let hw: Arc<dyn SigningPrimitive> = Arc::new(FakeHardware(KeyAlgorithm::EcdsaP256));
        let selected = select_backend(KeyAlgorithm::EcdsaP256, true, Some(hw));
        assert_eq!(selected.backend(), BackendKind::Hardware);
    }

    #[test]
    fn test_falls_back_on_algorithm_mismatch_or_absence() {
        let hw: Arc<dyn SigningPrimitive> = Arc::new(FakeHardware(KeyAlgorithm::Ed25519));
        let selected = select_backend(KeyAlgorithm::EcdsaP256, true, Some(hw));
        assert_eq!(selected.backend(), BackendKind::Software);
        assert_eq!(selected.algorithm(), KeyAlgorithm::EcdsaP256);

        let selected = select_backend(KeyAlgorithm::Ed25519, true, None);
        assert_eq!(selected.backend(), BackendKind::Software);
    }
}
