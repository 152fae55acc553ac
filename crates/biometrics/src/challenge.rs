//! Challenge signing behind a biometric ceremony.
//!
//! The private key is read from the store only with the authorization a
//! successful ceremony grants, so no code path signs without a fresh scan.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use biokey_crypto::SigningPrimitive;
use tracing::{debug, info, warn};

use crate::error::{BiometricsError, BiometricsResult};
use crate::gate::{BiometricAuthorization, BiometricGate};
use crate::keypair::PRIVATE_KEY_RECORD;
use crate::outcome::{AuthenticationOutcome, ChallengeOutcome};
use crate::store::SecureKeyStore;

/// A signature together with the decoded challenge it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeSignature {
    pub challenge: Vec<u8>,
    pub signature: Vec<u8>,
}

impl ChallengeSignature {
    /// Base64 (standard alphabet, padded) transport form of the signature.
    pub fn encoded(&self) -> String {
        STANDARD.encode(&self.signature)
    }
}

/// Decode a base64 challenge. Empty challenges are rejected.
pub fn decode_challenge(challenge_b64: &str) -> BiometricsResult<Vec<u8>> {
    let challenge = STANDARD
        .decode(challenge_b64.trim())
        .map_err(|e| BiometricsError::ChallengeDecode(e.to_string()))?;
    if challenge.is_empty() {
        return Err(BiometricsError::ChallengeDecode(
            "challenge is empty".to_string(),
        ));
    }
    Ok(challenge)
}

pub struct ChallengeSigner {
    gate: Arc<BiometricGate>,
    store: Arc<dyn SecureKeyStore>,
    primitive: Arc<dyn SigningPrimitive>,
}

impl ChallengeSigner {
    pub fn new(
        gate: Arc<BiometricGate>,
        store: Arc<dyn SecureKeyStore>,
        primitive: Arc<dyn SigningPrimitive>,
    ) -> Self {
        Self {
            gate,
            store,
            primitive,
        }
    }

    /// Run a ceremony and, on success, sign the decoded challenge.
    pub async fn authenticate_with_challenge(
        &self,
        reason: &str,
        challenge_b64: &str,
    ) -> ChallengeOutcome {
        let capability = self.gate.capability();
        if !capability.is_available() {
            info!(?capability, "Challenge refused; biometrics unavailable");
            return ChallengeOutcome::unverified(AuthenticationOutcome::disabled(
                capability.reason(),
            ));
        }

        let ceremony = self.gate.run_ceremony(reason).await;
        let authorization = match (ceremony.outcome.is_success(), ceremony.authorization) {
            (true, Some(authorization)) => authorization,
            _ => {
                debug!(status = %ceremony.outcome.status(), "Challenge not signed");
                return ChallengeOutcome::unverified(ceremony.outcome);
            }
        };

        match self.sign(challenge_b64, &authorization) {
            Ok(signed) => {
                info!(
                    ceremony_id = authorization.ceremony_id(),
                    challenge_len = signed.challenge.len(),
                    "Challenge signed"
                );
                ChallengeOutcome::signed(signed.encoded())
            }
            Err(e) => {
                warn!(error = %e, "Challenge signing failed after successful ceremony");
                ChallengeOutcome::signing_failed(e)
            }
        }
    }

    fn sign(
        &self,
        challenge_b64: &str,
        authorization: &BiometricAuthorization,
    ) -> BiometricsResult<ChallengeSignature> {
        let challenge = decode_challenge(challenge_b64)?;
        let private_key = self
            .store
            .load_authorized(PRIVATE_KEY_RECORD, authorization)
            .ok_or_else(|| BiometricsError::KeyNotFound {
                name: PRIVATE_KEY_RECORD.to_string(),
            })?;
        let signature = self.primitive.sign(&challenge, &private_key)?;
        Ok(ChallengeSignature {
            challenge,
            signature,
        })
    }
}

/// Relying-party check: does `signature_b64` cover `challenge_b64` under
/// `public_key_pem`? Any decoding or key error verifies as `false`.
pub fn verify_challenge(
    primitive: &dyn SigningPrimitive,
    public_key_pem: &str,
    challenge_b64: &str,
    signature_b64: &str,
) -> bool {
    let challenge = match decode_challenge(challenge_b64) {
        Ok(challenge) => challenge,
        Err(e) => {
            debug!(error = %e, "Verification rejected challenge");
            return false;
        }
    };
    let signature = match STANDARD.decode(signature_b64.trim()) {
        Ok(signature) => signature,
        Err(e) => {
            debug!(error = %e, "Verification rejected signature encoding");
            return false;
        }
    };
    match primitive.verify(&challenge, &signature, public_key_pem.as_bytes()) {
        Ok(valid) => valid,
        Err(e) => {
            warn!(error = %e, "Verification rejected public key");
            false
        }
    }
}
