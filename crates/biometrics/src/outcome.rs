//! Classified results of biometric ceremonies and challenge signing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal status of one ceremony.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthStatus {
    Success,
    FailedAttempt,
    Cancelled,
    Fallback,
    Lockout,
    Disabled,
    Error,
}

impl AuthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStatus::Success => "SUCCESS",
            AuthStatus::FailedAttempt => "FAILED_ATTEMPT",
            AuthStatus::Cancelled => "CANCELLED",
            AuthStatus::Fallback => "FALLBACK",
            AuthStatus::Lockout => "LOCKOUT",
            AuthStatus::Disabled => "DISABLED",
            AuthStatus::Error => "ERROR",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AuthStatus::Success)
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single ceremony. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationOutcome {
    status: AuthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl AuthenticationOutcome {
    pub fn new(status: AuthStatus, message: Option<String>) -> Self {
        Self { status, message }
    }

    pub fn success() -> Self {
        Self::new(AuthStatus::Success, None)
    }

    pub fn disabled(message: impl Into<String>) -> Self {
        Self::new(AuthStatus::Disabled, Some(message.into()))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(AuthStatus::Error, Some(message.into()))
    }

    pub fn status(&self) -> AuthStatus {
        self.status
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Outcome of an authenticate-with-challenge call.
///
/// `biometric_verified` records whether the ceremony itself succeeded, so a
/// signing failure after a good scan (`status == Error`,
/// `biometric_verified == true`) is distinguishable from a failed scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeOutcome {
    status: AuthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    /// Base64 signature over the decoded challenge; present only on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
    #[serde(default)]
    biometric_verified: bool,
}

impl ChallengeOutcome {
    /// Ceremony and signing both succeeded.
    pub fn signed(signature: String) -> Self {
        Self {
            status: AuthStatus::Success,
            message: None,
            signature: Some(signature),
            biometric_verified: true,
        }
    }

    /// The ceremony did not succeed; nothing was signed.
    pub fn unverified(outcome: AuthenticationOutcome) -> Self {
        Self {
            status: outcome.status,
            message: outcome.message,
            signature: None,
            biometric_verified: false,
        }
    }

    /// The ceremony succeeded but no signature could be produced.
    pub fn signing_failed(reason: impl fmt::Display) -> Self {
        Self {
            status: AuthStatus::Error,
            message: Some(format!(
                "Biometric authentication succeeded, but signing the challenge failed: {reason}"
            )),
            signature: None,
            biometric_verified: true,
        }
    }

    pub fn status(&self) -> AuthStatus {
        self.status
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn biometric_verified(&self) -> bool {
        self.biometric_verified
    }
}
