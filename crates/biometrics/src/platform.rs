//! Seams to the OS biometric prompt and the UI-owning execution context.
//!
//! The embedder implements [`BiometricPlatform`] over the native prompt API
//! (BiometricPrompt, LocalAuthentication) and [`InteractiveContext`] over
//! whatever owns the UI thread. Platform callbacks report back through a
//! [`CeremonySink`], which latches the first terminal event and discards the
//! rest.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::debug;

use crate::outcome::AuthStatus;

/// Work scheduled onto the UI-owning thread.
pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Device biometric capability, queried without presenting any UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Hardware present and at least one biometric enrolled.
    Available,
    /// Hardware present, nothing enrolled.
    NoneEnrolled,
    /// Hardware present but currently unusable.
    HardwareUnavailable,
    /// No biometric hardware.
    NoHardware,
    /// The device has no passcode or alternate credential configured.
    NoDeviceCredential,
    /// The platform could not determine capability.
    Unknown,
}

impl Capability {
    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available)
    }

    /// Human-readable reason for an unavailable capability.
    pub fn reason(&self) -> &'static str {
        match self {
            Capability::Available => "Biometric authentication is available",
            Capability::NoneEnrolled => "No biometrics are enrolled on this device",
            Capability::HardwareUnavailable => "Biometric hardware is currently unavailable",
            Capability::NoHardware => "This device has no biometric hardware",
            Capability::NoDeviceCredential => "No device credential is configured",
            Capability::Unknown => "Biometrics not available",
        }
    }
}

/// Error classes reported by a platform prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformErrorCode {
    NegativeButton,
    UserCanceled,
    SystemCanceled,
    Lockout,
    LockoutPermanent,
    NoBiometrics,
    HardwareUnavailable,
    HardwareNotPresent,
    NoDeviceCredential,
    /// A biometric sample was read and did not match.
    SampleMismatch,
    UserFallback,
    Timeout,
    /// Any code the mapping does not recognise.
    Other(i32),
}

impl PlatformErrorCode {
    /// Map an Android `BiometricPrompt.ERROR_*` code.
    pub fn from_android_code(code: i32) -> Self {
        match code {
            1 => PlatformErrorCode::HardwareUnavailable,
            3 => PlatformErrorCode::Timeout,
            5 => PlatformErrorCode::SystemCanceled,
            7 => PlatformErrorCode::Lockout,
            9 => PlatformErrorCode::LockoutPermanent,
            10 => PlatformErrorCode::UserCanceled,
            11 => PlatformErrorCode::NoBiometrics,
            12 => PlatformErrorCode::HardwareNotPresent,
            13 => PlatformErrorCode::NegativeButton,
            14 => PlatformErrorCode::NoDeviceCredential,
            other => PlatformErrorCode::Other(other),
        }
    }

    /// Map an iOS `LAError.Code` raw value.
    pub fn from_la_error_code(code: i32) -> Self {
        match code {
            -1 => PlatformErrorCode::SampleMismatch,
            -2 => PlatformErrorCode::UserCanceled,
            -3 => PlatformErrorCode::UserFallback,
            -4 => PlatformErrorCode::SystemCanceled,
            -5 => PlatformErrorCode::NoDeviceCredential,
            -6 => PlatformErrorCode::HardwareUnavailable,
            -7 => PlatformErrorCode::NoBiometrics,
            -8 => PlatformErrorCode::Lockout,
            other => PlatformErrorCode::Other(other),
        }
    }

    /// Status this error resolves a ceremony with.
    pub fn classify(&self) -> AuthStatus {
        match self {
            PlatformErrorCode::NegativeButton
            | PlatformErrorCode::UserCanceled
            | PlatformErrorCode::SystemCanceled => AuthStatus::Cancelled,
            PlatformErrorCode::Lockout | PlatformErrorCode::LockoutPermanent => AuthStatus::Lockout,
            PlatformErrorCode::NoBiometrics
            | PlatformErrorCode::HardwareUnavailable
            | PlatformErrorCode::HardwareNotPresent
            | PlatformErrorCode::NoDeviceCredential => AuthStatus::Disabled,
            PlatformErrorCode::SampleMismatch => AuthStatus::FailedAttempt,
            PlatformErrorCode::UserFallback => AuthStatus::Fallback,
            PlatformErrorCode::Timeout | PlatformErrorCode::Other(_) => AuthStatus::Error,
        }
    }
}

/// Terminal event raised by the platform prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    Succeeded,
    Failed {
        code: PlatformErrorCode,
        message: Option<String>,
    },
}

impl PlatformEvent {
    pub fn failed(code: PlatformErrorCode, message: impl Into<String>) -> Self {
        PlatformEvent::Failed {
            code,
            message: Some(message.into()),
        }
    }
}

/// Text presented by the OS prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptInfo {
    pub title: String,
    /// The caller's reason for authenticating.
    pub subtitle: String,
    pub negative_button_text: String,
}

/// Result-carrying handle handed to the platform for one ceremony.
///
/// Cloneable so every platform callback can hold one. The first
/// [`CeremonySink::deliver`] wins; later calls are discarded. If the awaiting
/// caller has gone away, delivery is a no-op.
#[derive(Clone)]
pub struct CeremonySink {
    ceremony_id: u64,
    slot: Arc<Mutex<Option<oneshot::Sender<PlatformEvent>>>>,
}

impl CeremonySink {
    pub(crate) fn new(ceremony_id: u64) -> (Self, oneshot::Receiver<PlatformEvent>) {
        let (tx, rx) = oneshot::channel();
        let sink = Self {
            ceremony_id,
            slot: Arc::new(Mutex::new(Some(tx))),
        };
        (sink, rx)
    }

    /// Report a terminal event. Returns `true` if this call resolved the ceremony.
    pub fn deliver(&self, event: PlatformEvent) -> bool {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match sender {
            Some(tx) => {
                if tx.send(event).is_err() {
                    debug!(
                        ceremony_id = self.ceremony_id,
                        "Ceremony caller detached before resolution"
                    );
                }
                true
            }
            None => {
                debug!(
                    ceremony_id = self.ceremony_id,
                    ?event,
                    "Discarding platform event for resolved ceremony"
                );
                false
            }
        }
    }

    /// Whether a terminal event has already been latched.
    pub fn is_resolved(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    pub fn ceremony_id(&self) -> u64 {
        self.ceremony_id
    }
}

impl std::fmt::Debug for CeremonySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CeremonySink")
            .field("ceremony_id", &self.ceremony_id)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Native biometric prompt.
pub trait BiometricPlatform: Send + Sync {
    /// Capability query. Must not present UI.
    fn capability(&self) -> Capability;

    /// Present the prompt. Called on the UI-owning thread. The platform must
    /// eventually deliver a terminal event to `sink`, or drop it.
    fn present(&self, prompt: PromptInfo, sink: CeremonySink);

    /// Dismiss the prompt currently on screen, if any.
    fn cancel(&self) {}
}

/// The caller's UI-owning execution context (activity, window scene).
pub trait InteractiveContext: Send + Sync {
    /// Whether the context is in the foreground and may present a prompt.
    fn is_foreground(&self) -> bool {
        true
    }

    /// Schedule `task` on the UI-owning thread.
    fn run_on_ui_thread(&self, task: UiTask);
}
