//! Biometric gate: capability query and single-resolution ceremonies.
//!
//! A gate owns the platform handle and a weak reference to the caller's
//! interactive context. Each ceremony is dispatched onto the UI thread through
//! that context and resolved on the awaiting task through a oneshot latch.
//! Only one ceremony runs per gate at a time.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use biokey_core::CeremonyConfig;
use tracing::{debug, info, warn};

use crate::outcome::{AuthStatus, AuthenticationOutcome};
use crate::platform::{
    BiometricPlatform, Capability, CeremonySink, InteractiveContext, PlatformEvent, PromptInfo,
};

/// Proof of a successful ceremony, required to read biometric-gated records.
///
/// Only a [`BiometricGate`] can mint one. It expires after the configured
/// validity window.
#[derive(Debug, Clone)]
pub struct BiometricAuthorization {
    ceremony_id: u64,
    issued_at: Instant,
    valid_for: Duration,
}

impl BiometricAuthorization {
    pub(crate) fn issue(ceremony_id: u64, valid_for: Duration) -> Self {
        Self {
            ceremony_id,
            issued_at: Instant::now(),
            valid_for,
        }
    }

    pub fn ceremony_id(&self) -> u64 {
        self.ceremony_id
    }

    pub fn is_valid(&self) -> bool {
        self.issued_at.elapsed() < self.valid_for
    }
}

/// Outcome of a ceremony plus the authorization a success grants.
#[derive(Debug, Clone)]
pub struct CeremonyResult {
    pub outcome: AuthenticationOutcome,
    pub authorization: Option<BiometricAuthorization>,
}

impl CeremonyResult {
    fn resolved(outcome: AuthenticationOutcome) -> Self {
        Self {
            outcome,
            authorization: None,
        }
    }
}

/// Clears the in-flight flag when the ceremony future completes or is dropped.
///
/// If the caller drops the future before the ceremony resolved, the prompt
/// still on screen is dismissed before the gate accepts another ceremony.
struct InFlight<'a> {
    flag: &'a AtomicBool,
    platform: &'a dyn BiometricPlatform,
    ceremony_id: u64,
    resolved: bool,
}

impl<'a> InFlight<'a> {
    fn new(flag: &'a AtomicBool, platform: &'a dyn BiometricPlatform) -> Self {
        Self {
            flag,
            platform,
            ceremony_id: 0,
            resolved: false,
        }
    }

    fn settle(&mut self) {
        self.resolved = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            warn!(
                ceremony_id = self.ceremony_id,
                "Ceremony abandoned by caller; dismissing prompt"
            );
            self.platform.cancel();
        }
        self.flag.store(false, Ordering::Release);
    }
}

pub struct BiometricGate {
    platform: Arc<dyn BiometricPlatform>,
    context: Weak<dyn InteractiveContext>,
    title: String,
    negative_button_text: String,
    ceremony_timeout: Option<Duration>,
    authorization_validity: Duration,
    in_flight: AtomicBool,
    next_ceremony: AtomicU64,
}

impl BiometricGate {
    /// Gate with default prompt text and no timeout.
    pub fn new<C: InteractiveContext + 'static>(
        platform: Arc<dyn BiometricPlatform>,
        context: &Arc<C>,
    ) -> Self {
        Self::from_config(platform, context, &CeremonyConfig::default())
    }

    /// Gate configured from the `[ceremony]` section.
    ///
    /// The gate holds `context` weakly; once the caller drops it, ceremonies
    /// resolve with `ERROR` instead of presenting.
    pub fn from_config<C: InteractiveContext + 'static>(
        platform: Arc<dyn BiometricPlatform>,
        context: &Arc<C>,
        config: &CeremonyConfig,
    ) -> Self {
        let context: Weak<C> = Arc::downgrade(context);
        let context: Weak<dyn InteractiveContext> = context;
        Self {
            platform,
            context,
            title: config.title.clone(),
            negative_button_text: config.negative_button_text.clone(),
            ceremony_timeout: config.ceremony_timeout_secs.map(Duration::from_secs),
            authorization_validity: Duration::from_secs(config.authorization_validity_secs),
            in_flight: AtomicBool::new(false),
            next_ceremony: AtomicU64::new(1),
        }
    }

    /// Override the caller-side ceremony timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.ceremony_timeout = timeout;
        self
    }

    /// Override how long a successful ceremony unlocks gated records.
    pub fn with_authorization_validity(mut self, validity: Duration) -> Self {
        self.authorization_validity = validity;
        self
    }

    pub fn capability(&self) -> Capability {
        self.platform.capability()
    }

    /// Enrolled biometric and working hardware. Never presents UI.
    pub fn is_available(&self) -> bool {
        self.capability().is_available()
    }

    /// Whether a ceremony is currently in flight on this gate.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one ceremony and return its classified outcome.
    pub async fn authenticate(&self, reason: &str) -> AuthenticationOutcome {
        self.run_ceremony(reason).await.outcome
    }

    /// Run one ceremony; a success also yields a [`BiometricAuthorization`].
    pub async fn run_ceremony(&self, reason: &str) -> CeremonyResult {
        let capability = self.capability();
        if !capability.is_available() {
            info!(?capability, "Biometrics unavailable; ceremony not presented");
            return CeremonyResult::resolved(AuthenticationOutcome::disabled(capability.reason()));
        }

        let context = match self.context.upgrade() {
            Some(context) if context.is_foreground() => context,
            _ => {
                warn!("No foreground interactive context; ceremony not presented");
                return CeremonyResult::resolved(AuthenticationOutcome::error(
                    "No foreground interactive context is available to present the biometric prompt",
                ));
            }
        };

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Rejected concurrent ceremony request");
            return CeremonyResult::resolved(AuthenticationOutcome::error(
                "A biometric ceremony is already in progress",
            ));
        }
        let mut in_flight = InFlight::new(&self.in_flight, self.platform.as_ref());

        let ceremony_id = self.next_ceremony.fetch_add(1, Ordering::Relaxed);
        in_flight.ceremony_id = ceremony_id;
        let (sink, receiver) = CeremonySink::new(ceremony_id);
        let prompt = PromptInfo {
            title: self.title.clone(),
            subtitle: reason.to_string(),
            negative_button_text: self.negative_button_text.clone(),
        };

        let platform = Arc::clone(&self.platform);
        context.run_on_ui_thread(Box::new(move || platform.present(prompt, sink)));
        // Do not keep the caller's context alive while waiting on the user.
        drop(context);
        debug!(ceremony_id, "Ceremony presented");

        let received = match self.ceremony_timeout {
            Some(limit) => match tokio::time::timeout(limit, receiver).await {
                Ok(received) => received,
                Err(_) => {
                    warn!(ceremony_id, timeout = ?limit, "Ceremony timed out");
                    self.platform.cancel();
                    in_flight.settle();
                    return CeremonyResult::resolved(AuthenticationOutcome::error(format!(
                        "Biometric ceremony timed out after {limit:?}"
                    )));
                }
            },
            None => receiver.await,
        };
        in_flight.settle();

        let result = match received {
            Ok(PlatformEvent::Succeeded) => CeremonyResult {
                outcome: AuthenticationOutcome::success(),
                authorization: Some(BiometricAuthorization::issue(
                    ceremony_id,
                    self.authorization_validity,
                )),
            },
            Ok(PlatformEvent::Failed { code, message }) => {
                let status = code.classify();
                let message = message.unwrap_or_else(|| default_message(status).to_string());
                CeremonyResult::resolved(AuthenticationOutcome::new(status, Some(message)))
            }
            Err(_) => CeremonyResult::resolved(AuthenticationOutcome::error(
                "Biometric ceremony ended without a result",
            )),
        };

        info!(
            ceremony_id,
            status = %result.outcome.status(),
            "Biometric ceremony resolved"
        );
        result
    }
}

fn default_message(status: AuthStatus) -> &'static str {
    match status {
        AuthStatus::Success => "Authenticated",
        AuthStatus::FailedAttempt => "Biometric not recognized",
        AuthStatus::Cancelled => "Authentication cancelled",
        AuthStatus::Fallback => "User selected an alternate credential",
        AuthStatus::Lockout => "Too many failed attempts",
        AuthStatus::Disabled => "Biometrics not available",
        AuthStatus::Error => "Authentication failed",
    }
}

impl std::fmt::Debug for BiometricGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiometricGate")
            .field("title", &self.title)
            .field("ceremony_timeout", &self.ceremony_timeout)
            .field("authorization_validity", &self.authorization_validity)
            .field("busy", &self.is_busy())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformErrorCode;
    use crate::simulated::{HeadlessContext, SimulatedPlatform};

    fn gate_with(platform: &Arc<SimulatedPlatform>, context: &Arc<HeadlessContext>) -> BiometricGate {
        BiometricGate::new(platform.clone(), context)
    }

    #[tokio::test]
    async fn test_success_issues_authorization() {
        let platform = Arc::new(SimulatedPlatform::available());
        platform.push_ceremony(vec![PlatformEvent::Succeeded]);
        let context = Arc::new(HeadlessContext::new());
        let gate = gate_with(&platform, &context);

        let result = gate.run_ceremony("Sign in").await;
        assert_eq!(result.outcome.status(), AuthStatus::Success);
        let authorization = result.authorization.unwrap();
        assert!(authorization.is_valid());
        assert!(!gate.is_busy());
        assert_eq!(platform.last_prompt().unwrap().subtitle, "Sign in");
    }

    #[tokio::test]
    async fn test_late_cancel_after_success_is_discarded() {
        let platform = Arc::new(SimulatedPlatform::available());
        platform.push_ceremony(vec![
            PlatformEvent::Succeeded,
            PlatformEvent::failed(PlatformErrorCode::UserCanceled, "late"),
        ]);
        let context = Arc::new(HeadlessContext::new());
        let gate = gate_with(&platform, &context);

        let outcome = gate.authenticate("Sign in").await;
        assert_eq!(outcome, AuthenticationOutcome::success());
    }

    #[tokio::test]
    async fn test_unavailable_device_short_circuits() {
        let platform = Arc::new(SimulatedPlatform::new(Capability::NoneEnrolled));
        let context = Arc::new(HeadlessContext::new());
        let gate = gate_with(&platform, &context);

        let outcome = gate.authenticate("Sign in").await;
        assert_eq!(outcome.status(), AuthStatus::Disabled);
        assert_eq!(platform.presented(), 0);
    }

    #[tokio::test]
    async fn test_missing_context_is_error() {
        let platform = Arc::new(SimulatedPlatform::available());
        let context = Arc::new(HeadlessContext::new());
        let gate = gate_with(&platform, &context);
        drop(context);

        let outcome = gate.authenticate("Sign in").await;
        assert_eq!(outcome.status(), AuthStatus::Error);
        assert!(outcome.message().unwrap().contains("interactive context"));
        assert_eq!(platform.presented(), 0);
    }

    #[tokio::test]
    async fn test_background_context_is_error() {
        let platform = Arc::new(SimulatedPlatform::available());
        let context = Arc::new(HeadlessContext::new());
        context.set_foreground(false);
        let gate = gate_with(&platform, &context);

        let outcome = gate.authenticate("Sign in").await;
        assert_eq!(outcome.status(), AuthStatus::Error);
        assert_eq!(platform.presented(), 0);
    }

    #[tokio::test]
    async fn test_platform_error_is_classified_with_default_message() {
        let platform = Arc::new(SimulatedPlatform::available());
        platform.push_ceremony(vec![PlatformEvent::Failed {
            code: PlatformErrorCode::LockoutPermanent,
            message: None,
        }]);
        let context = Arc::new(HeadlessContext::new());
        let gate = gate_with(&platform, &context);

        let result = gate.run_ceremony("Sign in").await;
        assert_eq!(result.outcome.status(), AuthStatus::Lockout);
        assert_eq!(result.outcome.message(), Some("Too many failed attempts"));
        assert!(result.authorization.is_none());
    }

    #[tokio::test]
    async fn test_dropped_sink_resolves_error() {
        let platform = Arc::new(SimulatedPlatform::available());
        platform.push_ceremony(Vec::new());
        let context = Arc::new(HeadlessContext::new());
        let gate = gate_with(&platform, &context);

        let outcome = gate.authenticate("Sign in").await;
        assert_eq!(outcome.status(), AuthStatus::Error);
        assert!(!gate.is_busy());
    }

    #[tokio::test]
    async fn test_timeout_cancels_platform_prompt() {
        let platform = Arc::new(SimulatedPlatform::available());
        let context = Arc::new(HeadlessContext::new());
        let gate = gate_with(&platform, &context).with_timeout(Some(Duration::from_millis(50)));

        let outcome = gate.authenticate("Sign in").await;
        assert_eq!(outcome.status(), AuthStatus::Error);
        assert!(outcome.message().unwrap().contains("timed out"));
        assert_eq!(platform.cancelled(), 1);
        assert!(!gate.is_busy());
    }

    #[tokio::test]
    async fn test_concurrent_ceremony_rejected_without_disturbing_first() {
        let platform = Arc::new(SimulatedPlatform::available());
        let context = Arc::new(HeadlessContext::new());
        let gate = Arc::new(gate_with(&platform, &context));

        let first = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.authenticate("first").await })
        };
        while platform.presented() == 0 {
            tokio::task::yield_now().await;
        }

        let second = gate.authenticate("second").await;
        assert_eq!(second.status(), AuthStatus::Error);
        assert!(second.message().unwrap().contains("already in progress"));

        assert!(platform.resolve_pending(PlatformEvent::Succeeded));
        let first = first.await.unwrap();
        assert_eq!(first.status(), AuthStatus::Success);
        assert_eq!(platform.presented(), 1);
    }

    #[tokio::test]
    async fn test_dropped_caller_future_dismisses_prompt() {
        let platform = Arc::new(SimulatedPlatform::available());
        let context = Arc::new(HeadlessContext::new());
        let gate = gate_with(&platform, &context);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), gate.authenticate("first")).await;
        assert!(abandoned.is_err());
        assert_eq!(platform.cancelled(), 1);
        assert!(!gate.is_busy());

        platform.push_success();
        let second = gate.authenticate("second").await;
        assert_eq!(second.status(), AuthStatus::Success);
        assert_eq!(platform.presented(), 2);
        assert_eq!(platform.cancelled(), 1);
    }

    #[test]
    fn test_authorization_expires() {
        let authorization = BiometricAuthorization::issue(1, Duration::ZERO);
        assert!(!authorization.is_valid());
        assert_eq!(authorization.ceremony_id(), 1);
    }
}
