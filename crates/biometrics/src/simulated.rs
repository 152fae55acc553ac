//! Scripted platform and headless context.
//!
//! Stand-ins for the OS prompt and the UI thread, for tests and for hosts
//! with no biometric hardware. Each presented ceremony consumes the next
//! scripted batch of events; with no script left the prompt stays "on
//! screen" until [`SimulatedPlatform::resolve_pending`] or
//! [`BiometricPlatform::cancel`] is called.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::platform::{
    BiometricPlatform, Capability, CeremonySink, InteractiveContext, PlatformErrorCode,
    PlatformEvent, PromptInfo, UiTask,
};

#[derive(Debug)]
pub struct SimulatedPlatform {
    capability: Mutex<Capability>,
    script: Mutex<VecDeque<Vec<PlatformEvent>>>,
    pending: Mutex<Option<CeremonySink>>,
    last_prompt: Mutex<Option<PromptInfo>>,
    presented: AtomicUsize,
    cancelled: AtomicUsize,
}

impl SimulatedPlatform {
    pub fn new(capability: Capability) -> Self {
        Self {
            capability: Mutex::new(capability),
            script: Mutex::new(VecDeque::new()),
            pending: Mutex::new(None),
            last_prompt: Mutex::new(None),
            presented: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
        }
    }

    /// Hardware present with a biometric enrolled.
    pub fn available() -> Self {
        Self::new(Capability::Available)
    }

    pub fn set_capability(&self, capability: Capability) {
        *self.capability.lock().unwrap_or_else(PoisonError::into_inner) = capability;
    }

    /// Queue the events the next presented ceremony fires, in order.
    ///
    /// An empty batch makes the platform drop the ceremony without a result.
    pub fn push_ceremony(&self, events: Vec<PlatformEvent>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(events);
    }

    /// Queue a ceremony that succeeds.
    pub fn push_success(&self) {
        self.push_ceremony(vec![PlatformEvent::Succeeded]);
    }

    /// Resolve the ceremony left on screen. Returns `false` if none was pending
    /// or it had already resolved.
    pub fn resolve_pending(&self, event: PlatformEvent) -> bool {
        let sink = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sink {
            Some(sink) => sink.deliver(event),
            None => false,
        }
    }

    /// Number of ceremonies presented so far.
    pub fn presented(&self) -> usize {
        self.presented.load(Ordering::SeqCst)
    }

    /// Number of cancel requests received.
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<PromptInfo> {
        self.last_prompt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl BiometricPlatform for SimulatedPlatform {
    fn capability(&self) -> Capability {
        *self.capability.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn present(&self, prompt: PromptInfo, sink: CeremonySink) {
        self.presented.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap_or_else(PoisonError::into_inner) = Some(prompt);

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match scripted {
            // Platform callbacks arrive off the UI thread.
            Some(events) => {
                std::thread::spawn(move || {
                    for event in events {
                        sink.deliver(event);
                    }
                });
            }
            None => {
                debug!(ceremony_id = sink.ceremony_id(), "Prompt left pending");
                *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
            }
        }
    }

    fn cancel(&self) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
        self.resolve_pending(PlatformEvent::failed(
            PlatformErrorCode::SystemCanceled,
            "Prompt dismissed by the application",
        ));
    }
}

/// Interactive context without a real UI thread; tasks run inline.
#[derive(Debug)]
pub struct HeadlessContext {
    foreground: AtomicBool,
    dispatched: AtomicUsize,
}

impl HeadlessContext {
    pub fn new() -> Self {
        Self {
            foreground: AtomicBool::new(true),
            dispatched: AtomicUsize::new(0),
        }
    }

    pub fn set_foreground(&self, foreground: bool) {
        self.foreground.store(foreground, Ordering::SeqCst);
    }

    /// Number of tasks run on the "UI thread".
    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::SeqCst)
    }
}

impl Default for HeadlessContext {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractiveContext for HeadlessContext {
    fn is_foreground(&self) -> bool {
        self.foreground.load(Ordering::SeqCst)
    }

    fn run_on_ui_thread(&self, task: UiTask) {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        task();
    }
}
