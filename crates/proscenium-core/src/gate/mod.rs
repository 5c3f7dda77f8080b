//! Completion gate: a single-slot async rendezvous.
//!
//! One party opens a session with [`CompletionGate::begin`]; any number of
//! parties await the outcome; exactly one resolution (complete, skip, or
//! timeout) fulfils the slot. The gate models an external, possibly manual
//! confirmation step ("press confirm to start") in front of gameplay, with
//! a timeout valve so an absent confirmer can never wedge a transition.
//!
//! The gate is deliberately forgiving under misuse: beginning over an
//! active session logs a recovery warning and supersedes it, and late or
//! duplicate resolutions are logged and ignored. The system must stay
//! available even when callers misbehave.


use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::transition::{CompletionHook, HookError, TransitionContext};

/// Reason recorded when an active session is replaced by a new `begin`.
pub const SUPERSEDED_REASON: &str = "superseded";
/// Reason recorded locally when a waiter cancels.
pub const CANCELLED_REASON: &str = "cancelled";
/// Reason recorded when the timeout valve fires.
pub const TIMEOUT_REASON: &str = "timeout";
/// Reason returned when waiting without an open session.
pub const NO_SESSION_REASON: &str = "no-active-session";

/// The resolved outcome of a gate session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateOutcome {
    /// Free-text reason supplied by the resolving party.
    pub reason: String,
    /// True when the session was skipped rather than completed.
    pub skipped: bool,
}

impl GateOutcome {
    /// Outcome for a completed session.
    #[must_use]
    pub fn completed(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            skipped: false,
        }
    }

    /// Outcome for a skipped session.
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            skipped: true,
        }
    }
}

/// Identifying context for a gate session, used for log correlation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateContext {
    /// Human-readable label of the blocking step ("intro", "tutorial").
    pub label: String,
    /// Correlation id of the surrounding workflow (transition signature,
    /// run id), if any.
    pub correlation: Option<String>,
}

impl GateContext {
    /// Creates a context with just a label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            correlation: None,
        }
    }

    /// Attaches a correlation id.
    #[must_use]
    pub fn with_correlation(mut self, correlation: impl Into<String>) -> Self {
        self.correlation = Some(correlation.into());
        self
    }
}

#[derive(Debug)]
struct GateSession {
    context: GateContext,
    slot: watch::Sender<Option<GateOutcome>>,
}

/// Single-session async rendezvous.
///
/// All methods take `&self`; the gate is shared behind an `Arc` between
/// the party that opens sessions and the parties that resolve them.
#[derive(Debug, Default)]
pub struct CompletionGate {
    active: Mutex<Option<GateSession>>,
}

impl CompletionGate {
    /// Creates a gate with no active session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether a session is currently open.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.lock().expect("gate lock poisoned").is_some()
    }

    /// Opens a session.
    ///
    /// If a session is already open this logs a recovery warning and
    /// supersedes it: the old slot is resolved with
    /// `{reason: "superseded", skipped: true}` so its awaiters resolve
    /// rather than hang against an orphaned slot.
    pub fn begin(&self, context: GateContext) {
        let (slot, _rx) = watch::channel(None);
        let session = GateSession { context, slot };
        let replaced = self
            .active
            .lock()
            .expect("gate lock poisoned")
            .replace(session);
        if let Some(old) = replaced {
            warn!(
                label = %old.context.label,
                correlation = ?old.context.correlation,
                "completion gate session already active; superseding"
            );
            let _ = old.slot.send(Some(GateOutcome::skipped(SUPERSEDED_REASON)));
        }
    }

    /// Awaits the outcome of the current session.
    ///
    /// Returns immediately with a skipped `"no-active-session"` outcome if
    /// no session is open.
    pub async fn wait(&self) -> GateOutcome {
        let rx = self
            .active
            .lock()
            .expect("gate lock poisoned")
            .as_ref()
            .map(|session| session.slot.subscribe());
        let Some(mut rx) = rx else {
            warn!("completion gate awaited without an active session");
            return GateOutcome::skipped(NO_SESSION_REASON);
        };
        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                // Sender dropped. Resolution is always sent before the
                // session is released, so a final value is present unless
                // the gate itself was dropped mid-wait.
                return rx
                    .borrow()
                    .clone()
                    .unwrap_or_else(|| GateOutcome::skipped(CANCELLED_REASON));
            }
        }
    }

    /// Awaits the outcome, resolving locally to a skipped `"cancelled"`
    /// outcome when `cancel` completes first. Other awaiters are not
    /// disturbed and the session stays open.
    pub async fn wait_cancellable<F>(&self, cancel: F) -> GateOutcome
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            outcome = self.wait() => outcome,
            () = cancel => {
                debug!("completion gate wait cancelled locally");
                GateOutcome::skipped(CANCELLED_REASON)
            }
        }
    }

    /// Awaits the outcome with a timeout valve: if no resolution arrives
    /// within `window`, the session is skipped with reason `"timeout"`
    /// (resolving every awaiter, not just this one).
    pub async fn wait_with_timeout(&self, window: Duration) -> GateOutcome {
        match tokio::time::timeout(window, self.wait()).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => {
                warn!(window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX), "completion gate wait timed out");
                self.skip(TIMEOUT_REASON);
                GateOutcome::skipped(TIMEOUT_REASON)
            }
        }
    }

    /// Completes the current session. Returns whether a session was
    /// actually active; a late or duplicate call is logged and ignored.
    pub fn complete(&self, reason: impl Into<String>) -> bool {
        self.resolve(GateOutcome::completed(reason))
    }

    /// Skips the current session. Returns whether a session was actually
    /// active; a late or duplicate call is logged and ignored.
    pub fn skip(&self, reason: impl Into<String>) -> bool {
        self.resolve(GateOutcome::skipped(reason))
    }

    fn resolve(&self, outcome: GateOutcome) -> bool {
        let session = self.active.lock().expect("gate lock poisoned").take();
        match session {
            Some(session) => {
                debug!(
                    label = %session.context.label,
                    reason = %outcome.reason,
                    skipped = outcome.skipped,
                    "completion gate resolved"
                );
                let _ = session.slot.send(Some(outcome));
                true
            }
            None => {
                debug!(
                    reason = %outcome.reason,
                    "completion gate resolution with no active session; ignored"
                );
                false
            }
        }
    }
}

/// [`CompletionHook`] adapter that holds a transition open behind the gate.
///
/// On the pipeline's external-completion step this opens a gate session
/// correlated to the transition signature and waits for it, bounded by the
/// configured timeout window. This is the plug point for intro/confirmation
/// steps in front of gameplay.
#[derive(Debug)]
pub struct GateCompletionHook {
    gate: Arc<CompletionGate>,
    label: String,
    timeout: Option<Duration>,
}

impl GateCompletionHook {
    /// Creates a hook that waits on `gate` without a timeout.
    #[must_use]
    pub fn new(gate: Arc<CompletionGate>, label: impl Into<String>) -> Self {
        Self {
            gate,
            label: label.into(),
            timeout: None,
        }
    }

    /// Bounds the wait; on expiry the session is skipped with `"timeout"`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait::async_trait]
impl CompletionHook for GateCompletionHook {
    async fn wait_for_completion(&self, context: &TransitionContext) -> Result<(), HookError> {
        self.gate.begin(
            GateContext::new(self.label.clone()).with_correlation(context.signature.clone()),
        );
        let outcome = match self.timeout {
            Some(window) => self.gate.wait_with_timeout(window).await,
            None => self.gate.wait().await,
        };
        debug!(
            label = %self.label,
            reason = %outcome.reason,
            skipped = outcome.skipped,
            "gate completion hook resolved"
        );
        Ok(())
    }
}
