//! Macro-phase state machine.
//!
//! Sessions move through four phases based on the signals pending on the
//! [`SignalBoard`]:
//!
//! ```text
//!                  start            start
//!      ┌──────┐ ─────────► ┌───────┐ ─────────► ┌─────────┐
//!      │ Boot │            │ Ready │            │ Playing │◄─────┐
//!      └──────┘ ◄───────── └───────┘ ◄───────── └────┬────┘      │
//!          ▲       reset*      ready*    ready*      │ pause     │ resume
//!          │                                         ▼           │
//!          │                reset*              ┌────────┐       │
//!          └─────────────────────────────────── │ Paused │ ──────┘
//!                                               └────────┘
//! ```
//!
//! `reset` and `ready` (starred) are forcing signals: from any phase,
//! `reset` forces Boot and `ready` forces Ready, in that priority order,
//! before the per-state table is consulted. [`PhaseMachine::advance`]
//! performs at most one transition per call.
//!
//! The machine is purely a function of the currently-set signals: it never
//! clears signals and never reads a clock. The owning service clears
//! transients after each tick, which keeps the machine testable without
//! any timing infrastructure.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::signal::{PhaseSignal, SignalBoard};

/// The four-state macro lifecycle phase.
///
/// Exactly one phase is active at a time; "playing" activity is true only
/// for [`Phase::Playing`]. The phase is mutated only by
/// [`PhaseMachine::advance`], never set externally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Initial phase at session start.
    #[default]
    Boot,
    /// Loaded and waiting to begin play.
    Ready,
    /// Actively playing.
    Playing,
    /// Play suspended.
    Paused,
}

/// A single performed phase transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: Phase,
    pub to: Phase,
}

/// Capability checked by [`PhaseMachine::is_action_allowed`].
///
/// This is a UI/input affordance table, not authorization: final
/// authorization for anything consequential lives behind the gated
/// services, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAction {
    /// Begin (or request beginning) a session.
    StartSession,
    /// Ordinary gameplay input.
    Gameplay,
    /// Suspend play.
    Pause,
    /// Resume suspended play.
    Resume,
    /// Menu / scene navigation.
    Navigate,
}

/// Observer of phase machine transitions.
///
/// All methods have no-op defaults so observers implement only what they
/// care about. Observers register once and unregister symmetrically via
/// the [`ObserverId`] handle returned at registration.
pub trait PhaseObserver: Send + Sync {
    /// The machine left `phase`.
    fn on_phase_exited(&self, phase: Phase) {
        let _ = phase;
    }

    /// The machine entered `phase`.
    fn on_phase_entered(&self, phase: Phase) {
        let _ = phase;
    }

    /// Play activity changed; `active` is true only on entering Playing.
    fn on_activity_changed(&self, active: bool) {
        let _ = active;
    }
}

/// Handle identifying a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// The phase state machine.
#[derive(Default)]
pub struct PhaseMachine {
    phase: Phase,
    observers: Vec<(ObserverId, Arc<dyn PhaseObserver>)>,
    next_observer_id: u64,
}

impl std::fmt::Debug for PhaseMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseMachine")
            .field("phase", &self.phase)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl PhaseMachine {
    /// Creates a machine in [`Phase::Boot`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns whether the session is actively playing.
    #[must_use]
    pub const fn is_playing(&self) -> bool {
        matches!(self.phase, Phase::Playing)
    }

    /// Registers an observer and returns its handle.
    pub fn register_observer(&mut self, observer: Arc<dyn PhaseObserver>) -> ObserverId {
        let id = ObserverId(self.next_observer_id);
        self.next_observer_id += 1;
        self.observers.push((id, observer));
        id
    }

    /// Unregisters an observer. Returns whether the handle was known.
    pub fn unregister_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    /// Examines the pending signals and performs at most one transition.
    ///
    /// Priority: `reset` forces Boot; then `ready` forces Ready; then the
    /// per-state table (Boot+start→Ready, Ready+start→Playing,
    /// Playing+pause→Paused, Paused+resume→Playing). Forcing the phase
    /// the machine is already in is a no-op, not a transition.
    ///
    /// On a transition, registered observers are notified of exit-old,
    /// enter-new, and activity-changed, in that order.
    pub fn advance(&mut self, signals: &SignalBoard) -> Option<PhaseTransition> {
        let next = if signals.is_raised(PhaseSignal::Reset) {
            Some(Phase::Boot)
        } else if signals.is_raised(PhaseSignal::Ready) {
            Some(Phase::Ready)
        } else {
            match self.phase {
                Phase::Boot if signals.is_raised(PhaseSignal::Start) => Some(Phase::Ready),
                Phase::Ready if signals.is_raised(PhaseSignal::Start) => Some(Phase::Playing),
                Phase::Playing if signals.is_raised(PhaseSignal::Pause) => Some(Phase::Paused),
                Phase::Paused if signals.is_raised(PhaseSignal::Resume) => Some(Phase::Playing),
                _ => None,
            }
        };
        let to = next.filter(|to| *to != self.phase)?;

        let from = self.phase;
        self.phase = to;
        debug!(?from, ?to, "phase transition");

        for (_, observer) in &self.observers {
            observer.on_phase_exited(from);
        }
        for (_, observer) in &self.observers {
            observer.on_phase_entered(to);
        }
        let active = matches!(to, Phase::Playing);
        for (_, observer) in &self.observers {
            observer.on_activity_changed(active);
        }

        Some(PhaseTransition { from, to })
    }

    /// Non-authoritative capability check for UI/input affordance.
    #[must_use]
    pub const fn is_action_allowed(&self, action: SessionAction) -> bool {
        matches!(
            (self.phase, action),
            (Phase::Boot | Phase::Ready, SessionAction::StartSession)
                | (Phase::Ready | Phase::Paused, SessionAction::Navigate)
                | (Phase::Playing, SessionAction::Gameplay | SessionAction::Pause)
                | (Phase::Paused, SessionAction::Resume)
        )
    }
}
