//! Typed lifecycle event channel.
//!
//! Events are broadcast over a [`tokio::sync::broadcast`] channel so that
//! any number of observers can subscribe without the emitting component
//! knowing about them. Emission is fire-and-forget: a send with no live
//! receivers is not an error.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::phase::Phase;

/// Default buffered capacity of the event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Terminal outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Victory,
    Defeat,
    /// Run ended without a decided outcome (abort, disconnect, reset).
    Unknown,
}

/// Lifecycle events emitted by the orchestration core.
///
/// `signature` fields carry the transition signature of the in-flight
/// request for log correlation; `run_id` fields carry the per-run
/// correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A transition request passed admission, policy, dedupe and the
    /// single-flight permit, and is now executing.
    TransitionStarted {
        signature: String,
        reason: String,
        requested_by: String,
    },
    /// The fade-in step finished (only emitted for fading transitions).
    FadeInCompleted { signature: String },
    /// All scene operations finished; downstream collaborators (reset
    /// trigger, intro gate) react to this milestone, not to completion.
    ScenesReady {
        signature: String,
        active_scene: Option<String>,
    },
    /// The reveal boundary: emitted after the completion hook resolves,
    /// immediately before the optional fade-out.
    BeforeFadeOut { signature: String },
    /// Terminal pipeline event for a successful transition.
    TransitionCompleted { signature: String },
    /// The phase machine left a phase.
    PhaseExited { phase: Phase },
    /// The phase machine entered a phase.
    PhaseEntered { phase: Phase },
    /// Play activity changed; `active` is true only on entering Playing.
    ActivityChanged { active: bool },
    /// A new run began (Ready -> Playing). Re-arms the run-ended latch.
    RunStarted { run_id: String },
    /// A run ended. Emitted at most once per run.
    RunEnded { run_id: String, outcome: RunOutcome },
}

/// Cloneable handle over the broadcast channel.
#[derive(Debug, Clone)]
pub struct EventChannel {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventChannel {
    /// Creates a channel with the given buffered capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribes a new receiver. Receivers that fall behind by more than
    /// the channel capacity observe a `Lagged` error, not a panic.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emits an event to all current subscribers.
    pub fn emit(&self, event: SessionEvent) {
        trace!(?event, "session event");
        // A send error only means nobody is listening right now.
        let _ = self.tx.send(event);
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new(EVENT_CHANNEL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::{EventChannel, RunOutcome, SessionEvent};
    use crate::phase::Phase;

    #[test]
    fn event_wire_tags_are_stable() {
        let event = SessionEvent::ScenesReady {
            signature: "abc".to_string(),
            active_scene: Some("arena".to_string()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "scenes_ready");
        assert_eq!(json["signature"], "abc");
        assert_eq!(json["active_scene"], "arena");

        let event = SessionEvent::RunEnded {
            run_id: "r1".to_string(),
            outcome: RunOutcome::Victory,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "run_ended");
        assert_eq!(json["outcome"], "victory");

        let event = SessionEvent::PhaseEntered {
            phase: Phase::Playing,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["phase"], "playing");
    }

    #[test]
    fn emit_without_subscribers_is_not_an_error() {
        let channel = EventChannel::new(4);
        channel.emit(SessionEvent::ActivityChanged { active: true });

        let mut rx = channel.subscribe();
        channel.emit(SessionEvent::ActivityChanged { active: false });
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::ActivityChanged { active: false }
        );
    }
}
