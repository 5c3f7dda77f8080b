//! Signal board: the set of pending phase intents.
//!
//! Producers (input handlers, menus, network callbacks) only ever raise
//! flags; the owning service reads the board once per tick and clears the
//! transient flags afterwards. The `start` flag is sticky: it survives
//! ticks until the service consumes it on the transition into
//! [`Phase::Playing`](crate::phase::Phase::Playing). Keeping stickiness as
//! an explicit field contract (rather than a generic expiring flag)
//! preserves the "start survives until consumed" behaviour.

use serde::{Deserialize, Serialize};

/// A one-shot phase intent raised by an external caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseSignal {
    /// Begin the session / begin play. Sticky until consumed.
    Start,
    /// Suspend play.
    Pause,
    /// Resume suspended play.
    Resume,
    /// Force the machine back to the ready state.
    Ready,
    /// Force the machine back to boot. Wins over every other signal.
    Reset,
}

/// Mutable set of pending intents, read-and-cleared once per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalBoard {
    start: bool,
    pause: bool,
    resume: bool,
    ready: bool,
    reset: bool,
}

impl SignalBoard {
    /// Creates an empty board.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            start: false,
            pause: false,
            resume: false,
            ready: false,
            reset: false,
        }
    }

    /// Raises a signal. Raising an already-raised signal is a no-op.
    pub fn raise(&mut self, signal: PhaseSignal) {
        match signal {
            PhaseSignal::Start => self.start = true,
            PhaseSignal::Pause => self.pause = true,
            PhaseSignal::Resume => self.resume = true,
            PhaseSignal::Ready => self.ready = true,
            PhaseSignal::Reset => self.reset = true,
        }
    }

    /// Returns whether a signal is currently raised.
    #[must_use]
    pub const fn is_raised(&self, signal: PhaseSignal) -> bool {
        match signal {
            PhaseSignal::Start => self.start,
            PhaseSignal::Pause => self.pause,
            PhaseSignal::Resume => self.resume,
            PhaseSignal::Ready => self.ready,
            PhaseSignal::Reset => self.reset,
        }
    }

    /// Clears every transient signal. `start` is left untouched; it is
    /// cleared only by [`SignalBoard::consume_start`].
    pub fn clear_transients(&mut self) {
        self.pause = false;
        self.resume = false;
        self.ready = false;
        self.reset = false;
    }

    /// Consumes the sticky `start` signal. Called by the owning service
    /// when the machine enters the playing phase.
    pub fn consume_start(&mut self) {
        self.start = false;
    }
}
