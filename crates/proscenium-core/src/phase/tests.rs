//! Unit and property tests for the phase state machine.
//!
//! The property suite verifies the two machine-level invariants: at most
//! one transition per `advance` call, and reset priority over every other
//! pending signal.

use std::sync::Arc;
use std::sync::Mutex;

use proptest::prelude::*;

use super::{Phase, PhaseMachine, PhaseObserver, SessionAction};
use crate::signal::{PhaseSignal, SignalBoard};

/// Observer that records every notification in arrival order.
#[derive(Default)]
struct RecordingObserver {
    log: Mutex<Vec<String>>,
}

impl RecordingObserver {
    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl PhaseObserver for RecordingObserver {
    fn on_phase_exited(&self, phase: Phase) {
        self.log.lock().unwrap().push(format!("exit:{phase:?}"));
    }

    fn on_phase_entered(&self, phase: Phase) {
        self.log.lock().unwrap().push(format!("enter:{phase:?}"));
    }

    fn on_activity_changed(&self, active: bool) {
        self.log.lock().unwrap().push(format!("activity:{active}"));
    }
}

fn board_with(signals: &[PhaseSignal]) -> SignalBoard {
    let mut board = SignalBoard::new();
    for signal in signals {
        board.raise(*signal);
    }
    board
}

/// Drives a fresh machine to the given phase via the signal table.
fn machine_in(phase: Phase) -> PhaseMachine {
    let mut machine = PhaseMachine::new();
    let path: &[&[PhaseSignal]] = match phase {
        Phase::Boot => &[],
        Phase::Ready => &[&[PhaseSignal::Start]],
        Phase::Playing => &[&[PhaseSignal::Start], &[PhaseSignal::Start]],
        Phase::Paused => &[
            &[PhaseSignal::Start],
            &[PhaseSignal::Start],
            &[PhaseSignal::Pause],
        ],
    };
    for step in path {
        machine.advance(&board_with(step)).expect("setup transition");
    }
    assert_eq!(machine.phase(), phase);
    machine
}

#[test]
fn starts_in_boot() {
    let machine = PhaseMachine::new();
    assert_eq!(machine.phase(), Phase::Boot);
    assert!(!machine.is_playing());
}

#[test]
fn table_transitions_follow_the_four_state_path() {
    let mut machine = PhaseMachine::new();

    let t = machine.advance(&board_with(&[PhaseSignal::Start])).unwrap();
    assert_eq!((t.from, t.to), (Phase::Boot, Phase::Ready));

    let t = machine.advance(&board_with(&[PhaseSignal::Start])).unwrap();
    assert_eq!((t.from, t.to), (Phase::Ready, Phase::Playing));
    assert!(machine.is_playing());

    let t = machine.advance(&board_with(&[PhaseSignal::Pause])).unwrap();
    assert_eq!((t.from, t.to), (Phase::Playing, Phase::Paused));

    let t = machine.advance(&board_with(&[PhaseSignal::Resume])).unwrap();
    assert_eq!((t.from, t.to), (Phase::Paused, Phase::Playing));
}

#[test]
fn irrelevant_signals_do_not_transition() {
    let mut machine = PhaseMachine::new();
    assert!(machine.advance(&board_with(&[PhaseSignal::Pause])).is_none());
    assert!(machine.advance(&board_with(&[PhaseSignal::Resume])).is_none());
    assert!(machine.advance(&SignalBoard::new()).is_none());
    assert_eq!(machine.phase(), Phase::Boot);
}

#[test]
fn reset_forces_boot_from_every_phase() {
    for phase in [Phase::Ready, Phase::Playing, Phase::Paused] {
        let mut machine = machine_in(phase);
        let t = machine.advance(&board_with(&[PhaseSignal::Reset])).unwrap();
        assert_eq!((t.from, t.to), (phase, Phase::Boot));
    }
}

#[test]
fn forcing_the_current_phase_is_a_no_op() {
    let mut machine = PhaseMachine::new();
    assert!(machine.advance(&board_with(&[PhaseSignal::Reset])).is_none());
    assert_eq!(machine.phase(), Phase::Boot);

    let mut machine = machine_in(Phase::Ready);
    assert!(machine.advance(&board_with(&[PhaseSignal::Ready])).is_none());
    assert_eq!(machine.phase(), Phase::Ready);
}

#[test]
fn ready_signal_yields_to_reset_but_beats_the_table() {
    let mut machine = machine_in(Phase::Playing);
    // ready + pause pending: ready wins.
    let t = machine
        .advance(&board_with(&[PhaseSignal::Ready, PhaseSignal::Pause]))
        .unwrap();
    assert_eq!(t.to, Phase::Ready);

    let mut machine = machine_in(Phase::Playing);
    // reset + ready pending: reset wins.
    let t = machine
        .advance(&board_with(&[PhaseSignal::Reset, PhaseSignal::Ready]))
        .unwrap();
    assert_eq!(t.to, Phase::Boot);
}

#[test]
fn observers_see_exit_enter_activity_in_order() {
    let observer = Arc::new(RecordingObserver::default());
    let mut machine = PhaseMachine::new();
    machine.register_observer(observer.clone());

    machine.advance(&board_with(&[PhaseSignal::Start])).unwrap();
    machine.advance(&board_with(&[PhaseSignal::Start])).unwrap();

    assert_eq!(
        observer.log(),
        vec![
            "exit:Boot",
            "enter:Ready",
            "activity:false",
            "exit:Ready",
            "enter:Playing",
            "activity:true",
        ]
    );
}

#[test]
fn activity_is_true_only_when_entering_playing() {
    let observer = Arc::new(RecordingObserver::default());
    let mut machine = machine_in(Phase::Playing);
    machine.register_observer(observer.clone());

    machine.advance(&board_with(&[PhaseSignal::Pause])).unwrap();
    machine.advance(&board_with(&[PhaseSignal::Resume])).unwrap();
    machine.advance(&board_with(&[PhaseSignal::Reset])).unwrap();

    let activity: Vec<String> = observer
        .log()
        .into_iter()
        .filter(|entry| entry.starts_with("activity"))
        .collect();
    assert_eq!(activity, vec!["activity:false", "activity:true", "activity:false"]);
}

#[test]
fn unregister_is_symmetric() {
    let observer = Arc::new(RecordingObserver::default());
    let mut machine = PhaseMachine::new();
    let id = machine.register_observer(observer.clone());

    assert!(machine.unregister_observer(id));
    assert!(!machine.unregister_observer(id));

    machine.advance(&board_with(&[PhaseSignal::Start])).unwrap();
    assert!(observer.log().is_empty());
}

#[test]
fn action_affordance_table() {
    assert!(PhaseMachine::new().is_action_allowed(SessionAction::StartSession));
    assert!(!PhaseMachine::new().is_action_allowed(SessionAction::Gameplay));

    let playing = machine_in(Phase::Playing);
    assert!(playing.is_action_allowed(SessionAction::Gameplay));
    assert!(playing.is_action_allowed(SessionAction::Pause));
    assert!(!playing.is_action_allowed(SessionAction::Navigate));

    let paused = machine_in(Phase::Paused);
    assert!(paused.is_action_allowed(SessionAction::Resume));
    assert!(paused.is_action_allowed(SessionAction::Navigate));
    assert!(!paused.is_action_allowed(SessionAction::Gameplay));
}

// ============================================================================
// Property tests
// ============================================================================

fn arb_signal() -> impl Strategy<Value = PhaseSignal> {
    prop::sample::select(&[
        PhaseSignal::Start,
        PhaseSignal::Pause,
        PhaseSignal::Resume,
        PhaseSignal::Ready,
        PhaseSignal::Reset,
    ][..])
}

fn arb_board() -> impl Strategy<Value = SignalBoard> {
    prop::collection::vec(arb_signal(), 0..5).prop_map(|signals| board_with(&signals))
}

proptest! {
    /// For any sequence of signal boards, each `advance` call performs at
    /// most one transition (observed through enter notifications).
    #[test]
    fn at_most_one_transition_per_advance(boards in prop::collection::vec(arb_board(), 0..32)) {
        let observer = Arc::new(RecordingObserver::default());
        let mut machine = PhaseMachine::new();
        machine.register_observer(observer.clone());

        for board in boards {
            let before = observer
                .log()
                .iter()
                .filter(|e| e.starts_with("enter"))
                .count();
            let transition = machine.advance(&board);
            let after = observer
                .log()
                .iter()
                .filter(|e| e.starts_with("enter"))
                .count();
            let enters = after - before;
            prop_assert!(enters <= 1);
            prop_assert_eq!(enters == 1, transition.is_some());
        }
    }

    /// Reset wins over every other pending signal: whenever reset is
    /// raised, the machine ends the call in Boot.
    #[test]
    fn reset_always_wins(boards in prop::collection::vec(arb_board(), 0..32)) {
        let mut machine = PhaseMachine::new();
        for mut board in boards {
            board.raise(PhaseSignal::Reset);
            machine.advance(&board);
            prop_assert_eq!(machine.phase(), Phase::Boot);
        }
    }

    /// The phase only ever changes through `advance`, and each observed
    /// transition's `from` matches the previous phase.
    #[test]
    fn transitions_are_contiguous(boards in prop::collection::vec(arb_board(), 0..32)) {
        let mut machine = PhaseMachine::new();
        let mut current = machine.phase();
        for board in boards {
            if let Some(t) = machine.advance(&board) {
                prop_assert_eq!(t.from, current);
                prop_assert_ne!(t.from, t.to);
                current = t.to;
            }
            prop_assert_eq!(machine.phase(), current);
        }
    }
}
