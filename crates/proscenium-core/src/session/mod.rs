//! Session director: the coordinating service over the phase machine,
//! the signal board, and the transition pipeline.
//!
//! External callers raise intents on the board (and may stage a scene
//! change alongside a start intent). Once per tick the director:
//!
//! 1. runs a staged scene change to completion if a start intent is
//!    pending out of Ready — entering Playing is therefore the
//!    pipeline's release point, not the signal's;
//! 2. advances the phase machine (at most one transition);
//! 3. consumes the sticky start signal when Playing is entered, and
//!    clears the transient signals unconditionally.
//!
//! The director also owns run bookkeeping: a run starts on
//! Ready→Playing and ends at most once via [`SessionDirector::report_run_outcome`],
//! re-arming on the next run start.


use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::{EventChannel, RunOutcome, SessionEvent};
use crate::phase::{Phase, PhaseMachine, SessionAction};
use crate::reset::{ResetOrchestrator, ResetOutcome, ResetRequest};
use crate::signal::{PhaseSignal, SignalBoard};
use crate::transition::{
    TransitionError, TransitionOutcome, TransitionPipeline, TransitionRequest,
};

#[derive(Debug, Default)]
struct RunState {
    run_id: Option<String>,
    outcome_reported: bool,
}

/// The coordinating service.
///
/// All methods take `&self`; the director is shared behind an `Arc`
/// between producers (raise intents, report outcomes) and the host loop
/// (tick).
pub struct SessionDirector {
    board: Mutex<SignalBoard>,
    machine: Mutex<PhaseMachine>,
    pipeline: Arc<TransitionPipeline>,
    resets: Arc<ResetOrchestrator>,
    events: EventChannel,
    staged: Mutex<Option<TransitionRequest>>,
    run: Mutex<RunState>,
}

impl SessionDirector {
    /// Creates a director over its collaborators.
    #[must_use]
    pub fn new(
        pipeline: Arc<TransitionPipeline>,
        resets: Arc<ResetOrchestrator>,
        events: EventChannel,
    ) -> Self {
        Self {
            board: Mutex::new(SignalBoard::new()),
            machine: Mutex::new(PhaseMachine::new()),
            pipeline,
            resets,
            events,
            staged: Mutex::new(None),
            run: Mutex::new(RunState::default()),
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.machine.lock().expect("machine lock poisoned").phase()
    }

    /// Non-authoritative affordance check, see
    /// [`PhaseMachine::is_action_allowed`].
    #[must_use]
    pub fn is_action_allowed(&self, action: SessionAction) -> bool {
        self.machine
            .lock()
            .expect("machine lock poisoned")
            .is_action_allowed(action)
    }

    /// Subscribes to the lifecycle event channel.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Raises a phase intent. Producers only raise; the tick consumes.
    pub fn raise(&self, signal: PhaseSignal) {
        self.board.lock().expect("board lock poisoned").raise(signal);
    }

    /// Raises a start intent, optionally staging a scene change that must
    /// complete before Playing is entered.
    pub fn request_start(&self, transition: Option<TransitionRequest>) {
        if let Some(request) = transition {
            let replaced = self
                .staged
                .lock()
                .expect("staged lock poisoned")
                .replace(request);
            if replaced.is_some() {
                warn!("staged transition replaced by newer start request");
            }
        }
        self.raise(PhaseSignal::Start);
    }

    /// Runs an explicit reset pass (outside any transition). Returns
    /// whether the pass ran.
    pub async fn request_reset(&self, request: ResetRequest) -> ResetOutcome {
        self.resets.request_reset(request).await
    }

    /// One coordination tick.
    ///
    /// Fatal transition errors propagate to the host (configuration
    /// errors halt interactive execution); in that case the phase does
    /// not advance and the staged request is discarded.
    pub async fn tick(&self) -> Result<(), TransitionError> {
        if let Some(request) = self.take_staged_for_play_entry() {
            match self.pipeline.execute(request).await {
                Ok(TransitionOutcome::Completed(context)) => {
                    debug!(
                        signature = %context.signature,
                        "staged transition completed; releasing play entry"
                    );
                }
                Ok(TransitionOutcome::Dropped(reason)) => {
                    // Already logged by the pipeline; the start intent is
                    // still raised, so the advance below enters Playing
                    // this tick without the scene change.
                    debug!(?reason, "staged transition dropped");
                }
                Err(err) => {
                    self.board
                        .lock()
                        .expect("board lock poisoned")
                        .clear_transients();
                    return Err(err);
                }
            }
        }

        let transition = {
            let board = self.board.lock().expect("board lock poisoned");
            let mut machine = self.machine.lock().expect("machine lock poisoned");
            machine.advance(&board)
        };

        if let Some(transition) = transition {
            self.events.emit(SessionEvent::PhaseExited {
                phase: transition.from,
            });
            self.events.emit(SessionEvent::PhaseEntered {
                phase: transition.to,
            });
            self.events.emit(SessionEvent::ActivityChanged {
                active: transition.to == Phase::Playing,
            });
            if transition.to == Phase::Playing {
                self.board
                    .lock()
                    .expect("board lock poisoned")
                    .consume_start();
                if transition.from == Phase::Ready {
                    self.begin_run();
                }
            }
        }

        self.board
            .lock()
            .expect("board lock poisoned")
            .clear_transients();
        Ok(())
    }

    /// Reports the outcome of the active run. Emits `RunEnded` at most
    /// once per run; late or duplicate reports are ignored. Returns
    /// whether the report was accepted.
    pub fn report_run_outcome(&self, outcome: RunOutcome) -> bool {
        let mut run = self.run.lock().expect("run lock poisoned");
        match run.run_id.clone() {
            Some(run_id) if !run.outcome_reported => {
                run.outcome_reported = true;
                info!(%run_id, ?outcome, "run ended");
                self.events.emit(SessionEvent::RunEnded { run_id, outcome });
                true
            }
            Some(run_id) => {
                debug!(%run_id, ?outcome, "run outcome already reported; ignored");
                false
            }
            None => {
                debug!(?outcome, "run outcome reported with no active run; ignored");
                false
            }
        }
    }

    /// Takes the staged request when the machine is in Ready with a plain
    /// start intent pending (no forcing signal outranking it this tick).
    fn take_staged_for_play_entry(&self) -> Option<TransitionRequest> {
        let entering_play = {
            let board = self.board.lock().expect("board lock poisoned");
            let machine = self.machine.lock().expect("machine lock poisoned");
            machine.phase() == Phase::Ready
                && board.is_raised(PhaseSignal::Start)
                && !board.is_raised(PhaseSignal::Reset)
                && !board.is_raised(PhaseSignal::Ready)
        };
        if !entering_play {
            return None;
        }
        self.staged.lock().expect("staged lock poisoned").take()
    }

    fn begin_run(&self) {
        let run_id = Uuid::new_v4().to_string();
        let mut run = self.run.lock().expect("run lock poisoned");
        run.run_id = Some(run_id.clone());
        run.outcome_reported = false;
        drop(run);
        info!(%run_id, "run started");
        self.events.emit(SessionEvent::RunStarted { run_id });
    }
}

impl std::fmt::Debug for SessionDirector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDirector")
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
