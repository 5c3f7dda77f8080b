//! End-to-end integration tests for the session orchestration core.
//!
//! These tests wire a full director together — phase machine, signal
//! board, transition pipeline with a completion-gate hook and a
//! scenes-ready reset trigger — against in-memory scene and fade fakes,
//! and drive complete sessions through it:
//!
//! - start intent through boot, a gated arena transition, play entry
//! - reset pass triggered at the scenes-ready milestone, in phase order
//! - run bookkeeping across a full play/outcome/reset cycle

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast::error::TryRecvError;

use proscenium_core::events::{EventChannel, RunOutcome, SessionEvent};
use proscenium_core::phase::Phase;
use proscenium_core::reset::{
    ActorRegistry, ActorRole, ResetActor, ResetError, ResetOnScenesReady, ResetOrchestrator,
    ResetParticipant, ResetPhase,
};
use proscenium_core::scene::{FadeError, FadeRenderer, SceneDirector, SceneError};
use proscenium_core::session::SessionDirector;
use proscenium_core::signal::PhaseSignal;
use proscenium_core::transition::{
    HookChain, ResetPolicyDecision, ResetPolicyResolver, RouteDefinition, RouteId,
    StaticRouteResolver, StyleId, TransitionContext, TransitionPipeline, TransitionProfile,
    TransitionRequest,
};
use proscenium_core::{CompletionGate, GateCompletionHook};

#[derive(Default)]
struct MemoryScenes {
    loaded: Mutex<HashSet<String>>,
    active: Mutex<Option<String>>,
}

#[async_trait]
impl SceneDirector for MemoryScenes {
    fn is_loaded(&self, scene: &str) -> bool {
        self.loaded.lock().unwrap().contains(scene)
    }

    fn active_scene(&self) -> Option<String> {
        self.active.lock().unwrap().clone()
    }

    async fn load(&self, scene: &str) -> Result<(), SceneError> {
        self.loaded.lock().unwrap().insert(scene.to_string());
        Ok(())
    }

    async fn unload(&self, scene: &str) -> Result<(), SceneError> {
        self.loaded.lock().unwrap().remove(scene);
        Ok(())
    }

    async fn try_set_active(&self, scene: &str) -> Result<bool, SceneError> {
        *self.active.lock().unwrap() = Some(scene.to_string());
        Ok(true)
    }
}

#[derive(Default)]
struct MemoryFade {
    ops: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl FadeRenderer for MemoryFade {
    fn configure_from_profile(&self, _profile: &TransitionProfile) {}

    async fn fade_in(&self) -> Result<(), FadeError> {
        self.ops.lock().unwrap().push("fade-in");
        Ok(())
    }

    async fn fade_out(&self) -> Result<(), FadeError> {
        self.ops.lock().unwrap().push("fade-out");
        Ok(())
    }
}

type ResetLog = Arc<Mutex<Vec<(ResetPhase, &'static str)>>>;

struct Hero {
    log: ResetLog,
}

impl ResetActor for Hero {
    fn id(&self) -> &str {
        "hero"
    }

    fn role(&self) -> ActorRole {
        ActorRole::Player
    }

    fn participants(&self) -> Vec<Arc<dyn ResetParticipant>> {
        vec![
            Arc::new(Recorder::new("health", 0, self.log.clone())),
            Arc::new(Recorder::new("position", 10, self.log.clone())),
        ]
    }
}

struct Recorder {
    name: &'static str,
    order: i32,
    log: ResetLog,
}

impl Recorder {
    fn new(name: &'static str, order: i32, log: ResetLog) -> Self {
        Self { name, order, log }
    }

    fn record(&self, phase: ResetPhase) {
        self.log.lock().unwrap().push((phase, self.name));
    }
}

#[async_trait]
impl ResetParticipant for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn order(&self) -> i32 {
        self.order
    }

    async fn cleanup(&self, _actor: &dyn ResetActor) -> Result<(), ResetError> {
        self.record(ResetPhase::Cleanup);
        Ok(())
    }

    async fn restore(&self, _actor: &dyn ResetActor) -> Result<(), ResetError> {
        self.record(ResetPhase::Restore);
        Ok(())
    }

    async fn rebind(&self, _actor: &dyn ResetActor) -> Result<(), ResetError> {
        self.record(ResetPhase::Rebind);
        Ok(())
    }
}

struct SingleActorRegistry {
    hero: Arc<dyn ResetActor>,
}

impl SingleActorRegistry {
    fn new(log: ResetLog) -> Self {
        Self {
            hero: Arc::new(Hero { log }),
        }
    }
}

impl ActorRegistry for SingleActorRegistry {
    fn actors(&self) -> Vec<Arc<dyn ResetActor>> {
        vec![self.hero.clone()]
    }

    fn lookup(&self, id: &str) -> Option<Arc<dyn ResetActor>> {
        (id == "hero").then(|| self.hero.clone())
    }
}

struct AlwaysReset;

impl ResetPolicyResolver for AlwaysReset {
    fn resolve(
        &self,
        _route: Option<&RouteId>,
        _definition: Option<&RouteDefinition>,
        _context: &TransitionContext,
    ) -> ResetPolicyDecision {
        ResetPolicyDecision {
            should_reset: true,
            source: "always".to_string(),
            reason: "scene handoff".to_string(),
        }
    }
}

struct Stage {
    director: Arc<SessionDirector>,
    scenes: Arc<MemoryScenes>,
    fade: Arc<MemoryFade>,
    gate: Arc<CompletionGate>,
    events: EventChannel,
    reset_log: ResetLog,
}

fn arena_routes() -> Arc<StaticRouteResolver> {
    Arc::new(StaticRouteResolver::new().with_route(
        RouteId::new("arena"),
        RouteDefinition {
            scenes_to_load: vec!["arena".to_string(), "hud".to_string()],
            scenes_to_unload: vec!["menu".to_string()],
            target_active_scene: "arena".to_string(),
            style: Some(StyleId::new("curtain")),
            profile: Some(TransitionProfile::standard()),
        },
    ))
}

fn stage() -> Stage {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let scenes = Arc::new(MemoryScenes::default());
    scenes.loaded.lock().unwrap().insert("menu".to_string());
    *scenes.active.lock().unwrap() = Some("menu".to_string());

    let fade = Arc::new(MemoryFade::default());
    let events = EventChannel::default();
    let routes = arena_routes();
    let gate = Arc::new(CompletionGate::new());
    let reset_log: ResetLog = Arc::default();
    let resets = Arc::new(ResetOrchestrator::new(Arc::new(SingleActorRegistry::new(
        reset_log.clone(),
    ))));

    let hooks = HookChain::new()
        .with_hook(Arc::new(ResetOnScenesReady::new(
            resets.clone(),
            Arc::new(AlwaysReset),
            routes.clone(),
        )))
        .with_hook(Arc::new(
            GateCompletionHook::new(gate.clone(), "intro").with_timeout(Duration::from_secs(5)),
        ));

    let pipeline = Arc::new(
        TransitionPipeline::new(scenes.clone(), fade.clone(), routes, events.clone())
            .with_completion_hook(Arc::new(hooks)),
    );
    let director = Arc::new(SessionDirector::new(pipeline, resets, events.clone()));
    Stage {
        director,
        scenes,
        fade,
        gate,
        events,
        reset_log,
    }
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            Err(TryRecvError::Lagged(_)) => {}
        }
    }
    events
}

/// Full session: boot, a gated arena transition, play entry.
#[tokio::test]
async fn gated_arena_entry_runs_the_full_sequence() {
    let stage = stage();
    let mut rx = stage.events.subscribe();

    stage.director.raise(PhaseSignal::Start);
    stage.director.tick().await.unwrap();
    assert_eq!(stage.director.phase(), Phase::Ready);

    // A side task plays the part of the intro screen: it confirms the
    // gate as soon as the pipeline opens it.
    let gate = stage.gate.clone();
    let confirm = tokio::spawn(async move {
        while !gate.is_active() {
            tokio::task::yield_now().await;
        }
        assert!(gate.complete("player confirmed"));
    });

    stage.director.request_start(Some(TransitionRequest::for_route(
        RouteId::new("arena"),
        "begin match",
        "menu-ui",
    )));
    stage.director.tick().await.unwrap();
    confirm.await.unwrap();

    assert_eq!(stage.director.phase(), Phase::Playing);
    assert_eq!(stage.scenes.active_scene().as_deref(), Some("arena"));
    assert!(stage.scenes.is_loaded("arena"));
    assert!(stage.scenes.is_loaded("hud"));
    assert!(!stage.scenes.is_loaded("menu"));
    assert_eq!(*stage.fade.ops.lock().unwrap(), vec!["fade-in", "fade-out"]);

    // Milestones arrive in pipeline order, with play entry last.
    let kinds: Vec<&'static str> = drain(&mut rx)
        .iter()
        .filter_map(|event| match event {
            SessionEvent::TransitionStarted { .. } => Some("started"),
            SessionEvent::FadeInCompleted { .. } => Some("fade-in"),
            SessionEvent::ScenesReady { .. } => Some("scenes-ready"),
            SessionEvent::BeforeFadeOut { .. } => Some("before-fade-out"),
            SessionEvent::TransitionCompleted { .. } => Some("completed"),
            SessionEvent::PhaseEntered {
                phase: Phase::Playing,
            } => Some("playing"),
            _ => None,
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            "started",
            "fade-in",
            "scenes-ready",
            "before-fade-out",
            "completed",
            "playing"
        ]
    );
}

/// The scenes-ready reset trigger runs the full pass before the reveal,
/// with every participant's cleanup finishing before any restore.
#[tokio::test]
async fn transition_reset_pass_runs_phase_by_phase() {
    let stage = stage();

    // No intro gate in play this time.
    let gate = stage.gate.clone();
    let skipper = tokio::spawn(async move {
        while !gate.is_active() {
            tokio::task::yield_now().await;
        }
        gate.skip("no intro for this test");
    });

    stage.director.raise(PhaseSignal::Start);
    stage.director.tick().await.unwrap();
    stage.director.request_start(Some(TransitionRequest::for_route(
        RouteId::new("arena"),
        "begin match",
        "menu-ui",
    )));
    stage.director.tick().await.unwrap();
    skipper.await.unwrap();

    assert_eq!(
        *stage.reset_log.lock().unwrap(),
        vec![
            (ResetPhase::Cleanup, "health"),
            (ResetPhase::Cleanup, "position"),
            (ResetPhase::Restore, "health"),
            (ResetPhase::Restore, "position"),
            (ResetPhase::Rebind, "health"),
            (ResetPhase::Rebind, "position"),
        ]
    );
}

/// A complete cycle: play, report an outcome, reset back to boot, play
/// again with a fresh run id.
#[tokio::test]
async fn full_cycle_reports_distinct_runs() {
    let stage = stage();
    let mut rx = stage.events.subscribe();

    // Keep the gate from blocking: resolve it whenever it opens.
    let gate = stage.gate.clone();
    tokio::spawn(async move {
        loop {
            if gate.is_active() {
                gate.skip("auto");
            }
            tokio::task::yield_now().await;
        }
    });

    stage.director.raise(PhaseSignal::Start);
    stage.director.tick().await.unwrap();
    stage.director.request_start(Some(TransitionRequest::for_route(
        RouteId::new("arena"),
        "first match",
        "menu-ui",
    )));
    stage.director.tick().await.unwrap();
    assert_eq!(stage.director.phase(), Phase::Playing);
    assert!(stage.director.report_run_outcome(RunOutcome::Defeat));

    stage.director.raise(PhaseSignal::Reset);
    stage.director.tick().await.unwrap();
    assert_eq!(stage.director.phase(), Phase::Boot);

    stage.director.raise(PhaseSignal::Start);
    stage.director.tick().await.unwrap();
    stage.director.tick().await.unwrap();
    assert_eq!(stage.director.phase(), Phase::Playing);
    assert!(stage.director.report_run_outcome(RunOutcome::Victory));

    let run_ids: Vec<String> = drain(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            SessionEvent::RunStarted { run_id } => Some(run_id),
            _ => None,
        })
        .collect();
    assert_eq!(run_ids.len(), 2);
    assert_ne!(run_ids[0], run_ids[1]);
}

/// Pausing mid-run does not end the run; the outcome can still be
/// reported exactly once afterwards.
#[tokio::test]
async fn pause_does_not_end_the_run() {
    let stage = stage();
    let gate = stage.gate.clone();
    tokio::spawn(async move {
        loop {
            if gate.is_active() {
                gate.skip("auto");
            }
            tokio::task::yield_now().await;
        }
    });

    stage.director.raise(PhaseSignal::Start);
    stage.director.tick().await.unwrap();
    stage.director.request_start(Some(TransitionRequest::for_route(
        RouteId::new("arena"),
        "match",
        "menu-ui",
    )));
    stage.director.tick().await.unwrap();

    stage.director.raise(PhaseSignal::Pause);
    stage.director.tick().await.unwrap();
    assert_eq!(stage.director.phase(), Phase::Paused);

    stage.director.raise(PhaseSignal::Resume);
    stage.director.tick().await.unwrap();
    assert_eq!(stage.director.phase(), Phase::Playing);

    assert!(stage.director.report_run_outcome(RunOutcome::Victory));
    assert!(!stage.director.report_run_outcome(RunOutcome::Defeat));
}
