//! proscenium-core — session phase and scene transition orchestration.
//!
//! This crate coordinates a game session's macro lifecycle
//! (boot → ready → playing → paused) and the handoffs between
//! presentable scenes: scene loading, visual fade, an optional blocking
//! intro/confirmation step, and a multi-phase entity reset, behind strict
//! ordering, idempotency and single-flight guarantees. Everything runs on
//! cooperative async tasks; the only locks are the two single-flight
//! permits and short-critical-section bookkeeping mutexes.
//!
//! Rendering, physics, input bindings, asset catalogs and UI are external
//! collaborators consumed through the narrow interfaces in [`scene`] and
//! [`transition`]; this crate owns no wire or on-disk format.
//!
//! # Modules
//!
//! - [`signal`]: pending-intent board with the sticky start flag
//! - [`phase`]: four-state macro phase machine with observer notification
//! - [`gate`]: single-slot async completion rendezvous
//! - [`transition`]: transition requests, routes, and the single-flight
//!   pipeline
//! - [`reset`]: multi-phase entity reset orchestrator
//! - [`session`]: the coordinating director tying the above together
//! - [`events`]: typed lifecycle event channel
//! - [`clock`]: injectable time source
//! - [`task`]: supervised detached task spawning
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use proscenium_core::events::EventChannel;
//! use proscenium_core::reset::ResetOrchestrator;
//! use proscenium_core::session::SessionDirector;
//! use proscenium_core::signal::PhaseSignal;
//! use proscenium_core::transition::{RouteId, TransitionPipeline, TransitionRequest};
//!
//! let events = EventChannel::default();
//! let pipeline = Arc::new(TransitionPipeline::new(scenes, fade, routes, events.clone()));
//! let resets = Arc::new(ResetOrchestrator::new(registry));
//! let director = Arc::new(SessionDirector::new(pipeline, resets, events));
//!
//! director.raise(PhaseSignal::Start); // Boot -> Ready
//! director.tick().await?;
//! director.request_start(Some(TransitionRequest::for_route(
//!     RouteId::new("arena"),
//!     "begin match",
//!     "menu",
//! )));
//! director.tick().await?; // runs the transition, then enters Playing
//! ```

pub mod clock;
pub mod events;
pub mod gate;
pub mod phase;
pub mod reset;
pub mod scene;
pub mod session;
pub mod signal;
pub mod task;
pub mod transition;

pub use clock::{Clock, SystemClock};
pub use events::{EventChannel, RunOutcome, SessionEvent};
pub use gate::{CompletionGate, GateCompletionHook, GateContext, GateOutcome};
pub use phase::{Phase, PhaseMachine, PhaseObserver, PhaseTransition, SessionAction};
pub use reset::{
    ActorRegistry, ActorRole, ResetActor, ResetOnScenesReady, ResetOrchestrator,
    ResetParticipant, ResetPhase, ResetRequest, TargetSelector,
};
pub use scene::{FadeRenderer, SceneDirector};
pub use session::SessionDirector;
pub use signal::{PhaseSignal, SignalBoard};
pub use transition::{
    CompletionHook, NavigationPolicy, RouteId, RouteResolver, TransitionPipeline,
    TransitionRequest,
};
