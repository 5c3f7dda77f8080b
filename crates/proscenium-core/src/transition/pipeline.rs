//! Transition pipeline: single-flight orchestration of scene changes.
//!
//! One request executes at a time, in a fixed step order:
//! admission → policy checks → dedupe → single-flight permit → fade-in →
//! scene operations → scenes-ready milestone → external completion hook →
//! fade-out → completion event.
//!
//! Recoverable refusals (policy veto, duplicate signature, permit busy)
//! drop the request as an `Ok` outcome with no side effects. Fatal
//! configuration errors (unresolvable route, missing style/profile, empty
//! target scene) abort before any side effect. Errors raised during the
//! mutation steps are logged and propagated, but the single-flight permit
//! is released on every exit path, so a failed transition never wedges
//! future ones.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

use super::route::{
    AllowAllPolicy, NavigationPolicy, PolicyDecision, RouteDefinition, RouteGuard, RouteId,
    RouteResolver,
};
use super::{CompletionHook, HookError, TransitionContext, TransitionRequest};
use crate::clock::{Clock, SystemClock};
use crate::events::{EventChannel, SessionEvent};
use crate::scene::{FadeError, FadeRenderer, SceneDirector, SceneError};
use crate::task::spawn_supervised;

/// Trailing window within which an identical signature is a duplicate.
pub const DEFAULT_DEDUPE_WINDOW: Duration = Duration::from_millis(750);

/// Upper bound on remembered signatures, pruning oldest first.
const MAX_RECORDED_SIGNATURES: usize = 64;

/// Pipeline tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionConfig {
    /// Dedupe window for repeated identical signatures.
    pub dedupe_window: Duration,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            dedupe_window: DEFAULT_DEDUPE_WINDOW,
        }
    }
}

/// Fatal transition failures.
///
/// Everything here either aborts before side effects (configuration
/// variants) or is propagated after logging (collaborator variants).
#[derive(Debug, Clone, Error)]
pub enum TransitionError {
    /// The request declared a route the catalog cannot resolve.
    #[error("route '{0}' could not be resolved")]
    UnresolvedRoute(RouteId),
    /// The request carried neither inline scene lists nor a route.
    #[error("transition request from '{requested_by}' has neither scenes nor a route")]
    EmptyRequest { requested_by: String },
    /// No visual style resolved from the request or the route definition.
    #[error("no visual style attached to transition (route: {route:?})")]
    MissingStyle { route: Option<RouteId> },
    /// No timing profile resolved from the request or the route definition.
    #[error("no transition profile attached to transition (route: {route:?})")]
    MissingProfile { route: Option<RouteId> },
    /// The route resolved to an empty target active scene.
    #[error("route '{route}' resolved to an empty target active scene")]
    EmptyTargetScene { route: RouteId },
    /// A scene operation failed mid-transition.
    #[error(transparent)]
    Scene(#[from] SceneError),
    /// A fade step failed mid-transition.
    #[error(transparent)]
    Fade(#[from] FadeError),
}

/// Why a request was dropped without executing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DropReason {
    /// The navigation policy or route guard vetoed the request.
    PolicyDenied { reason: String },
    /// An identical signature started or completed inside the window.
    DuplicateSignature,
    /// Another transition holds the single-flight permit.
    TransitionInFlight,
}

/// Result of submitting a request.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The transition executed to completion.
    Completed(TransitionContext),
    /// The request was dropped with no side effects.
    Dropped(DropReason),
}

impl TransitionOutcome {
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// No-op completion hook; the composition-time default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCompletionHook;

#[async_trait::async_trait]
impl CompletionHook for NoopCompletionHook {
    async fn wait_for_completion(&self, _context: &TransitionContext) -> Result<(), HookError> {
        Ok(())
    }
}

/// Runs hooks in order. Individual hook failures are logged and do not
/// stop later hooks; the first failure is reported to the pipeline (which
/// swallows it as best-effort anyway).
#[derive(Default)]
pub struct HookChain {
    hooks: Vec<Arc<dyn CompletionHook>>,
}

impl HookChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn CompletionHook>) -> Self {
        self.hooks.push(hook);
        self
    }
}

#[async_trait::async_trait]
impl CompletionHook for HookChain {
    async fn wait_for_completion(&self, context: &TransitionContext) -> Result<(), HookError> {
        let mut first_failure = None;
        for hook in &self.hooks {
            if let Err(err) = hook.wait_for_completion(context).await {
                warn!(error = %err, "completion hook in chain failed");
                first_failure.get_or_insert(err);
            }
        }
        first_failure.map_or(Ok(()), Err)
    }
}

struct SignatureRecord {
    signature: String,
    recorded_at: std::time::Instant,
}

/// The transition pipeline.
///
/// Collaborators are injected at construction; optional seams default to
/// permissive no-ops (`AllowAllPolicy`, `NoopCompletionHook`, no route
/// guard, system clock).
pub struct TransitionPipeline {
    scenes: Arc<dyn SceneDirector>,
    fade: Arc<dyn FadeRenderer>,
    routes: Arc<dyn RouteResolver>,
    policy: Arc<dyn NavigationPolicy>,
    route_guard: Option<Arc<dyn RouteGuard>>,
    completion: Arc<dyn CompletionHook>,
    events: EventChannel,
    clock: Arc<dyn Clock>,
    config: TransitionConfig,
    permit: AsyncMutex<()>,
    recent: std::sync::Mutex<VecDeque<SignatureRecord>>,
}

impl TransitionPipeline {
    /// Creates a pipeline over the mandatory collaborators.
    #[must_use]
    pub fn new(
        scenes: Arc<dyn SceneDirector>,
        fade: Arc<dyn FadeRenderer>,
        routes: Arc<dyn RouteResolver>,
        events: EventChannel,
    ) -> Self {
        Self {
            scenes,
            fade,
            routes,
            policy: Arc::new(AllowAllPolicy),
            route_guard: None,
            completion: Arc::new(NoopCompletionHook),
            events,
            clock: Arc::new(SystemClock),
            config: TransitionConfig::default(),
            permit: AsyncMutex::new(()),
            recent: std::sync::Mutex::new(VecDeque::new()),
        }
    }

    /// Replaces the navigation policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn NavigationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Installs a per-route guard.
    #[must_use]
    pub fn with_route_guard(mut self, guard: Arc<dyn RouteGuard>) -> Self {
        self.route_guard = Some(guard);
        self
    }

    /// Replaces the external completion hook.
    #[must_use]
    pub fn with_completion_hook(mut self, hook: Arc<dyn CompletionHook>) -> Self {
        self.completion = hook;
        self
    }

    /// Replaces the clock (tests).
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the tuning configuration.
    #[must_use]
    pub const fn with_config(mut self, config: TransitionConfig) -> Self {
        self.config = config;
        self
    }

    /// Submits a transition request.
    ///
    /// Returns `Ok(Dropped(..))` for recoverable refusals; `Err` only for
    /// fatal configuration errors or collaborator failures mid-mutation.
    pub async fn execute(
        &self,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome, TransitionError> {
        let (context, definition) = self.admit(request)?;

        if let PolicyDecision::Deny { reason } = self.policy.evaluate(&context) {
            info!(
                signature = %context.signature,
                requested_by = %context.requested_by,
                %reason,
                "transition denied by navigation policy"
            );
            return Ok(TransitionOutcome::Dropped(DropReason::PolicyDenied {
                reason,
            }));
        }
        if let (Some(definition), Some(guard)) = (&definition, &self.route_guard) {
            if let PolicyDecision::Deny { reason } = guard.evaluate(definition, &context) {
                info!(
                    signature = %context.signature,
                    route = ?context.route,
                    %reason,
                    "transition denied by route guard"
                );
                return Ok(TransitionOutcome::Dropped(DropReason::PolicyDenied {
                    reason,
                }));
            }
        }

        if self.signature_inside_window(&context.signature) {
            debug!(
                signature = %context.signature,
                "duplicate transition inside dedupe window; dropped"
            );
            return Ok(TransitionOutcome::Dropped(DropReason::DuplicateSignature));
        }

        // Single flight: concurrent requests are dropped, never queued.
        let Ok(_permit) = self.permit.try_lock() else {
            warn!(
                signature = %context.signature,
                requested_by = %context.requested_by,
                "transition already in flight; request dropped"
            );
            return Ok(TransitionOutcome::Dropped(DropReason::TransitionInFlight));
        };

        self.record_signature(&context.signature);
        info!(
            signature = %context.signature,
            correlation = %context.correlation_id,
            reason = %context.reason,
            requested_by = %context.requested_by,
            "transition started"
        );
        self.events.emit(SessionEvent::TransitionStarted {
            signature: context.signature.clone(),
            reason: context.reason.clone(),
            requested_by: context.requested_by.clone(),
        });

        let result = self.run(&context).await;
        self.record_signature(&context.signature);
        match result {
            Ok(()) => {
                self.events.emit(SessionEvent::TransitionCompleted {
                    signature: context.signature.clone(),
                });
                info!(signature = %context.signature, "transition completed");
                Ok(TransitionOutcome::Completed(context))
            }
            Err(err) => {
                error!(
                    signature = %context.signature,
                    error = %err,
                    "transition failed; permit released"
                );
                Err(err)
            }
        }
        // _permit drops here on every path.
    }

    /// Fire-and-forget submission supervised by the task boundary: errors
    /// and panics of the detached execution are logged, never dropped.
    pub fn execute_detached(self: &Arc<Self>, request: TransitionRequest) {
        let pipeline = Arc::clone(self);
        spawn_supervised("transition", async move {
            pipeline.execute(request).await.map(|_| ())
        });
    }

    /// Resolves the request to an immutable context, failing fast on
    /// configuration errors before any side effect.
    fn admit(
        &self,
        request: TransitionRequest,
    ) -> Result<(TransitionContext, Option<RouteDefinition>), TransitionError> {
        let has_inline =
            !request.scenes_to_load.is_empty() || !request.scenes_to_unload.is_empty();

        let (scenes_to_load, scenes_to_unload, target_active_scene, definition) =
            if let Some(route) = request.route.clone() {
                let definition = self
                    .routes
                    .try_resolve(&route)
                    .ok_or_else(|| TransitionError::UnresolvedRoute(route.clone()))?;
                if definition.target_active_scene.trim().is_empty() {
                    return Err(TransitionError::EmptyTargetScene { route });
                }
                (
                    definition.scenes_to_load.clone(),
                    definition.scenes_to_unload.clone(),
                    Some(definition.target_active_scene.clone()),
                    Some(definition),
                )
            } else if has_inline {
                (
                    request.scenes_to_load.clone(),
                    request.scenes_to_unload.clone(),
                    request.target_active_scene.clone(),
                    None,
                )
            } else {
                return Err(TransitionError::EmptyRequest {
                    requested_by: request.requested_by,
                });
            };

        let style = request
            .style
            .clone()
            .or_else(|| definition.as_ref().and_then(|d| d.style.clone()))
            .ok_or_else(|| TransitionError::MissingStyle {
                route: request.route.clone(),
            })?;
        let profile = request
            .profile
            .clone()
            .or_else(|| definition.as_ref().and_then(|d| d.profile.clone()))
            .ok_or_else(|| TransitionError::MissingProfile {
                route: request.route.clone(),
            })?;

        let context = TransitionContext::new(
            scenes_to_load,
            scenes_to_unload,
            target_active_scene,
            request.route,
            style,
            profile,
            request.use_fade,
            request.reason,
            request.requested_by,
        );
        Ok((context, definition))
    }

    /// Steps 5–9: fade-in, scene operations, milestone, hook, fade-out.
    async fn run(&self, context: &TransitionContext) -> Result<(), TransitionError> {
        if context.use_fade {
            self.fade.configure_from_profile(&context.profile);
            self.fade.fade_in().await?;
            self.events.emit(SessionEvent::FadeInCompleted {
                signature: context.signature.clone(),
            });
        }

        self.apply_scene_operations(context).await?;

        self.events.emit(SessionEvent::ScenesReady {
            signature: context.signature.clone(),
            active_scene: self.scenes.active_scene(),
        });

        // Best-effort: the hook may hold the screen covered (intro gate,
        // reset pass) but its failure must never block the reveal.
        if let Err(err) = self.completion.wait_for_completion(context).await {
            warn!(
                signature = %context.signature,
                error = %err,
                "completion hook failed; proceeding to reveal"
            );
        }

        self.events.emit(SessionEvent::BeforeFadeOut {
            signature: context.signature.clone(),
        });
        if context.use_fade {
            self.fade.fade_out().await?;
        }
        Ok(())
    }

    async fn apply_scene_operations(
        &self,
        context: &TransitionContext,
    ) -> Result<(), TransitionError> {
        // Scenes in both lists are reloads: force unload-then-load,
        // ignoring the already-loaded short-circuit below.
        let reload: Vec<&String> = context
            .scenes_to_load
            .iter()
            .filter(|scene| context.scenes_to_unload.contains(*scene))
            .collect();
        for scene in &reload {
            debug!(%scene, "forcing scene reload");
            self.scenes.unload(scene).await?;
            self.scenes.load(scene).await?;
        }

        for scene in &context.scenes_to_load {
            if reload.contains(&scene) {
                continue;
            }
            if self.scenes.is_loaded(scene) {
                debug!(%scene, "scene already loaded; skipping load");
                continue;
            }
            self.scenes.load(scene).await?;
        }

        if let Some(target) = &context.target_active_scene {
            if !self.scenes.try_set_active(target).await? {
                warn!(scene = %target, "could not set target active scene");
            }
        }

        for scene in &context.scenes_to_unload {
            if reload.contains(&scene) {
                continue;
            }
            if context.target_active_scene.as_deref() == Some(scene.as_str()) {
                debug!(%scene, "skipping unload of target active scene");
                continue;
            }
            if !self.scenes.is_loaded(scene) {
                debug!(%scene, "scene already unloaded; skipping unload");
                continue;
            }
            self.scenes.unload(scene).await?;
        }
        Ok(())
    }

    /// Whether `signature` was started or completed inside the window.
    fn signature_inside_window(&self, signature: &str) -> bool {
        let now = self.clock.monotonic_now();
        let mut recent = self.recent.lock().expect("signature window lock poisoned");
        while let Some(front) = recent.front() {
            if now.duration_since(front.recorded_at) > self.config.dedupe_window {
                recent.pop_front();
            } else {
                break;
            }
        }
        recent.iter().any(|record| record.signature == signature)
    }

    fn record_signature(&self, signature: &str) {
        let mut recent = self.recent.lock().expect("signature window lock poisoned");
        recent.push_back(SignatureRecord {
            signature: signature.to_string(),
            recorded_at: self.clock.monotonic_now(),
        });
        while recent.len() > MAX_RECORDED_SIGNATURES {
            recent.pop_front();
        }
    }
}
