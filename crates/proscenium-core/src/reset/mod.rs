//! Reset orchestrator: multi-phase entity reset under single flight.
//!
//! A reset pass resolves its targets, then runs every resolved
//! participant through three phases in strict global order: all cleanups
//! finish before any restore begins, and all restores finish before any
//! rebind begins. Phase-wide sequencing (rather than per-target) is the
//! load-bearing guarantee: restore logic may depend on *every* target
//! having been cleaned up, not just its own.
//!
//! Concurrent reset requests are dropped, never queued; the single-flight
//! permit is the orchestrator's only lock.


use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::transition::{
    CompletionHook, HookError, ResetPolicyResolver, RouteResolver, TransitionContext,
};

/// Coarse actor classification used by role-based target selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Player,
    NonPlayer,
}

/// How a reset request selects its targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetSelector {
    /// Every actor in the registry.
    AllActors,
    /// An explicit id set; unknown ids are logged and skipped.
    Ids(Vec<String>),
    /// All actors of one role ("players only").
    Role(ActorRole),
}

/// A reset request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetRequest {
    pub selector: TargetSelector,
    /// Free-text reason for logs.
    pub reason: String,
}

impl ResetRequest {
    /// Request resetting every actor.
    #[must_use]
    pub fn all(reason: impl Into<String>) -> Self {
        Self {
            selector: TargetSelector::AllActors,
            reason: reason.into(),
        }
    }

    /// Request resetting only actors of `role`.
    #[must_use]
    pub fn role(role: ActorRole, reason: impl Into<String>) -> Self {
        Self {
            selector: TargetSelector::Role(role),
            reason: reason.into(),
        }
    }

    /// Request resetting an explicit id set.
    #[must_use]
    pub fn ids(ids: Vec<String>, reason: impl Into<String>) -> Self {
        Self {
            selector: TargetSelector::Ids(ids),
            reason: reason.into(),
        }
    }
}

/// The three reset phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPhase {
    /// Tear down transient state.
    Cleanup,
    /// Restore baseline state.
    Restore,
    /// Re-register bindings against the restored world.
    Rebind,
}

/// Error from a single participant phase step. Logged and counted; it
/// does not abort the pass (phase-wide ordering is preserved regardless).
#[derive(Debug, Clone, Error)]
#[error("reset {phase:?} failed for participant '{participant}' on actor '{actor}': {detail}")]
pub struct ResetError {
    pub phase: ResetPhase,
    pub participant: String,
    pub actor: String,
    pub detail: String,
}

/// A resettable actor: a resolved target of a reset pass.
pub trait ResetActor: Send + Sync {
    /// Stable actor id; targets are processed in ordinal id order.
    fn id(&self) -> &str;

    /// Role for role-based selection.
    fn role(&self) -> ActorRole;

    /// The actor's reset-capable components, in discovery order.
    fn participants(&self) -> Vec<Arc<dyn ResetParticipant>>;
}

/// A component implementing the three-phase reset contract.
///
/// `order` and `applies_to` are optional refinements: participants run in
/// ascending `order`, ties broken by `name`, then by stable discovery
/// order. Every phase step is invoked even when the participant's
/// behaviour for that phase is a no-op.
#[async_trait]
pub trait ResetParticipant: Send + Sync {
    /// Participant name, the second sort key.
    fn name(&self) -> &str;

    /// Explicit ordering key; lower runs first.
    fn order(&self) -> i32 {
        0
    }

    /// Per-participant target filter.
    fn applies_to(&self, actor: &dyn ResetActor) -> bool {
        let _ = actor;
        true
    }

    async fn cleanup(&self, actor: &dyn ResetActor) -> Result<(), ResetError>;

    async fn restore(&self, actor: &dyn ResetActor) -> Result<(), ResetError>;

    async fn rebind(&self, actor: &dyn ResetActor) -> Result<(), ResetError>;
}

/// Registry of live actors.
pub trait ActorRegistry: Send + Sync {
    /// Enumerates every registered actor.
    fn actors(&self) -> Vec<Arc<dyn ResetActor>>;

    /// Looks an actor up by id.
    fn lookup(&self, id: &str) -> Option<Arc<dyn ResetActor>>;
}

/// Fast-path target classifier. When it yields nothing the orchestrator
/// falls back to an exhaustive registry scan, since classifier-side
/// registries may be stale or absent.
pub trait ResetTargetClassifier: Send + Sync {
    fn collect_targets(
        &self,
        request: &ResetRequest,
        registry: &dyn ActorRegistry,
    ) -> Vec<Arc<dyn ResetActor>>;
}

/// Outcome of a reset request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ResetOutcome {
    /// The pass ran.
    Completed(ResetSummary),
    /// A pass was already in flight; the request was dropped.
    Dropped,
}

impl ResetOutcome {
    #[must_use]
    pub const fn ran(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Counters from a completed pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResetSummary {
    /// Targets that resolved (including ones with no participants).
    pub targets: usize,
    /// Participant instances that ran the three phases.
    pub participants: usize,
    /// Phase steps that returned an error (logged, not fatal).
    pub failures: usize,
}

struct RosterEntry {
    actor: Arc<dyn ResetActor>,
    participants: Vec<Arc<dyn ResetParticipant>>,
}

/// The reset orchestrator.
pub struct ResetOrchestrator {
    registry: Arc<dyn ActorRegistry>,
    classifier: Option<Arc<dyn ResetTargetClassifier>>,
    permit: AsyncMutex<()>,
}

impl ResetOrchestrator {
    /// Creates an orchestrator over the registry with no classifier; every
    /// request resolves via the exhaustive scan.
    #[must_use]
    pub fn new(registry: Arc<dyn ActorRegistry>) -> Self {
        Self {
            registry,
            classifier: None,
            permit: AsyncMutex::new(()),
        }
    }

    /// Installs the fast-path classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn ResetTargetClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Runs a reset pass, or drops the request when one is in flight.
    pub async fn request_reset(&self, request: ResetRequest) -> ResetOutcome {
        let Ok(_permit) = self.permit.try_lock() else {
            warn!(
                reason = %request.reason,
                "reset already in progress; request dropped"
            );
            return ResetOutcome::Dropped;
        };

        info!(reason = %request.reason, selector = ?request.selector, "reset pass started");
        let mut targets = self
            .classifier
            .as_ref()
            .map(|classifier| classifier.collect_targets(&request, self.registry.as_ref()))
            .unwrap_or_default();
        if targets.is_empty() {
            debug!("classifier yielded no targets; falling back to registry scan");
            targets = self.scan_registry(&request);
        }
        targets.sort_by(|a, b| a.id().cmp(b.id()));

        let roster = Self::build_roster(targets);
        let mut summary = ResetSummary {
            targets: roster.len(),
            participants: roster.iter().map(|entry| entry.participants.len()).sum(),
            failures: 0,
        };
        for phase in [ResetPhase::Cleanup, ResetPhase::Restore, ResetPhase::Rebind] {
            summary.failures += Self::run_phase(phase, &roster).await;
        }
        info!(
            targets = summary.targets,
            participants = summary.participants,
            failures = summary.failures,
            "reset pass completed"
        );
        ResetOutcome::Completed(summary)
    }

    fn scan_registry(&self, request: &ResetRequest) -> Vec<Arc<dyn ResetActor>> {
        match &request.selector {
            TargetSelector::AllActors => self.registry.actors(),
            TargetSelector::Role(role) => self
                .registry
                .actors()
                .into_iter()
                .filter(|actor| actor.role() == *role)
                .collect(),
            TargetSelector::Ids(ids) => ids
                .iter()
                .filter_map(|id| {
                    let actor = self.registry.lookup(id);
                    if actor.is_none() {
                        warn!(%id, "reset target id not found in registry; skipped");
                    }
                    actor
                })
                .collect(),
        }
    }

    /// Discovers and orders each target's participants.
    fn build_roster(targets: Vec<Arc<dyn ResetActor>>) -> Vec<RosterEntry> {
        let mut roster = Vec::with_capacity(targets.len());
        for actor in targets {
            let mut participants: Vec<(usize, Arc<dyn ResetParticipant>)> = actor
                .participants()
                .into_iter()
                .filter(|participant| participant.applies_to(actor.as_ref()))
                .enumerate()
                .collect();
            participants.sort_by(|(ia, a), (ib, b)| {
                a.order()
                    .cmp(&b.order())
                    .then_with(|| a.name().cmp(b.name()))
                    .then_with(|| ia.cmp(ib))
            });
            let participants: Vec<Arc<dyn ResetParticipant>> =
                participants.into_iter().map(|(_, p)| p).collect();
            if participants.is_empty() {
                debug!(actor = %actor.id(), "no resettable components on target; skipped");
            }
            roster.push(RosterEntry {
                actor,
                participants,
            });
        }
        roster
    }

    /// Runs one phase across the whole roster; returns the failure count.
    async fn run_phase(phase: ResetPhase, roster: &[RosterEntry]) -> usize {
        let mut failures = 0;
        for entry in roster {
            for participant in &entry.participants {
                let actor = entry.actor.as_ref();
                let result = match phase {
                    ResetPhase::Cleanup => participant.cleanup(actor).await,
                    ResetPhase::Restore => participant.restore(actor).await,
                    ResetPhase::Rebind => participant.rebind(actor).await,
                };
                if let Err(err) = result {
                    warn!(error = %err, "reset phase step failed; continuing pass");
                    failures += 1;
                }
            }
        }
        failures
    }
}

impl std::fmt::Debug for ResetOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResetOrchestrator")
            .field("has_classifier", &self.classifier.is_some())
            .finish_non_exhaustive()
    }
}

/// [`CompletionHook`] that consults the reset policy on the scenes-ready
/// boundary and, when the policy asks for it, runs a full reset pass
/// before the transition reveals.
pub struct ResetOnScenesReady {
    resets: Arc<ResetOrchestrator>,
    policy: Arc<dyn ResetPolicyResolver>,
    routes: Arc<dyn RouteResolver>,
}

impl ResetOnScenesReady {
    #[must_use]
    pub fn new(
        resets: Arc<ResetOrchestrator>,
        policy: Arc<dyn ResetPolicyResolver>,
        routes: Arc<dyn RouteResolver>,
    ) -> Self {
        Self {
            resets,
            policy,
            routes,
        }
    }
}

#[async_trait]
impl CompletionHook for ResetOnScenesReady {
    async fn wait_for_completion(&self, context: &TransitionContext) -> Result<(), HookError> {
        let definition = context
            .route
            .as_ref()
            .and_then(|route| self.routes.try_resolve(route));
        let decision = self
            .policy
            .resolve(context.route.as_ref(), definition.as_ref(), context);
        if !decision.should_reset {
            debug!(
                signature = %context.signature,
                source = %decision.source,
                "reset policy declined reset for transition"
            );
            return Ok(());
        }
        info!(
            signature = %context.signature,
            source = %decision.source,
            reason = %decision.reason,
            "reset policy requested reset for transition"
        );
        let outcome = self
            .resets
            .request_reset(ResetRequest::all(decision.reason))
            .await;
        if !outcome.ran() {
            warn!(
                signature = %context.signature,
                "transition-bound reset dropped (reset already in flight)"
            );
        }
        Ok(())
    }
}
