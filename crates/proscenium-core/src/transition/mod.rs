//! Scene transition request/context types and the execution pipeline.
//!
//! A [`TransitionRequest`] describes a desired scene change either as
//! inline load/unload lists or as a catalog [`RouteId`]. Admission turns
//! it into an immutable [`TransitionContext`] carrying a deterministic
//! signature used for deduplication and log correlation. The
//! [`pipeline::TransitionPipeline`] executes one admitted context at a
//! time; see the pipeline module for the step sequence and failure
//! semantics.

pub mod pipeline;
pub mod route;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

pub use pipeline::{
    DropReason, HookChain, NoopCompletionHook, TransitionConfig, TransitionError,
    TransitionOutcome, TransitionPipeline, DEFAULT_DEDUPE_WINDOW,
};
pub use route::{
    AllowAllPolicy, NavigationPolicy, PolicyDecision, ResetPolicyDecision, ResetPolicyResolver,
    RouteDefinition, RouteGuard, RouteId, RouteResolver, StaticRouteResolver,
};

/// Identifier of a visual transition style (which fade/curtain visual the
/// renderer should present).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleId(String);

impl StyleId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StyleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Timing profile applied to the fade renderer for a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionProfile {
    /// Profile name, part of the transition signature.
    pub name: String,
    /// Fade duration in milliseconds.
    pub fade_duration_ms: u64,
    /// How long the screen stays covered between fade-in and fade-out.
    pub hold_ms: u64,
}

impl TransitionProfile {
    /// A conservative default profile (250 ms fade, no hold).
    #[must_use]
    pub fn standard() -> Self {
        Self {
            name: "standard".to_string(),
            fade_duration_ms: 250,
            hold_ms: 0,
        }
    }
}

/// Immutable description of a requested scene transition.
///
/// Either the inline scene lists or `route` must be present; a request
/// with neither is rejected at admission. A resolved style and profile
/// must both be available (from the request or the route definition)
/// before execution begins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    /// Scenes to load, in order.
    pub scenes_to_load: Vec<String>,
    /// Scenes to unload, in order.
    pub scenes_to_unload: Vec<String>,
    /// Scene to make active once loads finish.
    pub target_active_scene: Option<String>,
    /// Catalog route to resolve into scene lists, instead of inline lists.
    pub route: Option<RouteId>,
    /// Visual style override; falls back to the route definition's style.
    pub style: Option<StyleId>,
    /// Timing profile override; falls back to the route definition's.
    pub profile: Option<TransitionProfile>,
    /// Whether to drive the fade renderer around the scene operations.
    pub use_fade: bool,
    /// Free-text reason for logs.
    pub reason: String,
    /// Identity of the requesting caller for logs.
    pub requested_by: String,
}

impl TransitionRequest {
    /// Request resolving a catalog route.
    #[must_use]
    pub fn for_route(
        route: RouteId,
        reason: impl Into<String>,
        requested_by: impl Into<String>,
    ) -> Self {
        Self {
            route: Some(route),
            use_fade: true,
            reason: reason.into(),
            requested_by: requested_by.into(),
            ..Self::default()
        }
    }

    /// Request with inline scene lists.
    #[must_use]
    pub fn for_scenes(
        scenes_to_load: Vec<String>,
        scenes_to_unload: Vec<String>,
        target_active_scene: Option<String>,
        reason: impl Into<String>,
        requested_by: impl Into<String>,
    ) -> Self {
        Self {
            scenes_to_load,
            scenes_to_unload,
            target_active_scene,
            use_fade: true,
            reason: reason.into(),
            requested_by: requested_by.into(),
            ..Self::default()
        }
    }

    /// Sets the visual style.
    #[must_use]
    pub fn with_style(mut self, style: StyleId) -> Self {
        self.style = Some(style);
        self
    }

    /// Sets the timing profile.
    #[must_use]
    pub fn with_profile(mut self, profile: TransitionProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Enables or disables the fade steps.
    #[must_use]
    pub const fn with_fade(mut self, use_fade: bool) -> Self {
        self.use_fade = use_fade;
        self
    }
}

/// Immutable, admitted snapshot of a transition request.
///
/// Created once per accepted request; never mutated afterwards. The
/// `signature` is a SHA-256 digest over the identity fields
/// (route/style/profile/scene lists/fade flag) and is stable across
/// resubmissions of the same request, which is what the dedupe window
/// keys on. `correlation_id` is unique per admission for log tracing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionContext {
    pub correlation_id: String,
    pub signature: String,
    pub scenes_to_load: Vec<String>,
    pub scenes_to_unload: Vec<String>,
    pub target_active_scene: Option<String>,
    pub route: Option<RouteId>,
    pub style: StyleId,
    pub profile: TransitionProfile,
    pub use_fade: bool,
    pub reason: String,
    pub requested_by: String,
}

impl TransitionContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        scenes_to_load: Vec<String>,
        scenes_to_unload: Vec<String>,
        target_active_scene: Option<String>,
        route: Option<RouteId>,
        style: StyleId,
        profile: TransitionProfile,
        use_fade: bool,
        reason: String,
        requested_by: String,
    ) -> Self {
        let signature = compute_signature(
            route.as_ref(),
            &style,
            &profile,
            &scenes_to_load,
            &scenes_to_unload,
            target_active_scene.as_deref(),
            use_fade,
        );
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            signature,
            scenes_to_load,
            scenes_to_unload,
            target_active_scene,
            route,
            style,
            profile,
            use_fade,
            reason,
            requested_by,
        }
    }
}

/// Computes the deterministic transition signature.
///
/// Fields are fed through the hasher with a unit separator so that list
/// boundaries cannot alias (`["a", "bc"]` vs `["ab", "c"]`).
fn compute_signature(
    route: Option<&RouteId>,
    style: &StyleId,
    profile: &TransitionProfile,
    scenes_to_load: &[String],
    scenes_to_unload: &[String],
    target_active_scene: Option<&str>,
    use_fade: bool,
) -> String {
    const SEP: &[u8] = b"\x1f";
    let mut hasher = Sha256::new();
    hasher.update(route.map_or("-", RouteId::as_str).as_bytes());
    hasher.update(SEP);
    hasher.update(style.as_str().as_bytes());
    hasher.update(SEP);
    hasher.update(profile.name.as_bytes());
    hasher.update(SEP);
    for scene in scenes_to_load {
        hasher.update(scene.as_bytes());
        hasher.update(SEP);
    }
    hasher.update(b"\x1e");
    for scene in scenes_to_unload {
        hasher.update(scene.as_bytes());
        hasher.update(SEP);
    }
    hasher.update(b"\x1e");
    hasher.update(target_active_scene.unwrap_or("-").as_bytes());
    hasher.update(SEP);
    hasher.update([u8::from(use_fade)]);
    hex::encode(hasher.finalize())
}

/// Error surfaced by a [`CompletionHook`]. Hook failures are best-effort:
/// the pipeline logs and swallows them.
#[derive(Debug, Clone, Error)]
#[error("completion hook '{hook}' failed: {detail}")]
pub struct HookError {
    pub hook: String,
    pub detail: String,
}

/// Pluggable long-running precondition awaited between the scenes-ready
/// milestone and the fade-out. The default is a no-op; a completion gate
/// or a reset pass plugs in here.
#[async_trait]
pub trait CompletionHook: Send + Sync {
    async fn wait_for_completion(&self, context: &TransitionContext) -> Result<(), HookError>;
}
