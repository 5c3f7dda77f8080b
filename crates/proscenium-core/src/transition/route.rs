//! Route catalog and policy collaborator interfaces.
//!
//! Routes are named, catalog-resolved bundles of scenes to load/unload
//! plus a target active scene. How routes are authored and validated is
//! out of scope here; the pipeline only consumes the resolver interface.

use serde::{Deserialize, Serialize};

use super::{StyleId, TransitionContext, TransitionProfile};

/// Identifier of a catalog route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteId(String);

impl RouteId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RouteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved route: concrete scene lists plus the target active scene.
///
/// `target_active_scene` must be non-empty; an empty target is a fatal
/// configuration error at admission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDefinition {
    pub scenes_to_load: Vec<String>,
    pub scenes_to_unload: Vec<String>,
    pub target_active_scene: String,
    /// Style to use when the request does not override it.
    pub style: Option<StyleId>,
    /// Profile to use when the request does not override it.
    pub profile: Option<TransitionProfile>,
}

/// Resolves route identifiers against the catalog.
pub trait RouteResolver: Send + Sync {
    /// Returns the definition for `route`, or `None` when the route is
    /// not in the catalog (a fatal configuration error for the caller).
    fn try_resolve(&self, route: &RouteId) -> Option<RouteDefinition>;
}

/// Verdict of a policy or guard check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyDecision {
    Allow,
    Deny { reason: String },
}

impl PolicyDecision {
    /// Denial with a reason.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// General navigation policy consulted for every admitted transition.
pub trait NavigationPolicy: Send + Sync {
    fn evaluate(&self, context: &TransitionContext) -> PolicyDecision;
}

/// Policy that allows everything; the composition-time default.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllPolicy;

impl NavigationPolicy for AllowAllPolicy {
    fn evaluate(&self, _context: &TransitionContext) -> PolicyDecision {
        PolicyDecision::Allow
    }
}

/// Per-route guard consulted after the navigation policy for route-based
/// requests only.
pub trait RouteGuard: Send + Sync {
    fn evaluate(&self, definition: &RouteDefinition, context: &TransitionContext)
        -> PolicyDecision;
}

/// Whether and why a reset should participate in a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetPolicyDecision {
    pub should_reset: bool,
    /// Which policy layer produced the decision ("route", "default").
    pub source: String,
    pub reason: String,
}

impl ResetPolicyDecision {
    /// Decision not to reset.
    #[must_use]
    pub fn no_reset(source: impl Into<String>) -> Self {
        Self {
            should_reset: false,
            source: source.into(),
            reason: String::new(),
        }
    }

    /// Decision to reset.
    #[must_use]
    pub fn reset(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            should_reset: true,
            source: source.into(),
            reason: reason.into(),
        }
    }
}

/// Resolves whether a reset pass should run for a transition.
pub trait ResetPolicyResolver: Send + Sync {
    fn resolve(
        &self,
        route: Option<&RouteId>,
        definition: Option<&RouteDefinition>,
        context: &TransitionContext,
    ) -> ResetPolicyDecision;
}

/// In-memory route resolver backed by a static table. Intended for
/// composition in tests and small hosts; real catalogs implement
/// [`RouteResolver`] directly.
#[derive(Debug, Default)]
pub struct StaticRouteResolver {
    routes: std::collections::HashMap<RouteId, RouteDefinition>,
}

impl StaticRouteResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route to the table.
    #[must_use]
    pub fn with_route(mut self, id: RouteId, definition: RouteDefinition) -> Self {
        self.routes.insert(id, definition);
        self
    }
}

impl RouteResolver for StaticRouteResolver {
    fn try_resolve(&self, route: &RouteId) -> Option<RouteDefinition> {
        self.routes.get(route).cloned()
    }
}
