//! Scene-graph and fade collaborator interfaces.
//!
//! The orchestration core never touches a scene graph or a renderer
//! directly; it drives these narrow interfaces, which the host engine
//! implements. All collaborators are injected at composition time.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::transition::TransitionProfile;

/// Error from a scene load/unload/activate operation.
#[derive(Debug, Clone, Error)]
pub enum SceneError {
    /// Loading a scene failed.
    #[error("scene load failed for '{scene}': {detail}")]
    LoadFailed { scene: String, detail: String },
    /// Unloading a scene failed.
    #[error("scene unload failed for '{scene}': {detail}")]
    UnloadFailed { scene: String, detail: String },
    /// Activating a scene failed.
    #[error("scene activation failed for '{scene}': {detail}")]
    ActivateFailed { scene: String, detail: String },
}

/// Direction of a fade step, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    In,
    Out,
}

impl fmt::Display for FadeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In => f.write_str("in"),
            Self::Out => f.write_str("out"),
        }
    }
}

/// Error from the fade renderer.
#[derive(Debug, Clone, Error)]
#[error("fade {direction} failed: {detail}")]
pub struct FadeError {
    pub direction: FadeDirection,
    pub detail: String,
}

/// Scene-graph loader/unloader/activator.
///
/// `is_loaded` and `active_scene` are synchronous snapshots; the mutating
/// operations are suspension points for the cooperative scheduler.
#[async_trait]
pub trait SceneDirector: Send + Sync {
    /// Returns whether the named scene is currently loaded.
    fn is_loaded(&self, scene: &str) -> bool;

    /// Returns the name of the currently active scene, if any.
    fn active_scene(&self) -> Option<String>;

    /// Loads the named scene.
    async fn load(&self, scene: &str) -> Result<(), SceneError>;

    /// Unloads the named scene.
    async fn unload(&self, scene: &str) -> Result<(), SceneError>;

    /// Attempts to make the named scene active. Returns `false` when the
    /// scene graph refused the activation (scene missing, not loaded).
    async fn try_set_active(&self, scene: &str) -> Result<bool, SceneError>;
}

/// Visual fade renderer driven around scene mutations.
#[async_trait]
pub trait FadeRenderer: Send + Sync {
    /// Applies timing/appearance settings from a transition profile.
    fn configure_from_profile(&self, profile: &TransitionProfile);

    /// Fades the screen out to cover (runs before scene mutations).
    async fn fade_in(&self) -> Result<(), FadeError>;

    /// Fades the screen back in to reveal (runs after the gate resolves).
    async fn fade_out(&self) -> Result<(), FadeError>;
}
