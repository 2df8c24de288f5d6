//! Scene extraction errors.

/// Errors reported by the scene buffer manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    /// No directional light carries the fog light attachment. Sun-dependent
    /// passes contribute nothing until one is added and lights are re-extracted.
    #[error("no directional light with a fog light attachment found; sun passes disabled")]
    MissingSun,
}
