use murk_scene::SceneError;

/// Errors surfaced by the fog pipeline to its host.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A GPU allocation failed while (re)building resources.
    #[error("GPU out of memory while {0}")]
    OutOfMemory(String),

    /// wgpu rejected a resource or pipeline created by the fog pipeline.
    #[error("GPU validation failed while {context}: {message}")]
    Validation { context: String, message: String },

    /// The scene is misconfigured.
    #[error("scene error: {0}")]
    Scene(#[from] SceneError),

    /// `render` or `update` ran before `initialize`.
    #[error("fog pipeline is not initialized")]
    NotInitialized,
}
