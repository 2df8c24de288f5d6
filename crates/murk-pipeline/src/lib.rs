//! Frame orchestration of the murk volumetric fog.
//!
//! Each frame runs a fixed sequence of GPU passes over a camera-aligned
//! froxel grid: sun radiance, medium injection (one primary dispatch plus one
//! per visible shadow-casting spot light), front-to-back inscatter
//! integration, an optional spatial filter and a fullscreen compose.
//! [`plan_frame`] describes that sequence as data and [`FogPipeline`]
//! executes it.

pub mod error;
pub mod frame;
pub mod orchestrator;
pub mod passes;
pub mod plan;
#[cfg(test)]
mod reference;
pub mod shaders;
pub mod shadow;
pub mod tracker;
pub mod uniforms;

pub use error::PipelineError;
pub use frame::FrameState;
pub use orchestrator::{FogPipeline, FrameTargets, STATS_INTERVAL};
pub use plan::{FramePlan, InjectionKind, InjectionStep, PassStep, PlanInputs, VolumeTarget, plan_frame};
pub use shadow::{NoShadows, ShadowProvider, SunShadow, spot_view_projection};
pub use tracker::{SettingsChange, SettingsTracker};
pub use uniforms::{FogUniforms, InjectionUniforms, SunLight};
