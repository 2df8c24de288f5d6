//! Scene buffer management for the fog pipeline.
//!
//! Extracts fog-participating lights and volumes from the host scene, keeps
//! their visibility up to date through bounding-sphere culling events, packs
//! the visible set into GPU records, and owns every texture and buffer whose
//! size depends on the froxel resolution.

pub mod buffers;
pub mod culling;
pub mod depth_steps;
pub mod entity;
pub mod error;
pub mod gpu_array;
pub mod noise_lut;
pub mod records;
pub mod resources;
pub mod stats;

pub use buffers::SceneBuffers;
pub use culling::{CullTarget, VisibilityCuller, VisibilityEvent};
pub use depth_steps::{DepthStepParams, generate_depth_steps};
pub use entity::{EntityId, FogLight, FogScene, FogVolume, LightKind, LightSource, SceneSnapshot};
pub use error::SceneError;
pub use gpu_array::GpuArray;
pub use noise_lut::{NOISE_LUT_SIZE, NoiseParams, generate_noise_lut};
pub use records::{
    BoxVolumeRecord, DepthStepRecord, EllipsoidVolumeRecord, LightRecords, PointLightRecord,
    ShadowedSpot, SpotLightRecord, VolumeRecord, VolumeRecords,
};
pub use resources::VolumeResources;
pub use stats::{SceneStats, TextureMemoryStats};
