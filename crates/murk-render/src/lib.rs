//! GPU plumbing shared by the murk fog crates.
//!
//! Headless device setup, the camera collaborator, frustum math, explicit
//! ping-pong pairs and helpers for 3D volume textures, compute pipelines and
//! fullscreen passes.

pub mod camera;
pub mod compute;
pub mod frustum;
pub mod fullscreen;
pub mod gpu;
pub mod ping_pong;
pub mod texture;

pub use camera::FogCamera;
pub use compute::{create_compute_pipeline, dispatch, workgroup_count};
pub use frustum::{Frustum, Sphere};
pub use fullscreen::{FULLSCREEN_VERTEX_SOURCE, create_fullscreen_pipeline, run_fullscreen_pass};
pub use gpu::{GpuContext, GpuContextError, init_headless_blocking};
pub use ping_pong::PingPong;
pub use texture::{VolumeTexture, texture_bytes};
