//! Configuration for the murk volumetric fog pipeline.
//!
//! [`FogSettings`] is the live parameter surface read by the pipeline each
//! frame. [`MurkConfig`] wraps it for RON persistence alongside demo and
//! debug settings, with CLI overrides via clap and hot-reload detection.

mod cli;
mod config;
mod error;
mod settings;

pub use cli::CliArgs;
pub use config::{DebugConfig, DemoConfig, MurkConfig, default_config_dir};
pub use error::ConfigError;
pub use settings::{
    FogSettings, LogBlur, SuperSampling, TemporalFilter, VolumeFiltering, VolumeMode,
    VolumeResolution, VolumeShape,
};
