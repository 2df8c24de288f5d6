//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::MurkConfig;
use crate::settings::VolumeResolution;

/// murk command-line arguments.
///
/// CLI values override settings loaded from `murk.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "murk", about = "Headless volumetric fog demo")]
pub struct CliArgs {
    /// Volume resolution tier (0-15).
    #[arg(long)]
    pub resolution_tier: Option<u8>,

    /// Number of frames to render.
    #[arg(long)]
    pub frames: Option<u32>,

    /// Output width.
    #[arg(long)]
    pub width: Option<u32>,

    /// Output height.
    #[arg(long)]
    pub height: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl MurkConfig {
    /// Apply CLI overrides to a loaded config.
    ///
    /// An out-of-range resolution tier is reported and the loaded tier is kept.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(tier) = args.resolution_tier {
            match VolumeResolution::try_from(tier) {
                Ok(resolution) => self.fog.volume_resolution = resolution,
                Err(e) => log::warn!("{e}; keeping {:?}", self.fog.volume_resolution),
            }
        }
        if let Some(frames) = args.frames {
            self.demo.frames = frames;
        }
        if let Some(w) = args.width {
            self.demo.width = w;
        }
        if let Some(h) = args.height {
            self.demo.height = h;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
