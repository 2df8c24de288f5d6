//! Change detection for settings that force GPU regeneration.

use murk_config::{FogSettings, VolumeResolution};
use murk_render::FogCamera;
use murk_scene::{DepthStepParams, NoiseParams};

/// The most expensive regeneration a settings change requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsChange {
    None,
    /// Depth slicing moved; rewrite the depth table in place.
    DepthSteps,
    /// Cloud noise inputs changed; regenerate only the noise LUT.
    Noise,
    /// The tier changed; reallocate everything sized by it.
    Resolution,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DepthKey {
    near: f32,
    far: f32,
    params: DepthStepParams,
}

/// Remembers the last values that sized or seeded GPU resources.
#[derive(Debug, Default, Clone)]
pub struct SettingsTracker {
    resolution: Option<VolumeResolution>,
    noise: Option<NoiseParams>,
    depth: Option<DepthKey>,
}

impl SettingsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare against the last observation and remember the new values.
    /// A given change is reported exactly once.
    pub fn observe(
        &mut self,
        settings: &FogSettings,
        camera: &FogCamera,
        depth_params: &DepthStepParams,
    ) -> SettingsChange {
        let noise = NoiseParams::from_settings(settings);
        let depth = DepthKey {
            near: camera.near,
            far: camera.far,
            params: *depth_params,
        };

        let change = if self.resolution != Some(settings.volume_resolution) {
            SettingsChange::Resolution
        } else if self.noise != Some(noise) {
            SettingsChange::Noise
        } else if self.depth != Some(depth) {
            SettingsChange::DepthSteps
        } else {
            SettingsChange::None
        };

        self.resolution = Some(settings.volume_resolution);
        self.noise = Some(noise);
        self.depth = Some(depth);
        change
    }

    /// Forget everything so the next observation reports a full rebuild.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
