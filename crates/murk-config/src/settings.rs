//! Fog parameter surface and the enumerations it is built from.
//!
//! [`FogSettings`] is live host state: the pipeline reads it by reference on
//! every `update`/`render` call. It also serializes to RON as part of
//! [`crate::MurkConfig`] so hosts can persist a look between runs.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Froxel grid resolution preset.
///
/// Each tier maps to one fixed `(width, height, depth)` triple; see
/// [`VolumeResolution::dimensions`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeResolution {
    Tier0,
    Tier1,
    Tier2,
    Tier3,
    Tier4,
    Tier5,
    Tier6,
    #[default]
    Tier7,
    Tier8,
    Tier9,
    Tier10,
    Tier11,
    Tier12,
    Tier13,
    Tier14,
    Tier15,
}

impl VolumeResolution {
    /// Every tier in index order.
    pub const ALL: [VolumeResolution; 16] = [
        Self::Tier0,
        Self::Tier1,
        Self::Tier2,
        Self::Tier3,
        Self::Tier4,
        Self::Tier5,
        Self::Tier6,
        Self::Tier7,
        Self::Tier8,
        Self::Tier9,
        Self::Tier10,
        Self::Tier11,
        Self::Tier12,
        Self::Tier13,
        Self::Tier14,
        Self::Tier15,
    ];

    /// Froxel grid size as `[width, height, depth]`.
    pub const fn dimensions(self) -> [u32; 3] {
        match self {
            Self::Tier0 => [96, 56, 64],
            Self::Tier1 => [112, 64, 64],
            Self::Tier2 => [128, 72, 64],
            Self::Tier3 => [128, 88, 64],
            Self::Tier4 => [160, 96, 64],
            Self::Tier5 => [192, 112, 64],
            Self::Tier6 => [160, 96, 72],
            Self::Tier7 => [160, 96, 92],
            Self::Tier8 => [160, 96, 128],
            Self::Tier9 => [192, 112, 128],
            Self::Tier10 => [256, 144, 64],
            Self::Tier11 => [256, 144, 96],
            Self::Tier12 => [320, 184, 64],
            Self::Tier13 => [320, 184, 92],
            Self::Tier14 => [256, 144, 128],
            Self::Tier15 => [320, 184, 128],
        }
    }

    /// Position of this tier in [`VolumeResolution::ALL`].
    pub fn index(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for VolumeResolution {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(ConfigError::InvalidResolutionTier(value))
    }
}

/// Strength of the log-space blur applied to the sun's shadow map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogBlur {
    /// Sample the raw shadow depth.
    #[default]
    Off,
    Weak,
    Medium,
    Strong,
}

impl LogBlur {
    /// Tap radius of the separable blur, or `None` when filtering is off.
    pub fn radius(self) -> Option<u32> {
        match self {
            Self::Off => None,
            Self::Weak => Some(1),
            Self::Medium => Some(2),
            Self::Strong => Some(3),
        }
    }
}

/// Ray samples taken per froxel during medium injection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuperSampling {
    #[default]
    Off,
    X2,
    X4,
}

impl SuperSampling {
    pub fn samples(self) -> u32 {
        match self {
            Self::Off => 1,
            Self::X2 => 2,
            Self::X4 => 4,
        }
    }
}

/// Whether the 3D box filter runs over the shading volume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeFiltering {
    #[default]
    Disabled,
    Enabled,
}

impl VolumeFiltering {
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

/// Temporal accumulation strength. Drives the jitter period of the sun
/// radiance pass and the history weight of reprojection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemporalFilter {
    Weak,
    Average,
    Strong,
    #[default]
    Extreme,
}

impl TemporalFilter {
    pub fn strength(self) -> u32 {
        match self {
            Self::Weak => 0,
            Self::Average => 1,
            Self::Strong => 2,
            Self::Extreme => 3,
        }
    }

    /// Length of the jitter cycle in frames.
    pub fn period(self) -> u32 {
        2 + 2 * self.strength()
    }

    /// Weight given to reprojected history when blending.
    pub fn history_weight(self) -> f32 {
        match self {
            Self::Weak => 0.5,
            Self::Average => 0.7,
            Self::Strong => 0.85,
            Self::Extreme => 0.93,
        }
    }
}

/// How a fog volume combines with the surrounding medium.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeMode {
    /// Adds its own absorbing medium.
    #[default]
    Opaque,
    /// Removes global fog and clouds inside the volume.
    CutEverything,
    /// Removes only the cloud noise inside the volume.
    CutClouds,
    /// Removes only the global height density inside the volume.
    CutDensity,
    /// Forces cloud noise inside the volume regardless of cloud heights.
    FillWithClouds,
}

impl VolumeMode {
    /// Integer code shared with the injection shader.
    pub fn code(self) -> u32 {
        match self {
            Self::Opaque => 0,
            Self::CutEverything => 1,
            Self::CutClouds => 2,
            Self::CutDensity => 3,
            Self::FillWithClouds => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeShape {
    #[default]
    Box,
    Ellipsoid,
}

/// Every tunable of the fog pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FogSettings {
    // Quality
    pub volume_resolution: VolumeResolution,
    pub log_blur: LogBlur,
    pub super_sampling: SuperSampling,
    pub volume_filtering: VolumeFiltering,
    pub temporal_filter: TemporalFilter,
    /// Shadow map quality step; resolution is `256 * (quality + 1)`.
    pub shadow_quality: u32,

    // Analytical fog and clamps
    pub analytical_fog: bool,
    /// Fraction of the shadow distance covered by the froxel grid.
    pub render_distance: f32,
    pub volumetric_fog_clamp: f32,
    pub analytical_fog_clamp: f32,
    pub volumetric_fog_sky_clamp: f32,
    pub analytical_fog_sky_clamp: f32,

    // Lighting
    pub shadow_bias: f32,
    pub shadow: f32,
    pub absorption: f32,
    pub scattering: f32,
    pub ambient_color: [f32; 3],
    pub atmosphere_color: [f32; 3],
    pub shadow_color: [f32; 3],
    pub anisotropy_atmosphere: f32,
    pub radial_lobe: f32,
    pub anisotropy_sun: f32,
    pub radial_blend: f32,

    // Height distribution
    pub global_density: f32,
    pub height_bottom: f32,
    pub height_top: f32,
    pub density_bottom: f32,
    pub density_top: f32,
    pub ramp_influence: f32,
    pub ramp_start: f32,
    pub ramp_end: f32,
    pub ramp_start_density: f32,
    pub ramp_end_density: f32,

    // Clouds
    pub clouds: bool,
    pub clouds_occlusion: bool,
    pub occlusion_ray_distance: f32,
    pub occlusion_strength: f32,
    pub outline_strength: f32,
    pub outline_radius: f32,
    pub cloud_direct_color: [f32; 3],
    pub clouds_size: f32,
    pub clouds_frequency: [f32; 3],
    pub clouds_density_scale: f32,
    pub cloud_spacing: bool,
    pub clouds_spacing: f32,
    pub clouds_spacing_frequency: [f32; 3],
    pub clouds_height_bottom: f32,
    pub clouds_height_top: f32,
    pub clouds_influence_bottom: f32,
    pub clouds_influence_top: f32,
    pub clouds_fade_bottom_height: f32,
    pub clouds_fade_top_height: f32,
    pub wind_velocity: [f32; 3],

    pub depth_attenuation: f32,
    /// Log visibility and memory statistics periodically.
    pub debug_performance: bool,
}

impl Default for FogSettings {
    fn default() -> Self {
        Self {
            volume_resolution: VolumeResolution::Tier7,
            log_blur: LogBlur::Off,
            super_sampling: SuperSampling::Off,
            volume_filtering: VolumeFiltering::Disabled,
            temporal_filter: TemporalFilter::Extreme,
            shadow_quality: 3,

            analytical_fog: true,
            render_distance: 1.0,
            volumetric_fog_clamp: 1.0,
            analytical_fog_clamp: 0.05,
            volumetric_fog_sky_clamp: 1.0,
            analytical_fog_sky_clamp: 1.0,

            shadow_bias: 0.0,
            shadow: 1.0,
            absorption: 0.5,
            scattering: 1.0,
            ambient_color: [0.0, 0.258, 0.345],
            atmosphere_color: [1.0, 0.0, 0.435],
            shadow_color: [0.0, 0.0, 0.0],
            anisotropy_atmosphere: 0.58,
            radial_lobe: 0.96,
            anisotropy_sun: 0.585,
            radial_blend: 0.4,

            global_density: 50.0,
            height_bottom: -10.0,
            height_top: 500.0,
            density_bottom: 1.0,
            density_top: 1.0,
            ramp_influence: 0.0,
            ramp_start: 0.0,
            ramp_end: 1.0,
            ramp_start_density: 1.0,
            ramp_end_density: 1.0,

            clouds: false,
            clouds_occlusion: false,
            occlusion_ray_distance: 0.01,
            occlusion_strength: 10.0,
            outline_strength: 1.0,
            outline_radius: 1.0,
            cloud_direct_color: [1.0, 1.0, 1.0],
            clouds_size: 0.01,
            clouds_frequency: [1.0, 1.0, 1.0],
            clouds_density_scale: 1.0,
            cloud_spacing: false,
            clouds_spacing: 0.5,
            clouds_spacing_frequency: [1.0, 1.0, 1.0],
            clouds_height_bottom: 20.0,
            clouds_height_top: 100.0,
            clouds_influence_bottom: 0.5,
            clouds_influence_top: 0.5,
            clouds_fade_bottom_height: 20.0,
            clouds_fade_top_height: 20.0,
            wind_velocity: [1.0, 0.0, 0.0],

            depth_attenuation: 0.5,
            debug_performance: false,
        }
    }
}

impl FogSettings {
    /// Side length of a square shadow map for the configured quality.
    pub fn shadow_resolution(&self) -> u32 {
        256 * (self.shadow_quality + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_tiers_map_to_documented_dimensions() {
        let expected: [[u32; 3]; 16] = [
            [96, 56, 64],
            [112, 64, 64],
            [128, 72, 64],
            [128, 88, 64],
            [160, 96, 64],
            [192, 112, 64],
            [160, 96, 72],
            [160, 96, 92],
            [160, 96, 128],
            [192, 112, 128],
            [256, 144, 64],
            [256, 144, 96],
            [320, 184, 64],
            [320, 184, 92],
            [256, 144, 128],
            [320, 184, 128],
        ];
        for (tier, dims) in VolumeResolution::ALL.iter().zip(expected) {
            assert_eq!(tier.dimensions(), dims, "tier {tier:?} has wrong dimensions");
        }
    }

    #[test]
    fn test_tier_index_roundtrips_through_try_from() {
        for tier in VolumeResolution::ALL {
            assert_eq!(VolumeResolution::try_from(tier.index()).unwrap(), tier);
        }
    }

    #[test]
    fn test_out_of_range_tier_is_rejected() {
        let err = VolumeResolution::try_from(16).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidResolutionTier(16)));
    }

    #[test]
    fn test_default_tier_is_160x96x92() {
        assert_eq!(
            FogSettings::default().volume_resolution.dimensions(),
            [160, 96, 92]
        );
    }

    #[test]
    fn test_temporal_period_grows_with_strength() {
        assert_eq!(TemporalFilter::Weak.period(), 2);
        assert_eq!(TemporalFilter::Average.period(), 4);
        assert_eq!(TemporalFilter::Strong.period(), 6);
        assert_eq!(TemporalFilter::Extreme.period(), 8);
    }

    #[test]
    fn test_log_blur_radius_per_preset() {
        assert_eq!(LogBlur::Off.radius(), None);
        assert_eq!(LogBlur::Weak.radius(), Some(1));
        assert_eq!(LogBlur::Medium.radius(), Some(2));
        assert_eq!(LogBlur::Strong.radius(), Some(3));
    }

    #[test]
    fn test_super_sampling_counts() {
        assert_eq!(SuperSampling::Off.samples(), 1);
        assert_eq!(SuperSampling::X2.samples(), 2);
        assert_eq!(SuperSampling::X4.samples(), 4);
    }

    #[test]
    fn test_shadow_resolution_steps_by_256() {
        let mut settings = FogSettings::default();
        settings.shadow_quality = 0;
        assert_eq!(settings.shadow_resolution(), 256);
        settings.shadow_quality = 3;
        assert_eq!(settings.shadow_resolution(), 1024);
    }

    #[test]
    fn test_volume_mode_codes_are_distinct() {
        let modes = [
            VolumeMode::Opaque,
            VolumeMode::CutEverything,
            VolumeMode::CutClouds,
            VolumeMode::CutDensity,
            VolumeMode::FillWithClouds,
        ];
        for (i, mode) in modes.iter().enumerate() {
            assert_eq!(mode.code(), i as u32);
        }
    }
}
