//! Uniform blocks shared by the fog passes.
//!
//! Every field is a `vec4` or `mat4x4` so the Rust and WGSL layouts agree
//! without padding rules. The matching WGSL structs live in
//! [`crate::shaders::COMMON_SHADER_SOURCE`].

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use murk_config::FogSettings;
use murk_filter::ESM_EXPONENT;
use murk_render::FogCamera;
use murk_scene::{LightSource, ShadowedSpot};

use crate::frame::FrameState;

/// Host-side view of the sun's cascades, without the texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeInfo {
    pub count: u32,
    pub splits: [f32; 4],
    pub shadow_distance: f32,
    pub resolution: u32,
}

/// Record counts bound this frame. Empty categories are bound as
/// placeholders and report 0 here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordCounts {
    pub points: u32,
    pub spots: u32,
    pub boxes: u32,
    pub ellipsoids: u32,
}

/// Everything [`FogUniforms::new`] reads.
pub struct UniformInputs<'a> {
    pub camera: &'a FogCamera,
    pub settings: &'a FogSettings,
    pub frame: &'a FrameState,
    pub dims: [u32; 3],
    pub march_length: f32,
    pub sun: Option<&'a LightSource>,
    pub cascades: Option<CascadeInfo>,
    pub shadow_filtered: bool,
    pub counts: RecordCounts,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct FogUniforms {
    pub view_projection: [[f32; 4]; 4],
    pub inverse_view_projection: [[f32; 4]; 4],
    pub previous_view_projection: [[f32; 4]; 4],
    /// xyz position, w near.
    pub camera_position: [f32; 4],
    /// xyz forward, w far.
    pub camera_forward: [f32; 4],
    /// xyz froxel dims, w frame.
    pub volume: [u32; 4],
    /// Point, spot, box and ellipsoid record counts.
    pub counts: [u32; 4],
    /// Sun present, shadow mode (0 raw, 1 exponential), cascade count,
    /// samples per voxel.
    pub flags: [u32; 4],
    /// March length, jitter, history weight, shadow distance.
    pub march: [f32; 4],
    /// xyz direction the sunlight travels, w intensity.
    pub sun_direction: [f32; 4],
    /// rgb sun color, w shadow strength.
    pub sun_color: [f32; 4],
    /// Bias, ESM exponent, shadow atlas resolution.
    pub shadow_params: [f32; 4],
    pub cascade_splits: [f32; 4],
    /// rgb ambient, w absorption.
    pub ambient: [f32; 4],
    /// rgb atmosphere, w scattering.
    pub atmosphere: [f32; 4],
    pub shadow_color: [f32; 4],
    /// Atmosphere anisotropy, radial lobe, sun anisotropy, radial blend.
    pub phase: [f32; 4],
    /// Bottom, top, bottom density, top density.
    pub height: [f32; 4],
    /// Influence, start, end, start density.
    pub ramp: [f32; 4],
    /// Ramp end density, global density, depth attenuation, analytical fog.
    pub density: [f32; 4],
    /// Enabled, size, occlusion enabled, occlusion strength.
    pub clouds: [f32; 4],
    /// Bottom height, top height, bottom influence, top influence.
    pub clouds_shape: [f32; 4],
    /// Bottom fade, top fade, occlusion ray distance, spacing (< 0 off).
    pub clouds_fade: [f32; 4],
    /// xyz spacing frequency, w outline strength.
    pub clouds_spacing: [f32; 4],
    /// xyz wind scroll, w outline radius.
    pub wind_offset: [f32; 4],
    pub cloud_direct_color: [f32; 4],
    /// Volumetric, analytical, volumetric sky, analytical sky.
    pub clamps: [f32; 4],
}

fn vec4(v: [f32; 3], w: f32) -> [f32; 4] {
    [v[0], v[1], v[2], w]
}

fn flag(on: bool) -> f32 {
    if on { 1.0 } else { 0.0 }
}

impl FogUniforms {
    pub fn new(inputs: &UniformInputs<'_>) -> Self {
        let UniformInputs {
            camera,
            settings: s,
            frame,
            dims,
            march_length,
            sun,
            cascades,
            shadow_filtered,
            counts,
        } = *inputs;

        let view_projection = camera.view_projection_matrix();
        let sun_light = SunLight::from_source(sun);
        let cascades = cascades.unwrap_or(CascadeInfo {
            count: 0,
            splits: [0.0; 4],
            shadow_distance: camera.far,
            resolution: 1,
        });
        let history_weight = if frame.has_history() {
            s.temporal_filter.history_weight()
        } else {
            0.0
        };

        Self {
            view_projection: view_projection.to_cols_array_2d(),
            inverse_view_projection: view_projection.inverse().to_cols_array_2d(),
            previous_view_projection: frame
                .previous_view_projection
                .unwrap_or(view_projection)
                .to_cols_array_2d(),
            camera_position: vec4(camera.position.to_array(), camera.near),
            camera_forward: vec4(camera.forward().to_array(), camera.far),
            volume: [dims[0], dims[1], dims[2], frame.frame],
            counts: [counts.points, counts.spots, counts.boxes, counts.ellipsoids],
            flags: [
                u32::from(sun_light.present),
                u32::from(shadow_filtered),
                cascades.count,
                s.super_sampling.samples(),
            ],
            march: [
                march_length,
                frame.jitter(s.temporal_filter),
                history_weight,
                cascades.shadow_distance,
            ],
            sun_direction: vec4(sun_light.direction.to_array(), sun_light.intensity),
            sun_color: vec4(sun_light.color.to_array(), s.shadow),
            shadow_params: [s.shadow_bias, ESM_EXPONENT, cascades.resolution as f32, 0.0],
            cascade_splits: cascades.splits,
            ambient: vec4(s.ambient_color, s.absorption),
            atmosphere: vec4(s.atmosphere_color, s.scattering),
            shadow_color: vec4(s.shadow_color, 0.0),
            phase: [
                s.anisotropy_atmosphere,
                s.radial_lobe,
                s.anisotropy_sun,
                s.radial_blend,
            ],
            height: [s.height_bottom, s.height_top, s.density_bottom, s.density_top],
            ramp: [s.ramp_influence, s.ramp_start, s.ramp_end, s.ramp_start_density],
            density: [
                s.ramp_end_density,
                s.global_density,
                s.depth_attenuation,
                flag(s.analytical_fog),
            ],
            clouds: [
                flag(s.clouds),
                s.clouds_size,
                flag(s.clouds_occlusion),
                s.occlusion_strength,
            ],
            clouds_shape: [
                s.clouds_height_bottom,
                s.clouds_height_top,
                s.clouds_influence_bottom,
                s.clouds_influence_top,
            ],
            clouds_fade: [
                s.clouds_fade_bottom_height,
                s.clouds_fade_top_height,
                s.occlusion_ray_distance,
                if s.cloud_spacing { s.clouds_spacing } else { -1.0 },
            ],
            clouds_spacing: vec4(s.clouds_spacing_frequency, s.outline_strength),
            wind_offset: vec4(frame.wind_offset, s.outline_radius),
            cloud_direct_color: vec4(s.cloud_direct_color, 0.0),
            clamps: [
                s.volumetric_fog_clamp,
                s.analytical_fog_clamp,
                s.volumetric_fog_sky_clamp,
                s.analytical_fog_sky_clamp,
            ],
        }
    }

    pub fn sun_present(&self) -> bool {
        self.flags[0] != 0
    }

    pub fn sun_intensity(&self) -> f32 {
        self.sun_direction[3]
    }
}

/// The sun as the shaders see it. Missing suns are black and absent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunLight {
    pub present: bool,
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl SunLight {
    pub fn from_source(sun: Option<&LightSource>) -> Self {
        match sun.and_then(|light| light.fog_light.map(|fog| (light, fog))) {
            Some((light, fog)) => Self {
                present: true,
                direction: light.direction.normalize_or_zero(),
                color: light.color,
                intensity: light.intensity * fog.intensity,
            },
            None => Self {
                present: false,
                direction: Vec3::NEG_Y,
                color: Vec3::ZERO,
                intensity: 0.0,
            },
        }
    }
}

/// Per-dispatch parameters of the injection chain.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct InjectionUniforms {
    pub spot_view_projection: [[f32; 4]; 4],
    /// xyz position, w intensity.
    pub spot_position: [f32; 4],
    /// rgb color, w range.
    pub spot_color: [f32; 4],
    /// xyz direction, w cosine of the half angle.
    pub spot_direction: [f32; 4],
    /// Cone softness, range softness.
    pub spot_attenuation: [f32; 4],
    /// Reproject, shadowed spot.
    pub flags: [u32; 4],
}

impl InjectionUniforms {
    pub fn primary(reproject: bool) -> Self {
        Self {
            spot_view_projection: Mat4::IDENTITY.to_cols_array_2d(),
            flags: [u32::from(reproject), 0, 0, 0],
            ..Default::default()
        }
    }

    pub fn shadowed_spot(spot: &ShadowedSpot, view_projection: Mat4, reproject: bool) -> Self {
        let r = &spot.record;
        Self {
            spot_view_projection: view_projection.to_cols_array_2d(),
            spot_position: vec4(r.position, r.intensity),
            spot_color: vec4(r.color, r.range),
            spot_direction: vec4(r.direction, r.angle_cos),
            spot_attenuation: [r.attenuation[0], r.attenuation[1], 0.0, 0.0],
            flags: [u32::from(reproject), 1, 0, 0],
        }
    }
}
