//! CPU mirror of the shading math.
//!
//! These functions follow the WGSL helpers in [`crate::shaders`] line for
//! line. The GPU tests in the orchestrator compare rendered texels against
//! them.

use glam::{Vec3, Vec4};
use murk_config::FogSettings;

use crate::uniforms::SunLight;

pub const DENSITY_SCALE: f32 = 0.001;
/// Extinction of an opaque volume with absorption 1.
pub const OPAQUE_EXTINCTION: f32 = 1000.0;
/// Extinction per unit bottom density of the analytical fog.
pub const ANALYTICAL_EXTINCTION: f32 = 0.002;

pub fn henyey_greenstein(cos_theta: f32, g: f32) -> f32 {
    let g2 = g * g;
    let denom = (1.0 + g2 - 2.0 * g * cos_theta).max(1e-4);
    (1.0 - g2) / (4.0 * std::f32::consts::PI * denom * denom.sqrt())
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Global density at world height `y`; zero outside the height band.
pub fn height_density(settings: &FogSettings, y: f32) -> f32 {
    if y < settings.height_bottom || y > settings.height_top {
        return 0.0;
    }
    let span = (settings.height_top - settings.height_bottom).max(1e-4);
    let f = ((y - settings.height_bottom) / span).clamp(0.0, 1.0);
    settings.density_bottom + (settings.density_top - settings.density_bottom) * f
}

/// Distance ramp at march fraction `t`.
pub fn ramp_factor(settings: &FogSettings, t: f32) -> f32 {
    let s = if settings.ramp_end > settings.ramp_start {
        smoothstep(settings.ramp_start, settings.ramp_end, t)
    } else if t >= settings.ramp_start {
        1.0
    } else {
        0.0
    };
    let r = settings.ramp_start_density
        + (settings.ramp_end_density - settings.ramp_start_density) * s;
    1.0 + (r - 1.0) * settings.ramp_influence
}

/// Extinction of the global medium, before volumes and clouds.
pub fn medium_extinction(settings: &FogSettings, y: f32, t: f32) -> f32 {
    let sigma = settings.global_density * DENSITY_SCALE * (settings.absorption + settings.scattering);
    sigma * height_density(settings, y) * ramp_factor(settings, t)
}

/// Extinction of an opaque volume covering a voxel with weight `w`.
pub fn opaque_extinction(absorption: f32, w: f32) -> f32 {
    (w * absorption).max(0.0) * OPAQUE_EXTINCTION
}

/// Blend between shadow and ambient color by sun visibility.
pub fn shadow_ambient_blend(settings: &FogSettings, visibility: f32) -> Vec3 {
    let shadow = Vec3::from_array(settings.shadow_color);
    let ambient = Vec3::from_array(settings.ambient_color);
    shadow.lerp(ambient, visibility)
}

/// Light scattered towards the camera inside one voxel.
pub fn lit_radiance(
    settings: &FogSettings,
    sun: &SunLight,
    visibility: f32,
    cos_theta: f32,
    local: Vec3,
    occlusion: f32,
) -> Vec3 {
    let base = shadow_ambient_blend(settings, visibility);
    let sun_phase = lerp(
        henyey_greenstein(cos_theta, settings.anisotropy_sun),
        henyey_greenstein(cos_theta, settings.radial_lobe),
        settings.radial_blend,
    );
    let direct = sun.color * sun.intensity * visibility;
    let atmosphere = Vec3::from_array(settings.atmosphere_color)
        * henyey_greenstein(cos_theta, settings.anisotropy_atmosphere)
        * sun.intensity
        * visibility;
    base + (direct * sun_phase * occlusion + atmosphere) * settings.scattering + local
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// One froxel along a view column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceSample {
    /// Medium extinction before depth attenuation.
    pub extinction: f32,
    pub tint: Vec3,
    /// Output of [`lit_radiance`].
    pub lit: Vec3,
    /// World length of the slice along the ray.
    pub length: f32,
}

/// Front-to-back integration of a column. Each output is
/// `(inscatter rgb, transmittance)` after that slice.
pub fn integrate_column(settings: &FogSettings, samples: &[SliceSample]) -> Vec<Vec4> {
    let depth = samples.len().max(1) as f32;
    let mut accum = Vec3::ZERO;
    let mut transmittance = 1.0_f32;
    samples
        .iter()
        .enumerate()
        .map(|(z, sample)| {
            let t = (z + 1) as f32 / depth;
            let extinction = sample.extinction / (1.0 + settings.depth_attenuation * t);
            let slice = (-extinction * sample.length).exp();
            accum += transmittance * sample.lit * sample.tint * (1.0 - slice);
            transmittance *= slice;
            accum.extend(transmittance)
        })
        .collect()
}

/// Fog color used beyond the volume.
pub fn analytical_color(settings: &FogSettings, sun: &SunLight, cos_theta: f32) -> Vec3 {
    Vec3::from_array(settings.ambient_color)
        + Vec3::from_array(settings.atmosphere_color)
            * henyey_greenstein(cos_theta, settings.anisotropy_atmosphere)
            * sun.intensity
}

/// Unclamped analytical fog amount for `beyond` world units past the volume.
pub fn analytical_fog_amount(settings: &FogSettings, beyond: f32) -> f32 {
    1.0 - (-beyond.max(0.0) * ANALYTICAL_EXTINCTION * settings.density_bottom).exp()
}

/// What the compose pass writes for one pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelInputs {
    pub input: Vec3,
    /// Shading map sample: inscatter rgb, transmittance a.
    pub shading: Vec4,
    pub analytical_color: Vec3,
    /// World distance past the end of the volume.
    pub beyond: f32,
    pub sky: bool,
}

pub fn compose_pixel(settings: &FogSettings, pixel: &PixelInputs) -> Vec3 {
    let (volumetric_clamp, analytical_clamp) = if pixel.sky {
        (
            settings.volumetric_fog_sky_clamp,
            settings.analytical_fog_sky_clamp,
        )
    } else {
        (settings.volumetric_fog_clamp, settings.analytical_fog_clamp)
    };

    let mut color = pixel.input;
    if settings.analytical_fog {
        let amount = analytical_fog_amount(settings, pixel.beyond).min(analytical_clamp);
        color = color.lerp(pixel.analytical_color, amount);
    }

    let fog_amount = 1.0 - pixel.shading.w;
    let amount = fog_amount.min(volumetric_clamp);
    let scale = if fog_amount > 1e-5 {
        amount / fog_amount
    } else {
        0.0
    };
    color * (1.0 - amount) + pixel.shading.truncate() * scale
}

/// History blend used by the final injection dispatch.
pub fn temporal_blend(current: Vec4, history: Vec4, weight: f32) -> Vec4 {
    current.lerp(history, weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_sun() -> SunLight {
        SunLight::from_source(None)
    }

    fn column(settings: &FogSettings, extinctions: &[f32], visibility: f32) -> Vec<SliceSample> {
        let sun = no_sun();
        extinctions
            .iter()
            .map(|&extinction| SliceSample {
                extinction,
                tint: Vec3::ONE,
                lit: lit_radiance(settings, &sun, visibility, 0.0, Vec3::ZERO, 1.0),
                length: 0.5,
            })
            .collect()
    }

    #[test]
    fn test_hg_is_isotropic_at_zero() {
        let iso = 1.0 / (4.0 * std::f32::consts::PI);
        for cos in [-1.0, 0.0, 0.5, 1.0] {
            assert!((henyey_greenstein(cos, 0.0) - iso).abs() < 1e-6);
        }
    }

    #[test]
    fn test_hg_forward_scattering_peaks_forward() {
        assert!(henyey_greenstein(1.0, 0.6) > henyey_greenstein(-1.0, 0.6));
    }

    #[test]
    fn test_height_density_band() {
        let mut settings = FogSettings::default();
        settings.height_bottom = 0.0;
        settings.height_top = 10.0;
        settings.density_bottom = 1.0;
        settings.density_top = 0.0;
        assert_eq!(height_density(&settings, -1.0), 0.0);
        assert_eq!(height_density(&settings, 11.0), 0.0);
        assert!((height_density(&settings, 5.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_ramp_without_influence_is_neutral() {
        let settings = FogSettings::default();
        assert_eq!(settings.ramp_influence, 0.0);
        for t in [0.0, 0.3, 1.0] {
            assert!((ramp_factor(&settings, t) - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_ramp_blends_towards_end_density() {
        let mut settings = FogSettings::default();
        settings.ramp_influence = 1.0;
        settings.ramp_start_density = 1.0;
        settings.ramp_end_density = 0.0;
        assert!((ramp_factor(&settings, 0.0) - 1.0).abs() < 1e-6);
        assert!(ramp_factor(&settings, 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_transmittance_never_increases() {
        let settings = FogSettings::default();
        let samples = column(&settings, &[0.1, 0.0, 0.4, 2.0, 0.0], 1.0);
        let out = integrate_column(&settings, &samples);
        assert!(out.windows(2).all(|w| w[1].w <= w[0].w));
        assert!(out.iter().all(|s| (0.0..=1.0).contains(&s.w)));
    }

    // Tier 7, no volumes, a sun only, no participating medium: every slice
    // stays clear and the pixel only receives analytical fog.
    #[test]
    fn test_scenario_sun_only_composites_analytical_fog() {
        let mut settings = FogSettings::default();
        settings.global_density = 0.0;
        let dims = settings.volume_resolution.dimensions();
        assert_eq!(dims, [160, 96, 92]);

        let extinctions: Vec<f32> = (0..dims[2])
            .map(|z| medium_extinction(&settings, 1.0, z as f32 / dims[2] as f32))
            .collect();
        let shaded = integrate_column(&settings, &column(&settings, &extinctions, 1.0));
        let last = shaded.last().copied().unwrap_or(Vec4::ZERO);
        assert_eq!(last, Vec4::new(0.0, 0.0, 0.0, 1.0));

        let fog_color = Vec3::new(0.3, 0.4, 0.5);
        let pixel = PixelInputs {
            input: Vec3::new(0.9, 0.1, 0.2),
            shading: last,
            analytical_color: fog_color,
            beyond: 400.0,
            sky: false,
        };
        let amount = analytical_fog_amount(&settings, 400.0).min(settings.analytical_fog_clamp);
        let expected = pixel.input.lerp(fog_color, amount);
        assert!(compose_pixel(&settings, &pixel).abs_diff_eq(expected, 1e-6));
    }

    // An opaque box with absorption 1 enclosing the near slices blocks
    // everything behind it: the shading equals the shadow/ambient blend.
    #[test]
    fn test_scenario_opaque_box_shows_shadow_ambient_blend() {
        let settings = FogSettings::default();
        let visibility = 0.25;
        let mut extinctions = vec![opaque_extinction(1.0, 1.0); 4];
        extinctions.extend([0.01; 8]);
        let shaded = integrate_column(&settings, &column(&settings, &extinctions, visibility));

        let blend = shadow_ambient_blend(&settings, visibility);
        for slice in &shaded {
            assert!(slice.truncate().abs_diff_eq(blend, 1e-4), "slice {slice}");
            assert!(slice.w < 1e-6, "transmittance must be zero, got {}", slice.w);
        }
    }

    // Without a sun the sun terms vanish and nothing panics.
    #[test]
    fn test_scenario_missing_sun_contributes_nothing() {
        let settings = FogSettings::default();
        let sun = no_sun();
        assert!(!sun.present);
        let with_sun_terms = lit_radiance(&settings, &sun, 1.0, 1.0, Vec3::ZERO, 1.0);
        assert!(with_sun_terms.abs_diff_eq(shadow_ambient_blend(&settings, 1.0), 1e-6));
        assert_eq!(analytical_color(&settings, &sun, 1.0), Vec3::from_array(settings.ambient_color));
    }

    #[test]
    fn test_volumetric_clamp_limits_fog() {
        let mut settings = FogSettings::default();
        settings.analytical_fog = false;
        settings.volumetric_fog_clamp = 0.5;
        let pixel = PixelInputs {
            input: Vec3::ONE,
            shading: Vec4::new(0.0, 0.0, 0.0, 0.0),
            analytical_color: Vec3::ZERO,
            beyond: 0.0,
            sky: false,
        };
        assert!(compose_pixel(&settings, &pixel).abs_diff_eq(Vec3::splat(0.5), 1e-6));
    }

    #[test]
    fn test_sky_uses_sky_clamps() {
        let mut settings = FogSettings::default();
        settings.analytical_fog_clamp = 0.0;
        settings.analytical_fog_sky_clamp = 1.0;
        let mut pixel = PixelInputs {
            input: Vec3::ZERO,
            shading: Vec4::new(0.0, 0.0, 0.0, 1.0),
            analytical_color: Vec3::ONE,
            beyond: 1.0e6,
            sky: false,
        };
        assert_eq!(compose_pixel(&settings, &pixel), Vec3::ZERO);
        pixel.sky = true;
        assert!(compose_pixel(&settings, &pixel).abs_diff_eq(Vec3::ONE, 1e-4));
    }

    #[test]
    fn test_temporal_blend_weights_history() {
        let blended = temporal_blend(Vec4::ZERO, Vec4::ONE, 0.93);
        assert!(blended.abs_diff_eq(Vec4::splat(0.93), 1e-6));
    }
}
