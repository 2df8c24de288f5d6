//! CPU-generated tiling 3D noise for cloud density.

use noise::{NoiseFn, Simplex};

/// Edge length of the cubic noise LUT.
pub const NOISE_LUT_SIZE: u32 = 76;

const OCTAVES: u32 = 5;
const PERSISTENCE: f64 = 0.5;
const LACUNARITY: f64 = 2.0;
/// Base lattice cells across one tile at frequency 1.
const BASE_CELLS: f64 = 4.0;
const SEED: u32 = 0x6d75_726b;

/// Parameters that force a LUT regeneration when they change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseParams {
    pub frequency: [f32; 3],
    pub density_scale: f32,
}

impl NoiseParams {
    pub fn from_settings(settings: &murk_config::FogSettings) -> Self {
        Self {
            frequency: settings.clouds_frequency,
            density_scale: settings.clouds_density_scale,
        }
    }
}

/// Generate `NOISE_LUT_SIZE³` bytes of 5-octave simplex fBm, x fastest.
///
/// The volume tiles seamlessly so it can be sampled with repeat addressing:
/// each sample blends the eight periodic images of the point, weighted
/// trilinearly by position inside the tile.
pub fn generate_noise_lut(params: &NoiseParams) -> Vec<u8> {
    let noise = Simplex::new(SEED);
    let n = NOISE_LUT_SIZE as usize;
    let size = f64::from(NOISE_LUT_SIZE);
    let period = params.frequency.map(|f| BASE_CELLS * f64::from(f.max(0.0)));
    let scale = f64::from(params.density_scale.max(0.0));

    let mut data = Vec::with_capacity(n * n * n);
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let uvw = [x as f64 / size, y as f64 / size, z as f64 / size];
                let value = tiled_fbm(&noise, uvw, period);
                let density = ((value * 0.5 + 0.5) * scale).clamp(0.0, 1.0);
                data.push((density * 255.0).round() as u8);
            }
        }
    }
    data
}

fn tiled_fbm(noise: &Simplex, uvw: [f64; 3], period: [f64; 3]) -> f64 {
    let p = [uvw[0] * period[0], uvw[1] * period[1], uvw[2] * period[2]];
    let mut total = 0.0;
    for corner in 0..8u32 {
        let mut weight = 1.0;
        let mut q = p;
        for axis in 0..3 {
            if corner & (1 << axis) != 0 {
                q[axis] -= period[axis];
                weight *= uvw[axis];
            } else {
                weight *= 1.0 - uvw[axis];
            }
        }
        if weight > 0.0 {
            total += weight * fbm(noise, q);
        }
    }
    total
}

fn fbm(noise: &Simplex, p: [f64; 3]) -> f64 {
    let mut total = 0.0;
    let mut frequency = 1.0;
    let mut amplitude = 1.0;
    let mut norm = 0.0;
    for _ in 0..OCTAVES {
        total += noise.get([p[0] * frequency, p[1] * frequency, p[2] * frequency]) * amplitude;
        norm += amplitude;
        frequency *= LACUNARITY;
        amplitude *= PERSISTENCE;
    }
    total / norm
}
