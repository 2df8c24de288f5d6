//! Textures and buffers sized by the froxel resolution.

use murk_render::{PingPong, VolumeTexture};
use wgpu::util::DeviceExt;

use crate::records::DepthStepRecord;

/// Participating medium: rgb tint, a extinction.
pub const MEDIUM_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Local light radiance: rgb radiance, a cloud occlusion.
pub const RADIANCE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Sun radiance: rgb shadowed sun light, a shadow visibility.
pub const SUN_RADIANCE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Integrated shading: rgb inscatter, a transmittance.
pub const SHADING_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

fn volume_usage() -> wgpu::TextureUsages {
    wgpu::TextureUsages::STORAGE_BINDING
        | wgpu::TextureUsages::TEXTURE_BINDING
        | wgpu::TextureUsages::COPY_SRC
}

/// Every GPU resource whose size follows the froxel dimensions.
#[derive(Debug)]
pub struct VolumeResources {
    pub dims: [u32; 3],
    /// PMVolume / PMVolume2.
    pub medium: PingPong<VolumeTexture>,
    /// PMRadiance / PMRadiance2.
    pub radiance: PingPong<VolumeTexture>,
    /// VolumeShadingMap / VolumeShadingMap2.
    pub shading: PingPong<VolumeTexture>,
    /// Sun radiance map.
    pub sun_radiance: VolumeTexture,
    /// Intermediate medium targets for chained shadowed-light injection.
    pub scratch_medium: PingPong<VolumeTexture>,
    pub scratch_radiance: PingPong<VolumeTexture>,
    pub depth_steps: wgpu::Buffer,
}

impl VolumeResources {
    pub fn new(device: &wgpu::Device, dims: [u32; 3], depth_steps: &[DepthStepRecord]) -> Self {
        let volume = |label: &'static str, format: wgpu::TextureFormat| {
            VolumeTexture::new_3d(device, label, dims, format, volume_usage())
        };
        let pair = |labels: [&'static str; 2], format: wgpu::TextureFormat| {
            PingPong::from_fn(|i| volume(labels[i], format))
        };

        let depth_steps = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("fog-depth-steps"),
            contents: depth_step_bytes(depth_steps, dims[2]).as_slice(),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        log::info!(
            "Allocated fog volumes at {}x{}x{}",
            dims[0],
            dims[1],
            dims[2]
        );

        Self {
            dims,
            medium: pair(["fog-pm-volume", "fog-pm-volume-2"], MEDIUM_FORMAT),
            radiance: pair(["fog-pm-radiance", "fog-pm-radiance-2"], RADIANCE_FORMAT),
            shading: pair(["fog-shading-map", "fog-shading-map-2"], SHADING_FORMAT),
            sun_radiance: volume("fog-sun-radiance", SUN_RADIANCE_FORMAT),
            scratch_medium: pair(["fog-scratch-volume-a", "fog-scratch-volume-b"], MEDIUM_FORMAT),
            scratch_radiance: pair(
                ["fog-scratch-radiance-a", "fog-scratch-radiance-b"],
                RADIANCE_FORMAT,
            ),
            depth_steps,
        }
    }

    /// Rewrite the depth table in place.
    pub fn write_depth_steps(&self, queue: &wgpu::Queue, depth_steps: &[DepthStepRecord]) {
        queue.write_buffer(
            &self.depth_steps,
            0,
            &depth_step_bytes(depth_steps, self.dims[2]),
        );
    }

    /// All textures with their labels, for memory accounting.
    pub fn textures(&self) -> impl Iterator<Item = &VolumeTexture> {
        self.medium
            .iter()
            .chain(self.radiance.iter())
            .chain(self.shading.iter())
            .chain(std::iter::once(&self.sun_radiance))
            .chain(self.scratch_medium.iter())
            .chain(self.scratch_radiance.iter())
    }
}

/// Depth table bytes padded or truncated to exactly `depth` entries.
fn depth_step_bytes(steps: &[DepthStepRecord], depth: u32) -> Vec<u8> {
    let mut padded = steps.to_vec();
    let fill = padded.last().copied().unwrap_or_default();
    padded.resize(depth.max(1) as usize, fill);
    bytemuck::cast_slice(&padded).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_step_bytes_pads_with_last_value() {
        let steps = [DepthStepRecord { step: 0.2 }, DepthStepRecord { step: 0.7 }];
        let bytes = depth_step_bytes(&steps, 4);
        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(floats, vec![0.2, 0.7, 0.7, 0.7]);
    }

    #[test]
    fn test_depth_step_bytes_never_empty() {
        assert_eq!(depth_step_bytes(&[], 0).len(), 4);
    }
}
