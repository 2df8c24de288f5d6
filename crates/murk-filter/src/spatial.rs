//! 3x3x3 box filter over the shading volume.

use murk_render::{PingPong, VolumeTexture, create_compute_pipeline, dispatch, workgroup_count};

pub const SPATIAL_FILTER_SHADER_SOURCE: &str = r#"
@group(0) @binding(0) var source: texture_3d<f32>;
@group(0) @binding(1) var destination: texture_storage_3d<rgba16float, write>;

@compute @workgroup_size(4, 4, 4)
fn cs_box_filter(@builtin(global_invocation_id) id: vec3<u32>) {
    let size = vec3<i32>(textureDimensions(source));
    let center = vec3<i32>(id);
    if (any(center >= size)) {
        return;
    }

    var sum = vec4<f32>(0.0);
    var taps = 0.0;
    for (var z = -1; z <= 1; z = z + 1) {
        for (var y = -1; y <= 1; y = y + 1) {
            for (var x = -1; x <= 1; x = x + 1) {
                let coord = center + vec3<i32>(x, y, z);
                if (all(coord >= vec3<i32>(0)) && all(coord < size)) {
                    sum = sum + textureLoad(source, coord, 0);
                    taps = taps + 1.0;
                }
            }
        }
    }
    textureStore(destination, center, sum / taps);
}
"#;

const WORKGROUP_SIZE: u32 = 4;

/// Which slot of the shading pair is read and which is written this frame.
///
/// The integration pass writes the current slot, so the filter reads it and
/// writes the other one: even frames go 0 -> 1, odd frames 1 -> 0.
pub fn filter_roles(frame: u32) -> (usize, usize) {
    let source = PingPong::<()>::current_index(frame);
    (source, 1 - source)
}

pub struct VolumeSpatialFilter {
    enabled: bool,
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

impl VolumeSpatialFilter {
    pub fn new(device: &wgpu::Device, enabled: bool) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("volume-spatial-filter"),
            source: wgpu::ShaderSource::Wgsl(SPATIAL_FILTER_SHADER_SOURCE.into()),
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("volume-spatial-filter-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D3,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rgba16Float,
                        view_dimension: wgpu::TextureViewDimension::D3,
                    },
                    count: None,
                },
            ],
        });
        let pipeline = create_compute_pipeline(
            device,
            &module,
            &[&layout],
            "cs_box_filter",
            "volume-spatial-filter",
        );
        Self {
            enabled,
            layout,
            pipeline,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Record the filter pass. Returns the slot holding the filtered result,
    /// or `None` when filtering is disabled.
    pub fn volume_spatial_filter(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        frame: u32,
        shading: &PingPong<VolumeTexture>,
    ) -> Option<usize> {
        if !self.enabled {
            return None;
        }
        let (source, destination) = filter_roles(frame);
        let source_texture = shading.slot(source);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("volume-spatial-filter-bg"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&source_texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&shading.slot(destination).view),
                },
            ],
        });
        let [w, h, d] = source_texture.dims;
        dispatch(
            encoder,
            &self.pipeline,
            &[&bind_group],
            [
                workgroup_count(w, WORKGROUP_SIZE),
                workgroup_count(h, WORKGROUP_SIZE),
                workgroup_count(d, WORKGROUP_SIZE),
            ],
            "volume-spatial-filter",
        );
        Some(destination)
    }
}
