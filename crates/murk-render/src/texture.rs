//! Texture helpers for froxel volumes and 2D scratch targets.

/// A GPU texture with its default view and the size it was created with.
#[derive(Debug)]
pub struct VolumeTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub dims: [u32; 3],
    pub format: wgpu::TextureFormat,
    pub label: &'static str,
}

impl VolumeTexture {
    /// Create a 3D texture of `dims` (width, height, depth).
    pub fn new_3d(
        device: &wgpu::Device,
        label: &'static str,
        dims: [u32; 3],
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        Self::create(device, label, dims, wgpu::TextureDimension::D3, format, usage)
    }

    /// Create a 2D texture of `width` x `height`.
    pub fn new_2d(
        device: &wgpu::Device,
        label: &'static str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        Self::create(
            device,
            label,
            [width, height, 1],
            wgpu::TextureDimension::D2,
            format,
            usage,
        )
    }

    fn create(
        device: &wgpu::Device,
        label: &'static str,
        dims: [u32; 3],
        dimension: wgpu::TextureDimension,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let dims = dims.map(|d| d.max(1));
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(dims),
            mip_level_count: 1,
            sample_count: 1,
            dimension,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        log::trace!("Created {label}: {}x{}x{} {format:?}", dims[0], dims[1], dims[2]);
        Self {
            texture,
            view,
            dims,
            format,
            label,
        }
    }

    /// Upload tightly packed texel data covering the whole texture.
    pub fn write(&self, queue: &wgpu::Queue, data: &[u8]) {
        let texel = self.format.block_copy_size(None).unwrap_or(4);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.dims[0] * texel),
                rows_per_image: Some(self.dims[1]),
            },
            extent(self.dims),
        );
    }

    /// Size of the texture in bytes.
    pub fn byte_size(&self) -> u64 {
        texture_bytes(self.format, self.dims)
    }
}

fn extent(dims: [u32; 3]) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: dims[0],
        height: dims[1],
        depth_or_array_layers: dims[2],
    }
}

/// Bytes needed for one mip level of `dims` in `format`.
pub fn texture_bytes(format: wgpu::TextureFormat, dims: [u32; 3]) -> u64 {
    let texel = u64::from(format.block_copy_size(None).unwrap_or(4));
    dims.iter().map(|&d| u64::from(d)).product::<u64>() * texel
}
