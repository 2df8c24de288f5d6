//! Pipelines, layouts and bind groups of the fog passes.

use murk_filter::ShadowMapView;
use murk_render::{VolumeTexture, create_compute_pipeline, create_fullscreen_pipeline};
use murk_scene::SceneBuffers;

use crate::shaders;

/// Bound in place of resources that do not exist this frame.
pub struct Placeholders {
    /// Zeroed storage buffer for empty record categories.
    pub storage: wgpu::Buffer,
    /// 1x1 depth cleared to the far plane: nothing occludes.
    pub depth: VolumeTexture,
}

impl Placeholders {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let storage = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("fog-placeholder-records"),
            size: 64,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });
        let depth = VolumeTexture::new_2d(
            device,
            "fog-placeholder-depth",
            1,
            1,
            wgpu::TextureFormat::Depth32Float,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT,
        );

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("fog-placeholder-clear"),
        });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("fog-placeholder-clear"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }
        queue.submit([encoder.finish()]);

        Self { storage, depth }
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    sample_type: wgpu::TextureSampleType,
    view_dimension: wgpu::TextureViewDimension,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type,
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

fn volume_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    texture_entry(
        binding,
        visibility,
        wgpu::TextureSampleType::Float { filterable: true },
        wgpu::TextureViewDimension::D3,
    )
}

fn storage_volume_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: wgpu::TextureFormat::Rgba16Float,
            view_dimension: wgpu::TextureViewDimension::D3,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn view(texture: &wgpu::TextureView) -> wgpu::BindingResource<'_> {
    wgpu::BindingResource::TextureView(texture)
}

fn bind_group(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    resources: Vec<wgpu::BindingResource<'_>>,
) -> wgpu::BindGroup {
    let entries: Vec<wgpu::BindGroupEntry<'_>> = resources
        .into_iter()
        .enumerate()
        .map(|(binding, resource)| wgpu::BindGroupEntry {
            binding: binding as u32,
            resource,
        })
        .collect();
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &entries,
    })
}

/// Textures one injection dispatch reads and writes.
pub struct InjectionTextures<'a> {
    pub noise: &'a wgpu::TextureView,
    pub history_medium: &'a wgpu::TextureView,
    pub history_radiance: &'a wgpu::TextureView,
    pub spot_shadow: &'a wgpu::TextureView,
    pub chain_medium: &'a wgpu::TextureView,
    pub chain_radiance: &'a wgpu::TextureView,
    pub out_medium: &'a wgpu::TextureView,
    pub out_radiance: &'a wgpu::TextureView,
}

/// Every GPU pipeline of the fog frame, created once.
pub struct FogPasses {
    frame_layout: wgpu::BindGroupLayout,
    radiance_raw_layout: wgpu::BindGroupLayout,
    radiance_exponential_layout: wgpu::BindGroupLayout,
    radiance_raw: wgpu::ComputePipeline,
    radiance_exponential: wgpu::ComputePipeline,
    lights_layout: wgpu::BindGroupLayout,
    inputs_layout: wgpu::BindGroupLayout,
    chain_layout: wgpu::BindGroupLayout,
    inject_primary: wgpu::ComputePipeline,
    inject_spot: wgpu::ComputePipeline,
    inscatter_layout: wgpu::BindGroupLayout,
    inscatter: wgpu::ComputePipeline,
    compose_layout: wgpu::BindGroupLayout,
    compose_module: wgpu::ShaderModule,
    compose_pipeline_layout: wgpu::PipelineLayout,
    compose: Option<(wgpu::TextureFormat, wgpu::RenderPipeline)>,
    linear_repeat: wgpu::Sampler,
    linear_clamp: wgpu::Sampler,
    pub placeholders: Placeholders,
}

impl FogPasses {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let compute = wgpu::ShaderStages::COMPUTE;
        let fragment = wgpu::ShaderStages::FRAGMENT;

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("fog-frame-bgl"),
            entries: &[
                uniform_entry(0, compute | fragment),
                storage_entry(1, compute | fragment),
            ],
        });

        // Sun radiance
        let unfilterable = wgpu::TextureSampleType::Float { filterable: false };
        let radiance_layout = |label, shadow_sample_type| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &[
                    texture_entry(0, compute, unfilterable, wgpu::TextureViewDimension::D2),
                    texture_entry(1, compute, shadow_sample_type, wgpu::TextureViewDimension::D2),
                    storage_volume_entry(2),
                ],
            })
        };
        let radiance_raw_layout =
            radiance_layout("fog-radiance-raw-bgl", wgpu::TextureSampleType::Depth);
        let radiance_exponential_layout = radiance_layout("fog-radiance-esm-bgl", unfilterable);
        let radiance_pipeline = |exponential: bool, layout: &wgpu::BindGroupLayout, label| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(shaders::radiance_module_source(exponential).into()),
            });
            create_compute_pipeline(
                device,
                &module,
                &[&frame_layout, layout],
                "cs_sun_radiance",
                label,
            )
        };
        let radiance_raw = radiance_pipeline(false, &radiance_raw_layout, "fog-sun-radiance-raw");
        let radiance_exponential =
            radiance_pipeline(true, &radiance_exponential_layout, "fog-sun-radiance-esm");

        // Medium injection
        let lights_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("fog-injection-lights-bgl"),
            entries: &[
                uniform_entry(0, compute),
                storage_entry(1, compute),
                storage_entry(2, compute),
                storage_entry(3, compute),
                storage_entry(4, compute),
            ],
        });
        let inputs_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("fog-injection-inputs-bgl"),
            entries: &[
                volume_entry(0, compute),
                sampler_entry(1, compute),
                volume_entry(2, compute),
                volume_entry(3, compute),
                sampler_entry(4, compute),
                texture_entry(
                    5,
                    compute,
                    wgpu::TextureSampleType::Depth,
                    wgpu::TextureViewDimension::D2,
                ),
            ],
        });
        let chain_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("fog-injection-chain-bgl"),
            entries: &[
                volume_entry(0, compute),
                volume_entry(1, compute),
                storage_volume_entry(2),
                storage_volume_entry(3),
            ],
        });
        let injection_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("fog-injection"),
            source: wgpu::ShaderSource::Wgsl(shaders::injection_module_source().into()),
        });
        let injection_layouts = [&frame_layout, &lights_layout, &inputs_layout, &chain_layout];
        let inject_primary = create_compute_pipeline(
            device,
            &injection_module,
            &injection_layouts,
            "cs_inject_medium",
            "fog-inject-medium",
        );
        let inject_spot = create_compute_pipeline(
            device,
            &injection_module,
            &injection_layouts,
            "cs_inject_spot",
            "fog-inject-spot",
        );

        // Inscatter
        let inscatter_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("fog-inscatter-bgl"),
            entries: &[
                volume_entry(0, compute),
                volume_entry(1, compute),
                volume_entry(2, compute),
                storage_volume_entry(3),
            ],
        });
        let inscatter_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("fog-inscatter"),
            source: wgpu::ShaderSource::Wgsl(shaders::inscatter_module_source().into()),
        });
        let inscatter = create_compute_pipeline(
            device,
            &inscatter_module,
            &[&frame_layout, &inscatter_layout],
            "cs_inscatter",
            "fog-inscatter",
        );

        // Compose; the render pipeline depends on the output format.
        let compose_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("fog-compose-bgl"),
            entries: &[
                texture_entry(0, fragment, unfilterable, wgpu::TextureViewDimension::D2),
                texture_entry(
                    1,
                    fragment,
                    wgpu::TextureSampleType::Depth,
                    wgpu::TextureViewDimension::D2,
                ),
                volume_entry(2, fragment),
                sampler_entry(3, fragment),
            ],
        });
        let compose_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("fog-compose"),
            source: wgpu::ShaderSource::Wgsl(shaders::compose_module_source().into()),
        });
        let compose_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("fog-compose-layout"),
                bind_group_layouts: &[&frame_layout, &compose_layout],
                immediate_size: 0,
            });

        let sampler = |label, address_mode| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: address_mode,
                address_mode_v: address_mode,
                address_mode_w: address_mode,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                ..Default::default()
            })
        };
        let linear_repeat = sampler("fog-linear-repeat", wgpu::AddressMode::Repeat);
        let linear_clamp = sampler("fog-linear-clamp", wgpu::AddressMode::ClampToEdge);

        log::debug!("Created fog pass pipelines");

        Self {
            frame_layout,
            radiance_raw_layout,
            radiance_exponential_layout,
            radiance_raw,
            radiance_exponential,
            lights_layout,
            inputs_layout,
            chain_layout,
            inject_primary,
            inject_spot,
            inscatter_layout,
            inscatter,
            compose_layout,
            compose_module,
            compose_pipeline_layout,
            compose: None,
            linear_repeat,
            linear_clamp,
            placeholders: Placeholders::new(device, queue),
        }
    }

    pub fn frame_bind_group(
        &self,
        device: &wgpu::Device,
        uniforms: &wgpu::Buffer,
        depth_steps: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        bind_group(
            device,
            "fog-frame-bg",
            &self.frame_layout,
            vec![uniforms.as_entire_binding(), depth_steps.as_entire_binding()],
        )
    }

    /// Pipeline and bind group for the sun radiance pass. The variant follows
    /// the kind of shadow texture being read.
    pub fn radiance(
        &self,
        device: &wgpu::Device,
        cascade_lut: &wgpu::TextureView,
        shadow: ShadowMapView<'_>,
        sun_radiance: &wgpu::TextureView,
    ) -> (&wgpu::ComputePipeline, wgpu::BindGroup) {
        let (pipeline, layout, shadow_view) = match shadow {
            ShadowMapView::Raw(v) => (&self.radiance_raw, &self.radiance_raw_layout, v),
            ShadowMapView::Exponential(v) => (
                &self.radiance_exponential,
                &self.radiance_exponential_layout,
                v,
            ),
        };
        let group = bind_group(
            device,
            "fog-radiance-bg",
            layout,
            vec![view(cascade_lut), view(shadow_view), view(sun_radiance)],
        );
        (pipeline, group)
    }

    /// Light and volume records for an injection dispatch. Empty categories
    /// bind the zeroed placeholder.
    pub fn lights_bind_group(
        &self,
        device: &wgpu::Device,
        injection_uniforms: &wgpu::Buffer,
        scene: &SceneBuffers,
    ) -> wgpu::BindGroup {
        let placeholder = &self.placeholders.storage;
        let records = [
            scene.point_lights().buffer(),
            scene.spot_lights().buffer(),
            scene.boxes().buffer(),
            scene.ellipsoids().buffer(),
        ];
        let mut resources = vec![injection_uniforms.as_entire_binding()];
        resources.extend(
            records
                .into_iter()
                .map(|buffer| buffer.unwrap_or(placeholder).as_entire_binding()),
        );
        bind_group(device, "fog-injection-lights-bg", &self.lights_layout, resources)
    }

    /// Returns the input and chain bind groups of one injection dispatch.
    pub fn injection_bind_groups(
        &self,
        device: &wgpu::Device,
        textures: &InjectionTextures<'_>,
    ) -> (wgpu::BindGroup, wgpu::BindGroup) {
        let inputs = bind_group(
            device,
            "fog-injection-inputs-bg",
            &self.inputs_layout,
            vec![
                view(textures.noise),
                wgpu::BindingResource::Sampler(&self.linear_repeat),
                view(textures.history_medium),
                view(textures.history_radiance),
                wgpu::BindingResource::Sampler(&self.linear_clamp),
                view(textures.spot_shadow),
            ],
        );
        let chain = bind_group(
            device,
            "fog-injection-chain-bg",
            &self.chain_layout,
            vec![
                view(textures.chain_medium),
                view(textures.chain_radiance),
                view(textures.out_medium),
                view(textures.out_radiance),
            ],
        );
        (inputs, chain)
    }

    pub fn injection_pipeline(&self, shadowed_spot: bool) -> &wgpu::ComputePipeline {
        if shadowed_spot {
            &self.inject_spot
        } else {
            &self.inject_primary
        }
    }

    pub fn inscatter(
        &self,
        device: &wgpu::Device,
        medium: &wgpu::TextureView,
        radiance: &wgpu::TextureView,
        sun_radiance: &wgpu::TextureView,
        shading: &wgpu::TextureView,
    ) -> (&wgpu::ComputePipeline, wgpu::BindGroup) {
        let group = bind_group(
            device,
            "fog-inscatter-bg",
            &self.inscatter_layout,
            vec![view(medium), view(radiance), view(sun_radiance), view(shading)],
        );
        (&self.inscatter, group)
    }

    /// Make sure the compose pipeline targets `format`.
    pub fn prepare_compose(&mut self, device: &wgpu::Device, format: wgpu::TextureFormat) {
        if self.compose.as_ref().map(|(f, _)| *f) == Some(format) {
            return;
        }
        let pipeline = create_fullscreen_pipeline(
            device,
            &self.compose_module,
            &self.compose_pipeline_layout,
            "fs_compose",
            format,
            "fog-compose",
        );
        log::debug!("Created compose pipeline for {format:?}");
        self.compose = Some((format, pipeline));
    }

    pub fn compose(
        &self,
        device: &wgpu::Device,
        input: &wgpu::TextureView,
        depth: &wgpu::TextureView,
        shading: &wgpu::TextureView,
    ) -> Option<(&wgpu::RenderPipeline, wgpu::BindGroup)> {
        let (_, pipeline) = self.compose.as_ref()?;
        let group = bind_group(
            device,
            "fog-compose-bg",
            &self.compose_layout,
            vec![
                view(input),
                view(depth),
                view(shading),
                wgpu::BindingResource::Sampler(&self.linear_clamp),
            ],
        );
        Some((pipeline, group))
    }
}
