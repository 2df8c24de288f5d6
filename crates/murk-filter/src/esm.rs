//! Exponential shadow map conditioning.
//!
//! The raw depth is copied into an `R32Float` target and blurred
//! horizontally then vertically. Blurring happens in log space so the
//! exponentials never overflow: for taps `d_i` around `d_0`,
//! `d' = d_0 + ln(sum w_i * exp(c * (d_i - d_0))) / c`. Consumers evaluate
//! `exp(c * (d' - receiver))` as the shadow visibility.

use bytemuck::{Pod, Zeroable};
use murk_config::LogBlur;
use murk_render::{
    FULLSCREEN_VERTEX_SOURCE, VolumeTexture, create_fullscreen_pipeline, run_fullscreen_pass,
};

/// Exponent `c` of the exponential shadow test.
pub const ESM_EXPONENT: f32 = 80.0;
pub const ESM_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

/// Fragment stages for the copy and blur passes.
pub const ESM_SHADER_SOURCE: &str = r#"
struct BlurParams {
    direction: vec2<i32>,
    radius: i32,
    exponent: f32,
};

@group(0) @binding(0) var<uniform> params: BlurParams;
@group(1) @binding(0) var shadow_depth: texture_depth_2d;
@group(1) @binding(1) var blur_input: texture_2d<f32>;

@fragment
fn fs_copy_depth(in: FullscreenOutput) -> @location(0) vec4<f32> {
    let depth = textureLoad(shadow_depth, vec2<i32>(in.position.xy), 0);
    return vec4<f32>(depth, 0.0, 0.0, 1.0);
}

@fragment
fn fs_log_blur(in: FullscreenOutput) -> @location(0) vec4<f32> {
    let size = vec2<i32>(textureDimensions(blur_input));
    let center = vec2<i32>(in.position.xy);
    let d0 = textureLoad(blur_input, center, 0).r;
    let sigma = max(f32(params.radius), 1.0) * 0.5 + 0.5;

    var sum = 0.0;
    var norm = 0.0;
    for (var i = -params.radius; i <= params.radius; i = i + 1) {
        let coord = clamp(center + params.direction * i, vec2<i32>(0), size - vec2<i32>(1));
        let d = textureLoad(blur_input, coord, 0).r;
        let w = exp(-f32(i * i) / (2.0 * sigma * sigma));
        sum = sum + w * exp(params.exponent * (d - d0));
        norm = norm + w;
    }
    let filtered = d0 + log(sum / norm) / params.exponent;
    return vec4<f32>(filtered, 0.0, 0.0, 1.0);
}
"#;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct BlurParams {
    direction: [i32; 2],
    radius: i32,
    exponent: f32,
}

/// The shadow texture downstream passes should sample this frame.
#[derive(Clone, Copy, Debug)]
pub enum ShadowMapView<'a> {
    /// Log blur is off; sample the collaborator's depth directly.
    Raw(&'a wgpu::TextureView),
    /// Blurred exponential shadow map in [`ESM_FORMAT`].
    Exponential(&'a wgpu::TextureView),
}

struct EsmTargets {
    resolution: u32,
    /// Copy target and final result.
    primary: VolumeTexture,
    /// Horizontal blur result.
    intermediate: VolumeTexture,
}

struct EsmPipelines {
    copy: wgpu::RenderPipeline,
    blur: wgpu::RenderPipeline,
    dummy_float: VolumeTexture,
}

/// Render pipelines are built on the first filtered frame, since not every
/// adapter can render to [`ESM_FORMAT`].
enum EsmState {
    Pending,
    Ready(EsmPipelines),
    Unsupported,
}

pub struct ShadowFilter {
    mode: LogBlur,
    params_bgl: wgpu::BindGroupLayout,
    input_bgl: wgpu::BindGroupLayout,
    pipelines: EsmState,
    horizontal_params: wgpu::Buffer,
    vertical_params: wgpu::Buffer,
    horizontal_bind_group: wgpu::BindGroup,
    vertical_bind_group: wgpu::BindGroup,
    /// 1x1 placeholder for the depth binding the blur passes do not read.
    dummy_depth: VolumeTexture,
    targets: Option<EsmTargets>,
    filtered_this_frame: bool,
}

impl ShadowFilter {
    pub fn new(device: &wgpu::Device, mode: LogBlur) -> Self {
        let params_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("esm-params-bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: std::num::NonZeroU64::new(16),
                },
                count: None,
            }],
        });
        let input_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("esm-input-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let params_buffer = |label, direction| {
            use wgpu::util::DeviceExt;
            let params = BlurParams {
                direction,
                radius: mode.radius().unwrap_or(0) as i32,
                exponent: ESM_EXPONENT,
            };
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&[params]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
        };
        let horizontal_params = params_buffer("esm-blur-x-params", [1, 0]);
        let vertical_params = params_buffer("esm-blur-y-params", [0, 1]);
        let params_bind_group = |label, buffer: &wgpu::Buffer| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &params_bgl,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            })
        };
        let horizontal_bind_group = params_bind_group("esm-blur-x-bg", &horizontal_params);
        let vertical_bind_group = params_bind_group("esm-blur-y-bg", &vertical_params);

        let dummy_depth = VolumeTexture::new_2d(
            device,
            "esm-dummy-depth",
            1,
            1,
            wgpu::TextureFormat::Depth32Float,
            wgpu::TextureUsages::TEXTURE_BINDING,
        );

        Self {
            mode,
            params_bgl,
            input_bgl,
            pipelines: EsmState::Pending,
            horizontal_params,
            vertical_params,
            horizontal_bind_group,
            vertical_bind_group,
            dummy_depth,
            targets: None,
            filtered_this_frame: false,
        }
    }

    /// Build the copy and blur pipelines if the current mode needs them.
    ///
    /// Returns whether the next [`ShadowFilter::gen_exponential_shadow_map`]
    /// will produce an exponential map. An adapter that rejects the pipelines
    /// is remembered and every later frame uses the raw depth.
    pub fn prepare(&mut self, device: &wgpu::Device) -> bool {
        if self.mode.radius().is_none() {
            return false;
        }
        if matches!(self.pipelines, EsmState::Pending) {
            self.pipelines = self.build_pipelines(device);
        }
        matches!(self.pipelines, EsmState::Ready(_))
    }

    /// Whether conditioning is requested and not known to be unsupported.
    pub fn is_active(&self) -> bool {
        self.mode.radius().is_some() && !matches!(self.pipelines, EsmState::Unsupported)
    }

    fn build_pipelines(&self, device: &wgpu::Device) -> EsmState {
        let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("esm-shader"),
            source: wgpu::ShaderSource::Wgsl(
                format!("{FULLSCREEN_VERTEX_SOURCE}{ESM_SHADER_SOURCE}").into(),
            ),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("esm-layout"),
            bind_group_layouts: &[&self.params_bgl, &self.input_bgl],
            immediate_size: 0,
        });
        let copy = create_fullscreen_pipeline(
            device,
            &shader,
            &layout,
            "fs_copy_depth",
            ESM_FORMAT,
            "esm-copy",
        );
        let blur = create_fullscreen_pipeline(
            device,
            &shader,
            &layout,
            "fs_log_blur",
            ESM_FORMAT,
            "esm-blur",
        );
        let dummy_float = VolumeTexture::new_2d(
            device,
            "esm-dummy-float",
            1,
            1,
            ESM_FORMAT,
            wgpu::TextureUsages::TEXTURE_BINDING,
        );

        match pollster::block_on(scope.pop()) {
            None => {
                log::debug!("Built ESM pipelines for {ESM_FORMAT:?}");
                EsmState::Ready(EsmPipelines {
                    copy,
                    blur,
                    dummy_float,
                })
            }
            Some(err) => {
                log::warn!("Shadow log blur unavailable, sampling raw shadow depth: {err}");
                EsmState::Unsupported
            }
        }
    }

    pub fn mode(&self) -> LogBlur {
        self.mode
    }

    /// Switch blur strength. Takes effect on the next conditioning call.
    pub fn set_mode(&mut self, queue: &wgpu::Queue, mode: LogBlur) {
        if mode == self.mode {
            return;
        }
        let radius = mode.radius().unwrap_or(0) as i32;
        for (buffer, direction) in [
            (&self.horizontal_params, [1, 0]),
            (&self.vertical_params, [0, 1]),
        ] {
            let params = BlurParams {
                direction,
                radius,
                exponent: ESM_EXPONENT,
            };
            queue.write_buffer(buffer, 0, bytemuck::cast_slice(&[params]));
        }
        log::debug!("Shadow log blur {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
    }

    /// Condition the sun's shadow depth for this frame.
    ///
    /// With [`LogBlur::Off`], or on an adapter that rejected the pipelines,
    /// nothing is recorded and [`ShadowFilter::current`] hands back the raw
    /// depth.
    pub fn gen_exponential_shadow_map(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        shadow_depth: &wgpu::TextureView,
        resolution: u32,
    ) {
        self.filtered_this_frame = false;
        if !self.prepare(device) {
            return;
        }

        if self.targets.as_ref().map(|t| t.resolution) != Some(resolution) {
            let target = |label| {
                VolumeTexture::new_2d(
                    device,
                    label,
                    resolution,
                    resolution,
                    ESM_FORMAT,
                    wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                )
            };
            self.targets = Some(EsmTargets {
                resolution,
                primary: target("esm-primary"),
                intermediate: target("esm-intermediate"),
            });
            log::debug!("Allocated ESM targets at {resolution}x{resolution}");
        }
        let (Some(targets), EsmState::Ready(pipelines)) = (self.targets.as_ref(), &self.pipelines)
        else {
            return;
        };

        let copy_inputs = self.input_bind_group(device, shadow_depth, &pipelines.dummy_float.view);
        let x_inputs = self.input_bind_group(device, &self.dummy_depth.view, &targets.primary.view);
        let y_inputs =
            self.input_bind_group(device, &self.dummy_depth.view, &targets.intermediate.view);

        run_fullscreen_pass(
            encoder,
            &pipelines.copy,
            &[&self.horizontal_bind_group, &copy_inputs],
            &targets.primary.view,
            "esm-copy",
        );
        run_fullscreen_pass(
            encoder,
            &pipelines.blur,
            &[&self.horizontal_bind_group, &x_inputs],
            &targets.intermediate.view,
            "esm-blur-x",
        );
        run_fullscreen_pass(
            encoder,
            &pipelines.blur,
            &[&self.vertical_bind_group, &y_inputs],
            &targets.primary.view,
            "esm-blur-y",
        );
        self.filtered_this_frame = true;
    }

    /// The shadow texture valid after the last conditioning call.
    pub fn current<'a>(&'a self, raw: &'a wgpu::TextureView) -> ShadowMapView<'a> {
        match (&self.targets, self.filtered_this_frame) {
            (Some(targets), true) => ShadowMapView::Exponential(&targets.primary.view),
            _ => ShadowMapView::Raw(raw),
        }
    }

    /// Drop the scratch targets; they are recreated on the next filtered frame.
    pub fn release(&mut self) {
        self.targets = None;
        self.filtered_this_frame = false;
    }

    /// Bytes held by the scratch targets.
    pub fn memory_bytes(&self) -> u64 {
        self.targets
            .as_ref()
            .map(|t| t.primary.byte_size() + t.intermediate.byte_size())
            .unwrap_or(0)
    }

    fn input_bind_group(
        &self,
        device: &wgpu::Device,
        depth: &wgpu::TextureView,
        float: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("esm-input-bg"),
            layout: &self.input_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(depth),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(float),
                },
            ],
        })
    }
}

/// Normalized Gaussian weights matching `fs_log_blur` for taps `0..=radius`.
#[cfg(test)]
fn gaussian_weights(radius: u32) -> Vec<f32> {
    let sigma = (radius.max(1) as f32) * 0.5 + 0.5;
    let raw: Vec<f32> = (0..=radius)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let norm = raw[0] + 2.0 * raw[1..].iter().sum::<f32>();
    raw.into_iter().map(|w| w / norm).collect()
}

/// CPU mirror of one log-space blur tap set, used to check the math.
#[cfg(test)]
fn log_blur(samples: &[f32], exponent: f32) -> f32 {
    let radius = samples.len() / 2;
    let weights = gaussian_weights(radius as u32);
    let d0 = samples[radius];
    let sum: f32 = samples
        .iter()
        .enumerate()
        .map(|(i, d)| weights[i.abs_diff(radius)] * (exponent * (d - d0)).exp())
        .sum();
    d0 + sum.ln() / exponent
}
