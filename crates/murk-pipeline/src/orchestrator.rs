//! The fog pipeline as the host drives it.
//!
//! [`FogPipeline`] owns the scene buffers, both filters and the pass
//! pipelines. Each [`FogPipeline::render`] records one frame into the host's
//! encoder by walking the [`FramePlan`] for that frame; it never waits on the
//! GPU.

use murk_config::FogSettings;
use murk_filter::{ShadowFilter, ShadowMapView, VolumeSpatialFilter};
use murk_render::{FogCamera, dispatch, run_fullscreen_pass, workgroup_count};
use murk_scene::stats::bytes_to_megabytes;
use murk_scene::{
    DepthStepParams, FogScene, NoiseParams, SceneBuffers, SceneError, ShadowedSpot,
    VolumeResources,
};

use crate::error::PipelineError;
use crate::frame::FrameState;
use crate::passes::{FogPasses, InjectionTextures};
use crate::plan::{self, FramePlan, InjectionKind, PassStep, PlanInputs, VolumeTarget};
use crate::shadow::{ShadowProvider, spot_view_projection};
use crate::tracker::{SettingsChange, SettingsTracker};
use crate::uniforms::{CascadeInfo, FogUniforms, InjectionUniforms, RecordCounts, UniformInputs};

/// Frames between two performance reports when `debug_performance` is set.
pub const STATS_INTERVAL: u32 = 120;

/// Host images of one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameTargets<'a> {
    /// Lit scene color, sampled per pixel.
    pub input: &'a wgpu::TextureView,
    /// Scene depth. Without it every pixel is treated as sky.
    pub depth: Option<&'a wgpu::TextureView>,
    /// Overwritten with the fogged image.
    pub output: &'a wgpu::TextureView,
    pub output_format: wgpu::TextureFormat,
}

pub struct FogPipeline {
    scene: SceneBuffers,
    shadow_filter: ShadowFilter,
    spatial_filter: VolumeSpatialFilter,
    passes: FogPasses,
    state: FrameState,
    tracker: SettingsTracker,
    fog_uniforms: wgpu::Buffer,
    /// One buffer per injection dispatch; queue writes land before the
    /// encoder executes, so dispatches cannot share one.
    injection_uniforms: Vec<wgpu::Buffer>,
    missing_sun_reported: bool,
    last_plan: Option<FramePlan>,
}

impl FogPipeline {
    /// Create the GPU pipelines. Nothing is sized until
    /// [`FogPipeline::initialize`].
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, settings: &FogSettings) -> Self {
        let fog_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("fog-uniforms"),
            size: std::mem::size_of::<FogUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            scene: SceneBuffers::new(),
            shadow_filter: ShadowFilter::new(device, settings.log_blur),
            spatial_filter: VolumeSpatialFilter::new(
                device,
                settings.volume_filtering.is_enabled(),
            ),
            passes: FogPasses::new(device, queue),
            state: FrameState::new(),
            tracker: SettingsTracker::new(),
            fog_uniforms,
            injection_uniforms: Vec::new(),
            missing_sun_reported: false,
            last_plan: None,
        }
    }

    /// Extract the scene and allocate every resolution-sized resource.
    /// Also the way back after [`FogPipeline::release_all`]; `rebuild` alone
    /// does the same for a scene that has not changed.
    ///
    /// A scene without a sun is not an error here: it is logged once and the
    /// sun passes contribute nothing.
    pub fn initialize(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        scene: &dyn FogScene,
        settings: &FogSettings,
        camera: &FogCamera,
        shadows: &dyn ShadowProvider,
    ) -> Result<(), PipelineError> {
        self.rescan(scene);
        self.rebuild(device, queue, settings, camera, shadows)
    }

    /// Re-extract lights and volumes, e.g. after entities were added.
    pub fn rescan(&mut self, scene: &dyn FogScene) {
        match self.scene.extract_lights(scene) {
            Ok(()) => self.missing_sun_reported = false,
            Err(err @ SceneError::MissingSun) => {
                if !self.missing_sun_reported {
                    log::error!("{err}");
                    self.missing_sun_reported = true;
                }
            }
        }
        self.scene.extract_volumes(scene);
    }

    /// Reallocate the froxel volumes, depth table, noise LUT and record
    /// buffers. History is discarded. Extracted lights and volumes survive
    /// [`FogPipeline::release_all`] and out-of-memory failures, so a host can
    /// retry here, e.g. at a lower tier.
    pub fn rebuild(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        settings: &FogSettings,
        camera: &FogCamera,
        shadows: &dyn ShadowProvider,
    ) -> Result<(), PipelineError> {
        let params = depth_params(settings, camera, shadows);

        let oom_scope = device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let validation_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.scene
            .compute_volume_textures(device, queue, settings, camera, &params);
        let validation = pollster::block_on(validation_scope.pop());
        let out_of_memory = pollster::block_on(oom_scope.pop());

        if let Some(err) = out_of_memory {
            self.scene.release_all();
            self.tracker.reset();
            return Err(PipelineError::OutOfMemory(format!(
                "allocating {:?} volumes: {err}",
                settings.volume_resolution
            )));
        }
        if let Some(err) = validation {
            return Err(PipelineError::Validation {
                context: "allocating fog volumes".to_string(),
                message: err.to_string(),
            });
        }

        self.state.reset_history();
        self.tracker.observe(settings, camera, &params);
        Ok(())
    }

    /// Apply this frame's settings. Must run before [`FogPipeline::render`].
    ///
    /// Returns the regeneration that was performed, if any.
    pub fn update(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        settings: &FogSettings,
        camera: &FogCamera,
        shadows: &dyn ShadowProvider,
        dt: f32,
    ) -> Result<SettingsChange, PipelineError> {
        if self.scene.dims().is_none() {
            return Err(PipelineError::NotInitialized);
        }

        self.state.accumulate_wind(settings.wind_velocity, dt);
        self.shadow_filter.set_mode(queue, settings.log_blur);
        self.spatial_filter
            .set_enabled(settings.volume_filtering.is_enabled());

        let params = depth_params(settings, camera, shadows);
        let change = self.tracker.observe(settings, camera, &params);
        match change {
            SettingsChange::None => {}
            SettingsChange::DepthSteps => self.scene.refresh_depth_steps(queue, camera, &params),
            SettingsChange::Noise => {
                self.scene
                    .regenerate_noise(device, queue, NoiseParams::from_settings(settings));
                self.scene.refresh_depth_steps(queue, camera, &params);
            }
            SettingsChange::Resolution => {
                log::info!(
                    "Fog resolution changed to {:?}, rebuilding",
                    settings.volume_resolution
                );
                self.rebuild(device, queue, settings, camera, shadows)?;
            }
        }
        Ok(change)
    }

    /// Schedule of the next frame for the given visible shadowed spot count.
    pub fn plan_frame(&self, shadowed_spots: usize, sun_shadow: bool) -> FramePlan {
        plan::plan_frame(PlanInputs {
            frame: self.state.frame,
            shadowed_spots,
            shadow_filtered: sun_shadow && self.shadow_filter.is_active(),
            spatial_filter: self.spatial_filter.is_enabled(),
        })
    }

    /// Record one fog frame into `encoder`.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        scene: &dyn FogScene,
        camera: &FogCamera,
        settings: &FogSettings,
        shadows: &dyn ShadowProvider,
        targets: FrameTargets<'_>,
    ) -> Result<(), PipelineError> {
        if self.scene.resources().is_none() {
            return Err(PipelineError::NotInitialized);
        }

        // Visibility decides the injection chain, so records are rebuilt
        // before the plan is made.
        self.scene.refresh_transforms(scene);
        self.scene.cull(camera);
        self.scene.light_buffer_generate(device, queue);
        self.scene.volume_buffer_generate(device, queue);

        let spots = self.scene.visible_shadowed_spots();
        let sun_shadow = shadows.sun_shadow();
        if sun_shadow.is_some() {
            self.shadow_filter.prepare(device);
        }
        let plan = self.plan_frame(spots.len(), sun_shadow.is_some());
        let frame = self.state.frame;
        let shadow_filtered = plan
            .steps
            .iter()
            .any(|step| matches!(step, PassStep::ConditionShadow { filtered: true }));

        self.passes.prepare_compose(device, targets.output_format);
        while self.injection_uniforms.len() <= spots.len() {
            self.injection_uniforms.push(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("fog-injection-uniforms"),
                size: std::mem::size_of::<InjectionUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }

        let (Some(resources), Some(cascade_lut), Some(noise_lut)) = (
            self.scene.resources(),
            self.scene.cascade_lut(),
            self.scene.noise_lut(),
        ) else {
            return Err(PipelineError::NotInitialized);
        };
        let [w, h, d] = resources.dims;
        let frame_group =
            self.passes
                .frame_bind_group(device, &self.fog_uniforms, &resources.depth_steps);
        let placeholder_depth = &self.passes.placeholders.depth.view;
        let mut injection_index = 0;

        for step in &plan.steps {
            match *step {
                PassStep::RebuildBuffers => {
                    let params = depth_params(settings, camera, shadows);
                    let uniforms = FogUniforms::new(&UniformInputs {
                        camera,
                        settings,
                        frame: &self.state,
                        dims: resources.dims,
                        march_length: params.march_length(camera),
                        sun: self.scene.sun(),
                        cascades: sun_shadow.map(|shadow| CascadeInfo {
                            count: shadow.cascade_count,
                            splits: shadow.splits,
                            shadow_distance: shadow.shadow_distance,
                            resolution: shadow.resolution,
                        }),
                        shadow_filtered,
                        counts: RecordCounts {
                            points: self.scene.point_lights().len(),
                            spots: self.scene.spot_lights().len(),
                            boxes: self.scene.boxes().len(),
                            ellipsoids: self.scene.ellipsoids().len(),
                        },
                    });
                    queue.write_buffer(&self.fog_uniforms, 0, bytemuck::bytes_of(&uniforms));
                }
                PassStep::CascadeMatrices => {
                    let count = sun_shadow.map_or(0, |s| s.cascade_count.min(4) as usize);
                    let matrices = sun_shadow.map(|s| s.matrices).unwrap_or_default();
                    self.scene.write_cascade_matrices(queue, &matrices[..count]);
                }
                PassStep::ConditionShadow { filtered } => {
                    if let (true, Some(shadow)) = (filtered, sun_shadow) {
                        self.shadow_filter.gen_exponential_shadow_map(
                            device,
                            encoder,
                            shadow.view,
                            shadow.resolution,
                        );
                    }
                }
                PassStep::SunRadiance => {
                    let shadow_view = match sun_shadow {
                        Some(shadow) if shadow_filtered => self.shadow_filter.current(shadow.view),
                        Some(shadow) => ShadowMapView::Raw(shadow.view),
                        None => ShadowMapView::Raw(placeholder_depth),
                    };
                    let (pipeline, group) = self.passes.radiance(
                        device,
                        &cascade_lut.view,
                        shadow_view,
                        &resources.sun_radiance.view,
                    );
                    dispatch(
                        encoder,
                        pipeline,
                        &[&frame_group, &group],
                        [workgroup_count(w, 8), workgroup_count(h, 8), 1],
                        "fog-sun-radiance",
                    );
                }
                PassStep::Injection(injection) => {
                    let (uniforms, spot_shadow) = match injection.kind {
                        InjectionKind::Primary => (
                            InjectionUniforms::primary(injection.reproject),
                            placeholder_depth,
                        ),
                        InjectionKind::ShadowedSpot(index) => {
                            let spot: &ShadowedSpot = &spots[index];
                            (
                                InjectionUniforms::shadowed_spot(
                                    spot,
                                    spot_view_projection(spot),
                                    injection.reproject,
                                ),
                                shadows.spot_shadow(spot.id).unwrap_or(placeholder_depth),
                            )
                        }
                    };
                    let uniform_buffer = &self.injection_uniforms[injection_index];
                    injection_index += 1;
                    queue.write_buffer(uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

                    let history = VolumeTarget::History(injection.history);
                    let (history_medium, history_radiance) = volume_pair(resources, history);
                    let (chain_medium, chain_radiance) =
                        volume_pair(resources, injection.read.unwrap_or(history));
                    let (out_medium, out_radiance) = volume_pair(resources, injection.write);

                    let lights = self
                        .passes
                        .lights_bind_group(device, uniform_buffer, &self.scene);
                    let (inputs, chain) = self.passes.injection_bind_groups(
                        device,
                        &InjectionTextures {
                            noise: &noise_lut.view,
                            history_medium,
                            history_radiance,
                            spot_shadow,
                            chain_medium,
                            chain_radiance,
                            out_medium,
                            out_radiance,
                        },
                    );
                    let shadowed = matches!(injection.kind, InjectionKind::ShadowedSpot(_));
                    dispatch(
                        encoder,
                        self.passes.injection_pipeline(shadowed),
                        &[&frame_group, &lights, &inputs, &chain],
                        [
                            workgroup_count(w, 4),
                            workgroup_count(h, 4),
                            workgroup_count(d, 4),
                        ],
                        if shadowed {
                            "fog-inject-spot"
                        } else {
                            "fog-inject-medium"
                        },
                    );
                }
                PassStep::Inscatter { write } => {
                    let (medium, radiance) = volume_pair(resources, VolumeTarget::History(write));
                    let (pipeline, group) = self.passes.inscatter(
                        device,
                        medium,
                        radiance,
                        &resources.sun_radiance.view,
                        &resources.shading.slot(write).view,
                    );
                    dispatch(
                        encoder,
                        pipeline,
                        &[&frame_group, &group],
                        [workgroup_count(w, 8), workgroup_count(h, 8), 1],
                        "fog-inscatter",
                    );
                }
                PassStep::SpatialFilter { roles } => {
                    if roles.is_some() {
                        let written = self.spatial_filter.volume_spatial_filter(
                            device,
                            encoder,
                            frame,
                            &resources.shading,
                        );
                        debug_assert_eq!(written, roles.map(|(_, destination)| destination));
                    }
                }
                PassStep::Compose { read } => {
                    let depth = targets.depth.unwrap_or(placeholder_depth);
                    if let Some((pipeline, group)) = self.passes.compose(
                        device,
                        targets.input,
                        depth,
                        &resources.shading.slot(read).view,
                    ) {
                        run_fullscreen_pass(
                            encoder,
                            pipeline,
                            &[&frame_group, &group],
                            targets.output,
                            "fog-compose",
                        );
                    }
                }
                PassStep::AdvanceCounters => {
                    self.state
                        .advance(settings.temporal_filter, camera.view_projection_matrix());
                }
            }
        }

        if settings.debug_performance && self.state.frame % STATS_INTERVAL == 0 {
            self.log_stats();
        }
        self.last_plan = Some(plan);
        Ok(())
    }

    /// Drop every GPU resource sized by the scene. Safe to call repeatedly.
    pub fn release_all(&mut self) {
        self.scene.release_all();
        self.shadow_filter.release();
        self.injection_uniforms.clear();
        self.state = FrameState::new();
        self.tracker.reset();
        self.missing_sun_reported = false;
        self.last_plan = None;
        log::debug!("Released fog pipeline resources");
    }

    fn log_stats(&self) {
        let stats = self.scene.stats();
        let memory = self.scene.texture_memory();
        log::info!(
            "Fog frame {}: lights {}/{}, volumes {}/{}, textures {:.2} MB, shadow filter {:.2} MB",
            self.state.frame,
            stats.visible_lights,
            stats.total_lights,
            stats.visible_volumes,
            stats.total_volumes,
            memory.total_megabytes(),
            bytes_to_megabytes(self.shadow_filter.memory_bytes()),
        );
    }

    pub fn frame_state(&self) -> &FrameState {
        &self.state
    }

    pub fn scene_buffers(&self) -> &SceneBuffers {
        &self.scene
    }

    pub fn shadow_filter(&self) -> &ShadowFilter {
        &self.shadow_filter
    }

    /// The plan executed by the last `render`.
    pub fn last_plan(&self) -> Option<&FramePlan> {
        self.last_plan.as_ref()
    }
}

/// Depth slicing inputs. Without a sun shadow the grid reaches the far plane.
fn depth_params(
    settings: &FogSettings,
    camera: &FogCamera,
    shadows: &dyn ShadowProvider,
) -> DepthStepParams {
    match shadows.sun_shadow() {
        Some(shadow) => DepthStepParams {
            shadow_distance: shadow.shadow_distance,
            shadow_near_plane_offset: shadow.shadow_near_plane_offset,
            render_distance: settings.render_distance,
        },
        None => DepthStepParams {
            shadow_distance: camera.far,
            shadow_near_plane_offset: 0.0,
            render_distance: settings.render_distance,
        },
    }
}

fn volume_pair(
    resources: &VolumeResources,
    target: VolumeTarget,
) -> (&wgpu::TextureView, &wgpu::TextureView) {
    match target {
        VolumeTarget::History(slot) => (
            &resources.medium.slot(slot).view,
            &resources.radiance.slot(slot).view,
        ),
        VolumeTarget::Scratch(slot) => (
            &resources.scratch_medium.slot(slot).view,
            &resources.scratch_radiance.slot(slot).view,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};
    use murk_config::{VolumeFiltering, VolumeMode, VolumeResolution, VolumeShape};
    use murk_render::VolumeTexture;
    use murk_scene::{EntityId, FogLight, FogVolume, LightKind, LightSource, SceneSnapshot};

    use crate::reference::{self, PixelInputs};
    use crate::shadow::NoShadows;
    use crate::uniforms::SunLight;

    fn test_device() -> Option<(wgpu::Device, wgpu::Queue)> {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions::default())
                .await
                .ok()?;
            adapter
                .request_device(&wgpu::DeviceDescriptor::default())
                .await
                .ok()
        })
    }

    fn settings() -> FogSettings {
        FogSettings {
            volume_resolution: VolumeResolution::Tier0,
            ..Default::default()
        }
    }

    fn camera() -> FogCamera {
        FogCamera {
            far: 200.0,
            ..Default::default()
        }
    }

    fn sun() -> LightSource {
        LightSource {
            id: EntityId(1),
            kind: LightKind::Directional,
            position: Vec3::ZERO,
            direction: Vec3::new(0.3, -1.0, -0.2),
            color: Vec3::ONE,
            intensity: 1.0,
            fog_light: Some(FogLight::default()),
        }
    }

    fn shadowed_spot(id: u64) -> LightSource {
        LightSource {
            id: EntityId(id),
            kind: LightKind::Spot {
                range: 30.0,
                spot_angle: 45.0,
                shadow_near_plane: 0.2,
            },
            position: Vec3::new(0.0, 5.0, -20.0),
            direction: Vec3::NEG_Y,
            color: Vec3::new(1.0, 0.8, 0.6),
            intensity: 4.0,
            fog_light: Some(FogLight {
                cast_shadow: true,
                ..Default::default()
            }),
        }
    }

    fn scene() -> SceneSnapshot {
        SceneSnapshot {
            lights: vec![sun(), shadowed_spot(2), shadowed_spot(3)],
            volumes: vec![FogVolume {
                id: EntityId(10),
                shape: VolumeShape::Box,
                position: Vec3::new(0.0, 0.0, -15.0),
                half_extents: Vec3::splat(3.0),
                color: Vec4::ONE,
                mode: VolumeMode::Opaque,
                absorption: 1.0,
                soft_edges: 0.2,
            }],
        }
    }

    struct Frame {
        input: VolumeTexture,
        output: VolumeTexture,
    }

    fn frame_textures(device: &wgpu::Device) -> Frame {
        let format = wgpu::TextureFormat::Rgba8Unorm;
        Frame {
            input: VolumeTexture::new_2d(
                device,
                "test-input",
                64,
                36,
                format,
                wgpu::TextureUsages::TEXTURE_BINDING,
            ),
            output: VolumeTexture::new_2d(
                device,
                "test-output",
                64,
                36,
                format,
                wgpu::TextureUsages::RENDER_ATTACHMENT,
            ),
        }
    }

    fn render_frames(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipeline: &mut FogPipeline,
        scene: &SceneSnapshot,
        settings: &FogSettings,
        frames: u32,
    ) {
        let textures = frame_textures(device);
        let camera = camera();
        for _ in 0..frames {
            pipeline
                .update(device, queue, settings, &camera, &NoShadows, 1.0 / 60.0)
                .expect("update after initialize");
            let mut encoder =
                device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
            pipeline
                .render(
                    device,
                    queue,
                    &mut encoder,
                    scene,
                    &camera,
                    settings,
                    &NoShadows,
                    FrameTargets {
                        input: &textures.input.view,
                        depth: None,
                        output: &textures.output.view,
                        output_format: textures.output.format,
                    },
                )
                .expect("render after initialize");
            queue.submit([encoder.finish()]);
        }
        let _ = device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        });
    }

    /// Copy one z layer of `texture` back to the CPU, rows unpadded.
    fn read_layer(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        texture: &VolumeTexture,
        z: u32,
    ) -> Vec<u8> {
        let [width, height, _] = texture.dims;
        let row = width * texture.format.block_copy_size(None).unwrap_or(4);
        let padded = row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("test-readback"),
            size: u64::from(padded * height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: 0, y: 0, z },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit([encoder.finish()]);

        let slice = buffer.slice(..);
        slice.map_async(wgpu::MapMode::Read, |_| {});
        device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .expect("readback poll");
        let data = slice.get_mapped_range();
        data.chunks(padded as usize)
            .flat_map(|r| r[..row as usize].iter().copied())
            .collect()
    }

    fn f16_to_f32(bits: u16) -> f32 {
        let sign = if bits & 0x8000 != 0 { -1.0 } else { 1.0 };
        let exponent = i32::from((bits >> 10) & 0x1f);
        let mantissa = f32::from(bits & 0x3ff);
        match exponent {
            0 => sign * mantissa * 2f32.powi(-24),
            31 if mantissa == 0.0 => sign * f32::INFINITY,
            31 => f32::NAN,
            _ => sign * (1.0 + mantissa / 1024.0) * 2f32.powi(exponent - 15),
        }
    }

    fn rgba16f_texels(bytes: &[u8]) -> Vec<Vec4> {
        bytes
            .chunks_exact(8)
            .map(|t| {
                let c = |i: usize| f16_to_f32(u16::from_le_bytes([t[i], t[i + 1]]));
                Vec4::new(c(0), c(2), c(4), c(6))
            })
            .collect()
    }

    fn rgba8_texels(bytes: &[u8]) -> Vec<Vec3> {
        bytes
            .chunks_exact(4)
            .map(|t| Vec3::new(t[0] as f32, t[1] as f32, t[2] as f32) / 255.0)
            .collect()
    }

    /// Initialize, run one frame over a uniform `input` color and return the
    /// pipeline with the composed output.
    fn render_single_frame(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        scene: &SceneSnapshot,
        settings: &FogSettings,
        input: [u8; 4],
    ) -> (FogPipeline, Vec<u8>) {
        let (width, height) = (64, 36);
        let format = wgpu::TextureFormat::Rgba8Unorm;
        let input_texture = VolumeTexture::new_2d(
            device,
            "test-input",
            width,
            height,
            format,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        input_texture.write(queue, &input.repeat((width * height) as usize));
        let output = VolumeTexture::new_2d(
            device,
            "test-output",
            width,
            height,
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );

        let camera = camera();
        let mut pipeline = FogPipeline::new(device, queue, settings);
        pipeline
            .initialize(device, queue, scene, settings, &camera, &NoShadows)
            .expect("initialize");
        pipeline
            .update(device, queue, settings, &camera, &NoShadows, 0.0)
            .expect("update");
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        pipeline
            .render(
                device,
                queue,
                &mut encoder,
                scene,
                &camera,
                settings,
                &NoShadows,
                FrameTargets {
                    input: &input_texture.view,
                    depth: None,
                    output: &output.view,
                    output_format: format,
                },
            )
            .expect("render");
        queue.submit([encoder.finish()]);

        let pixels = read_layer(device, queue, &output, 0);
        (pipeline, pixels)
    }

    /// Phase functions flattened so every view direction scatters alike.
    fn isotropic_settings() -> FogSettings {
        FogSettings {
            anisotropy_atmosphere: 0.0,
            anisotropy_sun: 0.0,
            radial_lobe: 0.0,
            ambient_color: [0.2, 0.3, 0.1],
            atmosphere_color: [0.4, 0.0, 0.2],
            ..settings()
        }
    }

    #[test]
    fn test_depth_params_without_sun_shadow_reach_far_plane() {
        let params = depth_params(&settings(), &camera(), &NoShadows);
        assert_eq!(params.shadow_distance, 200.0);
        assert_eq!(params.shadow_near_plane_offset, 0.0);
        assert_eq!(params.render_distance, 1.0);
    }

    #[test]
    fn test_render_before_initialize_fails() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let settings = settings();
        let mut pipeline = FogPipeline::new(&device, &queue, &settings);
        let textures = frame_textures(&device);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        let result = pipeline.render(
            &device,
            &queue,
            &mut encoder,
            &scene(),
            &camera(),
            &settings,
            &NoShadows,
            FrameTargets {
                input: &textures.input.view,
                depth: None,
                output: &textures.output.view,
                output_format: textures.output.format,
            },
        );
        assert!(matches!(result, Err(PipelineError::NotInitialized)));
        assert!(matches!(
            pipeline.update(&device, &queue, &settings, &camera(), &NoShadows, 0.1),
            Err(PipelineError::NotInitialized)
        ));
    }

    #[test]
    fn test_frames_advance_and_follow_plan() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let settings = settings();
        let scene = scene();
        let mut pipeline = FogPipeline::new(&device, &queue, &settings);
        pipeline
            .initialize(&device, &queue, &scene, &settings, &camera(), &NoShadows)
            .expect("initialize");
        assert_eq!(
            pipeline.scene_buffers().dims(),
            Some(VolumeResolution::Tier0.dimensions())
        );

        render_frames(&device, &queue, &mut pipeline, &scene, &settings, 3);

        assert_eq!(pipeline.frame_state().frame, 3);
        assert!(pipeline.frame_state().has_history());
        let plan = pipeline.last_plan().expect("a plan after rendering");
        let visible = pipeline.scene_buffers().visible_shadowed_spots().len();
        assert_eq!(plan.injections().count(), visible + 1);
        // Frame 2 wrote history slot 0 and composed from it.
        assert_eq!(plan.compose_slot(), Some(0));
    }

    #[test]
    fn test_spatial_filter_swaps_compose_slot() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let mut settings = settings();
        settings.volume_filtering = VolumeFiltering::Enabled;
        let scene = scene();
        let mut pipeline = FogPipeline::new(&device, &queue, &settings);
        pipeline
            .initialize(&device, &queue, &scene, &settings, &camera(), &NoShadows)
            .expect("initialize");

        render_frames(&device, &queue, &mut pipeline, &scene, &settings, 1);
        let plan = pipeline.last_plan().expect("a plan after rendering");
        assert_eq!(plan.compose_slot(), Some(1));
    }

    #[test]
    fn test_missing_sun_degrades_without_error() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let settings = settings();
        let scene = SceneSnapshot {
            lights: vec![shadowed_spot(2)],
            volumes: Vec::new(),
        };
        let mut pipeline = FogPipeline::new(&device, &queue, &settings);
        pipeline
            .initialize(&device, &queue, &scene, &settings, &camera(), &NoShadows)
            .expect("a missing sun is not fatal");
        assert!(pipeline.scene_buffers().sun().is_none());

        render_frames(&device, &queue, &mut pipeline, &scene, &settings, 2);
        assert_eq!(pipeline.frame_state().frame, 2);
    }

    #[test]
    fn test_resolution_change_rebuilds_once() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let mut settings = settings();
        let camera = camera();
        let mut pipeline = FogPipeline::new(&device, &queue, &settings);
        pipeline
            .initialize(&device, &queue, &scene(), &settings, &camera, &NoShadows)
            .expect("initialize");

        settings.volume_resolution = VolumeResolution::Tier1;
        let first = pipeline
            .update(&device, &queue, &settings, &camera, &NoShadows, 0.0)
            .expect("update");
        let second = pipeline
            .update(&device, &queue, &settings, &camera, &NoShadows, 0.0)
            .expect("update");
        assert_eq!(first, SettingsChange::Resolution);
        assert_eq!(second, SettingsChange::None);
        assert_eq!(
            pipeline.scene_buffers().dims(),
            Some(VolumeResolution::Tier1.dimensions())
        );
    }

    #[test]
    fn test_release_all_twice() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let settings = settings();
        let mut pipeline = FogPipeline::new(&device, &queue, &settings);
        pipeline
            .initialize(&device, &queue, &scene(), &settings, &camera(), &NoShadows)
            .expect("initialize");
        pipeline.release_all();
        pipeline.release_all();
        assert!(pipeline.scene_buffers().dims().is_none());
        assert_eq!(pipeline.frame_state().frame, 0);
    }

    #[test]
    fn test_release_then_rebuild_keeps_scene() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let settings = settings();
        let scene = scene();
        let mut pipeline = FogPipeline::new(&device, &queue, &settings);
        pipeline
            .initialize(&device, &queue, &scene, &settings, &camera(), &NoShadows)
            .expect("initialize");
        let before = pipeline.scene_buffers().stats();
        assert!(before.visible_volumes > 0);

        pipeline.release_all();
        pipeline
            .rebuild(&device, &queue, &settings, &camera(), &NoShadows)
            .expect("rebuild after release");
        render_frames(&device, &queue, &mut pipeline, &scene, &settings, 1);

        let buffers = pipeline.scene_buffers();
        assert!(buffers.sun().is_some());
        assert_eq!(buffers.stats(), before);
        assert!(buffers.is_volume_visible(EntityId(10)));
        assert_eq!(buffers.volume_records().boxes.len(), 1);
    }

    // No volumes and no global medium: every froxel stays clear, so the sky
    // only receives analytical fog, capped by its sky clamp.
    #[test]
    fn test_sun_only_scene_composes_analytical_fog() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let settings = FogSettings {
            global_density: 0.0,
            render_distance: 0.25,
            density_bottom: 100.0,
            analytical_fog_sky_clamp: 0.5,
            ..isotropic_settings()
        };
        let scene = SceneSnapshot {
            lights: vec![sun()],
            volumes: Vec::new(),
        };
        let (_pipeline, pixels) =
            render_single_frame(&device, &queue, &scene, &settings, [204, 51, 102, 255]);

        let sun_light = SunLight::from_source(Some(&sun()));
        let expected = reference::compose_pixel(
            &settings,
            &PixelInputs {
                input: Vec3::new(0.8, 0.2, 0.4),
                shading: Vec4::new(0.0, 0.0, 0.0, 1.0),
                analytical_color: reference::analytical_color(&settings, &sun_light, 0.0),
                beyond: 150.0,
                sky: true,
            },
        );
        for (i, pixel) in rgba8_texels(&pixels).into_iter().enumerate() {
            assert!(
                pixel.abs_diff_eq(expected, 2.5 / 255.0),
                "pixel {i}: {pixel} != {expected}"
            );
        }
    }

    // An opaque box around the camera swallows the first slice: the shading
    // map holds the lit shadow/ambient blend with zero transmittance, and the
    // composed image is that color alone.
    #[test]
    fn test_opaque_box_shows_shadow_ambient_blend() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let settings = FogSettings {
            analytical_fog: false,
            ..isotropic_settings()
        };
        let scene = SceneSnapshot {
            lights: vec![sun()],
            volumes: vec![FogVolume {
                id: EntityId(10),
                shape: VolumeShape::Box,
                position: Vec3::ZERO,
                half_extents: Vec3::splat(50.0),
                color: Vec4::ONE,
                mode: VolumeMode::Opaque,
                absorption: 1.0,
                soft_edges: 0.0,
            }],
        };
        let (pipeline, pixels) =
            render_single_frame(&device, &queue, &scene, &settings, [255, 255, 255, 255]);

        let sun_light = SunLight::from_source(Some(&sun()));
        assert!(sun_light.intensity > 0.0);
        let lit = reference::lit_radiance(&settings, &sun_light, 1.0, 0.0, Vec3::ZERO, 1.0);
        assert!(lit.cmpgt(reference::shadow_ambient_blend(&settings, 1.0)).all());

        let slot = pipeline
            .last_plan()
            .and_then(FramePlan::compose_slot)
            .expect("compose step");
        let resources = pipeline.scene_buffers().resources().expect("resources");
        let shading = resources.shading.slot(slot);
        for z in [0, resources.dims[2] - 1] {
            for texel in rgba16f_texels(&read_layer(&device, &queue, shading, z)) {
                assert!(
                    texel.truncate().abs_diff_eq(lit, 5e-3),
                    "slice {z}: {texel} != {lit}"
                );
                assert!(texel.w < 1e-3, "slice {z} transmittance {}", texel.w);
            }
        }
        for (i, pixel) in rgba8_texels(&pixels).into_iter().enumerate() {
            assert!(pixel.abs_diff_eq(lit, 2.5 / 255.0), "pixel {i}: {pixel} != {lit}");
        }
    }
}
