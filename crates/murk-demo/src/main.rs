//! Headless murk demo.
//!
//! Builds a small scene (sun, point light, shadow-casting spot light, a box
//! and an ellipsoid volume), renders it through [`FogPipeline`] for the
//! configured number of frames and logs what the pipeline holds.
//!
//! Run with `cargo run -p murk-demo -- --frames 120 --resolution-tier 4`.

use std::path::PathBuf;

use clap::Parser;
use glam::{Mat4, Vec3, Vec4};
use murk_config::{CliArgs, MurkConfig, VolumeMode, VolumeShape, default_config_dir};
use murk_pipeline::{FogPipeline, FrameTargets, ShadowProvider, SunShadow};
use murk_render::{FogCamera, GpuContext, VolumeTexture, init_headless_blocking};
use murk_scene::{EntityId, FogLight, FogVolume, LightKind, LightSource, SceneSnapshot};
use tracing::{error, info};

const SHADOW_RESOLUTION: u32 = 1024;
const SHADOW_DISTANCE: f32 = 150.0;
const SPOT_ID: EntityId = EntityId(3);
const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Stands in for a shadow renderer: depth maps cleared to the far plane, so
/// nothing is occluded, with real cascade and spot projections.
struct DemoShadows {
    sun_atlas: VolumeTexture,
    spot_map: VolumeTexture,
    sun_matrix: Mat4,
}

impl DemoShadows {
    fn new(ctx: &GpuContext, sun_direction: Vec3) -> Self {
        let depth_map = |label| {
            VolumeTexture::new_2d(
                &ctx.device,
                label,
                SHADOW_RESOLUTION,
                SHADOW_RESOLUTION,
                wgpu::TextureFormat::Depth32Float,
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT,
            )
        };
        let sun_atlas = depth_map("demo-sun-shadow");
        let spot_map = depth_map("demo-spot-shadow");
        clear_depth(ctx, &sun_atlas.view, 1.0);
        clear_depth(ctx, &spot_map.view, 1.0);

        let direction = sun_direction.normalize();
        let half = SHADOW_DISTANCE * 0.5;
        let view = Mat4::look_to_rh(-direction * SHADOW_DISTANCE, direction, Vec3::Z);
        let projection = Mat4::orthographic_rh(-half, half, -half, half, 0.1, SHADOW_DISTANCE * 2.0);

        Self {
            sun_atlas,
            spot_map,
            sun_matrix: projection * view,
        }
    }
}

impl ShadowProvider for DemoShadows {
    fn sun_shadow(&self) -> Option<SunShadow<'_>> {
        Some(SunShadow {
            view: &self.sun_atlas.view,
            resolution: SHADOW_RESOLUTION,
            cascade_count: 1,
            splits: [1.0, 0.0, 0.0, 0.0],
            matrices: [self.sun_matrix, Mat4::ZERO, Mat4::ZERO, Mat4::ZERO],
            shadow_distance: SHADOW_DISTANCE,
            shadow_near_plane_offset: 2.0,
        })
    }

    fn spot_shadow(&self, id: EntityId) -> Option<&wgpu::TextureView> {
        (id == SPOT_ID).then_some(&self.spot_map.view)
    }
}

fn clear_depth(ctx: &GpuContext, view: &wgpu::TextureView, depth: f32) {
    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("demo-clear-depth"),
        });
    {
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("demo-clear-depth"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(depth),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }
    ctx.submit_and_wait(encoder);
}

fn demo_scene() -> SceneSnapshot {
    let fog = FogLight::default();
    SceneSnapshot {
        lights: vec![
            LightSource {
                id: EntityId(1),
                kind: LightKind::Directional,
                position: Vec3::ZERO,
                direction: Vec3::new(0.4, -1.0, -0.3),
                color: Vec3::new(1.0, 0.95, 0.85),
                intensity: 3.0,
                fog_light: Some(fog),
            },
            LightSource {
                id: EntityId(2),
                kind: LightKind::Point { range: 12.0 },
                position: Vec3::new(-4.0, 1.5, -12.0),
                direction: Vec3::NEG_Z,
                color: Vec3::new(1.0, 0.5, 0.2),
                intensity: 6.0,
                fog_light: Some(fog),
            },
            LightSource {
                id: SPOT_ID,
                kind: LightKind::Spot {
                    range: 25.0,
                    spot_angle: 40.0,
                    shadow_near_plane: 0.2,
                },
                position: Vec3::new(3.0, 8.0, -18.0),
                direction: Vec3::new(0.0, -1.0, 0.2),
                color: Vec3::new(0.6, 0.7, 1.0),
                intensity: 10.0,
                fog_light: Some(FogLight {
                    cast_shadow: true,
                    ..fog
                }),
            },
        ],
        volumes: vec![
            FogVolume {
                id: EntityId(10),
                shape: VolumeShape::Box,
                position: Vec3::new(0.0, 0.0, -25.0),
                half_extents: Vec3::new(6.0, 3.0, 4.0),
                color: Vec4::new(0.8, 0.8, 0.9, 1.0),
                mode: VolumeMode::Opaque,
                absorption: 0.6,
                soft_edges: 0.3,
            },
            FogVolume {
                id: EntityId(11),
                shape: VolumeShape::Ellipsoid,
                position: Vec3::new(5.0, 1.0, -10.0),
                half_extents: Vec3::new(3.0, 2.0, 3.0),
                color: Vec4::ONE,
                mode: VolumeMode::CutEverything,
                absorption: 0.0,
                soft_edges: 0.5,
            },
        ],
    }
}

fn main() {
    let args = CliArgs::parse();

    let config_dir = args
        .config
        .clone()
        .or_else(default_config_dir)
        .unwrap_or_else(|| PathBuf::from("murk"));

    let mut config = MurkConfig::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        MurkConfig::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    murk_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let ctx = match init_headless_blocking() {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Cannot run the fog demo: {e}");
            std::process::exit(1);
        }
    };

    let settings = &config.fog;
    let demo = &config.demo;
    let mut scene = demo_scene();
    let shadows = DemoShadows::new(&ctx, scene.lights[0].direction);

    let mut camera = FogCamera::looking_to(Vec3::new(0.0, 2.0, 8.0), Vec3::NEG_Z, Vec3::Y);
    camera.far = 400.0;
    camera.set_aspect_ratio(demo.width as f32, demo.height as f32);

    let target = |label, usage| {
        VolumeTexture::new_2d(&ctx.device, label, demo.width, demo.height, COLOR_FORMAT, usage)
    };
    let input = target("demo-scene-color", wgpu::TextureUsages::TEXTURE_BINDING);
    let output = target("demo-fogged-color", wgpu::TextureUsages::RENDER_ATTACHMENT);
    let depth = VolumeTexture::new_2d(
        &ctx.device,
        "demo-scene-depth",
        demo.width,
        demo.height,
        wgpu::TextureFormat::Depth32Float,
        wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT,
    );
    clear_depth(&ctx, &depth.view, 0.999);

    let mut pipeline = FogPipeline::new(&ctx.device, &ctx.queue, settings);
    if let Err(e) = pipeline.initialize(&ctx.device, &ctx.queue, &scene, settings, &camera, &shadows)
    {
        error!("Fog pipeline initialization failed: {e}");
        std::process::exit(1);
    }
    info!(
        "Fog initialized at {:?} ({:?}), rendering {} frames at {}x{}",
        settings.volume_resolution,
        pipeline.scene_buffers().dims(),
        demo.frames,
        demo.width,
        demo.height
    );

    for i in 0..demo.frames {
        let t = i as f32 * demo.frame_time;
        scene.lights[1].position.x = -4.0 + 3.0 * t.sin();
        camera.position.x = 2.0 * (t * 0.25).sin();

        if let Err(e) = pipeline.update(
            &ctx.device,
            &ctx.queue,
            settings,
            &camera,
            &shadows,
            demo.frame_time,
        ) {
            error!("Fog update failed: {e}");
            break;
        }

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("demo-frame"),
            });
        let rendered = pipeline.render(
            &ctx.device,
            &ctx.queue,
            &mut encoder,
            &scene,
            &camera,
            settings,
            &shadows,
            FrameTargets {
                input: &input.view,
                depth: Some(&depth.view),
                output: &output.view,
                output_format: COLOR_FORMAT,
            },
        );
        if let Err(e) = rendered {
            error!("Fog render failed: {e}");
            break;
        }
        ctx.submit_and_wait(encoder);

        if i % 60 == 0 {
            let chain = pipeline
                .last_plan()
                .map_or(0, |plan| plan.injections().count());
            let stats = pipeline.scene_buffers().stats();
            info!(
                "Frame {i}: {chain} injection dispatches, lights {}/{}, volumes {}/{}",
                stats.visible_lights, stats.total_lights, stats.visible_volumes, stats.total_volumes
            );
        }
    }

    let memory = pipeline.scene_buffers().texture_memory();
    for (label, bytes) in &memory.entries {
        info!("{label}: {bytes} bytes");
    }
    info!(
        "Rendered {} frames, {:.2} MB of fog textures",
        pipeline.frame_state().frame,
        memory.total_megabytes()
    );
    pipeline.release_all();
}
