//! The scene buffer manager.
//!
//! [`SceneBuffers`] owns every GPU resource the fog passes read or write.
//! Passes borrow it per dispatch; nothing outside holds on to its textures
//! across frames.

use std::collections::{BTreeMap, BTreeSet};

use glam::Mat4;
use murk_config::{FogSettings, VolumeResolution};
use murk_render::{FogCamera, Frustum, VolumeTexture};

use crate::culling::{CullTarget, VisibilityCuller, VisibilityEvent};
use crate::depth_steps::{DepthStepParams, generate_depth_steps};
use crate::entity::{EntityId, FogScene, FogVolume, LightKind, LightSource};
use crate::error::SceneError;
use crate::gpu_array::GpuArray;
use crate::noise_lut::{NOISE_LUT_SIZE, NoiseParams, generate_noise_lut};
use crate::records::{
    BoxVolumeRecord, DepthStepRecord, EllipsoidVolumeRecord, LightRecords, PointLightRecord,
    ShadowedSpot, SpotLightRecord, VolumeRecords,
};
use crate::resources::VolumeResources;
use crate::stats::{SceneStats, TextureMemoryStats};

pub const NOISE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;
pub const CASCADE_LUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
/// Cascades stored in the matrix LUT.
pub const MAX_CASCADES: usize = 4;
/// One texel per matrix column.
pub const CASCADE_LUT_WIDTH: u32 = (MAX_CASCADES * 4) as u32;

#[derive(Debug)]
pub struct SceneBuffers {
    sun: Option<LightSource>,
    lights: BTreeMap<EntityId, LightSource>,
    volumes: BTreeMap<EntityId, FogVolume>,
    visible_lights: BTreeSet<EntityId>,
    visible_volumes: BTreeSet<EntityId>,
    culler: VisibilityCuller,

    light_records: LightRecords,
    volume_records: VolumeRecords,
    point_lights: GpuArray<PointLightRecord>,
    spot_lights: GpuArray<SpotLightRecord>,
    boxes: GpuArray<BoxVolumeRecord>,
    ellipsoids: GpuArray<EllipsoidVolumeRecord>,

    resolution: Option<VolumeResolution>,
    depth_steps: Vec<DepthStepRecord>,
    resources: Option<VolumeResources>,
    noise_lut: Option<VolumeTexture>,
    noise_params: Option<NoiseParams>,
    cascade_lut: Option<VolumeTexture>,
}

impl Default for SceneBuffers {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneBuffers {
    pub fn new() -> Self {
        Self {
            sun: None,
            lights: BTreeMap::new(),
            volumes: BTreeMap::new(),
            visible_lights: BTreeSet::new(),
            visible_volumes: BTreeSet::new(),
            culler: VisibilityCuller::new(),
            light_records: LightRecords::default(),
            volume_records: VolumeRecords::default(),
            point_lights: GpuArray::new("fog-point-lights"),
            spot_lights: GpuArray::new("fog-spot-lights"),
            boxes: GpuArray::new("fog-box-volumes"),
            ellipsoids: GpuArray::new("fog-ellipsoid-volumes"),
            resolution: None,
            depth_steps: Vec::new(),
            resources: None,
            noise_lut: None,
            noise_params: None,
            cascade_lut: None,
        }
    }

    // --- Extraction ---

    /// Re-scan the scene for fog lights.
    ///
    /// The first directional light with a fog attachment becomes the sun.
    /// Every other attached point or spot light is registered for culling.
    /// Without a sun the remaining lights are still registered and
    /// [`SceneError::MissingSun`] is returned.
    pub fn extract_lights(&mut self, scene: &dyn FogScene) -> Result<(), SceneError> {
        let mut sun = None;
        let mut found = BTreeMap::new();
        for light in scene.lights() {
            if light.fog_light.is_none() {
                continue;
            }
            match light.kind {
                LightKind::Directional if sun.is_none() => sun = Some(light.clone()),
                LightKind::Directional => {
                    log::warn!("Ignoring extra fog directional light {:?}", light.id);
                }
                LightKind::Point { .. } | LightKind::Spot { .. } => {
                    found.insert(light.id, light.clone());
                }
            }
        }

        let stale: Vec<EntityId> = self
            .lights
            .keys()
            .filter(|id| !found.contains_key(id))
            .copied()
            .collect();
        for id in stale {
            self.culler.unregister(CullTarget::Light(id));
            self.visible_lights.remove(&id);
        }
        for light in found.values() {
            if let Some(sphere) = light.bounding_sphere() {
                self.culler.register(CullTarget::Light(light.id), sphere);
            }
        }
        self.lights = found;
        self.sun = sun;

        log::debug!(
            "Extracted {} fog lights (sun: {})",
            self.lights.len(),
            self.sun.is_some()
        );
        if self.sun.is_none() {
            return Err(SceneError::MissingSun);
        }
        Ok(())
    }

    /// Re-scan the scene for fog volumes.
    pub fn extract_volumes(&mut self, scene: &dyn FogScene) {
        let found: BTreeMap<EntityId, FogVolume> =
            scene.volumes().iter().map(|v| (v.id, v.clone())).collect();

        let stale: Vec<EntityId> = self
            .volumes
            .keys()
            .filter(|id| !found.contains_key(id))
            .copied()
            .collect();
        for id in stale {
            self.culler.unregister(CullTarget::Volume(id));
            self.visible_volumes.remove(&id);
        }
        for volume in found.values() {
            self.culler
                .register(CullTarget::Volume(volume.id), volume.bounding_sphere());
        }
        self.volumes = found;
        log::debug!("Extracted {} fog volumes", self.volumes.len());
    }

    /// Pick up live transforms of already extracted entities. Entities the
    /// scene no longer reports keep their last known state until re-extraction.
    ///
    /// A light that lost its fog attachment or turned directional is dropped
    /// here. Point and spot records are partitioned by kind on every
    /// [`SceneBuffers::light_buffer_generate`], so kind changes between the
    /// two need nothing else. A light that newly joins fog needs a rescan.
    pub fn refresh_transforms(&mut self, scene: &dyn FogScene) {
        for light in scene.lights() {
            if self.lights.contains_key(&light.id) {
                match light.bounding_sphere() {
                    Some(sphere) if light.fog_light.is_some() => {
                        self.culler.update_sphere(CullTarget::Light(light.id), sphere);
                        self.lights.insert(light.id, light.clone());
                    }
                    _ => {
                        log::debug!("Fog light {:?} detached from fog", light.id);
                        self.detach_light(light.id);
                    }
                }
            } else if self.sun.as_ref().is_some_and(|sun| sun.id == light.id) {
                if light.fog_light.is_some() && light.kind == LightKind::Directional {
                    self.sun = Some(light.clone());
                } else {
                    log::warn!("Fog sun {:?} detached, rescan to pick a new one", light.id);
                    self.sun = None;
                }
            }
        }
        for volume in scene.volumes() {
            if let Some(known) = self.volumes.get_mut(&volume.id) {
                *known = volume.clone();
                self.culler
                    .update_sphere(CullTarget::Volume(volume.id), volume.bounding_sphere());
            }
        }
    }

    fn detach_light(&mut self, id: EntityId) {
        self.lights.remove(&id);
        self.culler.unregister(CullTarget::Light(id));
        self.visible_lights.remove(&id);
    }

    /// Register every extracted light and volume with the culler. Already
    /// registered entities keep their visibility.
    fn attach_culling(&mut self) {
        for light in self.lights.values() {
            if let Some(sphere) = light.bounding_sphere() {
                self.culler.register(CullTarget::Light(light.id), sphere);
            }
        }
        for volume in self.volumes.values() {
            self.culler
                .register(CullTarget::Volume(volume.id), volume.bounding_sphere());
        }
    }

    // --- Visibility ---

    /// Cull against the camera and apply the resulting transitions.
    pub fn cull(&mut self, camera: &FogCamera) -> Vec<VisibilityEvent> {
        let frustum = Frustum::from_view_projection(&camera.view_projection_matrix());
        let events = self.culler.cull(&frustum);
        for event in &events {
            self.apply_visibility_event(*event);
        }
        events
    }

    fn apply_visibility_event(&mut self, event: VisibilityEvent) {
        match event {
            VisibilityEvent::Entered(CullTarget::Light(id)) => {
                self.visible_lights.insert(id);
            }
            VisibilityEvent::Exited(CullTarget::Light(id)) => {
                self.visible_lights.remove(&id);
            }
            VisibilityEvent::Entered(CullTarget::Volume(id)) => {
                self.visible_volumes.insert(id);
            }
            VisibilityEvent::Exited(CullTarget::Volume(id)) => {
                self.visible_volumes.remove(&id);
            }
        }
    }

    // --- Record buffers ---

    /// Pack visible lights and upload point and non-shadowed spot records.
    pub fn light_buffer_generate(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        self.light_records = LightRecords::build(
            self.visible_lights
                .iter()
                .filter_map(|id| self.lights.get(id)),
        );
        self.point_lights
            .upload(device, queue, &self.light_records.points);
        self.spot_lights
            .upload(device, queue, &self.light_records.spots);
    }

    /// Pack visible volumes and upload box and ellipsoid records.
    pub fn volume_buffer_generate(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        self.volume_records = VolumeRecords::build(
            self.visible_volumes
                .iter()
                .filter_map(|id| self.volumes.get(id)),
        );
        self.boxes.upload(device, queue, &self.volume_records.boxes);
        self.ellipsoids
            .upload(device, queue, &self.volume_records.ellipsoids);
    }

    /// Shadow-casting spot lights that are visible right now.
    pub fn visible_shadowed_spots(&self) -> Vec<ShadowedSpot> {
        self.light_records
            .shadowed_spots
            .iter()
            .filter(|spot| self.visible_lights.contains(&spot.id))
            .copied()
            .collect()
    }

    // --- Resolution-sized resources ---

    /// Reallocate everything sized by the froxel resolution, regenerate the
    /// depth table and noise LUT, and rebuild both record buffers.
    ///
    /// Extracted entities are re-attached to culling and culled against
    /// `camera` first, so this also recovers from [`SceneBuffers::release_all`].
    pub fn compute_volume_textures(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        settings: &FogSettings,
        camera: &FogCamera,
        depth_params: &DepthStepParams,
    ) {
        let resolution = settings.volume_resolution;
        let dims = resolution.dimensions();

        self.depth_steps = generate_depth_steps(camera, dims[2], depth_params);
        self.resources = Some(VolumeResources::new(device, dims, &self.depth_steps));
        self.resolution = Some(resolution);

        self.regenerate_noise(device, queue, NoiseParams::from_settings(settings));
        if self.cascade_lut.is_none() {
            self.cascade_lut = Some(VolumeTexture::new_2d(
                device,
                "fog-cascade-matrices",
                CASCADE_LUT_WIDTH,
                1,
                CASCADE_LUT_FORMAT,
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            ));
        }

        self.attach_culling();
        self.cull(camera);
        self.light_buffer_generate(device, queue);
        self.volume_buffer_generate(device, queue);
        log::info!(
            "Fog volume textures computed for {resolution:?} ({:.2} MB)",
            self.texture_memory().total_megabytes()
        );
    }

    /// Recompute the depth table without reallocating, e.g. after the
    /// camera clip range or shadow distance changed.
    pub fn refresh_depth_steps(
        &mut self,
        queue: &wgpu::Queue,
        camera: &FogCamera,
        depth_params: &DepthStepParams,
    ) {
        let Some(resources) = self.resources.as_ref() else {
            return;
        };
        self.depth_steps = generate_depth_steps(camera, resources.dims[2], depth_params);
        resources.write_depth_steps(queue, &self.depth_steps);
    }

    /// Rebuild the cloud noise LUT.
    pub fn regenerate_noise(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        params: NoiseParams,
    ) {
        let lut = self.noise_lut.get_or_insert_with(|| {
            VolumeTexture::new_3d(
                device,
                "fog-noise-lut",
                [NOISE_LUT_SIZE; 3],
                NOISE_FORMAT,
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            )
        });
        lut.write(queue, &generate_noise_lut(&params));
        self.noise_params = Some(params);
        log::debug!("Regenerated noise LUT {params:?}");
    }

    /// Upload up to [`MAX_CASCADES`] cascade matrices, one texel per column.
    /// Missing cascades are written as zero matrices.
    pub fn write_cascade_matrices(&self, queue: &wgpu::Queue, matrices: &[Mat4]) {
        let Some(lut) = self.cascade_lut.as_ref() else {
            return;
        };
        lut.write(queue, bytemuck::cast_slice(&cascade_texels(matrices)));
    }

    /// Release every owned GPU resource and detach from culling. Safe to
    /// call repeatedly. The extracted lights, volumes and sun are kept, and
    /// `compute_volume_textures` brings everything back.
    pub fn release_all(&mut self) {
        self.resources = None;
        self.noise_lut = None;
        self.noise_params = None;
        self.cascade_lut = None;
        self.point_lights.release();
        self.spot_lights.release();
        self.boxes.release();
        self.ellipsoids.release();
        self.light_records = LightRecords::default();
        self.volume_records = VolumeRecords::default();
        self.culler.clear();
        self.visible_lights.clear();
        self.visible_volumes.clear();
        self.resolution = None;
        log::debug!("Released fog scene buffers");
    }

    // --- Accessors ---

    pub fn sun(&self) -> Option<&LightSource> {
        self.sun.as_ref()
    }

    pub fn resources(&self) -> Option<&VolumeResources> {
        self.resources.as_ref()
    }

    pub fn resolution(&self) -> Option<VolumeResolution> {
        self.resolution
    }

    pub fn dims(&self) -> Option<[u32; 3]> {
        self.resources.as_ref().map(|r| r.dims)
    }

    pub fn depth_steps(&self) -> &[DepthStepRecord] {
        &self.depth_steps
    }

    pub fn light_records(&self) -> &LightRecords {
        &self.light_records
    }

    pub fn volume_records(&self) -> &VolumeRecords {
        &self.volume_records
    }

    pub fn point_lights(&self) -> &GpuArray<PointLightRecord> {
        &self.point_lights
    }

    pub fn spot_lights(&self) -> &GpuArray<SpotLightRecord> {
        &self.spot_lights
    }

    pub fn boxes(&self) -> &GpuArray<BoxVolumeRecord> {
        &self.boxes
    }

    pub fn ellipsoids(&self) -> &GpuArray<EllipsoidVolumeRecord> {
        &self.ellipsoids
    }

    pub fn noise_lut(&self) -> Option<&VolumeTexture> {
        self.noise_lut.as_ref()
    }

    pub fn noise_params(&self) -> Option<NoiseParams> {
        self.noise_params
    }

    pub fn cascade_lut(&self) -> Option<&VolumeTexture> {
        self.cascade_lut.as_ref()
    }

    pub fn is_light_visible(&self, id: EntityId) -> bool {
        self.visible_lights.contains(&id)
    }

    pub fn is_volume_visible(&self, id: EntityId) -> bool {
        self.visible_volumes.contains(&id)
    }

    pub fn stats(&self) -> SceneStats {
        SceneStats {
            visible_lights: self.visible_lights.len(),
            total_lights: self.lights.len(),
            visible_volumes: self.visible_volumes.len(),
            total_volumes: self.volumes.len(),
        }
    }

    /// GPU memory held by each owned texture.
    pub fn texture_memory(&self) -> TextureMemoryStats {
        let mut stats = TextureMemoryStats::default();
        let textures = self
            .resources
            .iter()
            .flat_map(|r| r.textures())
            .chain(self.noise_lut.iter())
            .chain(self.cascade_lut.iter());
        for texture in textures {
            stats.push(texture.label, texture.byte_size());
        }
        stats
    }
}

/// Cascade matrices laid out as `MAX_CASCADES * 4` RGBA texels.
pub fn cascade_texels(matrices: &[Mat4]) -> [[f32; 4]; CASCADE_LUT_WIDTH as usize] {
    let mut texels = [[0.0; 4]; CASCADE_LUT_WIDTH as usize];
    for (cascade, matrix) in matrices.iter().take(MAX_CASCADES).enumerate() {
        for (column, texel) in matrix.to_cols_array_2d().into_iter().enumerate() {
            texels[cascade * 4 + column] = texel;
        }
    }
    texels
}
