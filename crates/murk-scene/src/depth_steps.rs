//! Non-linear depth slicing of the froxel grid.
//!
//! Slices are spaced linearly in view distance from the near plane out to the
//! fog render distance, then stored as normalized device depth. Perspective
//! projection packs them densely near the camera.

use murk_render::FogCamera;

use crate::records::DepthStepRecord;

/// Inputs that decide how far the froxel grid reaches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStepParams {
    /// Sun shadow distance from the shadow collaborator.
    pub shadow_distance: f32,
    pub shadow_near_plane_offset: f32,
    /// Fraction of the shadow distance covered, from the fog settings.
    pub render_distance: f32,
}

impl DepthStepParams {
    /// `render_distance` rescaled to the camera's clip range.
    pub fn scaled_render_distance(&self, camera: &FogCamera) -> f32 {
        let clip_range = (camera.far - camera.near).max(f32::EPSILON);
        (self.shadow_distance - self.shadow_near_plane_offset) / clip_range * self.render_distance
    }

    /// World-space length of the marched segment beyond the near plane.
    pub fn march_length(&self, camera: &FogCamera) -> f32 {
        ((camera.far - camera.near) * self.scaled_render_distance(camera)).max(0.0)
    }
}

/// Depth of each of `depth` slices, non-decreasing and within \[0, 1\].
///
/// Slice `i` sits at `near + march_length * (i + 1) / depth` along the view
/// axis. Only the projection matters, so camera position and orientation do
/// not change the result.
pub fn generate_depth_steps(
    camera: &FogCamera,
    depth: u32,
    params: &DepthStepParams,
) -> Vec<DepthStepRecord> {
    let view_projection = camera.view_projection_matrix();
    let forward = camera.forward();
    let march = params.march_length(camera);

    let mut steps = Vec::with_capacity(depth as usize);
    let mut last = 0.0_f32;
    for i in 0..depth {
        let t = (i + 1) as f32 / depth as f32;
        let world = camera.position + forward * (camera.near + march * t);
        let ndc = view_projection.project_point3(world);
        let step = if ndc.z.is_finite() {
            ndc.z.clamp(0.0, 1.0)
        } else {
            1.0
        };
        // Float noise at far distances can dip by an ulp.
        last = last.max(step);
        steps.push(DepthStepRecord { step: last });
    }
    steps
}
