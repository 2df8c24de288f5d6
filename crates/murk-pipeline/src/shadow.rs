//! The shadow collaborator and the projections derived from it.
//!
//! Shadow maps are rasterized elsewhere; the fog pipeline only reads them.

use glam::{Mat4, Vec3};
use murk_scene::{EntityId, ShadowedSpot};

/// Sun cascades the host supplies for one frame.
#[derive(Debug, Clone, Copy)]
pub struct SunShadow<'a> {
    /// Depth texture holding every cascade as tiles of one atlas.
    pub view: &'a wgpu::TextureView,
    /// Edge length of the square atlas in texels.
    pub resolution: u32,
    /// 1, 2 or 4. Any other count samples cascade 0 only.
    pub cascade_count: u32,
    /// Far bound of each cascade as a fraction of `shadow_distance`.
    pub splits: [f32; 4],
    /// World to cascade clip space.
    pub matrices: [Mat4; 4],
    pub shadow_distance: f32,
    pub shadow_near_plane_offset: f32,
}

/// Read-only access to shadow maps owned by the host.
pub trait ShadowProvider {
    fn sun_shadow(&self) -> Option<SunShadow<'_>>;

    /// Depth map of a shadow-casting spot light, if it has one this frame.
    fn spot_shadow(&self, id: EntityId) -> Option<&wgpu::TextureView>;
}

/// Provider for hosts without shadow maps. The sun is treated as unshadowed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoShadows;

impl ShadowProvider for NoShadows {
    fn sun_shadow(&self) -> Option<SunShadow<'_>> {
        None
    }

    fn spot_shadow(&self, _id: EntityId) -> Option<&wgpu::TextureView> {
        None
    }
}

/// Projection x view of a shadowed spot light, built from its cone.
///
/// Spot shadow matrices are never stored; they are rebuilt for every
/// injection dispatch.
pub fn spot_view_projection(spot: &ShadowedSpot) -> Mat4 {
    let position = Vec3::from_array(spot.record.position);
    let mut direction = Vec3::from_array(spot.record.direction).normalize_or_zero();
    if direction == Vec3::ZERO {
        direction = Vec3::NEG_Z;
    }
    let up = if direction.abs().dot(Vec3::Y) > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let near = spot.shadow_near_plane.max(1e-3);
    let far = spot.record.range.max(near + 1e-3);
    let fov = spot.spot_angle.clamp(1.0, 179.0).to_radians();
    Mat4::perspective_rh(fov, 1.0, near, far) * Mat4::look_to_rh(position, direction, up)
}

/// Cascade picked for a fragment at `normalized_depth` (view depth over the
/// shadow distance). Mirrors `select_cascade` in the radiance shader.
pub fn select_cascade(cascade_count: u32, splits: &[f32; 4], normalized_depth: f32) -> usize {
    match cascade_count {
        2 | 4 => {
            let count = cascade_count as usize;
            let mut lower = 0.0;
            for (i, &upper) in splits.iter().take(count).enumerate() {
                if normalized_depth >= lower && normalized_depth < upper {
                    return i;
                }
                lower = upper;
            }
            count - 1
        }
        _ => 0,
    }
}

/// Offset and scale of cascade `index` inside the shadow atlas.
pub fn cascade_tile(cascade_count: u32, index: usize) -> ([f32; 2], [f32; 2]) {
    match cascade_count {
        4 => (
            [(index % 2) as f32 * 0.5, (index / 2) as f32 * 0.5],
            [0.5, 0.5],
        ),
        2 => ([index as f32 * 0.5, 0.0], [0.5, 1.0]),
        _ => ([0.0, 0.0], [1.0, 1.0]),
    }
}
