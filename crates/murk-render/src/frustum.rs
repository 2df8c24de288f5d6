//! View-frustum planes and bounding-sphere tests.
//!
//! Planes are extracted from a standard-depth (z in \[0, 1\]) view-projection
//! matrix. Lights and fog volumes are culled by their bounding spheres only.

use glam::{Mat4, Vec3, Vec4};

/// Plane indices into the frustum planes array.
const LEFT: usize = 0;
const RIGHT: usize = 1;
const BOTTOM: usize = 2;
const TOP: usize = 3;
const NEAR: usize = 4;
const FAR: usize = 5;

/// A bounding sphere in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

/// A view frustum defined by six inward-pointing planes.
#[derive(Clone, Debug)]
pub struct Frustum {
    /// Six planes: left, right, bottom, top, near, far.
    /// Each `Vec4(a, b, c, d)` where `(a,b,c)` is the normalized inward
    /// normal and `d` is the signed distance term.
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extract frustum planes from a combined view-projection matrix
    /// using the Griggs-Hartmann method.
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let rows = [vp.row(0), vp.row(1), vp.row(2), vp.row(3)];

        let mut planes = [Vec4::ZERO; 6];
        planes[LEFT] = rows[3] + rows[0];
        planes[RIGHT] = rows[3] - rows[0];
        planes[BOTTOM] = rows[3] + rows[1];
        planes[TOP] = rows[3] - rows[1];
        // Depth range is [0, w], so the near plane is row2 alone.
        planes[NEAR] = rows[2];
        planes[FAR] = rows[3] - rows[2];

        for plane in &mut planes {
            let len = plane.truncate().length();
            if len > 0.0 {
                *plane /= len;
            }
        }

        Self { planes }
    }

    /// Signed distance from `point` to each plane; positive is inside.
    pub fn distances(&self, point: Vec3) -> [f32; 6] {
        self.planes.map(|p| p.truncate().dot(point) + p.w)
    }

    /// Whether the sphere overlaps the frustum.
    ///
    /// Conservative near frustum corners: a sphere outside two planes at
    /// once but inside each individually is reported visible.
    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        self.distances(sphere.center)
            .iter()
            .all(|&d| d >= -sphere.radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_camera_vp() -> Mat4 {
        let view = Mat4::look_to_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, 16.0 / 9.0, 0.1, 100.0);
        proj * view
    }

    #[test]
    fn test_sphere_in_front_visible() {
        let frustum = Frustum::from_view_projection(&default_camera_vp());
        assert!(frustum.intersects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0)));
    }

    #[test]
    fn test_sphere_behind_camera_not_visible() {
        let frustum = Frustum::from_view_projection(&default_camera_vp());
        assert!(!frustum.intersects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, 10.0), 1.0)));
    }

    #[test]
    fn test_large_sphere_behind_camera_reaches_in() {
        let frustum = Frustum::from_view_projection(&default_camera_vp());
        assert!(frustum.intersects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, 5.0), 8.0)));
    }

    #[test]
    fn test_sphere_beyond_far_plane_not_visible() {
        let frustum = Frustum::from_view_projection(&default_camera_vp());
        assert!(!frustum.intersects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, -150.0), 10.0)));
        assert!(frustum.intersects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, -105.0), 10.0)));
    }

    #[test]
    fn test_sphere_far_to_the_side_not_visible() {
        let frustum = Frustum::from_view_projection(&default_camera_vp());
        for center in [
            Vec3::new(-1000.0, 0.0, -5.0),
            Vec3::new(1000.0, 0.0, -5.0),
            Vec3::new(0.0, 1000.0, -5.0),
            Vec3::new(0.0, -1000.0, -5.0),
        ] {
            assert!(
                !frustum.intersects_sphere(&Sphere::new(center, 1.0)),
                "sphere at {center:?} should be culled"
            );
        }
    }

    #[test]
    fn test_near_plane_distance() {
        let frustum = Frustum::from_view_projection(&default_camera_vp());
        let d = frustum.distances(Vec3::new(0.0, 0.0, -1.1));
        assert!((d[NEAR] - 1.0).abs() < 1e-3, "near distance {}", d[NEAR]);
        let behind_near = frustum.distances(Vec3::new(0.0, 0.0, -0.05));
        assert!(behind_near[NEAR] < 0.0);
    }

    #[test]
    fn test_planes_are_normalized() {
        let frustum = Frustum::from_view_projection(&default_camera_vp());
        for plane in &frustum.planes {
            let normal_len = plane.truncate().length();
            assert!(
                (normal_len - 1.0).abs() < 1e-4,
                "plane normal not normalized: {normal_len}"
            );
        }
    }
}
