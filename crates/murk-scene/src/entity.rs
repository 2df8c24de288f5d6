//! Lights and fog volumes as seen by the fog pipeline.
//!
//! These are snapshots handed over by the host scene. Positions and
//! directions are authoritative at the time of extraction or refresh; the
//! pipeline never predicts or interpolates them.

use glam::{Vec3, Vec4};
use murk_config::{VolumeMode, VolumeShape};
use murk_render::Sphere;

/// Stable identity of a host entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

/// Attachment that makes a light participate in fog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogLight {
    /// Multiplier on the light's own intensity inside the fog.
    pub intensity: f32,
    /// Inner falloff of the spot cone.
    pub softness: f32,
    /// Outer falloff along the spot range.
    pub softness2: f32,
    /// Inject this spot light in its own shadowed pass.
    pub cast_shadow: bool,
}

impl Default for FogLight {
    fn default() -> Self {
        Self {
            intensity: 0.5,
            softness: 0.5,
            softness2: 8.0,
            cast_shadow: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Directional,
    Point {
        range: f32,
    },
    Spot {
        range: f32,
        /// Full cone angle in degrees.
        spot_angle: f32,
        /// Near plane of the spot's shadow projection.
        shadow_near_plane: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightSource {
    pub id: EntityId,
    pub kind: LightKind,
    /// World position; unused for directional lights.
    pub position: Vec3,
    /// Direction the light shines towards.
    pub direction: Vec3,
    /// Linear RGB color.
    pub color: Vec3,
    pub intensity: f32,
    /// `None` when the light does not take part in fog.
    pub fog_light: Option<FogLight>,
}

impl LightSource {
    /// Bounding radius used by visibility culling. Directional lights are
    /// never culled and have no radius.
    pub fn culling_radius(&self) -> Option<f32> {
        match self.kind {
            LightKind::Directional => None,
            LightKind::Point { range } | LightKind::Spot { range, .. } => Some(range),
        }
    }

    pub fn bounding_sphere(&self) -> Option<Sphere> {
        self.culling_radius()
            .map(|radius| Sphere::new(self.position, radius))
    }

    pub fn is_shadowed_spot(&self) -> bool {
        matches!(self.kind, LightKind::Spot { .. })
            && self.fog_light.is_some_and(|f| f.cast_shadow)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FogVolume {
    pub id: EntityId,
    pub shape: VolumeShape,
    pub position: Vec3,
    pub half_extents: Vec3,
    /// Linear RGBA emission color.
    pub color: Vec4,
    pub mode: VolumeMode,
    /// Fraction of light absorbed inside the volume, in \[0, 1\].
    pub absorption: f32,
    /// Width of the soft falloff at the boundary, in \[0, 1\].
    pub soft_edges: f32,
}

impl FogVolume {
    pub fn culling_radius(&self) -> f32 {
        match self.shape {
            VolumeShape::Box => self.half_extents.length(),
            VolumeShape::Ellipsoid => self.half_extents.max_element(),
        }
    }

    pub fn bounding_sphere(&self) -> Sphere {
        Sphere::new(self.position, self.culling_radius())
    }
}

/// Host scene as seen by the fog pipeline.
pub trait FogScene {
    fn lights(&self) -> &[LightSource];
    fn volumes(&self) -> &[FogVolume];
}

/// A plain owned scene, handy for hosts that assemble lights each frame.
#[derive(Debug, Clone, Default)]
pub struct SceneSnapshot {
    pub lights: Vec<LightSource>,
    pub volumes: Vec<FogVolume>,
}

impl FogScene for SceneSnapshot {
    fn lights(&self) -> &[LightSource] {
        &self.lights
    }

    fn volumes(&self) -> &[FogVolume] {
        &self.volumes
    }
}
