//! Fixed-layout GPU records for lights, fog volumes and depth slices.
//!
//! All structs are `#[repr(C)]` and `Pod` so they can be uploaded as std430
//! storage buffer arrays directly. `vec3` fields are paired with a scalar so
//! each record stays a multiple of 16 bytes.

use bytemuck::{Pod, Zeroable};
use murk_config::VolumeShape;

use crate::entity::{EntityId, FogLight, FogVolume, LightKind, LightSource};

/// A non-shadowed point light.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PointLightRecord {
    pub position: [f32; 3],
    pub intensity: f32,
    pub color: [f32; 3],
    pub range: f32,
}

/// A spot light; shadowed and non-shadowed spots share this layout.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SpotLightRecord {
    pub position: [f32; 3],
    pub intensity: f32,
    pub color: [f32; 3],
    pub range: f32,
    pub direction: [f32; 3],
    /// Cosine of half the cone angle.
    pub angle_cos: f32,
    /// `(softness, softness2 * range) * 0.5`.
    pub attenuation: [f32; 2],
    pub _pad: [f32; 2],
}

/// A box or ellipsoid fog volume.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct VolumeRecord {
    pub position: [f32; 3],
    /// [`murk_config::VolumeMode::code`].
    pub mode: u32,
    /// Half extents.
    pub dimensions: [f32; 3],
    pub absorption: f32,
    pub color: [f32; 4],
    pub soft_edges: f32,
    pub _pad: [f32; 3],
}

pub type BoxVolumeRecord = VolumeRecord;
pub type EllipsoidVolumeRecord = VolumeRecord;

/// Normalized device depth of one froxel slice.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DepthStepRecord {
    pub step: f32,
}

/// A visible spot light that gets its own shadowed injection dispatch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowedSpot {
    pub id: EntityId,
    pub record: SpotLightRecord,
    /// Full cone angle in degrees.
    pub spot_angle: f32,
    pub shadow_near_plane: f32,
}

/// Light records built from the visible set, partitioned by category.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LightRecords {
    pub points: Vec<PointLightRecord>,
    pub spots: Vec<SpotLightRecord>,
    pub shadowed_spots: Vec<ShadowedSpot>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VolumeRecords {
    pub boxes: Vec<BoxVolumeRecord>,
    pub ellipsoids: Vec<EllipsoidVolumeRecord>,
}

impl PointLightRecord {
    pub fn new(light: &LightSource, fog: &FogLight, range: f32) -> Self {
        Self {
            position: light.position.to_array(),
            intensity: light.intensity * fog.intensity,
            color: light.color.to_array(),
            range,
        }
    }
}

impl SpotLightRecord {
    pub fn new(light: &LightSource, fog: &FogLight, range: f32, spot_angle: f32) -> Self {
        Self {
            position: light.position.to_array(),
            intensity: light.intensity * fog.intensity,
            color: light.color.to_array(),
            range,
            direction: light.direction.normalize_or_zero().to_array(),
            angle_cos: (spot_angle.to_radians() * 0.5).cos(),
            attenuation: [fog.softness * 0.5, fog.softness2 * range * 0.5],
            _pad: [0.0; 2],
        }
    }
}

impl From<&FogVolume> for VolumeRecord {
    fn from(volume: &FogVolume) -> Self {
        Self {
            position: volume.position.to_array(),
            mode: volume.mode.code(),
            dimensions: volume.half_extents.to_array(),
            absorption: volume.absorption.clamp(0.0, 1.0),
            color: volume.color.to_array(),
            soft_edges: volume.soft_edges.clamp(0.0, 1.0),
            _pad: [0.0; 3],
        }
    }
}

impl LightRecords {
    /// Pack visible lights. Directional lights and lights without a fog
    /// attachment are skipped.
    pub fn build<'a>(visible: impl IntoIterator<Item = &'a LightSource>) -> Self {
        let mut records = Self::default();
        for light in visible {
            let Some(fog) = light.fog_light.as_ref() else {
                continue;
            };
            match light.kind {
                LightKind::Directional => {}
                LightKind::Point { range } => {
                    records.points.push(PointLightRecord::new(light, fog, range));
                }
                LightKind::Spot {
                    range,
                    spot_angle,
                    shadow_near_plane,
                } => {
                    let record = SpotLightRecord::new(light, fog, range, spot_angle);
                    if fog.cast_shadow {
                        records.shadowed_spots.push(ShadowedSpot {
                            id: light.id,
                            record,
                            spot_angle,
                            shadow_near_plane,
                        });
                    } else {
                        records.spots.push(record);
                    }
                }
            }
        }
        records
    }
}

impl VolumeRecords {
    pub fn build<'a>(visible: impl IntoIterator<Item = &'a FogVolume>) -> Self {
        let mut records = Self::default();
        for volume in visible {
            match volume.shape {
                VolumeShape::Box => records.boxes.push(volume.into()),
                VolumeShape::Ellipsoid => records.ellipsoids.push(volume.into()),
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};
    use murk_config::VolumeMode;

    fn spot(id: u64, cast_shadow: bool) -> LightSource {
        LightSource {
            id: EntityId(id),
            kind: LightKind::Spot {
                range: 10.0,
                spot_angle: 60.0,
                shadow_near_plane: 0.1,
            },
            position: Vec3::new(1.0, 2.0, 3.0),
            direction: Vec3::new(0.0, -2.0, 0.0),
            color: Vec3::new(1.0, 0.5, 0.25),
            intensity: 2.0,
            fog_light: Some(FogLight {
                cast_shadow,
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_record_sizes_match_std430() {
        assert_eq!(std::mem::size_of::<PointLightRecord>(), 32);
        assert_eq!(std::mem::size_of::<SpotLightRecord>(), 64);
        assert_eq!(std::mem::size_of::<VolumeRecord>(), 64);
        assert_eq!(std::mem::size_of::<DepthStepRecord>(), 4);
    }

    #[test]
    fn test_spot_record_fields() {
        let light = spot(1, false);
        let fog = light.fog_light.unwrap();
        let record = SpotLightRecord::new(&light, &fog, 10.0, 60.0);
        assert_eq!(record.intensity, 1.0);
        assert!((record.angle_cos - 30f32.to_radians().cos()).abs() < 1e-6);
        assert_eq!(record.attenuation, [0.25, 40.0]);
        assert_eq!(record.direction, [0.0, -1.0, 0.0]);
    }

    #[test]
    fn test_spots_partitioned_by_shadow_flag() {
        let lights = [spot(1, false), spot(2, true), spot(3, true)];
        let records = LightRecords::build(&lights);
        assert_eq!(records.spots.len(), 1);
        assert_eq!(records.shadowed_spots.len(), 2);
        assert_eq!(records.shadowed_spots[0].id, EntityId(2));
        assert!(records.points.is_empty());
    }

    #[test]
    fn test_lights_without_attachment_are_skipped() {
        let mut light = spot(1, false);
        light.fog_light = None;
        assert_eq!(LightRecords::build([&light]), LightRecords::default());
    }

    #[test]
    fn test_volumes_partitioned_by_shape() {
        let make = |id, shape| FogVolume {
            id: EntityId(id),
            shape,
            position: Vec3::ZERO,
            half_extents: Vec3::splat(2.0),
            color: Vec4::ONE,
            mode: VolumeMode::CutClouds,
            absorption: 1.5,
            soft_edges: 0.2,
        };
        let volumes = [make(1, VolumeShape::Box), make(2, VolumeShape::Ellipsoid)];
        let records = VolumeRecords::build(&volumes);
        assert_eq!(records.boxes.len(), 1);
        assert_eq!(records.ellipsoids.len(), 1);
        assert_eq!(records.boxes[0].mode, VolumeMode::CutClouds.code());
        assert_eq!(records.boxes[0].absorption, 1.0, "absorption clamped");
    }

    #[test]
    fn test_record_build_is_deterministic() {
        let lights = [spot(1, false), spot(2, true)];
        let a = LightRecords::build(&lights);
        let b = LightRecords::build(&lights);
        assert_eq!(
            bytemuck::cast_slice::<_, u8>(&a.spots),
            bytemuck::cast_slice::<_, u8>(&b.spots)
        );
    }
}
