//! Shadow conditioning and volume filtering for the fog pipeline.
//!
//! [`ShadowFilter`] turns the sun's raw shadow depth into a log-space blurred
//! exponential shadow map. [`VolumeSpatialFilter`] box-filters the shading
//! volume between the two members of its ping-pong pair.

mod esm;
mod spatial;

pub use esm::{ESM_EXPONENT, ESM_FORMAT, ESM_SHADER_SOURCE, ShadowFilter, ShadowMapView};
pub use spatial::{SPATIAL_FILTER_SHADER_SOURCE, VolumeSpatialFilter, filter_roles};
