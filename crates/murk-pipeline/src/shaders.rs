//! WGSL sources of the fog passes.
//!
//! Every pass module is `COMMON_SHADER_SOURCE` followed by its own bindings
//! and entry points. Group 0 is the same in all of them: the frame uniforms
//! and the depth-step table.

/// Shared structs, frame bindings and helpers.
pub const COMMON_SHADER_SOURCE: &str = r#"
struct FogUniforms {
    view_projection: mat4x4<f32>,
    inverse_view_projection: mat4x4<f32>,
    previous_view_projection: mat4x4<f32>,
    camera_position: vec4<f32>,
    camera_forward: vec4<f32>,
    volume: vec4<u32>,
    counts: vec4<u32>,
    flags: vec4<u32>,
    march: vec4<f32>,
    sun_direction: vec4<f32>,
    sun_color: vec4<f32>,
    shadow_params: vec4<f32>,
    cascade_splits: vec4<f32>,
    ambient: vec4<f32>,
    atmosphere: vec4<f32>,
    shadow_color: vec4<f32>,
    phase: vec4<f32>,
    height: vec4<f32>,
    ramp: vec4<f32>,
    density: vec4<f32>,
    clouds: vec4<f32>,
    clouds_shape: vec4<f32>,
    clouds_fade: vec4<f32>,
    clouds_spacing: vec4<f32>,
    wind_offset: vec4<f32>,
    cloud_direct_color: vec4<f32>,
    clamps: vec4<f32>,
};

@group(0) @binding(0) var<uniform> fog: FogUniforms;
@group(0) @binding(1) var<storage, read> depth_steps: array<f32>;

const PI: f32 = 3.14159265;
const DENSITY_SCALE: f32 = 0.001;
const OPAQUE_EXTINCTION: f32 = 1000.0;
const ANALYTICAL_EXTINCTION: f32 = 0.002;

fn henyey_greenstein(cos_theta: f32, g: f32) -> f32 {
    let g2 = g * g;
    let denom = max(1.0 + g2 - 2.0 * g * cos_theta, 1e-4);
    return (1.0 - g2) / (4.0 * PI * denom * sqrt(denom));
}

fn world_from_ndc(uv: vec2<f32>, depth: f32) -> vec3<f32> {
    let ndc = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, depth, 1.0);
    let world = fog.inverse_view_projection * ndc;
    return world.xyz / world.w;
}

fn froxel_uv(id: vec2<u32>) -> vec2<f32> {
    return (vec2<f32>(id) + vec2<f32>(0.5)) / vec2<f32>(fog.volume.xy);
}

// Device depth inside slice `z`; `offset` 0 is the near edge, 1 the far edge.
fn voxel_depth(z: u32, offset: f32) -> f32 {
    let upper = depth_steps[z];
    var lower = 0.0;
    if (z > 0u) {
        lower = depth_steps[z - 1u];
    }
    return mix(lower, upper, clamp(offset, 0.0, 1.0));
}

// Normalized slice coordinate of a device depth. Values above 1 lie past
// the last slice.
fn slice_coord(depth: f32) -> f32 {
    let count = fog.volume.z;
    var lo = 0u;
    var hi = count;
    loop {
        if (lo >= hi) {
            break;
        }
        let mid = (lo + hi) / 2u;
        if (depth_steps[mid] < depth) {
            lo = mid + 1u;
        } else {
            hi = mid;
        }
    }
    if (lo >= count) {
        return 1.001;
    }
    let upper = depth_steps[lo];
    var lower = 0.0;
    if (lo > 0u) {
        lower = depth_steps[lo - 1u];
    }
    let frac = clamp((depth - lower) / max(upper - lower, 1e-7), 0.0, 1.0);
    return (f32(lo) + frac) / f32(count);
}

fn view_distance(world: vec3<f32>) -> f32 {
    return dot(world - fog.camera_position.xyz, fog.camera_forward.xyz);
}

// Position along the marched segment in [0, 1].
fn march_fraction(world: vec3<f32>) -> f32 {
    let along = view_distance(world) - fog.camera_position.w;
    return clamp(along / max(fog.march.x, 1e-4), 0.0, 1.0);
}

fn height_density(y: f32) -> f32 {
    if (y < fog.height.x || y > fog.height.y) {
        return 0.0;
    }
    let f = clamp((y - fog.height.x) / max(fog.height.y - fog.height.x, 1e-4), 0.0, 1.0);
    return mix(fog.height.z, fog.height.w, f);
}

fn ramp_factor(t: f32) -> f32 {
    var s = step(fog.ramp.y, t);
    if (fog.ramp.z > fog.ramp.y) {
        s = smoothstep(fog.ramp.y, fog.ramp.z, t);
    }
    let r = mix(fog.ramp.w, fog.density.x, s);
    return mix(1.0, r, fog.ramp.x);
}

fn lit_radiance(
    visibility: f32,
    sun: vec3<f32>,
    cos_theta: f32,
    local: vec3<f32>,
    occlusion: f32,
) -> vec3<f32> {
    let base = mix(fog.shadow_color.rgb, fog.ambient.rgb, visibility);
    let sun_phase = mix(
        henyey_greenstein(cos_theta, fog.phase.z),
        henyey_greenstein(cos_theta, fog.phase.y),
        fog.phase.w,
    );
    let atmosphere = fog.atmosphere.rgb * henyey_greenstein(cos_theta, fog.phase.x)
        * fog.sun_direction.w * visibility;
    return base + (sun * sun_phase * occlusion + atmosphere) * fog.atmosphere.w + local;
}

fn analytical_color(cos_theta: f32) -> vec3<f32> {
    return fog.ambient.rgb
        + fog.atmosphere.rgb * henyey_greenstein(cos_theta, fog.phase.x) * fog.sun_direction.w;
}
"#;

/// Sun radiance binding for a raw depth shadow map.
pub const RADIANCE_RAW_BINDINGS: &str = r#"
@group(1) @binding(1) var shadow_map: texture_depth_2d;

fn shadow_depth(uv: vec2<f32>) -> f32 {
    let size = vec2<i32>(textureDimensions(shadow_map));
    let texel = clamp(vec2<i32>(uv * vec2<f32>(size)), vec2<i32>(0), size - vec2<i32>(1));
    return textureLoad(shadow_map, texel, 0);
}
"#;

/// Sun radiance binding for the blurred exponential shadow map.
pub const RADIANCE_EXPONENTIAL_BINDINGS: &str = r#"
@group(1) @binding(1) var shadow_map: texture_2d<f32>;

fn shadow_depth(uv: vec2<f32>) -> f32 {
    let size = vec2<i32>(textureDimensions(shadow_map));
    let texel = clamp(vec2<i32>(uv * vec2<f32>(size)), vec2<i32>(0), size - vec2<i32>(1));
    return textureLoad(shadow_map, texel, 0).r;
}
"#;

pub const RADIANCE_SHADER_SOURCE: &str = r#"
@group(1) @binding(0) var cascade_lut: texture_2d<f32>;
@group(1) @binding(2) var sun_radiance: texture_storage_3d<rgba16float, write>;

fn cascade_matrix(index: u32) -> mat4x4<f32> {
    let base = i32(index) * 4;
    return mat4x4<f32>(
        textureLoad(cascade_lut, vec2<i32>(base, 0), 0),
        textureLoad(cascade_lut, vec2<i32>(base + 1, 0), 0),
        textureLoad(cascade_lut, vec2<i32>(base + 2, 0), 0),
        textureLoad(cascade_lut, vec2<i32>(base + 3, 0), 0),
    );
}

fn select_cascade(normalized_depth: f32) -> u32 {
    let count = fog.flags.z;
    if (count != 2u && count != 4u) {
        return 0u;
    }
    var lower = 0.0;
    for (var i = 0u; i < count; i = i + 1u) {
        let upper = fog.cascade_splits[i];
        if (normalized_depth >= lower && normalized_depth < upper) {
            return i;
        }
        lower = upper;
    }
    return count - 1u;
}

fn cascade_tile(count: u32, index: u32) -> vec4<f32> {
    if (count == 4u) {
        return vec4<f32>(f32(index % 2u) * 0.5, f32(index / 2u) * 0.5, 0.5, 0.5);
    }
    if (count == 2u) {
        return vec4<f32>(f32(index) * 0.5, 0.0, 0.5, 1.0);
    }
    return vec4<f32>(0.0, 0.0, 1.0, 1.0);
}

fn sun_visibility(world: vec3<f32>) -> f32 {
    if (fog.flags.z == 0u) {
        return 1.0;
    }
    let normalized = view_distance(world) / max(fog.march.w, 1e-4);
    let cascade = select_cascade(normalized);
    let clip = cascade_matrix(cascade) * vec4<f32>(world, 1.0);
    if (clip.w <= 0.0) {
        return 1.0;
    }
    let ndc = clip.xyz / clip.w;
    let local_uv = vec2<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
    if (any(local_uv < vec2<f32>(0.0)) || any(local_uv > vec2<f32>(1.0)) || ndc.z > 1.0) {
        return 1.0;
    }
    let tile = cascade_tile(fog.flags.z, cascade);
    let occluder = shadow_depth(tile.xy + local_uv * tile.zw);
    let receiver = ndc.z - fog.shadow_params.x;
    var visible = select(0.0, 1.0, receiver <= occluder);
    if (fog.flags.y == 1u) {
        visible = clamp(exp(fog.shadow_params.y * (occluder - receiver)), 0.0, 1.0);
    }
    return mix(1.0, visible, fog.sun_color.w);
}

@compute @workgroup_size(8, 8, 1)
fn cs_sun_radiance(@builtin(global_invocation_id) id: vec3<u32>) {
    let dims = fog.volume.xyz;
    if (id.x >= dims.x || id.y >= dims.y) {
        return;
    }
    let uv = froxel_uv(id.xy);
    let sun = fog.sun_color.rgb * fog.sun_direction.w;
    for (var z = 0u; z < dims.z; z = z + 1u) {
        let coord = vec3<i32>(vec3<u32>(id.xy, z));
        if (fog.flags.x == 0u) {
            textureStore(sun_radiance, coord, vec4<f32>(0.0));
            continue;
        }
        let world = world_from_ndc(uv, voxel_depth(z, 0.5 + fog.march.y));
        let visibility = sun_visibility(world);
        textureStore(sun_radiance, coord, vec4<f32>(sun * visibility, visibility));
    }
}
"#;

pub const INJECTION_SHADER_SOURCE: &str = r#"
struct InjectionUniforms {
    spot_view_projection: mat4x4<f32>,
    spot_position: vec4<f32>,
    spot_color: vec4<f32>,
    spot_direction: vec4<f32>,
    spot_attenuation: vec4<f32>,
    flags: vec4<u32>,
};

struct PointLight {
    position: vec3<f32>,
    intensity: f32,
    color: vec3<f32>,
    range: f32,
};

struct SpotLight {
    position: vec3<f32>,
    intensity: f32,
    color: vec3<f32>,
    range: f32,
    direction: vec3<f32>,
    angle_cos: f32,
    attenuation: vec2<f32>,
    pad: vec2<f32>,
};

struct FogVolume {
    position: vec3<f32>,
    mode: u32,
    dimensions: vec3<f32>,
    absorption: f32,
    color: vec4<f32>,
    soft_edges: f32,
    pad0: f32,
    pad1: f32,
    pad2: f32,
};

struct VolumeState {
    base_scale: f32,
    cloud_scale: f32,
    fill: f32,
    opaque: f32,
    tint: vec3<f32>,
};

@group(1) @binding(0) var<uniform> injection: InjectionUniforms;
@group(1) @binding(1) var<storage, read> point_lights: array<PointLight>;
@group(1) @binding(2) var<storage, read> spot_lights: array<SpotLight>;
@group(1) @binding(3) var<storage, read> box_volumes: array<FogVolume>;
@group(1) @binding(4) var<storage, read> ellipsoid_volumes: array<FogVolume>;

@group(2) @binding(0) var noise_lut: texture_3d<f32>;
@group(2) @binding(1) var linear_repeat: sampler;
@group(2) @binding(2) var history_medium: texture_3d<f32>;
@group(2) @binding(3) var history_radiance: texture_3d<f32>;
@group(2) @binding(4) var linear_clamp: sampler;
@group(2) @binding(5) var spot_shadow: texture_depth_2d;

@group(3) @binding(0) var chain_medium: texture_3d<f32>;
@group(3) @binding(1) var chain_radiance: texture_3d<f32>;
@group(3) @binding(2) var out_medium: texture_storage_3d<rgba16float, write>;
@group(3) @binding(3) var out_radiance: texture_storage_3d<rgba16float, write>;

fn spot_falloff(
    p: vec3<f32>,
    position: vec3<f32>,
    direction: vec3<f32>,
    range: f32,
    angle_cos: f32,
    attenuation: vec2<f32>,
) -> f32 {
    let to_point = p - position;
    let d = length(to_point);
    if (d >= range || d <= 1e-4) {
        return 0.0;
    }
    let cos_theta = dot(to_point / d, direction);
    let inner = mix(angle_cos, 1.0, clamp(attenuation.x, 0.0, 1.0)) + 1e-4;
    let cone = smoothstep(angle_cos, inner, cos_theta);
    let fade = clamp((range - d) / max(attenuation.y, 1e-4), 0.0, 1.0);
    let dist = clamp(1.0 - (d * d) / (range * range), 0.0, 1.0);
    return cone * fade * dist * dist;
}

fn point_radiance(p: vec3<f32>) -> vec3<f32> {
    var sum = vec3<f32>(0.0);
    for (var i = 0u; i < fog.counts.x; i = i + 1u) {
        let light = point_lights[i];
        let d = distance(p, light.position);
        let f = clamp(1.0 - (d * d) / max(light.range * light.range, 1e-4), 0.0, 1.0);
        sum = sum + light.color * light.intensity * f * f;
    }
    return sum;
}

fn spot_radiance(p: vec3<f32>) -> vec3<f32> {
    var sum = vec3<f32>(0.0);
    for (var i = 0u; i < fog.counts.y; i = i + 1u) {
        let light = spot_lights[i];
        let f = spot_falloff(p, light.position, light.direction, light.range, light.angle_cos, light.attenuation);
        sum = sum + light.color * light.intensity * f;
    }
    return sum;
}

fn volume_weight(v: FogVolume, p: vec3<f32>, ellipsoid: bool) -> f32 {
    let local = (p - v.position) / max(v.dimensions, vec3<f32>(1e-4));
    var m = max(abs(local.x), max(abs(local.y), abs(local.z)));
    if (ellipsoid) {
        m = length(local);
    }
    if (v.soft_edges <= 0.0) {
        return select(0.0, 1.0, m <= 1.0);
    }
    return 1.0 - smoothstep(1.0 - v.soft_edges, 1.0, m);
}

fn apply_volume(state: VolumeState, v: FogVolume, w: f32) -> VolumeState {
    var s = state;
    if (w <= 0.0) {
        return s;
    }
    switch v.mode {
        case 0u: {
            s.opaque = max(s.opaque, w * v.absorption);
            s.tint = mix(s.tint, v.color.rgb, w * v.color.a);
        }
        case 1u: {
            s.base_scale = s.base_scale * (1.0 - w);
            s.cloud_scale = s.cloud_scale * (1.0 - w);
        }
        case 2u: {
            s.cloud_scale = s.cloud_scale * (1.0 - w);
        }
        case 3u: {
            s.base_scale = s.base_scale * (1.0 - w);
        }
        default: {
            s.fill = max(s.fill, w);
        }
    }
    return s;
}

fn sample_noise(p: vec3<f32>) -> f32 {
    return textureSampleLevel(noise_lut, linear_repeat, p, 0.0).r;
}

fn cloud_density(world: vec3<f32>, fill: f32) -> f32 {
    if (fog.clouds.x == 0.0 && fill <= 0.0) {
        return 0.0;
    }
    let n = sample_noise((world + fog.wind_offset.xyz) * fog.clouds.y);
    let bottom = fog.clouds_shape.x;
    let top = fog.clouds_shape.y;
    let fade_in = smoothstep(bottom - max(fog.clouds_fade.x, 1e-3), bottom, world.y);
    let fade_out = 1.0 - smoothstep(top, top + max(fog.clouds_fade.y, 1e-3), world.y);
    let h = clamp((world.y - bottom) / max(top - bottom, 1e-4), 0.0, 1.0);
    let influence = mix(fog.clouds_shape.z, fog.clouds_shape.w, h);
    var density = max(n * influence * fade_in * fade_out * fog.clouds.x, n * fill);
    if (fog.clouds_fade.w >= 0.0) {
        let s = sample_noise(world * fog.clouds_spacing.xyz * fog.clouds.y);
        density = density * smoothstep(fog.clouds_fade.w, fog.clouds_fade.w + 0.1, s);
    }
    return density;
}

fn cloud_occlusion(world: vec3<f32>) -> f32 {
    if (fog.clouds.z == 0.0) {
        return 1.0;
    }
    let reach = fog.clouds_fade.z / max(fog.clouds.y, 1e-4);
    let probe = world - fog.sun_direction.xyz * reach;
    return exp(-cloud_density(probe, 0.0) * fog.clouds.w);
}

fn evaluate_medium(world: vec3<f32>) -> vec4<f32> {
    var state = VolumeState(1.0, 1.0, 0.0, 0.0, vec3<f32>(1.0));
    for (var i = 0u; i < fog.counts.z; i = i + 1u) {
        let v = box_volumes[i];
        state = apply_volume(state, v, volume_weight(v, world, false));
    }
    for (var i = 0u; i < fog.counts.w; i = i + 1u) {
        let v = ellipsoid_volumes[i];
        state = apply_volume(state, v, volume_weight(v, world, true));
    }
    let sigma = fog.density.y * DENSITY_SCALE * (fog.ambient.w + fog.atmosphere.w);
    let base = height_density(world.y) * ramp_factor(march_fraction(world));
    let clouds = cloud_density(world, state.fill) * state.cloud_scale;
    let extinction = sigma * (base * state.base_scale + clouds) + state.opaque * OPAQUE_EXTINCTION;
    return vec4<f32>(state.tint, extinction);
}

fn cloud_outline(world: vec3<f32>) -> vec3<f32> {
    if (fog.clouds.x == 0.0) {
        return vec3<f32>(0.0);
    }
    let c = clamp(cloud_density(world, 0.0), 0.0, 1.0);
    let edge = pow(1.0 - c, max(fog.wind_offset.w, 1e-3)) * c;
    return fog.cloud_direct_color.rgb * fog.clouds_spacing.w * edge * fog.sun_direction.w;
}

fn store_with_history(id: vec3<u32>, medium_in: vec4<f32>, lit_in: vec4<f32>) {
    var medium = medium_in;
    var lit = lit_in;
    if (injection.flags.x == 1u && fog.march.z > 0.0) {
        let world = world_from_ndc(froxel_uv(id.xy), voxel_depth(id.z, 0.5));
        let clip = fog.previous_view_projection * vec4<f32>(world, 1.0);
        if (clip.w > 0.0) {
            let ndc = clip.xyz / clip.w;
            let coord = vec3<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5, slice_coord(ndc.z));
            if (all(coord >= vec3<f32>(0.0)) && all(coord <= vec3<f32>(1.0))) {
                let past_medium = textureSampleLevel(history_medium, linear_clamp, coord, 0.0);
                let past_lit = textureSampleLevel(history_radiance, linear_clamp, coord, 0.0);
                medium = mix(medium, past_medium, fog.march.z);
                lit = mix(lit, past_lit, fog.march.z);
            }
        }
    }
    textureStore(out_medium, vec3<i32>(id), medium);
    textureStore(out_radiance, vec3<i32>(id), lit);
}

@compute @workgroup_size(4, 4, 4)
fn cs_inject_medium(@builtin(global_invocation_id) id: vec3<u32>) {
    if (any(id >= fog.volume.xyz)) {
        return;
    }
    let uv = froxel_uv(id.xy);
    let samples = max(fog.flags.w, 1u);
    var medium = vec4<f32>(0.0);
    var radiance = vec3<f32>(0.0);
    var occlusion = 0.0;
    for (var s = 0u; s < samples; s = s + 1u) {
        let offset = (f32(s) + 0.5) / f32(samples);
        let world = world_from_ndc(uv, voxel_depth(id.z, offset));
        medium = medium + evaluate_medium(world);
        radiance = radiance + point_radiance(world) + spot_radiance(world) + cloud_outline(world);
        occlusion = occlusion + cloud_occlusion(world);
    }
    let inv = 1.0 / f32(samples);
    store_with_history(id, medium * inv, vec4<f32>(radiance * inv, occlusion * inv));
}

fn shadowed_spot_radiance(world: vec3<f32>) -> vec3<f32> {
    let f = spot_falloff(
        world,
        injection.spot_position.xyz,
        injection.spot_direction.xyz,
        injection.spot_color.w,
        injection.spot_direction.w,
        injection.spot_attenuation.xy,
    );
    if (f <= 0.0) {
        return vec3<f32>(0.0);
    }
    let clip = injection.spot_view_projection * vec4<f32>(world, 1.0);
    if (clip.w <= 0.0) {
        return vec3<f32>(0.0);
    }
    let ndc = clip.xyz / clip.w;
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
    var visible = 1.0;
    if (all(uv >= vec2<f32>(0.0)) && all(uv <= vec2<f32>(1.0))) {
        let size = vec2<i32>(textureDimensions(spot_shadow));
        let texel = clamp(vec2<i32>(uv * vec2<f32>(size)), vec2<i32>(0), size - vec2<i32>(1));
        let occluder = textureLoad(spot_shadow, texel, 0);
        visible = select(0.0, 1.0, ndc.z - fog.shadow_params.x <= occluder);
        visible = mix(1.0, visible, fog.sun_color.w);
    }
    return injection.spot_color.rgb * injection.spot_position.w * f * visible;
}

@compute @workgroup_size(4, 4, 4)
fn cs_inject_spot(@builtin(global_invocation_id) id: vec3<u32>) {
    if (any(id >= fog.volume.xyz)) {
        return;
    }
    let coord = vec3<i32>(id);
    let medium = textureLoad(chain_medium, coord, 0);
    let lit = textureLoad(chain_radiance, coord, 0);
    let uv = froxel_uv(id.xy);
    let samples = max(fog.flags.w, 1u);
    var radiance = vec3<f32>(0.0);
    for (var s = 0u; s < samples; s = s + 1u) {
        let offset = (f32(s) + 0.5) / f32(samples);
        radiance = radiance + shadowed_spot_radiance(world_from_ndc(uv, voxel_depth(id.z, offset)));
    }
    let inv = 1.0 / f32(samples);
    store_with_history(id, medium, vec4<f32>(lit.rgb + radiance * inv, lit.a));
}
"#;

pub const INSCATTER_SHADER_SOURCE: &str = r#"
@group(1) @binding(0) var medium_volume: texture_3d<f32>;
@group(1) @binding(1) var radiance_volume: texture_3d<f32>;
@group(1) @binding(2) var sun_volume: texture_3d<f32>;
@group(1) @binding(3) var shading: texture_storage_3d<rgba16float, write>;

@compute @workgroup_size(8, 8, 1)
fn cs_inscatter(@builtin(global_invocation_id) id: vec3<u32>) {
    let dims = fog.volume.xyz;
    if (id.x >= dims.x || id.y >= dims.y) {
        return;
    }
    let uv = froxel_uv(id.xy);
    let eye = fog.camera_position.xyz;
    var accum = vec3<f32>(0.0);
    var transmittance = 1.0;
    var previous_range = distance(world_from_ndc(uv, 0.0), eye);
    for (var z = 0u; z < dims.z; z = z + 1u) {
        let coord = vec3<i32>(vec3<u32>(id.xy, z));
        let world = world_from_ndc(uv, voxel_depth(z, 1.0));
        let range = distance(world, eye);
        let slice_length = max(range - previous_range, 0.0);
        previous_range = range;

        let medium = textureLoad(medium_volume, coord, 0);
        let local = textureLoad(radiance_volume, coord, 0);
        let sun = textureLoad(sun_volume, coord, 0);
        let t = f32(z + 1u) / f32(dims.z);
        let extinction = medium.a / (1.0 + fog.density.z * t);
        let view_dir = normalize(world - eye);
        let cos_theta = dot(view_dir, -fog.sun_direction.xyz);
        let lit = lit_radiance(sun.a, sun.rgb, cos_theta, local.rgb, local.a) * medium.rgb;
        let slice_transmittance = exp(-extinction * slice_length);
        accum = accum + transmittance * lit * (1.0 - slice_transmittance);
        transmittance = transmittance * slice_transmittance;
        textureStore(shading, coord, vec4<f32>(accum, transmittance));
    }
}
"#;

/// Compose fragment stage; prepend the fullscreen vertex stage.
pub const COMPOSE_SHADER_SOURCE: &str = r#"
@group(1) @binding(0) var scene_color: texture_2d<f32>;
@group(1) @binding(1) var scene_depth: texture_depth_2d;
@group(1) @binding(2) var shading_map: texture_3d<f32>;
@group(1) @binding(3) var shading_sampler: sampler;

@fragment
fn fs_compose(in: FullscreenOutput) -> @location(0) vec4<f32> {
    let color_size = vec2<i32>(textureDimensions(scene_color));
    let color_texel = clamp(vec2<i32>(in.position.xy), vec2<i32>(0), color_size - vec2<i32>(1));
    let input = textureLoad(scene_color, color_texel, 0);

    let depth_size = vec2<i32>(textureDimensions(scene_depth));
    let depth_texel = clamp(
        vec2<i32>(in.uv * vec2<f32>(depth_size)),
        vec2<i32>(0),
        depth_size - vec2<i32>(1),
    );
    let depth = min(textureLoad(scene_depth, depth_texel, 0), 1.0);
    let sky = depth >= 1.0;

    let eye = fog.camera_position.xyz;
    let world = world_from_ndc(in.uv, depth);
    let last = depth_steps[fog.volume.z - 1u];
    let volume_end = distance(world_from_ndc(in.uv, last), eye);
    let beyond = max(distance(world, eye) - volume_end, 0.0);
    let cos_theta = dot(normalize(world - eye), -fog.sun_direction.xyz);

    var volumetric_clamp = fog.clamps.x;
    var analytical_clamp = fog.clamps.y;
    if (sky) {
        volumetric_clamp = fog.clamps.z;
        analytical_clamp = fog.clamps.w;
    }

    var color = input.rgb;
    if (fog.density.w > 0.0) {
        let amount = min(1.0 - exp(-beyond * ANALYTICAL_EXTINCTION * fog.height.z), analytical_clamp);
        color = mix(color, analytical_color(cos_theta), amount);
    }

    let coord = vec3<f32>(in.uv, min(slice_coord(depth), 1.0));
    let shading = textureSampleLevel(shading_map, shading_sampler, coord, 0.0);
    let fog_amount = 1.0 - shading.a;
    let amount = min(fog_amount, volumetric_clamp);
    var scale = 0.0;
    if (fog_amount > 1e-5) {
        scale = amount / fog_amount;
    }
    color = color * (1.0 - amount) + shading.rgb * scale;
    return vec4<f32>(color, input.a);
}
"#;

/// Full source of the sun radiance module for the given shadow map kind.
pub fn radiance_module_source(exponential: bool) -> String {
    let bindings = if exponential {
        RADIANCE_EXPONENTIAL_BINDINGS
    } else {
        RADIANCE_RAW_BINDINGS
    };
    format!("{COMMON_SHADER_SOURCE}{bindings}{RADIANCE_SHADER_SOURCE}")
}

pub fn injection_module_source() -> String {
    format!("{COMMON_SHADER_SOURCE}{INJECTION_SHADER_SOURCE}")
}

pub fn inscatter_module_source() -> String {
    format!("{COMMON_SHADER_SOURCE}{INSCATTER_SHADER_SOURCE}")
}

pub fn compose_module_source() -> String {
    format!(
        "{}{COMMON_SHADER_SOURCE}{COMPOSE_SHADER_SOURCE}",
        murk_render::FULLSCREEN_VERTEX_SOURCE
    )
}
