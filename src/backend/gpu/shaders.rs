//! WGSL sources.
//!
//! Every fragment shader outputs premultiplied color. Filter shaders read
//! texels with `textureLoad` at integer device positions, so results never
//! depend on sampler state.

/// Tessellated fills and strokes with a solid or gradient paint.
pub(super) const PAINT: &str = r#"
struct PaintUniforms {
    viewport: vec2<f32>,
    kind: u32,
    cycle: u32,
    color: vec4<f32>,
    inv_x: vec4<f32>,
    inv_y: vec4<f32>,
    geometry: vec4<f32>,
    extra: vec4<f32>,
    ramp: array<vec4<f32>, 256>,
};

@group(0) @binding(0) var<uniform> paint: PaintUniforms;

struct PaintOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) device: vec2<f32>,
};

@vertex
fn vs_paint(@location(0) position: vec2<f32>) -> PaintOutput {
    var out: PaintOutput;
    let ndc = position / paint.viewport * 2.0 - 1.0;
    out.position = vec4<f32>(ndc.x, -ndc.y, 0.0, 1.0);
    out.device = position;
    return out;
}

fn cycle_position(t: f32) -> f32 {
    switch paint.cycle {
        case 1u: {
            let m = t - 2.0 * floor(t / 2.0);
            return select(m, 2.0 - m, m > 1.0);
        }
        case 2u: {
            return t - floor(t);
        }
        default: {
            return clamp(t, 0.0, 1.0);
        }
    }
}

fn gradient_position(user: vec2<f32>) -> f32 {
    if paint.kind == 1u {
        let start = paint.geometry.xy;
        let axis = paint.geometry.zw - start;
        return dot(user - start, axis) / max(dot(axis, axis), 1e-12);
    }
    // Focal radial: the circle through `user` centered on the segment
    // from focus to center, scaled by its parameter.
    let focus = paint.geometry.zw;
    let d = paint.geometry.xy - focus;
    let e = user - focus;
    let radius = paint.extra.x;
    let a = dot(d, d) - radius * radius;
    let ed = dot(e, d);
    let ee = dot(e, e);
    if abs(a) < 1e-6 {
        return ee / max(2.0 * ed, 1e-6);
    }
    let disc = max(ed * ed - a * ee, 0.0);
    return (ed - sqrt(disc)) / a;
}

@fragment
fn fs_paint(frag: PaintOutput) -> @location(0) vec4<f32> {
    if paint.kind == 0u {
        return paint.color;
    }
    let device = vec3<f32>(frag.device, 1.0);
    let user = vec2<f32>(dot(paint.inv_x.xyz, device), dot(paint.inv_y.xyz, device));
    let t = cycle_position(gradient_position(user));
    let index = min(u32(round(t * 255.0)), 255u);
    return paint.ramp[index] * paint.extra.y;
}
"#;

/// Textured quads with an extra alpha.
pub(super) const BLIT: &str = r#"
struct BlitUniforms {
    viewport: vec2<f32>,
    alpha: f32,
    _pad: f32,
};

@group(0) @binding(0) var<uniform> blit: BlitUniforms;
@group(0) @binding(1) var t_source: texture_2d<f32>;
@group(0) @binding(2) var s_source: sampler;

struct BlitOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_blit(@location(0) position: vec2<f32>, @location(1) uv: vec2<f32>) -> BlitOutput {
    var out: BlitOutput;
    let ndc = position / blit.viewport * 2.0 - 1.0;
    out.position = vec4<f32>(ndc.x, -ndc.y, 0.0, 1.0);
    out.uv = uv;
    return out;
}

@fragment
fn fs_blit(frag: BlitOutput) -> @location(0) vec4<f32> {
    return textureSample(t_source, s_source, frag.uv) * blit.alpha;
}
"#;

/// Fullscreen triangle shared by the filter passes.
pub(super) const FULLSCREEN_VS: &str = r#"
@vertex
fn vs_fullscreen(@builtin(vertex_index) vi: u32) -> @builtin(position) vec4<f32> {
    let uv = vec2<f32>(f32((vi << 1u) & 2u), f32(vi & 2u));
    return vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
}
"#;

/// Per-pixel blend of two positioned images. Mode numbers follow
/// `BlendMode::index`.
pub(super) const BLEND_FS: &str = r#"
struct BlendUniforms {
    out_origin: vec2<i32>,
    top_origin: vec2<i32>,
    top_size: vec2<i32>,
    bottom_origin: vec2<i32>,
    bottom_size: vec2<i32>,
    mode: u32,
    _pad: u32,
};

@group(0) @binding(0) var<uniform> params: BlendUniforms;
@group(0) @binding(1) var t_top: texture_2d<f32>;
@group(0) @binding(2) var t_bottom: texture_2d<f32>;

fn fetch_top(p: vec2<i32>) -> vec4<f32> {
    let local = p - params.top_origin;
    if any(local < vec2<i32>(0)) || any(local >= params.top_size) {
        return vec4<f32>(0.0);
    }
    return textureLoad(t_top, local, 0);
}

fn fetch_bottom(p: vec2<i32>) -> vec4<f32> {
    let local = p - params.bottom_origin;
    if any(local < vec2<i32>(0)) || any(local >= params.bottom_size) {
        return vec4<f32>(0.0);
    }
    return textureLoad(t_bottom, local, 0);
}

fn hard_light(cs: f32, cb: f32) -> f32 {
    if cs <= 0.5 {
        return cb * 2.0 * cs;
    }
    let s = 2.0 * cs - 1.0;
    return cb + s - cb * s;
}

fn soft_light(cs: f32, cb: f32) -> f32 {
    if cs <= 0.5 {
        return cb - (1.0 - 2.0 * cs) * cb * (1.0 - cb);
    }
    var d = sqrt(cb);
    if cb <= 0.25 {
        d = ((16.0 * cb - 12.0) * cb + 4.0) * cb;
    }
    return cb + (2.0 * cs - 1.0) * (d - cb);
}

fn color_dodge(cs: f32, cb: f32) -> f32 {
    if cb <= 0.0 {
        return 0.0;
    }
    if cs >= 1.0 {
        return 1.0;
    }
    return min(cb / (1.0 - cs), 1.0);
}

fn color_burn(cs: f32, cb: f32) -> f32 {
    if cb >= 1.0 {
        return 1.0;
    }
    if cs <= 0.0 {
        return 0.0;
    }
    return 1.0 - min((1.0 - cb) / cs, 1.0);
}

fn separable(mode: u32, s: f32, d: f32, sa: f32, da: f32) -> f32 {
    switch mode {
        case 5u: { return s * d; }
        case 6u: { return s * da + d * sa - s * d; }
        case 8u: { return min(s * da, d * sa); }
        case 9u: { return max(s * da, d * sa); }
        case 14u: { return abs(s * da - d * sa); }
        case 15u: { return s * da + d * sa - 2.0 * s * d; }
        default: {}
    }
    var cs = 0.0;
    if sa > 0.0 {
        cs = s / sa;
    }
    var cb = 0.0;
    if da > 0.0 {
        cb = d / da;
    }
    var b = cs;
    switch mode {
        case 7u: { b = hard_light(cb, cs); }
        case 10u: { b = color_dodge(cs, cb); }
        case 11u: { b = color_burn(cs, cb); }
        case 12u: { b = hard_light(cs, cb); }
        case 13u: { b = soft_light(cs, cb); }
        default: {}
    }
    return sa * da * b;
}

fn blend_pixel(mode: u32, top: vec4<f32>, bottom: vec4<f32>) -> vec4<f32> {
    let sa = top.a;
    let da = bottom.a;
    switch mode {
        case 0u: { return top + bottom * (1.0 - sa); }
        case 1u: { return top * da; }
        case 2u: { return top * (1.0 - da); }
        case 3u: { return top * da + bottom * (1.0 - sa); }
        case 4u: { return min(top + bottom, vec4<f32>(1.0)); }
        case 16u, 17u, 18u: {
            let channel = mode - 16u;
            var out = bottom;
            var straight = 0.0;
            if sa > 0.0 {
                straight = top[channel] / sa;
            }
            out[channel] = straight * da;
            return out;
        }
        default: {}
    }
    var out = vec4<f32>(0.0, 0.0, 0.0, sa + da - sa * da);
    for (var c = 0u; c < 3u; c = c + 1u) {
        let s = top[c];
        let d = bottom[c];
        out[c] = s * (1.0 - da) + d * (1.0 - sa) + separable(mode, s, d, sa, da);
    }
    return out;
}

@fragment
fn fs_blend(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {
    let p = vec2<i32>(floor(frag.xy)) + params.out_origin;
    let blended = clamp(blend_pixel(params.mode, fetch_top(p), fetch_bottom(p)), vec4<f32>(0.0), vec4<f32>(1.0));
    return vec4<f32>(min(blended.rgb, vec3<f32>(blended.a)), blended.a);
}
"#;

/// One direction of a separable gaussian. Mode 1 blurs coverage only,
/// mode 2 tints the blurred coverage.
pub(super) const BLUR_FS: &str = r#"
struct BlurUniforms {
    offset: vec2<i32>,
    direction: vec2<i32>,
    source_size: vec2<i32>,
    radius: i32,
    mode: u32,
    sigma: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
    tint: vec4<f32>,
};

@group(0) @binding(0) var<uniform> params: BlurUniforms;
@group(0) @binding(1) var t_source: texture_2d<f32>;

fn fetch(p: vec2<i32>) -> vec4<f32> {
    if any(p < vec2<i32>(0)) || any(p >= params.source_size) {
        return vec4<f32>(0.0);
    }
    let px = textureLoad(t_source, p, 0);
    if params.mode == 1u {
        return vec4<f32>(0.0, 0.0, 0.0, px.a);
    }
    return px;
}

@fragment
fn fs_blur(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {
    let base = vec2<i32>(floor(frag.xy)) + params.offset;
    let denom = 2.0 * params.sigma * params.sigma;
    var sum = vec4<f32>(0.0);
    var total = 0.0;
    for (var i = -params.radius; i <= params.radius; i = i + 1) {
        let w = exp(-f32(i * i) / denom);
        sum = sum + fetch(base + params.direction * i) * w;
        total = total + w;
    }
    let blurred = sum / max(total, 1e-6);
    if params.mode == 2u {
        return params.tint * blurred.a;
    }
    return blurred;
}
"#;
