//! WGSL sources for the codec kernels.
//! These are used by the wgpu device when the `wgpu` feature is enabled.
//!
//! Shared conventions: one work-group per line (`workgroup_id.x`), one run
//! of pixels per work item (`local_invocation_id.x`), planar pixels as
//! `vec4<f32>`, matrices as row-major `f32` triples in `mats`.

/// Prepend the helpers every codec shader shares.
macro_rules! concat_common {
    ($body:literal) => {
        concat!(
            r#"
override WG_SIZE: u32 = 64u;

fn lut_index(v: f32) -> u32 {
    return u32(clamp(round(v * 65535.0), 0.0, 65535.0));
}

fn mul3(base: u32, v: vec3<f32>) -> vec3<f32> {
    return vec3<f32>(
        mats[base] * v.x + mats[base + 1u] * v.y + mats[base + 2u] * v.z,
        mats[base + 3u] * v.x + mats[base + 4u] * v.y + mats[base + 5u] * v.z,
        mats[base + 6u] * v.x + mats[base + 7u] * v.y + mats[base + 8u] * v.z);
}
"#,
            $body
        )
    };
}

/// v210 -> planar. 48 pixels (one 128-byte block) per work item.
pub const V210_READ: &str = concat_common!(r#"
@group(0) @binding(0) var<storage, read> src: array<u32>;
@group(0) @binding(1) var<storage, read_write> dst: array<vec4<f32>>;
@group(0) @binding(2) var<storage, read> lut: array<f32>;
@group(0) @binding(3) var<storage, read> mats: array<f32>;  // gamut, ycbcr->rgb
@group(0) @binding(4) var<uniform> s: array<vec4<u32>, 2>;  // width, pitch (words)

fn bits10(w: u32, i: u32) -> u32 {
    return (w >> (10u * i)) & 0x3ffu;
}

@compute @workgroup_size(WG_SIZE)
fn v210_read(@builtin(workgroup_id) wg: vec3<u32>, @builtin(local_invocation_id) lid: vec3<u32>) {
    let width = s[0].x;
    let pitch = s[0].y;
    let line = wg.x;
    let start = lid.x * 48u;
    let end = min(start + 48u, width);

    for (var x = start; x < end; x++) {
        let g = line * pitch + (x / 6u) * 4u;
        var y: u32;
        var cb: u32;
        var cr: u32;
        switch (x % 6u) {
            case 0u: { y = bits10(src[g], 1u); cb = bits10(src[g], 0u); cr = bits10(src[g], 2u); }
            case 1u: { y = bits10(src[g + 1u], 0u); cb = bits10(src[g], 0u); cr = bits10(src[g], 2u); }
            case 2u: { y = bits10(src[g + 1u], 2u); cb = bits10(src[g + 1u], 1u); cr = bits10(src[g + 2u], 0u); }
            case 3u: { y = bits10(src[g + 2u], 1u); cb = bits10(src[g + 1u], 1u); cr = bits10(src[g + 2u], 0u); }
            case 4u: { y = bits10(src[g + 3u], 0u); cb = bits10(src[g + 2u], 2u); cr = bits10(src[g + 3u], 1u); }
            default: { y = bits10(src[g + 3u], 2u); cb = bits10(src[g + 2u], 2u); cr = bits10(src[g + 3u], 1u); }
        }
        let ycc = vec3<f32>(
            (f32(y) - 64.0) / 876.0,
            (f32(cb) - 512.0) / 896.0,
            (f32(cr) - 512.0) / 896.0);
        let rgb = mul3(9u, ycc);
        let lin = vec3<f32>(lut[lut_index(rgb.x)], lut[lut_index(rgb.y)], lut[lut_index(rgb.z)]);
        dst[line * width + x] = vec4<f32>(mul3(0u, lin), 1.0);
    }
}
"#);

/// planar -> v210. One 48 pixel block per work item, pixels past the line
/// end repeat the last pixel.
pub const V210_WRITE: &str = concat_common!(r#"
@group(0) @binding(0) var<storage, read> src: array<vec4<f32>>;
@group(0) @binding(1) var<storage, read_write> dst: array<u32>;
@group(0) @binding(2) var<storage, read> lut: array<f32>;
@group(0) @binding(3) var<storage, read> mats: array<f32>;  // gamut, rgb->ycbcr
@group(0) @binding(4) var<uniform> s: array<vec4<u32>, 2>;  // width, pitch (words)

fn to_ycc(p: vec4<f32>) -> vec3<f32> {
    let lin = mul3(0u, p.xyz);
    let gam = vec3<f32>(lut[lut_index(lin.x)], lut[lut_index(lin.y)], lut[lut_index(lin.z)]);
    return mul3(9u, gam);
}

fn code(v: f32) -> u32 {
    return u32(clamp(round(v), 4.0, 1019.0));
}

@compute @workgroup_size(WG_SIZE)
fn v210_write(@builtin(workgroup_id) wg: vec3<u32>, @builtin(local_invocation_id) lid: vec3<u32>) {
    let width = s[0].x;
    let pitch = s[0].y;
    let line = wg.x;
    let block = lid.x;

    for (var g = 0u; g < 8u; g++) {
        let x0 = block * 48u + g * 6u;
        var ys: array<u32, 6>;
        var cbs: array<u32, 3>;
        var crs: array<u32, 3>;
        for (var p = 0u; p < 3u; p++) {
            let xa = min(x0 + 2u * p, width - 1u);
            let xb = min(x0 + 2u * p + 1u, width - 1u);
            let a = to_ycc(src[line * width + xa]);
            let b = to_ycc(src[line * width + xb]);
            ys[2u * p] = code(a.x * 876.0 + 64.0);
            ys[2u * p + 1u] = code(b.x * 876.0 + 64.0);
            cbs[p] = code((a.y + b.y) * 0.5 * 896.0 + 512.0);
            crs[p] = code((a.z + b.z) * 0.5 * 896.0 + 512.0);
        }
        let o = line * pitch + (block * 8u + g) * 4u;
        dst[o] = cbs[0] | (ys[0] << 10u) | (crs[0] << 20u);
        dst[o + 1u] = ys[1] | (cbs[1] << 10u) | (ys[2] << 20u);
        dst[o + 2u] = crs[1] | (ys[3] << 10u) | (cbs[2] << 20u);
        dst[o + 3u] = ys[4] | (crs[2] << 10u) | (ys[5] << 20u);
    }
}
"#);

/// RGBA8 -> planar. 32 pixels per work item.
pub const RGBA8_READ: &str = concat_common!(r#"
@group(0) @binding(0) var<storage, read> src: array<u32>;
@group(0) @binding(1) var<storage, read_write> dst: array<vec4<f32>>;
@group(0) @binding(2) var<storage, read> lut: array<f32>;
@group(0) @binding(3) var<storage, read> mats: array<f32>;  // gamut
@group(0) @binding(4) var<uniform> s: array<vec4<u32>, 2>;  // width, has_alpha

@compute @workgroup_size(WG_SIZE)
fn rgba8_read(@builtin(workgroup_id) wg: vec3<u32>, @builtin(local_invocation_id) lid: vec3<u32>) {
    let width = s[0].x;
    let has_alpha = s[0].y != 0u;
    let line = wg.x;
    let start = lid.x * 32u;
    let end = min(start + 32u, width);

    for (var x = start; x < end; x++) {
        let i = line * width + x;
        let p = src[i];
        let c = vec4<u32>(p & 0xffu, (p >> 8u) & 0xffu, (p >> 16u) & 0xffu, p >> 24u);
        let lin = vec3<f32>(lut[c.x * 257u], lut[c.y * 257u], lut[c.z * 257u]);
        let a = select(1.0, lut[c.w * 257u], has_alpha);
        dst[i] = vec4<f32>(mul3(0u, lin), a);
    }
}
"#);

/// planar -> RGBA8. 32 pixels per work item.
pub const RGBA8_WRITE: &str = concat_common!(r#"
@group(0) @binding(0) var<storage, read> src: array<vec4<f32>>;
@group(0) @binding(1) var<storage, read_write> dst: array<u32>;
@group(0) @binding(2) var<storage, read> lut: array<f32>;
@group(0) @binding(3) var<storage, read> mats: array<f32>;  // gamut
@group(0) @binding(4) var<uniform> s: array<vec4<u32>, 2>;  // width

fn code8(v: f32) -> u32 {
    return u32(clamp(round(v * 255.0), 0.0, 255.0));
}

@compute @workgroup_size(WG_SIZE)
fn rgba8_write(@builtin(workgroup_id) wg: vec3<u32>, @builtin(local_invocation_id) lid: vec3<u32>) {
    let width = s[0].x;
    let line = wg.x;
    let start = lid.x * 32u;
    let end = min(start + 32u, width);

    for (var x = start; x < end; x++) {
        let i = line * width + x;
        let p = src[i];
        let lin = mul3(0u, p.xyz);
        let r = code8(lut[lut_index(lin.x)]);
        let g = code8(lut[lut_index(lin.y)]);
        let b = code8(lut[lut_index(lin.z)]);
        dst[i] = r | (g << 8u) | (b << 16u) | (code8(lut[lut_index(p.w)]) << 24u);
    }
}
"#);
