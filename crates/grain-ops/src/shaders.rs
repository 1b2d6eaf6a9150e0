//! WGSL sources for the operator kernels.
//!
//! One work-group per line, 16 pixels per work item. Scalars arrive in the
//! uniform block after the buffers; floats travel as raw bits.

macro_rules! with_header {
    ($body:literal) => {
        concat!("override WG_SIZE: u32 = 64u;\n", $body)
    };
}

pub const MONOCHROME: &str = with_header!(r#"
@group(0) @binding(0) var<storage, read> src: array<vec4<f32>>;
@group(0) @binding(1) var<storage, read_write> dst: array<vec4<f32>>;
@group(0) @binding(2) var<storage, read> coeffs: array<vec4<f32>>;
@group(0) @binding(3) var<uniform> s: array<vec4<u32>, 2>;  // width, pressure

@compute @workgroup_size(WG_SIZE)
fn monochrome(@builtin(workgroup_id) wg: vec3<u32>, @builtin(local_invocation_id) lid: vec3<u32>) {
    let width = s[0].x;
    let p = bitcast<f32>(s[0].y);
    let k = coeffs[0] * p;
    let start = lid.x * 16u;
    let end = min(start + 16u, width);

    for (var x = start; x < end; x++) {
        let i = wg.x * width + x;
        let v = src[i];
        let mono = dot(v, k);
        dst[i] = vec4<f32>(vec3<f32>(mono) + v.xyz * (1.0 - p), v.w);
    }
}
"#);

pub const MIX: &str = with_header!(r#"
@group(0) @binding(0) var<storage, read> a: array<vec4<f32>>;
@group(0) @binding(1) var<storage, read> b: array<vec4<f32>>;
@group(0) @binding(2) var<storage, read_write> dst: array<vec4<f32>>;
@group(0) @binding(3) var<uniform> s: array<vec4<u32>, 2>;  // width, pressure

@compute @workgroup_size(WG_SIZE)
fn mix_frames(@builtin(workgroup_id) wg: vec3<u32>, @builtin(local_invocation_id) lid: vec3<u32>) {
    let width = s[0].x;
    let p = bitcast<f32>(s[0].y);
    let start = lid.x * 16u;
    let end = min(start + 16u, width);

    for (var x = start; x < end; x++) {
        let i = wg.x * width + x;
        dst[i] = a[i] * p + b[i] * (1.0 - p);
    }
}
"#);

pub const STAMP: &str = with_header!(r#"
@group(0) @binding(0) var<storage, read> a: array<vec4<f32>>;
@group(0) @binding(1) var<storage, read> b: array<vec4<f32>>;
@group(0) @binding(2) var<storage, read_write> dst: array<vec4<f32>>;
@group(0) @binding(3) var<uniform> s: array<vec4<u32>, 2>;  // width, premultiplied

@compute @workgroup_size(WG_SIZE)
fn stamp(@builtin(workgroup_id) wg: vec3<u32>, @builtin(local_invocation_id) lid: vec3<u32>) {
    let width = s[0].x;
    let premultiplied = s[0].y != 0u;
    let start = lid.x * 16u;
    let end = min(start + 16u, width);

    for (var x = start; x < end; x++) {
        let i = wg.x * width + x;
        let pa = a[i];
        let pb = b[i];
        let alpha = pa.w * pb.w;
        let k = select(alpha, 1.0, premultiplied);
        dst[i] = vec4<f32>(pa.xyz * k + pb.xyz * (1.0 - alpha), 1.0);
    }
}
"#);

pub const BLUR: &str = with_header!(r#"
@group(0) @binding(0) var<storage, read> src: array<vec4<f32>>;
@group(0) @binding(1) var<storage, read_write> dst: array<vec4<f32>>;
@group(0) @binding(2) var<storage, read> weights: array<f32>;
@group(0) @binding(3) var<uniform> s: array<vec4<u32>, 2>;  // width, height, dim

@compute @workgroup_size(WG_SIZE)
fn blur(@builtin(workgroup_id) wg: vec3<u32>, @builtin(local_invocation_id) lid: vec3<u32>) {
    let width = s[0].x;
    let height = s[0].y;
    let dim = s[0].z;
    let r = i32(dim / 2u);
    let y = i32(wg.x);
    let start = lid.x * 16u;
    let end = min(start + 16u, width);

    for (var x = start; x < end; x++) {
        var acc = vec4<f32>(0.0);
        for (var fy = 0; fy < i32(dim); fy++) {
            let sy = u32(clamp(y + fy - r, 0, i32(height) - 1));
            for (var fx = 0; fx < i32(dim); fx++) {
                let sx = u32(clamp(i32(x) + fx - r, 0, i32(width) - 1));
                acc += src[sy * width + sx] * weights[u32(fy) * dim + u32(fx)];
            }
        }
        dst[wg.x * width + x] = acc;
    }
}
"#);
