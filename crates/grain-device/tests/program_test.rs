//! Kernel binding and host dispatch.

use std::sync::Arc;

use grain_device::{
    Access, BufferPool, Error, HostDevice, Invocation, KernelArgs, KernelSource, LineTiling,
    Param, Residency, Result,
};
use rayon::prelude::*;

fn scale_host(inv: &mut Invocation<'_>) -> Result<()> {
    let t = inv.tiling();
    let k = inv.float("k")?;
    let w = inv.uint("width")? as usize;
    let src: &[f32] = inv.input("src")?;
    let dst: &mut [f32] = inv.output("dst")?;
    inv.expect_len("src", src.len(), w * t.height as usize)?;
    inv.expect_len("dst", dst.len(), w * t.height as usize)?;
    dst.par_chunks_mut(w)
        .zip(src.par_chunks(w))
        .for_each(|(d, s)| {
            for run in t.items() {
                for x in run {
                    d[x as usize] = s[x as usize] * k;
                }
            }
        });
    Ok(())
}

static SCALE: KernelSource = KernelSource {
    name: "scale",
    params: &[
        Param::input("src"),
        Param::output("dst"),
        Param::uint("width"),
        Param::float("k"),
    ],
    wgsl: r#"
override WG_SIZE: u32 = 64u;
@group(0) @binding(0) var<storage, read> src: array<f32>;
@group(0) @binding(1) var<storage, read_write> dst: array<f32>;
@group(0) @binding(2) var<uniform> s: array<vec4<u32>, 2>;

@compute @workgroup_size(WG_SIZE)
fn scale(@builtin(workgroup_id) wg: vec3<u32>, @builtin(local_invocation_id) lid: vec3<u32>) {
    let width = s[0].x;
    let k = bitcast<f32>(s[0].y);
    let i = wg.x * width + lid.x;
    if (lid.x < width) {
        dst[i] = src[i] * k;
    }
}
"#,
    host: scale_host,
};

fn setup() -> BufferPool {
    BufferPool::new(Arc::new(HostDevice::with_capacity(16 << 20)))
}

fn floats(v: &[f32]) -> Vec<u8> {
    bytemuck::cast_slice(v).to_vec()
}

#[test]
fn test_dispatch_by_name() {
    let pool = setup();
    let tiling = LineTiling::new(3, 2, 1).unwrap();
    let program = pool.device().create_program(&SCALE, tiling).unwrap();

    let src = pool.create_buffer(24, Access::ReadWrite, Residency::Device, "t").unwrap();
    let dst = pool.create_buffer(24, Access::ReadWrite, Residency::Device, "t").unwrap();
    src.write_from_host(&floats(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])).unwrap();

    // Arguments in a different order than declared.
    let args = KernelArgs::new()
        .float("k", 2.0)
        .buffer("dst", &dst)
        .uint("width", 3)
        .buffer("src", &src);
    program.run(&args).unwrap();

    let out: Vec<f32> = bytemuck::cast_slice(&dst.read_to_host().unwrap()).to_vec();
    assert_eq!(out, vec![2.0, 4.0, 6.0, 8.0, 10.0, 12.0]);
}

#[test]
fn test_output_aliasing_input_rejected() {
    let pool = setup();
    let program = pool
        .device()
        .create_program(&SCALE, LineTiling::new(2, 1, 1).unwrap())
        .unwrap();
    let buf = pool.create_buffer(8, Access::ReadWrite, Residency::Device, "t").unwrap();
    let args = KernelArgs::new()
        .buffer("src", &buf)
        .buffer("dst", &buf)
        .uint("width", 2)
        .float("k", 1.0);
    assert!(matches!(program.run(&args), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_read_only_output_rejected() {
    let pool = setup();
    let program = pool
        .device()
        .create_program(&SCALE, LineTiling::new(2, 1, 1).unwrap())
        .unwrap();
    let src = pool.create_buffer(8, Access::ReadWrite, Residency::Device, "t").unwrap();
    let table = pool.create_buffer(8, Access::ReadOnly, Residency::Device, "t").unwrap();
    let args = KernelArgs::new()
        .buffer("src", &src)
        .buffer("dst", &table)
        .uint("width", 2)
        .float("k", 1.0);
    let err = program.run(&args).unwrap_err();
    assert!(err.to_string().contains("read-only"));
}

#[test]
fn test_write_only_input_rejected() {
    let pool = setup();
    let program = pool
        .device()
        .create_program(&SCALE, LineTiling::new(2, 1, 1).unwrap())
        .unwrap();
    let src = pool.create_buffer(8, Access::WriteOnly, Residency::Device, "t").unwrap();
    let dst = pool.create_buffer(8, Access::ReadWrite, Residency::Device, "t").unwrap();
    let args = KernelArgs::new()
        .buffer("src", &src)
        .buffer("dst", &dst)
        .uint("width", 2)
        .float("k", 1.0);
    assert!(matches!(program.run(&args), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_scalar_bound_as_buffer_rejected() {
    let pool = setup();
    let program = pool
        .device()
        .create_program(&SCALE, LineTiling::new(2, 1, 1).unwrap())
        .unwrap();
    let src = pool.create_buffer(8, Access::ReadWrite, Residency::Device, "t").unwrap();
    let dst = pool.create_buffer(8, Access::ReadWrite, Residency::Device, "t").unwrap();
    let args = KernelArgs::new()
        .buffer("src", &src)
        .buffer("dst", &dst)
        .buffer("width", &src)
        .float("k", 1.0);
    assert!(matches!(program.run(&args), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_short_output_rejected_by_kernel() {
    let pool = setup();
    let program = pool
        .device()
        .create_program(&SCALE, LineTiling::new(4, 1, 1).unwrap())
        .unwrap();
    let src = pool.create_buffer(16, Access::ReadWrite, Residency::Device, "t").unwrap();
    let dst = pool.create_buffer(8, Access::ReadWrite, Residency::Device, "t").unwrap();
    let args = KernelArgs::new()
        .buffer("src", &src)
        .buffer("dst", &dst)
        .uint("width", 4)
        .float("k", 1.0);
    assert!(program.run(&args).is_err());
}

#[test]
fn test_freed_buffer_fails_dispatch() {
    let pool = setup();
    let program = pool
        .device()
        .create_program(&SCALE, LineTiling::new(2, 1, 1).unwrap())
        .unwrap();
    let src = pool.create_buffer(8, Access::ReadWrite, Residency::Device, "gone").unwrap();
    let dst = pool.create_buffer(8, Access::ReadWrite, Residency::Device, "t").unwrap();
    pool.release_buffers("gone");
    let args = KernelArgs::new()
        .buffer("src", &src)
        .buffer("dst", &dst)
        .uint("width", 2)
        .float("k", 1.0);
    assert!(matches!(
        program.run(&args),
        Err(Error::DeviceDispatchFailure(_))
    ));
}
