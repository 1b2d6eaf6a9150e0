use grain_color::{ColSpec, mono_coeffs};
use grain_core::{FrameDescriptor, Result};
use grain_device::{
    BufferPool, Invocation, KernelArgs, KernelSource, Param, PooledBuffer, Program, Residency,
};
use tracing::debug;

use crate::{Rgba, check_dest, check_source, for_each_pixel, planar_tiling, shaders};

fn host(inv: &mut Invocation<'_>) -> Result<()> {
    let t = inv.tiling();
    let w = t.width as usize;
    let p = inv.float("pressure")?;
    let src: &[Rgba] = inv.input("src")?;
    let coeffs: &[f32] = inv.input("coeffs")?;
    let dst: &mut [Rgba] = inv.output("dst")?;

    let n = w * t.height as usize;
    inv.expect_len("src", src.len(), n)?;
    inv.expect_len("dst", dst.len(), n)?;
    inv.expect_len("coeffs", coeffs.len(), 4)?;

    let k = [coeffs[0] * p, coeffs[1] * p, coeffs[2] * p, coeffs[3] * p];
    let q = 1.0 - p;
    for_each_pixel(t, dst, |x, y| {
        let v = src[y * w + x];
        let mono = v[0] * k[0] + v[1] * k[1] + v[2] * k[2] + v[3] * k[3];
        [mono + v[0] * q, mono + v[1] * q, mono + v[2] * q, v[3]]
    });
    Ok(())
}

static KERNEL: KernelSource = KernelSource {
    name: "monochrome",
    params: &[
        Param::input("src"),
        Param::output("dst"),
        Param::input("coeffs"),
        Param::uint("width"),
        Param::float("pressure"),
    ],
    wgsl: shaders::MONOCHROME,
    host,
};

/// Blend a frame towards its luminance.
///
/// `pressure` 0 leaves the frame untouched, 1 gives full greyscale. Alpha
/// passes through.
#[derive(Debug)]
pub struct Monochrome {
    desc: FrameDescriptor,
    program: Program,
    coeffs: PooledBuffer,
}

impl Monochrome {
    pub fn new(pool: &BufferPool, desc: &FrameDescriptor, owner: &str) -> Result<Self> {
        let tiling = planar_tiling("monochrome", desc)?;
        let program = pool.device().create_program(&KERNEL, tiling)?;
        let coeffs = mono_coeffs(&ColSpec::from(desc.colorimetry));
        let coeffs = pool.upload(bytemuck::cast_slice(&coeffs), Residency::Staging, owner)?;
        debug!(
            width = desc.width,
            height = desc.height,
            colorimetry = %desc.colorimetry,
            "Monochrome"
        );
        Ok(Self { desc: *desc, program, coeffs })
    }

    pub fn process(&self, src: &PooledBuffer, dst: &PooledBuffer, pressure: f32) -> Result<()> {
        check_source("monochrome", src, &self.desc)?;
        check_dest("monochrome", dst, &self.desc)?;
        self.program.run(
            &KernelArgs::new()
                .buffer("src", src)
                .buffer("dst", dst)
                .buffer("coeffs", &self.coeffs)
                .uint("width", self.desc.width)
                .float("pressure", pressure.clamp(0.0, 1.0)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_params() {
        assert_eq!(KERNEL.buffer_count(), 3);
        assert_eq!(KERNEL.scalar_count(), 2);
        assert!(KERNEL.param("coeffs").is_some());
    }
}
