use grain_core::{FrameDescriptor, Result};
use grain_device::{BufferPool, Invocation, KernelArgs, KernelSource, Param, PooledBuffer, Program};
use tracing::debug;

use crate::{Rgba, check_dest, check_pair, check_source, for_each_pixel, planar_tiling, shaders};

fn host(inv: &mut Invocation<'_>) -> Result<()> {
    let t = inv.tiling();
    let w = t.width as usize;
    let p = inv.float("pressure")?;
    let a: &[Rgba] = inv.input("a")?;
    let b: &[Rgba] = inv.input("b")?;
    let dst: &mut [Rgba] = inv.output("dst")?;

    let n = w * t.height as usize;
    inv.expect_len("a", a.len(), n)?;
    inv.expect_len("b", b.len(), n)?;
    inv.expect_len("dst", dst.len(), n)?;

    let q = 1.0 - p;
    for_each_pixel(t, dst, |x, y| {
        let (pa, pb) = (a[y * w + x], b[y * w + x]);
        std::array::from_fn(|c| pa[c] * p + pb[c] * q)
    });
    Ok(())
}

static KERNEL: KernelSource = KernelSource {
    name: "mix_frames",
    params: &[
        Param::input("a"),
        Param::input("b"),
        Param::output("dst"),
        Param::uint("width"),
        Param::float("pressure"),
    ],
    wgsl: shaders::MIX,
    host,
};

/// Cross-dissolve: `a * p + b * (1 - p)` on every channel.
#[derive(Debug)]
pub struct Mix {
    desc: FrameDescriptor,
    program: Program,
}

impl Mix {
    /// Both inputs must share geometry and colorimetry.
    pub fn new(pool: &BufferPool, a: &FrameDescriptor, b: &FrameDescriptor) -> Result<Self> {
        planar_tiling("mix", b)?;
        check_pair("mix", a, b)?;
        let program = pool.device().create_program(&KERNEL, planar_tiling("mix", a)?)?;
        debug!(width = a.width, height = a.height, "Mix");
        Ok(Self { desc: *a, program })
    }

    /// Blend `a` and `b` into `dst`, which the caller reserved.
    pub fn process(
        &self,
        a: &PooledBuffer,
        b: &PooledBuffer,
        dst: &PooledBuffer,
        pressure: f32,
    ) -> Result<()> {
        check_source("mix", a, &self.desc)?;
        check_source("mix", b, &self.desc)?;
        check_dest("mix", dst, &self.desc)?;
        self.program.run(
            &KernelArgs::new()
                .buffer("a", a)
                .buffer("b", b)
                .buffer("dst", dst)
                .uint("width", self.desc.width)
                .float("pressure", pressure.clamp(0.0, 1.0)),
        )
    }
}
