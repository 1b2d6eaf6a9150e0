use grain_core::{Error, FrameDescriptor, Result};
use grain_device::{BufferPool, Invocation, KernelArgs, KernelSource, Param, PooledBuffer, Program};
use tracing::debug;

use crate::{Rgba, check_dest, check_pair, check_source, for_each_pixel, planar_tiling, shaders};

fn host(inv: &mut Invocation<'_>) -> Result<()> {
    let t = inv.tiling();
    let w = t.width as usize;
    let premultiplied = inv.uint("premultiplied")? != 0;
    let a: &[Rgba] = inv.input("a")?;
    let b: &[Rgba] = inv.input("b")?;
    let dst: &mut [Rgba] = inv.output("dst")?;

    let n = w * t.height as usize;
    inv.expect_len("a", a.len(), n)?;
    inv.expect_len("b", b.len(), n)?;
    inv.expect_len("dst", dst.len(), n)?;

    for_each_pixel(t, dst, |x, y| {
        let (pa, pb) = (a[y * w + x], b[y * w + x]);
        let alpha = pa[3] * pb[3];
        let k = if premultiplied { 1.0 } else { alpha };
        let q = 1.0 - alpha;
        [pa[0] * k + pb[0] * q, pa[1] * k + pb[1] * q, pa[2] * k + pb[2] * q, 1.0]
    });
    Ok(())
}

static KERNEL: KernelSource = KernelSource {
    name: "stamp",
    params: &[
        Param::input("a"),
        Param::input("b"),
        Param::output("dst"),
        Param::uint("width"),
        Param::uint("premultiplied"),
    ],
    wgsl: shaders::STAMP,
    host,
};

/// Alpha composite of a foreground over a background.
///
/// The foreground is the first input that carries alpha: if only the second
/// input has an alpha channel the operands are swapped. The result is opaque.
#[derive(Debug)]
pub struct Stamp {
    desc: FrameDescriptor,
    swapped: bool,
    premultiplied: bool,
    program: Program,
}

impl Stamp {
    pub fn new(
        pool: &BufferPool,
        a: &FrameDescriptor,
        b: &FrameDescriptor,
        premultiplied: bool,
    ) -> Result<Self> {
        planar_tiling("stamp", b)?;
        let tiling = planar_tiling("stamp", a)?;
        if !a.has_alpha && !b.has_alpha {
            return Err(Error::MissingAlpha);
        }
        check_pair("stamp", a, b)?;
        let swapped = !a.has_alpha;
        let program = pool.device().create_program(&KERNEL, tiling)?;
        debug!(width = a.width, height = a.height, swapped, premultiplied, "Stamp");
        Ok(Self {
            desc: *a,
            swapped,
            premultiplied,
            program,
        })
    }

    /// Whether the second input is used as the foreground.
    pub fn swapped(&self) -> bool {
        self.swapped
    }

    /// Composite in input order; the operand swap is applied here.
    pub fn process(&self, a: &PooledBuffer, b: &PooledBuffer, dst: &PooledBuffer) -> Result<()> {
        check_source("stamp", a, &self.desc)?;
        check_source("stamp", b, &self.desc)?;
        check_dest("stamp", dst, &self.desc)?;
        let (fg, bg) = if self.swapped { (b, a) } else { (a, b) };
        self.program.run(
            &KernelArgs::new()
                .buffer("a", fg)
                .buffer("b", bg)
                .buffer("dst", dst)
                .uint("width", self.desc.width)
                .uint("premultiplied", self.premultiplied as u32),
        )
    }
}
