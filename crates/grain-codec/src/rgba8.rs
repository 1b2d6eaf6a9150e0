//! RGBA8: 8 bits per component, R G B A byte order.
//!
//! Alpha has its own pass through the transfer curve, like the colour
//! channels but without the gamut matrix.

use grain_color::LUT_SIZE;
use grain_device::{Invocation, KernelSource, Param, Result};
use rayon::prelude::*;

use crate::pixel::{lut_lookup, mat3_mul, quantize};
use crate::shaders;

/// Pixels per work item.
pub const PIXELS_PER_ITEM: u32 = 32;

/// Bytes per line.
#[inline]
pub fn pitch_bytes(width: u32) -> u64 {
    width as u64 * 4
}

/// 8-bit code widened to a 16-bit LUT index.
#[inline]
fn widen(v: u8) -> usize {
    v as usize * 257
}

fn read_host(inv: &mut Invocation<'_>) -> Result<()> {
    let t = inv.tiling();
    let width = inv.uint("width")? as usize;
    let has_alpha = inv.uint("has_alpha")? != 0;
    let src: &[u8] = inv.input("src")?;
    let lut: &[f32] = inv.input("lut")?;
    let gamut: &[f32] = inv.input("mats")?;
    let dst: &mut [[f32; 4]] = inv.output("dst")?;

    let h = t.height as usize;
    inv.expect_len("src", src.len(), width * 4 * h)?;
    inv.expect_len("dst", dst.len(), width * h)?;
    inv.expect_len("lut", lut.len(), LUT_SIZE)?;
    inv.expect_len("mats", gamut.len(), 9)?;

    dst[..width * h]
        .par_chunks_mut(width)
        .zip(src.par_chunks(width * 4))
        .for_each(|(out, line)| {
            for run in t.items() {
                for x in run {
                    let x = x as usize;
                    let p = &line[x * 4..x * 4 + 4];
                    let lin = [lut[widen(p[0])], lut[widen(p[1])], lut[widen(p[2])]];
                    let [r, g, b] = mat3_mul(gamut, lin);
                    let a = if has_alpha { lut[widen(p[3])] } else { 1.0 };
                    out[x] = [r, g, b, a];
                }
            }
        });
    Ok(())
}

fn write_host(inv: &mut Invocation<'_>) -> Result<()> {
    let t = inv.tiling();
    let width = inv.uint("width")? as usize;
    let src: &[[f32; 4]] = inv.input("src")?;
    let lut: &[f32] = inv.input("lut")?;
    let gamut: &[f32] = inv.input("mats")?;
    let dst: &mut [u8] = inv.output("dst")?;

    let h = t.height as usize;
    inv.expect_len("src", src.len(), width * h)?;
    inv.expect_len("dst", dst.len(), width * 4 * h)?;
    inv.expect_len("lut", lut.len(), LUT_SIZE)?;
    inv.expect_len("mats", gamut.len(), 9)?;

    let code8 = |v: f32| quantize(v * 255.0, 0, 255) as u8;

    dst[..width * 4 * h]
        .par_chunks_mut(width * 4)
        .zip(src.par_chunks(width))
        .for_each(|(line, px)| {
            for run in t.items() {
                for x in run {
                    let x = x as usize;
                    let p = px[x];
                    let lin = mat3_mul(gamut, [p[0], p[1], p[2]]);
                    let o = &mut line[x * 4..x * 4 + 4];
                    o[0] = code8(lut_lookup(lut, lin[0]));
                    o[1] = code8(lut_lookup(lut, lin[1]));
                    o[2] = code8(lut_lookup(lut, lin[2]));
                    o[3] = code8(lut_lookup(lut, p[3]));
                }
            }
        });
    Ok(())
}

/// RGBA8 to planar float.
pub static READ: KernelSource = KernelSource {
    name: "rgba8_read",
    params: &[
        Param::input("src"),
        Param::output("dst"),
        Param::input("lut"),
        Param::input("mats"),
        Param::uint("width"),
        Param::uint("has_alpha"),
    ],
    wgsl: shaders::RGBA8_READ,
    host: read_host,
};

/// Planar float to RGBA8.
pub static WRITE: KernelSource = KernelSource {
    name: "rgba8_write",
    params: &[
        Param::input("src"),
        Param::output("dst"),
        Param::input("lut"),
        Param::input("mats"),
        Param::uint("width"),
    ],
    wgsl: shaders::RGBA8_WRITE,
    host: write_host,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch() {
        assert_eq!(pitch_bytes(1920), 7680);
        assert_eq!(pitch_bytes(1), 4);
    }

    #[test]
    fn test_widen_spans_lut() {
        assert_eq!(widen(0), 0);
        assert_eq!(widen(255), LUT_SIZE - 1);
    }
}
