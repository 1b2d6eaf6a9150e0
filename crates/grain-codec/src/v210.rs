//! v210: 10-bit 4:2:2 Y'CbCr, 6 pixels in 4 little-endian 32-bit words.
//!
//! ```text
//! w0 = Cb0 | Y0 << 10 | Cr0 << 20
//! w1 = Y1  | Cb2 << 10 | Y2 << 20
//! w2 = Cr2 | Y3 << 10 | Cb4 << 20
//! w3 = Y4  | Cr4 << 10 | Y5 << 20
//! ```
//!
//! Lines are padded to whole 128-byte blocks of 48 pixels.

use grain_color::{LUT_SIZE, VIDEO_10BIT};
use grain_device::{Invocation, KernelSource, Param, Result};
use rayon::prelude::*;

use crate::pixel::{lut_lookup, mat3_mul, quantize};
use crate::shaders;

/// Pixels per 128-byte block; also the pixels per work item.
pub const PIXELS_PER_BLOCK: u32 = 48;

/// Words per 128-byte block.
const WORDS_PER_BLOCK: usize = 32;

/// Bytes per line: `ceil(width / 48) * 128`.
#[inline]
pub fn pitch_bytes(width: u32) -> u64 {
    width.div_ceil(PIXELS_PER_BLOCK) as u64 * 128
}

#[inline]
fn bits10(w: u32, i: u32) -> u32 {
    (w >> (10 * i)) & 0x3ff
}

/// `(Y, Cb, Cr)` codes of pixel `x` in a line of words.
#[inline]
pub(crate) fn sample(line: &[u32], x: usize) -> (u32, u32, u32) {
    let g = &line[(x / 6) * 4..][..4];
    match x % 6 {
        0 => (bits10(g[0], 1), bits10(g[0], 0), bits10(g[0], 2)),
        1 => (bits10(g[1], 0), bits10(g[0], 0), bits10(g[0], 2)),
        2 => (bits10(g[1], 2), bits10(g[1], 1), bits10(g[2], 0)),
        3 => (bits10(g[2], 1), bits10(g[1], 1), bits10(g[2], 0)),
        4 => (bits10(g[3], 0), bits10(g[2], 2), bits10(g[3], 1)),
        _ => (bits10(g[3], 2), bits10(g[2], 2), bits10(g[3], 1)),
    }
}

/// Pack one 6 pixel group.
#[inline]
pub(crate) fn pack_group(y: [u32; 6], cb: [u32; 3], cr: [u32; 3]) -> [u32; 4] {
    [
        cb[0] | y[0] << 10 | cr[0] << 20,
        y[1] | cb[1] << 10 | y[2] << 20,
        cr[1] | y[3] << 10 | cb[2] << 20,
        y[4] | cr[2] << 10 | y[5] << 20,
    ]
}

fn read_host(inv: &mut Invocation<'_>) -> Result<()> {
    let t = inv.tiling();
    let width = inv.uint("width")? as usize;
    let pitch = inv.uint("pitch")? as usize;
    let src: &[u32] = inv.input("src")?;
    let lut: &[f32] = inv.input("lut")?;
    let mats: &[f32] = inv.input("mats")?;
    let dst: &mut [[f32; 4]] = inv.output("dst")?;

    let h = t.height as usize;
    inv.expect_len("src", src.len(), pitch * h)?;
    inv.expect_len("dst", dst.len(), width * h)?;
    inv.expect_len("lut", lut.len(), LUT_SIZE)?;
    inv.expect_len("mats", mats.len(), 18)?;
    let (gamut, ycc_to_rgb) = mats.split_at(9);
    let r = VIDEO_10BIT;

    dst[..width * h]
        .par_chunks_mut(width)
        .zip(src.par_chunks(pitch))
        .for_each(|(out, line)| {
            for run in t.items() {
                for x in run {
                    let x = x as usize;
                    let (y, cb, cr) = sample(line, x);
                    let ycc = [
                        (y as f32 - r.luma_offset) / r.luma_scale,
                        (cb as f32 - r.chroma_offset) / r.chroma_scale,
                        (cr as f32 - r.chroma_offset) / r.chroma_scale,
                    ];
                    let rgb = mat3_mul(ycc_to_rgb, ycc);
                    let lin = rgb.map(|c| lut_lookup(lut, c));
                    let [cr_, cg, cb_] = mat3_mul(gamut, lin);
                    out[x] = [cr_, cg, cb_, 1.0];
                }
            }
        });
    Ok(())
}

fn write_host(inv: &mut Invocation<'_>) -> Result<()> {
    let t = inv.tiling();
    let width = inv.uint("width")? as usize;
    let pitch = inv.uint("pitch")? as usize;
    let src: &[[f32; 4]] = inv.input("src")?;
    let lut: &[f32] = inv.input("lut")?;
    let mats: &[f32] = inv.input("mats")?;
    let dst: &mut [u32] = inv.output("dst")?;

    let h = t.height as usize;
    inv.expect_len("src", src.len(), width * h)?;
    inv.expect_len("dst", dst.len(), pitch * h)?;
    inv.expect_len("lut", lut.len(), LUT_SIZE)?;
    inv.expect_len("mats", mats.len(), 18)?;
    let (gamut, rgb_to_ycc) = mats.split_at(9);

    let to_ycc = |p: &[f32; 4]| {
        let lin = mat3_mul(gamut, [p[0], p[1], p[2]]);
        mat3_mul(rgb_to_ycc, lin.map(|c| lut_lookup(lut, c)))
    };

    dst[..pitch * h]
        .par_chunks_mut(pitch)
        .zip(src.par_chunks(width))
        .for_each(|(words, px)| {
            for run in t.items() {
                let block = run.start as usize / PIXELS_PER_BLOCK as usize;
                encode_block(px, block, &mut words[block * WORDS_PER_BLOCK..], &to_ycc);
            }
        });
    Ok(())
}

/// Encode 48 pixels starting at `block * 48`; pixels past the line end
/// repeat the last pixel.
fn encode_block(
    px: &[[f32; 4]],
    block: usize,
    words: &mut [u32],
    to_ycc: &impl Fn(&[f32; 4]) -> [f32; 3],
) {
    let r = VIDEO_10BIT;
    let last = px.len() - 1;
    let y_code = |v: f32| quantize(v * r.luma_scale + r.luma_offset, r.min_code, r.max_code);
    let c_code = |v: f32| quantize(v * r.chroma_scale + r.chroma_offset, r.min_code, r.max_code);

    for g in 0..8 {
        let x0 = block * PIXELS_PER_BLOCK as usize + g * 6;
        let mut y = [0u32; 6];
        let mut cb = [0u32; 3];
        let mut cr = [0u32; 3];
        for p in 0..3 {
            let a = to_ycc(&px[(x0 + 2 * p).min(last)]);
            let b = to_ycc(&px[(x0 + 2 * p + 1).min(last)]);
            y[2 * p] = y_code(a[0]);
            y[2 * p + 1] = y_code(b[0]);
            cb[p] = c_code((a[1] + b[1]) * 0.5);
            cr[p] = c_code((a[2] + b[2]) * 0.5);
        }
        words[g * 4..g * 4 + 4].copy_from_slice(&pack_group(y, cb, cr));
    }
}

/// v210 to planar float.
pub static READ: KernelSource = KernelSource {
    name: "v210_read",
    params: &[
        Param::input("src"),
        Param::output("dst"),
        Param::input("lut"),
        Param::input("mats"),
        Param::uint("width"),
        Param::uint("pitch"),
    ],
    wgsl: shaders::V210_READ,
    host: read_host,
};

/// Planar float to v210.
pub static WRITE: KernelSource = KernelSource {
    name: "v210_write",
    params: &[
        Param::input("src"),
        Param::output("dst"),
        Param::input("lut"),
        Param::input("mats"),
        Param::uint("width"),
        Param::uint("pitch"),
    ],
    wgsl: shaders::V210_WRITE,
    host: write_host,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch() {
        assert_eq!(pitch_bytes(1), 128);
        assert_eq!(pitch_bytes(48), 128);
        assert_eq!(pitch_bytes(49), 256);
        assert_eq!(pitch_bytes(1920), 5120);
        assert_eq!(pitch_bytes(1280), 3456);
    }

    #[test]
    fn test_group_layout() {
        let y = [100, 101, 102, 103, 104, 105];
        let cb = [200, 202, 204];
        let cr = [300, 302, 304];
        let words = pack_group(y, cb, cr);
        assert_eq!(words[0], 200 | 100 << 10 | 300 << 20);
        assert_eq!(words[3], 104 | 304 << 10 | 105 << 20);
        for x in 0..6 {
            let (sy, scb, scr) = sample(&words, x);
            assert_eq!(sy, y[x]);
            assert_eq!(scb, cb[x / 2]);
            assert_eq!(scr, cr[x / 2]);
        }
    }

    #[test]
    fn test_encode_block_pads_with_last_pixel() {
        let px = vec![[0.5f32, 0.5, 0.5, 1.0]; 7];
        let mut words = vec![0u32; WORDS_PER_BLOCK];
        encode_block(&px, 0, &mut words, &|p: &[f32; 4]| [p[0], 0.0, 0.0]);
        let luma = quantize(0.5 * 876.0 + 64.0, 4, 1019);
        for x in 0..48 {
            let (y, cb, cr) = sample(&words, x);
            assert_eq!(y, luma);
            assert_eq!((cb, cr), (512, 512));
        }
    }
}
