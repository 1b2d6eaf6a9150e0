use grain_core::{FrameDescriptor, Result};
use grain_device::{
    BufferPool, Invocation, KernelArgs, KernelSource, Param, PooledBuffer, Program, Residency,
};
use tracing::debug;

use crate::{Rgba, check_dest, check_source, for_each_pixel, planar_tiling, shaders};

/// Largest filter width.
pub const MAX_BLUR_DIM: u32 = 11;

/// Filter width for a blur of standard deviation `sigma`: the smallest odd
/// number covering six sigma, capped at [`MAX_BLUR_DIM`]. Non-positive sigma
/// gives 1, an identity filter.
pub fn blur_dim(sigma: f32) -> u32 {
    if sigma.is_nan() || sigma <= 0.0 {
        return 1;
    }
    let span = (6.0 * sigma).ceil().min(MAX_BLUR_DIM as f32) as u32;
    (span | 1).min(MAX_BLUR_DIM)
}

/// Normalised `dim` x `dim` Gaussian, row-major, centred.
///
/// Entry `(x + r) + (y + r) * dim` is the weight for offset `(x, y)` with
/// `r = dim / 2`. The weights sum to 1.
pub fn gaussian_filter(dim: u32, sigma: f32) -> Vec<f32> {
    if dim <= 1 || sigma.is_nan() || sigma <= 0.0 {
        return vec![1.0];
    }
    let r = (dim / 2) as i32;
    let two_s2 = 2.0 * sigma * sigma;
    let mut taps = Vec::with_capacity((dim * dim) as usize);
    for y in -r..=r {
        for x in -r..=r {
            taps.push((-((x * x + y * y) as f32) / two_s2).exp());
        }
    }
    let sum: f32 = taps.iter().sum();
    taps.iter_mut().for_each(|w| *w /= sum);
    taps
}

fn host(inv: &mut Invocation<'_>) -> Result<()> {
    let t = inv.tiling();
    let (w, h) = (t.width as usize, t.height as usize);
    let dim = inv.uint("dim")? as usize;
    let src: &[Rgba] = inv.input("src")?;
    let weights: &[f32] = inv.input("weights")?;
    let dst: &mut [Rgba] = inv.output("dst")?;

    inv.expect_len("src", src.len(), w * h)?;
    inv.expect_len("dst", dst.len(), w * h)?;
    inv.expect_len("weights", weights.len(), dim * dim)?;

    let r = (dim / 2) as isize;
    for_each_pixel(t, dst, |x, y| {
        let mut acc = [0.0f32; 4];
        for fy in 0..dim {
            let sy = (y as isize + fy as isize - r).clamp(0, h as isize - 1) as usize;
            for fx in 0..dim {
                let sx = (x as isize + fx as isize - r).clamp(0, w as isize - 1) as usize;
                let k = weights[fy * dim + fx];
                let p = src[sy * w + sx];
                for (a, v) in acc.iter_mut().zip(p) {
                    *a += v * k;
                }
            }
        }
        acc
    });
    Ok(())
}

static KERNEL: KernelSource = KernelSource {
    name: "blur",
    params: &[
        Param::input("src"),
        Param::output("dst"),
        Param::input("weights"),
        Param::uint("width"),
        Param::uint("height"),
        Param::uint("dim"),
    ],
    wgsl: shaders::BLUR,
    host,
};

/// Gaussian blur with clamp-to-edge sampling. The depth (sigma) is fixed
/// when the operator is built.
#[derive(Debug)]
pub struct Blur {
    desc: FrameDescriptor,
    dim: u32,
    program: Program,
    weights: PooledBuffer,
}

impl Blur {
    pub fn new(pool: &BufferPool, desc: &FrameDescriptor, depth: f32, owner: &str) -> Result<Self> {
        let tiling = planar_tiling("blur", desc)?;
        let dim = blur_dim(depth);
        let weights = gaussian_filter(dim, depth);
        let program = pool.device().create_program(&KERNEL, tiling)?;
        let weights = pool.upload(bytemuck::cast_slice(&weights), Residency::Staging, owner)?;
        debug!(width = desc.width, height = desc.height, depth, dim, "Blur");
        Ok(Self {
            desc: *desc,
            dim,
            program,
            weights,
        })
    }

    /// Filter width in pixels.
    pub fn dim(&self) -> u32 {
        self.dim
    }

    pub fn process(&self, src: &PooledBuffer, dst: &PooledBuffer) -> Result<()> {
        check_source("blur", src, &self.desc)?;
        check_dest("blur", dst, &self.desc)?;
        self.program.run(
            &KernelArgs::new()
                .buffer("src", src)
                .buffer("dst", dst)
                .buffer("weights", &self.weights)
                .uint("width", self.desc.width)
                .uint("height", self.desc.height)
                .uint("dim", self.dim),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_blur_dim() {
        assert_eq!(blur_dim(0.0), 1);
        assert_eq!(blur_dim(-2.0), 1);
        assert_eq!(blur_dim(f32::NAN), 1);
        assert_eq!(blur_dim(0.1), 1);
        assert_eq!(blur_dim(0.5), 3);
        assert_eq!(blur_dim(1.0), 7);
        assert_eq!(blur_dim(1.5), 9);
        assert_eq!(blur_dim(5.0), MAX_BLUR_DIM);
    }

    #[test]
    fn test_gaussian_filter_normalised() {
        for sigma in [0.5, 1.0, 2.0] {
            let dim = blur_dim(sigma);
            let f = gaussian_filter(dim, sigma);
            assert_eq!(f.len(), (dim * dim) as usize);
            assert_abs_diff_eq!(f.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_gaussian_filter_shape() {
        let f = gaussian_filter(5, 1.0);
        let centre = f[12];
        assert!(f.iter().all(|&w| w <= centre));
        // Symmetric in x and y.
        assert_eq!(f[11], f[13]);
        assert_eq!(f[7], f[17]);
        assert_eq!(f[11], f[7]);
    }

    #[test]
    fn test_identity_filter() {
        assert_eq!(gaussian_filter(1, 3.0), vec![1.0]);
        assert_eq!(gaussian_filter(7, 0.0), vec![1.0]);
    }
}
