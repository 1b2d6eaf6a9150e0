//! # grain-ops
//!
//! Frame operators on planar float RGBA frames held in device buffers.
//!
//! - [`Monochrome`] - blend towards luminance
//! - [`Mix`] - cross-dissolve of two frames
//! - [`Stamp`] - alpha composite of one frame over another
//! - [`Blur`] - Gaussian convolution
//!
//! Every operator is compiled once for a frame geometry and then dispatched
//! per frame. `process` never allocates: it writes into a `dst` the caller
//! reserved from the pool, at least one planar frame long. The stages in
//! `grain-stage` reserve that buffer under their own owner tag and hand it
//! downstream. Kernels process one line per work-group and
//! [`PIXELS_PER_ITEM`] pixels per work item.

mod blur;
mod mix;
mod mono;
mod shaders;
mod stamp;

pub use blur::{Blur, MAX_BLUR_DIM, blur_dim, gaussian_filter};
pub use mix::Mix;
pub use mono::Monochrome;
pub use stamp::Stamp;

use grain_core::{Error, FrameDescriptor, Packing, Result};
use grain_device::{LineTiling, PooledBuffer};
use rayon::prelude::*;

/// Pixels per work item for every float operator.
pub const PIXELS_PER_ITEM: u32 = 16;

/// One planar pixel.
pub(crate) type Rgba = [f32; 4];

/// Line tiling for an operator over `desc`, which must be planar float.
pub(crate) fn planar_tiling(op: &str, desc: &FrameDescriptor) -> Result<LineTiling> {
    desc.validate()?;
    if desc.packing != Packing::PlanarF32_4444 {
        return Err(Error::UnsupportedFormat(format!(
            "{op} works on planar float frames, got '{}'",
            desc.packing
        )));
    }
    LineTiling::new(desc.width, desc.height, PIXELS_PER_ITEM)
}

/// Two-input operators need matching geometry and colorimetry.
pub(crate) fn check_pair(op: &str, a: &FrameDescriptor, b: &FrameDescriptor) -> Result<()> {
    if !a.same_geometry(b) {
        return Err(Error::invalid_argument(format!(
            "{op} inputs differ in size: {}x{} and {}x{}",
            a.width, a.height, b.width, b.height
        )));
    }
    if a.colorimetry != b.colorimetry {
        return Err(Error::invalid_argument(format!(
            "{op} inputs differ in colorimetry: {} and {}",
            a.colorimetry, b.colorimetry
        )));
    }
    Ok(())
}

/// A source must hold exactly one frame of `desc`.
pub(crate) fn check_source(op: &str, buf: &PooledBuffer, desc: &FrameDescriptor) -> Result<()> {
    if buf.len() != desc.planar_bytes() {
        return Err(Error::invalid_source(format!(
            "{op}: source buffer holds {} bytes, a {}x{} frame is {}",
            buf.len(),
            desc.width,
            desc.height,
            desc.planar_bytes()
        )));
    }
    Ok(())
}

/// A destination must hold at least one frame of `desc`.
pub(crate) fn check_dest(op: &str, buf: &PooledBuffer, desc: &FrameDescriptor) -> Result<()> {
    if buf.len() < desc.planar_bytes() {
        return Err(Error::invalid_argument(format!(
            "{op}: destination buffer holds {} bytes, needs {}",
            buf.len(),
            desc.planar_bytes()
        )));
    }
    Ok(())
}

/// Run `f(x, y)` for every pixel of a line-tiled dispatch, one rayon task
/// per line and the work item runs in order within it.
pub(crate) fn for_each_pixel<F>(tiling: LineTiling, dst: &mut [Rgba], f: F)
where
    F: Fn(usize, usize) -> Rgba + Sync + Send,
{
    let w = tiling.width as usize;
    let n = w * tiling.height as usize;
    dst[..n]
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(y, line)| {
            for run in tiling.items() {
                for x in run {
                    line[x as usize] = f(x as usize, y);
                }
            }
        });
}
