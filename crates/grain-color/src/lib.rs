//! # grain-color
//!
//! Pure colour math consumed by the codecs and operators. Nothing here touches
//! a device: every function returns plain arrays that a stage uploads once as
//! read-only tables.
//!
//! - [`primaries`] - chromaticities and RGB/XYZ matrix derivation
//! - [`transfer`] - transfer curves (BT.709, sRGB, HLG)
//! - [`lut`] - 16-bit gamma-to-linear and linear-to-gamma lookup tables
//! - [`ycbcr`] - Y'CbCr weights and conversion matrices
//! - [`ColSpec`] - everything above resolved for one [`Colorimetry`]
//!
//! # Usage
//!
//! ```rust
//! use grain_color::{ColSpec, gamma_to_linear_lut, gamut_matrix};
//! use grain_core::Colorimetry;
//!
//! let src = ColSpec::from(Colorimetry::Bt2020);
//! let dst = ColSpec::from(Colorimetry::Bt709);
//! let lut = gamma_to_linear_lut(&src);
//! let m = gamut_matrix(&src, &dst);
//! assert_eq!(lut.len(), 65536);
//! assert_eq!(m.len(), 9);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod lut;
pub mod primaries;
pub mod transfer;
pub mod ycbcr;

use grain_core::Colorimetry;

pub use lut::{LUT_SIZE, gamma_to_linear_lut, linear_to_gamma_lut, lut_index};
pub use primaries::{Primaries, gamut_matrix, matrix_flatten, rgb_to_rgb_matrix, rgb_to_xyz_matrix};
pub use transfer::TransferCurve;
pub use ycbcr::{LumaWeights, VIDEO_10BIT, VideoRange, rgb_to_ycbcr_matrix, ycbcr_to_rgb_matrix};

/// Colorimetry resolved to numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColSpec {
    /// Tag this spec was built from.
    pub colorimetry: Colorimetry,
    /// RGB primaries and white point.
    pub primaries: Primaries,
    /// Transfer curve between code values and linear light.
    pub transfer: TransferCurve,
    /// Y'CbCr luma weights.
    pub luma: LumaWeights,
}

impl From<Colorimetry> for ColSpec {
    fn from(colorimetry: Colorimetry) -> Self {
        use primaries::{BT601_525, BT601_625, REC709, REC2020};
        let (prims, transfer, luma) = match colorimetry {
            Colorimetry::Bt601_625 => (BT601_625, TransferCurve::Bt709, LumaWeights::BT601),
            Colorimetry::Bt601_525 => (BT601_525, TransferCurve::Bt709, LumaWeights::BT601),
            Colorimetry::Bt709 => (REC709, TransferCurve::Bt709, LumaWeights::BT709),
            Colorimetry::Bt2020 => (REC2020, TransferCurve::Bt709, LumaWeights::BT2020),
            Colorimetry::Bt2100Hlg => (REC2020, TransferCurve::Hlg, LumaWeights::BT2020),
            Colorimetry::Srgb => (REC709, TransferCurve::Srgb, LumaWeights::BT709),
        };
        Self { colorimetry, primaries: prims, transfer, luma }
    }
}

/// Luminance coefficients of linear RGB in the given colorimetry, padded to
/// four lanes so a kernel can `dot` a whole RGBA pixel (alpha weight is 0).
///
/// The weights are the Y row of the RGB to XYZ matrix and sum to 1.
pub fn mono_coeffs(spec: &ColSpec) -> [f32; 4] {
    let m = rgb_to_xyz_matrix(&spec.primaries);
    let y = m.row(1);
    [y.x, y.y, y.z, 0.0]
}
