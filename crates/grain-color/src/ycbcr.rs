//! Y'CbCr weights and matrices.
//!
//! Matrices operate on normalised components: Y' in [0, 1], Cb and Cr in
//! [-0.5, 0.5]. Quantisation to narrow-range code values is done by the codec
//! with the [`VIDEO_10BIT`] constants.

/// Luma weights `Kr` and `Kb` (`Kg = 1 - Kr - Kb`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LumaWeights {
    /// Red weight
    pub kr: f32,
    /// Blue weight
    pub kb: f32,
}

impl LumaWeights {
    /// ITU-R BT.601
    pub const BT601: Self = Self { kr: 0.299, kb: 0.114 };
    /// ITU-R BT.709
    pub const BT709: Self = Self { kr: 0.2126, kb: 0.0722 };
    /// ITU-R BT.2020
    pub const BT2020: Self = Self { kr: 0.2627, kb: 0.0593 };

    /// Green weight.
    #[inline]
    pub fn kg(&self) -> f32 {
        1.0 - self.kr - self.kb
    }
}

/// Narrow-range quantisation of one Y'CbCr bit depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoRange {
    /// Code of black (Y' = 0)
    pub luma_offset: f32,
    /// Codes between black and nominal white
    pub luma_scale: f32,
    /// Code of zero chroma
    pub chroma_offset: f32,
    /// Codes spanning Cb/Cr = -0.5..0.5
    pub chroma_scale: f32,
    /// Lowest legal code
    pub min_code: u32,
    /// Highest legal code
    pub max_code: u32,
}

/// 10-bit narrow range: Y' 64..940, Cb/Cr 64..960, codes 0-3 and 1020-1023
/// reserved for timing references.
pub const VIDEO_10BIT: VideoRange = VideoRange {
    luma_offset: 64.0,
    luma_scale: 876.0,
    chroma_offset: 512.0,
    chroma_scale: 896.0,
    min_code: 4,
    max_code: 1019,
};

/// Row-major matrix from Y'CbCr to R'G'B'.
pub fn ycbcr_to_rgb_matrix(w: &LumaWeights) -> [f32; 9] {
    let kg = w.kg();
    [
        1.0, 0.0, 2.0 * (1.0 - w.kr),
        1.0, -2.0 * w.kb * (1.0 - w.kb) / kg, -2.0 * w.kr * (1.0 - w.kr) / kg,
        1.0, 2.0 * (1.0 - w.kb), 0.0,
    ]
}

/// Row-major matrix from R'G'B' to Y'CbCr.
pub fn rgb_to_ycbcr_matrix(w: &LumaWeights) -> [f32; 9] {
    let kg = w.kg();
    let cb = 0.5 / (1.0 - w.kb);
    let cr = 0.5 / (1.0 - w.kr);
    [
        w.kr, kg, w.kb,
        -w.kr * cb, -kg * cb, (1.0 - w.kb) * cb,
        (1.0 - w.kr) * cr, -kg * cr, -w.kb * cr,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn mul(m: &[f32; 9], v: [f32; 3]) -> [f32; 3] {
        [
            m[0] * v[0] + m[1] * v[1] + m[2] * v[2],
            m[3] * v[0] + m[4] * v[1] + m[5] * v[2],
            m[6] * v[0] + m[7] * v[1] + m[8] * v[2],
        ]
    }

    #[test]
    fn test_matrices_are_inverse() {
        for w in [LumaWeights::BT601, LumaWeights::BT709, LumaWeights::BT2020] {
            let fwd = rgb_to_ycbcr_matrix(&w);
            let inv = ycbcr_to_rgb_matrix(&w);
            let rgb = [0.8, 0.3, 0.1];
            let back = mul(&inv, mul(&fwd, rgb));
            for i in 0..3 {
                assert_abs_diff_eq!(back[i], rgb[i], epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_white_has_no_chroma() {
        let ycc = mul(&rgb_to_ycbcr_matrix(&LumaWeights::BT709), [1.0, 1.0, 1.0]);
        assert_abs_diff_eq!(ycc[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(ycc[1], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(ycc[2], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_blue_reaches_chroma_extreme() {
        let ycc = mul(&rgb_to_ycbcr_matrix(&LumaWeights::BT709), [0.0, 0.0, 1.0]);
        assert_abs_diff_eq!(ycc[1], 0.5, epsilon = 1e-6);
    }
}
