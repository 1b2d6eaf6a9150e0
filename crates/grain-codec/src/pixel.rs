//! Per-pixel helpers shared by the host kernels.

use grain_color::lut_index;

/// `m * v` for a row-major 3x3 matrix.
#[inline]
pub(crate) fn mat3_mul(m: &[f32], v: [f32; 3]) -> [f32; 3] {
    [
        m[0] * v[0] + m[1] * v[1] + m[2] * v[2],
        m[3] * v[0] + m[4] * v[1] + m[5] * v[2],
        m[6] * v[0] + m[7] * v[1] + m[8] * v[2],
    ]
}

/// Look a [0, 1] value up in a 16-bit LUT.
#[inline]
pub(crate) fn lut_lookup(lut: &[f32], v: f32) -> f32 {
    lut[lut_index(v)]
}

/// Round half to even and saturate to `[lo, hi]`. NaN maps to `lo`.
#[inline]
pub(crate) fn quantize(v: f32, lo: u32, hi: u32) -> u32 {
    let q = v.round_ties_even();
    if q.is_nan() || q <= lo as f32 {
        lo
    } else if q >= hi as f32 {
        hi
    } else {
        q as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_half_even() {
        assert_eq!(quantize(2.5, 0, 255), 2);
        assert_eq!(quantize(3.5, 0, 255), 4);
        assert_eq!(quantize(127.5, 0, 255), 128);
    }

    #[test]
    fn test_quantize_saturates() {
        assert_eq!(quantize(-3.0, 4, 1019), 4);
        assert_eq!(quantize(2000.0, 4, 1019), 1019);
        assert_eq!(quantize(f32::NAN, 0, 255), 0);
    }

    #[test]
    fn test_mat3_identity() {
        let id = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        assert_eq!(mat3_mul(&id, [0.1, 0.2, 0.3]), [0.1, 0.2, 0.3]);
    }
}
