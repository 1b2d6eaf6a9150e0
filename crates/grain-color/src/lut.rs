//! 16-bit transfer lookup tables.
//!
//! Kernels never evaluate transfer curves directly. Instead a code value in
//! [0, 1] is quantised to 16 bits with [`lut_index`] (round half to even,
//! saturating) and looked up in a [`LUT_SIZE`]-entry table. Packed 8-bit and
//! 10-bit samples are first widened to 16 bits (`v * 257` for 8-bit), so one
//! table serves every input depth.

use crate::ColSpec;

/// Entries per LUT: one per 16-bit quantisation level.
pub const LUT_SIZE: usize = 65536;

const LUT_MAX: f32 = (LUT_SIZE - 1) as f32;

/// Quantise a [0, 1] value to a LUT index, rounding half to even and
/// saturating out-of-range (and NaN) inputs.
#[inline]
pub fn lut_index(v: f32) -> usize {
    let q = (v * LUT_MAX).round_ties_even();
    if q.is_nan() || q <= 0.0 {
        0
    } else if q >= LUT_MAX {
        LUT_SIZE - 1
    } else {
        q as usize
    }
}

/// Table mapping 16-bit code values to linear light.
pub fn gamma_to_linear_lut(spec: &ColSpec) -> Vec<f32> {
    (0..LUT_SIZE)
        .map(|i| spec.transfer.to_linear(i as f32 / LUT_MAX))
        .collect()
}

/// Table mapping 16-bit quantised linear light to code values in [0, 1].
pub fn linear_to_gamma_lut(spec: &ColSpec) -> Vec<f32> {
    (0..LUT_SIZE)
        .map(|i| spec.transfer.from_linear(i as f32 / LUT_MAX))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use grain_core::Colorimetry;

    #[test]
    fn test_lut_index_saturates() {
        assert_eq!(lut_index(-1.0), 0);
        assert_eq!(lut_index(0.0), 0);
        assert_eq!(lut_index(1.0), LUT_SIZE - 1);
        assert_eq!(lut_index(7.5), LUT_SIZE - 1);
        assert_eq!(lut_index(f32::NAN), 0);
    }

    #[test]
    fn test_lut_index_rounds_to_nearest() {
        assert_eq!(lut_index(0.25), 16384);
        assert_eq!(lut_index(0.5), 32768);
        assert_eq!(lut_index(128.0 / 255.0), 128 * 257);
    }

    #[test]
    fn test_tables_are_monotonic() {
        let spec = ColSpec::from(Colorimetry::Bt709);
        for lut in [gamma_to_linear_lut(&spec), linear_to_gamma_lut(&spec)] {
            assert_eq!(lut.len(), LUT_SIZE);
            assert!(lut.windows(2).all(|w| w[1] >= w[0]));
            assert_eq!(lut[0], 0.0);
        }
    }

    #[test]
    fn test_8bit_roundtrip_via_tables() {
        let spec = ColSpec::from(Colorimetry::Srgb);
        let to_lin = gamma_to_linear_lut(&spec);
        let to_gam = linear_to_gamma_lut(&spec);
        for v in 0u32..=255 {
            let lin = to_lin[(v * 257) as usize];
            let back = (to_gam[lut_index(lin)] * 255.0).round_ties_even() as u32;
            assert!(back.abs_diff(v) <= 1, "v={v} back={back}");
        }
    }
}
