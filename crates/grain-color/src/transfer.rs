//! Transfer curves.
//!
//! - **to_linear**: code value (gamma-encoded) to linear light
//! - **from_linear**: linear light to code value
//!
//! BT.601 and BT.2020 (10-bit) share the BT.709 curve. BT.709 decoding uses
//! the exact inverse of the OETF rather than BT.1886 so that decode followed by
//! encode is lossless up to quantisation.
//!
//! # Range
//!
//! Input and output are [0, 1]; values outside are clamped.

/// Named transfer curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferCurve {
    /// ITU-R BT.709 OETF and its inverse.
    Bt709,
    /// IEC 61966-2-1 sRGB.
    Srgb,
    /// ITU-R BT.2100 Hybrid Log-Gamma (scene-referred, relative).
    Hlg,
    /// No transfer: code values are linear.
    Linear,
}

// HLG constants
const HLG_A: f32 = 0.17883277;
const HLG_B: f32 = 0.28466892; // 1 - 4*A
const HLG_C: f32 = 0.55991073; // 0.5 - A*ln(4*A)

impl TransferCurve {
    /// Decode a code value to linear light.
    pub fn to_linear(&self, v: f32) -> f32 {
        let v = v.clamp(0.0, 1.0);
        match self {
            Self::Bt709 => {
                if v < 0.081 {
                    v / 4.5
                } else {
                    ((v + 0.099) / 1.099).powf(1.0 / 0.45)
                }
            }
            Self::Srgb => {
                if v <= 0.04045 {
                    v / 12.92
                } else {
                    ((v + 0.055) / 1.055).powf(2.4)
                }
            }
            Self::Hlg => {
                if v <= 0.5 {
                    v * v / 3.0
                } else {
                    (((v - HLG_C) / HLG_A).exp() + HLG_B) / 12.0
                }
            }
            Self::Linear => v,
        }
    }

    /// Encode linear light to a code value.
    pub fn from_linear(&self, l: f32) -> f32 {
        let l = l.clamp(0.0, 1.0);
        match self {
            Self::Bt709 => {
                if l < 0.018 {
                    4.5 * l
                } else {
                    1.099 * l.powf(0.45) - 0.099
                }
            }
            Self::Srgb => {
                if l <= 0.0031308 {
                    l * 12.92
                } else {
                    1.055 * l.powf(1.0 / 2.4) - 0.055
                }
            }
            Self::Hlg => {
                if l <= 1.0 / 12.0 {
                    (3.0 * l).sqrt()
                } else {
                    HLG_A * (12.0 * l - HLG_B).ln() + HLG_C
                }
            }
            Self::Linear => l,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        for curve in [TransferCurve::Bt709, TransferCurve::Srgb, TransferCurve::Hlg, TransferCurve::Linear] {
            for i in 0..=100 {
                let v = i as f32 / 100.0;
                let back = curve.from_linear(curve.to_linear(v));
                assert!((v - back).abs() < 1e-4, "{curve:?}: v={v}, back={back}");
            }
        }
    }

    #[test]
    fn test_boundaries() {
        for curve in [TransferCurve::Bt709, TransferCurve::Srgb, TransferCurve::Hlg] {
            assert_eq!(curve.to_linear(0.0), 0.0);
            assert!((curve.to_linear(1.0) - 1.0).abs() < 1e-4, "{curve:?}");
            assert!((curve.from_linear(1.0) - 1.0).abs() < 1e-4, "{curve:?}");
        }
    }

    #[test]
    fn test_clamps_out_of_range() {
        assert_eq!(TransferCurve::Srgb.to_linear(-0.5), 0.0);
        assert!((TransferCurve::Srgb.from_linear(3.0) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_srgb_midpoint() {
        let linear = TransferCurve::Srgb.to_linear(0.5);
        assert!((linear - 0.214).abs() < 0.01);
    }
}
