//! Frame packings and frame descriptors.
//!
//! # Types
//!
//! - [`Packing`] - the closed set of encodings: v210-style packed 10-bit
//!   4:2:2, packed 8-bit RGBA and planar 32-bit float RGBA
//! - [`FrameDescriptor`] - geometry and colour tags of one video flow
//!
//! Packed layouts (row pitch, word order) are owned by `grain-codec`. The
//! planar float working format has no row padding: each pixel is four
//! contiguous `f32` values, [`PLANAR_BYTES_PER_PIXEL`] bytes.

use serde::{Deserialize, Serialize};

use crate::{Colorimetry, Error, Result};

/// Bytes per pixel of the planar float working format (RGBA f32).
pub const PLANAR_BYTES_PER_PIXEL: u64 = 16;

/// Encoding of a frame's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Packing {
    /// 10-bit Y'CbCr 4:2:2, three samples per little-endian 32-bit word (v210).
    #[serde(rename = "packed10_422", alias = "v210")]
    Packed10_422,
    /// 8-bit RGBA, one 32-bit word per pixel.
    #[serde(rename = "packed8_4444", alias = "RGBA8")]
    Packed8_4444,
    /// Linear-light RGBA as four 32-bit floats per pixel.
    #[serde(rename = "planar_float32_4444", alias = "RGBA_f32")]
    PlanarF32_4444,
}

impl Packing {
    /// Parse a packing tag as carried on a flow (`v210`, `RGBA8`, `RGBA_f32`
    /// or the canonical snake-case names).
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "v210" | "packed10_422" => Ok(Self::Packed10_422),
            "RGBA8" | "packed8_4444" => Ok(Self::Packed8_4444),
            "RGBA_f32" | "planar_float32_4444" => Ok(Self::PlanarF32_4444),
            other => Err(Error::UnsupportedFormat(format!("packing '{other}'"))),
        }
    }

    /// Canonical tag.
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Packed10_422 => "packed10_422",
            Self::Packed8_4444 => "packed8_4444",
            Self::PlanarF32_4444 => "planar_float32_4444",
        }
    }

    /// Bits per component.
    pub const fn bits(&self) -> u32 {
        match self {
            Self::Packed10_422 => 10,
            Self::Packed8_4444 => 8,
            Self::PlanarF32_4444 => 32,
        }
    }

    /// Whether this is one of the packed integer encodings.
    #[inline]
    pub const fn is_packed(&self) -> bool {
        !matches!(self, Self::PlanarF32_4444)
    }
}

impl std::fmt::Display for Packing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Geometry and colour tags of one video flow.
///
/// Exchanged at stage boundaries: a stage is configured from the descriptors
/// of its inputs and reports the descriptor of its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDescriptor {
    /// Sample encoding.
    pub packing: Packing,
    /// Width in pixels.
    pub width: u32,
    /// Height in lines.
    pub height: u32,
    /// Colorimetry tag.
    pub colorimetry: Colorimetry,
    /// Bits per component.
    pub bits: u32,
    /// Whether the flow carries a genuine alpha channel.
    pub has_alpha: bool,
}

impl FrameDescriptor {
    /// Descriptor with `bits` derived from the packing and no alpha.
    pub fn new(packing: Packing, width: u32, height: u32, colorimetry: Colorimetry) -> Self {
        Self {
            packing,
            width,
            height,
            colorimetry,
            bits: packing.bits(),
            has_alpha: false,
        }
    }

    /// Planar float descriptor in the given colorimetry.
    pub fn planar(width: u32, height: u32, colorimetry: Colorimetry) -> Self {
        Self::new(Packing::PlanarF32_4444, width, height, colorimetry)
    }

    /// Builder-style alpha flag.
    pub fn with_alpha(mut self, has_alpha: bool) -> Self {
        self.has_alpha = has_alpha;
        self
    }

    /// Reject zero-sized geometry.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidArgument(format!(
                "invalid frame geometry {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Byte length of one frame in the planar float working format.
    #[inline]
    pub fn planar_bytes(&self) -> u64 {
        self.width as u64 * self.height as u64 * PLANAR_BYTES_PER_PIXEL
    }

    /// Whether two flows have the same width and height.
    #[inline]
    pub fn same_geometry(&self, other: &FrameDescriptor) -> bool {
        self.width == other.width && self.height == other.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packing_tags() {
        assert_eq!(Packing::from_tag("v210").unwrap(), Packing::Packed10_422);
        assert_eq!(Packing::from_tag("RGBA8").unwrap(), Packing::Packed8_4444);
        assert_eq!(Packing::from_tag("RGBA_f32").unwrap(), Packing::PlanarF32_4444);
        assert!(matches!(Packing::from_tag("UYVY"), Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_planar_bytes() {
        let d = FrameDescriptor::planar(1920, 1080, Colorimetry::Bt709);
        assert_eq!(d.planar_bytes(), 1920 * 1080 * 16);
        assert_eq!(d.bits, 32);
        assert!(!d.has_alpha);
    }

    #[test]
    fn test_validate() {
        assert!(FrameDescriptor::planar(0, 10, Colorimetry::Bt709).validate().is_err());
        assert!(FrameDescriptor::planar(10, 10, Colorimetry::Bt709).validate().is_ok());
    }

    #[test]
    fn test_descriptor_yaml() {
        let yaml = "packing: v210\nwidth: 1920\nheight: 1080\ncolorimetry: BT709\nbits: 10\nhas_alpha: false\n";
        let d: FrameDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(d.packing, Packing::Packed10_422);
        assert_eq!(d.colorimetry, Colorimetry::Bt709);
    }
}
