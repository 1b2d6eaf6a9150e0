//! # grain-codec
//!
//! Conversion between packed delivery formats and the planar float working
//! format, on a grain device.
//!
//! | Codec | Packing | Pitch | Pixels per work item |
//! |-------|---------|-------|----------------------|
//! | [`Codec::V210`] | 10-bit 4:2:2 Y'CbCr | `ceil(w/48)*128` | 48 |
//! | [`Codec::Rgba8`] | 8-bit RGBA | `w*4` | 32 |
//!
//! A [`Reader`] decodes packed frames to linear light in a working
//! colorimetry; a [`Writer`] encodes back to a destination colorimetry. Both
//! upload their transfer LUT and matrices once, as read-only pool buffers
//! owned by the calling stage.
//!
//! # Example
//!
//! ```ignore
//! use grain_codec::Codec;
//!
//! let codec = Codec::for_packing(src_desc.packing)?;
//! let reader = codec.reader(&pool, &src_desc, Colorimetry::Bt709, "Unpack-1")?;
//! reader.from_packed(&packed, &planar)?;
//! ```

mod pixel;
mod reader;
pub mod rgba8;
mod shaders;
pub mod v210;
mod writer;

use grain_core::{Colorimetry, Error, FrameDescriptor, PLANAR_BYTES_PER_PIXEL, Packing, Result};
use grain_device::{BufferPool, KernelSource};

pub use reader::Reader;
pub use writer::Writer;

/// Packed formats with a device codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    V210,
    Rgba8,
}

/// Which side of a codec a descriptor is derived for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// packed -> planar
    Read,
    /// planar -> packed
    Write,
}

impl Codec {
    /// Codec for a packed format. Planar float has none.
    pub fn for_packing(packing: Packing) -> Result<Self> {
        match packing {
            Packing::Packed10_422 => Ok(Codec::V210),
            Packing::Packed8_4444 => Ok(Codec::Rgba8),
            other => Err(Error::UnsupportedFormat(format!(
                "no codec for packing '{other}'"
            ))),
        }
    }

    pub fn packing(self) -> Packing {
        match self {
            Codec::V210 => Packing::Packed10_422,
            Codec::Rgba8 => Packing::Packed8_4444,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Codec::V210 => "v210",
            Codec::Rgba8 => "RGBA8",
        }
    }

    /// Pixels one work item handles.
    pub fn pixels_per_item(self) -> u32 {
        match self {
            Codec::V210 => v210::PIXELS_PER_BLOCK,
            Codec::Rgba8 => rgba8::PIXELS_PER_ITEM,
        }
    }

    /// Bytes per packed line.
    pub fn pitch_bytes(self, width: u32) -> u64 {
        match self {
            Codec::V210 => v210::pitch_bytes(width),
            Codec::Rgba8 => rgba8::pitch_bytes(width),
        }
    }

    /// Bytes per packed frame.
    pub fn frame_bytes(self, width: u32, height: u32) -> u64 {
        self.pitch_bytes(width) * height as u64
    }

    pub(crate) fn read_kernel(self) -> &'static KernelSource {
        match self {
            Codec::V210 => &v210::READ,
            Codec::Rgba8 => &rgba8::READ,
        }
    }

    pub(crate) fn write_kernel(self) -> &'static KernelSource {
        match self {
            Codec::V210 => &v210::WRITE,
            Codec::Rgba8 => &rgba8::WRITE,
        }
    }

    /// Decoder for frames described by `src`, producing linear light in
    /// `working`.
    pub fn reader(
        self,
        pool: &BufferPool,
        src: &FrameDescriptor,
        working: Colorimetry,
        owner: &str,
    ) -> Result<Reader> {
        Reader::new(self, pool, src, working, owner)
    }

    /// Encoder for planar frames described by `src`, producing packed
    /// frames in `dest`.
    pub fn writer(
        self,
        pool: &BufferPool,
        src: &FrameDescriptor,
        dest: Colorimetry,
        owner: &str,
    ) -> Result<Writer> {
        Writer::new(self, pool, src, dest, owner)
    }

    /// Descriptor of the frames this codec produces from `src`.
    ///
    /// Readers produce planar float (32 bits) in `colorimetry`, keeping alpha
    /// only for RGBA8 sources that have it. Writers produce this codec's
    /// packing in `colorimetry` with no alpha.
    pub fn dest_tags(
        self,
        direction: Direction,
        src: &FrameDescriptor,
        colorimetry: Colorimetry,
    ) -> FrameDescriptor {
        match direction {
            Direction::Read => FrameDescriptor::planar(src.width, src.height, colorimetry)
                .with_alpha(self == Codec::Rgba8 && src.has_alpha),
            Direction::Write => {
                FrameDescriptor::new(self.packing(), src.width, src.height, colorimetry)
            }
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Bytes per line for any packing, planar float included.
pub fn pitch_bytes(packing: Packing, width: u32) -> u64 {
    match Codec::for_packing(packing) {
        Ok(codec) => codec.pitch_bytes(width),
        Err(_) => width as u64 * PLANAR_BYTES_PER_PIXEL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_packing() {
        assert_eq!(Codec::for_packing(Packing::Packed10_422).unwrap(), Codec::V210);
        assert_eq!(Codec::for_packing(Packing::Packed8_4444).unwrap(), Codec::Rgba8);
        assert!(matches!(
            Codec::for_packing(Packing::PlanarF32_4444),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_pitch_bytes() {
        assert_eq!(pitch_bytes(Packing::Packed10_422, 1920), 5120);
        assert_eq!(pitch_bytes(Packing::Packed8_4444, 1920), 7680);
        assert_eq!(pitch_bytes(Packing::PlanarF32_4444, 1920), 30720);
        assert_eq!(Codec::V210.frame_bytes(1920, 1080), 5120 * 1080);
    }

    #[test]
    fn test_dest_tags() {
        let v210 = FrameDescriptor::new(Packing::Packed10_422, 1920, 1080, Colorimetry::Bt2020);
        let planar = Codec::V210.dest_tags(Direction::Read, &v210, Colorimetry::Bt709);
        assert_eq!(planar.packing, Packing::PlanarF32_4444);
        assert_eq!(planar.bits, 32);
        assert_eq!(planar.colorimetry, Colorimetry::Bt709);
        assert!(!planar.has_alpha);

        let packed = Codec::V210.dest_tags(Direction::Write, &planar, Colorimetry::Bt709);
        assert_eq!(packed.packing, Packing::Packed10_422);
        assert_eq!(packed.bits, 10);
        assert!(!packed.has_alpha);

        let rgba = FrameDescriptor::new(Packing::Packed8_4444, 64, 64, Colorimetry::Srgb)
            .with_alpha(true);
        assert!(Codec::Rgba8.dest_tags(Direction::Read, &rgba, Colorimetry::Bt709).has_alpha);
        let out = Codec::Rgba8.dest_tags(Direction::Write, &rgba, Colorimetry::Srgb);
        assert_eq!(out.bits, 8);
        assert!(!out.has_alpha);
    }
}
