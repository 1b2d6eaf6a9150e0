use grain_color::{ColSpec, gamut_matrix, linear_to_gamma_lut, rgb_to_ycbcr_matrix};
use grain_core::{Colorimetry, Error, FrameDescriptor, Packing, Result};
use grain_device::{BufferPool, KernelArgs, LineTiling, PooledBuffer, Program, Residency};
use tracing::debug;

use crate::Codec;
use crate::reader::check_len;

/// Planar to packed encoder for one frame geometry.
#[derive(Debug)]
pub struct Writer {
    codec: Codec,
    width: u32,
    height: u32,
    program: Program,
    lut: PooledBuffer,
    mats: PooledBuffer,
}

impl Writer {
    pub(crate) fn new(
        codec: Codec,
        pool: &BufferPool,
        src: &FrameDescriptor,
        dest: Colorimetry,
        owner: &str,
    ) -> Result<Self> {
        src.validate()?;
        if src.packing != Packing::PlanarF32_4444 {
            return Err(Error::UnsupportedFormat(format!(
                "{codec} writer expects planar float input, got '{}'",
                src.packing
            )));
        }

        let src_spec = ColSpec::from(src.colorimetry);
        let dst_spec = ColSpec::from(dest);

        let mut mats = gamut_matrix(&src_spec, &dst_spec).to_vec();
        if codec == Codec::V210 {
            mats.extend_from_slice(&rgb_to_ycbcr_matrix(&dst_spec.luma));
        }

        let tiling = LineTiling::new(src.width, src.height, codec.pixels_per_item())?;
        let program = pool.device().create_program(codec.write_kernel(), tiling)?;
        let lut = linear_to_gamma_lut(&dst_spec);
        let lut = pool.upload(bytemuck::cast_slice(&lut), Residency::Device, owner)?;
        let mats = pool.upload(bytemuck::cast_slice(&mats), Residency::Staging, owner)?;

        debug!(
            %codec,
            width = src.width,
            height = src.height,
            from = %src.colorimetry,
            to = %dest,
            "Writer"
        );

        Ok(Self {
            codec,
            width: src.width,
            height: src.height,
            program,
            lut,
            mats,
        })
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Bytes of planar input one frame needs.
    pub fn src_bytes(&self) -> u64 {
        FrameDescriptor::planar(self.width, self.height, Colorimetry::default()).planar_bytes()
    }

    /// Bytes of packed output one frame needs.
    pub fn dst_bytes(&self) -> u64 {
        self.codec.frame_bytes(self.width, self.height)
    }

    /// Encode `src` (planar float) into `dst` (packed). Blocks until done.
    pub fn to_packed(&self, src: &PooledBuffer, dst: &PooledBuffer) -> Result<()> {
        check_len("planar source", src.len(), self.src_bytes())?;
        check_len("packed destination", dst.len(), self.dst_bytes())?;

        let args = KernelArgs::new()
            .buffer("src", src)
            .buffer("dst", dst)
            .buffer("lut", &self.lut)
            .buffer("mats", &self.mats)
            .uint("width", self.width);
        let args = match self.codec {
            Codec::V210 => args.uint("pitch", (self.codec.pitch_bytes(self.width) / 4) as u32),
            Codec::Rgba8 => args,
        };
        self.program.run(&args)
    }
}
