use grain_color::{ColSpec, gamma_to_linear_lut, gamut_matrix, ycbcr_to_rgb_matrix};
use grain_core::{Colorimetry, Error, FrameDescriptor, Result};
use grain_device::{BufferPool, KernelArgs, LineTiling, PooledBuffer, Program, Residency};
use tracing::debug;

use crate::Codec;

/// Packed to planar decoder for one frame geometry.
#[derive(Debug)]
pub struct Reader {
    codec: Codec,
    width: u32,
    height: u32,
    has_alpha: bool,
    program: Program,
    lut: PooledBuffer,
    mats: PooledBuffer,
}

impl Reader {
    pub(crate) fn new(
        codec: Codec,
        pool: &BufferPool,
        src: &FrameDescriptor,
        working: Colorimetry,
        owner: &str,
    ) -> Result<Self> {
        src.validate()?;
        if src.packing != codec.packing() {
            return Err(Error::UnsupportedFormat(format!(
                "{codec} reader cannot decode '{}'",
                src.packing
            )));
        }

        let src_spec = ColSpec::from(src.colorimetry);
        let dst_spec = ColSpec::from(working);

        let mut mats = gamut_matrix(&src_spec, &dst_spec).to_vec();
        if codec == Codec::V210 {
            mats.extend_from_slice(&ycbcr_to_rgb_matrix(&src_spec.luma));
        }

        let tiling = LineTiling::new(src.width, src.height, codec.pixels_per_item())?;
        let program = pool.device().create_program(codec.read_kernel(), tiling)?;
        let lut = gamma_to_linear_lut(&src_spec);
        let lut = pool.upload(bytemuck::cast_slice(&lut), Residency::Device, owner)?;
        let mats = pool.upload(bytemuck::cast_slice(&mats), Residency::Staging, owner)?;

        debug!(
            %codec,
            width = src.width,
            height = src.height,
            from = %src.colorimetry,
            to = %working,
            "Reader"
        );

        Ok(Self {
            codec,
            width: src.width,
            height: src.height,
            has_alpha: src.has_alpha,
            program,
            lut,
            mats,
        })
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Bytes of packed input one frame needs.
    pub fn src_bytes(&self) -> u64 {
        self.codec.frame_bytes(self.width, self.height)
    }

    /// Bytes of planar output one frame needs.
    pub fn dst_bytes(&self) -> u64 {
        FrameDescriptor::planar(self.width, self.height, Colorimetry::default()).planar_bytes()
    }

    /// Decode `src` (packed) into `dst` (planar float). Blocks until done.
    pub fn from_packed(&self, src: &PooledBuffer, dst: &PooledBuffer) -> Result<()> {
        check_len("packed source", src.len(), self.src_bytes())?;
        check_len("planar destination", dst.len(), self.dst_bytes())?;

        let args = KernelArgs::new()
            .buffer("src", src)
            .buffer("dst", dst)
            .buffer("lut", &self.lut)
            .buffer("mats", &self.mats)
            .uint("width", self.width);
        let args = match self.codec {
            Codec::V210 => args.uint("pitch", (self.codec.pitch_bytes(self.width) / 4) as u32),
            Codec::Rgba8 => args.uint("has_alpha", self.has_alpha as u32),
        };
        self.program.run(&args)
    }
}

pub(crate) fn check_len(what: &str, have: u64, need: u64) -> Result<()> {
    if have < need {
        return Err(Error::invalid_argument(format!(
            "{what} holds {have} bytes, frame needs {need}"
        )));
    }
    Ok(())
}
