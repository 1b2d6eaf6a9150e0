use std::time::Duration;

use grain_codec::{Codec, Direction, Writer};
use grain_core::{Error, FrameDescriptor, Packing, Result};
use grain_device::BufferPool;

use crate::base::{StageCore, forward_to_core};
use crate::{Frame, Stage, StageConfig};

/// Planar float frames to a packed delivery format.
///
/// Output colorimetry is the configured one, or that of the input.
#[derive(Debug)]
pub struct PackStage {
    packing: Packing,
    writer: Option<Writer>,
    core: StageCore,
}

impl PackStage {
    pub fn new(pool: &BufferPool, packing: Packing, config: StageConfig) -> Self {
        Self {
            packing,
            writer: None,
            core: StageCore::new("Pack", 1, pool, config),
        }
    }

    pub fn packing(&self) -> Packing {
        self.packing
    }
}

impl Stage for PackStage {
    forward_to_core!();

    fn configure(&mut self, inputs: &[FrameDescriptor]) -> Result<FrameDescriptor> {
        let packing = self.packing;
        let slot = &mut self.writer;
        self.core.configure(inputs, |pool, owner, config, inputs| {
            let src = &inputs[0];
            let codec = Codec::for_packing(packing)?;
            let dest = config.colorimetry.unwrap_or(src.colorimetry);
            *slot = Some(codec.writer(pool, src, dest, owner)?);
            Ok(codec.dest_tags(Direction::Write, src, dest))
        })
    }

    fn process(&mut self, inputs: Vec<Frame>) -> Result<Frame> {
        self.core.accept(&inputs)?;
        let writer = self
            .writer
            .as_ref()
            .ok_or_else(|| Error::dispatch("pack stage has no writer"))?;
        let src = self.core.device_input(&inputs[0], writer.src_bytes())?;

        let dst = self.core.reserve(writer.dst_bytes())?;
        writer.to_packed(src, &dst)?;
        drop(inputs);
        self.core.deliver(dst)
    }

    fn shutdown(&mut self, timeout: Duration) {
        self.writer = None;
        self.core.shutdown(timeout);
    }
}
