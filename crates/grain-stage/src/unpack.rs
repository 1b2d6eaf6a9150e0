use std::time::Duration;

use grain_codec::{Codec, Direction, Reader};
use grain_core::{Error, FrameDescriptor, Result};
use grain_device::BufferPool;

use crate::base::{StageCore, forward_to_core};
use crate::{Frame, Payload, Stage, StageConfig};

/// Packed frames (host or device) to planar float on the device.
///
/// Output colorimetry is the configured one, BT.709 by default.
#[derive(Debug)]
pub struct UnpackStage {
    reader: Option<Reader>,
    core: StageCore,
}

impl UnpackStage {
    pub fn new(pool: &BufferPool, config: StageConfig) -> Self {
        Self {
            reader: None,
            core: StageCore::new("Unpack", 1, pool, config),
        }
    }
}

impl Stage for UnpackStage {
    forward_to_core!();

    fn configure(&mut self, inputs: &[FrameDescriptor]) -> Result<FrameDescriptor> {
        let slot = &mut self.reader;
        self.core.configure(inputs, |pool, owner, config, inputs| {
            let src = &inputs[0];
            let codec = Codec::for_packing(src.packing)?;
            let working = config.colorimetry.unwrap_or_default();
            *slot = Some(codec.reader(pool, src, working, owner)?);
            Ok(codec.dest_tags(Direction::Read, src, working))
        })
    }

    fn process(&mut self, mut inputs: Vec<Frame>) -> Result<Frame> {
        self.core.accept(&inputs)?;
        let reader = self
            .reader
            .as_ref()
            .ok_or_else(|| Error::dispatch("unpack stage has no reader"))?;
        let frame = inputs.remove(0);

        if frame.len() != reader.src_bytes() {
            return Err(Error::invalid_source(format!(
                "{} frame holds {} bytes, expected {}",
                reader.codec().name(),
                frame.len(),
                reader.src_bytes()
            )));
        }
        let staged = match &frame.payload {
            Payload::Host(bytes) => Some(self.core.stage_in(bytes)?),
            Payload::Device(_) => None,
        };
        let src = match &staged {
            Some(buf) => buf,
            None => frame.device_buffer()?,
        };

        let dst = self.core.reserve(reader.dst_bytes())?;
        reader.from_packed(src, &dst)?;
        drop(staged);
        drop(frame);
        self.core.deliver(dst)
    }

    fn shutdown(&mut self, timeout: Duration) {
        self.reader = None;
        self.core.shutdown(timeout);
    }
}
