use grain_core::{Error, FrameDescriptor, Result};
use grain_device::PooledBuffer;

/// Where a frame's bytes live.
#[derive(Debug)]
pub enum Payload {
    /// Host memory, e.g. a packed frame read from a file.
    Host(Vec<u8>),
    /// A pool buffer reserved by the producing stage. Dropping the frame
    /// releases it back to that stage.
    Device(PooledBuffer),
}

/// One frame passed between stages.
#[derive(Debug)]
pub struct Frame {
    pub desc: FrameDescriptor,
    pub payload: Payload,
}

impl Frame {
    pub fn host(desc: FrameDescriptor, bytes: Vec<u8>) -> Self {
        Self { desc, payload: Payload::Host(bytes) }
    }

    pub fn device(desc: FrameDescriptor, buf: PooledBuffer) -> Self {
        Self { desc, payload: Payload::Device(buf) }
    }

    pub fn is_device(&self) -> bool {
        matches!(self.payload, Payload::Device(_))
    }

    /// Byte length of the payload.
    pub fn len(&self) -> u64 {
        match &self.payload {
            Payload::Host(b) => b.len() as u64,
            Payload::Device(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The device buffer, or `InvalidSourceBuffer` for a host frame.
    pub fn device_buffer(&self) -> Result<&PooledBuffer> {
        match &self.payload {
            Payload::Device(b) => Ok(b),
            Payload::Host(_) => Err(Error::invalid_source(format!(
                "{}x{} {} frame is in host memory, not a device buffer",
                self.desc.width, self.desc.height, self.desc.packing
            ))),
        }
    }

    /// Move the payload to host memory. A device buffer is read back and
    /// released.
    pub fn into_host(self) -> Result<Vec<u8>> {
        match self.payload {
            Payload::Host(b) => Ok(b),
            Payload::Device(buf) => buf.read_to_host(),
        }
    }
}
