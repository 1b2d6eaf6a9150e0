//! Lifecycle and buffer plumbing shared by every stage.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use grain_core::{Error, FrameDescriptor, Result};
use grain_device::{Access, BufferPool, PooledBuffer, Residency};
use tracing::{debug, warn};

use crate::{Frame, StageConfig, StageState};

static NEXT_STAGE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub(crate) struct StageCore {
    pub(crate) name: String,
    pub(crate) pool: BufferPool,
    pub(crate) config: StageConfig,
    num_inputs: usize,
    state: StageState,
    inputs: Vec<FrameDescriptor>,
    output: Option<FrameDescriptor>,
}

impl StageCore {
    /// Stage named `<kind>-<n>`, unique within the process.
    pub(crate) fn new(
        kind: &str,
        num_inputs: usize,
        pool: &BufferPool,
        config: StageConfig,
    ) -> Self {
        let id = NEXT_STAGE_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            name: format!("{kind}-{id}"),
            pool: pool.clone(),
            config,
            num_inputs,
            state: StageState::Uninitialized,
            inputs: Vec::new(),
            output: None,
        }
    }

    pub(crate) fn state(&self) -> StageState {
        self.state
    }

    pub(crate) fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub(crate) fn output(&self) -> Result<FrameDescriptor> {
        self.output.ok_or_else(|| self.invalid_state("produce output"))
    }

    fn invalid_state(&self, action: &'static str) -> Error {
        Error::InvalidState {
            stage: self.name.clone(),
            action,
            state: self.state.name(),
        }
    }

    fn transition(&mut self, next: StageState) {
        debug_assert!(self.state.can_become(next), "{} -> {}", self.state, next);
        debug!(stage = %self.name, from = %self.state, to = %next, "State");
        self.state = next;
    }

    /// Run `build` with the stage in `Configuring`. On success the stage is
    /// `Ready` with the returned output descriptor; on failure anything
    /// `build` allocated is freed and the stage is back to `Uninitialized`.
    pub(crate) fn configure<F>(
        &mut self,
        inputs: &[FrameDescriptor],
        build: F,
    ) -> Result<FrameDescriptor>
    where
        F: FnOnce(&BufferPool, &str, &StageConfig, &[FrameDescriptor]) -> Result<FrameDescriptor>,
    {
        if self.state != StageState::Uninitialized {
            return Err(self.invalid_state("configure"));
        }
        if inputs.len() != self.num_inputs {
            return Err(Error::invalid_argument(format!(
                "stage '{}' takes {} input(s), got {}",
                self.name,
                self.num_inputs,
                inputs.len()
            )));
        }
        for desc in inputs {
            desc.validate()?;
        }

        self.transition(StageState::Configuring);
        match build(&self.pool, &self.name, &self.config, inputs) {
            Ok(out) => {
                self.inputs = inputs.to_vec();
                self.output = Some(out);
                self.transition(StageState::Ready);
                Ok(out)
            }
            Err(e) => {
                self.pool.release_buffers(&self.name);
                self.transition(StageState::Uninitialized);
                Err(e)
            }
        }
    }

    /// Check a frame set against the configured inputs.
    pub(crate) fn accept(&self, frames: &[Frame]) -> Result<()> {
        if self.state != StageState::Ready {
            return Err(self.invalid_state("process"));
        }
        if frames.len() != self.num_inputs {
            return Err(Error::invalid_argument(format!(
                "stage '{}' takes {} frame(s) per output, got {}",
                self.name,
                self.num_inputs,
                frames.len()
            )));
        }
        for (i, (frame, want)) in frames.iter().zip(&self.inputs).enumerate() {
            if frame.desc.packing != want.packing || !frame.desc.same_geometry(want) {
                return Err(Error::invalid_source(format!(
                    "stage '{}' input {i}: got {}x{} {}, configured for {}x{} {}",
                    self.name,
                    frame.desc.width,
                    frame.desc.height,
                    frame.desc.packing,
                    want.width,
                    want.height,
                    want.packing
                )));
            }
        }
        Ok(())
    }

    /// A device input holding exactly `len` bytes.
    pub(crate) fn device_input<'f>(&self, frame: &'f Frame, len: u64) -> Result<&'f PooledBuffer> {
        let buf = frame.device_buffer()?;
        if buf.len() != len {
            return Err(Error::invalid_source(format!(
                "stage '{}': input buffer holds {} bytes, frame is {}",
                self.name,
                buf.len(),
                len
            )));
        }
        Ok(buf)
    }

    /// Reserve a destination buffer for one frame.
    pub(crate) fn reserve(&self, len: u64) -> Result<PooledBuffer> {
        self.pool.create_buffer(len, Access::ReadWrite, Residency::Device, &self.name)
    }

    /// Reserve a destination for one planar output frame.
    pub(crate) fn reserve_planar(&self) -> Result<PooledBuffer> {
        self.reserve(self.output()?.planar_bytes())
    }

    /// Reserve a staging buffer holding a copy of host bytes.
    pub(crate) fn stage_in(&self, bytes: &[u8]) -> Result<PooledBuffer> {
        let buf = self.pool.create_buffer(
            bytes.len() as u64,
            Access::ReadOnly,
            Residency::Staging,
            &self.name,
        )?;
        buf.write_from_host(bytes)?;
        Ok(buf)
    }

    /// Hand a finished destination downstream, reading it back first if the
    /// stage delivers to host memory.
    pub(crate) fn deliver(&self, dst: PooledBuffer) -> Result<Frame> {
        let desc = self.output()?;
        if self.config.send_device {
            return Ok(Frame::device(desc, dst));
        }
        let bytes = dst.read_to_host()?;
        drop(dst);
        Ok(Frame::host(desc, bytes))
    }

    /// Drain then free every buffer of this stage. The caller drops its own
    /// tables first so that only buffers held downstream are waited for.
    pub(crate) fn shutdown(&mut self, timeout: Duration) {
        if matches!(self.state, StageState::Draining | StageState::Closed) {
            return;
        }
        self.transition(StageState::Draining);
        if !self.pool.wait_owner_idle(&self.name, timeout) {
            warn!(
                stage = %self.name,
                timeout_ms = timeout.as_millis() as u64,
                "Buffers still in use after drain timeout, freeing them"
            );
        }
        let freed = self.pool.release_buffers(&self.name);
        debug!(stage = %self.name, freed, "Shut down");
        self.transition(StageState::Closed);
    }
}

impl Drop for StageCore {
    fn drop(&mut self) {
        if self.state != StageState::Closed {
            self.pool.release_buffers(&self.name);
        }
    }
}

/// `name`, `state` and `num_inputs` forwarded to a `core: StageCore` field.
macro_rules! forward_to_core {
    () => {
        fn name(&self) -> &str {
            &self.core.name
        }

        fn state(&self) -> $crate::StageState {
            self.core.state()
        }

        fn num_inputs(&self) -> usize {
            self.core.num_inputs()
        }
    };
}

pub(crate) use forward_to_core;
