//! Operator stages: planar float in, planar float out, device input only.

use std::time::Duration;

use grain_core::{Error, FrameDescriptor, Result};
use grain_device::BufferPool;
use grain_ops::{Blur, Mix, Monochrome, Stamp};
use tracing::trace;

use crate::base::{StageCore, forward_to_core};
use crate::{Frame, LiveControl, Stage, StageConfig};

fn missing(stage: &str) -> Error {
    Error::dispatch(format!("{stage} stage has no operator"))
}

// ============================================================================
// Monochrome
// ============================================================================

/// Luminance blend, pressure from a [`LiveControl`].
#[derive(Debug)]
pub struct MonochromeStage {
    op: Option<Monochrome>,
    control: LiveControl,
    core: StageCore,
}

impl MonochromeStage {
    pub fn new(pool: &BufferPool, config: StageConfig) -> Self {
        Self {
            op: None,
            control: LiveControl::new(config.pressure),
            core: StageCore::new("Monochrome", 1, pool, config),
        }
    }

    /// Handle for changing the pressure while frames flow.
    pub fn control(&self) -> LiveControl {
        self.control.clone()
    }
}

impl Stage for MonochromeStage {
    forward_to_core!();

    fn configure(&mut self, inputs: &[FrameDescriptor]) -> Result<FrameDescriptor> {
        let slot = &mut self.op;
        self.core.configure(inputs, |pool, owner, _, inputs| {
            *slot = Some(Monochrome::new(pool, &inputs[0], owner)?);
            Ok(inputs[0])
        })
    }

    fn process(&mut self, inputs: Vec<Frame>) -> Result<Frame> {
        self.core.accept(&inputs)?;
        let op = self.op.as_ref().ok_or_else(|| missing("monochrome"))?;
        let pressure = self.control.get();
        trace!(stage = %self.core.name, pressure, "Frame");

        let src = inputs[0].device_buffer()?;
        let dst = self.core.reserve_planar()?;
        op.process(src, &dst, pressure)?;
        drop(inputs);
        self.core.deliver(dst)
    }

    fn shutdown(&mut self, timeout: Duration) {
        self.op = None;
        self.core.shutdown(timeout);
    }
}

// ============================================================================
// Mix
// ============================================================================

/// Cross-dissolve of two flows, pressure from a [`LiveControl`]. Pressure 1
/// shows only the first input.
#[derive(Debug)]
pub struct MixStage {
    op: Option<Mix>,
    control: LiveControl,
    core: StageCore,
}

impl MixStage {
    pub fn new(pool: &BufferPool, config: StageConfig) -> Self {
        Self {
            op: None,
            control: LiveControl::new(config.pressure),
            core: StageCore::new("Mix", 2, pool, config),
        }
    }

    pub fn control(&self) -> LiveControl {
        self.control.clone()
    }
}

impl Stage for MixStage {
    forward_to_core!();

    fn configure(&mut self, inputs: &[FrameDescriptor]) -> Result<FrameDescriptor> {
        let slot = &mut self.op;
        self.core.configure(inputs, |pool, _, _, inputs| {
            let (a, b) = (&inputs[0], &inputs[1]);
            *slot = Some(Mix::new(pool, a, b)?);
            Ok(a.with_alpha(a.has_alpha || b.has_alpha))
        })
    }

    fn process(&mut self, inputs: Vec<Frame>) -> Result<Frame> {
        self.core.accept(&inputs)?;
        let op = self.op.as_ref().ok_or_else(|| missing("mix"))?;
        let pressure = self.control.get();
        trace!(stage = %self.core.name, pressure, "Frame");

        let a = inputs[0].device_buffer()?;
        let b = inputs[1].device_buffer()?;
        let dst = self.core.reserve_planar()?;
        op.process(a, b, &dst, pressure)?;
        drop(inputs);
        self.core.deliver(dst)
    }

    fn shutdown(&mut self, timeout: Duration) {
        self.op = None;
        self.core.shutdown(timeout);
    }
}

// ============================================================================
// Stamp
// ============================================================================

/// Alpha composite of two flows. The output is opaque.
#[derive(Debug)]
pub struct StampStage {
    op: Option<Stamp>,
    core: StageCore,
}

impl StampStage {
    pub fn new(pool: &BufferPool, config: StageConfig) -> Self {
        Self {
            op: None,
            core: StageCore::new("Stamp", 2, pool, config),
        }
    }
}

impl Stage for StampStage {
    forward_to_core!();

    fn configure(&mut self, inputs: &[FrameDescriptor]) -> Result<FrameDescriptor> {
        let slot = &mut self.op;
        self.core.configure(inputs, |pool, _, config, inputs| {
            let (a, b) = (&inputs[0], &inputs[1]);
            *slot = Some(Stamp::new(pool, a, b, config.premultiplied)?);
            Ok(a.with_alpha(false))
        })
    }

    fn process(&mut self, inputs: Vec<Frame>) -> Result<Frame> {
        self.core.accept(&inputs)?;
        let op = self.op.as_ref().ok_or_else(|| missing("stamp"))?;

        let a = inputs[0].device_buffer()?;
        let b = inputs[1].device_buffer()?;
        let dst = self.core.reserve_planar()?;
        op.process(a, b, &dst)?;
        drop(inputs);
        self.core.deliver(dst)
    }

    fn shutdown(&mut self, timeout: Duration) {
        self.op = None;
        self.core.shutdown(timeout);
    }
}

// ============================================================================
// Blur
// ============================================================================

/// Gaussian blur with the configured depth.
#[derive(Debug)]
pub struct BlurStage {
    op: Option<Blur>,
    core: StageCore,
}

impl BlurStage {
    pub fn new(pool: &BufferPool, config: StageConfig) -> Self {
        Self {
            op: None,
            core: StageCore::new("Blur", 1, pool, config),
        }
    }
}

impl Stage for BlurStage {
    forward_to_core!();

    fn configure(&mut self, inputs: &[FrameDescriptor]) -> Result<FrameDescriptor> {
        let slot = &mut self.op;
        self.core.configure(inputs, |pool, owner, config, inputs| {
            *slot = Some(Blur::new(pool, &inputs[0], config.blur_depth, owner)?);
            Ok(inputs[0])
        })
    }

    fn process(&mut self, inputs: Vec<Frame>) -> Result<Frame> {
        self.core.accept(&inputs)?;
        let op = self.op.as_ref().ok_or_else(|| missing("blur"))?;

        let src = inputs[0].device_buffer()?;
        let dst = self.core.reserve_planar()?;
        op.process(src, &dst)?;
        drop(inputs);
        self.core.deliver(dst)
    }

    fn shutdown(&mut self, timeout: Duration) {
        self.op = None;
        self.core.shutdown(timeout);
    }
}
