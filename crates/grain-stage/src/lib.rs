//! # grain-stage
//!
//! Frame-at-a-time pipeline stages on top of the codecs and operators.
//!
//! A stage owns a set of pool buffers tagged with its name. It is configured
//! once from the descriptors of its inputs, then takes one [`Frame`] per input
//! and returns one output frame, strictly in arrival order.
//!
//! ```text
//! Uninitialized --configure--> Configuring --> Ready --shutdown--> Draining --> Closed
//!       ^                           |
//!       +-------- on failure -------+
//! ```
//!
//! Operator stages only accept device-resident input. Output stays on the
//! device unless the stage is configured with `send_device: false`, in which
//! case it is read back and the device buffer released immediately.
//!
//! Shutdown waits for the stage's reserved buffers to come back from
//! downstream, bounded by a timeout, then frees everything the stage owns.

mod base;
mod config;
mod control;
mod frame;
mod ops;
mod pack;
mod state;
mod unpack;

pub use config::StageConfig;
pub use control::LiveControl;
pub use frame::{Frame, Payload};
pub use ops::{BlurStage, MixStage, MonochromeStage, StampStage};
pub use pack::PackStage;
pub use state::StageState;
pub use unpack::UnpackStage;

use std::time::Duration;

use grain_core::{FrameDescriptor, Result};

/// One node of the frame pipeline.
pub trait Stage: Send {
    /// Stage name, also the owner tag of its buffers.
    fn name(&self) -> &str;

    fn state(&self) -> StageState;

    /// Frames consumed per output frame.
    fn num_inputs(&self) -> usize;

    /// Fix the input geometry and build the kernels. Returns the descriptor
    /// of the frames this stage produces. Only valid once.
    fn configure(&mut self, inputs: &[FrameDescriptor]) -> Result<FrameDescriptor>;

    /// Process one frame per input. Blocks until the output is complete.
    fn process(&mut self, inputs: Vec<Frame>) -> Result<Frame>;

    /// Drain and release every buffer this stage owns. Idempotent.
    fn shutdown(&mut self, timeout: Duration);
}
