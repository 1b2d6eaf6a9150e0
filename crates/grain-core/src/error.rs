//! Error types for grain-rs operations.
//!
//! A single [`Error`] enum covers every failure mode of the frame pipeline:
//!
//! - Argument/contract errors: [`InvalidArgument`](Error::InvalidArgument),
//!   [`UnsupportedFormat`](Error::UnsupportedFormat),
//!   [`InvalidSourceBuffer`](Error::InvalidSourceBuffer),
//!   [`MissingAlpha`](Error::MissingAlpha)
//! - Device errors: [`OutOfMemory`](Error::OutOfMemory),
//!   [`DeviceDispatchFailure`](Error::DeviceDispatchFailure) and the
//!   device bring-up variants
//! - Stage lifecycle errors: [`InvalidState`](Error::InvalidState)
//!
//! Only `OutOfMemory` is ever retried, and only once by the buffer pool after
//! flushing unreserved buffers. Everything else surfaces immediately.

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the buffer pool, kernel dispatch, codecs, operators and stages.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller violated an API contract (missing owner, bad geometry,
    /// unbound kernel parameter). No device call has been attempted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The packing tag has no codec. Raised before any device allocation.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// An operator input is not a usable device buffer.
    #[error("invalid source buffer: {0}")]
    InvalidSourceBuffer(String),

    /// Alpha compositing was requested but neither input carries alpha.
    #[error("no alpha channel found on source video flows")]
    MissingAlpha,

    /// Device allocation failed, including after the pool's flush-and-retry.
    #[error("device out of memory allocating {requested} bytes")]
    OutOfMemory {
        /// Bytes requested by the failing allocation
        requested: u64,
    },

    /// Any other error reported by the device while executing work.
    #[error("device dispatch failed: {0}")]
    DeviceDispatchFailure(String),

    /// A stage was driven in a state that does not allow the request.
    #[error("stage '{stage}' cannot {action} while {state}")]
    InvalidState {
        /// Stage name
        stage: String,
        /// Requested action
        action: &'static str,
        /// Current state name
        state: &'static str,
    },

    /// No compute adapter could be found.
    #[error("no suitable GPU adapter found")]
    NoAdapter,

    /// Opening the compute device failed.
    #[error("failed to create device: {0}")]
    DeviceCreation(String),

    /// Kernel source failed to compile into a program.
    #[error("failed to compile kernel '{name}': {reason}")]
    ShaderCompilation {
        /// Kernel name
        name: String,
        /// Compiler message
        reason: String,
    },
}

impl Error {
    /// Shorthand for [`Error::InvalidArgument`].
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Shorthand for [`Error::InvalidSourceBuffer`].
    pub fn invalid_source(msg: impl Into<String>) -> Self {
        Self::InvalidSourceBuffer(msg.into())
    }

    /// Shorthand for [`Error::DeviceDispatchFailure`].
    pub fn dispatch(msg: impl Into<String>) -> Self {
        Self::DeviceDispatchFailure(msg.into())
    }

    /// True for the out-of-memory condition the pool recovers from.
    #[inline]
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }
}
