//! # grain-core
//!
//! Core types shared by every grain-rs crate:
//!
//! - [`Error`] / [`Result`] - the error taxonomy for pool, dispatch, codec and stage failures
//! - [`Packing`] - the closed set of frame encodings the pipeline understands
//! - [`Colorimetry`] - named colorimetry tags carried on frames
//! - [`FrameDescriptor`] - per-flow frame metadata exchanged at stage boundaries
//!
//! ## Crate Structure
//!
//! ```text
//! grain-core (this crate)
//!    ^
//!    +-- grain-color  (gamma LUTs, gamut matrices)
//!    +-- grain-device (buffer pool, kernel programs)
//!    +-- grain-codec  (v210 / RGBA8 readers and writers)
//!    +-- grain-ops    (monochrome, mix, stamp, blur)
//!    +-- grain-stage  (stage state machine, orchestration)
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod colorimetry;
pub mod error;
pub mod format;

pub use colorimetry::Colorimetry;
pub use error::{Error, Result};
pub use format::{FrameDescriptor, Packing, PLANAR_BYTES_PER_PIXEL};
