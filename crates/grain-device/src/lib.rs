//! Device buffers, the owner-tagged buffer pool and line-tiled kernel dispatch.
//!
//! # Architecture
//!
//! ```text
//! BufferPool (owner-tagged reuse, flush-and-retry on OOM)
//!     └── Device trait
//!             ├── HostDevice (rayon, byte-capacity budget)
//!             └── WgpuDevice (compute shaders, feature "wgpu")
//!
//! Program (compiled KernelSource + LineTiling)
//!     └── run(KernelArgs)   // arguments bound by declared name
//! ```
//!
//! # Example
//!
//! ```ignore
//! use grain_device::{open_device, Backend, BufferPool, Access, Residency};
//!
//! let pool = BufferPool::new(open_device(Backend::Auto)?);
//! let buf = pool.create_buffer(1920 * 1080 * 16, Access::ReadWrite, Residency::Device, "Mix-1")?;
//! // ... dispatch into it, hand it downstream ...
//! pool.release(buf);
//! pool.release_buffers("Mix-1");
//! ```

pub mod buffer;
pub mod device;
pub mod host;
pub mod memory;
pub mod monitor;
pub mod pool;
pub mod program;
pub mod tiling;

#[cfg(feature = "wgpu")]
mod wgpu_device;

pub use buffer::{Access, DeviceMemory, Residency};
pub use device::{Backend, Device, DeviceLimits, open_device};
pub use host::{HostDevice, HostMemory};
pub use monitor::PoolMonitor;
pub use pool::{BufferId, BufferInfo, BufferPool, PoolStats, PooledBuffer};
pub use program::{Invocation, KernelArgs, KernelSource, Param, ParamKind, Program, Scalar};
pub use tiling::LineTiling;

#[cfg(feature = "wgpu")]
pub use wgpu_device::{WgpuDevice, WgpuMemory};

pub use grain_core::{Error, Result};
