//! The device boundary and backend selection.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use grain_core::{Error, Result};
use tracing::{info, warn};

use crate::buffer::{Access, DeviceMemory, Residency};
use crate::host::HostDevice;
use crate::memory::{backend_override, format_bytes};
use crate::program::{KernelSource, Program};
use crate::tiling::LineTiling;

/// Hardware limits relevant to allocation and dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Largest single buffer.
    pub max_buffer_bytes: u64,
    /// Largest work-group (for line tiling: work items per line).
    pub max_work_items_per_group: u32,
    /// Memory the device reports (or is budgeted) in total.
    pub memory_bytes: u64,
}

/// A compute device: allocates buffers and compiles kernels.
pub trait Device: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    fn limits(&self) -> &DeviceLimits;

    /// Allocate `len` bytes. Fails with [`Error::OutOfMemory`] when the device
    /// cannot satisfy the request.
    fn create_buffer(
        &self,
        len: u64,
        access: Access,
        residency: Residency,
    ) -> Result<Arc<dyn DeviceMemory>>;

    /// Compile `source` for dispatches of the given geometry.
    fn create_program(&self, source: &'static KernelSource, tiling: LineTiling) -> Result<Program>;
}

/// Backend choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// wgpu when compiled in and an adapter exists, else host.
    #[default]
    Auto,
    Host,
    Wgpu,
}

impl Backend {
    /// `GRAIN_BACKEND` if set and valid, else `Auto`.
    pub fn from_env() -> Self {
        match backend_override() {
            Some(v) => v.parse().unwrap_or_else(|e| {
                warn!("GRAIN_BACKEND: {e}, using auto");
                Backend::Auto
            }),
            None => Backend::Auto,
        }
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Backend::Auto),
            "host" | "cpu" => Ok(Backend::Host),
            "wgpu" | "gpu" => Ok(Backend::Wgpu),
            other => Err(Error::invalid_argument(format!("unknown backend '{other}'"))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Auto => "auto",
            Backend::Host => "host",
            Backend::Wgpu => "wgpu",
        })
    }
}

/// Open a device.
///
/// `Backend::Wgpu` fails with [`Error::NoAdapter`] when the crate was built
/// without the `wgpu` feature or no adapter is present; `Backend::Auto`
/// falls back to the host device in that case.
pub fn open_device(backend: Backend) -> Result<Arc<dyn Device>> {
    let device: Arc<dyn Device> = match backend {
        Backend::Host => Arc::new(HostDevice::new()),
        Backend::Wgpu => open_wgpu()?,
        Backend::Auto => match open_wgpu() {
            Ok(d) => d,
            Err(e) => {
                info!("wgpu unavailable ({e}), using host device");
                Arc::new(HostDevice::new())
            }
        },
    };
    info!(
        backend = device.name(),
        memory = %format_bytes(device.limits().memory_bytes),
        "Opened device"
    );
    Ok(device)
}

#[cfg(feature = "wgpu")]
fn open_wgpu() -> Result<Arc<dyn Device>> {
    Ok(Arc::new(crate::wgpu_device::WgpuDevice::new()?))
}

#[cfg(not(feature = "wgpu"))]
fn open_wgpu() -> Result<Arc<dyn Device>> {
    Err(Error::NoAdapter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!("HOST".parse::<Backend>().unwrap(), Backend::Host);
        assert_eq!("gpu".parse::<Backend>().unwrap(), Backend::Wgpu);
        assert_eq!("auto".parse::<Backend>().unwrap(), Backend::Auto);
        assert!("cuda".parse::<Backend>().is_err());
        assert_eq!(Backend::Wgpu.to_string(), "wgpu");
    }

    #[test]
    fn test_open_host() {
        let dev = open_device(Backend::Host).unwrap();
        assert_eq!(dev.name(), "host");
    }

    #[test]
    fn test_auto_always_opens() {
        assert!(open_device(Backend::Auto).is_ok());
    }
}
