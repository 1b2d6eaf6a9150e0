//! Device memory handles.

use grain_core::Result;

/// How kernels may touch a buffer. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Kernels only read it (tables, matrices).
    ReadOnly,
    /// Kernels only write it.
    WriteOnly,
    /// Kernels read and write it (frame buffers passed between stages).
    ReadWrite,
}

impl Access {
    /// May be bound to an input parameter.
    #[inline]
    pub fn readable(self) -> bool {
        !matches!(self, Access::WriteOnly)
    }

    /// May be bound to an output parameter.
    #[inline]
    pub fn writable(self) -> bool {
        !matches!(self, Access::ReadOnly)
    }
}

/// Where the storage lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Residency {
    /// Coarse-grained device memory. Host access goes through explicit
    /// uploads and readbacks.
    Device,
    /// Staging memory the host maps directly.
    Staging,
}

impl Residency {
    /// Parse the flow-level tag (`coarse` / `none`).
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "coarse" => Some(Residency::Device),
            "none" => Some(Residency::Staging),
            _ => None,
        }
    }

    /// Flow-level tag.
    pub fn tag(self) -> &'static str {
        match self {
            Residency::Device => "coarse",
            Residency::Staging => "none",
        }
    }
}

/// A raw allocation on some [`Device`](crate::Device).
///
/// Lengths are in bytes. Host transfers are blocking.
pub trait DeviceMemory: Send + Sync {
    /// Allocation-unique id, used to detect aliasing between kernel arguments.
    fn memory_id(&self) -> u64;

    /// Length in bytes.
    fn len(&self) -> u64;

    /// Kernel access mode.
    fn access(&self) -> Access;

    /// Residency.
    fn residency(&self) -> Residency;

    /// Copy `data` to the start of the buffer.
    fn write_from_host(&self, data: &[u8]) -> Result<()>;

    /// Copy the whole buffer back to host memory.
    fn read_to_host(&self) -> Result<Vec<u8>>;

    /// Return the storage to the device. Further use fails.
    fn free(&self);

    /// `true` once [`free`](Self::free) ran.
    fn is_freed(&self) -> bool;

    /// For backend downcasting.
    fn as_any(&self) -> &dyn std::any::Any;
}
