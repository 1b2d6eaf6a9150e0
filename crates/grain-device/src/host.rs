//! Host device: buffers in system memory, kernels on the rayon pool.
//!
//! The device has a fixed byte capacity (see [`memory::host_capacity`]);
//! allocations beyond it fail with [`Error::OutOfMemory`] the same way a GPU
//! allocation would, which lets the pool's flush-and-retry path run
//! everywhere.
//!
//! [`memory::host_capacity`]: crate::memory::host_capacity

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use grain_core::{Error, Result};
use tracing::debug;

use crate::buffer::{Access, DeviceMemory, Residency};
use crate::device::{Device, DeviceLimits};
use crate::memory::{format_bytes, host_capacity};
use crate::program::{Arg, Invocation, KernelSource, Param, ParamKind, Program, ProgramBackend};
use crate::tiling::LineTiling;

static NEXT_MEMORY_ID: AtomicU64 = AtomicU64::new(1);

/// Byte budget shared by a device and its live allocations.
#[derive(Debug)]
struct Budget {
    capacity: u64,
    used: AtomicU64,
}

impl Budget {
    fn try_reserve(&self, bytes: u64) -> bool {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|&n| n <= self.capacity)
            })
            .is_ok()
    }

    fn give_back(&self, bytes: u64) {
        self.used.fetch_sub(bytes, Ordering::AcqRel);
    }
}

/// Host allocation. Storage is `u32` words so every kernel view is aligned.
#[derive(Debug)]
pub struct HostMemory {
    id: u64,
    len: u64,
    access: Access,
    residency: Residency,
    words: RwLock<Vec<u32>>,
    freed: AtomicBool,
    budget: Arc<Budget>,
}

impl HostMemory {
    fn read_words(&self) -> Result<RwLockReadGuard<'_, Vec<u32>>> {
        let guard = self
            .words
            .read()
            .map_err(|_| Error::dispatch("host buffer lock poisoned"))?;
        if self.is_freed() {
            return Err(Error::dispatch("host buffer was freed"));
        }
        Ok(guard)
    }

    fn write_words(&self) -> Result<RwLockWriteGuard<'_, Vec<u32>>> {
        let guard = self
            .words
            .write()
            .map_err(|_| Error::dispatch("host buffer lock poisoned"))?;
        if self.is_freed() {
            return Err(Error::dispatch("host buffer was freed"));
        }
        Ok(guard)
    }

    fn downcast(mem: &dyn DeviceMemory) -> Result<&HostMemory> {
        mem.as_any()
            .downcast_ref::<HostMemory>()
            .ok_or_else(|| Error::dispatch("buffer does not belong to the host device"))
    }
}

impl DeviceMemory for HostMemory {
    fn memory_id(&self) -> u64 {
        self.id
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn access(&self) -> Access {
        self.access
    }

    fn residency(&self) -> Residency {
        self.residency
    }

    fn write_from_host(&self, data: &[u8]) -> Result<()> {
        if data.len() as u64 > self.len {
            return Err(Error::invalid_argument(format!(
                "upload of {} bytes into a {} byte buffer",
                data.len(),
                self.len
            )));
        }
        let mut words = self.write_words()?;
        bytemuck::cast_slice_mut::<u32, u8>(&mut words)[..data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read_to_host(&self) -> Result<Vec<u8>> {
        let words = self.read_words()?;
        Ok(bytemuck::cast_slice::<u32, u8>(&words)[..self.len as usize].to_vec())
    }

    fn free(&self) {
        if self.freed.swap(true, Ordering::AcqRel) {
            return;
        }
        match self.words.write() {
            Ok(mut w) => *w = Vec::new(),
            Err(poisoned) => *poisoned.into_inner() = Vec::new(),
        }
        self.budget.give_back(self.len);
    }

    fn is_freed(&self) -> bool {
        self.freed.load(Ordering::Acquire)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl Drop for HostMemory {
    fn drop(&mut self) {
        if !self.is_freed() {
            self.budget.give_back(self.len);
        }
    }
}

/// Device backed by system memory and rayon.
#[derive(Debug)]
pub struct HostDevice {
    budget: Arc<Budget>,
    limits: DeviceLimits,
}

impl HostDevice {
    /// Device with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(host_capacity())
    }

    /// Device that can hold at most `capacity` bytes at once.
    pub fn with_capacity(capacity: u64) -> Self {
        debug!(capacity = %format_bytes(capacity), threads = rayon::current_num_threads(), "Host device");
        Self {
            budget: Arc::new(Budget {
                capacity,
                used: AtomicU64::new(0),
            }),
            limits: DeviceLimits {
                max_buffer_bytes: capacity,
                max_work_items_per_group: u32::MAX,
                memory_bytes: capacity,
            },
        }
    }

    /// Bytes currently allocated.
    pub fn used(&self) -> u64 {
        self.budget.used.load(Ordering::Acquire)
    }
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for HostDevice {
    fn name(&self) -> &'static str {
        "host"
    }

    fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    fn create_buffer(
        &self,
        len: u64,
        access: Access,
        residency: Residency,
    ) -> Result<Arc<dyn DeviceMemory>> {
        if len == 0 {
            return Err(Error::invalid_argument("zero-length buffer"));
        }
        if !self.budget.try_reserve(len) {
            return Err(Error::OutOfMemory { requested: len });
        }
        let words = usize::try_from(len.div_ceil(4))
            .map_err(|_| Error::OutOfMemory { requested: len })?;
        Ok(Arc::new(HostMemory {
            id: NEXT_MEMORY_ID.fetch_add(1, Ordering::Relaxed),
            len,
            access,
            residency,
            words: RwLock::new(vec![0u32; words]),
            freed: AtomicBool::new(false),
            budget: Arc::clone(&self.budget),
        }))
    }

    fn create_program(&self, source: &'static KernelSource, tiling: LineTiling) -> Result<Program> {
        Ok(Program::new(source, tiling, Box::new(HostProgram)))
    }
}

struct HostProgram;

impl ProgramBackend for HostProgram {
    fn dispatch(
        &self,
        source: &'static KernelSource,
        tiling: LineTiling,
        slots: &[(Param, Arg<'_>)],
    ) -> Result<()> {
        // One read lock per distinct input buffer; outputs never alias (checked at bind).
        let mut read_locks: Vec<(u64, usize, RwLockReadGuard<'_, Vec<u32>>)> = Vec::new();
        let mut read_names: Vec<(&'static str, usize)> = Vec::new();
        let mut write_locks: Vec<(&'static str, usize, RwLockWriteGuard<'_, Vec<u32>>)> =
            Vec::new();
        let mut scalars = Vec::new();

        for (param, arg) in slots {
            match (param.kind, arg) {
                (ParamKind::Input, Arg::Buffer(mem)) => {
                    let host = HostMemory::downcast(*mem)?;
                    let idx = match read_locks.iter().position(|(id, ..)| *id == host.id) {
                        Some(i) => i,
                        None => {
                            read_locks.push((host.id, host.len as usize, host.read_words()?));
                            read_locks.len() - 1
                        }
                    };
                    read_names.push((param.name, idx));
                }
                (ParamKind::Output, Arg::Buffer(mem)) => {
                    let host = HostMemory::downcast(*mem)?;
                    write_locks.push((param.name, host.len as usize, host.write_words()?));
                }
                (_, Arg::Scalar(s)) => scalars.push((param.name, *s)),
                _ => {
                    return Err(Error::dispatch(format!(
                        "kernel '{}': bad binding for '{}'",
                        source.name, param.name
                    )));
                }
            }
        }

        let inputs = read_names
            .iter()
            .map(|(name, idx)| {
                let (_, len, guard) = &read_locks[*idx];
                (*name, &bytemuck::cast_slice::<u32, u8>(guard)[..*len])
            })
            .collect();
        let outputs = write_locks
            .iter_mut()
            .map(|(name, len, guard)| {
                let bytes = &mut bytemuck::cast_slice_mut::<u32, u8>(guard)[..*len];
                (*name, Some(bytes))
            })
            .collect();

        let mut inv = Invocation {
            kernel: source.name,
            tiling,
            inputs,
            outputs,
            scalars,
        };
        (source.host)(&mut inv)
    }
}
