//! Owner-tagged buffer pool.
//!
//! Every buffer belongs to the stage that asked for it. A free buffer is only
//! handed out again to the same owner at the same length, so stages can never
//! see each other's memory. Handles are move-only [`PooledBuffer`]s that go
//! back to the pool when dropped.
//!
//! When the device runs out of memory, all free buffers (of every owner) are
//! flushed and the allocation is retried once.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use grain_core::{Error, Result};
use tracing::{debug, trace, warn};

use crate::buffer::{Access, DeviceMemory, Residency};
use crate::device::Device;
use crate::memory::format_bytes;

/// Identity of one checkout of a pool buffer.
///
/// `index` names the allocation and is never reused; `generation` counts
/// checkouts, so a handle from an earlier checkout cannot release a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId {
    pub index: u64,
    pub generation: u32,
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

struct Entry {
    index: u64,
    generation: u32,
    owner: Arc<str>,
    memory: Arc<dyn DeviceMemory>,
    reserved: bool,
}

impl Entry {
    fn id(&self) -> BufferId {
        BufferId {
            index: self.index,
            generation: self.generation,
        }
    }

    /// Reuse key is (owner, length) plus access and residency, so an uploaded
    /// read-only table never comes back as a writable destination.
    fn matches(&self, len: u64, access: Access, residency: Residency, owner: &str) -> bool {
        !self.reserved
            && &*self.owner == owner
            && self.memory.len() == len
            && self.memory.access() == access
            && self.memory.residency() == residency
    }
}

#[derive(Default)]
struct State {
    entries: Vec<Entry>,
    next_index: u64,
}

impl State {
    /// Free and forget every unreserved buffer.
    fn flush(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| {
            if e.reserved {
                true
            } else {
                e.memory.free();
                false
            }
        });
        before - self.entries.len()
    }
}

struct Inner {
    device: Arc<dyn Device>,
    state: Mutex<State>,
    idle: Condvar,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, id: BufferId) {
        let mut state = self.lock();
        if let Some(e) = state.entries.iter_mut().find(|e| e.index == id.index) {
            if e.generation == id.generation && e.reserved {
                e.reserved = false;
                trace!(buffer = %id, owner = %e.owner, "Released");
            }
        }
        drop(state);
        self.idle.notify_all();
    }
}

/// Shared pool of device buffers. Cloning shares the pool.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<Inner>,
}

impl BufferPool {
    pub fn new(device: Arc<dyn Device>) -> Self {
        Self {
            inner: Arc::new(Inner {
                device,
                state: Mutex::new(State::default()),
                idle: Condvar::new(),
            }),
        }
    }

    /// Device the pool allocates from.
    pub fn device(&self) -> &Arc<dyn Device> {
        &self.inner.device
    }

    /// Check out a buffer of exactly `len` bytes for `owner`.
    ///
    /// Reuses a free buffer with the same owner, length, access and residency
    /// if there is one. Otherwise allocates; on out-of-memory every free
    /// buffer is flushed and the allocation retried once, and a second
    /// failure is returned to the caller.
    pub fn create_buffer(
        &self,
        len: u64,
        access: Access,
        residency: Residency,
        owner: &str,
    ) -> Result<PooledBuffer> {
        if owner.is_empty() {
            return Err(Error::invalid_argument("buffer owner must not be empty"));
        }
        if len == 0 {
            return Err(Error::invalid_argument(format!(
                "zero-length buffer requested by '{owner}'"
            )));
        }

        let mut state = self.inner.lock();

        if let Some(e) = state
            .entries
            .iter_mut()
            .find(|e| e.matches(len, access, residency, owner))
        {
            e.reserved = true;
            e.generation = e.generation.wrapping_add(1);
            trace!(buffer = %e.id(), owner, len, "Reused");
            return Ok(self.checkout(e));
        }

        let memory = match self.inner.device.create_buffer(len, access, residency) {
            Ok(m) => m,
            Err(e) if e.is_out_of_memory() => {
                let flushed = state.flush();
                warn!(
                    owner,
                    requested = %format_bytes(len),
                    flushed,
                    "Device out of memory, flushed free buffers"
                );
                self.inner.device.create_buffer(len, access, residency)?
            }
            Err(e) => return Err(e),
        };

        let index = state.next_index;
        state.next_index += 1;
        state.entries.push(Entry {
            index,
            generation: 0,
            owner: Arc::from(owner),
            memory,
            reserved: true,
        });
        let e = state.entries.last().ok_or_else(|| Error::dispatch("pool entry vanished"))?;
        debug!(buffer = %e.id(), owner, size = %format_bytes(len), ?access, "Allocated");
        Ok(self.checkout(e))
    }

    /// Check out a read-only buffer for `owner` holding a copy of `data`.
    pub fn upload(&self, data: &[u8], residency: Residency, owner: &str) -> Result<PooledBuffer> {
        let buf = self.create_buffer(data.len() as u64, Access::ReadOnly, residency, owner)?;
        buf.write_from_host(data)?;
        Ok(buf)
    }

    fn checkout(&self, e: &Entry) -> PooledBuffer {
        PooledBuffer {
            id: e.id(),
            owner: Arc::clone(&e.owner),
            memory: Arc::clone(&e.memory),
            pool: Arc::downgrade(&self.inner),
        }
    }

    /// Return a buffer to the pool. Same as dropping it.
    pub fn release(&self, buf: PooledBuffer) {
        if !Weak::ptr_eq(&buf.pool, &Arc::downgrade(&self.inner)) {
            warn!(buffer = %buf.id, "Buffer belongs to another pool");
        }
        drop(buf);
    }

    /// Free every buffer of `owner`, reserved or not. Idempotent.
    ///
    /// Handles still alive afterwards point at freed memory: using them fails
    /// with `DeviceDispatchFailure`, dropping them is a no-op.
    pub fn release_buffers(&self, owner: &str) -> usize {
        let mut state = self.inner.lock();
        let mut freed = 0;
        let mut forced = 0;
        state.entries.retain(|e| {
            if &*e.owner != owner {
                return true;
            }
            if e.reserved {
                forced += 1;
            }
            e.memory.free();
            freed += 1;
            false
        });
        drop(state);
        self.inner.idle.notify_all();

        if forced > 0 {
            warn!(owner, forced, "Freed buffers that were still in use");
        }
        if freed > 0 {
            debug!(owner, freed, "Released owner buffers");
        }
        freed
    }

    /// Free all unreserved buffers. Returns how many were freed.
    pub fn flush(&self) -> usize {
        let n = self.inner.lock().flush();
        if n > 0 {
            warn!(flushed = n, "Flushed free buffers");
        }
        n
    }

    /// Block until `owner` holds no reserved buffers or `timeout` passes.
    /// Returns `true` if the owner went idle.
    pub fn wait_owner_idle(&self, owner: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.lock();
        loop {
            if !state.entries.iter().any(|e| e.reserved && &*e.owner == owner) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = match self.inner.idle.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// One line per buffer, in allocation order.
    pub fn snapshot(&self) -> Vec<BufferInfo> {
        self.inner
            .lock()
            .entries
            .iter()
            .map(|e| BufferInfo {
                id: e.id(),
                owner: e.owner.to_string(),
                len: e.memory.len(),
                access: e.memory.access(),
                residency: e.memory.residency(),
                reserved: e.reserved,
            })
            .collect()
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.lock();
        let mut stats = PoolStats::default();
        for e in &state.entries {
            let len = e.memory.len();
            stats.buffers += 1;
            stats.bytes += len;
            *stats.per_owner.entry(e.owner.to_string()).or_default() += len;
            if e.reserved {
                stats.reserved += 1;
                stats.reserved_bytes += len;
            }
        }
        stats
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("device", &self.inner.device.name())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Pool totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub buffers: usize,
    pub reserved: usize,
    pub bytes: u64,
    pub reserved_bytes: u64,
    /// Bytes held per owner, reserved or free.
    pub per_owner: BTreeMap<String, u64>,
}

/// Description of one pool buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferInfo {
    pub id: BufferId,
    pub owner: String,
    pub len: u64,
    pub access: Access,
    pub residency: Residency,
    pub reserved: bool,
}

impl fmt::Display for BufferInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {:?} {} {}",
            self.id,
            self.owner,
            format_bytes(self.len),
            self.access,
            self.residency.tag(),
            if self.reserved { "reserved" } else { "free" }
        )
    }
}

/// Checked-out pool buffer. Goes back to the pool on drop.
pub struct PooledBuffer {
    id: BufferId,
    owner: Arc<str>,
    memory: Arc<dyn DeviceMemory>,
    pool: Weak<Inner>,
}

impl PooledBuffer {
    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn len(&self) -> u64 {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.len() == 0
    }

    pub fn access(&self) -> Access {
        self.memory.access()
    }

    pub fn residency(&self) -> Residency {
        self.memory.residency()
    }

    /// Underlying device memory, for kernel binding.
    pub fn memory(&self) -> &dyn DeviceMemory {
        &*self.memory
    }

    pub fn write_from_host(&self, data: &[u8]) -> Result<()> {
        self.memory.write_from_host(data)
    }

    pub fn read_to_host(&self) -> Result<Vec<u8>> {
        self.memory.read_to_host()
    }

    /// Give the buffer back now.
    pub fn release(self) {
        drop(self)
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            pool.release(self.id);
        }
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("len", &self.memory.len())
            .finish()
    }
}
