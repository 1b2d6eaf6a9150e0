//! Pool behaviour against a device that fails on demand.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use grain_device::{
    Access, BufferPool, Device, DeviceLimits, DeviceMemory, Error, HostDevice, KernelSource,
    LineTiling, Program, Residency, Result,
};

/// Host device that reports out-of-memory for the next `fail` allocations.
struct FlakyDevice {
    inner: HostDevice,
    fail: AtomicUsize,
    calls: AtomicUsize,
}

impl FlakyDevice {
    fn new() -> Self {
        Self {
            inner: HostDevice::with_capacity(64 << 20),
            fail: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    fn fail_next(&self, n: usize) {
        self.fail.store(n, Ordering::SeqCst);
    }
}

impl Device for FlakyDevice {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn limits(&self) -> &DeviceLimits {
        self.inner.limits()
    }

    fn create_buffer(
        &self,
        len: u64,
        access: Access,
        residency: Residency,
    ) -> Result<Arc<dyn DeviceMemory>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .fail
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::OutOfMemory { requested: len });
        }
        self.inner.create_buffer(len, access, residency)
    }

    fn create_program(&self, source: &'static KernelSource, tiling: LineTiling) -> Result<Program> {
        self.inner.create_program(source, tiling)
    }
}

const RW: Access = Access::ReadWrite;
const DEV: Residency = Residency::Device;

#[test]
fn test_single_oom_is_retried_after_flush() {
    let dev = Arc::new(FlakyDevice::new());
    let pool = BufferPool::new(dev.clone());

    let spare = pool.create_buffer(256, RW, DEV, "Blur-1").unwrap();
    drop(spare);
    assert_eq!(pool.stats().buffers, 1);

    dev.fail_next(1);
    let buf = pool.create_buffer(512, RW, DEV, "Mix-1").unwrap();
    assert_eq!(buf.len(), 512);
    // The free Blur-1 buffer was flushed before the retry.
    assert_eq!(pool.stats().buffers, 1);
    assert_eq!(dev.calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_double_oom_reaches_caller() {
    let dev = Arc::new(FlakyDevice::new());
    let pool = BufferPool::new(dev.clone());
    let held = pool.create_buffer(256, RW, DEV, "Blur-1").unwrap();

    dev.fail_next(2);
    let err = pool.create_buffer(512, RW, DEV, "Mix-1").unwrap_err();
    assert!(err.is_out_of_memory());

    // Reserved buffers survive the flush.
    assert_eq!(pool.stats().reserved, 1);
    assert!(held.read_to_host().is_ok());
}

#[test]
fn test_concurrent_owners_never_share() {
    let pool = BufferPool::new(Arc::new(HostDevice::with_capacity(64 << 20)));
    std::thread::scope(|s| {
        for owner in ["A", "B", "C", "D"] {
            let pool = pool.clone();
            s.spawn(move || {
                for _ in 0..50 {
                    let b = pool.create_buffer(1024, RW, DEV, owner).unwrap();
                    assert_eq!(b.owner(), owner);
                    b.write_from_host(owner.as_bytes()).unwrap();
                    assert_eq!(&b.read_to_host().unwrap()[..1], owner.as_bytes());
                }
            });
        }
    });
    let stats = pool.stats();
    assert_eq!(stats.reserved, 0);
    assert_eq!(stats.buffers, 4);
}

#[test]
fn test_drain_then_release() {
    let pool = BufferPool::new(Arc::new(HostDevice::with_capacity(64 << 20)));
    let out = pool.create_buffer(64, RW, DEV, "Mono-1").unwrap();

    let waiter = {
        let pool = pool.clone();
        std::thread::spawn(move || pool.wait_owner_idle("Mono-1", Duration::from_secs(5)))
    };
    std::thread::sleep(Duration::from_millis(10));
    drop(out);
    assert!(waiter.join().unwrap());
    assert_eq!(pool.release_buffers("Mono-1"), 1);
    assert_eq!(pool.release_buffers("Mono-1"), 0);
}
