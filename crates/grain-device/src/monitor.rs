//! Periodic pool diagnostics.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::memory::format_bytes;
use crate::pool::BufferPool;

/// Background thread that logs the pool contents every `interval`.
///
/// Totals go to `debug`, one line per buffer to `trace`. Stops when dropped.
pub struct PoolMonitor {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PoolMonitor {
    pub fn spawn(pool: BufferPool, interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel::<()>();
        let spawned = std::thread::Builder::new()
            .name("grain-pool-monitor".into())
            .spawn(move || loop {
                match rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => log_pool(&pool),
                    _ => break,
                }
            });
        let handle = match spawned {
            Ok(h) => Some(h),
            Err(e) => {
                warn!("Pool monitor not started: {e}");
                None
            }
        };
        Self {
            stop: Some(tx),
            handle,
        }
    }

    /// Stop and join the thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for PoolMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn log_pool(pool: &BufferPool) {
    let s = pool.stats();
    debug!(
        buffers = s.buffers,
        reserved = s.reserved,
        total = %format_bytes(s.bytes),
        in_use = %format_bytes(s.reserved_bytes),
        "Pool"
    );
    for info in pool.snapshot() {
        trace!("  {info}");
    }
}
