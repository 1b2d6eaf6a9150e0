//! System memory detection and environment overrides.
//!
//! # Environment Variables
//!
//! - `GRAIN_DEVICE_MEM_MB` - host device capacity in megabytes
//! - `GRAIN_BACKEND` - `host`, `wgpu` or `auto`
//! - `GRAIN_DIAG_INTERVAL_MS` - pool monitor period in milliseconds

use std::env;
use std::sync::OnceLock;
use std::time::Duration;

/// Share of free RAM the host device may allocate by default.
pub const HOST_MEMORY_FRACTION: f64 = 0.50;

/// Default pool monitor period.
pub const DEFAULT_DIAG_INTERVAL: Duration = Duration::from_millis(1000);

static SYSTEM_MEMORY: OnceLock<u64> = OnceLock::new();

/// Total system RAM in bytes.
pub fn system_memory() -> u64 {
    *SYSTEM_MEMORY.get_or_init(|| {
        sys_info::mem_info()
            .map(|m| m.total * 1024) // KB to bytes
            .unwrap_or(8 * 1024 * 1024 * 1024) // 8 GB fallback
    })
}

/// RAM currently available to new allocations, in bytes.
pub fn available_system_memory() -> u64 {
    sys_info::mem_info()
        .map(|m| m.avail * 1024)
        .unwrap_or_else(|_| system_memory() / 2)
}

/// Capacity of a host device.
///
/// Priority:
/// 1. `GRAIN_DEVICE_MEM_MB`
/// 2. [`HOST_MEMORY_FRACTION`] of available RAM
pub fn host_capacity() -> u64 {
    if let Some(mb) = env_u64("GRAIN_DEVICE_MEM_MB") {
        return mb * 1024 * 1024;
    }
    (available_system_memory() as f64 * HOST_MEMORY_FRACTION) as u64
}

/// Backend override from `GRAIN_BACKEND`.
pub fn backend_override() -> Option<String> {
    env::var("GRAIN_BACKEND").ok()
}

/// Pool monitor period from `GRAIN_DIAG_INTERVAL_MS`.
pub fn diag_interval() -> Duration {
    env_u64("GRAIN_DIAG_INTERVAL_MS")
        .filter(|&ms| ms > 0)
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_DIAG_INTERVAL)
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Format bytes as human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= 1024 * 1024 * 1024 {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    } else if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{} KB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_memory() {
        assert!(system_memory() > 0);
        assert!(available_system_memory() > 0);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_diag_interval_default() {
        if env::var("GRAIN_DIAG_INTERVAL_MS").is_err() {
            assert_eq!(diag_interval(), DEFAULT_DIAG_INTERVAL);
        }
    }
}
