use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// A live-adjustable value in `[0, 1]`, shared between a stage and whoever
/// drives it. Writes clamp; the last write wins. Stages read it once per
/// frame, so a change never splits a frame.
#[derive(Debug, Clone)]
pub struct LiveControl {
    bits: Arc<AtomicU32>,
}

impl LiveControl {
    pub fn new(value: f32) -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(clamp(value).to_bits())),
        }
    }

    pub fn set(&self, value: f32) {
        self.bits.store(clamp(value).to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl Default for LiveControl {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// NaN maps to 0.
fn clamp(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamps() {
        let c = LiveControl::new(2.0);
        assert_eq!(c.get(), 1.0);
        c.set(-0.5);
        assert_eq!(c.get(), 0.0);
        c.set(f32::NAN);
        assert_eq!(c.get(), 0.0);
        c.set(0.25);
        assert_eq!(c.get(), 0.25);
    }

    #[test]
    fn test_shared_between_clones() {
        let a = LiveControl::default();
        let b = a.clone();
        b.set(0.75);
        assert_eq!(a.get(), 0.75);
    }

    #[test]
    fn test_set_from_other_thread() {
        let c = LiveControl::new(0.0);
        let remote = c.clone();
        std::thread::spawn(move || remote.set(0.5)).join().unwrap();
        assert_eq!(c.get(), 0.5);
    }
}
