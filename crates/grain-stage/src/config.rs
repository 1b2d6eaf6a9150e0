use std::time::Duration;

use grain_core::Colorimetry;
use serde::{Deserialize, Serialize};

/// Per-stage settings. Every field has a default, so a YAML document only
/// needs the keys it changes.
///
/// ```yaml
/// send_device: false
/// pressure: 0.5
/// colorimetry: BT2020
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Keep output on the device (`true`) or read it back to host memory.
    pub send_device: bool,
    /// Initial value of the live control of monochrome and mix stages.
    pub pressure: f32,
    /// Gaussian sigma of blur stages. Zero or less disables the blur.
    pub blur_depth: f32,
    /// Stamp foreground is premultiplied by its alpha.
    pub premultiplied: bool,
    /// Destination colorimetry of unpack (working space) and pack stages.
    /// Unpack defaults to BT.709, pack to the colorimetry of its input.
    pub colorimetry: Option<Colorimetry>,
    /// Longest shutdown wait for buffers still held downstream.
    pub drain_timeout_ms: u64,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            send_device: true,
            pressure: 1.0,
            blur_depth: 1.0,
            premultiplied: false,
            colorimetry: None,
            drain_timeout_ms: 1000,
        }
    }
}

impl StageConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = StageConfig::default();
        assert!(c.send_device);
        assert_eq!(c.drain_timeout(), Duration::from_secs(1));
        assert_eq!(c.colorimetry, None);
    }

    #[test]
    fn test_partial_yaml() {
        let c: StageConfig = serde_yaml::from_str("send_device: false\ncolorimetry: BT2020\n").unwrap();
        assert!(!c.send_device);
        assert_eq!(c.colorimetry, Some(Colorimetry::Bt2020));
        assert_eq!(c.pressure, 1.0);
        assert_eq!(c.drain_timeout_ms, 1000);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let c = StageConfig {
            blur_depth: 2.5,
            premultiplied: true,
            ..Default::default()
        };
        let text = serde_yaml::to_string(&c).unwrap();
        let back: StageConfig = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back, c);
    }
}
