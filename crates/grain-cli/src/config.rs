//! Pipeline configuration file.
//!
//! ```yaml
//! backend: wgpu
//! monitor_interval_ms: 500
//! unpack:
//!   colorimetry: BT709
//! process:
//!   pressure: 0.75
//!   blur_depth: 2.0
//! pack:
//!   colorimetry: BT2020
//!   drain_timeout_ms: 250
//! ```
//!
//! Command-line flags win over the file.

use std::path::Path;

use anyhow::{Context, Result};
use grain_stage::StageConfig;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// `auto`, `host` or `wgpu`.
    pub backend: Option<String>,
    pub unpack: StageConfig,
    /// Shared by whichever operator the command runs.
    pub process: StageConfig,
    pub pack: StageConfig,
    /// Log pool statistics at this period. Zero disables; unset uses
    /// `GRAIN_DIAG_INTERVAL_MS` or one second.
    pub monitor_interval_ms: Option<u64>,
}

/// Load `path`, or defaults when no file was given.
pub fn load(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let config: PipelineConfig = serde_yaml::from_str(&text)
        .with_context(|| format!("Invalid config: {}", path.display()))?;
    debug!(?config, "Loaded config");
    Ok(config)
}
