//! Monochrome command

use anyhow::Result;
use grain_stage::MonochromeStage;
use tracing::{info, trace};

use super::Session;
use crate::MonoArgs;
use crate::config::PipelineConfig;

pub fn run(args: MonoArgs, session: &Session, config: &PipelineConfig) -> Result<()> {
    trace!(input = %args.input.display(), pressure = ?args.pressure, "mono::run");

    let desc = super::frame_desc(&args.frame)?;
    let mut stage_config = config.process.clone();
    if let Some(p) = args.pressure {
        stage_config.pressure = p;
    }
    let stage = MonochromeStage::new(&session.pool, stage_config);
    info!(pressure = stage.control().get(), "Monochrome");

    super::run_pipeline(
        session,
        config,
        &[(&args.input, desc)],
        Some(Box::new(stage)),
        &args.out,
    )?;
    Ok(())
}
