//! Blur command

use anyhow::Result;
use grain_ops::blur_dim;
use grain_stage::BlurStage;
use tracing::{info, trace};

use super::Session;
use crate::BlurArgs;
use crate::config::PipelineConfig;

pub fn run(args: BlurArgs, session: &Session, config: &PipelineConfig) -> Result<()> {
    trace!(input = %args.input.display(), depth = ?args.depth, "blur::run");

    let desc = super::frame_desc(&args.frame)?;
    let mut stage_config = config.process.clone();
    if let Some(depth) = args.depth {
        stage_config.blur_depth = depth;
    }
    let dim = blur_dim(stage_config.blur_depth);
    info!(depth = stage_config.blur_depth, dim, "Applying blur");

    let stage = BlurStage::new(&session.pool, stage_config);
    super::run_pipeline(
        session,
        config,
        &[(&args.input, desc)],
        Some(Box::new(stage)),
        &args.out,
    )?;
    Ok(())
}
