//! Mix command
//!
//! Cross-dissolves two raw files frame by frame.

use anyhow::Result;
use grain_stage::MixStage;
use tracing::{info, trace};

use super::Session;
use crate::MixArgs;
use crate::config::PipelineConfig;

pub fn run(args: MixArgs, session: &Session, config: &PipelineConfig) -> Result<()> {
    trace!(a = %args.a.display(), b = %args.b.display(), "mix::run");

    let a = super::frame_desc(&args.frame)?;
    let b = super::second_desc(&args.frame, &args.second)?;
    let mut stage_config = config.process.clone();
    if let Some(p) = args.pressure {
        stage_config.pressure = p;
    }
    let stage = MixStage::new(&session.pool, stage_config);
    info!(pressure = stage.control().get(), "Mix");

    super::run_pipeline(
        session,
        config,
        &[(&args.a, a), (&args.b, b)],
        Some(Box::new(stage)),
        &args.out,
    )?;
    Ok(())
}
