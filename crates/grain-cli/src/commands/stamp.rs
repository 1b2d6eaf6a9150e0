//! Stamp command
//!
//! Composites the input that carries alpha over the other one. With alpha on
//! both, the first input is the foreground.

use anyhow::{Result, bail};
use grain_stage::StampStage;
use tracing::{info, trace};

use super::Session;
use crate::StampArgs;
use crate::config::PipelineConfig;

pub fn run(args: StampArgs, session: &Session, config: &PipelineConfig) -> Result<()> {
    trace!(a = %args.a.display(), b = %args.b.display(), "stamp::run");

    let a = super::frame_desc(&args.frame)?;
    let b = super::second_desc(&args.frame, &args.second)?;
    if !a.has_alpha && !b.has_alpha {
        bail!("stamp needs an input with alpha (--alpha or --b-alpha on an RGBA8 input)");
    }
    let mut stage_config = config.process.clone();
    stage_config.premultiplied |= args.premultiplied;
    info!(
        foreground = if a.has_alpha { "a" } else { "b" },
        premultiplied = stage_config.premultiplied,
        "Stamp"
    );
    let stage = StampStage::new(&session.pool, stage_config);

    super::run_pipeline(
        session,
        config,
        &[(&args.a, a), (&args.b, b)],
        Some(Box::new(stage)),
        &args.out,
    )?;
    Ok(())
}
