//! Convert command
//!
//! Unpacks and repacks without an operator: packing and colorimetry
//! conversion only.

use anyhow::Result;
use tracing::trace;

use super::Session;
use crate::ConvertArgs;
use crate::config::PipelineConfig;

pub fn run(args: ConvertArgs, session: &Session, config: &PipelineConfig) -> Result<()> {
    trace!(input = %args.input.display(), to = ?args.out.to, "convert::run");

    let desc = super::frame_desc(&args.frame)?;
    super::run_pipeline(session, config, &[(&args.input, desc)], None, &args.out)?;
    Ok(())
}
