//! Info command
//!
//! Shows the compute device, and for a described raw file its geometry and
//! frame count.

use std::fs;

use anyhow::{Result, bail};
use grain_codec::Codec;
use grain_core::{Colorimetry, FrameDescriptor, Packing};
use grain_device::memory::format_bytes;

use super::Session;
use crate::InfoArgs;

pub fn run(args: InfoArgs, session: &Session, verbose: u8) -> Result<()> {
    print_device(session, verbose);

    let (packing, width, height) = match (&args.packing, args.width, args.height) {
        (Some(p), Some(w), Some(h)) => (Packing::from_tag(p)?, w, h),
        (None, ..) if args.input.is_none() => return Ok(()),
        _ => bail!("describe the input with --packing, --width and --height"),
    };
    let colorimetry = Colorimetry::from_tag(&args.colorimetry, height)?;
    let desc = FrameDescriptor::new(packing, width, height, colorimetry);
    desc.validate()?;
    let codec = Codec::for_packing(packing)?;
    let frame_bytes = codec.frame_bytes(width, height);

    println!();
    if let Some(path) = &args.input {
        println!("{}", path.display());
    }
    println!("  Resolution:  {}x{}", width, height);
    println!("  Packing:     {} ({} bits)", codec, packing.bits());
    println!("  Colorimetry: {}", colorimetry);
    println!("  Pitch:       {} bytes", codec.pitch_bytes(width));
    println!("  Frame size:  {}", format_bytes(frame_bytes));
    if verbose > 0 {
        println!("  Planar size: {}", format_bytes(desc.planar_bytes()));
    }

    if let Some(path) = &args.input {
        let size = fs::metadata(path)?.len();
        println!("  File size:   {}", format_bytes(size));
        println!("  Frames:      {}", size / frame_bytes);
        let trailing = size % frame_bytes;
        if trailing != 0 {
            println!("  Trailing:    {} bytes (not a whole frame)", trailing);
        }
    }
    Ok(())
}

fn print_device(session: &Session, verbose: u8) {
    let device = session.pool.device();
    let limits = device.limits();
    println!("Device:        {}", device.name());
    println!("  Memory:      {}", format_bytes(limits.memory_bytes));
    println!("  Max buffer:  {}", format_bytes(limits.max_buffer_bytes));
    if verbose > 0 {
        println!("  Work items:  {} per group", limits.max_work_items_per_group);
    }
}
