//! grain - run raw video frames through grain-rs stage pipelines
//!
//! Reads concatenated packed frames (v210 or RGBA8, no container), unpacks
//! them to planar float on the compute device, applies one operator and
//! packs the result back.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "grain")]
#[command(author, version, about = "GPU-resident video frame processing")]
#[command(long_about = "
Process raw video frames on a compute device.

Input and output files are raw concatenated frames. Frame geometry and
packing are given on the command line since raw files carry no header.

Examples:
  grain info in.v210 -p v210 -W 1920 -H 1080
  grain convert in.v210 -o out.rgba -p v210 -W 1920 -H 1080 --to RGBA8
  grain mono in.v210 -o out.v210 -p v210 -W 1920 -H 1080 --pressure 0.8
  grain mix a.v210 b.v210 -o out.v210 -p v210 -W 1920 -H 1080 --pressure 0.5
  grain stamp key.rgba bg.v210 -o out.v210 -p RGBA8 --alpha -W 1920 -H 1080 --b-packing v210
  grain --backend host blur in.v210 -o out.v210 -p v210 -W 1920 -H 1080 --depth 2
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Compute backend: auto, host, wgpu
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Pipeline configuration (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Number of host worker threads (0 = auto)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Show frame geometry, file frame count and the compute device
    #[command(visible_alias = "i")]
    Info(InfoArgs),

    /// Convert between packings and colorimetries
    #[command(visible_alias = "c")]
    Convert(ConvertArgs),

    /// Blend towards greyscale
    Mono(MonoArgs),

    /// Cross-dissolve two inputs
    Mix(MixArgs),

    /// Alpha composite the first input over the second
    Stamp(StampArgs),

    /// Gaussian blur
    Blur(BlurArgs),
}

/// Geometry and tags of a raw input.
#[derive(Args, Clone, Debug)]
struct FrameArgs {
    /// Input packing: v210, RGBA8
    #[arg(short = 'p', long = "packing")]
    packing: String,

    /// Frame width in pixels
    #[arg(short = 'W', long)]
    width: u32,

    /// Frame height in lines
    #[arg(short = 'H', long)]
    height: u32,

    /// Input colorimetry: BT601, BT709, BT2020, BT2100, sRGB
    #[arg(long, default_value = "BT709")]
    colorimetry: String,

    /// RGBA8 input carries a real alpha channel
    #[arg(long)]
    alpha: bool,
}

/// Output options shared by every processing command.
#[derive(Args, Clone, Debug)]
struct OutputArgs {
    /// Output file
    #[arg(short, long)]
    output: PathBuf,

    /// Output packing (default: the input packing)
    #[arg(long = "to")]
    to: Option<String>,

    /// Output colorimetry (default: the input colorimetry)
    #[arg(long = "to-colorimetry")]
    to_colorimetry: Option<String>,
}

#[derive(Args)]
struct InfoArgs {
    /// Raw input file; without one only the device is shown
    input: Option<PathBuf>,

    /// Input packing: v210, RGBA8
    #[arg(short = 'p', long = "packing", requires_all = ["width", "height"])]
    packing: Option<String>,

    /// Frame width in pixels
    #[arg(short = 'W', long)]
    width: Option<u32>,

    /// Frame height in lines
    #[arg(short = 'H', long)]
    height: Option<u32>,

    /// Input colorimetry
    #[arg(long, default_value = "BT709")]
    colorimetry: String,
}

#[derive(Args)]
struct ConvertArgs {
    input: PathBuf,

    #[command(flatten)]
    frame: FrameArgs,

    #[command(flatten)]
    out: OutputArgs,
}

#[derive(Args)]
struct MonoArgs {
    input: PathBuf,

    #[command(flatten)]
    frame: FrameArgs,

    #[command(flatten)]
    out: OutputArgs,

    /// 0 = unchanged, 1 = greyscale
    #[arg(long)]
    pressure: Option<f32>,
}

/// Second input of a two-input command. Defaults to the first input's tags.
#[derive(Args, Clone, Debug)]
struct SecondInputArgs {
    /// Packing of the second input
    #[arg(id = "b_packing", long = "b-packing")]
    packing: Option<String>,

    /// Colorimetry of the second input
    #[arg(id = "b_colorimetry", long = "b-colorimetry")]
    colorimetry: Option<String>,

    /// Second RGBA8 input carries a real alpha channel
    #[arg(id = "b_alpha", long = "b-alpha")]
    alpha: bool,
}

#[derive(Args)]
struct MixArgs {
    a: PathBuf,

    b: PathBuf,

    #[command(flatten)]
    frame: FrameArgs,

    #[command(flatten)]
    second: SecondInputArgs,

    #[command(flatten)]
    out: OutputArgs,

    /// 1 = only A, 0 = only B
    #[arg(long)]
    pressure: Option<f32>,
}

#[derive(Args)]
struct StampArgs {
    /// Foreground (or background, if only the second input has alpha)
    a: PathBuf,

    b: PathBuf,

    #[command(flatten)]
    frame: FrameArgs,

    #[command(flatten)]
    second: SecondInputArgs,

    #[command(flatten)]
    out: OutputArgs,

    /// Foreground colour is premultiplied by its alpha
    #[arg(long)]
    premultiplied: bool,
}

#[derive(Args)]
struct BlurArgs {
    input: PathBuf,

    #[command(flatten)]
    frame: FrameArgs,

    #[command(flatten)]
    out: OutputArgs,

    /// Gaussian sigma in pixels (0 disables)
    #[arg(long)]
    depth: Option<f32>,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let ansi = std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    let config = config::load(cli.config.as_deref())?;
    let session = commands::Session::open(cli.backend.as_deref(), &config)?;

    let result = match cli.command {
        Commands::Info(args) => commands::info::run(args, &session, cli.verbose),
        Commands::Convert(args) => commands::convert::run(args, &session, &config),
        Commands::Mono(args) => commands::mono::run(args, &session, &config),
        Commands::Mix(args) => commands::mix::run(args, &session, &config),
        Commands::Stamp(args) => commands::stamp::run(args, &session, &config),
        Commands::Blur(args) => commands::blur::run(args, &session, &config),
    };
    session.close();
    result
}
