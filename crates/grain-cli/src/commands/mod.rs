//! CLI command implementations

pub mod blur;
pub mod convert;
pub mod info;
pub mod mix;
pub mod mono;
pub mod stamp;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use grain_codec::Codec;
use grain_core::{Colorimetry, FrameDescriptor, Packing};
use grain_device::memory::{diag_interval, format_bytes};
use grain_device::{Backend, BufferPool, PoolMonitor, open_device};
use grain_stage::{Frame, PackStage, Stage, UnpackStage};
use tracing::{debug, info, trace, warn};

use crate::config::PipelineConfig;
use crate::{FrameArgs, OutputArgs, SecondInputArgs};

/// Device, pool and pool monitor for one invocation.
pub struct Session {
    pub pool: BufferPool,
    monitor: Option<PoolMonitor>,
}

impl Session {
    /// Backend priority: `--backend`, the config file, `GRAIN_BACKEND`.
    pub fn open(flag: Option<&str>, config: &PipelineConfig) -> Result<Self> {
        let backend = match flag.or(config.backend.as_deref()) {
            Some(tag) => tag.parse::<Backend>()?,
            None => Backend::from_env(),
        };
        let device = open_device(backend)
            .with_context(|| format!("Failed to open {backend} device"))?;
        let pool = BufferPool::new(device);

        let monitor = monitor_interval(config).map(|i| PoolMonitor::spawn(pool.clone(), i));
        Ok(Self { pool, monitor })
    }

    pub fn close(self) {
        if let Some(m) = self.monitor {
            m.stop();
        }
        let stats = self.pool.stats();
        debug!(
            buffers = stats.buffers,
            reserved = stats.reserved,
            total = %format_bytes(stats.bytes),
            "Session closed"
        );
    }
}

/// Pool monitor period: the config value, else `GRAIN_DIAG_INTERVAL_MS`, else
/// one second. Zero in the config turns the monitor off.
fn monitor_interval(config: &PipelineConfig) -> Option<Duration> {
    match config.monitor_interval_ms {
        Some(0) => None,
        Some(ms) => Some(Duration::from_millis(ms)),
        None => Some(diag_interval()),
    }
}

/// Descriptor of the first (or only) input.
pub fn frame_desc(args: &FrameArgs) -> Result<FrameDescriptor> {
    let packing = Packing::from_tag(&args.packing)?;
    let colorimetry = Colorimetry::from_tag(&args.colorimetry, args.height)?;
    let desc = FrameDescriptor::new(packing, args.width, args.height, colorimetry)
        .with_alpha(args.alpha);
    desc.validate()?;
    Ok(desc)
}

/// Descriptor of the second input: same geometry, own tags.
pub fn second_desc(first: &FrameArgs, second: &SecondInputArgs) -> Result<FrameDescriptor> {
    frame_desc(&FrameArgs {
        packing: second.packing.clone().unwrap_or_else(|| first.packing.clone()),
        colorimetry: second
            .colorimetry
            .clone()
            .unwrap_or_else(|| first.colorimetry.clone()),
        alpha: second.alpha,
        ..first.clone()
    })
}

/// Sequential reader of a raw file of concatenated packed frames.
pub struct RawFrames {
    reader: BufReader<File>,
    frame_bytes: usize,
    remaining: u64,
}

impl RawFrames {
    pub fn open(path: &Path, desc: &FrameDescriptor) -> Result<Self> {
        let codec = Codec::for_packing(desc.packing)?;
        let frame_bytes = codec.frame_bytes(desc.width, desc.height);
        let file = File::open(path)
            .with_context(|| format!("Failed to open: {}", path.display()))?;
        let size = file.metadata()?.len();
        if size == 0 || size % frame_bytes != 0 {
            bail!(
                "{}: {} bytes is not a whole number of {}x{} {} frames ({} bytes each)",
                path.display(),
                size,
                desc.width,
                desc.height,
                codec,
                frame_bytes
            );
        }
        Ok(Self {
            reader: BufReader::new(file),
            frame_bytes: frame_bytes as usize,
            remaining: size / frame_bytes,
        })
    }

    /// Frames not yet read.
    pub fn frames(&self) -> u64 {
        self.remaining
    }

    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let mut buf = vec![0u8; self.frame_bytes];
        self.reader.read_exact(&mut buf).context("Short read")?;
        self.remaining -= 1;
        Ok(Some(buf))
    }
}

/// Unpack, optional operator, pack.
struct Pipeline {
    inputs: Vec<FrameDescriptor>,
    unpack: Vec<UnpackStage>,
    op: Option<Box<dyn Stage>>,
    pack: PackStage,
}

impl Pipeline {
    fn build(
        pool: &BufferPool,
        config: &PipelineConfig,
        inputs: &[FrameDescriptor],
        mut op: Option<Box<dyn Stage>>,
        out: &OutputArgs,
    ) -> Result<(Self, FrameDescriptor)> {
        // Intermediate frames stay on the device; only the packed result comes back.
        let mut unpack_config = config.unpack.clone();
        unpack_config.send_device = true;

        let mut unpack = Vec::with_capacity(inputs.len());
        let mut planar = Vec::with_capacity(inputs.len());
        for desc in inputs {
            let mut stage = UnpackStage::new(pool, unpack_config.clone());
            planar.push(stage.configure(std::slice::from_ref(desc))?);
            unpack.push(stage);
        }

        let mid = match op.as_mut() {
            Some(stage) => {
                let desc = stage.configure(&planar)?;
                debug!(stage = stage.name(), inputs = planar.len(), "Configured operator");
                desc
            }
            None if planar.len() == 1 => planar[0],
            None => bail!("{} inputs need an operator", planar.len()),
        };

        let packing = match &out.to {
            Some(tag) => Packing::from_tag(tag)?,
            None => inputs[0].packing,
        };
        let mut pack_config = config.pack.clone();
        pack_config.send_device = false;
        if let Some(tag) = &out.to_colorimetry {
            pack_config.colorimetry = Some(Colorimetry::from_tag(tag, mid.height)?);
        } else if pack_config.colorimetry.is_none() {
            pack_config.colorimetry = Some(inputs[0].colorimetry);
        }
        let mut pack = PackStage::new(pool, packing, pack_config);
        let out_desc = pack.configure(&[mid])?;

        let pipeline = Self {
            inputs: inputs.to_vec(),
            unpack,
            op,
            pack,
        };
        Ok((pipeline, out_desc))
    }

    /// One packed frame per input in, one packed frame out.
    fn process(&mut self, packed: Vec<Vec<u8>>) -> Result<Vec<u8>> {
        let mut frames = packed
            .into_iter()
            .zip(&self.inputs)
            .map(|(bytes, desc)| Frame::host(*desc, bytes));

        let mut planar = match (self.unpack.as_mut_slice(), frames.next(), frames.next()) {
            ([stage], Some(frame), None) => vec![stage.process(vec![frame])?],
            ([a, b], Some(fa), Some(fb)) => thread::scope(|s| -> Result<Vec<Frame>> {
                let second = s.spawn(|| b.process(vec![fb]));
                let first = a.process(vec![fa]);
                let second = second
                    .join()
                    .map_err(|_| anyhow!("Unpack thread panicked"))?;
                Ok(vec![first?, second?])
            })?,
            _ => bail!("Input count does not match the pipeline"),
        };

        let mid = match self.op.as_mut() {
            Some(stage) => stage.process(planar)?,
            None => planar.remove(0),
        };
        let out = self.pack.process(vec![mid])?;
        Ok(out.into_host()?)
    }

    fn shutdown(&mut self, config: &PipelineConfig) {
        for stage in &mut self.unpack {
            stage.shutdown(config.unpack.drain_timeout());
        }
        if let Some(stage) = self.op.as_mut() {
            stage.shutdown(config.process.drain_timeout());
        }
        self.pack.shutdown(config.pack.drain_timeout());
    }
}

/// Run every frame of `inputs` through unpack, `op` and pack, writing the
/// packed result to `out.output`. Two inputs are consumed in lockstep.
pub fn run_pipeline(
    session: &Session,
    config: &PipelineConfig,
    inputs: &[(&Path, FrameDescriptor)],
    op: Option<Box<dyn Stage>>,
    out: &OutputArgs,
) -> Result<u64> {
    let descs: Vec<FrameDescriptor> = inputs.iter().map(|(_, d)| *d).collect();
    let mut readers = inputs
        .iter()
        .map(|(path, desc)| RawFrames::open(path, desc))
        .collect::<Result<Vec<_>>>()?;

    let counts: Vec<u64> = readers.iter().map(RawFrames::frames).collect();
    let total = counts.iter().copied().min().unwrap_or(0);
    if counts.iter().any(|&n| n != total) {
        warn!(?counts, "Inputs differ in length, stopping at the shortest");
    }

    let (mut pipeline, out_desc) = Pipeline::build(&session.pool, config, &descs, op, out)?;
    info!(
        frames = total,
        width = out_desc.width,
        height = out_desc.height,
        packing = %out_desc.packing,
        colorimetry = %out_desc.colorimetry,
        "Processing"
    );

    let result = write_frames(&mut pipeline, &mut readers, total, &out.output);
    pipeline.shutdown(config);
    result
}

fn write_frames(
    pipeline: &mut Pipeline,
    readers: &mut [RawFrames],
    total: u64,
    output: &Path,
) -> Result<u64> {
    let file = File::create(output)
        .with_context(|| format!("Failed to create: {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    let start = Instant::now();

    for n in 0..total {
        let mut packed = Vec::with_capacity(readers.len());
        for r in readers.iter_mut() {
            match r.next_frame()? {
                Some(bytes) => packed.push(bytes),
                None => bail!("Input ended before frame {n}"),
            }
        }
        let bytes = pipeline
            .process(packed)
            .with_context(|| format!("Frame {n}"))?;
        writer.write_all(&bytes)?;
        trace!(frame = n, bytes = bytes.len(), "Wrote frame");
    }
    writer.flush()?;

    let elapsed = start.elapsed();
    info!(
        frames = total,
        elapsed_ms = elapsed.as_millis() as u64,
        output = %output.display(),
        "Done"
    );
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_on_by_default() {
        let config = PipelineConfig::default();
        assert!(monitor_interval(&config).is_some());
    }

    #[test]
    fn test_monitor_interval_from_config() {
        let mut config = PipelineConfig::default();
        config.monitor_interval_ms = Some(250);
        assert_eq!(monitor_interval(&config), Some(Duration::from_millis(250)));
        config.monitor_interval_ms = Some(0);
        assert_eq!(monitor_interval(&config), None);
    }
}
