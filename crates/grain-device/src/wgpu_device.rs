//! wgpu device: storage buffers and compute pipelines.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, mpsc};

use bytemuck::{Pod, Zeroable};
use grain_core::{Error, Result};
use tracing::{debug, info};
use wgpu::util::DeviceExt;

use crate::buffer::{Access, DeviceMemory, Residency};
use crate::device::{Device, DeviceLimits};
use crate::memory::format_bytes;
use crate::program::{Arg, KernelSource, MAX_SCALARS, Param, Program, ProgramBackend};
use crate::tiling::LineTiling;

static NEXT_MEMORY_ID: AtomicU64 = AtomicU64::new(1);

/// Scalar block: `array<vec4<u32>, 2>` in WGSL.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct ScalarUniform {
    words: [u32; MAX_SCALARS],
}

/// Bytes tracked against the estimated VRAM.
#[derive(Debug)]
struct Budget {
    capacity: u64,
    used: AtomicU64,
}

impl Budget {
    fn try_reserve(&self, bytes: u64) -> bool {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|&n| n <= self.capacity)
            })
            .is_ok()
    }

    fn give_back(&self, bytes: u64) {
        self.used.fetch_sub(bytes, Ordering::AcqRel);
    }
}

struct Gpu {
    device: wgpu::Device,
    queue: wgpu::Queue,
    /// Error scopes are a per-device stack shared by every thread.
    scope: Mutex<()>,
}

impl Gpu {
    /// Run `f` inside an error scope, one scope at a time per device, and
    /// return its result with the first error the scope caught.
    fn scoped<T>(
        &self,
        filter: wgpu::ErrorFilter,
        f: impl FnOnce(&wgpu::Device) -> T,
    ) -> (T, Option<wgpu::Error>) {
        let _guard = self.scope.lock().unwrap_or_else(PoisonError::into_inner);
        self.device.push_error_scope(filter);
        let out = f(&self.device);
        let err = pollster::block_on(self.device.pop_error_scope());
        (out, err)
    }
}

/// GPU buffer. Sizes are padded to 4 bytes on the device.
pub struct WgpuMemory {
    id: u64,
    len: u64,
    padded: u64,
    access: Access,
    residency: Residency,
    buffer: wgpu::Buffer,
    freed: AtomicBool,
    gpu: Arc<Gpu>,
    budget: Arc<Budget>,
}

impl WgpuMemory {
    fn downcast(mem: &dyn DeviceMemory) -> Result<&WgpuMemory> {
        mem.as_any()
            .downcast_ref::<WgpuMemory>()
            .ok_or_else(|| Error::dispatch("buffer does not belong to the wgpu device"))
    }

    fn live(&self) -> Result<()> {
        if self.is_freed() {
            return Err(Error::dispatch("gpu buffer was freed"));
        }
        Ok(())
    }
}

impl DeviceMemory for WgpuMemory {
    fn memory_id(&self) -> u64 {
        self.id
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn access(&self) -> Access {
        self.access
    }

    fn residency(&self) -> Residency {
        self.residency
    }

    fn write_from_host(&self, data: &[u8]) -> Result<()> {
        self.live()?;
        if data.len() as u64 > self.len {
            return Err(Error::invalid_argument(format!(
                "upload of {} bytes into a {} byte buffer",
                data.len(),
                self.len
            )));
        }
        // write_buffer wants a multiple of 4
        if data.len() % 4 == 0 {
            self.gpu.queue.write_buffer(&self.buffer, 0, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(data.len().next_multiple_of(4), 0);
            self.gpu.queue.write_buffer(&self.buffer, 0, &padded);
        }
        self.gpu.queue.submit([]);
        self.gpu.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }

    fn read_to_host(&self) -> Result<Vec<u8>> {
        self.live()?;
        let staging = self.gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging_buffer"),
            size: self.padded,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.gpu.device.create_command_encoder(&Default::default());
        encoder.copy_buffer_to_buffer(&self.buffer, 0, &staging, 0, self.padded);
        self.gpu.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            let _ = tx.send(r);
        });
        self.gpu.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|_| Error::dispatch("map channel closed"))?
            .map_err(|e| Error::dispatch(format!("map failed: {e}")))?;

        let data = slice.get_mapped_range();
        let out = data[..self.len as usize].to_vec();
        drop(data);
        staging.unmap();
        Ok(out)
    }

    fn free(&self) {
        if self.freed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.buffer.destroy();
        self.budget.give_back(self.padded);
    }

    fn is_freed(&self) -> bool {
        self.freed.load(Ordering::Acquire)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl Drop for WgpuMemory {
    fn drop(&mut self) {
        if !self.is_freed() {
            self.budget.give_back(self.padded);
        }
    }
}

/// Device on the first high-performance wgpu adapter.
pub struct WgpuDevice {
    gpu: Arc<Gpu>,
    budget: Arc<Budget>,
    limits: DeviceLimits,
    max_groups: u32,
    adapter_name: String,
}

impl WgpuDevice {
    pub fn new() -> Result<Self> {
        pollster::block_on(Self::new_async())
    }

    pub async fn new_async() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(Error::NoAdapter)?;

        let adapter_limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("grain_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter_limits.clone(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    ..Default::default()
                },
                None,
            )
            .await
            .map_err(|e| Error::DeviceCreation(e.to_string()))?;

        let info = adapter.get_info();
        let memory = estimate_vram(&info, adapter_limits.max_buffer_size);
        info!(adapter = %info.name, vram = %format_bytes(memory), "wgpu adapter");

        Ok(Self {
            gpu: Arc::new(Gpu {
                device,
                queue,
                scope: Mutex::new(()),
            }),
            budget: Arc::new(Budget {
                capacity: memory,
                used: AtomicU64::new(0),
            }),
            limits: DeviceLimits {
                max_buffer_bytes: adapter_limits
                    .max_buffer_size
                    .min(adapter_limits.max_storage_buffer_binding_size as u64),
                max_work_items_per_group: adapter_limits
                    .max_compute_workgroup_size_x
                    .min(adapter_limits.max_compute_invocations_per_workgroup),
                memory_bytes: memory,
            },
            max_groups: adapter_limits.max_compute_workgroups_per_dimension,
            adapter_name: info.name,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }
}

impl Device for WgpuDevice {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    fn create_buffer(
        &self,
        len: u64,
        access: Access,
        residency: Residency,
    ) -> Result<Arc<dyn DeviceMemory>> {
        if len == 0 {
            return Err(Error::invalid_argument("zero-length buffer"));
        }
        let padded = len.next_multiple_of(4);
        if padded > self.limits.max_buffer_bytes || !self.budget.try_reserve(padded) {
            return Err(Error::OutOfMemory { requested: len });
        }

        let (buffer, err) = self.gpu.scoped(wgpu::ErrorFilter::OutOfMemory, |device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("pool_buffer"),
                size: padded,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });
        if err.is_some() {
            self.budget.give_back(padded);
            return Err(Error::OutOfMemory { requested: len });
        }

        Ok(Arc::new(WgpuMemory {
            id: NEXT_MEMORY_ID.fetch_add(1, Ordering::Relaxed),
            len,
            padded,
            access,
            residency,
            buffer,
            freed: AtomicBool::new(false),
            gpu: Arc::clone(&self.gpu),
            budget: Arc::clone(&self.budget),
        }))
    }

    fn create_program(&self, source: &'static KernelSource, tiling: LineTiling) -> Result<Program> {
        let wg_size = tiling.work_items_per_group();
        if wg_size > self.limits.max_work_items_per_group {
            return Err(Error::invalid_argument(format!(
                "kernel '{}': {} work items per line exceeds the device limit {}",
                source.name, wg_size, self.limits.max_work_items_per_group
            )));
        }
        if tiling.height > self.max_groups {
            return Err(Error::invalid_argument(format!(
                "kernel '{}': {} lines exceeds the device limit {}",
                source.name, tiling.height, self.max_groups
            )));
        }
        if source.scalar_count() > MAX_SCALARS {
            return Err(Error::invalid_argument(format!(
                "kernel '{}' declares more than {} scalars",
                source.name, MAX_SCALARS
            )));
        }

        let constants = HashMap::from([("WG_SIZE".to_string(), wg_size as f64)]);
        let (pipeline, err) = self.gpu.scoped(wgpu::ErrorFilter::Validation, |device| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(source.name),
                source: wgpu::ShaderSource::Wgsl(source.wgsl.into()),
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(source.name),
                layout: None, // Auto layout
                module: &module,
                entry_point: Some(source.name),
                compilation_options: wgpu::PipelineCompilationOptions {
                    constants: &constants,
                    ..Default::default()
                },
                cache: None,
            })
        });
        if let Some(e) = err {
            return Err(Error::ShaderCompilation {
                name: source.name.to_string(),
                reason: e.to_string(),
            });
        }
        debug!(kernel = source.name, wg_size, "Compiled pipeline");

        Ok(Program::new(
            source,
            tiling,
            Box::new(WgpuProgram {
                gpu: Arc::clone(&self.gpu),
                pipeline,
            }),
        ))
    }
}

struct WgpuProgram {
    gpu: Arc<Gpu>,
    pipeline: wgpu::ComputePipeline,
}

impl ProgramBackend for WgpuProgram {
    fn dispatch(
        &self,
        source: &'static KernelSource,
        tiling: LineTiling,
        slots: &[(Param, Arg<'_>)],
    ) -> Result<()> {
        let device = &self.gpu.device;

        let mut buffers = Vec::new();
        let mut uniform = ScalarUniform { words: [0; MAX_SCALARS] };
        let mut n_scalars = 0;
        for (_, arg) in slots {
            match arg {
                Arg::Buffer(mem) => {
                    let mem = WgpuMemory::downcast(*mem)?;
                    mem.live()?;
                    buffers.push(&mem.buffer);
                }
                Arg::Scalar(s) => {
                    uniform.words[n_scalars] = s.bits();
                    n_scalars += 1;
                }
            }
        }

        let scalar_buf = (n_scalars > 0).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("scalar_uniform"),
                contents: bytemuck::bytes_of(&uniform),
                usage: wgpu::BufferUsages::UNIFORM,
            })
        });

        let mut entries: Vec<wgpu::BindGroupEntry<'_>> = buffers
            .iter()
            .enumerate()
            .map(|(i, b)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: b.as_entire_binding(),
            })
            .collect();
        if let Some(buf) = &scalar_buf {
            entries.push(wgpu::BindGroupEntry {
                binding: buffers.len() as u32,
                resource: buf.as_entire_binding(),
            });
        }

        let ((), err) = self.gpu.scoped(wgpu::ErrorFilter::Validation, |device| {
            let layout = self.pipeline.get_bind_group_layout(0);
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(source.name),
                layout: &layout,
                entries: &entries,
            });

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("compute_encoder"),
            });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("compute_pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(tiling.height, 1, 1);
            }
            self.gpu.queue.submit(std::iter::once(encoder.finish()));
        });
        if let Some(e) = err {
            return Err(Error::dispatch(format!("kernel '{}': {e}", source.name)));
        }
        device.poll(wgpu::Maintain::Wait);
        Ok(())
    }
}

fn estimate_vram(info: &wgpu::AdapterInfo, max_buffer_bytes: u64) -> u64 {
    if let Ok(mb) = std::env::var("GRAIN_DEVICE_MEM_MB") {
        if let Ok(mb) = mb.parse::<u64>() {
            return mb.saturating_mul(1024 * 1024);
        }
    }

    let from_buffer = max_buffer_bytes.saturating_mul(2);

    let estimated = match info.device_type {
        wgpu::DeviceType::DiscreteGpu => from_buffer.clamp(2u64 << 30, 24u64 << 30),
        wgpu::DeviceType::IntegratedGpu => from_buffer.clamp(512u64 << 20, 4u64 << 30),
        wgpu::DeviceType::VirtualGpu => from_buffer.clamp(1u64 << 30, 8u64 << 30),
        _ => from_buffer.clamp(256u64 << 20, 2u64 << 30),
    };

    // 80% safe margin
    estimated.saturating_mul(80) / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "@compute @workgroup_size(1) fn main() {}";
    const BAD: &str = "@compute fn main( {";

    #[test]
    fn test_error_scopes_stay_with_their_thread() {
        let Ok(dev) = WgpuDevice::new() else {
            eprintln!("no wgpu adapter, skipping");
            return;
        };
        let gpu = &dev.gpu;
        std::thread::scope(|s| {
            for t in 0..8 {
                s.spawn(move || {
                    let bad = t % 2 == 0;
                    for _ in 0..16 {
                        let ((), err) = gpu.scoped(wgpu::ErrorFilter::Validation, |device| {
                            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                                label: None,
                                source: wgpu::ShaderSource::Wgsl(if bad { BAD } else { GOOD }.into()),
                            });
                        });
                        assert_eq!(err.is_some(), bad, "thread {t}");
                    }
                });
            }
        });
    }
}
