//! Kernel sources, argument binding and compiled programs.
//!
//! A [`KernelSource`] declares its parameters by name. [`Program::run`] takes a
//! [`KernelArgs`] set built by name too, so a kernel's parameter order never
//! leaks into the code that calls it.
//!
//! # WGSL layout
//!
//! Buffer parameters occupy `@group(0) @binding(0..)` in declaration order.
//! If the kernel has scalar parameters they are packed, in declaration order,
//! into one uniform block `array<vec4<u32>, 2>` at the next binding; float
//! scalars travel as raw bits and are recovered with `bitcast<f32>`. The
//! workgroup size is the pipeline-overridable constant `WG_SIZE`.

use std::fmt;

use bytemuck::Pod;
use grain_core::{Error, Result};
use tracing::trace;

use crate::buffer::DeviceMemory;
use crate::pool::PooledBuffer;
use crate::tiling::LineTiling;

/// Maximum scalar parameters per kernel (size of the uniform block).
pub const MAX_SCALARS: usize = 8;

/// Role of a kernel parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Buffer the kernel reads.
    Input,
    /// Buffer the kernel writes.
    Output,
    /// `u32` scalar.
    Uint,
    /// `f32` scalar.
    Float,
}

impl ParamKind {
    /// Buffer (as opposed to scalar) parameter.
    #[inline]
    pub fn is_buffer(self) -> bool {
        matches!(self, ParamKind::Input | ParamKind::Output)
    }

    fn label(self) -> &'static str {
        match self {
            ParamKind::Input => "an input buffer",
            ParamKind::Output => "an output buffer",
            ParamKind::Uint => "a u32",
            ParamKind::Float => "an f32",
        }
    }
}

/// Declared kernel parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    pub name: &'static str,
    pub kind: ParamKind,
}

impl Param {
    pub const fn input(name: &'static str) -> Self {
        Self { name, kind: ParamKind::Input }
    }

    pub const fn output(name: &'static str) -> Self {
        Self { name, kind: ParamKind::Output }
    }

    pub const fn uint(name: &'static str) -> Self {
        Self { name, kind: ParamKind::Uint }
    }

    pub const fn float(name: &'static str) -> Self {
        Self { name, kind: ParamKind::Float }
    }
}

/// Host implementation of a kernel: runs the whole dispatch.
pub type HostKernel = fn(&mut Invocation<'_>) -> Result<()>;

/// A kernel: declared parameters plus one implementation per backend.
pub struct KernelSource {
    /// Entry point name (also the WGSL entry point).
    pub name: &'static str,
    /// Parameters in binding order.
    pub params: &'static [Param],
    /// WGSL compute shader.
    pub wgsl: &'static str,
    /// Host implementation.
    pub host: HostKernel,
}

impl fmt::Debug for KernelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelSource")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl KernelSource {
    /// Look up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Number of buffer parameters (the scalar block binds after them).
    pub fn buffer_count(&self) -> usize {
        self.params.iter().filter(|p| p.kind.is_buffer()).count()
    }

    /// Number of scalar parameters.
    pub fn scalar_count(&self) -> usize {
        self.params.len() - self.buffer_count()
    }
}

/// Scalar argument value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Uint(u32),
    Float(f32),
}

impl Scalar {
    /// Raw bits as stored in the uniform block.
    #[inline]
    pub fn bits(self) -> u32 {
        match self {
            Scalar::Uint(v) => v,
            Scalar::Float(v) => v.to_bits(),
        }
    }
}

#[derive(Clone, Copy)]
pub(crate) enum Arg<'a> {
    Buffer(&'a dyn DeviceMemory),
    Scalar(Scalar),
}

impl std::fmt::Debug for Arg<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arg::Buffer(_) => f.write_str("Buffer(..)"),
            Arg::Scalar(s) => f.debug_tuple("Scalar").field(s).finish(),
        }
    }
}

/// Named arguments for one dispatch.
///
/// ```ignore
/// let args = KernelArgs::new()
///     .buffer("src", &frame)
///     .buffer("dst", &out)
///     .uint("width", 1920)
///     .float("p", 0.5);
/// program.run(&args)?;
/// ```
#[derive(Default)]
pub struct KernelArgs<'a> {
    args: Vec<(&'a str, Arg<'a>)>,
}

impl<'a> KernelArgs<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a pooled buffer.
    pub fn buffer(self, name: &'a str, buf: &'a PooledBuffer) -> Self {
        self.memory(name, buf.memory())
    }

    /// Bind raw device memory.
    pub fn memory(mut self, name: &'a str, mem: &'a dyn DeviceMemory) -> Self {
        self.args.push((name, Arg::Buffer(mem)));
        self
    }

    pub fn uint(mut self, name: &'a str, value: u32) -> Self {
        self.args.push((name, Arg::Scalar(Scalar::Uint(value))));
        self
    }

    pub fn float(mut self, name: &'a str, value: f32) -> Self {
        self.args.push((name, Arg::Scalar(Scalar::Float(value))));
        self
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

/// Resolve `args` against the declared parameters of `source`.
///
/// The result is in declaration order. Fails on unknown, duplicate or missing
/// names, kind mismatches, access violations and outputs aliasing another
/// argument.
pub(crate) fn bind<'a>(
    source: &KernelSource,
    args: &KernelArgs<'a>,
) -> Result<Vec<(Param, Arg<'a>)>> {
    for (i, (name, _)) in args.args.iter().enumerate() {
        if source.param(name).is_none() {
            return Err(Error::invalid_argument(format!(
                "kernel '{}' has no parameter '{}'",
                source.name, name
            )));
        }
        if args.args[..i].iter().any(|(n, _)| n == name) {
            return Err(Error::invalid_argument(format!(
                "kernel '{}': argument '{}' bound twice",
                source.name, name
            )));
        }
    }

    let mut slots = Vec::with_capacity(source.params.len());
    for p in source.params {
        let arg = args
            .args
            .iter()
            .find(|(n, _)| *n == p.name)
            .map(|(_, a)| *a)
            .ok_or_else(|| {
                Error::invalid_argument(format!(
                    "kernel '{}': missing argument '{}'",
                    source.name, p.name
                ))
            })?;

        let ok = match (p.kind, arg) {
            (ParamKind::Input, Arg::Buffer(m)) => {
                if !m.access().readable() {
                    return Err(Error::invalid_argument(format!(
                        "kernel '{}': '{}' is bound to a write-only buffer",
                        source.name, p.name
                    )));
                }
                true
            }
            (ParamKind::Output, Arg::Buffer(m)) => {
                if !m.access().writable() {
                    return Err(Error::invalid_argument(format!(
                        "kernel '{}': '{}' is bound to a read-only buffer",
                        source.name, p.name
                    )));
                }
                true
            }
            (ParamKind::Uint, Arg::Scalar(Scalar::Uint(_))) => true,
            (ParamKind::Float, Arg::Scalar(Scalar::Float(_))) => true,
            _ => false,
        };
        if !ok {
            return Err(Error::invalid_argument(format!(
                "kernel '{}': '{}' expects {}",
                source.name,
                p.name,
                p.kind.label()
            )));
        }
        if let Arg::Buffer(m) = arg {
            if m.is_freed() {
                return Err(Error::dispatch(format!(
                    "kernel '{}': buffer bound to '{}' was already freed",
                    source.name, p.name
                )));
            }
        }
        slots.push((*p, arg));
    }

    for (i, (p, a)) in slots.iter().enumerate() {
        let (ParamKind::Output, Arg::Buffer(out)) = (p.kind, a) else {
            continue;
        };
        for (j, (q, b)) in slots.iter().enumerate() {
            if let Arg::Buffer(other) = b {
                if i != j && other.memory_id() == out.memory_id() {
                    return Err(Error::invalid_argument(format!(
                        "kernel '{}': output '{}' aliases '{}'",
                        source.name, p.name, q.name
                    )));
                }
            }
        }
    }

    Ok(slots)
}

/// Backend half of a compiled program.
pub(crate) trait ProgramBackend: Send + Sync {
    fn dispatch(
        &self,
        source: &'static KernelSource,
        tiling: LineTiling,
        slots: &[(Param, Arg<'_>)],
    ) -> Result<()>;
}

/// A kernel compiled for one device and one dispatch geometry.
pub struct Program {
    source: &'static KernelSource,
    tiling: LineTiling,
    backend: Box<dyn ProgramBackend>,
}

impl Program {
    pub(crate) fn new(
        source: &'static KernelSource,
        tiling: LineTiling,
        backend: Box<dyn ProgramBackend>,
    ) -> Self {
        Self {
            source,
            tiling,
            backend,
        }
    }

    pub fn name(&self) -> &'static str {
        self.source.name
    }

    pub fn tiling(&self) -> LineTiling {
        self.tiling
    }

    /// Bind `args` by name and dispatch; blocks until the kernel finished.
    pub fn run(&self, args: &KernelArgs<'_>) -> Result<()> {
        let slots = bind(self.source, args)?;
        trace!(
            kernel = self.source.name,
            groups = self.tiling.height,
            items_per_group = self.tiling.work_items_per_group(),
            "dispatch"
        );
        self.backend.dispatch(self.source, self.tiling, &slots)
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("name", &self.source.name)
            .field("tiling", &self.tiling)
            .finish()
    }
}

/// Host view of one dispatch: bound buffers as typed slices plus scalars.
pub struct Invocation<'a> {
    pub(crate) kernel: &'static str,
    pub(crate) tiling: LineTiling,
    pub(crate) inputs: Vec<(&'static str, &'a [u8])>,
    pub(crate) outputs: Vec<(&'static str, Option<&'a mut [u8]>)>,
    pub(crate) scalars: Vec<(&'static str, Scalar)>,
}

impl<'a> Invocation<'a> {
    pub fn kernel(&self) -> &'static str {
        self.kernel
    }

    pub fn tiling(&self) -> LineTiling {
        self.tiling
    }

    /// Input buffer `name` viewed as `[T]`.
    pub fn input<T: Pod>(&self, name: &str) -> Result<&'a [T]> {
        let bytes: &'a [u8] = self
            .inputs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, b)| *b)
            .ok_or_else(|| self.unknown(name))?;
        bytemuck::try_cast_slice(bytes).map_err(|e| {
            Error::invalid_argument(format!("kernel '{}': input '{}': {e}", self.kernel, name))
        })
    }

    /// Output buffer `name` viewed as `[T]`. Each output can be taken once.
    pub fn output<T: Pod>(&mut self, name: &str) -> Result<&'a mut [T]> {
        let kernel = self.kernel;
        let slot = self
            .outputs
            .iter_mut()
            .find(|(n, _)| *n == name)
            .ok_or_else(|| {
                Error::invalid_argument(format!("kernel '{kernel}' has no output '{name}'"))
            })?;
        let bytes = slot.1.take().ok_or_else(|| {
            Error::invalid_argument(format!("kernel '{kernel}': output '{name}' taken twice"))
        })?;
        bytemuck::try_cast_slice_mut(bytes).map_err(|e| {
            Error::invalid_argument(format!("kernel '{kernel}': output '{name}': {e}"))
        })
    }

    pub fn uint(&self, name: &str) -> Result<u32> {
        match self.scalar(name)? {
            Scalar::Uint(v) => Ok(v),
            Scalar::Float(_) => Err(self.unknown(name)),
        }
    }

    pub fn float(&self, name: &str) -> Result<f32> {
        match self.scalar(name)? {
            Scalar::Float(v) => Ok(v),
            Scalar::Uint(_) => Err(self.unknown(name)),
        }
    }

    /// Fail unless a buffer holds at least `need` elements.
    pub fn expect_len(&self, name: &str, have: usize, need: usize) -> Result<()> {
        if have < need {
            return Err(Error::invalid_argument(format!(
                "kernel '{}': '{}' holds {} elements, dispatch needs {}",
                self.kernel, name, have, need
            )));
        }
        Ok(())
    }

    fn scalar(&self, name: &str) -> Result<Scalar> {
        self.scalars
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, s)| *s)
            .ok_or_else(|| self.unknown(name))
    }

    fn unknown(&self, name: &str) -> Error {
        Error::invalid_argument(format!("kernel '{}' has no parameter '{}'", self.kernel, name))
    }
}
