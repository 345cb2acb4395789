//! GPU context management for buffer and pipeline operations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use crate::device::allocator::Allocator;
use crate::{Buffer, Element, Error};

/// Cache for compute pipelines keyed by a caller-chosen label.
///
/// Kernels in this crate are parameterized at shader-generation time by
/// runtime values (the alphabet bound `K`, the direct/tiled variant) rather
/// than purely by Rust type, so the cache key is a label string the kernel
/// builds from those values rather than a [`core::any::TypeId`].
type PipelineCache = RwLock<HashMap<String, Arc<wgpu::ComputePipeline>>>;

/// Global pool of GPU contexts keyed by adapter index.
static POOL: OnceLock<Mutex<HashMap<usize, Arc<ContextInner>>>> = OnceLock::new();

/// Internal GPU context state shared via Arc.
struct ContextInner {
    adapter_index: usize,
    adapter_name: String,
    device: wgpu::Device,
    queue: wgpu::Queue,
    allocator: Allocator,
    pipelines: PipelineCache,
}

/// Central GPU context for buffer and pipeline management.
///
/// Wraps a `wgpu` device and queue, pools storage buffers through an
/// [`Allocator`], and caches compiled compute pipelines.
///
/// Contexts are pooled by adapter index — creating multiple contexts for
/// the same adapter returns the same underlying resources.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Creates a GPU context for the specified adapter index.
    ///
    /// Contexts are pooled — calling with the same index returns a clone
    /// of the existing context.
    ///
    /// Requests [`wgpu::Features::SHADER_INT64`], which the pair-confusion
    /// reduction kernel (see [`crate::kernel::ari`]) relies on for overflow-
    /// free 64-bit accumulation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if no adapter exists at the given index,
    /// the adapter lacks `SHADER_INT64`, or device creation otherwise fails.
    pub fn new(adapter_index: usize) -> Result<Self, Error> {
        let pool = POOL.get_or_init(|| Mutex::new(HashMap::new()));
        let mut pool = pool.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(inner) = pool.get(&adapter_index) {
            return Ok(Self {
                inner: Arc::clone(inner),
            });
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapters = instance.enumerate_adapters(wgpu::Backends::all());
        let adapter = adapters
            .into_iter()
            .nth(adapter_index)
            .ok_or_else(|| Error::Device(format!("no adapter at index {adapter_index}")))?;

        let adapter_name = adapter.get_info().name.clone();

        if !adapter.features().contains(wgpu::Features::SHADER_INT64) {
            return Err(Error::Device(format!(
                "adapter '{adapter_name}' does not support SHADER_INT64, required for \
                 overflow-free pair-confusion accumulation"
            )));
        }

        // Request the adapter's own limits rather than `wgpu::Limits::default()`:
        // the tiled contingency builder's staging tile alone (S=2048 elements,
        // two i32 arrays) needs 16 KiB of workgroup storage, leaving no room
        // under the conservative WebGPU-portable default for the contingency
        // matrix itself once K grows past a handful of labels.
        let required_limits = adapter.limits();

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::SHADER_INT64,
            required_limits,
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| Error::Device(format!("failed to create device: {e}")))?;

        let allocator = Allocator::new(device.clone());

        let inner = Arc::new(ContextInner {
            adapter_index,
            adapter_name,
            device,
            queue,
            allocator,
            pipelines: RwLock::new(HashMap::new()),
        });
        pool.insert(adapter_index, Arc::clone(&inner));

        Ok(Self { inner })
    }

    /// Creates a GPU context using a high-performance adapter, without
    /// panicking if none is available.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if no suitable adapter exists or device
    /// creation fails.
    pub fn try_default() -> Result<Self, Error> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| Error::Device(format!("no suitable GPU adapter found: {e}")))?;

        let adapters = instance.enumerate_adapters(wgpu::Backends::all());
        let adapter_info = adapter.get_info();
        let adapter_index = adapters
            .iter()
            .position(|a| a.get_info().name == adapter_info.name)
            .unwrap_or(0);

        Self::new(adapter_index)
    }

    /// Creates an uninitialized GPU buffer with the given number of elements.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if buffer size overflows or exceeds the
    /// allocator's device-limit-derived ceiling.
    pub(crate) fn create_buffer<T: Element>(&self, len: usize) -> Result<Buffer<T>, Error> {
        let size: u64 = len
            .checked_mul(core::mem::size_of::<T>())
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| Error::Device("buffer size overflow".into()))?;

        let buffer = self.inner.allocator.allocate(size)?;

        Ok(Buffer::new(buffer, len))
    }

    /// Creates a GPU buffer initialized with data copied from a slice.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if buffer length overflows or exceeds the
    /// allocator's device-limit-derived ceiling.
    pub(crate) fn create_buffer_from_slice<T: Element>(
        &self,
        data: &[T],
    ) -> Result<Buffer<T>, Error> {
        let buffer = self.create_buffer::<T>(data.len())?;
        self.inner
            .queue
            .write_buffer(buffer.inner(), 0, bytemuck::cast_slice(data));
        Ok(buffer)
    }

    /// Creates a small uniform buffer from a single `Pod` value.
    pub(crate) fn create_uniform_buffer<P: bytemuck::Pod>(&self, data: &P) -> wgpu::Buffer {
        use wgpu::util::DeviceExt as _;

        self.inner
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: None,
                contents: bytemuck::bytes_of(data),
                usage: wgpu::BufferUsages::UNIFORM,
            })
    }

    /// Copies buffer contents from GPU to CPU memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if the read operation fails.
    pub(crate) fn read_buffer<T: Element>(&self, buffer: &Buffer<T>) -> Result<Vec<T>, Error> {
        if buffer.is_empty() {
            return Ok(Vec::new());
        }

        let size = buffer.byte_size();

        let staging = self.inner.device.create_buffer(&wgpu::BufferDescriptor {
            label: None,
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .inner
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        encoder.copy_buffer_to_buffer(buffer.inner(), 0, &staging, 0, size);
        self.inner.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        self.inner
            .device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| Error::Device(format!("device poll failed: {e}")))?;

        rx.recv()
            .map_err(|_| Error::Device("internal channel error".into()))?
            .map_err(|e| Error::Device(format!("buffer mapping failed: {e}")))?;

        let data = slice.get_mapped_range();
        let result: Vec<T> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging.unmap();

        Ok(result)
    }

    /// Returns the adapter index.
    pub(crate) fn adapter_index(&self) -> usize {
        self.inner.adapter_index
    }

    /// Returns the wgpu device.
    pub(crate) fn device(&self) -> &wgpu::Device {
        &self.inner.device
    }

    /// Returns the wgpu queue.
    pub(crate) fn queue(&self) -> &wgpu::Queue {
        &self.inner.queue
    }

    /// Returns the per-workgroup shared-memory storage limit, in bytes, that
    /// the host driver checks the inferred scratch footprint against.
    pub(crate) fn max_workgroup_storage_size(&self) -> u64 {
        u64::from(self.inner.device.limits().max_compute_workgroup_storage_size)
    }

    /// Returns the maximum workgroup count along a single dispatch dimension.
    pub(crate) fn max_workgroups_per_dimension(&self) -> u32 {
        self.inner.device.limits().max_compute_workgroups_per_dimension
    }

    /// Blocks until all submitted work on this context's queue completes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if the poll fails.
    pub(crate) fn sync(&self) -> Result<(), Error> {
        self.inner
            .device
            .poll(wgpu::PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(|e| Error::Device(format!("device poll failed: {e}")))
    }

    /// Gets or creates a cached compute pipeline for the given key.
    ///
    /// The key must uniquely identify the shader source the factory would
    /// produce — kernels build it from their kernel name plus whatever
    /// runtime parameters (alphabet bound, tile variant) select a distinct
    /// WGSL program.
    pub(crate) fn get_or_create_pipeline(
        &self,
        key: &str,
        create_fn: impl FnOnce(&wgpu::Device) -> wgpu::ComputePipeline,
    ) -> Arc<wgpu::ComputePipeline> {
        {
            let cache = self
                .inner
                .pipelines
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(pipeline) = cache.get(key) {
                return Arc::clone(pipeline);
            }
        }

        let mut cache = self
            .inner
            .pipelines
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(pipeline) = cache.get(key) {
            return Arc::clone(pipeline);
        }

        let pipeline = Arc::new(create_fn(&self.inner.device));
        cache.insert(key.into(), Arc::clone(&pipeline));

        pipeline
    }

    /// Releases a transient buffer back to the allocator's pool.
    pub(crate) fn release_buffer(&self, buffer: wgpu::Buffer) {
        self.inner.allocator.release(buffer);
    }
}

impl Default for Context {
    /// Creates a GPU context with a high-performance adapter.
    ///
    /// # Panics
    ///
    /// Panics if no suitable GPU adapter is found or device creation fails.
    fn default() -> Self {
        Self::try_default().expect("failed to create GPU context")
    }
}

impl core::fmt::Debug for Context {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let pipelines = self
            .inner
            .pipelines
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        f.debug_struct("Context")
            .field("adapter_index", &self.inner.adapter_index)
            .field("adapter_name", &self.inner.adapter_name)
            .field("allocator", &self.inner.allocator)
            .field("pipelines_cached", &pipelines.len())
            .finish_non_exhaustive()
    }
}
