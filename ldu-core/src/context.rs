use crate::capability::DeviceCapabilities;
use crate::config::DeviceConfig;
use crate::error::{LduError, Result};
use bytemuck::{Pod, Zeroable};
use cfg_if::cfg_if;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use wgpu::{util::DeviceExt, PollType};

/// A compiled compute kernel: its bind group layout and pipeline.
#[derive(Debug)]
pub(crate) struct CachedKernel {
    pub(crate) layout: wgpu::BindGroupLayout,
    pub(crate) pipeline: wgpu::ComputePipeline,
}

/// Binding kinds of a kernel, in binding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Binding {
    Uniform,
    Storage { read_only: bool },
}

impl Binding {
    pub(crate) const READ: Binding = Binding::Storage { read_only: true };
    pub(crate) const WRITE: Binding = Binding::Storage { read_only: false };

    fn layout_entry(self, binding: u32) -> wgpu::BindGroupLayoutEntry {
        let ty = match self {
            Binding::Uniform => wgpu::BufferBindingType::Uniform,
            Binding::Storage { read_only } => wgpu::BufferBindingType::Storage { read_only },
        };
        wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }
    }
}

/// Device, queue, transfer counters and the kernel cache shared by every GPU object.
#[derive(Debug)]
pub(crate) struct GpuContext {
    pub(crate) device: Arc<wgpu::Device>,
    pub(crate) queue: Arc<wgpu::Queue>,
    pub(crate) adapter_info: wgpu::AdapterInfo,
    pub(crate) capabilities: DeviceCapabilities,
    /// Bytes uploaded through the instrumented helpers.
    pub(crate) bytes_to_gpu: Arc<AtomicU64>,
    /// Bytes read back through the instrumented helpers.
    pub(crate) bytes_from_gpu: Arc<AtomicU64>,
    kernels: Mutex<HashMap<String, Arc<CachedKernel>>>,
}

impl GpuContext {
    pub(crate) async fn new(config: &DeviceConfig) -> Result<Self> {
        log::info!("Initializing WGPU context ({:?})", config.backends);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: config.backends,
            ..Default::default()
        });

        log::debug!("Requesting adapter");
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference,
                compatible_surface: None,
                force_fallback_adapter: config.force_fallback_adapter,
            })
            .await
            .map_err(|e| LduError::WgpuInitError(format!("No suitable adapter found: {}", e)))?;

        let adapter_info = adapter.get_info();
        log::info!("Selected adapter: {:?}", adapter_info);
        log::info!("Adapter features: {:?}", adapter.features());

        let mut required_features = wgpu::Features::empty();
        if config.request_float_atomics {
            if adapter.features().contains(wgpu::Features::SHADER_FLOAT32_ATOMIC) {
                required_features |= wgpu::Features::SHADER_FLOAT32_ATOMIC;
            } else {
                log::warn!("SHADER_FLOAT32_ATOMIC requested but not offered by the adapter");
            }
        }

        let limits = wgpu::Limits::default().using_resolution(adapter.limits());
        log::debug!(
            "Storage buffers per stage: {}, workgroups per dimension: {}",
            limits.max_storage_buffers_per_shader_stage,
            limits.max_compute_workgroups_per_dimension
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some(&config.label),
                trace: wgpu::Trace::Off,
                memory_hints: wgpu::MemoryHints::Performance,
                required_features,
                required_limits: limits,
            })
            .await
            .map_err(|e| LduError::WgpuInitError(format!("Failed to request device: {}", e)))?;

        let capabilities = DeviceCapabilities::from_device(&device);
        log::info!("Device and queue obtained ({:?})", capabilities);

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_info,
            capabilities,
            bytes_to_gpu: Arc::new(AtomicU64::new(0)),
            bytes_from_gpu: Arc::new(AtomicU64::new(0)),
            kernels: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the kernel cached under `key`, compiling `source` on first use.
    pub(crate) fn kernel<F>(&self, key: &str, bindings: &[Binding], source: F) -> Result<Arc<CachedKernel>>
    where
        F: FnOnce() -> Cow<'static, str>,
    {
        let mut kernels = self
            .kernels
            .lock()
            .map_err(|_| LduError::Internal("kernel cache lock poisoned".to_string()))?;
        if let Some(kernel) = kernels.get(key) {
            return Ok(Arc::clone(kernel));
        }

        log::debug!("Compiling kernel '{}'", key);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(key),
            source: wgpu::ShaderSource::Wgsl(source()),
        });
        let entries: Vec<wgpu::BindGroupLayoutEntry> = bindings
            .iter()
            .enumerate()
            .map(|(i, b)| b.layout_entry(i as u32))
            .collect();
        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(key),
                entries: &entries,
            });
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(key),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(key),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            });

        let kernel = Arc::new(CachedKernel { layout, pipeline });
        kernels.insert(key.to_string(), Arc::clone(&kernel));
        Ok(kernel)
    }

    /// Creates a buffer holding `contents` and counts the upload.
    pub(crate) fn create_gpu_buffer_with_data(
        &self,
        label: &str,
        contents: &[u8],
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        let byte_len = contents.len() as u64;
        log::debug!("Creating GPU buffer '{}' with {} bytes", label, byte_len);
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            });
        self.bytes_to_gpu.fetch_add(byte_len, Ordering::Relaxed);
        log::trace!(
            "bytes_to_gpu incremented by {}, now: {}",
            byte_len,
            self.bytes_to_gpu.load(Ordering::Relaxed)
        );
        buffer
    }

    /// Creates an uninitialised buffer. Not counted as a transfer.
    pub(crate) fn create_empty_buffer(
        &self,
        label: &str,
        size: u64,
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        log::debug!("Creating empty GPU buffer '{}' of size {}", label, size);
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        })
    }

    /// Writes `data` at the start of `buffer` through the queue.
    pub(crate) fn write_buffer<T: Pod>(&self, buffer: &wgpu::Buffer, data: &[T]) -> Result<()> {
        let byte_len = std::mem::size_of_val(data) as u64;
        if byte_len == 0 {
            return Ok(());
        }
        if buffer.size() < byte_len {
            return Err(LduError::Internal(format!(
                "Target buffer size ({}) is smaller than data size ({})",
                buffer.size(),
                byte_len
            )));
        }
        if !buffer.usage().contains(wgpu::BufferUsages::COPY_DST) {
            return Err(LduError::Internal(
                "Target buffer must have COPY_DST usage".to_string(),
            ));
        }

        log::debug!("Writing {} bytes to buffer", byte_len);
        self.queue.write_buffer(buffer, 0, bytemuck::cast_slice(data));
        self.bytes_to_gpu.fetch_add(byte_len, Ordering::Relaxed);
        log::trace!(
            "bytes_to_gpu incremented by {} (write_buffer), now: {}",
            byte_len,
            self.bytes_to_gpu.load(Ordering::Relaxed)
        );
        Ok(())
    }

    /// Copies the first `element_count` elements of `buffer` back to the host.
    pub(crate) async fn read_buffer_to_cpu<T: Pod + Zeroable>(
        &self,
        buffer: &wgpu::Buffer,
        element_count: usize,
    ) -> Result<Vec<T>> {
        let size_bytes = (element_count * std::mem::size_of::<T>()) as u64;
        if size_bytes == 0 {
            return Ok(Vec::new());
        }
        if buffer.size() < size_bytes {
            return Err(LduError::Internal(format!(
                "GPU buffer size ({}) is smaller than the requested readback ({})",
                buffer.size(),
                size_bytes
            )));
        }

        let staging_buffer = self.create_empty_buffer(
            "staging_buffer_for_readback",
            size_bytes,
            wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        );
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("read_buffer_encoder"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging_buffer, 0, size_bytes);
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            if let Err(e) = sender.send(result) {
                log::error!("Failed to send map result back: {:?}", e);
            }
        });

        self.bytes_from_gpu.fetch_add(size_bytes, Ordering::Relaxed);
        log::trace!(
            "bytes_from_gpu incremented by {}, now: {}",
            size_bytes,
            self.bytes_from_gpu.load(Ordering::Relaxed)
        );

        cfg_if! {
            if #[cfg(not(target_arch = "wasm32"))] {
                let _ = self.device.poll(PollType::Wait);
            }
        }

        match receiver.await {
            Ok(Ok(())) => {
                let result = {
                    let data = buffer_slice.get_mapped_range();
                    bytemuck::cast_slice::<u8, T>(&data).to_vec()
                };
                staging_buffer.unmap();
                log::debug!("Buffer readback complete ({} bytes)", size_bytes);
                Ok(result)
            }
            Ok(Err(e)) => {
                log::error!("Failed to map buffer: {:?}", e);
                Err(LduError::WgpuError(format!("Buffer mapping failed: {}", e)))
            }
            Err(_) => Err(LduError::Internal(
                "Channel receive error during buffer mapping".to_string(),
            )),
        }
    }

    /// Blocks until all submitted work has finished.
    pub(crate) fn wait(&self) {
        cfg_if! {
            if #[cfg(not(target_arch = "wasm32"))] {
                let _ = self.device.poll(PollType::Wait);
            }
        }
    }

    pub(crate) fn get_transfer_stats(&self) -> (u64, u64) {
        (
            self.bytes_to_gpu.load(Ordering::Relaxed),
            self.bytes_from_gpu.load(Ordering::Relaxed),
        )
    }

    pub(crate) fn reset_transfer_stats(&self) {
        self.bytes_to_gpu.store(0, Ordering::Relaxed);
        self.bytes_from_gpu.store(0, Ordering::Relaxed);
        log::info!("GPU transfer counters reset.");
    }
}
