use crate::context::GpuContext;
use crate::error::{check_sizes, LduError, Result};
use crate::field::Label;
use crate::indirect::is_duplicate_free;
use crate::traits::FieldStorage;
use std::sync::Arc;

pub(crate) const FIELD_USAGE: wgpu::BufferUsages = wgpu::BufferUsages::STORAGE
    .union(wgpu::BufferUsages::COPY_SRC)
    .union(wgpu::BufferUsages::COPY_DST);

/// Bytes for `len` 4-byte elements. Empty arrays still get one element, since
/// a zero-sized binding is invalid.
pub(crate) fn padded_size(len: usize) -> u64 {
    (len.max(1) * 4) as u64
}

/// Uploads `data`, padding an empty slice to a single zero element.
pub(crate) fn upload<T: bytemuck::Pod + Default>(
    context: &GpuContext,
    label: &str,
    data: &[T],
    usage: wgpu::BufferUsages,
) -> wgpu::Buffer {
    if data.is_empty() {
        context.create_gpu_buffer_with_data(label, bytemuck::bytes_of(&T::default()), usage)
    } else {
        context.create_gpu_buffer_with_data(label, bytemuck::cast_slice(data), usage)
    }
}

/// Converts host labels to device indices.
pub(crate) fn to_u32(labels: &[Label]) -> Result<Vec<u32>> {
    labels
        .iter()
        .map(|&l| {
            u32::try_from(l).map_err(|_| {
                LduError::InvalidDimensions(format!("index {} does not fit a device index", l))
            })
        })
        .collect()
}

/// A single-precision cell field living on the device.
#[derive(Debug)]
pub struct GpuField {
    buffer: wgpu::Buffer,
    len: usize,
    label: String,
    pub(crate) context: Arc<GpuContext>,
}

impl GpuField {
    pub(crate) fn new_internal(
        buffer: wgpu::Buffer,
        len: usize,
        label: String,
        context: Arc<GpuContext>,
    ) -> Self {
        Self {
            buffer,
            len,
            label,
            context,
        }
    }

    pub(crate) fn inner(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Reads the field back to the host, waiting for pending kernels.
    pub async fn read_contents(&self) -> Result<Vec<f32>> {
        self.context.read_buffer_to_cpu(&self.buffer, self.len).await
    }

    /// As [`read_contents`](Self::read_contents), widened to host scalars.
    pub async fn read_scalars(&self) -> Result<Vec<f64>> {
        Ok(self
            .read_contents()
            .await?
            .into_iter()
            .map(f64::from)
            .collect())
    }

    pub fn write_contents(&self, data: &[f32]) -> Result<()> {
        check_sizes("field write", self.len, data.len())?;
        self.context.write_buffer(&self.buffer, data)
    }

    /// Device-side copy of `source` into this field.
    pub fn copy_from(&mut self, source: &GpuField) -> Result<()> {
        check_sizes("field copy", self.len, source.len)?;
        if self.len == 0 {
            return Ok(());
        }
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("GpuField Copy Encoder"),
            });
        encoder.copy_buffer_to_buffer(&source.buffer, 0, &self.buffer, 0, (self.len * 4) as u64);
        self.context.queue.submit(Some(encoder.finish()));
        Ok(())
    }
}

impl FieldStorage for GpuField {
    type Value = f32;

    fn len(&self) -> usize {
        self.len
    }
}

/// A device-resident index list, used to address a [`GpuField`] indirectly.
#[derive(Debug)]
pub struct GpuLabels {
    buffer: wgpu::Buffer,
    len: usize,
    /// One past the largest index, zero for an empty list.
    bound: usize,
    unique: bool,
}

impl GpuLabels {
    pub(crate) fn new_internal(context: &GpuContext, label: &str, labels: &[Label]) -> Result<Self> {
        let indices = to_u32(labels)?;
        let bound = labels.iter().max().map_or(0, |&m| m + 1);
        let unique = is_duplicate_free(labels);
        let buffer = upload(context, label, &indices, wgpu::BufferUsages::STORAGE);
        Ok(Self {
            buffer,
            len: labels.len(),
            bound,
            unique,
        })
    }

    pub(crate) fn inner(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether no index appears twice. Scatters through a list with duplicates
    /// leave the written value of a repeated slot unspecified.
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Fails with `IndexOutOfRange` unless every index is below `len`.
    pub(crate) fn check_bound(&self, len: usize) -> Result<()> {
        if self.bound > len {
            log::error!("device index list addresses slot {} of a field of length {}", self.bound - 1, len);
            return Err(LduError::IndexOutOfRange {
                index: self.bound - 1,
                len,
            });
        }
        Ok(())
    }
}
