//! Which element types support an atomic add on a given device.
//!
//! The per-cell LDU kernels never need atomics. Scatter-style assembly outside
//! them does, and asks here first. The answer is fixed per type except for the
//! wider or floating types, which depend on optional device features.

use crate::error::{LduError, Result};

/// Feature and limit summary of a device, as far as the kernels care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    pub float32_atomics: bool,
    pub int64_atomics: bool,
    pub max_storage_buffers_per_stage: u32,
    pub max_workgroups_per_dimension: u32,
}

impl Default for DeviceCapabilities {
    /// The guaranteed WebGPU baseline: no optional atomics.
    fn default() -> Self {
        let limits = wgpu::Limits::default();
        Self {
            float32_atomics: false,
            int64_atomics: false,
            max_storage_buffers_per_stage: limits.max_storage_buffers_per_shader_stage,
            max_workgroups_per_dimension: limits.max_compute_workgroups_per_dimension,
        }
    }
}

impl DeviceCapabilities {
    pub fn from_device(device: &wgpu::Device) -> Self {
        let features = device.features();
        let limits = device.limits();
        Self {
            float32_atomics: features.contains(wgpu::Features::SHADER_FLOAT32_ATOMIC),
            int64_atomics: features.contains(wgpu::Features::SHADER_INT64_ATOMIC_ALL_OPS),
            max_storage_buffers_per_stage: limits.max_storage_buffers_per_shader_stage,
            max_workgroups_per_dimension: limits.max_compute_workgroups_per_dimension,
        }
    }
}

/// Element types for which the atomic-add question can be asked at all.
///
/// A type without an impl is rejected at compile time.
pub trait AtomicAdd: Copy + 'static {
    const TYPE_NAME: &'static str;
    fn supported(caps: &DeviceCapabilities) -> bool;
}

impl AtomicAdd for i32 {
    const TYPE_NAME: &'static str = "i32";
    fn supported(_caps: &DeviceCapabilities) -> bool {
        true
    }
}

impl AtomicAdd for u32 {
    const TYPE_NAME: &'static str = "u32";
    fn supported(_caps: &DeviceCapabilities) -> bool {
        true
    }
}

impl AtomicAdd for i64 {
    const TYPE_NAME: &'static str = "i64";
    fn supported(caps: &DeviceCapabilities) -> bool {
        caps.int64_atomics
    }
}

impl AtomicAdd for f32 {
    const TYPE_NAME: &'static str = "f32";
    fn supported(caps: &DeviceCapabilities) -> bool {
        caps.float32_atomics
    }
}

impl AtomicAdd for f64 {
    const TYPE_NAME: &'static str = "f64";
    // WGSL has no 64-bit float atomics on any backend.
    fn supported(_caps: &DeviceCapabilities) -> bool {
        false
    }
}

pub fn has_atomic_add<T: AtomicAdd>(caps: &DeviceCapabilities) -> bool {
    T::supported(caps)
}

/// Fails with `UnsupportedElementType` when `T` has no atomic add on this device.
pub fn require_atomic_add<T: AtomicAdd>(caps: &DeviceCapabilities, operation: &str) -> Result<()> {
    if T::supported(caps) {
        return Ok(());
    }
    log::error!("{} needs an atomic add on {}, which this device lacks", operation, T::TYPE_NAME);
    Err(LduError::UnsupportedElementType {
        type_name: T::TYPE_NAME,
        operation: operation.to_string(),
    })
}
