/// Parameters for acquiring the compute device.
///
/// `Default` picks a high-performance adapter on the primary native backends
/// and requests no optional features.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub backends: wgpu::Backends,
    pub power_preference: wgpu::PowerPreference,
    /// Accept a software adapter (useful on CI machines without a GPU).
    pub force_fallback_adapter: bool,
    pub label: String,
    /// Request `SHADER_FLOAT32_ATOMIC` when the adapter offers it.
    pub request_float_atomics: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::PRIMARY,
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            label: "ldu_core device".to_string(),
            request_float_atomics: false,
        }
    }
}

impl DeviceConfig {
    /// Any backend, any adapter, software rasterizers included.
    pub fn permissive() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::None,
            ..Self::default()
        }
    }
}
