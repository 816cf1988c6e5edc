use crate::capability::{self, AtomicAdd, DeviceCapabilities};
use crate::config::DeviceConfig;
use crate::context::GpuContext;
use crate::error::Result;
use crate::field::operators::{Multiply, Subtract, WgslBinary, WgslUnary};
use crate::field::{Label, Scalar};
use crate::gpu_field::{padded_size, upload, GpuField, GpuLabels, FIELD_USAGE};
use crate::ldu::gpu::{self, GpuLduAddressing, GpuLduMatrix, GpuPatch};
use crate::ldu::{LduAddressing, LduMatrix, MultiplyFlags, PatchAddressing};
use crate::ops;
use crate::shader_gen::Shape;
use crate::traits::LduShape;
use std::sync::Arc;

/// Represents a GPU execution device, holding the WGPU context.
///
/// Every operation only records and submits work; results become visible
/// through [`GpuField::read_contents`], which waits for the queue.
#[derive(Debug, Clone)]
pub struct GpuDevice {
    pub(crate) context: Arc<GpuContext>,
}

impl GpuDevice {
    /// Acquires a device with [`DeviceConfig::default`].
    pub async fn new() -> Result<Self> {
        Self::with_config(DeviceConfig::default()).await
    }

    pub async fn with_config(config: DeviceConfig) -> Result<Self> {
        let context = GpuContext::new(&config).await?;
        log::info!("GpuDevice created successfully");
        Ok(Self {
            context: Arc::new(context),
        })
    }

    /// Blocking variant of [`GpuDevice::with_config`] for synchronous callers.
    #[cfg(feature = "native")]
    pub fn new_blocking(config: DeviceConfig) -> Result<Self> {
        pollster::block_on(Self::with_config(config))
    }

    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.context.capabilities
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.context.adapter_info
    }

    /// Whether kernels on this device may use an atomic add on `T`.
    pub fn has_atomic_add<T: AtomicAdd>(&self) -> bool {
        capability::has_atomic_add::<T>(&self.context.capabilities)
    }

    // --- Resource creation ---

    /// Creates a field initialised with `data`. An empty slice gives an empty field.
    pub fn create_field(&self, label: &str, data: &[f32]) -> GpuField {
        let buffer = upload(&self.context, label, data, FIELD_USAGE);
        GpuField::new_internal(buffer, data.len(), label.to_string(), Arc::clone(&self.context))
    }

    /// Creates a field from host scalars, narrowing to single precision.
    pub fn create_field_from_scalars(&self, label: &str, data: &[Scalar]) -> GpuField {
        let narrowed: Vec<f32> = data.iter().map(|&v| v as f32).collect();
        self.create_field(label, &narrowed)
    }

    /// Creates an uninitialised field of `len` elements.
    pub fn create_empty_field(&self, label: &str, len: usize) -> GpuField {
        let buffer = self
            .context
            .create_empty_buffer(label, padded_size(len), FIELD_USAGE);
        GpuField::new_internal(buffer, len, label.to_string(), Arc::clone(&self.context))
    }

    /// Uploads an index list for indirect access.
    pub fn create_labels(&self, label: &str, labels: &[Label]) -> Result<GpuLabels> {
        GpuLabels::new_internal(&self.context, label, labels)
    }

    /// Uploads a topology. Matrices sharing it share the returned handle.
    pub fn upload_addressing(&self, addressing: &LduAddressing) -> Result<Arc<GpuLduAddressing>> {
        log::debug!(
            "Uploading LDU addressing of epoch {} ({} cells, {} faces)",
            addressing.epoch(),
            addressing.n_cells(),
            addressing.n_faces()
        );
        Ok(Arc::new(GpuLduAddressing::new_internal(
            &self.context,
            addressing,
        )?))
    }

    /// Uploads the coefficients of `matrix`. Fails with `TopologyInvalid` when
    /// `addressing` was uploaded from another topology epoch.
    pub fn upload_matrix(
        &self,
        matrix: &LduMatrix,
        addressing: Arc<GpuLduAddressing>,
    ) -> Result<GpuLduMatrix> {
        GpuLduMatrix::new_internal(&self.context, matrix, addressing)
    }

    pub fn upload_patch(&self, patch: &PatchAddressing) -> Result<GpuPatch> {
        GpuPatch::new_internal(&self.context, patch)
    }

    // --- Elementwise algebra ---

    /// `out[i] = op(a[i], b[i])`.
    pub async fn field_field<Op: WgslBinary>(
        &self,
        a: &GpuField,
        b: &GpuField,
        out: &mut GpuField,
    ) -> Result<()> {
        ops::internal_field_field::<Op>(&self.context, a, b, out)
    }

    /// `out[i] = op(a[i], s)`.
    pub async fn field_scalar<Op: WgslBinary>(
        &self,
        a: &GpuField,
        s: f32,
        out: &mut GpuField,
    ) -> Result<()> {
        ops::internal_broadcast::<Op>(&self.context, Shape::FieldScalar, a, s, out)
    }

    /// `out[i] = op(s, b[i])`.
    pub async fn scalar_field<Op: WgslBinary>(
        &self,
        s: f32,
        b: &GpuField,
        out: &mut GpuField,
    ) -> Result<()> {
        ops::internal_broadcast::<Op>(&self.context, Shape::ScalarField, b, s, out)
    }

    /// `out[i] = f(a[i])`.
    pub async fn unary<F: WgslUnary>(&self, a: &GpuField, out: &mut GpuField) -> Result<()> {
        ops::internal_unary::<F>(&self.context, a, out)
    }

    // --- LDU kernels ---

    /// `out = seed (+|-) off-diagonal product`, selected by `flags`.
    pub async fn multiply_with_seed(
        &self,
        matrix: &GpuLduMatrix,
        seed: &GpuField,
        psi: &GpuField,
        flags: MultiplyFlags,
        out: &mut GpuField,
    ) -> Result<()> {
        gpu::internal_multiply_with_seed(&self.context, matrix, seed, psi, flags, out)
    }

    /// `out = A psi`.
    pub async fn amul(&self, matrix: &GpuLduMatrix, psi: &GpuField, out: &mut GpuField) -> Result<()> {
        let seed = self.diagonal_product(matrix, psi)?;
        gpu::internal_multiply_with_seed(&self.context, matrix, &seed, psi, MultiplyFlags::AMUL, out)
    }

    /// `out = A^T psi`.
    pub async fn tmul(&self, matrix: &GpuLduMatrix, psi: &GpuField, out: &mut GpuField) -> Result<()> {
        let seed = self.diagonal_product(matrix, psi)?;
        gpu::internal_multiply_with_seed(&self.context, matrix, &seed, psi, MultiplyFlags::TMUL, out)
    }

    /// `out = source - A psi`.
    pub async fn residual(
        &self,
        matrix: &GpuLduMatrix,
        psi: &GpuField,
        source: &GpuField,
        out: &mut GpuField,
    ) -> Result<()> {
        let diag_psi = self.diagonal_product(matrix, psi)?;
        let mut seed = self.create_empty_field("Residual Seed", matrix.n_cells());
        ops::internal_field_field::<Subtract>(&self.context, source, &diag_psi, &mut seed)?;
        gpu::internal_multiply_with_seed(
            &self.context,
            matrix,
            &seed,
            psi,
            MultiplyFlags::RESIDUAL,
            out,
        )
    }

    /// `out = -(A - D) psi`.
    pub async fn h_operator(
        &self,
        matrix: &GpuLduMatrix,
        psi: &GpuField,
        out: &mut GpuField,
    ) -> Result<()> {
        let zero = vec![0.0f32; matrix.n_cells()];
        let seed = self.create_field("H Operator Seed", &zero);
        gpu::internal_multiply_with_seed(
            &self.context,
            matrix,
            &seed,
            psi,
            MultiplyFlags::NEG_OFF_DIAGONAL,
            out,
        )
    }

    /// Diagonal plus (or minus) the off-diagonal coefficients of each row.
    pub async fn row_sum(
        &self,
        matrix: &GpuLduMatrix,
        include_off_diagonal: bool,
        out: &mut GpuField,
    ) -> Result<()> {
        gpu::internal_row_sum(
            &self.context,
            matrix,
            matrix.diag().inner(),
            include_off_diagonal,
            out,
        )
    }

    /// Subtracts each boundary face coefficient from its cell's entry of `sum`.
    pub async fn subtract_patch_coefficients(
        &self,
        sum: &mut GpuField,
        patch: &GpuPatch,
        coeffs: &GpuField,
    ) -> Result<()> {
        gpu::internal_patch_correct(&self.context, sum, patch, coeffs, false)
    }

    pub async fn add_patch_coefficients(
        &self,
        sum: &mut GpuField,
        patch: &GpuPatch,
        coeffs: &GpuField,
    ) -> Result<()> {
        gpu::internal_patch_correct(&self.context, sum, patch, coeffs, true)
    }

    fn diagonal_product(&self, matrix: &GpuLduMatrix, psi: &GpuField) -> Result<GpuField> {
        let mut seed = self.create_empty_field("Diagonal Product", matrix.n_cells());
        ops::internal_field_field::<Multiply>(&self.context, matrix.diag(), psi, &mut seed)?;
        Ok(seed)
    }

    // --- Indirect access ---

    /// `target[addr[i]] = source[i]`.
    pub async fn indirect_assign(
        &self,
        target: &mut GpuField,
        addr: &GpuLabels,
        source: &GpuField,
    ) -> Result<()> {
        ops::internal_indirect_assign(&self.context, target, addr, source)
    }

    /// `target[addr[i]] = value` for every `i`.
    pub async fn indirect_fill(
        &self,
        target: &mut GpuField,
        addr: &GpuLabels,
        value: f32,
    ) -> Result<()> {
        ops::internal_indirect_fill(&self.context, target, addr, value)
    }

    // --- Utility ---

    /// Blocks until every submitted kernel has finished.
    pub fn wait(&self) {
        self.context.wait();
    }

    /// Returns the current GPU transfer statistics.
    pub fn get_transfer_stats(&self) -> TransferStats {
        let (bytes_to_gpu, bytes_from_gpu) = self.context.get_transfer_stats();
        TransferStats {
            bytes_to_gpu,
            bytes_from_gpu,
        }
    }

    /// Resets the GPU transfer statistics counters to zero.
    pub fn reset_transfer_stats(&self) {
        self.context.reset_transfer_stats();
    }
}

/// Bytes moved between host and device since the last reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferStats {
    pub bytes_to_gpu: u64,
    pub bytes_from_gpu: u64,
}
