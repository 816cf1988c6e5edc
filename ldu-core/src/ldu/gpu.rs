//! Device-resident LDU addressing, coefficients and the per-cell kernels.
//!
//! Arrays are packed in pairs (`[owner | neighbour]`, `[owner_start |
//! losort_start]`, `[lower | upper]`) so that the multiply kernel binds seven
//! storage buffers, within the eight every WebGPU device guarantees.

use super::addressing::LduAddressing;
use super::matrix::LduMatrix;
use super::multiply::MultiplyFlags;
use super::patch::PatchAddressing;
use crate::context::{Binding, GpuContext};
use crate::error::{check_sizes, LduError, Result};
use crate::gpu_field::{to_u32, upload, GpuField, FIELD_USAGE};
use crate::ops::{self, KernelParams};
use crate::traits::LduShape;
use std::borrow::Cow;
use std::sync::Arc;

const MULTIPLY_SHADER: &str = include_str!("../shaders/ldu_multiply.wgsl");
const SUM_SHADER: &str = include_str!("../shaders/ldu_sum.wgsl");
const PATCH_SHADER: &str = include_str!("../shaders/patch_correct.wgsl");

/// Device copy of an [`LduAddressing`]; carries the same topology epoch.
#[derive(Debug)]
pub struct GpuLduAddressing {
    n_cells: usize,
    n_faces: usize,
    epoch: u64,
    faces: wgpu::Buffer,
    starts: wgpu::Buffer,
    losort: wgpu::Buffer,
}

impl GpuLduAddressing {
    pub(crate) fn new_internal(context: &GpuContext, addressing: &LduAddressing) -> Result<Self> {
        let mut faces = to_u32(addressing.owner())?;
        faces.extend(to_u32(addressing.neighbour())?);
        let mut starts = to_u32(addressing.owner_start())?;
        starts.extend(to_u32(addressing.losort_start())?);
        let losort = to_u32(addressing.losort())?;

        Ok(Self {
            n_cells: addressing.n_cells(),
            n_faces: addressing.n_faces(),
            epoch: addressing.epoch(),
            faces: upload(context, "LDU Faces Buffer", &faces, wgpu::BufferUsages::STORAGE),
            starts: upload(context, "LDU Starts Buffer", &starts, wgpu::BufferUsages::STORAGE),
            losort: upload(context, "LDU Losort Buffer", &losort, wgpu::BufferUsages::STORAGE),
        })
    }

    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    pub fn n_faces(&self) -> usize {
        self.n_faces
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Device copy of an [`LduMatrix`] in single precision.
#[derive(Debug)]
pub struct GpuLduMatrix {
    addressing: Arc<GpuLduAddressing>,
    diag: GpuField,
    coeffs: wgpu::Buffer,
}

impl GpuLduMatrix {
    pub(crate) fn new_internal(
        context: &Arc<GpuContext>,
        matrix: &LduMatrix,
        addressing: Arc<GpuLduAddressing>,
    ) -> Result<Self> {
        if matrix.addressing().epoch() != addressing.epoch {
            return Err(LduError::topology(format!(
                "matrix of epoch {} uploaded against device addressing of epoch {}",
                matrix.addressing().epoch(),
                addressing.epoch
            )));
        }
        let diag: Vec<f32> = matrix.diag_or_zero().iter().map(|&d| d as f32).collect();
        let coeffs: Vec<f32> = matrix
            .lower_or_zero()
            .iter()
            .chain(matrix.upper_or_zero().iter())
            .map(|&c| c as f32)
            .collect();

        Ok(Self {
            diag: GpuField::new_internal(
                upload(context, "LDU Diagonal Buffer", &diag, FIELD_USAGE),
                diag.len(),
                "LDU Diagonal".to_string(),
                Arc::clone(context),
            ),
            coeffs: upload(context, "LDU Coefficients Buffer", &coeffs, wgpu::BufferUsages::STORAGE),
            addressing,
        })
    }

    pub fn addressing(&self) -> &Arc<GpuLduAddressing> {
        &self.addressing
    }

    /// Diagonal coefficients as a device field.
    pub fn diag(&self) -> &GpuField {
        &self.diag
    }
}

impl LduShape for GpuLduMatrix {
    type Value = f32;

    fn n_cells(&self) -> usize {
        self.addressing.n_cells
    }

    fn n_faces(&self) -> usize {
        self.addressing.n_faces
    }
}

/// Device copy of a [`PatchAddressing`].
#[derive(Debug)]
pub struct GpuPatch {
    n_cells: usize,
    n_faces: usize,
    cell_start: wgpu::Buffer,
    face_order: wgpu::Buffer,
}

impl GpuPatch {
    pub(crate) fn new_internal(context: &GpuContext, patch: &PatchAddressing) -> Result<Self> {
        let cell_start = to_u32(patch.cell_start())?;
        let face_order = to_u32(patch.face_order())?;
        Ok(Self {
            n_cells: patch.n_cells(),
            n_faces: patch.n_faces(),
            cell_start: upload(context, "Patch Cell Start Buffer", &cell_start, wgpu::BufferUsages::STORAGE),
            face_order: upload(context, "Patch Face Order Buffer", &face_order, wgpu::BufferUsages::STORAGE),
        })
    }

    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    pub fn n_faces(&self) -> usize {
        self.n_faces
    }
}

fn flag_bits(add: bool, upper_on_owner: bool) -> u32 {
    (add as u32) | ((upper_on_owner as u32) << 1)
}

pub(crate) fn internal_multiply_with_seed(
    context: &GpuContext,
    matrix: &GpuLduMatrix,
    seed: &GpuField,
    psi: &GpuField,
    flags: MultiplyFlags,
    out: &mut GpuField,
) -> Result<()> {
    let n = matrix.n_cells();
    check_sizes("ldu multiply", n, psi.len())?;
    check_sizes("ldu multiply seed", n, seed.len())?;
    check_sizes("ldu multiply result", n, out.len())?;

    let kernel = context.kernel("ldu_multiply", &ops::bindings(6, Binding::WRITE), || {
        Cow::Borrowed(MULTIPLY_SHADER)
    })?;
    let params = KernelParams {
        aux: matrix.n_faces() as u32,
        flags: flag_bits(flags.include_off_diagonal, flags.use_upper_as_owner_coefficient),
        ..KernelParams::new(n)
    };
    let addressing = &matrix.addressing;
    ops::launch(
        context,
        &kernel,
        "ldu_multiply",
        params,
        &[
            &addressing.faces,
            &addressing.starts,
            &addressing.losort,
            &matrix.coeffs,
            seed.inner(),
            psi.inner(),
            out.inner(),
        ],
        n,
    );
    Ok(())
}

pub(crate) fn internal_row_sum(
    context: &GpuContext,
    matrix: &GpuLduMatrix,
    seed: &wgpu::Buffer,
    add: bool,
    out: &mut GpuField,
) -> Result<()> {
    let n = matrix.n_cells();
    check_sizes("ldu row sum", n, out.len())?;

    let kernel = context.kernel("ldu_sum", &ops::bindings(4, Binding::WRITE), || {
        Cow::Borrowed(SUM_SHADER)
    })?;
    let params = KernelParams {
        aux: matrix.n_faces() as u32,
        flags: flag_bits(add, false),
        ..KernelParams::new(n)
    };
    let addressing = &matrix.addressing;
    ops::launch(
        context,
        &kernel,
        "ldu_sum",
        params,
        &[
            &addressing.starts,
            &addressing.losort,
            &matrix.coeffs,
            seed,
            out.inner(),
        ],
        n,
    );
    Ok(())
}

pub(crate) fn internal_patch_correct(
    context: &GpuContext,
    sum: &mut GpuField,
    patch: &GpuPatch,
    coeffs: &GpuField,
    add: bool,
) -> Result<()> {
    check_sizes("patch correction", patch.n_cells, sum.len())?;
    check_sizes("patch coefficients", patch.n_faces, coeffs.len())?;

    let kernel = context.kernel("patch_correct", &ops::bindings(3, Binding::WRITE), || {
        Cow::Borrowed(PATCH_SHADER)
    })?;
    let params = KernelParams {
        flags: flag_bits(add, false),
        ..KernelParams::new(patch.n_cells)
    };
    ops::launch(
        context,
        &kernel,
        "patch_correct",
        params,
        &[&patch.cell_start, &patch.face_order, coeffs.inner(), sum.inner()],
        patch.n_cells,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_bits_match_the_shader_layout() {
        let amul = MultiplyFlags::AMUL;
        assert_eq!(flag_bits(amul.include_off_diagonal, amul.use_upper_as_owner_coefficient), 3);
        let tres = MultiplyFlags::T_RESIDUAL;
        assert_eq!(flag_bits(tres.include_off_diagonal, tres.use_upper_as_owner_coefficient), 0);
        assert_eq!(flag_bits(false, true), 2);
    }
}
