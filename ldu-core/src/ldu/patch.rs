//! Boundary patch coupling into the diagonal row sum.

use super::addressing::counting_sort;
use crate::error::{check_sizes, LduError, Result};
use crate::field::{FieldValue, Label};
use rayon::prelude::*;

/// Boundary faces of one patch, grouped by the cell that owns them.
///
/// Grouping turns the correction into a per-cell gather, the same way `losort`
/// does for internal faces.
#[derive(Debug, Clone)]
pub struct PatchAddressing {
    n_cells: usize,
    face_cells: Vec<Label>,
    cell_start: Vec<Label>,
    face_order: Vec<Label>,
}

impl PatchAddressing {
    pub fn new(n_cells: usize, face_cells: Vec<Label>) -> Result<Self> {
        if let Some((f, &c)) = face_cells.iter().enumerate().find(|&(_, &c)| c >= n_cells) {
            return Err(LduError::topology(format!(
                "patch face {} references cell {} in a mesh of {} cells",
                f, c, n_cells
            )));
        }
        let (cell_start, face_order) = counting_sort(n_cells, &face_cells);
        log::debug!("built patch addressing with {} faces", face_cells.len());
        Ok(Self {
            n_cells,
            face_cells,
            cell_start,
            face_order,
        })
    }

    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    pub fn n_faces(&self) -> usize {
        self.face_cells.len()
    }

    pub fn face_cells(&self) -> &[Label] {
        &self.face_cells
    }

    pub fn cell_start(&self) -> &[Label] {
        &self.cell_start
    }

    pub fn face_order(&self) -> &[Label] {
        &self.face_order
    }

    /// Patch faces attached to cell `c`.
    pub fn cell_faces(&self, c: Label) -> &[Label] {
        &self.face_order[self.cell_start[c]..self.cell_start[c + 1]]
    }

    fn correct<T: FieldValue>(&self, sum: &mut [T], coeffs: &[T], add: bool) -> Result<()> {
        check_sizes("patch correction", self.n_cells, sum.len())?;
        check_sizes("patch coefficients", self.n_faces(), coeffs.len())?;
        sum.par_iter_mut().enumerate().for_each(|(c, s)| {
            for &f in self.cell_faces(c) {
                *s = if add { *s + coeffs[f] } else { *s - coeffs[f] };
            }
        });
        Ok(())
    }
}

/// Subtracts each boundary face coefficient from its cell's entry in `sum`.
///
/// Not idempotent: every call subtracts again.
pub fn subtract_patch_coefficients<T: FieldValue>(
    sum: &mut [T],
    patch: &PatchAddressing,
    coeffs: &[T],
) -> Result<()> {
    patch.correct(sum, coeffs, false)
}

pub fn add_patch_coefficients<T: FieldValue>(
    sum: &mut [T],
    patch: &PatchAddressing,
    coeffs: &[T],
) -> Result<()> {
    patch.correct(sum, coeffs, true)
}

/// Layers the corrections of several patches onto an internal-face row sum.
pub fn apply_patch_corrections<T: FieldValue>(
    sum: &mut [T],
    patches: &[(&PatchAddressing, &[T])],
) -> Result<()> {
    for (patch, coeffs) in patches {
        subtract_patch_coefficients(sum, patch, coeffs)?;
    }
    Ok(())
}
