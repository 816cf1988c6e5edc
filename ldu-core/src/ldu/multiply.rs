//! Matrix-vector products, residuals and row sums on the host.
//!
//! Every kernel is a per-cell gather: a cell first walks the faces it owns (a
//! contiguous range) and then the faces it neighbours (its slice of `losort`).
//! Each cell writes only its own output slot, so the loop runs over cells on the
//! rayon pool without atomics.

use super::addressing::LduAddressing;
use super::matrix::LduMatrix;
use crate::error::{check_sizes, Result};
use crate::field::operators::{Multiply, Subtract};
use crate::field::{kernels, FieldValue, Scalar};
use rayon::prelude::*;

/// Selects the coefficient arrays and sign of the off-diagonal contributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiplyFlags {
    /// Add off-diagonal contributions; subtract them when false.
    pub include_off_diagonal: bool,
    /// Owner rows read `upper` and neighbour rows read `lower`; swapped when false.
    pub use_upper_as_owner_coefficient: bool,
}

impl MultiplyFlags {
    /// `A x`.
    pub const AMUL: Self = Self {
        include_off_diagonal: true,
        use_upper_as_owner_coefficient: true,
    };
    /// `A^T x`.
    pub const TMUL: Self = Self {
        include_off_diagonal: true,
        use_upper_as_owner_coefficient: false,
    };
    /// `seed - (A - D) x`.
    pub const RESIDUAL: Self = Self {
        include_off_diagonal: false,
        use_upper_as_owner_coefficient: true,
    };
    /// `seed - (A^T - D) x`.
    pub const T_RESIDUAL: Self = Self {
        include_off_diagonal: false,
        use_upper_as_owner_coefficient: false,
    };
    /// Negated off-diagonal product, used with a zero seed.
    pub const NEG_OFF_DIAGONAL: Self = Self::RESIDUAL;
}

/// Two-pass per-cell traversal shared by every LDU kernel.
pub(crate) fn gather_faces<T, O, N>(
    addressing: &LduAddressing,
    seed: &[T],
    add: bool,
    owner_term: O,
    neighbour_term: N,
) -> Vec<T>
where
    T: FieldValue,
    O: Fn(usize) -> T + Sync,
    N: Fn(usize) -> T + Sync,
{
    (0..addressing.n_cells())
        .into_par_iter()
        .map(|c| {
            let mut acc = seed[c];
            for f in addressing.owner_faces(c) {
                let term = owner_term(f);
                acc = if add { acc + term } else { acc - term };
            }
            for &f in addressing.neighbour_faces(c) {
                let term = neighbour_term(f);
                acc = if add { acc + term } else { acc - term };
            }
            acc
        })
        .collect()
}

impl LduMatrix {
    /// General per-cell product starting from `seed[c]`.
    pub fn multiply_with_seed<T: FieldValue>(
        &self,
        seed: &[T],
        psi: &[T],
        flags: MultiplyFlags,
    ) -> Result<Vec<T>> {
        let addressing = self.addressing();
        let n = addressing.n_cells();
        check_sizes("ldu multiply", n, psi.len())?;
        check_sizes("ldu multiply seed", n, seed.len())?;

        let upper = self.upper_or_zero();
        let lower = self.lower_or_zero();
        let (owner_coeffs, neighbour_coeffs) = if flags.use_upper_as_owner_coefficient {
            (&upper, &lower)
        } else {
            (&lower, &upper)
        };
        let owner = addressing.owner();
        let neighbour = addressing.neighbour();

        log::debug!(
            "ldu multiply over {} cells / {} faces ({:?})",
            n,
            addressing.n_faces(),
            flags
        );
        Ok(gather_faces(
            addressing,
            seed,
            flags.include_off_diagonal,
            |f| psi[neighbour[f]] * owner_coeffs[f],
            |f| psi[owner[f]] * neighbour_coeffs[f],
        ))
    }

    /// `A psi`.
    pub fn amul<T: FieldValue>(&self, psi: &[T]) -> Result<Vec<T>> {
        let seed = self.diagonal_product(psi)?;
        self.multiply_with_seed(&seed, psi, MultiplyFlags::AMUL)
    }

    /// `A^T psi`.
    pub fn tmul<T: FieldValue>(&self, psi: &[T]) -> Result<Vec<T>> {
        let seed = self.diagonal_product(psi)?;
        self.multiply_with_seed(&seed, psi, MultiplyFlags::TMUL)
    }

    /// `source - A psi`.
    pub fn residual<T: FieldValue>(&self, psi: &[T], source: &[T]) -> Result<Vec<T>> {
        let n = self.addressing().n_cells();
        check_sizes("ldu residual", n, psi.len())?;
        check_sizes("ldu residual source", n, source.len())?;

        let diag = self.diag_or_zero();
        let diag_psi = psi
            .par_iter()
            .zip(diag.par_iter())
            .map(|(&p, &d)| p * d);
        let seed = kernels::paired::<Subtract, T, T, _>(source.par_iter().copied().zip(diag_psi));
        self.multiply_with_seed(&seed, psi, MultiplyFlags::RESIDUAL)
    }

    /// `-(A - D) psi`: the off-diagonal product with the sign flipped.
    pub fn h_operator<T: FieldValue>(&self, psi: &[T]) -> Result<Vec<T>> {
        let seed = vec![T::zero(); self.addressing().n_cells()];
        self.multiply_with_seed(&seed, psi, MultiplyFlags::NEG_OFF_DIAGONAL)
    }

    /// Diagonal plus (or minus) every off-diagonal coefficient in each row.
    pub fn row_sum(&self, include_off_diagonal: bool) -> Vec<Scalar> {
        let diag = self.diag_or_zero();
        self.coefficient_sum(&diag, include_off_diagonal)
    }

    /// Replaces the diagonal with the full row sum.
    pub fn sum_diag(&mut self) {
        let sum = self.row_sum(true);
        self.diag_mut().copy_from_slice(&sum);
    }

    /// Replaces the diagonal with itself minus the off-diagonal row sum.
    pub fn neg_sum_diag(&mut self) {
        let sum = self.row_sum(false);
        self.diag_mut().copy_from_slice(&sum);
    }

    /// Row sum of the negated off-diagonal coefficients.
    pub fn h1(&self) -> Vec<Scalar> {
        let zero = vec![0.0; self.addressing().n_cells()];
        self.coefficient_sum(&zero, false)
    }

    fn coefficient_sum(&self, seed: &[Scalar], add: bool) -> Vec<Scalar> {
        let upper = self.upper_or_zero();
        let lower = self.lower_or_zero();
        gather_faces(self.addressing(), seed, add, |f| upper[f], |f| lower[f])
    }

    fn diagonal_product<T: FieldValue>(&self, psi: &[T]) -> Result<Vec<T>> {
        check_sizes("ldu multiply", self.addressing().n_cells(), psi.len())?;
        let diag = self.diag_or_zero();
        Ok(kernels::paired::<Multiply, T, Scalar, _>(
            psi.par_iter().copied().zip(diag.par_iter().copied()),
        ))
    }
}
