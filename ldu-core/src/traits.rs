use bytemuck::{Pod, Zeroable};
use std::fmt::Debug;

/// Shape queries shared by host and device face-addressed matrices.
///
/// An LDU matrix is always square: one row and one column per cell.
pub trait LduShape: Debug {
    /// Coefficient type (f64 on the host, f32 on the device).
    type Value: Copy + Debug + Default + Pod + Zeroable;

    /// Number of cells, i.e. rows of the matrix.
    fn n_cells(&self) -> usize;

    /// Number of internal faces, i.e. off-diagonal pairs.
    fn n_faces(&self) -> usize;

    /// Returns the dimensions of the matrix as (rows, columns).
    fn dims(&self) -> (usize, usize) {
        (self.n_cells(), self.n_cells())
    }

    /// Number of structurally non-zero entries: the diagonal plus both off-diagonal triangles.
    fn nnz(&self) -> usize {
        self.n_cells() + 2 * self.n_faces()
    }
}

/// A contiguous array of per-cell (or per-element) values.
pub trait FieldStorage: Debug {
    /// The underlying numeric type of the elements.
    type Value: Copy + Debug + Default + Pod + Zeroable;

    /// Returns the number of elements.
    fn len(&self) -> usize;

    /// Checks if the field is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
