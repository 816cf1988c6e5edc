//! Face-addressed (LDU) sparse matrices and their kernels.

pub mod addressing;
pub mod gpu;
pub mod matrix;
pub mod multiply;
pub mod patch;

pub use addressing::{AddressingCache, LduAddressing};
pub use gpu::{GpuLduAddressing, GpuLduMatrix, GpuPatch};
pub use matrix::LduMatrix;
pub use multiply::MultiplyFlags;
pub use patch::{
    add_patch_coefficients, apply_patch_corrections, subtract_patch_coefficients,
    PatchAddressing,
};
