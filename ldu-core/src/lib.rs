//! # LDU Core Library
//!
//! Face-addressed (LDU) sparse matrices, the conflict-free per-cell multiply
//! built on them, and a generic elementwise field algebra. Every kernel runs
//! on the host through rayon and on a GPU through wgpu compute shaders.

pub mod capability;
pub mod config;
pub(crate) mod context;
pub mod device;
pub mod error;
pub mod field;
pub mod gpu_field;
pub mod indirect;
pub mod ldu;
pub(crate) mod ops;
pub(crate) mod shader_gen;
pub mod traits;

pub use capability::{has_atomic_add, require_atomic_add, AtomicAdd, DeviceCapabilities};
pub use config::DeviceConfig;
pub use device::{GpuDevice, TransferStats};
pub use error::{LduError, Result};
pub use field::{Component, FieldValue, Label, Scalar, Tensor, Vector};
pub use gpu_field::{GpuField, GpuLabels};
pub use indirect::{IndirectView, IndirectViewMut};
pub use ldu::{
    AddressingCache, GpuLduAddressing, GpuLduMatrix, GpuPatch, LduAddressing, LduMatrix,
    MultiplyFlags, PatchAddressing,
};
pub use traits::{FieldStorage, LduShape};
