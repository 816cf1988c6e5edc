//! Field value types and the generic elementwise algebra over them.

pub mod algebra;
pub mod kernels;
pub mod operators;
pub mod reductions;
pub mod types;

pub use kernels::{
    assign_value, component, field_field, field_field_into, field_scalar, paired, paired_into,
    replace, scalar_field, stabilise, unary, unary_into,
};
pub use operators::{BinaryOperator, UnaryFunction, WgslBinary, WgslUnary};
pub use types::{Component, FieldValue, Label, Scalar, Tensor, Vector, SMALL};
