//! Value types carried by fields and the traits the kernels are generic over.

use nalgebra::{Matrix3, Vector3};
use num_traits::Zero;
use std::fmt::Debug;
use std::ops::{Add, Mul, Neg, Sub};

/// Host-side cell / face index.
pub type Label = usize;
/// Host-side floating point scalar.
pub type Scalar = f64;
/// Three-component vector field value.
pub type Vector = Vector3<Scalar>;
/// Second-rank 3x3 tensor field value, row-major component order.
pub type Tensor = Matrix3<Scalar>;

/// Small number used to keep denominators away from zero.
pub const SMALL: Scalar = 1.0e-15;

/// Component-wise access to a fixed-size value type.
pub trait Component: Copy + Send + Sync + Debug + 'static {
    /// Number of scalar components.
    const N_COMPONENTS: usize;
    /// Name used in diagnostics.
    const TYPE_NAME: &'static str;

    /// Returns component `d`. Panics if `d >= N_COMPONENTS`.
    fn component(&self, d: usize) -> Scalar;

    /// Overwrites component `d`. Panics if `d >= N_COMPONENTS`.
    fn replace(&mut self, d: usize, value: Scalar);

    fn map_components<F: Fn(Scalar) -> Scalar>(mut self, f: F) -> Self {
        for d in 0..Self::N_COMPONENTS {
            let v = f(self.component(d));
            self.replace(d, v);
        }
        self
    }

    fn zip_components<F: Fn(Scalar, Scalar) -> Scalar>(mut self, other: Self, f: F) -> Self {
        for d in 0..Self::N_COMPONENTS {
            let v = f(self.component(d), other.component(d));
            self.replace(d, v);
        }
        self
    }

    fn fold_components<F: Fn(Scalar, Scalar) -> Scalar>(&self, init: Scalar, f: F) -> Scalar {
        (0..Self::N_COMPONENTS).fold(init, |acc, d| f(acc, self.component(d)))
    }

    fn mag_sqr(&self) -> Scalar {
        self.fold_components(0.0, |acc, c| acc + c * c)
    }

    fn mag(&self) -> Scalar {
        self.mag_sqr().sqrt()
    }
}

impl Component for Scalar {
    const N_COMPONENTS: usize = 1;
    const TYPE_NAME: &'static str = "scalar";

    fn component(&self, _d: usize) -> Scalar {
        *self
    }

    fn replace(&mut self, _d: usize, value: Scalar) {
        *self = value;
    }
}

impl Component for Vector {
    const N_COMPONENTS: usize = 3;
    const TYPE_NAME: &'static str = "vector";

    fn component(&self, d: usize) -> Scalar {
        self[d]
    }

    fn replace(&mut self, d: usize, value: Scalar) {
        self[d] = value;
    }
}

impl Component for Tensor {
    const N_COMPONENTS: usize = 9;
    const TYPE_NAME: &'static str = "tensor";

    fn component(&self, d: usize) -> Scalar {
        self[(d / 3, d % 3)]
    }

    fn replace(&mut self, d: usize, value: Scalar) {
        self[(d / 3, d % 3)] = value;
    }
}

/// A value that can be stored in a cell field and multiplied by scalar matrix coefficients.
pub trait FieldValue:
    Component
    + Zero
    + PartialEq
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + Mul<Scalar, Output = Self>
{
}

impl<T> FieldValue for T where
    T: Component
        + Zero
        + PartialEq
        + Add<Output = T>
        + Sub<Output = T>
        + Neg<Output = T>
        + Mul<Scalar, Output = T>
{
}
