//! Tensor products and second-rank tensor functions.

use super::types::{Component, Scalar, Tensor, Vector};

/// Outer (tensor) product, `a * b` in field notation.
pub trait OuterProduct<Rhs> {
    type Output;
    fn outer(self, rhs: Rhs) -> Self::Output;
}

/// Cross product, `a ^ b`.
pub trait CrossProduct<Rhs> {
    type Output;
    fn cross(self, rhs: Rhs) -> Self::Output;
}

/// Single inner product, `a & b`.
pub trait InnerProduct<Rhs> {
    type Output;
    fn inner(self, rhs: Rhs) -> Self::Output;
}

/// Double inner product, `a && b`: the sum of component-wise products.
pub trait DoubleInnerProduct<Rhs = Self> {
    fn double_inner(self, rhs: Rhs) -> Scalar;
}

impl OuterProduct<Scalar> for Scalar {
    type Output = Scalar;
    fn outer(self, rhs: Scalar) -> Scalar {
        self * rhs
    }
}

impl OuterProduct<Vector> for Scalar {
    type Output = Vector;
    fn outer(self, rhs: Vector) -> Vector {
        rhs * self
    }
}

impl OuterProduct<Scalar> for Vector {
    type Output = Vector;
    fn outer(self, rhs: Scalar) -> Vector {
        self * rhs
    }
}

impl OuterProduct<Tensor> for Scalar {
    type Output = Tensor;
    fn outer(self, rhs: Tensor) -> Tensor {
        rhs * self
    }
}

impl OuterProduct<Scalar> for Tensor {
    type Output = Tensor;
    fn outer(self, rhs: Scalar) -> Tensor {
        self * rhs
    }
}

impl OuterProduct<Vector> for Vector {
    type Output = Tensor;
    fn outer(self, rhs: Vector) -> Tensor {
        self * rhs.transpose()
    }
}

impl CrossProduct<Vector> for Vector {
    type Output = Vector;
    fn cross(self, rhs: Vector) -> Vector {
        Vector::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }
}

impl InnerProduct<Vector> for Vector {
    type Output = Scalar;
    fn inner(self, rhs: Vector) -> Scalar {
        self.dot(&rhs)
    }
}

impl InnerProduct<Vector> for Tensor {
    type Output = Vector;
    fn inner(self, rhs: Vector) -> Vector {
        self * rhs
    }
}

impl InnerProduct<Tensor> for Vector {
    type Output = Vector;
    fn inner(self, rhs: Tensor) -> Vector {
        rhs.transpose() * self
    }
}

impl InnerProduct<Tensor> for Tensor {
    type Output = Tensor;
    fn inner(self, rhs: Tensor) -> Tensor {
        self * rhs
    }
}

impl<T: Component> DoubleInnerProduct<T> for T {
    fn double_inner(self, rhs: T) -> Scalar {
        (0..T::N_COMPONENTS).fold(0.0, |acc, d| acc + self.component(d) * rhs.component(d))
    }
}

/// Hodge dual, unary `*`: a vector maps to its skew tensor and back.
pub trait HodgeDual {
    type Output;
    fn hdual(self) -> Self::Output;
}

impl HodgeDual for Vector {
    type Output = Tensor;
    fn hdual(self) -> Tensor {
        Tensor::new(
            0.0, -self.z, self.y,
            self.z, 0.0, -self.x,
            -self.y, self.x, 0.0,
        )
    }
}

impl HodgeDual for Tensor {
    type Output = Vector;
    fn hdual(self) -> Vector {
        Vector::new(self[(1, 2)], -self[(0, 2)], self[(0, 1)])
    }
}

/// Change of basis by the rotation `self`.
pub trait Transform<T> {
    fn transform(&self, t: T) -> T;
}

impl Transform<Scalar> for Tensor {
    fn transform(&self, s: Scalar) -> Scalar {
        s
    }
}

impl Transform<Vector> for Tensor {
    fn transform(&self, v: Vector) -> Vector {
        self * v
    }
}

impl Transform<Tensor> for Tensor {
    fn transform(&self, t: Tensor) -> Tensor {
        self * t * self.transpose()
    }
}

// Second-rank tensor functions.

pub fn tr(t: &Tensor) -> Scalar {
    t.trace()
}

/// Spherical part, `tr(t)/3 I`.
pub fn sph(t: &Tensor) -> Tensor {
    Tensor::identity() * (tr(t) / 3.0)
}

pub fn symm(t: &Tensor) -> Tensor {
    (t + t.transpose()) * 0.5
}

pub fn two_symm(t: &Tensor) -> Tensor {
    t + t.transpose()
}

pub fn skew(t: &Tensor) -> Tensor {
    (t - t.transpose()) * 0.5
}

/// Deviatoric part, `t - tr(t)/3 I`.
pub fn dev(t: &Tensor) -> Tensor {
    t - sph(t)
}

/// `t - 2/3 tr(t) I`.
pub fn dev2(t: &Tensor) -> Tensor {
    t - sph(t) * 2.0
}

pub fn det(t: &Tensor) -> Scalar {
    t.determinant()
}

/// Signed cofactor matrix; `inv(t) = cof(t)^T / det(t)`.
pub fn cof(t: &Tensor) -> Tensor {
    let m = |i: usize, j: usize| t[(i, j)];
    Tensor::new(
        m(1, 1) * m(2, 2) - m(1, 2) * m(2, 1),
        m(1, 2) * m(2, 0) - m(1, 0) * m(2, 2),
        m(1, 0) * m(2, 1) - m(1, 1) * m(2, 0),
        m(0, 2) * m(2, 1) - m(0, 1) * m(2, 2),
        m(0, 0) * m(2, 2) - m(0, 2) * m(2, 0),
        m(0, 1) * m(2, 0) - m(0, 0) * m(2, 1),
        m(0, 1) * m(1, 2) - m(0, 2) * m(1, 1),
        m(0, 2) * m(1, 0) - m(0, 0) * m(1, 2),
        m(0, 0) * m(1, 1) - m(0, 1) * m(1, 0),
    )
}

/// Inverse through the cofactor matrix. A singular tensor yields non-finite components.
pub fn inv(t: &Tensor) -> Tensor {
    cof(t).transpose() / det(t)
}

pub fn diag(t: &Tensor) -> Vector {
    Vector::new(t[(0, 0)], t[(1, 1)], t[(2, 2)])
}

/// Eigenvalues of the symmetric part of `t`, ascending.
pub fn eigen_values(t: &Tensor) -> Vector {
    let (values, _) = sorted_eigen(t);
    values
}

/// Eigenvectors of the symmetric part of `t`, one per row, in the order of [`eigen_values`].
pub fn eigen_vectors(t: &Tensor) -> Tensor {
    let (_, vectors) = sorted_eigen(t);
    vectors
}

fn sorted_eigen(t: &Tensor) -> (Vector, Tensor) {
    let eigen = symm(t).symmetric_eigen();
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));

    let mut values = Vector::zeros();
    let mut vectors = Tensor::zeros();
    for (row, &k) in order.iter().enumerate() {
        values[row] = eigen.eigenvalues[k];
        let column = eigen.eigenvectors.column(k);
        for j in 0..3 {
            vectors[(row, j)] = column[j];
        }
    }
    (values, vectors)
}
