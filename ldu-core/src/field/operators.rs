//! Operator tags for the elementwise kernels.
//!
//! Every operator or function is a zero-sized tag type. The kernels in
//! [`super::kernels`] are generic over the tag, so each (operator, operand types)
//! pair is monomorphized into its own parallel loop without a hand-written kernel.
//!
//! Scalar tags that also implement [`WgslBinary`] / [`WgslUnary`] carry a WGSL
//! expression template and can be launched on the device.

use super::algebra::{
    self, CrossProduct, DoubleInnerProduct, HodgeDual, InnerProduct, OuterProduct,
};
use super::types::{Component, Scalar, Tensor, Vector};
use std::ops;

/// An operator taking two operands.
pub trait BinaryOperator<A, B>: Send + Sync + 'static {
    type Output;
    /// Operation name used in diagnostics and kernel labels.
    const NAME: &'static str;
    fn apply(a: A, b: B) -> Self::Output;
}

/// A function of a single operand.
pub trait UnaryFunction<T>: Send + Sync + 'static {
    type Output;
    const NAME: &'static str;
    fn apply(t: T) -> Self::Output;
}

/// A scalar binary operator expressible in WGSL. `{a}` and `{b}` are substituted by the operands.
pub trait WgslBinary: BinaryOperator<Scalar, Scalar, Output = Scalar> {
    const TEMPLATE: &'static str;
}

/// A scalar function expressible in WGSL. `{x}` is substituted by the operand.
pub trait WgslUnary: UnaryFunction<Scalar, Output = Scalar> {
    const TEMPLATE: &'static str;
    /// WGSL functions the template calls, emitted ahead of the kernel entry point.
    const HELPERS: &'static str = "";
}

// ---------------------------------------------------------------------------
// Binary operators

#[derive(Debug, Clone, Copy, Default)]
pub struct Add;
#[derive(Debug, Clone, Copy, Default)]
pub struct Subtract;
#[derive(Debug, Clone, Copy, Default)]
pub struct Multiply;
#[derive(Debug, Clone, Copy, Default)]
pub struct Divide;
/// Tensor product.
#[derive(Debug, Clone, Copy, Default)]
pub struct Outer;
#[derive(Debug, Clone, Copy, Default)]
pub struct Cross;
/// Single inner product.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dot;
/// Double inner product.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoubleDot;
#[derive(Debug, Clone, Copy, Default)]
pub struct Pow;
/// Component-wise minimum.
#[derive(Debug, Clone, Copy, Default)]
pub struct Min;
/// Component-wise maximum.
#[derive(Debug, Clone, Copy, Default)]
pub struct Max;
#[derive(Debug, Clone, Copy, Default)]
pub struct Atan2;
/// Zero when the operands differ in sign, otherwise the one of smaller magnitude.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinMod;
#[derive(Debug, Clone, Copy, Default)]
pub struct CmptMultiply;
#[derive(Debug, Clone, Copy, Default)]
pub struct CmptDivide;
/// Rotates the right operand into the basis of the left tensor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transform;

impl<A: ops::Add<B>, B> BinaryOperator<A, B> for Add {
    type Output = A::Output;
    const NAME: &'static str = "add";
    #[inline]
    fn apply(a: A, b: B) -> Self::Output {
        a + b
    }
}

impl<A: ops::Sub<B>, B> BinaryOperator<A, B> for Subtract {
    type Output = A::Output;
    const NAME: &'static str = "subtract";
    #[inline]
    fn apply(a: A, b: B) -> Self::Output {
        a - b
    }
}

impl<A: ops::Mul<B>, B> BinaryOperator<A, B> for Multiply {
    type Output = A::Output;
    const NAME: &'static str = "multiply";
    #[inline]
    fn apply(a: A, b: B) -> Self::Output {
        a * b
    }
}

impl<A: ops::Div<B>, B> BinaryOperator<A, B> for Divide {
    type Output = A::Output;
    const NAME: &'static str = "divide";
    #[inline]
    fn apply(a: A, b: B) -> Self::Output {
        a / b
    }
}

impl<A: OuterProduct<B>, B> BinaryOperator<A, B> for Outer {
    type Output = A::Output;
    const NAME: &'static str = "outer";
    #[inline]
    fn apply(a: A, b: B) -> Self::Output {
        a.outer(b)
    }
}

impl<A: CrossProduct<B>, B> BinaryOperator<A, B> for Cross {
    type Output = A::Output;
    const NAME: &'static str = "cross";
    #[inline]
    fn apply(a: A, b: B) -> Self::Output {
        a.cross(b)
    }
}

impl<A: InnerProduct<B>, B> BinaryOperator<A, B> for Dot {
    type Output = A::Output;
    const NAME: &'static str = "dot";
    #[inline]
    fn apply(a: A, b: B) -> Self::Output {
        a.inner(b)
    }
}

impl<A: DoubleInnerProduct<B>, B> BinaryOperator<A, B> for DoubleDot {
    type Output = Scalar;
    const NAME: &'static str = "dotdot";
    #[inline]
    fn apply(a: A, b: B) -> Scalar {
        a.double_inner(b)
    }
}

impl BinaryOperator<Scalar, Scalar> for Pow {
    type Output = Scalar;
    const NAME: &'static str = "pow";
    #[inline]
    fn apply(a: Scalar, b: Scalar) -> Scalar {
        a.powf(b)
    }
}

impl<T: Component> BinaryOperator<T, T> for Min {
    type Output = T;
    const NAME: &'static str = "min";
    #[inline]
    fn apply(a: T, b: T) -> T {
        a.zip_components(b, Scalar::min)
    }
}

impl<T: Component> BinaryOperator<T, T> for Max {
    type Output = T;
    const NAME: &'static str = "max";
    #[inline]
    fn apply(a: T, b: T) -> T {
        a.zip_components(b, Scalar::max)
    }
}

impl BinaryOperator<Scalar, Scalar> for Atan2 {
    type Output = Scalar;
    const NAME: &'static str = "atan2";
    #[inline]
    fn apply(a: Scalar, b: Scalar) -> Scalar {
        a.atan2(b)
    }
}

impl BinaryOperator<Scalar, Scalar> for MinMod {
    type Output = Scalar;
    const NAME: &'static str = "minMod";
    #[inline]
    fn apply(a: Scalar, b: Scalar) -> Scalar {
        if a * b < 0.0 {
            0.0
        } else if a.abs() < b.abs() {
            a
        } else {
            b
        }
    }
}

impl<T: Component> BinaryOperator<T, T> for CmptMultiply {
    type Output = T;
    const NAME: &'static str = "cmptMultiply";
    #[inline]
    fn apply(a: T, b: T) -> T {
        a.zip_components(b, |x, y| x * y)
    }
}

impl<T: Component> BinaryOperator<T, T> for CmptDivide {
    type Output = T;
    const NAME: &'static str = "cmptDivide";
    #[inline]
    fn apply(a: T, b: T) -> T {
        a.zip_components(b, |x, y| x / y)
    }
}

impl<T> BinaryOperator<Tensor, T> for Transform
where
    Tensor: algebra::Transform<T>,
{
    type Output = T;
    const NAME: &'static str = "transform";
    #[inline]
    fn apply(rotation: Tensor, t: T) -> T {
        algebra::Transform::transform(&rotation, t)
    }
}

impl WgslBinary for Add {
    const TEMPLATE: &'static str = "({a} + {b})";
}
impl WgslBinary for Subtract {
    const TEMPLATE: &'static str = "({a} - {b})";
}
impl WgslBinary for Multiply {
    const TEMPLATE: &'static str = "({a} * {b})";
}
impl WgslBinary for Divide {
    const TEMPLATE: &'static str = "({a} / {b})";
}
impl WgslBinary for Outer {
    const TEMPLATE: &'static str = "({a} * {b})";
}
impl WgslBinary for DoubleDot {
    const TEMPLATE: &'static str = "({a} * {b})";
}
impl WgslBinary for Pow {
    const TEMPLATE: &'static str = "pow({a}, {b})";
}
impl WgslBinary for Min {
    const TEMPLATE: &'static str = "min({a}, {b})";
}
impl WgslBinary for Max {
    const TEMPLATE: &'static str = "max({a}, {b})";
}
impl WgslBinary for Atan2 {
    const TEMPLATE: &'static str = "atan2({a}, {b})";
}
impl WgslBinary for MinMod {
    const TEMPLATE: &'static str =
        "select(select({b}, {a}, abs({a}) < abs({b})), 0.0, {a} * {b} < 0.0)";
}
impl WgslBinary for CmptMultiply {
    const TEMPLATE: &'static str = "({a} * {b})";
}
impl WgslBinary for CmptDivide {
    const TEMPLATE: &'static str = "({a} / {b})";
}

// ---------------------------------------------------------------------------
// Scalar functions

macro_rules! scalar_functions {
    ($($(#[$doc:meta])* $tag:ident => $name:literal, |$x:ident| $body:expr $(, wgsl $wgsl:literal $(with $helpers:ident)?)?;)*) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, Default)]
            pub struct $tag;

            impl UnaryFunction<Scalar> for $tag {
                type Output = Scalar;
                const NAME: &'static str = $name;
                #[inline]
                fn apply($x: Scalar) -> Scalar {
                    $body
                }
            }

            $(
                impl WgslUnary for $tag {
                    const TEMPLATE: &'static str = $wgsl;
                    $(const HELPERS: &'static str = $helpers;)?
                }
            )?
        )*
    };
}

scalar_functions! {
    Sqrt => "sqrt", |x| x.sqrt(), wgsl "sqrt({x})";
    Cbrt => "cbrt", |x| x.cbrt(), wgsl "(sign({x}) * pow(abs({x}), 1.0 / 3.0))";
    Exp => "exp", |x| x.exp(), wgsl "exp({x})";
    Log => "log", |x| x.ln(), wgsl "log({x})";
    Log10 => "log10", |x| x.log10(), wgsl "(log({x}) * 0.4342944819032518)";
    Sin => "sin", |x| x.sin(), wgsl "sin({x})";
    Cos => "cos", |x| x.cos(), wgsl "cos({x})";
    Tan => "tan", |x| x.tan(), wgsl "tan({x})";
    Asin => "asin", |x| x.asin(), wgsl "asin({x})";
    Acos => "acos", |x| x.acos(), wgsl "acos({x})";
    Atan => "atan", |x| x.atan(), wgsl "atan({x})";
    Sinh => "sinh", |x| x.sinh(), wgsl "sinh({x})";
    Cosh => "cosh", |x| x.cosh(), wgsl "cosh({x})";
    Tanh => "tanh", |x| x.tanh(), wgsl "tanh({x})";
    Asinh => "asinh", |x| x.asinh(), wgsl "asinh({x})";
    Acosh => "acosh", |x| x.acosh(), wgsl "acosh({x})";
    Atanh => "atanh", |x| x.atanh(), wgsl "atanh({x})";
    /// `1` for non-negative values, `-1` otherwise.
    Sign => "sign", |x| if x >= 0.0 { 1.0 } else { -1.0 }, wgsl "select(-1.0, 1.0, {x} >= 0.0)";
    /// `1` for non-negative values, `0` otherwise.
    Pos => "pos", |x| if x >= 0.0 { 1.0 } else { 0.0 }, wgsl "select(0.0, 1.0, {x} >= 0.0)";
    /// `1` for negative values, `0` otherwise.
    Neg => "neg", |x| if x < 0.0 { 1.0 } else { 0.0 }, wgsl "select(0.0, 1.0, {x} < 0.0)";
    Floor => "floor", |x| x.floor(), wgsl "floor({x})";
    Ceil => "ceil", |x| x.ceil(), wgsl "ceil({x})";
    /// Rounds half away from zero.
    Round => "round", |x| x.round(), wgsl "select(ceil({x} - 0.5), floor({x} + 0.5), {x} >= 0.0)";
    Trunc => "trunc", |x| x.trunc(), wgsl "trunc({x})";
    Pow3 => "pow3", |x| x * x * x, wgsl "({x} * {x} * {x})";
    Pow4 => "pow4", |x| { let x2 = x * x; x2 * x2 }, wgsl "({x} * {x} * {x} * {x})";
    Pow5 => "pow5", |x| { let x2 = x * x; x2 * x2 * x }, wgsl "({x} * {x} * {x} * {x} * {x})";
    Pow6 => "pow6", |x| { let x3 = x * x * x; x3 * x3 }, wgsl "({x} * {x} * {x} * {x} * {x} * {x})";
    Pow025 => "pow025", |x| x.sqrt().sqrt(), wgsl "sqrt(sqrt({x}))";
    DegToRad => "degToRad", |x| x.to_radians(), wgsl "({x} * 0.017453292519943295)";
    RadToDeg => "radToDeg", |x| x.to_degrees(), wgsl "({x} * 57.29577951308232)";
    AtmToPa => "atmToPa", |x| x * 101325.0, wgsl "({x} * 101325.0)";
    PaToAtm => "paToAtm", |x| x / 101325.0, wgsl "({x} / 101325.0)";
    Erf => "erf", |x| libm::erf(x), wgsl "erf_as({x})" with ERF_WGSL;
    /// Complementary error function. On the device it loses precision where `erf` nears one.
    Erfc => "erfc", |x| libm::erfc(x), wgsl "(1.0 - erf_as({x}))" with ERF_WGSL;
    /// Logarithm of the absolute value of the gamma function.
    Lgamma => "lgamma", |x| libm::lgamma(x), wgsl "lgamma_lanczos({x})" with LGAMMA_WGSL;
    // Bessel functions have no device template, so launching them on a device does not compile.
    J0 => "j0", |x| libm::j0(x);
    J1 => "j1", |x| libm::j1(x);
    Y0 => "y0", |x| libm::y0(x);
    Y1 => "y1", |x| libm::y1(x);
}

/// Abramowitz & Stegun 7.1.26, absolute error below 1.5e-7.
const ERF_WGSL: &str = r#"
fn erf_as(x: f32) -> f32 {
    let t = 1.0 / (1.0 + 0.3275911 * abs(x));
    let poly = t * (0.254829592 + t * (-0.284496736 + t * (1.421413741 + t * (-1.453152027 + t * 1.061405429))));
    return select(-1.0, 1.0, x >= 0.0) * (1.0 - poly * exp(-x * x));
}
"#;

/// Lanczos (g = 7, n = 9) with reflection below zero. Poles give a large finite value.
const LGAMMA_WGSL: &str = r#"
fn lgamma_positive(x: f32) -> f32 {
    let z = x - 1.0;
    var ag = 0.99999999999980993;
    ag = ag + 676.5203681218851 / (z + 1.0);
    ag = ag - 1259.1392167224028 / (z + 2.0);
    ag = ag + 771.32342877765313 / (z + 3.0);
    ag = ag - 176.61502916214059 / (z + 4.0);
    ag = ag + 12.507343278686905 / (z + 5.0);
    ag = ag - 0.13857109526572012 / (z + 6.0);
    ag = ag + 9.9843695780195716e-6 / (z + 7.0);
    ag = ag + 1.5056327351493116e-7 / (z + 8.0);
    let t = z + 7.5;
    return 0.9189385332046727 + (z + 0.5) * log(t) - t + log(ag);
}

fn lgamma_lanczos(x: f32) -> f32 {
    if (x > 0.0) {
        return lgamma_positive(x);
    }
    let s = sin(3.141592653589793 * x);
    if (x == floor(x) || s == 0.0) {
        return 1e30;
    }
    return log(3.141592653589793 / abs(s)) - lgamma_positive(1.0 - x);
}
"#;

// ---------------------------------------------------------------------------
// Functions generic over the value type

#[derive(Debug, Clone, Copy, Default)]
pub struct Negate;
#[derive(Debug, Clone, Copy, Default)]
pub struct Mag;
#[derive(Debug, Clone, Copy, Default)]
pub struct MagSqr;
/// Outer product of a value with itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqr;
#[derive(Debug, Clone, Copy, Default)]
pub struct CmptMag;
#[derive(Debug, Clone, Copy, Default)]
pub struct CmptMax;
#[derive(Debug, Clone, Copy, Default)]
pub struct CmptMin;
#[derive(Debug, Clone, Copy, Default)]
pub struct CmptAv;
/// Hodge dual, unary `*`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hdual;

impl<T: ops::Neg> UnaryFunction<T> for Negate {
    type Output = T::Output;
    const NAME: &'static str = "negate";
    #[inline]
    fn apply(t: T) -> Self::Output {
        -t
    }
}

impl<T: Component> UnaryFunction<T> for Mag {
    type Output = Scalar;
    const NAME: &'static str = "mag";
    #[inline]
    fn apply(t: T) -> Scalar {
        t.mag()
    }
}

impl<T: Component> UnaryFunction<T> for MagSqr {
    type Output = Scalar;
    const NAME: &'static str = "magSqr";
    #[inline]
    fn apply(t: T) -> Scalar {
        t.mag_sqr()
    }
}

impl<T: OuterProduct<T> + Copy> UnaryFunction<T> for Sqr {
    type Output = T::Output;
    const NAME: &'static str = "sqr";
    #[inline]
    fn apply(t: T) -> Self::Output {
        t.outer(t)
    }
}

impl<T: Component> UnaryFunction<T> for CmptMag {
    type Output = T;
    const NAME: &'static str = "cmptMag";
    #[inline]
    fn apply(t: T) -> T {
        t.map_components(Scalar::abs)
    }
}

impl<T: Component> UnaryFunction<T> for CmptMax {
    type Output = Scalar;
    const NAME: &'static str = "cmptMax";
    #[inline]
    fn apply(t: T) -> Scalar {
        t.fold_components(Scalar::NEG_INFINITY, Scalar::max)
    }
}

impl<T: Component> UnaryFunction<T> for CmptMin {
    type Output = Scalar;
    const NAME: &'static str = "cmptMin";
    #[inline]
    fn apply(t: T) -> Scalar {
        t.fold_components(Scalar::INFINITY, Scalar::min)
    }
}

impl<T: Component> UnaryFunction<T> for CmptAv {
    type Output = Scalar;
    const NAME: &'static str = "cmptAv";
    #[inline]
    fn apply(t: T) -> Scalar {
        t.fold_components(0.0, |acc, c| acc + c) / T::N_COMPONENTS as Scalar
    }
}

impl<T: HodgeDual> UnaryFunction<T> for Hdual {
    type Output = T::Output;
    const NAME: &'static str = "hdual";
    #[inline]
    fn apply(t: T) -> Self::Output {
        t.hdual()
    }
}

impl WgslUnary for Negate {
    const TEMPLATE: &'static str = "(-{x})";
}
impl WgslUnary for Mag {
    const TEMPLATE: &'static str = "abs({x})";
}
impl WgslUnary for MagSqr {
    const TEMPLATE: &'static str = "({x} * {x})";
}
impl WgslUnary for Sqr {
    const TEMPLATE: &'static str = "({x} * {x})";
}
impl WgslUnary for CmptMag {
    const TEMPLATE: &'static str = "abs({x})";
}

// ---------------------------------------------------------------------------
// Second-rank tensor functions

macro_rules! tensor_functions {
    ($($tag:ident => $name:literal, $func:path, $out:ty;)*) => {
        $(
            #[derive(Debug, Clone, Copy, Default)]
            pub struct $tag;

            impl UnaryFunction<Tensor> for $tag {
                type Output = $out;
                const NAME: &'static str = $name;
                #[inline]
                fn apply(t: Tensor) -> $out {
                    $func(&t)
                }
            }
        )*
    };
}

fn transpose(t: &Tensor) -> Tensor {
    t.transpose()
}

tensor_functions! {
    Transpose => "T", transpose, Tensor;
    Tr => "tr", algebra::tr, Scalar;
    Sph => "sph", algebra::sph, Tensor;
    Symm => "symm", algebra::symm, Tensor;
    TwoSymm => "twoSymm", algebra::two_symm, Tensor;
    Skew => "skew", algebra::skew, Tensor;
    Dev => "dev", algebra::dev, Tensor;
    Dev2 => "dev2", algebra::dev2, Tensor;
    Det => "det", algebra::det, Scalar;
    Cof => "cof", algebra::cof, Tensor;
    Inv => "inv", algebra::inv, Tensor;
    Diag => "diag", algebra::diag, Vector;
    EigenValues => "eigenValues", algebra::eigen_values, Vector;
    EigenVectors => "eigenVectors", algebra::eigen_vectors, Tensor;
}

/// Substitutes the operands into a binary WGSL template.
pub fn wgsl_binary_expr<Op: WgslBinary>(a: &str, b: &str) -> String {
    Op::TEMPLATE.replace("{a}", a).replace("{b}", b)
}

/// Substitutes the operand into a unary WGSL template.
pub fn wgsl_unary_expr<F: WgslUnary>(x: &str) -> String {
    F::TEMPLATE.replace("{x}", x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_max_are_component_wise() {
        let a = Vector::new(1.0, -2.0, 3.0);
        let b = Vector::new(0.0, 5.0, 3.5);
        assert_eq!(<Min as BinaryOperator<Vector, Vector>>::apply(a, b), Vector::new(0.0, -2.0, 3.0));
        assert_eq!(<Max as BinaryOperator<Vector, Vector>>::apply(a, b), Vector::new(1.0, 5.0, 3.5));
    }

    #[test]
    fn sign_of_zero_is_positive() {
        assert_eq!(Sign::apply(0.0), 1.0);
        assert_eq!(Sign::apply(-0.5), -1.0);
        assert_eq!(Pos::apply(0.0), 1.0);
        assert_eq!(Neg::apply(0.0), 0.0);
    }

    #[test]
    fn min_mod_limits_opposite_signs() {
        assert_eq!(MinMod::apply(2.0, -1.0), 0.0);
        assert_eq!(MinMod::apply(2.0, 1.0), 1.0);
        assert_eq!(MinMod::apply(-0.5, -3.0), -0.5);
    }

    #[test]
    fn sqr_of_vector_is_tensor() {
        let v = Vector::new(1.0, 2.0, 0.0);
        let t: Tensor = Sqr::apply(v);
        assert_eq!(t[(0, 1)], 2.0);
        assert_eq!(t[(1, 1)], 4.0);
    }

    #[test]
    fn wgsl_templates_substitute_operands() {
        assert_eq!(wgsl_binary_expr::<Pow>("a[i]", "s"), "pow(a[i], s)");
        assert_eq!(wgsl_unary_expr::<Sqr>("v"), "(v * v)");
    }
}
