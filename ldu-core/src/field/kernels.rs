//! Parallel elementwise kernels, generic over an operator tag.
//!
//! Every shape runs one independent work item per element on the rayon pool.
//! Lengths are always checked; a mismatch aborts with `SizeMismatch` before any
//! element is touched.

use super::operators::{BinaryOperator, UnaryFunction};
use super::types::{Component, Scalar};
use crate::error::{check_sizes, LduError, Result};
use rayon::prelude::*;

/// `op(a[i], b[i])` for every element.
pub fn field_field<Op, A, B>(a: &[A], b: &[B]) -> Result<Vec<Op::Output>>
where
    Op: BinaryOperator<A, B>,
    A: Copy + Sync,
    B: Copy + Sync,
    Op::Output: Send,
{
    check_sizes(Op::NAME, a.len(), b.len())?;
    Ok(a.par_iter()
        .zip(b.par_iter())
        .map(|(&x, &y)| Op::apply(x, y))
        .collect())
}

/// As [`field_field`], writing into `out`.
pub fn field_field_into<Op, A, B>(out: &mut [Op::Output], a: &[A], b: &[B]) -> Result<()>
where
    Op: BinaryOperator<A, B>,
    A: Copy + Sync,
    B: Copy + Sync,
    Op::Output: Send,
{
    check_sizes(Op::NAME, a.len(), b.len())?;
    check_sizes(Op::NAME, out.len(), a.len())?;
    out.par_iter_mut()
        .zip(a.par_iter().zip(b.par_iter()))
        .for_each(|(r, (&x, &y))| *r = Op::apply(x, y));
    Ok(())
}

/// `op(a[i], s)`: right operand broadcast.
pub fn field_scalar<Op, A, B>(a: &[A], s: B) -> Vec<Op::Output>
where
    Op: BinaryOperator<A, B>,
    A: Copy + Sync,
    B: Copy + Sync,
    Op::Output: Send,
{
    a.par_iter().map(|&x| Op::apply(x, s)).collect()
}

/// `op(s, b[i])`: left operand broadcast.
pub fn scalar_field<Op, A, B>(s: A, b: &[B]) -> Vec<Op::Output>
where
    Op: BinaryOperator<A, B>,
    A: Copy + Sync,
    B: Copy + Sync,
    Op::Output: Send,
{
    b.par_iter().map(|&y| Op::apply(s, y)).collect()
}

/// Fused form over a single sequence of operand pairs.
///
/// The pairs can be produced lazily (for instance by zipping a field with a
/// gathered view), so neither operand array has to be materialized.
pub fn paired<Op, A, B, I>(pairs: I) -> Vec<Op::Output>
where
    Op: BinaryOperator<A, B>,
    I: IndexedParallelIterator<Item = (A, B)>,
    Op::Output: Send,
{
    pairs.map(|(x, y)| Op::apply(x, y)).collect()
}

/// As [`paired`], writing into `out`.
pub fn paired_into<Op, A, B, I>(out: &mut [Op::Output], pairs: I) -> Result<()>
where
    Op: BinaryOperator<A, B>,
    I: IndexedParallelIterator<Item = (A, B)>,
    Op::Output: Send,
{
    check_sizes(Op::NAME, out.len(), pairs.len())?;
    out.par_iter_mut()
        .zip(pairs)
        .for_each(|(r, (x, y))| *r = Op::apply(x, y));
    Ok(())
}

pub fn unary<F, T>(a: &[T]) -> Vec<F::Output>
where
    F: UnaryFunction<T>,
    T: Copy + Sync,
    F::Output: Send,
{
    a.par_iter().map(|&x| F::apply(x)).collect()
}

pub fn unary_into<F, T>(out: &mut [F::Output], a: &[T]) -> Result<()>
where
    F: UnaryFunction<T>,
    T: Copy + Sync,
    F::Output: Send,
{
    check_sizes(F::NAME, out.len(), a.len())?;
    out.par_iter_mut()
        .zip(a.par_iter())
        .for_each(|(r, &x)| *r = F::apply(x));
    Ok(())
}

/// Pushes every value away from zero by `small`, keeping its sign.
pub fn stabilise(a: &[Scalar], small: Scalar) -> Vec<Scalar> {
    a.par_iter()
        .map(|&x| if x >= 0.0 { x + small } else { x - small })
        .collect()
}

/// Extracts component `d` of every element.
pub fn component<T: Component>(a: &[T], d: usize) -> Result<Vec<Scalar>> {
    check_component::<T>(d)?;
    Ok(a.par_iter().map(|x| x.component(d)).collect())
}

/// Overwrites component `d` of every element with the matching entry of `values`.
pub fn replace<T: Component>(a: &mut [T], d: usize, values: &[Scalar]) -> Result<()> {
    check_component::<T>(d)?;
    check_sizes("replace", a.len(), values.len())?;
    a.par_iter_mut()
        .zip(values.par_iter())
        .for_each(|(x, &v)| x.replace(d, v));
    Ok(())
}

pub fn assign_value<T: Copy + Send + Sync>(a: &mut [T], value: T) {
    a.par_iter_mut().for_each(|x| *x = value);
}

fn check_component<T: Component>(d: usize) -> Result<()> {
    if d >= T::N_COMPONENTS {
        log::error!("component {} requested from a {} field", d, T::TYPE_NAME);
        return Err(LduError::IndexOutOfRange {
            index: d,
            len: T::N_COMPONENTS,
        });
    }
    Ok(())
}
