//! Parallel reductions over host fields.
//!
//! Reductions that have no meaningful value on an empty field (`max`, `min`,
//! `average`, ...) return `None` for it.

use super::operators::{BinaryOperator, Max, Min};
use super::types::{Component, FieldValue, Scalar};
use crate::error::{check_sizes, Result};
use rayon::prelude::*;

pub fn sum<T: FieldValue>(a: &[T]) -> T {
    a.par_iter().copied().reduce(T::zero, |x, y| x + y)
}

pub fn sum_mag<T: Component>(a: &[T]) -> Scalar {
    a.par_iter().map(|x| x.mag()).sum()
}

pub fn sum_sqr<T: Component>(a: &[T]) -> Scalar {
    a.par_iter().map(|x| x.mag_sqr()).sum()
}

/// Sum of the double inner products `a[i] && b[i]`.
pub fn sum_prod<T: Component>(a: &[T], b: &[T]) -> Result<Scalar> {
    check_sizes("sumProd", a.len(), b.len())?;
    Ok(a.par_iter()
        .zip(b.par_iter())
        .map(|(x, y)| {
            (0..T::N_COMPONENTS).fold(0.0, |acc, d| acc + x.component(d) * y.component(d))
        })
        .sum())
}

/// Component-wise maximum.
pub fn max<T: Component>(a: &[T]) -> Option<T> {
    a.par_iter()
        .copied()
        .reduce_with(<Max as BinaryOperator<T, T>>::apply)
}

/// Component-wise minimum.
pub fn min<T: Component>(a: &[T]) -> Option<T> {
    a.par_iter()
        .copied()
        .reduce_with(<Min as BinaryOperator<T, T>>::apply)
}

pub fn average<T: FieldValue>(a: &[T]) -> Option<T> {
    if a.is_empty() {
        return None;
    }
    Some(sum(a) * (1.0 / a.len() as Scalar))
}

pub fn max_mag_sqr<T: Component>(a: &[T]) -> Option<Scalar> {
    a.par_iter().map(|x| x.mag_sqr()).reduce_with(Scalar::max)
}

pub fn min_mag_sqr<T: Component>(a: &[T]) -> Option<Scalar> {
    a.par_iter().map(|x| x.mag_sqr()).reduce_with(Scalar::min)
}
