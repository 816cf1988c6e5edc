mod common;

use ldu_core::field::operators::*;
use ldu_core::field::{self, reductions};
use ldu_core::{IndirectView, IndirectViewMut, Scalar, Tensor, Vector};
use std::fmt::Debug;

fn same(a: Scalar, b: Scalar) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

/// Broadcast paths agree with the field-field path on a constant field.
fn check_broadcast<Op: WgslBinary>(a: &[Scalar], s: Scalar) {
    let constant = vec![s; a.len()];

    let broadcast = field::field_scalar::<Op, _, _>(a, s);
    let paired = field::field_field::<Op, _, _>(a, &constant).unwrap();
    for (i, (x, y)) in broadcast.iter().zip(&paired).enumerate() {
        assert!(same(*x, *y), "{} field-scalar differs at {}: {} vs {}", Op::NAME, i, x, y);
    }

    let broadcast = field::scalar_field::<Op, _, _>(s, a);
    let paired = field::field_field::<Op, _, _>(&constant, a).unwrap();
    for (i, (x, y)) in broadcast.iter().zip(&paired).enumerate() {
        assert!(same(*x, *y), "{} scalar-field differs at {}: {} vs {}", Op::NAME, i, x, y);
    }
}

macro_rules! check_all_broadcasts {
    ($a:expr, $s:expr; $($op:ty),* $(,)?) => {
        $( check_broadcast::<$op>($a, $s); )*
    };
}

#[test]
fn broadcast_matches_field_field_for_every_scalar_operator() {
    let a = [-2.5, 0.0, 1.5, 3.0, -0.25];
    for s in [-1.5, 0.5, 2.0] {
        check_all_broadcasts!(&a, s;
            Add, Subtract, Multiply, Divide, Outer, DoubleDot, Pow,
            Min, Max, Atan2, MinMod, CmptMultiply, CmptDivide,
        );
    }
}

/// `op(a[i], s)` against the field-field path with `s` repeated.
fn check_field_scalar<Op, A, B>(a: &[A], s: B)
where
    Op: BinaryOperator<A, B>,
    A: Copy + Sync,
    B: Copy + Sync,
    Op::Output: Send + PartialEq + Debug,
{
    let constant = vec![s; a.len()];
    assert_eq!(
        field::field_scalar::<Op, _, _>(a, s),
        field::field_field::<Op, _, _>(a, &constant).unwrap(),
        "{} field-scalar",
        Op::NAME
    );
}

/// `op(s, b[i])` against the field-field path with `s` repeated.
fn check_scalar_field<Op, A, B>(s: A, b: &[B])
where
    Op: BinaryOperator<A, B>,
    A: Copy + Sync,
    B: Copy + Sync,
    Op::Output: Send + PartialEq + Debug,
{
    let constant = vec![s; b.len()];
    assert_eq!(
        field::scalar_field::<Op, _, _>(s, b),
        field::field_field::<Op, _, _>(&constant, b).unwrap(),
        "{} scalar-field",
        Op::NAME
    );
}

fn random_vector(rng: &mut fastrand::Rng) -> Vector {
    Vector::from_iterator(common::random_values(rng, 3))
}

fn random_tensor(rng: &mut fastrand::Rng) -> Tensor {
    Tensor::from_iterator(common::random_values(rng, 9))
}

#[test]
fn broadcast_matches_field_field_for_vector_and_tensor_operators() {
    let mut rng = fastrand::Rng::with_seed(11);
    let vectors: Vec<Vector> = (0..5).map(|_| random_vector(&mut rng)).collect();
    let tensors: Vec<Tensor> = (0..5).map(|_| random_tensor(&mut rng)).collect();
    let scalars = common::random_values(&mut rng, 5);
    let v = Vector::new(-1.5, 0.5, 2.0);
    let t = Tensor::new(2.0, -1.0, 0.5, 3.0, -4.0, -2.0, 0.0, 1.5, -5.0);

    // vector x vector
    check_field_scalar::<Cross, _, _>(&vectors, v);
    check_scalar_field::<Cross, _, _>(v, &vectors);
    check_field_scalar::<Dot, _, _>(&vectors, v);
    check_scalar_field::<Dot, _, _>(v, &vectors);
    check_field_scalar::<Outer, _, _>(&vectors, v);
    check_scalar_field::<Outer, _, _>(v, &vectors);
    check_field_scalar::<DoubleDot, _, _>(&vectors, v);
    check_scalar_field::<DoubleDot, _, _>(v, &vectors);

    // tensor x vector, both orders
    check_field_scalar::<Dot, _, _>(&tensors, v);
    check_scalar_field::<Dot, _, _>(t, &vectors);
    check_field_scalar::<Dot, _, _>(&vectors, t);
    check_scalar_field::<Dot, _, _>(v, &tensors);
    check_field_scalar::<Transform, _, _>(&tensors, v);
    check_scalar_field::<Transform, _, _>(t, &vectors);

    // tensor x tensor
    check_field_scalar::<Dot, _, _>(&tensors, t);
    check_scalar_field::<Dot, _, _>(t, &tensors);
    check_field_scalar::<DoubleDot, _, _>(&tensors, t);
    check_scalar_field::<DoubleDot, _, _>(t, &tensors);
    check_field_scalar::<Transform, _, _>(&tensors, t);
    check_scalar_field::<Transform, _, _>(t, &tensors);

    // scalar x tensor
    check_field_scalar::<Outer, _, _>(&tensors, -0.75_f64);
    check_scalar_field::<Outer, _, _>(-0.75_f64, &tensors);
    check_field_scalar::<Outer, _, _>(&scalars, t);
    check_scalar_field::<Outer, _, _>(t, &scalars);

    // The broadcast side matters for the non-commutative products.
    let right = field::field_scalar::<Cross, _, _>(&vectors, v);
    let left = field::scalar_field::<Cross, _, _>(v, &vectors);
    for (r, l) in right.iter().zip(&left) {
        assert_eq!(*r, -*l);
    }
    assert_ne!(
        field::field_scalar::<Dot, _, _>(&vectors, t),
        field::scalar_field::<Dot, _, _>(t, &vectors)
    );
}

#[test]
fn mixed_type_operators_broadcast_over_vectors() {
    let v = vec![Vector::new(1.0, 0.0, 0.0), Vector::new(0.0, 2.0, -1.0), Vector::new(-1.0, 1.0, 3.0)];
    let axis = Vector::new(0.0, 0.0, 1.0);

    let crossed = field::field_scalar::<Cross, _, _>(&v, axis);
    assert_eq!(crossed[0], Vector::new(0.0, -1.0, 0.0));

    let dotted = field::field_field::<Dot, _, _>(&v, &v).unwrap();
    assert_eq!(dotted, vec![1.0, 5.0, 11.0]);

    let scaled = field::scalar_field::<Multiply, _, _>(2.0, &v);
    assert_eq!(scaled[2], Vector::new(-2.0, 2.0, 6.0));

    let outer: Vec<Tensor> = field::field_field::<Outer, _, _>(&v, &v).unwrap();
    assert_eq!(field::unary::<Tr, _>(&outer), dotted);
}

#[test]
fn unary_functions_follow_host_semantics() {
    let a = [-2.5, -0.5, 0.0, 0.5, 2.5];
    assert_eq!(field::unary::<Sign, _>(&a), vec![-1.0, -1.0, 1.0, 1.0, 1.0]);
    assert_eq!(field::unary::<Pos, _>(&a), vec![0.0, 0.0, 1.0, 1.0, 1.0]);
    assert_eq!(field::unary::<Round, _>(&a), vec![-3.0, -1.0, 0.0, 1.0, 3.0]);
    assert_eq!(field::unary::<Mag, _>(&a), vec![2.5, 0.5, 0.0, 0.5, 2.5]);
    assert_eq!(field::unary::<Pow3, _>(&[2.0]), vec![8.0]);
    assert_eq!(field::stabilise(&[0.0, -1.0], 0.5), vec![0.5, -1.5]);

    // Stabilised denominators stay finite and keep their sign.
    let denom = field::stabilise(&[0.0, -0.0, -2.0], field::SMALL);
    let ratios = field::scalar_field::<Divide, _, _>(1.0, &denom);
    assert!(ratios.iter().all(|r| r.is_finite()));
    assert!(ratios[2] < 0.0);
}

#[test]
fn special_functions_match_reference_values() {
    let a = [-1.0, 0.0, 0.5, 2.0];
    let erf = field::unary::<Erf, _>(&a);
    let erfc = field::unary::<Erfc, _>(&a);
    assert_eq!(erf[1], 0.0);
    assert!((erf[0] + 0.8427007929497149).abs() < 1e-12);
    for (e, c) in erf.iter().zip(&erfc) {
        assert!((e + c - 1.0).abs() < 1e-12);
    }

    let lgamma = field::unary::<Lgamma, _>(&[1.0, 5.0, 0.5]);
    assert!(lgamma[0].abs() < 1e-12);
    assert!((lgamma[1] - 24.0f64.ln()).abs() < 1e-12);
    assert!((lgamma[2] - std::f64::consts::PI.sqrt().ln()).abs() < 1e-12);

    assert_eq!(field::unary::<J0, _>(&[0.0]), vec![1.0]);
    assert_eq!(field::unary::<J1, _>(&[0.0]), vec![0.0]);
    assert!((field::unary::<J0, _>(&[1.0])[0] - 0.7651976865579666).abs() < 1e-12);
    assert!((field::unary::<Y0, _>(&[1.0])[0] - 0.08825696421567697).abs() < 1e-12);
    assert!((field::unary::<Y1, _>(&[1.0])[0] + 0.7812128213002887).abs() < 1e-12);
}

#[test]
fn hodge_dual_and_transform_over_fields() {
    let v = vec![Vector::new(1.0, -2.0, 3.0), Vector::new(0.0, 0.5, -1.0)];
    let skew: Vec<Tensor> = field::unary::<Hdual, _>(&v);
    assert!(skew.iter().all(|t| *t == -t.transpose()));
    let back: Vec<Vector> = field::unary::<Hdual, _>(&skew);
    assert_eq!(back, v.iter().map(|x| -x).collect::<Vec<_>>());

    // half turn about z
    let r = Tensor::new(-1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, 1.0);
    let rotated = field::scalar_field::<Transform, _, _>(r, &v);
    assert_eq!(rotated[0], Vector::new(-1.0, 2.0, 3.0));
    let scalars = field::scalar_field::<Transform, _, _>(r, &[4.0_f64, -1.0]);
    assert_eq!(scalars, vec![4.0, -1.0]);
}

#[test]
fn reductions_over_mixed_fields() {
    let v = [Vector::new(1.0, -3.0, 0.0), Vector::new(-2.0, 4.0, 1.0)];
    assert_eq!(reductions::sum(&v), Vector::new(-1.0, 1.0, 1.0));
    assert_eq!(reductions::max(&v), Some(Vector::new(1.0, 4.0, 1.0)));
    assert_eq!(reductions::min(&v), Some(Vector::new(-2.0, -3.0, 0.0)));
    assert_eq!(reductions::sum_sqr(&[1.0, -2.0]), 5.0);
    assert!(reductions::max::<Scalar>(&[]).is_none());
    assert!(reductions::sum_prod(&[1.0, 2.0], &[1.0]).is_err());
}

#[test]
fn permutation_view_round_trips() {
    let mut rng = fastrand::Rng::with_seed(7);
    for len in [0usize, 1, 5, 64, 257] {
        let mut values = vec![0.0; len + 3];
        let mut addr: Vec<usize> = (0..values.len()).collect();
        rng.shuffle(&mut addr);
        addr.truncate(len);

        let written = common::random_values(&mut rng, len);
        {
            let mut view = IndirectViewMut::new(&mut values, &addr).unwrap();
            assert!(view.is_unique());
            view.assign(&written).unwrap();
        }
        let read = IndirectView::new(&values, &addr).unwrap().to_vec();
        assert_eq!(read, written);
    }
}

#[test]
fn duplicate_indices_keep_the_last_write() {
    let mut values = vec![0.0; 3];
    let addr = [1, 1, 2];
    let mut view = IndirectViewMut::new(&mut values, &addr).unwrap();
    assert!(!view.is_unique());
    view.assign(&[5.0, 6.0, 7.0]).unwrap();
    assert_eq!(values, vec![0.0, 6.0, 7.0]);
}
