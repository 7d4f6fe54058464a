//! Integration tests for tenckpt-kernels with tenckpt-core
//!
//! These tests drive the multi-mode contraction through `DenseND` tensors and
//! check it against step-by-step single-mode contractions.

use scirs2_core::ndarray_ext::{Array1, Array2, ArrayD};
use scirs2_core::num_complex::Complex;
use tenckpt_core::DenseND;
use tenckpt_kernels::{
    conj_transpose, mode_dot, multi_mode_dot, nmode_product, nmode_vector_product, transpose,
    KernelError, MultiModeDot,
};

fn sample(shape: &[usize]) -> DenseND<f64> {
    DenseND::from_shape_fn(shape, |idx| {
        idx.iter()
            .enumerate()
            .map(|(axis, &i)| ((axis + 1) * (i + 1)) as f64)
            .product::<f64>()
            .sqrt()
    })
}

fn assert_close(a: &ArrayD<f64>, b: &ArrayD<f64>) {
    assert_eq!(a.shape(), b.shape());
    for (x, y) in a.iter().zip(b.iter()) {
        assert!((x - y).abs() < 1e-10, "{} != {}", x, y);
    }
}

#[test]
fn test_matches_naive_sequential_contraction() {
    let tensor = sample(&[3, 4, 5]);
    let a = Array2::from_shape_fn((2, 3), |(i, j)| (i + 2 * j) as f64);
    let b = Array2::from_shape_fn((6, 4), |(i, j)| (i as f64 - j as f64) * 0.5);
    let c = Array2::from_shape_fn((3, 5), |(i, j)| ((i * j) % 3) as f64);

    let result = multi_mode_dot(
        &tensor.view(),
        &[
            a.clone().into_dyn().view(),
            b.clone().into_dyn().view(),
            c.clone().into_dyn().view(),
        ],
        &MultiModeDot::new(),
    )
    .unwrap();

    let step = nmode_product(&tensor.view(), &a.view(), 0).unwrap();
    let step = nmode_product(&step.view(), &b.view(), 1).unwrap();
    let expected = nmode_product(&step.view(), &c.view(), 2).unwrap();

    assert_eq!(result.shape(), &[2, 6, 3]);
    assert_eq!(result, expected);
}

#[test]
fn test_default_modes_equal_explicit() {
    let tensor = sample(&[2, 3, 4]);
    let factors: Vec<ArrayD<f64>> = vec![
        Array2::from_shape_fn((3, 2), |(i, j)| (i + j) as f64).into_dyn(),
        Array1::from_vec(vec![1.0, -1.0, 0.5]).into_dyn(),
        Array2::from_shape_fn((2, 4), |(i, j)| (i * 4 + j) as f64).into_dyn(),
    ];
    let views: Vec<_> = factors.iter().map(|f| f.view()).collect();

    let implicit = multi_mode_dot(&tensor.view(), &views, &MultiModeDot::new()).unwrap();
    let explicit = multi_mode_dot(
        &tensor.view(),
        &views,
        &MultiModeDot::new().with_modes(vec![0, 1, 2]),
    )
    .unwrap();

    assert_eq!(implicit, explicit);
    assert_eq!(implicit.shape(), &[3, 2]);
}

#[test]
fn test_rank_reduction_accounting() {
    // Vectors at modes 0 and 2 of an order-3 tensor leave a vector over mode 1
    let tensor = sample(&[3, 4, 5]);
    let u = Array1::from_vec(vec![1.0, 2.0, 3.0]);
    let w = Array1::from_vec(vec![0.5, 0.0, -1.0, 0.0, 2.0]);

    let result = multi_mode_dot(
        &tensor.view(),
        &[u.clone().into_dyn().view(), w.clone().into_dyn().view()],
        &MultiModeDot::new().with_modes(vec![0, 2]),
    )
    .unwrap();

    assert_eq!(result.shape(), &[4]);
    for j in 0..4 {
        let mut expected = 0.0;
        for i in 0..3 {
            for k in 0..5 {
                expected += u[i] * tensor[&[i, j, k]] * w[k];
            }
        }
        assert!((result[[j]] - expected).abs() < 1e-10);
    }
}

#[test]
fn test_skip_first_sorted_pair() {
    let tensor = sample(&[3, 4]);
    let a = Array2::from_shape_fn((2, 3), |(i, j)| (i + j) as f64);
    let v = Array1::from_vec(vec![1.0, 0.0, 2.0, -1.0]);

    let result = multi_mode_dot(
        &tensor.view(),
        &[a.clone().into_dyn().view(), v.clone().into_dyn().view()],
        &MultiModeDot::new().with_modes(vec![0, 1]).with_skip(0),
    )
    .unwrap();

    let expected = nmode_vector_product(&tensor.view(), &v.view(), 1).unwrap();
    assert_eq!(result.shape(), &[3]);
    assert_eq!(result, expected);
}

#[test]
fn test_skip_refers_to_sorted_position_not_input_position() {
    let tensor = sample(&[3, 4]);
    let a = Array2::from_shape_fn((2, 3), |(i, j)| (i + j) as f64);
    let b = Array2::from_shape_fn((5, 4), |(i, j)| (i * j) as f64);

    // Inputs are given as [b, a] with modes [1, 0]; sorted order is [a, b].
    let result = multi_mode_dot(
        &tensor.view(),
        &[b.clone().into_dyn().view(), a.clone().into_dyn().view()],
        &MultiModeDot::new().with_modes(vec![1, 0]).with_skip(0),
    )
    .unwrap();

    // Position 0 of the sorted list is `a`, so only `b` is applied
    let expected = nmode_product(&tensor.view(), &b.view(), 1).unwrap();
    assert_eq!(result, expected);
}

#[test]
fn test_transpose_real_uses_plain_transpose() {
    let tensor = sample(&[3, 4]);
    let a = Array2::from_shape_fn((3, 2), |(i, j)| (i + 3 * j) as f64);

    let result = multi_mode_dot(
        &tensor.view(),
        &[a.clone().into_dyn().view()],
        &MultiModeDot::new().with_transpose(true),
    )
    .unwrap();

    let expected = nmode_product(&tensor.view(), &a.t(), 0).unwrap();
    assert_eq!(result.shape(), &[2, 4]);
    assert_close(&result, &expected);
}

#[test]
fn test_transpose_complex_uses_conjugate_transpose() {
    let tensor = DenseND::from_shape_fn(&[2, 3], |idx| {
        Complex::new(idx[0] as f64 + 1.0, idx[1] as f64 - 1.0)
    });
    let a = Array2::from_shape_fn((2, 2), |(i, j)| Complex::new(i as f64, j as f64 + 1.0))
        .into_dyn();

    let result = multi_mode_dot(
        &tensor.view(),
        &[a.view()],
        &MultiModeDot::new().with_transpose(true),
    )
    .unwrap();

    let adjoint = conj_transpose(&a.view());
    let expected = mode_dot(&tensor.view(), &adjoint.view(), 0).unwrap();
    assert_eq!(result, expected);

    // Differs from the plain transpose whenever the factor has imaginary parts
    let plain = mode_dot(&tensor.view(), &transpose(&a.view()).view(), 0).unwrap();
    assert_ne!(result, plain);
}

#[test]
fn test_vector_contraction_to_scalar() {
    let tensor = sample(&[4]);
    let v = Array1::from_vec(vec![1.0, 1.0, 1.0, 1.0]).into_dyn();

    let result = multi_mode_dot(&tensor.view(), &[v.view()], &MultiModeDot::new()).unwrap();
    assert_eq!(result.ndim(), 0);
    let total: f64 = tensor.to_vec().iter().sum();
    assert!((result.sum() - total).abs() < 1e-12);
}

#[test]
fn test_errors_surface_from_kernels() {
    let tensor = sample(&[2, 3]);

    let cube = sample(&[2, 2, 2]).into_array();
    let err = multi_mode_dot(&tensor.view(), &[cube.view()], &MultiModeDot::new()).unwrap_err();
    assert!(matches!(err, KernelError::InvalidFactorRank { rank: 3, .. }));

    let v = Array1::from_vec(vec![1.0, 1.0]).into_dyn();
    let err = multi_mode_dot(
        &tensor.view(),
        &[v.view()],
        &MultiModeDot::new().with_modes(vec![5]),
    )
    .unwrap_err();
    assert!(matches!(err, KernelError::InvalidMode { mode: 5, .. }));

    let err = multi_mode_dot(
        &tensor.view(),
        &[v.view()],
        &MultiModeDot::new().with_modes(vec![0, 1]),
    )
    .unwrap_err();
    assert!(matches!(err, KernelError::ModesLengthMismatch { .. }));
}
