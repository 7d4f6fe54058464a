//! N-mode products (TTM / TTV) and their vector-Jacobian products
//!
//! The N-mode product multiplies a tensor by a matrix along a specific mode. For
//! tensor X ∈ 𝕂^(I₁×...×Iₙ) and matrix M ∈ 𝕂^(J×Iₖ), the result Y = X ×ₖ M has shape
//! (I₁×...×Iₖ₋₁×J×Iₖ₊₁×...×Iₙ). Contracting with a vector v ∈ 𝕂^(Iₖ) instead
//! removes mode k entirely.
//!
//! [`mode_dot`] dispatches on the factor's rank and is the single-mode contraction
//! primitive used by the multi-mode contractors.

use crate::error::{KernelError, KernelResult};
use scirs2_core::ndarray_ext::{
    Array, Array2, ArrayD, ArrayView, ArrayView1, ArrayView2, Axis, Ix1, Ix2, IxDyn,
};
use tenckpt_core::Scalar;

/// Compute the N-mode product (tensor times matrix)
///
/// For tensor X with shape (I₁, I₂, ..., Iₙ) and matrix M with shape (J, Iₖ),
/// computes Y = X ×ₖ M with shape (I₁, ..., Iₖ₋₁, J, Iₖ₊₁, ..., Iₙ).
///
/// # Algorithm
///
/// 1. Unfold tensor X along mode k to get matrix X_(k) of shape (Iₖ, ∏ᵢ≠ₖ Iᵢ)
/// 2. Compute Y_(k) = M · X_(k) with shape (J, ∏ᵢ≠ₖ Iᵢ)
/// 3. Fold Y_(k) back to tensor Y with the new shape
///
/// # Errors
///
/// Returns error if:
/// - Mode is out of bounds
/// - Matrix columns don't match tensor mode size
///
/// # Complexity
///
/// Time: O(J * total_elements), Space: O(J * ∏ᵢ≠ₖ Iᵢ)
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::{Array, array};
/// use tenckpt_kernels::nmode_product;
///
/// let tensor = Array::from_shape_vec(
///     vec![2, 3, 4],
///     (0..24).map(|x| x as f64).collect()
/// ).unwrap();
///
/// // Matrix: 5×3 (will replace mode-1 dimension)
/// let matrix = array![[1.0, 0.0, 0.0],
///                      [0.0, 1.0, 0.0],
///                      [0.0, 0.0, 1.0],
///                      [1.0, 1.0, 0.0],
///                      [0.0, 1.0, 1.0]];
///
/// let result = nmode_product(&tensor.view(), &matrix.view(), 1).unwrap();
/// assert_eq!(result.shape(), &[2, 5, 4]);
/// ```
pub fn nmode_product<T: Scalar>(
    tensor: &ArrayView<T, IxDyn>,
    matrix: &ArrayView2<T>,
    mode: usize,
) -> KernelResult<Array<T, IxDyn>> {
    let tensor_shape = tensor.shape();
    let rank = tensor_shape.len();

    if mode >= rank {
        return Err(KernelError::invalid_mode(
            mode,
            rank,
            format!("nmode_product on tensor of rank {}", rank),
        ));
    }

    let mode_size = tensor_shape[mode];
    let (matrix_rows, matrix_cols) = matrix.dim();

    if matrix_cols != mode_size {
        return Err(KernelError::dimension_mismatch(
            "nmode_product",
            vec![mode_size],
            vec![matrix_cols],
            format!("Matrix columns must match tensor mode-{} size", mode),
        ));
    }

    let unfolded = unfold_tensor(tensor, mode)?;
    let result_unfolded = matrix.dot(&unfolded);

    let mut new_shape: Vec<usize> = tensor_shape.to_vec();
    new_shape[mode] = matrix_rows;

    fold_matrix(result_unfolded, &new_shape, mode)
}

/// Contract a tensor with a vector along one mode (tensor times vector)
///
/// For tensor X with shape (I₁, ..., Iₙ) and vector v of length Iₖ, the result
/// has shape (I₁, ..., Iₖ₋₁, Iₖ₊₁, ..., Iₙ). Contracting a rank-1 tensor yields
/// a rank-0 tensor holding a single value.
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::{Array, array};
/// use tenckpt_kernels::nmode_vector_product;
///
/// let tensor = Array::from_shape_vec(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
/// let v = array![1.0, 1.0];
///
/// let result = nmode_vector_product(&tensor.view(), &v.view(), 0).unwrap();
/// assert_eq!(result.shape(), &[3]);
/// assert_eq!(result[[0]], 5.0);
/// ```
pub fn nmode_vector_product<T: Scalar>(
    tensor: &ArrayView<T, IxDyn>,
    vector: &ArrayView1<T>,
    mode: usize,
) -> KernelResult<Array<T, IxDyn>> {
    let tensor_shape = tensor.shape();
    let rank = tensor_shape.len();

    if mode >= rank {
        return Err(KernelError::invalid_mode(
            mode,
            rank,
            format!("nmode_vector_product on tensor of rank {}", rank),
        ));
    }

    if vector.len() != tensor_shape[mode] {
        return Err(KernelError::dimension_mismatch(
            "nmode_vector_product",
            vec![tensor_shape[mode]],
            vec![vector.len()],
            format!("Vector length must match tensor mode-{} size", mode),
        ));
    }

    let new_shape = remove_mode(tensor_shape, mode);
    let unfolded = unfold_tensor(tensor, mode)?;
    let contracted = vector.dot(&unfolded);

    contracted
        .into_shape_with_order(IxDyn(&new_shape))
        .map_err(|e| KernelError::shape("nmode_vector_product", e))
}

/// Single-mode contraction with a matrix or a vector factor
///
/// Dispatches on the factor's rank: a matrix `(J, Iₖ)` goes through
/// [`nmode_product`], a vector `(Iₖ)` through [`nmode_vector_product`].
///
/// # Errors
///
/// Besides the errors of the two products, fails with
/// [`KernelError::InvalidFactorRank`] for factors of any other rank.
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::{Array, array};
/// use tenckpt_kernels::mode_dot;
///
/// let tensor = Array::from_shape_vec(vec![2, 3, 4], (0..24).map(|x| x as f64).collect()).unwrap();
/// let matrix = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]].into_dyn();
/// let vector = array![1.0, 0.0, 0.0, 0.0].into_dyn();
///
/// assert_eq!(mode_dot(&tensor.view(), &matrix.view(), 0).unwrap().shape(), &[3, 3, 4]);
/// assert_eq!(mode_dot(&tensor.view(), &vector.view(), 2).unwrap().shape(), &[2, 3]);
/// ```
pub fn mode_dot<T: Scalar>(
    tensor: &ArrayView<T, IxDyn>,
    factor: &ArrayView<T, IxDyn>,
    mode: usize,
) -> KernelResult<Array<T, IxDyn>> {
    match factor.ndim() {
        2 => nmode_product(tensor, &as_matrix(factor)?, mode),
        1 => nmode_vector_product(tensor, &as_vector(factor)?, mode),
        rank => Err(KernelError::invalid_factor_rank("mode_dot", rank)),
    }
}

/// Vector-Jacobian product of [`mode_dot`]
///
/// Given the cotangent G of `Y = mode_dot(X, F, k)`, returns `(∂L/∂X, ∂L/∂F)` using
/// the conjugate (Wirtinger) convention, which reduces to the ordinary transpose
/// rule for real element types:
///
/// - matrix: `∂L/∂X = G ×ₖ Mᴴ`, `∂L/∂M = G_(k) · conj(X_(k))ᵀ`
/// - vector: `∂L/∂X = G ⊗ₖ conj(v)`, `∂L/∂v = conj(X_(k)) · vec(G)`
///
/// # Errors
///
/// Fails when the cotangent shape is not the output shape of the forward product,
/// or for the same reasons as [`mode_dot`].
pub fn mode_dot_vjp<T: Scalar>(
    tensor: &ArrayView<T, IxDyn>,
    factor: &ArrayView<T, IxDyn>,
    mode: usize,
    cotangent: &ArrayView<T, IxDyn>,
) -> KernelResult<(ArrayD<T>, ArrayD<T>)> {
    let rank = tensor.ndim();
    if mode >= rank {
        return Err(KernelError::invalid_mode(
            mode,
            rank,
            format!("mode_dot_vjp on tensor of rank {}", rank),
        ));
    }

    match factor.ndim() {
        2 => {
            let matrix = as_matrix(factor)?;
            let mut expected = tensor.shape().to_vec();
            expected[mode] = matrix.nrows();
            check_cotangent(&expected, cotangent)?;

            let adjoint = matrix.t().mapv(|x| x.conj());
            let grad_tensor = nmode_product(cotangent, &adjoint.view(), mode)?;

            let cotangent_unfolded = unfold_tensor(cotangent, mode)?;
            let tensor_unfolded = unfold_tensor(tensor, mode)?.mapv(|x| x.conj());
            let grad_matrix = cotangent_unfolded.dot(&tensor_unfolded.t());

            Ok((grad_tensor, grad_matrix.into_dyn()))
        }
        1 => {
            let vector = as_vector(factor)?;
            let expected = remove_mode(tensor.shape(), mode);
            check_cotangent(&expected, cotangent)?;

            let column = vector.mapv(|x| x.conj()).insert_axis(Axis(1));
            let expanded = cotangent.clone().insert_axis(Axis(mode));
            let grad_tensor = nmode_product(&expanded, &column.view(), mode)?;

            let tensor_unfolded = unfold_tensor(tensor, mode)?.mapv(|x| x.conj());
            let flat = cotangent
                .as_standard_layout()
                .into_owned()
                .into_shape_with_order(tensor_unfolded.ncols())
                .map_err(|e| KernelError::shape("mode_dot_vjp", e))?;
            let grad_vector = tensor_unfolded.dot(&flat);

            Ok((grad_tensor, grad_vector.into_dyn()))
        }
        rank => Err(KernelError::invalid_factor_rank("mode_dot_vjp", rank)),
    }
}

fn as_matrix<'a, T>(factor: &'a ArrayView<'_, T, IxDyn>) -> KernelResult<ArrayView2<'a, T>> {
    factor
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|e| KernelError::shape("mode_dot", e))
}

fn as_vector<'a, T>(factor: &'a ArrayView<'_, T, IxDyn>) -> KernelResult<ArrayView1<'a, T>> {
    factor
        .view()
        .into_dimensionality::<Ix1>()
        .map_err(|e| KernelError::shape("mode_dot", e))
}

fn check_cotangent<T>(expected: &[usize], cotangent: &ArrayView<T, IxDyn>) -> KernelResult<()> {
    if cotangent.shape() != expected {
        return Err(KernelError::dimension_mismatch(
            "mode_dot_vjp",
            expected.to_vec(),
            cotangent.shape().to_vec(),
            "Cotangent must have the shape of the forward output",
        ));
    }
    Ok(())
}

fn remove_mode(shape: &[usize], mode: usize) -> Vec<usize> {
    shape
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != mode)
        .map(|(_, &s)| s)
        .collect()
}

/// Unfold a tensor along a specific mode into a matrix
///
/// For tensor X with shape (I₁, ..., Iₖ, ..., Iₙ), unfolds to matrix
/// with shape (Iₖ, I₁ · ... · Iₖ₋₁ · Iₖ₊₁ · ... · Iₙ). Columns enumerate the
/// remaining modes in row-major order.
pub(crate) fn unfold_tensor<T: Scalar>(
    tensor: &ArrayView<T, IxDyn>,
    mode: usize,
) -> KernelResult<Array2<T>> {
    let shape = tensor.shape();
    if mode >= shape.len() {
        return Err(KernelError::invalid_mode(mode, shape.len(), "unfold"));
    }

    let mode_size = shape[mode];
    let other_size: usize = remove_mode(shape, mode).iter().product();

    // Permutation: [mode, 0, 1, ..., mode-1, mode+1, ..., rank-1]
    let mut perm: Vec<usize> = Vec::with_capacity(shape.len());
    perm.push(mode);
    perm.extend((0..shape.len()).filter(|&i| i != mode));

    let permuted = tensor.clone().permuted_axes(IxDyn(&perm));
    let contiguous = permuted.as_standard_layout().into_owned();

    contiguous
        .into_shape_with_order((mode_size, other_size))
        .map_err(|e| KernelError::shape("unfold", e))
}

/// Fold a matrix back into a tensor along a specific mode
///
/// Inverse operation of [`unfold_tensor`].
pub(crate) fn fold_matrix<T: Scalar>(
    matrix: Array2<T>,
    shape: &[usize],
    mode: usize,
) -> KernelResult<Array<T, IxDyn>> {
    let mode_size = shape[mode];
    let rest = remove_mode(shape, mode);
    let other_size: usize = rest.iter().product();

    if matrix.dim() != (mode_size, other_size) {
        return Err(KernelError::dimension_mismatch(
            "fold",
            vec![mode_size, other_size],
            matrix.shape().to_vec(),
            format!("Cannot fold into shape {:?} along mode {}", shape, mode),
        ));
    }

    // Intermediate shape: [mode_size, other_dims...]
    let mut inter_shape = Vec::with_capacity(shape.len());
    inter_shape.push(mode_size);
    inter_shape.extend_from_slice(&rest);

    let inter = matrix
        .as_standard_layout()
        .into_owned()
        .into_shape_with_order(IxDyn(&inter_shape))
        .map_err(|e| KernelError::shape("fold", e))?;

    let mut inv_perm = vec![0; shape.len()];
    let mut idx = 1;
    for (i, item) in inv_perm.iter_mut().enumerate() {
        if i != mode {
            *item = idx;
            idx += 1;
        }
    }

    Ok(inter
        .permuted_axes(IxDyn(&inv_perm))
        .as_standard_layout()
        .into_owned())
}
