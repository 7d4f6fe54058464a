//! Transpose and conjugation kernels
//!
//! `transpose` reverses the order of all axes. For matrices this is the ordinary
//! transpose; vectors are returned unchanged. `conj` is the identity for real
//! element types.

use scirs2_core::ndarray_ext::{ArrayD, ArrayView, IxDyn};
use tenckpt_core::Scalar;

/// Reverse all axes of an array
///
/// The result is always in standard (row-major) layout.
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use tenckpt_kernels::transpose;
///
/// let m = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]].into_dyn();
/// let t = transpose(&m.view());
/// assert_eq!(t.shape(), &[3, 2]);
/// assert_eq!(t[[2, 1]], 6.0);
/// ```
pub fn transpose<T: Clone>(array: &ArrayView<T, IxDyn>) -> ArrayD<T> {
    array
        .clone()
        .reversed_axes()
        .as_standard_layout()
        .into_owned()
}

/// Element-wise complex conjugate
pub fn conj<T: Scalar>(array: &ArrayView<T, IxDyn>) -> ArrayD<T> {
    if T::IS_REAL {
        array.to_owned()
    } else {
        array.mapv(|x| x.conj())
    }
}

/// Conjugate transpose, `conj(transpose(a))`
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use scirs2_core::num_complex::Complex;
/// use tenckpt_kernels::conj_transpose;
///
/// let m = array![[Complex::new(1.0, 2.0), Complex::new(0.0, 1.0)]].into_dyn();
/// let h = conj_transpose(&m.view());
/// assert_eq!(h.shape(), &[2, 1]);
/// assert_eq!(h[[0, 0]], Complex::new(1.0, -2.0));
/// ```
pub fn conj_transpose<T: Scalar>(array: &ArrayView<T, IxDyn>) -> ArrayD<T> {
    conj(&transpose(array).view())
}
