//! Dense tensor storage
//!
//! This module provides `DenseND<T>`, the owned dense N-dimensional tensor used as
//! the user-facing value type of the tenckpt stack. Kernels operate on
//! `scirs2_core::ndarray_ext` views; `DenseND` wraps the owned array and adds the
//! handful of tensor-level helpers the contraction and autodiff crates need.

use crate::scalar::Scalar;
use scirs2_core::ndarray_ext::{Array, ArrayView, Dimension, IxDyn};
use scirs2_core::numeric::Num;
use std::fmt;

/// Dense N-dimensional tensor backed by scirs2_core's ndarray
///
/// # Memory Layout
///
/// Tensors built through the constructors below use C-contiguous (row-major)
/// layout. Arrays passed to [`DenseND::from_array`] are kept as they are.
///
/// # Examples
///
/// ```
/// use tenckpt_core::DenseND;
///
/// let tensor = DenseND::<f64>::zeros(&[2, 3, 4]);
/// assert_eq!(tensor.shape(), &[2, 3, 4]);
/// assert_eq!(tensor.rank(), 3);
/// ```
#[derive(Clone, PartialEq)]
pub struct DenseND<T> {
    pub(crate) data: Array<T, IxDyn>,
}

impl<T> DenseND<T>
where
    T: Clone + Num,
{
    /// Create a tensor from an existing ndarray
    ///
    /// ```
    /// use scirs2_core::ndarray_ext::Array;
    /// use tenckpt_core::DenseND;
    ///
    /// let arr = Array::<f64, _>::zeros(vec![2, 3]);
    /// let tensor = DenseND::from_array(arr);
    /// assert_eq!(tensor.shape(), &[2, 3]);
    /// ```
    pub fn from_array(array: Array<T, IxDyn>) -> Self {
        Self { data: array }
    }

    /// Create a tensor from row-major data with the given shape
    ///
    /// # Errors
    ///
    /// Fails when `vec.len()` differs from the product of `shape`.
    ///
    /// ```
    /// use tenckpt_core::DenseND;
    ///
    /// let tensor = DenseND::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
    /// assert_eq!(tensor[&[1, 0]], 4.0);
    /// assert!(DenseND::from_vec(vec![1.0, 2.0], &[3]).is_err());
    /// ```
    pub fn from_vec(vec: Vec<T>, shape: &[usize]) -> anyhow::Result<Self> {
        let total: usize = shape.iter().product();
        if vec.len() != total {
            anyhow::bail!(
                "Shape {:?} requires {} elements, but got {}",
                shape,
                total,
                vec.len()
            );
        }
        let array = Array::from_shape_vec(IxDyn(shape), vec)?;
        Ok(Self { data: array })
    }

    /// Create a tensor by evaluating `f` at every multi-index
    ///
    /// ```
    /// use tenckpt_core::DenseND;
    ///
    /// let t = DenseND::from_shape_fn(&[2, 3], |idx| (idx[0] * 3 + idx[1]) as f64);
    /// assert_eq!(t[&[1, 2]], 5.0);
    /// ```
    pub fn from_shape_fn<F>(shape: &[usize], mut f: F) -> Self
    where
        F: FnMut(&[usize]) -> T,
    {
        Self {
            data: Array::from_shape_fn(IxDyn(shape), |idx| f(idx.slice())),
        }
    }

    /// Create a tensor filled with `value`
    pub fn from_elem(shape: &[usize], value: T) -> Self {
        Self {
            data: Array::from_elem(IxDyn(shape), value),
        }
    }

    /// Create a tensor of zeros
    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            data: Array::zeros(IxDyn(shape)),
        }
    }

    /// Create a tensor of ones
    pub fn ones(shape: &[usize]) -> Self {
        Self {
            data: Array::ones(IxDyn(shape)),
        }
    }

    /// Number of modes
    pub fn rank(&self) -> usize {
        self.data.ndim()
    }

    /// Size of every mode
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the tensor has zero elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get an immutable reference to the underlying ndarray
    pub fn as_array(&self) -> &Array<T, IxDyn> {
        &self.data
    }

    /// Consume the tensor and return the underlying ndarray
    pub fn into_array(self) -> Array<T, IxDyn> {
        self.data
    }

    /// Get an immutable view of the tensor
    pub fn view(&self) -> ArrayView<'_, T, IxDyn> {
        self.data.view()
    }

    /// Copy the elements out in logical row-major order
    pub fn to_vec(&self) -> Vec<T> {
        self.data.iter().cloned().collect()
    }

    /// Element lookup that returns `None` on a bad index
    ///
    /// ```
    /// use tenckpt_core::DenseND;
    ///
    /// let tensor = DenseND::<f64>::from_elem(&[3, 4], 5.0);
    /// assert_eq!(tensor.get(&[2, 3]), Some(&5.0));
    /// assert_eq!(tensor.get(&[3, 0]), None);
    /// assert_eq!(tensor.get(&[0]), None);
    /// ```
    pub fn get(&self, index: &[usize]) -> Option<&T> {
        if index.len() != self.rank() {
            return None;
        }
        self.data.get(IxDyn(index))
    }
}

impl<T: Scalar> DenseND<T> {
    /// Largest element-wise modulus of `self - other`
    ///
    /// Used to compare tensors within a floating point tolerance, for real and
    /// complex element types alike. Any NaN difference makes the result NaN.
    ///
    /// # Errors
    ///
    /// Fails when the shapes differ.
    ///
    /// ```
    /// use tenckpt_core::DenseND;
    ///
    /// let a = DenseND::from_vec(vec![1.0, 2.0], &[2]).unwrap();
    /// let b = DenseND::from_vec(vec![1.0, 2.5], &[2]).unwrap();
    /// assert_eq!(a.max_abs_diff(&b).unwrap(), 0.5);
    /// ```
    pub fn max_abs_diff(&self, other: &Self) -> anyhow::Result<f64> {
        if self.shape() != other.shape() {
            anyhow::bail!(
                "Cannot compare tensors of shapes {:?} and {:?}",
                self.shape(),
                other.shape()
            );
        }

        Ok(self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(&a, &b)| (a - b).modulus())
            .fold(0.0, |acc: f64, diff| {
                if acc.is_nan() || diff.is_nan() {
                    f64::NAN
                } else {
                    acc.max(diff)
                }
            }))
    }

    /// Check element-wise closeness within an absolute tolerance
    ///
    /// NaN or infinite differences are never close.
    pub fn all_close(&self, other: &Self, tolerance: f64) -> bool {
        self.max_abs_diff(other)
            .map(|diff| diff.is_finite() && diff <= tolerance)
            .unwrap_or(false)
    }
}

impl<T> From<Array<T, IxDyn>> for DenseND<T> {
    fn from(array: Array<T, IxDyn>) -> Self {
        Self { data: array }
    }
}

impl<T> std::ops::Index<&[usize]> for DenseND<T> {
    type Output = T;

    fn index(&self, index: &[usize]) -> &Self::Output {
        &self.data[IxDyn(index)]
    }
}

impl<T> std::ops::IndexMut<&[usize]> for DenseND<T> {
    fn index_mut(&mut self, index: &[usize]) -> &mut Self::Output {
        &mut self.data[IxDyn(index)]
    }
}

impl<T: fmt::Debug + Clone + Num> fmt::Debug for DenseND<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DenseND")
            .field("shape", &self.shape())
            .field("rank", &self.rank())
            .field("data", &self.data)
            .finish()
    }
}
