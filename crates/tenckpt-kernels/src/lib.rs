//! # tenckpt-kernels
//!
//! Tensor-algebra kernels for the tenckpt stack.
//!
//! ## Overview
//!
//! - **N-mode products** - tensor times matrix ([`nmode_product`]) and tensor times
//!   vector ([`nmode_vector_product`]), unified by [`mode_dot`]
//! - **Adjoints** - [`transpose`] (reverses all axes), [`conj`], [`conj_transpose`]
//! - **Vector-Jacobian products** - [`mode_dot_vjp`] for reverse-mode autodiff
//! - **Multi-mode contraction** - [`MultiModeDot`] options, contraction planning
//!   with rank-reduction bookkeeping, and the eager [`multi_mode_dot`]
//!
//! ## Quick Start
//!
//! ```rust
//! use scirs2_core::ndarray_ext::{Array2, array};
//! use tenckpt_core::DenseND;
//! use tenckpt_kernels::{multi_mode_dot, nmode_product, MultiModeDot};
//!
//! let tensor = DenseND::<f64>::ones(&[3, 4, 5]);
//!
//! // Tensor-matrix product along mode 0
//! let matrix = Array2::<f64>::ones((2, 3));
//! let result = nmode_product(&tensor.view(), &matrix.view(), 0).unwrap();
//! assert_eq!(result.shape(), &[2, 4, 5]);
//!
//! // Matrix at mode 0, vector at mode 2: the vector removes its mode
//! let v = array![1.0, 0.0, 0.0, 0.0, 0.0].into_dyn();
//! let opts = MultiModeDot::new().with_modes(vec![0, 2]);
//! let result = multi_mode_dot(
//!     &tensor.view(),
//!     &[matrix.clone().into_dyn().view(), v.view()],
//!     &opts,
//! )
//! .unwrap();
//! assert_eq!(result.shape(), &[2, 4]);
//! ```
//!
//! ## Element types
//!
//! Every kernel is generic over [`tenckpt_core::Scalar`], so real and complex
//! tensors go through the same code. Conjugation is a no-op for real types.

pub mod adjoint;
pub mod error;
pub mod multi_mode;
pub mod nmode;


// Re-exports
pub use adjoint::*;
pub use error::{KernelError, KernelResult};
pub use multi_mode::*;
pub use nmode::*;
