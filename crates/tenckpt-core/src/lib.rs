//! # tenckpt-core
//!
//! Core tensor types for tenckpt.
//!
//! This crate provides the foundational building blocks the rest of the stack is
//! generic over:
//!
//! - **Dense tensor representation** ([`DenseND`]) backed by `scirs2_core::ndarray_ext`
//! - **Scalar element trait** ([`Scalar`]) covering `f32`, `f64` and their complex
//!   counterparts, with complex conjugation
//!
//! ## Quick Start
//!
//! ```
//! use tenckpt_core::{DenseND, Scalar};
//! use scirs2_core::num_complex::Complex;
//!
//! let tensor = DenseND::<f64>::from_vec((0..24).map(|x| x as f64).collect(), &[2, 3, 4]).unwrap();
//! assert_eq!(tensor.rank(), 3);
//! assert_eq!(tensor[&[1, 2, 3]], 23.0);
//!
//! let z = Complex::new(1.0_f64, -1.0);
//! assert_eq!(Scalar::conj(z), Complex::new(1.0, 1.0));
//! ```
//!
//! ## Error Handling
//!
//! Fallible constructors return `anyhow::Result`.

pub mod dense;
pub mod scalar;


pub use dense::DenseND;
pub use scalar::Scalar;

/// Axis (mode) index, zero-based.
pub type Axis = usize;

/// Number of modes of a tensor.
pub type Rank = usize;
