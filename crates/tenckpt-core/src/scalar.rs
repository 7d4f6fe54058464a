//! Scalar element trait for tenckpt tensors.
//!
//! Every kernel in the stack is generic over [`Scalar`], which covers the real
//! floating point types and their complex counterparts. The only operation beyond
//! plain ring arithmetic that the contraction stack needs is complex conjugation,
//! which is the identity on real types.

use scirs2_core::num_complex::Complex;
use scirs2_core::numeric::Num;
use std::fmt::Debug;

/// Trait for tensor element types supported by tenckpt.
///
/// # Examples
///
/// ```
/// use scirs2_core::num_complex::Complex;
/// use tenckpt_core::Scalar;
///
/// assert_eq!(2.5_f64.conj(), 2.5);
/// assert_eq!(Complex::new(1.0_f64, 2.0).conj(), Complex::new(1.0, -2.0));
/// assert!(f64::IS_REAL);
/// assert!(!<Complex<f64> as Scalar>::IS_REAL);
/// ```
pub trait Scalar: Num + Copy + Debug + Send + Sync + 'static {
    /// `true` when conjugation is the identity.
    const IS_REAL: bool;

    /// Complex conjugate.
    fn conj(self) -> Self;

    /// Absolute value (modulus for complex numbers) as `f64`.
    fn modulus(self) -> f64;

    /// Embed a real value.
    fn from_real(value: f64) -> Self;
}

impl Scalar for f64 {
    const IS_REAL: bool = true;

    fn conj(self) -> Self {
        self
    }

    fn modulus(self) -> f64 {
        self.abs()
    }

    fn from_real(value: f64) -> Self {
        value
    }
}

impl Scalar for f32 {
    const IS_REAL: bool = true;

    fn conj(self) -> Self {
        self
    }

    fn modulus(self) -> f64 {
        f64::from(self.abs())
    }

    fn from_real(value: f64) -> Self {
        value as f32
    }
}

impl Scalar for Complex<f64> {
    const IS_REAL: bool = false;

    fn conj(self) -> Self {
        Complex::new(self.re, -self.im)
    }

    fn modulus(self) -> f64 {
        self.re.hypot(self.im)
    }

    fn from_real(value: f64) -> Self {
        Complex::new(value, 0.0)
    }
}

impl Scalar for Complex<f32> {
    const IS_REAL: bool = false;

    fn conj(self) -> Self {
        Complex::new(self.re, -self.im)
    }

    fn modulus(self) -> f64 {
        f64::from(self.re.hypot(self.im))
    }

    fn from_real(value: f64) -> Self {
        Complex::new(value as f32, 0.0)
    }
}
