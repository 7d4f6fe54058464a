//! # Gradient Checkpointing
//!
//! Memory-efficient backward pass using selective recomputation.
//!
//! A checkpointed operation trades computation for memory:
//! 1. The forward result is computed immediately and handed to the caller
//! 2. Only the operation and references to its inputs are recorded
//! 3. Intermediate results consumed by a later checkpointed operation are released
//! 4. During the backward pass, released values are recomputed on demand
//!
//! Operations are described by the [`TensorOp`] trait. The tape in
//! [`crate::graph`] decides, based on [`CheckpointConfig`], whether an operation's
//! inputs are kept for backward ([`SavePolicy::Store`]) or recomputed
//! ([`SavePolicy::Recompute`]).
//!
//! # Usage
//!
//! ```rust
//! use tenckpt_ad::checkpoint::{CheckpointConfig, ModeDotOp, SavePolicy};
//! use tenckpt_ad::graph::Tape;
//! use tenckpt_core::DenseND;
//!
//! let tape = Tape::<f64>::with_config(CheckpointConfig {
//!     policy: SavePolicy::Recompute,
//!     ..Default::default()
//! });
//!
//! let x = tape.variable(DenseND::ones(&[3, 4]), true);
//! let m = tape.variable(DenseND::ones(&[2, 3]), true);
//! let y = tape.checkpoint(ModeDotOp::new(0), &[x, m]).unwrap();
//!
//! tape.backward(&y).unwrap();
//! assert_eq!(tape.gradient(&m).unwrap().shape(), &[2, 3]);
//! ```

use anyhow::{anyhow, Result};
use scirs2_core::ndarray_ext::{ArrayD, ArrayView, IxDyn};
use std::fmt::Debug;
use tenckpt_core::Scalar;
use tenckpt_kernels::{conj, mode_dot, mode_dot_vjp, transpose};

/// Configuration for gradient checkpointing
#[derive(Debug, Clone)]
pub struct CheckpointConfig {
    /// What a checkpointed operation keeps for the backward pass
    pub policy: SavePolicy,

    /// Whether to verify recomputed values match the original forward result
    pub verify_recomputation: bool,

    /// Relative tolerance for recomputation verification
    pub verification_tolerance: f64,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            policy: SavePolicy::Recompute,
            verify_recomputation: false,
            verification_tolerance: 1e-6,
        }
    }
}

impl CheckpointConfig {
    /// Keep every activation, as if no operation were checkpointed
    pub fn store() -> Self {
        Self {
            policy: SavePolicy::Store,
            ..Default::default()
        }
    }

    /// Recompute checkpointed activations and check them against the forward pass
    pub fn verified(tolerance: f64) -> Self {
        Self {
            policy: SavePolicy::Recompute,
            verify_recomputation: true,
            verification_tolerance: tolerance,
        }
    }
}

/// Residency policy for checkpointed operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SavePolicy {
    /// Save nothing; release consumed intermediates and recompute during backward
    #[default]
    Recompute,

    /// Save inputs for backward (no memory savings, for testing and comparison)
    Store,
}

/// Memory accounting of a tape
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Number of recorded nodes
    pub num_nodes: usize,

    /// Bytes held by node values that are currently resident
    pub retained_bytes: usize,

    /// Bytes held by inputs saved for backward, excluding buffers shared with
    /// resident node values
    pub saved_bytes: usize,

    /// Number of nodes whose value has been released
    pub released_nodes: usize,

    /// Bytes that released values would occupy if resident
    pub released_bytes: usize,
}

impl MemoryStats {
    /// Total resident bytes
    pub fn resident_bytes(&self) -> usize {
        self.retained_bytes + self.saved_bytes
    }
}

/// A differentiable tensor operation that can be re-executed during backward
///
/// `forward` must be deterministic: recomputation relies on it producing the same
/// result for the same inputs.
pub trait TensorOp<T: Scalar>: Send + Sync + Debug {
    /// Short name used in logs and errors
    fn name(&self) -> &'static str;

    /// Number of inputs
    fn arity(&self) -> usize;

    /// Forward computation
    fn forward(&self, inputs: &[ArrayView<T, IxDyn>]) -> Result<ArrayD<T>>;

    /// Backward computation (VJP), one gradient per input
    fn backward(
        &self,
        inputs: &[ArrayView<T, IxDyn>],
        cotangent: &ArrayView<T, IxDyn>,
    ) -> Result<Vec<ArrayD<T>>>;
}

fn expect_inputs<'a, 'b, T>(
    name: &str,
    inputs: &'a [ArrayView<'b, T, IxDyn>],
    arity: usize,
) -> Result<&'a [ArrayView<'b, T, IxDyn>]> {
    if inputs.len() != arity {
        return Err(anyhow!(
            "{} expects {} input(s), got {}",
            name,
            arity,
            inputs.len()
        ));
    }
    Ok(inputs)
}

/// Single-mode contraction `(tensor, factor) -> tensor ×ₖ factor`
///
/// The factor is a matrix `(J, Iₖ)` or a vector `(Iₖ)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeDotOp {
    pub mode: usize,
}

impl ModeDotOp {
    pub fn new(mode: usize) -> Self {
        Self { mode }
    }
}

impl<T: Scalar> TensorOp<T> for ModeDotOp {
    fn name(&self) -> &'static str {
        "mode_dot"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&self, inputs: &[ArrayView<T, IxDyn>]) -> Result<ArrayD<T>> {
        let inputs = expect_inputs("mode_dot", inputs, 2)?;
        Ok(mode_dot(&inputs[0], &inputs[1], self.mode)?)
    }

    fn backward(
        &self,
        inputs: &[ArrayView<T, IxDyn>],
        cotangent: &ArrayView<T, IxDyn>,
    ) -> Result<Vec<ArrayD<T>>> {
        let inputs = expect_inputs("mode_dot", inputs, 2)?;
        let (grad_tensor, grad_factor) = mode_dot_vjp(&inputs[0], &inputs[1], self.mode, cotangent)?;
        Ok(vec![grad_tensor, grad_factor])
    }
}

/// Reverse all axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransposeOp;

impl<T: Scalar> TensorOp<T> for TransposeOp {
    fn name(&self) -> &'static str {
        "transpose"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&self, inputs: &[ArrayView<T, IxDyn>]) -> Result<ArrayD<T>> {
        let inputs = expect_inputs("transpose", inputs, 1)?;
        Ok(transpose(&inputs[0]))
    }

    fn backward(
        &self,
        inputs: &[ArrayView<T, IxDyn>],
        cotangent: &ArrayView<T, IxDyn>,
    ) -> Result<Vec<ArrayD<T>>> {
        expect_inputs("transpose", inputs, 1)?;
        Ok(vec![transpose(cotangent)])
    }
}

/// Element-wise complex conjugate
///
/// Conjugation is antilinear, so the cotangent is conjugated on the way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConjOp;

impl<T: Scalar> TensorOp<T> for ConjOp {
    fn name(&self) -> &'static str {
        "conj"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&self, inputs: &[ArrayView<T, IxDyn>]) -> Result<ArrayD<T>> {
        let inputs = expect_inputs("conj", inputs, 1)?;
        Ok(conj(&inputs[0]))
    }

    fn backward(
        &self,
        inputs: &[ArrayView<T, IxDyn>],
        cotangent: &ArrayView<T, IxDyn>,
    ) -> Result<Vec<ArrayD<T>>> {
        expect_inputs("conj", inputs, 1)?;
        Ok(vec![conj(cotangent)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scirs2_core::ndarray_ext::array;
    use scirs2_core::num_complex::Complex;

    #[test]
    fn test_default_config() {
        let config = CheckpointConfig::default();
        assert_eq!(config.policy, SavePolicy::Recompute);
        assert!(!config.verify_recomputation);
        assert_eq!(CheckpointConfig::store().policy, SavePolicy::Store);
        assert!(CheckpointConfig::verified(1e-9).verify_recomputation);
    }

    #[test]
    fn test_mode_dot_op_forward_backward() -> Result<()> {
        let x = array![[1.0, 2.0], [3.0, 4.0]].into_dyn();
        let m = array![[1.0, 1.0]].into_dyn();
        let op = ModeDotOp::new(0);

        let y = TensorOp::<f64>::forward(&op, &[x.view(), m.view()])?;
        assert_eq!(y, array![[4.0, 6.0]].into_dyn());

        let g = array![[1.0, 1.0]].into_dyn();
        let grads = op.backward(&[x.view(), m.view()], &g.view())?;
        assert_eq!(grads.len(), 2);
        assert_eq!(grads[0], array![[1.0, 1.0], [1.0, 1.0]].into_dyn());
        assert_eq!(grads[1], array![[3.0, 7.0]].into_dyn());
        Ok(())
    }

    #[test]
    fn test_arity_checked() {
        let x = array![1.0, 2.0].into_dyn();
        let op = ModeDotOp::new(0);
        let err = TensorOp::<f64>::forward(&op, &[x.view()]).unwrap_err();
        assert!(err.to_string().contains("expects 2 input(s), got 1"));
    }

    #[test]
    fn test_transpose_op_backward_restores_shape() -> Result<()> {
        let x = array![[1.0, 2.0, 3.0]].into_dyn();
        let y = TensorOp::<f64>::forward(&TransposeOp, &[x.view()])?;
        assert_eq!(y.shape(), &[3, 1]);

        let grads = TransposeOp.backward(&[x.view()], &y.view())?;
        assert_eq!(grads[0], x);
        Ok(())
    }

    #[test]
    fn test_conj_op_conjugates_cotangent() -> Result<()> {
        let x = array![Complex::new(1.0_f64, 2.0)].into_dyn();
        let y = ConjOp.forward(&[x.view()])?;
        assert_eq!(y[[0]], Complex::new(1.0, -2.0));

        let g = array![Complex::new(0.0_f64, 1.0)].into_dyn();
        let grads = ConjOp.backward(&[x.view()], &g.view())?;
        assert_eq!(grads[0][[0]], Complex::new(0.0, -1.0));
        Ok(())
    }

    #[test]
    fn test_mode_dot_op_propagates_kernel_error() {
        let x = array![[1.0, 2.0]].into_dyn();
        let m = array![[1.0, 1.0, 1.0]].into_dyn();
        let err = TensorOp::<f64>::forward(&ModeDotOp::new(1), &[x.view(), m.view()]).unwrap_err();
        assert!(err.to_string().contains("dimension mismatch"));
    }
}
