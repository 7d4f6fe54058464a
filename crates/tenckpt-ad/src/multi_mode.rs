//! Checkpointed multi-mode contraction
//!
//! [`multi_mode_dot_checkpoint`] contracts a tensor with one factor per mode and
//! records every step on a [`Tape`] as a checkpoint. No per-step activation is
//! kept for the backward pass; each one is released as soon as the next step has
//! consumed it and recomputed when gradients are requested.
//!
//! Planning (pairing factors with modes, sorting, skip, and the rank-reduction
//! bookkeeping) is shared with the eager [`tenckpt_kernels::multi_mode_dot`].
//!
//! # Skip indexes the sorted list
//!
//! `skip` is a position in the `(factor, mode)` list *after* sorting by mode. When
//! explicit modes are not already ascending, `skip = Some(i)` does not skip
//! `factors[i]`; see [`MultiModeDot`].

use crate::checkpoint::{ConjOp, ModeDotOp, TransposeOp};
use crate::graph::{Tape, Variable};
use anyhow::Result;
use tenckpt_core::Scalar;
use tenckpt_kernels::MultiModeDot;

/// Contract `tensor` with `factors` along several modes, one checkpoint per step
///
/// Each factor is a matrix `(J, Iₖ)` replacing mode `k` by `J`, or a vector `(Iₖ)`
/// removing mode `k`. With `options.transpose`, every factor is transposed and
/// conjugated first, and both of those steps are checkpointed too.
///
/// Returns `tensor` itself when no step remains (no factors, or the only one was
/// skipped).
///
/// # Errors
///
/// Planning errors (mismatched modes length, a factor that is neither a matrix nor
/// a vector, a mode removed by an earlier vector contraction) and kernel errors of
/// any step (mode out of range, contracted dimension mismatch).
///
/// # Examples
///
/// ```
/// use tenckpt_ad::{multi_mode_dot_checkpoint, Tape};
/// use tenckpt_core::DenseND;
/// use tenckpt_kernels::MultiModeDot;
///
/// # fn main() -> anyhow::Result<()> {
/// let tape = Tape::<f64>::new();
/// let x = tape.variable(DenseND::ones(&[3, 4, 5]), true);
/// let u = tape.variable(DenseND::ones(&[3]), true);
/// let w = tape.variable(DenseND::ones(&[5]), true);
///
/// let opts = MultiModeDot::new().with_modes(vec![0, 2]);
/// let y = multi_mode_dot_checkpoint(&tape, &x, &[u, w], &opts)?;
/// assert_eq!(tape.shape(&y)?, vec![4]);
///
/// tape.backward(&y)?;
/// assert_eq!(tape.gradient(&u)?.shape(), &[3]);
/// # Ok(())
/// # }
/// ```
pub fn multi_mode_dot_checkpoint<T: Scalar>(
    tape: &Tape<T>,
    tensor: &Variable,
    factors: &[Variable],
    options: &MultiModeDot,
) -> Result<Variable> {
    let ranks = factors
        .iter()
        .map(|factor| tape.ndim(factor))
        .collect::<Result<Vec<_>>>()?;
    let steps = options.plan(&ranks)?;

    tracing::debug!(
        tensor = %tensor.id(),
        num_factors = factors.len(),
        num_steps = steps.len(),
        skip = ?options.skip,
        transpose = options.transpose,
        "planned multi-mode contraction"
    );

    let mut result = *tensor;
    for step in &steps {
        let mut factor = factors[step.factor];
        if options.transpose {
            factor = tape.checkpoint(TransposeOp, &[factor])?;
            factor = tape.checkpoint(ConjOp, &[factor])?;
        }
        result = tape.checkpoint(ModeDotOp::new(step.mode), &[result, factor])?;

        tracing::debug!(
            factor = step.factor,
            declared_mode = step.declared_mode,
            mode = step.mode,
            eliminates_mode = step.eliminates_mode,
            node = %result.id(),
            "contracted"
        );
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointConfig;
    use tenckpt_core::DenseND;

    fn ramp(shape: &[usize], scale: f64) -> DenseND<f64> {
        let total: usize = shape.iter().product();
        DenseND::from_vec((0..total).map(|x| x as f64 * scale).collect(), shape).unwrap()
    }

    #[test]
    fn test_no_factors_returns_input() -> Result<()> {
        let tape = Tape::<f64>::new();
        let x = tape.variable(ramp(&[2, 3], 1.0), true);
        let y = multi_mode_dot_checkpoint(&tape, &x, &[], &MultiModeDot::new())?;
        assert_eq!(y, x);
        assert_eq!(tape.len(), 1);
        Ok(())
    }

    #[test]
    fn test_skip_only_factor_returns_input() -> Result<()> {
        let tape = Tape::<f64>::new();
        let x = tape.variable(ramp(&[2, 3], 1.0), true);
        let a = tape.variable(ramp(&[4, 2], 1.0), true);
        let y = multi_mode_dot_checkpoint(&tape, &x, &[a], &MultiModeDot::new().with_skip(0))?;
        assert_eq!(y, x);
        Ok(())
    }

    #[test]
    fn test_one_node_per_step() -> Result<()> {
        let tape = Tape::<f64>::new();
        let x = tape.variable(ramp(&[2, 3, 4], 1.0), true);
        let a = tape.variable(ramp(&[5, 2], 1.0), true);
        let b = tape.variable(ramp(&[3], 1.0), true);
        let c = tape.variable(ramp(&[2, 4], 1.0), true);

        let y = multi_mode_dot_checkpoint(&tape, &x, &[a, b, c], &MultiModeDot::new())?;
        assert_eq!(tape.shape(&y)?, vec![5, 2]);
        assert_eq!(tape.len(), 4 + 3);

        let stats = tape.memory_stats();
        // Two intermediate results were consumed and released
        assert_eq!(stats.released_nodes, 2);
        Ok(())
    }

    #[test]
    fn test_transpose_adds_two_checkpoints_per_step() -> Result<()> {
        let tape = Tape::<f64>::new();
        let x = tape.variable(ramp(&[2, 3], 1.0), true);
        let a = tape.variable(ramp(&[2, 4], 1.0), true);

        let y = multi_mode_dot_checkpoint(
            &tape,
            &x,
            &[a],
            &MultiModeDot::new().with_transpose(true),
        )?;
        assert_eq!(tape.shape(&y)?, vec![4, 3]);
        assert_eq!(tape.len(), 2 + 3);
        // transpose and conj outputs were both consumed
        assert_eq!(tape.memory_stats().released_nodes, 2);
        Ok(())
    }

    #[test]
    fn test_planning_error_surfaces() {
        let tape = Tape::<f64>::new();
        let x = tape.variable(ramp(&[2, 3], 1.0), true);
        let a = tape.variable(ramp(&[2, 2], 1.0), true);
        let err = multi_mode_dot_checkpoint(
            &tape,
            &x,
            &[a],
            &MultiModeDot::new().with_modes(vec![0, 1]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Number of modes (2)"));
    }

    #[test]
    fn test_store_policy_releases_nothing() -> Result<()> {
        let tape = Tape::<f64>::with_config(CheckpointConfig::store());
        let x = tape.variable(ramp(&[2, 3, 4], 1.0), true);
        let a = tape.variable(ramp(&[5, 2], 1.0), true);
        let b = tape.variable(ramp(&[3], 1.0), true);

        multi_mode_dot_checkpoint(&tape, &x, &[a, b], &MultiModeDot::new())?;
        assert_eq!(tape.memory_stats().released_nodes, 0);
        Ok(())
    }
}
