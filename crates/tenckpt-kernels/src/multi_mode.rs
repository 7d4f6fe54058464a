//! Multi-mode contraction options and planning
//!
//! A multi-mode product contracts a tensor with one factor per mode, in a single
//! call. Factors are matrices `(J, Iₖ)` or vectors `(Iₖ)`. Contracting with a vector
//! removes its mode, so every later mode index has to be shifted down by the
//! number of modes removed so far.
//!
//! [`MultiModeDot::plan`] performs that bookkeeping once, independent of any tensor
//! data, and produces the list of [`ContractionStep`]s that both the eager
//! [`multi_mode_dot`] and the checkpointed contractor in `tenckpt-ad` execute.
//!
//! # Skip semantics
//!
//! `skip` is a position in the list of `(factor, mode)` pairs **after** it has been
//! sorted by mode, not a position in the caller's factor list. With
//! `modes = [2, 0]`, `skip = Some(0)` skips the factor paired with mode 0, i.e. the
//! *second* factor supplied.

use crate::adjoint::conj_transpose;
use crate::error::{KernelError, KernelResult};
use crate::nmode::mode_dot;
use scirs2_core::ndarray_ext::{ArrayD, ArrayView, IxDyn};
use tenckpt_core::Scalar;

/// Options of a multi-mode contraction
///
/// # Examples
///
/// ```
/// use tenckpt_kernels::MultiModeDot;
///
/// let opts = MultiModeDot::new().with_modes(vec![2, 0]).with_skip(1);
/// let steps = opts.plan(&[2, 1]).unwrap();
///
/// // Sorted by mode: the vector at mode 0 comes first and stays.
/// assert_eq!(steps.len(), 1);
/// assert_eq!(steps[0].factor, 1);
/// assert_eq!(steps[0].mode, 0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiModeDot {
    /// Declared mode of each factor, in original-tensor indices.
    /// `None` means `0, 1, ..., n - 1`.
    pub modes: Option<Vec<usize>>,
    /// Position in the mode-sorted pairing list to leave out
    pub skip: Option<usize>,
    /// Contract with the conjugate transpose of every factor
    pub transpose: bool,
}

/// One planned contraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractionStep {
    /// Index into the caller's factor list
    pub factor: usize,
    /// Mode as declared by the caller
    pub declared_mode: usize,
    /// Mode of the running result at the time of this step
    pub mode: usize,
    /// True for vector factors, which remove `mode`
    pub eliminates_mode: bool,
}

impl MultiModeDot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_modes(mut self, modes: Vec<usize>) -> Self {
        self.modes = Some(modes);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_transpose(mut self, transpose: bool) -> Self {
        self.transpose = transpose;
        self
    }

    /// Plan the contraction steps for factors of the given ranks
    ///
    /// Pairs each factor with its mode, sorts the pairs by mode (ties keep input
    /// order), drops the pair at position `skip` and computes the effective mode of
    /// every remaining step.
    ///
    /// Mode bounds against the tensor are not checked here; the kernels report
    /// those when the step runs.
    ///
    /// # Errors
    ///
    /// - [`KernelError::ModesLengthMismatch`] if explicit modes and factors differ in
    ///   number
    /// - [`KernelError::InvalidFactorRank`] for a contracted factor that is neither
    ///   a matrix nor a vector
    /// - [`KernelError::ModeUnderflow`] when a declared mode was already removed by
    ///   an earlier vector contraction
    pub fn plan(&self, factor_ranks: &[usize]) -> KernelResult<Vec<ContractionStep>> {
        let modes: Vec<usize> = match &self.modes {
            Some(modes) => {
                if modes.len() != factor_ranks.len() {
                    return Err(KernelError::ModesLengthMismatch {
                        modes: modes.len(),
                        factors: factor_ranks.len(),
                    });
                }
                modes.clone()
            }
            None => (0..factor_ranks.len()).collect(),
        };

        let mut pairs: Vec<(usize, usize)> = modes.into_iter().enumerate().collect();
        // Stable, so equal modes keep the caller's order
        pairs.sort_by_key(|&(_, mode)| mode);

        let mut steps = Vec::with_capacity(pairs.len());
        let mut decrement = 0;

        for (position, (factor, declared_mode)) in pairs.into_iter().enumerate() {
            if self.skip == Some(position) {
                continue;
            }

            let eliminates_mode = match factor_ranks[factor] {
                1 => true,
                2 => false,
                rank => return Err(KernelError::invalid_factor_rank("multi_mode_dot", rank)),
            };

            let mode = declared_mode
                .checked_sub(decrement)
                .ok_or(KernelError::ModeUnderflow {
                    factor,
                    mode: declared_mode,
                    eliminated: decrement,
                })?;

            steps.push(ContractionStep {
                factor,
                declared_mode,
                mode,
                eliminates_mode,
            });

            if eliminates_mode {
                decrement += 1;
            }
        }

        Ok(steps)
    }
}

/// Contract a tensor with several factors, one per mode
///
/// Eager counterpart of the checkpointed contractor: every intermediate is
/// computed and dropped immediately, nothing is recorded.
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::{Array, array};
/// use tenckpt_kernels::{multi_mode_dot, MultiModeDot};
///
/// let tensor = Array::from_shape_vec(vec![2, 3, 4], (0..24).map(|x| x as f64).collect()).unwrap();
/// let v0 = array![1.0, 1.0].into_dyn();
/// let v2 = array![1.0, 0.0, 0.0, 0.0].into_dyn();
///
/// let opts = MultiModeDot::new().with_modes(vec![0, 2]);
/// let result = multi_mode_dot(&tensor.view(), &[v0.view(), v2.view()], &opts).unwrap();
/// assert_eq!(result.shape(), &[3]);
/// assert_eq!(result[[0]], 0.0 + 12.0);
/// ```
pub fn multi_mode_dot<T: Scalar>(
    tensor: &ArrayView<T, IxDyn>,
    factors: &[ArrayView<T, IxDyn>],
    options: &MultiModeDot,
) -> KernelResult<ArrayD<T>> {
    let ranks: Vec<usize> = factors.iter().map(|f| f.ndim()).collect();
    let steps = options.plan(&ranks)?;

    tracing::debug!(
        tensor_shape = ?tensor.shape(),
        num_factors = factors.len(),
        num_steps = steps.len(),
        transpose = options.transpose,
        "multi_mode_dot"
    );

    let mut result = tensor.to_owned();
    for step in &steps {
        let factor = &factors[step.factor];
        result = if options.transpose {
            let adjoint = conj_transpose(factor);
            mode_dot(&result.view(), &adjoint.view(), step.mode)?
        } else {
            mode_dot(&result.view(), factor, step.mode)?
        };
    }

    Ok(result)
}
