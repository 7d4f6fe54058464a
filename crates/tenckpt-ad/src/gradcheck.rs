//! Finite-difference checks for vector-Jacobian products
//!
//! Compares an analytical VJP `(x, ḡ) -> x̄` against the directional derivative
//! `<ḡ, ∂f/∂xᵢ>` estimated by perturbing one element of `x` at a time, either
//! with a two-sided step `(f(x + h) - f(x - h)) / 2h` or a one-sided step
//! `(f(x + h) - f(x)) / h`.
//!
//! Real element types only. The test-suites use it on tape gradients of the
//! checkpointed contraction.
//!
//! # Example
//!
//! ```rust
//! use tenckpt_ad::gradcheck::{check_gradient, GradCheckConfig};
//! use tenckpt_core::DenseND;
//!
//! // f(x) = 3x, so the VJP is 3 * grad_y
//! let f = |x: &DenseND<f64>| Ok(DenseND::from_array(x.as_array().mapv(|v| 3.0 * v)));
//! let df = |_x: &DenseND<f64>, grad_y: &DenseND<f64>| {
//!     Ok(DenseND::from_array(grad_y.as_array().mapv(|g| 3.0 * g)))
//! };
//!
//! let x = DenseND::ones(&[3, 4]);
//! let grad_y = DenseND::ones(&[3, 4]);
//! let result = check_gradient(f, df, &x, &grad_y, &GradCheckConfig::default()).unwrap();
//! assert!(result.passed);
//! ```

use anyhow::{anyhow, Result};
use scirs2_core::numeric::Float;
use tenckpt_core::{DenseND, Scalar};

/// Tolerances and step of a gradient check
#[derive(Debug, Clone)]
pub struct GradCheckConfig {
    /// Perturbation applied to each element
    pub epsilon: f64,

    pub rtol: f64,

    pub atol: f64,

    /// Two-sided differences; one-sided when false
    pub use_central_diff: bool,

    /// Log every mismatching element
    pub verbose: bool,
}

impl Default for GradCheckConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-5,
            rtol: 1e-3,
            atol: 1e-5,
            use_central_diff: true,
            verbose: false,
        }
    }
}

/// Outcome of [`check_gradient`]
///
/// An element fails only when it exceeds both `atol` and `rtol`.
#[derive(Debug)]
pub struct GradCheckResult {
    pub max_abs_diff: f64,
    pub max_rel_diff: f64,
    pub passed: bool,
    pub num_elements: usize,
    pub num_failures: usize,
}

/// Check the VJP `df(x, grad_y)` of `f` at `x` against finite differences
///
/// # Errors
///
/// Propagates failures of `f` or `df`, and fails when `df` returns a gradient
/// whose shape differs from `x`.
pub fn check_gradient<T, F, G>(
    f: F,
    df: G,
    x: &DenseND<T>,
    grad_y: &DenseND<T>,
    config: &GradCheckConfig,
) -> Result<GradCheckResult>
where
    T: Scalar + Float,
    F: Fn(&DenseND<T>) -> Result<DenseND<T>>,
    G: Fn(&DenseND<T>, &DenseND<T>) -> Result<DenseND<T>>,
{
    let analytical = df(x, grad_y)?;
    if analytical.shape() != x.shape() {
        return Err(anyhow!(
            "Analytical gradient has shape {:?}, input has shape {:?}",
            analytical.shape(),
            x.shape()
        ));
    }

    let numerical = numerical_vjp(f, x, grad_y, config)?;
    compare_gradients(&analytical, &numerical, config)
}

fn numerical_vjp<T, F>(
    f: F,
    x: &DenseND<T>,
    grad_y: &DenseND<T>,
    config: &GradCheckConfig,
) -> Result<DenseND<T>>
where
    T: Scalar + Float,
    F: Fn(&DenseND<T>) -> Result<DenseND<T>>,
{
    let epsilon = T::from_real(config.epsilon);
    let shape = x.shape().to_vec();
    let base = x.to_vec();

    let perturbed = |idx: usize, delta: T| -> Result<DenseND<T>> {
        let mut data = base.clone();
        data[idx] = data[idx] + delta;
        f(&DenseND::from_vec(data, &shape)?)
    };

    let y_base = if config.use_central_diff {
        None
    } else {
        Some(f(x)?)
    };

    let mut numerical = Vec::with_capacity(base.len());
    for idx in 0..base.len() {
        let y_plus = perturbed(idx, epsilon)?;

        let directional = match &y_base {
            None => {
                let y_minus = perturbed(idx, -epsilon)?;
                difference_dot(grad_y, &y_plus, &y_minus)? / (epsilon + epsilon)
            }
            Some(y) => difference_dot(grad_y, &y_plus, y)? / epsilon,
        };
        numerical.push(directional);
    }

    DenseND::from_vec(numerical, &shape)
}

/// `<weights, a - b>`
fn difference_dot<T>(weights: &DenseND<T>, a: &DenseND<T>, b: &DenseND<T>) -> Result<T>
where
    T: Scalar + Float,
{
    if weights.shape() != a.shape() || a.shape() != b.shape() {
        return Err(anyhow!(
            "Shape mismatch: {:?} vs {:?} vs {:?}",
            weights.shape(),
            a.shape(),
            b.shape()
        ));
    }

    Ok(weights
        .as_array()
        .iter()
        .zip(a.as_array().iter().zip(b.as_array().iter()))
        .fold(T::zero(), |acc, (&w, (&p, &m))| acc + w * (p - m)))
}

fn compare_gradients<T>(
    analytical: &DenseND<T>,
    numerical: &DenseND<T>,
    config: &GradCheckConfig,
) -> Result<GradCheckResult>
where
    T: Scalar + Float,
{
    let (mut max_abs_diff, mut max_rel_diff) = (0.0, 0.0_f64);
    let mut num_failures = 0;

    for (idx, (&a_val, &n_val)) in analytical
        .as_array()
        .iter()
        .zip(numerical.as_array().iter())
        .enumerate()
    {
        let abs_diff = (a_val - n_val).modulus();
        let n_abs = n_val.modulus();
        let rel_diff = if n_abs > f64::EPSILON {
            abs_diff / n_abs
        } else {
            abs_diff
        };

        max_abs_diff = max_abs_diff.max(abs_diff);
        max_rel_diff = max_rel_diff.max(rel_diff);

        if abs_diff > config.atol && rel_diff > config.rtol {
            num_failures += 1;

            if config.verbose {
                tracing::warn!(
                    index = idx,
                    analytical = ?a_val,
                    numerical = ?n_val,
                    abs_diff,
                    rel_diff,
                    "gradient mismatch"
                );
            }
        }
    }

    let passed = num_failures == 0;
    if config.verbose {
        tracing::info!(
            passed,
            num_failures,
            num_elements = analytical.len(),
            max_abs_diff,
            max_rel_diff,
            "gradient check finished"
        );
    }

    Ok(GradCheckResult {
        max_abs_diff,
        max_rel_diff,
        passed,
        num_elements: analytical.len(),
        num_failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenckpt_kernels::{mode_dot, mode_dot_vjp};

    fn ramp(shape: &[usize]) -> DenseND<f64> {
        DenseND::from_shape_fn(shape, |idx| {
            idx.iter().fold(0.3, |acc, &i| acc * 1.7 + i as f64).cos()
        })
    }

    #[test]
    fn test_linear_map_passes() -> Result<()> {
        let f = |x: &DenseND<f64>| Ok(DenseND::from_array(x.as_array().mapv(|v| -4.0 * v)));
        let df = |_: &DenseND<f64>, g: &DenseND<f64>| {
            Ok(DenseND::from_array(g.as_array().mapv(|v| -4.0 * v)))
        };

        let x = ramp(&[2, 3]);
        let result = check_gradient(f, df, &x, &ramp(&[2, 3]), &GradCheckConfig::default())?;
        assert!(result.passed);
        assert_eq!(result.num_elements, 6);
        assert!(result.max_abs_diff < 1e-6);
        Ok(())
    }

    #[test]
    fn test_mode_dot_vjp_one_sided() -> Result<()> {
        let m = ramp(&[4, 3]);
        let f = |x: &DenseND<f64>| -> Result<DenseND<f64>> {
            Ok(DenseND::from_array(mode_dot(&x.view(), &m.view(), 1)?))
        };
        let df = |x: &DenseND<f64>, g: &DenseND<f64>| -> Result<DenseND<f64>> {
            let (dx, _) = mode_dot_vjp(&x.view(), &m.view(), 1, &g.view())?;
            Ok(DenseND::from_array(dx))
        };

        let config = GradCheckConfig {
            use_central_diff: false,
            rtol: 1e-2,
            ..Default::default()
        };
        let result = check_gradient(f, df, &ramp(&[2, 3, 2]), &ramp(&[2, 4, 2]), &config)?;
        assert!(result.passed);
        Ok(())
    }

    #[test]
    fn test_wrong_vjp_is_caught() -> Result<()> {
        // f(x) = x², VJP scaled by x instead of 2x
        let f = |x: &DenseND<f64>| Ok(DenseND::from_array(x.as_array().mapv(|v| v * v)));
        let df = |x: &DenseND<f64>, g: &DenseND<f64>| {
            Ok(DenseND::from_array(x.as_array() * g.as_array()))
        };

        let x = DenseND::from_vec(vec![1.0, 2.0, 3.0], &[3])?;
        let result = check_gradient(f, df, &x, &DenseND::ones(&[3]), &GradCheckConfig::default())?;
        assert!(!result.passed);
        assert_eq!(result.num_failures, 3);
        Ok(())
    }

    #[test]
    fn test_gradient_shape_checked() {
        let f = |x: &DenseND<f64>| Ok(x.clone());
        let df = |_: &DenseND<f64>, _: &DenseND<f64>| Ok(DenseND::ones(&[4]));

        let x = DenseND::ones(&[2, 2]);
        let err = check_gradient(f, df, &x, &DenseND::ones(&[2, 2]), &GradCheckConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("Analytical gradient has shape [4]"));
    }
}
