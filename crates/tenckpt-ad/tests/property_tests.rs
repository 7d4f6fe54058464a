//! Property-based tests for the checkpointed contraction
//!
//! Uses proptest to check, across random shapes, modes and skip positions, that
//! checkpointing changes memory behavior but never values or gradients.

use proptest::prelude::*;
use tenckpt_ad::{multi_mode_dot_checkpoint, CheckpointConfig, Tape};
use tenckpt_core::DenseND;
use tenckpt_kernels::{multi_mode_dot, MultiModeDot};

/// A factor description: `Some(rows)` for a matrix, `None` for a vector
type FactorKind = Option<usize>;

/// Strategy for an order-3 contraction problem: tensor shape and one factor kind
/// per mode
fn problem() -> impl Strategy<Value = (Vec<usize>, Vec<FactorKind>)> {
    (
        prop::collection::vec(1usize..4, 3),
        prop::collection::vec(prop::option::of(1usize..4), 3),
    )
}

fn fill(shape: &[usize], seed: f64) -> DenseND<f64> {
    DenseND::from_shape_fn(shape, |idx| {
        let linear = idx.iter().fold(0.0, |acc, &i| acc * 3.0 + i as f64);
        (linear * 0.83 + seed).cos()
    })
}

fn factors_for(shape: &[usize], kinds: &[FactorKind]) -> Vec<DenseND<f64>> {
    kinds
        .iter()
        .zip(shape)
        .enumerate()
        .map(|(mode, (kind, &size))| match kind {
            Some(rows) => fill(&[*rows, size], mode as f64),
            None => fill(&[size], mode as f64 + 0.5),
        })
        .collect()
}

fn gradients(
    config: CheckpointConfig,
    tensor: &DenseND<f64>,
    factors: &[DenseND<f64>],
    options: &MultiModeDot,
) -> (DenseND<f64>, DenseND<f64>) {
    let tape = Tape::with_config(config);
    let x = tape.variable(tensor.clone(), true);
    let fs: Vec<_> = factors.iter().map(|f| tape.variable(f.clone(), true)).collect();
    let y = multi_mode_dot_checkpoint(&tape, &x, &fs, options).unwrap();
    let value = tape.value(&y).unwrap();
    tape.backward(&y).unwrap();
    (value, tape.gradient(&x).unwrap())
}

proptest! {
    /// The tape's forward value equals the eager contraction
    #[test]
    fn test_checkpointed_forward_matches_eager((shape, kinds) in problem(), skip in prop::option::of(0usize..4)) {
        let tensor = fill(&shape, 0.1);
        let factors = factors_for(&shape, &kinds);
        let options = MultiModeDot { modes: None, skip, transpose: false };

        let views: Vec<_> = factors.iter().map(|f| f.view()).collect();
        let expected = DenseND::from_array(multi_mode_dot(&tensor.view(), &views, &options).unwrap());
        let (value, _) = gradients(CheckpointConfig::default(), &tensor, &factors, &options);

        prop_assert!(value.all_close(&expected, 1e-10));
    }

    /// Recompute and store policies agree on values and gradients
    #[test]
    fn test_recompute_matches_store((shape, kinds) in problem(), skip in prop::option::of(0usize..3)) {
        let tensor = fill(&shape, 0.2);
        let factors = factors_for(&shape, &kinds);
        let options = MultiModeDot { modes: None, skip, transpose: false };

        let (v1, g1) = gradients(CheckpointConfig::default(), &tensor, &factors, &options);
        let (v2, g2) = gradients(CheckpointConfig::store(), &tensor, &factors, &options);

        prop_assert!(v1.all_close(&v2, 1e-12));
        prop_assert!(g1.all_close(&g2, 1e-12));
    }

    /// Output rank drops by one per contracted vector
    #[test]
    fn test_output_rank((shape, kinds) in problem()) {
        let tensor = fill(&shape, 0.3);
        let factors = factors_for(&shape, &kinds);
        let (value, _) = gradients(CheckpointConfig::default(), &tensor, &factors, &MultiModeDot::new());

        let vectors = kinds.iter().filter(|k| k.is_none()).count();
        prop_assert_eq!(value.rank(), 3 - vectors);
    }

    /// Reversing the factor list together with its modes gives the same result
    #[test]
    fn test_pairing_order_irrelevant((shape, kinds) in problem()) {
        let tensor = fill(&shape, 0.4);
        let factors = factors_for(&shape, &kinds);

        let mut reversed = factors.clone();
        reversed.reverse();

        let (forward, _) = gradients(CheckpointConfig::default(), &tensor, &factors, &MultiModeDot::new());
        let (backward, _) = gradients(
            CheckpointConfig::default(),
            &tensor,
            &reversed,
            &MultiModeDot::new().with_modes(vec![2, 1, 0]),
        );

        prop_assert!(forward.all_close(&backward, 1e-12));
    }
}
