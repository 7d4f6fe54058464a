//! # tenckpt-ad
//!
//! Reverse-mode automatic differentiation with gradient checkpointing for
//! tenckpt tensors.
//!
//! This crate provides:
//! - A recording [`Tape`] whose [`Tape::checkpoint`] runs an operation eagerly,
//!   keeps nothing for backward, and recomputes released activations on demand
//! - Differentiable tensor operations behind the [`TensorOp`] trait
//!   ([`ModeDotOp`], [`TransposeOp`], [`ConjOp`])
//! - The checkpointed multi-mode contraction [`multi_mode_dot_checkpoint`]
//! - Finite-difference gradient checking ([`gradcheck`])
//!
//! ## Quick Start
//!
//! ```rust
//! use tenckpt_ad::{multi_mode_dot_checkpoint, Tape};
//! use tenckpt_core::DenseND;
//! use tenckpt_kernels::MultiModeDot;
//!
//! # fn main() -> anyhow::Result<()> {
//! let tape = Tape::<f64>::new();
//! let x = tape.variable(DenseND::ones(&[4, 5, 6]), true);
//! let a = tape.variable(DenseND::ones(&[2, 4]), true);
//! let b = tape.variable(DenseND::ones(&[3, 6]), true);
//!
//! let opts = MultiModeDot::new().with_modes(vec![0, 2]);
//! let y = multi_mode_dot_checkpoint(&tape, &x, &[a, b], &opts)?;
//! assert_eq!(tape.shape(&y)?, vec![2, 5, 3]);
//!
//! tape.backward(&y)?;
//! assert_eq!(tape.gradient(&x)?.shape(), &[4, 5, 6]);
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod gradcheck;
pub mod graph;
pub mod multi_mode;

// Re-exports
pub use checkpoint::{
    CheckpointConfig, ConjOp, MemoryStats, ModeDotOp, SavePolicy, TensorOp, TransposeOp,
};
pub use graph::{NodeId, Tape, Variable};
pub use multi_mode::multi_mode_dot_checkpoint;
