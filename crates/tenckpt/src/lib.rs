//! # tenckpt
//!
//! Checkpointed multi-mode tensor contraction.
//!
//! This is the **meta crate** re-exporting the tenckpt components.
//!
//! ## Quick Start
//!
//! ```
//! use tenckpt::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let tape = Tape::<f64>::new();
//! let x = tape.variable(DenseND::ones(&[3, 4, 5]), true);
//! let u = tape.variable(DenseND::ones(&[2, 3]), true);
//! let v = tape.variable(DenseND::ones(&[5]), true);
//!
//! let y = multi_mode_dot_checkpoint(&tape, &x, &[u, v], &MultiModeDot::new().with_modes(vec![0, 2]))?;
//! assert_eq!(tape.shape(&y)?, vec![2, 4]);
//!
//! tape.backward(&y)?;
//! assert_eq!(tape.gradient(&u)?.shape(), &[2, 3]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Components
//!
//! ### Core Types ([`core`])
//!
//! [`DenseND`](core::DenseND) and the [`Scalar`](core::Scalar) element trait
//! for real and complex `f32`/`f64`.
//!
//! ### Kernels ([`kernels`])
//!
//! Eager n-mode products, conjugate transpose and the multi-mode contraction
//! with its pairing plan.
//!
//! ```
//! use tenckpt::kernels::MultiModeDot;
//!
//! // skip counts positions in the mode-sorted pairing list
//! let steps = MultiModeDot::new().with_modes(vec![2, 0]).with_skip(0).plan(&[2, 2]).unwrap();
//! assert_eq!(steps.len(), 1);
//! assert_eq!(steps[0].factor, 0);
//! ```
//!
//! ### Automatic Differentiation ([`ad`])
//!
//! Recording tape with checkpointed operations and finite-difference gradient
//! checks.
//!
//! ## Features
//!
//! - `tracing` (default): subscriber setup in [`tracing_support`]

pub use tenckpt_ad as ad;
pub use tenckpt_core as core;
pub use tenckpt_kernels as kernels;

pub mod tracing_support;

pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! ```
    //! use tenckpt::prelude::*;
    //!
    //! let tape = Tape::<f64>::with_config(CheckpointConfig::store());
    //! assert!(tape.is_empty());
    //! ```

    pub use crate::core::{DenseND, Scalar};

    pub use crate::kernels::{
        conj_transpose, mode_dot, multi_mode_dot, nmode_product, nmode_vector_product,
        ContractionStep, KernelError, MultiModeDot,
    };

    pub use crate::ad::{
        multi_mode_dot_checkpoint, CheckpointConfig, MemoryStats, SavePolicy, Tape, Variable,
    };
}
