//! Error types for tensor kernel operations

use thiserror::Error;

/// Error type for tensor kernel operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// Mode index outside the tensor's valid range
    #[error("Invalid mode {mode}: must be < {max_mode}. {context}")]
    InvalidMode {
        mode: usize,
        max_mode: usize,
        context: String,
    },

    /// Dimension mismatch between operands
    #[error("{operation}: dimension mismatch - expected {expected:?}, got {actual:?}. {context}")]
    DimensionMismatch {
        operation: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
        context: String,
    },

    /// Factor that is neither a matrix nor a vector
    #[error("{operation}: factor must be a matrix or a vector, got rank {rank}")]
    InvalidFactorRank { operation: String, rank: usize },

    /// Explicit modes that do not pair up with the factors
    #[error("Number of modes ({modes}) must match number of factors ({factors})")]
    ModesLengthMismatch { modes: usize, factors: usize },

    /// Declared mode eliminated by an earlier vector contraction
    #[error(
        "Mode {mode} of factor {factor} no longer exists after {eliminated} vector contraction(s)"
    )]
    ModeUnderflow {
        factor: usize,
        mode: usize,
        eliminated: usize,
    },

    /// Reshape failure inside a kernel
    #[error("{operation}: {message}")]
    Shape { operation: String, message: String },
}

/// Result type for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;

impl KernelError {
    /// Create an invalid mode error
    pub fn invalid_mode(mode: usize, max_mode: usize, context: impl Into<String>) -> Self {
        KernelError::InvalidMode {
            mode,
            max_mode,
            context: context.into(),
        }
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch(
        operation: impl Into<String>,
        expected: Vec<usize>,
        actual: Vec<usize>,
        context: impl Into<String>,
    ) -> Self {
        KernelError::DimensionMismatch {
            operation: operation.into(),
            expected,
            actual,
            context: context.into(),
        }
    }

    /// Create an invalid factor rank error
    pub fn invalid_factor_rank(operation: impl Into<String>, rank: usize) -> Self {
        KernelError::InvalidFactorRank {
            operation: operation.into(),
            rank,
        }
    }

    /// Create a shape error from any displayable reshape failure
    pub fn shape(operation: impl Into<String>, message: impl ToString) -> Self {
        KernelError::Shape {
            operation: operation.into(),
            message: message.to_string(),
        }
    }
}
