//! Errors of the internal fallible layers.
//!
//! A solve itself never fails: every outcome is a
//! [`SolverExitCondition`](crate::SolverExitCondition). These types surface
//! from the linear-algebra and file-output helpers.

use thiserror::Error;

/// Failure to factor a Newton-KKT system.
#[derive(Debug, Error)]
pub enum KktError {
    /// Regularization grew past its ceiling without reaching the target inertia.
    #[error("regularization diverged: δ = {delta:e} exceeded the limit")]
    RegularizationDiverged { delta: f64 },

    #[error("sparse LDLᵀ factorization failed: {0}")]
    Factorization(#[from] sprs::errors::LinalgError),

    /// A one-row system whose only pivot is zero or not finite.
    #[error("singular 1×1 system: pivot {pivot}")]
    SingularPivot { pivot: f64 },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Failure writing a sparsity pattern file.
#[derive(Debug, Error)]
pub enum SpyError {
    #[error("could not write spy file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
