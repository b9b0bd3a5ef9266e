//! Error types for basis construction and projection.

use rom_core::CoreError;
use thiserror::Error;

/// Errors raised while building, applying or evaluating a reduction basis.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReductionError {
    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Invalid rank {rank}: rank must be at least 1")]
    InvalidRank { rank: usize },

    #[error("Requested rank {rank} exceeds snapshot count {snapshots} (snapshot matrix is {nx}x{snapshots})")]
    RankExceedsSnapshotCount {
        rank: usize,
        snapshots: usize,
        nx: usize,
    },

    #[error("Requested rank {rank} exceeds state dimension {nx}")]
    RankExceedsStateDimension { rank: usize, nx: usize },

    #[error("Weight matrix is not positive semi-definite: smallest eigenvalue {min_eigenvalue:e} < -{tolerance:e}")]
    NonPsdWeightMatrix { min_eigenvalue: f64, tolerance: f64 },

    #[error("Numerical instability in {what}: magnitude {magnitude:e} exceeds tolerance {tolerance:e}")]
    NumericalInstability {
        what: &'static str,
        magnitude: f64,
        tolerance: f64,
    },

    #[error("Degenerate basis at rank {rank}: {what}")]
    DegenerateBasis { what: String, rank: usize },

    #[error("Optimization diverged at iteration {iteration}: loss = {loss}")]
    OptimizationDiverged { iteration: usize, loss: f64 },

    #[error("External solver '{solver}' failed: {message}")]
    SolverFailed { solver: String, message: String },

    #[error("Invalid configuration: {what}")]
    InvalidConfig { what: String },

    #[error("Decomposition failed: {what}")]
    Decomposition { what: &'static str },

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

pub type ReductionResult<T> = Result<T, ReductionError>;

/// Format a matrix shape as `rows x cols` for error context.
pub(crate) fn shape(rows: usize, cols: usize) -> String {
    format!("{rows}x{cols}")
}

/// Fail with [`ReductionError::DimensionMismatch`] unless `actual == expected`.
pub(crate) fn ensure_shape(
    what: &'static str,
    actual: (usize, usize),
    expected: (usize, usize),
) -> ReductionResult<()> {
    if actual != expected {
        return Err(ReductionError::DimensionMismatch {
            what,
            expected: shape(expected.0, expected.1),
            actual: shape(actual.0, actual.1),
        });
    }
    Ok(())
}

/// Fail with [`ReductionError::DimensionMismatch`] unless a single extent matches.
pub(crate) fn ensure_len(what: &'static str, actual: usize, expected: usize) -> ReductionResult<()> {
    if actual != expected {
        return Err(ReductionError::DimensionMismatch {
            what,
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}
