//! Contracts for basis construction delegated to external numerical engines.
//!
//! Balanced truncation and constrained-optimization bases are produced by an
//! injected collaborator. This module only shapes the request, enforces the
//! optional timeout and validates what comes back. Collaborator failures are
//! surfaced as [`ReductionError::SolverFailed`] and never retried here.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use nalgebra::{DMatrix, DVector};
use tracing::{error, info};

use crate::basis::ReductionBasis;
use crate::error::{ReductionError, ReductionResult, ensure_shape};
use crate::events::{DiagnosticSink, ReductionEvent};
use crate::linalg::closest_orthonormal;
use crate::strategy::{ReductionBasisStrategy, ReductionInputs, validate_rank};
use crate::system::{FullOrderSystem, SnapshotMatrix};

/// Error type returned by collaborators.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Inputs for a balanced-truncation style solver: `(A, B, C, r) -> (W, V)`.
#[derive(Clone, Debug)]
pub struct BalancedTruncationRequest {
    pub a: DMatrix<f64>,
    pub b: DMatrix<f64>,
    pub c: DMatrix<f64>,
    pub rank: usize,
}

/// Left and right bases returned by a balanced-truncation solver.
#[derive(Clone, Debug)]
pub struct BalancedTruncationOutput {
    pub w: DMatrix<f64>,
    pub v: DMatrix<f64>,
}

pub trait BalancedTruncationSolver: Send + Sync {
    fn name(&self) -> &str;

    fn solve(
        &self,
        request: &BalancedTruncationRequest,
    ) -> Result<BalancedTruncationOutput, CollaboratorError>;
}

/// Inputs for a constrained-optimization style solver:
/// `(M, K, f, snapshots, r, C, regularization) -> V`.
#[derive(Clone, Debug)]
pub struct ConstrainedOptimizationRequest {
    pub mass: DMatrix<f64>,
    pub stiffness: DMatrix<f64>,
    pub forcing: DVector<f64>,
    pub snapshots: DMatrix<f64>,
    pub rank: usize,
    pub output: DMatrix<f64>,
    pub regularization: f64,
}

impl ConstrainedOptimizationRequest {
    /// Request for a discrete system with identity mass matrix and `K = A`.
    pub fn from_system(
        system: &FullOrderSystem,
        snapshots: &SnapshotMatrix,
        rank: usize,
        regularization: f64,
    ) -> Self {
        let nx = system.nx();
        Self {
            mass: DMatrix::identity(nx, nx),
            stiffness: system.a().clone(),
            forcing: system.f().cloned().unwrap_or_else(|| DVector::zeros(nx)),
            snapshots: snapshots.matrix().clone(),
            rank,
            output: system.c().clone(),
            regularization,
        }
    }

    fn validate(&self) -> ReductionResult<()> {
        let nx = self.mass.nrows();
        ensure_shape("M", self.mass.shape(), (nx, nx))?;
        ensure_shape("K", self.stiffness.shape(), (nx, nx))?;
        ensure_shape("f", self.forcing.shape(), (nx, 1))?;
        ensure_shape(
            "snapshots",
            self.snapshots.shape(),
            (nx, self.snapshots.ncols()),
        )?;
        ensure_shape("C", self.output.shape(), (self.output.nrows(), nx))?;
        check_rank(self.rank, nx)
    }
}

pub trait ConstrainedOptimizationSolver: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the right basis `V` (`nx x r`).
    fn solve(
        &self,
        request: &ConstrainedOptimizationRequest,
    ) -> Result<DMatrix<f64>, CollaboratorError>;
}

/// The collaborator a strategy delegates to.
#[derive(Clone)]
pub enum ExternalSolver {
    BalancedTruncation(Arc<dyn BalancedTruncationSolver>),
    ConstrainedOptimization(Arc<dyn ConstrainedOptimizationSolver>),
}

impl std::fmt::Debug for ExternalSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExternalSolver::BalancedTruncation(s) => write!(f, "BalancedTruncation({})", s.name()),
            ExternalSolver::ConstrainedOptimization(s) => {
                write!(f, "ConstrainedOptimization({})", s.name())
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExternalSolverConfig {
    pub rank: usize,
    /// Passed to constrained-optimization solvers, ignored otherwise.
    pub regularization: f64,
    /// Upper bound on a collaborator call. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl ExternalSolverConfig {
    pub fn with_rank(rank: usize) -> Self {
        Self {
            rank,
            regularization: 0.0,
            timeout: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExternalSolverReduction {
    solver: ExternalSolver,
    config: ExternalSolverConfig,
}

impl ExternalSolverReduction {
    pub const BALANCED_TRUNCATION: &'static str = "balanced_truncation";
    pub const CONSTRAINED_OPTIMIZATION: &'static str = "buithanh";

    pub fn new(solver: ExternalSolver, config: ExternalSolverConfig) -> ReductionResult<Self> {
        validate_rank(config.rank)?;
        if !config.regularization.is_finite() {
            return Err(ReductionError::InvalidConfig {
                what: format!("regularization must be finite, got {}", config.regularization),
            });
        }
        if config.timeout == Some(Duration::ZERO) {
            return Err(ReductionError::InvalidConfig {
                what: "external solver timeout must be non-zero".to_string(),
            });
        }
        Ok(Self { solver, config })
    }

    pub fn config(&self) -> &ExternalSolverConfig {
        &self.config
    }

    /// `(A, B, C, r) -> (W, V)` through the balanced-truncation collaborator.
    pub fn balanced_truncation(
        solver: Arc<dyn BalancedTruncationSolver>,
        request: BalancedTruncationRequest,
        timeout: Option<Duration>,
    ) -> ReductionResult<ReductionBasis> {
        let nx = request.a.nrows();
        ensure_shape("A", request.a.shape(), (nx, nx))?;
        ensure_shape("B", request.b.shape(), (nx, request.b.ncols()))?;
        ensure_shape("C", request.c.shape(), (request.c.nrows(), nx))?;
        check_rank(request.rank, nx)?;
        let r = request.rank;

        let label = solver.name().to_string();
        let output = call_with_timeout(label, timeout, move || solver.solve(&request))?;

        ensure_shape("external V", output.v.shape(), (nx, r))?;
        ensure_shape("external W", output.w.shape(), (nx, r))?;
        ReductionBasis::new(output.v, output.w)
    }

    /// Constrained-optimization basis, snapped to orthonormal columns, `W = V`.
    pub fn constrained_optimization(
        solver: Arc<dyn ConstrainedOptimizationSolver>,
        request: ConstrainedOptimizationRequest,
        timeout: Option<Duration>,
    ) -> ReductionResult<ReductionBasis> {
        request.validate()?;
        let (nx, r) = (request.mass.nrows(), request.rank);

        let label = solver.name().to_string();
        let v = call_with_timeout(label, timeout, move || solver.solve(&request))?;

        ensure_shape("external V", v.shape(), (nx, r))?;
        ReductionBasis::galerkin(closest_orthonormal(&v)?)
    }
}

fn check_rank(rank: usize, nx: usize) -> ReductionResult<()> {
    validate_rank(rank)?;
    if rank > nx {
        return Err(ReductionError::RankExceedsStateDimension { rank, nx });
    }
    Ok(())
}

/// Run a blocking collaborator call, bounded by `timeout` when one is set.
///
/// On timeout the worker thread is left to finish on its own; its result is
/// discarded.
fn call_with_timeout<T, F>(solver: String, timeout: Option<Duration>, job: F) -> ReductionResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, CollaboratorError> + Send + 'static,
{
    info!(solver = %solver, ?timeout, "calling external solver");
    let outcome = match timeout {
        None => job(),
        Some(limit) => {
            let (tx, rx) = mpsc::channel();
            thread::Builder::new()
                .name(format!("external-{solver}"))
                .spawn(move || {
                    // The receiver may be gone after a timeout.
                    let _ = tx.send(job());
                })
                .map_err(|e| ReductionError::SolverFailed {
                    solver: solver.clone(),
                    message: format!("could not start worker thread: {e}"),
                })?;

            match rx.recv_timeout(limit) {
                Ok(result) => result,
                Err(RecvTimeoutError::Timeout) => {
                    Err(format!("timed out after {:.3}s", limit.as_secs_f64()).into())
                }
                Err(RecvTimeoutError::Disconnected) => {
                    Err("worker terminated without a result".into())
                }
            }
        }
    };

    outcome.map_err(|e| {
        error!(solver = %solver, error = %e, "external solver failed");
        ReductionError::SolverFailed {
            solver,
            message: e.to_string(),
        }
    })
}

impl ReductionBasisStrategy for ExternalSolverReduction {
    fn name(&self) -> &'static str {
        match self.solver {
            ExternalSolver::BalancedTruncation(_) => Self::BALANCED_TRUNCATION,
            ExternalSolver::ConstrainedOptimization(_) => Self::CONSTRAINED_OPTIMIZATION,
        }
    }

    fn rank(&self) -> usize {
        self.config.rank
    }

    fn compute_basis(
        &self,
        inputs: &ReductionInputs<'_>,
        sink: &mut dyn DiagnosticSink,
    ) -> ReductionResult<ReductionBasis> {
        let system = inputs.require_system(self.name())?;
        match &self.solver {
            ExternalSolver::BalancedTruncation(solver) => {
                sink.emit(ReductionEvent::ExternalSolverCall {
                    solver: solver.name().to_string(),
                });
                let request = BalancedTruncationRequest {
                    a: system.a().clone(),
                    b: system.b().clone(),
                    c: system.c().clone(),
                    rank: self.config.rank,
                };
                Self::balanced_truncation(Arc::clone(solver), request, self.config.timeout)
            }
            ExternalSolver::ConstrainedOptimization(solver) => {
                sink.emit(ReductionEvent::ExternalSolverCall {
                    solver: solver.name().to_string(),
                });
                let snapshots = inputs.require_snapshots(self.name())?;
                let request = ConstrainedOptimizationRequest::from_system(
                    system,
                    snapshots,
                    self.config.rank,
                    self.config.regularization,
                );
                Self::constrained_optimization(Arc::clone(solver), request, self.config.timeout)
            }
        }
    }
}
