//! Iterative goal-oriented POD refined by gradient descent.
//!
//! Minimises
//!
//! ```text
//! loss(V) = ‖C·(I − V·Vᵗ)·X‖_F / (ny·ns) + λ·‖V‖_F / (nx·r)
//! ```
//!
//! starting from the plain POD basis, then snaps the iterate back onto the
//! set of matrices with orthonormal columns. This is a local refinement;
//! no global optimum is promised.

use nalgebra::DMatrix;
use tracing::{debug, warn};

use crate::basis::ReductionBasis;
use crate::error::{ReductionError, ReductionResult, ensure_len};
use crate::events::{DiagnosticSink, ReductionEvent};
use crate::linalg::closest_orthonormal;
use crate::optimizer::{Adadelta, AdadeltaConfig};
use crate::pod::pod_basis;
use crate::strategy::{ReductionBasisStrategy, ReductionInputs, validate_rank};
use crate::system::SnapshotMatrix;

#[derive(Clone, Debug)]
pub struct GradientDescentConfig {
    pub rank: usize,
    /// Ridge coefficient λ (default 1).
    pub ridge_regularization: f64,
    /// Optimizer steps (default 100).
    pub iterations: usize,
    pub optimizer: AdadeltaConfig,
}

impl GradientDescentConfig {
    pub fn with_rank(rank: usize) -> Self {
        Self {
            rank,
            ridge_regularization: 1.0,
            iterations: 100,
            optimizer: AdadeltaConfig::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GradientDescentWeightedPod {
    config: GradientDescentConfig,
}

impl GradientDescentWeightedPod {
    pub const NAME: &'static str = "grad_descent";

    pub fn new(config: GradientDescentConfig) -> ReductionResult<Self> {
        validate_rank(config.rank)?;
        if !(config.ridge_regularization.is_finite() && config.ridge_regularization >= 0.0) {
            return Err(ReductionError::InvalidConfig {
                what: format!(
                    "ridge_regularization must be finite and non-negative, got {}",
                    config.ridge_regularization
                ),
            });
        }
        config.optimizer.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GradientDescentConfig {
        &self.config
    }

    /// Galerkin basis refined against output matrix `C` (`ny x nx`).
    pub fn compute(
        &self,
        snapshots: &SnapshotMatrix,
        c: &DMatrix<f64>,
        sink: &mut dyn DiagnosticSink,
    ) -> ReductionResult<ReductionBasis> {
        let GradientDescentConfig {
            rank,
            ridge_regularization: lambda,
            iterations,
            optimizer,
        } = self.config;
        ensure_len("C columns", c.ncols(), snapshots.nx())?;

        let x = snapshots.matrix();
        let mut v = pod_basis(snapshots, rank)?;
        let mut opt = Adadelta::new(optimizer, v.nrows(), v.ncols());

        let initial_loss = weighted_pod_loss(c, x, &v, lambda);
        if !initial_loss.is_finite() {
            return Err(ReductionError::OptimizationDiverged {
                iteration: 0,
                loss: initial_loss,
            });
        }

        let report_every = (iterations / 10).max(1);
        let mut loss = initial_loss;
        for iteration in 1..=iterations {
            let grad = weighted_pod_gradient(c, x, &v, lambda);
            opt.step(&mut v, &grad);

            loss = weighted_pod_loss(c, x, &v, lambda);
            if !loss.is_finite() {
                return Err(ReductionError::OptimizationDiverged { iteration, loss });
            }
            if iteration % report_every == 0 {
                debug!(iteration, iterations, loss, "weighted POD descent");
            }
            sink.emit(ReductionEvent::OptimizerStep {
                iteration,
                iterations,
                loss,
            });
        }

        if iterations > 0 && loss >= initial_loss {
            warn!(initial_loss, final_loss = loss, "weighted POD descent did not lower the loss");
            sink.emit(ReductionEvent::OptimizerStalled {
                initial_loss,
                final_loss: loss,
            });
        }

        ReductionBasis::galerkin(closest_orthonormal(&v)?)
    }
}

/// `C·(I − V·Vᵗ)·X`, evaluated without forming the `nx x nx` projector.
fn weighted_residual(c: &DMatrix<f64>, x: &DMatrix<f64>, v: &DMatrix<f64>) -> DMatrix<f64> {
    let cx = c * x;
    let cv = c * v;
    cx - cv * (v.transpose() * x)
}

/// Normalised weighted projection loss with ridge penalty.
pub fn weighted_pod_loss(c: &DMatrix<f64>, x: &DMatrix<f64>, v: &DMatrix<f64>, lambda: f64) -> f64 {
    let (ny, ns) = (c.nrows() as f64, x.ncols() as f64);
    let (nx, r) = (v.nrows() as f64, v.ncols() as f64);
    weighted_residual(c, x, v).norm() / (ny * ns) + lambda * v.norm() / (nx * r)
}

/// Gradient of [`weighted_pod_loss`] with respect to `V`.
///
/// With `R = C·(I − V·Vᵗ)·X`:
/// `∂‖R‖_F/∂V = −(Cᵗ·R·Xᵗ·V + X·Rᵗ·C·V) / ‖R‖_F` and `∂‖V‖_F/∂V = V / ‖V‖_F`.
/// Both terms vanish where their norm is zero.
pub fn weighted_pod_gradient(
    c: &DMatrix<f64>,
    x: &DMatrix<f64>,
    v: &DMatrix<f64>,
    lambda: f64,
) -> DMatrix<f64> {
    let (ny, ns) = (c.nrows() as f64, x.ncols() as f64);
    let (nx, r) = (v.nrows() as f64, v.ncols() as f64);

    let residual = weighted_residual(c, x, v);
    let r_norm = residual.norm();
    let mut grad = DMatrix::zeros(v.nrows(), v.ncols());

    if r_norm > 0.0 {
        let ct_r = c.transpose() * &residual;
        let term = &ct_r * (x.transpose() * v) + x * (ct_r.transpose() * v);
        grad -= term / (r_norm * ny * ns);
    }

    let v_norm = v.norm();
    if v_norm > 0.0 {
        grad += v * (lambda / (v_norm * nx * r));
    }
    grad
}

impl ReductionBasisStrategy for GradientDescentWeightedPod {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn rank(&self) -> usize {
        self.config.rank
    }

    fn compute_basis(
        &self,
        inputs: &ReductionInputs<'_>,
        sink: &mut dyn DiagnosticSink,
    ) -> ReductionResult<ReductionBasis> {
        let snapshots = inputs.require_snapshots(Self::NAME)?;
        let c = inputs.require_output(Self::NAME)?;
        self.compute(snapshots, c, sink)
    }
}
