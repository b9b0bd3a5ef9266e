//! Closed-form goal-oriented (Carlberg) weighted POD.
//!
//! Minimises the Θ-weighted projection error over rank-r bases spanned by
//! the snapshots, then builds a left basis `W` biorthogonal to `V` in the
//! Θ inner product.

use nalgebra::{DMatrix, DVector};
use rom_core::{DEFAULT_PSD_TOLERANCE, rank_threshold};
use tracing::warn;

use crate::basis::ReductionBasis;
use crate::error::{ReductionError, ReductionResult, ensure_shape};
use crate::events::{DiagnosticSink, ReductionEvent};
use crate::linalg::{invert_gram, psd_eigen, psd_sqrt, symmetric_eigen, truncated_svd};
use crate::strategy::{ReductionBasisStrategy, ReductionInputs, validate_rank};
use crate::system::SnapshotMatrix;

/// Defect of `Wᵗ·V − I` above which a drift diagnostic is emitted.
const BIORTHOGONALITY_WARN: f64 = 1e-5;

/// How the weighted right basis is obtained.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CarlbergMethod {
    /// SVD of `Θ^½·X`.
    #[default]
    MatrixSquareRoot,
    /// Eigendecomposition of the snapshot Gram matrix `Xᵗ·Θ·X`.
    SnapshotGram,
}

#[derive(Clone, Debug)]
pub struct CarlbergConfig {
    pub rank: usize,
    /// Eigenvalues of Θ below `-psd_tolerance` are rejected (default 1e-6).
    pub psd_tolerance: f64,
    pub method: CarlbergMethod,
}

impl CarlbergConfig {
    pub fn with_rank(rank: usize) -> Self {
        Self {
            rank,
            psd_tolerance: DEFAULT_PSD_TOLERANCE,
            method: CarlbergMethod::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CarlbergWeightedPod {
    config: CarlbergConfig,
}

impl CarlbergWeightedPod {
    pub const NAME: &'static str = "carlberg";

    pub fn new(config: CarlbergConfig) -> ReductionResult<Self> {
        validate_rank(config.rank)?;
        if !(config.psd_tolerance.is_finite() && config.psd_tolerance >= 0.0) {
            return Err(ReductionError::InvalidConfig {
                what: format!(
                    "carlberg psd_tolerance must be finite and non-negative, got {}",
                    config.psd_tolerance
                ),
            });
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &CarlbergConfig {
        &self.config
    }

    /// Petrov-Galerkin pair for snapshots `X` and goal weighting Θ (`nx x nx`).
    pub fn compute(
        &self,
        snapshots: &SnapshotMatrix,
        theta: &DMatrix<f64>,
    ) -> ReductionResult<ReductionBasis> {
        let r = self.config.rank;
        let nx = snapshots.nx();
        snapshots.check_rank(r)?;
        ensure_shape("weight matrix Θ", theta.shape(), (nx, nx))?;

        let v = match self.config.method {
            CarlbergMethod::MatrixSquareRoot => {
                square_root_basis(snapshots.matrix(), theta, r, self.config.psd_tolerance)?
            }
            CarlbergMethod::SnapshotGram => {
                snapshot_gram_basis(snapshots.matrix(), theta, r, self.config.psd_tolerance)?
            }
        };
        let w = biorthogonal_left_basis(&v, theta)?;
        ReductionBasis::new(v, w)
    }
}

/// `V = X·V̄·S̄⁻¹` from the rank-r SVD `Θ^½·X ≈ Ū·S̄·V̄ᵗ`.
fn square_root_basis(
    x: &DMatrix<f64>,
    theta: &DMatrix<f64>,
    r: usize,
    tol: f64,
) -> ReductionResult<DMatrix<f64>> {
    let root = psd_sqrt(theta, tol)?;
    let x_bar = root * x;
    let svd = truncated_svd(&x_bar, r)?;
    let inv_s = reciprocal_spectrum(&svd.s, x.nrows(), x.ncols(), r)?;
    Ok(x * svd.v * DMatrix::from_diagonal(&inv_s))
}

/// `V = X·Z·Σ⁻¹` from the top-r eigenpairs `(σ², z)` of `Xᵗ·Θ·X`.
fn snapshot_gram_basis(
    x: &DMatrix<f64>,
    theta: &DMatrix<f64>,
    r: usize,
    tol: f64,
) -> ReductionResult<DMatrix<f64>> {
    psd_eigen(theta, tol)?;
    let gram = x.transpose() * theta * x;
    let eigen = symmetric_eigen(
        (&gram + gram.transpose()) * 0.5,
        "snapshot Gram eigendecomposition did not converge",
    )?;

    let lambdas = &eigen.eigenvalues;
    let mut order: Vec<usize> = (0..lambdas.len()).collect();
    order.sort_by(|&i, &j| lambdas[j].total_cmp(&lambdas[i]));
    let keep = &order[..r];

    let sigma = DVector::from_iterator(r, keep.iter().map(|&i| lambdas[i].max(0.0).sqrt()));
    let inv_s = reciprocal_spectrum(&sigma, x.nrows(), x.ncols(), r)?;
    let z = eigen.eigenvectors.select_columns(keep);
    Ok(x * z * DMatrix::from_diagonal(&inv_s))
}

/// `1/s` for a spectrum whose smallest kept value is numerically non-zero.
fn reciprocal_spectrum(
    s: &DVector<f64>,
    rows: usize,
    cols: usize,
    r: usize,
) -> ReductionResult<DVector<f64>> {
    let s_max = s.max();
    let s_min = s.min();
    if !(s_min > rank_threshold(s_max, rows, cols)) {
        return Err(ReductionError::DegenerateBasis {
            what: format!(
                "weighted snapshots have numerical rank below {r} (singular value {s_min:e})"
            ),
            rank: r,
        });
    }
    Ok(s.map(|v| 1.0 / v))
}

/// `W = ((Vᵗ·Θ·V)⁻¹·Vᵗ·Θ)ᵗ`, so that `Wᵗ·V = I_r`.
pub fn biorthogonal_left_basis(
    v: &DMatrix<f64>,
    theta: &DMatrix<f64>,
) -> ReductionResult<DMatrix<f64>> {
    let v_t_theta = v.transpose() * theta;
    let gram = &v_t_theta * v;
    let inv = invert_gram(&gram, "weighted Gram matrix VᵗΘV")?;
    Ok((inv * v_t_theta).transpose())
}

impl ReductionBasisStrategy for CarlbergWeightedPod {
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
        let theta = inputs.goal_weight(Self::NAME)?;
        let basis = self.compute(snapshots, &theta)?;

        let defect = basis.biorthogonality_defect();
        if defect > BIORTHOGONALITY_WARN {
            warn!(defect, rank = self.config.rank, "carlberg basis drifted from biorthogonality");
            sink.emit(ReductionEvent::BiorthogonalityDrift { defect });
        }
        Ok(basis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::subspace_deviation;

    fn example_x() -> SnapshotMatrix {
        SnapshotMatrix::new(DMatrix::from_row_slice(
            2,
            3,
            &[3.0, 2.0, 2.0, 2.0, 3.0, -2.0],
        ))
        .unwrap()
    }

    #[test]
    fn identity_weight_reproduces_svd() {
        let s = 1.0 / 2f64.sqrt();
        let reference = DMatrix::from_row_slice(2, 2, &[s, s, s, -s]);
        let carlberg = CarlbergWeightedPod::new(CarlbergConfig::with_rank(2)).unwrap();
        let basis = carlberg
            .compute(&example_x(), &DMatrix::identity(2, 2))
            .unwrap();
        assert!(subspace_deviation(basis.v(), &reference) < 1e-5);
        assert!(basis.biorthogonality_defect() < 1e-5);
    }

    #[test]
    fn methods_agree_on_subspace() {
        let nx = 10;
        let x = SnapshotMatrix::new(DMatrix::from_fn(nx, 6, |i, j| {
            ((i + 1) as f64 * 0.3 + (j as f64).cos()).sin() + 0.1 * (i * j) as f64
        }))
        .unwrap();
        let c = DMatrix::from_fn(2, nx, |i, j| (i * nx + j) as f64 + 5.0);
        let theta = c.transpose() * &c;

        let sqrt = CarlbergWeightedPod::new(CarlbergConfig::with_rank(2))
            .unwrap()
            .compute(&x, &theta)
            .unwrap();
        let gram = CarlbergWeightedPod::new(CarlbergConfig {
            method: CarlbergMethod::SnapshotGram,
            ..CarlbergConfig::with_rank(2)
        })
        .unwrap()
        .compute(&x, &theta)
        .unwrap();

        // Same span: projecting one onto the other loses nothing.
        let q1 = crate::linalg::closest_orthonormal(sqrt.v()).unwrap();
        let q2 = crate::linalg::closest_orthonormal(gram.v()).unwrap();
        let residual = &q2 - &q1 * (q1.transpose() * &q2);
        assert!(residual.norm() < 1e-4);
    }

    #[test]
    fn negative_eigenvalue_rejected() {
        let theta = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, -1.0]));
        let err = CarlbergWeightedPod::new(CarlbergConfig::with_rank(1))
            .unwrap()
            .compute(&example_x(), &theta)
            .unwrap_err();
        assert!(matches!(err, ReductionError::NonPsdWeightMatrix { .. }));
    }

    #[test]
    fn rank_beyond_weight_rank_is_degenerate() {
        // Θ has rank 1, so a rank-2 weighted basis cannot exist.
        let c = DMatrix::from_row_slice(1, 2, &[1.0, 0.0]);
        let theta = c.transpose() * &c;
        let err = CarlbergWeightedPod::new(CarlbergConfig::with_rank(2))
            .unwrap()
            .compute(&example_x(), &theta)
            .unwrap_err();
        assert!(matches!(err, ReductionError::DegenerateBasis { rank: 2, .. }));
    }

    #[test]
    fn wrong_weight_shape_rejected() {
        let err = CarlbergWeightedPod::new(CarlbergConfig::with_rank(1))
            .unwrap()
            .compute(&example_x(), &DMatrix::identity(3, 3))
            .unwrap_err();
        assert!(matches!(err, ReductionError::DimensionMismatch { .. }));
    }
}
