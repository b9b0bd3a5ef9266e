//! Projection basis pairs.

use nalgebra::DMatrix;

use crate::error::{ReductionError, ReductionResult, shape};

/// Right/left projection bases `(V, W)`, both `nx x r`.
///
/// `x_full ≈ V · x_reduced`. Galerkin strategies set `W = V`; Petrov-Galerkin
/// strategies produce `W ≠ V` with `Wᵗ·V ≈ I_r`.
#[derive(Clone, Debug, PartialEq)]
pub struct ReductionBasis {
    v: DMatrix<f64>,
    w: DMatrix<f64>,
    compute_time_s: f64,
}

impl ReductionBasis {
    /// Petrov-Galerkin pair. `V` and `W` must share their shape and have `r >= 1`.
    pub fn new(v: DMatrix<f64>, w: DMatrix<f64>) -> ReductionResult<Self> {
        if v.shape() != w.shape() {
            return Err(ReductionError::DimensionMismatch {
                what: "W (must match V)",
                expected: shape(v.nrows(), v.ncols()),
                actual: shape(w.nrows(), w.ncols()),
            });
        }
        if v.ncols() == 0 {
            return Err(ReductionError::InvalidRank { rank: 0 });
        }
        if v.ncols() > v.nrows() {
            return Err(ReductionError::RankExceedsStateDimension {
                rank: v.ncols(),
                nx: v.nrows(),
            });
        }
        Ok(Self {
            v,
            w,
            compute_time_s: f64::NAN,
        })
    }

    /// Galerkin pair (`W = V`).
    pub fn galerkin(v: DMatrix<f64>) -> ReductionResult<Self> {
        let w = v.clone();
        Self::new(v, w)
    }

    /// Stamp the wall-clock compute time. NaN marks an unmeasured basis;
    /// anything else must be a finite, non-negative duration.
    pub fn with_compute_time(mut self, seconds: f64) -> ReductionResult<Self> {
        if !seconds.is_nan() && !(seconds.is_finite() && seconds >= 0.0) {
            return Err(ReductionError::InvalidConfig {
                what: format!("compute time must be a non-negative duration, got {seconds}"),
            });
        }
        self.compute_time_s = seconds;
        Ok(self)
    }

    /// Wall-clock seconds spent computing the basis, NaN if unmeasured.
    pub fn compute_time_s(&self) -> f64 {
        self.compute_time_s
    }

    /// Compute time, `None` when unmeasured.
    pub fn measured_compute_time(&self) -> Option<f64> {
        self.compute_time_s.is_finite().then_some(self.compute_time_s)
    }

    pub fn v(&self) -> &DMatrix<f64> {
        &self.v
    }

    pub fn w(&self) -> &DMatrix<f64> {
        &self.w
    }

    pub fn nx(&self) -> usize {
        self.v.nrows()
    }

    pub fn rank(&self) -> usize {
        self.v.ncols()
    }

    pub fn is_galerkin(&self) -> bool {
        self.v == self.w
    }

    /// Frobenius norm of `Wᵗ·V − I_r`.
    pub fn biorthogonality_defect(&self) -> f64 {
        let r = self.rank();
        (self.w.transpose() * &self.v - DMatrix::<f64>::identity(r, r)).norm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_basis_is_biorthogonal() {
        let b = ReductionBasis::galerkin(DMatrix::identity(3, 2)).unwrap();
        assert!(b.is_galerkin());
        assert!(b.biorthogonality_defect() < 1e-15);
        assert!(b.compute_time_s().is_nan());
        assert_eq!(b.measured_compute_time(), None);
    }

    #[test]
    fn compute_time_must_be_a_duration() {
        let b = ReductionBasis::galerkin(DMatrix::identity(3, 2)).unwrap();
        for bad in [-1.0, -f64::MIN_POSITIVE, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                b.clone().with_compute_time(bad),
                Err(ReductionError::InvalidConfig { .. })
            ));
        }
        let timed = b.clone().with_compute_time(0.0).unwrap();
        assert_eq!(timed.measured_compute_time(), Some(0.0));
        assert!(b.with_compute_time(f64::NAN).unwrap().compute_time_s().is_nan());
    }

    #[test]
    fn mismatched_pair_rejected() {
        let err = ReductionBasis::new(DMatrix::zeros(3, 2), DMatrix::zeros(3, 1)).unwrap_err();
        assert!(matches!(err, ReductionError::DimensionMismatch { .. }));
    }

    #[test]
    fn rank_bounds() {
        assert!(matches!(
            ReductionBasis::galerkin(DMatrix::zeros(3, 0)),
            Err(ReductionError::InvalidRank { .. })
        ));
        assert!(matches!(
            ReductionBasis::galerkin(DMatrix::zeros(2, 3)),
            Err(ReductionError::RankExceedsStateDimension { rank: 3, nx: 2 })
        ));
    }
}
