//! Modal reduction: spectral basis of the system matrix, no snapshots.

use nalgebra::DMatrix;

use crate::basis::ReductionBasis;
use crate::error::{ReductionError, ReductionResult, ensure_shape};
use crate::events::DiagnosticSink;
use crate::linalg::left_singular_vectors;
use crate::strategy::{ReductionBasisStrategy, ReductionInputs, validate_rank};

#[derive(Clone, Debug)]
pub struct ModalConfig {
    /// Target rank, `1 <= rank <= nx`.
    pub rank: usize,
}

/// Galerkin basis from the dominant left singular vectors of `A`.
#[derive(Clone, Debug)]
pub struct ModalReduction {
    config: ModalConfig,
}

impl ModalReduction {
    pub const NAME: &'static str = "modal";

    pub fn new(config: ModalConfig) -> ReductionResult<Self> {
        validate_rank(config.rank)?;
        Ok(Self { config })
    }

    pub fn compute(&self, a: &DMatrix<f64>) -> ReductionResult<ReductionBasis> {
        let nx = a.nrows();
        ensure_shape("A", a.shape(), (nx, nx))?;
        if self.config.rank > nx {
            return Err(ReductionError::RankExceedsStateDimension {
                rank: self.config.rank,
                nx,
            });
        }
        ReductionBasis::galerkin(left_singular_vectors(a, self.config.rank)?)
    }
}

impl ReductionBasisStrategy for ModalReduction {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn rank(&self) -> usize {
        self.config.rank
    }

    fn compute_basis(
        &self,
        inputs: &ReductionInputs<'_>,
        _sink: &mut dyn DiagnosticSink,
    ) -> ReductionResult<ReductionBasis> {
        self.compute(inputs.require_system(Self::NAME)?.a())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::{subspace_deviation, truncated_svd};

    #[test]
    fn matches_leading_singular_vectors() {
        let a = DMatrix::from_fn(5, 5, |i, j| {
            ((i * 5 + j) as f64 * 0.7).cos() + if i == j { 1.5 * (i + 1) as f64 } else { 0.0 }
        });
        let reference = truncated_svd(&a, 5).unwrap().u;

        let full = ModalReduction::new(ModalConfig { rank: 5 })
            .unwrap()
            .compute(&a)
            .unwrap();
        let partial = ModalReduction::new(ModalConfig { rank: 3 })
            .unwrap()
            .compute(&a)
            .unwrap();

        assert!(subspace_deviation(full.v(), &reference) < 1e-8);
        assert!(subspace_deviation(partial.v(), &reference.columns(0, 3).into_owned()) < 1e-8);
    }

    #[test]
    fn non_finite_operator_fails_fast() {
        let mut a = DMatrix::<f64>::identity(4, 4);
        a[(2, 1)] = f64::NAN;
        let err = ModalReduction::new(ModalConfig { rank: 2 })
            .unwrap()
            .compute(&a)
            .unwrap_err();
        assert!(matches!(err, ReductionError::Core(rom_core::CoreError::NonFinite { .. })));
    }

    #[test]
    fn rank_above_state_dimension() {
        let err = ModalReduction::new(ModalConfig { rank: 4 })
            .unwrap()
            .compute(&DMatrix::identity(3, 3))
            .unwrap_err();
        assert!(matches!(err, ReductionError::RankExceedsStateDimension { rank: 4, nx: 3 }));
    }
}
