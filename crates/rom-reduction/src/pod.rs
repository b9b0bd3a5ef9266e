//! Plain proper orthogonal decomposition.

use nalgebra::DMatrix;
use tracing::debug;

use crate::basis::ReductionBasis;
use crate::error::ReductionResult;
use crate::events::DiagnosticSink;
use crate::linalg::{SvdMode, truncated_svd};
use crate::strategy::{ReductionBasisStrategy, ReductionInputs, validate_rank};
use crate::system::SnapshotMatrix;

/// POD configuration.
#[derive(Clone, Debug)]
pub struct PodConfig {
    /// Target rank, `1 <= rank <= min(nx, ns)`.
    pub rank: usize,
}

/// Galerkin basis from the dominant left singular vectors of the snapshots.
#[derive(Clone, Debug)]
pub struct PlainPod {
    config: PodConfig,
}

impl PlainPod {
    pub const NAME: &'static str = "pod";

    pub fn new(config: PodConfig) -> ReductionResult<Self> {
        validate_rank(config.rank)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PodConfig {
        &self.config
    }

    /// `V = W = U_r`, the first `r` left singular vectors of `X`.
    pub fn compute(&self, snapshots: &SnapshotMatrix) -> ReductionResult<ReductionBasis> {
        let v = pod_basis(snapshots, self.config.rank)?;
        ReductionBasis::galerkin(v)
    }
}

/// Orthonormal POD basis of rank `r`. Shared by the strategies that start
/// from it.
pub(crate) fn pod_basis(snapshots: &SnapshotMatrix, r: usize) -> ReductionResult<DMatrix<f64>> {
    snapshots.check_rank(r)?;
    let svd = truncated_svd(snapshots.matrix(), r)?;
    if svd.mode == SvdMode::Full {
        debug!(rank = r, "rank equals snapshot count, using full decomposition");
    }
    Ok(svd.u)
}

impl ReductionBasisStrategy for PlainPod {
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
        self.compute(inputs.require_snapshots(Self::NAME)?)
    }
}
