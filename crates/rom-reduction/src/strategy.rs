//! The strategy contract shared by every basis construction method.

use std::borrow::Cow;

use nalgebra::DMatrix;
use rom_core::{BasisKey, Timer};
use tracing::info;

use crate::basis::ReductionBasis;
use crate::carlberg::CarlbergWeightedPod;
use crate::error::{ReductionError, ReductionResult};
use crate::events::{DiagnosticSink, ReductionEvent};
use crate::external::ExternalSolverReduction;
use crate::gradient::GradientDescentWeightedPod;
use crate::modal::ModalReduction;
use crate::pod::PlainPod;
use crate::system::{FullOrderSystem, SnapshotMatrix};

/// Borrowed data a strategy may draw from. Each strategy states which
/// fields it needs and fails with [`ReductionError::InvalidConfig`] when one
/// is missing.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReductionInputs<'a> {
    pub system: Option<&'a FullOrderSystem>,
    pub snapshots: Option<&'a SnapshotMatrix>,
    /// Goal weighting Θ. Defaults to `Cᵗ·C` of `system` when absent.
    pub weight: Option<&'a DMatrix<f64>>,
}

impl<'a> ReductionInputs<'a> {
    pub fn new(system: &'a FullOrderSystem, snapshots: &'a SnapshotMatrix) -> Self {
        Self {
            system: Some(system),
            snapshots: Some(snapshots),
            weight: None,
        }
    }

    pub fn with_weight(mut self, weight: &'a DMatrix<f64>) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn require_snapshots(&self, strategy: &str) -> ReductionResult<&'a SnapshotMatrix> {
        self.snapshots.ok_or_else(|| ReductionError::InvalidConfig {
            what: format!("strategy '{strategy}' requires a snapshot matrix"),
        })
    }

    pub fn require_system(&self, strategy: &str) -> ReductionResult<&'a FullOrderSystem> {
        self.system.ok_or_else(|| ReductionError::InvalidConfig {
            what: format!("strategy '{strategy}' requires the full-order system"),
        })
    }

    /// Output matrix `C` of the full-order system.
    pub fn require_output(&self, strategy: &str) -> ReductionResult<&'a DMatrix<f64>> {
        Ok(self.require_system(strategy)?.c())
    }

    /// Explicit Θ if given, otherwise `Cᵗ·C`.
    pub fn goal_weight(&self, strategy: &str) -> ReductionResult<Cow<'a, DMatrix<f64>>> {
        match self.weight {
            Some(w) => Ok(Cow::Borrowed(w)),
            None => Ok(Cow::Owned(self.require_system(strategy)?.goal_weight())),
        }
    }
}

/// Computes a projection basis pair `(V, W)` from strategy-specific inputs.
pub trait ReductionBasisStrategy {
    /// Stable identifier used in record keys.
    fn name(&self) -> &'static str;

    fn rank(&self) -> usize;

    fn compute_basis(
        &self,
        inputs: &ReductionInputs<'_>,
        sink: &mut dyn DiagnosticSink,
    ) -> ReductionResult<ReductionBasis>;

    fn key(&self) -> BasisKey {
        BasisKey::new(self.name(), self.rank())
    }
}

/// Run a strategy, stamping the basis with its wall-clock compute time.
pub fn compute_timed<S: ReductionBasisStrategy + ?Sized>(
    strategy: &S,
    inputs: &ReductionInputs<'_>,
    sink: &mut dyn DiagnosticSink,
) -> ReductionResult<ReductionBasis> {
    let name = strategy.name();
    let rank = strategy.rank();
    sink.emit(ReductionEvent::Started {
        strategy: name,
        rank,
    });

    let timer = Timer::start(name);
    let basis = strategy.compute_basis(inputs, sink)?;
    let label = timer.label();
    let elapsed_s = timer.stop();

    info!(strategy = label, rank, elapsed_s, "reduction basis computed");
    sink.emit(ReductionEvent::Finished {
        strategy: name,
        rank,
        elapsed_s,
    });
    basis.with_compute_time(elapsed_s)
}

/// Tagged union over every available strategy.
pub enum Strategy {
    Pod(PlainPod),
    Carlberg(CarlbergWeightedPod),
    GradientDescent(GradientDescentWeightedPod),
    Modal(ModalReduction),
    External(ExternalSolverReduction),
}

impl Strategy {
    fn as_dyn(&self) -> &dyn ReductionBasisStrategy {
        match self {
            Strategy::Pod(s) => s,
            Strategy::Carlberg(s) => s,
            Strategy::GradientDescent(s) => s,
            Strategy::Modal(s) => s,
            Strategy::External(s) => s,
        }
    }
}

impl ReductionBasisStrategy for Strategy {
    fn name(&self) -> &'static str {
        self.as_dyn().name()
    }

    fn rank(&self) -> usize {
        self.as_dyn().rank()
    }

    fn compute_basis(
        &self,
        inputs: &ReductionInputs<'_>,
        sink: &mut dyn DiagnosticSink,
    ) -> ReductionResult<ReductionBasis> {
        self.as_dyn().compute_basis(inputs, sink)
    }
}

impl From<PlainPod> for Strategy {
    fn from(s: PlainPod) -> Self {
        Strategy::Pod(s)
    }
}

impl From<CarlbergWeightedPod> for Strategy {
    fn from(s: CarlbergWeightedPod) -> Self {
        Strategy::Carlberg(s)
    }
}

impl From<GradientDescentWeightedPod> for Strategy {
    fn from(s: GradientDescentWeightedPod) -> Self {
        Strategy::GradientDescent(s)
    }
}

impl From<ModalReduction> for Strategy {
    fn from(s: ModalReduction) -> Self {
        Strategy::Modal(s)
    }
}

impl From<ExternalSolverReduction> for Strategy {
    fn from(s: ExternalSolverReduction) -> Self {
        Strategy::External(s)
    }
}

/// Eager rank validation shared by every config.
pub(crate) fn validate_rank(rank: usize) -> ReductionResult<()> {
    if rank == 0 {
        return Err(ReductionError::InvalidRank { rank });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;
    use crate::pod::PodConfig;

    #[test]
    fn missing_snapshots_reported() {
        let pod = PlainPod::new(PodConfig { rank: 1 }).unwrap();
        let err = pod
            .compute_basis(&ReductionInputs::default(), &mut NullSink)
            .unwrap_err();
        assert!(matches!(err, ReductionError::InvalidConfig { .. }));
    }

    #[test]
    fn compute_timed_stamps_time_and_emits_events() {
        let x = SnapshotMatrix::new(DMatrix::from_row_slice(
            2,
            3,
            &[3.0, 2.0, 2.0, 2.0, 3.0, -2.0],
        ))
        .unwrap();
        let strategy: Strategy = PlainPod::new(PodConfig { rank: 1 }).unwrap().into();
        let inputs = ReductionInputs {
            snapshots: Some(&x),
            ..Default::default()
        };

        let mut events = Vec::new();
        let basis = compute_timed(&strategy, &inputs, &mut |e: ReductionEvent| events.push(e)).unwrap();

        assert!(basis.compute_time_s() >= 0.0);
        assert_eq!(strategy.key().to_string(), "pod_rank_1");
        assert!(matches!(events.first(), Some(ReductionEvent::Started { strategy: "pod", rank: 1 })));
        assert!(matches!(events.last(), Some(ReductionEvent::Finished { .. })));
    }
}
