//! Model-order reduction engine.
//!
//! Given a discretized linear/affine system `x_{t+1} = A x_t + B u_t + f`
//! with goal output `y = C x`, this crate builds projection bases `(V, W)`
//! with interchangeable strategies, projects the system onto them, and
//! measures how much is lost.
//!
//! Strategies:
//! - [`PlainPod`]: dominant left singular vectors of the snapshots
//! - [`CarlbergWeightedPod`]: closed-form goal-weighted Petrov-Galerkin basis
//! - [`GradientDescentWeightedPod`]: iterative goal-weighted refinement of POD
//! - [`ModalReduction`]: dominant left singular vectors of `A`
//! - [`ExternalSolverReduction`]: injected balanced-truncation or
//!   constrained-optimization collaborators

pub mod basis;
pub mod carlberg;
pub mod error;
pub mod events;
pub mod external;
pub mod gradient;
pub mod linalg;
pub mod metrics;
pub mod modal;
pub mod optimizer;
pub mod pod;
pub mod projector;
pub mod strategy;
pub mod system;

pub use basis::ReductionBasis;
pub use carlberg::{CarlbergConfig, CarlbergMethod, CarlbergWeightedPod};
pub use error::{ReductionError, ReductionResult};
pub use events::{DiagnosticSink, NullSink, ReductionEvent};
pub use external::{
    BalancedTruncationOutput, BalancedTruncationRequest, BalancedTruncationSolver,
    CollaboratorError, ConstrainedOptimizationRequest, ConstrainedOptimizationSolver,
    ExternalSolver, ExternalSolverConfig, ExternalSolverReduction,
};
pub use gradient::{GradientDescentConfig, GradientDescentWeightedPod};
pub use metrics::{
    oblique_orthogonal_error, oblique_projector, orthogonal_error, projector, reduction_error,
    unweighted_orthogonal_error,
};
pub use modal::{ModalConfig, ModalReduction};
pub use optimizer::{Adadelta, AdadeltaConfig};
pub use pod::{PlainPod, PodConfig};
pub use projector::{ReducedSystem, reduce, reduce_galerkin};
pub use strategy::{ReductionBasisStrategy, ReductionInputs, Strategy, compute_timed};
pub use system::{FullOrderSystem, SnapshotMatrix};
