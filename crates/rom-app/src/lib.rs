//! Application service layer for the reduction toolkit.
//!
//! Loads sweep configurations and models, runs (strategy, rank) sweeps into
//! a basis store, and evaluates the stored bases.

pub mod config;
pub mod error;
pub mod evaluate;
pub mod model;
pub mod sweep;

pub use config::{
    AdadeltaSpec, CarlbergMethodSpec, StrategySpec, SweepConfig, load_config, parse_config,
    validate_config,
};
pub use error::{AppError, AppResult};
pub use evaluate::{EvaluationReport, EvaluationRow, evaluate_store, write_report};
pub use model::{ModelFile, ReductionModel, load_model};
pub use sweep::{SweepEntry, SweepReport, run_sweep, run_sweep_with_progress};
