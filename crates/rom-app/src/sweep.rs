//! Parallel (strategy, rank) sweep that computes and stores bases.

use rayon::prelude::*;
use rom_core::BasisKey;
use rom_reduction::{ReductionBasisStrategy, ReductionEvent, ReductionInputs, compute_timed};
use rom_results::BasisStore;
use serde::{Deserialize, Serialize};
use tracing::{info, trace, warn};

use crate::config::{StrategySpec, SweepConfig};
use crate::error::AppResult;
use crate::model::ReductionModel;

/// Outcome of one (strategy, rank) job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepEntry {
    pub key: BasisKey,
    pub compute_time_s: Option<f64>,
    /// Set when the job failed; the basis was not stored.
    pub error: Option<String>,
}

impl SweepEntry {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    /// Sorted by strategy, then rank.
    pub entries: Vec<SweepEntry>,
}

impl SweepReport {
    pub fn failures(&self) -> impl Iterator<Item = &SweepEntry> {
        self.entries.iter().filter(|e| !e.succeeded())
    }
}

/// Compute and store every configured strategy at every configured rank.
pub fn run_sweep(
    config: &SweepConfig,
    model: &ReductionModel,
    store: &BasisStore,
) -> AppResult<SweepReport> {
    run_sweep_with_progress(config, model, store, &|_| {})
}

/// As [`run_sweep`], calling `progress` as each job finishes (from worker threads).
///
/// A failing job is recorded in the report and does not stop the others.
pub fn run_sweep_with_progress(
    config: &SweepConfig,
    model: &ReductionModel,
    store: &BasisStore,
    progress: &(dyn Fn(&SweepEntry) + Sync),
) -> AppResult<SweepReport> {
    crate::config::validate_config(config)?;

    let jobs: Vec<(&StrategySpec, usize)> = config
        .strategies
        .iter()
        .flat_map(|spec| config.ranks.iter().map(move |&rank| (spec, rank)))
        .collect();
    info!(jobs = jobs.len(), nx = model.system.nx(), ns = model.snapshots.ns(), "starting sweep");

    let mut entries: Vec<SweepEntry> = jobs
        .par_iter()
        .map(|&(spec, rank)| {
            let key = BasisKey::new(spec.name(), rank);
            let entry = match run_job(spec, rank, model, store) {
                Ok(seconds) => SweepEntry {
                    key,
                    compute_time_s: Some(seconds),
                    error: None,
                },
                Err(e) => {
                    warn!(record = %key, error = %e, "sweep job failed");
                    SweepEntry {
                        key,
                        compute_time_s: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            progress(&entry);
            entry
        })
        .collect();

    entries.sort_by(|a, b| a.key.cmp(&b.key));
    let failed = entries.iter().filter(|e| !e.succeeded()).count();
    info!(stored = entries.len() - failed, failed, "sweep finished");
    Ok(SweepReport { entries })
}

fn run_job(
    spec: &StrategySpec,
    rank: usize,
    model: &ReductionModel,
    store: &BasisStore,
) -> AppResult<f64> {
    let strategy = spec.build(rank)?;
    let inputs = ReductionInputs::new(&model.system, &model.snapshots);
    let mut sink = |event: ReductionEvent| trace!(?event, "reduction event");
    let basis = compute_timed(&strategy, &inputs, &mut sink)?;
    store.save(&strategy.key(), &basis)?;
    Ok(basis.compute_time_s())
}
