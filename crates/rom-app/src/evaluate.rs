//! Error evaluation over stored bases.

use std::path::Path;

use rom_core::BasisKey;
use rom_reduction::{orthogonal_error, reduction_error, unweighted_orthogonal_error};
use rom_results::BasisStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AppResult;
use crate::model::ReductionModel;

/// Metrics of one stored basis against the model's snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRow {
    pub key: BasisKey,
    /// `Σ‖C(I − VWᵗ)x‖` over the snapshots.
    pub weighted_error: Option<f64>,
    /// Same with `C = I`.
    pub unweighted_error: Option<f64>,
    /// Multi-step forecast error; `None` without a control sequence.
    pub reduction_error: Option<f64>,
    pub compute_time_s: Option<f64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub rows: Vec<EvaluationRow>,
}

impl EvaluationReport {
    /// Rows of one strategy, by ascending rank.
    pub fn strategy_rows<'a>(&'a self, strategy: &'a str) -> impl Iterator<Item = &'a EvaluationRow> {
        self.rows.iter().filter(move |r| r.key.strategy == strategy)
    }
}

/// Evaluate every stored record, optionally only those of one strategy.
///
/// Records that fail to load or evaluate keep a row with `error` set.
pub fn evaluate_store(
    store: &BasisStore,
    model: &ReductionModel,
    strategy: Option<&str>,
) -> AppResult<EvaluationReport> {
    let keys = store.list_keys(strategy)?;
    debug!(records = keys.len(), "evaluating stored bases");

    let rows = keys
        .into_iter()
        .map(|key| match evaluate_record(store, model, &key) {
            Ok(row) => row,
            Err(e) => {
                warn!(record = %key, error = %e, "evaluation failed");
                EvaluationRow {
                    key,
                    weighted_error: None,
                    unweighted_error: None,
                    reduction_error: None,
                    compute_time_s: None,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect();
    Ok(EvaluationReport { rows })
}

fn evaluate_record(
    store: &BasisStore,
    model: &ReductionModel,
    key: &BasisKey,
) -> AppResult<EvaluationRow> {
    let basis = store.load(key)?;
    let x = &model.snapshots;
    let weighted = orthogonal_error(x, model.system.c(), basis.w(), basis.v())?;
    let unweighted = unweighted_orthogonal_error(x, basis.w(), basis.v())?;
    let forecast = model
        .controls
        .as_ref()
        .map(|u| reduction_error(x, u, &basis, &model.system))
        .transpose()?;

    Ok(EvaluationRow {
        key: key.clone(),
        weighted_error: Some(weighted),
        unweighted_error: Some(unweighted),
        reduction_error: forecast,
        compute_time_s: basis.measured_compute_time(),
        error: None,
    })
}

/// Write any report as pretty JSON.
pub fn write_report<T: Serialize>(path: &Path, report: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}
