//! JSON model files.
//!
//! Matrices are row-major nested arrays:
//!
//! ```json
//! { "A": [[0.9, 0.1], [0.0, 0.8]], "B": [[1.0], [0.0]], "C": [[1.0, 0.0]],
//!   "f": [0.0, 0.01], "X": [[1.0, 0.9], [0.0, 0.1]], "U": [[1.0]] }
//! ```
//!
//! `X` may be omitted when `x0` and `U` are given; the snapshots are then
//! obtained by simulating the full-order system.

use std::path::Path;

use nalgebra::{DMatrix, DVector};
use rom_reduction::linalg::singular_values;
use rom_reduction::{FullOrderSystem, SnapshotMatrix};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    #[serde(rename = "A")]
    pub a: Vec<Vec<f64>>,
    #[serde(rename = "B")]
    pub b: Vec<Vec<f64>>,
    #[serde(rename = "C")]
    pub c: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub f: Option<Vec<f64>>,
    #[serde(rename = "X", default, skip_serializing_if = "Option::is_none")]
    pub x: Option<Vec<Vec<f64>>>,
    #[serde(rename = "U", default, skip_serializing_if = "Option::is_none")]
    pub u: Option<Vec<Vec<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x0: Option<Vec<f64>>,
}

/// A full-order system together with the data the strategies consume.
#[derive(Debug, Clone)]
pub struct ReductionModel {
    pub system: FullOrderSystem,
    pub snapshots: SnapshotMatrix,
    /// Controls that produced `snapshots`, needed for the reduction error.
    pub controls: Option<DMatrix<f64>>,
}

impl ReductionModel {
    /// Singular values of the snapshot matrix, largest first.
    pub fn spectrum(&self) -> AppResult<Vec<f64>> {
        Ok(singular_values(self.snapshots.matrix())?.iter().copied().collect())
    }
}

fn matrix_from_rows(name: &str, rows: &[Vec<f64>]) -> AppResult<DMatrix<f64>> {
    let ncols = rows.first().map_or(0, Vec::len);
    if rows.is_empty() || ncols == 0 {
        return Err(AppError::Model(format!("matrix {} is empty", name)));
    }
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != ncols) {
        return Err(AppError::Model(format!(
            "matrix {} row {} has {} entries, expected {}",
            name,
            i,
            row.len(),
            ncols
        )));
    }
    Ok(DMatrix::from_fn(rows.len(), ncols, |i, j| rows[i][j]))
}

impl ModelFile {
    pub fn into_model(self) -> AppResult<ReductionModel> {
        let a = matrix_from_rows("A", &self.a)?;
        let b = matrix_from_rows("B", &self.b)?;
        let c = matrix_from_rows("C", &self.c)?;
        let f = self.f.map(DVector::from_vec);
        let system = FullOrderSystem::new(a, b, c, f)?;

        let controls = self
            .u
            .as_deref()
            .map(|u| matrix_from_rows("U", u))
            .transpose()?;

        let snapshots = match (&self.x, &self.x0, &controls) {
            (Some(x), _, _) => SnapshotMatrix::new(matrix_from_rows("X", x)?)?,
            (None, Some(x0), Some(u)) => {
                debug!(steps = u.ncols(), "simulating snapshots from x0 and U");
                system.simulate(&DVector::from_column_slice(x0), u)?
            }
            (None, _, _) => {
                return Err(AppError::Model(
                    "model needs snapshots X, or x0 together with U".to_string(),
                ));
            }
        };

        if snapshots.nx() != system.nx() {
            return Err(AppError::Model(format!(
                "snapshots have {} rows but the system has {} states",
                snapshots.nx(),
                system.nx()
            )));
        }

        Ok(ReductionModel {
            system,
            snapshots,
            controls,
        })
    }
}

/// Load a model from a JSON file.
pub fn load_model(path: &Path) -> AppResult<ReductionModel> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::ModelFileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let file: ModelFile = serde_json::from_str(&content)
        .map_err(|e| AppError::Model(format!("Failed to parse model JSON: {}", e)))?;
    file.into_model()
}
