//! Persisted record schema.

use nalgebra::DMatrix;
use rom_core::BasisKey;
use serde::{Deserialize, Deserializer, Serialize};

/// Dense matrix in column-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRecord {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl MatrixRecord {
    pub fn from_matrix(m: &DMatrix<f64>) -> Self {
        Self {
            rows: m.nrows(),
            cols: m.ncols(),
            data: m.as_slice().to_vec(),
        }
    }

    /// Fail unless the payload holds exactly `rows * cols` entries.
    pub fn check_len(&self) -> Result<(), String> {
        let Some(expected) = self.rows.checked_mul(self.cols) else {
            return Err(format!("{}x{} matrix is too large to address", self.rows, self.cols));
        };
        if self.data.len() != expected {
            return Err(format!(
                "{}x{} matrix needs {} entries, found {}",
                self.rows,
                self.cols,
                expected,
                self.data.len()
            ));
        }
        Ok(())
    }

    /// Rebuild the matrix, or describe why the payload does not fit its shape.
    pub fn to_matrix(&self) -> Result<DMatrix<f64>, String> {
        self.check_len()?;
        Ok(DMatrix::from_column_slice(self.rows, self.cols, &self.data))
    }
}

/// One stored basis pair with its manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasisRecord {
    pub strategy: String,
    pub rank: usize,
    pub nx: usize,
    /// RFC 3339 timestamp of the save.
    pub created_at: String,
    /// SHA-256 of the V and W payloads.
    pub checksum: String,
    /// `null` when the producer did not time the computation. The key itself
    /// must be present.
    #[serde(deserialize_with = "required_nullable")]
    pub compute_time_s: Option<f64>,
    #[serde(rename = "V")]
    pub v: MatrixRecord,
    #[serde(rename = "W")]
    pub w: MatrixRecord,
}

impl BasisRecord {
    pub fn key(&self) -> BasisKey {
        BasisKey::new(self.strategy.clone(), self.rank)
    }
}

fn required_nullable<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer)
}

/// Metadata view of a record, without the matrices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub key: BasisKey,
    pub nx: usize,
    pub created_at: String,
    pub compute_time_s: Option<f64>,
}

impl From<&BasisRecord> for RecordSummary {
    fn from(record: &BasisRecord) -> Self {
        Self {
            key: record.key(),
            nx: record.nx,
            created_at: record.created_at.clone(),
            compute_time_s: record.compute_time_s,
        }
    }
}
