//! Basis storage API.
//!
//! Layout: `<root>/<strategy>_rank_<r>/basis.json`. Each record lives in its
//! own directory so distinct (strategy, rank) jobs never touch the same file.

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use rom_core::BasisKey;
use rom_reduction::ReductionBasis;
use serde_json::error::Category;
use tracing::{debug, warn};

use crate::hash::payload_checksum;
use crate::types::{BasisRecord, MatrixRecord, RecordSummary};
use crate::{StoreError, StoreResult};

const RECORD_FILE: &str = "basis.json";

#[derive(Clone, Debug)]
pub struct BasisStore {
    root_dir: PathBuf,
}

impl BasisStore {
    pub fn new(root_dir: PathBuf) -> StoreResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    pub fn root_dir(&self) -> &PathBuf {
        &self.root_dir
    }

    fn record_dir(&self, key: &BasisKey) -> PathBuf {
        self.root_dir.join(key.to_string())
    }

    fn record_path(&self, key: &BasisKey) -> PathBuf {
        self.record_dir(key).join(RECORD_FILE)
    }

    pub fn has_record(&self, key: &BasisKey) -> bool {
        self.record_path(key).exists()
    }

    /// Write `basis` under `key`, replacing any previous record.
    ///
    /// The JSON is written to a temporary sibling and renamed into place, so
    /// readers see either the old record or the complete new one.
    pub fn save(&self, key: &BasisKey, basis: &ReductionBasis) -> StoreResult<()> {
        if basis.rank() != key.rank {
            return Err(StoreError::InvalidBasis {
                record: key.to_string(),
                reason: format!("basis has rank {}, key says {}", basis.rank(), key.rank),
            });
        }
        if basis.v().iter().chain(basis.w().iter()).any(|x| !x.is_finite()) {
            return Err(StoreError::InvalidBasis {
                record: key.to_string(),
                reason: "basis contains non-finite entries".to_string(),
            });
        }

        let v = MatrixRecord::from_matrix(basis.v());
        let w = MatrixRecord::from_matrix(basis.w());
        let record = BasisRecord {
            strategy: key.strategy.clone(),
            rank: key.rank,
            nx: basis.nx(),
            created_at: chrono::Utc::now().to_rfc3339(),
            checksum: payload_checksum(&v, &w),
            compute_time_s: basis.measured_compute_time(),
            v,
            w,
        };

        let dir = self.record_dir(key);
        fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(&record)?;

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let tmp_path = dir.join(format!(".{RECORD_FILE}.{}.{nanos}.tmp", std::process::id()));
        fs::write(&tmp_path, json)?;
        if let Err(e) = fs::rename(&tmp_path, self.record_path(key)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        debug!(record = %key, nx = record.nx, "basis record saved");
        Ok(())
    }

    /// Read and verify the raw record stored under `key`.
    pub fn load_record(&self, key: &BasisKey) -> StoreResult<BasisRecord> {
        let path = self.record_path(key);
        if !path.exists() {
            return Err(StoreError::RecordNotFound {
                record: key.to_string(),
            });
        }

        let content = fs::read_to_string(path)?;
        let record: BasisRecord = serde_json::from_str(&content).map_err(|e| match e.classify() {
            Category::Io => StoreError::Json(e),
            Category::Syntax | Category::Data | Category::Eof => {
                StoreError::corrupt(key, e.to_string())
            }
        })?;
        verify(key, &record)?;
        Ok(record)
    }

    /// Load the basis stored under `key`.
    pub fn load(&self, key: &BasisKey) -> StoreResult<ReductionBasis> {
        let record = self.load_record(key)?;
        let v = record.v.to_matrix().map_err(|r| StoreError::corrupt(key, format!("V: {r}")))?;
        let w = record.w.to_matrix().map_err(|r| StoreError::corrupt(key, format!("W: {r}")))?;
        let basis = ReductionBasis::new(v, w).map_err(|e| StoreError::corrupt(key, e.to_string()))?;
        basis
            .with_compute_time(record.compute_time_s.unwrap_or(f64::NAN))
            .map_err(|e| StoreError::corrupt(key, e.to_string()))
    }

    /// Keys of every readable record, optionally restricted to one strategy,
    /// sorted by strategy then rank.
    pub fn list_keys(&self, strategy: Option<&str>) -> StoreResult<Vec<BasisKey>> {
        let mut keys = Vec::new();

        if !self.root_dir.exists() {
            return Ok(keys);
        }

        for entry in fs::read_dir(&self.root_dir)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let Ok(key) = BasisKey::parse(&name) else {
                debug!(dir = %name, "skipping directory that is not a basis record");
                continue;
            };
            if strategy.is_some_and(|s| s != key.strategy) || !self.has_record(&key) {
                continue;
            }
            keys.push(key);
        }

        keys.sort();
        Ok(keys)
    }

    /// Ranks stored for `strategy`, ascending.
    pub fn list_ranks(&self, strategy: &str) -> StoreResult<Vec<usize>> {
        Ok(self
            .list_keys(Some(strategy))?
            .into_iter()
            .map(|k| k.rank)
            .collect())
    }

    /// Manifests of every record that loads cleanly; corrupt ones are logged and skipped.
    pub fn list_summaries(&self, strategy: Option<&str>) -> StoreResult<Vec<RecordSummary>> {
        let mut summaries = Vec::new();
        for key in self.list_keys(strategy)? {
            match self.load_record(&key) {
                Ok(record) => summaries.push(RecordSummary::from(&record)),
                Err(e) => warn!(record = %key, error = %e, "skipping unreadable basis record"),
            }
        }
        Ok(summaries)
    }

    pub fn delete(&self, key: &BasisKey) -> StoreResult<()> {
        let dir = self.record_dir(key);
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }
}

fn verify(key: &BasisKey, record: &BasisRecord) -> StoreResult<()> {
    if record.key() != *key {
        return Err(StoreError::corrupt(
            key,
            format!("record describes {}", record.key()),
        ));
    }
    if record.v.rows != record.w.rows || record.v.cols != record.w.cols {
        return Err(StoreError::corrupt(
            key,
            format!(
                "V is {}x{} but W is {}x{}",
                record.v.rows, record.v.cols, record.w.rows, record.w.cols
            ),
        ));
    }
    if record.v.rows != record.nx || record.v.cols != record.rank {
        return Err(StoreError::corrupt(
            key,
            format!(
                "V is {}x{}, manifest says {}x{}",
                record.v.rows, record.v.cols, record.nx, record.rank
            ),
        ));
    }
    for (name, m) in [("V", &record.v), ("W", &record.w)] {
        m.check_len().map_err(|reason| StoreError::corrupt(key, format!("{name}: {reason}")))?;
    }
    let checksum = payload_checksum(&record.v, &record.w);
    if checksum != record.checksum {
        return Err(StoreError::corrupt(key, "checksum mismatch"));
    }
    Ok(())
}
