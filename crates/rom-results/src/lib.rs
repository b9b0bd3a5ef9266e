//! rom-results: on-disk storage for computed reduction bases.

pub mod hash;
pub mod store;
pub mod types;

pub use hash::payload_checksum;
pub use store::BasisStore;
pub use types::*;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {record}")]
    RecordNotFound { record: String },

    #[error("Corrupt record {record}: {reason}")]
    CorruptRecord { record: String, reason: String },

    #[error("Cannot store basis {record}: {reason}")]
    InvalidBasis { record: String, reason: String },
}

impl StoreError {
    pub(crate) fn corrupt(record: impl ToString, reason: impl Into<String>) -> Self {
        Self::CorruptRecord {
            record: record.to_string(),
            reason: reason.into(),
        }
    }
}
