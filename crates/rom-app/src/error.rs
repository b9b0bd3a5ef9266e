//! Error types for the rom-app service layer.

use std::path::PathBuf;

/// Application error type that wraps errors from the engine and storage
/// crates behind one interface for the CLI.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Failed to read config file: {path}")]
    ConfigFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Model error: {0}")]
    Model(String),

    #[error("Failed to read model file: {path}")]
    ModelFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Config validation failed: {0}")]
    Validation(String),

    #[error("Reduction error: {0}")]
    Reduction(String),

    #[error("Results error: {0}")]
    Results(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for rom-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<rom_core::CoreError> for AppError {
    fn from(err: rom_core::CoreError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<rom_reduction::ReductionError> for AppError {
    fn from(err: rom_reduction::ReductionError) -> Self {
        AppError::Reduction(err.to_string())
    }
}

impl From<rom_results::StoreError> for AppError {
    fn from(err: rom_results::StoreError) -> Self {
        match err {
            rom_results::StoreError::RecordNotFound { record } => AppError::RecordNotFound(record),
            other => AppError::Results(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Results(format!("Failed to serialize report: {}", err))
    }
}
