//! Error types for durastore
//!
//! Provides a unified error type for all operations. Every public operation
//! reports failure through [`DuraError`]; nothing panics past the store
//! boundary.

use thiserror::Error;

/// Result type alias using DuraError
pub type Result<T> = std::result::Result<T, DuraError>;

/// Unified error type for durastore operations
#[derive(Debug, Error)]
pub enum DuraError {
    // -------------------------------------------------------------------------
    // Facade Errors
    // -------------------------------------------------------------------------
    #[error("Validation failed for key '{key}': {reason}")]
    ValidationFailed { key: String, reason: String },

    #[error("Capacity exceeded writing '{key}': needed {needed} bytes, {available} available")]
    CapacityExceeded {
        key: String,
        needed: usize,
        available: usize,
    },

    #[error("Corruption unrecoverable for key '{0}': no valid snapshot")]
    CorruptionUnrecoverable(String),

    #[error("Invalid key '{0}'")]
    InvalidKey(String),

    // -------------------------------------------------------------------------
    // Secondary Store Errors
    // -------------------------------------------------------------------------
    #[error("Secondary store unavailable: {0}")]
    SecondaryStoreUnavailable(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    // -------------------------------------------------------------------------
    // Import Errors
    // -------------------------------------------------------------------------
    #[error("Import format mismatch: bundle is '{found}', supported {supported:?}")]
    ImportFormatMismatch {
        found: String,
        supported: Vec<String>,
    },

    #[error("Import aborted at '{failed_key}' after {} committed keys: {reason}", .committed.len())]
    ImportPartialFailure {
        committed: Vec<String>,
        failed_key: String,
        reason: String,
    },

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Journal Errors
    // -------------------------------------------------------------------------
    #[error("Journal corruption detected: {0}")]
    JournalCorruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    Encoding(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for DuraError {
    fn from(err: bincode::Error) -> Self {
        DuraError::Encoding(err.to_string())
    }
}

impl DuraError {
    /// True for the capacity signal the primary medium raises on a full store
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, DuraError::CapacityExceeded { .. })
    }
}
