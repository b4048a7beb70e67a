//! Error types for csvdb
//!
//! Provides a unified error type for all operations.

use std::fmt;

use thiserror::Error;

/// Result type alias using CsvDbError
pub type Result<T> = std::result::Result<T, CsvDbError>;

/// Which kind of tombstone a record carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteKind {
    /// Flag flipped, content intact
    Soft,
    /// Content blanked, irreversible
    Hard,
}

impl fmt::Display for DeleteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteKind::Soft => write!(f, "soft"),
            DeleteKind::Hard => write!(f, "hard"),
        }
    }
}

/// Unified error type for csvdb operations
#[derive(Debug, Error)]
pub enum CsvDbError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Record {r_id} not found")]
    RecordNotFound { r_id: u64 },

    #[error("Record {r_id} is {kind} deleted")]
    RecordDeleted { r_id: u64, kind: DeleteKind },

    #[error("Record too wide: needs {needed} bytes, max_record_width is {max}")]
    RecordTooWide { needed: usize, max: usize },

    #[error("Write rejected by validation hook")]
    ValidationRejected,

    #[error("Corrupt table file: {0}")]
    Corrupt(String),

    // -------------------------------------------------------------------------
    // Text Blob Errors
    // -------------------------------------------------------------------------
    #[error("Invalid text blob reference: offset={offset}, length={length}")]
    InvalidBlobRef { offset: i64, length: i64 },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Configuration / Argument Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
