//! Error handling for the cohort matrix engine.

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use std::io;
use thiserror::Error;

use crate::registry::Epoch;

/// Specialized error type for the feature-matrix pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// A logical table has no registered mapping for the requested epoch.
    /// The cross-epoch merger treats this as "not applicable in that epoch".
    #[error("table '{table}' has no registered mapping for epoch '{epoch}'")]
    UnregisteredTable { table: String, epoch: Epoch },

    /// A logical table is not registered in any epoch at all.
    #[error("logical table '{0}' is not registered in any epoch")]
    UnknownLogicalTable(String),

    /// The external data source failed to produce rows. Never retried here;
    /// the caller decides whether to abort the run or skip the variable.
    #[error("source fetch failed for table '{table}': {message}")]
    SourceUnavailable { table: String, message: String },

    /// A required column is missing from a record batch
    #[error("column '{column}' not found")]
    ColumnNotFound { column: String },

    /// A column could not be read as the expected array type
    #[error("column '{column}' has an unexpected type, expected {expected}")]
    InvalidDataType { column: String, expected: String },

    /// A batch's column set does not line up with what the operation needs,
    /// e.g. unioned batches disagree or a projection matches nothing
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Invalid registry or variable-dictionary configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Error from an Arrow kernel
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error reading or writing Parquet data
    #[error("parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Error opening or reading a file
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Error parsing JSON configuration
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;
