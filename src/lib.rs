//! A library for building person-level feature matrices from clinical
//! registry tables whose schemas drifted across three epochs.
//!
//! The pipeline resolves logical tables through a static schema registry,
//! merges their per-epoch physical tables into one consistent batch,
//! normalizes the three date encodings the sources use, windows events
//! against each subject's index date, and aggregates the surviving
//! observations into `{variable}_{method}` feature columns.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod filter;
pub mod matrix;
pub mod merge;
pub mod registry;
pub mod source;
pub mod table;

// Core types
pub use config::VariableDictionary;
pub use error::{Error, Result};
pub use registry::{Epoch, SchemaRegistry};

// Arrow types
pub use arrow::record_batch::RecordBatch;

// Pipeline entry points
pub use matrix::{FeatureMatrix, Roster, build_feature_matrix};
pub use merge::{MergeRequest, merge_tables};
pub use source::{DataSource, MemorySource, ParquetSource};

// Aggregation surface
pub use aggregate::{AggregationMethod, FeatureCell};
