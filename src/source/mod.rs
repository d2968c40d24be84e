//! The external data-source boundary.
//!
//! The engine treats row retrieval as an opaque synchronous query interface:
//! given a physical table, its database, a column projection and an optional
//! filter, a source returns rows with their column names. Fetch failures
//! surface as [`Error::SourceUnavailable`](crate::error::Error) and are never
//! retried here; the caller decides whether to abort or skip.

pub mod memory;
pub mod parquet;

use arrow::record_batch::RecordBatch;

pub use memory::MemorySource;
pub use parquet::ParquetSource;

use crate::error::Result;
use crate::filter::Expr;

/// Synchronous row access for one physical table. `columns: None` requests
/// every column. Implementations may ignore requested columns the table does
/// not carry (the downstream merge reconciles schemas), but must preserve the
/// names of the columns they do return.
pub trait DataSource {
    fn fetch(
        &self,
        table: &str,
        database: &str,
        columns: Option<&[String]>,
        filter: Option<&Expr>,
    ) -> Result<RecordBatch>;
}
