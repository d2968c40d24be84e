//! An in-memory data source for tests and fixtures.

use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::filter::{self, Expr};
use crate::source::DataSource;

/// Maps `(database, table)` to a fixed batch. Projection and filtering are
/// applied in memory with the same lenient column handling as the parquet
/// source: requested columns the batch lacks are skipped with a warning.
#[derive(Default)]
pub struct MemorySource {
    tables: FxHashMap<(String, String), RecordBatch>,
}

impl MemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, database: &str, table: &str, batch: RecordBatch) {
        self.tables
            .insert((database.to_string(), table.to_string()), batch);
    }
}

impl DataSource for MemorySource {
    fn fetch(
        &self,
        table: &str,
        database: &str,
        columns: Option<&[String]>,
        filter: Option<&Expr>,
    ) -> Result<RecordBatch> {
        let batch = self
            .tables
            .get(&(database.to_string(), table.to_string()))
            .ok_or_else(|| Error::SourceUnavailable {
                table: table.to_string(),
                message: format!("no such table in database '{database}'"),
            })?;

        let mut batch = match columns {
            Some(requested) => {
                let mut indices = Vec::new();
                for name in requested {
                    match batch.schema().index_of(name) {
                        Ok(idx) => indices.push(idx),
                        Err(_) => log::warn!(
                            "column '{name}' not found in '{database}.{table}', skipping"
                        ),
                    }
                }
                if indices.is_empty() {
                    return Err(Error::SchemaMismatch(format!(
                        "none of the requested columns exist in '{database}.{table}'"
                    )));
                }
                batch.project(&indices)?
            }
            None => batch.clone(),
        };

        if let Some(expr) = filter {
            batch = filter::apply_filter(&batch, expr)?;
        }
        Ok(batch)
    }
}
