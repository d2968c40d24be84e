//! A parquet-directory backed data source.
//!
//! Layout: `{root}/{database}/{table}.parquet`. Column projection is pushed
//! into the parquet reader; the filter expression is applied per batch as it
//! streams out.

use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::filter::{self, Expr};
use crate::source::DataSource;

pub struct ParquetSource {
    root: PathBuf,
}

impl ParquetSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn table_path(&self, table: &str, database: &str) -> PathBuf {
        self.root.join(database).join(format!("{table}.parquet"))
    }
}

impl DataSource for ParquetSource {
    fn fetch(
        &self,
        table: &str,
        database: &str,
        columns: Option<&[String]>,
        filter: Option<&Expr>,
    ) -> Result<RecordBatch> {
        let path = self.table_path(table, database);
        log::debug!("fetching '{table}' from {}", path.display());
        read_parquet_table(&path, columns, filter).map_err(|err| Error::SourceUnavailable {
            table: table.to_string(),
            message: err.to_string(),
        })
    }
}

/// Read one parquet file, projecting to the requested columns where they
/// exist and applying the filter per batch.
pub fn read_parquet_table(
    path: &Path,
    columns: Option<&[String]>,
    filter: Option<&Expr>,
) -> Result<RecordBatch> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let file_schema = builder.schema().clone();

    let (reader, projected_schema) = match columns {
        Some(requested) => {
            // Skip requested fields the file does not carry; the merge layer
            // reconciles column drift across epochs.
            let mut projection = Vec::new();
            for name in requested {
                match file_schema.index_of(name) {
                    Ok(idx) => projection.push(idx),
                    Err(_) => {
                        log::warn!(
                            "column '{name}' not found in {}, skipping",
                            path.display()
                        );
                    }
                }
            }
            // A projection with zero matches is a misconfiguration; failing
            // here points at the cause instead of a union mismatch later
            if projection.is_empty() {
                return Err(Error::SchemaMismatch(format!(
                    "none of the requested columns exist in {}",
                    path.display()
                )));
            }
            let schema = projected_arrow_schema(&file_schema, &projection);
            let mask = ProjectionMask::leaves(builder.parquet_schema(), projection);
            let reader = builder.with_projection(mask).build()?;
            (reader, schema)
        }
        None => {
            let reader = builder.build()?;
            (reader, file_schema)
        }
    };

    let mut batches = Vec::new();
    for batch in reader {
        let batch = batch?;
        let batch = match filter {
            Some(expr) => filter::apply_filter(&batch, expr)?,
            None => batch,
        };
        if batch.num_rows() > 0 {
            batches.push(batch);
        }
    }

    if batches.is_empty() {
        return Ok(RecordBatch::new_empty(projected_schema));
    }
    let schema = batches[0].schema();
    Ok(arrow::compute::concat_batches(&schema, batches.iter())?)
}

fn projected_arrow_schema(file_schema: &SchemaRef, projection: &[usize]) -> SchemaRef {
    let fields: Vec<Field> = projection
        .iter()
        .map(|&idx| file_schema.field(idx).clone())
        .collect();
    Arc::new(Schema::new(fields))
}

/// Write a batch to a parquet file, creating parent directories as needed
pub fn write_parquet_table(path: &Path, batch: &RecordBatch) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut writer = parquet::arrow::ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}
