//! Cross-epoch table resolution and union.
//!
//! A logical table resolves to one or more physical tables per epoch. Each
//! physical table is fetched with its key columns appended, joined onto its
//! main table when the registry declares it dependent, date-normalized per
//! its encoding class, renamed where the registry declares naming drift, and
//! finally unioned and deduplicated into one consistent batch.

use arrow::record_batch::RecordBatch;

use crate::error::{Error, Result};
use crate::filter::Expr;
use crate::registry::{Epoch, Resolution, SchemaRegistry};
use crate::source::DataSource;
use crate::table::{self, dates};

/// Fetch one physical table with its registered key columns appended to the
/// projection, deduplicating the result. The key columns ride along so
/// downstream join/dedup never silently loses its join key.
pub fn fetch_table(
    source: &dyn DataSource,
    registry: &SchemaRegistry,
    epoch: Epoch,
    physical: &str,
    columns: &[String],
    filter: Option<&Expr>,
) -> Result<RecordBatch> {
    let entry = registry.physical(epoch, physical)?;

    let mut projection: Vec<String> = columns
        .iter()
        .filter(|c| !entry.key_columns.contains(c))
        .cloned()
        .collect();
    projection.extend(entry.key_columns.iter().cloned());

    let batch = if projection.is_empty() {
        source.fetch(physical, &entry.database, None, filter)?
    } else {
        source.fetch(physical, &entry.database, Some(&projection), filter)?
    };
    log::debug!(
        "fetched {} row(s) from '{}' ({epoch})",
        batch.num_rows(),
        physical
    );
    table::dedup_rows(&batch)
}

/// When the registry declares this physical table dependent, fetch the paired
/// main table's key columns and inner-join to recover the date anchor the
/// dependent table lacks. Dependent rows unable to resolve a main-table
/// anchor are dropped.
pub fn join_if_needed(
    source: &dyn DataSource,
    registry: &SchemaRegistry,
    epoch: Epoch,
    physical: &str,
    batch: RecordBatch,
) -> Result<RecordBatch> {
    let entry = registry.physical(epoch, physical)?;
    let Some(spec) = &entry.join else {
        return Ok(batch);
    };

    let main = fetch_table(source, registry, epoch, &spec.main_table, &spec.main_columns, None)?;
    let before = batch.num_rows();
    let joined = table::inner_join(
        &batch,
        &main,
        &spec.sub_columns,
        &spec.main_columns,
        spec.rename_to_main,
    )?;
    if joined.num_rows() < before {
        log::debug!(
            "sub-table join on '{physical}' dropped {} unmatched row(s)",
            before - joined.num_rows()
        );
    }
    Ok(joined)
}

/// Inputs for one cross-epoch merge
pub struct MergeRequest<'a> {
    /// Logical table name from the variable dictionary
    pub logical: &'a str,
    /// Columns the caller needs, by their canonical names
    pub columns: &'a [String],
    pub filter: Option<&'a Expr>,
    /// Identifier column to cleanse on the final result
    pub id_column: Option<&'a str>,
    /// Date columns to normalize per the physical table's encoding class
    pub date_columns: &'a [String],
}

fn epoch_specific(name: &str, resolution: &Resolution<'_>) -> String {
    // `renames` maps epoch-specific to canonical; invert for the projection
    resolution
        .renames
        .iter()
        .find_map(|(epoch_name, canonical)| (canonical == name).then(|| epoch_name.clone()))
        .unwrap_or_else(|| name.to_string())
}

/// Resolve a logical table across all epochs it is registered in, union the
/// per-epoch results and deduplicate. Epochs without a registration are
/// skipped; a logical table registered nowhere is an error.
pub fn merge_tables(
    source: &dyn DataSource,
    registry: &SchemaRegistry,
    request: &MergeRequest<'_>,
) -> Result<RecordBatch> {
    let mut collected: Vec<RecordBatch> = Vec::new();

    for epoch in Epoch::ALL {
        let resolution = match registry.resolve(request.logical, epoch) {
            Ok(resolution) => resolution,
            Err(Error::UnregisteredTable { .. }) => {
                log::debug!("'{}' not registered in epoch {epoch}, skipping", request.logical);
                continue;
            }
            Err(err) => return Err(err),
        };

        // Project under the epoch's own column names, including date columns
        let mut projection: Vec<String> = Vec::new();
        for name in request.columns.iter().chain(request.date_columns) {
            let epoch_name = epoch_specific(name, &resolution);
            if !projection.contains(&epoch_name) {
                projection.push(epoch_name);
            }
        }

        for (physical, entry) in &resolution.tables {
            let batch = fetch_table(source, registry, epoch, physical, &projection, request.filter)?;
            let mut batch = join_if_needed(source, registry, epoch, physical, batch)?;

            for date_col in request.date_columns {
                let epoch_name = epoch_specific(date_col, &resolution);
                if table::has_column(&batch, &epoch_name) {
                    batch = dates::normalize_date_column(&batch, &epoch_name, entry.date_class)?;
                } else {
                    log::warn!(
                        "date column '{epoch_name}' missing from '{physical}' ({epoch})"
                    );
                }
            }

            if !resolution.renames.is_empty() {
                batch = table::rename_columns(&batch, &resolution.renames);
            }
            collected.push(batch);
        }
    }

    if collected.is_empty() {
        return Err(Error::UnknownLogicalTable(request.logical.to_string()));
    }

    let mut merged = table::dedup_rows(&table::union_all(&collected)?)?;
    if let Some(id_column) = request.id_column {
        if table::has_column(&merged, id_column) {
            merged = table::clean_identifiers(&merged, id_column)?;
            // Ids cleansed down to nothing count as missing
            merged = table::scrub_blank_tokens(&merged, &[id_column])?;
        }
    }
    log::info!(
        "merged '{}' across {} batch(es): {} row(s)",
        request.logical,
        collected.len(),
        merged.num_rows()
    );
    Ok(merged)
}
