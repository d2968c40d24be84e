//! Utilities for working with tabular `RecordBatch` data.
//!
//! These helpers carry the row-level invariants of the pipeline: full-row
//! deduplication after every fetch and union, schema-aligned unions across
//! epochs, and the textual key coercion used by the sub-table inner join.

pub mod dates;

use arrow::array::{Array, ArrayRef, StringArray, UInt32Array};
use arrow::compute::{CastOptions, cast, cast_with_options, concat_batches, take};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::row::{RowConverter, SortField};
use arrow::util::display::FormatOptions;
use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Placeholder token stripped from identifier columns
const ID_PLACEHOLDER: &str = "Encrypted";

/// Get the column index by name from a record batch
pub fn column_index(batch: &RecordBatch, column_name: &str) -> Result<usize> {
    batch
        .schema()
        .index_of(column_name)
        .map_err(|_| Error::ColumnNotFound {
            column: column_name.to_string(),
        })
}

/// Get a column from a record batch by name
pub fn column_by_name(batch: &RecordBatch, column_name: &str) -> Result<ArrayRef> {
    let idx = column_index(batch, column_name)?;
    Ok(batch.column(idx).clone())
}

/// Whether the batch carries a column with the given name
#[must_use]
pub fn has_column(batch: &RecordBatch, column_name: &str) -> bool {
    batch.schema().index_of(column_name).is_ok()
}

/// Cast any array to its Utf8 rendering. Utf8 input is returned as-is.
pub fn cast_to_utf8(array: &ArrayRef) -> Result<ArrayRef> {
    if array.data_type() == &DataType::Utf8 {
        return Ok(array.clone());
    }
    Ok(cast(array, &DataType::Utf8)?)
}

/// Extract a column as owned strings, casting through Utf8 if needed
pub fn column_as_strings(batch: &RecordBatch, column_name: &str) -> Result<Vec<Option<String>>> {
    let array = column_by_name(batch, column_name)?;
    let utf8 = cast_to_utf8(&array)?;
    let strings = utf8
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::InvalidDataType {
            column: column_name.to_string(),
            expected: "StringArray".to_string(),
        })?;
    Ok(strings
        .iter()
        .map(|opt| opt.map(ToString::to_string))
        .collect())
}

/// Extract a column as lenient f64 values: unparsable entries become `None`
/// rather than errors, mirroring coerce-to-missing numeric handling.
pub fn column_as_f64(batch: &RecordBatch, column_name: &str) -> Result<Vec<Option<f64>>> {
    let array = column_by_name(batch, column_name)?;
    let options = CastOptions {
        safe: true,
        format_options: FormatOptions::default(),
    };
    let floats = cast_with_options(&array, &DataType::Float64, &options)?;
    let floats = floats
        .as_any()
        .downcast_ref::<arrow::array::Float64Array>()
        .ok_or_else(|| Error::InvalidDataType {
            column: column_name.to_string(),
            expected: "Float64Array".to_string(),
        })?;
    Ok(floats.iter().collect())
}

fn take_rows(batch: &RecordBatch, indices: &[u32]) -> Result<RecordBatch> {
    let index_array = UInt32Array::from(indices.to_vec());
    let columns = batch
        .columns()
        .iter()
        .map(|col| take(col, &index_array, None).map_err(Error::from))
        .collect::<Result<Vec<_>>>()?;
    Ok(RecordBatch::try_new(batch.schema(), columns)?)
}

/// Remove exact duplicate rows, keeping the first occurrence. Idempotent:
/// deduplicating an already-deduplicated batch is a no-op.
pub fn dedup_rows(batch: &RecordBatch) -> Result<RecordBatch> {
    if batch.num_rows() == 0 || batch.num_columns() == 0 {
        return Ok(batch.clone());
    }
    let sort_fields = batch
        .schema()
        .fields()
        .iter()
        .map(|f| SortField::new(f.data_type().clone()))
        .collect();
    let converter = RowConverter::new(sort_fields)?;
    let rows = converter.convert_columns(batch.columns())?;

    let mut seen = HashSet::with_capacity(batch.num_rows());
    let mut keep = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        if seen.insert(rows.row(i).owned()) {
            keep.push(u32::try_from(i).map_err(|_| {
                Error::SchemaMismatch("batch exceeds u32 row indexing".to_string())
            })?);
        }
    }
    if keep.len() == batch.num_rows() {
        return Ok(batch.clone());
    }
    take_rows(batch, &keep)
}

/// Reorder every batch to the first batch's column order and reconcile
/// per-column type drift by falling back to Utf8 where types disagree.
fn align_schemas(batches: &[RecordBatch]) -> Result<Vec<RecordBatch>> {
    let first = &batches[0];
    let names: Vec<String> = first
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();

    for batch in batches {
        let schema = batch.schema();
        let mut batch_names: Vec<&String> = schema.fields().iter().map(|f| f.name()).collect();
        let mut expected: Vec<&String> = names.iter().collect();
        batch_names.sort();
        expected.sort();
        if batch_names != expected {
            return Err(Error::SchemaMismatch(format!(
                "column sets differ across epochs: [{}] vs [{}]",
                itertools::join(&names, ", "),
                itertools::join(schema.fields().iter().map(|f| f.name()), ", ")
            )));
        }
    }

    // Decide a common type per column
    let mut common_types: Vec<DataType> = Vec::with_capacity(names.len());
    for name in &names {
        let mut ty: Option<DataType> = None;
        for batch in batches {
            let col = column_by_name(batch, name)?;
            match &ty {
                None => ty = Some(col.data_type().clone()),
                Some(t) if t != col.data_type() => {
                    ty = Some(DataType::Utf8);
                    break;
                }
                Some(_) => {}
            }
        }
        common_types.push(ty.unwrap_or(DataType::Utf8));
    }

    let mut aligned = Vec::with_capacity(batches.len());
    for batch in batches {
        let mut columns = Vec::with_capacity(names.len());
        let mut fields = Vec::with_capacity(names.len());
        for (name, ty) in names.iter().zip(&common_types) {
            let col = column_by_name(batch, name)?;
            let col = if col.data_type() == ty {
                col
            } else {
                cast(&col, ty)?
            };
            fields.push(Field::new(name, ty.clone(), true));
            columns.push(col);
        }
        aligned.push(RecordBatch::try_new(
            Arc::new(Schema::new(fields)),
            columns,
        )?);
    }
    Ok(aligned)
}

/// Union batches row-wise and deduplicate the result. All batches must carry
/// the same column set; column order and type drift are reconciled first.
pub fn union_all(batches: &[RecordBatch]) -> Result<RecordBatch> {
    match batches {
        [] => Err(Error::SchemaMismatch(
            "cannot union an empty set of batches".to_string(),
        )),
        [single] => dedup_rows(single),
        _ => {
            let aligned = align_schemas(batches)?;
            let combined = concat_batches(&aligned[0].schema(), aligned.iter())?;
            dedup_rows(&combined)
        }
    }
}

/// Rename columns per the given old-name to new-name map
pub fn rename_columns(batch: &RecordBatch, renames: &FxHashMap<String, String>) -> RecordBatch {
    let fields: Vec<Field> = batch
        .schema()
        .fields()
        .iter()
        .map(|f| {
            let name = renames.get(f.name()).unwrap_or(f.name());
            Field::new(name, f.data_type().clone(), f.is_nullable())
        })
        .collect();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), batch.columns().to_vec())
        .expect("renaming fields preserves batch shape")
}

/// Replace (or append) a single column by name
pub fn replace_column(batch: &RecordBatch, name: &str, array: ArrayRef) -> Result<RecordBatch> {
    let mut fields: Vec<Field> = batch
        .schema()
        .fields()
        .iter()
        .map(|f| Field::new(f.name(), f.data_type().clone(), f.is_nullable()))
        .collect();
    let mut columns = batch.columns().to_vec();
    match batch.schema().index_of(name) {
        Ok(idx) => {
            fields[idx] = Field::new(name, array.data_type().clone(), true);
            columns[idx] = array;
        }
        Err(_) => {
            fields.push(Field::new(name, array.data_type().clone(), true));
            columns.push(array);
        }
    }
    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        columns,
    )?)
}

fn join_keys(batch: &RecordBatch, columns: &[String]) -> Result<Vec<Option<Vec<String>>>> {
    let mut key_columns = Vec::with_capacity(columns.len());
    for name in columns {
        key_columns.push(column_as_strings(batch, name)?);
    }
    let mut keys = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let mut key = Vec::with_capacity(columns.len());
        let mut complete = true;
        for col in &key_columns {
            match &col[row] {
                Some(v) => key.push(v.clone()),
                None => {
                    complete = false;
                    break;
                }
            }
        }
        keys.push(if complete { Some(key) } else { None });
    }
    Ok(keys)
}

/// Inner join a dependent batch against a main batch on positionally paired
/// merge columns. Both sides are compared through their Utf8 rendering so
/// mixed numeric/string key representations still match. Dependent rows with
/// no main-side match (or with a null key) are dropped.
///
/// The output carries the dependent columns (its merge columns renamed onto
/// the main-side names when `rename_to_main` is set) followed by the main
/// columns whose names do not collide.
pub fn inner_join(
    sub: &RecordBatch,
    main: &RecordBatch,
    sub_columns: &[String],
    main_columns: &[String],
    rename_to_main: bool,
) -> Result<RecordBatch> {
    debug_assert_eq!(sub_columns.len(), main_columns.len());

    let main_keys = join_keys(main, main_columns)?;
    let mut main_index: FxHashMap<&Vec<String>, Vec<u32>> = FxHashMap::default();
    for (row, key) in main_keys.iter().enumerate() {
        if let Some(key) = key {
            main_index.entry(key).or_default().push(row as u32);
        }
    }

    let sub_keys = join_keys(sub, sub_columns)?;
    let mut sub_take = Vec::new();
    let mut main_take = Vec::new();
    for (row, key) in sub_keys.iter().enumerate() {
        let Some(key) = key else { continue };
        if let Some(matches) = main_index.get(key) {
            for main_row in matches {
                sub_take.push(row as u32);
                main_take.push(*main_row);
            }
        }
    }

    // Merge columns are carried in their coerced textual form, as joined keys
    let mut sub_cast = sub.clone();
    for name in sub_columns {
        let utf8 = cast_to_utf8(&column_by_name(&sub_cast, name)?)?;
        sub_cast = replace_column(&sub_cast, name, utf8)?;
    }
    if rename_to_main {
        let renames: FxHashMap<String, String> = sub_columns
            .iter()
            .zip(main_columns)
            .filter(|(s, m)| s != m)
            .map(|(s, m)| (s.clone(), m.clone()))
            .collect();
        sub_cast = rename_columns(&sub_cast, &renames);
    }

    let sub_side = take_rows(&sub_cast, &sub_take)?;
    let main_side = take_rows(main, &main_take)?;

    let mut fields: Vec<Field> = sub_side
        .schema()
        .fields()
        .iter()
        .map(|f| Field::new(f.name(), f.data_type().clone(), true))
        .collect();
    let mut columns = sub_side.columns().to_vec();
    for (field, column) in main_side.schema().fields().iter().zip(main_side.columns()) {
        if !has_column(&sub_side, field.name()) {
            fields.push(Field::new(field.name(), field.data_type().clone(), true));
            columns.push(column.clone());
        }
    }
    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        columns,
    )?)
}

/// Strip the known placeholder token and separator characters from an
/// identifier column. Missing identifiers stay missing.
pub fn clean_identifiers(batch: &RecordBatch, column_name: &str) -> Result<RecordBatch> {
    let values = column_as_strings(batch, column_name)?;
    let cleaned: StringArray = values
        .into_iter()
        .map(|opt| opt.map(|s| s.replace(ID_PLACEHOLDER, "").replace('-', "")))
        .collect();
    replace_column(batch, column_name, Arc::new(cleaned))
}

/// Map textual blank placeholders (`nan`/`null`/`none`, case-insensitive, and
/// whitespace-only strings) in the given Utf8 columns to real nulls.
pub fn scrub_blank_tokens(batch: &RecordBatch, columns: &[&str]) -> Result<RecordBatch> {
    let mut out = batch.clone();
    for name in columns {
        if !has_column(&out, name) {
            continue;
        }
        let array = column_by_name(&out, name)?;
        if array.data_type() != &DataType::Utf8 {
            continue;
        }
        let values = column_as_strings(&out, name)?;
        let scrubbed: StringArray = values
            .into_iter()
            .map(|opt| opt.filter(|s| !is_blank_token(s)))
            .collect();
        out = replace_column(&out, name, Arc::new(scrubbed))?;
    }
    Ok(out)
}

/// Whether a textual value is one of the blank placeholders
#[must_use]
pub fn is_blank_token(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || matches!(trimmed.to_ascii_lowercase().as_str(), "nan" | "null" | "none")
}

/// Convert a `Date32` day offset to a calendar date
#[must_use]
pub fn date32_to_naive(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(chrono::Duration::days(i64::from(days)))
}

/// Convert a calendar date to its `Date32` day offset
#[must_use]
pub fn naive_to_date32(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("unix epoch is a valid date");
    date.signed_duration_since(epoch).num_days() as i32
}
