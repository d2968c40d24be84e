//! Feature-matrix assembly.
//!
//! The orchestrator walks the variable dictionary table block by table block:
//! merge the block's logical table across epochs, anchor every event row to
//! the roster's index date, run each variable through its transform chain and
//! aggregation methods, and emit one matrix column per (variable, method)
//! pair. Variables never interact; each one is an independent fold over the
//! merged rows.

use arrow::array::StringArray;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::aggregate::{
    self, AggregationMethod, CellValue, FeatureCell, RawObservation, window_observations,
};
use crate::config::{Transform, VarType, VariableDictionary, VariableSpec};
use crate::error::{Error, Result};
use crate::merge::{MergeRequest, merge_tables};
use crate::registry::SchemaRegistry;
use crate::source::DataSource;
use crate::table::{self, dates};

/// Name a transform may use to reference the roster's index date
const INDEX_DATE_COLUMN: &str = "index_date";

/// Birth-year sanity bounds for year-duration transforms
const YEAR_FLOOR: i32 = 1900;
const YEAR_CEILING: i32 = 2025;

/// The study roster: the subjects the matrix is built for, each anchored to
/// an index date. Roster order is matrix row order.
#[derive(Debug, Clone)]
pub struct Roster {
    /// Name of the identifier column, kept for output
    pub id_name: String,
    /// Name of the index-date column, kept for output
    pub date_name: String,
    pub ids: Vec<String>,
    pub index_dates: Vec<Option<NaiveDate>>,
    by_id: FxHashMap<String, usize>,
}

impl Roster {
    #[must_use]
    pub fn new(ids: Vec<String>, index_dates: Vec<Option<NaiveDate>>) -> Self {
        let by_id = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        Self {
            id_name: "id".to_string(),
            date_name: INDEX_DATE_COLUMN.to_string(),
            ids,
            index_dates,
            by_id,
        }
    }

    /// Build a roster from a batch holding an identifier and an index-date
    /// column. Identifiers are cleansed the same way source tables are, so
    /// roster and event ids compare equal. Rows with no identifier are
    /// dropped; duplicate identifiers keep their first index date.
    pub fn from_batch(batch: &RecordBatch, id_col: &str, date_col: &str) -> Result<Self> {
        let cleaned = table::clean_identifiers(batch, id_col)?;
        let ids = table::column_as_strings(&cleaned, id_col)?;
        let index_dates = dates::column_to_naive_dates(&cleaned, date_col)?;

        let mut roster = Self::new(Vec::new(), Vec::new());
        roster.id_name = id_col.to_string();
        roster.date_name = date_col.to_string();
        for (id, date) in ids.into_iter().zip(index_dates) {
            let Some(id) = id.filter(|s| !table::is_blank_token(s)) else {
                continue;
            };
            if roster.by_id.contains_key(&id) {
                continue;
            }
            roster.by_id.insert(id.clone(), roster.ids.len());
            roster.ids.push(id);
            roster.index_dates.push(date);
        }
        Ok(roster)
    }

    /// The index date anchoring a subject, if the subject is on the roster
    #[must_use]
    pub fn index_date_of(&self, id: &str) -> Option<NaiveDate> {
        self.by_id.get(id).and_then(|&i| self.index_dates[i])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// The assembled matrix: one row per roster subject, one column per
/// (variable, method) pair, in dictionary order.
#[derive(Debug)]
pub struct FeatureMatrix {
    pub roster: Roster,
    columns: Vec<(String, Vec<FeatureCell>)>,
}

impl FeatureMatrix {
    #[must_use]
    pub fn new(roster: Roster) -> Self {
        Self {
            roster,
            columns: Vec::new(),
        }
    }

    /// Append one feature column; cells must be in roster order
    pub fn push_column(&mut self, name: String, cells: Vec<FeatureCell>) -> Result<()> {
        if cells.len() != self.roster.len() {
            return Err(Error::SchemaMismatch(format!(
                "feature column '{name}' has {} cell(s) for {} roster subject(s)",
                cells.len(),
                self.roster.len()
            )));
        }
        self.columns.push((name, cells));
        Ok(())
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[FeatureCell]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, cells)| cells.as_slice())
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Render the matrix to a batch. Every column is Utf8: cell values print
    /// as numbers or text, the three empty states as their literal markers.
    /// The roster's id and index-date columns lead, under their source names.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = vec![
            Field::new(&self.roster.id_name, DataType::Utf8, false),
            Field::new(&self.roster.date_name, DataType::Utf8, true),
        ];
        let mut arrays: Vec<arrow::array::ArrayRef> = vec![
            Arc::new(StringArray::from(
                self.roster.ids.iter().map(String::as_str).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                self.roster
                    .index_dates
                    .iter()
                    .map(|opt| opt.map(|d| d.format("%Y-%m-%d").to_string()))
                    .collect::<Vec<_>>(),
            )),
        ];
        for (name, cells) in &self.columns {
            fields.push(Field::new(name, DataType::Utf8, false));
            let rendered: Vec<String> = cells.iter().map(FeatureCell::render).collect();
            arrays.push(Arc::new(StringArray::from(rendered)));
        }
        Ok(RecordBatch::try_new(
            Arc::new(Schema::new(fields)),
            arrays,
        )?)
    }
}

/// Per-row value state for one variable as it moves through its transform
/// chain. `raw_blank` records whether the source field itself was empty;
/// transforms may null a value without making the field blank.
struct ValueRow {
    value: CellValue,
    raw_blank: bool,
}

fn text_of(value: &CellValue) -> Option<String> {
    match value {
        CellValue::Text(s) => Some(s.clone()),
        CellValue::Number(n) => Some(aggregate::FeatureCell::Value(*n).render()),
        CellValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        CellValue::Null => None,
    }
}

fn date_of(value: &CellValue) -> Option<NaiveDate> {
    match value {
        CellValue::Date(d) => Some(*d),
        CellValue::Text(s) => dates::parse_date_string(s),
        CellValue::Number(n) => dates::serial_to_date(n.trunc() as i64),
        CellValue::Null => None,
    }
}

/// Extra merged columns a variable's transform chain reads
fn transform_columns(var: &VariableSpec) -> Vec<String> {
    var.transforms
        .iter()
        .filter_map(|t| match t {
            Transform::YearsSince { other_column } if other_column != INDEX_DATE_COLUMN => {
                Some(other_column.clone())
            }
            _ => None,
        })
        .collect()
}

fn apply_transform(
    transform: &Transform,
    rows: &mut [ValueRow],
    other_dates: Option<&[Option<NaiveDate>]>,
) {
    match transform {
        Transform::ContainsAny { patterns } => {
            for row in rows {
                row.value = match text_of(&row.value) {
                    Some(text) if patterns.iter().any(|p| text.contains(p.as_str())) => {
                        CellValue::Number(1.0)
                    }
                    _ => CellValue::Null,
                };
            }
        }
        Transform::IsIn { values } => {
            for row in rows {
                row.value = match text_of(&row.value) {
                    Some(text) if values.iter().any(|v| v == text.trim()) => {
                        CellValue::Number(1.0)
                    }
                    _ => CellValue::Null,
                };
            }
        }
        Transform::YearsSince { .. } => {
            let anchors = other_dates.unwrap_or(&[]);
            for (i, row) in rows.iter_mut().enumerate() {
                let from = date_of(&row.value)
                    .filter(|d| (YEAR_FLOOR..=YEAR_CEILING).contains(&d.year()));
                row.value = match (from, anchors.get(i).copied().flatten()) {
                    (Some(from), Some(to)) => {
                        let days = to.signed_duration_since(from).num_days();
                        #[allow(clippy::cast_precision_loss)]
                        CellValue::Number(days.div_euclid(365) as f64)
                    }
                    _ => CellValue::Null,
                };
            }
        }
    }
}

/// Prepare one variable's per-row values from the merged batch: read the
/// value column, mark blank fields, run the transform chain, then coerce
/// continuous and ordinal variables to numbers.
fn prepare_values(
    merged: &RecordBatch,
    var: &VariableSpec,
    row_index_dates: &[Option<NaiveDate>],
) -> Result<Vec<ValueRow>> {
    let texts = table::column_as_strings(merged, &var.value_column)?;
    let mut rows: Vec<ValueRow> = texts
        .into_iter()
        .map(|opt| match opt {
            Some(s) if !table::is_blank_token(&s) => ValueRow {
                value: CellValue::Text(s),
                raw_blank: false,
            },
            _ => ValueRow {
                value: CellValue::Null,
                raw_blank: true,
            },
        })
        .collect();

    for transform in &var.transforms {
        let other_dates: Option<Vec<Option<NaiveDate>>> = match transform {
            Transform::YearsSince { other_column } if other_column == INDEX_DATE_COLUMN => {
                Some(row_index_dates.to_vec())
            }
            Transform::YearsSince { other_column } => {
                Some(dates::column_to_naive_dates(merged, other_column)?)
            }
            _ => None,
        };
        apply_transform(transform, &mut rows, other_dates.as_deref());
    }

    if matches!(var.var_type, VarType::Cont | VarType::Ord) && !var.keep_raw {
        for row in &mut rows {
            row.value = match &row.value {
                CellValue::Number(n) => CellValue::Number(*n),
                CellValue::Text(s) => match s.trim().parse::<f64>() {
                    Ok(n) => CellValue::Number(n),
                    // A filled but non-numeric answer is not a blank field;
                    // it takes the answered-but-not-selected path
                    Err(_) => CellValue::Null,
                },
                CellValue::Date(_) | CellValue::Null => CellValue::Null,
            };
        }
    }
    Ok(rows)
}

/// Build the full feature matrix for a roster from a variable dictionary.
pub fn build_feature_matrix(
    source: &dyn DataSource,
    registry: &SchemaRegistry,
    dictionary: &VariableDictionary,
    roster: &Roster,
) -> Result<FeatureMatrix> {
    let mut matrix = FeatureMatrix::new(roster.clone());

    for block in &dictionary.tables {
        let mut columns: Vec<String> = vec![block.common.id_col.clone()];
        for var in &block.variables {
            for name in
                std::iter::once(var.value_column.clone()).chain(transform_columns(var))
            {
                if !columns.contains(&name) {
                    columns.push(name);
                }
            }
        }
        let date_columns = [block.common.date_col.clone()];

        let merged = merge_tables(
            source,
            registry,
            &MergeRequest {
                logical: &block.table,
                columns: &columns,
                filter: None,
                id_column: Some(&block.common.id_col),
                date_columns: &date_columns,
            },
        )?;

        // Per-row anchors: ids off the roster never anchor an observation
        let row_ids = table::column_as_strings(&merged, &block.common.id_col)?;
        let event_dates = dates::column_to_naive_dates(&merged, &block.common.date_col)?;
        let row_index_dates: Vec<Option<NaiveDate>> = row_ids
            .iter()
            .map(|id| id.as_deref().and_then(|id| roster.index_date_of(id)))
            .collect();

        for var in &block.variables {
            let values = prepare_values(&merged, var, &row_index_dates)?;
            let raw: Vec<RawObservation> = row_ids
                .iter()
                .zip(&event_dates)
                .zip(values)
                .filter_map(|((id, event_date), row)| {
                    let id = id.clone()?;
                    Some(RawObservation {
                        index_date: roster.index_date_of(&id),
                        id,
                        event_date: *event_date,
                        value: row.value,
                        raw_blank: row.raw_blank,
                    })
                })
                .collect();

            for spec in &var.methods {
                let windowed = window_observations(&raw, spec.follow_up);
                let cells = aggregate::aggregate(&roster.ids, &windowed, spec.method);
                matrix.push_column(column_name(&var.name, spec.method), cells)?;
            }
            log::info!(
                "built {} column(s) for variable '{}'",
                var.methods.len(),
                var.name
            );
        }
    }
    Ok(matrix)
}

/// The stable output naming contract: `{variable}_{method}`
#[must_use]
pub fn column_name(variable: &str, method: AggregationMethod) -> String {
    format!("{variable}_{}", method.as_str())
}
